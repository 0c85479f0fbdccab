//! Property-by-property inline-style diffing.
//!
//! The old attribute string is parsed into an ephemeral reference list;
//! only properties whose live value or priority differ are recorded, and
//! fully-cleared properties become explicit deletions.

use dom::StyleDeclaration;
use dom::mutation::StyleProp;
use std::collections::BTreeMap;

pub fn diff_style(
    old: &[StyleDeclaration],
    new: &[StyleDeclaration],
) -> BTreeMap<String, StyleProp> {
    let mut out = BTreeMap::new();
    for decl in new {
        let unchanged = old
            .iter()
            .find(|d| d.name == decl.name)
            .is_some_and(|prev| prev.value == decl.value && prev.important == decl.important);
        if unchanged {
            continue;
        }
        let prop = if decl.important {
            StyleProp::WithPriority(decl.value.clone(), "important".to_string())
        } else {
            StyleProp::Value(decl.value.clone())
        };
        out.insert(decl.name.clone(), prop);
    }
    for decl in old {
        if !new.iter().any(|d| d.name == decl.name) {
            out.insert(decl.name.clone(), StyleProp::Cleared(false));
        }
    }
    out
}
