//! Inline-style declaration lists.
//!
//! The tree keeps inline style in parsed form and regenerates the `style`
//! attribute string from it; capture diffs two parsed lists property by
//! property. Parsing is deliberately forgiving: malformed declarations are
//! skipped, never fatal.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleDeclaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Parse a `style` attribute string into an ordered declaration list.
/// Later declarations of the same property win.
pub fn parse_inline_style(input: &str) -> Vec<StyleDeclaration> {
    let mut out: Vec<StyleDeclaration> = Vec::new();
    for chunk in input.split(';') {
        let Some((name, value)) = chunk.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let mut value = value.trim();
        let mut important = false;
        if let Some(stripped) = strip_important(value) {
            value = stripped.trim_end();
            important = true;
        }
        if value.is_empty() {
            continue;
        }
        if let Some(existing) = out.iter_mut().find(|d| d.name == name) {
            existing.value = value.to_string();
            existing.important = important;
        } else {
            out.push(StyleDeclaration {
                name: name.to_string(),
                value: value.to_string(),
                important,
            });
        }
    }
    out
}

fn strip_important(value: &str) -> Option<&str> {
    let trimmed = value.trim_end();
    let split = trimmed.len().checked_sub("!important".len())?;
    // `get` rejects a split inside a multi-byte character, which also
    // cannot be the ASCII suffix
    let tail = trimmed.get(split..)?;
    if tail.eq_ignore_ascii_case("!important") {
        Some(&trimmed[..split])
    } else {
        None
    }
}

/// Render a declaration list back into a `style` attribute string.
pub fn render_inline_style(declarations: &[StyleDeclaration]) -> String {
    let mut out = String::new();
    for decl in declarations {
        if !out.is_empty() {
            out.push_str("; ");
        }
        out.push_str(&decl.name);
        out.push_str(": ");
        out.push_str(&decl.value);
        if decl.important {
            out.push_str(" !important");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_declarations() {
        let decls = parse_inline_style("color: red; margin-top:4px");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "color");
        assert_eq!(decls[0].value, "red");
        assert!(!decls[0].important);
        assert_eq!(decls[1].name, "margin-top");
        assert_eq!(decls[1].value, "4px");
    }

    #[test]
    fn parses_priority() {
        let decls = parse_inline_style("display: none !IMPORTANT");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].value, "none");
        assert!(decls[0].important);
    }

    #[test]
    fn non_ascii_value_is_not_mistaken_for_priority() {
        let decls = parse_inline_style("content: αααααb");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].value, "αααααb");
        assert!(!decls[0].important);

        let decls = parse_inline_style("content: ααα !important");
        assert_eq!(decls[0].value, "ααα");
        assert!(decls[0].important);
    }

    #[test]
    fn later_duplicate_wins() {
        let decls = parse_inline_style("color: red; color: blue");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].value, "blue");
    }

    #[test]
    fn skips_malformed_chunks() {
        let decls = parse_inline_style("nonsense;; color: red; : 4px; width:");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "color");
    }

    #[test]
    fn renders_round_trip() {
        let input = "color: red; display: none !important";
        let rendered = render_inline_style(&parse_inline_style(input));
        assert_eq!(parse_inline_style(&rendered), parse_inline_style(input));
    }
}
