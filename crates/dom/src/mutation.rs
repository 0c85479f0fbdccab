//! Delta wire protocol.
//!
//! The coalesced output of one capture cycle and the input of one replay
//! step. Shared between the capture and replay crates the same way a patch
//! protocol is shared between its producer and applier.
//!
//! Invariants:
//! - Within one delta, removes apply before adds; texts/attributes after
//!   adds.
//! - `AddedNodeMutation.node` is a serialized subtree WITHOUT children;
//!   children always arrive as separate adds.
//! - Sibling hints use the legacy sentinel encoding on the wire: a missing
//!   `nextId` serializes as `-1`, and negative/absent/null all read back as
//!   "no hint".
//! - In the style form of an attribute write, `false` is an explicit
//!   property deletion and `[value, priority]` carries a priority.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id(pub u32);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adds: Vec<AddedNodeMutation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removes: Vec<RemovedNodeMutation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub texts: Vec<TextMutation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeMutation>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty()
            && self.removes.is_empty()
            && self.texts.is_empty()
            && self.attributes.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedNodeMutation {
    pub parent_id: Id,
    #[serde(default, with = "sentinel_id")]
    pub next_id: Option<Id>,
    #[serde(
        default,
        with = "sentinel_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_id: Option<Id>,
    pub node: SerializedNode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedNodeMutation {
    pub id: Id,
    pub parent_id: Id,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_shadow_root: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextMutation {
    pub id: Id,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeMutation {
    pub id: Id,
    /// `None` clears the attribute.
    pub attributes: BTreeMap<String, Option<AttrValue>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Style(BTreeMap<String, StyleProp>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleProp {
    /// `[value, priority]` on the wire.
    WithPriority(String, String),
    Value(String),
    /// `false` on the wire: explicit property deletion.
    Cleared(bool),
}

/// One serialized node, children omitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub id: Id,
    #[serde(flatten)]
    pub kind: SerializedKind,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_shadow: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SerializedKind {
    #[serde(rename_all = "camelCase")]
    Document {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        doctype: Option<String>,
    },
    ShadowRoot,
    #[serde(rename_all = "camelCase")]
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<(String, Option<String>)>,
        #[serde(default, skip_serializing_if = "is_false")]
        is_frame: bool,
    },
    Text {
        value: String,
    },
    Comment {
        value: String,
    },
}

impl SerializedNode {
    pub fn element(id: Id, tag: &str) -> Self {
        Self {
            id,
            kind: SerializedKind::Element {
                tag: tag.to_string(),
                attributes: Vec::new(),
                is_frame: false,
            },
            is_shadow: false,
        }
    }

    pub fn text(id: Id, value: &str) -> Self {
        Self {
            id,
            kind: SerializedKind::Text {
                value: value.to_string(),
            },
            is_shadow: false,
        }
    }
}

/// Stylesheet rule edits carried by the side channel and journaled while a
/// subtree is virtualized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleEdit {
    #[serde(rename_all = "camelCase")]
    Insert {
        rule: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    Delete {
        index: usize,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

mod sentinel_id {
    use super::Id;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Id>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => ser.serialize_i64(i64::from(id.0)),
            None => ser.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Id>, D::Error> {
        let raw = Option::<i64>::deserialize(de)?;
        Ok(match raw {
            Some(v) if (0..=i64::from(u32::MAX)).contains(&v) => Some(Id(v as u32)),
            _ => None,
        })
    }
}
