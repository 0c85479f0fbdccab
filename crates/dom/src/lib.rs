pub mod mirror;
pub mod mutation;
pub mod node;
pub mod serialize;
#[cfg(any(test, feature = "tree-snapshot"))]
pub mod snapshot;
pub mod style;
pub mod tree;

pub use crate::mirror::{IdGen, Mirror};
pub use crate::mutation::{
    AddedNodeMutation, AttrValue, AttributeMutation, Delta, Id, RemovedNodeMutation, RuleEdit,
    SerializedKind, SerializedNode, StyleProp, TextMutation,
};
pub use crate::node::Node;
pub use crate::serialize::{AttachRegistrar, BlockPolicy, Masker, NoopRegistrar, Serializer};
pub use crate::style::StyleDeclaration;
pub use crate::tree::{ElementData, NodeKind, NodeRef, Tree, TreeError};
pub use core_types::DialogState;
