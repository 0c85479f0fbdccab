//! Capture and replay of incremental DOM mutations.
//!
//! The capture side observes host-tree changes, coalesces one cycle of them
//! into a [`Delta`] and hands it to a sink; the replay side applies deltas
//! to a mirrored tree, keeping node identity stable across the wire. The
//! crates split along that seam: `record` produces deltas, `replay`
//! consumes them, `dom` holds the tree, the identity map and the wire
//! protocol they share.

pub use core_types::{DeltaSeq, DialogState, SessionId, TreeScope};
pub use dom::mutation::{
    AddedNodeMutation, AttrValue, AttributeMutation, Delta, Id, RemovedNodeMutation, RuleEdit,
    SerializedKind, SerializedNode, StyleProp, TextMutation,
};
pub use dom::serialize::{AttachRegistrar, BlockPolicy, Masker, NoopRegistrar, Serializer};
pub use dom::tree::{NodeRef, Tree, TreeError};
pub use dom::{IdGen, Mirror, Node};
pub use record::{
    BufferConfig, CanvasSink, CaptureContext, CollectSink, DeltaSink, MutationBuffer,
    NoopCanvasSink, RawMutation,
};
pub use replay::{Applier, ApplyError, Diagnostic, ReplayConfig, ReplayContext};
