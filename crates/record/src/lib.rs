pub mod buffer;
pub mod style_diff;

pub use crate::buffer::{BufferConfig, CaptureContext, MutationBuffer, RawMutation};

use dom::Delta;

/// Receives each coalesced delta exactly once.
pub trait DeltaSink {
    fn emit(&mut self, delta: Delta);
}

impl<F: FnMut(Delta)> DeltaSink for F {
    fn emit(&mut self, delta: Delta) {
        self(delta)
    }
}

/// Collects emitted deltas; handy for tests and buffered transports.
#[derive(Debug, Default)]
pub struct CollectSink(pub Vec<Delta>);

impl DeltaSink for CollectSink {
    fn emit(&mut self, delta: Delta) {
        self.0.push(delta);
    }
}

/// The canvas sub-observer follows the buffer's freeze/lock transitions in
/// lockstep.
pub trait CanvasSink {
    fn freeze(&mut self) {}
    fn unfreeze(&mut self) {}
    fn lock(&mut self) {}
    fn unlock(&mut self) {}
    fn reset(&mut self) {}
}

pub struct NoopCanvasSink;

impl CanvasSink for NoopCanvasSink {}
