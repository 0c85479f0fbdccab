pub mod applier;
pub mod caches;
mod resolve;

pub use crate::applier::{Applier, ApplyError, Diagnostic, ReplayConfig, ReplayContext};
pub use crate::caches::SideCaches;
