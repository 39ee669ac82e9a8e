//! Per-connection and per-stream request pipelines

pub mod state;

pub(crate) mod multiplexed;
pub(crate) mod simple;

pub use state::{RequestOutcome, StreamPhase, StreamPipeline};
