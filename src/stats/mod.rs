//! Statistics for server and hub activity

pub mod metrics;

pub use metrics::{HubStats, ServerStats};
