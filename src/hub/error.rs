//! Hub error types

/// Error type for hub operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The broadcaster task has stopped and no longer accepts commands
    #[error("broadcaster is no longer running")]
    Closed,
}
