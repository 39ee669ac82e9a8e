//! Hub configuration

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Number of recent events kept for late-joiner replay (0 disables replay)
    pub replay_capacity: usize,

    /// Bound of each subscriber's sink queue
    ///
    /// Should be at least `replay_capacity`, otherwise part of the replay
    /// backlog is dropped for subscribers that cannot drain fast enough.
    pub subscriber_queue_capacity: usize,

    /// Bound of the hub command queue
    pub command_queue_capacity: usize,

    /// Consecutive publish cycles a subscriber's queue may be full before
    /// the subscriber is forcibly removed
    pub max_stall_cycles: u32,

    /// Event-type name written on the `event:` line of every frame
    pub event_name: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            replay_capacity: 64,
            subscriber_queue_capacity: 256,
            command_queue_capacity: 1024,
            max_stall_cycles: 8,
            event_name: "tick".to_string(),
        }
    }
}

impl HubConfig {
    /// Set the replay buffer capacity
    pub fn replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = capacity;
        self
    }

    /// Set the per-subscriber sink queue bound (minimum 1)
    pub fn subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity.max(1);
        self
    }

    /// Set the command queue bound (minimum 1)
    pub fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity.max(1);
        self
    }

    /// Set the slow-subscriber removal threshold (minimum 1)
    pub fn max_stall_cycles(mut self, cycles: u32) -> Self {
        self.max_stall_cycles = cycles.max(1);
        self
    }

    /// Set the event-type name used in wire frames
    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }
}
