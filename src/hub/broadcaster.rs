//! Broadcast actor and its handle
//!
//! The broadcaster is the single serialization point of the hub: one task
//! drains a bounded command channel and applies `Subscribe`, `Unsubscribe`
//! and `Publish` in arrival order. Only this task ever touches the replay
//! buffer and the subscriber registry, so neither needs a lock.
//!
//! The broadcaster never performs stream I/O. Each subscriber is reached
//! through a bounded `mpsc` sink drained by that stream's own writer task,
//! and every delivery uses `try_send`, so a slow peer can never stall the
//! publish path. A sink that stays full for `max_stall_cycles` consecutive
//! publish cycles is removed from the registry; a closed sink is removed
//! immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::stats::HubStats;

use super::config::HubConfig;
use super::error::HubError;
use super::event::{encode_frame, Event};
use super::replay::ReplayBuffer;

/// A command processed by the broadcaster task
enum Command {
    Subscribe { id: u64, sink: mpsc::Sender<Bytes> },
    Unsubscribe { id: u64 },
    Publish { payload: Bytes, timestamp: SystemTime },
}

/// Registry entry for one subscriber
struct SubscriberEntry {
    /// Back-reference to the owning stream's sink queue
    sink: mpsc::Sender<Bytes>,

    /// Consecutive publish cycles the sink was full
    stalled_cycles: u32,
}

/// The broadcast actor owning the replay buffer and subscriber registry
pub struct Broadcaster {
    replay: ReplayBuffer,
    subscribers: HashMap<u64, SubscriberEntry>,
    next_seq: u64,
    config: HubConfig,
    stats: Arc<HubStats>,
}

/// Clonable handle used to enqueue hub commands
///
/// Methods enqueue a command and return as soon as the bounded command
/// queue accepts it; they never wait for the broadcaster to process it.
#[derive(Clone)]
pub struct BroadcasterHandle {
    tx: mpsc::Sender<Command>,
    stats: Arc<HubStats>,
}

impl Broadcaster {
    /// Spawn the broadcaster task and return a handle to it
    pub fn spawn(config: HubConfig) -> BroadcasterHandle {
        let (tx, rx) = mpsc::channel(config.command_queue_capacity.max(1));
        let stats = Arc::new(HubStats::default());
        let broadcaster = Broadcaster::new(config, Arc::clone(&stats));
        tokio::spawn(broadcaster.run(rx));
        BroadcasterHandle { tx, stats }
    }

    fn new(config: HubConfig, stats: Arc<HubStats>) -> Self {
        Self {
            replay: ReplayBuffer::new(config.replay_capacity),
            subscribers: HashMap::new(),
            next_seq: 0,
            config,
            stats,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        tracing::debug!("broadcaster stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Subscribe { id, sink } => self.on_subscribe(id, sink),
            Command::Unsubscribe { id } => self.on_unsubscribe(id),
            Command::Publish { payload, timestamp } => self.on_publish(payload, timestamp),
        }
    }

    /// Register a subscriber, replaying buffered history into its sink
    /// before any later command is processed. A late joiner therefore sees
    /// a contiguous view: the full replay backlog, then every event
    /// published afterwards, with no gap and no duplicate.
    fn on_subscribe(&mut self, id: u64, sink: mpsc::Sender<Bytes>) {
        let mut replayed = 0usize;
        for event in self.replay.snapshot() {
            let frame = encode_frame(&event, &self.config.event_name);
            match sink.try_send(frame) {
                Ok(()) => replayed += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Sink queue smaller than the replay backlog; deliver
                    // what fits rather than rejecting the subscriber.
                    tracing::warn!(
                        subscriber_id = id,
                        replayed,
                        "subscriber sink cannot hold replay backlog; truncating"
                    );
                    break;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber_id = id, "subscriber gone before replay completed");
                    return;
                }
            }
        }

        self.subscribers.insert(
            id,
            SubscriberEntry {
                sink,
                stalled_cycles: 0,
            },
        );
        self.stats.record_subscriber_added();
        tracing::debug!(
            subscriber_id = id,
            replayed,
            subscribers = self.subscribers.len(),
            "subscriber added"
        );
    }

    /// Remove a subscriber; idempotent
    fn on_unsubscribe(&mut self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            self.stats.record_subscriber_removed();
            tracing::debug!(
                subscriber_id = id,
                subscribers = self.subscribers.len(),
                "subscriber removed"
            );
        }
    }

    /// Sequence an event, append it to the replay buffer and fan the
    /// encoded frame out to every registered sink
    fn on_publish(&mut self, payload: Bytes, timestamp: SystemTime) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let event = Event::new(seq, payload, timestamp);
        // Encode once; fan-out clones are reference-counted.
        let frame = encode_frame(&event, &self.config.event_name);
        self.replay.push(event);
        self.stats.record_published();

        let mut closed = Vec::new();
        let mut stalled_out = Vec::new();
        for (id, entry) in self.subscribers.iter_mut() {
            match entry.sink.try_send(frame.clone()) {
                Ok(()) => {
                    entry.stalled_cycles = 0;
                    self.stats.record_delivered();
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    entry.stalled_cycles += 1;
                    self.stats.record_skipped();
                    if entry.stalled_cycles >= self.config.max_stall_cycles {
                        stalled_out.push(*id);
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*id);
                }
            }
        }

        for id in closed {
            self.subscribers.remove(&id);
            self.stats.record_subscriber_removed();
            tracing::debug!(subscriber_id = id, "subscriber sink closed; removed");
        }
        for id in stalled_out {
            self.subscribers.remove(&id);
            self.stats.record_subscriber_removed();
            self.stats.record_slow_removal();
            tracing::warn!(
                subscriber_id = id,
                stall_cycles = self.config.max_stall_cycles,
                "subscriber persistently unwritable; removed"
            );
        }
    }
}

impl BroadcasterHandle {
    /// Register a subscriber sink under `id`
    ///
    /// The hub replays its buffered history into the sink before any
    /// subsequently published event reaches it.
    pub async fn subscribe(&self, id: u64, sink: mpsc::Sender<Bytes>) -> Result<(), HubError> {
        self.tx
            .send(Command::Subscribe { id, sink })
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Remove the subscriber registered under `id`; idempotent
    pub async fn unsubscribe(&self, id: u64) -> Result<(), HubError> {
        self.tx
            .send(Command::Unsubscribe { id })
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Publish a payload to every current subscriber
    ///
    /// The sequence number is assigned by the hub, not the caller.
    pub async fn publish(&self, payload: impl Into<Bytes>) -> Result<(), HubError> {
        self.tx
            .send(Command::Publish {
                payload: payload.into(),
                timestamp: SystemTime::now(),
            })
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Hub counters
    pub fn stats(&self) -> &HubStats {
        &self.stats
    }
}
