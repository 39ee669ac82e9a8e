//! Broadcast hub for feed fan-out
//!
//! The hub owns the replay buffer and the subscriber registry and routes
//! published events to every subscribed stream. It is a single serialized
//! actor: one task drains a bounded command channel, so the structures it
//! owns never need a lock.
//!
//! # Architecture
//!
//! ```text
//!                       Broadcaster task
//!                  ┌─────────────────────────┐
//!   publish ──────▶│ replay: ReplayBuffer    │
//!   subscribe ────▶│ subscribers: HashMap<   │
//!   unsubscribe ──▶│   id, SubscriberEntry { │
//!                  │     sink: mpsc::Sender, │
//!                  │   }                     │
//!                  │ >                       │
//!                  └───────────┬─────────────┘
//!                              │ try_send (never awaits)
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!     [stream writer]     [stream writer]     [stream writer]
//!     sink_rx.recv()      sink_rx.recv()      sink_rx.recv()
//!          │                   │                   │
//!          └──────────────▶ TLS write ◀────────────┘
//! ```
//!
//! # Zero-Copy Design
//!
//! A published event is encoded into its wire frame exactly once. The frame
//! is a `bytes::Bytes`, so fanning it out to N subscribers only bumps a
//! reference count; the frame body is never copied per subscriber.

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod event;
pub mod replay;

pub use broadcaster::{Broadcaster, BroadcasterHandle};
pub use config::HubConfig;
pub use error::HubError;
pub use event::{encode_frame, Event};
pub use replay::ReplayBuffer;
