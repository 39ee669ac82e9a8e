//! Per-stream pipeline state machine
//!
//! Every logical stream gets a freshly constructed pipeline; pipelines are
//! never shared between streams, even on the same connection. The simple
//! variant runs exactly one pipeline for the whole connection.

use std::time::Instant;

use crate::protocol::request::Request;

/// Pipeline lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Created, not yet accepting a request
    Idle,
    /// Waiting for the peer's request
    AwaitingRequest,
    /// Subscription handshake done; hub drives all further output
    Subscribed,
    /// Stream finished; no further transitions
    Closed,
}

/// How a request on this pipeline is to be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Feed path and method match: perform the subscription handshake
    Subscribe,
    /// Unknown path: ordinary terminal response
    NotFound,
    /// Feed path with a non-GET method: ordinary terminal response
    MethodNotAllowed,
}

/// State for one logical stream's request pipeline
#[derive(Debug)]
pub struct StreamPipeline {
    /// Stream identifier within the owning connection
    pub id: u32,

    /// Current phase
    pub phase: StreamPhase,

    /// Hub subscriber id, present only while `Subscribed`
    subscriber_id: Option<u64>,

    /// When the pipeline was created
    pub opened_at: Instant,
}

impl StreamPipeline {
    /// Create a pipeline for stream `id`
    pub fn new(id: u32) -> Self {
        Self {
            id,
            phase: StreamPhase::Idle,
            subscriber_id: None,
            opened_at: Instant::now(),
        }
    }

    /// Begin waiting for the peer's request
    pub fn open(&mut self) {
        if self.phase == StreamPhase::Idle {
            self.phase = StreamPhase::AwaitingRequest;
        }
    }

    /// Classify a parsed request against the feed path
    pub fn classify(request: &Request, feed_path: &str) -> RequestOutcome {
        if request.path != feed_path {
            RequestOutcome::NotFound
        } else if request.method != "GET" {
            RequestOutcome::MethodNotAllowed
        } else {
            RequestOutcome::Subscribe
        }
    }

    /// Record a completed subscription handshake
    pub fn subscribed(&mut self, subscriber_id: u64) {
        if self.phase == StreamPhase::AwaitingRequest {
            self.phase = StreamPhase::Subscribed;
            self.subscriber_id = Some(subscriber_id);
        }
    }

    /// Record a terminal (non-subscription) response
    pub fn responded(&mut self) {
        if self.phase == StreamPhase::AwaitingRequest {
            self.phase = StreamPhase::Closed;
        }
    }

    /// Close the pipeline, yielding the subscriber id to unregister
    ///
    /// Idempotent: the id is handed out at most once, so the caller
    /// unsubscribes exactly once no matter how many times close runs.
    pub fn close(&mut self) -> Option<u64> {
        self.phase = StreamPhase::Closed;
        self.subscriber_id.take()
    }

    /// Whether the pipeline reached its terminal phase
    pub fn is_closed(&self) -> bool {
        self.phase == StreamPhase::Closed
    }

    /// Whether a subscription is currently active
    pub fn is_subscribed(&self) -> bool {
        self.phase == StreamPhase::Subscribed
    }
}
