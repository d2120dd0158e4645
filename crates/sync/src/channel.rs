use chrono::NaiveDate;
use core::fmt::{self, Display};
use core::num::NonZeroI64;
use dashmap::DashMap;
use model::Envelope;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Frames buffered per topic before slow subscribers start lagging.
const TOPIC_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum TransportError {
    /// The link is down right now. Frames published meanwhile are dropped,
    /// not queued: the local store already holds the write and the next
    /// hydrate reconciles the peers.
    Disconnected,
}

impl Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("realtime transport disconnected"),
        }
    }
}

/// Raw pub/sub link between open views of the same class day. Injected so
/// tests (and same-process views) run against [`LocalBus`] while
/// production wires a relay-backed implementation.
pub trait Transport: Send + Sync + 'static {
    /// Deliver one frame to every current subscriber of `topic`.
    fn publish(&self, topic: &str, frame: &[u8]) -> Result<(), TransportError>;
    /// Open a subscription. Nothing is replayed on (re)subscribe; there is
    /// no server-side buffering to lean on.
    fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Box<[u8]>>, TransportError>;
}

/// In-process [`Transport`]: a registry of topics fanning frames out over
/// broadcast channels.
#[derive(Default)]
pub struct LocalBus {
    topics: DashMap<Box<str>, broadcast::Sender<Box<[u8]>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for LocalBus {
    fn publish(&self, topic: &str, frame: &[u8]) -> Result<(), TransportError> {
        if let Some(tx) = self.topics.get(topic) {
            // No subscribers is not a failure; the frame simply had no
            // audience.
            let _ = tx.send(frame.into());
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Box<[u8]>>, TransportError> {
        let tx = self
            .topics
            .entry(topic.into())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0);
        Ok(tx.subscribe())
    }
}

/// One view's handle on the pub/sub link for its `(class, date)` topic.
pub struct Channel {
    transport: Arc<dyn Transport>,
    topic: Box<str>,
}

impl Channel {
    pub fn new(transport: Arc<dyn Transport>, class_id: NonZeroI64, date: NaiveDate) -> Self {
        Self { transport, topic: format!("assignments:{class_id}:{date}").into() }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Broadcast a local mutation to the other viewers. Failures are
    /// logged and the frame is dropped; correctness never depends on
    /// delivery.
    pub fn publish(&self, envelope: &Envelope) {
        let frame = match serde_json::to_vec(envelope) {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("unencodable frame for {}: {err}", self.topic);
                return;
            }
        };
        if let Err(err) = self.transport.publish(&self.topic, &frame) {
            log::warn!("dropped frame for {}: {err}", self.topic);
        }
    }

    pub fn subscribe(&self) -> Result<broadcast::Receiver<Box<[u8]>>, TransportError> {
        self.transport.subscribe(&self.topic)
    }
}

/// Decode one inbound frame. Malformed frames are dropped with a log line
/// rather than surfaced; a single bad peer must not take the view down.
pub fn decode(topic: &str, frame: &[u8]) -> Option<Envelope> {
    match serde_json::from_slice(frame) {
        Ok(envelope) => Some(envelope),
        Err(err) => {
            log::warn!("dropped malformed frame on {topic}: {err}");
            None
        }
    }
}
