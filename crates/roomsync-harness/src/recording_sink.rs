//! Event sink that records what it is given.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use roomsync_core::{Envelope, EventFrame, EventKind};
use roomsync_server::{EventSink, SinkError};

/// Captures every frame. Clones share the same buffer, so keep one clone
/// in the test and hand the other to the hub.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<EventFrame>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    /// Empty, working sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write fail with [`SinkError::Closed`].
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Accept writes again.
    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Frames received so far.
    pub fn frames(&self) -> Vec<EventFrame> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Kinds of the frames received so far, in order.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.frames().iter().map(|f| f.kind).collect()
    }

    /// Decoded envelopes of the given kind. Frames that fail to decode are
    /// skipped.
    pub fn envelopes(&self, kind: EventKind) -> Vec<Envelope> {
        self.frames()
            .iter()
            .filter(|f| f.kind == kind)
            .filter_map(|f| f.envelope().ok())
            .collect()
    }

    /// Whether at least one frame of `kind` arrived.
    pub fn received(&self, kind: EventKind) -> bool {
        self.frames().iter().any(|f| f.kind == kind)
    }

    /// Forget everything received.
    pub fn clear(&self) {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl EventSink for RecordingSink {
    fn send(&self, frame: &EventFrame) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }

        self.frames.lock().unwrap_or_else(PoisonError::into_inner).push(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn frame(kind: EventKind) -> EventFrame {
        Envelope { kind, data: json!({}), timestamp: 1 }.encode().unwrap()
    }

    #[test]
    fn records_until_failing() {
        let sink = RecordingSink::new();
        sink.send(&frame(EventKind::Heartbeat)).unwrap();

        sink.fail();
        assert_eq!(sink.send(&frame(EventKind::ChatMessage)), Err(SinkError::Closed));

        sink.recover();
        sink.send(&frame(EventKind::UserJoined)).unwrap();

        assert_eq!(sink.kinds(), vec![EventKind::Heartbeat, EventKind::UserJoined]);
        assert_eq!(sink.envelopes(EventKind::UserJoined).len(), 1);
    }
}
