//! Live event fan-out.
//!
//! The distributor keeps one live connection per user and pushes serialized
//! envelopes to them. It never looks at payloads.
//!
//! # Handles
//!
//! [`EventDistributor::connect`] returns a [`ConnectionHandle`] compared by
//! identity, not by user. Only the exact handle that is registered may
//! deregister itself, so cleanup of an old connection cannot evict a newer
//! one installed by a reconnect.
//!
//! # Failure isolation
//!
//! Sinks are written outside the registry lock using a snapshot of handles.
//! A failed write deregisters that one handle (if it is still current) and
//! never stops delivery to the remaining recipients.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use roomsync_core::{Envelope, Environment, EventFrame, EventKind, UserId};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{error::DeliveryError, sync};

/// Why a sink refused a frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The receiving side is gone
    #[error("connection closed")]
    Closed,
    /// The receiver is not draining its buffer
    #[error("outbound buffer full")]
    Full,
}

/// Write side of one live connection.
///
/// `send` must not block: it runs on the path of room-mutating calls.
pub trait EventSink: Send + Sync {
    /// Queue one frame for the client.
    fn send(&self, frame: &EventFrame) -> Result<(), SinkError>;
}

/// Sink feeding a bounded Tokio channel drained by the transport task.
///
/// A full buffer counts as a failed write: the client is not keeping up and
/// will resync through the operation log after reconnecting.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<EventFrame>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EventFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn send(&self, frame: &EventFrame) -> Result<(), SinkError> {
        self.tx.try_send(frame.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

struct Connection {
    id: u64,
    user: UserId,
    sink: Box<dyn EventSink>,
}

/// Identity of one registered connection.
#[derive(Clone)]
pub struct ConnectionHandle(Arc<Connection>);

impl ConnectionHandle {
    /// User this connection belongs to.
    pub fn user(&self) -> &UserId {
        &self.0.user
    }

    /// Process-unique connection number.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    fn send(&self, frame: &EventFrame) -> Result<(), SinkError> {
        self.0.sink.send(frame)
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.0.id)
            .field("user", &self.0.user)
            .finish()
    }
}

/// Per-recipient outcome of a fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients whose sink accepted the frame
    pub delivered: Vec<UserId>,
    /// Failed writes; those recipients have been deregistered
    pub failed: Vec<DeliveryError>,
}

impl DeliveryReport {
    /// Recipients whose write failed.
    pub fn failed_users(&self) -> Vec<UserId> {
        self.failed.iter().filter_map(DeliveryError::user).cloned().collect()
    }
}

/// Registry of live connections and the fan-out over it.
pub struct EventDistributor<E: Environment> {
    env: E,
    next_id: AtomicU64,
    connections: Mutex<HashMap<UserId, ConnectionHandle>>,
}

impl<E: Environment> EventDistributor<E> {
    /// Create an empty registry.
    pub fn new(env: E) -> Self {
        Self { env, next_id: AtomicU64::new(1), connections: Mutex::new(HashMap::new()) }
    }

    /// Register `sink` as the live connection for `user`, replacing any
    /// previous one.
    pub fn connect(&self, user: &UserId, sink: impl EventSink + 'static) -> ConnectionHandle {
        let handle = ConnectionHandle(Arc::new(Connection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user: user.clone(),
            sink: Box::new(sink),
        }));

        let replaced = sync::lock(&self.connections).insert(user.clone(), handle.clone());
        match replaced {
            Some(old) => {
                tracing::info!(
                    user = %user,
                    old = old.id(),
                    new = handle.id(),
                    "connection replaced"
                );
            },
            None => tracing::info!(user = %user, connection = handle.id(), "connection registered"),
        }

        handle
    }

    /// Deregister `handle` if it is still the user's current connection.
    ///
    /// Returns `false` when a newer connection has taken its place.
    pub fn disconnect(&self, handle: &ConnectionHandle) -> bool {
        let removed = self.remove_if_current(handle);
        if removed {
            tracing::info!(user = %handle.user(), connection = handle.id(), "connection closed");
        } else {
            tracing::debug!(
                user = %handle.user(),
                connection = handle.id(),
                "stale connection closed, newer one kept"
            );
        }
        removed
    }

    fn remove_if_current(&self, handle: &ConnectionHandle) -> bool {
        let mut connections = sync::lock(&self.connections);
        if connections.get(handle.user()) == Some(handle) {
            connections.remove(handle.user());
            true
        } else {
            false
        }
    }

    /// Whether `user` has a live connection.
    pub fn is_connected(&self, user: &UserId) -> bool {
        sync::lock(&self.connections).contains_key(user)
    }

    /// Whether `handle` is its user's current connection.
    pub fn is_current(&self, handle: &ConnectionHandle) -> bool {
        sync::lock(&self.connections).get(handle.user()) == Some(handle)
    }

    /// Users with a live connection, sorted.
    pub fn connected_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = sync::lock(&self.connections).keys().cloned().collect();
        users.sort();
        users
    }

    fn frame(&self, kind: EventKind, payload: &Value) -> Result<EventFrame, DeliveryError> {
        Envelope { kind, data: payload.clone(), timestamp: self.env.wall_clock_secs() }
            .encode()
            .map_err(|e| DeliveryError::Encode(e.to_string()))
    }

    /// Write to one handle; on failure deregister it.
    fn deliver(&self, handle: &ConnectionHandle, frame: &EventFrame) -> Result<(), DeliveryError> {
        handle.send(frame).map_err(|e| {
            self.remove_if_current(handle);
            tracing::debug!(
                user = %handle.user(),
                connection = handle.id(),
                event = %frame.kind,
                error = %e,
                "delivery failed, connection dropped"
            );
            DeliveryError::SendFailed { user: handle.user().clone(), reason: e.to_string() }
        })
    }

    /// Push one event to `user`.
    pub fn unicast(
        &self,
        user: &UserId,
        kind: EventKind,
        payload: &Value,
    ) -> Result<(), DeliveryError> {
        let handle = sync::lock(&self.connections)
            .get(user)
            .cloned()
            .ok_or_else(|| DeliveryError::NotConnected(user.clone()))?;

        let frame = self.frame(kind, payload)?;
        self.deliver(&handle, &frame)
    }

    /// Push one event to every connected user in `users` except `exclude`.
    ///
    /// Users without a live connection are skipped silently; they catch up
    /// through the operation log.
    pub fn multicast(
        &self,
        users: &[UserId],
        kind: EventKind,
        payload: &Value,
        exclude: Option<&UserId>,
    ) -> DeliveryReport {
        let handles: Vec<ConnectionHandle> = {
            let connections = sync::lock(&self.connections);
            users
                .iter()
                .filter(|user| Some(*user) != exclude)
                .filter_map(|user| connections.get(user).cloned())
                .collect()
        };

        self.fan_out(&handles, kind, payload)
    }

    /// Push one event to every connected user.
    pub fn broadcast(&self, kind: EventKind, payload: &Value) -> DeliveryReport {
        let handles: Vec<ConnectionHandle> =
            sync::lock(&self.connections).values().cloned().collect();

        self.fan_out(&handles, kind, payload)
    }

    fn fan_out(
        &self,
        handles: &[ConnectionHandle],
        kind: EventKind,
        payload: &Value,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if handles.is_empty() {
            return report;
        }

        let frame = match self.frame(kind, payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(event = %kind, error = %e, "event encoding failed");
                report.failed.push(e);
                return report;
            },
        };

        for handle in handles {
            match self.deliver(handle, &frame) {
                Ok(()) => report.delivered.push(handle.user().clone()),
                Err(e) => report.failed.push(e),
            }
        }
        report
    }

    /// Liveness probe. A failed heartbeat drops the connection like any
    /// failed write.
    pub fn heartbeat(&self, user: &UserId) -> Result<(), DeliveryError> {
        let payload = json!({ "timestamp": self.env.wall_clock_secs() });
        self.unicast(user, EventKind::Heartbeat, &payload)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicBool, time::Duration};

    use super::*;

    #[derive(Clone)]
    struct Clock;

    impl Environment for Clock {
        fn wall_clock_secs(&self) -> u64 {
            42
        }

        async fn sleep(&self, _duration: Duration) {}
    }

    /// Records frames; fails every write once `broken` is set.
    #[derive(Clone, Default)]
    struct TestSink {
        frames: Arc<Mutex<Vec<EventFrame>>>,
        broken: Arc<AtomicBool>,
    }

    impl TestSink {
        fn kinds(&self) -> Vec<EventKind> {
            self.frames.lock().unwrap().iter().map(|f| f.kind).collect()
        }

        fn break_it(&self) {
            self.broken.store(true, Ordering::SeqCst);
        }
    }

    impl EventSink for TestSink {
        fn send(&self, frame: &EventFrame) -> Result<(), SinkError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(SinkError::Closed);
            }
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    fn user(n: u32) -> UserId {
        UserId::new(format!("user_{n}"))
    }

    #[test]
    fn unicast_wraps_envelope() {
        let dist = EventDistributor::new(Clock);
        let sink = TestSink::default();
        dist.connect(&user(1), sink.clone());

        dist.unicast(&user(1), EventKind::UserInvited, &json!({"inviteId": "invite_1"})).unwrap();

        let frames = sink.frames.lock().unwrap();
        let envelope = frames[0].envelope().unwrap();
        assert_eq!(envelope.kind, EventKind::UserInvited);
        assert_eq!(envelope.timestamp, 42);
        assert_eq!(envelope.data["inviteId"], "invite_1");
    }

    #[test]
    fn unicast_to_absent_user_fails() {
        let dist = EventDistributor::new(Clock);
        let err = dist.unicast(&user(1), EventKind::Heartbeat, &json!({})).unwrap_err();
        assert_eq!(err, DeliveryError::NotConnected(user(1)));
    }

    #[test]
    fn failed_unicast_removes_connection() {
        let dist = EventDistributor::new(Clock);
        let sink = TestSink::default();
        dist.connect(&user(1), sink.clone());
        sink.break_it();

        let err = dist.heartbeat(&user(1)).unwrap_err();
        assert!(matches!(err, DeliveryError::SendFailed { .. }));
        assert!(!dist.is_connected(&user(1)));
    }

    #[test]
    fn multicast_isolates_failures_and_honors_exclude() {
        let dist = EventDistributor::new(Clock);
        let sinks: Vec<TestSink> = (0..4).map(|_| TestSink::default()).collect();
        for (i, sink) in sinks.iter().enumerate() {
            dist.connect(&user(i as u32), sink.clone());
        }
        sinks[1].break_it();

        let members: Vec<UserId> = (0..4).map(user).collect();
        let report = dist.multicast(&members, EventKind::ChatMessage, &json!({}), Some(&user(3)));

        assert_eq!(report.delivered, vec![user(0), user(2)]);
        assert_eq!(report.failed_users(), vec![user(1)]);
        assert!(!dist.is_connected(&user(1)));
        assert!(dist.is_connected(&user(3)));
        assert!(sinks[3].kinds().is_empty());
    }

    #[test]
    fn stale_handle_cannot_evict_reconnect() {
        let dist = EventDistributor::new(Clock);
        let old = dist.connect(&user(1), TestSink::default());
        let new = dist.connect(&user(1), TestSink::default());

        assert_ne!(old, new);
        assert!(!dist.is_current(&old));
        assert!(!dist.disconnect(&old));
        assert!(dist.is_connected(&user(1)));

        assert!(dist.disconnect(&new));
        assert!(!dist.is_connected(&user(1)));
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let dist = EventDistributor::new(Clock);
        let a = TestSink::default();
        let b = TestSink::default();
        dist.connect(&user(1), a.clone());
        dist.connect(&user(2), b.clone());

        let report = dist.broadcast(EventKind::UserCreated, &json!({"id": "user_3"}));
        assert_eq!(report.delivered.len(), 2);
        assert_eq!(a.kinds(), vec![EventKind::UserCreated]);
        assert_eq!(b.kinds(), vec![EventKind::UserCreated]);
    }

    #[test]
    fn connected_users_tracks_live_handles() {
        let dist = EventDistributor::new(Clock);
        let second = dist.connect(&user(2), TestSink::default());
        dist.connect(&user(1), TestSink::default());
        assert_eq!(dist.connected_users(), vec![user(1), user(2)]);

        assert!(dist.disconnect(&second));
        assert_eq!(dist.connected_users(), vec![user(1)]);
    }

    #[tokio::test]
    async fn channel_sink_reports_full_and_closed() {
        let (sink, mut rx) = ChannelSink::channel(1);
        let frame = Envelope { kind: EventKind::Heartbeat, data: json!({}), timestamp: 1 }
            .encode()
            .unwrap();

        sink.send(&frame).unwrap();
        assert_eq!(sink.send(&frame), Err(SinkError::Full));

        assert_eq!(rx.recv().await.unwrap(), frame);
        drop(rx);
        assert_eq!(sink.send(&frame), Err(SinkError::Closed));
    }
}
