//! Transport abstraction layer for Driftnet.
//!
//! Provides the [`Transport`] trait that abstracts over the underlying
//! message-oriented connection library: connect/listen/accept primitives,
//! message-batch receives, poll groups, and a status-event pump. The
//! channel state machines above this crate never touch sockets directly —
//! they drive a `Transport` and react to the [`TransportEvent`]s it emits.
//!
//! The trait is deliberately synchronous and poll-based: the whole stack
//! runs on the single thread that calls the facade's `tick()`, and no
//! method here is allowed to block waiting for network input. Reliability
//! and congestion control belong to the implementation behind the trait.
//!
//! # Feature Flags
//!
//! - `memory` (default) — [`MemoryTransport`], a deterministic in-process
//!   loopback implementation used by tests and local development.

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{MemoryHub, MemoryTransport};

use std::fmt;

/// Opaque identifier for one physical connection.
///
/// Assigned by the transport on connect/accept; not meaningful across
/// process restarts. Owned by exactly one channel state machine for its
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    /// Creates a `ConnectionHandle` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opaque identifier for a listen socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenHandle(u64);

impl ListenHandle {
    /// Creates a `ListenHandle` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ListenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listen-{}", self.0)
    }
}

/// Opaque identifier for a poll group: a set of connections whose inbound
/// messages are drained together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollGroup(u64);

impl PollGroup {
    /// Creates a `PollGroup` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PollGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poll-{}", self.0)
    }
}

/// Delivery guarantee requested for an outbound message.
///
/// Mirrors the four legacy peer-to-peer send flags one-for-one so the
/// facade can pass the caller's choice straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Delivered, in order. The handshake always uses this.
    Reliable,
    /// Delivered, in order, with sender-side batching allowed.
    ReliableBuffered,
    /// Best-effort.
    Unreliable,
    /// Best-effort, bypassing any nagle-style delay.
    UnreliableNoDelay,
}

impl SendMode {
    /// Returns `true` for modes with no delivery guarantee.
    pub fn is_unreliable(self) -> bool {
        matches!(self, Self::Unreliable | Self::UnreliableNoDelay)
    }
}

/// Why a connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote side closed the connection.
    ClosedByPeer,
    /// The transport detected a problem (timeout, reset, ...).
    Error,
}

/// A connection status change, reported by [`Transport::poll_events`].
///
/// The analog of the connection-status callback in callback-driven
/// transport libraries: the implementation queues status changes and the
/// host drains them once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// An inbound connection attempt arrived on a listen socket. The
    /// receiver decides whether to [`Transport::accept`] it.
    Connecting { connection: ConnectionHandle },
    /// The connection is established and can carry messages.
    Connected { connection: ConnectionHandle },
    /// The connection is gone. The handle is dead after this event.
    Closed {
        connection: ConnectionHandle,
        reason: DisconnectReason,
    },
}

/// A complete inbound message and the connection it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// The connection the message arrived on.
    pub connection: ConnectionHandle,
    /// The raw message bytes, exactly as sent (framing included).
    pub payload: Vec<u8>,
}

/// A connection-oriented, message-oriented transport.
///
/// All methods are non-blocking: receives return whatever is already
/// queued, `poll_events` drains already-recorded status changes, and
/// `connect` only *initiates* a connection (establishment is reported
/// later via [`TransportEvent::Connected`]).
pub trait Transport {
    /// Initiates an outbound connection to `addr`.
    ///
    /// # Errors
    /// Returns an error only for immediately-detectable failures (bad
    /// address, nothing listening in loopback transports); network-level
    /// failures surface later as a [`TransportEvent::Closed`].
    fn connect(&mut self, addr: &str) -> Result<ConnectionHandle, TransportError>;

    /// Opens a listen socket on `addr`.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound.
    fn listen(&mut self, addr: &str) -> Result<ListenHandle, TransportError>;

    /// Creates a poll group for batched receives across connections.
    fn create_poll_group(&mut self) -> PollGroup;

    /// Assigns a connection to a poll group.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidHandle`] for an unknown connection.
    fn set_poll_group(
        &mut self,
        group: PollGroup,
        connection: ConnectionHandle,
    ) -> Result<(), TransportError>;

    /// Accepts an inbound connection previously reported as
    /// [`TransportEvent::Connecting`].
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] if the connection is no
    /// longer pending (e.g. the remote side already gave up).
    fn accept(&mut self, connection: ConnectionHandle) -> Result<(), TransportError>;

    /// Sends one message on an established connection.
    ///
    /// # Errors
    /// Returns [`TransportError::NotConnected`] before establishment and
    /// [`TransportError::ConnectionClosed`] afterwards.
    fn send(
        &mut self,
        connection: ConnectionHandle,
        payload: &[u8],
        mode: SendMode,
    ) -> Result<(), TransportError>;

    /// Drains up to `max` queued inbound messages from one connection.
    fn receive_on_connection(
        &mut self,
        connection: ConnectionHandle,
        max: usize,
    ) -> Vec<InboundMessage>;

    /// Drains up to `max` queued inbound messages across a poll group.
    fn receive_on_poll_group(
        &mut self,
        group: PollGroup,
        max: usize,
    ) -> Vec<InboundMessage>;

    /// Drains all pending connection status changes.
    fn poll_events(&mut self) -> Vec<TransportEvent>;

    /// Closes a connection. Idempotent; unknown handles are ignored.
    fn close(&mut self, connection: ConnectionHandle);

    /// Closes a listen socket. New connection attempts to its address fail.
    fn close_listen(&mut self, listen: ListenHandle);

    /// Destroys a poll group. Member connections stay open but are no
    /// longer drained by group receives.
    fn destroy_poll_group(&mut self, group: PollGroup);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display_formats() {
        assert_eq!(ConnectionHandle::new(7).to_string(), "conn-7");
        assert_eq!(ListenHandle::new(3).to_string(), "listen-3");
        assert_eq!(PollGroup::new(1).to_string(), "poll-1");
    }

    #[test]
    fn test_connection_handle_roundtrip() {
        assert_eq!(ConnectionHandle::new(42).into_inner(), 42);
    }

    #[test]
    fn test_send_mode_reliability() {
        assert!(!SendMode::Reliable.is_unreliable());
        assert!(!SendMode::ReliableBuffered.is_unreliable());
        assert!(SendMode::Unreliable.is_unreliable());
        assert!(SendMode::UnreliableNoDelay.is_unreliable());
    }

    #[test]
    fn test_connection_handle_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionHandle::new(1), "alice");
        map.insert(ConnectionHandle::new(2), "bob");
        assert_eq!(map[&ConnectionHandle::new(1)], "alice");
    }
}
