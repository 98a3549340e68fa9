//! The peer table: authenticated sessions and their inbound queues.
//!
//! Both channel variants store their sessions here. Invariants the table
//! maintains at every public-method boundary:
//!
//! - a peer identity maps to at most one live connection handle;
//! - handle → peer and peer → handle lookups always agree;
//! - queues exist only for peers with a table entry, and die with it
//!   (unflushed contents are discarded — there is no graceful drain).
//!
//! Queues are created lazily on the first frame for a (peer, channel)
//! pair. Cross-peer operations iterate in `PeerId` order, so "the first
//! non-empty queue" is deterministic.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use driftnet_transport::ConnectionHandle;
use driftnet_wire::PeerId;

use crate::SessionError;

/// Per-peer state: the live connection and one FIFO queue per channel.
struct PeerEntry {
    connection: ConnectionHandle,
    /// Lazily sized to `channel_count` on first enqueue.
    queues: Vec<VecDeque<Vec<u8>>>,
}

/// Bidirectional handle ↔ identity mapping with per-peer per-channel
/// inbound queues.
pub struct PeerTable {
    peers: BTreeMap<PeerId, PeerEntry>,
    by_handle: BTreeMap<ConnectionHandle, PeerId>,
    channel_count: u8,
}

impl PeerTable {
    /// Creates an empty table for endpoints with `channel_count` logical
    /// channels.
    pub fn new(channel_count: u8) -> Self {
        Self {
            peers: BTreeMap::new(),
            by_handle: BTreeMap::new(),
            channel_count,
        }
    }

    /// Number of logical channels this endpoint supports.
    pub fn channel_count(&self) -> u8 {
        self.channel_count
    }

    /// Binds `peer` to `connection`.
    ///
    /// If the peer already had a live connection, the old binding (and its
    /// queues) is dropped and the displaced handle returned so the caller
    /// can close it — a peer identity never maps to two handles at once.
    pub fn insert(
        &mut self,
        peer: PeerId,
        connection: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let displaced = self.remove_peer(peer);
        self.by_handle.insert(connection, peer);
        self.peers.insert(
            peer,
            PeerEntry {
                connection,
                queues: Vec::new(),
            },
        );
        tracing::info!(%peer, %connection, "session established");
        displaced
    }

    /// Removes a peer's session, discarding its queues. Returns the handle
    /// that was bound, if any.
    pub fn remove_peer(&mut self, peer: PeerId) -> Option<ConnectionHandle> {
        let entry = self.peers.remove(&peer)?;
        self.by_handle.remove(&entry.connection);
        tracing::info!(%peer, connection = %entry.connection, "session removed");
        Some(entry.connection)
    }

    /// Removes the session bound to `connection`, discarding its queues.
    /// Returns the peer that owned it, if any.
    pub fn remove_connection(
        &mut self,
        connection: ConnectionHandle,
    ) -> Option<PeerId> {
        let peer = self.by_handle.remove(&connection)?;
        self.peers.remove(&peer);
        tracing::info!(%peer, %connection, "session removed");
        Some(peer)
    }

    /// Looks up the live connection for a peer.
    pub fn handle_for(&self, peer: PeerId) -> Option<ConnectionHandle> {
        self.peers.get(&peer).map(|entry| entry.connection)
    }

    /// Looks up the authenticated identity behind a connection.
    pub fn peer_for(&self, connection: ConnectionHandle) -> Option<PeerId> {
        self.by_handle.get(&connection).copied()
    }

    /// Returns `true` if the peer has a live session.
    pub fn contains_peer(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Every live connection handle, in peer order.
    pub fn connections(&self) -> Vec<ConnectionHandle> {
        self.peers.values().map(|entry| entry.connection).collect()
    }

    /// Appends a received payload to a peer's channel queue.
    ///
    /// # Errors
    /// Returns [`SessionError::ChannelOutOfRange`] if `channel` has no
    /// queue, and [`SessionError::NoSession`] if the peer isn't in the
    /// table (both are caller bookkeeping errors; the frame is dropped).
    pub fn enqueue(
        &mut self,
        peer: PeerId,
        channel: u8,
        payload: Vec<u8>,
    ) -> Result<(), SessionError> {
        if channel >= self.channel_count {
            return Err(SessionError::ChannelOutOfRange {
                channel,
                channel_count: self.channel_count,
            });
        }
        let entry = self
            .peers
            .get_mut(&peer)
            .ok_or(SessionError::NoSession(peer))?;
        if entry.queues.is_empty() {
            entry.queues = vec![VecDeque::new(); self.channel_count as usize];
        }
        entry.queues[channel as usize].push_back(payload);
        Ok(())
    }

    /// Peeks the first non-empty queue for `channel` across all peers,
    /// returning the size of its head message. Nothing is removed.
    pub fn available(&self, channel: u8) -> Option<usize> {
        self.peers
            .values()
            .filter_map(|entry| entry.queues.get(channel as usize))
            .find_map(|queue| queue.front().map(Vec::len))
    }

    /// Dequeues the oldest message from the first non-empty queue for
    /// `channel`, together with the identity that sent it.
    pub fn pop(&mut self, channel: u8) -> Option<(PeerId, Vec<u8>)> {
        self.peers.iter_mut().find_map(|(&peer, entry)| {
            entry
                .queues
                .get_mut(channel as usize)
                .and_then(VecDeque::pop_front)
                .map(|payload| (peer, payload))
        })
    }
}
