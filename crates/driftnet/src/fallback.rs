//! The legacy peer-to-peer path.
//!
//! When no dedicated session exists for a peer, the facade routes the
//! operation to whatever peer-to-peer stack the game was originally built
//! on. [`PeerToPeer`] mirrors that API one-for-one — boolean results and
//! all — so an adapter over the real thing is a mechanical wrapper.

use driftnet_transport::SendMode;
use driftnet_wire::PeerId;

/// Connectivity details for a legacy peer-to-peer session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct P2pSessionState {
    /// An active session exists and can carry packets.
    pub connection_active: bool,
    /// A session is still being established.
    pub connecting: bool,
    /// Traffic is flowing through a relay rather than directly.
    pub using_relay: bool,
}

/// The legacy peer-to-peer networking surface.
///
/// Semantics match the original API: operations report success as `bool`,
/// reads are non-blocking, and unknown peers simply yield `false`/`None`.
pub trait PeerToPeer {
    /// Sends a packet to a peer over the peer-to-peer path.
    fn send(
        &mut self,
        peer: PeerId,
        payload: &[u8],
        mode: SendMode,
        channel: u8,
    ) -> bool;

    /// Peeks the size of the next packet on `channel`, if any.
    fn packet_available(&mut self, channel: u8) -> Option<usize>;

    /// Dequeues the next packet on `channel` and its sender.
    fn read_packet(&mut self, channel: u8) -> Option<(Vec<u8>, PeerId)>;

    /// Closes the session with a peer. Returns `false` if none existed.
    fn close_session(&mut self, peer: PeerId) -> bool;

    /// Accepts an incoming session request from a peer.
    fn accept_session(&mut self, peer: PeerId) -> bool;

    /// Queries connectivity details for a peer's session.
    fn session_state(&mut self, peer: PeerId) -> Option<P2pSessionState>;

    /// Enables or disables relayed delivery. Returns the previous setting.
    fn allow_relay(&mut self, allow: bool) -> bool;
}

/// A [`PeerToPeer`] stub for hosts with no legacy stack at all: every
/// query reports absence and every send fails.
#[derive(Debug, Default)]
pub struct NoPeerToPeer {
    relay: bool,
}

impl NoPeerToPeer {
    /// Creates the stub.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerToPeer for NoPeerToPeer {
    fn send(
        &mut self,
        peer: PeerId,
        _payload: &[u8],
        _mode: SendMode,
        _channel: u8,
    ) -> bool {
        tracing::debug!(%peer, "no legacy path configured, dropping send");
        false
    }

    fn packet_available(&mut self, _channel: u8) -> Option<usize> {
        None
    }

    fn read_packet(&mut self, _channel: u8) -> Option<(Vec<u8>, PeerId)> {
        None
    }

    fn close_session(&mut self, _peer: PeerId) -> bool {
        false
    }

    fn accept_session(&mut self, _peer: PeerId) -> bool {
        false
    }

    fn session_state(&mut self, _peer: PeerId) -> Option<P2pSessionState> {
        None
    }

    fn allow_relay(&mut self, allow: bool) -> bool {
        std::mem::replace(&mut self.relay, allow)
    }
}
