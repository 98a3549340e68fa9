//! Identity types shared by every Driftnet layer.

use std::fmt;

/// A unique identifier for a remote participant.
///
/// Stable across reconnects — the same peer keeps the same id no matter
/// how many physical connections it opens. Supplied by the authentication
/// service; a connection has no `PeerId` until its handshake completes.
///
/// `PeerId(0)` is reserved: it is the handshake rejection sentinel and
/// never identifies a real peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u64);

impl PeerId {
    /// The reserved "no peer" value used as the handshake rejection reply.
    pub const NIL: PeerId = PeerId(0);

    /// Returns `true` for the reserved rejection sentinel.
    pub fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}
