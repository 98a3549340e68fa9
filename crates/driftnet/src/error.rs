//! Unified error type for the Driftnet facade.

use driftnet_session::SessionError;
use driftnet_transport::TransportError;
use driftnet_wire::{PeerId, WireError};

/// Top-level error that wraps all layer-specific errors.
///
/// Callers of the `driftnet` crate deal with this single type; the
/// `#[from]` variants let `?` convert layer errors automatically.
///
/// Most faults inside the channel state machines are absorbed locally
/// (logged, frame dropped) and never surface here. The variants below are
/// the synchronous failures an operation call can return.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// A transport-level error (connect, listen, send).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A framing error (invalid channel, truncated frame).
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A session-level error (queues, tickets).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// No dedicated session exists for the peer and the legacy path also
    /// refused the operation.
    #[error("no session for {0}")]
    NoSession(PeerId),

    /// The pre-handshake send queue hit its configured bound.
    #[error("pre-handshake send queue full (limit {limit})")]
    SendQueueFull { limit: usize },

    /// The operation is not implemented for dedicated sessions.
    #[error("{0} is not supported for dedicated sessions")]
    NotSupported(&'static str),
}
