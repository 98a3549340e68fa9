use crate::ConnectionHandle;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connecting to the address failed immediately.
    #[error("connect to {0} failed: nothing listening")]
    ConnectFailed(String),

    /// Binding the listen address failed.
    #[error("listen on {0} failed: address in use")]
    ListenFailed(String),

    /// The handle does not name a known connection.
    #[error("unknown connection {0}")]
    InvalidHandle(ConnectionHandle),

    /// Accepting the connection failed (no longer pending).
    #[error("accept failed for {0}")]
    AcceptFailed(ConnectionHandle),

    /// The connection exists but is not established yet.
    #[error("{0} is not connected yet")]
    NotConnected(ConnectionHandle),

    /// The connection was closed.
    #[error("{0} is closed")]
    ConnectionClosed(ConnectionHandle),
}
