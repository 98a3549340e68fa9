use driftnet_wire::PeerId;

/// Errors that can occur in the session layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A frame named a channel the endpoint has no queue for.
    #[error("channel {channel} out of range (endpoint supports {channel_count})")]
    ChannelOutOfRange { channel: u8, channel_count: u8 },

    /// The peer has no live session.
    #[error("no session for {0}")]
    NoSession(PeerId),

    /// The authentication service could not produce a ticket.
    #[error("ticket unavailable: {0}")]
    TicketUnavailable(String),
}
