/// Errors that can occur while encoding or decoding wire frames.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    /// The channel index is outside the locally configured range.
    ///
    /// Caller error: the frame is never sent. The single prefix byte can
    /// represent indices up to 255, but an endpoint only allocates queues
    /// for `channel_count` channels.
    #[error("channel {channel} out of range (endpoint supports {channel_count})")]
    InvalidChannel { channel: u8, channel_count: u8 },

    /// The input had fewer bytes than the frame layout requires.
    #[error("truncated frame: got {got} bytes, need at least {need}")]
    Truncated { got: usize, need: usize },
}
