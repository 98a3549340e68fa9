//! Channel configuration.

use serde::{Deserialize, Serialize};

/// Configuration shared by both channel variants.
///
/// Hosts can override these defaults when constructing the facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Number of logical channels multiplexed onto each connection.
    ///
    /// Each (peer, channel) pair gets its own ordered inbound queue. The
    /// wire encoding reserves a single byte, so up to 256 channels are
    /// representable; two is what the legacy API used.
    pub channels: u8,

    /// Maximum number of reliable sends buffered while the client
    /// handshake is still in flight. A stalled handshake stops accepting
    /// sends once the bound is hit instead of growing without limit.
    pub pre_handshake_queue_limit: usize,

    /// Maximum inbound messages drained from the transport per source per
    /// tick.
    pub recv_batch: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            pre_handshake_queue_limit: 64,
            recv_batch: 100,
        }
    }
}
