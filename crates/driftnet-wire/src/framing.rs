//! Frame layouts.
//!
//! Three message shapes exist on a dedicated connection:
//!
//! ```text
//! data frame:          [1 byte channel][N bytes payload]
//! auth request:        [8 bytes LE client identity][M bytes ticket]
//! identity announce:   [8 bytes LE identity]            (exactly 8 bytes)
//! ```
//!
//! All multi-byte integers are little-endian. The identity announce doubles
//! as the handshake response: identity 0 means rejected, anything else is
//! the accepting server's identity. Ticket length is implicit in the auth
//! request's total length — there is no length field.

use crate::{PeerId, WireError};

/// Exact length of a handshake response (identity announce).
///
/// The client distinguishes the handshake response from data frames by this
/// length while it is waiting for one; data frames of the same length are
/// only possible once the handshake has completed.
pub const HANDSHAKE_RESPONSE_LEN: usize = 8;

/// Prepends the 1-byte channel prefix to `payload`.
///
/// # Errors
/// Returns [`WireError::InvalidChannel`] if `channel` is not below the
/// endpoint's configured `channel_count`.
pub fn encode_data_frame(
    payload: &[u8],
    channel: u8,
    channel_count: u8,
) -> Result<Vec<u8>, WireError> {
    if channel >= channel_count {
        return Err(WireError::InvalidChannel {
            channel,
            channel_count,
        });
    }
    let mut buf = Vec::with_capacity(payload.len() + 1);
    buf.push(channel);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Splits a data frame into its channel index and payload.
///
/// The returned payload borrows from the input; callers never observe the
/// prefix byte.
///
/// # Errors
/// Returns [`WireError::Truncated`] if the input is empty.
pub fn decode_data_frame(bytes: &[u8]) -> Result<(u8, &[u8]), WireError> {
    match bytes.split_first() {
        Some((&channel, payload)) => Ok((channel, payload)),
        None => Err(WireError::Truncated { got: 0, need: 1 }),
    }
}

/// Encodes an identity announcement: the fixed 8-byte handshake response.
pub fn encode_identity_announce(id: PeerId) -> [u8; HANDSHAKE_RESPONSE_LEN] {
    id.0.to_le_bytes()
}

/// Decodes an identity announcement.
///
/// # Errors
/// Returns [`WireError::Truncated`] unless the input is exactly 8 bytes.
pub fn decode_identity_announce(bytes: &[u8]) -> Result<PeerId, WireError> {
    let raw: [u8; HANDSHAKE_RESPONSE_LEN] =
        bytes.try_into().map_err(|_| WireError::Truncated {
            got: bytes.len(),
            need: HANDSHAKE_RESPONSE_LEN,
        })?;
    Ok(PeerId(u64::from_le_bytes(raw)))
}

/// Encodes the client's auth request: self identity followed by the raw
/// ticket bytes.
pub fn encode_auth_request(self_id: PeerId, ticket: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HANDSHAKE_RESPONSE_LEN + ticket.len());
    buf.extend_from_slice(&self_id.0.to_le_bytes());
    buf.extend_from_slice(ticket);
    buf
}

/// Decodes an auth request into the claimed identity and the ticket bytes.
///
/// An empty ticket is representable (8-byte input); whether it is
/// acceptable is the authentication service's decision, not the framing
/// layer's.
///
/// # Errors
/// Returns [`WireError::Truncated`] if the input is shorter than the
/// 8-byte identity.
pub fn decode_auth_request(bytes: &[u8]) -> Result<(PeerId, &[u8]), WireError> {
    if bytes.len() < HANDSHAKE_RESPONSE_LEN {
        return Err(WireError::Truncated {
            got: bytes.len(),
            need: HANDSHAKE_RESPONSE_LEN,
        });
    }
    let (id_bytes, ticket) = bytes.split_at(HANDSHAKE_RESPONSE_LEN);
    let raw: [u8; HANDSHAKE_RESPONSE_LEN] =
        id_bytes.try_into().expect("split_at yields 8 bytes");
    Ok((PeerId(u64::from_le_bytes(raw)), ticket))
}
