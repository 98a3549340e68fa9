//! Wire format for Driftnet.
//!
//! This crate defines the bytes that travel over a dedicated connection:
//!
//! - **Data frames** — a 1-byte logical-channel prefix followed by the
//!   payload. Channels multiplex independent ordered sub-streams onto one
//!   physical connection.
//! - **Handshake messages** — the client's auth request (identity + ticket)
//!   and the server's fixed 8-byte identity announcement.
//! - **Identity** ([`PeerId`]) — the stable 64-bit identifier for a remote
//!   participant.
//!
//! Everything here is a pure function over byte slices; no state, no I/O.
//! The framing layer sits between the transport (opaque messages) and the
//! channel state machines (which decide what a frame *means*).

mod error;
mod framing;
mod types;

pub use error::WireError;
pub use framing::{
    HANDSHAKE_RESPONSE_LEN, decode_auth_request, decode_data_frame,
    decode_identity_announce, encode_auth_request, encode_data_frame,
    encode_identity_announce,
};
pub use types::PeerId;
