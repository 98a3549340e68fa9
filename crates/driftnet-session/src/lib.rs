//! Peer session management for Driftnet.
//!
//! This crate owns the state both channel variants share:
//!
//! 1. **The peer table** ([`PeerTable`]) — the bidirectional mapping between
//!    transport connection handles and authenticated peer identities, plus
//!    each peer's per-channel inbound queues.
//! 2. **Authentication** ([`Authenticator`] trait) — the boundary to the
//!    platform's ticket service. Driftnet never validates tickets itself;
//!    it asks the authenticator and acts on the verdict.
//!
//! A connection enters the table exactly once, at the moment its handshake
//! succeeds, and leaves it on connection loss or explicit session close.
//! Before that moment a connection has a handle but no identity.

mod auth;
mod error;
mod table;

pub use auth::{AuthVerdict, Authenticator, InsecureAuthenticator};
pub use error::SessionError;
pub use table::PeerTable;
