//! # Driftnet
//!
//! Runs a game written against a peer-to-peer messaging API ("send to peer
//! X", "read next packet from channel N") unmodified on top of a
//! connection-oriented, dedicated-server transport.
//!
//! The [`NetworkFacade`] mirrors the legacy peer-to-peer surface
//! one-for-one. Behind it, at most one channel variant is active:
//!
//! - [`ClientChannel`] — one outbound connection, driven through an
//!   authentication handshake before traffic flows;
//! - [`ServerChannel`] — a listen socket plus a poll group, promoting
//!   inbound connections into the peer table as they authenticate.
//!
//! Calls addressed to a peer with no dedicated session fall back to the
//! genuine peer-to-peer path ([`PeerToPeer`]), so mixed deployments keep
//! working.
//!
//! The whole stack is single-threaded and cooperative: the host calls
//! [`NetworkFacade::tick`] periodically, and every state transition runs
//! on that thread. Nothing here blocks or spawns.

mod client;
mod config;
mod error;
mod facade;
mod fallback;
mod server;

pub use client::{ClientChannel, ClientState};
pub use config::ChannelConfig;
pub use error::NetError;
pub use facade::{NetworkFacade, Role};
pub use fallback::{NoPeerToPeer, P2pSessionState, PeerToPeer};
pub use server::ServerChannel;
