//! The peer-to-peer facade over the dedicated transport.
//!
//! [`NetworkFacade`] presents the legacy peer-to-peer surface the game
//! already calls — send to a peer, read from a channel, close a session —
//! and decides per call whether the dedicated path or the genuine
//! peer-to-peer path carries it. At most one channel variant is active at
//! a time; activating a new role tears the previous one down first.

use driftnet_session::Authenticator;
use driftnet_transport::{SendMode, Transport};
use driftnet_wire::PeerId;

use crate::{
    ChannelConfig, ClientChannel, NetError, P2pSessionState, PeerToPeer,
    ServerChannel,
};

/// Which side of the dedicated connection this host currently plays.
pub enum Role {
    /// No dedicated networking; everything goes through the legacy path.
    Inactive,
    /// Connected (or connecting) to a dedicated server.
    Client(ClientChannel),
    /// Hosting a dedicated server.
    Server(ServerChannel),
}

impl Role {
    /// Returns `true` if the dedicated path owns traffic for `peer`.
    fn owns_peer(&self, peer: PeerId) -> bool {
        match self {
            Role::Inactive => false,
            Role::Client(client) => client.owns_peer(peer),
            Role::Server(server) => server.has_session(peer),
        }
    }
}

/// Drop-in replacement for the game's peer-to-peer messaging layer.
///
/// The host constructs one facade and calls [`tick`](Self::tick) from its
/// update loop; everything else mirrors the legacy API. Operations
/// addressed to a peer without a dedicated session are forwarded to the
/// wrapped [`PeerToPeer`] implementation, so peers reached both ways keep
/// working side by side.
pub struct NetworkFacade<T, A, P> {
    transport: T,
    auth: A,
    legacy: P,
    role: Role,
    self_id: PeerId,
    config: ChannelConfig,
}

impl<T, A, P> NetworkFacade<T, A, P>
where
    T: Transport,
    A: Authenticator,
    P: PeerToPeer,
{
    /// Creates an inactive facade. `self_id` is the identity this host
    /// claims in handshakes and announces when hosting.
    pub fn new(
        transport: T,
        auth: A,
        legacy: P,
        self_id: PeerId,
        config: ChannelConfig,
    ) -> Self {
        Self {
            transport,
            auth,
            legacy,
            role: Role::Inactive,
            self_id,
            config,
        }
    }

    /// The active role. Mostly useful for inspection.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Starts connecting to the dedicated server at `addr`.
    ///
    /// `expected_host` is the identity the game will address the host by
    /// until the handshake announces the server's real one; sends to it
    /// route onto this connection from the first call. Any previously
    /// active role is shut down first.
    pub fn connect(
        &mut self,
        addr: &str,
        expected_host: PeerId,
    ) -> Result<(), NetError> {
        self.deactivate();
        let client = ClientChannel::connect(
            &mut self.transport,
            addr,
            self.self_id,
            expected_host,
            self.config.clone(),
        )?;
        self.role = Role::Client(client);
        Ok(())
    }

    /// Starts hosting a dedicated server on `addr`. Any previously active
    /// role is shut down first.
    pub fn listen(&mut self, addr: &str) -> Result<(), NetError> {
        self.deactivate();
        let server = ServerChannel::listen(
            &mut self.transport,
            addr,
            self.self_id,
            self.config.clone(),
        )?;
        self.role = Role::Server(server);
        Ok(())
    }

    /// Shuts down the active role, returning to legacy-only networking.
    pub fn shutdown(&mut self) {
        self.deactivate();
    }

    /// Advances the dedicated side: drains transport events, then inbound
    /// traffic. Call once per host update; nothing progresses between
    /// calls.
    pub fn tick(&mut self) {
        let events = self.transport.poll_events();
        match &mut self.role {
            Role::Inactive => {}
            Role::Client(client) => {
                for event in events {
                    client.handle_event(
                        &mut self.transport,
                        &mut self.auth,
                        event,
                    );
                }
                client.pump(&mut self.transport);
            }
            Role::Server(server) => {
                for event in events {
                    server.handle_event(&mut self.transport, event);
                }
                server.pump(&mut self.transport, &mut self.auth);
            }
        }
    }

    /// Sends a packet to `peer`, over the dedicated path when it owns the
    /// peer and the legacy path otherwise.
    ///
    /// # Errors
    /// Returns [`NetError::NoSession`] when neither path can deliver, plus
    /// the dedicated path's own failures.
    pub fn send(
        &mut self,
        peer: PeerId,
        payload: &[u8],
        mode: SendMode,
        channel: u8,
    ) -> Result<(), NetError> {
        match &mut self.role {
            Role::Client(client) if client.owns_peer(peer) => {
                client.send(&mut self.transport, payload, mode, channel)
            }
            Role::Server(server) if server.has_session(peer) => {
                server.send(&mut self.transport, peer, payload, mode, channel)
            }
            _ => {
                if self.legacy.send(peer, payload, mode, channel) {
                    Ok(())
                } else {
                    Err(NetError::NoSession(peer))
                }
            }
        }
    }

    /// Peeks the size of the next packet on `channel`. The dedicated
    /// queues are consulted before the legacy path.
    pub fn packet_available(&mut self, channel: u8) -> Option<usize> {
        let dedicated = match &self.role {
            Role::Inactive => None,
            Role::Client(client) => client.available(channel),
            Role::Server(server) => server.available(channel),
        };
        dedicated.or_else(|| self.legacy.packet_available(channel))
    }

    /// Dequeues the next packet on `channel` and its sender, preferring
    /// the dedicated queues over the legacy path.
    pub fn read_packet(&mut self, channel: u8) -> Option<(Vec<u8>, PeerId)> {
        let dedicated = match &mut self.role {
            Role::Inactive => None,
            Role::Client(client) => client.read(channel),
            Role::Server(server) => server.read(channel),
        };
        dedicated.or_else(|| self.legacy.read_packet(channel))
    }

    /// Closes the session with `peer` on whichever paths hold one.
    ///
    /// The legacy path is always asked to close as well: the same peer can
    /// have sessions on both, and "close" means all of them. Returns
    /// `true` if either path had a session to close.
    pub fn close_session(&mut self, peer: PeerId) -> bool {
        let dedicated = match &mut self.role {
            Role::Client(client) if client.owns_peer(peer) => {
                client.close(&mut self.transport);
                true
            }
            Role::Server(server) => {
                server.close_session(&mut self.transport, peer)
            }
            _ => false,
        };
        let legacy = self.legacy.close_session(peer);
        dedicated || legacy
    }

    /// Accepts an incoming session request from `peer`.
    ///
    /// Dedicated sessions are established by the handshake, not by this
    /// call, so a peer the dedicated path owns is reported as already
    /// accepted. Everything else goes to the legacy path.
    pub fn accept_session(&mut self, peer: PeerId) -> bool {
        if self.role.owns_peer(peer) {
            return true;
        }
        self.legacy.accept_session(peer)
    }

    /// Queries legacy connectivity details for `peer`.
    ///
    /// # Errors
    /// Returns [`NetError::NotSupported`] when the dedicated path owns the
    /// peer: relay and NAT state have no meaning on a dedicated
    /// connection, and pretending otherwise would mislead the caller.
    pub fn session_state(
        &mut self,
        peer: PeerId,
    ) -> Result<Option<P2pSessionState>, NetError> {
        if self.role.owns_peer(peer) {
            return Err(NetError::NotSupported("session_state"));
        }
        Ok(self.legacy.session_state(peer))
    }

    /// Enables or disables relayed delivery on the legacy path. Returns
    /// the previous setting.
    pub fn allow_relay(&mut self, allow: bool) -> bool {
        self.legacy.allow_relay(allow)
    }

    fn deactivate(&mut self) {
        match std::mem::replace(&mut self.role, Role::Inactive) {
            Role::Inactive => {}
            Role::Client(mut client) => {
                tracing::info!("leaving dedicated client role");
                client.close(&mut self.transport);
            }
            Role::Server(mut server) => {
                tracing::info!("leaving dedicated server role");
                server.shutdown(&mut self.transport);
            }
        }
    }
}
