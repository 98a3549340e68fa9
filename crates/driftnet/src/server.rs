//! Server channel: a listen socket and the sessions behind it.
//!
//! Inbound connections are accepted immediately but start in a pending
//! set, where the only frame that matters is the auth request. A verified
//! request promotes the connection into the [`PeerTable`] under the
//! identity the ticket proved, and from then on its frames land in the
//! per-peer channel queues. All member connections share one poll group,
//! so a tick drains the whole roster with a single transport call.

use std::collections::HashSet;

use driftnet_session::{Authenticator, PeerTable, SessionError};
use driftnet_transport::{
    ConnectionHandle, ListenHandle, PollGroup, SendMode, Transport,
    TransportEvent,
};
use driftnet_wire::{
    PeerId, decode_auth_request, decode_data_frame, encode_data_frame,
    encode_identity_announce,
};

use crate::{ChannelConfig, NetError};

/// The server variant of the connection state machine.
pub struct ServerChannel {
    listen: ListenHandle,
    poll_group: PollGroup,
    /// Accepted connections that have not presented a valid ticket yet.
    pending: HashSet<ConnectionHandle>,
    table: PeerTable,
    local_id: PeerId,
    config: ChannelConfig,
}

impl ServerChannel {
    /// Binds a listen socket on `addr` and returns the channel with an
    /// empty roster. `local_id` is the identity announced to clients that
    /// pass authentication.
    pub fn listen<T: Transport>(
        transport: &mut T,
        addr: &str,
        local_id: PeerId,
        config: ChannelConfig,
    ) -> Result<Self, NetError> {
        let listen = transport.listen(addr)?;
        let poll_group = transport.create_poll_group();
        tracing::info!(%listen, addr, %local_id, "dedicated server listening");
        Ok(Self {
            listen,
            poll_group,
            pending: HashSet::new(),
            table: PeerTable::new(config.channels),
            local_id,
            config,
        })
    }

    /// Number of authenticated sessions.
    pub fn peer_count(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if `peer` has an authenticated session.
    pub fn has_session(&self, peer: PeerId) -> bool {
        self.table.contains_peer(peer)
    }

    /// The live connection for an authenticated peer.
    pub fn session_for(&self, peer: PeerId) -> Option<ConnectionHandle> {
        self.table.handle_for(peer)
    }

    /// Reacts to a transport status change on one of our connections.
    pub fn handle_event<T: Transport>(
        &mut self,
        transport: &mut T,
        event: TransportEvent,
    ) {
        match event {
            TransportEvent::Connecting { connection } => {
                if let Err(e) =
                    transport.set_poll_group(self.poll_group, connection)
                {
                    tracing::warn!(%connection, error = %e, "cannot add connection to poll group");
                    return;
                }
                self.pending.insert(connection);
                if let Err(e) = transport.accept(connection) {
                    tracing::warn!(%connection, error = %e, "accept failed");
                    self.pending.remove(&connection);
                }
            }
            TransportEvent::Connected { .. } => {}
            TransportEvent::Closed { connection, reason } => {
                if self.pending.remove(&connection) {
                    tracing::info!(%connection, ?reason, "unauthenticated connection dropped");
                } else if let Some(peer) =
                    self.table.remove_connection(connection)
                {
                    tracing::info!(%peer, %connection, ?reason, "client disconnected");
                } else {
                    tracing::debug!(%connection, ?reason, "close for unknown connection");
                }
            }
        }
    }

    /// Drains the poll group, routing each frame through authentication or
    /// into the owning peer's channel queue.
    pub fn pump<T: Transport, A: Authenticator>(
        &mut self,
        transport: &mut T,
        auth: &mut A,
    ) {
        let inbound = transport
            .receive_on_poll_group(self.poll_group, self.config.recv_batch);
        for message in inbound {
            if self.pending.contains(&message.connection) {
                self.handle_auth(transport, auth, message.connection, &message.payload);
            } else if let Some(peer) = self.table.peer_for(message.connection)
            {
                self.handle_data(peer, &message.payload);
            } else {
                tracing::warn!(
                    connection = %message.connection,
                    len = message.payload.len(),
                    "dropping frame from unknown connection"
                );
            }
        }
    }

    /// Sends a packet to an authenticated peer.
    ///
    /// # Errors
    /// Returns [`NetError::NoSession`] when the peer is not in the table —
    /// the caller decides whether a fallback path exists.
    pub fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        peer: PeerId,
        payload: &[u8],
        mode: SendMode,
        channel: u8,
    ) -> Result<(), NetError> {
        let connection = self
            .table
            .handle_for(peer)
            .ok_or(NetError::NoSession(peer))?;
        let frame = encode_data_frame(payload, channel, self.config.channels)?;
        transport.send(connection, &frame, mode)?;
        Ok(())
    }

    /// Peeks the size of the next packet on `channel`, across all peers.
    pub fn available(&self, channel: u8) -> Option<usize> {
        self.table.available(channel)
    }

    /// Dequeues the oldest packet on `channel` and the authenticated
    /// identity it came from.
    pub fn read(&mut self, channel: u8) -> Option<(Vec<u8>, PeerId)> {
        self.table
            .pop(channel)
            .map(|(peer, payload)| (payload, peer))
    }

    /// Closes the session with `peer`. Returns `false` if none existed.
    pub fn close_session<T: Transport>(
        &mut self,
        transport: &mut T,
        peer: PeerId,
    ) -> bool {
        match self.table.remove_peer(peer) {
            Some(connection) => {
                transport.close(connection);
                true
            }
            None => false,
        }
    }

    /// Closes every connection, the listen socket and the poll group. The
    /// roster is emptied: sends after shutdown report `NoSession` rather
    /// than hitting a dead handle.
    pub fn shutdown<T: Transport>(&mut self, transport: &mut T) {
        for connection in self.table.connections() {
            transport.close(connection);
            self.table.remove_connection(connection);
        }
        for &connection in &self.pending {
            transport.close(connection);
        }
        self.pending.clear();
        transport.close_listen(self.listen);
        transport.destroy_poll_group(self.poll_group);
        tracing::info!("dedicated server shut down");
    }

    fn handle_auth<T: Transport, A: Authenticator>(
        &mut self,
        transport: &mut T,
        auth: &mut A,
        connection: ConnectionHandle,
        frame: &[u8],
    ) {
        let (claimed, ticket) = match decode_auth_request(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(%connection, error = %e, "dropping malformed auth request");
                return;
            }
        };

        let verdict = auth.begin_authentication(ticket, claimed);
        if !verdict.is_accepted() {
            tracing::warn!(%connection, peer = %claimed, ?verdict, "auth ticket refused");
            // The refusal is announced but the connection is left in the
            // pending set; the client tears it down on its side.
            self.announce(transport, connection, PeerId::NIL);
            return;
        }

        self.pending.remove(&connection);
        if let Some(displaced) = self.table.insert(claimed, connection) {
            tracing::warn!(
                peer = %claimed,
                old = %displaced,
                new = %connection,
                "peer reconnected, closing displaced connection"
            );
            transport.close(displaced);
        }
        tracing::info!(peer = %claimed, %connection, ?verdict, "client authenticated");
        self.announce(transport, connection, self.local_id);
    }

    fn handle_data(&mut self, peer: PeerId, frame: &[u8]) {
        let (channel, payload) = match decode_data_frame(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "dropping malformed frame");
                return;
            }
        };
        match self.table.enqueue(peer, channel, payload.to_vec()) {
            Ok(()) => {}
            Err(SessionError::ChannelOutOfRange { channel, .. }) => {
                tracing::warn!(
                    %peer,
                    channel,
                    len = frame.len(),
                    "skipping message on unavailable channel"
                );
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "dropping frame");
            }
        }
    }

    fn announce<T: Transport>(
        &self,
        transport: &mut T,
        connection: ConnectionHandle,
        id: PeerId,
    ) {
        let response = encode_identity_announce(id);
        if let Err(e) =
            transport.send(connection, &response, SendMode::Reliable)
        {
            tracing::warn!(%connection, error = %e, "failed to send handshake response");
        }
    }
}
