//! Client channel: one outbound connection and its handshake.
//!
//! The channel owns exactly one connection to a dedicated server and
//! drives it through `Connecting → AuthTicketSent → FullyConnected`. Any
//! handshake failure resets to `NotConnected`. Reliable sends submitted
//! before the handshake completes are buffered and flushed, in order, the
//! moment it does — the game fires its first packet right after asking to
//! connect, and blocking it until the server answers is not an option.
//!
//! The channel does not own the transport; every method that touches the
//! network borrows it. The facade threads one transport through all calls.

use std::collections::VecDeque;

use driftnet_session::Authenticator;
use driftnet_transport::{
    ConnectionHandle, SendMode, Transport, TransportEvent,
};
use driftnet_wire::{
    HANDSHAKE_RESPONSE_LEN, PeerId, WireError, decode_data_frame,
    decode_identity_announce, encode_auth_request, encode_data_frame,
};

use crate::{ChannelConfig, NetError};

/// The stage the connection handshake is in.
///
/// This is *not* the live socket state: once `FullyConnected` is reached,
/// a later socket error does not reset the field. Callers that need
/// socket health must watch the transport's events. Sending is only
/// useful in `FullyConnected`; in earlier stages reliable packets are
/// queued and flushed after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No connection to any server (also the state after a failed or
    /// rejected handshake).
    NotConnected,
    /// Waiting for the transport to establish the connection.
    Connecting,
    /// Auth ticket sent, waiting for the server's 8-byte response.
    AuthTicketSent,
    /// Handshake complete; the server's identity is known.
    FullyConnected,
}

/// A send submitted before the handshake completed.
#[derive(Debug)]
struct QueuedPacket {
    payload: Vec<u8>,
    mode: SendMode,
    channel: u8,
}

/// The client variant of the connection state machine.
pub struct ClientChannel {
    connection: ConnectionHandle,
    state: ClientState,
    self_id: PeerId,
    /// The identity the game addresses the host by before the handshake
    /// reveals the server's true identity. Routing only.
    expected_host: PeerId,
    /// The server's announced identity. `Some` exactly from the moment
    /// the handshake completes.
    server_id: Option<PeerId>,
    /// One inbound FIFO per logical channel.
    queues: Vec<VecDeque<Vec<u8>>>,
    pre_handshake: VecDeque<QueuedPacket>,
    config: ChannelConfig,
}

impl ClientChannel {
    /// Initiates a connection to `addr` and returns the channel in
    /// `Connecting` state. Non-blocking: establishment and the handshake
    /// play out across subsequent ticks.
    pub fn connect<T: Transport>(
        transport: &mut T,
        addr: &str,
        self_id: PeerId,
        expected_host: PeerId,
        config: ChannelConfig,
    ) -> Result<Self, NetError> {
        let connection = transport.connect(addr)?;
        tracing::info!(%connection, addr, %expected_host, "connecting to dedicated server");
        Ok(Self {
            connection,
            state: ClientState::Connecting,
            self_id,
            expected_host,
            server_id: None,
            queues: vec![VecDeque::new(); config.channels as usize],
            pre_handshake: VecDeque::new(),
            config,
        })
    }

    /// Current handshake stage.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The server's identity, once the handshake has completed.
    pub fn server_id(&self) -> Option<PeerId> {
        self.server_id
    }

    /// Number of sends waiting for the handshake to complete.
    pub fn buffered_sends(&self) -> usize {
        self.pre_handshake.len()
    }

    /// Returns `true` if this channel is the dedicated path for `peer`.
    ///
    /// Matches the pre-handshake addressing identity as well as the
    /// server's announced identity, so sends issued right after `connect`
    /// route here instead of leaking onto the legacy path.
    pub fn owns_peer(&self, peer: PeerId) -> bool {
        self.state != ClientState::NotConnected
            && (peer == self.expected_host || self.server_id == Some(peer))
    }

    /// The live connection for `peer`, if this channel owns it.
    pub fn session_for(&self, peer: PeerId) -> Option<ConnectionHandle> {
        self.owns_peer(peer).then_some(self.connection)
    }

    /// Reacts to a transport status change for this channel's connection.
    pub fn handle_event<T: Transport, A: Authenticator>(
        &mut self,
        transport: &mut T,
        auth: &mut A,
        event: TransportEvent,
    ) {
        match event {
            TransportEvent::Connected { connection }
                if connection == self.connection
                    && self.state == ClientState::Connecting =>
            {
                self.send_auth_request(transport, auth);
            }
            TransportEvent::Closed { connection, reason }
                if connection == self.connection =>
            {
                if self.state == ClientState::FullyConnected {
                    // Stage is handshake progress, not socket health; it
                    // stays FullyConnected (see ClientState docs).
                    tracing::info!(%connection, ?reason, "dedicated connection lost");
                } else {
                    tracing::warn!(%connection, ?reason, "connection lost during handshake");
                    self.abandon(transport);
                }
            }
            _ => {}
        }
    }

    /// Drains inbound messages from the transport into the channel queues
    /// (or through the handshake, while one is in flight).
    pub fn pump<T: Transport>(&mut self, transport: &mut T) {
        let inbound = transport
            .receive_on_connection(self.connection, self.config.recv_batch);
        for message in inbound {
            self.process_frame(transport, &message.payload);
        }
    }

    /// Sends a packet, or buffers it per the pre-handshake rules.
    ///
    /// # Errors
    /// Returns [`NetError::Wire`] for an out-of-range channel,
    /// [`NetError::SendQueueFull`] when the pre-handshake bound is hit,
    /// and [`NetError::Transport`] when a connected send fails.
    pub fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        payload: &[u8],
        mode: SendMode,
        channel: u8,
    ) -> Result<(), NetError> {
        if self.state == ClientState::FullyConnected {
            let frame =
                encode_data_frame(payload, channel, self.config.channels)?;
            transport.send(self.connection, &frame, mode)?;
            return Ok(());
        }

        // Validate the channel now so a bad index fails at the call site,
        // not when the queue drains.
        if channel >= self.config.channels {
            return Err(WireError::InvalidChannel {
                channel,
                channel_count: self.config.channels,
            }
            .into());
        }

        if mode.is_unreliable() {
            // Legacy fire-and-forget semantics: an unreliable packet with
            // no connection yet is silently dropped, and that is success.
            tracing::debug!(channel, "not connected, dropping unreliable packet");
            return Ok(());
        }

        if self.pre_handshake.len() >= self.config.pre_handshake_queue_limit {
            return Err(NetError::SendQueueFull {
                limit: self.config.pre_handshake_queue_limit,
            });
        }
        tracing::debug!(channel, "not connected, buffering reliable packet");
        self.pre_handshake.push_back(QueuedPacket {
            payload: payload.to_vec(),
            mode,
            channel,
        });
        Ok(())
    }

    /// Peeks the size of the next packet on `channel`.
    pub fn available(&self, channel: u8) -> Option<usize> {
        self.queues
            .get(channel as usize)
            .and_then(|queue| queue.front().map(Vec::len))
    }

    /// Dequeues the oldest packet on `channel` and the identity it came
    /// from (always the server).
    pub fn read(&mut self, channel: u8) -> Option<(Vec<u8>, PeerId)> {
        let payload = self
            .queues
            .get_mut(channel as usize)
            .and_then(VecDeque::pop_front)?;
        Some((payload, self.server_id.unwrap_or(self.expected_host)))
    }

    /// Closes the underlying connection and resets to `NotConnected`.
    pub fn close<T: Transport>(&mut self, transport: &mut T) {
        transport.close(self.connection);
        self.state = ClientState::NotConnected;
    }

    fn send_auth_request<T: Transport, A: Authenticator>(
        &mut self,
        transport: &mut T,
        auth: &mut A,
    ) {
        let ticket = match auth.issue_ticket() {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!(error = %e, "cannot obtain auth ticket, abandoning connection");
                self.abandon(transport);
                return;
            }
        };
        let request = encode_auth_request(self.self_id, &ticket);
        if let Err(e) =
            transport.send(self.connection, &request, SendMode::Reliable)
        {
            tracing::warn!(error = %e, "failed to send auth request");
            self.abandon(transport);
            return;
        }
        tracing::info!(connection = %self.connection, "auth ticket sent");
        self.state = ClientState::AuthTicketSent;
    }

    fn process_frame<T: Transport>(&mut self, transport: &mut T, frame: &[u8]) {
        // An 8-byte frame is only a handshake response while we are
        // waiting for one; in every other state it is ordinary data.
        if self.state == ClientState::AuthTicketSent
            && frame.len() == HANDSHAKE_RESPONSE_LEN
        {
            self.process_handshake_response(transport, frame);
            return;
        }

        let (channel, payload) = match decode_data_frame(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                return;
            }
        };
        match self.queues.get_mut(channel as usize) {
            Some(queue) => queue.push_back(payload.to_vec()),
            None => {
                tracing::warn!(
                    channel,
                    len = frame.len(),
                    "skipping message on unavailable channel"
                );
            }
        }
    }

    fn process_handshake_response<T: Transport>(
        &mut self,
        transport: &mut T,
        frame: &[u8],
    ) {
        let id = match decode_identity_announce(frame) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed handshake response");
                return;
            }
        };

        if id.is_nil() {
            tracing::warn!("auth ticket refused by the server, cancelling connection");
            self.abandon(transport);
            return;
        }

        tracing::info!(server = %id, "handshake complete");
        self.server_id = Some(id);
        self.state = ClientState::FullyConnected;
        self.flush_pre_handshake(transport);
    }

    /// Drains the pre-handshake queue, one transport send per entry, in
    /// submission order with each entry's original mode and channel.
    fn flush_pre_handshake<T: Transport>(&mut self, transport: &mut T) {
        while let Some(packet) = self.pre_handshake.pop_front() {
            let frame = match encode_data_frame(
                &packet.payload,
                packet.channel,
                self.config.channels,
            ) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping queued packet");
                    continue;
                }
            };
            if let Err(e) =
                transport.send(self.connection, &frame, packet.mode)
            {
                tracing::warn!(error = %e, "failed to flush queued packet");
            }
        }
    }

    /// Tears the connection down and resets the handshake stage. The
    /// pre-handshake queue is left untouched: its packets follow the
    /// normal send rules on the next connection attempt.
    fn abandon<T: Transport>(&mut self, transport: &mut T) {
        transport.close(self.connection);
        self.server_id = None;
        self.state = ClientState::NotConnected;
    }
}

#[cfg(test)]
mod tests {
    use driftnet_session::InsecureAuthenticator;
    use driftnet_transport::{MemoryHub, MemoryTransport};
    use driftnet_wire::{
        decode_auth_request, encode_identity_announce,
    };

    use super::*;

    const ADDR: &str = "127.0.0.1:1337";
    const SELF_ID: PeerId = PeerId(42);
    const HOST_ID: PeerId = PeerId(900);
    const SERVER_ID: PeerId = PeerId(901);

    struct Harness {
        client: ClientChannel,
        transport: MemoryTransport,
        auth: InsecureAuthenticator,
        /// Raw server-side endpoint, driven by hand.
        server: MemoryTransport,
        server_conn: ConnectionHandle,
    }

    /// Builds a client mid-handshake: connection accepted, ticket sent,
    /// response not yet given.
    fn harness_at_auth_sent() -> Harness {
        let hub = MemoryHub::new();
        let mut server = hub.endpoint();
        let mut transport = hub.endpoint();
        server.listen(ADDR).unwrap();

        let mut client = ClientChannel::connect(
            &mut transport,
            ADDR,
            SELF_ID,
            HOST_ID,
            ChannelConfig::default(),
        )
        .unwrap();
        assert_eq!(client.state(), ClientState::Connecting);

        let server_conn = match server.poll_events().as_slice() {
            [TransportEvent::Connecting { connection }] => *connection,
            other => panic!("expected Connecting, got {other:?}"),
        };
        server.accept(server_conn).unwrap();

        let mut auth = InsecureAuthenticator::new();
        for event in transport.poll_events() {
            client.handle_event(&mut transport, &mut auth, event);
        }
        assert_eq!(client.state(), ClientState::AuthTicketSent);
        // Discard the server side's Connected event; tests below only
        // care about what happens after this point.
        server.poll_events();

        Harness {
            client,
            transport,
            auth,
            server,
            server_conn,
        }
    }

    fn respond(h: &mut Harness, id: PeerId) {
        let response = encode_identity_announce(id);
        h.server
            .send(h.server_conn, &response, SendMode::Reliable)
            .unwrap();
        h.client.pump(&mut h.transport);
    }

    #[test]
    fn test_connected_event_sends_identity_and_ticket() {
        let mut h = harness_at_auth_sent();
        let inbound = h.server.receive_on_connection(h.server_conn, 10);
        assert_eq!(inbound.len(), 1);
        let (claimed, ticket) = decode_auth_request(&inbound[0].payload).unwrap();
        assert_eq!(claimed, SELF_ID);
        assert!(!ticket.is_empty());
    }

    #[test]
    fn test_accepting_response_completes_handshake() {
        let mut h = harness_at_auth_sent();
        respond(&mut h, SERVER_ID);

        assert_eq!(h.client.state(), ClientState::FullyConnected);
        assert_eq!(h.client.server_id(), Some(SERVER_ID));
        assert!(h.client.owns_peer(SERVER_ID));
        assert!(h.client.owns_peer(HOST_ID));
    }

    #[test]
    fn test_rejection_resets_state_and_closes_connection() {
        let mut h = harness_at_auth_sent();
        h.client
            .send(&mut h.transport, b"queued", SendMode::Reliable, 0)
            .unwrap();

        respond(&mut h, PeerId::NIL);

        assert_eq!(h.client.state(), ClientState::NotConnected);
        assert_eq!(h.client.server_id(), None);
        // The queue survives a rejection untouched.
        assert_eq!(h.client.buffered_sends(), 1);
        // The connection was explicitly closed: the server sees it drop.
        assert!(matches!(
            h.server.poll_events().as_slice(),
            [TransportEvent::Closed { .. }]
        ));
    }

    #[test]
    fn test_buffered_sends_flush_in_order_on_handshake_completion() {
        let mut h = harness_at_auth_sent();
        // Drain the auth request first so only data frames remain below.
        h.server.receive_on_connection(h.server_conn, 10);

        for payload in [b"one" as &[u8], b"two", b"three"] {
            h.client
                .send(&mut h.transport, payload, SendMode::Reliable, 0)
                .unwrap();
        }
        assert_eq!(h.client.buffered_sends(), 3);

        respond(&mut h, SERVER_ID);
        // A send issued after the handshake lands after the flushed ones.
        h.client
            .send(&mut h.transport, b"four", SendMode::Reliable, 0)
            .unwrap();

        let inbound = h.server.receive_on_connection(h.server_conn, 10);
        let payloads: Vec<&[u8]> =
            inbound.iter().map(|m| &m.payload[1..]).collect();
        assert_eq!(payloads, vec![b"one" as &[u8], b"two", b"three", b"four"]);
        assert_eq!(h.client.buffered_sends(), 0);
    }

    #[test]
    fn test_unreliable_send_before_connection_is_dropped_successfully() {
        let mut h = harness_at_auth_sent();
        h.client
            .send(&mut h.transport, b"pos", SendMode::Unreliable, 0)
            .unwrap();
        h.client
            .send(&mut h.transport, b"pos", SendMode::UnreliableNoDelay, 1)
            .unwrap();
        assert_eq!(h.client.buffered_sends(), 0);
    }

    #[test]
    fn test_pre_handshake_queue_bound_is_enforced() {
        let mut h = harness_at_auth_sent();
        let limit = ChannelConfig::default().pre_handshake_queue_limit;
        for _ in 0..limit {
            h.client
                .send(&mut h.transport, b"x", SendMode::Reliable, 0)
                .unwrap();
        }

        let err = h
            .client
            .send(&mut h.transport, b"overflow", SendMode::Reliable, 0)
            .unwrap_err();

        assert!(matches!(err, NetError::SendQueueFull { .. }));
        assert_eq!(h.client.buffered_sends(), limit);
    }

    #[test]
    fn test_send_rejects_out_of_range_channel_in_any_state() {
        let mut h = harness_at_auth_sent();
        let err = h
            .client
            .send(&mut h.transport, b"x", SendMode::Reliable, 7)
            .unwrap_err();
        assert!(matches!(err, NetError::Wire(_)));

        respond(&mut h, SERVER_ID);
        let err = h
            .client
            .send(&mut h.transport, b"x", SendMode::Reliable, 7)
            .unwrap_err();
        assert!(matches!(err, NetError::Wire(_)));
    }

    #[test]
    fn test_inbound_data_frames_are_stripped_and_queued_per_channel() {
        let mut h = harness_at_auth_sent();
        respond(&mut h, SERVER_ID);

        h.server
            .send(h.server_conn, &[0, 0xAA], SendMode::Reliable)
            .unwrap();
        h.server
            .send(h.server_conn, &[1, 0xBB, 0xCC], SendMode::Reliable)
            .unwrap();
        h.client.pump(&mut h.transport);

        assert_eq!(h.client.available(0), Some(1));
        assert_eq!(h.client.available(1), Some(2));
        assert_eq!(h.client.read(0), Some((vec![0xAA], SERVER_ID)));
        assert_eq!(h.client.read(1), Some((vec![0xBB, 0xCC], SERVER_ID)));
        assert_eq!(h.client.read(0), None);
    }

    #[test]
    fn test_inbound_frame_on_unavailable_channel_is_dropped() {
        let mut h = harness_at_auth_sent();
        respond(&mut h, SERVER_ID);

        h.server
            .send(h.server_conn, &[7, 0xAA], SendMode::Reliable)
            .unwrap();
        h.client.pump(&mut h.transport);

        for channel in 0..2 {
            assert!(h.client.available(channel).is_none());
        }
    }

    #[test]
    fn test_eight_byte_frame_after_handshake_is_data() {
        let mut h = harness_at_auth_sent();
        respond(&mut h, SERVER_ID);

        // Channel 0 plus 7 payload bytes: would decode as an identity
        // announce, but the handshake is over.
        h.server
            .send(h.server_conn, &[0, 1, 2, 3, 4, 5, 6, 7], SendMode::Reliable)
            .unwrap();
        h.client.pump(&mut h.transport);

        assert_eq!(h.client.state(), ClientState::FullyConnected);
        assert_eq!(
            h.client.read(0),
            Some((vec![1, 2, 3, 4, 5, 6, 7], SERVER_ID))
        );
    }

    #[test]
    fn test_connection_loss_during_handshake_resets_state() {
        let mut h = harness_at_auth_sent();
        h.server.close(h.server_conn);

        for event in h.transport.poll_events() {
            h.client
                .handle_event(&mut h.transport, &mut h.auth, event);
        }

        assert_eq!(h.client.state(), ClientState::NotConnected);
        assert!(!h.client.owns_peer(HOST_ID));
    }

    #[test]
    fn test_connection_loss_after_handshake_keeps_stage() {
        let mut h = harness_at_auth_sent();
        respond(&mut h, SERVER_ID);
        h.server.close(h.server_conn);

        for event in h.transport.poll_events() {
            h.client
                .handle_event(&mut h.transport, &mut h.auth, event);
        }

        // Stage reflects handshake progress, not socket health.
        assert_eq!(h.client.state(), ClientState::FullyConnected);
    }

    #[test]
    fn test_connect_to_dead_address_fails() {
        let hub = MemoryHub::new();
        let mut transport = hub.endpoint();
        let result = ClientChannel::connect(
            &mut transport,
            "10.9.9.9:1",
            SELF_ID,
            HOST_ID,
            ChannelConfig::default(),
        );
        assert!(matches!(result, Err(NetError::Transport(_))));
    }
}
