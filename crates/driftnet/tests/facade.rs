//! End-to-end scenarios: two facades wired through one in-memory hub,
//! exchanging traffic the way a game host and a dedicated server would.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use driftnet::{
    ChannelConfig, ClientState, NetError, NetworkFacade, P2pSessionState,
    PeerToPeer, Role,
};
use driftnet_session::InsecureAuthenticator;
use driftnet_transport::{MemoryHub, MemoryTransport, SendMode};
use driftnet_wire::PeerId;

const ADDR: &str = "192.168.0.10:26910";
const SERVER_ID: PeerId = PeerId(7_650_000);
const CLIENT_ID: PeerId = PeerId(7_650_001);
/// The identity the game uses to address the host before the handshake
/// reveals the server's real one.
const EXPECTED_HOST: PeerId = PeerId(9_999_999);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env(),
        )
        .with_test_writer()
        .try_init();
}

/// Observable state shared with a [`RecordingP2p`] handed to a facade.
#[derive(Default)]
struct P2pLog {
    sent: Vec<(PeerId, Vec<u8>, u8)>,
    closed: Vec<PeerId>,
    inbound: VecDeque<(Vec<u8>, PeerId)>,
    send_ok: bool,
}

/// Legacy path double that records calls into a shared log.
#[derive(Clone, Default)]
struct RecordingP2p {
    log: Rc<RefCell<P2pLog>>,
}

impl PeerToPeer for RecordingP2p {
    fn send(
        &mut self,
        peer: PeerId,
        payload: &[u8],
        _mode: SendMode,
        channel: u8,
    ) -> bool {
        let mut log = self.log.borrow_mut();
        log.sent.push((peer, payload.to_vec(), channel));
        log.send_ok
    }

    fn packet_available(&mut self, _channel: u8) -> Option<usize> {
        self.log
            .borrow()
            .inbound
            .front()
            .map(|(payload, _)| payload.len())
    }

    fn read_packet(&mut self, _channel: u8) -> Option<(Vec<u8>, PeerId)> {
        self.log.borrow_mut().inbound.pop_front()
    }

    fn close_session(&mut self, peer: PeerId) -> bool {
        self.log.borrow_mut().closed.push(peer);
        false
    }

    fn accept_session(&mut self, _peer: PeerId) -> bool {
        false
    }

    fn session_state(&mut self, _peer: PeerId) -> Option<P2pSessionState> {
        None
    }

    fn allow_relay(&mut self, _allow: bool) -> bool {
        false
    }
}

type Facade =
    NetworkFacade<MemoryTransport, InsecureAuthenticator, RecordingP2p>;

struct World {
    server: Facade,
    client: Facade,
    client_p2p: Rc<RefCell<P2pLog>>,
}

impl World {
    /// Ticks both sides until traffic settles.
    fn settle(&mut self) {
        for _ in 0..4 {
            self.server.tick();
            self.client.tick();
        }
    }

    fn client_state(&self) -> ClientState {
        match self.client.role() {
            Role::Client(channel) => channel.state(),
            _ => panic!("client facade is not in client role"),
        }
    }
}

fn world_with(server_auth: InsecureAuthenticator) -> World {
    init_tracing();
    let hub = MemoryHub::new();

    let mut server = NetworkFacade::new(
        hub.endpoint(),
        server_auth,
        RecordingP2p::default(),
        SERVER_ID,
        ChannelConfig::default(),
    );
    server.listen(ADDR).unwrap();

    let client_p2p = RecordingP2p::default();
    let log = Rc::clone(&client_p2p.log);
    let mut client = NetworkFacade::new(
        hub.endpoint(),
        InsecureAuthenticator::new(),
        client_p2p,
        CLIENT_ID,
        ChannelConfig::default(),
    );
    client.connect(ADDR, EXPECTED_HOST).unwrap();

    World {
        server,
        client,
        client_p2p: log,
    }
}

fn world() -> World {
    world_with(InsecureAuthenticator::new())
}

#[test]
fn handshake_completes_and_first_packet_arrives_under_client_identity() {
    let mut w = world();

    // The game fires its first packet immediately after asking to
    // connect; the facade buffers it until the handshake completes.
    w.client
        .send(EXPECTED_HOST, &[0x01, 0x02], SendMode::Reliable, 0)
        .unwrap();
    w.settle();

    assert_eq!(w.client_state(), ClientState::FullyConnected);
    assert_eq!(w.server.packet_available(0), Some(2));
    assert_eq!(
        w.server.read_packet(0),
        Some((vec![0x01, 0x02], CLIENT_ID))
    );
    assert_eq!(w.server.read_packet(0), None);
    // Nothing leaked onto the legacy path.
    assert!(w.client_p2p.borrow().sent.is_empty());
}

#[test]
fn traffic_flows_both_ways_under_authenticated_identities() {
    let mut w = world();
    w.settle();

    w.client
        .send(EXPECTED_HOST, b"to-server", SendMode::Reliable, 0)
        .unwrap();
    w.server
        .send(CLIENT_ID, b"to-client", SendMode::Reliable, 1)
        .unwrap();
    w.settle();

    assert_eq!(
        w.server.read_packet(0),
        Some((b"to-server".to_vec(), CLIENT_ID))
    );
    assert_eq!(
        w.client.read_packet(1),
        Some((b"to-client".to_vec(), SERVER_ID))
    );
}

#[test]
fn sends_to_announced_server_identity_also_use_dedicated_path() {
    let mut w = world();
    w.settle();

    // After the handshake the game may learn the server's true identity
    // and address it directly.
    w.client
        .send(SERVER_ID, b"direct", SendMode::Reliable, 0)
        .unwrap();
    w.settle();

    assert_eq!(w.server.read_packet(0), Some((b"direct".to_vec(), CLIENT_ID)));
    assert!(w.client_p2p.borrow().sent.is_empty());
}

#[test]
fn channel_queues_preserve_order_and_stay_separate() {
    let mut w = world();
    w.settle();

    for (payload, channel) in
        [(b"a0", 0u8), (b"b1", 1), (b"c0", 0), (b"d1", 1)]
    {
        w.client
            .send(EXPECTED_HOST, payload, SendMode::Reliable, channel)
            .unwrap();
    }
    w.settle();

    assert_eq!(w.server.read_packet(0), Some((b"a0".to_vec(), CLIENT_ID)));
    assert_eq!(w.server.read_packet(0), Some((b"c0".to_vec(), CLIENT_ID)));
    assert_eq!(w.server.read_packet(1), Some((b"b1".to_vec(), CLIENT_ID)));
    assert_eq!(w.server.read_packet(1), Some((b"d1".to_vec(), CLIENT_ID)));
}

#[test]
fn rejected_handshake_leaves_client_disconnected() {
    let mut w = world_with(InsecureAuthenticator::rejecting());
    w.settle();

    assert_eq!(w.client_state(), ClientState::NotConnected);
    assert!(w.server.send(CLIENT_ID, b"x", SendMode::Reliable, 0).is_err());
    // With no dedicated session and a refusing legacy path, sends to the
    // host identity fail.
    let err = w
        .client
        .send(EXPECTED_HOST, b"x", SendMode::Reliable, 0)
        .unwrap_err();
    assert!(matches!(err, NetError::NoSession(p) if p == EXPECTED_HOST));
}

#[test]
fn unreliable_sends_before_connection_report_success_and_vanish() {
    let mut w = world();
    // No settle: handshake still in flight.
    w.client
        .send(EXPECTED_HOST, b"pos-update", SendMode::Unreliable, 1)
        .unwrap();
    w.settle();

    assert!(w.server.read_packet(1).is_none());
    assert!(w.client_p2p.borrow().sent.is_empty());
}

#[test]
fn close_session_tears_down_without_resurrection() {
    let mut w = world();
    w.settle();

    assert!(w.client.close_session(EXPECTED_HOST));
    w.settle();

    // The server dropped the session and no new one appeared.
    let err = w
        .client
        .send(EXPECTED_HOST, b"late", SendMode::Reliable, 0)
        .unwrap_err();
    assert!(matches!(err, NetError::NoSession(_)));
    assert!(w.server.send(CLIENT_ID, b"late", SendMode::Reliable, 0).is_err());
    // The legacy path was asked to close too.
    assert_eq!(w.client_p2p.borrow().closed, vec![EXPECTED_HOST]);
}

#[test]
fn legacy_path_carries_peers_the_dedicated_path_does_not_own() {
    let other_peer = PeerId(123);
    let mut w = world();
    w.settle();
    w.client_p2p.borrow_mut().send_ok = true;

    w.client
        .send(other_peer, b"p2p", SendMode::Reliable, 0)
        .unwrap();

    let log = w.client_p2p.borrow();
    assert_eq!(log.sent, vec![(other_peer, b"p2p".to_vec(), 0)]);
}

#[test]
fn dedicated_queues_win_over_legacy_on_reads() {
    let mut w = world();
    w.settle();
    w.client_p2p
        .borrow_mut()
        .inbound
        .push_back((b"legacy".to_vec(), PeerId(123)));

    w.server
        .send(CLIENT_ID, b"dedicated", SendMode::Reliable, 0)
        .unwrap();
    w.settle();

    assert_eq!(
        w.client.read_packet(0),
        Some((b"dedicated".to_vec(), SERVER_ID))
    );
    assert_eq!(
        w.client.read_packet(0),
        Some((b"legacy".to_vec(), PeerId(123)))
    );
}

#[test]
fn two_clients_are_kept_apart_by_identity() {
    init_tracing();
    let hub = MemoryHub::new();
    let mut server = NetworkFacade::new(
        hub.endpoint(),
        InsecureAuthenticator::new(),
        RecordingP2p::default(),
        SERVER_ID,
        ChannelConfig::default(),
    );
    server.listen(ADDR).unwrap();

    let mut clients: Vec<Facade> = [PeerId(201), PeerId(202)]
        .into_iter()
        .map(|id| {
            let mut facade = NetworkFacade::new(
                hub.endpoint(),
                InsecureAuthenticator::new(),
                RecordingP2p::default(),
                id,
                ChannelConfig::default(),
            );
            facade.connect(ADDR, EXPECTED_HOST).unwrap();
            facade
        })
        .collect();

    for _ in 0..4 {
        server.tick();
        for client in &mut clients {
            client.tick();
        }
    }

    clients[0]
        .send(EXPECTED_HOST, b"from-201", SendMode::Reliable, 0)
        .unwrap();
    clients[1]
        .send(EXPECTED_HOST, b"from-202", SendMode::Reliable, 0)
        .unwrap();
    server.send(PeerId(202), b"only-202", SendMode::Reliable, 0).unwrap();
    for _ in 0..2 {
        server.tick();
        for client in &mut clients {
            client.tick();
        }
    }

    let mut senders = Vec::new();
    while let Some((_, peer)) = server.read_packet(0) {
        senders.push(peer);
    }
    senders.sort();
    assert_eq!(senders, vec![PeerId(201), PeerId(202)]);

    assert!(clients[0].read_packet(0).is_none());
    assert_eq!(
        clients[1].read_packet(0),
        Some((b"only-202".to_vec(), SERVER_ID))
    );
}

#[test]
fn facade_shutdown_disconnects_all_clients() {
    let mut w = world();
    w.settle();

    w.server.shutdown();
    w.settle();

    assert!(matches!(w.server.role(), Role::Inactive));
    // The client's connection died after the handshake, so the stage is
    // untouched but sends fail at the transport level.
    assert_eq!(w.client_state(), ClientState::FullyConnected);
    let err = w
        .client
        .send(EXPECTED_HOST, b"late", SendMode::Reliable, 0)
        .unwrap_err();
    assert!(matches!(err, NetError::Transport(_)));
}
