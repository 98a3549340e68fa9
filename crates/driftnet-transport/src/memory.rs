//! In-process loopback transport.
//!
//! [`MemoryHub`] is a tiny simulated network: every [`MemoryTransport`]
//! endpoint created from the same hub can connect to addresses other
//! endpoints listen on. Delivery is immediate and lossless, handles are
//! allocated from one counter, and poll groups drain in handle order, so
//! every test run observes the same sequence of events.
//!
//! The hub is `Rc<RefCell<_>>`-shared and therefore single-threaded, which
//! matches the stack's concurrency model: everything runs on the thread
//! that calls `tick()`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use crate::{
    ConnectionHandle, DisconnectReason, InboundMessage, ListenHandle,
    PollGroup, SendMode, Transport, TransportError, TransportEvent,
};

/// Identifies one endpoint attached to a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EndpointId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    /// Created by `connect`, waiting for the listener to `accept`.
    Pending,
    /// Accepted; carries messages in both directions.
    Open,
    /// Closed by either side. The entry stays so late operations fail
    /// cleanly instead of aliasing a recycled handle.
    Closed,
}

/// One direction of a connection pair, owned by a single endpoint.
struct Link {
    owner: EndpointId,
    peer: ConnectionHandle,
    state: LinkState,
    inbox: VecDeque<Vec<u8>>,
    poll_group: Option<PollGroup>,
}

struct Listener {
    handle: ListenHandle,
    endpoint: EndpointId,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    listeners: HashMap<String, Listener>,
    // BTreeMap: poll-group receives drain in handle order, deterministically.
    links: BTreeMap<ConnectionHandle, Link>,
    events: HashMap<u64, VecDeque<TransportEvent>>,
}

impl HubState {
    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn push_event(&mut self, endpoint: EndpointId, event: TransportEvent) {
        self.events.entry(endpoint.0).or_default().push_back(event);
    }
}

/// A simulated network shared by a set of [`MemoryTransport`] endpoints.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Rc<RefCell<HubState>>,
}

impl MemoryHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new endpoint attached to this hub.
    pub fn endpoint(&self) -> MemoryTransport {
        let id = self.inner.borrow_mut().alloc();
        MemoryTransport {
            inner: Rc::clone(&self.inner),
            endpoint: EndpointId(id),
        }
    }
}

/// One endpoint of a [`MemoryHub`]: a [`Transport`] implementation whose
/// packets never leave the process.
pub struct MemoryTransport {
    inner: Rc<RefCell<HubState>>,
    endpoint: EndpointId,
}

impl MemoryTransport {
    fn owned_link_state(
        hub: &HubState,
        endpoint: EndpointId,
        connection: ConnectionHandle,
    ) -> Option<LinkState> {
        hub.links
            .get(&connection)
            .filter(|link| link.owner == endpoint)
            .map(|link| link.state)
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, addr: &str) -> Result<ConnectionHandle, TransportError> {
        let mut hub = self.inner.borrow_mut();
        let listener_endpoint = match hub.listeners.get(addr) {
            Some(listener) => listener.endpoint,
            None => return Err(TransportError::ConnectFailed(addr.to_string())),
        };

        let local = ConnectionHandle::new(hub.alloc());
        let remote = ConnectionHandle::new(hub.alloc());
        hub.links.insert(
            local,
            Link {
                owner: self.endpoint,
                peer: remote,
                state: LinkState::Pending,
                inbox: VecDeque::new(),
                poll_group: None,
            },
        );
        hub.links.insert(
            remote,
            Link {
                owner: listener_endpoint,
                peer: local,
                state: LinkState::Pending,
                inbox: VecDeque::new(),
                poll_group: None,
            },
        );
        hub.push_event(
            listener_endpoint,
            TransportEvent::Connecting { connection: remote },
        );
        tracing::debug!(%local, %remote, addr, "loopback connect initiated");
        Ok(local)
    }

    fn listen(&mut self, addr: &str) -> Result<ListenHandle, TransportError> {
        let mut hub = self.inner.borrow_mut();
        if hub.listeners.contains_key(addr) {
            return Err(TransportError::ListenFailed(addr.to_string()));
        }
        let handle = ListenHandle::new(hub.alloc());
        hub.listeners.insert(
            addr.to_string(),
            Listener {
                handle,
                endpoint: self.endpoint,
            },
        );
        tracing::debug!(%handle, addr, "loopback listen socket bound");
        Ok(handle)
    }

    fn create_poll_group(&mut self) -> PollGroup {
        PollGroup::new(self.inner.borrow_mut().alloc())
    }

    fn set_poll_group(
        &mut self,
        group: PollGroup,
        connection: ConnectionHandle,
    ) -> Result<(), TransportError> {
        let mut hub = self.inner.borrow_mut();
        match hub.links.get_mut(&connection) {
            Some(link) if link.owner == self.endpoint => {
                link.poll_group = Some(group);
                Ok(())
            }
            _ => Err(TransportError::InvalidHandle(connection)),
        }
    }

    fn accept(&mut self, connection: ConnectionHandle) -> Result<(), TransportError> {
        let mut hub = self.inner.borrow_mut();
        match Self::owned_link_state(&hub, self.endpoint, connection) {
            Some(LinkState::Pending) => {}
            Some(_) => return Err(TransportError::AcceptFailed(connection)),
            None => return Err(TransportError::InvalidHandle(connection)),
        }

        let peer = {
            let link = hub.links.get_mut(&connection).expect("checked above");
            link.state = LinkState::Open;
            link.peer
        };
        let peer_owner = {
            let peer_link = hub.links.get_mut(&peer).expect("pair is cross-linked");
            peer_link.state = LinkState::Open;
            peer_link.owner
        };
        hub.push_event(peer_owner, TransportEvent::Connected { connection: peer });
        hub.push_event(self.endpoint, TransportEvent::Connected { connection });
        Ok(())
    }

    fn send(
        &mut self,
        connection: ConnectionHandle,
        payload: &[u8],
        _mode: SendMode,
    ) -> Result<(), TransportError> {
        // Loopback delivery is lossless, so unreliable modes behave like
        // reliable ones here.
        let mut hub = self.inner.borrow_mut();
        let peer = match hub.links.get(&connection) {
            Some(link) if link.owner == self.endpoint => match link.state {
                LinkState::Open => link.peer,
                LinkState::Pending => {
                    return Err(TransportError::NotConnected(connection));
                }
                LinkState::Closed => {
                    return Err(TransportError::ConnectionClosed(connection));
                }
            },
            _ => return Err(TransportError::InvalidHandle(connection)),
        };
        hub.links
            .get_mut(&peer)
            .expect("pair is cross-linked")
            .inbox
            .push_back(payload.to_vec());
        Ok(())
    }

    fn receive_on_connection(
        &mut self,
        connection: ConnectionHandle,
        max: usize,
    ) -> Vec<InboundMessage> {
        let mut hub = self.inner.borrow_mut();
        let Some(link) = hub.links.get_mut(&connection) else {
            return Vec::new();
        };
        if link.owner != self.endpoint {
            return Vec::new();
        }
        let take = link.inbox.len().min(max);
        link.inbox
            .drain(..take)
            .map(|payload| InboundMessage {
                connection,
                payload,
            })
            .collect()
    }

    fn receive_on_poll_group(
        &mut self,
        group: PollGroup,
        max: usize,
    ) -> Vec<InboundMessage> {
        let mut hub = self.inner.borrow_mut();
        let mut out = Vec::new();
        for (&connection, link) in hub.links.iter_mut() {
            if out.len() >= max {
                break;
            }
            if link.owner != self.endpoint || link.poll_group != Some(group) {
                continue;
            }
            let take = link.inbox.len().min(max - out.len());
            out.extend(link.inbox.drain(..take).map(|payload| InboundMessage {
                connection,
                payload,
            }));
        }
        out
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut hub = self.inner.borrow_mut();
        hub.events
            .get_mut(&self.endpoint.0)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    fn close(&mut self, connection: ConnectionHandle) {
        let mut hub = self.inner.borrow_mut();
        let Some(link) = hub.links.get_mut(&connection) else {
            return;
        };
        if link.state == LinkState::Closed {
            return;
        }
        link.state = LinkState::Closed;
        link.inbox.clear();
        let peer = link.peer;

        let notify = match hub.links.get_mut(&peer) {
            Some(peer_link) if peer_link.state != LinkState::Closed => {
                peer_link.state = LinkState::Closed;
                peer_link.inbox.clear();
                Some(peer_link.owner)
            }
            _ => None,
        };
        if let Some(peer_owner) = notify {
            hub.push_event(
                peer_owner,
                TransportEvent::Closed {
                    connection: peer,
                    reason: DisconnectReason::ClosedByPeer,
                },
            );
        }
        tracing::debug!(%connection, "loopback connection closed");
    }

    fn close_listen(&mut self, listen: ListenHandle) {
        let mut hub = self.inner.borrow_mut();
        hub.listeners.retain(|_, l| l.handle != listen);
    }

    fn destroy_poll_group(&mut self, group: PollGroup) {
        let mut hub = self.inner.borrow_mut();
        for link in hub.links.values_mut() {
            if link.poll_group == Some(group) {
                link.poll_group = None;
            }
        }
    }
}
