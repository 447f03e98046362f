use super::*;
use crate::config::TimingConfig;
use crate::protocol::{Advisory, Bootstrap, Message};
use crate::transport::{mailbox_channel, Envelope, Mailbox, NodeId, PeerHandle};

mod crash;

/// A fake neighbor: a handle the node under test can send to, plus the
/// mailbox where those sends land.
pub(super) struct TestPeer {
    pub handle: PeerHandle,
    pub mailbox: Mailbox,
}

pub(super) fn make_peer(id: u32) -> TestPeer {
    let (tx, rx) = mailbox_channel(16);
    TestPeer {
        handle: PeerHandle::new(NodeId::new(id), tx),
        mailbox: rx,
    }
}

/// Short timings so timer-driven tests stay fast under a paused clock.
pub(super) fn test_timing() -> TimingConfig {
    TimingConfig {
        bootstrap_delay_ms: 10,
        critical_section_ms: 50,
        crash_ms: 200,
    }
}

/// Node under test together with its own mailbox (scheduled self-messages
/// land there and are pumped back in explicitly by the test).
pub(super) fn make_node(id: u32) -> (Node, Mailbox) {
    let (tx, rx) = mailbox_channel(16);
    let handle = PeerHandle::new(NodeId::new(id), tx);
    (Node::new(NodeId::new(id), handle, test_timing()), rx)
}

pub(super) async fn deliver(node: &mut Node, from: &TestPeer, message: Message) {
    node.handle(Envelope {
        from: from.handle.clone(),
        message,
    })
    .await;
}

/// Deliver a message as if self-addressed (timers, bootstrap, commands).
pub(super) async fn deliver_self(node: &mut Node, message: Message) {
    let from = node.self_handle.clone();
    node.handle(Envelope { from, message }).await;
}

pub(super) async fn bootstrap(node: &mut Node, peers: &[&TestPeer], is_starter: bool) {
    let neighbors = peers.iter().map(|p| p.handle.clone()).collect();
    deliver_self(
        node,
        Message::Bootstrap(Bootstrap {
            neighbors,
            is_starter,
        }),
    )
    .await;
}

/// Bring a node into Normal with its holder edge pointing at `parent`.
pub(super) async fn initialize_from(node: &mut Node, parent: &TestPeer) {
    deliver(node, parent, Message::Initialize).await;
}

/// Drain and return everything currently queued at a peer.
pub(super) fn drain(peer: &mut TestPeer) -> Vec<Message> {
    let mut messages = Vec::new();
    while let Ok(envelope) = peer.mailbox.try_recv() {
        messages.push(envelope.message);
    }
    messages
}

/// The next message queued at a peer; panics if there is none.
pub(super) fn expect_message(peer: &mut TestPeer) -> Message {
    peer.mailbox
        .try_recv()
        .expect("expected a message at peer")
        .message
}

pub(super) fn assert_no_message(peer: &mut TestPeer) {
    assert!(peer.mailbox.try_recv().is_err(), "peer mailbox not empty");
}

pub(super) fn advisory(peer_is_holder: bool, peer_in_request_queue: bool, asked: bool) -> Advisory {
    Advisory {
        peer_is_holder,
        peer_in_request_queue,
        asked,
    }
}

/// IDs currently in the node's request queue, head first.
pub(super) fn queue_ids(node: &Node) -> Vec<u32> {
    node.request_queue.iter().map(|h| h.id().as_u32()).collect()
}

/// ID the node's holder edge points at, if any.
pub(super) fn holder_id(node: &Node) -> Option<u32> {
    node.holder.as_ref().map(|h| h.id().as_u32())
}
