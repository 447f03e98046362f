//! Message Transport
//!
//! In-process point-to-point messaging between node actors. Each node owns
//! a single mailbox; peers hold a [`PeerHandle`] addressing it. Delivery is
//! FIFO per ordered (sender, receiver) pair, without duplication or loss,
//! for as long as both endpoints are alive. A delayed self-delivery
//! facility covers every timed wait in the protocol (bootstrap, critical
//! section, crash duration).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::Message;

/// Unique identifier for a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a new node ID.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors related to transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mailbox of node {peer} is closed")]
    MailboxClosed { peer: NodeId },
}

/// A delivered message together with the handle of its sender.
///
/// Carrying the sender's handle lets receivers store it directly as a
/// holder edge or request-queue entry without a separate lookup.
#[derive(Debug)]
pub struct Envelope {
    /// Handle of the sending node (self, for scheduled self-messages).
    pub from: PeerHandle,
    /// The protocol message.
    pub message: Message,
}

/// Channel sender for a node's mailbox.
pub type MailboxSender = mpsc::Sender<Envelope>;

/// Channel receiver side of a node's mailbox.
pub type Mailbox = mpsc::Receiver<Envelope>;

/// Create a mailbox channel with the given buffer size.
pub fn mailbox_channel(buffer: usize) -> (MailboxSender, Mailbox) {
    mpsc::channel(buffer)
}

/// An address for sending messages to one node.
///
/// Cheap to clone. Equality and hashing consider only the node ID, so a
/// handle compares equal to any other handle for the same node regardless
/// of when it was cloned.
#[derive(Clone, Debug)]
pub struct PeerHandle {
    id: NodeId,
    tx: MailboxSender,
}

impl PeerHandle {
    /// Create a handle from a node ID and its mailbox sender.
    pub fn new(id: NodeId, tx: MailboxSender) -> Self {
        Self { id, tx }
    }

    /// The ID of the addressed node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Deliver a message to the addressed node, tagged with the sender.
    ///
    /// Waits for mailbox capacity; errs only if the receiving task is gone.
    pub async fn send(&self, from: PeerHandle, message: Message) -> Result<(), TransportError> {
        self.tx
            .send(Envelope { from, message })
            .await
            .map_err(|_| TransportError::MailboxClosed { peer: self.id })
    }
}

impl PartialEq for PeerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerHandle {}

impl Hash for PeerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Deliver `message` to `handle`'s own mailbox after `after`.
///
/// Scheduled deliveries cannot be revoked; receivers gate on their current
/// phase instead. The delivery is dropped if the node task has exited.
pub fn schedule_self(handle: &PeerHandle, after: Duration, message: Message) {
    let handle = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let from = handle.clone();
        let _ = handle.send(from, message).await;
    });
}
