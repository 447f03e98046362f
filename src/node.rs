//! Node Entity
//!
//! Per-node state of the token-passing protocol. The Node holds the
//! oriented holder edge, the FIFO request queue, the critical-section and
//! outstanding-request flags, the lifecycle phase, and the advisory buffer
//! used during recovery. Each Node is owned exclusively by its actor task;
//! handlers run one message to completion before the next.

mod handlers;
mod recovery;
#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::config::TimingConfig;
use crate::protocol::{Advisory, NodeSnapshot};
use crate::transport::{NodeId, PeerHandle};

/// Node lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Created, bootstrap possibly received, Initialize not yet seen.
    Uninitialized,
    /// Participating in the protocol.
    Normal,
    /// Crashed; state wiped, everything but the recovery timer is dropped.
    Crashed,
    /// Collecting advisories; handlers run but resumption is deferred.
    Recovering,
}

impl Phase {
    /// Check if the node participates normally.
    pub fn is_normal(&self) -> bool {
        matches!(self, Phase::Normal)
    }

    /// Check if the node is crashed.
    pub fn is_crashed(&self) -> bool {
        matches!(self, Phase::Crashed)
    }

    /// Check if the node is collecting advisories.
    pub fn is_recovering(&self) -> bool {
        matches!(self, Phase::Recovering)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Normal => "normal",
            Phase::Crashed => "crashed",
            Phase::Recovering => "recovering",
        };
        write!(f, "{}", s)
    }
}

/// One node of the tree.
///
/// `holder` orients this node's edge of the spanning tree toward the
/// token: self means the token is here (or will pass through here on its
/// way to the head requester); a neighbor means the token lies in that
/// direction. The request queue holds every peer (self included) waiting
/// for the privilege through this node, in arrival order.
pub struct Node {
    /// This node's ID. Immutable after construction.
    id: NodeId,
    /// Handle addressing this node's own mailbox.
    self_handle: PeerHandle,
    /// Tree neighbors. Fixed at bootstrap.
    neighbors: Vec<PeerHandle>,
    /// Direction of the privilege. None only pre-init and while crashed.
    holder: Option<PeerHandle>,
    /// FIFO of pending requesters (self or neighbors).
    request_queue: VecDeque<PeerHandle>,
    /// The critical section is executing locally.
    using: bool,
    /// A Request has been sent to `holder` and no Privilege received yet.
    asked: bool,
    /// Lifecycle phase.
    phase: Phase,
    /// Advisories collected while Recovering, keyed by neighbor.
    advise_buffer: HashMap<PeerHandle, Advisory>,
    /// Tuned protocol timing.
    timing: TimingConfig,
}

impl Node {
    /// Create a node in the Uninitialized phase.
    pub fn new(id: NodeId, self_handle: PeerHandle, timing: TimingConfig) -> Self {
        Self {
            id,
            self_handle,
            neighbors: Vec::new(),
            holder: None,
            request_queue: VecDeque::new(),
            using: false,
            asked: false,
            phase: Phase::Uninitialized,
            advise_buffer: HashMap::new(),
            timing,
        }
    }

    /// This node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Copy of the observable state, for the Inspect command.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id,
            phase: self.phase,
            holder: self.holder.as_ref().map(|h| h.id()),
            request_queue: self.request_queue.iter().map(|h| h.id()).collect(),
            using: self.using,
            asked: self.asked,
        }
    }

    /// Whether the holder edge points at this node itself.
    fn holds_token(&self) -> bool {
        self.holder.as_ref().is_some_and(|h| *h == self.self_handle)
    }
}
