//! Protocol Messages
//!
//! Message types exchanged between nodes of the token-passing protocol,
//! plus the self-scheduled timer messages and the user command surface.
//!
//! Protocol messages travel only along tree edges: Initialize floods
//! outward from the starter, Request moves toward the current holder,
//! Privilege moves toward the head requester, and Restart/Advise cross a
//! single edge during recovery. Timer messages (ExitCriticalSection,
//! Recovery) are delivered by a node to itself and never cross an edge.

use std::fmt;

use tokio::sync::oneshot;

use crate::node::Phase;
use crate::transport::{NodeId, PeerHandle};

/// One-time wiring message from the orchestrator.
///
/// Carries the node's fixed neighbor set (one tree edge each) and whether
/// this node seeds the protocol as the initial token holder.
#[derive(Debug)]
pub struct Bootstrap {
    /// Handles of all tree neighbors.
    pub neighbors: Vec<PeerHandle>,
    /// Whether this node initiates the Initialize flood.
    pub is_starter: bool,
}

/// A neighbor's report of the state of its edge to a recovering node.
///
/// Sent in response to Restart. All three fields reflect the responder's
/// state at the instant of handling; the responder does not pause, so the
/// report may already be stale when it arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Advisory {
    /// The responder's holder edge points at the recovering node.
    pub peer_is_holder: bool,
    /// The responder's request queue contains the recovering node.
    pub peer_in_request_queue: bool,
    /// The responder has an outstanding Request toward its own holder.
    pub asked: bool,
}

/// A command injected by the user through the driver.
#[derive(Debug)]
pub enum UserCommand {
    /// Request entry to the local critical section.
    Request,
    /// Crash the node (refused while it is in the critical section).
    Crash,
    /// Reply with a snapshot of the node's observable state.
    Inspect(oneshot::Sender<NodeSnapshot>),
}

/// A protocol, timer, or command message.
#[derive(Debug)]
pub enum Message {
    /// Orchestrator wiring (neighbor set + starter flag).
    Bootstrap(Bootstrap),
    /// Tree initialization flood; the arrival edge becomes the holder edge.
    Initialize,
    /// A privilege request from the sending neighbor (or self).
    Request,
    /// The privilege itself, granted to the receiving node.
    Privilege,
    /// A recovering neighbor asks for an advisory about the shared edge.
    Restart,
    /// Advisory response to Restart.
    Advise(Advisory),
    /// Self-timer: the simulated critical section has finished.
    ExitCriticalSection,
    /// Self-timer: the simulated crash duration has elapsed.
    Recovery,
    /// User command (request, crash, inspect).
    Command(UserCommand),
}

impl Message {
    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Bootstrap(_) => "BOOTSTRAP",
            Message::Initialize => "INITIALIZE",
            Message::Request => "REQUEST",
            Message::Privilege => "PRIVILEGE",
            Message::Restart => "RESTART",
            Message::Advise(_) => "ADVISE",
            Message::ExitCriticalSection => "EXIT_CS",
            Message::Recovery => "RECOVERY",
            Message::Command(_) => "COMMAND",
        }
    }
}

/// A copy of one node's observable state, answered to [`UserCommand::Inspect`].
#[derive(Clone, Debug)]
pub struct NodeSnapshot {
    /// The node's ID.
    pub id: NodeId,
    /// Lifecycle phase at snapshot time.
    pub phase: Phase,
    /// ID of the holder edge target (self ID when the node holds the token).
    pub holder: Option<NodeId>,
    /// IDs in the request queue, head first.
    pub request_queue: Vec<NodeId>,
    /// Whether the critical section is executing locally.
    pub using: bool,
    /// Whether a Request is outstanding toward the holder.
    pub asked: bool,
}

impl fmt::Display for NodeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let holder = match self.holder {
            Some(id) => id.to_string(),
            None => "-".to_string(),
        };
        let queue: Vec<String> = self.request_queue.iter().map(|id| id.to_string()).collect();
        write!(
            f,
            "node {}: phase={} holder={} queue=[{}] using={} asked={}",
            self.id,
            self.phase,
            holder,
            queue.join(", "),
            self.using,
            self.asked
        )
    }
}
