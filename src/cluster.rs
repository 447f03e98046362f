//! Cluster Wiring
//!
//! Builds a mailbox and peer handle for every node in a topology, spawns
//! one actor task per node, and delivers each node its bootstrap message.
//! The returned [`Cluster`] is the orchestrator's only surface: it injects
//! user commands and takes state snapshots; the protocol itself runs
//! entirely between the node tasks.

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::TimingConfig;
use crate::node::Node;
use crate::protocol::{Bootstrap, Message, NodeSnapshot, UserCommand};
use crate::topology::Topology;
use crate::transport::{mailbox_channel, NodeId, PeerHandle};

/// Errors related to cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("no node with id {0}")]
    UnknownNode(NodeId),

    #[error("node {0} did not answer (task gone)")]
    NodeUnreachable(NodeId),
}

/// A running fleet of node tasks.
pub struct Cluster {
    handles: Vec<PeerHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl Cluster {
    /// Spawn one node task per topology entry and bootstrap them all.
    pub async fn spawn(topology: &Topology, timing: TimingConfig, mailbox_capacity: usize) -> Self {
        let mut handles = Vec::with_capacity(topology.len());
        let mut mailboxes = Vec::with_capacity(topology.len());

        for id in topology.node_ids() {
            let (tx, rx) = mailbox_channel(mailbox_capacity);
            handles.push(PeerHandle::new(id, tx));
            mailboxes.push(rx);
        }

        let mut tasks = Vec::with_capacity(topology.len());
        for (handle, mailbox) in handles.iter().zip(mailboxes) {
            let node = Node::new(handle.id(), handle.clone(), timing.clone());
            tasks.push(tokio::spawn(node.run(mailbox)));
        }

        for id in topology.node_ids() {
            let neighbors: Vec<PeerHandle> = topology
                .neighbors(id)
                .iter()
                .map(|n| handles[n.as_u32() as usize].clone())
                .collect();
            let bootstrap = Bootstrap {
                neighbors,
                is_starter: id == topology.starter(),
            };
            let handle = &handles[id.as_u32() as usize];
            // Freshly spawned tasks own the receivers, so this cannot fail.
            let _ = handle
                .send(handle.clone(), Message::Bootstrap(bootstrap))
                .await;
        }

        info!(
            nodes = handles.len(),
            starter = %topology.starter(),
            "cluster spawned"
        );

        Self { handles, tasks }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the cluster has no nodes.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handle for a node.
    pub fn handle(&self, id: NodeId) -> Result<&PeerHandle, ClusterError> {
        self.handles
            .get(id.as_u32() as usize)
            .ok_or(ClusterError::UnknownNode(id))
    }

    /// Inject a user REQUEST command into a node.
    pub async fn request(&self, id: NodeId) -> Result<(), ClusterError> {
        self.command(id, UserCommand::Request).await
    }

    /// Inject a user CRASH command into a node.
    pub async fn crash(&self, id: NodeId) -> Result<(), ClusterError> {
        self.command(id, UserCommand::Crash).await
    }

    /// Take a snapshot of one node's observable state.
    pub async fn inspect(&self, id: NodeId) -> Result<NodeSnapshot, ClusterError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(id, UserCommand::Inspect(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| ClusterError::NodeUnreachable(id))
    }

    async fn command(&self, id: NodeId, command: UserCommand) -> Result<(), ClusterError> {
        let handle = self.handle(id)?;
        handle
            .send(handle.clone(), Message::Command(command))
            .await
            .map_err(|_| ClusterError::NodeUnreachable(id))
    }

    /// Stop all node tasks.
    ///
    /// Node tasks hold a handle to their own mailbox (for timers), so they
    /// never exit by channel closure; they are aborted here instead. Once
    /// the aborts land, every command reports its target as unreachable.
    pub fn shutdown(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        info!(nodes = self.tasks.len(), "cluster shut down");
    }
}
