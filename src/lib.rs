//! treelock: tree-based distributed mutual exclusion
//!
//! A simulator for token-passing mutual exclusion on an undirected tree of
//! node actors, extended with crash and recovery: any non-critical node can
//! be crashed by the user and later reconstructs its state purely from its
//! neighbors' advisories, preserving the single-token invariant.

pub mod cluster;
pub mod config;
pub mod node;
pub mod protocol;
pub mod topology;
pub mod transport;

// Re-export cluster types
pub use cluster::{Cluster, ClusterError};

// Re-export config types
pub use config::{Config, ConfigError, NodeConfig, TimingConfig, TopologyConfig};

// Re-export node types
pub use node::{Node, Phase};

// Re-export protocol types
pub use protocol::{Advisory, Bootstrap, Message, NodeSnapshot, UserCommand};

// Re-export topology types
pub use topology::{Topology, TopologyError};

// Re-export transport types
pub use transport::{
    mailbox_channel, schedule_self, Envelope, Mailbox, MailboxSender, NodeId, PeerHandle,
    TransportError,
};
