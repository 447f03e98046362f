//! Actor loop and message handlers.

use tracing::{debug, error, info, warn};

use super::{Node, Phase};
use crate::protocol::{Bootstrap, Message, UserCommand};
use crate::transport::{schedule_self, Envelope, Mailbox, PeerHandle};

impl Node {
    // === Actor Loop ===

    /// Run the node until its mailbox closes.
    ///
    /// Processes one envelope to completion before the next; all waits in
    /// the protocol are scheduled self-messages, so nothing here blocks.
    pub async fn run(mut self, mut mailbox: Mailbox) {
        debug!(node = %self.id, "node task started");

        while let Some(envelope) = mailbox.recv().await {
            self.handle(envelope).await;
        }

        debug!(node = %self.id, "node task stopped (mailbox closed)");
    }

    /// Dispatch a single envelope to its handler.
    ///
    /// While crashed, everything except the recovery timer and user
    /// commands is dropped here; commands still reach their handler so
    /// refusals stay user-visible and Inspect keeps answering.
    pub(crate) async fn handle(&mut self, envelope: Envelope) {
        let Envelope { from, message } = envelope;

        if self.phase.is_crashed()
            && !matches!(message, Message::Recovery | Message::Command(_))
        {
            debug!(node = %self.id, kind = message.kind(), "message dropped while crashed");
            return;
        }

        match message {
            Message::Bootstrap(bootstrap) => self.on_bootstrap(bootstrap),
            Message::Initialize => self.on_initialize(from).await,
            Message::Request => self.on_request(from).await,
            Message::Privilege => self.on_privilege(from).await,
            Message::Restart => self.on_restart(from).await,
            Message::Advise(advisory) => self.on_advise(from, advisory).await,
            Message::ExitCriticalSection => self.on_exit_critical_section().await,
            Message::Recovery => self.on_recovery().await,
            Message::Command(command) => self.on_user_command(command).await,
        }
    }

    // === Internal Procedures ===

    /// Pass the privilege to the head requester, or start using it.
    ///
    /// Requires holding the token, not using it, and a non-empty queue;
    /// does nothing otherwise. Dequeues the head, reorients the holder
    /// edge toward it, and either enters the critical section (head is
    /// self) or forwards the Privilege.
    pub(super) async fn assign_privilege(&mut self) {
        if !self.holds_token() || self.using || self.request_queue.is_empty() {
            return;
        }
        let Some(head) = self.request_queue.pop_front() else {
            return;
        };

        self.asked = false;

        if head == self.self_handle {
            self.holder = Some(head);
            self.using = true;
            info!(node = %self.id, "ENTER critical section");
            schedule_self(
                &self.self_handle,
                self.timing.critical_section(),
                Message::ExitCriticalSection,
            );
        } else {
            self.holder = Some(head.clone());
            self.send(&head, Message::Privilege).await;
        }
    }

    /// Ask the holder for the privilege on behalf of the queue head.
    ///
    /// Requires a holder edge pointing away from self, pending work, and
    /// no Request already outstanding on that edge. Invoking this before
    /// Initialize has arrived is an error; it is logged and ignored.
    pub(super) async fn make_request(&mut self) {
        let Some(holder) = self.holder.clone() else {
            error!(
                node = %self.id,
                "privilege requested before INITIALIZE was received"
            );
            return;
        };

        if holder == self.self_handle || self.request_queue.is_empty() || self.asked {
            return;
        }

        self.send(&holder, Message::Request).await;
        self.asked = true;
    }

    /// Send a message to a peer, tagged with this node as sender.
    ///
    /// A closed peer mailbox only happens during process shutdown; it is
    /// logged and otherwise ignored.
    pub(super) async fn send(&self, to: &PeerHandle, message: Message) {
        let kind = message.kind();
        if let Err(e) = to.send(self.self_handle.clone(), message).await {
            warn!(node = %self.id, peer = %to.id(), kind, error = %e, "send failed");
        }
    }

    // === Handlers ===

    fn on_bootstrap(&mut self, bootstrap: Bootstrap) {
        info!(
            node = %self.id,
            neighbors = bootstrap.neighbors.len(),
            "BOOTSTRAP message received"
        );

        self.neighbors = bootstrap.neighbors;

        if bootstrap.is_starter {
            info!(node = %self.id, "protocol starter");
            // The starter initializes itself after the bootstrap delay so
            // every node has its neighbor set before the flood begins.
            schedule_self(
                &self.self_handle,
                self.timing.bootstrap_delay(),
                Message::Initialize,
            );
        }
    }

    /// First Initialize fixes the parent edge and floods outward.
    ///
    /// The starter receives its Initialize from itself, so its holder edge
    /// points at self and it becomes the initial token holder.
    async fn on_initialize(&mut self, from: PeerHandle) {
        info!(node = %self.id, from = %from.id(), "INITIALIZE message received");

        if !matches!(self.phase, Phase::Uninitialized) {
            debug!(node = %self.id, from = %from.id(), "repeat INITIALIZE ignored");
            return;
        }

        self.phase = Phase::Normal;
        self.holder = Some(from.clone());

        for neighbor in &self.neighbors {
            if *neighbor != from {
                self.send(neighbor, Message::Initialize).await;
            }
        }
    }

    async fn on_request(&mut self, from: PeerHandle) {
        info!(node = %self.id, from = %from.id(), "REQUEST message received");

        self.request_queue.push_back(from);

        // Resumption is deferred while recovering; the queue entry is kept
        // and served once reconciliation completes.
        if !self.phase.is_recovering() {
            self.assign_privilege().await;
            self.make_request().await;
        }
    }

    /// Privilege updates the holder edge even while recovering (but never
    /// while crashed). The reconciler reads `holder == self` to detect a
    /// token that crossed the crash.
    async fn on_privilege(&mut self, from: PeerHandle) {
        info!(node = %self.id, from = %from.id(), "PRIVILEGE message received");

        self.holder = Some(self.self_handle.clone());

        if !self.phase.is_recovering() {
            self.assign_privilege().await;
            self.make_request().await;
        }
    }

    /// Answer a recovering neighbor with this node's view of the shared
    /// edge. State is not paused; the advisory may be stale on arrival.
    async fn on_restart(&mut self, from: PeerHandle) {
        info!(node = %self.id, from = %from.id(), "RESTART message received");

        let advisory = crate::protocol::Advisory {
            peer_is_holder: self.holder.as_ref() == Some(&from),
            peer_in_request_queue: self.request_queue.contains(&from),
            asked: self.asked,
        };

        self.send(&from, Message::Advise(advisory)).await;
    }

    async fn on_exit_critical_section(&mut self) {
        // Timers cannot be revoked; a stale exit timer after a phase
        // change must not touch state.
        if !self.phase.is_normal() {
            debug!(node = %self.id, "stale EXIT_CS timer ignored");
            return;
        }

        info!(node = %self.id, "EXIT critical section");

        self.using = false;
        self.assign_privilege().await;
        self.make_request().await;
    }

    /// The crash duration has elapsed; start collecting advisories.
    async fn on_recovery(&mut self) {
        if !self.phase.is_crashed() {
            debug!(node = %self.id, "stale RECOVERY timer ignored");
            return;
        }

        info!(node = %self.id, "node starts RECOVERY");

        self.phase = Phase::Recovering;
        for neighbor in &self.neighbors {
            self.send(neighbor, Message::Restart).await;
        }
    }

    async fn on_user_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::Request => {
                if self.phase.is_crashed() {
                    warn!(node = %self.id, "crashed node cannot accept REQUEST commands");
                    return;
                }

                info!(node = %self.id, "REQUEST command received from user");
                self.request_queue.push_back(self.self_handle.clone());

                if !self.phase.is_recovering() {
                    self.assign_privilege().await;
                    self.make_request().await;
                }
            }
            UserCommand::Crash => {
                if self.phase.is_normal() && !self.using {
                    info!(node = %self.id, "CRASH command received from user");
                    self.crash();
                } else {
                    warn!(
                        node = %self.id,
                        phase = %self.phase,
                        using = self.using,
                        "node cannot accept CRASH commands in this state"
                    );
                }
            }
            UserCommand::Inspect(reply) => {
                // Read-only; answered in every phase.
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Wipe state and mask the node for the crash duration.
    ///
    /// The crash duration must exceed the worst-case in-flight delivery
    /// latency, so every message this node sent before crashing has been
    /// received by the time recovery starts.
    fn crash(&mut self) {
        info!(node = %self.id, "node CRASHED");

        self.phase = Phase::Crashed;
        self.holder = None;
        self.using = false;
        self.asked = false;
        self.request_queue.clear();
        self.advise_buffer.clear();

        schedule_self(&self.self_handle, self.timing.crash(), Message::Recovery);
    }
}
