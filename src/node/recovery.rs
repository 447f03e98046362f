//! Advisory collection and state reconciliation after a crash.

use tracing::{debug, info};

use super::{Node, Phase};
use crate::protocol::Advisory;
use crate::transport::PeerHandle;

impl Node {
    /// Buffer a neighbor's advisory; reconcile once one is held per neighbor.
    pub(super) async fn on_advise(&mut self, from: PeerHandle, advisory: Advisory) {
        info!(node = %self.id, from = %from.id(), "ADVISE message received");

        if !self.phase.is_recovering() {
            // A straggler from an earlier recovery round; buffering it
            // would poison the next reconciliation.
            debug!(node = %self.id, from = %from.id(), "stray ADVISE ignored");
            return;
        }

        self.advise_buffer.insert(from, advisory);

        let complete = self
            .neighbors
            .iter()
            .all(|neighbor| self.advise_buffer.contains_key(neighbor));
        if complete {
            self.reconcile().await;
        }
    }

    /// Rebuild holder, asked, and the request queue from the advisories,
    /// then resume normal participation.
    ///
    /// Runs exactly once per recovery: the buffer is drained here, and the
    /// phase change makes any late duplicate advisory a dropped straggler.
    async fn reconcile(&mut self) {
        self.using = false;
        self.asked = false;

        // holder == self only if a Privilege was delivered during recovery.
        // That Privilege postdates its sender's advisory, which therefore
        // carries a stale view of the edge.
        let holds_privilege = self.holds_token();
        if !holds_privilege {
            self.holder = Some(self.self_handle.clone());
        }

        let advisories = std::mem::take(&mut self.advise_buffer);
        for (neighbor, advisory) in &advisories {
            if !advisory.peer_is_holder {
                if holds_privilege {
                    // The neighbor's view predates the Privilege that
                    // delivered the token here. The token was requested
                    // from this side, so the local request is restored.
                    self.asked = true;
                    let self_handle = self.self_handle.clone();
                    self.enqueue_once(self_handle);
                } else {
                    // The token lies in this neighbor's direction.
                    self.holder = Some(neighbor.clone());
                    if advisory.peer_in_request_queue {
                        // The neighbor still carries a Request from this
                        // node, so the outstanding ask and the local queue
                        // entry behind it are restored.
                        self.asked = true;
                        let self_handle = self.self_handle.clone();
                        self.enqueue_once(self_handle);
                    }
                }
            } else if advisory.asked {
                // The neighbor sees this node as its holder and has an
                // outstanding Request toward it.
                self.enqueue_once(neighbor.clone());
            }
        }

        self.phase = Phase::Normal;

        let holder_id = self.holder.as_ref().map(|h| h.id().as_u32());
        let queue_ids: Vec<u32> = self.request_queue.iter().map(|h| h.id().as_u32()).collect();
        info!(
            node = %self.id,
            holder = ?holder_id,
            asked = self.asked,
            queue = ?queue_ids,
            using = self.using,
            "node completed RECOVERY"
        );

        self.assign_privilege().await;
        self.make_request().await;
    }

    /// Append unless already queued. Reconciliation may reach the same
    /// entry through several advisory branches; one queue slot per peer
    /// (self included) is sufficient and required.
    fn enqueue_once(&mut self, handle: PeerHandle) {
        if !self.request_queue.contains(&handle) {
            self.request_queue.push_back(handle);
        }
    }
}
