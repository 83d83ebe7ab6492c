//! `QUORUM_VOTE`: majority decision latching across registered instances.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::ids::InstanceId;
use claudebench_core::key::Key;
use claudebench_core::Result;
use claudebench_storage::StoreOp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tally and latched outcome of one quorum decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumDecision {
    /// Decision identifier, caller-supplied.
    pub id: String,
    /// Voter -> cast option.
    pub votes: HashMap<InstanceId, String>,
    /// Option -> vote count, derived from `votes`.
    pub tally: HashMap<String, u32>,
    /// Number of instances eligible to vote when this decision was opened.
    pub total_instances: u32,
    /// The winning option, once a strict majority has voted for it. Once
    /// set, further votes are still recorded but never change it — a
    /// decision latches.
    pub decided: Option<String>,
}

impl QuorumDecision {
    fn majority(&self) -> u32 {
        self.total_instances / 2 + 1
    }
}

/// Facade over the quorum-decision keyspace.
pub struct QuorumTracker {
    executor: AtomicExecutor,
}

impl QuorumTracker {
    /// Build a quorum tracker over a shared executor.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self { executor }
    }

    /// `QUORUM_VOTE(decisionId, voter, option, totalInstances)`. Casts or
    /// replaces `voter`'s vote and re-tallies. `total_instances` is only
    /// used to open a new decision; an existing decision keeps the total
    /// it was opened with, so a vote cast after the cluster has grown or
    /// shrunk doesn't retroactively change what counts as a majority.
    pub fn vote(
        &self,
        decision_id: &str,
        voter: &InstanceId,
        option: &str,
        total_instances: u32,
    ) -> Result<QuorumDecision> {
        let decision_id = decision_id.to_string();
        let voter = voter.clone();
        let option = option.to_string();
        self.executor.execute("QUORUM_VOTE", move |store, _now| {
            let key = Key::quorum_decision(&decision_id).as_str().to_string();
            let mut decision: QuorumDecision = store
                .get_string(&key, _now)
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or(QuorumDecision {
                    id: decision_id.clone(),
                    votes: HashMap::new(),
                    tally: HashMap::new(),
                    total_instances,
                    decided: None,
                });

            if let Some(previous) = decision.votes.insert(voter.clone(), option.clone()) {
                if let Some(count) = decision.tally.get_mut(&previous) {
                    *count = count.saturating_sub(1);
                }
            }
            *decision.tally.entry(option.clone()).or_insert(0) += 1;

            if decision.decided.is_none() {
                let majority = decision.majority();
                if let Some((winner, _)) = decision
                    .tally
                    .iter()
                    .find(|(_, &count)| count >= majority)
                {
                    decision.decided = Some(winner.clone());
                }
            }

            let ops = vec![StoreOp::SetString {
                key,
                value: serde_json::to_string(&decision)?,
                expire_at_ms: None,
            }];
            Ok((decision, ops))
        })
    }

    /// Current state of a decision, or `None` if no vote has been cast yet.
    pub fn get(&self, decision_id: &str) -> Option<QuorumDecision> {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        store
            .get_string(Key::quorum_decision(decision_id).as_str(), now)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;
    use std::sync::Arc;

    fn tracker() -> QuorumTracker {
        QuorumTracker::new(AtomicExecutor::in_memory(Arc::new(TestClock::new(0))))
    }

    #[test]
    fn decision_latches_once_strict_majority_reached() {
        let q = tracker();
        q.vote("d-1", &InstanceId::from("a"), "yes", 5).unwrap();
        q.vote("d-1", &InstanceId::from("b"), "yes", 5).unwrap();
        let after_two = q.get("d-1").unwrap();
        assert!(after_two.decided.is_none());

        q.vote("d-1", &InstanceId::from("c"), "yes", 5).unwrap();
        let after_three = q.get("d-1").unwrap();
        assert_eq!(after_three.decided.as_deref(), Some("yes"));
    }

    #[test]
    fn revote_moves_the_tally() {
        let q = tracker();
        q.vote("d-1", &InstanceId::from("a"), "no", 3).unwrap();
        q.vote("d-1", &InstanceId::from("a"), "yes", 3).unwrap();
        let decision = q.get("d-1").unwrap();
        assert_eq!(decision.tally.get("no").copied().unwrap_or(0), 0);
        assert_eq!(decision.tally.get("yes").copied().unwrap_or(0), 1);
    }

    #[test]
    fn decision_never_undecides_once_latched() {
        let q = tracker();
        q.vote("d-1", &InstanceId::from("a"), "yes", 2).unwrap();
        q.vote("d-1", &InstanceId::from("b"), "yes", 2).unwrap();
        assert!(q.get("d-1").unwrap().decided.is_some());
        q.vote("d-1", &InstanceId::from("c"), "no", 2).unwrap();
        assert_eq!(q.get("d-1").unwrap().decided.as_deref(), Some("yes"));
    }
}
