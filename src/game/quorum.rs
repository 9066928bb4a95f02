use crate::types::{ArticleDecision, SessionId};
use std::collections::HashMap;

/// Outcome of tallying the article vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumOutcome {
    Accepted,
    Rejected,
}

/// One approve/reject decision per non-judge player; a later vote from
/// the same player overwrites the earlier one.
#[derive(Debug, Default)]
pub struct ArticleApprovalQuorum {
    decisions: HashMap<SessionId, ArticleDecision>,
}

impl ArticleApprovalQuorum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, voter: SessionId, decision: ArticleDecision) {
        self.decisions.insert(voter, decision);
    }

    /// Approvals needed for `eligible_voters` non-judge players.
    pub fn required_approvals(eligible_voters: usize, approval_fraction: f64) -> usize {
        (approval_fraction * eligible_voters as f64).ceil() as usize
    }

    /// Any single reject forces rejection. Otherwise the article is
    /// accepted iff enough approvals came in; abstentions lower the
    /// approve count but do not count as rejects.
    pub fn resolve(&self, eligible_voters: usize, approval_fraction: f64) -> QuorumOutcome {
        if self
            .decisions
            .values()
            .any(|d| *d == ArticleDecision::Reject)
        {
            return QuorumOutcome::Rejected;
        }

        let approvals = self
            .decisions
            .values()
            .filter(|d| **d == ArticleDecision::Approve)
            .count();
        if approvals >= Self::required_approvals(eligible_voters, approval_fraction) {
            QuorumOutcome::Accepted
        } else {
            QuorumOutcome::Rejected
        }
    }
}
