use crate::types::SessionId;
use std::collections::HashMap;

/// What a submission did to the collection. The caller sends the private
/// "received" acknowledgment only on the first submission; overwrites
/// stay silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    First,
    Overwritten,
}

/// One free-text article description per eligible player. Eligibility
/// (room member, not the judge) is checked by the caller, which silently
/// drops anything else.
#[derive(Debug, Default)]
pub struct DescriptionCollector {
    descriptions: HashMap<SessionId, String>,
}

impl DescriptionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a submission, truncating to `max_chars`.
    pub fn submit(&mut self, author: SessionId, text: &str, max_chars: usize) -> SubmissionOutcome {
        let truncated: String = text.chars().take(max_chars).collect();
        match self.descriptions.insert(author, truncated) {
            None => SubmissionOutcome::First,
            Some(_) => SubmissionOutcome::Overwritten,
        }
    }

    pub fn count(&self) -> usize {
        self.descriptions.len()
    }

    pub fn minimum_reached(&self, minimum: usize) -> bool {
        self.count() >= minimum
    }

    pub fn has_submitted(&self, author: &SessionId) -> bool {
        self.descriptions.contains_key(author)
    }

    pub fn get(&self, author: &SessionId) -> Option<&String> {
        self.descriptions.get(author)
    }

    pub fn authors(&self) -> Vec<SessionId> {
        self.descriptions.keys().cloned().collect()
    }
}
