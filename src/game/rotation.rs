use crate::types::SessionId;

/// Tracks which players have judged in the current round-cycle.
///
/// Selection is deterministic: the first player in join order whose id is
/// not yet in the history becomes the next judge. When every current
/// player has judged, the history is cleared and reseeded with the first
/// player -- that reseed is the cycle-completion signal the caller uses to
/// bump the round number. Ids of departed players may linger in the
/// history; they are never matched against and age out at the reseed.
#[derive(Debug, Default)]
pub struct JudgeRotation {
    judged: Vec<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The cycle continues with this judge.
    Next(SessionId),
    /// Every player had judged; the rotation reseeded with this judge.
    CycleComplete(SessionId),
}

impl JudgeRotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next judge from `players` (stable join order). Returns
    /// `None` only when the player list is empty.
    pub fn advance(&mut self, players: &[SessionId]) -> Option<Advance> {
        if let Some(next) = players.iter().find(|id| !self.judged.contains(id)) {
            self.judged.push(next.clone());
            return Some(Advance::Next(next.clone()));
        }

        let first = players.first()?;
        self.judged.clear();
        self.judged.push(first.clone());
        Some(Advance::CycleComplete(first.clone()))
    }

    /// The current judge is the most recently appended id.
    pub fn current_judge(&self) -> Option<&SessionId> {
        self.judged.last()
    }

    pub fn reset(&mut self) {
        self.judged.clear();
    }
}
