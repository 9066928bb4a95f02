use crate::types::{JudgeGuess, SessionId};

/// Point resolution for a round that reached Scores with an accepted
/// article. Exactly one outcome fires per round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// The judge found the truth-teller: both score a point.
    JudgeAndTruthTeller { truth_player: SessionId },
    /// The judge called "[None of the above]" and the truth-teller really
    /// had not submitted: the judge alone scores.
    JudgeOnly,
    /// The judge fell for a fabricated description: the liar scores.
    ConvincingLie { liar: SessionId },
    /// The judge called "[None of the above]" although the truth-teller
    /// did submit: nobody scores.
    NoAward,
    /// Time ran out with no guess: no scoring at all.
    NoGuess,
}

/// Resolve the judge's guess against the designated truth-teller and
/// whether that player actually submitted a description.
pub fn resolve(
    guess: &JudgeGuess,
    truth_player: Option<&SessionId>,
    truth_submitted: bool,
) -> ScoreOutcome {
    match guess {
        JudgeGuess::Unset => ScoreOutcome::NoGuess,
        JudgeGuess::NoneOfTheAbove => {
            if truth_submitted {
                ScoreOutcome::NoAward
            } else {
                ScoreOutcome::JudgeOnly
            }
        }
        JudgeGuess::Player(picked) => {
            if truth_submitted && truth_player == Some(picked) {
                ScoreOutcome::JudgeAndTruthTeller {
                    truth_player: picked.clone(),
                }
            } else {
                ScoreOutcome::ConvincingLie {
                    liar: picked.clone(),
                }
            }
        }
    }
}
