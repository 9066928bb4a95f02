use super::descriptions::DescriptionCollector;
use super::quorum::ArticleApprovalQuorum;
use crate::types::{Article, JudgeGuess, SessionId};

/// All round-scoped state, rebuilt at every ChooseArticle entry and
/// dropped when Scores has resolved. Bundling it in one value means a new
/// round can never leak a stale article, vote, or guess from the last one.
#[derive(Debug)]
pub struct RoundContext {
    /// Monotonic token matched against article-fetch completions so a
    /// late response for a superseded round is discarded.
    pub generation: u64,
    pub article: Option<Article>,
    pub decisions: ArticleApprovalQuorum,
    pub descriptions: DescriptionCollector,
    pub truth_player: Option<SessionId>,
    pub judge_guess: JudgeGuess,
}

impl RoundContext {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            article: None,
            decisions: ArticleApprovalQuorum::new(),
            descriptions: DescriptionCollector::new(),
            truth_player: None,
            judge_guess: JudgeGuess::Unset,
        }
    }
}
