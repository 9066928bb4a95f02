use serde::{Deserialize, Serialize};

/// Opaque per-connection session identifier (ULID string).
pub type SessionId = String;

/// Option id the judge submits when they believe the truth-teller never
/// submitted a description. Must never collide with a session id.
pub const NONE_OF_THE_ABOVE_ID: &str = "[None of the above]";

/// Top-level lifecycle state of a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GameState {
    Waiting,
    Lobby,
    Playing,
}

/// Sub-state within an active round. `Idle` is the parked state used while
/// the lifecycle is not `Playing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlayState {
    Idle,
    Starting,
    ChooseArticle,
    Research,
    Judging,
    Scores,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: SessionId,
    pub nickname: String,
    pub score: u32,
}

impl Player {
    pub fn new(id: SessionId, nickname: String) -> Self {
        Self {
            id,
            nickname,
            score: 0,
        }
    }
}

/// A proposed reference article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub url: String,
}

/// A non-judge player's verdict on the proposed article.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArticleDecision {
    Approve,
    Reject,
}

/// The judge's final choice, set by action or left unset on timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeGuess {
    Unset,
    NoneOfTheAbove,
    Player(SessionId),
}

/// Per-phase timer durations in seconds. The judging duration is the only
/// one scaled by player count; that happens once at game start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDurations {
    pub starting: u64,
    pub choose_article: u64,
    pub research: u64,
    pub judging: u64,
    pub scores: u64,
}

impl PhaseDurations {
    pub fn for_phase(&self, phase: PlayState) -> u64 {
        match phase {
            PlayState::Idle => 0,
            PlayState::Starting => self.starting,
            PlayState::ChooseArticle => self.choose_article,
            PlayState::Research => self.research,
            PlayState::Judging => self.judging,
            PlayState::Scores => self.scores,
        }
    }
}

/// Room and game rules, fixed at construction.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub min_players: usize,
    pub max_players: usize,
    pub nickname_max_chars: usize,
    pub chat_max_chars: usize,
    pub description_max_chars: usize,
    pub starting_seconds: u64,
    pub choose_article_seconds: u64,
    pub research_seconds: u64,
    /// Judging gets this many seconds per non-judge player.
    pub judging_seconds_per_player: u64,
    pub scores_seconds: u64,
    /// Minimum fraction of non-judge players that must approve an article.
    pub approval_fraction: f64,
    /// Research does not end on timeout with fewer descriptions than this.
    pub min_descriptions: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 3,
            max_players: 12,
            nickname_max_chars: 16,
            chat_max_chars: 256,
            description_max_chars: 256,
            starting_seconds: 10,
            choose_article_seconds: 10,
            research_seconds: 90,
            judging_seconds_per_player: 90,
            scores_seconds: 15,
            approval_fraction: 0.5,
            min_descriptions: 2,
        }
    }
}

impl GameConfig {
    /// Compute the duration table for a game starting with `player_count`
    /// players. Judging scales with the number of non-judge players.
    pub fn durations_for(&self, player_count: usize) -> PhaseDurations {
        PhaseDurations {
            starting: self.starting_seconds,
            choose_article: self.choose_article_seconds,
            research: self.research_seconds,
            judging: self.judging_seconds_per_player * player_count.saturating_sub(1) as u64,
            scores: self.scores_seconds,
        }
    }
}
