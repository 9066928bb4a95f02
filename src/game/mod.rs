//! Single-threaded game core.
//!
//! Everything that can happen to a room arrives as one [`GameEvent`]
//! through [`Game::handle`]: the periodic tick, player joins and leaves,
//! player commands, and article-fetch completions. At most one phase
//! transition fully completes (including all emitted messages) per event.

pub mod clock;
pub mod descriptions;
pub mod phase;
pub mod quorum;
pub mod rotation;
pub mod round;
pub mod score;

use crate::messenger::Messenger;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::*;
use descriptions::SubmissionOutcome;
use phase::Entry;
use quorum::ArticleApprovalQuorum;
use rotation::JudgeRotation;
use round::RoundContext;
use std::time::Instant;

/// Single entry point for "what happened".
#[derive(Debug, Clone)]
pub enum GameEvent {
    Tick,
    PlayerJoined {
        session_id: SessionId,
        nickname: String,
    },
    PlayerLeft {
        session_id: SessionId,
    },
    Command {
        session_id: SessionId,
        message: ClientMessage,
    },
    ArticleResolved {
        generation: u64,
        article: Article,
    },
}

pub struct Game {
    config: GameConfig,
    state: GameState,
    play_state: PlayState,
    round_number: u32,
    durations: PhaseDurations,
    phase_started_at: Instant,
    last_time_left: Option<i64>,
    /// Join order; judge rotation fairness depends on this being stable.
    players: Vec<Player>,
    rotation: JudgeRotation,
    round: Option<RoundContext>,
    next_generation: u64,
    pending_article_request: Option<u64>,
    messenger: Box<dyn Messenger>,
}

impl Game {
    pub fn new(config: GameConfig, messenger: Box<dyn Messenger>, now: Instant) -> Self {
        let durations = config.durations_for(config.min_players);
        Self {
            config,
            state: GameState::Lobby,
            play_state: PlayState::Idle,
            round_number: 0,
            durations,
            phase_started_at: now,
            last_time_left: None,
            players: Vec::new(),
            rotation: JudgeRotation::new(),
            round: None,
            next_generation: 0,
            pending_article_request: None,
            messenger,
        }
    }

    pub fn handle(&mut self, event: GameEvent, now: Instant) {
        match event {
            GameEvent::Tick => self.update(now),
            GameEvent::PlayerJoined {
                session_id,
                nickname,
            } => self.player_joined(session_id, nickname),
            GameEvent::PlayerLeft { session_id } => self.player_left(&session_id, now),
            GameEvent::Command {
                session_id,
                message,
            } => self.command(&session_id, message, now),
            GameEvent::ArticleResolved {
                generation,
                article,
            } => self.article_resolved(generation, article),
        }
    }

    /// An article fetch the driver should start, if a phase entry
    /// requested one since the last call.
    pub fn take_article_request(&mut self) -> Option<u64> {
        self.pending_article_request.take()
    }

    // *** Lifecycle ***

    pub fn set_game_state(&mut self, new_state: GameState, now: Instant) -> Result<(), String> {
        if new_state == self.state {
            return Ok(());
        }

        match new_state {
            GameState::Waiting => {
                if self.state != GameState::Playing {
                    return Err("Must be in Playing state to enter Waiting".to_string());
                }
                self.state = GameState::Waiting;
                self.set_play_state(PlayState::Idle, Entry::Normal, now);
            }
            GameState::Lobby => {
                self.round_number = 0;
                self.state = GameState::Lobby;
                self.round = None;
                self.set_play_state(PlayState::Idle, Entry::Normal, now);
                self.messenger.broadcast(ServerMessage::ClearDisplay);
            }
            GameState::Playing => {
                if self.players.len() < self.config.min_players {
                    return Err("Not enough players to start game".to_string());
                }
                self.durations = self.config.durations_for(self.players.len());
                // A game resumed from Waiting keeps its round count; only a
                // fresh start from the lobby resets it.
                if self.state == GameState::Lobby {
                    self.round_number = 1;
                    self.rotation.reset();
                }
                self.state = GameState::Playing;
                self.set_play_state(PlayState::Starting, Entry::Normal, now);
            }
        }

        self.broadcast_status(now);
        Ok(())
    }

    /// Called every tick. Only drives phase logic while Playing.
    fn update(&mut self, now: Instant) {
        if self.state != GameState::Playing {
            return;
        }

        let left = clock::time_left(&self.durations, self.play_state, self.phase_started_at, now);
        if self.last_time_left != Some(left) {
            self.last_time_left = Some(left);
            self.broadcast_status(now);
        }

        if self.players.len() < self.config.min_players {
            let _ = self.set_game_state(GameState::Waiting, now);
            self.messenger
                .broadcast(ServerMessage::chat("Not enough players, waiting..."));
            return;
        }

        self.step_phase(left, now);
    }

    // *** Players ***

    fn player_joined(&mut self, session_id: SessionId, nickname: String) {
        let nickname = if nickname.is_empty() {
            "DefaultNick".to_string()
        } else {
            nickname.chars().take(self.config.nickname_max_chars).collect()
        };

        tracing::info!("Player joined: {} ({})", nickname, session_id);
        self.players.push(Player::new(session_id, nickname.clone()));
        self.messenger
            .broadcast(ServerMessage::chat(format!("{nickname} joined.")));
    }

    fn player_left(&mut self, session_id: &SessionId, now: Instant) {
        let Some(pos) = self.players.iter().position(|p| p.id == *session_id) else {
            return;
        };
        let player = self.players.remove(pos);
        tracing::info!("Player left: {} ({})", player.nickname, session_id);
        self.messenger
            .broadcast(ServerMessage::chat(format!("{} left.", player.nickname)));

        if self.state != GameState::Playing {
            return;
        }

        if self.players.len() < self.config.min_players {
            let _ = self.set_game_state(GameState::Waiting, now);
            self.messenger
                .broadcast(ServerMessage::chat("Not enough players, waiting..."));
            return;
        }

        // A departing judge or truth-teller would leave the round pointing
        // at a dead session: abort the turn and rotate to the next judge.
        let held_role = self.current_judge() == Some(session_id)
            || self
                .round
                .as_ref()
                .is_some_and(|r| r.truth_player.as_ref() == Some(session_id));
        if held_role && self.play_state != PlayState::Idle {
            self.messenger.broadcast(ServerMessage::chat(format!(
                "{} held a role this turn. Skipping to the next judge.",
                player.nickname
            )));
            // Same-phase Normal entry is a no-op; drop to Idle first so a
            // judge leaving during ChooseArticle still rotates the judge.
            self.play_state = PlayState::Idle;
            self.set_play_state(PlayState::ChooseArticle, Entry::Normal, now);
        }
    }

    // *** Inbound commands ***

    fn command(&mut self, sender: &SessionId, message: ClientMessage, now: Instant) {
        match message {
            ClientMessage::StartGame => match self.set_game_state(GameState::Playing, now) {
                Ok(()) => self
                    .messenger
                    .broadcast(ServerMessage::chat("Starting game...")),
                Err(e) => self.messenger.broadcast(ServerMessage::chat(e)),
            },
            ClientMessage::StopGame => match self.set_game_state(GameState::Lobby, now) {
                Ok(()) => self
                    .messenger
                    .broadcast(ServerMessage::chat("Stopping game...")),
                Err(e) => self.messenger.broadcast(ServerMessage::chat(e)),
            },
            ClientMessage::ArticleVote { decision } => self.article_vote(sender, decision),
            ClientMessage::SubmitDescription { text } => self.submit_description(sender, &text),
            ClientMessage::JudgeChoice { choice } => self.judge_choice(sender, choice, now),
            ClientMessage::Chat { text } => self.chat(sender, &text),
        }
    }

    fn article_vote(&mut self, sender: &SessionId, decision: ArticleDecision) {
        if self.state != GameState::Playing || self.play_state != PlayState::ChooseArticle {
            return;
        }
        if !self.is_member(sender) || self.current_judge() == Some(sender) {
            return;
        }
        if let Some(round) = self.round.as_mut() {
            round.decisions.record(sender.clone(), decision);
        }
    }

    fn submit_description(&mut self, sender: &SessionId, text: &str) {
        if self.state != GameState::Playing || self.play_state != PlayState::Research {
            return;
        }
        if !self.is_member(sender) || self.current_judge() == Some(sender) {
            return;
        }
        let max = self.config.description_max_chars;
        let Some(round) = self.round.as_mut() else {
            return;
        };
        let outcome = round.descriptions.submit(sender.clone(), text, max);
        if outcome == SubmissionOutcome::First {
            self.messenger
                .send_to(sender, ServerMessage::chat("Description received!"));
        }
    }

    fn judge_choice(&mut self, sender: &SessionId, choice: String, now: Instant) {
        if self.state != GameState::Playing || self.play_state != PlayState::Judging {
            return;
        }
        if self.current_judge() != Some(sender) {
            return;
        }
        let Some(round) = self.round.as_mut() else {
            return;
        };

        let guess = if choice == NONE_OF_THE_ABOVE_ID {
            JudgeGuess::NoneOfTheAbove
        } else if round.descriptions.has_submitted(&choice) {
            JudgeGuess::Player(choice)
        } else {
            // Not an offered option; ignore.
            return;
        };

        round.judge_guess = guess;
        // The judge's decision ends the phase immediately.
        self.set_play_state(PlayState::Scores, Entry::Normal, now);
    }

    fn chat(&mut self, sender: &SessionId, text: &str) {
        let Some(nickname) = self.nickname_of(sender) else {
            return;
        };
        let truncated: String = text.chars().take(self.config.chat_max_chars).collect();
        self.messenger
            .broadcast(ServerMessage::chat(format!("[{nickname}] {truncated}")));
    }

    // *** Article fetch completion ***

    fn article_resolved(&mut self, generation: u64, article: Article) {
        if self.state != GameState::Playing || self.play_state != PlayState::ChooseArticle {
            tracing::debug!("Discarding article fetch outside ChooseArticle");
            return;
        }
        let Some(round) = self.round.as_mut() else {
            return;
        };
        if round.generation != generation {
            tracing::debug!(
                "Discarding stale article fetch (generation {} != {})",
                generation,
                round.generation
            );
            return;
        }

        round.article = Some(article.clone());

        let judge = self.current_judge().cloned();
        let eligible = self.players.len().saturating_sub(1);
        let required =
            ArticleApprovalQuorum::required_approvals(eligible, self.config.approval_fraction);
        for player in &self.players {
            if Some(&player.id) == judge.as_ref() {
                continue;
            }
            self.messenger
                .send_to(&player.id, ServerMessage::text("Proposed article title:"));
            self.messenger
                .send_to(&player.id, ServerMessage::text(article.title.clone()));
            self.messenger
                .send_to(&player.id, ServerMessage::DisplayApproveRejectButtons);
            self.messenger.send_to(
                &player.id,
                ServerMessage::text(format!(
                    "At least {required} of {eligible} players must approve."
                )),
            );
        }
    }

    // *** Utility ***

    fn broadcast_status(&mut self, now: Instant) {
        let time_left = if self.state == GameState::Playing {
            clock::clamp_for_display(clock::time_left(
                &self.durations,
                self.play_state,
                self.phase_started_at,
                now,
            ))
        } else {
            0
        };
        self.messenger.broadcast(ServerMessage::GameStatus {
            gamestate: self.state,
            playstate: self.play_state,
            round_number: self.round_number,
            time_left,
        });
    }

    fn is_member(&self, session_id: &SessionId) -> bool {
        self.players.iter().any(|p| p.id == *session_id)
    }

    fn nickname_of(&self, session_id: &SessionId) -> Option<String> {
        self.players
            .iter()
            .find(|p| p.id == *session_id)
            .map(|p| p.nickname.clone())
    }

    fn modify_score(&mut self, session_id: &SessionId, points: u32) {
        if let Some(player) = self.players.iter_mut().find(|p| p.id == *session_id) {
            player.score += points;
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.max_players
    }

    pub fn current_judge(&self) -> Option<&SessionId> {
        self.rotation.current_judge()
    }

    pub fn truth_player(&self) -> Option<&SessionId> {
        self.round.as_ref().and_then(|r| r.truth_player.as_ref())
    }

    pub fn score_of(&self, session_id: &SessionId) -> Option<u32> {
        self.players
            .iter()
            .find(|p| p.id == *session_id)
            .map(|p| p.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::RecordingMessenger;
    use crate::protocol::{Envelope, Target};
    use std::time::Duration;

    struct Harness {
        game: Game,
        messenger: RecordingMessenger,
        now: Instant,
    }

    impl Harness {
        fn new(player_count: usize) -> Self {
            let messenger = RecordingMessenger::new();
            let now = Instant::now();
            let mut game = Game::new(GameConfig::default(), Box::new(messenger.clone()), now);
            for i in 0..player_count {
                game.handle(
                    GameEvent::PlayerJoined {
                        session_id: format!("p{i}"),
                        nickname: format!("Player{i}"),
                    },
                    now,
                );
            }
            Self {
                game,
                messenger,
                now,
            }
        }

        fn command(&mut self, who: &str, message: ClientMessage) {
            self.game.handle(
                GameEvent::Command {
                    session_id: who.to_string(),
                    message,
                },
                self.now,
            );
        }

        fn tick(&mut self) {
            self.game.handle(GameEvent::Tick, self.now);
        }

        /// Advance wall time and tick once.
        fn advance(&mut self, secs: u64) {
            self.now += Duration::from_secs(secs);
            self.tick();
        }

        /// Start the game and run through Starting into ChooseArticle.
        fn start_into_choose_article(&mut self) {
            self.command("p0", ClientMessage::StartGame);
            assert_eq!(self.game.state(), GameState::Playing);
            assert_eq!(self.game.play_state(), PlayState::Starting);
            self.advance(11);
            assert_eq!(self.game.play_state(), PlayState::ChooseArticle);
        }

        fn resolve_article(&mut self) {
            let generation = self
                .game
                .take_article_request()
                .expect("phase entry should request an article");
            self.game.handle(
                GameEvent::ArticleResolved {
                    generation,
                    article: Article {
                        title: "Ball lightning".to_string(),
                        url: "https://en.wikipedia.org/wiki/Ball_lightning".to_string(),
                    },
                },
                self.now,
            );
        }

        fn non_judges(&self) -> Vec<SessionId> {
            let judge = self.game.current_judge().cloned();
            self.game
                .players
                .iter()
                .map(|p| p.id.clone())
                .filter(|id| Some(id) != judge.as_ref())
                .collect()
        }

        fn approve_all(&mut self) {
            for id in self.non_judges() {
                self.command(
                    &id,
                    ClientMessage::ArticleVote {
                        decision: ArticleDecision::Approve,
                    },
                );
            }
        }

        fn sent(&self) -> Vec<Envelope> {
            self.messenger.sent()
        }

        fn chat_messages(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|e| match e.message {
                    ServerMessage::ChatMessage { chatmessage, .. } => Some(chatmessage),
                    _ => None,
                })
                .collect()
        }

        /// Drive one accepted round from ChooseArticle entry all the way
        /// back to the next ChooseArticle entry, without a judge guess.
        fn run_full_round(&mut self) {
            self.resolve_article();
            self.approve_all();
            self.advance(11); // ChooseArticle timeout -> Research
            assert_eq!(self.game.play_state(), PlayState::Research);
            for id in self.non_judges() {
                self.command(
                    &id,
                    ClientMessage::SubmitDescription {
                        text: format!("{id} says something"),
                    },
                );
            }
            self.tick(); // everyone submitted -> Judging
            assert_eq!(self.game.play_state(), PlayState::Judging);
            self.advance(60 * 60); // Judging timeout -> Scores, no guess
            assert_eq!(self.game.play_state(), PlayState::Scores);
            self.advance(16); // Scores timeout -> next ChooseArticle
            assert_eq!(self.game.play_state(), PlayState::ChooseArticle);
        }
    }

    // *** Lifecycle ***

    #[test]
    fn starting_with_too_few_players_fails_with_chat_error() {
        let mut h = Harness::new(2);
        h.command("p0", ClientMessage::StartGame);
        assert_eq!(h.game.state(), GameState::Lobby);
        assert!(h
            .chat_messages()
            .iter()
            .any(|m| m.contains("Not enough players")));
    }

    #[test]
    fn start_from_lobby_resets_round_number() {
        let mut h = Harness::new(3);
        h.command("p0", ClientMessage::StartGame);
        assert_eq!(h.game.state(), GameState::Playing);
        assert_eq!(h.game.round_number(), 1);
    }

    #[test]
    fn dropping_below_minimum_forces_waiting() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        h.game.handle(
            GameEvent::PlayerLeft {
                session_id: "p2".to_string(),
            },
            h.now,
        );
        assert_eq!(h.game.state(), GameState::Waiting);
        assert_eq!(h.game.play_state(), PlayState::Idle);
    }

    #[test]
    fn resuming_from_waiting_preserves_round_number() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        assert_eq!(h.game.round_number(), 1);

        h.game.handle(
            GameEvent::PlayerLeft {
                session_id: "p2".to_string(),
            },
            h.now,
        );
        assert_eq!(h.game.state(), GameState::Waiting);

        h.game.handle(
            GameEvent::PlayerJoined {
                session_id: "p3".to_string(),
                nickname: "Late".to_string(),
            },
            h.now,
        );
        h.command("p0", ClientMessage::StartGame);
        assert_eq!(h.game.state(), GameState::Playing);
        assert_eq!(h.game.round_number(), 1);
    }

    #[test]
    fn stop_returns_to_lobby_and_clears_round() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        h.command("p0", ClientMessage::StopGame);
        assert_eq!(h.game.state(), GameState::Lobby);
        assert_eq!(h.game.play_state(), PlayState::Idle);
        assert_eq!(h.game.round_number(), 0);
    }

    #[test]
    fn waiting_cannot_be_entered_from_lobby() {
        let mut h = Harness::new(3);
        let result = h.game.set_game_state(GameState::Waiting, h.now);
        assert!(result.is_err());
        assert_eq!(h.game.state(), GameState::Lobby);
    }

    #[test]
    fn status_is_rebroadcast_only_when_time_left_changes() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        h.messenger.clear();

        // Several ticks within the same second: one visible time change at most.
        h.tick();
        let after_first: usize = h
            .sent()
            .iter()
            .filter(|e| matches!(e.message, ServerMessage::GameStatus { .. }))
            .count();
        h.tick();
        h.tick();
        let after_more: usize = h
            .sent()
            .iter()
            .filter(|e| matches!(e.message, ServerMessage::GameStatus { .. }))
            .count();
        assert_eq!(after_first, after_more);

        h.advance(1);
        let after_second: usize = h
            .sent()
            .iter()
            .filter(|e| matches!(e.message, ServerMessage::GameStatus { .. }))
            .count();
        assert_eq!(after_second, after_more + 1);
    }

    // *** Judge rotation at game level ***

    #[test]
    fn judges_rotate_fairly_and_round_increments_per_cycle() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();

        let mut judges = Vec::new();
        for _ in 0..4 {
            judges.push(h.game.current_judge().cloned().unwrap());
            h.run_full_round();
        }
        assert_eq!(judges, vec!["p0", "p1", "p2", "p3"]);
        assert_eq!(h.game.round_number(), 1);

        // Fifth entry completes the cycle: same first judge, next round.
        assert_eq!(h.game.current_judge().unwrap(), "p0");
        assert_eq!(h.game.round_number(), 2);
    }

    // *** Article vote ***

    #[test]
    fn rejected_article_restarts_phase_with_same_judge() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        let judge = h.game.current_judge().cloned().unwrap();
        h.resolve_article();

        // 3 voters with fraction 0.5: two approvals would carry it, but a
        // single reject short-circuits.
        let voters = h.non_judges();
        h.command(
            &voters[0],
            ClientMessage::ArticleVote {
                decision: ArticleDecision::Reject,
            },
        );
        h.command(
            &voters[1],
            ClientMessage::ArticleVote {
                decision: ArticleDecision::Approve,
            },
        );
        h.command(
            &voters[2],
            ClientMessage::ArticleVote {
                decision: ArticleDecision::Approve,
            },
        );

        h.advance(11);
        assert_eq!(h.game.play_state(), PlayState::ChooseArticle);
        assert_eq!(h.game.current_judge().unwrap(), &judge);
        assert_eq!(h.game.round_number(), 1);
        // The restart requested a fresh article.
        assert!(h.game.take_article_request().is_some());
        assert!(h
            .chat_messages()
            .iter()
            .any(|m| m.contains("choosing a new one")));
    }

    #[test]
    fn unresolved_article_at_timeout_restarts_instead_of_stalling() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        let generation = h.game.take_article_request().unwrap();

        h.advance(11);
        assert_eq!(h.game.play_state(), PlayState::ChooseArticle);
        let next = h.game.take_article_request().unwrap();
        assert!(next > generation);
    }

    #[test]
    fn stale_article_resolution_is_discarded() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        let stale = h.game.take_article_request().unwrap();

        // Timeout with no article: restart bumps the generation.
        h.advance(11);
        h.messenger.clear();

        h.game.handle(
            GameEvent::ArticleResolved {
                generation: stale,
                article: Article {
                    title: "Old news".to_string(),
                    url: "https://example.org".to_string(),
                },
            },
            h.now,
        );
        // Nobody is shown vote controls for a superseded round.
        assert!(!h
            .sent()
            .iter()
            .any(|e| matches!(e.message, ServerMessage::DisplayApproveRejectButtons)));
    }

    #[test]
    fn judge_vote_is_silently_ignored() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        h.resolve_article();
        let judge = h.game.current_judge().cloned().unwrap();

        // Only the judge "votes" reject; abstainers reject the quorum
        // anyway, so approve from both others should carry it.
        h.command(
            &judge,
            ClientMessage::ArticleVote {
                decision: ArticleDecision::Reject,
            },
        );
        h.approve_all();
        h.advance(11);
        assert_eq!(h.game.play_state(), PlayState::Research);
    }

    #[test]
    fn article_resolution_shows_controls_to_non_judges_only() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        h.messenger.clear();
        h.resolve_article();

        let judge = h.game.current_judge().cloned().unwrap();
        let button_targets: Vec<Target> = h
            .sent()
            .into_iter()
            .filter(|e| matches!(e.message, ServerMessage::DisplayApproveRejectButtons))
            .map(|e| e.target)
            .collect();
        assert_eq!(button_targets.len(), 2);
        assert!(!button_targets.contains(&Target::One(judge)));
    }

    // *** Research / description collection ***

    fn into_research(h: &mut Harness) {
        h.resolve_article();
        h.approve_all();
        h.advance(11);
        assert_eq!(h.game.play_state(), PlayState::Research);
    }

    #[test]
    fn all_submissions_advance_immediately_before_timeout() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_research(&mut h);

        for id in h.non_judges() {
            h.command(
                &id,
                ClientMessage::SubmitDescription {
                    text: "something".to_string(),
                },
            );
        }
        // No time has passed; the fill state alone advances the phase.
        h.tick();
        assert_eq!(h.game.play_state(), PlayState::Judging);
    }

    #[test]
    fn timeout_below_minimum_submissions_does_not_advance() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_research(&mut h);

        let submitter = h.non_judges()[0].clone();
        h.command(
            &submitter,
            ClientMessage::SubmitDescription {
                text: "only one".to_string(),
            },
        );
        h.advance(91);
        assert_eq!(h.game.play_state(), PlayState::Research);
    }

    #[test]
    fn timeout_at_minimum_submissions_advances() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_research(&mut h);

        for id in h.non_judges().into_iter().take(2) {
            h.command(
                &id,
                ClientMessage::SubmitDescription {
                    text: "beep".to_string(),
                },
            );
        }
        h.advance(91);
        assert_eq!(h.game.play_state(), PlayState::Judging);
    }

    #[test]
    fn first_description_is_acknowledged_once() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        into_research(&mut h);

        let submitter = h.non_judges()[0].clone();
        h.messenger.clear();
        h.command(
            &submitter,
            ClientMessage::SubmitDescription {
                text: "v1".to_string(),
            },
        );
        h.command(
            &submitter,
            ClientMessage::SubmitDescription {
                text: "v2".to_string(),
            },
        );

        let acks = h
            .sent()
            .iter()
            .filter(|e| {
                e.target == Target::One(submitter.clone())
                    && matches!(
                        &e.message,
                        ServerMessage::ChatMessage { chatmessage, .. }
                        if chatmessage.contains("received")
                    )
            })
            .count();
        assert_eq!(acks, 1);
    }

    #[test]
    fn judge_description_is_silently_dropped() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        into_research(&mut h);

        let judge = h.game.current_judge().cloned().unwrap();
        h.messenger.clear();
        h.command(
            &judge,
            ClientMessage::SubmitDescription {
                text: "the judge cheats".to_string(),
            },
        );
        assert!(h.sent().is_empty());
        h.advance(91);
        // Nothing was collected, so the phase holds.
        assert_eq!(h.game.play_state(), PlayState::Research);
    }

    // *** Judging ***

    fn into_judging(h: &mut Harness) {
        into_research(h);
        for id in h.non_judges() {
            h.command(
                &id,
                ClientMessage::SubmitDescription {
                    text: format!("{id} text"),
                },
            );
        }
        h.tick();
        assert_eq!(h.game.play_state(), PlayState::Judging);
    }

    #[test]
    fn judge_menu_goes_only_to_the_judge() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_judging(&mut h);

        let judge = h.game.current_judge().cloned().unwrap();
        let menus: Vec<Envelope> = h
            .sent()
            .into_iter()
            .filter(|e| matches!(e.message, ServerMessage::DisplayJudgingMenu { .. }))
            .collect();
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].target, Target::One(judge));
        // Everyone submitted, so no "[None of the above]" option.
        if let ServerMessage::DisplayJudgingMenu { options } = &menus[0].message {
            assert_eq!(options.len(), 3);
            assert!(!options.contains_key(NONE_OF_THE_ABOVE_ID));
        }
    }

    #[test]
    fn none_of_the_above_is_offered_when_someone_abstained() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_research(&mut h);

        for id in h.non_judges().into_iter().take(2) {
            h.command(
                &id,
                ClientMessage::SubmitDescription {
                    text: "desc".to_string(),
                },
            );
        }
        h.advance(91);
        assert_eq!(h.game.play_state(), PlayState::Judging);

        let menu = h
            .sent()
            .into_iter()
            .rev()
            .find(|e| matches!(e.message, ServerMessage::DisplayJudgingMenu { .. }))
            .unwrap();
        if let ServerMessage::DisplayJudgingMenu { options } = menu.message {
            assert!(options.contains_key(NONE_OF_THE_ABOVE_ID));
        }
    }

    #[test]
    fn judge_guess_forces_immediate_scores_transition() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_judging(&mut h);

        let judge = h.game.current_judge().cloned().unwrap();
        let truth = h.game.truth_player().cloned().unwrap();
        h.command(&judge, ClientMessage::JudgeChoice { choice: truth.clone() });
        assert_eq!(h.game.play_state(), PlayState::Scores);
        assert_eq!(h.game.score_of(&judge), Some(1));
        assert_eq!(h.game.score_of(&truth), Some(1));
    }

    #[test]
    fn guess_from_non_judge_is_ignored() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_judging(&mut h);

        let impostor = h.non_judges()[0].clone();
        let truth = h.game.truth_player().cloned().unwrap();
        h.command(&impostor, ClientMessage::JudgeChoice { choice: truth });
        assert_eq!(h.game.play_state(), PlayState::Judging);
    }

    #[test]
    fn picking_a_liar_awards_the_liar_only() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_judging(&mut h);

        let judge = h.game.current_judge().cloned().unwrap();
        let truth = h.game.truth_player().cloned().unwrap();
        let liar = h
            .non_judges()
            .into_iter()
            .find(|id| *id != truth)
            .unwrap();
        h.command(&judge, ClientMessage::JudgeChoice { choice: liar.clone() });
        assert_eq!(h.game.play_state(), PlayState::Scores);
        assert_eq!(h.game.score_of(&liar), Some(1));
        assert_eq!(h.game.score_of(&judge), Some(0));
        assert_eq!(h.game.score_of(&truth), Some(0));
    }

    #[test]
    fn judging_timeout_scores_nothing() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_judging(&mut h);

        h.advance(60 * 60);
        assert_eq!(h.game.play_state(), PlayState::Scores);
        for id in ["p0", "p1", "p2", "p3"] {
            assert_eq!(h.game.score_of(&id.to_string()), Some(0));
        }
        assert!(h.chat_messages().iter().any(|m| m.contains("Time ran out")));
    }

    // *** Phase re-entry semantics ***

    #[test]
    fn same_phase_normal_entry_is_a_noop() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        h.messenger.clear();

        h.game
            .set_play_state(PlayState::ChooseArticle, Entry::Normal, h.now);
        assert!(h.sent().is_empty());
        assert!(h.game.take_article_request().is_none());
    }

    #[test]
    fn same_phase_restart_reruns_entry_logic() {
        let mut h = Harness::new(3);
        h.start_into_choose_article();
        let judge = h.game.current_judge().cloned().unwrap();
        h.game.take_article_request();
        h.messenger.clear();

        h.game
            .set_play_state(PlayState::ChooseArticle, Entry::Restart, h.now);
        assert!(!h.sent().is_empty());
        assert!(h.game.take_article_request().is_some());
        // Restart keeps the judge.
        assert_eq!(h.game.current_judge().unwrap(), &judge);
    }

    // *** Departure policy ***

    #[test]
    fn judge_departure_aborts_the_turn() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_research(&mut h);

        let judge = h.game.current_judge().cloned().unwrap();
        h.game
            .handle(GameEvent::PlayerLeft { session_id: judge }, h.now);

        assert_eq!(h.game.state(), GameState::Playing);
        assert_eq!(h.game.play_state(), PlayState::ChooseArticle);
        assert_eq!(h.game.current_judge().unwrap(), "p1");
    }

    #[test]
    fn judge_departure_during_choose_article_rotates_the_judge() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        assert_eq!(h.game.current_judge().unwrap(), "p0");

        h.game.handle(
            GameEvent::PlayerLeft {
                session_id: "p0".to_string(),
            },
            h.now,
        );
        assert_eq!(h.game.play_state(), PlayState::ChooseArticle);
        assert_eq!(h.game.current_judge().unwrap(), "p1");
    }

    #[test]
    fn truth_teller_departure_aborts_the_turn() {
        let mut h = Harness::new(4);
        h.start_into_choose_article();
        into_research(&mut h);

        let truth = h.game.truth_player().cloned().unwrap();
        h.game
            .handle(GameEvent::PlayerLeft { session_id: truth }, h.now);

        assert_eq!(h.game.state(), GameState::Playing);
        assert_eq!(h.game.play_state(), PlayState::ChooseArticle);
    }

    // *** Chat ***

    #[test]
    fn chat_is_relayed_with_nickname_and_truncated() {
        let mut h = Harness::new(3);
        h.messenger.clear();
        let long = "x".repeat(300);
        h.command("p1", ClientMessage::Chat { text: long });

        let relayed = h
            .chat_messages()
            .into_iter()
            .find(|m| m.starts_with("[Player1]"))
            .unwrap();
        // "[Player1] " prefix plus 256 chars of payload.
        assert_eq!(relayed.len(), "[Player1] ".len() + 256);
    }

    #[test]
    fn nickname_is_truncated_and_defaulted() {
        let mut h = Harness::new(0);
        h.game.handle(
            GameEvent::PlayerJoined {
                session_id: "a".to_string(),
                nickname: String::new(),
            },
            h.now,
        );
        h.game.handle(
            GameEvent::PlayerJoined {
                session_id: "b".to_string(),
                nickname: "abcdefghijklmnopqrstuvwxyz".to_string(),
            },
            h.now,
        );
        assert_eq!(h.game.nickname_of(&"a".to_string()).unwrap(), "DefaultNick");
        assert_eq!(
            h.game.nickname_of(&"b".to_string()).unwrap(),
            "abcdefghijklmnop"
        );
    }
}
