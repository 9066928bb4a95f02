//! Per-round phase sequencer.
//!
//! Steady-state cycle: Starting -> ChooseArticle -> Research -> Judging ->
//! Scores -> ChooseArticle. ChooseArticle may re-enter itself as an
//! explicit `Restart` when the proposed article is voted down; that is the
//! only same-phase transition that re-runs entry logic.

use super::quorum::QuorumOutcome;
use super::rotation::Advance;
use super::round::RoundContext;
use super::score::{self, ScoreOutcome};
use super::Game;
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::seq::{IndexedRandom, SliceRandom};
use std::collections::HashMap;
use std::time::Instant;

/// How a phase is being entered. `Restart` re-runs entry logic even when
/// the target phase equals the current one; `Normal` makes that a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Normal,
    Restart,
}

impl Game {
    /// Transition to `new_state`, running its entry actions. No-op when
    /// the target equals the current phase unless entered as a restart.
    pub(crate) fn set_play_state(&mut self, new_state: PlayState, entry: Entry, now: Instant) {
        if new_state == self.play_state && entry != Entry::Restart {
            return;
        }

        tracing::debug!(
            "Play state: {:?} -> {:?} ({:?})",
            self.play_state,
            new_state,
            entry
        );

        match new_state {
            PlayState::Idle => {}
            PlayState::Starting => self.enter_starting(),
            PlayState::ChooseArticle => self.enter_choose_article(entry),
            PlayState::Research => self.enter_research(),
            PlayState::Judging => self.enter_judging(),
            PlayState::Scores => self.enter_scores(),
        }

        self.play_state = new_state;
        self.phase_started_at = now;
        self.broadcast_status(now);
    }

    /// Timer- and fill-state-driven transitions, called every tick while
    /// Playing. `time_left` is the raw (unclamped) remaining time.
    pub(crate) fn step_phase(&mut self, time_left: i64, now: Instant) {
        match self.play_state {
            PlayState::Idle => {}
            PlayState::Starting => {
                if time_left <= 0 {
                    self.set_play_state(PlayState::ChooseArticle, Entry::Normal, now);
                }
            }
            PlayState::ChooseArticle => {
                if time_left <= 0 {
                    self.tally_article_vote(now);
                }
            }
            PlayState::Research => {
                let eligible = self.players.len().saturating_sub(1);
                let Some(round) = self.round.as_ref() else {
                    return;
                };
                // Everyone done: advance without waiting for the timer.
                // On timeout, the minimum-submission floor still holds.
                let all_in = eligible > 0 && round.descriptions.count() >= eligible;
                let enough = round.descriptions.minimum_reached(self.config.min_descriptions);
                if all_in || (time_left <= 0 && enough) {
                    self.set_play_state(PlayState::Judging, Entry::Normal, now);
                }
            }
            PlayState::Judging => {
                if time_left <= 0 {
                    // No guess arrived; Scores sees it as unset.
                    self.set_play_state(PlayState::Scores, Entry::Normal, now);
                }
            }
            PlayState::Scores => {
                if time_left <= 0 {
                    self.set_play_state(PlayState::ChooseArticle, Entry::Normal, now);
                }
            }
        }
    }

    fn tally_article_vote(&mut self, now: Instant) {
        let eligible = self.players.len().saturating_sub(1);
        // A fetch that never resolved is tallied like a rejection: same
        // judge, fresh article request.
        let outcome = match self.round.as_ref() {
            Some(round) if round.article.is_some() => round
                .decisions
                .resolve(eligible, self.config.approval_fraction),
            _ => QuorumOutcome::Rejected,
        };

        match outcome {
            QuorumOutcome::Accepted => {
                self.set_play_state(PlayState::Research, Entry::Normal, now)
            }
            QuorumOutcome::Rejected => {
                self.set_play_state(PlayState::ChooseArticle, Entry::Restart, now)
            }
        }
    }

    fn enter_starting(&mut self) {
        self.messenger.broadcast(ServerMessage::ClearDisplay);
        self.messenger
            .broadcast(ServerMessage::chat("Game starting!"));
    }

    fn enter_choose_article(&mut self, entry: Entry) {
        self.messenger.broadcast(ServerMessage::ClearDisplay);

        if entry == Entry::Normal {
            let ids: Vec<SessionId> = self.players.iter().map(|p| p.id.clone()).collect();
            let judge = match self.rotation.advance(&ids) {
                Some(Advance::Next(judge)) => judge,
                Some(Advance::CycleComplete(judge)) => {
                    self.round_number += 1;
                    self.messenger.broadcast(ServerMessage::chat(format!(
                        "Starting round {}!",
                        self.round_number
                    )));
                    judge
                }
                // No players left; the lifecycle check parks the game.
                None => return,
            };

            let nickname = self.nickname_of(&judge).unwrap_or_default();
            self.messenger
                .broadcast(ServerMessage::chat(format!("{nickname} is judging!")));
            self.messenger.send_to(
                &judge,
                ServerMessage::text(
                    "You are the judge this turn. Wait while the others review the article.",
                ),
            );
        } else {
            self.messenger.broadcast(ServerMessage::chat(
                "Article rejected, choosing a new one...",
            ));
        }

        // Fresh round context in both cases; a late fetch completion for
        // the previous context no longer matches its generation.
        self.next_generation += 1;
        self.round = Some(RoundContext::new(self.next_generation));
        self.pending_article_request = Some(self.next_generation);
    }

    fn enter_research(&mut self) {
        self.messenger.broadcast(ServerMessage::ClearDisplay);

        let judge = self.current_judge().cloned();
        if let Some(judge) = &judge {
            self.messenger.send_to(
                judge,
                ServerMessage::text("Still judging. Sit tight while the others read up."),
            );
        }

        // An accepted article implies the fetch resolved, but guard anyway.
        let Some(article) = self.round.as_ref().and_then(|r| r.article.clone()) else {
            return;
        };

        let candidates: Vec<SessionId> = self
            .players
            .iter()
            .filter(|p| Some(&p.id) != judge.as_ref())
            .map(|p| p.id.clone())
            .collect();
        let truth_player = candidates.choose(&mut rand::rng()).cloned();
        if let Some(round) = self.round.as_mut() {
            round.truth_player = truth_player.clone();
        }

        if let Some(truth) = &truth_player {
            self.messenger.send_to(
                truth,
                ServerMessage::DisplayArticle {
                    url: format!("{}?printable=yes", article.url),
                },
            );
            self.messenger.send_to(
                truth,
                ServerMessage::text("You have the real article. Describe it truthfully!"),
            );
        }

        for player in &self.players {
            if Some(&player.id) == judge.as_ref() || Some(&player.id) == truth_player.as_ref() {
                continue;
            }
            self.messenger
                .send_to(&player.id, ServerMessage::text("This round's article title is"));
            self.messenger
                .send_to(&player.id, ServerMessage::text(article.title.clone()));
            self.messenger.send_to(
                &player.id,
                ServerMessage::text("Make up something based on this title!"),
            );
        }

        for player in &self.players {
            if Some(&player.id) == judge.as_ref() {
                continue;
            }
            self.messenger.send_to(
                &player.id,
                ServerMessage::DisplayArticleDescriptionForm {
                    maxlength: self.config.description_max_chars,
                },
            );
        }
    }

    fn enter_judging(&mut self) {
        self.messenger.broadcast(ServerMessage::ClearDisplay);

        let judge = self.current_judge().cloned();
        let eligible = self.players.len().saturating_sub(1);

        // Shuffle the presentation order so the judge cannot read anything
        // into submission timing or join order.
        let mut authors = match self.round.as_ref() {
            Some(round) => round.descriptions.authors(),
            None => return,
        };
        authors.shuffle(&mut rand::rng());

        let mut options: HashMap<String, String> = HashMap::new();
        for author in &authors {
            // Authors who left mid-round have no nickname any more and
            // are not offered as options.
            let Some(nickname) = self.nickname_of(author) else {
                continue;
            };
            let description = self
                .round
                .as_ref()
                .and_then(|r| r.descriptions.get(author).cloned())
                .unwrap_or_default();
            self.messenger
                .broadcast(ServerMessage::DisplayPlayerArticleDescription {
                    name: nickname.clone(),
                    description,
                });
            options.insert(author.clone(), nickname);
        }

        if options.len() < eligible {
            options.insert(
                NONE_OF_THE_ABOVE_ID.to_string(),
                NONE_OF_THE_ABOVE_ID.to_string(),
            );
        }

        if let Some(judge) = &judge {
            self.messenger
                .send_to(judge, ServerMessage::DisplayJudgingMenu { options });
        }
    }

    fn enter_scores(&mut self) {
        self.messenger.broadcast(ServerMessage::ClearDisplay);

        // Taking the context makes the cleanup idempotent: a second entry
        // finds nothing to score and nothing to leak into the next round.
        let Some(round) = self.round.take() else {
            return;
        };

        let judge_nickname = self
            .current_judge()
            .and_then(|j| self.nickname_of(j))
            .unwrap_or_else(|| "The judge".to_string());
        let truth_submitted = round
            .truth_player
            .as_ref()
            .is_some_and(|t| round.descriptions.has_submitted(t));

        match score::resolve(&round.judge_guess, round.truth_player.as_ref(), truth_submitted) {
            ScoreOutcome::NoGuess => {
                self.messenger.broadcast(ServerMessage::chat(
                    "Time ran out! The judge made no guess.",
                ));
            }
            ScoreOutcome::JudgeAndTruthTeller { truth_player } => {
                let truth_nickname = self.nickname_of(&truth_player).unwrap_or_default();
                self.messenger.broadcast(ServerMessage::chat(format!(
                    "{judge_nickname} picked {truth_nickname}'s description - and it was the \
                     real one! Both score a point."
                )));
                if let Some(judge) = self.current_judge().cloned() {
                    self.modify_score(&judge, 1);
                }
                self.modify_score(&truth_player, 1);
            }
            ScoreOutcome::JudgeOnly => {
                self.messenger.broadcast(ServerMessage::chat(format!(
                    "{judge_nickname} called '{NONE_OF_THE_ABOVE_ID}' - correct, nobody \
                     submitted the real description! {judge_nickname} scores a point."
                )));
                if let Some(judge) = self.current_judge().cloned() {
                    self.modify_score(&judge, 1);
                }
            }
            ScoreOutcome::ConvincingLie { liar } => {
                let liar_nickname = self.nickname_of(&liar).unwrap_or_default();
                self.messenger.broadcast(ServerMessage::chat(format!(
                    "{judge_nickname} fell for {liar_nickname}'s made-up description! \
                     {liar_nickname} scores a point for a convincing lie."
                )));
                self.modify_score(&liar, 1);
            }
            ScoreOutcome::NoAward => {
                let truth_nickname = round
                    .truth_player
                    .as_ref()
                    .and_then(|t| self.nickname_of(t))
                    .unwrap_or_default();
                self.messenger.broadcast(ServerMessage::chat(format!(
                    "{judge_nickname} called '{NONE_OF_THE_ABOVE_ID}', but {truth_nickname}'s \
                     description was the real one. No points awarded."
                )));
            }
        }
    }
}
