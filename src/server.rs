//! Shared application state and the event dispatch loop.

use crate::game::{Game, GameEvent};
use crate::messenger::ChannelMessenger;
use crate::protocol::Envelope;
use crate::types::GameConfig;
use crate::wiki::ArticleSource;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};

/// How often the periodic tick drives the game core.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

pub struct AppState {
    pub game: Mutex<Game>,
    pub articles: Arc<dyn ArticleSource>,
    /// Envelopes fanned out to every connection task.
    pub outbound: broadcast::Sender<Envelope>,
}

impl AppState {
    pub fn new(config: GameConfig, articles: Arc<dyn ArticleSource>) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        let messenger = ChannelMessenger::new(tx.clone());
        Self {
            game: Mutex::new(Game::new(config, Box::new(messenger), Instant::now())),
            articles,
            outbound: tx,
        }
    }

    /// Feed one event into the core, then start any article fetch the
    /// transition requested. The fetch completion is delivered back as an
    /// [`GameEvent::ArticleResolved`] carrying the round generation, so a
    /// response that outlives its round is discarded by the core.
    pub async fn dispatch(self: &Arc<Self>, event: GameEvent) {
        let request = {
            let mut game = self.game.lock().await;
            game.handle(event, Instant::now());
            game.take_article_request()
        };

        if let Some(generation) = request {
            let state = self.clone();
            tokio::spawn(async move {
                match state.articles.random_article().await {
                    Ok(article) => {
                        // Delivered inline rather than through dispatch:
                        // resolving an article never requests another one.
                        let mut game = state.game.lock().await;
                        game.handle(
                            GameEvent::ArticleResolved {
                                generation,
                                article,
                            },
                            Instant::now(),
                        );
                    }
                    Err(e) => {
                        // The round tallies an unset article like a
                        // rejection and re-requests on the restart.
                        tracing::warn!("Article fetch failed: {e}");
                    }
                }
            });
        }
    }
}

/// Spawn the periodic tick that drives all time-based transitions.
pub fn spawn_tick_loop(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            state.dispatch(GameEvent::Tick).await;
        }
    });
}
