use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Attempt to move the room into Playing.
    StartGame,
    /// Attempt to move the room back to Lobby.
    StopGame,
    /// Approve or reject the proposed article (non-judge only).
    ArticleVote { decision: ArticleDecision },
    /// Submit (or overwrite) a description of the article (non-judge only).
    SubmitDescription { text: String },
    /// The judge's final pick: a submitter's session id or the
    /// "[None of the above]" sentinel.
    JudgeChoice { choice: String },
    /// Free-form chat, relayed to everyone.
    Chat { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Periodic status push; re-sent whenever any field changes.
    GameStatus {
        gamestate: GameState,
        playstate: PlayState,
        round_number: u32,
        time_left: i64,
    },
    /// System announcements and relayed player chat.
    ChatMessage {
        chatmessage: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        fontweight: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fontsize: Option<String>,
    },
    /// Inline text in the main display area.
    DisplayText {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        fontweight: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fontsize: Option<String>,
    },
    /// Show the full article (truth-teller only).
    DisplayArticle { url: String },
    /// Reset the main display area.
    ClearDisplay,
    /// Render the approve/reject vote controls.
    DisplayApproveRejectButtons,
    /// Render the description submission form.
    DisplayArticleDescriptionForm { maxlength: usize },
    /// Render one player's submitted description.
    DisplayPlayerArticleDescription { name: String, description: String },
    /// Render the judge's choice menu (option id -> label).
    DisplayJudgingMenu { options: HashMap<String, String> },
}

impl ServerMessage {
    pub fn chat(text: impl Into<String>) -> Self {
        ServerMessage::ChatMessage {
            chatmessage: text.into(),
            fontweight: None,
            fontsize: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ServerMessage::DisplayText {
            text: text.into(),
            fontweight: None,
            fontsize: None,
        }
    }
}

/// Delivery scope for an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    One(SessionId),
}

/// A server message together with its delivery scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target: Target,
    pub message: ServerMessage,
}
