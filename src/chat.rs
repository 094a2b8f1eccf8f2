//! Chat turns: session bookkeeping around answer synthesis.
//!
//! Sessions are created lazily on the first message of a conversation,
//! titled from that message. Each turn records the user message, runs the
//! synthesizer (grounded when a document scope is present), and records
//! the assistant reply. Synthesis failures propagate so the caller can
//! surface a visible error instead of a fabricated answer.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{ChatMessage, ChatRole, ChatSession};
use crate::store::SessionStore;
use crate::synthesize::{Answer, AnswerSynthesizer};

/// Maximum characters of the first message used for a session title.
const TITLE_LEN: usize = 50;

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub session_id: String,
    pub answer: Answer,
}

/// Drives chat turns against a session store and the synthesizer.
pub struct ChatService {
    sessions: Arc<dyn SessionStore>,
    synthesizer: AnswerSynthesizer,
}

impl ChatService {
    pub fn new(sessions: Arc<dyn SessionStore>, synthesizer: AnswerSynthesizer) -> Self {
        Self {
            sessions,
            synthesizer,
        }
    }

    /// Run one chat turn for `owner_id`.
    ///
    /// Without a `session_id` a new session is created, scoped to
    /// `document_id` when given. With one, the session's document scope
    /// applies unless the request carries its own.
    pub async fn send_message(
        &self,
        owner_id: &str,
        message: &str,
        document_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<ChatTurn> {
        if message.trim().is_empty() {
            return Err(EngineError::InvalidArgument("message is required".into()));
        }

        let session = match session_id {
            Some(id) => self
                .sessions
                .get_session(id)
                .await?
                .ok_or_else(|| EngineError::InvalidArgument(format!("unknown session: {}", id)))?,
            None => {
                let session = ChatSession {
                    id: Uuid::new_v4().to_string(),
                    owner_id: owner_id.to_string(),
                    document_id: document_id.map(str::to_string),
                    title: derive_title(message),
                    created_at: Utc::now(),
                };
                self.sessions.create_session(&session).await?;
                info!(session_id = %session.id, "chat session created");
                session
            }
        };

        self.sessions
            .append_message(&ChatMessage {
                id: Uuid::new_v4().to_string(),
                session_id: session.id.clone(),
                role: ChatRole::User,
                content: message.to_string(),
                author_id: Some(owner_id.to_string()),
                created_at: Utc::now(),
            })
            .await?;

        let scope = document_id.or(session.document_id.as_deref());
        let answer = self.synthesizer.answer(message, scope).await?;

        self.sessions
            .append_message(&ChatMessage {
                id: Uuid::new_v4().to_string(),
                session_id: session.id.clone(),
                role: ChatRole::Assistant,
                content: answer.text.clone(),
                author_id: None,
                created_at: Utc::now(),
            })
            .await?;

        Ok(ChatTurn {
            session_id: session.id,
            answer,
        })
    }
}

/// Session title: the first message truncated to [`TITLE_LEN`] characters.
fn derive_title(message: &str) -> String {
    let truncated: String = message.chars().take(TITLE_LEN).collect();
    format!("{}...", truncated)
}
