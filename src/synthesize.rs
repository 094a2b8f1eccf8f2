//! Answer synthesis: grounded and ungrounded completion calls.
//!
//! With a document scope, retrieval and prompt assembly run first and the
//! answer is grounded in the retrieved chunks; without one, the user's
//! message goes straight to the completion endpoint. Provider failures
//! propagate; the synthesizer never retries and never fabricates an
//! answer from a failed call.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::models::{ScoredChunk, Usage};
use crate::prompt::build_prompt;
use crate::provider::{Message, ModelProvider};
use crate::retrieval::RetrievalEngine;

/// Temperature used for grounded answers: near-deterministic so equal
/// context yields stable answers.
const GROUNDED_TEMPERATURE: f32 = 0.0;

/// One synthesized answer with its supporting chunks and token usage.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
    pub usage: Usage,
}

/// Produces answers, grounded in a document's chunks when a scope is
/// present.
pub struct AnswerSynthesizer {
    provider: Arc<dyn ModelProvider>,
    retrieval: RetrievalEngine,
    top_k: usize,
    temperature: f32,
}

impl AnswerSynthesizer {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        retrieval: RetrievalEngine,
        top_k: usize,
        temperature: f32,
    ) -> Self {
        Self {
            provider,
            retrieval,
            top_k,
            temperature,
        }
    }

    /// Answer `question`, grounded in `document_id`'s chunks when given.
    pub async fn answer(&self, question: &str, document_id: Option<&str>) -> Result<Answer> {
        match document_id {
            Some(doc_id) => self.answer_grounded(question, doc_id).await,
            None => self.answer_ungrounded(question).await,
        }
    }

    async fn answer_grounded(&self, question: &str, document_id: &str) -> Result<Answer> {
        let sources = self
            .retrieval
            .retrieve(document_id, question, self.top_k)
            .await?;
        debug!(document_id, sources = sources.len(), "building grounded prompt");

        let passages: Vec<String> = sources.iter().map(|c| c.content.clone()).collect();
        let prompt = build_prompt(question, &passages, None);

        let completion = self
            .provider
            .complete(&[Message::user(prompt)], GROUNDED_TEMPERATURE)
            .await?;

        Ok(Answer {
            text: completion.text,
            sources,
            usage: completion.usage,
        })
    }

    async fn answer_ungrounded(&self, question: &str) -> Result<Answer> {
        let completion = self
            .provider
            .complete(&[Message::user(question)], self.temperature)
            .await?;

        Ok(Answer {
            text: completion.text,
            sources: Vec::new(),
            usage: completion.usage,
        })
    }
}
