//! Conversation orchestrator
//!
//! Receives a user message, runs the guardrail pipeline, and on pass
//! assembles the prompt and calls the LLM. Every turn leaves a transcript:
//! the inbound user message always, then either the reply, a
//! `[Guardrail]` rejection notice, or an `[Error]` audit marker.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::guardrails::{GuardrailPipeline, Verdict};
use crate::models::{Author, Exchange, StoredMessage, UserProfile};
use crate::openai::CompletionService;
use crate::prompt::PromptAssembler;
use crate::store::{ConversationStore, ProfileStore};
use crate::Result;

/// Outcome of one chat turn. A rejection is a normal business outcome,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Reply { text: String, convo_id: String },
    Rejected { reason: String, convo_id: String },
}

pub struct ChatEngine {
    pipeline: GuardrailPipeline,
    assembler: PromptAssembler,
    llm: Arc<dyn CompletionService>,
    store: Arc<dyn ConversationStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl ChatEngine {
    pub fn new(
        pipeline: GuardrailPipeline,
        assembler: PromptAssembler,
        llm: Arc<dyn CompletionService>,
        store: Arc<dyn ConversationStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            pipeline,
            assembler,
            llm,
            store,
            profiles,
        }
    }

    /// Fetch the user profile for prompt enrichment. Unlike guardrail
    /// checks, a failure here is non-critical: the prompt degrades to the
    /// no-profile form instead of failing the turn.
    async fn fetch_profile(&self, user_id: &str) -> Option<UserProfile> {
        match self.profiles.get_user(user_id).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!("Profile fetch failed, continuing without profile: {}", error);
                None
            }
        }
    }

    /// Record a transcript message, logging instead of failing the turn
    /// when the store write does not succeed.
    async fn record_best_effort(&self, convo_id: &str, message: StoredMessage) {
        if let Err(error) = self.store.append_message(convo_id, message).await {
            warn!("Transcript write failed: {}", error);
        }
    }

    /// Handle one inbound user message end to end.
    pub async fn handle_message(
        &self,
        user_id: &str,
        convo_id: Option<String>,
        history: &[Exchange],
        user_text: &str,
    ) -> Result<ChatOutcome> {
        let is_new = convo_id.is_none();
        let convo_id = convo_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        if is_new {
            self.store
                .start_conversation(&convo_id, user_id, Utc::now())
                .await?;
        }

        self.store
            .append_message(&convo_id, StoredMessage::new(Author::User, user_text))
            .await?;

        let verdict = match self.pipeline.validate(user_text).await {
            Ok(verdict) => verdict,
            Err(error) => {
                // Classifier infrastructure failure: audit it, then
                // propagate. Never downgraded to a pass or a reject.
                self.record_best_effort(
                    &convo_id,
                    StoredMessage::new(Author::Assistant, "[Error] Internal Server Error"),
                )
                .await;
                return Err(error);
            }
        };

        if let Verdict::Rejected { reason } = verdict {
            // The rejection must be visible in the transcript.
            self.store
                .append_message(
                    &convo_id,
                    StoredMessage::new(Author::Assistant, format!("[Guardrail] {}", reason)),
                )
                .await?;

            return Ok(ChatOutcome::Rejected { reason, convo_id });
        }

        let profile = self.fetch_profile(user_id).await;
        let prompt = self
            .assembler
            .assemble(profile.as_ref(), history, user_text);

        let reply = match self.llm.complete(&prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                self.record_best_effort(
                    &convo_id,
                    StoredMessage::new(Author::Assistant, "[Error] Internal Server Error"),
                )
                .await;
                return Err(error);
            }
        };

        self.record_best_effort(
            &convo_id,
            StoredMessage::new(Author::Assistant, reply.clone()),
        )
        .await;

        info!(convo_id = %convo_id, "Chat turn completed");

        Ok(ChatOutcome::Reply {
            text: reply,
            convo_id,
        })
    }
}
