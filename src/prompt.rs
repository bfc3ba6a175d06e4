//! Prompt assembly
//!
//! Builds the ordered message sequence sent to the LLM: exactly one
//! persona system message first, one user/assistant pair per well-formed
//! history exchange in original order, then the new user message. History
//! is never reordered or deduplicated; malformed pairs are skipped, never
//! fabricated.

use std::sync::Arc;

use crate::metadata::ProductMetadata;
use crate::models::{ChatMessage, Exchange, UserProfile};

pub struct PromptAssembler {
    metadata: Arc<ProductMetadata>,
}

impl PromptAssembler {
    pub fn new(metadata: Arc<ProductMetadata>) -> Self {
        Self { metadata }
    }

    /// Persona system prompt, with an optional profile context section.
    /// Missing profile fields fall back to defaults; assembly never fails
    /// because of an absent or partially populated profile.
    fn build_system_message(&self, profile: Option<&UserProfile>) -> ChatMessage {
        let mut content = format!(
            "You are a helpful and friendly assistant for '{}'.\n\
             Your goal is to answer user questions based on these details:\n\
             Product Description: {}\n\
             Key Features: {}\n\
             Stay on topic and be positive.",
            self.metadata.product_name,
            self.metadata.description,
            self.metadata.feature_list(),
        );

        if let Some(profile) = profile {
            let field = |value: &Option<String>, default: &str| -> String {
                value
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(default)
                    .to_string()
            };

            content.push_str(&format!(
                "\n\nUSER PROFILE CONTEXT:\n\
                 - Name: {}\n\
                 - Region: {}\n\
                 - Language: {}\n\
                 - Persona: {}\n\
                 - Accessibility: {}\n\
                 Adapt your tone and examples to this profile.",
                field(&profile.name, "there"),
                field(&profile.region, "unknown"),
                field(&profile.language, "English"),
                field(&profile.persona, "general"),
                field(&profile.accessibility, "none"),
            ));
        }

        ChatMessage::system(content)
    }

    /// Assemble the full prompt for one turn
    pub fn assemble(
        &self,
        profile: Option<&UserProfile>,
        history: &[Exchange],
        user_text: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(self.build_system_message(profile));

        for exchange in history {
            // Skip malformed pairs; a missing side is never fabricated.
            let (Some(user), Some(bot)) = (&exchange.user, &exchange.bot) else {
                continue;
            };
            messages.push(ChatMessage::user(user.clone()));
            messages.push(ChatMessage::assistant(bot.clone()));
        }

        messages.push(ChatMessage::user(user_text));
        messages
    }
}
