//! Coach Chat Backend
//!
//! A conversational backend that mediates between end users and an LLM
//! provider to deliver a domain-constrained assistant:
//! - Validates every user message through an ordered, fail-fast guardrail
//!   pipeline (local sensitive-data scan, zero-shot topic and advice
//!   classifiers, provider moderation) before it reaches the LLM
//! - Assembles persona + profile + history prompts
//! - Persists conversation transcripts, rejections included
//!
//! FLOW:
//! INPUT → GUARDRAILS (fail-fast) → PROMPT ASSEMBLY → LLM → REPLY

pub mod api;
pub mod engine;
pub mod error;
pub mod guardrails;
pub mod metadata;
pub mod models;
pub mod openai;
pub mod prompt;
pub mod store;

pub use error::Result;

// Re-export common types
pub use engine::{ChatEngine, ChatOutcome};
pub use guardrails::{GuardrailCheck, GuardrailPipeline, Verdict};
pub use metadata::ProductMetadata;
pub use models::*;
