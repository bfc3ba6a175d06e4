//! Guardrail validation pipeline
//!
//! Every user message passes through an ordered list of checks before it
//! may reach the LLM. Checks run strictly in sequence and the pipeline
//! short-circuits on the first rejection: cheap local checks are ordered
//! before network-bound classifier calls, and a later check can never
//! override an earlier rejection.
//!
//! A rejection is a business outcome (`Verdict::Rejected`), returned as a
//! value. Infrastructure failures inside a check (timeouts, transport
//! errors, malformed classifier output) propagate as `Err` and are never
//! converted into an implicit allow or reject. The pipeline itself does
//! not retry; callers may re-run the whole pipeline on transient failure.

pub mod moderation;
pub mod sensitive;
pub mod topic;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::metadata::ProductMetadata;
use crate::openai::{ClassifierService, ModerationService};
use crate::Result;

pub use moderation::ModerationCheck;
pub use sensitive::SensitiveDataCheck;
pub use topic::{DirectAdviceCheck, FinancialTopicCheck, OnTopicCheck};

//
// ================= Verdict =================
//

/// Outcome of a guardrail check or of the whole pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    Allowed,
    Rejected { reason: String },
}

impl Verdict {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Verdict::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

//
// ================= Check Trait =================
//

/// A single guardrail stage
#[async_trait]
pub trait GuardrailCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect the user text. `Ok(Rejected)` is a policy decision;
    /// `Err(_)` is an infrastructure failure of this stage.
    async fn check(&self, text: &str) -> Result<Verdict>;
}

//
// ================= Pipeline =================
//

/// Ordered, fail-fast guardrail pipeline
pub struct GuardrailPipeline {
    checks: Vec<Arc<dyn GuardrailCheck>>,
}

impl GuardrailPipeline {
    /// Build a pipeline from an explicit stage order. Order is a
    /// deployment decision: it determines which rejection reason is
    /// surfaced when several checks would fire, not whether a message is
    /// ultimately rejected.
    pub fn new(checks: Vec<Arc<dyn GuardrailCheck>>) -> Self {
        Self { checks }
    }

    /// Marketing deployment: moderation runs first, then the on-topic
    /// classifier.
    pub fn marketing(
        metadata: Arc<ProductMetadata>,
        classifier: Arc<dyn ClassifierService>,
        moderation: Arc<dyn ModerationService>,
    ) -> Self {
        Self::new(vec![
            Arc::new(ModerationCheck::new(moderation)),
            Arc::new(OnTopicCheck::new(metadata, classifier)),
        ])
    }

    /// Financial-coach deployment: the local sensitive-pattern scan runs
    /// first, then the network-bound topic, advice, and moderation checks.
    pub fn financial_coach(
        classifier: Arc<dyn ClassifierService>,
        moderation: Arc<dyn ModerationService>,
    ) -> Self {
        Self::new(vec![
            Arc::new(SensitiveDataCheck::new()),
            Arc::new(FinancialTopicCheck::new(classifier.clone())),
            Arc::new(DirectAdviceCheck::new(classifier)),
            Arc::new(ModerationCheck::new(moderation)),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run all checks in order, stopping at the first rejection.
    pub async fn validate(&self, text: &str) -> Result<Verdict> {
        for check in &self.checks {
            debug!(stage = check.name(), "Running guardrail check");

            match check.check(text).await? {
                Verdict::Allowed => continue,
                rejected => {
                    info!(stage = check.name(), "Guardrail rejected message");
                    return Ok(rejected);
                }
            }
        }

        Ok(Verdict::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysAllow {
        calls: AtomicUsize,
    }

    impl AlwaysAllow {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GuardrailCheck for AlwaysAllow {
        fn name(&self) -> &'static str {
            "always_allow"
        }

        async fn check(&self, _text: &str) -> Result<Verdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::Allowed)
        }
    }

    struct AlwaysReject;

    #[async_trait]
    impl GuardrailCheck for AlwaysReject {
        fn name(&self) -> &'static str {
            "always_reject"
        }

        async fn check(&self, _text: &str) -> Result<Verdict> {
            Ok(Verdict::rejected("rejected by test stage"))
        }
    }

    struct AlwaysFail;

    #[async_trait]
    impl GuardrailCheck for AlwaysFail {
        fn name(&self) -> &'static str {
            "always_fail"
        }

        async fn check(&self, _text: &str) -> Result<Verdict> {
            Err(ChatError::ClassifierError("simulated outage".into()))
        }
    }

    #[tokio::test]
    async fn test_all_stages_pass() {
        let pipeline = GuardrailPipeline::new(vec![
            Arc::new(AlwaysAllow::new()),
            Arc::new(AlwaysAllow::new()),
        ]);

        let verdict = pipeline.validate("hello").await.unwrap();
        assert!(verdict.is_allowed());
    }

    #[tokio::test]
    async fn test_rejection_short_circuits_later_stages() {
        let tail = Arc::new(AlwaysAllow::new());
        let pipeline = GuardrailPipeline::new(vec![Arc::new(AlwaysReject), tail.clone()]);

        let verdict = pipeline.validate("hello").await.unwrap();
        assert_eq!(verdict, Verdict::rejected("rejected by test stage"));
        assert_eq!(tail.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_infra_failure_propagates_and_stops() {
        let tail = Arc::new(AlwaysAllow::new());
        let pipeline = GuardrailPipeline::new(vec![Arc::new(AlwaysFail), tail.clone()]);

        let result = pipeline.validate("hello").await;
        assert!(matches!(result, Err(ChatError::ClassifierError(_))));
        assert_eq!(tail.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stage_order_is_preserved() {
        let pipeline = GuardrailPipeline::new(vec![
            Arc::new(AlwaysAllow::new()),
            Arc::new(AlwaysReject),
        ]);

        assert_eq!(pipeline.stage_names(), vec!["always_allow", "always_reject"]);

        let verdict = pipeline.validate("hello").await.unwrap();
        assert!(!verdict.is_allowed());
    }
}
