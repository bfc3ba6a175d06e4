//! Moderation guardrail
//!
//! Delegates to the provider moderation endpoint. On a flagged result the
//! rejection reason names a single category — the first flagged one by the
//! provider's documented category order — rather than aggregating.

use async_trait::async_trait;
use std::sync::Arc;

use super::{GuardrailCheck, Verdict};
use crate::openai::{ModerationOutcome, ModerationService};
use crate::Result;

/// Provider category order, as documented for the moderation endpoint.
/// The wire format is a JSON object, so the order has to be pinned here
/// to keep category selection deterministic.
const CATEGORY_ORDER: &[&str] = &[
    "harassment",
    "harassment/threatening",
    "hate",
    "hate/threatening",
    "illicit",
    "illicit/violent",
    "self-harm",
    "self-harm/intent",
    "self-harm/instructions",
    "sexual",
    "sexual/minors",
    "violence",
    "violence/graphic",
];

/// Pick the first flagged category in provider order. Categories absent
/// from the documented order (future additions) are considered last, in
/// sorted order.
fn first_flagged_category(outcome: &ModerationOutcome) -> Option<String> {
    for category in CATEGORY_ORDER {
        if outcome.categories.get(*category).copied().unwrap_or(false) {
            return Some((*category).to_string());
        }
    }

    let mut unknown: Vec<&String> = outcome
        .categories
        .iter()
        .filter(|(name, flagged)| **flagged && !CATEGORY_ORDER.contains(&name.as_str()))
        .map(|(name, _)| name)
        .collect();
    unknown.sort();
    unknown.first().map(|name| (*name).to_string())
}

/// Guardrail stage backed by the moderation endpoint
pub struct ModerationCheck {
    service: Arc<dyn ModerationService>,
}

impl ModerationCheck {
    pub fn new(service: Arc<dyn ModerationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl GuardrailCheck for ModerationCheck {
    fn name(&self) -> &'static str {
        "moderation"
    }

    async fn check(&self, text: &str) -> Result<Verdict> {
        let outcome = self.service.moderate(text).await?;

        if !outcome.flagged {
            return Ok(Verdict::Allowed);
        }

        let category = first_flagged_category(&outcome)
            .unwrap_or_else(|| "unspecified".to_string());

        Ok(Verdict::rejected(format!(
            "Message violates moderation policy: {}",
            category
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use std::collections::HashMap;

    struct CannedModeration {
        outcome: ModerationOutcome,
    }

    #[async_trait]
    impl ModerationService for CannedModeration {
        async fn moderate(&self, _text: &str) -> Result<ModerationOutcome> {
            Ok(self.outcome.clone())
        }
    }

    fn outcome(flagged: bool, categories: &[(&str, bool)]) -> ModerationOutcome {
        ModerationOutcome {
            flagged,
            categories: categories
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn test_unflagged_passes() {
        let check = ModerationCheck::new(Arc::new(CannedModeration {
            outcome: outcome(false, &[("harassment", false)]),
        }));
        assert!(check.check("hello").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_first_flagged_category_is_surfaced() {
        let check = ModerationCheck::new(Arc::new(CannedModeration {
            outcome: outcome(true, &[("harassment", true), ("other", false)]),
        }));

        let verdict = check.check("some text").await.unwrap();
        assert_eq!(
            verdict,
            Verdict::rejected("Message violates moderation policy: harassment")
        );
    }

    #[tokio::test]
    async fn test_provider_order_wins_over_map_order() {
        // Both flagged; "harassment" precedes "violence" in provider order
        // regardless of map iteration order.
        let check = ModerationCheck::new(Arc::new(CannedModeration {
            outcome: outcome(true, &[("violence", true), ("harassment", true)]),
        }));

        let verdict = check.check("some text").await.unwrap();
        assert_eq!(
            verdict,
            Verdict::rejected("Message violates moderation policy: harassment")
        );
    }

    #[tokio::test]
    async fn test_unknown_category_fallback() {
        let check = ModerationCheck::new(Arc::new(CannedModeration {
            outcome: outcome(true, &[("brand-new-category", true)]),
        }));

        let verdict = check.check("some text").await.unwrap();
        assert_eq!(
            verdict,
            Verdict::rejected("Message violates moderation policy: brand-new-category")
        );
    }

    #[tokio::test]
    async fn test_infra_failure_propagates() {
        struct FailingModeration;

        #[async_trait]
        impl ModerationService for FailingModeration {
            async fn moderate(&self, _text: &str) -> Result<ModerationOutcome> {
                Err(ChatError::ClassifierError("moderation endpoint down".into()))
            }
        }

        let check = ModerationCheck::new(Arc::new(FailingModeration));
        let result = check.check("hello").await;
        assert!(matches!(result, Err(ChatError::ClassifierError(_))));
    }
}
