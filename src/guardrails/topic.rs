//! Zero-shot topic and advice classifiers
//!
//! Each check issues one deterministic classification request (temperature
//! pinned to zero, small output budget, strict JSON contract) and reads a
//! single required boolean from the response. A missing field or
//! malformed payload is a hard classifier failure — it propagates as an
//! error and is never folded into a pass or a reject.

use async_trait::async_trait;
use std::sync::Arc;

use super::{GuardrailCheck, Verdict};
use crate::error::ChatError;
use crate::metadata::ProductMetadata;
use crate::openai::ClassifierService;
use crate::Result;

/// Extract the required boolean field from a classifier response
fn require_bool(response: &serde_json::Value, field: &str) -> Result<bool> {
    response
        .get(field)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| {
            ChatError::ClassifierError(format!(
                "Classifier response missing required field '{}': {}",
                field, response
            ))
        })
}

/// Optional free-text reason, if the classifier supplied one
fn optional_reason(response: &serde_json::Value) -> Option<String> {
    response
        .get("reason")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

//
// ================= On-Topic (marketing) =================
//

const ON_TOPIC_SYSTEM: &str = r#"You are an expert classifier for a marketing chatbot. Decide if a user's message is ON-TOPIC (about our product, its features, use cases, or support) or OFF-TOPIC (not related to our product, or about competitors, or inappropriate).

- ON-TOPIC: Any question or statement about the product, its features, pricing, support, integrations, what it does, or anything that helps the user understand or use the product. This includes generic questions like "tell me about your product", "what do you do?", "how can you help me?".
- OFF-TOPIC: Personal questions, jokes, unrelated topics, competitor comparisons, or anything not about our product.
- GREETINGS: If the message is a greeting (e.g., "hi", "hello"), treat as ON-TOPIC but suggest asking about the product.
- COMPETITOR: If the message mentions a competitor, treat as OFF-TOPIC and explain why.

Respond ONLY in this JSON format:
{ "on_topic": true/false, "reason": "..." }"#;

/// Classifies a message as on/off-topic relative to the marketed product
pub struct OnTopicCheck {
    metadata: Arc<ProductMetadata>,
    classifier: Arc<dyn ClassifierService>,
}

impl OnTopicCheck {
    pub fn new(metadata: Arc<ProductMetadata>, classifier: Arc<dyn ClassifierService>) -> Self {
        Self {
            metadata,
            classifier,
        }
    }

    fn build_user_prompt(&self, text: &str) -> String {
        format!(
            "Product: {}\nDescription: {}\n\nUser Message: \"{}\"",
            self.metadata.product_name, self.metadata.description, text
        )
    }
}

#[async_trait]
impl GuardrailCheck for OnTopicCheck {
    fn name(&self) -> &'static str {
        "on_topic"
    }

    async fn check(&self, text: &str) -> Result<Verdict> {
        let response = self
            .classifier
            .classify(ON_TOPIC_SYSTEM, &self.build_user_prompt(text))
            .await?;

        if require_bool(&response, "on_topic")? {
            Ok(Verdict::Allowed)
        } else {
            let reason = optional_reason(&response)
                .unwrap_or_else(|| "This message is off-topic for this assistant.".to_string());
            Ok(Verdict::rejected(reason))
        }
    }
}

//
// ================= Financial Topic (coach) =================
//

const FINANCIAL_TOPIC_SYSTEM: &str = r#"You are an expert classifier for a personal financial coaching assistant. Decide if a user's message is a FINANCIAL topic the coach may discuss.

- FINANCIAL: budgeting, saving, investing, retirement, taxes, debt management, financial goals, banking products in general terms. Generic greetings and introductions ("hi", "who are you?") also count as FINANCIAL.
- NOT FINANCIAL: programming, math problems unrelated to money, recipes, health advice, entertainment, sports, or weather — unless the user explicitly ties them to a financial impact (e.g., the cost of a hobby).

Respond ONLY in this JSON format:
{ "is_financial": true/false, "reason": "..." }"#;

/// Classifies whether a message falls inside the coach's financial domain
pub struct FinancialTopicCheck {
    classifier: Arc<dyn ClassifierService>,
}

impl FinancialTopicCheck {
    pub fn new(classifier: Arc<dyn ClassifierService>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl GuardrailCheck for FinancialTopicCheck {
    fn name(&self) -> &'static str {
        "financial_topic"
    }

    async fn check(&self, text: &str) -> Result<Verdict> {
        let user = format!("User Message: \"{}\"", text);
        let response = self.classifier.classify(FINANCIAL_TOPIC_SYSTEM, &user).await?;

        if require_bool(&response, "is_financial")? {
            Ok(Verdict::Allowed)
        } else {
            let reason = optional_reason(&response).unwrap_or_else(|| {
                "I can only help with personal finance topics like budgeting, saving, and investing.".to_string()
            });
            Ok(Verdict::rejected(reason))
        }
    }
}

//
// ================= Direct Advice =================
//

const DIRECT_ADVICE_SYSTEM: &str = r#"You are an expert classifier for a financial coaching assistant. Decide if the user is asking for a SPECIFIC, ACTIONABLE investment or financial decision rather than general education.

- DIRECT ADVICE: "should I buy X stock", "where should I invest my savings", "is now the time to sell", or any request for a concrete personal buy/sell/allocate decision.
- NOT DIRECT ADVICE: questions about concepts, strategies in general terms, how products work, or how to think about a decision.

Respond ONLY in this JSON format:
{ "direct_advice": true/false, "reason": "..." }"#;

/// Detects requests for specific actionable investment decisions,
/// independent of topic acceptability
pub struct DirectAdviceCheck {
    classifier: Arc<dyn ClassifierService>,
}

impl DirectAdviceCheck {
    pub fn new(classifier: Arc<dyn ClassifierService>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl GuardrailCheck for DirectAdviceCheck {
    fn name(&self) -> &'static str {
        "direct_advice"
    }

    async fn check(&self, text: &str) -> Result<Verdict> {
        let user = format!("User Message: \"{}\"", text);
        let response = self.classifier.classify(DIRECT_ADVICE_SYSTEM, &user).await?;

        if require_bool(&response, "direct_advice")? {
            let reason = optional_reason(&response).map_or_else(
                || "I can't recommend specific investment decisions, but I'm happy to explain how to evaluate them.".to_string(),
                |r| format!("I can't recommend specific investment decisions. {}", r),
            );
            Ok(Verdict::rejected(reason))
        } else {
            Ok(Verdict::Allowed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Classifier stub returning a fixed payload
    struct CannedClassifier {
        response: serde_json::Value,
    }

    #[async_trait]
    impl ClassifierService for CannedClassifier {
        async fn classify(&self, _system: &str, _user: &str) -> Result<serde_json::Value> {
            Ok(self.response.clone())
        }
    }

    fn canned(response: serde_json::Value) -> Arc<dyn ClassifierService> {
        Arc::new(CannedClassifier { response })
    }

    fn test_metadata() -> Arc<ProductMetadata> {
        Arc::new(ProductMetadata {
            product_name: "FinCoach".to_string(),
            description: "A financial coaching assistant".to_string(),
            features: vec!["budgeting".to_string()],
        })
    }

    #[tokio::test]
    async fn test_on_topic_allows() {
        let check = OnTopicCheck::new(
            test_metadata(),
            canned(json!({"on_topic": true, "reason": "product question"})),
        );
        let verdict = check.check("what does FinCoach do?").await.unwrap();
        assert!(verdict.is_allowed());
    }

    #[tokio::test]
    async fn test_off_topic_rejects_with_classifier_reason() {
        let check = OnTopicCheck::new(
            test_metadata(),
            canned(json!({"on_topic": false, "reason": "mentions a competitor"})),
        );
        let verdict = check.check("is BrandX better?").await.unwrap();
        assert_eq!(verdict, Verdict::rejected("mentions a competitor"));
    }

    #[tokio::test]
    async fn test_missing_required_field_is_classifier_error() {
        let check = OnTopicCheck::new(
            test_metadata(),
            canned(json!({"reason": "no boolean here"})),
        );
        let result = check.check("hello").await;
        assert!(matches!(result, Err(ChatError::ClassifierError(_))));
    }

    #[tokio::test]
    async fn test_non_boolean_field_is_classifier_error() {
        let check = FinancialTopicCheck::new(canned(json!({"is_financial": "yes"})));
        let result = check.check("budget tips?").await;
        assert!(matches!(result, Err(ChatError::ClassifierError(_))));
    }

    #[tokio::test]
    async fn test_financial_topic_allows_and_rejects() {
        let allow = FinancialTopicCheck::new(canned(json!({"is_financial": true})));
        assert!(allow.check("how do I budget?").await.unwrap().is_allowed());

        let reject = FinancialTopicCheck::new(canned(
            json!({"is_financial": false, "reason": "cooking is not a financial topic"}),
        ));
        let verdict = reject.check("how do I bake bread?").await.unwrap();
        assert_eq!(verdict, Verdict::rejected("cooking is not a financial topic"));
    }

    #[tokio::test]
    async fn test_direct_advice_rejects() {
        let check = DirectAdviceCheck::new(canned(
            json!({"direct_advice": true, "reason": "asks whether to buy a specific stock"}),
        ));
        let verdict = check.check("should I buy XYZ stock?").await.unwrap();

        match verdict {
            Verdict::Rejected { reason } => {
                assert!(reason.contains("specific investment decisions"));
                assert!(reason.contains("specific stock"));
            }
            Verdict::Allowed => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_general_question_is_not_direct_advice() {
        let check = DirectAdviceCheck::new(canned(json!({"direct_advice": false})));
        let verdict = check.check("how do index funds work?").await.unwrap();
        assert!(verdict.is_allowed());
    }

    #[tokio::test]
    async fn test_classifier_infra_error_propagates() {
        struct FailingClassifier;

        #[async_trait]
        impl ClassifierService for FailingClassifier {
            async fn classify(&self, _: &str, _: &str) -> Result<serde_json::Value> {
                Err(ChatError::ClassifierError("timeout".into()))
            }
        }

        let check = FinancialTopicCheck::new(Arc::new(FailingClassifier));
        let result = check.check("budget tips?").await;
        assert!(matches!(result, Err(ChatError::ClassifierError(_))));
    }
}
