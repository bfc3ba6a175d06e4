//! Sensitive-data pattern scanner
//!
//! Fast local scan for financial/PII markers. Pure and synchronous: it
//! must stay cheap because it is ordered before every network-bound
//! check, so obviously-rejectable input never costs an API call.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use super::{GuardrailCheck, Verdict};
use crate::Result;

/// Fixed pattern table: (pattern name, case-insensitive regex)
const PATTERN_SOURCES: &[(&str, &str)] = &[
    ("account number", r"(?i)\b(?:bank\s+)?account\s*(?:no|num|number)\b"),
    ("credit card", r"(?i)\bcredit\s*card\b"),
    ("debit card", r"(?i)\bdebit\s*card\b"),
    ("card number", r"(?i)\bcard\s*(?:no|num|number)\b"),
    ("cvv", r"(?i)\bcvv2?\b"),
    ("ssn", r"(?i)\b(?:ssn|social\s+security(?:\s+(?:no|num|number))?)\b"),
    ("national id", r"(?i)\b(?:national\s+id|aadhaar|passport\s*(?:no|num|number))\b"),
    ("password", r"(?i)\bpass\s*word\b"),
    ("pin", r"(?i)\b(?:pin|pin\s*(?:code|number))\b"),
    ("routing number", r"(?i)\b(?:routing|sort\s*code|ifsc|swift)\s*(?:no|num|number|code)?\b"),
];

lazy_static! {
    static ref SENSITIVE_PATTERNS: Vec<(&'static str, Regex)> = PATTERN_SOURCES
        .iter()
        .map(|(name, source)| (*name, Regex::new(source).expect("invalid sensitive pattern")))
        .collect();
}

/// Scan text for sensitive-data markers. Returns the name of the first
/// matching pattern, in table order. Pure function: no side effects, no
/// external calls.
pub fn scan(text: &str) -> Option<&'static str> {
    SENSITIVE_PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(text))
        .map(|(name, _)| *name)
}

/// Guardrail stage wrapping [`scan`]
pub struct SensitiveDataCheck;

impl SensitiveDataCheck {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SensitiveDataCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuardrailCheck for SensitiveDataCheck {
    fn name(&self) -> &'static str {
        "sensitive_data"
    }

    async fn check(&self, text: &str) -> Result<Verdict> {
        match scan(text) {
            Some(pattern) => Ok(Verdict::rejected(format!(
                "Please avoid sharing sensitive information ({}). I can't process messages containing it.",
                pattern
            ))),
            None => Ok(Verdict::Allowed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_common_markers() {
        assert_eq!(scan("my credit card number is 4111"), Some("credit card"));
        assert_eq!(scan("what is my account number"), Some("account number"));
        assert_eq!(scan("here is the CVV"), Some("cvv"));
        assert_eq!(scan("I forgot my password"), Some("password"));
        assert_eq!(scan("my routing number is 021000021"), Some("routing number"));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(scan("MY SSN IS 123-45-6789"), scan("my ssn is 123-45-6789"));
        assert_eq!(scan("Social Security Number"), Some("ssn"));
    }

    #[test]
    fn test_clean_text_passes() {
        assert_eq!(scan("how do I start budgeting for retirement?"), None);
        assert_eq!(scan("tell me about your product features"), None);
    }

    #[test]
    fn test_idempotent() {
        let text = "What's your SSN policy, should I invest in XYZ stock?";
        let first = scan(text);
        let second = scan(text);
        assert_eq!(first, second);
        assert_eq!(first, Some("ssn"));
    }

    #[test]
    fn test_first_match_in_table_order() {
        // Both "account number" and "password" appear; table order wins.
        assert_eq!(
            scan("my account number and password"),
            Some("account number")
        );
    }

    #[tokio::test]
    async fn test_check_rejects_with_sensitive_information_reason() {
        let check = SensitiveDataCheck::new();
        let verdict = check.check("my credit card number is 4111").await.unwrap();

        match verdict {
            Verdict::Rejected { reason } => {
                assert!(reason.contains("sensitive information"));
                assert!(reason.contains("credit card"));
            }
            Verdict::Allowed => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_check_allows_clean_text() {
        let check = SensitiveDataCheck::new();
        let verdict = check.check("how should I save for a house?").await.unwrap();
        assert!(verdict.is_allowed());
    }
}
