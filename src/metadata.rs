//! Product metadata store
//!
//! Loads the static product/domain description used to parameterize
//! guardrail prompts and the persona system prompt. Loaded once during
//! startup and shared as `Arc<ProductMetadata>`; read-only afterwards.
//! A missing or unparseable metadata file is fatal — the process must not
//! serve traffic without it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ChatError;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMetadata {
    #[serde(rename = "productName")]
    pub product_name: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl ProductMetadata {
    /// Load metadata from a JSON file. Callers treat an `Err` as fatal at
    /// startup; re-invoking is the only way to reload.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ChatError::MetadataError(format!(
                "Failed to read metadata file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            ChatError::MetadataError(format!(
                "Failed to parse metadata file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Comma-joined feature list for prompt interpolation
    pub fn feature_list(&self) -> String {
        self.features.join(", ")
    }
}
