//! Request, response and model-output types for the summarisation API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured summary output expected from the LLM.
///
/// The JSON Schema derived from this type is embedded in the prompt as
/// format instructions, and the model's final reply is parsed against it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummaryRecord {
    /// Title or headline for the summarised content
    pub title: String,
    /// Condensed summary of the input
    pub summary: String,
    /// Path where the summary was saved
    pub saved_path: String,
}

/// Body of `POST /summarize/text`.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    /// Text content to summarise
    pub text: String,
    /// Additional context or notes
    #[serde(default)]
    pub additional_context: Option<String>,
    /// Optional title for the summary
    #[serde(default)]
    pub title: Option<String>,
}

/// Response body shared by both summarisation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub summary: String,
    pub title: String,
    /// Number of words in the original input text
    pub word_count: usize,
    /// Wall-clock processing time in seconds
    pub processing_time: f64,
    pub saved_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
}

/// One persisted summary file, as reported by `GET /summaries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryFileInfo {
    pub filename: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub size: u64,
}

impl SummaryRecord {
    /// Check whether the record carries any usable content
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.summary.trim().is_empty()
    }
}
