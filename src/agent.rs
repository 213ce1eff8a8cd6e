//! LLM agent orchestration for structured summarisation.
//!
//! Builds the prompt (persona, tool protocol, format instructions, prior
//! conversation, new query), runs a single-tool agent loop against the model,
//! and parses the final reply into a tagged outcome. Parsing never throws:
//! output that does not match the expected JSON shape degrades to a fallback
//! summary that is persisted directly through the injected store.

use crate::schema::SummaryRecord;
use crate::store::{StoreError, SummaryStore};
use async_trait::async_trait;
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on model invocations per request, tool calls included.
const MAX_AGENT_STEPS: usize = 4;

/// Name the model must use to invoke the persistence tool.
const SAVE_SUMMARY_TOOL: &str = "save_summary";

const TOOL_INSTRUCTIONS: &str = r#"You have one tool available, save_summary, which writes a summary to disk.
To call it, reply with only this JSON object and nothing else:
{"tool": "save_summary", "text": "<the summary text>", "title": "<a short title>"}
The tool result will be sent back to you. Always save the summary before giving your final answer."#;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("model call timed out after {0} seconds")]
    TimedOut(u64),
    #[error("failed to persist summary: {0}")]
    Store(#[from] StoreError),
}

/// Seam between the orchestrator and the hosted model, so the agent loop can
/// be driven by a scripted fake under test.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Production model client backed by Google Gemini.
pub struct GeminiModelClient {
    client: GeminiClient,
}

impl GeminiModelClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AgentError> {
        let client = GeminiClient::new(api_key)
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?
            .model(parse_gemini_model(model));
        Ok(Self { client })
    }
}

#[async_trait]
impl ModelClient for GeminiModelClient {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
        let result = self
            .client
            .generate_with_metadata(prompt)
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;
        Ok(result.text)
    }
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModel {
    match model {
        "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
        "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
        "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
        _ => GeminiModel::Gemini20Flash, // Default
    }
}

/// A tool invocation emitted by the model during the agent loop.
#[derive(Debug, Deserialize)]
struct ToolCall {
    tool: String,
    text: String,
    #[serde(default)]
    title: Option<String>,
}

/// Result of one summarisation run.
///
/// `Structured` means the model's final reply parsed cleanly against
/// [`SummaryRecord`]; `Fallback` means it did not, and the raw reply was
/// persisted as the summary body. Both variants carry a path this process
/// actually wrote.
#[derive(Debug)]
pub enum AgentOutcome {
    Structured(SummaryRecord),
    Fallback {
        summary: String,
        reason: String,
        saved_path: String,
    },
}

impl AgentOutcome {
    pub fn saved_path(&self) -> &str {
        match self {
            AgentOutcome::Structured(record) => &record.saved_path,
            AgentOutcome::Fallback { saved_path, .. } => saved_path,
        }
    }
}

/// Orchestrates the prompt, the agent loop and outcome parsing.
pub struct SummaryAgent {
    model: Arc<dyn ModelClient>,
    store: Arc<dyn SummaryStore>,
    persona: String,
    timeout: Duration,
}

impl SummaryAgent {
    pub fn new(
        model: Arc<dyn ModelClient>,
        store: Arc<dyn SummaryStore>,
        persona: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            store,
            persona: persona.into(),
            timeout,
        }
    }

    /// Run the agent loop for one query.
    ///
    /// `history` is the rendered prior conversation, `fallback_title` the
    /// title used when the model does not supply one.
    pub async fn run(
        &self,
        query: &str,
        history: &str,
        fallback_title: &str,
    ) -> Result<AgentOutcome, AgentError> {
        let mut transcript = self.build_prompt(query, history);
        let mut last_saved: Option<PathBuf> = None;
        let mut final_text = String::new();

        for step in 0..MAX_AGENT_STEPS {
            let reply = self.invoke(&transcript).await?;
            let cleaned = strip_markdown_fences(&reply).to_string();
            match serde_json::from_str::<ToolCall>(&cleaned) {
                Ok(call) if call.tool == SAVE_SUMMARY_TOOL => {
                    let title = call.title.as_deref().unwrap_or(fallback_title);
                    let path = self.store.save(&call.text, title)?;
                    tracing::debug!(step, path = %path.display(), "agent saved a summary");
                    transcript.push_str(&format!(
                        "\nAssistant: {}\nTool result: Saved summary to {}\nUser: Now reply with the final JSON summary object.\n",
                        cleaned,
                        path.display()
                    ));
                    last_saved = Some(path);
                    final_text = cleaned;
                }
                _ => {
                    final_text = cleaned;
                    break;
                }
            }
        }

        self.parse_outcome(final_text, last_saved, fallback_title)
    }

    /// Coerce the model's final reply into an outcome.
    ///
    /// The response's saved path is always one this process wrote: the path
    /// recorded from the loop's tool execution, or a save performed here. A
    /// path merely claimed by the model is never trusted.
    fn parse_outcome(
        &self,
        final_text: String,
        last_saved: Option<PathBuf>,
        fallback_title: &str,
    ) -> Result<AgentOutcome, AgentError> {
        match serde_json::from_str::<SummaryRecord>(&final_text) {
            Ok(record) if record.is_empty() => {
                tracing::warn!("model returned an empty summary record, using raw text");
                let path = self.store.save(&final_text, fallback_title)?;
                Ok(AgentOutcome::Fallback {
                    summary: final_text,
                    reason: "empty summary record".to_string(),
                    saved_path: path.display().to_string(),
                })
            }
            Ok(mut record) => {
                let path = match last_saved {
                    Some(path) => path,
                    None => self.store.save(&record.summary, &record.title)?,
                };
                record.saved_path = path.display().to_string();
                Ok(AgentOutcome::Structured(record))
            }
            Err(parse_err) => {
                tracing::warn!(
                    error = %parse_err,
                    "model output did not match the summary schema, using raw text"
                );
                let path = self.store.save(&final_text, fallback_title)?;
                Ok(AgentOutcome::Fallback {
                    summary: final_text,
                    reason: parse_err.to_string(),
                    saved_path: path.display().to_string(),
                })
            }
        }
    }

    /// One model invocation with a bounded timeout and at most one retry
    async fn invoke(&self, prompt: &str) -> Result<String, AgentError> {
        match tokio::time::timeout(self.timeout, self.model.generate(prompt)).await {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e)) => tracing::warn!(error = %e, "model call failed, retrying once"),
            Err(_) => {
                tracing::warn!(secs = self.timeout.as_secs(), "model call timed out, retrying once")
            }
        }
        match tokio::time::timeout(self.timeout, self.model.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::TimedOut(self.timeout.as_secs())),
        }
    }

    fn build_prompt(&self, query: &str, history: &str) -> String {
        let mut prompt = format!(
            "{}\n\n{}\n\n{}\n",
            self.persona,
            TOOL_INSTRUCTIONS,
            format_instructions()
        );
        if !history.is_empty() {
            prompt.push_str("\nConversation so far:\n");
            prompt.push_str(history);
        }
        prompt.push_str("\nUser: ");
        prompt.push_str(query);
        prompt.push('\n');
        prompt
    }
}

/// Format instructions for the model's final reply, built from the JSON
/// Schema of [`SummaryRecord`]. Inserted into the prompt by argument
/// substitution, so the literal braces survive intact.
pub fn format_instructions() -> String {
    let schema = schemars::schema_for!(SummaryRecord);
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Your final reply MUST be a single JSON object with the fields \
         \"title\", \"summary\" and \"saved_path\", matching this JSON Schema:\n{}\n\n\
         Do not include any markdown formatting, code blocks, or explanations \
         in the final reply. Only output the raw JSON object.",
        schema_json
    )
}

/// Strip markdown code fence wrappers from a JSON reply
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim();
        }
    }
    trimmed
}
