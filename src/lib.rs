//! # precis
//!
//! An HTTP service for AI-powered document and text summarisation.
//!
//! ## Features
//!
//! - **Structured Intelligence**: the model is asked for a typed `SummaryRecord`,
//!   with a graceful fallback to raw text when parsing fails
//! - **Single-tool agent loop**: the model's one capability is saving summaries
//!   to disk through an injected store
//! - **Plain-file persistence**: summaries land as timestamped UTF-8 text files

pub mod agent;
pub mod config;
pub mod error;
pub mod extract;
pub mod schema;
pub mod server;
pub mod session;
pub mod store;

pub use agent::{AgentOutcome, SummaryAgent};
pub use config::Config;
pub use schema::{SummaryRecord, SummaryRequest, SummaryResponse};
pub use server::AppState;
pub use store::{FsSummaryStore, SummaryStore};
