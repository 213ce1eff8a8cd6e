//! precis server binary.
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for configuration, logging setup and starting the HTTP server.

use precis::agent::GeminiModelClient;
use precis::server::{self, AppState};
use precis::session::SessionHistory;
use precis::{Config, FsSummaryStore, SummaryAgent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    let level = if config.server.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let store = Arc::new(FsSummaryStore::new(&config.storage.summaries_dir));
    info!(dir = %store.dir().display(), "summaries directory configured");

    // A missing or unusable API key degrades the service instead of crashing:
    // the server stays up and summarisation requests answer 503.
    let agent = match &config.api.google_key {
        Some(key) => match GeminiModelClient::new(key, &config.agent.model) {
            Ok(model) => {
                info!(model = %config.agent.model, "Gemini client initialised");
                Some(SummaryAgent::new(
                    Arc::new(model),
                    store.clone(),
                    config.agent.persona.clone(),
                    Duration::from_secs(config.agent.timeout_secs),
                ))
            }
            Err(e) => {
                warn!(error = %e, "failed to initialise the Gemini client, summarisation disabled");
                None
            }
        },
        None => {
            warn!("GOOGLE_API_KEY is not set, summarisation endpoints will answer 503");
            warn!("create a .env file with GOOGLE_API_KEY=your_api_key_here to enable them");
            None
        }
    };

    let state = Arc::new(AppState {
        agent,
        store,
        history: RwLock::new(SessionHistory::default()),
        model_name: config.agent.model.clone(),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "precis listening");

    axum::serve(listener, server::router(state)).await?;
    Ok(())
}
