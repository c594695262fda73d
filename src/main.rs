//! Travel Assistant - interactive console entry point
//!
//! Builds the document index, then answers questions read from stdin.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use travel_assistant::agent::Agent;
use travel_assistant::chat::{ChatRequest, ChatService};
use travel_assistant::config::Config;
use travel_assistant::llm::OpenAiClient;
use travel_assistant::retrieval::{build_or_load, OpenAiEmbedder};
use travel_assistant::session::SessionManager;
use travel_assistant::tools::{DuckDuckGo, PdfSearch, ToolRegistry, WebSearch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Honour a local .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "travel_assistant=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: model={}", config.default_model);

    let embedder = Arc::new(OpenAiEmbedder::new(
        config.api_key.clone(),
        config.index.embed_base_url.clone(),
        config.index.embed_model.clone(),
        config.request_timeout,
    )?);

    let store = Arc::new(build_or_load(&config.index, embedder.as_ref()).await?);
    info!("Vector index ready: {} chunks", store.len().await);

    let tools = Arc::new(ToolRegistry::new(
        PdfSearch::new(store, embedder, config.index.top_k),
        WebSearch::new(Arc::new(DuckDuckGo::new(config.request_timeout)?)),
    ));

    let llm = Arc::new(OpenAiClient::new(
        config.api_key.clone(),
        config.llm_base_url.clone(),
        config.default_model.clone(),
        config.request_timeout,
    )?);

    let agent = Arc::new(Agent::new(llm, tools, config.max_iterations));
    let sessions = Arc::new(SessionManager::new(config.sessions.max_sessions));
    let service = ChatService::new(agent, Arc::clone(&sessions));

    spawn_sweeper(Arc::clone(&sessions), &config);

    run_console(&service).await
}

/// Periodically drop idle sessions.
fn spawn_sweeper(sessions: Arc<SessionManager>, config: &Config) {
    let ttl = config.sessions.ttl;
    let mut ticker = tokio::time::interval(config.sessions.sweep_interval);
    tokio::spawn(async move {
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sessions.sweep_expired(ttl);
        }
    });
}

async fn run_console(service: &ChatService) -> anyhow::Result<()> {
    println!("Travel assistant ready. Type 'exit' or 'quit' to leave, '/new' for a fresh session, '/clear' to forget this one.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session_id: Option<String> = None;

    loop {
        println!();
        println!("You:");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" => break,
            "/new" => {
                session_id = None;
                println!("Started a new session.");
                continue;
            }
            "/clear" => {
                match session_id.as_deref().map(|id| service.sessions().clear(id)) {
                    Some(Err(e)) => {
                        tracing::warn!("{}", e);
                        session_id = None;
                    }
                    _ => println!("Session history cleared."),
                }
                continue;
            }
            _ => {}
        }

        let response = match service
            .handle(ChatRequest::new(input, session_id.clone()))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("{}", e);
                println!("Bot: That session is no longer available, starting a new one. Please ask again.");
                session_id = None;
                continue;
            }
        };

        println!("Bot: {}", response.response);
        if !response.sources_used.is_empty() {
            println!("Sources: {}", response.sources_used.join(", "));
        }
        session_id = Some(response.session_id);
    }

    println!("Goodbye!");
    Ok(())
}
