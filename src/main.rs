mod config;
mod engine;
mod evaluator;
mod extraction;
mod period;
mod providers;
mod secrets;
mod server;
mod state;
mod traits;
pub mod utils;

#[cfg(test)]
mod integration_tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-V" => {
                println!("habitd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("habitd {}", env!("CARGO_PKG_VERSION"));
                println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
                println!("Usage: habitd [OPTIONS]\n");
                println!("Reads config.toml from the working directory when present.\n");
                println!("Options:");
                println!("  -h, --help       Print help");
                println!("  -V, --version    Print version");
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }

    let config_path = PathBuf::from("config.toml");
    let config = if config_path.exists() {
        config::AppConfig::load(&config_path)?
    } else {
        tracing::info!("no config.toml found, using defaults");
        config::AppConfig::default()
    };

    // Run async
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: config::AppConfig) -> anyhow::Result<()> {
    let store = Arc::new(state::SqliteStateStore::new(&config.state.db_path).await?);

    // Collaborator clients are constructed once here and injected; nothing
    // downstream rebuilds them per request.
    let api_key = config
        .provider
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| secrets::resolve_secret(secrets::PROVIDER_API_KEY_NAMES));
    let provider: Option<Arc<dyn traits::CompletionProvider>> = match api_key {
        Some(key) => match config.provider.kind {
            config::ProviderKind::OpenaiCompatible => {
                Some(Arc::new(providers::OpenAiCompatibleProvider::new(
                    &config.provider.base_url,
                    &config.provider.model,
                    &key,
                )?))
            }
        },
        None => {
            tracing::warn!(
                "no completion API key found; /api/text_to_goal will report a configuration error"
            );
            None
        }
    };

    let auth_token = config
        .server
        .auth_token
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| secrets::resolve_secret(secrets::API_TOKEN_NAMES));
    if auth_token.is_none() {
        tracing::warn!("no API token configured; serving /api without authentication");
    }

    let app_state = server::AppState {
        store,
        provider,
        auth_token,
        evaluate_options: engine::EvaluateOptions {
            continue_on_error: config.evaluation.continue_on_error,
        },
        started_at: Instant::now(),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!("habitd listening on {}", config.server.bind_addr);
    axum::serve(listener, server::build_router(app_state)).await?;

    Ok(())
}
