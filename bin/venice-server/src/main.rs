//! venice-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables and the command line.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Pick a compute device and load the model; a load failure is fatal.
//! 4. Build the Axum router and start the HTTP server with graceful shutdown;
//!    chat admission closes once the shutdown signal arrives.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use venice_core::engine::candle::{CandleEngine, detect_device};
use venice_core::{ChatService, ModelSlot};

use crate::config::{Args, Config};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env().with_args(Args::parse());

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    init_tracing(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "venice-server starting");

    // ── 3. Model ───────────────────────────────────────────────────────────────
    let model = Arc::new(ModelSlot::new());
    load_model(&cfg, &model).await?;

    // ── 4. HTTP server with graceful shutdown ──────────────────────────────────
    let chat = ChatService::new(Arc::clone(&model), cfg.generation.clone());
    let addr: SocketAddr = cfg
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address {:?}", cfg.bind_address))?;
    let state = Arc::new(AppState::new(cfg, chat));
    let chat = Arc::clone(&state.chat);
    let app = routes::build(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            chat.shutdown();
        })
        .await?;

    info!("venice-server stopped");
    Ok(())
}

fn init_tracing(cfg: &Config) {
    // `RUST_LOG` wins; otherwise use VENICE_LOG, warning loudly when it is
    // not a valid filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: VENICE_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Load the configured checkpoint into `model` on the blocking pool.
async fn load_model(cfg: &Config, model: &Arc<ModelSlot>) -> anyhow::Result<()> {
    let device = detect_device(cfg.force_cpu)?;
    info!(device = ?device, quantization = %cfg.quantization, "loading model");

    model.begin_loading();
    let source = cfg.source.clone();
    let quantization = cfg.quantization;
    let eos_token = cfg.eos_token.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        CandleEngine::load(source, quantization, device, &eos_token)
    })
    .await
    .context("model loading task did not complete")?;

    match loaded {
        Ok(engine) => {
            model.install(Arc::new(engine));
            Ok(())
        }
        Err(e) => {
            error!(error = ?e, "failed to load model");
            Err(e).context("failed to load the model; check the VENICE_MODEL_* settings")
        }
    }
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
