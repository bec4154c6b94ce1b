pub mod config;
pub mod scheduler;
pub mod store;
pub mod theme_routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ai_classifier::LlmThemeClassifier;
use anyhow::{Context, Result};
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::Utc;
use market_client::MarketDataClient;
use serde::Serialize;
use theme_core::{InvestorFlowProvider, ThemeClassifier, ThemeTaxonomy};
use theme_engine::{PipelineDeps, PipelineResult, ThemePipeline};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

pub use config::ServerConfig;
pub use scheduler::Scheduler;
pub use store::ThemeStore;

#[derive(Clone)]
pub struct AppState {
    pub store: ThemeStore,
    pub taxonomy: Arc<ThemeTaxonomy>,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

/// Router with every API route and the HTTP layers.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .merge(theme_routes::theme_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn init_tracing() {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

fn build_pipeline(config: &ServerConfig, taxonomy: Arc<ThemeTaxonomy>) -> ThemePipeline {
    let market = Arc::new(
        MarketDataClient::new(&config.market_data_url, config.market_data_rate_limit, taxonomy.clone())
            .with_batch_delay(Duration::from_millis(config.fetch_batch_delay_ms)),
    );

    let classifier: Option<Arc<dyn ThemeClassifier>> = match config.classifier_config() {
        Some(classifier_config) => {
            tracing::info!("AI classifier enabled ({})", classifier_config.model);
            Some(Arc::new(LlmThemeClassifier::new(classifier_config)) as Arc<dyn ThemeClassifier>)
        }
        None => {
            tracing::warn!("CLASSIFIER_API_KEY not set, themes come from the taxonomy only");
            None
        }
    };

    let deps = PipelineDeps {
        quotes: market.clone(),
        hot_movers: market.clone(),
        sectors: market.clone(),
        news: market.clone(),
        ipos: market.clone(),
        classifier,
        investor_flow: Some(market as Arc<dyn InvestorFlowProvider>),
    };

    ThemePipeline::new(deps, taxonomy, config.pipeline_config())
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// No SIGTERM off Unix; Ctrl+C is the only stop signal.
#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
        _ = terminate_signal() => {
            tracing::info!("Received SIGTERM");
        }
    }
}

pub async fn run_server() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let config = ServerConfig::from_env()?;
    let taxonomy = Arc::new(config.load_taxonomy()?);
    tracing::info!(
        "Loaded theme taxonomy v{} ({} sectors, {} conglomerates)",
        taxonomy.version,
        taxonomy.sectors.len(),
        taxonomy.conglomerates.len()
    );

    let pipeline = Arc::new(build_pipeline(&config, taxonomy.clone()));
    let store = ThemeStore::new(PipelineResult::empty(Utc::now()));
    let tasks = Scheduler::new(
        pipeline,
        store.clone(),
        config.rebuild_interval(),
        config.refresh_interval(),
    )
    .spawn();

    let state = AppState { store, taxonomy };
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("🚀 Theme server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    for task in tasks {
        task.abort();
    }
    tracing::info!("Theme server stopped");
    Ok(())
}
