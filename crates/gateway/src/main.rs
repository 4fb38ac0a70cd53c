//! PaperLens API Gateway
//!
//! The HTTP surface for paper search, analysis, projects and workspace export.
//! Handles:
//! - Authentication (bearer tokens from the identity provider)
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics)

mod extract;
mod handlers;
mod middleware;

#[cfg(test)]
mod tests;

use anyhow::Context;
use axum::{
    extract::FromRef,
    middleware::from_fn,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use paperlens_common::{
    analysis::{create_analyzer, AnalysisGenerator},
    auth::JwtManager,
    config::{AppConfig, ObservabilityConfig, StorageProvider},
    db::{DbPool, InMemoryStore, Repository, Store},
    metrics::{self as app_metrics, names, UPSTREAM_BUCKETS},
    papers::{PaperIndex, SemanticScholarClient},
    workspace::{NotionClient, WorkspaceExporter},
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub papers: Arc<dyn PaperIndex>,
    pub analyzer: Arc<dyn AnalysisGenerator>,
    pub workspace: Arc<dyn WorkspaceExporter>,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting PaperLens API Gateway v{}",
        paperlens_common::VERSION
    );

    init_metrics(&config.observability)?;

    let config = Arc::new(config);
    let state = build_state(config.clone()).await?;

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let draining = draining.clone();
        async move {
            shutdown_signal().await;
            draining.notify_one();
        }
    });

    // In-flight requests get shutdown_timeout to finish
    let drain_limit = config.shutdown_timeout();
    tokio::select! {
        result = server.into_future() => result?,
        _ = async {
            draining.notified().await;
            tokio::time::sleep(drain_limit).await;
        } => warn!("Shutdown timeout elapsed, dropping open connections"),
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.metrics_port)))
        .set_buckets_for_metric(
            Matcher::Full(names::UPSTREAM_DURATION.to_string()),
            UPSTREAM_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    app_metrics::register_metrics();
    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Wire storage and upstream clients from configuration
async fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
    let store: Arc<dyn Store> = match config.database.provider {
        StorageProvider::Postgres => {
            info!("Connecting to database...");
            let pool = DbPool::new(&config.database).await?;
            if config.database.run_migrations {
                pool.migrate().await?;
            }
            Arc::new(Repository::new(pool))
        }
        StorageProvider::Memory => {
            warn!("Using in-memory storage, data is lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let papers = Arc::new(SemanticScholarClient::new(&config.paper_index)?);
    let analyzer = create_analyzer(&config.completion)?;
    let workspace = Arc::new(NotionClient::new(&config.workspace)?);

    let secret = config
        .auth
        .jwt_secret
        .clone()
        .context("auth.jwt_secret is required")?;
    let jwt = Arc::new(JwtManager::new(
        &secret,
        &config.auth.jwt_audience,
        config.auth.jwt_expiration_secs,
    ));

    info!(
        model = analyzer.model_name(),
        storage = ?config.database.provider,
        "Gateway state ready"
    );

    Ok(AppState {
        config,
        store,
        papers,
        analyzer,
        workspace,
        jwt,
    })
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let limiter = middleware::rate_limit::create_rate_limiter(&state.config.rate_limit);
    let rate_limit_enabled = state.config.rate_limit.enabled;

    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Paper lookup
        .route("/papers/search", get(handlers::papers::search_papers))
        .route("/papers/{id}", get(handlers::papers::get_paper))

        // One-off analysis (not persisted)
        .route("/analyze", post(handlers::analyze::analyze))

        // Saved analyses
        .route(
            "/analyses",
            get(handlers::analyses::list_analyses).post(handlers::analyses::create_analysis),
        )
        .route("/analyses/paper/{paper_id}", get(handlers::analyses::get_analysis))
        .route("/analyses/{id}/project", put(handlers::analyses::set_project))

        // Projects
        .route(
            "/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/projects/{id}",
            get(handlers::projects::get_project)
                .put(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )

        // Workspace export
        .route("/notion", post(handlers::notion::notion));

    let api_routes = if rate_limit_enabled {
        api_routes.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ))
    } else {
        api_routes
    };

    // Compose the app
    api_routes
        .layer(from_fn(middleware::metrics::track_requests))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(ConcurrencyLimitLayer::new(state.config.server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
