//! ScholarSearch API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Caller identification
//! - Rate limiting
//! - Request routing to the search, analysis and ranking services
//! - Observability (logging, metrics)

mod handlers;
mod middleware;
mod state;

use anyhow::Context;
use axum::{
    extract::Request,
    middleware::Next,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use scholarsearch_common::{config::AppConfig, metrics, VERSION};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::middleware::rate_limit::{create_rate_limiter, rate_limit_middleware};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config);

    info!("Starting ScholarSearch API Gateway v{}", VERSION);

    // Prometheus exporter on its own port
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .with_http_listener(metrics_addr)
            .install()?;
        info!(addr = %metrics_addr, "Metrics exporter listening");
    }
    metrics::register_metrics();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState::connect(config).await?;
    let app = create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        // Achievements
        .route("/achievements/search", get(handlers::achievements::search))
        .route("/achievements/batch", post(handlers::achievements::batch))
        .route("/achievements/{id}", get(handlers::achievements::get_achievement))
        .route(
            "/achievements/{id}/favorite",
            post(handlers::achievements::add_favorite).delete(handlers::achievements::remove_favorite),
        )
        // Patents
        .route("/patents/search", get(handlers::patents::search))
        // Analysis
        .route("/analysis/hot-topics", get(handlers::topics::hot_topics))
        // Leaderboards
        .route("/rankings", get(handlers::rankings::get_ranking));

    // A leaderboard rebuild runs to completion, so it sits outside the
    // request timeout
    let mut batch_routes = Router::new().route("/v1/rankings/generate", post(handlers::rankings::generate));

    let rate_limit = &state.config.rate_limit;
    if rate_limit.enabled {
        let limiter = create_rate_limiter(rate_limit);
        let limit = rate_limit.requests_per_second;
        let batch_limiter = limiter.clone();
        api_routes = api_routes.layer(axum::middleware::from_fn(move |request: Request, next: Next| {
            rate_limit_middleware(limiter.clone(), limit, request, next)
        }));
        batch_routes = batch_routes.layer(axum::middleware::from_fn(move |request: Request, next: Next| {
            rate_limit_middleware(batch_limiter.clone(), limit, request, next)
        }));
    }

    // Compose the app
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .merge(batch_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
