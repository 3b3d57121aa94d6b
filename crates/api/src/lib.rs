//! HTTP surface of the order services.
//!
//! Two routers are built here: the Order API backed by the transaction
//! engine, and the Orchestrator API that drives the create-and-confirm saga
//! against it over HTTP. Both carry request tracing and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{CustomerDirectory, OrderGateway, SagaOrchestrator};
use store::Database;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use routes::orders::AppState;

fn system_routes(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle)
}

fn with_layers(router: Router) -> Router {
    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the Order API router.
pub fn create_orders_app<D: Database + 'static>(
    state: Arc<AppState<D>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let orders = Router::new()
        .route(
            "/orders",
            post(routes::orders::create::<D>).get(routes::orders::list::<D>),
        )
        .route("/orders/{id}", get(routes::orders::get::<D>))
        .route("/orders/{id}/confirm", post(routes::orders::confirm::<D>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<D>))
        .with_state(state);

    with_layers(orders.merge(system_routes(metrics_handle)))
}

/// Creates the Orchestrator API router.
pub fn create_orchestrator_app<C, O>(
    orchestrator: Arc<SagaOrchestrator<C, O>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    C: CustomerDirectory + 'static,
    O: OrderGateway + 'static,
{
    let saga = Router::new()
        .route(
            "/orchestrator/create-and-confirm-order",
            post(routes::orchestrator::create_and_confirm::<C, O>),
        )
        .with_state(orchestrator);

    with_layers(saga.merge(system_routes(metrics_handle)))
}

/// Installs the global tracing subscriber, honouring `RUST_LOG` when set.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}
