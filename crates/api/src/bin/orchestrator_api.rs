//! Orchestrator API server entry point.

use std::sync::Arc;

use api::config::{Config, ORCHESTRATOR_PORT};
use saga::{HttpCustomerDirectory, HttpOrderGateway, SagaOrchestrator};

#[tokio::main]
async fn main() {
    let config = Config::from_env(ORCHESTRATOR_PORT);

    api::init_tracing(&config.log_level);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let client = config.http_client().expect("failed to build HTTP client");
    let orchestrator = SagaOrchestrator::new(
        HttpCustomerDirectory::new(
            client.clone(),
            &config.customers_api_base,
            &config.service_token,
        ),
        HttpOrderGateway::new(client, &config.orders_api_base),
    );
    tracing::info!(
        customers = %config.customers_api_base,
        orders = %config.orders_api_base,
        "upstream services configured"
    );

    let app = api::create_orchestrator_app(Arc::new(orchestrator), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting orchestrator API");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(api::shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
