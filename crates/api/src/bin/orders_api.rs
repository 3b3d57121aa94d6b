//! Order API server entry point.

use std::sync::Arc;

use api::config::{Config, ORDERS_PORT};
use api::routes::orders::AppState;
use saga::HttpCustomerDirectory;
use store::PostgresDatabase;

#[tokio::main]
async fn main() {
    let config = Config::from_env(ORDERS_PORT);

    // 1. Initialize tracing
    api::init_tracing(&config.log_level);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Connect to the database and bring the schema up to date
    let db = PostgresDatabase::connect(&config.database_url, config.db_max_connections)
        .await
        .expect("failed to connect to database");
    db.run_migrations().await.expect("migrations failed");

    // 4. Customer validation client
    let client = config.http_client().expect("failed to build HTTP client");
    let customers =
        HttpCustomerDirectory::new(client, &config.customers_api_base, &config.service_token);

    // 5. Build the application
    let state = Arc::new(AppState::new(db, Arc::new(customers)));
    let app = api::create_orders_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting orders API");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(api::shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
