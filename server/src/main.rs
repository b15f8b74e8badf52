use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ticketing_server::config::Config;
use ticketing_server::payment::HttpPaymentGateway;
use ticketing_server::routes::create_routes;
use ticketing_server::store::Stores;
use ticketing_server::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let gateway = Arc::new(HttpPaymentGateway::new(&config.payment));
    let state = AppState::new(Stores::postgres(pool), gateway, config.payment.clone());
    let app = create_routes(state, &config.allowed_origins, config.production);

    tracing::info!(
        currency = %config.payment.currency,
        fee_percent = %config.payment.processing_fee_percent,
        "🚀 Server running at http://{}",
        config.bind_addr
    );

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
