//! Velour Commerce - order lifecycle back office service

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use velour_commerce::api::{self, AppState};
use velour_commerce::config::Config;
use velour_commerce::gateway::{PgWallet, RazorpayClient};
use velour_commerce::service::OrderService;
use velour_commerce::store::postgres::PgOrderStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let store = PgOrderStore::new(db.clone());
    let gateway = RazorpayClient::new(
        config.razorpay_base_url.clone(),
        config.razorpay_key_id.clone(),
        config.razorpay_key_secret.clone(),
    );
    let wallet = PgWallet::new(db);
    let service = OrderService::new(
        store,
        gateway,
        wallet,
        config.razorpay_key_secret.clone(),
        config.default_return_window_days,
    );

    let state = AppState {
        service: Arc::new(service),
        webhook_secret: config.razorpay_webhook_secret.clone(),
    };

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("velour-commerce listening on 0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
