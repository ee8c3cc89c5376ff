//! Storefront Checkout - cart, checkout and order service

use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use storefront_checkout::domain::aggregates::{Coupon, Product, Profile};
use storefront_checkout::integrations::{EventPublisher, FunctionInvoker, HttpFunctions};
use storefront_checkout::payments::{CashfreeGateway, PaymentGateway, RazorpayGateway};
use storefront_checkout::storage::postgres::PgStore;
use storefront_checkout::{http, Config, Repositories, Settings, Storefront, StorefrontError};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env().map_err(StorefrontError::from)?;

    let repos = match &config.database_url {
        Some(url) => Repositories::postgres(PgStore::connect(url).await.map_err(StorefrontError::from)?),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            Repositories::in_memory(Vec::<Product>::new(), Vec::<Coupon>::new(), Vec::<Profile>::new())
        }
    };
    let nats = match &config.nats_url {
        Some(url) => Some(async_nats::connect(url).await.map_err(StorefrontError::from)?),
        None => None,
    };
    let functions: Arc<dyn FunctionInvoker> = Arc::new(HttpFunctions::new(&config.functions_url, config.functions_key.clone()));
    let gateways: Vec<Arc<dyn PaymentGateway>> = vec![
        Arc::new(RazorpayGateway::new(functions.clone(), config.razorpay_key_id.clone())),
        Arc::new(CashfreeGateway::new(functions.clone(), config.cashfree_mode.clone())),
    ];
    let storefront = Storefront::assemble(repos, functions, gateways, EventPublisher::new(nats), Settings::from(&config));
    let products = storefront.catalog.snapshot().await.map_err(StorefrontError::from)?;
    tracing::info!(products = products.len(), "catalog ready");

    let finalizer = storefront.payments.finalizer().clone();
    let interval = Duration::from_secs(config.retry_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let reports = finalizer.retry_pending().await;
            if !reports.is_empty() { tracing::info!(retried = reports.len(), "finalizer retry pass"); }
        }
    });

    let app = http::router(storefront);
    tracing::info!("🚀 Storefront checkout listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
