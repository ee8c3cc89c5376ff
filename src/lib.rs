//! Storefront Checkout
//!
//! Cart, pricing, checkout and order placement for an apparel storefront.
//!
//! ## Features
//! - Per-user carts with per-size quantities
//! - Combo bundles, coupons and reward points
//! - Hosted checkout through Razorpay- and Cashfree-style gateways
//! - Post-payment finalization with a retry queue
//! - Order history, issue reports and admin status updates

pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod integrations;
pub mod payments;
pub mod services;
pub mod storage;

use thiserror::Error;

pub use app::{Repositories, Settings, Storefront};
pub use config::{Config, ConfigError};

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while starting the service.
#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] services::CatalogError),

    #[error("Event bus error: {0}")]
    Nats(#[from] async_nats::ConnectError),
}
