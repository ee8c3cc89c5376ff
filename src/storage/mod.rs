//! Persistence seams.
//!
//! Every table the checkout flow touches sits behind a repository trait so the
//! services can run over PostgreSQL in production and over the in-memory
//! implementations in development and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, Coupon, Order, Product, Profile, SavedAddress};
use crate::domain::value_objects::{ShippingAddress, Size};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, StorageError>;

    async fn find(&self, id: Uuid) -> Result<Option<Product>, StorageError>;

    /// Decrements the stock of one size only if it covers `quantity`.
    ///
    /// Returns the remaining stock, or `None` when the stock was insufficient
    /// (or the size does not exist) and nothing changed.
    async fn decrement_stock(&self, id: Uuid, size: &Size, quantity: u32) -> Result<Option<u32>, StorageError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn load(&self, user_id: Uuid) -> Result<Option<Cart>, StorageError>;

    /// Replaces the stored cart; concurrent writers resolve last-write-wins.
    async fn save(&self, cart: &Cart) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StorageError>;

    /// Counts one use unless the cap is already reached. Returns whether a use was recorded.
    async fn record_use(&self, code: &str) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), StorageError>;

    async fn update(&self, order: &Order) -> Result<(), StorageError>;

    async fn find(&self, id: Uuid) -> Result<Option<Order>, StorageError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StorageError>;

    async fn list_recent(&self, limit: u32, offset: u32) -> Result<Vec<Order>, StorageError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StorageError>;

    /// Deducts points only if the balance covers them. Returns whether the deduction happened.
    async fn deduct_points(&self, user_id: Uuid, points: u32) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SavedAddress>, StorageError>;

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<SavedAddress>, StorageError>;

    async fn insert(&self, user_id: Uuid, address: ShippingAddress) -> Result<SavedAddress, StorageError>;
}
