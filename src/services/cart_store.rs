//! Cart Store: the per-user cart, persisted before it becomes visible.
//!
//! Every mutation runs against a copy of the current cart; the copy is saved
//! through the repository and only then replaces the cached cart. A failed
//! save leaves the cached cart exactly as it was.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::domain::aggregates::{Cart, CartAvailability, CartError, CartLine};
use crate::domain::value_objects::Size;
use crate::storage::{CartRepository, StorageError};
use super::catalog::{Catalog, CatalogError};

#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Product is not available")]
    ProductUnavailable,

    #[error("Size {0} is not offered for this product")]
    UnknownSize(Size),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct CartStore {
    repository: Arc<dyn CartRepository>,
    catalog: Arc<Catalog>,
    currency: String,
    carts: RwLock<HashMap<Uuid, Cart>>,
}

impl CartStore {
    pub fn new(repository: Arc<dyn CartRepository>, catalog: Arc<Catalog>, currency: impl Into<String>) -> Self {
        Self { repository, catalog, currency: currency.into(), carts: RwLock::new(HashMap::new()) }
    }

    pub async fn cart(&self, user_id: Uuid) -> Result<Cart, CartStoreError> {
        if let Some(cart) = self.carts.read().await.get(&user_id) {
            return Ok(cart.clone());
        }
        let cart = self.repository.load(user_id).await?.unwrap_or_else(|| Cart::new(user_id, &self.currency));
        self.carts.write().await.insert(user_id, cart.clone());
        Ok(cart)
    }

    pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, size: Size, quantity: u32) -> Result<Cart, CartStoreError> {
        let product = self.catalog.product(product_id).await?;
        if !product.is_active() { return Err(CartStoreError::ProductUnavailable); }
        if !product.sizes().iter().any(|s| s.size == size) { return Err(CartStoreError::UnknownSize(size)); }
        let line = CartLine::for_product(&product, size, quantity);
        self.mutate(user_id, |cart| cart.add_to_cart(line)).await
    }

    pub async fn remove_size_from_cart(&self, user_id: Uuid, product_id: Uuid, size: &Size) -> Result<Cart, CartStoreError> {
        self.mutate(user_id, |cart| cart.remove_size_from_cart(product_id, size)).await
    }

    pub async fn update_size_quantity(&self, user_id: Uuid, product_id: Uuid, size: &Size, delta: i32) -> Result<Cart, CartStoreError> {
        self.mutate(user_id, |cart| cart.update_size_quantity(product_id, size, delta)).await
    }

    pub async fn remove_from_cart(&self, user_id: Uuid, product_id: Uuid) -> Result<Cart, CartStoreError> {
        self.mutate(user_id, |cart| cart.remove_from_cart(product_id)).await
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<Cart, CartStoreError> {
        self.mutate(user_id, |cart| { cart.clear(); Ok(()) }).await
    }

    /// Judged against the live catalog at call time.
    pub async fn availability(&self, user_id: Uuid) -> Result<(Cart, CartAvailability), CartStoreError> {
        let cart = self.cart(user_id).await?;
        let products = self.catalog.snapshot().await?;
        let availability = cart.availability(|id| products.get(&id));
        Ok((cart, availability))
    }

    async fn mutate<F>(&self, user_id: Uuid, change: F) -> Result<Cart, CartStoreError>
    where
        F: FnOnce(&mut Cart) -> Result<(), CartError> + Send,
    {
        let mut next = self.cart(user_id).await?;
        change(&mut next)?;
        if let Err(error) = self.repository.save(&next).await {
            warn!(%user_id, %error, "cart save failed, keeping previous cart");
            return Err(error.into());
        }
        debug!(%user_id, items = next.total_items(), "cart saved");
        self.carts.write().await.insert(user_id, next.clone());
        Ok(next)
    }
}
