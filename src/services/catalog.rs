//! Catalog Store: products loaded once per process and served from memory.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;
use crate::domain::aggregates::Product;
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Quantity, Size};
use crate::integrations::EventPublisher;
use crate::storage::{ProductRepository, StorageError};

pub type CatalogSnapshot = Arc<HashMap<Uuid, Product>>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product not found")]
    NotFound(Uuid),

    #[error("Only limited stock left for size {size}")]
    InsufficientStock { product_id: Uuid, size: Size, requested: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct Catalog {
    repository: Arc<dyn ProductRepository>,
    products: RwLock<Option<CatalogSnapshot>>,
    events: EventPublisher,
}

impl Catalog {
    pub fn new(repository: Arc<dyn ProductRepository>, events: EventPublisher) -> Self {
        Self { repository, products: RwLock::new(None), events }
    }

    /// The cached catalog, loading it on first use.
    pub async fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        if let Some(products) = self.products.read().await.as_ref() {
            return Ok(Arc::clone(products));
        }
        let mut slot = self.products.write().await;
        if let Some(products) = slot.as_ref() {
            return Ok(Arc::clone(products));
        }
        let loaded = self.load().await?;
        *slot = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    pub async fn refresh(&self) -> Result<CatalogSnapshot, CatalogError> {
        let loaded = self.load().await?;
        *self.products.write().await = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Active products, sorted by name.
    pub async fn products(&self) -> Result<Vec<Product>, CatalogError> {
        let snapshot = self.snapshot().await?;
        let mut products: Vec<Product> = snapshot.values().filter(|p| p.is_active()).cloned().collect();
        products.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(products)
    }

    pub async fn product(&self, id: Uuid) -> Result<Product, CatalogError> {
        self.snapshot().await?.get(&id).cloned().ok_or(CatalogError::NotFound(id))
    }

    /// Conditional decrement at the data layer; the cached product is patched
    /// with the stock the store reports back.
    pub async fn decrement_stock(&self, product_id: Uuid, size: &Size, quantity: u32) -> Result<u32, CatalogError> {
        let Some(remaining) = self.repository.decrement_stock(product_id, size, quantity).await? else {
            warn!(%product_id, %size, quantity, "stock decrement refused");
            return Err(CatalogError::InsufficientStock { product_id, size: size.clone(), requested: quantity });
        };
        if let Some(products) = self.products.write().await.as_mut() {
            if let Some(product) = Arc::make_mut(products).get_mut(&product_id) {
                product.set_stock(size, Quantity::new(remaining));
            }
        }
        self.events.publish(&DomainEvent::Product(ProductEvent::StockDecremented {
            product_id, size: size.clone(), quantity, remaining,
        })).await;
        Ok(remaining)
    }

    async fn load(&self) -> Result<CatalogSnapshot, CatalogError> {
        let products = self.repository.list().await?;
        info!(count = products.len(), "catalog loaded");
        Ok(Arc::new(products.into_iter().map(|p| (p.id(), p)).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use crate::domain::value_objects::{Money, Sku};
    use crate::storage::memory::MemoryProducts;

    fn catalog(products: Vec<Product>) -> Catalog {
        Catalog::new(Arc::new(MemoryProducts::new(products)), EventPublisher::disabled())
    }

    fn tee(stock: u32) -> Product {
        Product::create(Uuid::new_v4(), Sku::new("TEE").unwrap(), "Tee", Money::inr(Decimal::new(500, 0))).with_size("M", stock)
    }

    #[tokio::test]
    async fn test_inactive_products_hidden() {
        let active = tee(1);
        let hidden = tee(1).with_active(false);
        let catalog = catalog(vec![active.clone(), hidden.clone()]);
        let listed = catalog.products().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), active.id());
        assert!(catalog.product(hidden.id()).await.is_ok());
    }

    #[tokio::test]
    async fn test_decrement_patches_cache() {
        let p = tee(3);
        let catalog = catalog(vec![p.clone()]);
        catalog.snapshot().await.unwrap();
        assert_eq!(catalog.decrement_stock(p.id(), &Size::new("M"), 2).await.unwrap(), 1);
        assert_eq!(catalog.product(p.id()).await.unwrap().stock_for(&Size::new("M")).value(), 1);
    }

    #[tokio::test]
    async fn test_last_unit_cannot_be_sold_twice() {
        let p = tee(1);
        let catalog = Arc::new(catalog(vec![p.clone()]));
        let size = Size::new("M");
        let (a, b) = tokio::join!(
            catalog.decrement_stock(p.id(), &size, 1),
            catalog.decrement_stock(p.id(), &size, 1),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(a.err().or(b.err()), Some(CatalogError::InsufficientStock { .. })));
    }
}
