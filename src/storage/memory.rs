//! In-memory repositories with the same conditional-update semantics as the
//! PostgreSQL ones.

use std::collections::HashMap;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, Coupon, Order, Product, Profile, SavedAddress};
use crate::domain::aggregates::coupon::normalize_code;
use crate::domain::value_objects::{Quantity, ShippingAddress, Size};
use super::{AddressRepository, CartRepository, CouponRepository, OrderRepository, ProductRepository, ProfileRepository, StorageError};

#[derive(Debug, Default)]
pub struct MemoryProducts { rows: RwLock<HashMap<Uuid, Product>> }

impl MemoryProducts {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self { rows: RwLock::new(products.into_iter().map(|p| (p.id(), p)).collect()) }
    }
}

#[async_trait]
impl ProductRepository for MemoryProducts {
    async fn list(&self) -> Result<Vec<Product>, StorageError> {
        let mut products: Vec<Product> = self.rows.read().await.values().cloned().collect();
        products.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(products)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>, StorageError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn decrement_stock(&self, id: Uuid, size: &Size, quantity: u32) -> Result<Option<u32>, StorageError> {
        let mut rows = self.rows.write().await;
        let Some(product) = rows.get_mut(&id) else { return Ok(None) };
        if !product.sizes().iter().any(|s| &s.size == size) { return Ok(None); }
        let Some(remaining) = product.stock_for(size).subtract(quantity) else { return Ok(None) };
        product.set_stock(size, remaining);
        Ok(Some(remaining.value()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryCarts { rows: RwLock<HashMap<Uuid, Cart>> }

#[async_trait]
impl CartRepository for MemoryCarts {
    async fn load(&self, user_id: Uuid) -> Result<Option<Cart>, StorageError> {
        Ok(self.rows.read().await.get(&user_id).cloned())
    }

    async fn save(&self, cart: &Cart) -> Result<(), StorageError> {
        self.rows.write().await.insert(cart.user_id(), cart.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCoupons { rows: RwLock<HashMap<String, Coupon>> }

impl MemoryCoupons {
    pub fn new(coupons: impl IntoIterator<Item = Coupon>) -> Self {
        Self { rows: RwLock::new(coupons.into_iter().map(|c| (normalize_code(&c.code), c)).collect()) }
    }
}

#[async_trait]
impl CouponRepository for MemoryCoupons {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StorageError> {
        Ok(self.rows.read().await.get(&normalize_code(code)).cloned())
    }

    async fn record_use(&self, code: &str) -> Result<bool, StorageError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&normalize_code(code)) {
            Some(coupon) if !coupon.is_exhausted() => {
                coupon.current_uses += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryOrders { rows: RwLock<HashMap<Uuid, Order>> }

#[async_trait]
impl OrderRepository for MemoryOrders {
    async fn insert(&self, order: &Order) -> Result<(), StorageError> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|o| o.order_number() == order.order_number()) {
            return Err(StorageError::Corrupt(format!("duplicate order number {}", order.order_number())));
        }
        rows.insert(order.id(), order.clone());
        Ok(())
    }

    async fn update(&self, order: &Order) -> Result<(), StorageError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&order.id()) {
            Some(row) => { *row = order.clone(); Ok(()) }
            None => Err(StorageError::Corrupt(format!("order {} does not exist", order.id()))),
        }
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>, StorageError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StorageError> {
        let mut orders: Vec<Order> = self.rows.read().await.values().filter(|o| o.user_id() == user_id).cloned().collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(orders)
    }

    async fn list_recent(&self, limit: u32, offset: u32) -> Result<Vec<Order>, StorageError> {
        let mut orders: Vec<Order> = self.rows.read().await.values().cloned().collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(orders.into_iter().skip(offset as usize).take(limit as usize).collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfiles { rows: RwLock<HashMap<Uuid, Profile>> }

impl MemoryProfiles {
    pub fn new(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self { rows: RwLock::new(profiles.into_iter().map(|p| (p.user_id, p)).collect()) }
    }
}

#[async_trait]
impl ProfileRepository for MemoryProfiles {
    async fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StorageError> {
        Ok(self.rows.read().await.get(&user_id).cloned())
    }

    async fn deduct_points(&self, user_id: Uuid, points: u32) -> Result<bool, StorageError> {
        let mut rows = self.rows.write().await;
        let Some(profile) = rows.get_mut(&user_id) else { return Ok(false) };
        match Quantity::new(profile.reward_points).subtract(points) {
            Some(left) => { profile.reward_points = left.value(); Ok(true) }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryAddresses { rows: RwLock<Vec<SavedAddress>> }

#[async_trait]
impl AddressRepository for MemoryAddresses {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SavedAddress>, StorageError> {
        Ok(self.rows.read().await.iter().filter(|a| a.user_id == user_id).cloned().collect())
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<SavedAddress>, StorageError> {
        Ok(self.rows.read().await.iter().find(|a| a.id == id && a.user_id == user_id).cloned())
    }

    async fn insert(&self, user_id: Uuid, address: ShippingAddress) -> Result<SavedAddress, StorageError> {
        let saved = SavedAddress { id: Uuid::now_v7(), user_id, address };
        self.rows.write().await.push(saved.clone());
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use crate::domain::value_objects::{Money, Sku};

    #[tokio::test]
    async fn test_decrement_is_conditional() {
        let tee = Product::create(Uuid::new_v4(), Sku::new("TEE").unwrap(), "Tee", Money::inr(Decimal::new(500, 0))).with_size("M", 1);
        let repo = MemoryProducts::new([tee.clone()]);
        assert_eq!(repo.decrement_stock(tee.id(), &Size::new("M"), 1).await.unwrap(), Some(0));
        assert_eq!(repo.decrement_stock(tee.id(), &Size::new("M"), 1).await.unwrap(), None);
        assert_eq!(repo.decrement_stock(tee.id(), &Size::new("XL"), 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_coupon_use_respects_cap() {
        let repo = MemoryCoupons::new([Coupon::flat("once", Decimal::TEN).with_max_uses(1)]);
        assert!(repo.record_use("ONCE").await.unwrap());
        assert!(!repo.record_use("once").await.unwrap());
        assert_eq!(repo.find_by_code("Once").await.unwrap().unwrap().current_uses, 1);
    }

    #[tokio::test]
    async fn test_points_deduction_needs_balance() {
        let user = Uuid::new_v4();
        let repo = MemoryProfiles::new([Profile::customer(user, "a@example.com").with_points(150)]);
        assert!(!repo.deduct_points(user, 200).await.unwrap());
        assert!(repo.deduct_points(user, 150).await.unwrap());
        assert_eq!(repo.find(user).await.unwrap().unwrap().reward_points, 0);
    }
}
