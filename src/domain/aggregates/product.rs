//! Product Aggregate

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Money, Quantity, Size, Sku};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    id: Uuid,
    code: Sku,
    name: String,
    price: Money,
    original_price: Option<Money>,
    sizes: Vec<SizeStock>,
    tags: Vec<String>,
    images: Vec<String>,
    active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock { pub size: Size, pub stock: Quantity }

impl Product {
    pub fn create(id: Uuid, code: Sku, name: impl Into<String>, price: Money) -> Self {
        Self {
            id, code, name: name.into(), price, original_price: None,
            sizes: vec![], tags: vec![], images: vec![], active: true,
        }
    }

    pub fn with_original_price(mut self, price: Money) -> Self { self.original_price = Some(price); self }
    pub fn with_size(mut self, size: impl Into<Size>, stock: u32) -> Self {
        self.set_stock(&size.into(), Quantity::new(stock));
        self
    }
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self { self.tags.push(tag.into()); self }
    pub fn with_image(mut self, url: impl Into<String>) -> Self { self.images.push(url.into()); self }
    pub fn with_active(mut self, active: bool) -> Self { self.active = active; self }

    pub fn id(&self) -> Uuid { self.id }
    pub fn code(&self) -> &Sku { &self.code }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> &Money { &self.price }
    pub fn original_price(&self) -> Option<&Money> { self.original_price.as_ref() }
    pub fn sizes(&self) -> &[SizeStock] { &self.sizes }
    pub fn tags(&self) -> &[String] { &self.tags }
    pub fn images(&self) -> &[String] { &self.images }
    pub fn primary_image(&self) -> Option<&str> { self.images.first().map(String::as_str) }
    pub fn is_active(&self) -> bool { self.active }

    pub fn has_tag(&self, tag: &str) -> bool { self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) }

    /// Stock for a size; unknown sizes have none.
    pub fn stock_for(&self, size: &Size) -> Quantity {
        self.sizes.iter().find(|s| &s.size == size).map(|s| s.stock).unwrap_or_default()
    }

    pub fn is_in_stock(&self) -> bool { self.sizes.iter().any(|s| !s.stock.is_zero()) }

    /// Overwrites the stock of a size, adding the size if it is new.
    pub fn set_stock(&mut self, size: &Size, stock: Quantity) {
        match self.sizes.iter_mut().find(|s| &s.size == size) {
            Some(entry) => entry.stock = stock,
            None => self.sizes.push(SizeStock { size: size.clone(), stock }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn tee() -> Product {
        Product::create(Uuid::new_v4(), Sku::new("TEE-001").unwrap(), "Oversized Tee", Money::inr(Decimal::new(799, 0)))
            .with_size("M", 3)
            .with_size("L", 0)
            .with_tag("Combo-Tee")
    }

    #[test]
    fn test_stock_for_size() {
        let p = tee();
        assert_eq!(p.stock_for(&Size::new("m")).value(), 3);
        assert!(p.stock_for(&Size::new("XXL")).is_zero());
        assert!(p.is_in_stock());
    }

    #[test]
    fn test_tags_case_insensitive() {
        assert!(tee().has_tag("combo-tee"));
        assert!(!tee().has_tag("denim"));
    }

    #[test]
    fn test_set_stock() {
        let mut p = tee();
        p.set_stock(&Size::new("M"), Quantity::new(0));
        assert!(!p.is_in_stock());
    }
}
