//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{Money, Quantity, Size};

/// Upper bound on the units of one size a cart may hold.
pub const MAX_SIZE_QUANTITY: u32 = 99;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    user_id: Uuid,
    currency: String,
    lines: Vec<CartLine>,
    updated_at: DateTime<Utc>,
}

/// A product plus its selected sizes. Name, price and image are copied from
/// the catalog when the line is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub sizes: Vec<SizeQuantity>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeQuantity { pub size: Size, pub quantity: Quantity }

/// What the cart page may offer next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartAvailability {
    Empty,
    ContinueShopping,
    ProceedToCheckout,
}

impl CartLine {
    pub fn for_product(product: &Product, size: impl Into<Size>, quantity: u32) -> Self {
        Self {
            product_id: product.id(),
            name: product.name().to_string(),
            price: product.price().clone(),
            image: product.primary_image().map(str::to_string),
            sizes: vec![SizeQuantity { size: size.into(), quantity: Quantity::new(quantity) }],
        }
    }

    pub fn quantity(&self) -> u32 { self.sizes.iter().map(|s| s.quantity.value()).sum() }
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity()) }
}

impl Cart {
    pub fn new(user_id: Uuid, currency: &str) -> Self {
        Self { user_id, currency: currency.to_string(), lines: vec![], updated_at: Utc::now() }
    }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line(&self, product_id: Uuid) -> Option<&CartLine> { self.lines.iter().find(|l| l.product_id == product_id) }

    /// Merges sizes into an existing line for the same product, or inserts the line.
    pub fn add_to_cart(&mut self, line: CartLine) -> Result<(), CartError> {
        if line.sizes.is_empty() || line.sizes.iter().any(|s| s.quantity.is_zero()) {
            return Err(CartError::InvalidQuantity);
        }
        let existing = self.line(line.product_id);
        for incoming in &line.sizes {
            let held = existing
                .and_then(|l| l.sizes.iter().find(|s| s.size == incoming.size))
                .map_or(0, |s| s.quantity.value());
            if held.saturating_add(incoming.quantity.value()) > MAX_SIZE_QUANTITY {
                return Err(CartError::QuantityLimit(MAX_SIZE_QUANTITY));
            }
        }
        match self.lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                for incoming in line.sizes {
                    match existing.sizes.iter_mut().find(|s| s.size == incoming.size) {
                        Some(entry) => entry.quantity = entry.quantity.add(incoming.quantity.value()),
                        None => existing.sizes.push(incoming),
                    }
                }
            }
            None => self.lines.push(line),
        }
        self.touch();
        Ok(())
    }

    /// Removes one size; a line left without sizes is removed entirely.
    pub fn remove_size_from_cart(&mut self, product_id: Uuid, size: &Size) -> Result<(), CartError> {
        let line = self.lines.iter_mut().find(|l| l.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        let before = line.sizes.len();
        line.sizes.retain(|s| &s.size != size);
        if line.sizes.len() == before { return Err(CartError::SizeNotFound(size.clone())); }
        if line.sizes.is_empty() { return self.remove_from_cart(product_id); }
        self.touch();
        Ok(())
    }

    /// Applies a signed quantity change to one size; reaching zero removes the size.
    pub fn update_size_quantity(&mut self, product_id: Uuid, size: &Size, delta: i32) -> Result<(), CartError> {
        let line = self.lines.iter_mut().find(|l| l.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        let entry = line.sizes.iter_mut().find(|s| &s.size == size).ok_or_else(|| CartError::SizeNotFound(size.clone()))?;
        let next = entry.quantity.adjust(delta);
        if next.value() > MAX_SIZE_QUANTITY { return Err(CartError::QuantityLimit(MAX_SIZE_QUANTITY)); }
        entry.quantity = next;
        if entry.quantity.is_zero() { return self.remove_size_from_cart(product_id, size); }
        self.touch();
        Ok(())
    }

    pub fn remove_from_cart(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    pub fn total_price(&self) -> Money {
        self.lines.iter().fold(Money::zero(&self.currency), |acc, l| acc.add(&l.line_total()).unwrap_or(acc))
    }

    pub fn total_items(&self) -> u32 { self.lines.iter().map(CartLine::quantity).sum() }

    /// Stock is judged against the given catalog view at call time only.
    pub fn availability<'a>(&self, lookup: impl Fn(Uuid) -> Option<&'a Product>) -> CartAvailability {
        if self.lines.is_empty() { return CartAvailability::Empty; }
        let short = self.lines.iter().any(|line| match lookup(line.product_id) {
            Some(product) if product.is_active() => line.sizes.iter().any(|s| s.quantity > product.stock_for(&s.size)),
            _ => true,
        });
        if short { CartAvailability::ContinueShopping } else { CartAvailability::ProceedToCheckout }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("Size {0} not found in cart line")]
    SizeNotFound(Size),
    #[error("Quantity must be at least one")]
    InvalidQuantity,
    #[error("At most {0} units of one size fit in the cart")]
    QuantityLimit(u32),
}
