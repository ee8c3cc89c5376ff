//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub kind: CouponKind,
    pub active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub max_uses: Option<u32>,
    pub current_uses: u32,
    pub min_order_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponKind {
    Flat { amount: Decimal },
    Percentage { percent: Decimal, max_discount: Option<Decimal> },
}

impl Coupon {
    pub fn flat(code: impl Into<String>, amount: Decimal) -> Self {
        Self::with_kind(code, CouponKind::Flat { amount })
    }

    pub fn percentage(code: impl Into<String>, percent: Decimal) -> Self {
        Self::with_kind(code, CouponKind::Percentage { percent, max_discount: None })
    }

    fn with_kind(code: impl Into<String>, kind: CouponKind) -> Self {
        Self {
            code: normalize_code(&code.into()), kind, active: true, valid_from: None, valid_to: None,
            max_uses: None, current_uses: 0, min_order_amount: Decimal::ZERO,
        }
    }

    pub fn with_min_order(mut self, amount: Decimal) -> Self { self.min_order_amount = amount; self }
    pub fn with_max_uses(mut self, max: u32) -> Self { self.max_uses = Some(max); self }
    pub fn with_window(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.valid_from = from;
        self.valid_to = to;
        self
    }

    pub fn is_exhausted(&self) -> bool { self.max_uses.is_some_and(|max| self.current_uses >= max) }

    /// Raw discount for a subtotal, capped at the subtotal itself.
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match &self.kind {
            CouponKind::Flat { amount } => *amount,
            CouponKind::Percentage { percent, max_discount } => {
                let value = (subtotal * *percent / Decimal::ONE_HUNDRED).round_dp(2);
                max_discount.map_or(value, |cap| value.min(cap))
            }
        };
        raw.max(Decimal::ZERO).min(subtotal.max(Decimal::ZERO))
    }
}

/// Coupon codes are matched case-insensitively.
pub fn normalize_code(code: &str) -> String { code.trim().to_uppercase() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_capped_at_subtotal() {
        let c = Coupon::flat("save500", Decimal::new(500, 0));
        assert_eq!(c.code, "SAVE500");
        assert_eq!(c.discount_for(Decimal::new(300, 0)), Decimal::new(300, 0));
        assert_eq!(c.discount_for(Decimal::new(900, 0)), Decimal::new(500, 0));
    }

    #[test]
    fn test_percentage_with_cap() {
        let mut c = Coupon::percentage("TEN", Decimal::TEN);
        assert_eq!(c.discount_for(Decimal::new(2000, 0)), Decimal::new(200, 0));
        c.kind = CouponKind::Percentage { percent: Decimal::TEN, max_discount: Some(Decimal::new(150, 0)) };
        assert_eq!(c.discount_for(Decimal::new(2000, 0)), Decimal::new(150, 0));
    }

    #[test]
    fn test_exhausted() {
        let mut c = Coupon::flat("ONCE", Decimal::ONE).with_max_uses(1);
        assert!(!c.is_exhausted());
        c.current_uses = 1;
        assert!(c.is_exhausted());
    }
}
