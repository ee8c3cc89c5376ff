//! Pricing: combo bundles, coupon and reward-point discounts, delivery fee.
//!
//! Combos are evaluated first; coupon and points then apply to the
//! bundle-adjusted subtotal, and the payable total is
//! `max(0, subtotal - coupon - points + delivery)`.

pub mod combo;
pub mod discounts;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::{Cart, Product};
use crate::domain::value_objects::Money;

pub use combo::{combo_adjusted, ComboApplication, ComboPricing, ComboRule};
pub use discounts::{
    evaluate_coupon, redeem_points, AppliedCoupon, AppliedRewardPoints, CouponRejection, PointsRejection, MIN_POINTS_REDEMPTION,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    pub flat_fee: Decimal,
    pub free_above: Option<Decimal>,
}

impl DeliveryPolicy {
    pub fn fee_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO { return Decimal::ZERO; }
        match self.free_above {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.flat_fee,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingRules {
    pub combos: Vec<ComboRule>,
    pub delivery: DeliveryPolicy,
}

/// Discount selections carried by a checkout session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Discounts {
    pub coupon: Option<AppliedCoupon>,
    pub points: Option<AppliedRewardPoints>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub currency: String,
    pub item_total: Decimal,
    pub combo_savings: Decimal,
    pub combos: Vec<ComboApplication>,
    pub subtotal: Decimal,
    pub coupon_discount: Decimal,
    pub points_discount: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

impl PriceBreakdown {
    pub fn total_money(&self) -> Money { Money::new(self.total, &self.currency) }
    pub fn delivery_money(&self) -> Money { Money::new(self.delivery_fee, &self.currency) }
    pub fn coupon_money(&self) -> Money { Money::new(self.coupon_discount, &self.currency) }
}

/// `max(0, subtotal - coupon - points + delivery)`
pub fn final_total(subtotal: Decimal, coupon: Decimal, points: Decimal, delivery: Decimal) -> Decimal {
    (subtotal - coupon - points + delivery).max(Decimal::ZERO)
}

impl PricingRules {
    pub fn price<'a>(&self, cart: &Cart, lookup: impl Fn(Uuid) -> Option<&'a Product>, discounts: &Discounts) -> PriceBreakdown {
        let combo = combo_adjusted(cart.lines(), lookup, &self.combos);
        let subtotal = combo.subtotal;

        let coupon_discount = discounts.coupon.as_ref()
            .filter(|c| subtotal >= c.coupon.min_order_amount)
            .map_or(Decimal::ZERO, |c| c.coupon.discount_for(subtotal));
        let points_discount = discounts.points.as_ref()
            .map_or(Decimal::ZERO, |p| p.discount().min((subtotal - coupon_discount).max(Decimal::ZERO).floor()));
        let delivery_fee = self.delivery.fee_for(subtotal);

        PriceBreakdown {
            currency: cart.currency().to_string(),
            item_total: combo.item_total,
            combo_savings: combo.savings(),
            combos: combo.applied,
            subtotal,
            coupon_discount,
            points_discount,
            delivery_fee,
            total: final_total(subtotal, coupon_discount, points_discount, delivery_fee),
        }
    }
}
