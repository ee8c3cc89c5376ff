//! Coupon and reward-point eligibility.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::aggregates::coupon::Coupon;

/// Smallest number of points that can be redeemed at once.
pub const MIN_POINTS_REDEMPTION: u32 = 100;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Invalid coupon code")]
    NotFound,
    #[error("This coupon is not active")]
    Inactive,
    #[error("This coupon is not valid yet")]
    NotYetValid,
    #[error("This coupon has expired")]
    Expired,
    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("Add items worth {minimum} or more to use this coupon")]
    MinimumOrderNotMet { minimum: Decimal },
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PointsRejection {
    #[error("A minimum of {minimum} points is required to redeem")]
    BelowMinimum { minimum: u32 },
    #[error("Only {available} points available")]
    InsufficientBalance { available: u32 },
}

/// A coupon that passed every check for the subtotal it was evaluated against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon: Coupon,
    pub discount: Decimal,
}

impl AppliedCoupon {
    pub fn code(&self) -> &str { &self.coupon.code }

    /// Re-runs the full check against a new subtotal.
    pub fn revalidate(&self, subtotal: Decimal, now: DateTime<Utc>) -> Result<AppliedCoupon, CouponRejection> {
        evaluate_coupon(Some(&self.coupon), subtotal, now)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRewardPoints {
    pub requested: u32,
    pub points: u32,
}

impl AppliedRewardPoints {
    /// One point is worth one currency unit.
    pub fn discount(&self) -> Decimal { Decimal::from(self.points) }
}

/// Checks run in order: exists, active, within window, under usage cap, minimum order.
pub fn evaluate_coupon(coupon: Option<&Coupon>, subtotal: Decimal, now: DateTime<Utc>) -> Result<AppliedCoupon, CouponRejection> {
    let coupon = coupon.ok_or(CouponRejection::NotFound)?;
    if !coupon.active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.valid_from.is_some_and(|from| now < from) {
        return Err(CouponRejection::NotYetValid);
    }
    if coupon.valid_to.is_some_and(|to| now > to) {
        return Err(CouponRejection::Expired);
    }
    if coupon.is_exhausted() {
        return Err(CouponRejection::UsageLimitReached);
    }
    if subtotal < coupon.min_order_amount {
        return Err(CouponRejection::MinimumOrderNotMet { minimum: coupon.min_order_amount });
    }
    Ok(AppliedCoupon { coupon: coupon.clone(), discount: coupon.discount_for(subtotal) })
}

/// Requests above the balance are clamped to it; anything under the minimum is refused.
pub fn redeem_points(requested: u32, available: u32) -> Result<AppliedRewardPoints, PointsRejection> {
    if requested < MIN_POINTS_REDEMPTION {
        return Err(PointsRejection::BelowMinimum { minimum: MIN_POINTS_REDEMPTION });
    }
    let points = requested.min(available);
    if points < MIN_POINTS_REDEMPTION {
        return Err(PointsRejection::InsufficientBalance { available });
    }
    Ok(AppliedRewardPoints { requested, points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn amount(v: i64) -> Decimal { Decimal::new(v, 0) }

    #[test]
    fn test_missing_coupon() {
        assert_eq!(evaluate_coupon(None, amount(1000), Utc::now()), Err(CouponRejection::NotFound));
    }

    #[test]
    fn test_check_order_inactive_before_expiry() {
        let mut c = Coupon::flat("OLD", amount(100)).with_window(None, Some(Utc::now() - Duration::days(1)));
        c.active = false;
        assert_eq!(evaluate_coupon(Some(&c), amount(1000), Utc::now()), Err(CouponRejection::Inactive));
        c.active = true;
        assert_eq!(evaluate_coupon(Some(&c), amount(1000), Utc::now()), Err(CouponRejection::Expired));
    }

    #[test]
    fn test_expired_message() {
        let c = Coupon::flat("OLD", amount(100)).with_window(None, Some(Utc::now() - Duration::hours(1)));
        let err = evaluate_coupon(Some(&c), amount(1000), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "This coupon has expired");
    }

    #[test]
    fn test_not_yet_valid() {
        let c = Coupon::flat("SOON", amount(100)).with_window(Some(Utc::now() + Duration::days(2)), None);
        assert_eq!(evaluate_coupon(Some(&c), amount(1000), Utc::now()), Err(CouponRejection::NotYetValid));
    }

    #[test]
    fn test_usage_cap() {
        let mut c = Coupon::flat("LIMITED", amount(100)).with_max_uses(10);
        c.current_uses = 10;
        assert_eq!(evaluate_coupon(Some(&c), amount(1000), Utc::now()), Err(CouponRejection::UsageLimitReached));
    }

    #[test]
    fn test_minimum_order() {
        let c = Coupon::flat("BIG", amount(200)).with_min_order(amount(1500));
        assert_eq!(
            evaluate_coupon(Some(&c), amount(1499), Utc::now()),
            Err(CouponRejection::MinimumOrderNotMet { minimum: amount(1500) })
        );
        let applied = evaluate_coupon(Some(&c), amount(1500), Utc::now()).unwrap();
        assert_eq!(applied.discount, amount(200));
    }

    #[test]
    fn test_discount_never_exceeds_subtotal() {
        for subtotal in [0, 1, 99, 250, 5000] {
            let flat = Coupon::flat("FLAT", amount(300));
            let pct = Coupon::percentage("PCT", amount(100));
            for c in [flat, pct] {
                let applied = evaluate_coupon(Some(&c), amount(subtotal), Utc::now()).unwrap();
                assert!(applied.discount <= amount(subtotal));
            }
        }
    }

    #[test]
    fn test_revalidate_after_subtotal_drop() {
        let c = Coupon::percentage("TEN", Decimal::TEN).with_min_order(amount(1000));
        let applied = evaluate_coupon(Some(&c), amount(2000), Utc::now()).unwrap();
        assert_eq!(applied.discount, amount(200));
        assert_eq!(applied.revalidate(amount(1200), Utc::now()).unwrap().discount, amount(120));
        assert!(applied.revalidate(amount(900), Utc::now()).is_err());
    }

    #[test]
    fn test_points_below_minimum_rejected() {
        assert_eq!(redeem_points(99, 5000), Err(PointsRejection::BelowMinimum { minimum: 100 }));
    }

    #[test]
    fn test_points_clamped_to_balance() {
        let applied = redeem_points(800, 350).unwrap();
        assert_eq!(applied.points, 350);
        assert_eq!(applied.discount(), amount(350));
        assert!(applied.discount() <= Decimal::from(800u32.min(350)));
    }

    #[test]
    fn test_points_clamped_below_minimum() {
        assert_eq!(redeem_points(300, 60), Err(PointsRejection::InsufficientBalance { available: 60 }));
    }
}
