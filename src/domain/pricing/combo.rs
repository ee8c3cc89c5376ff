//! Tag-scoped bundle pricing ("any 2 for 999").

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::{CartLine, Product};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComboRule {
    pub tag: String,
    pub bundle_size: u32,
    pub bundle_price: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComboApplication {
    pub tag: String,
    pub bundles: u32,
    pub savings: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComboPricing {
    /// Plain sum of unit prices.
    pub item_total: Decimal,
    /// Sum after bundles replaced their units.
    pub subtotal: Decimal,
    pub applied: Vec<ComboApplication>,
}

impl ComboPricing {
    pub fn savings(&self) -> Decimal { self.item_total - self.subtotal }
}

/// Each product joins the first rule whose tag it carries. Within a rule the
/// highest priced units are bundled first and leftovers keep their unit price.
/// A bundle never costs more than the units it replaces.
pub fn combo_adjusted<'a>(lines: &[CartLine], lookup: impl Fn(Uuid) -> Option<&'a Product>, rules: &[ComboRule]) -> ComboPricing {
    // (unit price, units) per rule
    let mut pools: Vec<Vec<(Decimal, u64)>> = vec![Vec::new(); rules.len()];
    let mut item_total = Decimal::ZERO;
    let mut subtotal = Decimal::ZERO;

    for line in lines {
        let unit = line.price.amount();
        let quantity = line.quantity();
        item_total += unit * Decimal::from(quantity);
        let rule = lookup(line.product_id)
            .and_then(|product| rules.iter().position(|r| r.bundle_size > 0 && product.has_tag(&r.tag)));
        match rule.and_then(|idx| pools.get_mut(idx)) {
            Some(pool) if quantity > 0 => pool.push((unit, u64::from(quantity))),
            Some(_) => {}
            None => subtotal += unit * Decimal::from(quantity),
        }
    }

    let mut applied = Vec::new();
    for (rule, mut runs) in rules.iter().zip(pools) {
        if runs.is_empty() { continue; }
        runs.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        let mut bundler = Bundler::new(rule);
        for (unit, count) in runs { bundler.feed(unit, count); }
        let (bundles, savings, priced) = bundler.finish();
        subtotal += priced;
        if bundles > 0 {
            applied.push(ComboApplication { tag: rule.tag.clone(), bundles: u32::try_from(bundles).unwrap_or(u32::MAX), savings });
        }
    }

    ComboPricing { item_total, subtotal, applied }
}

/// Cuts a price-ordered stream of units into bundles without expanding it.
struct Bundler<'r> {
    rule: &'r ComboRule,
    size: u64,
    filled: u64,
    partial: Decimal,
    bundles: u64,
    savings: Decimal,
    priced: Decimal,
}

impl<'r> Bundler<'r> {
    fn new(rule: &'r ComboRule) -> Self {
        Self {
            rule, size: u64::from(rule.bundle_size), filled: 0, partial: Decimal::ZERO,
            bundles: 0, savings: Decimal::ZERO, priced: Decimal::ZERO,
        }
    }

    fn feed(&mut self, unit: Decimal, mut count: u64) {
        while count > 0 {
            if self.filled == 0 && count >= self.size {
                let full = count / self.size;
                self.close(unit * Decimal::from(self.size), full);
                count -= full * self.size;
                continue;
            }
            let take = count.min(self.size - self.filled);
            self.partial += unit * Decimal::from(take);
            self.filled += take;
            count -= take;
            if self.filled == self.size {
                let sum = std::mem::take(&mut self.partial);
                self.filled = 0;
                self.close(sum, 1);
            }
        }
    }

    /// Settles `times` complete groups that each sum to `sum`.
    fn close(&mut self, sum: Decimal, times: u64) {
        let times_dec = Decimal::from(times);
        if self.rule.bundle_price < sum {
            self.bundles += times;
            self.savings += (sum - self.rule.bundle_price) * times_dec;
            self.priced += self.rule.bundle_price * times_dec;
        } else {
            self.priced += sum * times_dec;
        }
    }

    fn finish(self) -> (u64, Decimal, Decimal) { (self.bundles, self.savings, self.priced + self.partial) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::domain::value_objects::{Money, Sku};

    fn product(code: &str, price: i64, tag: Option<&str>) -> Product {
        let p = Product::create(Uuid::new_v4(), Sku::new(code).unwrap(), code, Money::inr(Decimal::new(price, 0))).with_size("M", 10);
        match tag { Some(t) => p.with_tag(t), None => p }
    }

    fn rule() -> Vec<ComboRule> {
        vec![ComboRule { tag: "combo-tee".into(), bundle_size: 2, bundle_price: Decimal::new(999, 0) }]
    }

    #[test]
    fn test_pairs_priced_as_bundle() {
        let a = product("A", 699, Some("combo-tee"));
        let b = product("B", 599, Some("combo-tee"));
        let catalog: HashMap<Uuid, Product> = [(a.id(), a.clone()), (b.id(), b.clone())].into();
        let lines = vec![CartLine::for_product(&a, "M", 1), CartLine::for_product(&b, "M", 2)];

        let pricing = combo_adjusted(&lines, |id| catalog.get(&id), &rule());
        assert_eq!(pricing.item_total, Decimal::new(1897, 0));
        // 699 + 599 bundled at 999, leftover 599 at unit price
        assert_eq!(pricing.subtotal, Decimal::new(1598, 0));
        assert_eq!(pricing.applied, vec![ComboApplication { tag: "combo-tee".into(), bundles: 1, savings: Decimal::new(299, 0) }]);
    }

    #[test]
    fn test_untagged_items_unaffected() {
        let a = product("A", 699, None);
        let catalog: HashMap<Uuid, Product> = [(a.id(), a.clone())].into();
        let lines = vec![CartLine::for_product(&a, "M", 4)];
        let pricing = combo_adjusted(&lines, |id| catalog.get(&id), &rule());
        assert_eq!(pricing.subtotal, pricing.item_total);
        assert!(pricing.applied.is_empty());
    }

    #[test]
    fn test_bundles_span_products_and_large_quantities() {
        let a = product("A", 699, Some("combo-tee"));
        let b = product("B", 599, Some("combo-tee"));
        let catalog: HashMap<Uuid, Product> = [(a.id(), a.clone()), (b.id(), b.clone())].into();
        let lines = vec![CartLine::for_product(&b, "M", 99), CartLine::for_product(&a, "M", 3)];

        let pricing = combo_adjusted(&lines, |id| catalog.get(&id), &rule());
        // 699 x2 bundled, 699 + 599 bundled, 98 x 599 as 49 bundles
        assert_eq!(pricing.applied[0].bundles, 51);
        assert_eq!(pricing.subtotal, Decimal::new(999 * 51, 0));
        assert_eq!(pricing.item_total, Decimal::new(699 * 3 + 599 * 99, 0));
    }

    #[test]
    fn test_bundle_not_dearer_than_units() {
        let a = product("A", 300, Some("combo-tee"));
        let catalog: HashMap<Uuid, Product> = [(a.id(), a.clone())].into();
        let lines = vec![CartLine::for_product(&a, "M", 2)];
        let pricing = combo_adjusted(&lines, |id| catalog.get(&id), &rule());
        assert_eq!(pricing.subtotal, Decimal::new(600, 0));
        assert_eq!(pricing.savings(), Decimal::ZERO);
    }
}
