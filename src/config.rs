//! Environment configuration.

use std::str::FromStr;
use rust_decimal::Decimal;
use thiserror::Error;
use crate::domain::pricing::{ComboRule, DeliveryPolicy, PricingRules};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid {expected}: {value:?}")]
    Invalid { name: &'static str, expected: &'static str, value: String },

    #[error("COMBO_RULES is not valid JSON: {0}")]
    ComboRules(#[from] serde_json::Error),

    #[error("COMBO_RULES entry for tag {0:?} needs a bundle size of at least 2 and a positive price")]
    ComboRule(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub functions_url: String,
    pub functions_key: Option<String>,
    pub razorpay_key_id: Option<String>,
    pub cashfree_mode: String,
    pub currency: String,
    pub pricing: PricingRules,
    pub admin_email: Option<String>,
    pub retry_interval_secs: u64,
    pub max_step_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads every setting through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let combos: Vec<ComboRule> = match get("COMBO_RULES") {
            Some(raw) => serde_json::from_str(&raw)?,
            None => vec![],
        };
        if let Some(rule) = combos.iter().find(|r| r.bundle_size < 2 || r.bundle_price <= Decimal::ZERO) {
            return Err(ConfigError::ComboRule(rule.tag.clone()));
        }

        Ok(Self {
            port: parse(&get, "PORT", "port number", 8083)?,
            database_url: get("DATABASE_URL"),
            nats_url: get("NATS_URL"),
            functions_url: get("FUNCTIONS_URL").unwrap_or_else(|| "http://localhost:54321/functions/v1".to_string()),
            functions_key: get("FUNCTIONS_KEY"),
            razorpay_key_id: get("RAZORPAY_KEY_ID"),
            cashfree_mode: get("CASHFREE_MODE").unwrap_or_else(|| "sandbox".to_string()),
            currency: get("CURRENCY").map(|c| c.to_uppercase()).unwrap_or_else(|| "INR".to_string()),
            pricing: PricingRules {
                combos,
                delivery: DeliveryPolicy {
                    flat_fee: parse(&get, "DELIVERY_FEE", "amount", Decimal::new(99, 0))?,
                    free_above: Some(parse(&get, "FREE_DELIVERY_ABOVE", "amount", Decimal::new(999, 0))?),
                },
            },
            admin_email: get("ADMIN_EMAIL"),
            retry_interval_secs: parse(&get, "RETRY_INTERVAL_SECS", "number of seconds", 60)?,
            max_step_attempts: parse(&get, "MAX_STEP_ATTEMPTS", "attempt count", 5)?,
        })
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, name: &'static str, expected: &'static str, default: T) -> Result<T, ConfigError> {
    match get(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, expected, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.currency, "INR");
        assert!(config.database_url.is_none());
        assert_eq!(config.pricing.delivery.flat_fee, Decimal::new(99, 0));
        assert_eq!(config.pricing.delivery.free_above, Some(Decimal::new(999, 0)));
        assert_eq!(config.max_step_attempts, 5);
    }

    #[test]
    fn test_invalid_port() {
        assert!(matches!(config(&[("PORT", "eighty")]), Err(ConfigError::Invalid { name: "PORT", .. })));
    }

    #[test]
    fn test_combo_rules() {
        let config = config(&[("COMBO_RULES", r#"[{"tag":"combo-tee","bundle_size":3,"bundle_price":"1499"}]"#)]).unwrap();
        assert_eq!(config.pricing.combos[0].bundle_size, 3);
        assert!(matches!(
            super::Config::from_lookup(|n| (n == "COMBO_RULES").then(|| r#"[{"tag":"x","bundle_size":1,"bundle_price":"10"}]"#.to_string())),
            Err(ConfigError::ComboRule(_))
        ));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        assert_eq!(config(&[("PORT", "  "), ("DATABASE_URL", "")]).unwrap().port, 8083);
    }
}
