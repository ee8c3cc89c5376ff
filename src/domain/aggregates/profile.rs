//! Customer profile: contact details, reward-point balance and role.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::ShippingAddress;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub reward_points: u32,
    pub role: Role,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Customer => "customer", Self::Admin => "admin" }
    }

    /// Unknown roles grant nothing.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("admin") { Self::Admin } else { Self::Customer }
    }
}

impl Profile {
    pub fn customer(user_id: Uuid, email: impl Into<String>) -> Self {
        Self { user_id, email: email.into(), full_name: None, reward_points: 0, role: Role::Customer }
    }

    pub fn with_points(mut self, points: u32) -> Self { self.reward_points = points; self }
    pub fn with_role(mut self, role: Role) -> Self { self.role = role; self }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

/// An address kept in the customer's address book.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedAddress {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub address: ShippingAddress,
}
