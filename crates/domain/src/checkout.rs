//! Value objects for the checkout payload.
//!
//! Field names follow the gateway's JSON schema (camelCase). Fields the core
//! does not act on are still captured so an accepted order can be queued with
//! its full payload.

use serde::{Deserialize, Serialize};

/// The customer placing the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub name: String,
    pub contact: String,
}

/// Card details as typed by the customer; validated by the business rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreditCard {
    pub number: String,
    /// `MM/YY`.
    pub expiration_date: String,
    pub cvv: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
}

impl OrderItem {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// A checkout request as received by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutRequest {
    pub user: User,
    pub credit_card: CreditCard,
    pub user_comment: Option<String>,
    pub items: Vec<OrderItem>,
    pub discount_code: Option<String>,
    pub shipping_method: Option<String>,
    pub gift_message: Option<String>,
    pub billing_address: BillingAddress,
    pub gift_wrapping: bool,
    pub terms_and_conditions_accepted: bool,
    pub notification_preferences: Vec<String>,
}

impl CheckoutRequest {
    /// Number of cart lines; used as the queue priority (smaller first).
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Title of the first cart line, which seeds book suggestions.
    pub fn first_title(&self) -> Option<&str> {
        self.items.first().map(|item| item.name.as_str())
    }
}
