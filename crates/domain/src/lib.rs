//! Domain layer for the bookstore checkout.
//!
//! This crate provides:
//! - The checkout payload as typed value objects
//! - The business rules applied by transaction verification and fraud detection
//! - The book catalog used for suggestions and for seeding the document store

pub mod catalog;
pub mod checkout;
pub mod error;
pub mod rules;

pub use catalog::{Book, BookDocument, seed_documents, suggestion_catalog};
pub use checkout::{BillingAddress, CheckoutRequest, CreditCard, OrderItem, User};
pub use error::{FraudError, ValidationError};
