//! HTTP request handlers.
//!
//! - `operations` - tenant calls proxied to the provider
//! - `webhook` - provider callbacks routed back to tenants
//! - `health` - liveness and dependency health

pub mod health;
pub mod operations;
pub mod webhook;

pub use health::{health_check, liveness_check};
pub use operations::{create_customer, create_invoice, create_payout, create_subscription};
pub use webhook::receive_webhook;
