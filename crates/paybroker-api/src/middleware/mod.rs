//! HTTP middleware for admission control and authentication.
//!
//! Tenant routes run rate limiting, then credential authentication. The
//! provider webhook route runs rate limiting, then the callback token check.

pub mod auth;
pub mod callback_token;
pub mod rate_limit;
