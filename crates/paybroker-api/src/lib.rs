//! Payment broker HTTP API.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ratelimit;
pub mod server;

pub use config::Config;
pub use error::ApiError;
pub use ratelimit::{RateLimiter, RedisRateLimiter};
pub use server::{create_router, shutdown_signal, start_server, AppState};
