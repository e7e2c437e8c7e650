//! Core domain for the payment broker.
//!
//! Provides the tenant model, composite reference encoding, PostgreSQL
//! storage, the credential cache, and the cache-aside tenant directory that
//! the gateway and API crates build on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod directory;
pub mod error;
pub mod models;
pub mod reference;
pub mod storage;
pub mod time;

pub use cache::{CredentialCache, RedisCredentialCache};
pub use directory::{PostgresTenantStore, TenantDirectory, TenantStore, DEFAULT_CACHE_TTL};
pub use error::{CoreError, Result};
pub use models::{CallbackTarget, NewTenant, Tenant, TenantId, TenantIdentity};
pub use reference::CompositeReference;
pub use storage::Storage;
pub use time::{Clock, RealClock, TestClock};
