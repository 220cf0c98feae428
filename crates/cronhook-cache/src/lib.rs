//! # cronhook-cache
//!
//! Key-value store providers backing the job locks. Supports two modes:
//!
//! - **memory**: In-process store using [moka](https://crates.io/crates/moka),
//!   for single-instance and development deployments
//! - **redis**: Redis-backed store using the [redis](https://crates.io/crates/redis) crate,
//!   shared by every instance that can receive the webhook
//!
//! The provider is selected at runtime based on configuration.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::CacheManager;
