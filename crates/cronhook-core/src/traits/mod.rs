//! Core traits defined in `cronhook-core` and implemented by other crates.

pub mod cache;

pub use cache::CacheProvider;
