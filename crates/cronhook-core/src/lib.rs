//! # cronhook-core
//!
//! Core crate for cronhook. Contains the lock store trait, configuration
//! schemas and the unified error system.
//!
//! This crate has **no** internal dependencies on other cronhook crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
