//! # eventhub-core
//!
//! Core crate for EventHub. Contains the pub/sub transport trait,
//! configuration schemas, and the unified error system.
//!
//! This crate has **no** internal dependencies on other EventHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
