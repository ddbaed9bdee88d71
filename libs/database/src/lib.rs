//! Database library providing connectors and utilities for Redis and MongoDB
//!
//! # Features
//!
//! - `redis` (default) - Redis support via `ConnectionManager`
//! - `mongodb` - MongoDB support
//! - `config` - Configuration support with `core_config::FromEnv`
//! - `all` - Everything
//!
//! # Examples
//!
//! ## Redis
//!
//! ```ignore
//! use database::redis;
//!
//! let conn = redis::connect("redis://127.0.0.1:6379").await?;
//! ```
//!
//! ## MongoDB
//!
//! ```ignore
//! use database::mongodb;
//!
//! let client = mongodb::connect("mongodb://localhost:27017").await?;
//! let db = client.database("campus");
//! ```

// Always available modules
pub mod common;

// Database-specific modules (conditional based on features)
#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{retry, retry_with_backoff, RetryConfig};
