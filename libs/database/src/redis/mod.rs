//! Redis connector built around `redis::aio::ConnectionManager`
//!
//! The ConnectionManager transparently reconnects after transient
//! failures, so a single handle can be cloned into every service that
//! needs Redis.

mod config;
mod connector;
mod health;

pub use config::RedisConfig;
pub use connector::{connect, connect_from_config, connect_from_config_with_retry, connect_with_retry};
pub use health::check_health;
