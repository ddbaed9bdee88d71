//! Test infrastructure helpers
//!
//! Container-backed fixtures for integration tests. Each fixture owns
//! its container; it is stopped and removed when the fixture drops.

mod mongo;
mod redis;

pub use mongo::TestMongo;
pub use redis::TestRedis;
