//! # ripple-redis
//!
//! Redis implementation of the ripple [`Transport`](ripple_core::Transport):
//! PUBLISH/PSUBSCRIBE for distribution and RPUSH/LTRIM/LRANGE for history.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)
//! - `REDIS_IO_TIMEOUT_MS`: per-call deadline in milliseconds (default: 2000)

pub mod config;
pub mod transport;

pub use config::RedisConfig;
pub use transport::RedisTransport;
