//! Worker pool module

pub mod worker_pool;

pub use worker_pool::{default_pool_size, PoolError, PoolOptions, PoolStats, WorkHandle, WorkerPool};
