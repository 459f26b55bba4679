//! HTTP boundary

pub mod routes;
pub mod server;
pub mod types;

pub use server::{build_router, serve};
pub use types::{ApiError, ChatRequest, HealthResponse};
