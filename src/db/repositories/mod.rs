//! Repositories

pub mod transcript;
