//! HTTP client for the DigitalOcean API endpoints used by the credential resource.

pub mod client;
pub mod error;
pub mod models;

pub use client::DigitalOceanClient;
pub use error::ApiError;
