use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::models::Account;

/// Upper bound (and default) for credential lifetime: 50 years
pub const MAX_EXPIRY_SECONDS: u64 = 1_576_800_000;

/// Decoded `auth` entry of a Docker config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RegistryCredentials {
    /// Registry hostname the entry is keyed by (e.g., "registry.digitalocean.com")
    pub registry_host: String,
    pub username: String,
    /// Bearer token for the registry and the DigitalOcean API
    pub password: String,
}

/// Request for fresh Docker credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueRequest {
    /// Grant push access in addition to pull
    pub read_write: bool,
    /// Lifetime of the issued token in seconds
    pub expiry_seconds: u64,
}

/// Docker credentials as returned by the issuer
#[derive(Debug, Clone)]
pub struct IssuedCredentials {
    /// Raw Docker config JSON document
    pub docker_config: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a revocation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    Revoked,
    /// The token was already invalid (API answered 401)
    AlreadyInvalid,
}

/// Result of probing a token against the account endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    Active(Account),
    Revoked,
}

/// Registry together with its subscription tier
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryInfo {
    pub name: String,
    pub subscription_tier_slug: Option<String>,
    pub region: Option<String>,
}
