//! Docker config JSON codec
//!
//! The document container tooling reads from `~/.docker/config.json`:
//!
//! ```json
//! {"auths": {"registry.digitalocean.com": {"auth": "<base64 of username:token>"}}}
//! ```

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::RegistryCredentials;

#[derive(Debug, Error)]
pub enum DockerConfigError {
    #[error("Malformed Docker config JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Docker config has no credentials for registry '{0}'")]
    MissingRegistry(String),

    #[error("Auth entry for registry '{0}' is not valid base64")]
    InvalidBase64(String),

    #[error("Auth entry for registry '{0}' is not valid UTF-8")]
    InvalidUtf8(String),

    #[error("Auth entry for registry '{0}' is not in username:token form")]
    MissingSeparator(String),

    #[error("Auth entry for registry '{0}' carries an empty token")]
    EmptyToken(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct DockerConfig {
    pub auths: BTreeMap<String, DockerAuth>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DockerAuth {
    pub auth: String,
}

impl DockerConfig {
    /// Parse a Docker config document
    pub fn parse(json: &str) -> Result<Self, DockerConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build a single-registry config for `username:password`
    pub fn for_registry(registry_host: &str, username: &str, password: &str) -> Self {
        let auth = STANDARD.encode(format!("{}:{}", username, password));

        let mut auths = BTreeMap::new();
        auths.insert(registry_host.to_string(), DockerAuth { auth });
        Self { auths }
    }

    pub fn to_json(&self) -> String {
        // Only string maps; serialization can't fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Registry hosts this config carries credentials for
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.auths.keys().map(String::as_str)
    }

    /// Decode the `auth` entry for `registry_host` into username and token
    pub fn credentials(
        &self,
        registry_host: &str,
    ) -> Result<RegistryCredentials, DockerConfigError> {
        let entry = self
            .auths
            .get(registry_host)
            .ok_or_else(|| DockerConfigError::MissingRegistry(registry_host.to_string()))?;

        let decoded = STANDARD
            .decode(entry.auth.trim())
            .map_err(|_| DockerConfigError::InvalidBase64(registry_host.to_string()))?;

        let decoded = String::from_utf8(decoded)
            .map_err(|_| DockerConfigError::InvalidUtf8(registry_host.to_string()))?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| DockerConfigError::MissingSeparator(registry_host.to_string()))?;

        if password.is_empty() {
            return Err(DockerConfigError::EmptyToken(registry_host.to_string()));
        }

        Ok(RegistryCredentials {
            registry_host: registry_host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Extract the bearer token for `registry_host`, dropping the username
    pub fn decode_token(&self, registry_host: &str) -> Result<String, DockerConfigError> {
        Ok(self.credentials(registry_host)?.password)
    }
}
