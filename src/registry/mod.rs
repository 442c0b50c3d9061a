pub mod docker_config;
pub mod models;
pub mod providers;

pub use docker_config::{DockerConfig, DockerConfigError};

use crate::registry::models::{
    IssueRequest, IssuedCredentials, RegistryInfo, Revocation, TokenStatus,
};
use anyhow::Result;
use async_trait::async_trait;

/// Trait for services that mint and revoke registry Docker credentials
#[async_trait]
pub trait CredentialsIssuer: Send + Sync {
    /// Issue fresh Docker credentials
    ///
    /// # Returns
    /// The Docker config document (already checked to carry an entry for
    /// `registry_host()`) and the time the credentials stop being valid
    async fn issue(&self, request: IssueRequest) -> Result<IssuedCredentials>;

    /// Revoke a token decoded from previously issued credentials
    ///
    /// A token the service no longer accepts is reported as
    /// `Revocation::AlreadyInvalid`, not as an error.
    async fn revoke(&self, token: &str) -> Result<Revocation>;

    /// Check whether a token still authenticates against the service
    async fn probe(&self, token: &str) -> Result<TokenStatus>;

    /// Look up the account's registry
    ///
    /// Returns None if the account has no registry.
    async fn registry(&self) -> Result<Option<RegistryInfo>>;

    /// Get the registry host (for credentials map key)
    fn registry_host(&self) -> &str;
}
