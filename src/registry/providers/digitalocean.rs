use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::api::DigitalOceanClient;
use crate::registry::{
    models::{
        IssueRequest, IssuedCredentials, RegistryInfo, Revocation, TokenStatus,
        MAX_EXPIRY_SECONDS,
    },
    CredentialsIssuer, DockerConfig,
};

/// DigitalOcean Container Registry credentials issuer
pub struct DigitalOceanIssuer {
    client: DigitalOceanClient,
    registry_host: String,
}

impl DigitalOceanIssuer {
    pub fn new(client: DigitalOceanClient, registry_host: impl Into<String>) -> Self {
        Self {
            client,
            registry_host: registry_host.into(),
        }
    }
}

#[async_trait]
impl CredentialsIssuer for DigitalOceanIssuer {
    async fn issue(&self, request: IssueRequest) -> Result<IssuedCredentials> {
        if request.expiry_seconds == 0 || request.expiry_seconds > MAX_EXPIRY_SECONDS {
            bail!(
                "expiry_seconds must be between 1 and {}, got {}",
                MAX_EXPIRY_SECONDS,
                request.expiry_seconds
            );
        }

        tracing::info!(
            read_write = request.read_write,
            expiry_seconds = request.expiry_seconds,
            "Generating DigitalOcean registry Docker credentials"
        );

        let docker_config = self
            .client
            .generate_docker_credentials(request.read_write, Some(request.expiry_seconds))
            .await
            .context("Failed to generate Docker credentials")?;

        // Fail fast rather than storing credentials that can't be revoked later
        DockerConfig::parse(&docker_config)
            .and_then(|config| config.credentials(&self.registry_host))
            .context("DigitalOcean returned unusable Docker credentials")?;

        let expires_at = Utc::now() + Duration::seconds(request.expiry_seconds as i64);

        Ok(IssuedCredentials {
            docker_config,
            expires_at,
        })
    }

    async fn revoke(&self, token: &str) -> Result<Revocation> {
        match self.client.revoke_token(token).await {
            Ok(()) => {
                tracing::info!("Revoked DigitalOcean registry token");
                Ok(Revocation::Revoked)
            }
            Err(err) if err.is_unauthorized() => {
                tracing::info!("Registry token was already invalid, nothing to revoke");
                Ok(Revocation::AlreadyInvalid)
            }
            Err(err) => Err(anyhow::Error::new(err).context("Error revoking Docker credentials")),
        }
    }

    async fn probe(&self, token: &str) -> Result<TokenStatus> {
        match self.client.get_account_with_token(token).await {
            Ok(account) => Ok(TokenStatus::Active(account)),
            Err(err) if err.is_unauthorized() => Ok(TokenStatus::Revoked),
            Err(err) => Err(anyhow::Error::new(err).context("Failed to probe registry token")),
        }
    }

    async fn registry(&self) -> Result<Option<RegistryInfo>> {
        let registry = match self.client.get_registry().await {
            Ok(registry) => registry,
            Err(err) if err.is_not_found() => {
                tracing::debug!("No container registry found for account");
                return Ok(None);
            }
            Err(err) => {
                return Err(anyhow::Error::new(err).context("Failed to fetch container registry"))
            }
        };

        let subscription_tier_slug = match self.client.get_subscription().await {
            Ok(subscription) => Some(subscription.tier.slug),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                return Err(
                    anyhow::Error::new(err).context("Failed to fetch registry subscription")
                )
            }
        };

        Ok(Some(RegistryInfo {
            name: registry.name,
            subscription_tier_slug,
            region: registry.region,
        }))
    }

    fn registry_host(&self) -> &str {
        &self.registry_host
    }
}
