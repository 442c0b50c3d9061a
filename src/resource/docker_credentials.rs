use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use super::plan::{plan, Plan};
use super::schema::{AttributeSchema, AttributeType, ResourceSchema};
use super::state::{AttributeBag, ResourceState};
use super::Resource;
use crate::registry::models::{IssueRequest, IssuedCredentials, MAX_EXPIRY_SECONDS};
use crate::registry::{CredentialsIssuer, DockerConfig};

pub const RESOURCE_TYPE: &str = "digitalocean_container_registry_docker_credentials";

pub const REGISTRY_NAME: &str = "registry_name";
pub const WRITE: &str = "write";
pub const EXPIRY_SECONDS: &str = "expiry_seconds";
pub const DOCKER_CREDENTIALS: &str = "docker_credentials";
pub const CREDENTIAL_EXPIRATION_TIME: &str = "credential_expiration_time";

// MAX_EXPIRY_SECONDS as an attribute value
const DEFAULT_EXPIRY_SECONDS: &str = "1576800000";

/// Schema of the Docker credentials resource
pub fn schema() -> ResourceSchema {
    ResourceSchema {
        type_name: RESOURCE_TYPE,
        attributes: vec![
            AttributeSchema::required(REGISTRY_NAME, AttributeType::String)
                .description("Name of the container registry"),
            AttributeSchema::optional(WRITE, AttributeType::Bool)
                .default_value("false")
                .description("Allow pushing images, not only pulling"),
            AttributeSchema::optional(EXPIRY_SECONDS, AttributeType::Int)
                .default_value(DEFAULT_EXPIRY_SECONDS)
                .int_range(1, MAX_EXPIRY_SECONDS)
                .description("Lifetime of the issued credentials in seconds"),
            AttributeSchema::computed(DOCKER_CREDENTIALS, AttributeType::String)
                .sensitive()
                .description("Docker config JSON"),
            AttributeSchema::computed(CREDENTIAL_EXPIRATION_TIME, AttributeType::String)
                .description("RFC 3339 time the credentials expire"),
        ],
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Decode the registry token out of a credentials state
pub fn decode_state_token(state: &ResourceState, registry_host: &str) -> Result<String> {
    let docker_config = state.attributes.require(DOCKER_CREDENTIALS)?;

    let token = DockerConfig::parse(docker_config)
        .and_then(|config| config.decode_token(registry_host))
        .with_context(|| format!("Failed to decode Docker credentials for '{}'", state.id))?;

    Ok(token)
}

/// `digitalocean_container_registry_docker_credentials`
///
/// Maps the attribute bag onto credential issuance and revocation. Every
/// input forces replacement, so credentials are never mutated in place.
pub struct DockerCredentialsResource {
    issuer: Arc<dyn CredentialsIssuer>,
    schema: ResourceSchema,
}

impl DockerCredentialsResource {
    pub fn new(issuer: Arc<dyn CredentialsIssuer>) -> Self {
        Self {
            issuer,
            schema: schema(),
        }
    }

    pub fn issuer(&self) -> &Arc<dyn CredentialsIssuer> {
        &self.issuer
    }

    fn issue_request(attributes: &AttributeBag) -> Result<IssueRequest> {
        Ok(IssueRequest {
            read_write: attributes.get_bool(WRITE)?.unwrap_or(false),
            expiry_seconds: attributes
                .get_u64(EXPIRY_SECONDS)?
                .unwrap_or(MAX_EXPIRY_SECONDS),
        })
    }

    fn store_credentials(attributes: &mut AttributeBag, issued: IssuedCredentials) {
        attributes.set(DOCKER_CREDENTIALS, issued.docker_config);
        attributes.set(CREDENTIAL_EXPIRATION_TIME, format_timestamp(issued.expires_at));
    }
}

#[async_trait]
impl Resource for DockerCredentialsResource {
    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    async fn create(&self, config: &AttributeBag) -> Result<ResourceState> {
        let mut attributes = self.schema.normalize(config)?;
        let registry_name = attributes.require(REGISTRY_NAME)?.to_string();
        let request = Self::issue_request(&attributes)?;

        let issued = self.issuer.issue(request).await.with_context(|| {
            format!("Error creating Docker credentials for registry '{}'", registry_name)
        })?;

        info!(
            registry = %registry_name,
            write = request.read_write,
            expires_at = %issued.expires_at,
            "Created registry Docker credentials"
        );

        Self::store_credentials(&mut attributes, issued);

        Ok(ResourceState {
            id: registry_name,
            attributes,
            tainted: false,
        })
    }

    async fn read(&self, state: &ResourceState) -> Result<Option<ResourceState>> {
        let registry_name = state.attributes.require(REGISTRY_NAME)?;

        let Some(registry) = self.issuer.registry().await? else {
            warn!(
                registry = %registry_name,
                "Container registry not found, removing Docker credentials from state"
            );
            return Ok(None);
        };

        // The token is account-wide, so a record for another registry is
        // replaced (and its token revoked) rather than dropped from state
        if registry.name != registry_name {
            warn!(
                registry = %registry_name,
                found = %registry.name,
                "Account registry name changed, Docker credentials must be replaced"
            );
            let mut renamed = state.clone();
            renamed.attributes.set(REGISTRY_NAME, registry.name);
            renamed.tainted = true;
            return Ok(Some(renamed));
        }

        let Some(expiration) = state.attributes.get(CREDENTIAL_EXPIRATION_TIME) else {
            return Ok(Some(state.clone()));
        };

        let expiration = DateTime::parse_from_rfc3339(expiration).with_context(|| {
            format!(
                "Invalid {} '{}' in state",
                CREDENTIAL_EXPIRATION_TIME, expiration
            )
        })?;

        if expiration >= Utc::now() {
            return Ok(Some(state.clone()));
        }

        info!(
            registry = %registry_name,
            expired_at = %expiration,
            "Docker credentials expired, issuing new ones"
        );

        let request = Self::issue_request(&state.attributes)?;
        let issued = self.issuer.issue(request).await.with_context(|| {
            format!("Error refreshing Docker credentials for registry '{}'", registry_name)
        })?;

        let mut refreshed = state.clone();
        Self::store_credentials(&mut refreshed.attributes, issued);
        Ok(Some(refreshed))
    }

    async fn update(&self, prior: &ResourceState, config: &AttributeBag) -> Result<ResourceState> {
        match plan(&self.schema, Some(prior), config)? {
            Plan::NoOp => Ok(prior.clone()),
            Plan::Replace { attributes } if attributes.is_empty() => bail!(
                "Cannot update tainted {} '{}' in place, it requires replacement",
                RESOURCE_TYPE,
                prior.id
            ),
            Plan::Replace { attributes } => bail!(
                "Cannot update {} '{}' in place: {} requires replacement",
                RESOURCE_TYPE,
                prior.id,
                attributes.join(", ")
            ),
            Plan::Create => bail!("Cannot update {} without prior state", RESOURCE_TYPE),
        }
    }

    async fn delete(&self, state: &ResourceState) -> Result<()> {
        let token = decode_state_token(state, self.issuer.registry_host())?;

        let outcome = self.issuer.revoke(&token).await.with_context(|| {
            format!("Error deleting Docker credentials for registry '{}'", state.id)
        })?;

        info!(
            registry = %state.id,
            outcome = ?outcome,
            "Deleted registry Docker credentials"
        );
        Ok(())
    }
}
