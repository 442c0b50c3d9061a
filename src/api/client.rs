use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ApiError;
use super::models::{
    Account, AccountRoot, Registry, RegistryRoot, Subscription, SubscriptionRoot,
};
use crate::settings::{ApiSettings, HttpSettings};

const REVOKE_PATH: &str = "/v1/oauth/revoke";

/// Thin DigitalOcean API client covering the registry credential endpoints
///
/// Every call is a single request; nothing is retried here.
#[derive(Clone)]
pub struct DigitalOceanClient {
    http_client: Client,
    endpoint: String,
    oauth_endpoint: String,
    token: String,
}

impl fmt::Debug for DigitalOceanClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalOceanClient")
            .field("endpoint", &self.endpoint)
            .field("oauth_endpoint", &self.oauth_endpoint)
            .field("token", &"••••••••")
            .finish()
    }
}

impl DigitalOceanClient {
    /// Build a client from the API and HTTP settings
    pub fn new(api: &ApiSettings, http: &HttpSettings) -> anyhow::Result<Self> {
        let token = api.token.trim();
        if token.is_empty() {
            bail!(
                "DigitalOcean API token not configured. Set DIGITALOCEAN_TOKEN environment variable or [api] token in config"
            );
        }

        let mut builder = Client::builder().user_agent(api.user_agent.as_str());
        if let Some(timeout_secs) = http.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let http_client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self::with_http_client(
            http_client,
            &api.endpoint,
            &api.oauth_endpoint,
            token,
        ))
    }

    pub fn with_http_client(
        http_client: Client,
        endpoint: &str,
        oauth_endpoint: &str,
        token: &str,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            oauth_endpoint: oauth_endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the account's container registry
    pub async fn get_registry(&self) -> Result<Registry, ApiError> {
        let url = format!("{}/v2/registry", self.endpoint);
        debug!(url = %url, "Fetching container registry");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let root: RegistryRoot = decode_json(check_status(response).await?).await?;
        Ok(root.registry)
    }

    /// Fetch the registry's subscription (tier slug)
    pub async fn get_subscription(&self) -> Result<Subscription, ApiError> {
        let url = format!("{}/v2/registry/subscription", self.endpoint);
        debug!(url = %url, "Fetching registry subscription");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let root: SubscriptionRoot = decode_json(check_status(response).await?).await?;
        Ok(root.subscription)
    }

    /// Ask the API to mint Docker credentials for the registry
    ///
    /// Returns the Docker config JSON document exactly as the API sent it.
    pub async fn generate_docker_credentials(
        &self,
        read_write: bool,
        expiry_seconds: Option<u64>,
    ) -> Result<String, ApiError> {
        let url = format!("{}/v2/registry/docker-credentials", self.endpoint);

        let mut query = vec![("read_write", read_write.to_string())];
        if let Some(expiry_seconds) = expiry_seconds {
            query.push(("expiry_seconds", expiry_seconds.to_string()));
        }

        debug!(
            url = %url,
            read_write,
            expiry_seconds = ?expiry_seconds,
            "Generating Docker credentials"
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        Ok(body)
    }

    /// Revoke an OAuth token previously issued inside Docker credentials
    ///
    /// The token authenticates its own revocation. An `Unauthorized` error
    /// means the token is already invalid.
    pub async fn revoke_token(&self, token: &str) -> Result<(), ApiError> {
        let url = format!("{}{}", self.oauth_endpoint, REVOKE_PATH);
        debug!(url = %url, "Revoking registry token");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .query(&[("token", token)])
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Fetch account info authenticated with an arbitrary token
    pub async fn get_account_with_token(&self, token: &str) -> Result<Account, ApiError> {
        let url = format!("{}/v2/account", self.endpoint);
        debug!(url = %url, "Fetching account info");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?;

        let root: AccountRoot = decode_json(check_status(response).await?).await?;
        Ok(root.account)
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ApiError::from_response(status, &body))
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}
