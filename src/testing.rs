//! In-memory credentials issuer for lifecycle tests

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::api::models::Account;
use crate::registry::models::{
    IssueRequest, IssuedCredentials, RegistryInfo, Revocation, TokenStatus,
};
use crate::registry::{CredentialsIssuer, DockerConfig};
use crate::settings::DEFAULT_REGISTRY_HOST;

#[derive(Default)]
struct Inner {
    registry: Option<String>,
    live_tokens: HashSet<String>,
    requests: Vec<IssueRequest>,
    issued: usize,
    issue_error: Option<String>,
    revoke_error: Option<String>,
}

/// Issues `tok-N` tokens and tracks which are still live
pub struct MemoryIssuer {
    inner: Mutex<Inner>,
}

impl MemoryIssuer {
    pub fn with_registry(name: &str) -> Self {
        Self {
            inner: Mutex::new(Inner {
                registry: Some(name.to_string()),
                ..Inner::default()
            }),
        }
    }

    pub fn set_registry(&self, name: Option<&str>) {
        self.inner.lock().unwrap().registry = name.map(str::to_string);
    }

    pub fn requests(&self) -> Vec<IssueRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn fail_issue(&self, message: &str) {
        self.inner.lock().unwrap().issue_error = Some(message.to_string());
    }

    pub fn fail_revoke(&self, message: &str) {
        self.inner.lock().unwrap().revoke_error = Some(message.to_string());
    }
}

#[async_trait]
impl CredentialsIssuer for MemoryIssuer {
    async fn issue(&self, request: IssueRequest) -> Result<IssuedCredentials> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = &inner.issue_error {
            return Err(anyhow!(message.clone()));
        }

        inner.issued += 1;
        let token = format!("tok-{}", inner.issued);
        inner.live_tokens.insert(token.clone());
        inner.requests.push(request);

        Ok(IssuedCredentials {
            docker_config: DockerConfig::for_registry(DEFAULT_REGISTRY_HOST, &token, &token)
                .to_json(),
            expires_at: Utc::now() + Duration::seconds(request.expiry_seconds as i64),
        })
    }

    async fn revoke(&self, token: &str) -> Result<Revocation> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = &inner.revoke_error {
            return Err(anyhow!(message.clone()));
        }

        if inner.live_tokens.remove(token) {
            Ok(Revocation::Revoked)
        } else {
            Ok(Revocation::AlreadyInvalid)
        }
    }

    async fn probe(&self, token: &str) -> Result<TokenStatus> {
        let inner = self.inner.lock().unwrap();
        if inner.live_tokens.contains(token) {
            Ok(TokenStatus::Active(Account {
                uuid: "00000000-0000-0000-0000-000000000000".to_string(),
                email: "ops@example.com".to_string(),
                status: "active".to_string(),
            }))
        } else {
            Ok(TokenStatus::Revoked)
        }
    }

    async fn registry(&self) -> Result<Option<RegistryInfo>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.registry.as_ref().map(|name| RegistryInfo {
            name: name.clone(),
            subscription_tier_slug: Some("basic".to_string()),
            region: Some("nyc3".to_string()),
        }))
    }

    fn registry_host(&self) -> &str {
        DEFAULT_REGISTRY_HOST
    }
}
