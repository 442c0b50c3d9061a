//! DigitalOcean API request/response types
//!
//! Only the fields this crate reads are modelled; unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The account's container registry (`GET /v2/registry`)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Registry {
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub storage_usage_bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistryRoot {
    pub registry: Registry,
}

/// Subscription tier of the registry (`GET /v2/registry/subscription`)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Subscription {
    pub tier: SubscriptionTier,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubscriptionTier {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionRoot {
    pub subscription: Subscription,
}

/// Account info (`GET /v2/account`), used to probe whether a token is live
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Account {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountRoot {
    pub account: Account,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_root_ignores_unknown_fields() {
        let body = r#"{
            "registry": {
                "name": "tf-acc-test-1",
                "storage_usage_bytes": 0,
                "storage_usage_bytes_updated_at": "2024-01-02T03:04:05Z",
                "created_at": "2024-01-01T00:00:00Z",
                "region": "fra1"
            }
        }"#;

        let root: RegistryRoot = serde_json::from_str(body).unwrap();
        assert_eq!(root.registry.name, "tf-acc-test-1");
        assert_eq!(root.registry.region.as_deref(), Some("fra1"));
        assert_eq!(root.registry.storage_usage_bytes, Some(0));
    }

    #[test]
    fn test_subscription_root() {
        let body = r#"{
            "subscription": {
                "tier": {"name": "Basic", "slug": "basic", "included_repositories": 5},
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }
        }"#;

        let root: SubscriptionRoot = serde_json::from_str(body).unwrap();
        assert_eq!(root.subscription.tier.slug, "basic");
        assert_eq!(root.subscription.tier.name.as_deref(), Some("Basic"));
    }
}
