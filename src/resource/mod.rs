//! Declarative resource contract and the registry Docker credentials resource
//!
//! The host orchestrator owns planning and persistence; a resource only
//! implements the four lifecycle callbacks against an attribute bag.

pub mod docker_credentials;
pub mod lifecycle;
pub mod plan;
pub mod schema;
pub mod state;

pub use docker_credentials::DockerCredentialsResource;
pub use lifecycle::LifecyclePhase;
pub use plan::Plan;
pub use schema::ResourceSchema;
pub use state::{AttributeBag, ResourceState};

use anyhow::Result;
use async_trait::async_trait;

/// Lifecycle callbacks a resource plugin exposes to the orchestrator
///
/// The orchestrator invokes at most one callback at a time per instance.
#[async_trait]
pub trait Resource: Send + Sync {
    fn schema(&self) -> &ResourceSchema;

    /// Create the remote object from a configuration
    async fn create(&self, config: &AttributeBag) -> Result<ResourceState>;

    /// Refresh state from the remote side
    ///
    /// Returns None if the remote object no longer exists.
    async fn read(&self, state: &ResourceState) -> Result<Option<ResourceState>>;

    /// Apply a configuration change that does not require replacement
    async fn update(&self, prior: &ResourceState, config: &AttributeBag) -> Result<ResourceState>;

    /// Destroy the remote object
    async fn delete(&self, state: &ResourceState) -> Result<()>;
}
