use anyhow::{bail, Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Table};
use std::path::Path;

use super::state_file::{StateFile, StateRecord};
use crate::registry::models::TokenStatus;
use crate::registry::CredentialsIssuer;
use crate::resource::docker_credentials::{
    decode_state_token, EXPIRY_SECONDS, REGISTRY_NAME, WRITE,
};
use crate::resource::lifecycle::validate_transition;
use crate::resource::plan::plan;
use crate::resource::{AttributeBag, LifecyclePhase, Plan, Resource, ResourceSchema};

const MASK: &str = "••••••••";

/// Build the configuration bag from `apply` flags
pub fn apply_config(registry_name: &str, write: bool, expiry_seconds: Option<u64>) -> AttributeBag {
    let mut config = AttributeBag::new()
        .with(REGISTRY_NAME, registry_name)
        .with(WRITE, write.to_string());
    if let Some(expiry) = expiry_seconds {
        config.set(EXPIRY_SECONDS, expiry.to_string());
    }
    config
}

/// Refresh, plan and converge the state file towards `config`
pub async fn apply(resource: &dyn Resource, state_path: &Path, config: &AttributeBag) -> Result<Plan> {
    let type_name = resource.schema().type_name;
    let mut state_file = StateFile::load(state_path)?;

    let mut prior = state_file.live().cloned();
    if let Some(current) = prior.take() {
        match resource.read(&current).await? {
            Some(refreshed) => {
                state_file.transition(type_name, LifecyclePhase::Refreshed, refreshed.clone())?;
                prior = Some(refreshed);
            }
            None => state_file.transition(type_name, LifecyclePhase::Absent, current)?,
        }
        state_file.save()?;
    }

    let planned = plan(resource.schema(), prior.as_ref(), config)?;
    tracing::debug!(plan = %planned, "Planned {}", type_name);

    match (&planned, prior) {
        (Plan::NoOp, Some(prior)) => {
            println!("No changes. {} '{}' is up to date.", type_name, prior.id);
        }
        (Plan::Replace { .. }, Some(prior)) => {
            println!("{} '{}' must be replaced: {}", type_name, prior.id, planned);
            resource.delete(&prior).await?;
            state_file.transition(type_name, LifecyclePhase::Destroyed, prior)?;
            state_file.save()?;

            let created = resource.create(config).await?;
            println!("✓ Replaced {} '{}'", type_name, created.id);
            state_file.transition(type_name, LifecyclePhase::Created, created)?;
            state_file.save()?;
        }
        (Plan::Create, _) => {
            let created = resource.create(config).await?;
            println!("✓ Created {} '{}'", type_name, created.id);
            state_file.transition(type_name, LifecyclePhase::Created, created)?;
            state_file.save()?;
        }
        (_, None) => bail!("Plan '{}' requires prior state for {}", planned, type_name),
    }

    Ok(planned)
}

/// Re-read the tracked instance and persist the result
pub async fn refresh(resource: &dyn Resource, state_path: &Path) -> Result<LifecyclePhase> {
    let type_name = resource.schema().type_name;
    let mut state_file = StateFile::load(state_path)?;

    let Some(prior) = state_file.live().cloned() else {
        println!("Nothing to refresh in {}", state_path.display());
        return Ok(state_file.phase());
    };
    validate_transition(&state_file.phase(), &LifecyclePhase::Refreshed)?;

    match resource.read(&prior).await? {
        Some(refreshed) => {
            state_file.transition(type_name, LifecyclePhase::Refreshed, refreshed)?;
            println!("✓ Refreshed {} '{}'", type_name, prior.id);
        }
        None => {
            state_file.transition(type_name, LifecyclePhase::Absent, prior.clone())?;
            println!(
                "{} '{}' no longer exists and was removed from state",
                type_name, prior.id
            );
        }
    }

    state_file.save()?;
    Ok(state_file.phase())
}

/// Destroy the tracked instance, keeping a tombstone for verification
pub async fn destroy(resource: &dyn Resource, state_path: &Path) -> Result<()> {
    let type_name = resource.schema().type_name;
    let mut state_file = StateFile::load(state_path)?;

    let Some(prior) = state_file.live().cloned() else {
        println!("Nothing to destroy in {}", state_path.display());
        return Ok(());
    };
    validate_transition(&state_file.phase(), &LifecyclePhase::Destroyed)?;

    resource.delete(&prior).await?;
    println!("✓ Destroyed {} '{}'", type_name, prior.id);

    state_file.transition(type_name, LifecyclePhase::Destroyed, prior)?;
    state_file.save()?;
    Ok(())
}

fn require_record(state_path: &Path) -> Result<StateRecord> {
    StateFile::load(state_path)?
        .record
        .with_context(|| format!("No Docker credentials tracked in {}", state_path.display()))
}

/// Render a state record as a table, masking sensitive values
pub fn render_record(schema: &ResourceSchema, record: &StateRecord, show_secrets: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("ATTRIBUTE").add_attribute(Attribute::Bold),
            Cell::new("VALUE").add_attribute(Attribute::Bold),
        ]);

    for (name, value) in record.state.attributes.iter() {
        let value = if schema.is_sensitive(name) && !show_secrets {
            MASK
        } else {
            value
        };
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }

    table
}

/// Print the tracked instance
pub fn show(schema: &ResourceSchema, state_path: &Path, show_secrets: bool) -> Result<()> {
    let record = require_record(state_path)?;

    println!("{}", render_record(schema, &record, show_secrets));
    println!("\nResource: {} '{}'", record.resource_type, record.state.id);
    println!("Phase: {}", record.phase);
    println!("Updated: {}", record.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if !show_secrets {
        println!("Note: Sensitive values are masked, use --show-secrets to reveal them");
    }

    Ok(())
}

/// Stored Docker config JSON of the live instance
pub fn docker_config(state_path: &Path) -> Result<String> {
    let record = require_record(state_path)?;
    if !crate::resource::lifecycle::is_live(&record.phase) {
        bail!(
            "Docker credentials '{}' are {}, run apply first",
            record.state.id,
            record.phase
        );
    }

    let docker_config = record
        .state
        .attributes
        .require(crate::resource::docker_credentials::DOCKER_CREDENTIALS)?;
    Ok(docker_config.to_string())
}

/// Check that the token of a destroyed instance no longer authenticates
pub async fn verify_revoked(issuer: &dyn CredentialsIssuer, state_path: &Path) -> Result<()> {
    let record = require_record(state_path)?;
    if record.phase != LifecyclePhase::Destroyed {
        bail!(
            "Docker credentials '{}' have not been destroyed (phase: {})",
            record.state.id,
            record.phase
        );
    }

    let token = decode_state_token(&record.state, issuer.registry_host())?;

    match issuer.probe(&token).await? {
        TokenStatus::Revoked => {
            println!("✓ Docker credentials for '{}' are revoked", record.state.id);
            Ok(())
        }
        TokenStatus::Active(account) => {
            tracing::warn!(account = %account.uuid, "Destroyed token still authenticates");
            bail!("Docker credentials were not revoked")
        }
    }
}

/// Print the account's container registry
pub async fn show_registry(issuer: &dyn CredentialsIssuer) -> Result<()> {
    let Some(registry) = issuer.registry().await? else {
        println!("No container registry configured for this account");
        return Ok(());
    };

    println!("Registry: {}", registry.name);
    println!("Host: {}/{}", issuer.registry_host(), registry.name);
    if let Some(tier) = &registry.subscription_tier_slug {
        println!("Tier: {}", tier);
    }
    if let Some(region) = &registry.region {
        println!("Region: {}", region);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::docker_credentials::{self, DOCKER_CREDENTIALS};
    use crate::resource::DockerCredentialsResource;
    use crate::testing::MemoryIssuer;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        issuer: Arc<MemoryIssuer>,
        resource: DockerCredentialsResource,
    }

    fn fixture(registry: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("regcred.state.json");
        let issuer = Arc::new(MemoryIssuer::with_registry(registry));
        let resource = DockerCredentialsResource::new(issuer.clone());
        Fixture {
            _dir: dir,
            path,
            issuer,
            resource,
        }
    }

    #[tokio::test]
    async fn test_apply_creates_then_noops() {
        let f = fixture("tf-acc-test-1");
        let config = apply_config("tf-acc-test-1", true, None);

        let first = apply(&f.resource, &f.path, &config).await.unwrap();
        assert_eq!(first, Plan::Create);

        let second = apply(&f.resource, &f.path, &config).await.unwrap();
        assert_eq!(second, Plan::NoOp);

        let state_file = StateFile::load(&f.path).unwrap();
        assert_eq!(state_file.phase(), LifecyclePhase::Refreshed);
        assert_eq!(f.issuer.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_replaces_on_input_change() {
        let f = fixture("tf-acc-test-2");

        apply(&f.resource, &f.path, &apply_config("tf-acc-test-2", false, None))
            .await
            .unwrap();
        let old_token = {
            let file = StateFile::load(&f.path).unwrap();
            decode_state_token(file.live().unwrap(), f.issuer.registry_host()).unwrap()
        };

        let planned = apply(
            &f.resource,
            &f.path,
            &apply_config("tf-acc-test-2", false, Some(3600)),
        )
        .await
        .unwrap();
        assert!(matches!(planned, Plan::Replace { .. }));

        let file = StateFile::load(&f.path).unwrap();
        let state = file.live().unwrap();
        assert_eq!(file.phase(), LifecyclePhase::Created);
        assert_eq!(state.attributes.get(EXPIRY_SECONDS), Some("3600"));

        assert_eq!(
            f.issuer.probe(&old_token).await.unwrap(),
            TokenStatus::Revoked
        );
    }

    #[tokio::test]
    async fn test_destroy_then_verify_revoked() {
        let f = fixture("tf-acc-test-1");
        apply(&f.resource, &f.path, &apply_config("tf-acc-test-1", true, None))
            .await
            .unwrap();

        destroy(&f.resource, &f.path).await.unwrap();

        let file = StateFile::load(&f.path).unwrap();
        assert_eq!(file.phase(), LifecyclePhase::Destroyed);
        assert!(file.live().is_none());

        verify_revoked(f.issuer.as_ref(), &f.path).await.unwrap();

        // Nothing left to destroy
        destroy(&f.resource, &f.path).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_revoked_requires_destroyed_record() {
        let f = fixture("tf-acc-test-1");
        apply(&f.resource, &f.path, &apply_config("tf-acc-test-1", false, None))
            .await
            .unwrap();

        let err = verify_revoked(f.issuer.as_ref(), &f.path).await.unwrap_err();
        assert!(err.to_string().contains("have not been destroyed"));
    }

    #[tokio::test]
    async fn test_verify_revoked_detects_live_token() {
        let f = fixture("tf-acc-test-1");
        apply(&f.resource, &f.path, &apply_config("tf-acc-test-1", false, None))
            .await
            .unwrap();

        // Mark destroyed without revoking the token remotely
        let mut file = StateFile::load(&f.path).unwrap();
        let state = file.live().cloned().unwrap();
        file.transition(
            docker_credentials::RESOURCE_TYPE,
            LifecyclePhase::Destroyed,
            state,
        )
        .unwrap();
        file.save().unwrap();

        let err = verify_revoked(f.issuer.as_ref(), &f.path).await.unwrap_err();
        assert_eq!(err.to_string(), "Docker credentials were not revoked");
    }

    #[tokio::test]
    async fn test_apply_after_destroy_creates_again() {
        let f = fixture("tf-acc-test-1");
        let config = apply_config("tf-acc-test-1", false, None);

        apply(&f.resource, &f.path, &config).await.unwrap();
        destroy(&f.resource, &f.path).await.unwrap();

        let planned = apply(&f.resource, &f.path, &config).await.unwrap();
        assert_eq!(planned, Plan::Create);
        assert_eq!(
            StateFile::load(&f.path).unwrap().phase(),
            LifecyclePhase::Created
        );
    }

    #[tokio::test]
    async fn test_apply_revokes_token_of_renamed_registry() {
        let f = fixture("old");
        apply(&f.resource, &f.path, &apply_config("old", true, None))
            .await
            .unwrap();
        let old_token = {
            let file = StateFile::load(&f.path).unwrap();
            decode_state_token(file.live().unwrap(), f.issuer.registry_host()).unwrap()
        };

        f.issuer.set_registry(Some("new"));
        let planned = apply(&f.resource, &f.path, &apply_config("new", true, None))
            .await
            .unwrap();

        assert_eq!(planned, Plan::Replace { attributes: vec![] });
        assert_eq!(
            f.issuer.probe(&old_token).await.unwrap(),
            TokenStatus::Revoked
        );

        let file = StateFile::load(&f.path).unwrap();
        let state = file.live().unwrap();
        assert!(!state.tainted);
        assert_eq!(state.attributes.get(REGISTRY_NAME), Some("new"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_renamed_registry_for_replacement() {
        let f = fixture("old");
        apply(&f.resource, &f.path, &apply_config("old", false, None))
            .await
            .unwrap();

        f.issuer.set_registry(Some("new"));
        assert_eq!(
            refresh(&f.resource, &f.path).await.unwrap(),
            LifecyclePhase::Refreshed
        );
        assert!(StateFile::load(&f.path).unwrap().live().unwrap().tainted);

        let planned = apply(&f.resource, &f.path, &apply_config("old", false, None))
            .await
            .unwrap();
        assert!(matches!(planned, Plan::Replace { .. }));
    }

    #[tokio::test]
    async fn test_refresh_drops_state_when_registry_gone() {
        let f = fixture("tf-acc-test-1");
        apply(&f.resource, &f.path, &apply_config("tf-acc-test-1", false, None))
            .await
            .unwrap();

        assert_eq!(
            refresh(&f.resource, &f.path).await.unwrap(),
            LifecyclePhase::Refreshed
        );

        f.issuer.set_registry(None);
        assert_eq!(
            refresh(&f.resource, &f.path).await.unwrap(),
            LifecyclePhase::Absent
        );
        assert!(StateFile::load(&f.path).unwrap().record.is_none());
    }

    #[tokio::test]
    async fn test_failed_create_leaves_state_untouched() {
        let f = fixture("tf-acc-test-1");
        f.issuer.fail_issue("boom");

        let err = apply(&f.resource, &f.path, &apply_config("tf-acc-test-1", false, None))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("boom"));
        assert!(!f.path.exists());
    }

    #[tokio::test]
    async fn test_render_masks_secrets() {
        let f = fixture("tf-acc-test-1");
        apply(&f.resource, &f.path, &apply_config("tf-acc-test-1", false, None))
            .await
            .unwrap();
        let record = StateFile::load(&f.path).unwrap().record.unwrap();
        let secret = record.state.attributes.get(DOCKER_CREDENTIALS).unwrap().to_string();

        let masked = render_record(f.resource.schema(), &record, false).to_string();
        assert!(masked.contains(MASK));
        assert!(masked.contains("tf-acc-test-1"));
        assert!(!masked.contains("auths"));

        let revealed = render_record(f.resource.schema(), &record, true).to_string();
        assert!(!revealed.contains(MASK));
        assert!(!secret.is_empty());
    }

    #[tokio::test]
    async fn test_docker_config_requires_live_record() {
        let f = fixture("tf-acc-test-1");
        assert!(docker_config(&f.path).is_err());

        apply(&f.resource, &f.path, &apply_config("tf-acc-test-1", false, None))
            .await
            .unwrap();
        let json = docker_config(&f.path).unwrap();
        assert!(json.contains(f.issuer.registry_host()));

        destroy(&f.resource, &f.path).await.unwrap();
        let err = docker_config(&f.path).unwrap_err();
        assert!(err.to_string().contains("Destroyed"));
    }
}
