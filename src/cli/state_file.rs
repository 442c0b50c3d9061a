use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::resource::lifecycle::{validate_transition, LifecyclePhase};
use crate::resource::ResourceState;

const STATE_VERSION: u32 = 1;

fn default_version() -> u32 {
    STATE_VERSION
}

/// One tracked resource instance
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateRecord {
    pub resource_type: String,
    pub phase: LifecyclePhase,
    pub state: ResourceState,
    pub updated_at: DateTime<Utc>,
}

/// Local JSON state file, the orchestrator's memory between commands
///
/// Assumes one `regcred` invocation per state file at a time.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct StateFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub record: Option<StateRecord>,
    #[serde(skip)]
    path: PathBuf,
}

impl StateFile {
    /// Load state from disk; a missing file is an empty state
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                version: STATE_VERSION,
                record: None,
                path: path.to_path_buf(),
            });
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;

        let mut state: StateFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file {}", path.display()))?;

        if state.version != STATE_VERSION {
            anyhow::bail!(
                "Unsupported state file version {} in {} (expected {})",
                state.version,
                path.display(),
                STATE_VERSION
            );
        }

        state.path = path.to_path_buf();
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create state directory")?;
            }
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize state")?;

        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.record
            .as_ref()
            .map(|record| record.phase)
            .unwrap_or_default()
    }

    /// State of the instance if it is expected to exist remotely
    pub fn live(&self) -> Option<&ResourceState> {
        self.record
            .as_ref()
            .filter(|record| crate::resource::lifecycle::is_live(&record.phase))
            .map(|record| &record.state)
    }

    /// Move the instance to `to`, validating the lifecycle transition
    ///
    /// A `Destroyed` tombstone may be replaced by a new `Created` instance.
    /// Moving to `Absent` drops the record.
    pub fn transition(
        &mut self,
        resource_type: &str,
        to: LifecyclePhase,
        state: ResourceState,
    ) -> Result<()> {
        let from = match self.phase() {
            LifecyclePhase::Destroyed if to == LifecyclePhase::Created => LifecyclePhase::Absent,
            phase => phase,
        };
        validate_transition(&from, &to)?;

        tracing::debug!(
            resource_type,
            id = %state.id,
            from = %from,
            to = %to,
            "Resource lifecycle transition"
        );

        if to == LifecyclePhase::Absent {
            self.record = None;
        } else {
            self.record = Some(StateRecord {
                resource_type: resource_type.to_string(),
                phase: to,
                state,
                updated_at: Utc::now(),
            });
        }
        Ok(())
    }
}
