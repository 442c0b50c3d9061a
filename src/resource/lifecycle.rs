use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Where a resource instance stands in the orchestrator's lifecycle
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    #[default]
    Absent,
    Created,
    Refreshed,
    Destroyed,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::Absent => write!(f, "Absent"),
            LifecyclePhase::Created => write!(f, "Created"),
            LifecyclePhase::Refreshed => write!(f, "Refreshed"),
            LifecyclePhase::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Check if a phase is terminal (no further transitions allowed)
pub fn is_terminal(phase: &LifecyclePhase) -> bool {
    matches!(phase, LifecyclePhase::Destroyed)
}

/// Check if the remote object is expected to exist
pub fn is_live(phase: &LifecyclePhase) -> bool {
    matches!(phase, LifecyclePhase::Created | LifecyclePhase::Refreshed)
}

/// Check if a phase transition is valid
pub fn is_valid_transition(from: &LifecyclePhase, to: &LifecyclePhase) -> bool {
    use LifecyclePhase::*;

    match (from, to) {
        (from, _) if is_terminal(from) => false,

        (Absent, Created) => true,

        // Read after create, repeated reads, in-place updates
        (Created | Refreshed, Refreshed) => true,

        // Remote object vanished underneath us
        (Created | Refreshed, Absent) => true,

        (Created | Refreshed, Destroyed) => true,

        _ => false,
    }
}

/// Validate a phase transition and return an error if invalid
pub fn validate_transition(from: &LifecyclePhase, to: &LifecyclePhase) -> Result<()> {
    if !is_valid_transition(from, to) {
        bail!(
            "Invalid resource lifecycle transition from '{}' to '{}'",
            from,
            to
        );
    }
    Ok(())
}
