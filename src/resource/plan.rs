use std::fmt;

use anyhow::Result;

use super::schema::ResourceSchema;
use super::state::{AttributeBag, ResourceState};

/// What the orchestrator has to do to reach the desired configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Create,
    NoOp,
    /// Destroy and recreate because the listed inputs changed or the prior
    /// instance is tainted
    Replace { attributes: Vec<String> },
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Create => write!(f, "create"),
            Plan::NoOp => write!(f, "no changes"),
            Plan::Replace { attributes } if attributes.is_empty() => {
                write!(f, "replace (tainted)")
            }
            Plan::Replace { attributes } => {
                write!(f, "replace ({} forces replacement)", attributes.join(", "))
            }
        }
    }
}

/// Diff the prior state against a desired configuration
///
/// Only input attributes are compared; computed attributes never cause a diff.
pub fn plan(
    schema: &ResourceSchema,
    prior: Option<&ResourceState>,
    desired: &AttributeBag,
) -> Result<Plan> {
    let desired = schema.normalize(desired)?;

    let Some(prior) = prior else {
        return Ok(Plan::Create);
    };

    let changed: Vec<String> = schema
        .inputs()
        .filter(|attr| prior.attributes.get(attr.name) != desired.get(attr.name))
        .map(|attr| attr.name.to_string())
        .collect();

    if changed.is_empty() && !prior.tainted {
        Ok(Plan::NoOp)
    } else {
        Ok(Plan::Replace {
            attributes: changed,
        })
    }
}
