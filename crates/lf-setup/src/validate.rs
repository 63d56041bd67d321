//! Workspace validation logic.

use std::collections::HashSet;

use crate::schema::{CalculationSetup, ScenarioData, Workspace};
use crate::store::SetupStore;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_workspace(workspace: &Workspace) -> Result<(), ValidationError> {
    if workspace.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: workspace.version,
        });
    }

    let mut setup_names = HashSet::new();
    for setup in &workspace.setups {
        if !setup_names.insert(&setup.name) {
            return Err(ValidationError::DuplicateId {
                id: setup.name.clone(),
                context: "setups".to_string(),
            });
        }
        validate_setup(setup)?;
    }

    let mut methods = HashSet::new();
    for def in &workspace.methods {
        if !methods.insert(&def.method) {
            return Err(ValidationError::DuplicateId {
                id: def.method.to_string(),
                context: "methods".to_string(),
            });
        }
    }

    let mut scenario_sets = HashSet::new();
    for data in &workspace.scenarios {
        if !scenario_sets.insert(&data.name) {
            return Err(ValidationError::DuplicateId {
                id: data.name.clone(),
                context: "scenarios".to_string(),
            });
        }
        validate_scenario_names(data)?;
    }

    Ok(())
}

/// Checks one setup in isolation: a name, finite amounts, one row per key.
pub fn validate_setup(setup: &CalculationSetup) -> Result<(), ValidationError> {
    if setup.name.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "setup name".to_string(),
            value: setup.name.clone(),
            reason: "must not be empty".to_string(),
        });
    }

    let mut keys = HashSet::new();
    for fu in &setup.inv {
        if !fu.amount.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: format!("setup '{}' amount for {}", setup.name, fu.key),
                value: fu.amount.to_string(),
                reason: "must be finite".to_string(),
            });
        }
        if !keys.insert(&fu.key) {
            return Err(ValidationError::DuplicateId {
                id: fu.key.to_string(),
                context: format!("setup '{}' functional units", setup.name),
            });
        }
    }

    let mut methods = HashSet::new();
    for m in &setup.ia {
        if !methods.insert(m) {
            return Err(ValidationError::DuplicateId {
                id: m.to_string(),
                context: format!("setup '{}' methods", setup.name),
            });
        }
    }

    Ok(())
}

/// Every setup currently held by the store.
pub fn validate_store(store: &SetupStore) -> Result<(), ValidationError> {
    for setup in store.setups() {
        validate_setup(&setup)?;
    }
    Ok(())
}

fn validate_scenario_names(data: &ScenarioData) -> Result<(), ValidationError> {
    let mut names = HashSet::new();
    for name in &data.scenario_names {
        if !names.insert(name) {
            return Err(ValidationError::DuplicateId {
                id: name.clone(),
                context: format!("scenario dataset '{}'", data.name),
            });
        }
    }
    Ok(())
}
