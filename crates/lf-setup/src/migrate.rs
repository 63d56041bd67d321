//! Workspace schema migration.

use std::collections::HashSet;

use tracing::info;

use crate::SetupError;
use crate::schema::Workspace;

pub const LATEST_VERSION: u32 = 2;

pub fn migrate_to_latest(mut workspace: Workspace) -> Result<Workspace, SetupError> {
    while workspace.version < LATEST_VERSION {
        let from = workspace.version;
        workspace = migrate_one_version(workspace)?;
        info!(from, to = workspace.version, "workspace migrated");
    }
    Ok(workspace)
}

fn migrate_one_version(workspace: Workspace) -> Result<Workspace, SetupError> {
    match workspace.version {
        0 => migrate_v0_to_v1(workspace),
        1 => migrate_v1_to_v2(workspace),
        v => Err(SetupError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

fn migrate_v0_to_v1(mut workspace: Workspace) -> Result<Workspace, SetupError> {
    workspace.version = 1;
    Ok(workspace)
}

/// Version 1 allowed the same activity to be demanded twice in one setup.
/// Keep the first occurrence; later duplicates could never be shown as
/// separate rows.
fn migrate_v1_to_v2(mut workspace: Workspace) -> Result<Workspace, SetupError> {
    for setup in &mut workspace.setups {
        let mut seen = HashSet::new();
        setup.inv.retain(|fu| seen.insert(fu.key.clone()));
        let mut seen = HashSet::new();
        setup.ia.retain(|m| seen.insert(m.clone()));
    }
    workspace.version = 2;
    Ok(workspace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CalculationSetup;
    use lf_core::{EntityKey, MethodRef};

    #[test]
    fn v1_duplicates_are_collapsed() {
        let key = EntityKey::new("db", "a");
        let mut ws = Workspace::new("old");
        ws.version = 1;
        ws.setups.push(
            CalculationSetup::new("cs")
                .with_unit(key.clone(), 1.0)
                .with_unit(key.clone(), 5.0)
                .with_method(MethodRef::new(["m"]))
                .with_method(MethodRef::new(["m"])),
        );

        let ws = migrate_to_latest(ws).unwrap();
        assert_eq!(ws.version, LATEST_VERSION);
        assert_eq!(ws.setups[0].inv.len(), 1);
        assert_eq!(ws.setups[0].inv[0].amount, 1.0);
        assert_eq!(ws.setups[0].ia.len(), 1);
    }
}
