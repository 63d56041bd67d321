//! Workspace loading, saving, validation, and session construction.

use std::path::Path;
use std::rc::Rc;

use lf_registry::{EntityRegistry, MethodCatalog};
use lf_setup::{SetupStore, Workspace};

use crate::error::{AppError, AppResult};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

fn format_of(path: &Path) -> AppResult<Format> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("yaml" | "yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        _ => Err(AppError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Load a workspace file; the format follows the extension.
pub fn load_workspace(path: &Path) -> AppResult<Workspace> {
    let workspace = match format_of(path)? {
        Format::Yaml => lf_setup::load_yaml(path)?,
        Format::Json => lf_setup::load_json(path)?,
    };
    Ok(workspace)
}

pub fn save_workspace(path: &Path, workspace: &Workspace) -> AppResult<()> {
    match format_of(path)? {
        Format::Yaml => lf_setup::save_yaml(path, workspace)?,
        Format::Json => lf_setup::save_json(path, workspace)?,
    }
    Ok(())
}

/// Structural checks plus references the setups make into the database.
pub fn validate_workspace(workspace: &Workspace) -> AppResult<Vec<String>> {
    lf_setup::validate_workspace(workspace).map_err(|e| AppError::Workspace(e.to_string()))?;

    let mut warnings = Vec::new();
    for setup in &workspace.setups {
        for fu in &setup.inv {
            if !workspace.database.activities.iter().any(|a| a.key == fu.key) {
                warnings.push(format!("setup '{}': unknown activity {}", setup.name, fu.key));
            }
        }
        for method in &setup.ia {
            if !workspace.methods.iter().any(|m| &m.method == method) {
                warnings.push(format!("setup '{}': unknown method {}", setup.name, method));
            }
        }
    }
    Ok(warnings)
}

/// Summary of a calculation setup for listing.
#[derive(Debug, Clone)]
pub struct SetupSummary {
    pub name: String,
    pub func_unit_count: usize,
    pub method_count: usize,
}

pub fn list_setups(workspace: &Workspace) -> Vec<SetupSummary> {
    let mut summaries: Vec<SetupSummary> = workspace
        .setups
        .iter()
        .map(|setup| SetupSummary {
            name: setup.name.clone(),
            func_unit_count: setup.inv.len(),
            method_count: setup.ia.len(),
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    summaries
}

/// Stand up the registry, catalog and store for a workspace.
pub fn open_session(workspace: &Workspace) -> AppResult<Session> {
    let registry = EntityRegistry::from_entities(
        workspace.database.activities.iter().cloned(),
        workspace.database.exchanges.iter().cloned(),
    )?;
    let catalog = MethodCatalog::from_methods(
        workspace
            .methods
            .iter()
            .map(|def| (def.method.clone(), def.meta.clone())),
    );
    let store = SetupStore::from_setups(workspace.setups.iter().cloned())?;
    Ok(Session::new(
        Rc::new(registry),
        Rc::new(catalog),
        Rc::new(store),
    ))
}

/// Copy the store's setups back into `workspace`, for saving.
pub fn store_setups(workspace: &mut Workspace, store: &SetupStore) {
    workspace.setups = store.setups();
}
