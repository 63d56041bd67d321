//! lf-setup: calculation setups, the setup store and the workspace file.

pub mod migrate;
pub mod schema;
pub mod store;
pub mod validate;

pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use schema::*;
pub use store::SetupStore;
pub use validate::{ValidationError, validate_setup, validate_store, validate_workspace};

pub type SetupResult<T> = Result<T, SetupError>;

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("Calculation setup not found: {name}")]
    SetupNotFound { name: String },

    #[error("Calculation setup already exists: {name}")]
    DuplicateSetup { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &std::path::Path) -> SetupResult<Workspace> {
    let content = std::fs::read_to_string(path)?;
    let mut workspace: Workspace = serde_yaml::from_str(&content)?;
    workspace = migrate_to_latest(workspace)?;
    validate_workspace(&workspace)?;
    Ok(workspace)
}

pub fn save_yaml(path: &std::path::Path, workspace: &Workspace) -> SetupResult<()> {
    validate_workspace(workspace)?;
    let content = serde_yaml::to_string(workspace)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> SetupResult<Workspace> {
    let content = std::fs::read_to_string(path)?;
    let mut workspace: Workspace = serde_json::from_str(&content)?;
    workspace = migrate_to_latest(workspace)?;
    validate_workspace(&workspace)?;
    Ok(workspace)
}

pub fn save_json(path: &std::path::Path, workspace: &Workspace) -> SetupResult<()> {
    validate_workspace(workspace)?;
    let content = serde_json::to_string_pretty(workspace)?;
    std::fs::write(path, content)?;
    Ok(())
}
