//! Registry-specific error types.

use lf_core::{EntityKey, MethodRef};

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Activity not found: {key}")]
    ActivityNotFound { key: EntityKey },

    #[error("Exchange not found: {key}")]
    ExchangeNotFound { key: EntityKey },

    #[error("Method not found: {method}")]
    MethodNotFound { method: MethodRef },

    #[error("Unknown activity field: {field}")]
    UnknownField { field: String },

    #[error("Duplicate key: {key}")]
    DuplicateKey { key: EntityKey },

    #[error("Invalid value for {what}: {reason}")]
    InvalidValue { what: &'static str, reason: String },
}

impl RegistryError {
    /// True for the "does not exist" family of lookups.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::ActivityNotFound { .. }
                | RegistryError::ExchangeNotFound { .. }
                | RegistryError::MethodNotFound { .. }
        )
    }
}
