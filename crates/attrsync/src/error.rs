//! Error types for attributes, modules, the model registry and preferences.

use std::path::PathBuf;

use attrsync_core::ActorError;
use thiserror::Error;
use uuid::Uuid;

use crate::attribute::Role;

/// Errors raised when reading or writing attribute role data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttributeError {
    /// The attribute carries no data for the role.
    #[error("attribute \"{title}\" has no role data for {role}")]
    RoleNotFound { title: String, role: Role },

    /// The stored value cannot be read (or overwritten) as the requested type.
    #[error("role {role} of attribute \"{title}\" holds {found}, expected {expected}")]
    TypeMismatch {
        title: String,
        role: Role,
        expected: &'static str,
        found: &'static str,
    },

    /// A role name that is not part of the role enumeration.
    #[error("unknown role name \"{0}\"")]
    UnknownRole(String),
}

/// Errors raised by module operations.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error("module \"{module}\" has no attribute with uuid {uuid}")]
    UnknownAttribute { module: String, uuid: Uuid },

    #[error("module \"{module}\" has no attribute titled \"{title}\"")]
    UnknownTitle { module: String, title: String },

    /// Rejected attribute construction (bad value or role data).
    #[error("invalid attribute \"{title}\": {reason}")]
    InvalidAttribute { title: String, reason: String },

    #[error("module \"{0}\" is not attached to an actor")]
    Detached(String),

    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// Errors raised by the central model registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("no model named \"{0}\" is registered")]
    UnknownModel(String),

    #[error("model \"{model}\" has no node at {target}")]
    NodeNotFound { model: String, target: String },

    #[error("cannot insert at row {row} of {path} in model \"{model}\": only {size} rows exist")]
    RowOutOfRange {
        model: String,
        path: String,
        row: usize,
        size: usize,
    },

    #[error("cannot set role \"{role}\" on a non-object node of model \"{model}\"")]
    NotAnObject { model: String, role: String },

    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// Errors raised by the preference store.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("no preference at \"{0}\"")]
    NotFound(String),

    #[error("cannot create preference \"{0}\": a parent is not an object")]
    InvalidPath(String),

    #[error("preference store has no backing file")]
    NoBackingFile,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid preference data in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Errors raised while starting an application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Preferences(#[from] PreferenceError),

    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// A specialized Result type for module operations.
pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

/// A specialized Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = AttributeError::RoleNotFound {
            title: "Volume".into(),
            role: Role::ToolTip,
        };
        assert_eq!(err.to_string(), "attribute \"Volume\" has no role data for tooltip");

        let err: ModuleError = err.into();
        assert!(matches!(err, ModuleError::Attribute(_)));

        let err = RegistryError::RowOutOfRange {
            model: "panels".into(),
            path: "/children/0".into(),
            row: 5,
            size: 2,
        };
        assert!(err.to_string().contains("only 2 rows exist"));
    }
}
