//! Error types for project descriptor operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, mutating, or migrating a project.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// XML parsing or serialization error in the backing document.
    #[error("XML error: {0}")]
    Xml(String),

    /// A `SqlCmdVariable` element is missing its `DefaultValue` child.
    #[error("SQLCMD variable '{variable}' has no DefaultValue element")]
    MissingDefaultValue { variable: String },

    /// The `DSP` element is missing, duplicated, or names an unknown schema provider.
    #[error("invalid database schema provider: {0}")]
    InvalidSchemaProvider(String),

    /// A script was added without contents and no file exists at the target path.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error during read/write/copy/mkdir.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation requiring the backing document ran before `load`.
    #[error("project file has not been loaded")]
    NotLoaded,
}

impl ProjectError {
    /// Create an XML error.
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    /// Create an invalid-schema-provider error.
    pub fn schema_provider(message: impl Into<String>) -> Self {
        Self::InvalidSchemaProvider(message.into())
    }
}
