//! Centralized error types for strata.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid feature request: {0}")]
    Spec(String),

    #[error("Layering violation: {0}")]
    LayeringViolation(String),

    #[error("Unresolved placeholder '{placeholder}' in template '{template}'")]
    UnresolvedPlaceholder { template: String, placeholder: String },

    #[error("Path collision at {}: already claimed by '{first}', rejected '{second}'", path.display())]
    PathCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Failed to emit {}: {message}", path.display())]
    Emit { path: PathBuf, message: String },

    #[error("Coverage unavailable: {0}")]
    CoverageUnavailable(String),

    #[error("Version control error: {0}")]
    Vcs(String),

    #[error("Invalid state transition: cannot move from '{from}' to '{to}'")]
    InvalidStateTransition { from: String, to: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

impl StrataError {
    /// Create an invalid-name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a feature-request validation error.
    pub fn spec(msg: impl Into<String>) -> Self {
        Self::Spec(msg.into())
    }

    /// Create a layering violation.
    pub fn layering(msg: impl Into<String>) -> Self {
        Self::LayeringViolation(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a file-system failure for a specific target path.
    pub fn emit(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Emit {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// True for errors raised while loading configuration or the catalog.
    /// These are fatal at startup.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::LayeringViolation(_) | Self::Config(_) | Self::Template(_) | Self::Toml(_)
        )
    }

    /// Short machine-readable kind, used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "invalid_name",
            Self::Spec(_) => "spec",
            Self::LayeringViolation(_) => "layering_violation",
            Self::UnresolvedPlaceholder { .. } => "unresolved_placeholder",
            Self::PathCollision { .. } => "path_collision",
            Self::Emit { .. } => "emit",
            Self::CoverageUnavailable(_) => "coverage_unavailable",
            Self::Vcs(_) => "vcs",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::Template(_) => "template",
            Self::Config(_) => "config",
            Self::Cancelled(_) => "cancelled",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Toml(_) => "toml",
        }
    }
}
