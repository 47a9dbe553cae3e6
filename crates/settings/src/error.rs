//! Error types for settings loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating [`crate::ContainerSystemSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
	/// The settings file could not be read.
	#[error("I/O error reading {}: {error}", path.display())]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	/// The TOML text is malformed or has fields of the wrong type.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A naming template contains an unknown token or unbalanced braces.
	#[error("invalid name template '{template}': {reason}")]
	InvalidTemplate { template: String, reason: String },

	/// Two containers or two connectors share an id.
	#[error("duplicate {what} id '{id}'")]
	DuplicateId { what: &'static str, id: String },

	/// An empty identifier or role name.
	#[error("{field} must not be empty")]
	Empty { field: &'static str },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
