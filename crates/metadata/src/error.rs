//! Error types for metadata reading.

use std::path::PathBuf;

use thiserror::Error;

use crate::ClassNotFound;

/// Errors raised while reading a module's metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
	#[error("I/O error reading {}: {error}", path.display())]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	#[error("invalid descriptor {}: {message}", path.display())]
	Parse { path: PathBuf, message: String },

	#[error("descriptor parse error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error(transparent)]
	ClassNotFound(#[from] ClassNotFound),
}

/// Result type for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;
