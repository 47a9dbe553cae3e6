#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Container-system settings.
//!
//! # Purpose
//!
//! Describes the environment a deployment resolves against: the declared
//! containers and connectors, the naming templates for deployment ids and
//! JNDI names, and the fallback policy for missing containers, missing
//! connectors and unlinked role references.
//!
//! # Invariants
//!
//! * Container ids are unique; connector ids are unique.
//! * Naming templates only use tokens their format accepts; this is checked at
//!   load time, so rendering never meets an unknown token.
//! * Every key has a default, so an empty document is a valid configuration.
//!
//! ```toml
//! deployment-id-format = "{moduleId}/{ejbName}"
//! auto-create-containers = false
//!
//! [[containers]]
//! id = "Fast Stateless"
//! type = "stateless"
//!
//! [[connectors]]
//! id = "jdbc/orders"
//! type = "javax.sql.DataSource"
//! ```

mod error;
mod template;

use std::path::Path;

use caisson_model::ContainerType;
pub use caisson_model::DEFAULT_RESOURCE_TYPE;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

pub use crate::error::{Result, SettingsError};
pub use crate::template::{DeploymentIdFormat, JndiNameFormat, NameTemplate};

/// Role name used for security-role refs that carry no link.
pub const DEFAULT_ROLE: &str = "default";

/// A container instance available to deployments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerDecl {
	pub id: String,
	#[serde(rename = "type")]
	pub container_type: ContainerType,
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub properties: IndexMap<String, toml::Value>,
}

impl ContainerDecl {
	pub fn new(id: impl Into<String>, container_type: ContainerType) -> Self {
		Self {
			id: id.into(),
			container_type,
			properties: IndexMap::new(),
		}
	}
}

/// A resource connector (data source, queue factory, ...) available to resource refs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorDecl {
	pub id: String,
	#[serde(rename = "type", default = "default_resource_type")]
	pub resource_type: String,
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub properties: IndexMap<String, toml::Value>,
}

impl ConnectorDecl {
	pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			resource_type: resource_type.into(),
			properties: IndexMap::new(),
		}
	}
}

fn default_resource_type() -> String {
	DEFAULT_RESOURCE_TYPE.to_string()
}

fn default_role() -> String {
	DEFAULT_ROLE.to_string()
}

const fn enabled() -> bool {
	true
}

/// Everything a deployment resolves against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ContainerSystemSettings {
	#[serde(default)]
	pub containers: Vec<ContainerDecl>,
	#[serde(default)]
	pub connectors: Vec<ConnectorDecl>,
	#[serde(default)]
	pub deployment_id_format: DeploymentIdFormat,
	#[serde(default)]
	pub jndi_name_format: JndiNameFormat,
	/// Synthesize `Default <Type> Container` when no container of a kind's type exists.
	#[serde(default = "enabled")]
	pub auto_create_containers: bool,
	/// Create a placeholder when a resource link names a missing connector.
	#[serde(default = "enabled")]
	pub auto_create_resources: bool,
	#[serde(default = "default_role")]
	pub default_role: String,
}

impl Default for ContainerSystemSettings {
	fn default() -> Self {
		Self {
			containers: Vec::new(),
			connectors: Vec::new(),
			deployment_id_format: DeploymentIdFormat::default(),
			jndi_name_format: JndiNameFormat::default(),
			auto_create_containers: true,
			auto_create_resources: true,
			default_role: default_role(),
		}
	}
}

impl ContainerSystemSettings {
	/// Parses and validates settings from TOML text.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		let settings: Self = toml::from_str(text)?;
		settings.validate()?;
		tracing::debug!(
			containers = settings.containers.len(),
			connectors = settings.connectors.len(),
			deployment_id_format = settings.deployment_id_format.template().as_str(),
			"loaded container-system settings"
		);
		Ok(settings)
	}

	/// Reads and validates a settings file.
	pub fn load_from_path(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|error| SettingsError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&text)
	}

	/// Checks cross-field invariants serde cannot express.
	pub fn validate(&self) -> Result<()> {
		if self.default_role.trim().is_empty() {
			return Err(SettingsError::Empty { field: "default-role" });
		}
		check_ids("container", self.containers.iter().map(|c| c.id.as_str()))?;
		check_ids("connector", self.connectors.iter().map(|c| c.id.as_str()))?;
		Ok(())
	}

	pub fn container(&self, id: &str) -> Option<&ContainerDecl> {
		self.containers.iter().find(|c| c.id == id)
	}

	/// First declared container of the given type.
	pub fn first_container_of(&self, container_type: ContainerType) -> Option<&ContainerDecl> {
		self.containers.iter().find(|c| c.container_type == container_type)
	}

	pub fn connector(&self, id: &str) -> Option<&ConnectorDecl> {
		self.connectors.iter().find(|c| c.id == id)
	}

	pub fn with_container(mut self, container: ContainerDecl) -> Self {
		self.containers.push(container);
		self
	}

	pub fn with_connector(mut self, connector: ConnectorDecl) -> Self {
		self.connectors.push(connector);
		self
	}
}

fn check_ids<'a>(what: &'static str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
	let mut seen = FxHashSet::default();
	for id in ids {
		if id.trim().is_empty() {
			return Err(SettingsError::Empty { field: "id" });
		}
		if !seen.insert(id) {
			return Err(SettingsError::DuplicateId { what, id: id.to_string() });
		}
	}
	Ok(())
}
