//! Reference declarations shared by descriptors and annotations.

use caisson_model::{DEFAULT_RESOURCE_TYPE, InterfaceKind, MethodSignature};
use serde::{Deserialize, Serialize};

fn default_resource_type() -> String {
	DEFAULT_RESOURCE_TYPE.to_string()
}

/// A named dependency on a resource connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResourceRef {
	pub name: String,
	#[serde(rename = "type", default = "default_resource_type")]
	pub resource_type: String,
	/// Connector id this reference is explicitly linked to.
	#[serde(default)]
	pub link: Option<String>,
}

impl ResourceRef {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			resource_type: default_resource_type(),
			link: None,
		}
	}

	pub fn of_type(mut self, resource_type: impl Into<String>) -> Self {
		self.resource_type = resource_type.into();
		self
	}

	pub fn linked(mut self, connector: impl Into<String>) -> Self {
		self.link = Some(connector.into());
		self
	}

	/// Last `/` segment of the reference name (`jdbc/orders` → `orders`).
	pub fn short_name(&self) -> &str {
		self.name.rsplit('/').next().unwrap_or(&self.name)
	}
}

/// A named dependency on another component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct EjbRef {
	pub name: String,
	/// Interface slot the referencing code needs on the target.
	pub interface: InterfaceKind,
	/// Target component name, optionally scoped as `module#Name`.
	#[serde(default)]
	pub link: Option<String>,
}

impl EjbRef {
	pub fn new(name: impl Into<String>, interface: InterfaceKind) -> Self {
		Self {
			name: name.into(),
			interface,
			link: None,
		}
	}

	pub fn linked(mut self, target: impl Into<String>) -> Self {
		self.link = Some(target.into());
		self
	}

	/// The component name to look for: the link, or else the last segment of the ref name.
	pub fn target(&self) -> &str {
		match &self.link {
			Some(link) => link,
			None => self.name.rsplit('/').next().unwrap_or(&self.name),
		}
	}
}

/// A role name used in code, optionally linked to a declared role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SecurityRoleRef {
	pub name: String,
	#[serde(default)]
	pub link: Option<String>,
}

impl SecurityRoleRef {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			link: None,
		}
	}

	pub fn linked(mut self, role: impl Into<String>) -> Self {
		self.link = Some(role.into());
		self
	}
}

/// Query text attached to an entity finder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct QueryDefinition {
	pub method: MethodSignature,
	pub query: String,
}

/// Exception class declared as an application exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ApplicationException {
	pub class: String,
	#[serde(default)]
	pub rollback: bool,
}
