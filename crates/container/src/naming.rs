//! JNDI names and the binder seam.
//!
//! Only homes and business interfaces are bound. Names come from the
//! configured [`JndiNameFormat`]; when two interfaces of one component render
//! the same name, the later one is bound as `<name>/<interface class>`.

use caisson_metadata::ComponentDeclaration;
use caisson_model::{DeploymentWarning, InterfaceKind, WarningKind, simple_name};
use caisson_settings::JndiNameFormat;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::descriptor::ExposedInterface;

/// What a JNDI entry resolves to: one interface of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyReference {
	pub deployment_id: String,
	pub interface: InterfaceKind,
	pub interface_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamingError {
	#[error("'{name}' is already bound to {existing}")]
	AlreadyBound { name: String, existing: String },
}

/// External naming service.
pub trait JndiBinder: Send + Sync {
	fn bind(&self, name: &str, reference: ProxyReference) -> Result<(), NamingError>;
	fn unbind(&self, name: &str);
}

/// In-memory naming tree.
#[derive(Debug, Default)]
pub struct MemoryBinder {
	entries: RwLock<IndexMap<String, ProxyReference>>,
}

impl MemoryBinder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn lookup(&self, name: &str) -> Option<ProxyReference> {
		self.entries.read().get(name).cloned()
	}

	/// Bound names in binding order.
	pub fn names(&self) -> Vec<String> {
		self.entries.read().keys().cloned().collect()
	}
}

impl JndiBinder for MemoryBinder {
	fn bind(&self, name: &str, reference: ProxyReference) -> Result<(), NamingError> {
		let mut entries = self.entries.write();
		if let Some(existing) = entries.get(name) {
			return Err(NamingError::AlreadyBound {
				name: name.to_string(),
				existing: existing.deployment_id.clone(),
			});
		}
		entries.insert(name.to_string(), reference);
		Ok(())
	}

	fn unbind(&self, name: &str) {
		self.entries.write().shift_remove(name);
	}
}

/// Renders the JNDI name of one interface.
pub fn jndi_name(format: &JndiNameFormat, module_id: &str, component: &ComponentDeclaration, deployment_id: &str, slot: InterfaceKind, interface_class: &str) -> String {
	format.template().render(|token| match token {
		"deploymentId" => deployment_id.to_string(),
		"ejbName" => component.name.clone(),
		"moduleId" => module_id.to_string(),
		"interfaceType.suffix" => slot.suffix().to_string(),
		"interfaceClass" => interface_class.to_string(),
		"interfaceClass.simpleName" => simple_name(interface_class).to_string(),
		_ => String::new(),
	})
}

/// Fills the JNDI names of bindable interfaces, disambiguating collisions.
pub(crate) fn assign_jndi_names(
	format: &JndiNameFormat,
	module_id: &str,
	component: &ComponentDeclaration,
	deployment_id: &str,
	interfaces: &mut [ExposedInterface],
) -> Vec<DeploymentWarning> {
	let mut taken: Vec<String> = Vec::new();
	let mut warnings = Vec::new();
	for exposed in interfaces.iter_mut().filter(|exposed| exposed.kind.is_bindable()) {
		let mut name = jndi_name(format, module_id, component, deployment_id, exposed.kind, &exposed.class);
		if taken.contains(&name) {
			let fallback = format!("{name}/{}", exposed.class);
			tracing::warn!(component = %component.name, %name, %fallback, "JNDI name collision");
			warnings.push(DeploymentWarning {
				component: Some(component.name.clone()),
				kind: WarningKind::JndiNameCollision {
					name,
					fallback: fallback.clone(),
				},
			});
			name = fallback;
		}
		taken.push(name.clone());
		exposed.jndi_name = Some(name);
	}
	warnings
}
