//! Registry of deployed components.
//!
//! # Purpose
//!
//! Owns the deployment-id namespace of one container system. Resolution reads
//! it to reject duplicate ids and to resolve references into modules deployed
//! earlier; only [`DeploymentRegistry::commit`] and
//! [`DeploymentRegistry::remove_module`] write to it.
//!
//! # Invariants
//!
//! * A deployment id maps to at most one component.
//! * A commit inserts every component of a module or none of them; the
//!   uniqueness check and the insert happen under one write lock.

use std::path::PathBuf;

use caisson_model::{ComponentKind, DeploymentError, InterfaceSlots, Problem, ProblemKind};
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::ResolvedModule;

/// A component as known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedComponent {
	pub deployment_id: String,
	pub name: String,
	pub module_id: String,
	pub module_path: PathBuf,
	pub kind: ComponentKind,
	pub interfaces: InterfaceSlots,
	pub container_id: String,
}

#[derive(Default)]
struct RegistryState {
	/// Keyed by deployment id, in commit order.
	deployments: IndexMap<String, DeployedComponent>,
}

/// Deployment-id namespace shared by all deployments of one container system.
#[derive(Default)]
pub struct DeploymentRegistry {
	state: RwLock<RegistryState>,
}

impl DeploymentRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, deployment_id: &str) -> Option<DeployedComponent> {
		self.state.read().deployments.get(deployment_id).cloned()
	}

	pub fn contains(&self, deployment_id: &str) -> bool {
		self.state.read().deployments.contains_key(deployment_id)
	}

	/// Deployed components, in commit order.
	pub fn components(&self) -> Vec<DeployedComponent> {
		self.state.read().deployments.values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.state.read().deployments.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.read().deployments.is_empty()
	}

	/// Publishes every component of `module`.
	///
	/// Fails without inserting anything when another module claimed one of the
	/// ids since `module` was resolved.
	pub fn commit(&self, module: &ResolvedModule) -> Result<(), DeploymentError> {
		let merged = &module.module;
		let mut state = self.state.write();

		let problems: Vec<Problem> = module
			.components
			.iter()
			.filter_map(|component| {
				let existing = state.deployments.get(&component.deployment_id)?;
				Some(Problem {
					module: merged.module_id.clone(),
					path: merged.path.clone(),
					component: Some(component.name.clone()),
					kind: ProblemKind::DuplicateDeploymentId {
						deployment_id: component.deployment_id.clone(),
						first_module: existing.module_path.clone(),
						second_module: merged.path.clone(),
					},
				})
			})
			.collect();
		if !problems.is_empty() {
			return Err(DeploymentError {
				module: merged.module_id.clone(),
				path: merged.path.clone(),
				problems,
			});
		}

		for component in &module.components {
			let Some(declaration) = merged.component(&component.name) else {
				continue;
			};
			state.deployments.insert(
				component.deployment_id.clone(),
				DeployedComponent {
					deployment_id: component.deployment_id.clone(),
					name: component.name.clone(),
					module_id: merged.module_id.clone(),
					module_path: merged.path.clone(),
					kind: declaration.kind,
					interfaces: declaration.interfaces.clone(),
					container_id: component.container_id.clone(),
				},
			);
		}
		tracing::info!(module = %merged.module_id, components = module.components.len(), "committed module deployments");
		Ok(())
	}

	/// Removes one deployment, e.g. to undo a commit whose activation failed.
	pub fn remove(&self, deployment_id: &str) -> Option<DeployedComponent> {
		self.state.write().deployments.shift_remove(deployment_id)
	}

	/// Removes every component of a module; returns the freed deployment ids.
	pub fn remove_module(&self, module_id: &str) -> Vec<String> {
		let mut state = self.state.write();
		let removed: Vec<String> = state
			.deployments
			.values()
			.filter(|c| c.module_id == module_id)
			.map(|c| c.deployment_id.clone())
			.collect();
		for id in &removed {
			state.deployments.shift_remove(id);
		}
		removed
	}
}

impl std::fmt::Debug for DeploymentRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DeploymentRegistry").field("deployments", &self.len()).finish()
	}
}
