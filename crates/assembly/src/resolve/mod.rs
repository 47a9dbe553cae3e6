//! Reference resolution for one assembly.
//!
//! # Purpose
//!
//! Turns merged modules into [`ResolvedModule`]s: every resource ref linked to
//! a connector, every component assigned a container and a deployment id,
//! every ejb ref bound to exactly one target, every role ref bound to a role.
//!
//! # Ordering
//!
//! Modules are processed in input order, components in declaration order,
//! and within a component: resource refs, container assignment, ejb refs,
//! role refs. Problem and warning lists therefore come out in a stable order
//! for a given input.
//!
//! # Invariants
//!
//! * Resolution never writes to the [`DeploymentRegistry`]; resolving the same
//!   modules twice against an unchanged registry yields equal results.
//! * A module either resolves completely or fails with every problem found.
//! * Deployment ids are unique across the registry, the assembly and the module.

mod containers;
mod ejb_refs;
mod resources;
mod roles;

use std::path::PathBuf;
use std::sync::Arc;

use caisson_metadata::{ComponentDeclaration, MergedModule};
use caisson_model::{ContainerType, DeploymentError, DeploymentWarning, InterfaceKind, InterfaceSlots, Problem, ProblemKind, WarningKind};
use caisson_settings::{ConnectorDecl, ContainerDecl, ContainerSystemSettings};
use rustc_hash::FxHashMap;

use crate::DeploymentRegistry;
use crate::deployment_id::deployment_id_of;

/// How a resource ref found its connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkOrigin {
	Explicit,
	MatchedByName,
	/// Last resort: the only connector of the right type.
	SoleCandidate,
	/// The linked connector did not exist and a placeholder was created.
	Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLink {
	pub reference: String,
	pub connector_id: String,
	pub origin: LinkOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EjbLink {
	pub reference: String,
	pub interface: InterfaceKind,
	pub target_module: String,
	pub target_component: String,
	pub target_deployment_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLink {
	pub reference: String,
	pub role: String,
	/// The ref had no link and was bound to the default role.
	pub defaulted: bool,
}

/// Resolution result for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedComponent {
	pub name: String,
	pub deployment_id: String,
	pub container_id: String,
	pub container_type: ContainerType,
	pub resource_links: Vec<ResourceLink>,
	pub ejb_links: Vec<EjbLink>,
	pub role_links: Vec<RoleLink>,
}

/// A module whose references all resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModule {
	pub module: Arc<MergedModule>,
	pub components: Vec<ResolvedComponent>,
	/// Resolution warnings; merge warnings stay on [`MergedModule::warnings`].
	pub warnings: Vec<DeploymentWarning>,
	/// Placeholder connectors this module caused.
	pub created_connectors: Vec<ConnectorDecl>,
	/// Default containers this module caused.
	pub created_containers: Vec<ContainerDecl>,
}

impl ResolvedModule {
	pub fn component(&self, name: &str) -> Option<(&ComponentDeclaration, &ResolvedComponent)> {
		let resolved = self.components.iter().find(|c| c.name == name)?;
		Some((self.module.component(name)?, resolved))
	}

	/// Pairs every declaration with its resolution, in declaration order.
	pub fn iter(&self) -> impl Iterator<Item = (&ComponentDeclaration, &ResolvedComponent)> + '_ {
		self.module.components.iter().zip(&self.components)
	}

	/// Merge warnings followed by resolution warnings.
	pub fn all_warnings(&self) -> impl Iterator<Item = &DeploymentWarning> + '_ {
		self.module.warnings.iter().chain(&self.warnings)
	}
}

/// Per-module outcome of resolving an assembly, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyResolution {
	pub modules: Vec<Result<ResolvedModule, DeploymentError>>,
}

impl AssemblyResolution {
	pub fn succeeded(&self) -> impl Iterator<Item = &ResolvedModule> + '_ {
		self.modules.iter().filter_map(|m| m.as_ref().ok())
	}

	pub fn failed(&self) -> impl Iterator<Item = &DeploymentError> + '_ {
		self.modules.iter().filter_map(|m| m.as_ref().err())
	}
}

/// A component reference target, deployed or part of the assembly.
#[derive(Debug, Clone)]
pub(crate) struct DirectoryEntry {
	pub module_id: String,
	pub module_path: PathBuf,
	pub name: String,
	pub deployment_id: String,
	pub interfaces: InterfaceSlots,
	pub deployed: bool,
}

/// Assembly-wide state; grows only with modules that resolved.
pub(crate) struct Resolver<'a> {
	pub settings: &'a ContainerSystemSettings,
	pub directory: Vec<DirectoryEntry>,
	/// Deployment id to the path of the module that owns it.
	pub claimed: FxHashMap<String, PathBuf>,
	pub created_connectors: Vec<ConnectorDecl>,
	pub created_containers: Vec<ContainerDecl>,
}

/// Per-module scratch state.
pub(crate) struct ModuleScope<'m> {
	pub module: &'m MergedModule,
	pub problems: Vec<Problem>,
	pub warnings: Vec<DeploymentWarning>,
	pub claimed: FxHashMap<String, PathBuf>,
	pub created_connectors: Vec<ConnectorDecl>,
	pub created_containers: Vec<ContainerDecl>,
}

impl<'m> ModuleScope<'m> {
	fn new(module: &'m MergedModule) -> Self {
		Self {
			module,
			problems: Vec::new(),
			warnings: Vec::new(),
			claimed: FxHashMap::default(),
			created_connectors: Vec::new(),
			created_containers: Vec::new(),
		}
	}

	pub fn problem(&mut self, component: &str, kind: ProblemKind) {
		tracing::debug!(module = %self.module.module_id, component, problem = %kind, "resolution problem");
		self.problems.push(Problem {
			module: self.module.module_id.clone(),
			path: self.module.path.clone(),
			component: Some(component.to_string()),
			kind,
		});
	}

	pub fn warn(&mut self, component: &str, kind: WarningKind) {
		tracing::warn!(module = %self.module.module_id, component, "{kind}");
		self.warnings.push(DeploymentWarning {
			component: Some(component.to_string()),
			kind,
		});
	}
}

/// Resolves every module of an assembly against the settings and the registry.
pub fn resolve(modules: &[MergedModule], settings: &ContainerSystemSettings, registry: &DeploymentRegistry) -> AssemblyResolution {
	let _span = tracing::trace_span!("resolve", modules = modules.len()).entered();

	let deployed = registry.components();
	let mut directory: Vec<DirectoryEntry> = deployed
		.iter()
		.map(|c| DirectoryEntry {
			module_id: c.module_id.clone(),
			module_path: c.module_path.clone(),
			name: c.name.clone(),
			deployment_id: c.deployment_id.clone(),
			interfaces: c.interfaces.clone(),
			deployed: true,
		})
		.collect();
	for module in modules {
		for component in &module.components {
			directory.push(DirectoryEntry {
				module_id: module.module_id.clone(),
				module_path: module.path.clone(),
				name: component.name.clone(),
				deployment_id: deployment_id_of(&settings.deployment_id_format, &module.module_id, component),
				interfaces: component.interfaces.clone(),
				deployed: false,
			});
		}
	}

	let mut resolver = Resolver {
		settings,
		directory,
		claimed: deployed.into_iter().map(|c| (c.deployment_id, c.module_path)).collect(),
		created_connectors: Vec::new(),
		created_containers: Vec::new(),
	};

	let modules = modules.iter().map(|module| resolver.resolve_module(module)).collect();
	AssemblyResolution { modules }
}

/// Resolves a single module.
pub fn resolve_module(module: &MergedModule, settings: &ContainerSystemSettings, registry: &DeploymentRegistry) -> Result<ResolvedModule, DeploymentError> {
	let mut resolution = resolve(std::slice::from_ref(module), settings, registry);
	match resolution.modules.pop() {
		Some(result) => result,
		None => Err(DeploymentError {
			module: module.module_id.clone(),
			path: module.path.clone(),
			problems: Vec::new(),
		}),
	}
}

impl Resolver<'_> {
	fn resolve_module(&mut self, module: &MergedModule) -> Result<ResolvedModule, DeploymentError> {
		let _span = tracing::trace_span!("resolve_module", module = %module.module_id).entered();
		let mut scope = ModuleScope::new(module);
		let mut components = Vec::with_capacity(module.components.len());

		for component in &module.components {
			let resource_links = component.resource_refs.iter().filter_map(|r| self.resolve_resource(&mut scope, component, r)).collect();
			let assignment = self.assign(&mut scope, component);
			let ejb_links = component.ejb_refs.iter().filter_map(|r| self.resolve_ejb_ref(&mut scope, component, r)).collect();
			let role_links = component.role_refs.iter().filter_map(|r| self.resolve_role(&mut scope, component, r)).collect();

			if let Some((deployment_id, container)) = assignment {
				components.push(ResolvedComponent {
					name: component.name.clone(),
					deployment_id,
					container_id: container.id,
					container_type: container.container_type,
					resource_links,
					ejb_links,
					role_links,
				});
			}
		}

		if !scope.problems.is_empty() {
			tracing::warn!(module = %module.module_id, problems = scope.problems.len(), "module failed to resolve");
			return Err(DeploymentError {
				module: module.module_id.clone(),
				path: module.path.clone(),
				problems: scope.problems,
			});
		}

		self.claimed.extend(scope.claimed);
		self.created_connectors.extend(scope.created_connectors.iter().cloned());
		self.created_containers.extend(scope.created_containers.iter().cloned());
		Ok(ResolvedModule {
			module: Arc::new(module.clone()),
			components,
			warnings: scope.warnings,
			created_connectors: scope.created_connectors,
			created_containers: scope.created_containers,
		})
	}

	/// Container assignment and deployment id.
	fn assign(&self, scope: &mut ModuleScope<'_>, component: &ComponentDeclaration) -> Option<(String, ContainerDecl)> {
		let container = self.assign_container(scope, component);
		let deployment_id = deployment_id_of(&self.settings.deployment_id_format, &scope.module.module_id, component);

		let first = self.claimed.get(&deployment_id).or_else(|| scope.claimed.get(&deployment_id)).cloned();
		if let Some(first_module) = first {
			scope.problem(
				&component.name,
				ProblemKind::DuplicateDeploymentId {
					deployment_id,
					first_module,
					second_module: scope.module.path.clone(),
				},
			);
			return None;
		}
		scope.claimed.insert(deployment_id.clone(), scope.module.path.clone());
		Some((deployment_id, container?))
	}
}
