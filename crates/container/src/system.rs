//! The container system facade.
//!
//! # Purpose
//!
//! [`ContainerSystem`] owns everything one embedded container needs: settings,
//! the deployment registry, the deployed runtime descriptors and the external
//! services. It runs the deployment pipeline (merge, resolve, build, commit,
//! bind, publish) and dispatches invocations against published descriptors.
//!
//! # Invariants
//!
//! * Deployments are serialized; invocations never wait on a deployment.
//!   Descriptors are read from an [`ArcSwap`] snapshot.
//! * A module is published completely or not at all: its registry entries and
//!   JNDI names are undone when a later step fails.
//! * Every invocation runs under a [`ContextGuard`] for the phase of its
//!   target; the enclosing context is restored when it returns.

use std::sync::Arc;

use arc_swap::ArcSwap;
use caisson_assembly::{DeploymentRegistry, ResolvedModule, resolve};
use caisson_metadata::{ClassLoader, RawModule, merge};
use caisson_model::{
	BeanFault, ComponentKind, DeploymentError, LifecycleEvent, MethodRef, MethodSecurity, Problem, ProblemKind, SecurityIdentity, TransactionType, Value,
};
use caisson_settings::ContainerSystemSettings;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::json;
use smallvec::SmallVec;

use crate::context::{ContextGuard, InvocationContext, Phase};
use crate::descriptor::{ContainerOperation, DispatchEntry, MethodTarget, RuntimeDescriptor, build_descriptors};
use crate::dispatch::{run_callbacks, run_chain};
use crate::instances::{InstanceKey, InstanceStore};
use crate::naming::{JndiBinder, MemoryBinder, ProxyReference};
use crate::tx::policy;
use crate::{CmpEngine, InvocationError, LocalTransactionManager, SecurityService, StaticSecurityService, TransactionManager};

type DescriptorIndex = FxHashMap<String, Arc<RuntimeDescriptor>>;

/// Per-module results of [`ContainerSystem::deploy_all`], in input order.
#[derive(Debug)]
pub struct AssemblyOutcome {
	pub modules: Vec<Result<ResolvedModule, DeploymentError>>,
}

impl AssemblyOutcome {
	pub fn deployed(&self) -> impl Iterator<Item = &ResolvedModule> + '_ {
		self.modules.iter().filter_map(|m| m.as_ref().ok())
	}

	pub fn failed(&self) -> impl Iterator<Item = &DeploymentError> + '_ {
		self.modules.iter().filter_map(|m| m.as_ref().err())
	}

	pub fn is_success(&self) -> bool {
		self.modules.iter().all(Result::is_ok)
	}
}

/// One embedded component container.
pub struct ContainerSystem {
	settings: RwLock<ContainerSystemSettings>,
	registry: DeploymentRegistry,
	loader: Arc<dyn ClassLoader>,
	transactions: Arc<dyn TransactionManager>,
	security: Arc<dyn SecurityService>,
	binder: Arc<dyn JndiBinder>,
	cmp: Option<Arc<dyn CmpEngine>>,
	descriptors: ArcSwap<DescriptorIndex>,
	instances: InstanceStore,
	/// Serializes deploy and undeploy.
	deploying: Mutex<()>,
}

impl ContainerSystem {
	/// Container with an in-memory transaction manager, naming tree and a
	/// security service that trusts the caller's identity.
	pub fn new(settings: ContainerSystemSettings, loader: Arc<dyn ClassLoader>) -> Self {
		Self {
			settings: RwLock::new(settings),
			registry: DeploymentRegistry::new(),
			loader,
			transactions: Arc::new(LocalTransactionManager::new()),
			security: Arc::new(StaticSecurityService),
			binder: Arc::new(MemoryBinder::new()),
			cmp: None,
			descriptors: ArcSwap::from_pointee(DescriptorIndex::default()),
			instances: InstanceStore::default(),
			deploying: Mutex::new(()),
		}
	}

	pub fn with_transaction_manager(mut self, transactions: Arc<dyn TransactionManager>) -> Self {
		self.transactions = transactions;
		self
	}

	pub fn with_security_service(mut self, security: Arc<dyn SecurityService>) -> Self {
		self.security = security;
		self
	}

	pub fn with_binder(mut self, binder: Arc<dyn JndiBinder>) -> Self {
		self.binder = binder;
		self
	}

	pub fn with_cmp_engine(mut self, cmp: Arc<dyn CmpEngine>) -> Self {
		self.cmp = Some(cmp);
		self
	}

	/// Current settings, including containers and connectors created by deployments.
	pub fn settings(&self) -> ContainerSystemSettings {
		self.settings.read().clone()
	}

	pub fn registry(&self) -> &DeploymentRegistry {
		&self.registry
	}

	pub fn transaction_manager(&self) -> &Arc<dyn TransactionManager> {
		&self.transactions
	}

	pub fn descriptor(&self, deployment_id: &str) -> Option<Arc<RuntimeDescriptor>> {
		self.descriptors.load().get(deployment_id).cloned()
	}

	/// Deployment ids of every published descriptor, sorted.
	pub fn deployment_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.descriptors.load().keys().cloned().collect();
		ids.sort();
		ids
	}

	pub fn deploy(&self, module: RawModule) -> Result<ResolvedModule, DeploymentError> {
		let module_id = module.module_id.clone();
		let path = module.path.clone();
		self.deploy_all(vec![module]).modules.pop().unwrap_or_else(|| {
			Err(DeploymentError {
				module: module_id,
				path,
				problems: Vec::new(),
			})
		})
	}

	/// Deploys an assembly; failing modules are reported and the others continue.
	///
	/// Modules may reference each other in any order. A module whose references
	/// resolved against a sibling that later failed to build still deploys; the
	/// dangling reference surfaces as [`InvocationError::NotDeployed`].
	pub fn deploy_all(&self, modules: Vec<RawModule>) -> AssemblyOutcome {
		let _span = tracing::trace_span!("deploy_all", modules = modules.len()).entered();
		let _deploying = self.deploying.lock();

		let mut outcomes: Vec<Option<Result<ResolvedModule, DeploymentError>>> = Vec::with_capacity(modules.len());
		let mut merged = Vec::new();
		let mut merged_slots = Vec::new();
		for raw in &modules {
			match merge(raw, self.loader.as_ref()) {
				Ok(module) => {
					merged_slots.push(outcomes.len());
					merged.push(module);
					outcomes.push(None);
				}
				Err(error) => outcomes.push(Some(Err(error))),
			}
		}

		let settings = self.settings();
		let resolution = resolve(&merged, &settings, &self.registry);
		for (slot, result) in merged_slots.into_iter().zip(resolution.modules) {
			outcomes[slot] = Some(result.and_then(|resolved| self.activate(resolved, &settings)));
		}

		let outcome = AssemblyOutcome {
			modules: outcomes.into_iter().flatten().collect(),
		};
		for error in outcome.failed() {
			tracing::warn!(module = %error.module, path = %error.path.display(), problems = error.problems.len(), "module failed to deploy");
		}
		outcome
	}

	/// Builds, commits, binds and publishes one resolved module.
	fn activate(&self, mut resolved: ResolvedModule, settings: &ContainerSystemSettings) -> Result<ResolvedModule, DeploymentError> {
		let (descriptors, warnings) = build_descriptors(&resolved, self.loader.as_ref(), &settings.jndi_name_format)?;
		self.registry.commit(&resolved)?;

		let descriptors: Vec<Arc<RuntimeDescriptor>> = descriptors.into_iter().map(Arc::new).collect();
		if let Err(problem) = self.bind_names(&descriptors) {
			for descriptor in &descriptors {
				self.registry.remove(&descriptor.deployment_id);
			}
			return Err(DeploymentError {
				module: resolved.module.module_id.clone(),
				path: resolved.module.path.clone(),
				problems: vec![problem],
			});
		}

		self.descriptors.rcu(|current| {
			let mut next = DescriptorIndex::clone(current);
			for descriptor in &descriptors {
				next.insert(descriptor.deployment_id.clone(), Arc::clone(descriptor));
			}
			next
		});

		if !resolved.created_containers.is_empty() || !resolved.created_connectors.is_empty() {
			let mut current = self.settings.write();
			for container in &resolved.created_containers {
				if current.container(&container.id).is_none() {
					current.containers.push(container.clone());
				}
			}
			for connector in &resolved.created_connectors {
				if current.connector(&connector.id).is_none() {
					current.connectors.push(connector.clone());
				}
			}
		}

		resolved.warnings.extend(warnings);
		tracing::info!(
			module = %resolved.module.module_id,
			components = descriptors.len(),
			warnings = resolved.all_warnings().count(),
			"deployed module"
		);
		Ok(resolved)
	}

	/// Binds every name of every descriptor; on failure unbinds what was bound.
	fn bind_names(&self, descriptors: &[Arc<RuntimeDescriptor>]) -> Result<(), Problem> {
		let mut bound: Vec<&str> = Vec::new();
		for descriptor in descriptors {
			for (name, exposed) in descriptor.jndi_names() {
				let reference = ProxyReference {
					deployment_id: descriptor.deployment_id.clone(),
					interface: exposed.kind,
					interface_class: exposed.class.clone(),
				};
				if let Err(error) = self.binder.bind(name, reference) {
					for undo in bound {
						self.binder.unbind(undo);
					}
					return Err(Problem {
						module: descriptor.module_id.clone(),
						path: self.registry_path(descriptor),
						component: Some(descriptor.name.clone()),
						kind: ProblemKind::JndiBinding {
							name: name.to_string(),
							reason: error.to_string(),
						},
					});
				}
				tracing::debug!(%name, deployment_id = %descriptor.deployment_id, interface = %exposed.kind, "bound JNDI name");
				bound.push(name);
			}
		}
		Ok(())
	}

	fn registry_path(&self, descriptor: &RuntimeDescriptor) -> std::path::PathBuf {
		self.registry.get(&descriptor.deployment_id).map(|c| c.module_path).unwrap_or_default()
	}

	/// Removes every component of a module; returns the freed deployment ids.
	///
	/// Bean-managed transactions that instances of the module left open are
	/// rolled back.
	pub fn undeploy(&self, module_id: &str) -> Vec<String> {
		let _span = tracing::trace_span!("undeploy", module_id).entered();
		let _deploying = self.deploying.lock();

		let removed = self.registry.remove_module(module_id);
		let snapshot = self.descriptors.load_full();
		for id in &removed {
			if let Some(descriptor) = snapshot.get(id) {
				for (name, _) in descriptor.jndi_names() {
					self.binder.unbind(name);
				}
			}
			let orphaned = self.instances.remove_deployment(id);
			if !orphaned.is_empty() {
				let caller = self.transactions.suspend();
				for tx in orphaned {
					self.rollback_orphan(tx);
				}
				if let Some(tx) = caller
					&& let Err(error) = self.transactions.resume(tx)
				{
					tracing::warn!(%tx, %error, "could not resume caller transaction");
				}
			}
		}
		self.descriptors.rcu(|current| {
			let mut next = DescriptorIndex::clone(current);
			for id in &removed {
				next.remove(id);
			}
			next
		});
		tracing::info!(module_id, removed = removed.len(), "undeployed module");
		removed
	}

	fn rollback_orphan(&self, tx: crate::TxHandle) {
		let result = self.transactions.resume(tx).and_then(|()| self.transactions.rollback());
		match result {
			Ok(()) => tracing::warn!(%tx, "rolled back transaction left open by a removed instance"),
			Err(error) => tracing::warn!(%tx, %error, "could not roll back orphaned transaction"),
		}
	}

	/// Dispatches one call through security, transaction policy and the
	/// interceptor chain.
	///
	/// `primary_key` identifies the instance of stateful and entity components;
	/// pooled components ignore it.
	pub fn invoke(&self, deployment_id: &str, method: &MethodRef, args: Vec<Value>, primary_key: Option<Value>, identity: &SecurityIdentity) -> Result<Value, InvocationError> {
		let _span = tracing::trace_span!("invoke", deployment_id, %method).entered();
		let descriptor = self.descriptor(deployment_id).ok_or_else(|| InvocationError::NotDeployed {
			deployment_id: deployment_id.to_string(),
		})?;
		let entry = descriptor.dispatch(method).ok_or_else(|| InvocationError::NoSuchMethod {
			deployment_id: deployment_id.to_string(),
			method: method.clone(),
		})?;
		self.authorize(&descriptor, entry, identity)?;

		let instance = self.instance_key(&descriptor, primary_key.as_ref());
		let tm = self.transactions.as_ref();
		let scope = match descriptor.transaction_type {
			TransactionType::Container => policy::begin(tm, entry.attribute, method)?,
			TransactionType::Bean => policy::begin_bean_managed(tm, &self.instances, instance.as_ref())?,
		};

		let outcome = {
			let _guard = ContextGuard::enter(self.context(&descriptor, primary_key.clone(), identity, entry.phase()));
			self.run_target(&descriptor, entry, args, instance.as_ref(), primary_key.as_ref(), identity)
		};
		if let Err(fault) = &outcome {
			tracing::debug!(%fault, "invocation raised a fault");
		}

		let classify = |fault: &BeanFault| descriptor.classify(fault);
		match descriptor.transaction_type {
			TransactionType::Container => policy::complete(tm, scope, outcome, classify),
			TransactionType::Bean => policy::complete_bean_managed(tm, &self.instances, descriptor.kind, instance.as_ref(), scope, outcome, classify),
		}
	}

	/// Runs the lifecycle callbacks of `event` for one instance.
	pub fn run_lifecycle(&self, deployment_id: &str, event: LifecycleEvent, primary_key: Option<Value>, identity: &SecurityIdentity) -> Result<(), InvocationError> {
		let _span = tracing::trace_span!("run_lifecycle", deployment_id, %event).entered();
		let descriptor = self.descriptor(deployment_id).ok_or_else(|| InvocationError::NotDeployed {
			deployment_id: deployment_id.to_string(),
		})?;
		let phase = match event {
			LifecycleEvent::PostConstruct => Phase::PostConstruct,
			LifecycleEvent::PreDestroy => Phase::PreDestroy,
			LifecycleEvent::PostActivate => Phase::Activate,
			LifecycleEvent::PrePassivate => Phase::Passivate,
		};
		let callbacks = descriptor.lifecycle_callbacks(event);
		if callbacks.is_empty() {
			return Ok(());
		}

		let instance = self.instance_key(&descriptor, primary_key.as_ref());
		let _guard = ContextGuard::enter(self.context(&descriptor, primary_key.clone(), identity, phase));
		self.with_state(instance.as_ref(), |state| run_callbacks(callbacks, state, primary_key.as_ref()))
			.map_err(InvocationError::System)
	}

	fn authorize(&self, descriptor: &RuntimeDescriptor, entry: &DispatchEntry, identity: &SecurityIdentity) -> Result<(), InvocationError> {
		let allowed = match &entry.security {
			MethodSecurity::Unchecked => true,
			MethodSecurity::Excluded => false,
			MethodSecurity::Roles(roles) => {
				let roles: SmallVec<[&str; 4]> = roles.iter().map(String::as_str).collect();
				self.security.is_caller_authorized(identity, &roles)
			}
		};
		if allowed {
			return Ok(());
		}
		tracing::debug!(deployment_id = %descriptor.deployment_id, method = %entry.method, principal = ?identity.principal, "access denied");
		Err(InvocationError::AccessDenied {
			deployment_id: descriptor.deployment_id.clone(),
			method: entry.method.clone(),
		})
	}

	fn instance_key(&self, descriptor: &RuntimeDescriptor, primary_key: Option<&Value>) -> Option<InstanceKey> {
		if !descriptor.is_stateful_instance() {
			return None;
		}
		primary_key.map(|pk| InstanceKey::new(&descriptor.deployment_id, pk))
	}

	fn context(&self, descriptor: &Arc<RuntimeDescriptor>, primary_key: Option<Value>, identity: &SecurityIdentity, phase: Phase) -> InvocationContext {
		InvocationContext {
			descriptor: Arc::clone(descriptor),
			primary_key,
			identity: identity.clone(),
			phase,
			transactions: Arc::clone(&self.transactions),
			security: Arc::clone(&self.security),
		}
	}

	/// Runs `f` on the instance state, then puts the state back.
	///
	/// Without an instance key the call gets a fresh `Null` state that is dropped afterwards.
	fn with_state<R>(&self, instance: Option<&InstanceKey>, f: impl FnOnce(&mut Value) -> R) -> R {
		let Some(key) = instance else {
			let mut fresh = Value::Null;
			return f(&mut fresh);
		};
		let mut state = self.instances.take_state(key);
		let result = f(&mut state);
		self.instances.put_state(key.clone(), state);
		result
	}

	fn run_target(
		&self,
		descriptor: &Arc<RuntimeDescriptor>,
		entry: &DispatchEntry,
		args: Vec<Value>,
		instance: Option<&InstanceKey>,
		primary_key: Option<&Value>,
		identity: &SecurityIdentity,
	) -> Result<Value, BeanFault> {
		match &entry.target {
			MethodTarget::Bean(bound) => self.with_state(instance, |state| run_chain(&entry.interceptors, bound, args, state, primary_key)),
			MethodTarget::Create { create, post_create } => {
				let previous = instance.map(|key| self.instances.take_state(key));
				let mut state = previous.clone().unwrap_or(Value::Null);
				let created = run_chain(&[], create, args.clone(), &mut state, primary_key).and_then(|value| {
					// Entity create returns the new primary key.
					let key = match (descriptor.kind.is_entity(), primary_key) {
						(true, None) => Some(value.clone()),
						(_, pk) => pk.cloned(),
					};
					if let Some(post) = post_create {
						let _guard = ContextGuard::enter(self.context(descriptor, key.clone(), identity, Phase::PostCreate));
						run_chain(&[], post, args, &mut state, key.as_ref())?;
					}
					Ok((value, key))
				});
				match created {
					Ok((value, key)) => {
						if let Some(key) = key.filter(|_| descriptor.is_stateful_instance()) {
							self.instances.put_state(InstanceKey::new(&descriptor.deployment_id, &key), state);
						}
						Ok(value)
					}
					Err(fault) => {
						if let (Some(key), Some(previous)) = (instance, previous.filter(|state| !state.is_null())) {
							self.instances.put_state(key.clone(), previous);
						}
						Err(fault)
					}
				}
			}
			MethodTarget::Finder { query } => self.find(descriptor, entry, Some(query), &args),
			MethodTarget::Container(operation) => self.container_operation(descriptor, entry, *operation, &args, instance, primary_key, identity),
		}
	}

	/// Ends one instance: pre-destroy callbacks, then its state and any
	/// bean-managed transaction it still holds.
	fn remove_instance(&self, descriptor: &Arc<RuntimeDescriptor>, instance: Option<&InstanceKey>, primary_key: Option<&Value>, identity: &SecurityIdentity) -> Result<Value, BeanFault> {
		let Some(key) = instance else {
			return Ok(Value::Null);
		};
		if descriptor.kind == ComponentKind::Stateful {
			let callbacks = descriptor.lifecycle_callbacks(LifecycleEvent::PreDestroy);
			let _guard = ContextGuard::enter(self.context(descriptor, primary_key.cloned(), identity, Phase::PreDestroy));
			self.with_state(Some(key), |state| run_callbacks(callbacks, state, primary_key))?;
		}
		// The instance's own transaction was resumed for this call.
		if descriptor.transaction_type == TransactionType::Bean && self.transactions.status().is_active() {
			match self.transactions.rollback() {
				Ok(()) => tracing::warn!(deployment_id = %descriptor.deployment_id, "rolled back transaction held by a removed instance"),
				Err(error) => tracing::warn!(deployment_id = %descriptor.deployment_id, %error, "could not roll back transaction of a removed instance"),
			}
		}
		if let Some(tx) = self.instances.remove(key) {
			self.rollback_orphan(tx);
		}
		Ok(Value::Null)
	}

	fn find(&self, descriptor: &RuntimeDescriptor, entry: &DispatchEntry, query: Option<&str>, args: &[Value]) -> Result<Value, BeanFault> {
		match &self.cmp {
			Some(cmp) => cmp.execute_finder(&descriptor.deployment_id, &entry.method.signature, query, args),
			None => Err(BeanFault::system_of(
				"FinderException",
				format!("no CMP engine is configured to run {} on '{}'", entry.method, descriptor.deployment_id),
			)),
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn container_operation(
		&self,
		descriptor: &Arc<RuntimeDescriptor>,
		entry: &DispatchEntry,
		operation: ContainerOperation,
		args: &[Value],
		instance: Option<&InstanceKey>,
		primary_key: Option<&Value>,
		identity: &SecurityIdentity,
	) -> Result<Value, BeanFault> {
		tracing::trace!(deployment_id = %descriptor.deployment_id, ?operation, "container operation");
		match operation {
			ContainerOperation::Remove => self.remove_instance(descriptor, instance, primary_key, identity),
			ContainerOperation::GetPrimaryKey => match primary_key {
				Some(pk) if descriptor.kind.is_entity() => Ok(pk.clone()),
				_ => Err(BeanFault::system_of(
					"RemoteException",
					format!("'{}' objects have no primary key", descriptor.deployment_id),
				)),
			},
			ContainerOperation::IsIdentical => Ok(Value::Bool(match descriptor.kind {
				ComponentKind::Stateless | ComponentKind::MessageDriven => true,
				_ => args.first() == primary_key,
			})),
			ContainerOperation::GetHandle => Ok(json!({
				"deploymentId": descriptor.deployment_id,
				"primaryKey": primary_key.cloned().unwrap_or(Value::Null),
			})),
			ContainerOperation::GetMetaData | ContainerOperation::GetHomeHandle | ContainerOperation::GetHome | ContainerOperation::GetLocalHome => {
				let home = descriptor
					.jndi_names()
					.find(|(_, exposed)| exposed.kind.is_home())
					.map(|(name, _)| name.to_string());
				Ok(json!({
					"deploymentId": descriptor.deployment_id,
					"home": home,
					"kind": descriptor.kind.to_string(),
				}))
			}
			ContainerOperation::FindByPrimaryKey => match &self.cmp {
				Some(_) => self.find(descriptor, entry, None, args),
				None => Ok(args.first().cloned().unwrap_or(Value::Null)),
			},
		}
	}
}

impl std::fmt::Debug for ContainerSystem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ContainerSystem")
			.field("registry", &self.registry)
			.field("descriptors", &self.descriptors.load().len())
			.field("cmp", &self.cmp.is_some())
			.finish_non_exhaustive()
	}
}
