//! Runtime descriptors: everything dispatch needs, computed once per component.
//!
//! # Purpose
//!
//! A [`RuntimeDescriptor`] is the frozen, per-component result of deployment:
//! a dispatch table keyed by [`MethodRef`] whose entries already carry the
//! implementation target, the effective transaction attribute, the method
//! security and the interceptor chain, plus lifecycle callback lists, the
//! application-exception table and role-ref links.
//!
//! # Invariants
//!
//! * Every method of every exposed interface has exactly one dispatch entry.
//! * Every handler referenced by the descriptor exists; nothing is looked up
//!   by name at invocation time.
//! * Lifecycle callbacks run in the order default interceptors, class
//!   interceptors, bean class.

mod build;
mod mapping;

use caisson_assembly::{EjbLink, ResourceLink};
use caisson_metadata::MethodHandler;
use caisson_model::{
	BeanFault, ComponentKind, InterfaceKind, LifecycleEvent, MethodPolicyTable, MethodRef, MethodSecurity, MethodSignature, TransactionAttribute,
	TransactionType,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

pub use build::build_descriptors;
pub use mapping::{ContainerOperation, Mapping, map_method};

use crate::context::Phase;
use crate::tx::FaultClass;

/// A class method resolved to its handler.
#[derive(Clone)]
pub struct BoundMethod {
	pub class: String,
	pub method: MethodSignature,
	pub handler: MethodHandler,
}

impl std::fmt::Debug for BoundMethod {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}", self.class, self.method)
	}
}

/// What a dispatched interface method runs.
#[derive(Debug, Clone)]
pub enum MethodTarget {
	Bean(BoundMethod),
	/// A home `create` method: the create body, then the post-create body when the bean has one.
	Create { create: BoundMethod, post_create: Option<BoundMethod> },
	/// A CMP finder executed by the CMP engine.
	Finder { query: String },
	Container(ContainerOperation),
}

/// One row of the dispatch table.
#[derive(Debug, Clone)]
pub struct DispatchEntry {
	pub method: MethodRef,
	pub target: MethodTarget,
	pub attribute: TransactionAttribute,
	pub security: MethodSecurity,
	/// Around-invoke handlers, outermost first.
	pub interceptors: SmallVec<[BoundMethod; 4]>,
}

impl DispatchEntry {
	/// Phase the target runs in.
	pub fn phase(&self) -> Phase {
		match &self.target {
			MethodTarget::Create { .. } => Phase::Create,
			MethodTarget::Container(ContainerOperation::Remove) => Phase::Remove,
			MethodTarget::Bean(_) | MethodTarget::Finder { .. } | MethodTarget::Container(_) => Phase::Business,
		}
	}
}

/// An interface the component exposes, with the name it is bound under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedInterface {
	pub kind: InterfaceKind,
	pub class: String,
	/// `None` for slots that are not bound (component and listener interfaces).
	pub jndi_name: Option<String>,
}

/// Deployed, frozen view of one component.
#[derive(Debug)]
pub struct RuntimeDescriptor {
	pub deployment_id: String,
	pub name: String,
	pub module_id: String,
	pub kind: ComponentKind,
	pub transaction_type: TransactionType,
	pub container_id: String,
	pub class: String,
	pub policy: MethodPolicyTable,
	pub interfaces: Vec<ExposedInterface>,
	pub resource_links: Vec<ResourceLink>,
	pub ejb_links: Vec<EjbLink>,
	dispatch: FxHashMap<MethodRef, DispatchEntry>,
	callbacks: FxHashMap<LifecycleEvent, Vec<BoundMethod>>,
	application_exceptions: FxHashMap<String, bool>,
	role_links: FxHashMap<String, String>,
}

impl RuntimeDescriptor {
	pub fn dispatch(&self, method: &MethodRef) -> Option<&DispatchEntry> {
		self.dispatch.get(method)
	}

	/// Dispatch entries in interface, then signature order.
	pub fn methods(&self) -> Vec<&DispatchEntry> {
		let mut entries: Vec<_> = self.dispatch.values().collect();
		entries.sort_by(|a, b| a.method.cmp(&b.method));
		entries
	}

	pub fn transaction_attribute(&self, method: &MethodRef) -> Option<TransactionAttribute> {
		self.dispatch(method).map(|entry| entry.attribute)
	}

	pub fn authorized_roles(&self, method: &MethodRef) -> Option<&MethodSecurity> {
		self.dispatch(method).map(|entry| &entry.security)
	}

	/// Interceptor classes wrapping `method`, outermost first.
	pub fn interceptor_chain(&self, method: &MethodRef) -> Option<Vec<&str>> {
		self.dispatch(method)
			.map(|entry| entry.interceptors.iter().map(|bound| bound.class.as_str()).collect())
	}

	pub fn lifecycle_callbacks(&self, event: LifecycleEvent) -> &[BoundMethod] {
		self.callbacks.get(&event).map(Vec::as_slice).unwrap_or_default()
	}

	/// Declared rollback flag of an application exception class.
	pub fn application_exception(&self, class: &str) -> Option<bool> {
		self.application_exceptions.get(class).copied()
	}

	pub fn classify(&self, fault: &BeanFault) -> FaultClass {
		match (fault, self.application_exception(fault.class())) {
			(_, Some(rollback)) => FaultClass::Application { rollback },
			(BeanFault::Application { .. }, None) => FaultClass::Application { rollback: false },
			(BeanFault::System { .. }, None) => FaultClass::System,
		}
	}

	/// Role a security-role ref used in code is linked to.
	pub fn role_link(&self, reference: &str) -> Option<&str> {
		self.role_links.get(reference).map(String::as_str)
	}

	/// Bound JNDI names with the interface each exposes.
	pub fn jndi_names(&self) -> impl Iterator<Item = (&str, &ExposedInterface)> + '_ {
		self.interfaces.iter().filter_map(|exposed| exposed.jndi_name.as_deref().map(|name| (name, exposed)))
	}

	pub fn is_stateful_instance(&self) -> bool {
		matches!(self.kind, ComponentKind::Stateful) || self.kind.is_entity()
	}
}

#[cfg(test)]
impl RuntimeDescriptor {
	/// Descriptor without methods, for context tests.
	pub(crate) fn bare(deployment_id: &str, kind: ComponentKind, transaction_type: TransactionType) -> Self {
		Self {
			deployment_id: deployment_id.to_string(),
			name: deployment_id.to_string(),
			module_id: "test".into(),
			kind,
			transaction_type,
			container_id: kind.container_type().default_container_id(),
			class: format!("test.{deployment_id}"),
			policy: MethodPolicyTable::new(),
			interfaces: Vec::new(),
			resource_links: Vec::new(),
			ejb_links: Vec::new(),
			dispatch: FxHashMap::default(),
			callbacks: FxHashMap::default(),
			application_exceptions: FxHashMap::default(),
			role_links: FxHashMap::default(),
		}
	}

	pub(crate) fn with_role_link(mut self, reference: &str, role: &str) -> Self {
		self.role_links.insert(reference.to_string(), role.to_string());
		self
	}
}
