//! Records produced by annotation discovery.
//!
//! Scanning bytecode is external; a scanner reports one [`AnnotatedClass`] per
//! class carrying component, interceptor or application-exception metadata.

use caisson_model::{ComponentKind, LifecycleEvent, MethodSignature, TransactionAttribute, TransactionType};
use serde::{Deserialize, Serialize};

use crate::{EjbRef, ResourceRef};

/// Component-defining annotation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotatedKind {
	Stateless,
	Stateful,
	MessageDriven,
}

impl AnnotatedKind {
	pub const fn to_kind(self) -> ComponentKind {
		match self {
			Self::Stateless => ComponentKind::Stateless,
			Self::Stateful => ComponentKind::Stateful,
			Self::MessageDriven => ComponentKind::MessageDriven,
		}
	}
}

/// `@Stateless(name = ...)` and friends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ComponentAnnotation {
	pub kind: AnnotatedKind,
	#[serde(default)]
	pub name: Option<String>,
}

/// `@RolesAllowed`, `@PermitAll` or `@DenyAll`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityAnnotation {
	RolesAllowed(Vec<String>),
	PermitAll,
	DenyAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MethodTransaction {
	pub method: MethodSignature,
	pub attribute: TransactionAttribute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MethodSecurityAnnotation {
	pub method: MethodSignature,
	pub security: SecurityAnnotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MethodInterceptors {
	pub method: MethodSignature,
	#[serde(default)]
	pub interceptors: Vec<String>,
	#[serde(default)]
	pub exclude_default_interceptors: bool,
	#[serde(default)]
	pub exclude_class_interceptors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnnotatedCallback {
	pub event: LifecycleEvent,
	pub method: String,
}

/// Everything annotation discovery found on one class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnnotatedClass {
	pub class: String,
	#[serde(default)]
	pub component: Option<ComponentAnnotation>,
	#[serde(default)]
	pub transaction_management: Option<TransactionType>,
	/// Class-level `@TransactionAttribute`.
	#[serde(default)]
	pub transaction_attribute: Option<TransactionAttribute>,
	#[serde(default)]
	pub method_transactions: Vec<MethodTransaction>,
	#[serde(default)]
	pub security: Option<SecurityAnnotation>,
	#[serde(default)]
	pub method_security: Vec<MethodSecurityAnnotation>,
	#[serde(default)]
	pub declare_roles: Vec<String>,
	#[serde(default)]
	pub callbacks: Vec<AnnotatedCallback>,
	#[serde(default)]
	pub around_invoke: Option<String>,
	#[serde(default)]
	pub business_local: Vec<String>,
	#[serde(default)]
	pub business_remote: Vec<String>,
	#[serde(default)]
	pub local_home: Option<String>,
	#[serde(default)]
	pub remote_home: Option<String>,
	#[serde(default)]
	pub interceptors: Vec<String>,
	#[serde(default)]
	pub method_interceptors: Vec<MethodInterceptors>,
	#[serde(default)]
	pub exclude_default_interceptors: bool,
	#[serde(default)]
	pub resource_refs: Vec<ResourceRef>,
	#[serde(default)]
	pub ejb_refs: Vec<EjbRef>,
	/// `@ApplicationException(rollback = ...)` on an exception class.
	#[serde(default)]
	pub application_exception: Option<bool>,
}

impl AnnotatedClass {
	pub fn new(class: impl Into<String>) -> Self {
		Self {
			class: class.into(),
			..Self::default()
		}
	}

	pub fn with_component(mut self, kind: AnnotatedKind, name: Option<&str>) -> Self {
		self.component = Some(ComponentAnnotation {
			kind,
			name: name.map(str::to_string),
		});
		self
	}

	/// Name of the component this class defines, if it defines one.
	pub fn component_name(&self) -> Option<&str> {
		let component = self.component.as_ref()?;
		Some(component.name.as_deref().unwrap_or_else(|| caisson_model::simple_name(&self.class)))
	}

	/// Classes carrying interceptor metadata but no component annotation.
	pub fn is_interceptor(&self) -> bool {
		self.component.is_none() && (self.around_invoke.is_some() || !self.callbacks.is_empty())
	}

	pub fn callbacks_for(&self, event: LifecycleEvent) -> impl Iterator<Item = &str> + '_ {
		self.callbacks.iter().filter(move |c| c.event == event).map(|c| c.method.as_str())
	}
}
