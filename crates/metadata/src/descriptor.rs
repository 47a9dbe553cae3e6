//! Deployment descriptor tree.
//!
//! Mirrors the standard descriptor (beans, interceptors, assembly descriptor)
//! plus the vendor deployment plan (deployment ids, container ids, resource
//! links). Every field is optional so partial descriptors deserialize; the
//! merger decides what a missing field means.

use caisson_model::{CallbackRef, CmpVersion, ComponentKind, InterfaceSlots, LifecycleEvent, MethodPattern, TransactionAttribute, TransactionType};
use serde::{Deserialize, Serialize};

use crate::{ApplicationException, EjbRef, QueryDefinition, ResourceRef, SecurityRoleRef};

/// Component kind as written in a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BeanKind {
	Stateless,
	Stateful,
	EntityBmp,
	EntityCmp,
	MessageDriven,
}

impl BeanKind {
	/// CMP beans without an explicit version are 2.x.
	pub fn to_kind(self, cmp_version: Option<CmpVersion>) -> ComponentKind {
		match self {
			Self::Stateless => ComponentKind::Stateless,
			Self::Stateful => ComponentKind::Stateful,
			Self::EntityBmp => ComponentKind::EntityBmp,
			Self::EntityCmp => ComponentKind::EntityCmp {
				version: cmp_version.unwrap_or(CmpVersion::V2),
			},
			Self::MessageDriven => ComponentKind::MessageDriven,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BeanDescriptor {
	pub name: String,
	#[serde(default)]
	pub class: Option<String>,
	#[serde(default)]
	pub kind: Option<BeanKind>,
	#[serde(default)]
	pub cmp_version: Option<CmpVersion>,
	#[serde(default)]
	pub interfaces: InterfaceSlots,
	#[serde(default)]
	pub transaction_type: Option<TransactionType>,
	#[serde(default)]
	pub post_construct: Vec<CallbackRef>,
	#[serde(default)]
	pub pre_destroy: Vec<CallbackRef>,
	#[serde(default)]
	pub post_activate: Vec<CallbackRef>,
	#[serde(default)]
	pub pre_passivate: Vec<CallbackRef>,
	#[serde(default)]
	pub around_invoke: Option<String>,
	#[serde(default)]
	pub resource_refs: Vec<ResourceRef>,
	#[serde(default)]
	pub ejb_refs: Vec<EjbRef>,
	#[serde(default)]
	pub security_role_refs: Vec<SecurityRoleRef>,
	#[serde(default)]
	pub primary_key_class: Option<String>,
	#[serde(default)]
	pub queries: Vec<QueryDefinition>,
}

impl BeanDescriptor {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	pub fn callbacks(&self, event: LifecycleEvent) -> &[CallbackRef] {
		match event {
			LifecycleEvent::PostConstruct => &self.post_construct,
			LifecycleEvent::PreDestroy => &self.pre_destroy,
			LifecycleEvent::PostActivate => &self.post_activate,
			LifecycleEvent::PrePassivate => &self.pre_passivate,
		}
	}
}

/// An interceptor class declared in the descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct InterceptorDescriptor {
	pub class: String,
	#[serde(default)]
	pub around_invoke: Option<String>,
	#[serde(default)]
	pub post_construct: Vec<String>,
	#[serde(default)]
	pub pre_destroy: Vec<String>,
	#[serde(default)]
	pub post_activate: Vec<String>,
	#[serde(default)]
	pub pre_passivate: Vec<String>,
}

impl InterceptorDescriptor {
	pub fn callbacks(&self, event: LifecycleEvent) -> &[String] {
		match event {
			LifecycleEvent::PostConstruct => &self.post_construct,
			LifecycleEvent::PreDestroy => &self.pre_destroy,
			LifecycleEvent::PostActivate => &self.post_activate,
			LifecycleEvent::PrePassivate => &self.pre_passivate,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ContainerTransaction {
	pub bean: String,
	pub attribute: TransactionAttribute,
	pub methods: Vec<MethodPattern>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MethodPermission {
	pub bean: String,
	#[serde(default)]
	pub roles: Vec<String>,
	#[serde(default)]
	pub unchecked: bool,
	pub methods: Vec<MethodPattern>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExcludedMethods {
	pub bean: String,
	pub methods: Vec<MethodPattern>,
}

/// `bean = "*"` binds default interceptors for every component of the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct InterceptorBindingDescriptor {
	pub bean: String,
	#[serde(default)]
	pub interceptors: Vec<String>,
	#[serde(default)]
	pub method: Option<MethodPattern>,
	#[serde(default)]
	pub exclude_default_interceptors: bool,
	#[serde(default)]
	pub exclude_class_interceptors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AssemblyDescriptor {
	#[serde(default)]
	pub security_roles: Vec<String>,
	#[serde(default)]
	pub method_permissions: Vec<MethodPermission>,
	#[serde(default)]
	pub container_transactions: Vec<ContainerTransaction>,
	#[serde(default)]
	pub exclude_list: Vec<ExcludedMethods>,
	#[serde(default)]
	pub interceptor_bindings: Vec<InterceptorBindingDescriptor>,
	#[serde(default)]
	pub application_exceptions: Vec<ApplicationException>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResourceLinkDescriptor {
	pub reference: String,
	pub connector: String,
}

/// Vendor deployment plan entry for one bean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DeploymentPlan {
	pub bean: String,
	#[serde(default)]
	pub deployment_id: Option<String>,
	#[serde(default)]
	pub container_id: Option<String>,
	#[serde(default)]
	pub resource_links: Vec<ResourceLinkDescriptor>,
}

/// A whole module descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DescriptorTree {
	#[serde(default)]
	pub module_id: Option<String>,
	#[serde(default)]
	pub beans: Vec<BeanDescriptor>,
	#[serde(default)]
	pub interceptors: Vec<InterceptorDescriptor>,
	#[serde(default)]
	pub assembly: AssemblyDescriptor,
	#[serde(default)]
	pub deployments: Vec<DeploymentPlan>,
}

impl DescriptorTree {
	pub fn bean(&self, name: &str) -> Option<&BeanDescriptor> {
		self.beans.iter().find(|b| b.name == name)
	}

	pub fn plan(&self, bean: &str) -> Option<&DeploymentPlan> {
		self.deployments.iter().find(|p| p.bean == bean)
	}
}
