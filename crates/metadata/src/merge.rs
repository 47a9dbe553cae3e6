//! Annotation/descriptor merger.
//!
//! # Purpose
//!
//! Folds a [`RawModule`] into one [`MergedModule`] of frozen
//! [`ComponentDeclaration`]s, so later stages never look at raw metadata.
//!
//! # Precedence Contract
//!
//! * A descriptor bean absorbs the annotated class with the same component
//!   name, else the annotated class with the same implementation class; it
//!   is never duplicated.
//! * Annotation-only components are named by their annotation, else by the
//!   simple name of their class.
//! * Annotation detail only fills what the descriptor left unset.
//! * Transactions: a class-level annotation supplies the `*` entry only when
//!   the descriptor has none; a method annotation on `m(P)` is dropped only
//!   when the descriptor names exactly `m(P)`, otherwise it adds an exact
//!   entry. Permissions follow the same rule.
//!
//! # Invariants
//!
//! * Component names are unique within the module.
//! * Every declared interface slot is legal for the component kind.
//! * Bean-managed components carry no transaction entries.
//! * Every interceptor class referenced by a binding is declared or scanned.
//! * All problems of a module are reported together.

use std::path::PathBuf;

use caisson_model::{
	CallbackRef, ComponentKind, DeploymentError, DeploymentWarning, InterfaceKind, InterfaceSlots, LifecycleEvent, MethodPattern, MethodPolicyTable,
	Origin, Problem, ProblemKind, RolePolicy, TransactionType, WarningKind,
};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::{
	AnnotatedClass, ApplicationException, BeanDescriptor, ClassLoader, DescriptorTree, EjbRef, QueryDefinition, RawModule, ResourceRef,
	SecurityAnnotation, SecurityRoleRef,
};

/// Lifecycle callback lists of a component or interceptor, in invocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleCallbacks {
	pub post_construct: Vec<CallbackRef>,
	pub pre_destroy: Vec<CallbackRef>,
	pub post_activate: Vec<CallbackRef>,
	pub pre_passivate: Vec<CallbackRef>,
}

impl LifecycleCallbacks {
	pub fn get(&self, event: LifecycleEvent) -> &[CallbackRef] {
		match event {
			LifecycleEvent::PostConstruct => &self.post_construct,
			LifecycleEvent::PreDestroy => &self.pre_destroy,
			LifecycleEvent::PostActivate => &self.post_activate,
			LifecycleEvent::PrePassivate => &self.pre_passivate,
		}
	}

	pub fn get_mut(&mut self, event: LifecycleEvent) -> &mut Vec<CallbackRef> {
		match event {
			LifecycleEvent::PostConstruct => &mut self.post_construct,
			LifecycleEvent::PreDestroy => &mut self.pre_destroy,
			LifecycleEvent::PostActivate => &mut self.post_activate,
			LifecycleEvent::PrePassivate => &mut self.pre_passivate,
		}
	}

	pub fn is_empty(&self) -> bool {
		LifecycleEvent::ALL.iter().all(|event| self.get(*event).is_empty())
	}
}

/// A fully merged component; immutable once the module is merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDeclaration {
	pub name: String,
	pub class: String,
	pub kind: ComponentKind,
	pub interfaces: InterfaceSlots,
	pub transaction_type: TransactionType,
	pub callbacks: LifecycleCallbacks,
	/// Around-invoke method declared on the bean class itself.
	pub around_invoke: Option<String>,
	pub resource_refs: Vec<ResourceRef>,
	pub ejb_refs: Vec<EjbRef>,
	pub role_refs: Vec<SecurityRoleRef>,
	pub primary_key_class: Option<String>,
	pub queries: Vec<QueryDefinition>,
	pub policy: MethodPolicyTable,
	pub deployment_id: Option<String>,
	pub container_id: Option<String>,
	/// Whether the component was declared in the descriptor or only discovered.
	pub origin: Origin,
}

impl ComponentDeclaration {
	pub fn query(&self, method: &caisson_model::MethodSignature) -> Option<&QueryDefinition> {
		self.queries.iter().find(|q| q.method == *method)
	}
}

/// An interceptor class with its callback methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptorDecl {
	pub class: String,
	pub around_invoke: Option<String>,
	pub callbacks: LifecycleCallbacks,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingTarget {
	/// Default interceptors (`*`).
	AllComponents,
	Component(String),
}

impl BindingTarget {
	pub fn applies_to(&self, component: &str) -> bool {
		match self {
			Self::AllComponents => true,
			Self::Component(name) => name == component,
		}
	}
}

/// Interceptor classes bound to components or methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorBinding {
	pub target: BindingTarget,
	pub interceptors: Vec<String>,
	/// `None` binds at class level.
	pub method: Option<MethodPattern>,
	pub exclude_default: bool,
	pub exclude_class: bool,
	pub origin: Origin,
}

/// The merged metadata of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedModule {
	pub module_id: String,
	pub path: PathBuf,
	pub components: Vec<ComponentDeclaration>,
	pub interceptors: IndexMap<String, InterceptorDecl>,
	pub bindings: Vec<InterceptorBinding>,
	pub application_exceptions: Vec<ApplicationException>,
	/// Roles declared by the module; empty when the module declares none.
	pub security_roles: Vec<String>,
	pub warnings: Vec<DeploymentWarning>,
}

impl MergedModule {
	pub fn component(&self, name: &str) -> Option<&ComponentDeclaration> {
		self.components.iter().find(|c| c.name == name)
	}

	/// Bindings that apply to `component`, in declaration order.
	pub fn bindings_for<'a, 'n>(&'a self, component: &'n str) -> impl Iterator<Item = &'a InterceptorBinding> + use<'a, 'n> {
		self.bindings.iter().filter(move |b| b.target.applies_to(component))
	}
}

struct Problems<'a> {
	raw: &'a RawModule,
	problems: Vec<Problem>,
}

impl<'a> Problems<'a> {
	fn new(raw: &'a RawModule) -> Self {
		Self { raw, problems: Vec::new() }
	}

	fn push(&mut self, component: Option<&str>, kind: ProblemKind) {
		tracing::debug!(module = %self.raw.module_id, component, problem = %kind, "merge problem");
		self.problems.push(Problem {
			module: self.raw.module_id.clone(),
			path: self.raw.path.clone(),
			component: component.map(str::to_string),
			kind,
		});
	}
}

fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
	candidates
		.map(|c| (strsim::levenshtein(name, c), c))
		.min()
		.filter(|(distance, _)| *distance <= 3)
		.map(|(_, c)| c)
		.map(str::to_string)
}

/// Merges descriptor and annotation metadata of one module.
pub fn merge(raw: &RawModule, loader: &dyn ClassLoader) -> Result<MergedModule, DeploymentError> {
	let _span = tracing::trace_span!("merge", module = %raw.module_id).entered();

	let empty = DescriptorTree::default();
	let descriptor = raw.descriptor.as_ref().unwrap_or(&empty);
	let mut problems = Problems::new(raw);
	let mut warnings = Vec::new();
	let mut consumed = vec![false; raw.annotated.len()];
	let mut names = FxHashSet::default();
	let mut components = Vec::new();
	let mut bindings: Vec<InterceptorBinding> = descriptor.assembly.interceptor_bindings.iter().map(binding_from_descriptor).collect();

	for bean in &descriptor.beans {
		if !names.insert(bean.name.as_str()) {
			problems.push(Some(&bean.name), ProblemKind::DuplicateComponentName { name: bean.name.clone() });
			continue;
		}
		let matched = find_annotation(raw, &consumed, bean);
		if let Some(index) = matched {
			consumed[index] = true;
		}
		let annotation = matched.map(|index| &raw.annotated[index]);
		let input = ComponentInput {
			name: &bean.name,
			bean: Some(bean),
			annotation,
		};
		if let Some(component) = build_component(input, descriptor, loader, &mut problems, &mut warnings) {
			add_annotation_bindings(&component.name, annotation, &mut bindings);
			components.push(component);
		}
	}

	for (index, class) in raw.annotated.iter().enumerate() {
		if consumed[index] {
			continue;
		}
		let Some(name) = class.component_name() else {
			continue;
		};
		consumed[index] = true;
		if !names.insert(name) {
			problems.push(Some(name), ProblemKind::DuplicateComponentName { name: name.to_string() });
			continue;
		}
		let input = ComponentInput {
			name,
			bean: None,
			annotation: Some(class),
		};
		if let Some(component) = build_component(input, descriptor, loader, &mut problems, &mut warnings) {
			add_annotation_bindings(&component.name, Some(class), &mut bindings);
			components.push(component);
		}
	}

	let interceptors = collect_interceptors(raw, descriptor, &consumed);
	check_references(descriptor, &bindings, &interceptors, &names, &mut problems);

	if !problems.problems.is_empty() {
		return Err(DeploymentError {
			module: raw.module_id.clone(),
			path: raw.path.clone(),
			problems: problems.problems,
		});
	}

	let mut application_exceptions = descriptor.assembly.application_exceptions.clone();
	for class in &raw.annotated {
		if let Some(rollback) = class.application_exception
			&& !application_exceptions.iter().any(|e| e.class == class.class)
		{
			application_exceptions.push(ApplicationException {
				class: class.class.clone(),
				rollback,
			});
		}
	}

	let mut security_roles = descriptor.assembly.security_roles.clone();
	for role in raw.annotated.iter().flat_map(|c| &c.declare_roles) {
		if !security_roles.contains(role) {
			security_roles.push(role.clone());
		}
	}

	tracing::debug!(
		module = %raw.module_id,
		components = components.len(),
		interceptors = interceptors.len(),
		warnings = warnings.len(),
		"merged module"
	);

	Ok(MergedModule {
		module_id: raw.module_id.clone(),
		path: raw.path.clone(),
		components,
		interceptors,
		bindings,
		application_exceptions,
		security_roles,
		warnings,
	})
}

fn find_annotation(raw: &RawModule, consumed: &[bool], bean: &BeanDescriptor) -> Option<usize> {
	let open = || raw.annotated.iter().enumerate().filter(|(index, _)| !consumed[*index]);
	open()
		.find(|(_, class)| class.component_name() == Some(bean.name.as_str()))
		.or_else(|| {
			let class_name = bean.class.as_deref()?;
			open().find(|(_, class)| class.class == class_name)
		})
		.map(|(index, _)| index)
}

struct ComponentInput<'a> {
	name: &'a str,
	bean: Option<&'a BeanDescriptor>,
	annotation: Option<&'a AnnotatedClass>,
}

fn build_component(
	input: ComponentInput<'_>,
	descriptor: &DescriptorTree,
	loader: &dyn ClassLoader,
	problems: &mut Problems<'_>,
	warnings: &mut Vec<DeploymentWarning>,
) -> Option<ComponentDeclaration> {
	let ComponentInput { name, bean, annotation } = input;

	let Some(class) = bean.and_then(|b| b.class.clone()).or_else(|| annotation.map(|a| a.class.clone())) else {
		problems.push(Some(name), ProblemKind::MissingImplementationClass);
		return None;
	};
	let kind = bean
		.and_then(|b| b.kind.map(|k| k.to_kind(b.cmp_version)))
		.or_else(|| annotation.and_then(|a| a.component.as_ref()).map(|c| c.kind.to_kind()));
	let Some(kind) = kind else {
		problems.push(Some(name), ProblemKind::MissingKind);
		return None;
	};
	let loaded = match loader.load_class(&class) {
		Ok(loaded) => Some(loaded),
		Err(err) => {
			problems.push(Some(name), ProblemKind::ClassNotFound { class: err.0 });
			None
		}
	};

	let mut interfaces = bean.map(|b| b.interfaces.clone()).unwrap_or_default();
	if let Some(a) = annotation {
		fill_vec(&mut interfaces.business_local, &a.business_local);
		fill_vec(&mut interfaces.business_remote, &a.business_remote);
		fill_option(&mut interfaces.local_home, a.local_home.as_ref());
		fill_option(&mut interfaces.home, a.remote_home.as_ref());
	}
	// A session bean implementing exactly one interface exposes it as its local business interface.
	if kind.is_session()
		&& interfaces.is_empty()
		&& let Some(loaded) = &loaded
		&& let [only] = loaded.info().interfaces.as_slice()
	{
		interfaces.business_local.push(only.clone());
	}
	for slot in InterfaceKind::ALL {
		if interfaces.has(slot) && !kind.allows(slot) {
			problems.push(Some(name), ProblemKind::IllegalInterface { kind, slot });
		}
	}

	let transaction_type = bean
		.and_then(|b| b.transaction_type)
		.or_else(|| annotation.and_then(|a| a.transaction_management))
		.unwrap_or_default();
	if kind.is_entity() && transaction_type == TransactionType::Bean {
		problems.push(
			Some(name),
			ProblemKind::InvalidDescriptor {
				reason: "entity components cannot use bean-managed transactions".into(),
			},
		);
	}

	let mut callbacks = LifecycleCallbacks::default();
	for event in LifecycleEvent::ALL {
		let declared = bean.map(|b| b.callbacks(event)).unwrap_or_default();
		*callbacks.get_mut(event) = if declared.is_empty() {
			annotation.map(|a| a.callbacks_for(event).map(CallbackRef::on_bean).collect()).unwrap_or_default()
		} else {
			declared.to_vec()
		};
	}

	let mut resource_refs = bean.map(|b| b.resource_refs.clone()).unwrap_or_default();
	let mut ejb_refs = bean.map(|b| b.ejb_refs.clone()).unwrap_or_default();
	if let Some(a) = annotation {
		for r in &a.resource_refs {
			if !resource_refs.iter().any(|existing| existing.name == r.name) {
				resource_refs.push(r.clone());
			}
		}
		for r in &a.ejb_refs {
			if !ejb_refs.iter().any(|existing| existing.name == r.name) {
				ejb_refs.push(r.clone());
			}
		}
	}

	let plan = descriptor.plan(name);
	for link in plan.map(|p| p.resource_links.as_slice()).unwrap_or_default() {
		match resource_refs.iter_mut().find(|r| r.name == link.reference) {
			Some(reference) => reference.link = Some(link.connector.clone()),
			None => problems.push(
				Some(name),
				ProblemKind::InvalidDescriptor {
					reason: format!("resource link for undeclared resource-ref '{}'", link.reference),
				},
			),
		}
	}

	let mut policy = descriptor_policy(name, descriptor);
	if let Some(a) = annotation {
		apply_annotation_policy(&mut policy, a);
	}
	if transaction_type == TransactionType::Bean {
		let count = policy.clear_transactions();
		if count > 0 {
			tracing::warn!(component = name, count, "bean-managed component declares container transactions; entries ignored");
			warnings.push(DeploymentWarning {
				component: Some(name.to_string()),
				kind: WarningKind::DroppedTransactionEntries { count },
			});
		}
	}

	loaded?;
	Some(ComponentDeclaration {
		name: name.to_string(),
		class,
		kind,
		interfaces,
		transaction_type,
		callbacks,
		around_invoke: bean.and_then(|b| b.around_invoke.clone()).or_else(|| annotation.and_then(|a| a.around_invoke.clone())),
		resource_refs,
		ejb_refs,
		role_refs: bean.map(|b| b.security_role_refs.clone()).unwrap_or_default(),
		primary_key_class: bean.and_then(|b| b.primary_key_class.clone()),
		queries: bean.map(|b| b.queries.clone()).unwrap_or_default(),
		policy,
		deployment_id: plan.and_then(|p| p.deployment_id.clone()),
		container_id: plan.and_then(|p| p.container_id.clone()),
		origin: if bean.is_some() { Origin::Descriptor } else { Origin::Annotation },
	})
}

fn fill_vec(slot: &mut Vec<String>, from: &[String]) {
	if slot.is_empty() {
		slot.extend_from_slice(from);
	}
}

fn fill_option(slot: &mut Option<String>, from: Option<&String>) {
	if slot.is_none() {
		*slot = from.cloned();
	}
}

fn descriptor_policy(component: &str, descriptor: &DescriptorTree) -> MethodPolicyTable {
	let assembly = &descriptor.assembly;
	let mut policy = MethodPolicyTable::new();
	for entry in assembly.container_transactions.iter().filter(|e| e.bean == component) {
		for pattern in &entry.methods {
			policy.push_transaction(pattern.clone(), entry.attribute, Origin::Descriptor);
		}
	}
	for entry in assembly.method_permissions.iter().filter(|e| e.bean == component) {
		let role_policy = if entry.unchecked {
			RolePolicy::Unchecked
		} else {
			RolePolicy::roles(entry.roles.iter().cloned())
		};
		for pattern in &entry.methods {
			policy.push_permission(pattern.clone(), role_policy.clone(), Origin::Descriptor);
		}
	}
	for entry in assembly.exclude_list.iter().filter(|e| e.bean == component) {
		for pattern in &entry.methods {
			policy.exclude(pattern.clone());
		}
	}
	policy
}

fn apply_annotation_policy(policy: &mut MethodPolicyTable, annotation: &AnnotatedClass) {
	if let Some(attribute) = annotation.transaction_attribute
		&& !policy.has_wildcard_transaction()
	{
		policy.push_transaction(MethodPattern::wildcard(), attribute, Origin::Annotation);
	}
	for entry in &annotation.method_transactions {
		if !policy.has_exact_transaction(&entry.method) {
			policy.push_transaction(MethodPattern::exact(&entry.method), entry.attribute, Origin::Annotation);
		}
	}
	if let Some(security) = &annotation.security
		&& !policy.has_wildcard_permission()
	{
		apply_security(policy, MethodPattern::wildcard(), security);
	}
	for entry in &annotation.method_security {
		if !policy.has_exact_permission(&entry.method) {
			apply_security(policy, MethodPattern::exact(&entry.method), &entry.security);
		}
	}
}

fn apply_security(policy: &mut MethodPolicyTable, pattern: MethodPattern, security: &SecurityAnnotation) {
	match security {
		SecurityAnnotation::RolesAllowed(roles) => policy.push_permission(pattern, RolePolicy::roles(roles.iter().cloned()), Origin::Annotation),
		SecurityAnnotation::PermitAll => policy.push_permission(pattern, RolePolicy::Unchecked, Origin::Annotation),
		SecurityAnnotation::DenyAll => policy.exclude(pattern),
	}
}

fn binding_from_descriptor(entry: &crate::InterceptorBindingDescriptor) -> InterceptorBinding {
	InterceptorBinding {
		target: if entry.bean == MethodPattern::WILDCARD {
			BindingTarget::AllComponents
		} else {
			BindingTarget::Component(entry.bean.clone())
		},
		interceptors: entry.interceptors.clone(),
		method: entry.method.clone(),
		exclude_default: entry.exclude_default_interceptors,
		exclude_class: entry.exclude_class_interceptors,
		origin: Origin::Descriptor,
	}
}

fn add_annotation_bindings(component: &str, annotation: Option<&AnnotatedClass>, bindings: &mut Vec<InterceptorBinding>) {
	let Some(annotation) = annotation else {
		return;
	};
	let target = BindingTarget::Component(component.to_string());
	let declared_class_level = bindings
		.iter()
		.any(|b| b.origin == Origin::Descriptor && b.target == target && b.method.is_none() && !b.interceptors.is_empty());

	if (!annotation.interceptors.is_empty() && !declared_class_level) || annotation.exclude_default_interceptors {
		bindings.push(InterceptorBinding {
			target: target.clone(),
			interceptors: if declared_class_level { Vec::new() } else { annotation.interceptors.clone() },
			method: None,
			exclude_default: annotation.exclude_default_interceptors,
			exclude_class: false,
			origin: Origin::Annotation,
		});
	}
	for entry in &annotation.method_interceptors {
		let declared = bindings.iter().any(|b| {
			b.origin == Origin::Descriptor && b.target == target && b.method.as_ref().is_some_and(|m| m.is_exactly(&entry.method))
		});
		if declared {
			continue;
		}
		bindings.push(InterceptorBinding {
			target: target.clone(),
			interceptors: entry.interceptors.clone(),
			method: Some(MethodPattern::exact(&entry.method)),
			exclude_default: entry.exclude_default_interceptors,
			exclude_class: entry.exclude_class_interceptors,
			origin: Origin::Annotation,
		});
	}
}

fn collect_interceptors(raw: &RawModule, descriptor: &DescriptorTree, consumed: &[bool]) -> IndexMap<String, InterceptorDecl> {
	let scanned = |class: &str| {
		raw.annotated
			.iter()
			.enumerate()
			.find(|(index, a)| !consumed[*index] && a.class == class && a.is_interceptor())
			.map(|(_, a)| a)
	};
	let from_annotation = |decl: &mut InterceptorDecl, annotation: &AnnotatedClass| {
		fill_option(&mut decl.around_invoke, annotation.around_invoke.as_ref());
		for event in LifecycleEvent::ALL {
			let slot = decl.callbacks.get_mut(event);
			if slot.is_empty() {
				slot.extend(annotation.callbacks_for(event).map(|m| CallbackRef::on_class(&annotation.class, m)));
			}
		}
	};

	let mut interceptors = IndexMap::new();
	for declared in &descriptor.interceptors {
		let mut decl = InterceptorDecl {
			class: declared.class.clone(),
			around_invoke: declared.around_invoke.clone(),
			callbacks: LifecycleCallbacks::default(),
		};
		for event in LifecycleEvent::ALL {
			*decl.callbacks.get_mut(event) = declared.callbacks(event).iter().map(|m| CallbackRef::on_class(&declared.class, m)).collect();
		}
		if let Some(annotation) = scanned(&declared.class) {
			from_annotation(&mut decl, annotation);
		}
		interceptors.insert(declared.class.clone(), decl);
	}
	for (index, annotation) in raw.annotated.iter().enumerate() {
		if consumed[index] || !annotation.is_interceptor() || interceptors.contains_key(&annotation.class) {
			continue;
		}
		let mut decl = InterceptorDecl {
			class: annotation.class.clone(),
			..InterceptorDecl::default()
		};
		from_annotation(&mut decl, annotation);
		interceptors.insert(annotation.class.clone(), decl);
	}
	interceptors
}

fn check_references(
	descriptor: &DescriptorTree,
	bindings: &[InterceptorBinding],
	interceptors: &IndexMap<String, InterceptorDecl>,
	names: &FxHashSet<&str>,
	problems: &mut Problems<'_>,
) {
	let assembly = &descriptor.assembly;
	let referenced = assembly
		.container_transactions
		.iter()
		.map(|e| ("container-transaction", e.bean.as_str()))
		.chain(assembly.method_permissions.iter().map(|e| ("method-permission", e.bean.as_str())))
		.chain(assembly.exclude_list.iter().map(|e| ("exclude-list", e.bean.as_str())))
		.chain(descriptor.deployments.iter().map(|e| ("deployment plan", e.bean.as_str())))
		.chain(bindings.iter().filter_map(|b| match &b.target {
			BindingTarget::Component(name) => Some(("interceptor-binding", name.as_str())),
			BindingTarget::AllComponents => None,
		}));

	for (context, name) in referenced {
		if !names.contains(name) {
			problems.push(
				None,
				ProblemKind::UnknownComponent {
					context: context.to_string(),
					name: name.to_string(),
					suggestion: suggest(name, names.iter().copied()),
				},
			);
		}
	}

	for binding in bindings {
		let component = match &binding.target {
			BindingTarget::Component(name) => Some(name.as_str()),
			BindingTarget::AllComponents => None,
		};
		for class in &binding.interceptors {
			if !interceptors.contains_key(class) {
				problems.push(component, ProblemKind::UnknownInterceptor { class: class.clone() });
			}
		}
	}
}
