use std::sync::Arc;

use caisson_assembly::{ResolvedComponent, ResolvedModule};
use caisson_metadata::{BindingTarget, ClassLoader, ComponentDeclaration, LoadedClass, MergedModule};
use caisson_model::{
	CallbackRef, CmpVersion, ComponentKind, DeploymentError, DeploymentWarning, InterfaceKind, LifecycleEvent, MethodRef, MethodSignature, Problem,
	ProblemKind,
};
use caisson_settings::JndiNameFormat;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{BoundMethod, DispatchEntry, ExposedInterface, Mapping, MethodTarget, RuntimeDescriptor, map_method};
use crate::naming::assign_jndi_names;

/// Builds the runtime descriptors of a resolved module.
///
/// Every missing class, implementation method or callback of every component
/// is reported; the module yields descriptors only when there are none.
pub fn build_descriptors(
	resolved: &ResolvedModule,
	loader: &dyn ClassLoader,
	jndi_format: &JndiNameFormat,
) -> Result<(Vec<RuntimeDescriptor>, Vec<DeploymentWarning>), DeploymentError> {
	let module = resolved.module.as_ref();
	let _span = tracing::trace_span!("build_descriptors", module = %module.module_id).entered();
	let mut builder = Builder {
		module,
		loader,
		classes: FxHashMap::default(),
		problems: Vec::new(),
		warnings: Vec::new(),
	};

	let descriptors: Vec<RuntimeDescriptor> = resolved
		.iter()
		.filter_map(|(declaration, component)| builder.component(declaration, component, jndi_format))
		.collect();

	if !builder.problems.is_empty() {
		return Err(DeploymentError {
			module: module.module_id.clone(),
			path: module.path.clone(),
			problems: builder.problems,
		});
	}
	tracing::debug!(module = %module.module_id, components = descriptors.len(), "built runtime descriptors");
	Ok((descriptors, builder.warnings))
}

struct Builder<'a> {
	module: &'a MergedModule,
	loader: &'a dyn ClassLoader,
	/// Loaded classes; `None` records a class already reported missing.
	classes: FxHashMap<String, Option<Arc<LoadedClass>>>,
	problems: Vec<Problem>,
	warnings: Vec<DeploymentWarning>,
}

impl<'a> Builder<'a> {
	fn problem(&mut self, component: &str, kind: ProblemKind) {
		let problem = Problem {
			module: self.module.module_id.clone(),
			path: self.module.path.clone(),
			component: Some(component.to_string()),
			kind,
		};
		if !self.problems.contains(&problem) {
			self.problems.push(problem);
		}
	}

	fn load(&mut self, component: &str, class: &str) -> Option<Arc<LoadedClass>> {
		if let Some(cached) = self.classes.get(class) {
			return cached.clone();
		}
		let loaded = match self.loader.load_class(class) {
			Ok(loaded) => Some(loaded),
			Err(_) => {
				self.problem(component, ProblemKind::ClassNotFound { class: class.to_string() });
				None
			}
		};
		self.classes.insert(class.to_string(), loaded.clone());
		loaded
	}

	fn component(&mut self, declaration: &ComponentDeclaration, resolved: &ResolvedComponent, jndi_format: &JndiNameFormat) -> Option<RuntimeDescriptor> {
		let reported = self.problems.len();
		let bean = self.load(&declaration.name, &declaration.class)?;

		let mut interfaces = Vec::new();
		let mut dispatch = FxHashMap::default();
		for (slot, interface_class) in declaration.interfaces.iter() {
			interfaces.push(ExposedInterface {
				kind: slot,
				class: interface_class.to_string(),
				jndi_name: None,
			});
			let Some(interface) = self.load(&declaration.name, interface_class) else {
				continue;
			};
			for signature in &interface.info().methods {
				let Some(target) = self.target(declaration, &bean, slot, interface_class, signature) else {
					continue;
				};
				let interceptors = match target {
					MethodTarget::Bean(_) if !slot.is_home() => self.around_invoke_chain(declaration, &bean, slot, signature),
					_ => SmallVec::new(),
				};
				let method = MethodRef::new(slot, signature.clone());
				let entry = DispatchEntry {
					method: method.clone(),
					target,
					attribute: declaration.policy.transaction_attribute(slot, signature),
					security: declaration.policy.method_security(slot, signature),
					interceptors,
				};
				dispatch.insert(method, entry);
			}
		}
		let callbacks = self.callbacks(declaration);

		if self.problems.len() > reported {
			return None;
		}

		let warnings = assign_jndi_names(jndi_format, &self.module.module_id, declaration, &resolved.deployment_id, &mut interfaces);
		self.warnings.extend(warnings);

		Some(RuntimeDescriptor {
			deployment_id: resolved.deployment_id.clone(),
			name: declaration.name.clone(),
			module_id: self.module.module_id.clone(),
			kind: declaration.kind,
			transaction_type: declaration.transaction_type,
			container_id: resolved.container_id.clone(),
			class: declaration.class.clone(),
			policy: declaration.policy.clone(),
			interfaces,
			resource_links: resolved.resource_links.clone(),
			ejb_links: resolved.ejb_links.clone(),
			dispatch,
			callbacks,
			application_exceptions: self.module.application_exceptions.iter().map(|e| (e.class.clone(), e.rollback)).collect(),
			role_links: resolved.role_links.iter().map(|l| (l.reference.clone(), l.role.clone())).collect(),
		})
	}

	fn target(
		&mut self,
		declaration: &ComponentDeclaration,
		bean: &LoadedClass,
		slot: InterfaceKind,
		interface_class: &str,
		signature: &MethodSignature,
	) -> Option<MethodTarget> {
		match map_method(declaration.kind, slot, signature) {
			Mapping::Bean(expected) => self.bind(declaration, bean, interface_class, signature, expected).map(MethodTarget::Bean),
			Mapping::Create { create, post_create } => {
				let create = self.bind(declaration, bean, interface_class, signature, create)?;
				let post_create = bean.handler(&post_create).map(|handler| BoundMethod {
					class: bean.name().to_string(),
					method: post_create,
					handler: Arc::clone(handler),
				});
				Some(MethodTarget::Create { create, post_create })
			}
			Mapping::Finder => match declaration.query(signature) {
				Some(query) => Some(MethodTarget::Finder { query: query.query.clone() }),
				None => {
					let version = match declaration.kind {
						ComponentKind::EntityCmp { version } => version,
						_ => CmpVersion::V2,
					};
					self.problem(
						&declaration.name,
						ProblemKind::UnresolvableFinder {
							method: signature.clone(),
							version,
						},
					);
					None
				}
			},
			Mapping::Container(operation) => Some(MethodTarget::Container(operation)),
		}
	}

	fn bind(
		&mut self,
		declaration: &ComponentDeclaration,
		bean: &LoadedClass,
		interface_class: &str,
		signature: &MethodSignature,
		expected: MethodSignature,
	) -> Option<BoundMethod> {
		let Some(handler) = bean.handler(&expected) else {
			self.problem(
				&declaration.name,
				ProblemKind::MissingImplementation {
					interface_class: interface_class.to_string(),
					method: signature.clone(),
					expected,
				},
			);
			return None;
		};
		Some(BoundMethod {
			class: bean.name().to_string(),
			method: expected,
			handler: Arc::clone(handler),
		})
	}

	/// Binds a method referenced by name only, reporting `missing` when absent.
	fn bind_named(&mut self, component: &str, class: &str, method: &str, missing: impl FnOnce() -> ProblemKind) -> Option<BoundMethod> {
		let loaded = self.load(component, class)?;
		match loaded.handler_named(method) {
			Some((signature, handler)) => Some(BoundMethod {
				class: class.to_string(),
				method: signature.clone(),
				handler: Arc::clone(handler),
			}),
			None => {
				self.problem(component, missing());
				None
			}
		}
	}

	fn around_invoke_chain(
		&mut self,
		declaration: &ComponentDeclaration,
		bean: &LoadedClass,
		slot: InterfaceKind,
		signature: &MethodSignature,
	) -> SmallVec<[BoundMethod; 4]> {
		let module = self.module;
		let mut chain = SmallVec::new();
		for class in interceptor_classes(module, &declaration.name, Some((slot, signature))) {
			let Some(method) = module.interceptors.get(class).and_then(|i| i.around_invoke.as_deref()) else {
				continue;
			};
			let missing = || ProblemKind::MissingAroundInvoke {
				class: class.to_string(),
				method: method.to_string(),
			};
			if let Some(bound) = self.bind_named(&declaration.name, class, method, missing) {
				chain.push(bound);
			}
		}
		if let Some(method) = &declaration.around_invoke {
			let missing = || ProblemKind::MissingAroundInvoke {
				class: bean.name().to_string(),
				method: method.clone(),
			};
			if let Some(bound) = self.bind_named(&declaration.name, bean.name(), method, missing) {
				chain.push(bound);
			}
		}
		chain
	}

	/// Callback lists per event: default interceptors, class interceptors, bean.
	fn callbacks(&mut self, declaration: &ComponentDeclaration) -> FxHashMap<LifecycleEvent, Vec<BoundMethod>> {
		let module = self.module;
		let classes = interceptor_classes(module, &declaration.name, None);
		let mut callbacks = FxHashMap::default();
		for event in LifecycleEvent::ALL {
			let interceptor_refs = classes
				.iter()
				.filter_map(|class| module.interceptors.get(*class))
				.flat_map(|interceptor| interceptor.callbacks.get(event).iter().map(move |cb| (cb, interceptor.class.as_str())));
			let bean_refs = declaration.callbacks.get(event).iter().map(|cb| (cb, declaration.class.as_str()));

			let refs: Vec<(&CallbackRef, &str)> = interceptor_refs.chain(bean_refs).collect();
			let mut bound = Vec::with_capacity(refs.len());
			for (callback, owner) in refs {
				let class = callback.class.as_deref().unwrap_or(owner);
				let missing = || ProblemKind::MissingCallback {
					event,
					class: class.to_string(),
					method: callback.method.clone(),
				};
				if let Some(method) = self.bind_named(&declaration.name, class, &callback.method, missing) {
					bound.push(method);
				}
			}
			if !bound.is_empty() {
				callbacks.insert(event, bound);
			}
		}
		callbacks
	}
}

/// Interceptor classes applying to a component, or to one of its methods,
/// outermost first and without repeats.
///
/// Default interceptors come first unless excluded at class or method level,
/// then class-level ones unless excluded at method level, then method-level ones.
pub(crate) fn interceptor_classes<'m>(module: &'m MergedModule, component: &str, method: Option<(InterfaceKind, &MethodSignature)>) -> Vec<&'m str> {
	let mut defaults = Vec::new();
	let mut class_level = Vec::new();
	let mut method_level = Vec::new();
	let mut exclude_default = false;
	let mut exclude_class = false;

	for binding in module.bindings_for(component) {
		let classes = binding.interceptors.iter().map(String::as_str);
		match (&binding.target, &binding.method) {
			(_, Some(pattern)) => {
				let Some((slot, signature)) = method else {
					continue;
				};
				if pattern.matches(slot, signature).is_some() {
					method_level.extend(classes);
					exclude_default |= binding.exclude_default;
					exclude_class |= binding.exclude_class;
				}
			}
			(BindingTarget::AllComponents, None) => defaults.extend(classes),
			(BindingTarget::Component(_), None) => {
				class_level.extend(classes);
				exclude_default |= binding.exclude_default;
			}
		}
	}

	let mut chain: Vec<&str> = Vec::new();
	let groups = [(!exclude_default).then_some(defaults), (!exclude_class).then_some(class_level), Some(method_level)];
	for class in groups.into_iter().flatten().flatten() {
		if !chain.contains(&class) {
			chain.push(class);
		}
	}
	chain
}
