//! Loaded classes and the class-loader seam.
//!
//! Class loading itself is external. The container only needs to know which
//! methods a class declares and how to run them, so a [`LoadedClass`] is a
//! name, a method list and a table of [`MethodHandler`]s.

use std::sync::Arc;

use caisson_model::{BeanFault, MethodSignature, Value};
use rustc_hash::FxHashMap;

/// Executable body of one class method.
pub type MethodHandler = Arc<dyn Fn(&mut CallFrame<'_>) -> Result<Value, BeanFault> + Send + Sync>;

/// Continuation handed to around-invoke interceptors: arguments and instance state.
pub type Proceed<'a> = dyn FnMut(Vec<Value>, &mut Value) -> Result<Value, BeanFault> + 'a;

/// Arguments and environment of a single handler call.
pub struct CallFrame<'a> {
	/// Signature of the method being run (the implementation method, not the interface method).
	pub method: &'a MethodSignature,
	pub args: Vec<Value>,
	/// Per-instance state of stateful and entity components; `Null` for pooled instances.
	pub state: &'a mut Value,
	pub primary_key: Option<&'a Value>,
	proceed: Option<&'a mut Proceed<'a>>,
}

impl<'a> CallFrame<'a> {
	pub fn new(method: &'a MethodSignature, args: Vec<Value>, state: &'a mut Value, primary_key: Option<&'a Value>) -> Self {
		Self {
			method,
			args,
			state,
			primary_key,
			proceed: None,
		}
	}

	/// Frame for an around-invoke handler; `proceed` runs the rest of the chain.
	pub fn intercepting(
		method: &'a MethodSignature,
		args: Vec<Value>,
		state: &'a mut Value,
		primary_key: Option<&'a Value>,
		proceed: &'a mut Proceed<'a>,
	) -> Self {
		Self {
			method,
			args,
			state,
			primary_key,
			proceed: Some(proceed),
		}
	}

	pub fn arg(&self, index: usize) -> Option<&Value> {
		self.args.get(index)
	}

	/// Continues to the next interceptor or the bean method with the current arguments.
	///
	/// Outside an around-invoke call there is nothing to proceed to; that is a
	/// system fault of the calling code.
	pub fn proceed(&mut self) -> Result<Value, BeanFault> {
		let Self {
			method, args, state, proceed, ..
		} = self;
		match proceed.as_mut() {
			Some(next) => next(args.clone(), &mut **state),
			None => Err(BeanFault::system_of("IllegalStateException", format!("{method} is not an around-invoke call"))),
		}
	}
}

impl std::fmt::Debug for CallFrame<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CallFrame")
			.field("method", &self.method)
			.field("args", &self.args)
			.field("primary_key", &self.primary_key)
			.field("intercepting", &self.proceed.is_some())
			.finish_non_exhaustive()
	}
}

/// Declared shape of a class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassInfo {
	pub name: String,
	pub methods: Vec<MethodSignature>,
	/// Directly implemented interfaces, in declaration order.
	pub interfaces: Vec<String>,
}

impl ClassInfo {
	pub fn declares(&self, signature: &MethodSignature) -> bool {
		self.methods.contains(signature)
	}

	/// Methods with the given name, in declaration order.
	pub fn named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a MethodSignature> + use<'a, 'n> {
		self.methods.iter().filter(move |m| m.name == name)
	}
}

/// A class as the container sees it.
pub struct LoadedClass {
	info: ClassInfo,
	handlers: FxHashMap<MethodSignature, MethodHandler>,
}

impl LoadedClass {
	pub fn builder(name: impl Into<String>) -> LoadedClassBuilder {
		LoadedClassBuilder {
			info: ClassInfo {
				name: name.into(),
				..ClassInfo::default()
			},
			handlers: FxHashMap::default(),
		}
	}

	pub fn name(&self) -> &str {
		&self.info.name
	}

	pub fn info(&self) -> &ClassInfo {
		&self.info
	}

	pub fn handler(&self, signature: &MethodSignature) -> Option<&MethodHandler> {
		self.handlers.get(signature)
	}

	/// Handler of the first declared method called `name`, whatever its parameters.
	///
	/// Lifecycle callbacks and around-invoke methods are referenced by name only.
	pub fn handler_named(&self, name: &str) -> Option<(&MethodSignature, &MethodHandler)> {
		self.info.named(name).find_map(|sig| self.handlers.get(sig).map(|handler| (sig, handler)))
	}
}

impl std::fmt::Debug for LoadedClass {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LoadedClass")
			.field("info", &self.info)
			.field("handlers", &self.handlers.len())
			.finish()
	}
}

pub struct LoadedClassBuilder {
	info: ClassInfo,
	handlers: FxHashMap<MethodSignature, MethodHandler>,
}

impl LoadedClassBuilder {
	/// Declares a method without a body (interface classes).
	pub fn declare(mut self, signature: MethodSignature) -> Self {
		if !self.info.methods.contains(&signature) {
			self.info.methods.push(signature);
		}
		self
	}

	/// Declares a method and its body.
	pub fn method<F>(mut self, signature: MethodSignature, handler: F) -> Self
	where
		F: Fn(&mut CallFrame<'_>) -> Result<Value, BeanFault> + Send + Sync + 'static,
	{
		self = self.declare(signature.clone());
		self.handlers.insert(signature, Arc::new(handler));
		self
	}

	pub fn implements(mut self, interface: impl Into<String>) -> Self {
		self.info.interfaces.push(interface.into());
		self
	}

	pub fn build(self) -> LoadedClass {
		LoadedClass {
			info: self.info,
			handlers: self.handlers,
		}
	}
}

/// Raised when a class name cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("class '{0}' not found")]
pub struct ClassNotFound(pub String);

/// Resolves class names to loaded classes.
pub trait ClassLoader: Send + Sync {
	fn load_class(&self, name: &str) -> Result<Arc<LoadedClass>, ClassNotFound>;
}

/// In-memory class loader.
#[derive(Debug, Default)]
pub struct MapClassLoader {
	classes: FxHashMap<String, Arc<LoadedClass>>,
}

impl MapClassLoader {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, class: LoadedClass) {
		self.classes.insert(class.name().to_string(), Arc::new(class));
	}

	pub fn with(mut self, class: LoadedClass) -> Self {
		self.insert(class);
		self
	}
}

impl ClassLoader for MapClassLoader {
	fn load_class(&self, name: &str) -> Result<Arc<LoadedClass>, ClassNotFound> {
		self.classes.get(name).cloned().ok_or_else(|| ClassNotFound(name.to_string()))
	}
}
