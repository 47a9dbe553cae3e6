//! Shared fixtures for container integration tests.

use std::sync::Arc;

use caisson_container::{ContainerSystem, LocalTransactionManager, MemoryBinder};
use caisson_metadata::{AnnotatedClass, AnnotatedKind, CallFrame, LoadedClass, LoadedClassBuilder, MapClassLoader};
use caisson_model::{BeanFault, InterfaceKind, MethodRef, MethodSignature, SecurityIdentity, Value};
use caisson_settings::ContainerSystemSettings;

pub fn sig(text: &str) -> MethodSignature {
	text.parse().expect("test signature must parse")
}

/// A method reached through the business-local interface.
pub fn local(method: &str) -> MethodRef {
	MethodRef::new(InterfaceKind::BusinessLocal, sig(method))
}

pub fn noop(_: &mut CallFrame<'_>) -> Result<Value, BeanFault> {
	Ok(Value::Null)
}

/// Interface class declaring `methods`.
pub fn interface(class: &str, methods: &[&str]) -> LoadedClass {
	methods.iter().fold(LoadedClass::builder(class), |builder, m| builder.declare(sig(m))).build()
}

/// Bean class builder with no-op bodies for `methods`.
pub fn implementation(class: &str, methods: &[&str]) -> LoadedClassBuilder {
	methods.iter().fold(LoadedClass::builder(class), |builder, m| builder.method(sig(m), noop))
}

pub fn component(kind: AnnotatedKind, class: &str, local: &str) -> AnnotatedClass {
	let mut annotated = AnnotatedClass::new(class).with_component(kind, None);
	annotated.business_local = vec![local.to_string()];
	annotated
}

pub fn clerk() -> SecurityIdentity {
	SecurityIdentity::user("alice", ["clerk"])
}

/// Maps a refused context operation to the fault business code would raise.
pub fn illegal_state(error: impl std::fmt::Display) -> BeanFault {
	BeanFault::system_of("IllegalStateException", error.to_string())
}

pub struct Fixture {
	pub system: ContainerSystem,
	pub transactions: Arc<LocalTransactionManager>,
	pub binder: Arc<MemoryBinder>,
}

pub fn fixture(loader: MapClassLoader) -> Fixture {
	fixture_with(ContainerSystemSettings::default(), loader)
}

pub fn fixture_with(settings: ContainerSystemSettings, loader: MapClassLoader) -> Fixture {
	let _ = tracing_subscriber::fmt::try_init();
	let transactions = Arc::new(LocalTransactionManager::new());
	let binder = Arc::new(MemoryBinder::new());
	let system = ContainerSystem::new(settings, Arc::new(loader))
		.with_transaction_manager(transactions.clone())
		.with_binder(binder.clone());
	Fixture {
		system,
		transactions,
		binder,
	}
}
