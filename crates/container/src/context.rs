//! Per-thread invocation context.
//!
//! # Purpose
//!
//! Carries "which component, which instance, which caller, which phase" from
//! the dispatcher to the context operations business code calls
//! ([`caller_principal`], [`is_caller_in_role`], [`user_transaction`],
//! [`set_rollback_only`], [`get_rollback_only`], [`primary_key`]).
//!
//! # Invariants
//!
//! * A context is only reachable through a live [`ContextGuard`]; dropping the
//!   guard restores the enclosing context, also while unwinding.
//! * Legality is decided from the phase, the component kind and the
//!   transaction type before any collaborator is called.
//! * Contexts never cross threads.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use bitflags::bitflags;
use caisson_model::{ComponentKind, Principal, SecurityIdentity, TransactionType, Value};

use crate::descriptor::RuntimeDescriptor;
use crate::tx::{TransactionManager, UserTransaction};
use crate::{ContextError, IllegalState, SecurityService};

/// Lifecycle phase of the active invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	Injection,
	PostConstruct,
	Create,
	PostCreate,
	Business,
	AfterBegin,
	BeforeCompletion,
	AfterCompletion,
	Timeout,
	Activate,
	Passivate,
	Load,
	Store,
	Remove,
	PreDestroy,
}

bitflags! {
	/// A set of [`Phase`]s.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct PhaseSet: u16 {
		const INJECTION = 1 << 0;
		const POST_CONSTRUCT = 1 << 1;
		const CREATE = 1 << 2;
		const POST_CREATE = 1 << 3;
		const BUSINESS = 1 << 4;
		const AFTER_BEGIN = 1 << 5;
		const BEFORE_COMPLETION = 1 << 6;
		const AFTER_COMPLETION = 1 << 7;
		const TIMEOUT = 1 << 8;
		const ACTIVATE = 1 << 9;
		const PASSIVATE = 1 << 10;
		const LOAD = 1 << 11;
		const STORE = 1 << 12;
		const REMOVE = 1 << 13;
		const PRE_DESTROY = 1 << 14;
	}
}

impl PhaseSet {
	/// Phases that run with a transaction context.
	pub const TRANSACTIONAL: Self = Self::BUSINESS
		.union(Self::AFTER_BEGIN)
		.union(Self::BEFORE_COMPLETION)
		.union(Self::TIMEOUT)
		.union(Self::CREATE)
		.union(Self::POST_CREATE)
		.union(Self::REMOVE)
		.union(Self::LOAD)
		.union(Self::STORE);
}

impl Phase {
	pub const fn as_set(self) -> PhaseSet {
		match self {
			Self::Injection => PhaseSet::INJECTION,
			Self::PostConstruct => PhaseSet::POST_CONSTRUCT,
			Self::Create => PhaseSet::CREATE,
			Self::PostCreate => PhaseSet::POST_CREATE,
			Self::Business => PhaseSet::BUSINESS,
			Self::AfterBegin => PhaseSet::AFTER_BEGIN,
			Self::BeforeCompletion => PhaseSet::BEFORE_COMPLETION,
			Self::AfterCompletion => PhaseSet::AFTER_COMPLETION,
			Self::Timeout => PhaseSet::TIMEOUT,
			Self::Activate => PhaseSet::ACTIVATE,
			Self::Passivate => PhaseSet::PASSIVATE,
			Self::Load => PhaseSet::LOAD,
			Self::Store => PhaseSet::STORE,
			Self::Remove => PhaseSet::REMOVE,
			Self::PreDestroy => PhaseSet::PRE_DESTROY,
		}
	}
}

impl std::fmt::Display for Phase {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			Self::Injection => "injection",
			Self::PostConstruct => "post-construct",
			Self::Create => "create",
			Self::PostCreate => "post-create",
			Self::Business => "business method",
			Self::AfterBegin => "after-begin",
			Self::BeforeCompletion => "before-completion",
			Self::AfterCompletion => "after-completion",
			Self::Timeout => "timeout",
			Self::Activate => "activation",
			Self::Passivate => "passivation",
			Self::Load => "load",
			Self::Store => "store",
			Self::Remove => "remove",
			Self::PreDestroy => "pre-destroy",
		};
		f.write_str(label)
	}
}

/// Context operations whose legality depends on the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
	CallerPrincipal,
	IsCallerInRole,
	UserTransaction,
	SetRollbackOnly,
	GetRollbackOnly,
	PrimaryKey,
}

impl Operation {
	/// Phases in which the operation is legal for a component of this kind.
	///
	/// An empty set means the operation is never available to such components.
	pub fn legal_phases(self, kind: ComponentKind, transaction_type: TransactionType) -> PhaseSet {
		let pooled = matches!(kind, ComponentKind::Stateless | ComponentKind::MessageDriven);
		let caller = if pooled {
			PhaseSet::all() - PhaseSet::INJECTION - PhaseSet::POST_CONSTRUCT - PhaseSet::PRE_DESTROY
		} else {
			PhaseSet::all() - PhaseSet::INJECTION
		};
		match self {
			Self::CallerPrincipal => caller,
			Self::IsCallerInRole if kind == ComponentKind::MessageDriven => PhaseSet::empty(),
			Self::IsCallerInRole => caller,
			Self::UserTransaction => match transaction_type {
				TransactionType::Bean => PhaseSet::all() - PhaseSet::INJECTION,
				TransactionType::Container => PhaseSet::empty(),
			},
			Self::SetRollbackOnly | Self::GetRollbackOnly => match transaction_type {
				TransactionType::Container => PhaseSet::TRANSACTIONAL,
				TransactionType::Bean => PhaseSet::empty(),
			},
			Self::PrimaryKey if kind.is_entity() => PhaseSet::all() - PhaseSet::INJECTION - PhaseSet::CREATE,
			Self::PrimaryKey => PhaseSet::empty(),
		}
	}

	/// Whether the operation additionally needs an active transaction.
	pub const fn needs_transaction(self) -> bool {
		matches!(self, Self::SetRollbackOnly | Self::GetRollbackOnly)
	}
}

impl std::fmt::Display for Operation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			Self::CallerPrincipal => "getCallerPrincipal",
			Self::IsCallerInRole => "isCallerInRole",
			Self::UserTransaction => "getUserTransaction",
			Self::SetRollbackOnly => "setRollbackOnly",
			Self::GetRollbackOnly => "getRollbackOnly",
			Self::PrimaryKey => "getPrimaryKey",
		};
		f.write_str(label)
	}
}

/// Everything a context operation may consult.
pub struct InvocationContext {
	pub descriptor: Arc<RuntimeDescriptor>,
	pub primary_key: Option<Value>,
	pub identity: SecurityIdentity,
	pub phase: Phase,
	pub(crate) transactions: Arc<dyn TransactionManager>,
	pub(crate) security: Arc<dyn SecurityService>,
}

impl InvocationContext {
	/// Decides legality of `operation` without touching any collaborator.
	pub fn check(&self, operation: Operation) -> Result<(), ContextError> {
		let legal = operation.legal_phases(self.descriptor.kind, self.descriptor.transaction_type);
		if legal.is_empty() {
			let reason = IllegalState::Unsupported {
				kind: self.descriptor.kind,
				transaction_type: self.descriptor.transaction_type,
			};
			return Err(ContextError::illegal(operation, reason));
		}
		if !legal.contains(self.phase.as_set()) {
			return Err(ContextError::illegal(operation, IllegalState::Phase { phase: self.phase }));
		}
		Ok(())
	}
}

impl std::fmt::Debug for InvocationContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InvocationContext")
			.field("deployment_id", &self.descriptor.deployment_id)
			.field("primary_key", &self.primary_key)
			.field("identity", &self.identity)
			.field("phase", &self.phase)
			.finish_non_exhaustive()
	}
}

thread_local! {
	static STACK: RefCell<Vec<Rc<InvocationContext>>> = const { RefCell::new(Vec::new()) };
}

/// Keeps an [`InvocationContext`] current for the calling thread.
///
/// Guards nest: dropping one restores the context that was current before it.
#[must_use = "the context is cleared when the guard is dropped"]
pub struct ContextGuard {
	depth: usize,
	_thread_bound: PhantomData<*const ()>,
}

impl ContextGuard {
	pub fn enter(context: InvocationContext) -> Self {
		tracing::trace!(deployment_id = %context.descriptor.deployment_id, phase = %context.phase, "entering invocation context");
		let depth = STACK.with(|stack| {
			let mut stack = stack.borrow_mut();
			stack.push(Rc::new(context));
			stack.len()
		});
		Self {
			depth,
			_thread_bound: PhantomData,
		}
	}
}

impl Drop for ContextGuard {
	fn drop(&mut self) {
		STACK.with(|stack| stack.borrow_mut().truncate(self.depth - 1));
	}
}

/// The context of the innermost active invocation.
pub fn current() -> Option<Rc<InvocationContext>> {
	STACK.with(|stack| stack.borrow().last().cloned())
}

/// Current context after the legality check for `operation`.
fn checked(operation: Operation) -> Result<Rc<InvocationContext>, ContextError> {
	let context = current().ok_or(ContextError::illegal(operation, IllegalState::NoActiveInvocation))?;
	context.check(operation)?;
	if operation.needs_transaction() && !context.transactions.status().is_active() {
		return Err(ContextError::illegal(operation, IllegalState::NoTransaction));
	}
	Ok(context)
}

pub fn caller_principal() -> Result<Principal, ContextError> {
	let context = checked(Operation::CallerPrincipal)?;
	Ok(context.security.translate(&context.identity, "caller"))
}

/// Checks the caller against a role name used in code; role refs are followed
/// to the role they link to.
pub fn is_caller_in_role(role: &str) -> Result<bool, ContextError> {
	let context = checked(Operation::IsCallerInRole)?;
	let linked = context.descriptor.role_link(role).unwrap_or(role);
	Ok(context.security.is_caller_authorized(&context.identity, &[linked]))
}

pub fn user_transaction() -> Result<UserTransaction, ContextError> {
	let context = checked(Operation::UserTransaction)?;
	Ok(UserTransaction::new(Arc::clone(&context.transactions)))
}

pub fn set_rollback_only() -> Result<(), ContextError> {
	let context = checked(Operation::SetRollbackOnly)?;
	context.transactions.set_rollback_only()?;
	Ok(())
}

pub fn get_rollback_only() -> Result<bool, ContextError> {
	let context = checked(Operation::GetRollbackOnly)?;
	Ok(context.transactions.status() == crate::TxStatus::MarkedRollback)
}

pub fn primary_key() -> Result<Value, ContextError> {
	let context = checked(Operation::PrimaryKey)?;
	Ok(context.primary_key.clone().unwrap_or(Value::Null))
}

#[cfg(test)]
mod invariants;
