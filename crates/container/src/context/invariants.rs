use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use caisson_model::{CmpVersion, ComponentKind, SecurityIdentity, TransactionType, Value};

use super::{ContextGuard, InvocationContext, Operation, Phase, caller_principal, current, get_rollback_only, is_caller_in_role, primary_key, set_rollback_only, user_transaction};
use crate::descriptor::RuntimeDescriptor;
use crate::{ContextError, IllegalState, LocalTransactionManager, StaticSecurityService, TransactionManager, TxError, TxHandle, TxStatus};

/// Counts every call that reaches the manager.
#[derive(Default)]
struct RecordingManager {
	inner: LocalTransactionManager,
	calls: AtomicUsize,
}

impl RecordingManager {
	fn record(&self) {
		self.calls.fetch_add(1, Ordering::SeqCst);
	}
}

impl TransactionManager for RecordingManager {
	fn begin(&self) -> Result<TxHandle, TxError> {
		self.record();
		self.inner.begin()
	}

	fn commit(&self) -> Result<(), TxError> {
		self.record();
		self.inner.commit()
	}

	fn rollback(&self) -> Result<(), TxError> {
		self.record();
		self.inner.rollback()
	}

	fn set_rollback_only(&self) -> Result<(), TxError> {
		self.record();
		self.inner.set_rollback_only()
	}

	fn status(&self) -> TxStatus {
		self.record();
		self.inner.status()
	}

	fn suspend(&self) -> Option<TxHandle> {
		self.record();
		self.inner.suspend()
	}

	fn resume(&self, tx: TxHandle) -> Result<(), TxError> {
		self.record();
		self.inner.resume(tx)
	}
}

fn context(descriptor: RuntimeDescriptor, phase: Phase, transactions: Arc<dyn TransactionManager>) -> InvocationContext {
	InvocationContext {
		descriptor: Arc::new(descriptor),
		primary_key: None,
		identity: SecurityIdentity::user("alice", ["clerk"]),
		phase,
		transactions,
		security: Arc::new(StaticSecurityService),
	}
}

fn local() -> Arc<dyn TransactionManager> {
	Arc::new(LocalTransactionManager::new())
}

/// Must refuse `setRollbackOnly` to bean-managed components without calling
/// the transaction manager.
///
/// * Enforced in: `Operation::legal_phases`, `InvocationContext::check`
/// * Failure symptom: a bean-managed component marks a transaction it does not own.
#[cfg_attr(test, test)]
pub(crate) fn test_bean_managed_set_rollback_only_is_illegal() {
	let manager = Arc::new(RecordingManager::default());
	let descriptor = RuntimeDescriptor::bare("PaymentBean", ComponentKind::Stateless, TransactionType::Bean);
	let _guard = ContextGuard::enter(context(descriptor, Phase::Business, manager.clone()));

	let error = set_rollback_only().unwrap_err();

	assert!(matches!(
		error,
		ContextError::IllegalState {
			operation: Operation::SetRollbackOnly,
			reason: IllegalState::Unsupported { .. },
		}
	));
	assert_eq!(manager.calls.load(Ordering::SeqCst), 0);
}

/// Must refuse every context operation when no invocation is active.
///
/// * Enforced in: `checked`
/// * Failure symptom: code running outside a call sees a stale or foreign context.
#[cfg_attr(test, test)]
pub(crate) fn test_no_active_invocation() {
	assert!(current().is_none());
	assert!(matches!(
		caller_principal(),
		Err(ContextError::IllegalState {
			reason: IllegalState::NoActiveInvocation,
			..
		})
	));
	assert!(is_caller_in_role("clerk").is_err());
	assert!(user_transaction().is_err());
	assert!(primary_key().is_err());
}

/// Must refuse caller identity during dependency injection.
///
/// * Enforced in: `Operation::legal_phases`
/// * Failure symptom: injection code observes a caller that does not exist yet.
#[cfg_attr(test, test)]
pub(crate) fn test_caller_principal_illegal_during_injection() {
	let descriptor = RuntimeDescriptor::bare("CartBean", ComponentKind::Stateful, TransactionType::Container);
	{
		let _guard = ContextGuard::enter(context(descriptor, Phase::Injection, local()));
		assert!(matches!(
			caller_principal(),
			Err(ContextError::IllegalState {
				reason: IllegalState::Phase { phase: Phase::Injection },
				..
			})
		));
	}

	let descriptor = RuntimeDescriptor::bare("CartBean", ComponentKind::Stateful, TransactionType::Container);
	let _guard = ContextGuard::enter(context(descriptor, Phase::Business, local()));
	assert_eq!(caller_principal().map(|p| p.name), Ok("alice".to_string()));
}

/// Must never offer role checks to message-driven components.
///
/// * Enforced in: `Operation::legal_phases`
/// * Failure symptom: a listener authorizes against a caller that has no identity.
#[cfg_attr(test, test)]
pub(crate) fn test_message_driven_has_no_role_checks() {
	let descriptor = RuntimeDescriptor::bare("AuditListener", ComponentKind::MessageDriven, TransactionType::Container);
	let _guard = ContextGuard::enter(context(descriptor, Phase::Business, local()));

	assert!(matches!(
		is_caller_in_role("clerk"),
		Err(ContextError::IllegalState {
			operation: Operation::IsCallerInRole,
			reason: IllegalState::Unsupported { .. },
		})
	));
}

/// Must restore the enclosing context when a nested guard drops, including
/// while unwinding.
///
/// * Enforced in: `ContextGuard::drop`
/// * Failure symptom: after a failed nested call the outer call runs as the wrong component.
#[cfg_attr(test, test)]
pub(crate) fn test_guard_restores_outer_context() {
	let outer = RuntimeDescriptor::bare("OrderBean", ComponentKind::Stateless, TransactionType::Container);
	let _outer = ContextGuard::enter(context(outer, Phase::Business, local()));

	{
		let inner = RuntimeDescriptor::bare("InventoryBean", ComponentKind::Stateless, TransactionType::Container);
		let _inner = ContextGuard::enter(context(inner, Phase::Business, local()));
		assert_eq!(current().map(|c| c.descriptor.deployment_id.clone()), Some("InventoryBean".to_string()));
	}
	assert_eq!(current().map(|c| c.descriptor.deployment_id.clone()), Some("OrderBean".to_string()));

	let unwound = std::panic::catch_unwind(|| {
		let inner = RuntimeDescriptor::bare("InventoryBean", ComponentKind::Stateless, TransactionType::Container);
		let _inner = ContextGuard::enter(context(inner, Phase::Business, local()));
		panic!("business method failed");
	});
	assert!(unwound.is_err());
	assert_eq!(current().map(|c| c.descriptor.deployment_id.clone()), Some("OrderBean".to_string()));
}

/// Must check role refs against the role they are linked to.
///
/// * Enforced in: `is_caller_in_role`
/// * Failure symptom: code-level role names bypass the deployer's role mapping.
#[cfg_attr(test, test)]
pub(crate) fn test_role_ref_follows_link() {
	let descriptor = RuntimeDescriptor::bare("OrderBean", ComponentKind::Stateless, TransactionType::Container).with_role_link("approver", "clerk");
	let _guard = ContextGuard::enter(context(descriptor, Phase::Business, local()));

	assert_eq!(is_caller_in_role("approver"), Ok(true));
	assert_eq!(is_caller_in_role("clerk"), Ok(true));
	assert_eq!(is_caller_in_role("admin"), Ok(false));
}

/// Must require an active transaction for rollback-only queries.
///
/// * Enforced in: `checked`
/// * Failure symptom: `getRollbackOnly` reports `false` for a call that has no transaction at all.
#[cfg_attr(test, test)]
pub(crate) fn test_rollback_only_requires_transaction() {
	let manager = local();
	let descriptor = RuntimeDescriptor::bare("OrderBean", ComponentKind::Stateless, TransactionType::Container);
	let _guard = ContextGuard::enter(context(descriptor, Phase::Business, Arc::clone(&manager)));

	assert!(matches!(
		get_rollback_only(),
		Err(ContextError::IllegalState {
			reason: IllegalState::NoTransaction,
			..
		})
	));

	manager.begin().unwrap();
	assert_eq!(get_rollback_only(), Ok(false));
	set_rollback_only().unwrap();
	assert_eq!(get_rollback_only(), Ok(true));
	manager.rollback().unwrap();
}

/// Must expose the primary key to entity components only, and not before create.
///
/// * Enforced in: `Operation::legal_phases`
/// * Failure symptom: session components read a meaningless key, or entities read one that is not assigned yet.
#[cfg_attr(test, test)]
pub(crate) fn test_primary_key_is_entity_only() {
	{
		let descriptor = RuntimeDescriptor::bare("CartBean", ComponentKind::Stateful, TransactionType::Container);
		let _guard = ContextGuard::enter(context(descriptor, Phase::Business, local()));
		assert!(primary_key().is_err());
	}
	{
		let descriptor = RuntimeDescriptor::bare("CustomerBean", ComponentKind::EntityCmp { version: CmpVersion::V2 }, TransactionType::Container);
		let _guard = ContextGuard::enter(context(descriptor, Phase::Create, local()));
		assert!(primary_key().is_err());
	}
	let descriptor = RuntimeDescriptor::bare("CustomerBean", ComponentKind::EntityCmp { version: CmpVersion::V2 }, TransactionType::Container);
	let mut ctx = context(descriptor, Phase::Business, local());
	ctx.primary_key = Some(Value::from(42));
	let _guard = ContextGuard::enter(ctx);
	assert_eq!(primary_key(), Ok(Value::from(42)));
}

/// Must hand bean-managed components a working user transaction.
///
/// * Enforced in: `user_transaction`
/// * Failure symptom: bean-managed demarcation silently operates on no transaction.
#[cfg_attr(test, test)]
pub(crate) fn test_user_transaction_for_bean_managed() {
	let manager = local();
	let descriptor = RuntimeDescriptor::bare("PaymentBean", ComponentKind::Stateful, TransactionType::Bean);
	let _guard = ContextGuard::enter(context(descriptor, Phase::Business, Arc::clone(&manager)));

	let utx = user_transaction().unwrap();
	utx.begin().unwrap();
	assert_eq!(manager.status(), TxStatus::Active);
	utx.commit().unwrap();
	assert_eq!(manager.status(), TxStatus::NoTransaction);
}
