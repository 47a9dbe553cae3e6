//! Transaction policies applied around a dispatched call.
//!
//! # Container-managed
//!
//! | Attribute | caller tx present | no caller tx |
//! |-----------|-------------------|--------------|
//! | Required | join | begin, commit on exit |
//! | RequiresNew | suspend, begin, commit, resume | begin, commit |
//! | Mandatory | join | `TransactionRequired` |
//! | NotSupported | suspend, run, resume | run |
//! | Never | `TransactionNotAllowed` | run |
//! | Supports | join | run |
//!
//! # Bean-managed
//!
//! The caller's transaction is suspended. A stateful instance gets back the
//! transaction it left open on its previous call. On exit a transaction still
//! open is stashed for a stateful instance and rolled back (with a system
//! error for the caller) for every other kind.
//!
//! # Faults
//!
//! Application faults roll back only when declared with `rollback = true`;
//! system faults always roll back. A system fault in a joined transaction
//! marks it rollback-only and surfaces as `TransactionRolledBack`.

use caisson_model::{BeanFault, ComponentKind, MethodRef, TransactionAttribute, Value};

use super::{FaultClass, TransactionManager, TxHandle};
use crate::InvocationError;
use crate::instances::{InstanceKey, InstanceStore};

/// What [`begin`] did to the thread's transaction association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxScope {
	/// Runs in the caller's transaction.
	Joined,
	/// Runs in a transaction begun for this call.
	Owned { suspended: Option<TxHandle> },
	/// Runs without a transaction.
	Unspecified { suspended: Option<TxHandle> },
	/// The bean demarcates its own transactions.
	BeanManaged { suspended: Option<TxHandle> },
}

/// Applies a container-managed attribute before the call.
pub(crate) fn begin(tm: &dyn TransactionManager, attribute: TransactionAttribute, method: &MethodRef) -> Result<TxScope, InvocationError> {
	let caller = tm.status().is_active();
	let scope = match (attribute, caller) {
		(TransactionAttribute::Required | TransactionAttribute::Mandatory | TransactionAttribute::Supports, true) => TxScope::Joined,
		(TransactionAttribute::Required, false) => {
			tm.begin()?;
			TxScope::Owned { suspended: None }
		}
		(TransactionAttribute::RequiresNew, _) => {
			let suspended = tm.suspend();
			if let Err(error) = tm.begin() {
				resume_quietly(tm, suspended);
				return Err(error.into());
			}
			TxScope::Owned { suspended }
		}
		(TransactionAttribute::Mandatory, false) => return Err(InvocationError::TransactionRequired { method: method.clone() }),
		(TransactionAttribute::NotSupported, _) => TxScope::Unspecified { suspended: tm.suspend() },
		(TransactionAttribute::Never, true) => return Err(InvocationError::TransactionNotAllowed { method: method.clone() }),
		(TransactionAttribute::Never | TransactionAttribute::Supports, false) => TxScope::Unspecified { suspended: None },
	};
	tracing::trace!(%method, %attribute, ?scope, "transaction policy applied");
	Ok(scope)
}

/// Completes a container-managed scope and maps the call outcome.
pub(crate) fn complete(tm: &dyn TransactionManager, scope: TxScope, outcome: Result<Value, BeanFault>, classify: impl Fn(&BeanFault) -> FaultClass) -> Result<Value, InvocationError> {
	let (result, suspended) = match scope {
		TxScope::Joined => (complete_joined(tm, outcome, &classify), None),
		TxScope::Owned { suspended } => (complete_owned(tm, outcome, &classify), suspended),
		TxScope::Unspecified { suspended } | TxScope::BeanManaged { suspended } => (outcome.map_err(|fault| fault_error(fault, &classify)), suspended),
	};
	resume_after(tm, suspended, result)
}

fn complete_joined(tm: &dyn TransactionManager, outcome: Result<Value, BeanFault>, classify: &impl Fn(&BeanFault) -> FaultClass) -> Result<Value, InvocationError> {
	let fault = match outcome {
		Ok(value) => return Ok(value),
		Err(fault) => fault,
	};
	match classify(&fault) {
		FaultClass::Application { rollback: false } => Err(InvocationError::Application(fault)),
		FaultClass::Application { rollback: true } => {
			mark_rollback_quietly(tm);
			Err(InvocationError::Application(fault))
		}
		FaultClass::System => {
			mark_rollback_quietly(tm);
			Err(InvocationError::TransactionRolledBack(fault))
		}
	}
}

fn complete_owned(tm: &dyn TransactionManager, outcome: Result<Value, BeanFault>, classify: &impl Fn(&BeanFault) -> FaultClass) -> Result<Value, InvocationError> {
	match outcome {
		Ok(value) => {
			finish(tm)?;
			Ok(value)
		}
		Err(fault) => match classify(&fault) {
			FaultClass::Application { rollback: false } => {
				finish(tm)?;
				Err(InvocationError::Application(fault))
			}
			FaultClass::Application { rollback: true } => {
				rollback_quietly(tm);
				Err(InvocationError::Application(fault))
			}
			FaultClass::System => {
				rollback_quietly(tm);
				Err(InvocationError::System(fault))
			}
		},
	}
}

/// Commits an owned transaction, or rolls it back when it was marked rollback-only.
fn finish(tm: &dyn TransactionManager) -> Result<(), InvocationError> {
	if tm.status() == super::TxStatus::MarkedRollback {
		tm.rollback()?;
		return Ok(());
	}
	tm.commit()?;
	Ok(())
}

/// Suspends the caller's transaction and restores the instance's own, if any.
pub(crate) fn begin_bean_managed(tm: &dyn TransactionManager, instances: &InstanceStore, instance: Option<&InstanceKey>) -> Result<TxScope, InvocationError> {
	let suspended = tm.suspend();
	if let Some(tx) = instance.and_then(|key| instances.take_transaction(key))
		&& let Err(error) = tm.resume(tx)
	{
		resume_quietly(tm, suspended);
		return Err(error.into());
	}
	Ok(TxScope::BeanManaged { suspended })
}

/// Completes a bean-managed call: stash or roll back what the bean left open.
pub(crate) fn complete_bean_managed(
	tm: &dyn TransactionManager,
	instances: &InstanceStore,
	kind: ComponentKind,
	instance: Option<&InstanceKey>,
	scope: TxScope,
	outcome: Result<Value, BeanFault>,
	classify: impl Fn(&BeanFault) -> FaultClass,
) -> Result<Value, InvocationError> {
	let suspended = match scope {
		TxScope::BeanManaged { suspended } => suspended,
		other => return complete(tm, other, outcome, classify),
	};
	let mut result = outcome.map_err(|fault| fault_error(fault, &classify));

	if tm.status().is_active() {
		let system_failure = matches!(result, Err(InvocationError::System(_)));
		match instance {
			Some(key) if kind == ComponentKind::Stateful && !system_failure => {
				if let Some(tx) = tm.suspend() {
					tracing::trace!(%tx, "stashed bean-managed transaction for the next call");
					instances.stash_transaction(key.clone(), tx);
				}
			}
			_ => {
				rollback_quietly(tm);
				if !system_failure {
					tracing::warn!(%kind, "bean-managed transaction left open; rolled back");
					result = Err(InvocationError::illegal_state(format!(
						"{kind} component returned with an open bean-managed transaction"
					)));
				}
			}
		}
	}
	resume_after(tm, suspended, result)
}

fn fault_error(fault: BeanFault, classify: &impl Fn(&BeanFault) -> FaultClass) -> InvocationError {
	match classify(&fault) {
		FaultClass::Application { .. } => InvocationError::Application(fault),
		FaultClass::System => InvocationError::System(fault),
	}
}

fn resume_after(tm: &dyn TransactionManager, suspended: Option<TxHandle>, result: Result<Value, InvocationError>) -> Result<Value, InvocationError> {
	let Some(tx) = suspended else {
		return result;
	};
	match tm.resume(tx) {
		Ok(()) => result,
		Err(error) if result.is_ok() => Err(error.into()),
		Err(error) => {
			tracing::warn!(%tx, %error, "could not resume caller transaction");
			result
		}
	}
}

fn resume_quietly(tm: &dyn TransactionManager, suspended: Option<TxHandle>) {
	if let Some(tx) = suspended
		&& let Err(error) = tm.resume(tx)
	{
		tracing::warn!(%tx, %error, "could not resume caller transaction");
	}
}

fn rollback_quietly(tm: &dyn TransactionManager) {
	if let Err(error) = tm.rollback() {
		tracing::warn!(%error, "rollback failed");
	}
}

fn mark_rollback_quietly(tm: &dyn TransactionManager) {
	if let Err(error) = tm.set_rollback_only() {
		tracing::warn!(%error, "could not mark caller transaction rollback-only");
	}
}
