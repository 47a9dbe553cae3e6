use caisson_model::{BeanFault, ComponentKind, MethodRef, TransactionType};

use crate::context::{Operation, Phase};
use crate::tx::TxHandle;

/// Failure reported by a [`TransactionManager`](crate::TransactionManager).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
	#[error("no transaction is associated with the current thread")]
	NoTransaction,
	#[error("a transaction is already associated with the current thread")]
	AlreadyActive,
	#[error("transaction {0} is not known to the transaction manager")]
	UnknownTransaction(TxHandle),
	#[error("transaction {0} was marked rollback-only and has been rolled back")]
	RolledBack(TxHandle),
	#[error("transaction manager failure: {0}")]
	Manager(String),
}

/// Why a context operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IllegalState {
	#[error("no invocation is active on this thread")]
	NoActiveInvocation,
	#[error("not available to {transaction_type} {kind} components")]
	Unsupported { kind: ComponentKind, transaction_type: TransactionType },
	#[error("not allowed during {phase}")]
	Phase { phase: Phase },
	#[error("no transaction is active")]
	NoTransaction,
}

/// A context operation was called where it is not legal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
	#[error("{operation} is illegal: {reason}")]
	IllegalState { operation: Operation, reason: IllegalState },
	#[error(transparent)]
	Transaction(#[from] TxError),
}

impl ContextError {
	pub(crate) fn illegal(operation: Operation, reason: IllegalState) -> Self {
		Self::IllegalState { operation, reason }
	}
}

/// Outcome of a failed [`ContainerSystem::invoke`](crate::ContainerSystem::invoke).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvocationError {
	#[error("no component is deployed as '{deployment_id}'")]
	NotDeployed { deployment_id: String },
	#[error("'{deployment_id}' has no method {method}")]
	NoSuchMethod { deployment_id: String, method: MethodRef },
	#[error("caller may not invoke {method} on '{deployment_id}'")]
	AccessDenied { deployment_id: String, method: MethodRef },
	#[error("{method} requires a caller transaction")]
	TransactionRequired { method: MethodRef },
	#[error("{method} must not be called inside a transaction")]
	TransactionNotAllowed { method: MethodRef },
	/// A declared business failure; the transaction outcome followed its rollback flag.
	#[error("application exception {0}")]
	Application(BeanFault),
	#[error("system exception {0}")]
	System(BeanFault),
	/// A system failure inside the caller's transaction, which is now rollback-only.
	#[error("caller transaction rolled back: {0}")]
	TransactionRolledBack(BeanFault),
	#[error(transparent)]
	Transaction(#[from] TxError),
	#[error(transparent)]
	Context(#[from] ContextError),
}

impl InvocationError {
	pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
		Self::System(BeanFault::system_of("IllegalStateException", message))
	}
}
