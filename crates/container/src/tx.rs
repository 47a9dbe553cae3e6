//! Transaction demarcation.
//!
//! # Purpose
//!
//! [`TransactionManager`] is the seam to the external transaction service; its
//! operations act on the transaction associated with the calling thread, the
//! way a JTA manager does. [`LocalTransactionManager`] is an in-memory
//! implementation for embedding and tests.
//!
//! The declarative policies (one per [`TransactionAttribute`]) and the
//! bean-managed policy live in [`policy`].
//!
//! [`TransactionAttribute`]: caisson_model::TransactionAttribute

mod local;
pub(crate) mod policy;

use std::sync::Arc;

pub use local::LocalTransactionManager;

use crate::TxError;

/// Opaque identifier of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHandle(pub u64);

impl std::fmt::Display for TxHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "tx#{}", self.0)
	}
}

/// State of the transaction associated with the current thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
	NoTransaction,
	Active,
	/// Active, but can only roll back.
	MarkedRollback,
}

impl TxStatus {
	/// Returns true while a transaction is associated, marked or not.
	pub const fn is_active(self) -> bool {
		matches!(self, Self::Active | Self::MarkedRollback)
	}
}

/// External transaction service, operating on the calling thread's association.
pub trait TransactionManager: Send + Sync {
	/// Starts a transaction and associates it with the current thread.
	fn begin(&self) -> Result<TxHandle, TxError>;
	/// Commits the associated transaction; a rollback-only one is rolled back
	/// and reported as [`TxError::RolledBack`].
	fn commit(&self) -> Result<(), TxError>;
	fn rollback(&self) -> Result<(), TxError>;
	fn set_rollback_only(&self) -> Result<(), TxError>;
	fn status(&self) -> TxStatus;
	/// Detaches the associated transaction, if any, from the current thread.
	fn suspend(&self) -> Option<TxHandle>;
	/// Re-associates a suspended transaction with the current thread.
	fn resume(&self, tx: TxHandle) -> Result<(), TxError>;
}

/// How a fault affects the transaction it was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultClass {
	Application { rollback: bool },
	System,
}

/// Demarcation handle given to bean-managed components.
#[derive(Clone)]
pub struct UserTransaction {
	manager: Arc<dyn TransactionManager>,
}

impl UserTransaction {
	pub(crate) fn new(manager: Arc<dyn TransactionManager>) -> Self {
		Self { manager }
	}

	pub fn begin(&self) -> Result<TxHandle, TxError> {
		self.manager.begin()
	}

	pub fn commit(&self) -> Result<(), TxError> {
		self.manager.commit()
	}

	pub fn rollback(&self) -> Result<(), TxError> {
		self.manager.rollback()
	}

	pub fn set_rollback_only(&self) -> Result<(), TxError> {
		self.manager.set_rollback_only()
	}

	pub fn status(&self) -> TxStatus {
		self.manager.status()
	}
}

impl std::fmt::Debug for UserTransaction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UserTransaction").field("status", &self.status()).finish()
	}
}
