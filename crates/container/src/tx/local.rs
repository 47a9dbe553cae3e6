use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::ThreadId;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{TransactionManager, TxHandle, TxStatus};
use crate::TxError;

#[derive(Default)]
struct LocalState {
	/// Thread to the transaction it currently runs in.
	associations: FxHashMap<ThreadId, TxHandle>,
	/// Open transactions, associated or suspended, to their rollback-only flag.
	open: FxHashMap<TxHandle, bool>,
}

/// In-memory transaction manager with per-thread association.
///
/// Keeps no resources; it tracks demarcation only, which is all the dispatch
/// layer needs. Completion counters are exposed for diagnostics.
#[derive(Default)]
pub struct LocalTransactionManager {
	state: Mutex<LocalState>,
	next_id: AtomicU64,
	committed: AtomicUsize,
	rolled_back: AtomicUsize,
}

impl LocalTransactionManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn committed(&self) -> usize {
		self.committed.load(Ordering::Relaxed)
	}

	pub fn rolled_back(&self) -> usize {
		self.rolled_back.load(Ordering::Relaxed)
	}

	/// Transactions begun and not yet completed, including suspended ones.
	pub fn open_transactions(&self) -> usize {
		self.state.lock().open.len()
	}

	fn current() -> ThreadId {
		std::thread::current().id()
	}
}

impl TransactionManager for LocalTransactionManager {
	fn begin(&self) -> Result<TxHandle, TxError> {
		let mut state = self.state.lock();
		let thread = Self::current();
		if state.associations.contains_key(&thread) {
			return Err(TxError::AlreadyActive);
		}
		let tx = TxHandle(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
		state.open.insert(tx, false);
		state.associations.insert(thread, tx);
		tracing::trace!(%tx, "began transaction");
		Ok(tx)
	}

	fn commit(&self) -> Result<(), TxError> {
		let mut state = self.state.lock();
		let tx = state.associations.remove(&Self::current()).ok_or(TxError::NoTransaction)?;
		let rollback_only = state.open.remove(&tx).unwrap_or(false);
		if rollback_only {
			self.rolled_back.fetch_add(1, Ordering::Relaxed);
			tracing::debug!(%tx, "commit of rollback-only transaction rolled back");
			return Err(TxError::RolledBack(tx));
		}
		self.committed.fetch_add(1, Ordering::Relaxed);
		tracing::trace!(%tx, "committed transaction");
		Ok(())
	}

	fn rollback(&self) -> Result<(), TxError> {
		let mut state = self.state.lock();
		let tx = state.associations.remove(&Self::current()).ok_or(TxError::NoTransaction)?;
		state.open.remove(&tx);
		self.rolled_back.fetch_add(1, Ordering::Relaxed);
		tracing::trace!(%tx, "rolled back transaction");
		Ok(())
	}

	fn set_rollback_only(&self) -> Result<(), TxError> {
		let mut state = self.state.lock();
		let tx = *state.associations.get(&Self::current()).ok_or(TxError::NoTransaction)?;
		let flag = state.open.get_mut(&tx).ok_or(TxError::UnknownTransaction(tx))?;
		*flag = true;
		Ok(())
	}

	fn status(&self) -> TxStatus {
		let state = self.state.lock();
		match state.associations.get(&Self::current()).and_then(|tx| state.open.get(tx)) {
			None => TxStatus::NoTransaction,
			Some(false) => TxStatus::Active,
			Some(true) => TxStatus::MarkedRollback,
		}
	}

	fn suspend(&self) -> Option<TxHandle> {
		let tx = self.state.lock().associations.remove(&Self::current())?;
		tracing::trace!(%tx, "suspended transaction");
		Some(tx)
	}

	fn resume(&self, tx: TxHandle) -> Result<(), TxError> {
		let mut state = self.state.lock();
		if !state.open.contains_key(&tx) {
			return Err(TxError::UnknownTransaction(tx));
		}
		let thread = Self::current();
		if state.associations.contains_key(&thread) {
			return Err(TxError::AlreadyActive);
		}
		state.associations.insert(thread, tx);
		tracing::trace!(%tx, "resumed transaction");
		Ok(())
	}
}

impl std::fmt::Debug for LocalTransactionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LocalTransactionManager")
			.field("open", &self.open_transactions())
			.field("committed", &self.committed())
			.field("rolled_back", &self.rolled_back())
			.finish()
	}
}
