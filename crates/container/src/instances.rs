//! Per-instance state of stateful and entity components.
//!
//! Instances are identified by deployment id and primary key (the session id
//! for stateful components). State is taken out for the duration of a call
//! and put back afterwards, so no lock is held while business code runs.

use caisson_model::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::tx::TxHandle;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct InstanceKey {
	deployment_id: String,
	primary_key: String,
}

impl InstanceKey {
	pub(crate) fn new(deployment_id: &str, primary_key: &Value) -> Self {
		Self {
			deployment_id: deployment_id.to_string(),
			primary_key: primary_key.to_string(),
		}
	}
}

#[derive(Default)]
struct StoreState {
	states: FxHashMap<InstanceKey, Value>,
	/// Bean-managed transactions a stateful instance left open between calls.
	open_transactions: FxHashMap<InstanceKey, TxHandle>,
}

#[derive(Default)]
pub(crate) struct InstanceStore {
	state: Mutex<StoreState>,
}

impl InstanceStore {
	/// Takes the instance state out of the store; a new instance starts as `Null`.
	pub(crate) fn take_state(&self, key: &InstanceKey) -> Value {
		self.state.lock().states.remove(key).unwrap_or(Value::Null)
	}

	pub(crate) fn put_state(&self, key: InstanceKey, value: Value) {
		self.state.lock().states.insert(key, value);
	}

	pub(crate) fn take_transaction(&self, key: &InstanceKey) -> Option<TxHandle> {
		self.state.lock().open_transactions.remove(key)
	}

	pub(crate) fn stash_transaction(&self, key: InstanceKey, tx: TxHandle) {
		self.state.lock().open_transactions.insert(key, tx);
	}

	/// Forgets one instance; returns a transaction it still held open.
	pub(crate) fn remove(&self, key: &InstanceKey) -> Option<TxHandle> {
		let mut state = self.state.lock();
		state.states.remove(key);
		state.open_transactions.remove(key)
	}

	/// Forgets every instance of a deployment; returns their open transactions.
	pub(crate) fn remove_deployment(&self, deployment_id: &str) -> Vec<TxHandle> {
		let mut state = self.state.lock();
		state.states.retain(|key, _| key.deployment_id != deployment_id);
		let mut orphaned = Vec::new();
		state.open_transactions.retain(|key, tx| {
			let keep = key.deployment_id != deployment_id;
			if !keep {
				orphaned.push(*tx);
			}
			keep
		});
		orphaned
	}
}
