//! Optional CMP engine seam.
//!
//! Persistence itself is external; the container hands finder calls over
//! together with the query text from the descriptor.

use caisson_model::{BeanFault, MethodSignature, Value};

pub trait CmpEngine: Send + Sync {
	/// Runs a finder; `query` is `None` for `findByPrimaryKey`.
	fn execute_finder(&self, deployment_id: &str, method: &MethodSignature, query: Option<&str>, args: &[Value]) -> Result<Value, BeanFault>;
}
