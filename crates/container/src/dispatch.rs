//! Running a dispatch target through its around-invoke chain.

use caisson_metadata::CallFrame;
use caisson_model::{BeanFault, Value};

use crate::descriptor::BoundMethod;

/// Runs `target` wrapped by `chain`, outermost interceptor first.
///
/// Each interceptor sees a frame whose `proceed` continues with the rest of
/// the chain; arguments it changes before proceeding are what the next link
/// receives.
pub(crate) fn run_chain(chain: &[BoundMethod], target: &BoundMethod, args: Vec<Value>, state: &mut Value, primary_key: Option<&Value>) -> Result<Value, BeanFault> {
	let Some((outer, rest)) = chain.split_first() else {
		let mut frame = CallFrame::new(&target.method, args, state, primary_key);
		return (target.handler)(&mut frame);
	};
	tracing::trace!(interceptor = %outer.class, method = %outer.method, "around-invoke");
	let mut proceed = |args: Vec<Value>, state: &mut Value| run_chain(rest, target, args, state, primary_key);
	let mut frame = CallFrame::intercepting(&outer.method, args, state, primary_key, &mut proceed);
	(outer.handler)(&mut frame)
}

/// Runs callbacks in order; the first fault stops the list.
pub(crate) fn run_callbacks(callbacks: &[BoundMethod], state: &mut Value, primary_key: Option<&Value>) -> Result<(), BeanFault> {
	for callback in callbacks {
		tracing::trace!(class = %callback.class, method = %callback.method, "lifecycle callback");
		run_chain(&[], callback, Vec::new(), state, primary_key)?;
	}
	Ok(())
}
