#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Shared vocabulary for the Caisson component container.
//!
//! Every crate in the deployment pipeline speaks in these types: the metadata
//! readers produce them, the merger and resolver refine them, and the runtime
//! consults them on every invocation.
//!
//! # Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`ComponentKind`] | Closed set of component kinds; drives every kind-dependent decision. |
//! | [`InterfaceKind`] | Interface slot a method is reached through. |
//! | [`MethodSignature`] | Method name plus ordered parameter type names. |
//! | [`MethodPattern`] | Descriptor-side method selector (wildcard, name-only, or full signature). |
//! | [`MethodPolicyTable`] | Per-component transaction and permission entries with precedence lookup. |
//! | [`Problem`] | One configuration problem found while deploying a module. |

mod fault;
mod interface;
mod kind;
mod lifecycle;
mod method;
pub mod policy;
mod problem;
mod security;
mod transaction;

pub use fault::{BeanFault, Value};
pub use interface::{InterfaceKind, InterfaceSlots};
pub use kind::{CmpVersion, ComponentKind, ContainerType};
pub use lifecycle::{CallbackRef, LifecycleEvent};
pub use method::{MethodPattern, MethodRef, MethodSignature, ParseSignatureError, Specificity};
pub use policy::{MethodPolicyTable, Origin, PermissionEntry, TransactionEntry};
pub use problem::{DeploymentError, DeploymentWarning, Problem, ProblemKind, WarningKind};
pub use security::{MethodSecurity, Principal, RolePolicy, SecurityIdentity};
pub use transaction::{TransactionAttribute, TransactionType};

/// Resource type assumed for connectors and resource refs that do not name one.
pub const DEFAULT_RESOURCE_TYPE: &str = "javax.sql.DataSource";

/// Returns the unqualified name of a dotted class name.
///
/// `com.acme.OrderBean` becomes `OrderBean`; names without a package are
/// returned unchanged. Nested class markers (`$`) are kept.
///
/// ```
/// assert_eq!(caisson_model::simple_name("com.acme.OrderBean"), "OrderBean");
/// ```
pub fn simple_name(class: &str) -> &str {
	class.rsplit_once('.').map_or(class, |(_, simple)| simple)
}
