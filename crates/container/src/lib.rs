#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Runtime side of the Caisson component container.
//!
//! Deployment ends here: resolved modules become frozen
//! [`RuntimeDescriptor`]s, published through a [`ContainerSystem`] that
//! dispatches calls under the declared transaction and security policies.
//!
//! # Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`ContainerSystem`] | Facade: deploy, undeploy, invoke, run lifecycle callbacks. |
//! | [`RuntimeDescriptor`] | Per-component dispatch table, callbacks and links. |
//! | [`InvocationContext`] | What context operations see during a call. |
//! | [`TransactionManager`] | Seam to the transaction service; [`LocalTransactionManager`] is in-memory. |
//! | [`SecurityService`] | Seam to authorization; [`StaticSecurityService`] trusts the identity. |
//! | [`JndiBinder`] | Seam to the naming service; [`MemoryBinder`] is in-memory. |
//! | [`CmpEngine`] | Optional seam for CMP finders. |
//!
//! Context operations called by business code live in [`context`].

mod cmp;
pub mod context;
mod descriptor;
mod dispatch;
mod error;
mod instances;
mod naming;
mod security;
mod system;
mod tx;

pub use cmp::CmpEngine;
pub use context::{ContextGuard, InvocationContext, Operation, Phase, PhaseSet};
pub use descriptor::{BoundMethod, ContainerOperation, DispatchEntry, ExposedInterface, Mapping, MethodTarget, RuntimeDescriptor, build_descriptors, map_method};
pub use error::{ContextError, IllegalState, InvocationError, TxError};
pub use naming::{JndiBinder, MemoryBinder, NamingError, ProxyReference, jndi_name};
pub use security::{GUEST_PRINCIPAL, SecurityService, StaticSecurityService};
pub use system::{AssemblyOutcome, ContainerSystem};
pub use tx::{FaultClass, LocalTransactionManager, TransactionManager, TxHandle, TxStatus, UserTransaction};
