#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Assembly: reference resolution and the deployment registry.
//!
//! [`resolve`] turns merged modules into [`ResolvedModule`]s without touching
//! shared state; [`DeploymentRegistry::commit`] publishes a resolved module.
//! Keeping the two apart lets a caller resolve a whole assembly, inspect every
//! problem, and then commit only the modules that succeeded.

mod deployment_id;
mod registry;
mod resolve;

pub use deployment_id::{deployment_id_of, format_deployment_id};
pub use registry::{DeployedComponent, DeploymentRegistry};
pub use resolve::{AssemblyResolution, EjbLink, LinkOrigin, ResolvedComponent, ResolvedModule, ResourceLink, RoleLink, resolve, resolve_module};
