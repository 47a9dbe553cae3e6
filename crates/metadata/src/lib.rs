#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Component metadata: readers, raw records and the merger.
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | [`MetadataSource`] seam, TOML reader, [`read_module`] |
//! | [`descriptor`] | serde model of module descriptors and deployment plans |
//! | [`annotation`] | records reported by annotation discovery |
//! | [`class`] | [`LoadedClass`], [`ClassLoader`] and method handlers |
//! | [`merge`] | folds descriptor and annotations into [`MergedModule`] |

pub mod annotation;
pub mod class;
pub mod descriptor;
mod error;
pub mod merge;
mod reference;
pub mod source;

pub use annotation::{AnnotatedCallback, AnnotatedClass, AnnotatedKind, ComponentAnnotation, MethodInterceptors, MethodSecurityAnnotation, MethodTransaction, SecurityAnnotation};
pub use class::{CallFrame, ClassInfo, ClassLoader, ClassNotFound, LoadedClass, LoadedClassBuilder, MapClassLoader, MethodHandler, Proceed};
pub use descriptor::{
	AssemblyDescriptor, BeanDescriptor, BeanKind, ContainerTransaction, DeploymentPlan, DescriptorTree, ExcludedMethods, InterceptorBindingDescriptor,
	InterceptorDescriptor, MethodPermission, ResourceLinkDescriptor,
};
pub use error::{MetadataError, Result};
pub use merge::{BindingTarget, ComponentDeclaration, InterceptorBinding, InterceptorDecl, LifecycleCallbacks, MergedModule, merge};
pub use reference::{ApplicationException, EjbRef, QueryDefinition, ResourceRef, SecurityRoleRef};
pub use source::{MetadataSource, RawModule, TomlMetadataSource, read_module};
