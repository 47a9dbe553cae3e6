//! Deployment problems and warnings.
//!
//! Problems are fatal to the component's module; warnings describe degraded but
//! deliberate fallbacks (placeholder connectors, default role links, synthesized
//! containers) that let incremental deployments proceed.

use std::path::PathBuf;

use crate::{CmpVersion, ComponentKind, ContainerType, InterfaceKind, LifecycleEvent, MethodSignature};

/// What went wrong, with enough detail to fix the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProblemKind {
	#[error("class '{class}' not found")]
	ClassNotFound { class: String },

	#[error("invalid descriptor: {reason}")]
	InvalidDescriptor { reason: String },

	#[error("component name '{name}' is declared more than once in this module")]
	DuplicateComponentName { name: String },

	#[error("no component kind declared (add a kind to the descriptor or annotate the class)")]
	MissingKind,

	#[error("no implementation class declared")]
	MissingImplementationClass,

	#[error("{kind} components cannot declare a {slot} interface")]
	IllegalInterface { kind: ComponentKind, slot: InterfaceKind },

	#[error(
		"{context} names unknown component '{name}'{}",
		.suggestion.as_ref().map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default()
	)]
	UnknownComponent {
		context: String,
		name: String,
		suggestion: Option<String>,
	},

	#[error("interceptor class '{class}' is not declared or scanned in this module")]
	UnknownInterceptor { class: String },

	#[error("deployment id '{deployment_id}' is claimed by both {} and {}", .first_module.display(), .second_module.display())]
	DuplicateDeploymentId {
		deployment_id: String,
		first_module: PathBuf,
		second_module: PathBuf,
	},

	#[error("container '{container_id}' is not declared")]
	UnknownContainer { container_id: String },

	#[error("container '{container_id}' is a {actual} container but {kind} components need a {required} container")]
	ContainerTypeMismatch {
		container_id: String,
		kind: ComponentKind,
		actual: ContainerType,
		required: ContainerType,
	},

	#[error("no {required} container is declared and container auto-creation is disabled")]
	NoContainer { required: ContainerType },

	#[error("resource-ref '{reference}' links to unknown connector '{connector_id}'")]
	UnknownConnector { reference: String, connector_id: String },

	#[error("resource-ref '{reference}' has no link and no connector is available")]
	NoConnector { reference: String },

	#[error("resource-ref '{reference}' has no link and matches several connectors: {}", .candidates.join(", "))]
	AmbiguousConnector { reference: String, candidates: Vec<String> },

	#[error(
		"ejb-ref '{reference}' targets '{target}' but no such component is deployed{}",
		.suggestion.as_ref().map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default()
	)]
	UnresolvedEjbRef {
		reference: String,
		target: String,
		suggestion: Option<String>,
	},

	#[error("ejb-ref '{reference}' targets '{target}', which matches several components: {}", .candidates.join(", "))]
	AmbiguousEjbRef {
		reference: String,
		target: String,
		candidates: Vec<String>,
	},

	#[error("ejb-ref '{reference}' needs a {interface} interface but '{target}' does not expose one")]
	IncompatibleEjbRef {
		reference: String,
		target: String,
		interface: InterfaceKind,
	},

	#[error("security-role-ref '{reference}' links to undeclared role '{role}'")]
	UnknownRole { reference: String, role: String },

	#[error("{interface_class}.{method} has no implementation: expected {expected} on the bean class")]
	MissingImplementation {
		interface_class: String,
		method: MethodSignature,
		expected: MethodSignature,
	},

	#[error("CMP {version:?} finder {method} has no query and cannot be synthesized")]
	UnresolvableFinder { method: MethodSignature, version: CmpVersion },

	#[error("{event} callback {class}.{method}() does not exist")]
	MissingCallback {
		event: LifecycleEvent,
		class: String,
		method: String,
	},

	#[error("around-invoke method {class}.{method}() does not exist")]
	MissingAroundInvoke { class: String, method: String },

	#[error("cannot bind '{name}': {reason}")]
	JndiBinding { name: String, reason: String },
}

/// One configuration problem, located by module and component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{module} ({}){}: {kind}", .path.display(), .component.as_ref().map(|c| format!(", component '{c}'")).unwrap_or_default())]
pub struct Problem {
	pub module: String,
	pub path: PathBuf,
	pub component: Option<String>,
	pub kind: ProblemKind,
}

/// Deployment of one module failed; carries every problem found, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
	"deployment of module '{module}' ({}) failed with {} problem(s):\n{}",
	.path.display(),
	.problems.len(),
	.problems.iter().map(|p| format!("  - {p}")).collect::<Vec<_>>().join("\n")
)]
pub struct DeploymentError {
	pub module: String,
	pub path: PathBuf,
	pub problems: Vec<Problem>,
}

impl DeploymentError {
	/// Returns true if any problem matches `pred`.
	pub fn any(&self, pred: impl Fn(&ProblemKind) -> bool) -> bool {
		self.problems.iter().any(|p| pred(&p.kind))
	}
}

/// A degraded-but-continuing decision taken during deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
	/// A link named a missing connector; a placeholder was created and is unlikely to work.
	PlaceholderConnector { reference: String, connector_id: String },
	/// No link and no name match; the only connector of the right type was picked.
	LastResortConnector { reference: String, connector_id: String },
	/// A role ref without link was bound to the default role.
	DefaultRole { reference: String, role: String },
	/// No container of the required type was declared; a default one was synthesized.
	AutoCreatedContainer { container_id: String },
	/// Bean-managed component carried container-transaction entries that were discarded.
	DroppedTransactionEntries { count: usize },
	/// A JNDI name collided inside one component and was disambiguated.
	JndiNameCollision { name: String, fallback: String },
}

impl std::fmt::Display for WarningKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::PlaceholderConnector { reference, connector_id } => write!(
				f,
				"resource-ref '{reference}' links to missing connector '{connector_id}'; created a placeholder that is unlikely to function"
			),
			Self::LastResortConnector { reference, connector_id } => {
				write!(f, "resource-ref '{reference}' has no link; auto-assigned the only candidate connector '{connector_id}'")
			}
			Self::DefaultRole { reference, role } => {
				write!(f, "security-role-ref '{reference}' has no role-link; linked to default role '{role}'")
			}
			Self::AutoCreatedContainer { container_id } => write!(f, "auto-created container '{container_id}'"),
			Self::DroppedTransactionEntries { count } => {
				write!(f, "ignored {count} container-transaction entries on a bean-managed component")
			}
			Self::JndiNameCollision { name, fallback } => write!(f, "JNDI name '{name}' already used; bound as '{fallback}'"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentWarning {
	pub component: Option<String>,
	pub kind: WarningKind,
}

impl std::fmt::Display for DeploymentWarning {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.component {
			Some(component) => write!(f, "component '{component}': {}", self.kind),
			None => write!(f, "{}", self.kind),
		}
	}
}
