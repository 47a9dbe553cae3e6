/// Opaque argument and return value exchanged with business methods.
pub use serde_json::Value;

/// Failure raised by business code or an interceptor.
///
/// Whether a fault rolls the transaction back is decided by the transaction
/// policy, not here: application faults roll back only when their class is
/// declared as a rollback application exception, system faults always do.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BeanFault {
	/// A declared, checked business failure.
	#[error("{class}: {message}")]
	Application { class: String, message: String },
	/// An unexpected runtime failure.
	#[error("{class}: {message}")]
	System { class: String, message: String },
}

impl BeanFault {
	pub fn application(class: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Application {
			class: class.into(),
			message: message.into(),
		}
	}

	pub fn system(message: impl Into<String>) -> Self {
		Self::System {
			class: "RuntimeException".into(),
			message: message.into(),
		}
	}

	pub fn system_of(class: impl Into<String>, message: impl Into<String>) -> Self {
		Self::System {
			class: class.into(),
			message: message.into(),
		}
	}

	/// Class name of the fault, used to look up application-exception declarations.
	pub fn class(&self) -> &str {
		match self {
			Self::Application { class, .. } | Self::System { class, .. } => class,
		}
	}

	pub fn message(&self) -> &str {
		match self {
			Self::Application { message, .. } | Self::System { message, .. } => message,
		}
	}
}
