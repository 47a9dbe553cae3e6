use serde::{Deserialize, Serialize};

/// Lifecycle events a component may register callbacks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleEvent {
	PostConstruct,
	PreDestroy,
	PostActivate,
	PrePassivate,
}

impl LifecycleEvent {
	pub const ALL: [Self; 4] = [Self::PostConstruct, Self::PreDestroy, Self::PostActivate, Self::PrePassivate];
}

impl std::fmt::Display for LifecycleEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			Self::PostConstruct => "post-construct",
			Self::PreDestroy => "pre-destroy",
			Self::PostActivate => "post-activate",
			Self::PrePassivate => "pre-passivate",
		};
		f.write_str(label)
	}
}

/// One lifecycle callback: a no-argument method on the bean class or on an interceptor class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CallbackRef {
	/// Declaring class; `None` means the component's implementation class.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub class: Option<String>,
	pub method: String,
}

impl CallbackRef {
	pub fn on_bean(method: impl Into<String>) -> Self {
		Self {
			class: None,
			method: method.into(),
		}
	}

	pub fn on_class(class: impl Into<String>, method: impl Into<String>) -> Self {
		Self {
			class: Some(class.into()),
			method: method.into(),
		}
	}
}
