use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identity of the caller as propagated into an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityIdentity {
	pub principal: Option<String>,
	#[serde(default)]
	pub roles: BTreeSet<String>,
}

impl SecurityIdentity {
	/// The unauthenticated caller.
	pub fn anonymous() -> Self {
		Self::default()
	}

	pub fn user<I, S>(name: impl Into<String>, roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			principal: Some(name.into()),
			roles: roles.into_iter().map(Into::into).collect(),
		}
	}

	pub fn is_anonymous(&self) -> bool {
		self.principal.is_none()
	}
}

/// A principal translated for a specific consumer type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
	pub name: String,
	pub kind: String,
}

/// Roles a permission entry grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RolePolicy {
	/// Any caller may invoke the method.
	Unchecked,
	/// Callers in at least one of these roles may invoke the method.
	Roles(BTreeSet<String>),
}

impl RolePolicy {
	pub fn roles<I, S>(roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::Roles(roles.into_iter().map(Into::into).collect())
	}
}

/// Effective security requirement of one dispatchable method.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MethodSecurity {
	#[default]
	Unchecked,
	/// Nobody may invoke the method.
	Excluded,
	/// Callers need one of these roles.
	Roles(BTreeSet<String>),
}

impl MethodSecurity {
	/// Roles authorized to call the method; empty for unchecked and excluded methods.
	pub fn authorized_roles(&self) -> Vec<&str> {
		match self {
			Self::Roles(roles) => roles.iter().map(String::as_str).collect(),
			Self::Unchecked | Self::Excluded => Vec::new(),
		}
	}
}
