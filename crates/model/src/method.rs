use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::InterfaceKind;

/// Method name plus ordered parameter type names.
///
/// Serialized in its textual form, `name(TypeA,TypeB)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodSignature {
	pub name: String,
	pub params: Vec<String>,
}

impl MethodSignature {
	pub fn new<I, S>(name: impl Into<String>, params: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			name: name.into(),
			params: params.into_iter().map(Into::into).collect(),
		}
	}

	/// Signature of a method without parameters.
	pub fn nullary(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			params: Vec::new(),
		}
	}

	/// Returns a copy with the name replaced and the parameters kept.
	pub fn renamed(&self, name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			params: self.params.clone(),
		}
	}
}

impl std::fmt::Display for MethodSignature {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}({})", self.name, self.params.join(","))
	}
}

/// Error returned when a textual signature such as `charge(CardInfo)` is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed method signature '{0}'")]
pub struct ParseSignatureError(pub String);

impl TryFrom<String> for MethodSignature {
	type Error = ParseSignatureError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<MethodSignature> for String {
	fn from(value: MethodSignature) -> Self {
		value.to_string()
	}
}

impl FromStr for MethodSignature {
	type Err = ParseSignatureError;

	/// Parses `name` or `name(Type, Other)`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		let Some(open) = s.find('(') else {
			if s.is_empty() || s.contains(')') {
				return Err(ParseSignatureError(s.to_string()));
			}
			return Ok(Self::nullary(s));
		};
		let name = s[..open].trim();
		let Some(inner) = s[open + 1..].strip_suffix(')') else {
			return Err(ParseSignatureError(s.to_string()));
		};
		if name.is_empty() {
			return Err(ParseSignatureError(s.to_string()));
		}
		let params = inner.split(',').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect();
		Ok(Self {
			name: name.to_string(),
			params,
		})
	}
}

/// A concrete method as invoked: the slot it was reached through and its signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
	pub interface: InterfaceKind,
	pub signature: MethodSignature,
}

impl MethodRef {
	pub fn new(interface: InterfaceKind, signature: MethodSignature) -> Self {
		Self { interface, signature }
	}
}

impl std::fmt::Display for MethodRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.interface, self.signature)
	}
}

/// How closely a [`MethodPattern`] matched a call. Higher compares greater.
///
/// Level 1 is the `*` wildcard, level 2 a name-only pattern and level 3 a
/// full signature. At equal level an interface-qualified pattern wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Specificity {
	pub level: u8,
	pub qualified: bool,
}

/// Descriptor-side method selector.
///
/// `name == "*"` selects every method; `params == None` selects every
/// overload of `name`; otherwise only the exact signature is selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MethodPattern {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub interface: Option<InterfaceKind>,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Vec<String>>,
}

impl MethodPattern {
	pub const WILDCARD: &'static str = "*";

	/// Pattern selecting every method of the component.
	pub fn wildcard() -> Self {
		Self {
			interface: None,
			name: Self::WILDCARD.to_string(),
			params: None,
		}
	}

	/// Pattern selecting every overload of `name`.
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			interface: None,
			name: name.into(),
			params: None,
		}
	}

	/// Pattern selecting exactly `signature`.
	pub fn exact(signature: &MethodSignature) -> Self {
		Self {
			interface: None,
			name: signature.name.clone(),
			params: Some(signature.params.clone()),
		}
	}

	/// Restricts the pattern to calls through `interface`.
	pub fn on(mut self, interface: InterfaceKind) -> Self {
		self.interface = Some(interface);
		self
	}

	pub fn is_wildcard(&self) -> bool {
		self.name == Self::WILDCARD
	}

	/// Returns true if this pattern names `signature` with an identical parameter list.
	pub fn is_exactly(&self, signature: &MethodSignature) -> bool {
		self.name == signature.name && self.params.as_deref() == Some(signature.params.as_slice())
	}

	/// Matches the pattern against a call, returning its specificity.
	pub fn matches(&self, interface: InterfaceKind, signature: &MethodSignature) -> Option<Specificity> {
		if self.interface.is_some_and(|slot| slot != interface) {
			return None;
		}
		let level = if self.is_wildcard() {
			1
		} else if self.name != signature.name {
			return None;
		} else {
			match &self.params {
				None => 2,
				Some(params) if *params == signature.params => 3,
				Some(_) => return None,
			}
		};
		Some(Specificity {
			level,
			qualified: self.interface.is_some(),
		})
	}
}

impl std::fmt::Display for MethodPattern {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if let Some(interface) = self.interface {
			write!(f, "{interface}:")?;
		}
		match &self.params {
			Some(params) => write!(f, "{}({})", self.name, params.join(",")),
			None => f.write_str(&self.name),
		}
	}
}
