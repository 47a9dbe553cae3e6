//! `{token}` name templates used for deployment ids and JNDI names.

use serde::{Deserialize, Serialize};

use crate::SettingsError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Token(String),
}

/// A parsed name template such as `{moduleId}/{ejbName}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
	source: String,
	segments: Vec<Segment>,
}

impl NameTemplate {
	/// Parses `source`, rejecting unbalanced braces and tokens outside `allowed`.
	pub fn parse(source: &str, allowed: &[&str]) -> Result<Self, SettingsError> {
		let mut segments = Vec::new();
		let mut rest = source;
		while let Some(open) = rest.find('{') {
			if open > 0 {
				segments.push(Segment::Literal(rest[..open].to_string()));
			}
			let after = &rest[open + 1..];
			let Some(close) = after.find('}') else {
				return Err(SettingsError::InvalidTemplate {
					template: source.to_string(),
					reason: "unclosed '{'".into(),
				});
			};
			let token = &after[..close];
			if !allowed.contains(&token) {
				return Err(SettingsError::InvalidTemplate {
					template: source.to_string(),
					reason: format!("unknown token '{{{token}}}' (expected one of {})", allowed.join(", ")),
				});
			}
			segments.push(Segment::Token(token.to_string()));
			rest = &after[close + 1..];
		}
		if rest.contains('}') {
			return Err(SettingsError::InvalidTemplate {
				template: source.to_string(),
				reason: "unmatched '}'".into(),
			});
		}
		if !rest.is_empty() {
			segments.push(Segment::Literal(rest.to_string()));
		}
		if segments.is_empty() {
			return Err(SettingsError::InvalidTemplate {
				template: source.to_string(),
				reason: "template is empty".into(),
			});
		}
		Ok(Self {
			source: source.to_string(),
			segments,
		})
	}

	/// Renders the template; `lookup` must answer every token accepted at parse time.
	pub fn render(&self, lookup: impl Fn(&str) -> String) -> String {
		let mut out = String::with_capacity(self.source.len() * 2);
		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => out.push_str(text),
				Segment::Token(token) => out.push_str(&lookup(token)),
			}
		}
		out
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}
}

macro_rules! template_newtype {
	($(#[$meta:meta])* $name:ident, default = $default:literal, tokens = [$($token:literal),+ $(,)?]) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(NameTemplate);

		impl $name {
			pub const TOKENS: &'static [&'static str] = &[$($token),+];
			pub const DEFAULT: &'static str = $default;

			pub fn parse(source: &str) -> Result<Self, SettingsError> {
				NameTemplate::parse(source, Self::TOKENS).map(Self)
			}

			pub fn template(&self) -> &NameTemplate {
				&self.0
			}
		}

		impl Default for $name {
			fn default() -> Self {
				match Self::parse(Self::DEFAULT) {
					Ok(format) => format,
					Err(_) => unreachable!("built-in default template is valid"),
				}
			}
		}

		impl TryFrom<String> for $name {
			type Error = SettingsError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::parse(&value)
			}
		}

		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0.source
			}
		}
	};
}

template_newtype!(
	/// Format of synthesized deployment ids.
	DeploymentIdFormat,
	default = "{ejbName}",
	tokens = ["ejbName", "moduleId", "ejbClass", "ejbClass.simpleName", "ejbType"]
);

template_newtype!(
	/// Format of JNDI names under which homes and business interfaces are bound.
	JndiNameFormat,
	default = "{deploymentId}{interfaceType.suffix}",
	tokens = [
		"deploymentId",
		"ejbName",
		"moduleId",
		"interfaceType.suffix",
		"interfaceClass",
		"interfaceClass.simpleName",
	]
);
