use serde::{Deserialize, Serialize};

use crate::InterfaceKind;

/// Container-managed persistence contract version of a CMP entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CmpVersion {
	#[serde(rename = "1.x", alias = "1", alias = "1.1")]
	V1,
	#[serde(rename = "2.x", alias = "2", alias = "2.0", alias = "2.1")]
	V2,
}

/// Closed set of component kinds.
///
/// Every kind-dependent rule (legal interface slots, container type, legal
/// context operations) matches on this enum exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
	Stateless,
	Stateful,
	EntityBmp,
	EntityCmp { version: CmpVersion },
	MessageDriven,
}

impl ComponentKind {
	/// Container type a component of this kind must be assigned to.
	pub const fn container_type(self) -> ContainerType {
		match self {
			Self::Stateless => ContainerType::Stateless,
			Self::Stateful => ContainerType::Stateful,
			Self::EntityBmp => ContainerType::BmpEntity,
			Self::EntityCmp { .. } => ContainerType::CmpEntity,
			Self::MessageDriven => ContainerType::MessageDriven,
		}
	}

	/// Returns true for both entity flavours.
	pub const fn is_entity(self) -> bool {
		matches!(self, Self::EntityBmp | Self::EntityCmp { .. })
	}

	/// Returns true for stateless and stateful session components.
	pub const fn is_session(self) -> bool {
		matches!(self, Self::Stateless | Self::Stateful)
	}

	/// Whether a component of this kind may declare an interface in `slot`.
	pub const fn allows(self, slot: InterfaceKind) -> bool {
		match self {
			Self::Stateless | Self::Stateful => !matches!(slot, InterfaceKind::MessageListener),
			Self::EntityBmp | Self::EntityCmp { .. } => {
				matches!(slot, InterfaceKind::Home | InterfaceKind::Remote | InterfaceKind::LocalHome | InterfaceKind::Local)
			}
			Self::MessageDriven => matches!(slot, InterfaceKind::MessageListener),
		}
	}

	/// Token used by deployment-id formats (`{ejbType}`).
	pub const fn type_token(self) -> &'static str {
		match self {
			Self::Stateless => "STATELESS",
			Self::Stateful => "STATEFUL",
			Self::EntityBmp => "BMP_ENTITY",
			Self::EntityCmp { .. } => "CMP_ENTITY",
			Self::MessageDriven => "MESSAGE_DRIVEN",
		}
	}
}

impl std::fmt::Display for ComponentKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Stateless => write!(f, "stateless"),
			Self::Stateful => write!(f, "stateful"),
			Self::EntityBmp => write!(f, "entity-bmp"),
			Self::EntityCmp { version: CmpVersion::V1 } => write!(f, "entity-cmp (1.x)"),
			Self::EntityCmp { version: CmpVersion::V2 } => write!(f, "entity-cmp (2.x)"),
			Self::MessageDriven => write!(f, "message-driven"),
		}
	}
}

/// Declared type of a container; components are only assigned to containers
/// of the type their kind requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerType {
	Stateless,
	Stateful,
	BmpEntity,
	CmpEntity,
	MessageDriven,
}

impl ContainerType {
	/// Human-readable label used when synthesizing default containers.
	pub const fn label(self) -> &'static str {
		match self {
			Self::Stateless => "Stateless",
			Self::Stateful => "Stateful",
			Self::BmpEntity => "BMP Entity",
			Self::CmpEntity => "CMP Entity",
			Self::MessageDriven => "Message-Driven",
		}
	}

	/// Identifier of the container synthesized when none of this type is declared.
	pub fn default_container_id(self) -> String {
		format!("Default {} Container", self.label())
	}
}

impl std::fmt::Display for ContainerType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.label())
	}
}
