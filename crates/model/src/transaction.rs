use serde::{Deserialize, Serialize};

/// Declarative transaction attribute of a container-managed method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionAttribute {
	/// Join the caller's transaction or start a new one.
	#[default]
	Required,
	/// Always run in a fresh transaction, suspending the caller's.
	RequiresNew,
	/// Require a caller transaction.
	Mandatory,
	/// Run without a transaction, suspending the caller's.
	NotSupported,
	/// Refuse to run inside a transaction.
	Never,
	/// Join the caller's transaction if there is one.
	Supports,
}

impl TransactionAttribute {
	pub const ALL: [Self; 6] = [
		Self::Required,
		Self::RequiresNew,
		Self::Mandatory,
		Self::NotSupported,
		Self::Never,
		Self::Supports,
	];
}

impl std::fmt::Display for TransactionAttribute {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			Self::Required => "Required",
			Self::RequiresNew => "RequiresNew",
			Self::Mandatory => "Mandatory",
			Self::NotSupported => "NotSupported",
			Self::Never => "Never",
			Self::Supports => "Supports",
		};
		f.write_str(label)
	}
}

/// Who demarcates transactions for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
	#[default]
	Container,
	Bean,
}

impl std::fmt::Display for TransactionType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Container => f.write_str("container-managed"),
			Self::Bean => f.write_str("bean-managed"),
		}
	}
}
