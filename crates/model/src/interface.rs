use serde::{Deserialize, Serialize};

/// Interface slot through which a component method is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceKind {
	/// Remote home (EJB 2.x `EJBHome`).
	Home,
	/// Remote component interface (`EJBObject`).
	Remote,
	/// Local home (`EJBLocalHome`).
	LocalHome,
	/// Local component interface (`EJBLocalObject`).
	Local,
	/// EJB 3 local business interface.
	BusinessLocal,
	/// EJB 3 remote business interface.
	BusinessRemote,
	/// Message listener of a message-driven component.
	MessageListener,
}

impl InterfaceKind {
	/// All slots in a stable order.
	pub const ALL: [Self; 7] = [
		Self::Home,
		Self::Remote,
		Self::LocalHome,
		Self::Local,
		Self::BusinessLocal,
		Self::BusinessRemote,
		Self::MessageListener,
	];

	/// Returns true for home and local-home slots.
	pub const fn is_home(self) -> bool {
		matches!(self, Self::Home | Self::LocalHome)
	}

	/// Returns true for slots reachable from inside the same VM only.
	pub const fn is_local(self) -> bool {
		matches!(self, Self::LocalHome | Self::Local | Self::BusinessLocal)
	}

	/// Returns true for the EJB 2.x component interfaces.
	pub const fn is_component(self) -> bool {
		matches!(self, Self::Remote | Self::Local)
	}

	/// Whether instances reached through this slot are published in the naming tree.
	pub const fn is_bindable(self) -> bool {
		matches!(self, Self::Home | Self::LocalHome | Self::BusinessLocal | Self::BusinessRemote)
	}

	/// Suffix used by JNDI name formats (`{interfaceType.suffix}`).
	pub const fn suffix(self) -> &'static str {
		match self {
			Self::Home => "RemoteHome",
			Self::Remote => "RemoteObject",
			Self::LocalHome => "LocalHome",
			Self::Local => "LocalObject",
			Self::BusinessLocal => "Local",
			Self::BusinessRemote => "Remote",
			Self::MessageListener => "Listener",
		}
	}
}

impl std::fmt::Display for InterfaceKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			Self::Home => "home",
			Self::Remote => "remote",
			Self::LocalHome => "local-home",
			Self::Local => "local",
			Self::BusinessLocal => "business-local",
			Self::BusinessRemote => "business-remote",
			Self::MessageListener => "message-listener",
		};
		f.write_str(label)
	}
}

/// Declared interface classes of one component, per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InterfaceSlots {
	pub home: Option<String>,
	pub remote: Option<String>,
	pub local_home: Option<String>,
	pub local: Option<String>,
	pub business_local: Vec<String>,
	pub business_remote: Vec<String>,
	pub message_listener: Option<String>,
}

impl InterfaceSlots {
	/// Iterates every declared `(slot, interface class)` pair in slot order.
	pub fn iter(&self) -> impl Iterator<Item = (InterfaceKind, &str)> + '_ {
		let singles = [
			(InterfaceKind::Home, self.home.as_deref()),
			(InterfaceKind::Remote, self.remote.as_deref()),
			(InterfaceKind::LocalHome, self.local_home.as_deref()),
			(InterfaceKind::Local, self.local.as_deref()),
		];
		singles
			.into_iter()
			.filter_map(|(kind, class)| class.map(|class| (kind, class)))
			.chain(self.business_local.iter().map(|class| (InterfaceKind::BusinessLocal, class.as_str())))
			.chain(self.business_remote.iter().map(|class| (InterfaceKind::BusinessRemote, class.as_str())))
			.chain(self.message_listener.as_deref().map(|class| (InterfaceKind::MessageListener, class)))
	}

	/// Returns true if any interface class is declared in `slot`.
	pub fn has(&self, slot: InterfaceKind) -> bool {
		self.iter().any(|(kind, _)| kind == slot)
	}

	/// Returns true if nothing is declared at all.
	pub fn is_empty(&self) -> bool {
		self.iter().next().is_none()
	}
}
