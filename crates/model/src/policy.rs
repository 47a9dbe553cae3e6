//! Per-component method policy table.
//!
//! # Precedence Contract
//!
//! A lookup collects every entry whose [`MethodPattern`] matches the call and
//! picks the winner by, in order:
//!
//! 1. **Specificity:** full signature > name-only > `*` wildcard; at equal level
//!    an interface-qualified pattern wins.
//! 2. **Origin:** [`Origin::Descriptor`] beats [`Origin::Annotation`].
//! 3. **Ordinal:** the entry pushed last wins.
//!
//! Patterns with a parameter list that differs from the call never match, so a
//! `charge()` entry and a `charge(CardInfo)` entry coexist without shadowing
//! each other.
//!
//! Permissions differ in one respect: all entries at the winning specificity
//! are combined (role sets unioned, any `Unchecked` makes the method
//! unchecked), and a matching excluded pattern denies the method outright.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{InterfaceKind, MethodPattern, MethodSecurity, MethodSignature, RolePolicy, Specificity, TransactionAttribute};

/// Where a policy entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
	Annotation,
	Descriptor,
}

impl Origin {
	/// Precedence rank (higher wins).
	pub const fn rank(self) -> u8 {
		match self {
			Self::Annotation => 0,
			Self::Descriptor => 1,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEntry {
	pub pattern: MethodPattern,
	pub attribute: TransactionAttribute,
	pub origin: Origin,
	pub ordinal: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionEntry {
	pub pattern: MethodPattern,
	pub policy: RolePolicy,
	pub origin: Origin,
	pub ordinal: u32,
}

/// Transaction and permission entries of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodPolicyTable {
	transactions: Vec<TransactionEntry>,
	permissions: Vec<PermissionEntry>,
	excluded: Vec<MethodPattern>,
	next_ordinal: u32,
}

impl MethodPolicyTable {
	pub fn new() -> Self {
		Self::default()
	}

	fn ordinal(&mut self) -> u32 {
		let ordinal = self.next_ordinal;
		self.next_ordinal += 1;
		ordinal
	}

	pub fn push_transaction(&mut self, pattern: MethodPattern, attribute: TransactionAttribute, origin: Origin) {
		let ordinal = self.ordinal();
		self.transactions.push(TransactionEntry {
			pattern,
			attribute,
			origin,
			ordinal,
		});
	}

	pub fn push_permission(&mut self, pattern: MethodPattern, policy: RolePolicy, origin: Origin) {
		let ordinal = self.ordinal();
		self.permissions.push(PermissionEntry {
			pattern,
			policy,
			origin,
			ordinal,
		});
	}

	pub fn exclude(&mut self, pattern: MethodPattern) {
		self.excluded.push(pattern);
	}

	pub fn transactions(&self) -> &[TransactionEntry] {
		&self.transactions
	}

	pub fn permissions(&self) -> &[PermissionEntry] {
		&self.permissions
	}

	pub fn excluded(&self) -> &[MethodPattern] {
		&self.excluded
	}

	/// Drops every transaction entry; used for bean-managed components.
	pub fn clear_transactions(&mut self) -> usize {
		let dropped = self.transactions.len();
		self.transactions.clear();
		dropped
	}

	/// Returns true if an unqualified `*` transaction entry exists.
	pub fn has_wildcard_transaction(&self) -> bool {
		self.transactions.iter().any(|e| e.pattern.is_wildcard() && e.pattern.interface.is_none())
	}

	/// Returns true if an unqualified `*` permission entry or exclusion exists.
	pub fn has_wildcard_permission(&self) -> bool {
		self.permissions.iter().any(|e| e.pattern.is_wildcard() && e.pattern.interface.is_none())
			|| self.excluded.iter().any(|p| p.is_wildcard() && p.interface.is_none())
	}

	/// Returns true if a transaction entry names exactly `signature`.
	pub fn has_exact_transaction(&self, signature: &MethodSignature) -> bool {
		self.transactions.iter().any(|e| e.pattern.is_exactly(signature))
	}

	/// Returns true if a permission entry or exclusion names exactly `signature`.
	pub fn has_exact_permission(&self, signature: &MethodSignature) -> bool {
		self.permissions.iter().any(|e| e.pattern.is_exactly(signature)) || self.excluded.iter().any(|p| p.is_exactly(signature))
	}

	/// Returns the winning transaction entry for a call, if any entry matches.
	pub fn transaction_entry(&self, interface: InterfaceKind, signature: &MethodSignature) -> Option<&TransactionEntry> {
		self.transactions
			.iter()
			.filter_map(|entry| entry.pattern.matches(interface, signature).map(|spec| (spec, entry)))
			.max_by_key(|(spec, entry)| (*spec, entry.origin.rank(), entry.ordinal))
			.map(|(_, entry)| entry)
	}

	/// Effective transaction attribute; `Required` when nothing matches.
	pub fn transaction_attribute(&self, interface: InterfaceKind, signature: &MethodSignature) -> TransactionAttribute {
		self.transaction_entry(interface, signature)
			.map(|entry| entry.attribute)
			.unwrap_or_default()
	}

	/// Effective security requirement of a call.
	pub fn method_security(&self, interface: InterfaceKind, signature: &MethodSignature) -> MethodSecurity {
		if self.excluded.iter().any(|p| p.matches(interface, signature).is_some()) {
			return MethodSecurity::Excluded;
		}

		let matches: Vec<(Specificity, &PermissionEntry)> = self
			.permissions
			.iter()
			.filter_map(|entry| entry.pattern.matches(interface, signature).map(|spec| (spec, entry)))
			.collect();
		let Some(best) = matches.iter().map(|(spec, _)| *spec).max() else {
			return MethodSecurity::Unchecked;
		};

		let mut roles = BTreeSet::new();
		for (_, entry) in matches.iter().filter(|(spec, _)| *spec == best) {
			match &entry.policy {
				RolePolicy::Unchecked => return MethodSecurity::Unchecked,
				RolePolicy::Roles(granted) => roles.extend(granted.iter().cloned()),
			}
		}
		if roles.is_empty() {
			// An empty role list grants nobody.
			MethodSecurity::Excluded
		} else {
			MethodSecurity::Roles(roles)
		}
	}
}
