//! Security service seam.

use caisson_model::{Principal, SecurityIdentity};

/// Name reported for unauthenticated callers.
pub const GUEST_PRINCIPAL: &str = "guest";

/// External authorization service.
pub trait SecurityService: Send + Sync {
	/// Whether the caller holds at least one of `roles`.
	fn is_caller_authorized(&self, identity: &SecurityIdentity, roles: &[&str]) -> bool;
	/// The caller's principal as seen by a consumer of type `target`.
	fn translate(&self, identity: &SecurityIdentity, target: &str) -> Principal;
}

/// Trusts the roles carried by the identity itself.
#[derive(Debug, Clone, Default)]
pub struct StaticSecurityService;

impl SecurityService for StaticSecurityService {
	fn is_caller_authorized(&self, identity: &SecurityIdentity, roles: &[&str]) -> bool {
		roles.iter().any(|role| identity.roles.contains(*role))
	}

	fn translate(&self, identity: &SecurityIdentity, target: &str) -> Principal {
		Principal {
			name: identity.principal.clone().unwrap_or_else(|| GUEST_PRINCIPAL.to_string()),
			kind: target.to_string(),
		}
	}
}
