use caisson_metadata::{ComponentDeclaration, SecurityRoleRef};
use caisson_model::{ProblemKind, WarningKind};

use super::{ModuleScope, Resolver, RoleLink};

impl Resolver<'_> {
	pub(super) fn resolve_role(&self, scope: &mut ModuleScope<'_>, component: &ComponentDeclaration, reference: &SecurityRoleRef) -> Option<RoleLink> {
		let Some(role) = &reference.link else {
			let role = self.settings.default_role.clone();
			scope.warn(
				&component.name,
				WarningKind::DefaultRole {
					reference: reference.name.clone(),
					role: role.clone(),
				},
			);
			return Some(RoleLink {
				reference: reference.name.clone(),
				role,
				defaulted: true,
			});
		};

		let declared = &scope.module.security_roles;
		if !declared.is_empty() && !declared.contains(role) {
			scope.problem(
				&component.name,
				ProblemKind::UnknownRole {
					reference: reference.name.clone(),
					role: role.clone(),
				},
			);
			return None;
		}
		Some(RoleLink {
			reference: reference.name.clone(),
			role: role.clone(),
			defaulted: false,
		})
	}
}
