use caisson_metadata::ComponentDeclaration;
use caisson_model::{DeploymentWarning, ProblemKind, WarningKind};
use caisson_settings::ContainerDecl;

use super::{ModuleScope, Resolver};

impl Resolver<'_> {
	fn find_container(&self, scope: &ModuleScope<'_>, pred: impl Fn(&ContainerDecl) -> bool) -> Option<ContainerDecl> {
		self.settings
			.containers
			.iter()
			.chain(&self.created_containers)
			.chain(&scope.created_containers)
			.find(|c| pred(c))
			.cloned()
	}

	/// Explicit container, else the first of the kind's type, else a synthesized default.
	pub(super) fn assign_container(&self, scope: &mut ModuleScope<'_>, component: &ComponentDeclaration) -> Option<ContainerDecl> {
		let required = component.kind.container_type();

		if let Some(container_id) = &component.container_id {
			let Some(container) = self.find_container(scope, |c| c.id == *container_id) else {
				scope.problem(&component.name, ProblemKind::UnknownContainer { container_id: container_id.clone() });
				return None;
			};
			if container.container_type != required {
				let kind = ProblemKind::ContainerTypeMismatch {
					container_id: container_id.clone(),
					kind: component.kind,
					actual: container.container_type,
					required,
				};
				scope.problem(&component.name, kind);
				return None;
			}
			return Some(container);
		}

		if let Some(container) = self.find_container(scope, |c| c.container_type == required) {
			return Some(container);
		}

		if !self.settings.auto_create_containers {
			scope.problem(&component.name, ProblemKind::NoContainer { required });
			return None;
		}

		let container = ContainerDecl::new(required.default_container_id(), required);
		tracing::info!(module = %scope.module.module_id, component = %component.name, container = %container.id, "auto-created container");
		scope.warnings.push(DeploymentWarning {
			component: Some(component.name.clone()),
			kind: WarningKind::AutoCreatedContainer {
				container_id: container.id.clone(),
			},
		});
		scope.created_containers.push(container.clone());
		Some(container)
	}
}
