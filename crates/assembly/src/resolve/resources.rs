use caisson_metadata::{ComponentDeclaration, ResourceRef};
use caisson_model::{ProblemKind, WarningKind};
use caisson_settings::ConnectorDecl;

use super::{LinkOrigin, ModuleScope, ResourceLink, Resolver};

impl Resolver<'_> {
	/// Connectors visible to `scope`: declared, then placeholders created so far.
	fn connector_exists(&self, scope: &ModuleScope<'_>, id: &str) -> bool {
		self.settings.connector(id).is_some()
			|| self.created_connectors.iter().any(|c| c.id == id)
			|| scope.created_connectors.iter().any(|c| c.id == id)
	}

	pub(super) fn resolve_resource(&self, scope: &mut ModuleScope<'_>, component: &ComponentDeclaration, reference: &ResourceRef) -> Option<ResourceLink> {
		let link = |connector_id: &str, origin| ResourceLink {
			reference: reference.name.clone(),
			connector_id: connector_id.to_string(),
			origin,
		};

		if let Some(connector_id) = &reference.link {
			if self.connector_exists(scope, connector_id) {
				return Some(link(connector_id, LinkOrigin::Explicit));
			}
			if !self.settings.auto_create_resources {
				scope.problem(
					&component.name,
					ProblemKind::UnknownConnector {
						reference: reference.name.clone(),
						connector_id: connector_id.clone(),
					},
				);
				return None;
			}
			scope
				.created_connectors
				.push(ConnectorDecl::new(connector_id.clone(), reference.resource_type.clone()));
			scope.warn(
				&component.name,
				WarningKind::PlaceholderConnector {
					reference: reference.name.clone(),
					connector_id: connector_id.clone(),
				},
			);
			return Some(link(connector_id, LinkOrigin::Placeholder));
		}

		for name in [reference.name.as_str(), reference.short_name()] {
			if self.connector_exists(scope, name) {
				return Some(link(name, LinkOrigin::MatchedByName));
			}
		}

		let candidates: Vec<&ConnectorDecl> = self
			.settings
			.connectors
			.iter()
			.filter(|c| c.resource_type == reference.resource_type)
			.collect();
		match candidates.as_slice() {
			[] => {
				scope.problem(&component.name, ProblemKind::NoConnector { reference: reference.name.clone() });
				None
			}
			[sole] => {
				scope.warn(
					&component.name,
					WarningKind::LastResortConnector {
						reference: reference.name.clone(),
						connector_id: sole.id.clone(),
					},
				);
				Some(link(&sole.id, LinkOrigin::SoleCandidate))
			}
			several => {
				scope.problem(
					&component.name,
					ProblemKind::AmbiguousConnector {
						reference: reference.name.clone(),
						candidates: several.iter().map(|c| c.id.clone()).collect(),
					},
				);
				None
			}
		}
	}
}
