use caisson_metadata::{ComponentDeclaration, EjbRef};
use caisson_model::ProblemKind;

use super::{DirectoryEntry, EjbLink, ModuleScope, Resolver};

/// Farthest edit distance still offered as a suggestion.
const SUGGESTION_DISTANCE: usize = 3;

impl DirectoryEntry {
	/// Matches a `module#` qualifier against the module id or the archive file name.
	fn in_module(&self, module: &str) -> bool {
		self.module_id == module || self.module_path.file_name().is_some_and(|f| f == module)
	}

	fn qualified_name(&self) -> String {
		format!("{}#{}", self.module_id, self.name)
	}
}

impl Resolver<'_> {
	/// Binds an ejb ref to exactly one component of the assembly or the registry.
	///
	/// An unqualified target that names exactly one component of the referring
	/// module binds to it even when other modules reuse the name.
	pub(super) fn resolve_ejb_ref(&self, scope: &mut ModuleScope<'_>, component: &ComponentDeclaration, reference: &EjbRef) -> Option<EjbLink> {
		let target = reference.target();
		let (module, name) = match target.split_once('#') {
			Some((module, name)) => (Some(module), name),
			None => (None, target),
		};

		let mut matches: Vec<&DirectoryEntry> = self
			.directory
			.iter()
			.filter(|e| e.name == name && module.is_none_or(|m| e.in_module(m)))
			.collect();
		if module.is_none() && matches.len() > 1 {
			let local: Vec<&DirectoryEntry> = matches.iter().copied().filter(|e| !e.deployed && e.module_path == scope.module.path).collect();
			if local.len() == 1 {
				matches = local;
			}
		}

		let entry = match matches.as_slice() {
			[entry] => *entry,
			[] => {
				let suggestion = self.suggest(name);
				scope.problem(
					&component.name,
					ProblemKind::UnresolvedEjbRef {
						reference: reference.name.clone(),
						target: target.to_string(),
						suggestion,
					},
				);
				return None;
			}
			several => {
				scope.problem(
					&component.name,
					ProblemKind::AmbiguousEjbRef {
						reference: reference.name.clone(),
						target: target.to_string(),
						candidates: several.iter().map(|e| e.qualified_name()).collect(),
					},
				);
				return None;
			}
		};

		if !entry.interfaces.has(reference.interface) {
			scope.problem(
				&component.name,
				ProblemKind::IncompatibleEjbRef {
					reference: reference.name.clone(),
					target: target.to_string(),
					interface: reference.interface,
				},
			);
			return None;
		}

		Some(EjbLink {
			reference: reference.name.clone(),
			interface: reference.interface,
			target_module: entry.module_id.clone(),
			target_component: entry.name.clone(),
			target_deployment_id: entry.deployment_id.clone(),
		})
	}

	/// Closest known component name, if any is close enough.
	fn suggest(&self, name: &str) -> Option<String> {
		self.directory
			.iter()
			.map(|e| (strsim::levenshtein(name, &e.name), e.name.as_str()))
			.filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
			.min()
			.map(|(_, candidate)| candidate.to_string())
	}
}
