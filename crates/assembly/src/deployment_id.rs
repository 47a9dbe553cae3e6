use caisson_metadata::ComponentDeclaration;
use caisson_model::simple_name;
use caisson_settings::DeploymentIdFormat;

/// Deployment id for a component without an explicit one.
pub fn format_deployment_id(format: &DeploymentIdFormat, module_id: &str, component: &ComponentDeclaration) -> String {
	format.template().render(|token| match token {
		"ejbName" => component.name.clone(),
		"moduleId" => module_id.to_string(),
		"ejbClass" => component.class.clone(),
		"ejbClass.simpleName" => simple_name(&component.class).to_string(),
		"ejbType" => component.kind.type_token().to_string(),
		_ => String::new(),
	})
}

/// Explicit deployment id, else the formatted one.
pub fn deployment_id_of(format: &DeploymentIdFormat, module_id: &str, component: &ComponentDeclaration) -> String {
	component
		.deployment_id
		.clone()
		.unwrap_or_else(|| format_deployment_id(format, module_id, component))
}
