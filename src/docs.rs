use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::authz_check::check,
		routes::permissions::get_settings,
		routes::permissions::update_settings,
		routes::permissions::matrix,
		routes::roles::list_roles,
		routes::roles::create_role,
		routes::roles::assign_role,
		routes::approvals::create,
		routes::approvals::get_one,
		routes::approvals::list_for_project,
		routes::approvals::approve,
		routes::approvals::reject,
		routes::approvals::cancel,
		routes::work_items::update_status,
		routes::work_items::delete_item
	),
	components(
		schemas(
			routes::health::HealthResponse,
			authz::PermissionDecision,
			authz::SubjectKind,
			authz::SubjectRef,
			authz::WorkStatus,
			models::approval::ApprovalStatus,
			models::approval::ApprovalRequest,
			models::approval::ApprovalCreateRequest,
			models::approval::ApprovalDecisionRequest,
			models::approval::ApprovalRejectRequest,
			models::project::Project,
			models::project::ActionRoles,
			models::role::CustomRole,
			models::role::CustomRoleCreateRequest,
			models::role::CustomRoleAssignment,
			models::role::AssignCustomRoleRequest,
			models::work_item::StatusUpdateRequest,
			models::work_item::StatusUpdateResponse,
			models::work_item::CheckRequest,
			models::work_item::CheckResponse
		)
	),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Permissions", description = "Project permission settings and checks"),
		(name = "Roles", description = "Project custom roles"),
		(name = "Approvals", description = "Approval workflow for gated transitions"),
		(name = "Work items", description = "Guarded work item writes")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc)?;
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

/// Serves the document at `/api-docs/openapi.json` and Swagger UI at `/docs`.
pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);
	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn object_entry<'a>(parent: &'a mut Map<String, Value>, key: &str) -> anyhow::Result<&'a mut Map<String, Value>> {
	parent
		.entry(key)
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI `{}` must be an object", key))
}

fn ensure_security_components(doc: &mut Value) -> anyhow::Result<()> {
	let root = doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))?;

	let components = object_entry(root, "components")?;
	let schemes = object_entry(components, "securitySchemes")?;
	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);

	root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	Ok(())
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
