use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{audit, authz, counters, models, page, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::health::health,
		routes::pages::home,
		routes::pages::denied,
		routes::pages::login_page,
		routes::pages::consent_page,
		routes::pages::accept_consent,
		routes::system::overview,
		routes::system::rename_form,
		routes::system::rename_app,
		routes::system::logo_form,
		routes::system::update_logo,
		routes::roles::list_roles,
		routes::roles::role_detail,
		routes::roles::manage_role,
		routes::roles::create_form,
		routes::roles::create_role,
		routes::roles::update_form,
		routes::roles::update_role,
		routes::roles::delete_form,
		routes::roles::delete_role,
		routes::roles::permissions_form,
		routes::roles::update_permissions,
		routes::roles::members_form,
		routes::roles::update_members,
		routes::users::list_users,
		routes::logs::system_logs,
		routes::logs::category_logs,
		routes::logs::verify_logs,
		routes::disposition::list_tours,
		routes::disposition::list_stations,
		routes::disposition::station_detail,
		routes::disposition::create_station,
		routes::disposition::update_station,
		routes::disposition::delete_station,
		routes::disposition::list_vehicles,
		routes::disposition::vehicle_detail,
		routes::disposition::create_vehicle,
		routes::disposition::update_vehicle,
		routes::disposition::delete_vehicle,
		routes::personal::profile,
		routes::personal::update_profile,
		routes::personal::list_notes,
		routes::personal::create_note,
		routes::personal::account,
		routes::personal::update_account,
		routes::personal::salary,
		routes::personal::confirm_salary,
		routes::personal::personal_overview,
		routes::personal::record_section,
		routes::personal::update_note,
		routes::personal::delete_note,
		routes::communication::list_announcements,
		routes::communication::mark_announcement_read,
		routes::communication::list_messages,
		routes::communication::send_message,
		routes::communication::mark_message_read
	),
	components(
		schemas(
			models::user::User,
			models::user::UserListing,
			models::user::Profile,
			models::user::ProfileForm,
			models::user::SocialHandles,
			models::user::AccountForm,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::role::Role,
			models::role::RoleForm,
			models::role::RoleSummary,
			models::role::RoleDetail,
			models::role::Permission,
			models::role::PermissionGroups,
			models::log::LogEntry,
			models::office::OfficeSettings,
			models::office::AppNameForm,
			models::office::LogoForm,
			models::disposition::Station,
			models::disposition::StationDetails,
			models::disposition::StationForm,
			models::disposition::Vehicle,
			models::disposition::VehicleDetails,
			models::disposition::VehicleForm,
			models::disposition::Tour,
			models::personal::Note,
			models::personal::NoteForm,
			models::personal::Salary,
			models::personal::ConfirmSalaryForm,
			models::personal::RecordSection,
			models::communication::Announcement,
			models::communication::Message,
			models::communication::MessageForm,
			audit::LogAction,
			audit::LogCategory,
			audit::RequestContext,
			audit::ChainReport,
			authz::Consent,
			authz::ConsentKind,
			authz::RoleRef,
			counters::UnreadCounters,
			page::Branding,
			page::Viewer,
			routes::health::HealthResponse,
			routes::roles::RoleManagement,
			routes::roles::RoleFormPage,
			routes::roles::RoleDeletePage,
			routes::roles::MembersForm,
			routes::users::UserDirectory,
			routes::logs::LogPage,
			routes::system::SystemOverview,
			routes::disposition::Abilities,
			routes::disposition::StationList,
			routes::disposition::StationPage,
			routes::disposition::VehicleList,
			routes::disposition::VehiclePage,
			routes::personal::ProfilePage,
			routes::personal::AccountPage,
			routes::personal::SalaryPage,
			routes::personal::SectionLink,
			routes::personal::PersonalOverview,
			routes::personal::RecordPage,
			routes::communication::Mailbox,
			routes::pages::HomeData,
			routes::pages::DeniedData,
			routes::pages::LoginData,
			routes::pages::ConsentData
		)
	),
	tags(
		(name = "Auth", description = "Bearer token issue and identity"),
		(name = "Health", description = "Liveness"),
		(name = "Pages", description = "Landing, login, denied and consent pages"),
		(name = "System", description = "Administration overview and application settings"),
		(name = "Roles", description = "Roles, their permissions and members"),
		(name = "Users", description = "User directory"),
		(name = "Logs", description = "Audit log by category"),
		(name = "Disposition", description = "Tours, stations and vehicles"),
		(name = "Personal", description = "Own profile and notes"),
		(name = "Communication", description = "Announcements and direct messages")
	)
)]
pub struct ApiDoc;

/// Every GET page answers with this envelope around the documented `data`.
const PAGE_NOTE: &str = "GET pages return `{ app, viewer, unread, data }`; failed access checks answer 303 to /login, \
/privacy, /terms, /copyright or /denied.";

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_info(&mut doc);
	add_form_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);
	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn as_root(doc: &mut Value) -> Option<&mut Map<String, Value>> {
	doc.as_object_mut()
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = as_root(doc) else { return };
	let components = root.entry("components").or_insert_with(|| json!({}));
	let Some(components) = components.as_object_mut() else { return };
	let schemes = components.entry("securitySchemes").or_insert_with(|| json!({}));

	if let Some(schemes) = schemes.as_object_mut() {
		schemes.insert(
			"bearerAuth".to_string(),
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			}),
		);
	}
}

fn ensure_info(doc: &mut Value) {
	let Some(root) = as_root(doc) else { return };
	if let Some(info) = root.get_mut("info").and_then(Value::as_object_mut) {
		info.insert("title".to_string(), json!("OfficeSync"));
		info.insert("description".to_string(), json!(PAGE_NOTE));
	}
}

fn add_form_examples(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else { return };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue };
		for operation in operations.values_mut() {
			let Some(form) = operation
				.pointer_mut("/requestBody/content/application~1x-www-form-urlencoded")
				.and_then(Value::as_object_mut)
			else {
				continue;
			};
			let Some(reference) = form.get("schema").and_then(|s| s.get("$ref")).and_then(Value::as_str) else {
				continue;
			};

			let example = match reference {
				"#/components/schemas/RoleForm" => Some(json!({"name": "Ops", "color": "#112233"})),
				"#/components/schemas/StationForm" => Some(json!({"name": "Depot North", "capacity": "12"})),
				"#/components/schemas/VehicleForm" => Some(json!({"license_plate": "B-OS 100", "name": "Sprinter"})),
				"#/components/schemas/MessageForm" => Some(json!({"receiver": "ada", "subject": "Hello"})),
				"#/components/schemas/AccountForm" => Some(json!({"username": "ada", "email": "ada@example.com", "picture": "avatar-01"})),
				_ => None,
			};

			if let Some(example) = example {
				form.insert("example".to_string(), example);
			}
		}
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let Some(root) = as_root(doc) else { return };
	root.entry("servers")
		.or_insert_with(|| json!([{ "url": format!("http://localhost:{}", port), "description": "Local server" }]));
}
