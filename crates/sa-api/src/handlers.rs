//! # sa-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core services.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use sa_core::{
    AppError, Caller, Catalog, ModulePermissions, NewUser, NotificationService, PermissionMatrix,
    Preset, Role, RoleEditor, RoleService, UserService, ROLE_MODULE, USER_MODULE,
};
use serde::{Deserialize, Serialize};

/// Header carrying the authenticated user id, set upstream by the auth proxy.
pub const CALLER_HEADER: &str = "X-Caller-Id";

/// State shared across all Actix-web workers.
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub roles: Arc<RoleService>,
    pub notifications: NotificationService,
    pub users: UserService,
}

/// `AppError` as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match &self.0 {
            AppError::ValidationError(msg) | AppError::PermissionDenied(msg) => msg.clone(),
            // Store details stay in the server log.
            AppError::Persistence(_) => "storage unavailable, try again".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

fn caller_id(req: &HttpRequest) -> Result<String, ApiError> {
    req.headers()
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError(AppError::denied("missing caller identity")))
}

async fn resolve_caller(data: &AppState, req: &HttpRequest) -> Result<Caller, ApiError> {
    let id = caller_id(req)?;
    Ok(data.users.resolve_caller(&id).await?)
}

// ── Catalog ─────────────────────────────────────────────────────────────────

pub async fn get_catalog(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.catalog.as_ref())
}

// ── Roles ───────────────────────────────────────────────────────────────────

/// Create/replace payload. A preset is applied first; explicit `permissions`
/// seed the matrix when no preset is given.
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub preset: Option<Preset>,
    #[serde(default)]
    pub permissions: Vec<ModulePermissions>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSelection {
    pub module: String,
    pub selected: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    pub role: Role,
    pub modules: Vec<ModuleSelection>,
    pub selected_total: usize,
}

impl RoleView {
    fn new(catalog: &Arc<Catalog>, role: Role) -> Self {
        let matrix = PermissionMatrix::from_role(Arc::clone(catalog), &role);
        let modules = catalog
            .modules()
            .iter()
            .map(|m| ModuleSelection {
                module: m.name.clone(),
                selected: matrix.count_selected(&m.name),
                total: m.actions.len(),
            })
            .collect();
        Self {
            selected_total: matrix.count_selected_total(),
            modules,
            role,
        }
    }
}

fn build_editor(catalog: &Arc<Catalog>, id: Option<String>, body: RoleRequest) -> RoleEditor {
    let mut editor = RoleEditor {
        id,
        name: String::new(),
        matrix: PermissionMatrix::from_permissions(Arc::clone(catalog), &body.permissions),
    };
    if let Some(preset) = body.preset {
        editor.apply_preset(preset);
    }
    if !body.name.trim().is_empty() {
        editor.name = body.name;
    }
    editor
}

pub async fn list_roles(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    resolve_caller(&data, &req).await?.require(ROLE_MODULE, "View")?;
    let roles = data.roles.list_roles().await?;
    Ok(HttpResponse::Ok().json(roles))
}

pub async fn get_role(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult {
    resolve_caller(&data, &req).await?.require(ROLE_MODULE, "View")?;
    let role = data.roles.get_role(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(RoleView::new(&data.catalog, role)))
}

pub async fn create_role(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<RoleRequest>,
) -> ApiResult {
    let caller = resolve_caller(&data, &req).await?;
    let editor = build_editor(&data.catalog, None, body.into_inner());
    let role = data.roles.save(&caller, &editor).await?;
    Ok(HttpResponse::Created().json(RoleView::new(&data.catalog, role)))
}

pub async fn replace_role(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<RoleRequest>,
) -> ApiResult {
    let caller = resolve_caller(&data, &req).await?;
    let editor = build_editor(&data.catalog, Some(path.into_inner()), body.into_inner());
    let role = data.roles.save(&caller, &editor).await?;
    Ok(HttpResponse::Ok().json(RoleView::new(&data.catalog, role)))
}

pub async fn delete_role(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult {
    let caller = resolve_caller(&data, &req).await?;
    data.roles.delete_role(&caller, &path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ── Users ───────────────────────────────────────────────────────────────────

pub async fn list_users(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    resolve_caller(&data, &req).await?.require(USER_MODULE, "View")?;
    Ok(HttpResponse::Ok().json(data.users.list_users().await?))
}

pub async fn create_user(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<NewUser>,
) -> ApiResult {
    let caller = resolve_caller(&data, &req).await?;
    let profile = data.users.provision(&caller, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(profile))
}

// ── Notifications ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView<'a> {
    pub notifications: &'a [sa_core::Notification],
    pub unread_count: usize,
}

pub async fn list_notifications(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    let user_id = caller_id(&req)?;
    let roster = data.notifications.fetch(&user_id).await;
    Ok(HttpResponse::Ok().json(RosterView {
        notifications: &roster.notifications,
        unread_count: roster.unread_count(),
    }))
}

pub async fn mark_read(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult {
    let user_id = caller_id(&req)?;
    let roster = data.notifications.fetch(&user_id).await;
    data.notifications.mark_read(&roster, &path.into_inner()).await?;

    let refreshed = data.notifications.fetch(&user_id).await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "unreadCount": refreshed.unread_count() })))
}

pub async fn mark_all_read(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    let user_id = caller_id(&req)?;
    let roster = data.notifications.fetch(&user_id).await;
    let updated = data.notifications.mark_all_read(&roster).await?;

    let refreshed = data.notifications.fetch(&user_id).await;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "updated": updated,
        "unreadCount": refreshed.unread_count(),
    })))
}
