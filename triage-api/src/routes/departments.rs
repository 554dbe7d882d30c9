/// Department endpoints
///
/// - `GET  /api/departments` - Departments of the tenant (admins, managers)
/// - `POST /api/departments` - Create a department (admins)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, Caller, RequestInfo},
    routes::{access, data, validate, DataResponse},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::json;
use triage_shared::{
    auth::authorization::{require_action, Action},
    models::{audit_log::AuditAction, department::Department},
    store::StoreError,
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDepartmentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

pub async fn list_departments(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
) -> ApiResult<Json<DataResponse<Vec<Department>>>> {
    require_action(&auth, Action::ViewDepartments)?;

    let departments = state.store.list_departments(auth.tenant_id).await?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Read, &info)
                .resource("departments", None)
                .metadata(json!({ "count": departments.len() })),
        )
        .await;

    Ok(data(departments))
}

/// Create a department
///
/// # Errors
///
/// - `403 Forbidden`: Caller isn't an admin
/// - `409 Conflict`: A department with that name already exists
/// - `422 Unprocessable Entity`: Blank or overlong name
pub async fn create_department(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
    ApiJson(mut req): ApiJson<CreateDepartmentRequest>,
) -> ApiResult<(StatusCode, Json<DataResponse<Department>>)> {
    require_action(&auth, Action::CreateDepartment)?;

    req.name = req.name.trim().to_string();
    validate(&req)?;

    let department = state
        .store
        .create_department(auth.tenant_id, &req.name)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => {
                ApiError::Conflict(format!("Department '{}' already exists", req.name))
            }
            other => other.into(),
        })?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Write, &info)
                .resource("departments", Some(department.id.to_string()))
                .metadata(json!({ "name": department.name })),
        )
        .await;

    tracing::info!(tenant_id = %auth.tenant_id, department_id = %department.id, "Department created");

    Ok((StatusCode::CREATED, data(department)))
}
