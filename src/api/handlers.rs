//! HTTP request handlers for the Exam Data Manager API.
//!
//! This module builds the router and holds the service and employee
//! handlers; spreadsheet endpoints live in [`super::upload`].

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use super::request::{CreateEmployeeRequest, UpdateEmployeeRequest};
use super::response::{ApiErrorResponse, ApiResponse, ListResponse};
use super::state::AppState;
use super::upload::{download_handler, task_status_handler, upload_handler};
use crate::models::Employee;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes();
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/employees", post(create_employee_handler))
        .route("/api/employees/@create", post(create_employee_handler))
        .route("/api/employees/name/:name", get(get_employees_by_name_handler))
        .route(
            "/api/employees/:employee_id",
            get(get_employee_handler)
                .put(update_employee_handler)
                .delete(delete_employee_handler),
        )
        .route("/api/excel/upload/:sheet_name", post(upload_handler))
        .route("/api/excel/upload-async/:sheet_name", post(upload_handler))
        .route("/api/excel/task/:task_id", get(task_status_handler))
        .route("/api/excel/download/:task_id", get(download_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Logs a failed request and converts the error into a response.
pub(super) fn reject(correlation_id: Uuid, error: impl Into<ApiErrorResponse>) -> ApiErrorResponse {
    let response = error.into();
    warn!(
        correlation_id = %correlation_id,
        status = response.status.as_u16(),
        code = %response.error.code,
        message = %response.error.message,
        "Request failed"
    );
    response
}

/// Handler for GET /.
async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(
        "Exam Data Manager API",
        json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "storage": state.repository().backend(),
            "fee_estimation": state.pipeline().fees_enabled(),
            "started_at": state.started_at(),
            "docs": {
                "employees": "/api/employees",
                "upload": "/api/excel/upload/{sheet_name}",
                "task": "/api/excel/task/{task_id}",
                "download": "/api/excel/download/{task_id}",
            },
        }),
    ))
}

/// Handler for GET /health.
///
/// Returns 503 when the document store does not answer.
async fn health_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiErrorResponse> {
    let correlation_id = Uuid::new_v4();
    state
        .repository()
        .ping()
        .await
        .map_err(|e| reject(correlation_id, e))?;
    Ok(Json(ApiResponse::ok(
        "healthy",
        json!({
            "status": "healthy",
            "storage": state.repository().backend(),
            "jobs": state.tracker().len().await,
        }),
    )))
}

/// Handler for GET /api/employees/{employee_id}.
async fn get_employee_handler(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<ApiResponse<Employee>>, ApiErrorResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, employee_id = %employee_id, "Fetching employee");

    let employee = state
        .repository()
        .get(&employee_id)
        .await
        .map_err(|e| reject(correlation_id, e))?;
    Ok(Json(ApiResponse::ok("Employee found", employee)))
}

/// Handler for GET /api/employees/name/{name}.
async fn get_employees_by_name_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ListResponse<Employee>>, ApiErrorResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, name = %name, "Fetching employees by name");

    let employees = state
        .repository()
        .get_by_name(&name)
        .await
        .map_err(|e| reject(correlation_id, e))?;
    Ok(Json(ListResponse::ok("Employees found", employees)))
}

/// Handler for POST /api/employees.
async fn create_employee_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateEmployeeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Employee>>), ApiErrorResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing create employee request");

    let Json(request) = payload.map_err(|rejection| reject(correlation_id, rejection))?;
    let employee = state
        .repository()
        .create(request.into())
        .await
        .map_err(|e| reject(correlation_id, e))?;

    info!(correlation_id = %correlation_id, employee_id = %employee.id, "Employee created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Employee created", employee)),
    ))
}

/// Handler for PUT /api/employees/{employee_id}.
async fn update_employee_handler(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    payload: Result<Json<UpdateEmployeeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Employee>>, ApiErrorResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, employee_id = %employee_id, "Processing update employee request");

    let Json(request) = payload.map_err(|rejection| reject(correlation_id, rejection))?;
    let employee = state
        .repository()
        .update(&employee_id, request.into())
        .await
        .map_err(|e| reject(correlation_id, e))?;
    Ok(Json(ApiResponse::ok("Employee updated", employee)))
}

/// Handler for DELETE /api/employees/{employee_id}.
async fn delete_employee_handler(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<ApiResponse<Employee>>, ApiErrorResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, employee_id = %employee_id, "Processing delete employee request");

    let employee = state
        .repository()
        .delete(&employee_id)
        .await
        .map_err(|e| reject(correlation_id, e))?;
    Ok(Json(ApiResponse::ok("Employee deleted", employee)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::config::ServiceConfig;
    use crate::storage::InMemoryStore;

    fn create_test_state() -> (AppState, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::from_config(
            &ServiceConfig::default(),
            store.clone(),
            CancellationToken::new(),
        )
        .unwrap();
        (state, store)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_returns_service_info() {
        let (state, _) = create_test_state();
        let (status, json) = send(create_router(state), empty_request("GET", "/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["storage"], "memory");
        assert_eq!(json["data"]["fee_estimation"], false);
    }

    #[tokio::test]
    async fn test_health_ok_and_unavailable() {
        let (state, store) = create_test_state();
        let router = create_router(state);

        let (status, json) = send(router.clone(), empty_request("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "healthy");

        store.set_unavailable(true);
        let (status, json) = send(router, empty_request("GET", "/health")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_create_returns_201_with_record() {
        let (state, _) = create_test_state();
        let (status, json) = send(
            create_router(state),
            json_request("POST", "/api/employees", r#"{"name": "张三", "venue": "A101"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["name"], "张三");
        assert_eq!(json["data"]["venue"], "A101");
        assert!(json["data"]["id"].is_string());
    }

    #[tokio::test]
    async fn test_create_via_legacy_path() {
        let (state, _) = create_test_state();
        let (status, _) = send(
            create_router(state),
            json_request("POST", "/api/employees/@create", r#"{"name": "李四"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_create_missing_name_is_validation_error() {
        let (state, _) = create_test_state();
        let (status, json) = send(
            create_router(state),
            json_request("POST", "/api/employees", r#"{"phone": "13800138000"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_create_blank_name_is_validation_error() {
        let (state, _) = create_test_state();
        let (status, json) = send(
            create_router(state),
            json_request("POST", "/api/employees", r#"{"name": "  "}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_json_returns_400() {
        let (state, _) = create_test_state();
        let (status, json) = send(
            create_router(state),
            json_request("POST", "/api/employees", "{ invalid json }"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "MALFORMED_JSON");
    }

    #[tokio::test]
    async fn test_get_invalid_id_returns_400() {
        let (state, _) = create_test_state();
        let (status, json) = send(
            create_router(state),
            empty_request("GET", "/api/employees/not-a-uuid"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_get_unknown_id_returns_404() {
        let (state, _) = create_test_state();
        let uri = format!("/api/employees/{}", Uuid::new_v4());
        let (status, json) = send(create_router(state), empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_with_empty_body_returns_400() {
        let (state, _) = create_test_state();
        let router = create_router(state);
        let (_, created) = send(
            router.clone(),
            json_request("POST", "/api/employees", r#"{"name": "张三"}"#),
        )
        .await;
        let uri = format!("/api/employees/{}", created["data"]["id"].as_str().unwrap());

        let (status, _) = send(router, json_request("PUT", &uri, "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_unavailable_returns_503() {
        let (state, store) = create_test_state();
        store.set_unavailable(true);
        let (status, _) = send(
            create_router(state),
            json_request("POST", "/api/employees", r#"{"name": "张三"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
