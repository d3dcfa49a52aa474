use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};

use crate::api::requests::{clamp_limit, CreateTargetRequest, ListResultsQuery, ListTargetsQuery};
use crate::api::responses::{ErrorResponse, ResultListResponse, TargetListResponse};
use crate::error::AppError;
use crate::models::{Cursor, Target};
use crate::services::TargetService;

use super::routes::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Registers a target, honoring the `Idempotency-Key` header. 201 when this
/// request created the target, 200 when it already existed.
pub async fn create_target(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateTargetRequest>,
) -> Result<(StatusCode, Json<Target>), ApiError> {
    if let Err(msg) = request.validate() {
        return Err(bad_request("VALIDATION_ERROR", msg));
    }

    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty());

    let service = TargetService::new(state.store.clone());
    match service.register(&request.url, idempotency_key).await {
        Ok((target, created)) => {
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok((status, Json(target)))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// Lists targets with an optional host filter and cursor pagination.
pub async fn list_targets(
    State(state): State<AppState>,
    Query(query): Query<ListTargetsQuery>,
) -> Result<Json<TargetListResponse>, ApiError> {
    let limit = clamp_limit(query.limit, 20, 100);
    let host = query
        .host
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_lowercase);

    let after = match query.page_token.as_deref() {
        Some(token) => Some(Cursor::decode(token).map_err(error_response)?),
        None => None,
    };

    let service = TargetService::new(state.store.clone());
    let (items, next) = service
        .list_targets(host.as_deref(), after.as_ref(), limit)
        .await
        .map_err(error_response)?;

    Ok(Json(TargetListResponse {
        items,
        next_page_token: next.map(|c| c.encode()),
    }))
}

/// Returns recent check results for a target, newest first.
pub async fn list_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListResultsQuery>,
) -> Result<Json<ResultListResponse>, ApiError> {
    let limit = clamp_limit(query.limit, 50, 200);

    let since: Option<DateTime<Utc>> = match query.since.as_deref() {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(_) => {
                return Err(bad_request(
                    "VALIDATION_ERROR",
                    "bad since (use RFC3339)".to_string(),
                ));
            }
        },
        None => None,
    };

    let service = TargetService::new(state.store.clone());
    let items = service
        .list_results(&id, since, limit)
        .await
        .map_err(error_response)?;

    Ok(Json(ResultListResponse { items }))
}

/// Health probe: 200 when the store is reachable and the checker is not
/// stopped, else 503.
pub async fn healthz(
    State(state): State<AppState>,
) -> (StatusCode, Json<crate::observability::HealthReport>) {
    let report = state.health.check().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Prometheus exposition.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    match &state.metrics_handle {
        Some(handle) => Ok(handle.render()),
        None => Err(StatusCode::NOT_FOUND),
    }
}

fn bad_request(code: &str, message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(code, message)),
    )
}

/// Maps the error taxonomy onto wire responses. Internal detail stays in the
/// logs.
fn error_response(err: AppError) -> ApiError {
    match err {
        AppError::InvalidUrl(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("INVALID_URL", msg)),
        ),
        AppError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("VALIDATION_ERROR", msg)),
        ),
        AppError::IdempotencyConflict => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(
                "IDEMPOTENCY_CONFLICT",
                "idempotency key already used with a different request",
            )),
        ),
        AppError::Database(e) => {
            tracing::error!(error = %e, "store operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("STORE_UNAVAILABLE", "store operation failed")),
            )
        }
        e => {
            tracing::error!(error = %e, "internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("INTERNAL_ERROR", "an internal error occurred")),
            )
        }
    }
}
