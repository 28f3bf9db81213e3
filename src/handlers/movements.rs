use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    entities::movement::MovementDirection,
    errors::ServiceError,
    services::movements::{MovementFilter, NewMovement, NewMovementLine},
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

/// Create the movements router.
pub fn movements_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_movements).post(create_movement))
        .route("/:id", get(get_movement))
        .route("/:id/lines", get(get_movement_lines))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMovementLineRequest {
    pub warehouse_id: i32,
    pub product_id: i64,
    pub lot: Option<String>,
    pub expires_on: Option<NaiveDate>,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMovementRequest {
    /// "inbound" or "outbound"
    pub direction: String,
    pub created_by: Uuid,
    pub lines: Vec<CreateMovementLineRequest>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementListParams {
    pub direction: Option<String>,
    pub occurred_from: Option<DateTime<Utc>>,
    pub occurred_to: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

fn parse_direction(raw: &str) -> Result<MovementDirection, ServiceError> {
    MovementDirection::from_str(raw).ok_or_else(|| {
        ServiceError::BadRequest(format!(
            "direction must be 'inbound' or 'outbound', got '{}'",
            raw
        ))
    })
}

/// Record a movement with all of its lines in one request.
#[utoipa::path(
    post,
    path = "/api/v1/movements",
    request_body = CreateMovementRequest,
    responses(
        (status = 201, description = "Movement committed with resulting stock levels"),
        (status = 400, description = "Malformed submission or invalid quantity/lot date"),
        (status = 409, description = "Lot expiration date conflicts with the recorded one"),
        (status = 422, description = "Insufficient stock for an outbound line"),
    ),
    tag = "movements"
)]
pub async fn create_movement(
    State(state): State<AppState>,
    Json(payload): Json<CreateMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let direction = parse_direction(&payload.direction)?;

    let new = NewMovement {
        direction,
        created_by: payload.created_by,
        lines: payload
            .lines
            .into_iter()
            .map(|l| NewMovementLine {
                warehouse_id: l.warehouse_id,
                product_id: l.product_id,
                lot: l.lot,
                expires_on: l.expires_on,
                quantity: l.quantity,
            })
            .collect(),
    };

    let committed = state.movement_service.create_movement(new).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(committed))))
}

/// List ledger history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/movements",
    params(MovementListParams),
    responses((status = 200, description = "Page of movements")),
    tag = "movements"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(params): Query<MovementListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let direction = params
        .direction
        .as_deref()
        .map(parse_direction)
        .transpose()?;

    let filter = MovementFilter {
        direction,
        occurred_from: params.occurred_from,
        occurred_to: params.occurred_to,
        created_by: params.created_by,
    };

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 1000);

    let (items, total) = state
        .movement_service
        .list_movements(filter, page, limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        total_pages: total.div_ceil(limit),
        items,
        total,
        page,
        limit,
    })))
}

/// One movement with all of its lines.
#[utoipa::path(
    get,
    path = "/api/v1/movements/{id}",
    params(("id" = i64, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Movement with lines"),
        (status = 404, description = "Unknown movement"),
    ),
    tag = "movements"
)]
pub async fn get_movement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state.movement_service.get_movement(id).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// Lines of one movement in line order.
#[utoipa::path(
    get,
    path = "/api/v1/movements/{id}/lines",
    params(("id" = i64, Path, description = "Movement id"), ListQuery),
    responses(
        (status = 200, description = "Page of movement lines"),
        (status = 404, description = "Unknown movement"),
    ),
    tag = "movements"
)]
pub async fn get_movement_lines(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, limit) = (params.page(), params.limit());

    let (items, total) = state.movement_service.movement_lines(id, page, limit).await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        total_pages: total.div_ceil(limit),
        items,
        total,
        page,
        limit,
    })))
}
