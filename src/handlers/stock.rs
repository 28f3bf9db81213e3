use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{errors::ServiceError, ApiResponse, AppState, ListQuery, PaginatedResponse};

/// Create the stock router.
pub fn stock_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stock))
        .route("/warehouse/:warehouse_id", get(stock_for_warehouse))
        .route("/warehouse/:warehouse_id/totals", get(warehouse_totals))
        .route(
            "/warehouse/:warehouse_id/product/:product_id",
            get(stock_for_product),
        )
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StockLotParams {
    /// Lot identifier; omit for the aggregate of all lots, pass a value for
    /// one specific lot (an empty value means the canonical no-lot entry).
    pub lot: Option<String>,
}

/// All stock entries across warehouses.
#[utoipa::path(
    get,
    path = "/api/v1/stock",
    params(ListQuery),
    responses((status = 200, description = "Page of stock entries")),
    tag = "stock"
)]
pub async fn list_stock(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, limit) = (params.page(), params.limit());

    let (items, total) = state.stock_service.list_stock(page, limit).await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        total_pages: total.div_ceil(limit),
        items,
        total,
        page,
        limit,
    })))
}

/// Stock of one warehouse.
#[utoipa::path(
    get,
    path = "/api/v1/stock/warehouse/{warehouse_id}",
    params(("warehouse_id" = i32, Path, description = "Warehouse"), ListQuery),
    responses((status = 200, description = "Page of stock entries")),
    tag = "stock"
)]
pub async fn stock_for_warehouse(
    State(state): State<AppState>,
    Path(warehouse_id): Path<i32>,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, limit) = (params.page(), params.limit());

    let (items, total) = state
        .stock_service
        .stock_for_warehouse(warehouse_id, page, limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        total_pages: total.div_ceil(limit),
        items,
        total,
        page,
        limit,
    })))
}

/// Per-product totals across all lots of a warehouse.
#[utoipa::path(
    get,
    path = "/api/v1/stock/warehouse/{warehouse_id}/totals",
    params(("warehouse_id" = i32, Path, description = "Warehouse")),
    responses((status = 200, description = "Per-product quantity totals")),
    tag = "stock"
)]
pub async fn warehouse_totals(
    State(state): State<AppState>,
    Path(warehouse_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let totals = state.stock_service.totals_for_warehouse(warehouse_id).await?;
    Ok(Json(ApiResponse::success(totals)))
}

/// Stock of one product in one warehouse: all lot entries, or a single
/// entry when a lot is named.
#[utoipa::path(
    get,
    path = "/api/v1/stock/warehouse/{warehouse_id}/product/{product_id}",
    params(
        ("warehouse_id" = i32, Path, description = "Warehouse"),
        ("product_id" = i64, Path, description = "Product"),
        StockLotParams
    ),
    responses(
        (status = 200, description = "Stock entries for the product"),
        (status = 404, description = "No entry for the requested lot"),
    ),
    tag = "stock"
)]
pub async fn stock_for_product(
    State(state): State<AppState>,
    Path((warehouse_id, product_id)): Path<(i32, i64)>,
    Query(params): Query<StockLotParams>,
) -> Result<impl IntoResponse, ServiceError> {
    match params.lot {
        Some(lot) => {
            let entry = state
                .stock_service
                .get_entry(warehouse_id, product_id, Some(lot.as_str()))
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "no stock entry for product {} in warehouse {} (lot '{}')",
                        product_id, warehouse_id, lot
                    ))
                })?;
            Ok(Json(ApiResponse::success(vec![entry])))
        }
        None => {
            let entries = state
                .stock_service
                .entries_for_product(warehouse_id, product_id)
                .await?;
            Ok(Json(ApiResponse::success(entries)))
        }
    }
}
