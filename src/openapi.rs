use utoipa::OpenApi;

/// Aggregated OpenAPI document for the v1 API, served as plain JSON at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockledger API",
        version = "0.1.0",
        description = "Inventory movement ledger with a transactional, lot-aware current-stock projection.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    tags(
        (name = "movements", description = "Append-only movement ledger"),
        (name = "stock", description = "Current-stock projection queries")
    ),
    paths(
        crate::handlers::movements::create_movement,
        crate::handlers::movements::list_movements,
        crate::handlers::movements::get_movement,
        crate::handlers::movements::get_movement_lines,
        crate::handlers::stock::list_stock,
        crate::handlers::stock::stock_for_warehouse,
        crate::handlers::stock::warehouse_totals,
        crate::handlers::stock::stock_for_product,
    ),
    components(
        schemas(
            crate::handlers::movements::CreateMovementRequest,
            crate::handlers::movements::CreateMovementLineRequest,
            crate::services::movements::CommittedMovement,
            crate::services::movements::CommittedLine,
            crate::services::stock::ProductTotal,
            crate::entities::movement::MovementDirection,
            crate::errors::ErrorResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_covers_both_routers() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).expect("document serializes");
        assert!(json.contains("/api/v1/movements"));
        assert!(json.contains("/api/v1/stock/warehouse/{warehouse_id}/totals"));
        assert!(json.contains("CreateMovementRequest"));
    }
}
