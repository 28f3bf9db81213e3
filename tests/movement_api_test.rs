mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{future_date, TestApp};

fn movement_body(direction: &str, lines: serde_json::Value) -> serde_json::Value {
    json!({
        "direction": direction,
        "created_by": Uuid::new_v4(),
        "lines": lines,
    })
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = TestApp::new().await;

    let (status, body) = app.request_json(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request_json(Method::GET, "/api-docs/openapi.json", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/movements"].is_object());
    assert!(body["components"]["schemas"]["CreateMovementRequest"].is_object());
}

#[tokio::test]
async fn post_movement_commits_and_reads_back() {
    let app = TestApp::new().await;
    let expiry = future_date(45).to_string();

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/movements",
            Some(movement_body(
                "inbound",
                json!([
                    {"warehouse_id": 1, "product_id": 100, "lot": "LOT-A", "expires_on": expiry, "quantity": 10},
                    {"warehouse_id": 1, "product_id": 200, "quantity": 3},
                ]),
            )),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let id = body["data"]["id"].as_i64().expect("movement id");
    assert_eq!(body["data"]["lines"][0]["stock_after"], 10);
    assert_eq!(body["data"]["lines"][1]["lot"], "NO_LOT");

    let (status, body) = app
        .request_json(Method::GET, &format!("/api/v1/movements/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["direction"], "inbound");
    assert_eq!(body["data"]["lines"].as_array().map(Vec::len), Some(2));

    let (status, body) = app
        .request_json(Method::GET, &format!("/api/v1/movements/{id}/lines"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn stock_endpoints_reflect_committed_movements() {
    let app = TestApp::new().await;
    let expiry = future_date(45).to_string();

    let (status, _) = app
        .request_json(
            Method::POST,
            "/api/v1/movements",
            Some(movement_body(
                "inbound",
                json!([
                    {"warehouse_id": 1, "product_id": 100, "lot": "LOT-A", "expires_on": expiry, "quantity": 10},
                    {"warehouse_id": 1, "product_id": 100, "lot": "LOT-B", "quantity": 4},
                ]),
            )),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request_json(Method::GET, "/api/v1/stock/warehouse/1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    let (status, body) = app
        .request_json(Method::GET, "/api/v1/stock/warehouse/1/totals", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["product_id"], 100);
    assert_eq!(body["data"][0]["quantity"], 14);

    let (status, body) = app
        .request_json(
            Method::GET,
            "/api/v1/stock/warehouse/1/product/100?lot=LOT-B",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["quantity"], 4);
}

#[tokio::test]
async fn validation_failures_map_to_http_statuses() {
    let app = TestApp::new().await;

    // Unknown direction.
    let (status, _) = app
        .request_json(
            Method::POST,
            "/api/v1/movements",
            Some(movement_body(
                "sideways",
                json!([{"warehouse_id": 1, "product_id": 100, "quantity": 1}]),
            )),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Outbound with nothing on hand.
    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/movements",
            Some(movement_body(
                "outbound",
                json!([{"warehouse_id": 1, "product_id": 100, "quantity": 1}]),
            )),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Unprocessable Entity");

    // Expiration date without a lot.
    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/movements",
            Some(movement_body(
                "inbound",
                json!([{
                    "warehouse_id": 1,
                    "product_id": 100,
                    "expires_on": future_date(30).to_string(),
                    "quantity": 1,
                }]),
            )),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");

    // Conflicting lot date on a second inbound.
    let first = movement_body(
        "inbound",
        json!([{
            "warehouse_id": 1,
            "product_id": 100,
            "lot": "LOT-A",
            "expires_on": future_date(30).to_string(),
            "quantity": 1,
        }]),
    );
    let (status, _) = app.request_json(Method::POST, "/api/v1/movements", Some(first)).await;
    assert_eq!(status, StatusCode::CREATED);

    let second = movement_body(
        "inbound",
        json!([{
            "warehouse_id": 1,
            "product_id": 100,
            "lot": "LOT-A",
            "expires_on": future_date(60).to_string(),
            "quantity": 1,
        }]),
    );
    let (status, body) = app.request_json(Method::POST, "/api/v1/movements", Some(second)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");

    let (status, _) = app
        .request_json(Method::GET, "/api/v1/movements/999", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
