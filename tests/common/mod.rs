use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, Response, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use stockledger_api::{
    app_router,
    config::AppConfig,
    db,
    entities::movement::MovementDirection,
    events::{self, EventSender},
    services::{
        movements::{MovementService, NewMovement, NewMovementLine},
        stock::StockService,
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Test harness wrapping an application state backed by an in-memory
/// SQLite database. The pool is pinned to a single connection so every
/// query sees the same in-memory database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with a fresh schema.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let (tx, rx) = mpsc::channel(cfg.event_buffer_size);
        let event_sender = EventSender::new(tx);
        let stock_feed = events::stock_feed(cfg.stock_feed_capacity);
        let event_task = tokio::spawn(events::process_events(rx, stock_feed.clone()));

        let movement_service = MovementService::new(db.clone(), event_sender.clone())
            .with_max_txn_attempts(cfg.movement_txn_attempts);
        let stock_service = StockService::new(db.clone());

        let state = AppState {
            db,
            config: cfg,
            event_sender,
            movement_service,
            stock_service,
            stock_feed,
        };
        let router = app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub fn movements(&self) -> &MovementService {
        &self.state.movement_service
    }

    pub fn stock(&self) -> &StockService {
        &self.state.stock_service
    }

    /// Send a JSON request through the full router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response<axum::body::Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).expect("failed to build request"))
            .await
            .expect("request failed")
    }

    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response was not JSON")
        };
        (status, json)
    }
}

/// A date safely in the future relative to the intake expiry check.
pub fn future_date(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

pub fn line(
    warehouse_id: i32,
    product_id: i64,
    lot: Option<&str>,
    expires_on: Option<NaiveDate>,
    quantity: i64,
) -> NewMovementLine {
    NewMovementLine {
        warehouse_id,
        product_id,
        lot: lot.map(str::to_string),
        expires_on,
        quantity,
    }
}

pub fn inbound(lines: Vec<NewMovementLine>) -> NewMovement {
    NewMovement {
        direction: MovementDirection::Inbound,
        created_by: Uuid::new_v4(),
        lines,
    }
}

pub fn outbound(lines: Vec<NewMovementLine>) -> NewMovement {
    NewMovement {
        direction: MovementDirection::Outbound,
        created_by: Uuid::new_v4(),
        lines,
    }
}
