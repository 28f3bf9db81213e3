mod common;

use assert_matches::assert_matches;
use stockledger_api::{
    entities::movement::MovementDirection, errors::ServiceError, lot::NO_LOT,
    services::movements::MovementFilter,
};

use common::{future_date, inbound, line, outbound, TestApp};

/// Seed two warehouses with a mix of lotted and unlotted stock.
async fn seed(app: &TestApp) {
    app.movements()
        .create_movement(inbound(vec![
            line(1, 100, Some("LOT-A"), Some(future_date(30)), 10),
            line(1, 100, Some("LOT-B"), Some(future_date(60)), 4),
            line(1, 200, None, None, 7),
            line(2, 100, Some("LOT-A"), Some(future_date(30)), 2),
        ]))
        .await
        .expect("seed inbound");

    app.movements()
        .create_movement(outbound(vec![line(1, 200, None, None, 3)]))
        .await
        .expect("seed outbound");
}

#[tokio::test]
async fn list_stock_orders_by_warehouse_product_lot() {
    let app = TestApp::new().await;
    seed(&app).await;

    let (entries, total) = app.stock().list_stock(1, 50).await.unwrap();
    assert_eq!(total, 4);
    let keys: Vec<_> = entries
        .iter()
        .map(|e| (e.warehouse_id, e.product_id, e.lot.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            (1, 100, "LOT-A"),
            (1, 100, "LOT-B"),
            (1, 200, NO_LOT),
            (2, 100, "LOT-A"),
        ]
    );
}

#[tokio::test]
async fn warehouse_stock_is_scoped_and_paginated() {
    let app = TestApp::new().await;
    seed(&app).await;

    let (entries, total) = app.stock().stock_for_warehouse(1, 1, 2).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.warehouse_id == 1));

    let (page_two, _) = app.stock().stock_for_warehouse(1, 2, 2).await.unwrap();
    assert_eq!(page_two.len(), 1);
}

#[tokio::test]
async fn product_entries_cover_every_lot() {
    let app = TestApp::new().await;
    seed(&app).await;

    let entries = app.stock().entries_for_product(1, 100).await.unwrap();
    let lots: Vec<_> = entries.iter().map(|e| e.lot.as_str()).collect();
    assert_eq!(lots, vec!["LOT-A", "LOT-B"]);
}

#[tokio::test]
async fn get_entry_resolves_lot_spelling() {
    let app = TestApp::new().await;
    seed(&app).await;

    let entry = app
        .stock()
        .get_entry(1, 200, None)
        .await
        .unwrap()
        .expect("unlotted entry exists");
    assert_eq!(entry.lot, NO_LOT);
    assert_eq!(entry.quantity, 4);

    // A blank lot string reaches the same entry.
    let entry = app
        .stock()
        .get_entry(1, 200, Some("   "))
        .await
        .unwrap()
        .expect("blank lot resolves to the marker");
    assert_eq!(entry.quantity, 4);

    assert!(app.stock().get_entry(9, 999, None).await.unwrap().is_none());
}

#[tokio::test]
async fn warehouse_totals_sum_across_lots() {
    let app = TestApp::new().await;
    seed(&app).await;

    let totals = app.stock().totals_for_warehouse(1).await.unwrap();
    let pairs: Vec<_> = totals.iter().map(|t| (t.product_id, t.quantity)).collect();
    assert_eq!(pairs, vec![(100, 14), (200, 4)]);
}

#[tokio::test]
async fn movement_record_reads_back_lines_in_order() {
    let app = TestApp::new().await;
    seed(&app).await;

    let record = app.movements().get_movement(1).await.unwrap();
    assert_eq!(record.header.id, 1);
    assert_eq!(record.header.direction, "inbound");
    let line_nos: Vec<_> = record.lines.iter().map(|l| l.line_no).collect();
    assert_eq!(line_nos, vec![1, 2, 3, 4]);
    assert_eq!(record.lines[2].lot, NO_LOT);
}

#[tokio::test]
async fn movement_history_filters_by_direction() {
    let app = TestApp::new().await;
    seed(&app).await;

    let filter = MovementFilter {
        direction: Some(MovementDirection::Outbound),
        ..Default::default()
    };
    let (items, total) = app.movements().list_movements(filter, 1, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].direction, "outbound");

    let (all, total) = app
        .movements()
        .list_movements(Default::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 2);
    // Newest first.
    assert_eq!(all[0].id, 2);
    assert_eq!(all[1].id, 1);
}

#[tokio::test]
async fn unknown_movement_is_not_found() {
    let app = TestApp::new().await;

    let err = app.movements().get_movement(42).await.expect_err("no such id");
    assert_matches!(err, ServiceError::NotFound(_));

    let err = app
        .movements()
        .movement_lines(42, 1, 10)
        .await
        .expect_err("lines of a missing movement");
    assert_matches!(err, ServiceError::NotFound(_));
}
