use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use tracing::{instrument, warn};

use crate::{
    entities::{
        movement::MovementDirection,
        stock_entry::{self, Entity as StockEntry},
    },
    errors::ServiceError,
    lot::LotKey,
    services::validation::StockAdmission,
};

/// Consumes an admission token and applies the line effect to the stock
/// entry it was issued for, inside the movement's transaction.
///
/// Both branches use optimistic writes: the insert relies on the primary key
/// to detect a concurrent first-inbound race, the update filters on the
/// version observed at validation time. Either miss maps to
/// `ServiceError::Conflict`, which the engine retries with a fresh
/// transaction.
pub(crate) async fn apply_admission<C: ConnectionTrait>(
    txn: &C,
    admission: StockAdmission,
    direction: MovementDirection,
    amount: i64,
) -> Result<stock_entry::Model, ServiceError> {
    let StockAdmission {
        warehouse_id,
        product_id,
        key,
        expires_on,
        existing,
    } = admission;

    match (direction, existing) {
        (MovementDirection::Inbound, None) => {
            let now = Utc::now();
            let entry = stock_entry::ActiveModel {
                warehouse_id: Set(warehouse_id),
                product_id: Set(product_id),
                lot: Set(key.into_string()),
                expires_on: Set(expires_on),
                quantity: Set(amount),
                version: Set(1),
                created_at: Set(now),
                updated_at: Set(now),
            };

            entry.insert(txn).await.map_err(|e| {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    ServiceError::Conflict(format!(
                        "stock entry ({}, {}) created concurrently",
                        warehouse_id, product_id
                    ))
                } else {
                    ServiceError::db_error(e)
                }
            })
        }
        (MovementDirection::Inbound, Some(entry)) => {
            write_quantity(txn, entry, move |q| q + amount).await
        }
        (MovementDirection::Outbound, Some(entry)) => {
            let quantity = entry.quantity;
            if amount > quantity {
                // Structural safety net: the validator's sufficiency rule
                // should make this unreachable. A clamp firing means a
                // bypassed check somewhere upstream.
                warn!(
                    warehouse_id = %warehouse_id,
                    product_id = %product_id,
                    lot = %entry.lot,
                    available = %quantity,
                    requested = %amount,
                    "Structural floor clamped a subtraction below zero"
                );
                counter!("stockledger_stock.structural_floor", 1);
            }
            write_quantity(txn, entry, move |q| (q - amount).max(0)).await
        }
        (MovementDirection::Outbound, None) => {
            // The validator refuses outbound lines without an entry.
            Err(ServiceError::InternalError(format!(
                "outbound admission without stock entry for product {} in warehouse {}",
                product_id, warehouse_id
            )))
        }
    }
}

async fn write_quantity<C: ConnectionTrait>(
    txn: &C,
    entry: stock_entry::Model,
    f: impl FnOnce(i64) -> i64,
) -> Result<stock_entry::Model, ServiceError> {
    let new_quantity = f(entry.quantity);
    let now = Utc::now();

    let result = StockEntry::update_many()
        .col_expr(stock_entry::Column::Quantity, Expr::value(new_quantity))
        .col_expr(stock_entry::Column::Version, Expr::value(entry.version + 1))
        .col_expr(stock_entry::Column::UpdatedAt, Expr::value(now))
        .filter(stock_entry::Column::WarehouseId.eq(entry.warehouse_id))
        .filter(stock_entry::Column::ProductId.eq(entry.product_id))
        .filter(stock_entry::Column::Lot.eq(entry.lot.clone()))
        .filter(stock_entry::Column::Version.eq(entry.version))
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "stock entry ({}, {}, '{}') modified concurrently",
            entry.warehouse_id, entry.product_id, entry.lot
        )));
    }

    Ok(stock_entry::Model {
        quantity: new_quantity,
        version: entry.version + 1,
        updated_at: now,
        ..entry
    })
}

/// Read side of the stock projection, used by reporting and the HTTP layer.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DatabaseConnection>,
}

/// Aggregate quantity of one product across all lots of a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct ProductTotal {
    pub product_id: i64,
    pub quantity: i64,
}

impl StockService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists all stock entries ordered by (warehouse, product, lot).
    #[instrument(skip(self))]
    pub async fn list_stock(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_entry::Model>, u64), ServiceError> {
        let paginator = StockEntry::find()
            .order_by_asc(stock_entry::Column::WarehouseId)
            .order_by_asc(stock_entry::Column::ProductId)
            .order_by_asc(stock_entry::Column::Lot)
            .paginate(self.db.as_ref(), limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }

    /// Lists the stock of one warehouse.
    #[instrument(skip(self))]
    pub async fn stock_for_warehouse(
        &self,
        warehouse_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_entry::Model>, u64), ServiceError> {
        let paginator = StockEntry::find()
            .filter(stock_entry::Column::WarehouseId.eq(warehouse_id))
            .order_by_asc(stock_entry::Column::ProductId)
            .order_by_asc(stock_entry::Column::Lot)
            .paginate(self.db.as_ref(), limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }

    /// All lot-level entries of one product in one warehouse.
    #[instrument(skip(self))]
    pub async fn entries_for_product(
        &self,
        warehouse_id: i32,
        product_id: i64,
    ) -> Result<Vec<stock_entry::Model>, ServiceError> {
        StockEntry::find()
            .filter(stock_entry::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_entry::Column::ProductId.eq(product_id))
            .order_by_asc(stock_entry::Column::Lot)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// One entry by its full (warehouse, product, lot) key; the lot is
    /// resolved through the same normalization the engine uses.
    #[instrument(skip(self))]
    pub async fn get_entry(
        &self,
        warehouse_id: i32,
        product_id: i64,
        lot: Option<&str>,
    ) -> Result<Option<stock_entry::Model>, ServiceError> {
        let key = LotKey::resolve(lot);
        StockEntry::find_by_id((warehouse_id, product_id, key.into_string()))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Current quantity for a key, or `None` when no entry exists.
    pub async fn get_quantity(
        &self,
        warehouse_id: i32,
        product_id: i64,
        lot: Option<&str>,
    ) -> Result<Option<i64>, ServiceError> {
        Ok(self
            .get_entry(warehouse_id, product_id, lot)
            .await?
            .map(|e| e.quantity))
    }

    /// Per-product totals across all lots of a warehouse. Summed here
    /// rather than in SQL so the result type is backend independent.
    #[instrument(skip(self))]
    pub async fn totals_for_warehouse(
        &self,
        warehouse_id: i32,
    ) -> Result<Vec<ProductTotal>, ServiceError> {
        let entries = StockEntry::find()
            .filter(stock_entry::Column::WarehouseId.eq(warehouse_id))
            .order_by_asc(stock_entry::Column::ProductId)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let mut totals: Vec<ProductTotal> = Vec::new();
        for entry in entries {
            match totals.last_mut() {
                Some(t) if t.product_id == entry.product_id => t.quantity += entry.quantity,
                _ => totals.push(ProductTotal {
                    product_id: entry.product_id,
                    quantity: entry.quantity,
                }),
            }
        }

        Ok(totals)
    }
}
