use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, EntityTrait};

use crate::{
    entities::{
        movement::MovementDirection,
        stock_entry::{self, Entity as StockEntry},
    },
    errors::ServiceError,
    lot::LotKey,
};

/// Proof that a pending line effect passed validation.
///
/// Produced by [`authorize`] and consumed exactly once by the stock store
/// inside the same transaction; it is deliberately not `Clone`, so a token
/// cannot outlive the read it is based on.
pub struct StockAdmission {
    pub(crate) warehouse_id: i32,
    pub(crate) product_id: i64,
    pub(crate) key: LotKey,
    pub(crate) expires_on: Option<NaiveDate>,
    pub(crate) existing: Option<stock_entry::Model>,
}

/// Decides whether a pending stock mutation is admissible.
///
/// Rules run in a fixed order and each one rejects the whole movement:
/// 1. no-lot keys must not carry an expiration date;
/// 2. the date recorded when a lot's entry was first created is immutable,
///    with an absent date treated as a recorded value, so any mismatch
///    (including none-vs-some in either direction) is a conflict;
/// 3. outbound lines need an existing entry with enough quantity;
/// 4. the requested quantity must be positive (re-checked here even though
///    line creation already enforces it).
pub async fn authorize<C: ConnectionTrait>(
    txn: &C,
    direction: MovementDirection,
    warehouse_id: i32,
    product_id: i64,
    key: LotKey,
    expires_on: Option<NaiveDate>,
    quantity: i64,
) -> Result<StockAdmission, ServiceError> {
    if key.is_no_lot() && expires_on.is_some() {
        return Err(ServiceError::InvalidLotDate(format!(
            "product {} in warehouse {} has no lot but carries expiration date {}",
            product_id,
            warehouse_id,
            expires_on.unwrap_or_default()
        )));
    }

    let existing = StockEntry::find_by_id((warehouse_id, product_id, key.as_str().to_string()))
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?;

    if !key.is_no_lot() {
        if let Some(entry) = &existing {
            if entry.expires_on != expires_on {
                return Err(ServiceError::LotDateConflict(format!(
                    "lot '{}' of product {} in warehouse {} is recorded with expiration {:?}, line supplies {:?}",
                    key, product_id, warehouse_id, entry.expires_on, expires_on
                )));
            }
        }
    }

    if direction == MovementDirection::Outbound {
        let available = existing.as_ref().map(|e| e.quantity).unwrap_or(0);
        if existing.is_none() || available < quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "product {} in warehouse {} (lot '{}'): requested {}, available {}",
                product_id, warehouse_id, key, quantity, available
            )));
        }
    }

    if quantity <= 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }

    Ok(StockAdmission {
        warehouse_id,
        product_id,
        key,
        expires_on,
        existing,
    })
}
