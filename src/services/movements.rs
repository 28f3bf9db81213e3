use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        movement::{self, Entity as Movement, MovementDirection},
        movement_line::{self, Entity as MovementLine},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    lot::LotKey,
    services::{stock, validation},
};

/// Hard cap on lines per movement, carried over from the ledger's intake
/// contract.
pub const MAX_LINES_PER_MOVEMENT: usize = 100;

const DEFAULT_MAX_TXN_ATTEMPTS: u32 = 3;
const MOVEMENT_SEQUENCE: &str = "movements";

/// One requested line effect within a movement submission.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewMovementLine {
    pub warehouse_id: i32,
    pub product_id: i64,
    pub lot: Option<String>,
    pub expires_on: Option<NaiveDate>,
    pub quantity: i64,
}

/// A movement submission: direction, issuing actor and ordered lines.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub direction: MovementDirection,
    pub created_by: Uuid,
    pub lines: Vec<NewMovementLine>,
}

/// A committed line with the stock level its key ended up at.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommittedLine {
    pub line_no: i32,
    pub warehouse_id: i32,
    pub product_id: i64,
    pub lot: String,
    pub expires_on: Option<NaiveDate>,
    pub quantity: i64,
    pub stock_after: i64,
}

/// The durable result of a successful movement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommittedMovement {
    pub id: i64,
    pub direction: MovementDirection,
    pub occurred_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub lines: Vec<CommittedLine>,
}

/// A ledger record read back from history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MovementRecord {
    #[serde(flatten)]
    pub header: movement::Model,
    pub lines: Vec<movement_line::Model>,
}

/// Filters for listing ledger history.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MovementFilter {
    pub direction: Option<MovementDirection>,
    pub occurred_from: Option<DateTime<Utc>>,
    pub occurred_to: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
}

/// Movement ledger and stock update engine.
///
/// `create_movement` is the only write path: it appends the header and lines
/// and projects them onto the stock entries inside one transaction. History
/// reads never need locking because committed ledger rows are immutable.
#[derive(Clone)]
pub struct MovementService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    max_txn_attempts: u32,
}

impl MovementService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db,
            event_sender,
            max_txn_attempts: DEFAULT_MAX_TXN_ATTEMPTS,
        }
    }

    /// Overrides the bound on transparent retries after write contention.
    pub fn with_max_txn_attempts(mut self, attempts: u32) -> Self {
        self.max_txn_attempts = attempts.max(1);
        self
    }

    /// Records a movement and applies its stock effects atomically.
    ///
    /// On any validation failure the whole movement is rejected and nothing
    /// is durable. Contention with concurrent writers on the same stock keys
    /// is retried with a fresh transaction up to the configured bound, then
    /// surfaced as `ServiceUnavailable`.
    #[instrument(skip(self, new), fields(direction = %new.direction.as_str(), lines = new.lines.len()))]
    pub async fn create_movement(
        &self,
        new: NewMovement,
    ) -> Result<CommittedMovement, ServiceError> {
        self.check_submission(&new)?;

        // Allocated outside the movement transaction so the sequence row
        // lock is released immediately and concurrent movements only ever
        // contend on stock keys they actually share. A movement that fails
        // after this point leaves a gap in the id space.
        let id = next_movement_id(self.db.as_ref()).await?;

        let mut attempt = 0;
        let committed = loop {
            attempt += 1;
            match self.apply_once(id, &new).await {
                Ok(committed) => break committed,
                Err(e) if e.is_transient() && attempt < self.max_txn_attempts => {
                    warn!(attempt = %attempt, error = %e, "Stock contention, retrying movement");
                    continue;
                }
                Err(e) if e.is_transient() => {
                    return Err(ServiceError::ServiceUnavailable(format!(
                        "stock contention persisted across {} attempts: {}",
                        attempt, e
                    )));
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            movement_id = %committed.id,
            direction = %committed.direction.as_str(),
            lines = %committed.lines.len(),
            "Movement committed"
        );
        counter!("stockledger_movements.committed", 1);

        self.emit_committed(&committed).await;
        Ok(committed)
    }

    /// Intake checks that fail before anything touches the database.
    fn check_submission(&self, new: &NewMovement) -> Result<(), ServiceError> {
        if new.lines.is_empty() {
            return Err(ServiceError::BadRequest(
                "a movement must contain at least one line".into(),
            ));
        }

        if new.lines.len() > MAX_LINES_PER_MOVEMENT {
            return Err(ServiceError::BadRequest(format!(
                "a movement may contain at most {} lines, got {}",
                MAX_LINES_PER_MOVEMENT,
                new.lines.len()
            )));
        }

        let today = Utc::now().date_naive();
        for (idx, line) in new.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(ServiceError::InvalidQuantity(format!(
                    "line {}: quantity must be positive, got {}",
                    idx + 1,
                    line.quantity
                )));
            }

            if new.direction == MovementDirection::Inbound {
                if let Some(expires_on) = line.expires_on {
                    if expires_on <= today {
                        return Err(ServiceError::ValidationError(format!(
                            "line {}: product {} lot '{}' expires on {}, which is not in the future",
                            idx + 1,
                            line.product_id,
                            LotKey::resolve(line.lot.as_deref()),
                            expires_on
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// One all-or-nothing attempt: header, lines, per-line stock effects,
    /// in line order.
    async fn apply_once(&self, id: i64, new: &NewMovement) -> Result<CommittedMovement, ServiceError> {
        let new = new.clone();
        self.db
            .transaction::<_, CommittedMovement, ServiceError>(move |txn| {
                Box::pin(async move {
                    let occurred_at = Utc::now();

                    movement::ActiveModel {
                        id: Set(id),
                        direction: Set(new.direction.as_str().to_string()),
                        occurred_at: Set(occurred_at),
                        created_by: Set(new.created_by),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut lines = Vec::with_capacity(new.lines.len());
                    for (idx, line) in new.lines.iter().enumerate() {
                        let line_no = (idx + 1) as i32;
                        let key = LotKey::resolve(line.lot.as_deref());

                        movement_line::ActiveModel {
                            movement_id: Set(id),
                            line_no: Set(line_no),
                            warehouse_id: Set(line.warehouse_id),
                            product_id: Set(line.product_id),
                            lot: Set(key.as_str().to_string()),
                            expires_on: Set(line.expires_on),
                            quantity: Set(line.quantity),
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                        let admission = validation::authorize(
                            txn,
                            new.direction,
                            line.warehouse_id,
                            line.product_id,
                            key,
                            line.expires_on,
                            line.quantity,
                        )
                        .await?;

                        let entry =
                            stock::apply_admission(txn, admission, new.direction, line.quantity)
                                .await?;

                        lines.push(CommittedLine {
                            line_no,
                            warehouse_id: entry.warehouse_id,
                            product_id: entry.product_id,
                            lot: entry.lot,
                            expires_on: entry.expires_on,
                            quantity: line.quantity,
                            stock_after: entry.quantity,
                        });
                    }

                    Ok(CommittedMovement {
                        id,
                        direction: new.direction,
                        occurred_at,
                        created_by: new.created_by,
                        lines,
                    })
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })
    }

    /// Emits the commit notification plus one stock-changed event per
    /// touched key, carrying the key's final quantity.
    ///
    /// Best effort: the ledger write is already durable at this point, so a
    /// delivery failure is logged and counted, never surfaced to the caller.
    async fn emit_committed(&self, committed: &CommittedMovement) {
        let mut events = Vec::with_capacity(committed.lines.len() + 1);
        events.push(Event::MovementCommitted {
            movement_id: committed.id,
            direction: committed.direction.as_str().to_string(),
            created_by: committed.created_by,
            line_count: committed.lines.len(),
        });

        let mut final_levels: BTreeMap<(i32, i64, String), i64> = BTreeMap::new();
        for line in &committed.lines {
            final_levels.insert(
                (line.warehouse_id, line.product_id, line.lot.clone()),
                line.stock_after,
            );
        }
        for ((warehouse_id, product_id, lot), quantity) in final_levels {
            events.push(Event::StockChanged {
                warehouse_id,
                product_id,
                lot,
                quantity,
            });
        }

        for event in events {
            if let Err(e) = self.event_sender.send(event).await {
                error!(
                    movement_id = %committed.id,
                    error = %e,
                    "Failed to publish post-commit event"
                );
                counter!("stockledger_events.publish_failures", 1);
            }
        }
    }

    /// One ledger record with its lines in line order.
    #[instrument(skip(self))]
    pub async fn get_movement(&self, id: i64) -> Result<MovementRecord, ServiceError> {
        let header = Movement::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("movement {} not found", id)))?;

        let lines = MovementLine::find()
            .filter(movement_line::Column::MovementId.eq(id))
            .order_by_asc(movement_line::Column::LineNo)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(MovementRecord { header, lines })
    }

    /// Paginated ledger history, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_movements(
        &self,
        filter: MovementFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<movement::Model>, u64), ServiceError> {
        let mut query = Movement::find();

        if let Some(direction) = filter.direction {
            query = query.filter(movement::Column::Direction.eq(direction.as_str()));
        }
        if let Some(from) = filter.occurred_from {
            query = query.filter(movement::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.occurred_to {
            query = query.filter(movement::Column::OccurredAt.lte(to));
        }
        if let Some(created_by) = filter.created_by {
            query = query.filter(movement::Column::CreatedBy.eq(created_by));
        }

        let paginator = query
            .order_by_desc(movement::Column::OccurredAt)
            .order_by_desc(movement::Column::Id)
            .paginate(self.db.as_ref(), limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }

    /// Lines of one movement, paginated, in line order.
    #[instrument(skip(self))]
    pub async fn movement_lines(
        &self,
        movement_id: i64,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<movement_line::Model>, u64), ServiceError> {
        // 404 for an unknown movement rather than an empty page.
        self.get_header(movement_id).await?;

        let paginator = MovementLine::find()
            .filter(movement_line::Column::MovementId.eq(movement_id))
            .order_by_asc(movement_line::Column::LineNo)
            .paginate(self.db.as_ref(), limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }

    async fn get_header(&self, id: i64) -> Result<movement::Model, ServiceError> {
        Movement::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("movement {} not found", id)))
    }
}

/// Allocates the next movement id from the ledger-owned sequence row.
/// The single-statement increment-and-return keeps the allocation atomic on
/// both supported backends.
async fn next_movement_id<C: ConnectionTrait>(txn: &C) -> Result<i64, ServiceError> {
    let backend = txn.get_database_backend();
    let sql = match backend {
        DbBackend::Postgres => {
            "UPDATE ledger_sequences SET next_value = next_value + 1 WHERE name = $1 RETURNING next_value"
        }
        _ => "UPDATE ledger_sequences SET next_value = next_value + 1 WHERE name = ? RETURNING next_value",
    };

    let row = txn
        .query_one(Statement::from_sql_and_values(
            backend,
            sql,
            [MOVEMENT_SEQUENCE.into()],
        ))
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "ledger sequence '{}' is missing",
                MOVEMENT_SEQUENCE
            ))
        })?;

    row.try_get("", "next_value").map_err(ServiceError::db_error)
}
