use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Current-stock projection keyed by (warehouse, product, lot).
        // The version column backs the optimistic read-check-write cycle.
        manager
            .create_table(
                Table::create()
                    .table(StockEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockEntries::WarehouseId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockEntries::ProductId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockEntries::Lot).string_len(50).not_null())
                    .col(ColumnDef::new(StockEntries::ExpiresOn).date().null())
                    .col(
                        ColumnDef::new(StockEntries::Quantity)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(StockEntries::Quantity).gte(0)),
                    )
                    .col(ColumnDef::new(StockEntries::Version).integer().not_null())
                    .col(
                        ColumnDef::new(StockEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(StockEntries::WarehouseId)
                            .col(StockEntries::ProductId)
                            .col(StockEntries::Lot),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockEntries::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StockEntries {
    Table,
    WarehouseId,
    ProductId,
    Lot,
    ExpiresOn,
    Quantity,
    Version,
    CreatedAt,
    UpdatedAt,
}
