use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MovementLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MovementLines::MovementId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MovementLines::LineNo).integer().not_null())
                    .col(
                        ColumnDef::new(MovementLines::WarehouseId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MovementLines::ProductId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MovementLines::Lot)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MovementLines::ExpiresOn).date().null())
                    .col(
                        ColumnDef::new(MovementLines::Quantity)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(MovementLines::Quantity).gt(0)),
                    )
                    .primary_key(
                        Index::create()
                            .col(MovementLines::MovementId)
                            .col(MovementLines::LineNo),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movement_lines_movement")
                            .from(MovementLines::Table, MovementLines::MovementId)
                            .to(Movements::Table, Movements::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movement_lines_stock_key")
                    .table(MovementLines::Table)
                    .col(MovementLines::WarehouseId)
                    .col(MovementLines::ProductId)
                    .col(MovementLines::Lot)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MovementLines::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MovementLines {
    Table,
    MovementId,
    LineNo,
    WarehouseId,
    ProductId,
    Lot,
    ExpiresOn,
    Quantity,
}

#[derive(Iden)]
enum Movements {
    Table,
    Id,
}
