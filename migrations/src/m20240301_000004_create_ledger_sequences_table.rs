use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LedgerSequences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerSequences::Name)
                            .string_len(32)
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerSequences::NextValue)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Seed the movement id sequence at zero; the first allocated id is 1.
        let insert = Query::insert()
            .into_table(LedgerSequences::Table)
            .columns([LedgerSequences::Name, LedgerSequences::NextValue])
            .values_panic(["movements".into(), 0i64.into()])
            .to_owned();
        manager.exec_stmt(insert).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerSequences::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum LedgerSequences {
    Table,
    Name,
    NextValue,
}
