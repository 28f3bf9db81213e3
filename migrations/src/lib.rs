pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_movements_table;
mod m20240301_000002_create_movement_lines_table;
mod m20240301_000003_create_stock_entries_table;
mod m20240301_000004_create_ledger_sequences_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_movements_table::Migration),
            Box::new(m20240301_000002_create_movement_lines_table::Migration),
            Box::new(m20240301_000003_create_stock_entries_table::Migration),
            Box::new(m20240301_000004_create_ledger_sequences_table::Migration),
        ]
    }
}
