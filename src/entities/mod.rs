pub mod ledger_sequence;
pub mod movement;
pub mod movement_line;
pub mod stock_entry;
