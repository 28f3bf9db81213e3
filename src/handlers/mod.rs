pub mod movements;
pub mod stock;
