pub mod movements;
pub mod stock;
pub mod validation;
