pub mod types;
pub mod warehouse;

pub use warehouse::BigQueryWarehouse;
