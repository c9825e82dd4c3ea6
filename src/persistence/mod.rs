pub mod adapter;
pub mod backup;
pub mod store;
