pub mod reporter;
pub mod snapshot;
pub mod store;
pub mod transition;
