pub mod classify;
pub mod levels;
