pub mod questions;
pub mod stats_store;
