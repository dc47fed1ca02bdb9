pub mod repository;
pub mod sandbox;
