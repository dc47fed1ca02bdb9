/// Native module contains implementations of core traits
/// that talk to the host OS directly, without containers.
pub mod sandbox;
