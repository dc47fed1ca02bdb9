pub mod comparator;
pub mod domain;
pub mod errors;
pub mod evaluator;
pub mod pipeline;
pub mod stats;
pub mod traits;
