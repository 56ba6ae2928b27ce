//! Content pipeline: merge engine, top-post ranking, and run orchestration.

pub mod merge;
pub mod rank;
pub mod runner;
pub mod types;

pub use runner::Pipeline;
