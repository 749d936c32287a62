pub mod config;
pub mod error;
pub mod evaluator;
pub mod git;
pub mod io;
pub mod metrics;
pub mod narrative;
pub mod paths;
pub mod snapshot;
pub mod store;
pub mod test_runner;
pub mod types;

pub use error::{ContextError, Result};
