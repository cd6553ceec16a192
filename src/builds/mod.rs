//! Asynchronous image builds: the job registry and the executor that feeds it.

pub mod executor;
pub mod registry;

pub use executor::BuildExecutor;
pub use registry::{BuildJob, BuildStatus, BuildSummary, JobRegistry, Transition};
