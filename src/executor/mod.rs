//! Runs the build and run steps of resolved tests.

mod context;
mod job;
pub mod results;

pub use context::Context;
pub use job::Job;
