pub mod app;
pub mod cli;
pub mod commons;
pub mod error;
pub mod geo_core;
pub mod geometric;
pub mod pipeline;

pub use app::{run, run_with, RunOptions, RunReport};
pub use error::DemError;
