//! Multi-type sweep: resource capability trait, runner and run report.

pub mod report;
pub mod resource;
pub mod runner;
