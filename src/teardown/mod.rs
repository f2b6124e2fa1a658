//! Dependency resolver for composite resources (children before parent).

pub mod resolver;
pub mod state;
