//! Policy filter engine: candidates, rules, and the include/exclude evaluator.

pub mod candidate;
pub mod evaluator;
pub mod rules;
