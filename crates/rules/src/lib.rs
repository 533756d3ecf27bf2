//! Rule language for rule discovery.
//!
//! This crate provides:
//! - A small expression language compiled once and evaluated per record
//! - The rule algebra: typed rule variants with canonical strings,
//!   composition, tweaking and decimal-place reduction
//! - Candidate generation from a dataset description via an explicit
//!   generator registry
//! - A per-experiment tracker of rules already assessed

pub mod expr;
pub mod generate;
pub mod rule;
pub mod tracker;

pub use expr::{Expr, ExprError, ExprErrorKind, Vars};
pub use generate::{GenerationOptions, GeneratorRegistry};
pub use rule::{Rule, RuleError, RuleKind};
pub use tracker::RuleTracker;
