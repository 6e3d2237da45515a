//! Criteria engine and hydration pipeline.
//!
//! This module builds expressions and criteria into SQL text with bind
//! parameters, and runs the load/save/delete pipelines over the SQL
//! interface.

mod criteria;
mod expression;
mod join;
mod linker;
mod loader;
mod persist;

pub use criteria::{Criteria, Prepared};
pub use expression::{Expression, Expressions, Probe};
pub use join::{merge_joins, Join, JoinKey, JoinKind, Joiner};
pub use loader::Selection;
