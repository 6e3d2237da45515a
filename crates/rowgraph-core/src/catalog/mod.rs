//! Entity metadata catalog.
//!
//! The catalog stores the registered entity definitions: tables, columns,
//! scalar types, relations, parent links, and associative roles.

mod catalog;
mod entity;
mod field;
mod types;

pub use catalog::{Catalog, ResolvedField};
pub use entity::{AssocDef, EntityDef, ParentDef};
pub use field::{FieldDef, FieldKind, Side};
pub use types::{BindTag, ScalarType};
