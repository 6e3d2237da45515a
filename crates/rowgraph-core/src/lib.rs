//! Rowgraph Core - criteria engine, entity catalog, and hydration.
//!
//! This crate maps registered entity types onto relational tables: criteria
//! and expressions render to SQL with ordered bind parameters, and load
//! calls hydrate typed entity graphs through a per-call identity cache.

pub mod catalog;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod query;
pub mod session;
pub mod sql;
pub mod value;

pub use catalog::{
    AssocDef, BindTag, Catalog, EntityDef, FieldDef, FieldKind, ParentDef, ResolvedField,
    ScalarType, Side,
};
pub use config::{Config, ConnectionSettings, Formats, IncludeDefaults};
pub use db::Db;
pub use entity::{Entity, EntityId, FieldValue};
pub use error::Error;
pub use query::{Criteria, Expression, Expressions, Join, JoinKey, JoinKind, Joiner, Prepared, Probe, Selection};
pub use session::{LoadedEntity, LoadedList, Session};
pub use sql::{Row, SqlInterface, Transaction, ER_DUP_ENTRY, ER_NEED_REPREPARE, ER_ROW_IS_REFERENCED};
pub use value::{StatementParams, Value};
