//! Rowgraph - a criteria-driven object-relational mapper.
//!
//! This facade re-exports the public surface of `rowgraph-core`: register
//! entity types in a [`Catalog`], build [`Criteria`] from typed
//! [`Expressions`], and let [`Db`] hydrate entity graphs through a per-call
//! identity cache.
//!
//! ```no_run
//! use rowgraph::{Db, Probe, Selection, Value};
//!
//! fn users_named(db: &Db, name: &str) -> Result<usize, rowgraph::Error> {
//!     let mut criteria = db.criteria("User")?;
//!     criteria.add_all(db.expressions().equal(
//!         "User",
//!         "name",
//!         Probe::Value(&Value::Text(name.into())),
//!         None,
//!     )?)?;
//!     Ok(db.load_list(&mut criteria, &Selection::default())?.len())
//! }
//! ```

pub use rowgraph_core::{
    AssocDef, BindTag, Catalog, Config, ConnectionSettings, Criteria, Db, Entity, EntityDef,
    EntityId, Error, Expression, Expressions, FieldDef, FieldKind, FieldValue, Formats,
    IncludeDefaults, Join, JoinKey, JoinKind, Joiner, LoadedEntity, LoadedList, ParentDef,
    Prepared, Probe, ResolvedField, Row, ScalarType, Selection, Session, Side, SqlInterface,
    StatementParams, Transaction, Value, ER_DUP_ENTRY, ER_NEED_REPREPARE, ER_ROW_IS_REFERENCED,
};

/// Re-export the core crate for full paths.
pub use rowgraph_core as core;
