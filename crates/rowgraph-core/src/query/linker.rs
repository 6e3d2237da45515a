//! Associative-entity linker.
//!
//! Many-to-many relations are modeled as an explicit associative entity
//! with two many-to-one sides. The linker inserts and deletes link rows and
//! loads the opposite-side entities for an owner.

use tracing::debug;

use super::criteria::Criteria;
use super::expression::Expression;
use crate::catalog::{EntityDef, FieldKind, ScalarType, Side};
use crate::db::Db;
use crate::error::Error;
use crate::session::{LoadedList, Session};
use crate::sql::{execute, select_auto, Transaction};
use crate::value::{StatementParams, Value};

/// The resolved columns and targets of an associative entity, seen from the
/// side an owner occupies.
struct SidePlan<'a> {
    assoc: &'a EntityDef,
    own_column: &'a str,
    opposite_column: &'a str,
    opposite_target: &'a str,
}

impl Db {
    fn side_plan<'a>(&'a self, via: &str, owner_side: Side) -> Result<SidePlan<'a>, Error> {
        let assoc = self.catalog().entity(via)?;
        let own = self.catalog().assoc_field(assoc, owner_side)?;
        let opposite = self.catalog().assoc_field(assoc, owner_side.opposite())?;
        let (FieldKind::ManyToOne { column: own_column, .. }, FieldKind::ManyToOne { column: opposite_column, target }) =
            (&own.kind, &opposite.kind)
        else {
            return Err(Error::Validation(format!(
                "entity '{via}' does not have two many-to-one sides"
            )));
        };
        Ok(SidePlan {
            assoc,
            own_column,
            opposite_column,
            opposite_target: target,
        })
    }

    /// IDs of the opposite-side rows linked to an owner, with the target
    /// entity type they belong to.
    pub(crate) fn linked_ids(
        &self,
        via: &str,
        owner_side: Side,
        owner_id: i64,
    ) -> Result<(String, Vec<i64>), Error> {
        let plan = self.side_plan(via, owner_side)?;
        let query = format!(
            "SELECT {}.{} FROM {} WHERE {}.{}=?",
            plan.assoc.table, plan.opposite_column, plan.assoc.table, plan.assoc.table, plan.own_column
        );
        let mut params = StatementParams::new();
        params.push(ScalarType::Int.bind_tag(), owner_id.to_string());

        let rows = select_auto(self.sql(), &query, &params)?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(raw) = row.get(plan.opposite_column) {
                match Value::parse(Some(raw), ScalarType::Int, &self.config().formats)? {
                    Value::Int(id) => ids.push(id),
                    _ => unreachable!(),
                }
            }
        }
        Ok((plan.opposite_target.to_string(), ids))
    }

    /// Load the opposite-side entities linked to `owner_id`, where the owner
    /// occupies `owner_side` of the associative entity. An optional criteria
    /// over the opposite-side type narrows the result.
    pub fn load_for_side(
        &self,
        via: &str,
        owner_side: Side,
        owner_id: i64,
        criteria: Option<Criteria>,
        selection: &super::loader::Selection,
    ) -> Result<LoadedList, Error> {
        let (target, ids) = self.linked_ids(via, owner_side, owner_id)?;
        let mut session = Session::new();
        if ids.is_empty() {
            return Ok(LoadedList {
                session,
                roots: Vec::new(),
            });
        }

        let mut criteria = match criteria {
            Some(criteria) if criteria.base() != target => {
                return Err(Error::Validation(format!(
                    "criteria for '{}' cannot narrow a load of '{target}' entities",
                    criteria.base()
                )));
            }
            Some(criteria) => criteria,
            None => Criteria::new(&target),
        };
        criteria.add(self.id_set_expression(&target, &ids)?)?;

        let roots = self.run_load(&mut session, &mut criteria, selection, false)?;
        Ok(LoadedList { session, roots })
    }

    /// Insert one link row for an (A-ID, B-ID) pair. A duplicate pair
    /// surfaces as a constraint error where the table enforces uniqueness.
    pub fn link(&self, via: &str, a: i64, b: i64, tx: &Transaction<'_>) -> Result<(), Error> {
        self.link_many(via, Side::A, a, &[b], tx)
    }

    /// Delete the link row for an (A-ID, B-ID) pair. Fails with a constraint
    /// error when the pair is not linked.
    pub fn unlink(&self, via: &str, a: i64, b: i64, tx: &Transaction<'_>) -> Result<(), Error> {
        self.unlink_many(via, Side::A, a, &[b], tx)
    }

    /// Link one owner on `owner_side` to every listed opposite-side ID.
    pub fn link_many(
        &self,
        via: &str,
        owner_side: Side,
        owner_id: i64,
        other_ids: &[i64],
        tx: &Transaction<'_>,
    ) -> Result<(), Error> {
        let plan = self.side_plan(via, owner_side)?;
        let statement = format!(
            "INSERT INTO {} ({}, {}) VALUES (?, ?)",
            plan.assoc.table, plan.own_column, plan.opposite_column
        );
        for other in other_ids {
            let mut params = StatementParams::new();
            params.push(ScalarType::Int.bind_tag(), owner_id.to_string());
            params.push(ScalarType::Int.bind_tag(), other.to_string());
            execute(tx.sql(), &statement, &params)?;
        }
        debug!(via, owner_id, count = other_ids.len(), "linked rows");
        Ok(())
    }

    /// Unlink one owner on `owner_side` from every listed opposite-side ID.
    /// Fails when any pair was not linked.
    pub fn unlink_many(
        &self,
        via: &str,
        owner_side: Side,
        owner_id: i64,
        other_ids: &[i64],
        tx: &Transaction<'_>,
    ) -> Result<(), Error> {
        let plan = self.side_plan(via, owner_side)?;
        let statement = format!(
            "DELETE FROM {} WHERE {}=? AND {}=?",
            plan.assoc.table, plan.own_column, plan.opposite_column
        );
        for other in other_ids {
            let mut params = StatementParams::new();
            params.push(ScalarType::Int.bind_tag(), owner_id.to_string());
            params.push(ScalarType::Int.bind_tag(), other.to_string());
            let affected = execute(tx.sql(), &statement, &params)?;
            if affected == 0 {
                return Err(Error::Constraint(format!(
                    "no '{via}' link row for pair ({owner_id}, {other})"
                )));
            }
        }
        debug!(via, owner_id, count = other_ids.len(), "unlinked rows");
        Ok(())
    }

    /// An `IN` expression over an entity's ID column.
    fn id_set_expression(&self, entity_type: &str, ids: &[i64]) -> Result<Expression, Error> {
        let def = self.catalog().entity(entity_type)?;
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut params = StatementParams::new();
        for id in ids {
            params.push(ScalarType::Int.bind_tag(), id.to_string());
        }
        Ok(Expression {
            base: entity_type.to_string(),
            joins: Vec::new(),
            term: format!("{}.{} IN ({})", def.table, def.id_column, placeholders),
            params,
        })
    }
}
