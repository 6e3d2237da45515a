//! Insert, update, and delete.
//!
//! Records handed to this module are detached [`Entity`] values: every
//! column-backed field, inherited ones included, sits flat on the record,
//! and many-to-one references are plain `Value::Int` IDs. Sub-entity
//! records are persisted one table level at a time, root first, with the
//! root's generated ID propagated down as each sub-level's primary key.

use tracing::{debug, instrument};

use super::expression::Probe;
use crate::catalog::{BindTag, FieldDef, FieldKind, ScalarType};
use crate::db::Db;
use crate::entity::{Entity, FieldValue};
use crate::error::Error;
use crate::sql::{execute, Transaction};
use crate::value::{StatementParams, Value};

impl Db {
    /// Insert a record in its own transaction, assigning its ID.
    pub fn save(&self, record: &mut Entity) -> Result<(), Error> {
        let tx = self.begin()?;
        self.save_in(record, &tx)?;
        tx.commit()
    }

    /// Insert a record inside a caller-controlled transaction.
    ///
    /// Fields that are unset or null are left out of the INSERT. A record
    /// without an ID gets the database-assigned one; a record with an ID
    /// keeps it (sub-entity rows always reuse the root's ID).
    #[instrument(skip_all, fields(entity = %record.entity_type))]
    pub fn save_in(&self, record: &mut Entity, tx: &Transaction<'_>) -> Result<(), Error> {
        let mut chain = self.catalog().parent_chain(&record.entity_type)?;
        chain.reverse();

        for (depth, level) in chain.iter().enumerate() {
            let mut columns = Vec::new();
            let mut params = StatementParams::new();

            // The root level only carries an explicit ID when the caller
            // assigned one; deeper levels always reuse the root's ID.
            if depth > 0 || record.id.is_some() {
                let id = record.id.ok_or_else(|| {
                    Error::Validation(format!(
                        "record of type '{}' has no ID for its '{}' row",
                        record.entity_type, level.name
                    ))
                })?;
                columns.push(level.id_column.as_str());
                params.push(ScalarType::Int.bind_tag(), id.to_string());
            }

            for field in level.column_fields() {
                if let Some((tag, value)) = self.bound_field(record, field)? {
                    columns.push(field.column().unwrap());
                    params.push(tag, value);
                }
            }

            if columns.is_empty() {
                // A sub-entity level always carries at least its ID column;
                // only a fully empty root insert can land here.
                return Err(Error::Validation(format!(
                    "record of type '{}' has no values to insert",
                    record.entity_type
                )));
            }

            let statement = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                level.table,
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            );
            debug!(%statement, "inserting");
            execute(tx.sql(), &statement, &params)?;

            if depth == 0 && record.id.is_none() {
                record.id = Some(tx.sql().last_insert_id()?);
            }
        }
        Ok(())
    }

    /// Insert several records inside one transaction.
    pub fn save_list(&self, records: &mut [Entity], tx: &Transaction<'_>) -> Result<(), Error> {
        for record in records {
            self.save_in(record, tx)?;
        }
        Ok(())
    }

    /// Update a record's set fields in its own transaction.
    pub fn update(&self, record: &Entity) -> Result<(), Error> {
        let tx = self.begin()?;
        self.update_in(record, &tx)?;
        tx.commit()
    }

    /// Update a record inside a caller-controlled transaction.
    ///
    /// Only set fields are written; a field set to null becomes a literal
    /// `NULL` assignment. Table levels with no set fields are skipped.
    #[instrument(skip_all, fields(entity = %record.entity_type))]
    pub fn update_in(&self, record: &Entity, tx: &Transaction<'_>) -> Result<(), Error> {
        let id = record.id.ok_or_else(|| {
            Error::Validation(format!(
                "cannot update a record of type '{}' without an ID",
                record.entity_type
            ))
        })?;

        for level in self.catalog().parent_chain(&record.entity_type)? {
            let mut assignments = Vec::new();
            let mut params = StatementParams::new();

            for field in level.column_fields() {
                if !record.has_field(&field.name) {
                    continue;
                }
                match self.bound_field(record, field)? {
                    Some((tag, value)) => {
                        assignments.push(format!("{}=?", field.column().unwrap()));
                        params.push(tag, value);
                    }
                    None => assignments.push(format!("{}=NULL", field.column().unwrap())),
                }
            }

            if assignments.is_empty() {
                continue;
            }

            params.push(ScalarType::Int.bind_tag(), id.to_string());
            let statement = format!(
                "UPDATE {} SET {} WHERE {}=?",
                level.table,
                assignments.join(", "),
                level.id_column
            );
            debug!(%statement, "updating");
            execute(tx.sql(), &statement, &params)?;
        }
        Ok(())
    }

    /// Update several records inside one transaction.
    pub fn update_list(&self, records: &[Entity], tx: &Transaction<'_>) -> Result<(), Error> {
        for record in records {
            self.update_in(record, tx)?;
        }
        Ok(())
    }

    /// Delete an entity by ID in its own transaction.
    pub fn delete(&self, entity_type: &str, id: i64) -> Result<(), Error> {
        let tx = self.begin()?;
        self.delete_in(entity_type, id, &tx)?;
        tx.commit()
    }

    /// Delete an entity by ID inside a caller-controlled transaction.
    ///
    /// Mutual many-to-one references pointing back at the doomed row are
    /// nulled first so the delete cannot trip a foreign key. Sub-entity
    /// rows are deleted before their ancestor rows for the same reason.
    #[instrument(skip(self, tx))]
    pub fn delete_in(&self, entity_type: &str, id: i64, tx: &Transaction<'_>) -> Result<(), Error> {
        let chain = self.catalog().parent_chain(entity_type)?;

        for level in &chain {
            for (other, field) in self.catalog().pointing_back(&level.name)? {
                let other_def = self.catalog().entity(&other)?;
                let field_def = other_def
                    .get_field(&field)
                    .ok_or_else(|| Error::unknown_field(&other, &field))?;
                let column = field_def.column().unwrap();

                let mut params = StatementParams::new();
                params.push(ScalarType::Int.bind_tag(), id.to_string());
                let statement = format!(
                    "UPDATE {} SET {}=NULL WHERE {}=?",
                    other_def.table, column, column
                );
                debug!(%statement, "nulling back-reference");
                execute(tx.sql(), &statement, &params)?;
            }
        }

        for level in &chain {
            let mut params = StatementParams::new();
            params.push(ScalarType::Int.bind_tag(), id.to_string());
            let statement = format!("DELETE FROM {} WHERE {}=?", level.table, level.id_column);
            debug!(%statement, "deleting");
            execute(tx.sql(), &statement, &params)?;
        }
        Ok(())
    }

    /// Delete several entities of one type inside one transaction.
    pub fn delete_list(&self, entity_type: &str, ids: &[i64], tx: &Transaction<'_>) -> Result<(), Error> {
        for id in ids {
            self.delete_in(entity_type, *id, tx)?;
        }
        Ok(())
    }

    /// Convert a record's field for binding. `Ok(None)` means the field is
    /// unset or null and should be skipped (insert) or written as a literal
    /// NULL (update).
    fn bound_field(
        &self,
        record: &Entity,
        field: &FieldDef,
    ) -> Result<Option<(BindTag, String)>, Error> {
        let value = match record.get(&field.name) {
            None => return Ok(None),
            Some(FieldValue::Scalar(Value::Null)) => return Ok(None),
            Some(FieldValue::Scalar(value)) => value,
            Some(_) => {
                return Err(Error::Validation(format!(
                    "field '{}' of a detached '{}' record must be a scalar value",
                    field.name, record.entity_type
                )));
            }
        };

        match &field.kind {
            FieldKind::Scalar { scalar, .. } => {
                let bound = value.to_bind_string(&self.config().formats).unwrap();
                Ok(Some((scalar.bind_tag(), bound)))
            }
            FieldKind::ManyToOne { .. } => {
                let id = value.as_i64().ok_or_else(|| {
                    Error::Validation(format!(
                        "reference field '{}' of '{}' must hold an ID",
                        field.name, record.entity_type
                    ))
                })?;
                Ok(Some((ScalarType::Int.bind_tag(), id.to_string())))
            }
            _ => Err(Error::unsupported_field(
                &record.entity_type,
                &field.name,
                "persist",
            )),
        }
    }

    /// Whether a row of the type exists with the given ID.
    pub fn exists_by_id(&self, entity_type: &str, id: i64) -> Result<bool, Error> {
        let def = self.catalog().entity(entity_type)?;
        let mut criteria = self.criteria(entity_type)?;
        criteria.add(super::loader::id_expression(def, entity_type, id))?;
        self.exists(&mut criteria)
    }

    /// Whether a row of the type exists with the given field value.
    pub fn exists_by_field(
        &self,
        entity_type: &str,
        field: &str,
        value: &Value,
    ) -> Result<bool, Error> {
        let mut criteria = self.criteria(entity_type)?;
        criteria.add_all(
            self.expressions()
                .equal(entity_type, field, Probe::Value(value), None)?,
        )?;
        self.exists(&mut criteria)
    }
}
