//! Expression builder.
//!
//! Expressions are predicate fragments over a base entity type: SQL text
//! referencing table- or alias-qualified columns, the joins the text needs,
//! and the bind parameters in order. They compose with AND inside a
//! [`Criteria`](super::criteria::Criteria) and with OR through
//! [`Expressions::any`].

use chrono::Local;
use tracing::warn;

use super::join::{merge_joins, Join, JoinKey, JoinKind, Joiner};
use crate::catalog::{Catalog, EntityDef, FieldDef, FieldKind, ScalarType, Side};
use crate::config::Formats;
use crate::entity::{Entity, FieldValue};
use crate::error::Error;
use crate::sql::SqlInterface;
use crate::value::{StatementParams, Value};

/// A predicate fragment over one base entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Base entity type the fragment filters.
    pub base: String,
    /// Joins the fragment's column references depend on.
    pub joins: Vec<Join>,
    /// SQL text of the fragment.
    pub term: String,
    /// Bind parameters in fragment order. Empty means the fragment is fully
    /// literal and needs no prepared statement.
    pub params: StatementParams,
}

/// The comparison value for [`Expressions::equal`].
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    /// Compare against NULL.
    Null,
    /// Compare a scalar field against a value, or a many-to-one column
    /// against a raw ID.
    Value(&'a Value),
    /// Compare a many-to-one field against a reference entity. With only the
    /// ID set this is a plain foreign-key comparison; with other fields set
    /// it decomposes into one expression per set scalar field of the target.
    Entity(&'a Entity),
}

/// A resolved field place: the table name or join alias that qualifies the
/// field's column, plus the joins needed to reach it.
struct FieldPlace<'a> {
    joins: Vec<Join>,
    place: String,
    field: &'a FieldDef,
}

/// Expression builder view over the catalog and the join registry.
pub struct Expressions<'a> {
    catalog: &'a Catalog,
    joiner: &'a Joiner,
    formats: &'a Formats,
    sql: &'a dyn SqlInterface,
}

impl<'a> Expressions<'a> {
    /// Create a builder view.
    pub fn new(
        catalog: &'a Catalog,
        joiner: &'a Joiner,
        formats: &'a Formats,
        sql: &'a dyn SqlInterface,
    ) -> Self {
        Self {
            catalog,
            joiner,
            formats,
            sql,
        }
    }

    /// Equality comparison.
    ///
    /// Always returns a collection: scalar comparisons yield one expression,
    /// a decomposed many-to-one comparison yields one per set field of the
    /// reference value. The caller's criteria combines them with AND.
    ///
    /// `parent` addresses a field stored on an ancestor table of a
    /// sub-entity; it adds an inner join from the base table to the
    /// ancestor's table over the shared ID.
    pub fn equal(
        &self,
        base: &str,
        field: &str,
        probe: Probe<'_>,
        parent: Option<&str>,
    ) -> Result<Vec<Expression>, Error> {
        let place = self.resolve_place(base, field, parent)?;
        let column = place.field.column().ok_or_else(|| {
            Error::unsupported_field(base, field, "equal on a collection field")
        })?;

        match probe {
            Probe::Null => Ok(vec![Expression {
                base: base.to_string(),
                joins: place.joins,
                term: format!("{}.{} IS NULL", place.place, column),
                params: StatementParams::new(),
            }]),
            Probe::Value(value) if value.is_null() => {
                self.equal(base, field, Probe::Null, parent)
            }
            Probe::Value(value) => match &place.field.kind {
                FieldKind::Scalar { scalar, .. } => {
                    let mut params = StatementParams::new();
                    params.push(
                        scalar.bind_tag(),
                        self.bind_value(base, field, *scalar, value)?,
                    );
                    Ok(vec![Expression {
                        base: base.to_string(),
                        joins: place.joins,
                        term: format!("{}.{}=?", place.place, column),
                        params,
                    }])
                }
                FieldKind::ManyToOne { .. } => {
                    let id = value.as_i64().ok_or_else(|| {
                        Error::unsupported_field(base, field, "equal with a non-ID value")
                    })?;
                    Ok(vec![self.fk_compare(base, &place, column, id)])
                }
                _ => Err(Error::unsupported_field(base, field, "equal")),
            },
            Probe::Entity(reference) => {
                let FieldKind::ManyToOne { target, .. } = &place.field.kind else {
                    return Err(Error::unsupported_field(
                        base,
                        field,
                        "equal with a reference value",
                    ));
                };
                if &reference.entity_type != target {
                    return Err(Error::Validation(format!(
                        "field '{field}' of '{base}' references '{target}', got a '{}' value",
                        reference.entity_type
                    )));
                }
                self.equal_reference(base, &place, column, target, reference)
            }
        }
    }

    /// Strict greater-than comparison on an ordered scalar field.
    pub fn above(
        &self,
        base: &str,
        field: &str,
        value: &Value,
        parent: Option<&str>,
    ) -> Result<Expression, Error> {
        let (place, column, scalar) = self.ordered_field(base, field, parent, "above")?;
        let mut params = StatementParams::new();
        params.push(scalar.bind_tag(), self.bind_value(base, field, scalar, value)?);
        Ok(Expression {
            base: base.to_string(),
            joins: place.joins,
            term: format!("{}.{} > ?", place.place, column),
            params,
        })
    }

    /// Greater-than comparison against a bound temporal or numeric value.
    /// Same rendering as [`above`](Expressions::above); kept separate because
    /// [`after_now`](Expressions::after_now) is its literal-embedding twin.
    pub fn after(
        &self,
        base: &str,
        field: &str,
        value: &Value,
        parent: Option<&str>,
    ) -> Result<Expression, Error> {
        let (place, column, scalar) = self.ordered_field(base, field, parent, "after")?;
        let mut params = StatementParams::new();
        params.push(scalar.bind_tag(), self.bind_value(base, field, scalar, value)?);
        Ok(Expression {
            base: base.to_string(),
            joins: place.joins,
            term: format!("{}.{} > ?", place.place, column),
            params,
        })
    }

    /// Greater-than comparison against the current timestamp, embedded as an
    /// escaped literal rather than a placeholder so the expression stays
    /// bind-free.
    pub fn after_now(
        &self,
        base: &str,
        field: &str,
        parent: Option<&str>,
    ) -> Result<Expression, Error> {
        let (place, column, scalar) = self.ordered_field(base, field, parent, "afterNow")?;
        let now = Local::now().naive_local();
        let literal = match scalar {
            ScalarType::Date => now.date().format(&self.formats.date).to_string(),
            ScalarType::Time => now.time().format(&self.formats.time).to_string(),
            ScalarType::DateTime => now.format(&self.formats.datetime).to_string(),
            _ => {
                return Err(Error::unsupported_field(base, field, "afterNow"));
            }
        };
        Ok(Expression {
            base: base.to_string(),
            joins: place.joins,
            term: format!(
                "{}.{} > '{}'",
                place.place,
                column,
                self.sql.escape_string(&literal)
            ),
            params: StatementParams::new(),
        })
    }

    /// Inclusive range comparison on an ordered scalar field.
    pub fn between(
        &self,
        base: &str,
        field: &str,
        min: &Value,
        max: &Value,
        parent: Option<&str>,
    ) -> Result<Expression, Error> {
        let (place, column, scalar) = self.ordered_field(base, field, parent, "between")?;
        let mut params = StatementParams::new();
        params.push(scalar.bind_tag(), self.bind_value(base, field, scalar, min)?);
        params.push(scalar.bind_tag(), self.bind_value(base, field, scalar, max)?);
        Ok(Expression {
            base: base.to_string(),
            joins: place.joins,
            term: format!("{}.{} BETWEEN ? AND ?", place.place, column),
            params,
        })
    }

    /// Substring match on a text-like field.
    pub fn contains(
        &self,
        base: &str,
        field: &str,
        needle: &str,
        parent: Option<&str>,
    ) -> Result<Expression, Error> {
        self.like(base, field, format!("%{needle}%"), parent, "contains")
    }

    /// Prefix match on a text-like field.
    pub fn starts_with(
        &self,
        base: &str,
        field: &str,
        prefix: &str,
        parent: Option<&str>,
    ) -> Result<Expression, Error> {
        self.like(base, field, format!("{prefix}%"), parent, "startsWith")
    }

    /// Suffix match on a text-like field.
    pub fn ends_with(
        &self,
        base: &str,
        field: &str,
        suffix: &str,
        parent: Option<&str>,
    ) -> Result<Expression, Error> {
        self.like(base, field, format!("%{suffix}"), parent, "endsWith")
    }

    /// Anti-join predicate matching entities of `base` with no link row in
    /// the associative entity on the given side. Used to find unlinked
    /// entities.
    pub fn is_not_in(&self, base: &str, via: &str, side: Side) -> Result<Expression, Error> {
        let base_def = self.catalog.entity(base)?;
        let assoc = self.catalog.entity(via)?;
        let side_field = self.catalog.assoc_field(assoc, side)?;
        let FieldKind::ManyToOne { column, target } = &side_field.kind else {
            return Err(Error::unsupported_field(via, &side_field.name, "isNotIn"));
        };
        if target != base {
            return Err(Error::Validation(format!(
                "side field '{}' of '{via}' references '{target}', not '{base}'",
                side_field.name
            )));
        }

        let key = JoinKey {
            entity: via.to_string(),
            kind: JoinKind::Left,
            base_place: base_def.table.clone(),
            base_column: base_def.id_column.clone(),
            join_column: column.clone(),
        };
        let alias = self.joiner.alias(&key);
        let term = format!("{alias}.{column} IS NULL");
        Ok(Expression {
            base: base.to_string(),
            joins: vec![Join {
                key,
                target_table: assoc.table.clone(),
                alias,
            }],
            term,
            params: StatementParams::new(),
        })
    }

    /// OR combinator.
    ///
    /// All expressions must share one base entity type. Joins are merged
    /// with structural dedup, the terms are parenthesized individually and
    /// as a whole, and bind parameters concatenate in expression order.
    pub fn any(
        &self,
        expressions: impl IntoIterator<Item = Expression>,
    ) -> Result<Expression, Error> {
        let expressions: Vec<Expression> = expressions.into_iter().collect();
        let Some(first) = expressions.first() else {
            return Err(Error::Validation(
                "any() requires at least one expression".into(),
            ));
        };
        let base = first.base.clone();
        if let Some(stray) = expressions.iter().find(|e| e.base != base) {
            return Err(Error::Validation(format!(
                "any() mixes base entity types '{base}' and '{}'",
                stray.base
            )));
        }

        let joins = merge_joins(expressions.iter().map(|e| e.joins.as_slice()));
        let mut params = StatementParams::new();
        let mut terms = Vec::with_capacity(expressions.len());
        for expression in &expressions {
            terms.push(format!("({})", expression.term));
            params.extend(&expression.params);
        }

        Ok(Expression {
            base,
            joins,
            term: format!("({})", terms.join(" OR ")),
            params,
        })
    }

    fn like(
        &self,
        base: &str,
        field: &str,
        pattern: String,
        parent: Option<&str>,
        operation: &str,
    ) -> Result<Expression, Error> {
        let place = self.resolve_place(base, field, parent)?;
        let (column, scalar) = match (&place.field.kind, place.field.scalar_type()) {
            (FieldKind::Scalar { column, .. }, Some(scalar)) if scalar.is_text_like() => {
                (column.clone(), scalar)
            }
            _ => return Err(Error::unsupported_field(base, field, operation)),
        };
        let mut params = StatementParams::new();
        params.push(scalar.bind_tag(), pattern);
        Ok(Expression {
            base: base.to_string(),
            joins: place.joins,
            term: format!("{}.{} LIKE ?", place.place, column),
            params,
        })
    }

    /// Resolve an ordered scalar field or fail naming the operation.
    fn ordered_field(
        &self,
        base: &str,
        field: &str,
        parent: Option<&str>,
        operation: &str,
    ) -> Result<(FieldPlace<'a>, String, ScalarType), Error> {
        let place = self.resolve_place(base, field, parent)?;
        match (&place.field.kind, place.field.scalar_type()) {
            (FieldKind::Scalar { column, .. }, Some(scalar)) if scalar.is_ordered() => {
                let column = column.clone();
                Ok((place, column, scalar))
            }
            _ => Err(Error::unsupported_field(base, field, operation)),
        }
    }

    /// Resolve the place qualifying a field's column: the base table itself,
    /// or the alias of an inner join to the ancestor table declaring the
    /// field.
    fn resolve_place(
        &self,
        base: &str,
        field: &str,
        parent: Option<&str>,
    ) -> Result<FieldPlace<'a>, Error> {
        let base_def = self.catalog.entity(base)?;
        if let Some(parent) = parent {
            if !self
                .catalog
                .parent_chain(base)?
                .iter()
                .any(|e| e.name == parent)
            {
                return Err(Error::Validation(format!(
                    "'{parent}' is not an ancestor of '{base}'"
                )));
            }
        }
        let effective = parent.unwrap_or(base);
        let resolved = self.catalog.resolve_field(effective, field)?;

        if resolved.owner.name == base_def.name {
            return Ok(FieldPlace {
                joins: Vec::new(),
                place: base_def.table.clone(),
                field: resolved.field,
            });
        }

        // Field lives on an ancestor table; sub-entity tables share their
        // primary key values with their ancestors, so a direct ID join is
        // valid at any depth.
        let join = self.parent_join(base_def, resolved.owner);
        let place = join.alias.clone();
        Ok(FieldPlace {
            joins: vec![join],
            place,
            field: resolved.field,
        })
    }

    fn parent_join(&self, base: &EntityDef, ancestor: &EntityDef) -> Join {
        let key = JoinKey {
            entity: ancestor.name.clone(),
            kind: JoinKind::Inner,
            base_place: base.table.clone(),
            base_column: base.id_column.clone(),
            join_column: ancestor.id_column.clone(),
        };
        let alias = self.joiner.alias(&key);
        Join {
            key,
            target_table: ancestor.table.clone(),
            alias,
        }
    }

    /// A plain foreign-key comparison against a known ID.
    fn fk_compare(&self, base: &str, place: &FieldPlace<'_>, column: &str, id: i64) -> Expression {
        let mut params = StatementParams::new();
        params.push(ScalarType::Int.bind_tag(), id.to_string());
        Expression {
            base: base.to_string(),
            joins: place.joins.clone(),
            term: format!("{}.{}=?", place.place, column),
            params,
        }
    }

    /// Decomposed many-to-one comparison against a reference entity.
    fn equal_reference(
        &self,
        base: &str,
        place: &FieldPlace<'_>,
        column: &str,
        target: &str,
        reference: &Entity,
    ) -> Result<Vec<Expression>, Error> {
        // Gather the set, non-null scalar fields of the reference in catalog
        // declaration order.
        let mut set_fields: Vec<(&FieldDef, &Value)> = Vec::new();
        for owner in self.catalog.parent_chain(target)? {
            for field_def in owner.scalar_fields() {
                match reference.get(&field_def.name) {
                    Some(FieldValue::Scalar(value)) if !value.is_null() => {
                        set_fields.push((field_def, value));
                    }
                    Some(FieldValue::Scalar(_)) | None => {}
                    Some(_) => {
                        warn!(
                            field = %field_def.name,
                            entity = %target,
                            "skipping non-scalar field in reference comparison"
                        );
                    }
                }
            }
        }

        // Only the identifier set: a plain foreign-key comparison, no join.
        if set_fields.is_empty() {
            let id = reference.id.ok_or_else(|| {
                Error::Validation(format!(
                    "reference value of type '{target}' has no ID and no set scalar fields"
                ))
            })?;
            return Ok(vec![self.fk_compare(base, place, column, id)]);
        }

        let target_def = self.catalog.entity(target)?;
        let key = JoinKey {
            entity: target.to_string(),
            kind: JoinKind::Inner,
            base_place: place.place.clone(),
            base_column: column.to_string(),
            join_column: target_def.id_column.clone(),
        };
        let alias = self.joiner.alias(&key);
        let target_join = Join {
            key,
            target_table: target_def.table.clone(),
            alias: alias.clone(),
        };

        let mut expressions = Vec::with_capacity(set_fields.len() + 1);

        // The identifier participates in the decomposition like any other set
        // field, constraining the joined table's ID column.
        if let Some(id) = reference.id {
            let mut params = StatementParams::new();
            params.push(ScalarType::Int.bind_tag(), id.to_string());
            let mut joins = place.joins.clone();
            joins.push(target_join.clone());
            expressions.push(Expression {
                base: base.to_string(),
                joins,
                term: format!("{}.{}=?", alias, target_def.id_column),
                params,
            });
        }

        for (field_def, value) in set_fields {
            let scalar = field_def.scalar_type().unwrap();
            let mut params = StatementParams::new();
            params.push(
                scalar.bind_tag(),
                self.bind_value(target, &field_def.name, scalar, value)?,
            );
            let mut joins = place.joins.clone();
            joins.push(target_join.clone());
            expressions.push(Expression {
                base: base.to_string(),
                joins,
                term: format!("{}.{}=?", alias, field_def.column().unwrap()),
                params,
            });
        }
        Ok(expressions)
    }

    /// Convert a value for binding against a scalar field, rejecting type
    /// mismatches instead of coercing.
    fn bind_value(
        &self,
        entity: &str,
        field: &str,
        scalar: ScalarType,
        value: &Value,
    ) -> Result<String, Error> {
        let compatible = matches!(
            (scalar, value),
            (ScalarType::Int, Value::Int(_))
                | (ScalarType::Bool, Value::Bool(_))
                | (ScalarType::Float, Value::Float(_) | Value::Int(_))
                | (
                    ScalarType::Text | ScalarType::Email | ScalarType::Color | ScalarType::Enum,
                    Value::Text(_)
                )
                | (ScalarType::Date, Value::Date(_))
                | (ScalarType::Time, Value::Time(_))
                | (ScalarType::DateTime, Value::DateTime(_))
        );
        if !compatible {
            return Err(Error::Validation(format!(
                "value {value:?} does not match the {scalar} type of field '{field}' on '{entity}'"
            )));
        }
        // Non-null checked by the caller.
        Ok(value.to_bind_string(self.formats).unwrap())
    }
}
