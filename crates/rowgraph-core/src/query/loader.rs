//! Query planning and entity hydration.
//!
//! One load call owns one [`Session`]. The SELECT covers the entity's own
//! columns only; many-to-one references, collections, and sub-entity parent
//! rows are resolved by subsequent queries through the identity cache, so a
//! row is hydrated at most once per call no matter how many paths reach it.

use tracing::{debug, instrument};

use super::criteria::Criteria;
use super::expression::Expression;
use crate::catalog::{EntityDef, FieldDef, FieldKind, ScalarType};
use crate::db::Db;
use crate::entity::{Entity, EntityId};
use crate::error::Error;
use crate::session::{LoadedEntity, LoadedList, Session};
use crate::sql::{select_auto, select_single, Row};
use crate::value::{StatementParams, Value};

/// Field selection filter for a load.
///
/// `All` means every field of the type, with relation kinds gated by the
/// configured include defaults. An include list names exactly the fields to
/// load; an exclude list subtracts from the full set. Naming an unknown
/// field fails the whole load.
#[derive(Debug, Clone, Default)]
pub enum Selection {
    /// Load every field, honoring the configured relation include defaults.
    #[default]
    All,
    /// Load only the named fields.
    Include(Vec<String>),
    /// Load every field except the named ones.
    Exclude(Vec<String>),
}

impl Selection {
    /// Selection naming exactly the fields to load.
    pub fn include(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Selection::Include(fields.into_iter().map(Into::into).collect())
    }

    /// Selection subtracting the named fields from the full set.
    pub fn exclude(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Selection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    fn is_default(&self) -> bool {
        matches!(self, Selection::All)
    }
}

/// Field partition for one hydration level.
struct LoadPlan<'a> {
    def: &'a EntityDef,
    /// Own scalar fields going into the SELECT.
    scalars: Vec<&'a FieldDef>,
    /// Own many-to-one fields; their raw foreign-key columns go into the
    /// SELECT, resolution happens afterwards.
    refs: Vec<&'a FieldDef>,
    /// Own one-to-many fields, populated by separate queries.
    lists: Vec<&'a FieldDef>,
    /// Own many-to-many fields, populated through the linker.
    links: Vec<&'a FieldDef>,
    /// Requested fields deferred to an ancestor table.
    parent_fields: Vec<String>,
    /// Whether to recursively load and attach the parent entity.
    load_parent: bool,
    /// Whether the parent loads with its full default shape rather than the
    /// deferred field subset.
    parent_full: bool,
    /// Default-shaped loads register their instances in the identity cache;
    /// partial loads must not become the canonical instance for their ID.
    cache_instances: bool,
}

/// A hydrated row waiting for relation resolution.
struct PendingRow {
    handle: EntityId,
    id: i64,
    /// (field name, target type, raw foreign key) per requested reference.
    foreign_keys: Vec<(String, String, Option<i64>)>,
}

impl Db {
    /// Load one entity by ID with every field.
    pub fn load_by_id(&self, entity_type: &str, id: i64) -> Result<LoadedEntity, Error> {
        let mut session = Session::new();
        let root = self.load_by_id_in(&mut session, entity_type, id, &Selection::All)?;
        Ok(LoadedEntity { session, root })
    }

    /// Load the single entity matching a criteria. Zero matches yield an
    /// absent root; more than one is an ambiguity error.
    pub fn load_single(
        &self,
        criteria: &mut Criteria,
        selection: &Selection,
    ) -> Result<LoadedEntity, Error> {
        let mut session = Session::new();
        let mut roots = self.run_load(&mut session, criteria, selection, true)?;
        Ok(LoadedEntity {
            session,
            root: roots.pop(),
        })
    }

    /// Load every entity matching a criteria, in result row order.
    pub fn load_list(
        &self,
        criteria: &mut Criteria,
        selection: &Selection,
    ) -> Result<LoadedList, Error> {
        let mut session = Session::new();
        let roots = self.run_load(&mut session, criteria, selection, false)?;
        Ok(LoadedList { session, roots })
    }

    /// Load every entity of a type.
    pub fn load_all(&self, entity_type: &str, selection: &Selection) -> Result<LoadedList, Error> {
        let mut criteria = self.criteria(entity_type)?;
        self.load_list(&mut criteria, selection)
    }

    /// Whether any row of the type matches the criteria.
    pub fn exists(&self, criteria: &mut Criteria) -> Result<bool, Error> {
        let def = self.catalog().entity(criteria.base())?;
        let prepared = criteria.prepare();
        let mut query = format!(
            "SELECT {}.{} FROM {}",
            def.table, def.id_column, def.table
        );
        if !prepared.joins.is_empty() {
            query.push(' ');
            query.push_str(&prepared.joins);
        }
        if !prepared.restrictions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&prepared.restrictions);
        }
        let rows = select_auto(self.sql(), &query, &prepared.params)?;
        Ok(!rows.is_empty())
    }

    /// Load an entity by ID into an existing session, reusing the cached
    /// instance for default-shaped loads.
    pub(crate) fn load_by_id_in(
        &self,
        session: &mut Session,
        entity_type: &str,
        id: i64,
        selection: &Selection,
    ) -> Result<Option<EntityId>, Error> {
        if selection.is_default() {
            if let Some(handle) = session.lookup(entity_type, id) {
                return Ok(Some(handle));
            }
        }
        let def = self.catalog().entity(entity_type)?;
        let mut criteria = Criteria::new(entity_type);
        criteria.add(id_expression(def, entity_type, id))?;
        let mut handles = self.run_load(session, &mut criteria, selection, true)?;
        Ok(handles.pop())
    }

    /// Execute one hydration level: SELECT, construct, resolve relations.
    #[instrument(skip_all, fields(entity = criteria.base()))]
    pub(crate) fn run_load(
        &self,
        session: &mut Session,
        criteria: &mut Criteria,
        selection: &Selection,
        single: bool,
    ) -> Result<Vec<EntityId>, Error> {
        let entity_type = criteria.base().to_string();
        let plan = self.plan(&entity_type, selection)?;
        let prepared = criteria.prepare();
        let query = build_select(&plan, &prepared.joins, &prepared.restrictions);
        debug!(%query, "loading");

        let rows = if single {
            select_single(self.sql(), &query, &prepared.params)?
                .into_iter()
                .collect()
        } else {
            select_auto(self.sql(), &query, &prepared.params)?
        };

        self.hydrate(session, &plan, &entity_type, rows)
    }

    /// Partition the requested fields of an entity type for one level.
    fn plan<'a>(&'a self, entity_type: &str, selection: &Selection) -> Result<LoadPlan<'a>, Error> {
        let def = self.catalog().entity(entity_type)?;
        let all_names = self.catalog().field_names(entity_type)?;

        let requested: Vec<String> = match selection {
            Selection::All => all_names.clone(),
            Selection::Include(named) => {
                for name in named {
                    if !all_names.contains(name) {
                        return Err(Error::unknown_field(entity_type, name));
                    }
                }
                named.clone()
            }
            Selection::Exclude(named) => {
                for name in named {
                    if !all_names.contains(name) {
                        return Err(Error::unknown_field(entity_type, name));
                    }
                }
                all_names
                    .iter()
                    .filter(|name| !named.contains(name))
                    .cloned()
                    .collect()
            }
        };

        // Relation include defaults apply to any field the caller did not
        // name explicitly.
        let gated = !matches!(selection, Selection::Include(_));
        let include = self.config().include;

        let mut plan = LoadPlan {
            def,
            scalars: Vec::new(),
            refs: Vec::new(),
            lists: Vec::new(),
            links: Vec::new(),
            parent_fields: Vec::new(),
            load_parent: false,
            parent_full: false,
            cache_instances: selection.is_default(),
        };
        let mut parent_requested = false;

        for name in &requested {
            if def.parent.as_ref().is_some_and(|p| &p.field == name) {
                parent_requested = true;
                continue;
            }
            match def.get_field(name) {
                Some(field) => match &field.kind {
                    FieldKind::Scalar { .. } => plan.scalars.push(field),
                    FieldKind::ManyToOne { .. } => {
                        if !gated || include.many_to_one {
                            plan.refs.push(field);
                        }
                    }
                    FieldKind::OneToMany { .. } => {
                        if !gated || include.one_to_many {
                            plan.lists.push(field);
                        }
                    }
                    FieldKind::ManyToMany { .. } => {
                        if !gated || include.many_to_many {
                            plan.links.push(field);
                        }
                    }
                },
                // Known (validated above) but not declared here: deferred to
                // an ancestor table.
                None => plan.parent_fields.push(name.clone()),
            }
        }

        plan.load_parent = def.parent.is_some()
            && (selection.is_default() || parent_requested || !plan.parent_fields.is_empty());
        // Naming the parent field in an include list asks for the whole
        // parent entity, not an ID-only shell.
        plan.parent_full = selection.is_default()
            || (matches!(selection, Selection::Include(_)) && parent_requested);
        Ok(plan)
    }

    /// Construct instances for result rows, register them, then resolve the
    /// requested relations.
    fn hydrate(
        &self,
        session: &mut Session,
        plan: &LoadPlan<'_>,
        entity_type: &str,
        rows: Vec<Row>,
    ) -> Result<Vec<EntityId>, Error> {
        let formats = &self.config().formats;
        let mut handles = Vec::with_capacity(rows.len());
        let mut pending = Vec::with_capacity(rows.len());

        for row in rows {
            let raw_id = row.get(&plan.def.id_column).ok_or_else(|| {
                Error::Validation(format!(
                    "result row for '{entity_type}' carries no '{}' value",
                    plan.def.id_column
                ))
            })?;
            let id = match Value::parse(Some(raw_id), ScalarType::Int, formats)? {
                Value::Int(id) => id,
                _ => unreachable!(),
            };

            if plan.cache_instances {
                if let Some(handle) = session.lookup(entity_type, id) {
                    handles.push(handle);
                    continue;
                }
            }

            let mut entity = Entity::with_id(entity_type, id);
            for field in &plan.scalars {
                let scalar = field.scalar_type().unwrap();
                let value = Value::parse(row.get(field.column().unwrap()), scalar, formats)?;
                entity.set_scalar(&field.name, value);
            }

            let mut foreign_keys = Vec::with_capacity(plan.refs.len());
            for field in &plan.refs {
                let FieldKind::ManyToOne { column, target } = &field.kind else {
                    unreachable!()
                };
                let fk = match Value::parse(row.get(column), ScalarType::Int, formats)? {
                    Value::Int(fk) => Some(fk),
                    _ => None,
                };
                foreign_keys.push((field.name.clone(), target.clone(), fk));
            }

            // Registered before any relation resolution so cyclic reference
            // graphs find the partially built instance instead of recursing.
            let handle = if plan.cache_instances {
                session.insert(entity)
            } else {
                session.insert_unregistered(entity)
            };
            handles.push(handle);
            pending.push(PendingRow {
                handle,
                id,
                foreign_keys,
            });
        }

        for row in pending {
            self.resolve_relations(session, plan, row)?;
        }
        Ok(handles)
    }

    fn resolve_relations(
        &self,
        session: &mut Session,
        plan: &LoadPlan<'_>,
        row: PendingRow,
    ) -> Result<(), Error> {
        let PendingRow {
            handle,
            id,
            foreign_keys,
        } = row;

        // Many-to-one: identity cache first, full default load on miss.
        for (field, target, fk) in foreign_keys {
            match fk {
                None => {
                    session.get_mut(handle).set_scalar(&field, Value::Null);
                }
                Some(fk_id) => {
                    let target_handle =
                        self.load_by_id_in(session, &target, fk_id, &Selection::All)?;
                    match target_handle {
                        Some(target_handle) => {
                            session.get_mut(handle).set_ref(&field, target_handle);
                        }
                        None => {
                            session.get_mut(handle).set_scalar(&field, Value::Null);
                        }
                    }
                }
            }
        }

        // One-to-many: list cache first; on miss load children by a
        // back-reference criteria and point each child back at this
        // instance.
        for field in &plan.lists {
            let FieldKind::OneToMany { target, backref } = &field.kind else {
                unreachable!()
            };
            if let Some(cached) = session.cached_list(target, backref, id) {
                let cached = cached.to_vec();
                session.get_mut(handle).set_list(&field.name, cached);
                continue;
            }

            let target_def = self.catalog().entity(target)?;
            let backref_def = target_def
                .get_field(backref)
                .ok_or_else(|| Error::unknown_field(target, backref))?;
            let FieldKind::ManyToOne { column, .. } = &backref_def.kind else {
                return Err(Error::unsupported_field(target, backref, "back-reference"));
            };

            let mut criteria = Criteria::new(target);
            let mut params = StatementParams::new();
            params.push(ScalarType::Int.bind_tag(), id.to_string());
            criteria.add(Expression {
                base: target.clone(),
                joins: Vec::new(),
                term: format!("{}.{}=?", target_def.table, column),
                params,
            })?;

            let children = self.run_load(session, &mut criteria, &Selection::All, false)?;
            for child in &children {
                session.get_mut(*child).set_ref(backref, handle);
            }
            session.cache_list(target, backref, id, children.clone());
            session.get_mut(handle).set_list(&field.name, children);
        }

        // Many-to-many through the linker.
        for field in &plan.links {
            let FieldKind::ManyToMany { via, side } = &field.kind else {
                unreachable!()
            };
            let (target, ids) = self.linked_ids(via, *side, id)?;
            let mut linked = Vec::with_capacity(ids.len());
            for linked_id in ids {
                if let Some(linked_handle) =
                    self.load_by_id_in(session, &target, linked_id, &Selection::All)?
                {
                    linked.push(linked_handle);
                }
            }
            session.get_mut(handle).set_list(&field.name, linked);
        }

        // Sub-entity: the parent row shares this ID; load the deferred
        // fields from the ancestor tables and attach the parent instance.
        if plan.load_parent {
            let parent = plan.def.parent.as_ref().unwrap();
            let parent_selection = if plan.parent_full {
                Selection::All
            } else {
                Selection::Include(plan.parent_fields.clone())
            };
            if let Some(parent_handle) =
                self.load_by_id_in(session, &parent.entity, id, &parent_selection)?
            {
                session.get_mut(handle).set_ref(&parent.field, parent_handle);
            }
        }

        Ok(())
    }
}

/// An `ID = ?` expression over an entity's own table.
pub(crate) fn id_expression(def: &EntityDef, entity_type: &str, id: i64) -> Expression {
    let mut params = StatementParams::new();
    params.push(ScalarType::Int.bind_tag(), id.to_string());
    Expression {
        base: entity_type.to_string(),
        joins: Vec::new(),
        term: format!("{}.{}=?", def.table, def.id_column),
        params,
    }
}

/// Render the SELECT for one hydration level.
fn build_select(plan: &LoadPlan<'_>, joins: &str, restrictions: &str) -> String {
    let table = &plan.def.table;
    let mut columns = vec![format!("{}.{}", table, plan.def.id_column)];
    for field in plan.scalars.iter().chain(&plan.refs) {
        columns.push(format!("{}.{}", table, field.column().unwrap()));
    }

    let mut query = format!("SELECT {} FROM {}", columns.join(", "), table);
    if !joins.is_empty() {
        query.push(' ');
        query.push_str(joins);
    }
    if !restrictions.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(restrictions);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_constructors() {
        assert!(Selection::default().is_default());
        assert!(!Selection::include(["name"]).is_default());
        assert!(matches!(
            Selection::exclude(["addresses"]),
            Selection::Exclude(_)
        ));
    }
}
