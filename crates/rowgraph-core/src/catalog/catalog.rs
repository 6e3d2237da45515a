//! Catalog for registering and resolving entity metadata.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::entity::EntityDef;
use super::field::{FieldDef, FieldKind};
use crate::error::Error;

/// A field resolved against an entity, together with the entity that
/// actually declares it. For sub-entities the declaring entity may be an
/// ancestor.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedField<'a> {
    /// The entity declaring the field.
    pub owner: &'a EntityDef,
    /// The field definition.
    pub field: &'a FieldDef,
}

/// The catalog of registered entity definitions.
///
/// Registration happens up front; lookups afterwards are read-only, so the
/// catalog can be shared behind an `Arc`.
pub struct Catalog {
    /// Registered entities by name.
    entities: HashMap<String, EntityDef>,
    /// Memoized pointing-back reference fields per entity name.
    pointing_back: RwLock<HashMap<String, Vec<(String, String)>>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            pointing_back: RwLock::new(HashMap::new()),
        }
    }

    /// Register an entity definition.
    ///
    /// Fails on duplicate names, on a parent link to an entity that is not
    /// registered yet, and on an associative declaration whose side fields
    /// are not many-to-one fields of the entity.
    pub fn register(&mut self, entity: EntityDef) -> Result<(), Error> {
        if self.entities.contains_key(&entity.name) {
            return Err(Error::Validation(format!(
                "entity '{}' is already registered",
                entity.name
            )));
        }
        if let Some(parent) = &entity.parent {
            if !self.entities.contains_key(&parent.entity) {
                return Err(Error::Validation(format!(
                    "entity '{}' names unregistered parent entity '{}'",
                    entity.name, parent.entity
                )));
            }
        }
        if let Some(assoc) = &entity.assoc {
            for side in [&assoc.side_a, &assoc.side_b] {
                match entity.get_field(side) {
                    Some(field) if matches!(field.kind, FieldKind::ManyToOne { .. }) => {}
                    _ => {
                        return Err(Error::Validation(format!(
                            "associative entity '{}' side field '{}' is not a many-to-one field",
                            entity.name, side
                        )));
                    }
                }
            }
        }
        self.entities.insert(entity.name.clone(), entity);
        self.pointing_back.write().clear();
        Ok(())
    }

    /// Register several entity definitions in order.
    pub fn register_all(
        &mut self,
        entities: impl IntoIterator<Item = EntityDef>,
    ) -> Result<(), Error> {
        for entity in entities {
            self.register(entity)?;
        }
        Ok(())
    }

    /// Get an entity definition by name.
    pub fn entity(&self, name: &str) -> Result<&EntityDef, Error> {
        self.entities
            .get(name)
            .ok_or_else(|| Error::unknown_entity(name))
    }

    /// The chain from an entity up through its ancestors, starting with the
    /// entity itself.
    pub fn parent_chain(&self, name: &str) -> Result<Vec<&EntityDef>, Error> {
        let mut chain = vec![self.entity(name)?];
        loop {
            let last = chain.last().unwrap();
            match &last.parent {
                Some(parent) => {
                    let next = self.entity(&parent.entity)?;
                    if chain.iter().any(|e| e.name == next.name) {
                        return Err(Error::Validation(format!(
                            "entity '{name}' has a cyclic parent chain"
                        )));
                    }
                    chain.push(next);
                }
                None => return Ok(chain),
            }
        }
    }

    /// Resolve a field against an entity, walking up the parent chain when
    /// the entity itself does not declare it.
    pub fn resolve_field(&self, entity: &str, field: &str) -> Result<ResolvedField<'_>, Error> {
        for owner in self.parent_chain(entity)? {
            if let Some(def) = owner.get_field(field) {
                return Ok(ResolvedField { owner, field: def });
            }
        }
        Err(Error::unknown_field(entity, field))
    }

    /// All field names reachable from an entity, own fields first and then
    /// inherited ones, each chain in declaration order. Parent link fields
    /// are included.
    pub fn field_names(&self, entity: &str) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        for owner in self.parent_chain(entity)? {
            if let Some(parent) = &owner.parent {
                if !names.iter().any(|n| n == &parent.field) {
                    names.push(parent.field.clone());
                }
            }
            for field in &owner.fields {
                if !names.iter().any(|n| n == &field.name) {
                    names.push(field.name.clone());
                }
            }
        }
        Ok(names)
    }

    /// Many-to-one fields of other entities that reference `name`, limited
    /// to entities that `name` references back. These are the columns that
    /// must be nulled before a row of `name` can be deleted.
    ///
    /// Returns `(entity, field)` pairs. Memoized per entity.
    pub fn pointing_back(&self, name: &str) -> Result<Vec<(String, String)>, Error> {
        if let Some(cached) = self.pointing_back.read().get(name) {
            return Ok(cached.clone());
        }

        let referenced: Vec<&str> = self
            .entity(name)?
            .fields
            .iter()
            .filter_map(|f| match &f.kind {
                FieldKind::ManyToOne { target, .. } => Some(target.as_str()),
                _ => None,
            })
            .collect();

        let mut pairs = Vec::new();
        let mut names: Vec<&String> = self.entities.keys().collect();
        names.sort();
        for other_name in names {
            if !referenced.iter().any(|r| r == other_name) {
                continue;
            }
            let other = &self.entities[other_name];
            for field in &other.fields {
                if let FieldKind::ManyToOne { target, .. } = &field.kind {
                    if target == name {
                        pairs.push((other.name.clone(), field.name.clone()));
                    }
                }
            }
        }

        self.pointing_back
            .write()
            .insert(name.to_string(), pairs.clone());
        Ok(pairs)
    }

    /// The many-to-one field of an associative entity for the given side.
    pub fn assoc_field<'a>(
        &'a self,
        assoc: &'a EntityDef,
        side: super::field::Side,
    ) -> Result<&'a FieldDef, Error> {
        let def = assoc.assoc.as_ref().ok_or_else(|| {
            Error::Validation(format!("entity '{}' is not associative", assoc.name))
        })?;
        let field_name = match side {
            super::field::Side::A => &def.side_a,
            super::field::Side::B => &def.side_b,
        };
        assoc
            .get_field(field_name)
            .ok_or_else(|| Error::unknown_field(&assoc.name, field_name))
    }

    /// List all registered entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::field::Side;
    use crate::catalog::types::ScalarType;

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .register_all([
                EntityDef::new("User", "User")
                    .with_field(FieldDef::scalar("name", "Name", ScalarType::Text))
                    .with_field(FieldDef::scalar("email", "Email", ScalarType::Email))
                    .with_field(FieldDef::one_to_many("addresses", "Address", "user"))
                    .with_field(FieldDef::many_to_one("bestFriend", "BestFriend_ID", "User")),
                EntityDef::new("Student", "Student")
                    .with_parent("User", "user")
                    .with_field(FieldDef::scalar("year", "Year", ScalarType::Int))
                    .with_field(FieldDef::many_to_many("courses", "Student_Course", Side::A)),
                EntityDef::new("Address", "Address")
                    .with_field(FieldDef::scalar("street", "Street", ScalarType::Text))
                    .with_field(FieldDef::many_to_one("user", "User_ID", "User")),
                EntityDef::new("Course", "Course")
                    .with_field(FieldDef::scalar("title", "Title", ScalarType::Text)),
                EntityDef::new("Student_Course", "Student_Course")
                    .with_field(FieldDef::many_to_one("student", "Student_ID", "Student"))
                    .with_field(FieldDef::many_to_one("course", "Course_ID", "Course"))
                    .with_assoc("student", "course"),
            ])
            .unwrap();
        catalog
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut catalog = sample_catalog();
        let result = catalog.register(EntityDef::new("User", "User"));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_register_rejects_unknown_parent() {
        let mut catalog = Catalog::new();
        let result = catalog.register(EntityDef::new("Student", "Student").with_parent("User", "user"));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_parent_chain() {
        let catalog = sample_catalog();
        let chain = catalog.parent_chain("Student").unwrap();
        let names: Vec<&str> = chain.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Student", "User"]);
    }

    #[test]
    fn test_resolve_inherited_field() {
        let catalog = sample_catalog();
        let resolved = catalog.resolve_field("Student", "email").unwrap();
        assert_eq!(resolved.owner.name, "User");
        assert_eq!(resolved.field.column(), Some("Email"));

        let own = catalog.resolve_field("Student", "year").unwrap();
        assert_eq!(own.owner.name, "Student");
    }

    #[test]
    fn test_resolve_unknown_field() {
        let catalog = sample_catalog();
        assert!(catalog.resolve_field("Student", "nope").is_err());
        assert!(catalog.resolve_field("Nope", "year").is_err());
    }

    #[test]
    fn test_field_names_union() {
        let catalog = sample_catalog();
        let names = catalog.field_names("Student").unwrap();
        assert_eq!(
            names,
            vec!["user", "year", "courses", "name", "email", "addresses", "bestFriend"]
        );
    }

    #[test]
    fn test_pointing_back() {
        let catalog = sample_catalog();
        // User references User through bestFriend, so the mutual pair is
        // (User, bestFriend).
        let pairs = catalog.pointing_back("User").unwrap();
        assert_eq!(pairs, vec![("User".to_string(), "bestFriend".to_string())]);

        // Address references User, but User has no many-to-one to Address.
        let pairs = catalog.pointing_back("Address").unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_assoc_field() {
        let catalog = sample_catalog();
        let assoc = catalog.entity("Student_Course").unwrap();
        let a = catalog.assoc_field(assoc, Side::A).unwrap();
        assert_eq!(a.name, "student");
        let b = catalog.assoc_field(assoc, Side::B).unwrap();
        assert_eq!(b.column(), Some("Course_ID"));
    }
}
