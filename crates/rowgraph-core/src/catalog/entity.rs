//! Entity definitions.

use super::field::{FieldDef, FieldKind};

/// Link to a parent entity for an entity stored across a table hierarchy.
///
/// The sub-entity's table shares its primary key with the parent's table:
/// the ID column of a sub-entity row holds the parent row's ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentDef {
    /// Name of the parent entity.
    pub entity: String,
    /// Name of the field on this entity exposing the parent.
    pub field: String,
}

/// The two reference fields of an associative entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocDef {
    /// Name of the many-to-one field for the A side.
    pub side_a: String,
    /// Name of the many-to-one field for the B side.
    pub side_b: String,
}

/// An entity definition (table mapping).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    /// Entity name (unique within the catalog).
    pub name: String,
    /// Backing table name.
    pub table: String,
    /// Primary key column name.
    pub id_column: String,
    /// Field definitions, not counting the inherited parent fields.
    pub fields: Vec<FieldDef>,
    /// Parent link, if this is a sub-entity.
    pub parent: Option<ParentDef>,
    /// Associative role, if this entity links two others.
    pub assoc: Option<AssocDef>,
}

impl EntityDef {
    /// Create a new entity definition with the conventional `ID` key column.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            id_column: "ID".into(),
            fields: Vec::new(),
            parent: None,
            assoc: None,
        }
    }

    /// Override the primary key column name.
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Declare this entity a sub-entity of `entity`, exposed through `field`.
    pub fn with_parent(mut self, entity: impl Into<String>, field: impl Into<String>) -> Self {
        self.parent = Some(ParentDef {
            entity: entity.into(),
            field: field.into(),
        });
        self
    }

    /// Declare this entity associative, linking the entities referenced by
    /// its `side_a` and `side_b` many-to-one fields.
    pub fn with_assoc(mut self, side_a: impl Into<String>, side_b: impl Into<String>) -> Self {
        self.assoc = Some(AssocDef {
            side_a: side_a.into(),
            side_b: side_b.into(),
        });
        self
    }

    /// Get an own (non-inherited) field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Own fields backed by a column, in declaration order.
    pub fn column_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.column().is_some())
    }

    /// Own scalar fields, in declaration order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Scalar { .. }))
    }

    /// Check if this entity is a sub-entity.
    pub fn is_sub_entity(&self) -> bool {
        self.parent.is_some()
    }

    /// Check if this entity is associative.
    pub fn is_associative(&self) -> bool {
        self.assoc.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::ScalarType;

    #[test]
    fn test_entity_builder() {
        let entity = EntityDef::new("User", "User")
            .with_field(FieldDef::scalar("name", "Name", ScalarType::Text))
            .with_field(FieldDef::scalar("email", "Email", ScalarType::Email))
            .with_field(FieldDef::one_to_many("addresses", "Address", "user"));

        assert_eq!(entity.name, "User");
        assert_eq!(entity.id_column, "ID");
        assert_eq!(entity.fields.len(), 3);
        assert_eq!(entity.column_fields().count(), 2);
        assert!(!entity.is_sub_entity());
    }

    #[test]
    fn test_sub_entity() {
        let entity = EntityDef::new("Student", "Student")
            .with_parent("User", "user")
            .with_field(FieldDef::scalar("year", "Year", ScalarType::Int));

        assert!(entity.is_sub_entity());
        assert_eq!(entity.parent.as_ref().unwrap().entity, "User");
    }

    #[test]
    fn test_associative_entity() {
        let entity = EntityDef::new("Student_Course", "Student_Course")
            .with_field(FieldDef::many_to_one("student", "Student_ID", "Student"))
            .with_field(FieldDef::many_to_one("course", "Course_ID", "Course"))
            .with_assoc("student", "course");

        assert!(entity.is_associative());
        assert_eq!(entity.assoc.as_ref().unwrap().side_b, "course");
    }

    #[test]
    fn test_get_field() {
        let entity = EntityDef::new("User", "User")
            .with_field(FieldDef::scalar("name", "Name", ScalarType::Text));

        assert!(entity.get_field("name").is_some());
        assert!(entity.get_field("nonexistent").is_none());
    }
}
