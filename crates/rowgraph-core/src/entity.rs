//! Runtime entity instances.

use std::collections::HashMap;

use crate::value::Value;

/// Handle to an entity instance inside a [`Session`](crate::session::Session)
/// arena.
///
/// Two equal handles refer to the same in-memory instance, so handle equality
/// is instance identity, not value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub(crate) usize);

/// A field value held by an entity instance.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A scalar column value.
    Scalar(Value),
    /// A resolved reference to another instance in the same session.
    Ref(EntityId),
    /// A resolved collection of instances in the same session.
    List(Vec<EntityId>),
}

/// A hydrated (or to-be-persisted) entity instance.
///
/// Only fields that were selected during hydration, or set by the caller,
/// are present in `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Name of the entity type in the catalog.
    pub entity_type: String,
    /// Primary key, if assigned.
    pub id: Option<i64>,
    /// Field values by field name.
    values: HashMap<String, FieldValue>,
}

impl Entity {
    /// Create an instance with no fields set.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: None,
            values: HashMap::new(),
        }
    }

    /// Create an instance with the primary key set.
    pub fn with_id(entity_type: impl Into<String>, id: i64) -> Self {
        let mut entity = Self::new(entity_type);
        entity.id = Some(id);
        entity
    }

    /// Set a scalar field.
    pub fn set_scalar(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values
            .insert(field.into(), FieldValue::Scalar(value.into()));
        self
    }

    /// Set a reference field to another instance.
    pub fn set_ref(&mut self, field: impl Into<String>, target: EntityId) -> &mut Self {
        self.values.insert(field.into(), FieldValue::Ref(target));
        self
    }

    /// Set a collection field.
    pub fn set_list(&mut self, field: impl Into<String>, targets: Vec<EntityId>) -> &mut Self {
        self.values.insert(field.into(), FieldValue::List(targets));
        self
    }

    /// Get a field value, if present.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Get a scalar field value, if present and scalar.
    pub fn scalar(&self, field: &str) -> Option<&Value> {
        match self.values.get(field) {
            Some(FieldValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    /// Get a reference field target, if present and resolved.
    pub fn reference(&self, field: &str) -> Option<EntityId> {
        match self.values.get(field) {
            Some(FieldValue::Ref(target)) => Some(*target),
            _ => None,
        }
    }

    /// Get a collection field, if present and resolved.
    pub fn list(&self, field: &str) -> Option<&[EntityId]> {
        match self.values.get(field) {
            Some(FieldValue::List(targets)) => Some(targets),
            _ => None,
        }
    }

    /// Whether the field has been set on this instance.
    pub fn has_field(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Names of the fields set on this instance.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_fields() {
        let mut user = Entity::with_id("User", 7);
        user.set_scalar("name", "Joe").set_scalar("age", 30i64);

        assert_eq!(user.id, Some(7));
        assert_eq!(user.scalar("name"), Some(&Value::Text("Joe".into())));
        assert_eq!(user.scalar("age"), Some(&Value::Int(30)));
        assert!(user.scalar("missing").is_none());
        assert!(user.has_field("name"));
    }

    #[test]
    fn test_reference_and_list_fields() {
        let mut user = Entity::new("User");
        user.set_ref("bestFriend", EntityId(3));
        user.set_list("addresses", vec![EntityId(1), EntityId(2)]);

        assert_eq!(user.reference("bestFriend"), Some(EntityId(3)));
        assert_eq!(user.list("addresses"), Some(&[EntityId(1), EntityId(2)][..]));
        assert!(user.scalar("bestFriend").is_none());
    }
}
