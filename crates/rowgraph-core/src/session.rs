//! Per-load identity cache.
//!
//! A session owns every entity instance constructed during one top-level
//! load call and hands out [`EntityId`] handles into its arena. The identity
//! cache guarantees one instance per (entity type, ID) within the session,
//! which is what lets reference cycles resolve to the same instance instead
//! of recursing.

use std::collections::HashMap;

use crate::entity::{Entity, EntityId, FieldValue};
use crate::value::Value;

/// Arena and identity cache for one load scope.
#[derive(Debug, Default)]
pub struct Session {
    /// All instances constructed in this scope.
    entities: Vec<Entity>,
    /// (entity type, ID) to instance.
    by_id: HashMap<(String, i64), EntityId>,
    /// (target type, back-reference field, owner ID) to loaded list.
    lists: HashMap<(String, String, i64), Vec<EntityId>>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an instance into the arena and return its handle.
    ///
    /// If the instance carries an ID it is registered in the identity cache
    /// immediately, before any of its relations are resolved.
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let handle = EntityId(self.entities.len());
        if let Some(id) = entity.id {
            self.by_id
                .insert((entity.entity_type.clone(), id), handle);
        }
        self.entities.push(entity);
        handle
    }

    /// Move an instance into the arena without registering it in the
    /// identity cache. Used for partial-field loads, which must not be
    /// handed out as the canonical instance for their ID.
    pub fn insert_unregistered(&mut self, entity: Entity) -> EntityId {
        let handle = EntityId(self.entities.len());
        self.entities.push(entity);
        handle
    }

    /// Get an instance by handle.
    pub fn get(&self, handle: EntityId) -> &Entity {
        &self.entities[handle.0]
    }

    /// Get a mutable instance by handle.
    pub fn get_mut(&mut self, handle: EntityId) -> &mut Entity {
        &mut self.entities[handle.0]
    }

    /// Look up an already-constructed instance by (type, ID).
    pub fn lookup(&self, entity_type: &str, id: i64) -> Option<EntityId> {
        self.by_id.get(&(entity_type.to_string(), id)).copied()
    }

    /// Scalar lookup that sees through parent links.
    ///
    /// A sub-entity's ancestor rows share its ID, so when the instance does
    /// not carry the field itself, references to same-ID instances are
    /// searched. Inherited fields read as if they sat on the instance.
    pub fn scalar(&self, handle: EntityId, field: &str) -> Option<&Value> {
        let mut visited = vec![handle];
        self.scalar_walk(handle, field, &mut visited)
    }

    /// The same-ID reference graph can contain cycles (mutual references
    /// between instances sharing an ID), so the walk tracks visited handles.
    fn scalar_walk(
        &self,
        handle: EntityId,
        field: &str,
        visited: &mut Vec<EntityId>,
    ) -> Option<&Value> {
        let entity = self.get(handle);
        if let Some(value) = entity.scalar(field) {
            return Some(value);
        }
        for name in entity.field_names() {
            if let Some(FieldValue::Ref(target)) = entity.get(name) {
                if !visited.contains(target) && self.get(*target).id == entity.id {
                    visited.push(*target);
                    if let Some(value) = self.scalar_walk(*target, field, visited) {
                        return Some(value);
                    }
                }
            }
        }
        None
    }

    /// Look up a cached collection by (target type, back-reference, owner ID).
    pub fn cached_list(
        &self,
        target_type: &str,
        backref: &str,
        owner_id: i64,
    ) -> Option<&[EntityId]> {
        self.lists
            .get(&(target_type.to_string(), backref.to_string(), owner_id))
            .map(Vec::as_slice)
    }

    /// Cache a loaded collection.
    pub fn cache_list(
        &mut self,
        target_type: &str,
        backref: &str,
        owner_id: i64,
        handles: Vec<EntityId>,
    ) {
        self.lists.insert(
            (target_type.to_string(), backref.to_string(), owner_id),
            handles,
        );
    }

    /// Number of instances in the arena.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Result of a single-entity load: the session arena plus the root handle,
/// absent when no row matched.
#[derive(Debug)]
pub struct LoadedEntity {
    /// The session owning every instance reached by the load.
    pub session: Session,
    /// Handle of the loaded entity, if a row matched.
    pub root: Option<EntityId>,
}

impl LoadedEntity {
    /// The loaded entity, if any.
    pub fn entity(&self) -> Option<&Entity> {
        self.root.map(|handle| self.session.get(handle))
    }

    /// Resolve any handle from this load.
    pub fn get(&self, handle: EntityId) -> &Entity {
        self.session.get(handle)
    }
}

/// Result of a list load: the session arena plus the root handles in result
/// row order.
#[derive(Debug)]
pub struct LoadedList {
    /// The session owning every instance reached by the load.
    pub session: Session,
    /// Handles of the loaded entities.
    pub roots: Vec<EntityId>,
}

impl LoadedList {
    /// Iterate the loaded entities in result order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.roots.iter().map(|handle| self.session.get(*handle))
    }

    /// Resolve any handle from this load.
    pub fn get(&self, handle: EntityId) -> &Entity {
        self.session.get(handle)
    }

    /// Number of loaded entities.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether no rows matched.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_cache() {
        let mut session = Session::new();
        let user = session.insert(Entity::with_id("User", 5));

        assert_eq!(session.lookup("User", 5), Some(user));
        assert_eq!(session.lookup("User", 6), None);
        assert_eq!(session.lookup("Address", 5), None);
    }

    #[test]
    fn test_unidentified_instance_not_cached() {
        let mut session = Session::new();
        session.insert(Entity::new("User"));
        assert_eq!(session.len(), 1);
        assert_eq!(session.lookup("User", 0), None);
    }

    #[test]
    fn test_list_cache() {
        let mut session = Session::new();
        let a = session.insert(Entity::with_id("Address", 1));
        let b = session.insert(Entity::with_id("Address", 2));
        session.cache_list("Address", "user", 5, vec![a, b]);

        assert_eq!(session.cached_list("Address", "user", 5), Some(&[a, b][..]));
        assert_eq!(session.cached_list("Address", "user", 6), None);
        assert_eq!(session.cached_list("Address", "owner", 5), None);
    }

    #[test]
    fn test_scalar_sees_through_parent_links() {
        let mut session = Session::new();
        let user = session.insert(Entity::with_id("User", 5));
        session.get_mut(user).set_scalar("name", "Joe");
        let student = session.insert(Entity::with_id("Student", 5));
        session
            .get_mut(student)
            .set_scalar("year", 3i64)
            .set_ref("user", user);

        assert_eq!(
            session.scalar(student, "year"),
            Some(&Value::Int(3))
        );
        assert_eq!(
            session.scalar(student, "name"),
            Some(&Value::Text("Joe".into()))
        );
        assert_eq!(session.scalar(student, "missing"), None);
    }

    #[test]
    fn test_scalar_terminates_on_mutual_same_id_references() {
        let mut session = Session::new();
        let user = session.insert(Entity::with_id("User", 5));
        let address = session.insert(Entity::with_id("Address", 5));
        session.get_mut(user).set_ref("address", address);
        session.get_mut(address).set_ref("user", user);

        assert_eq!(session.scalar(user, "missing"), None);
        session.get_mut(address).set_scalar("street", "Main");
        assert_eq!(
            session.scalar(user, "street"),
            Some(&Value::Text("Main".into()))
        );
    }

    #[test]
    fn test_cycle_resolves_to_same_instance() {
        let mut session = Session::new();
        let user = session.insert(Entity::with_id("User", 5));
        let address = session.insert(Entity::with_id("Address", 9));
        session.get_mut(address).set_ref("user", user);
        session.get_mut(user).set_list("addresses", vec![address]);

        let children = session.get(user).list("addresses").unwrap().to_vec();
        let back = session.get(children[0]).reference("user").unwrap();
        assert_eq!(back, user);
    }
}
