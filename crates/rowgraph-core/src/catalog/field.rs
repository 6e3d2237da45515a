//! Field definitions for entities.

use super::types::ScalarType;

/// What kind of data a field maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A column of the entity's own table holding a scalar value.
    Scalar {
        /// Column name.
        column: String,
        /// Scalar type of the column.
        scalar: ScalarType,
    },
    /// A foreign key column referencing another entity's primary key.
    ManyToOne {
        /// Column name holding the referenced ID.
        column: String,
        /// Name of the referenced entity.
        target: String,
    },
    /// A collection of entities whose many-to-one field points back here.
    /// Backed by no column of the owning table.
    OneToMany {
        /// Name of the child entity.
        target: String,
        /// Name of the child's many-to-one field pointing back.
        backref: String,
    },
    /// A collection reached through an associative entity.
    ManyToMany {
        /// Name of the associative entity.
        via: String,
        /// Which side of the associative entity this field occupies.
        side: Side,
    },
}

/// A side of an associative entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The A side.
    A,
    /// The B side.
    B,
}

impl Side {
    /// The other side.
    pub fn opposite(&self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
}

impl FieldDef {
    /// Create a scalar field backed by a column.
    pub fn scalar(name: impl Into<String>, column: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar {
                column: column.into(),
                scalar,
            },
        }
    }

    /// Create a many-to-one reference field backed by a foreign key column.
    pub fn many_to_one(
        name: impl Into<String>,
        column: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::ManyToOne {
                column: column.into(),
                target: target.into(),
            },
        }
    }

    /// Create a one-to-many collection field.
    pub fn one_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        backref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::OneToMany {
                target: target.into(),
                backref: backref.into(),
            },
        }
    }

    /// Create a many-to-many collection field reached through an associative
    /// entity. `side` is the side of the associative entity that points at
    /// the owning entity.
    pub fn many_to_many(name: impl Into<String>, via: impl Into<String>, side: Side) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::ManyToMany {
                via: via.into(),
                side,
            },
        }
    }

    /// The backing column name, if this field maps to one.
    pub fn column(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Scalar { column, .. } | FieldKind::ManyToOne { column, .. } => Some(column),
            FieldKind::OneToMany { .. } | FieldKind::ManyToMany { .. } => None,
        }
    }

    /// The scalar type, if this is a scalar field.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match &self.kind {
            FieldKind::Scalar { scalar, .. } => Some(*scalar),
            _ => None,
        }
    }

    /// Check if this field is a collection (one-to-many or many-to-many).
    pub fn is_collection(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::OneToMany { .. } | FieldKind::ManyToMany { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_field() {
        let field = FieldDef::scalar("name", "Name", ScalarType::Text);
        assert_eq!(field.column(), Some("Name"));
        assert_eq!(field.scalar_type(), Some(ScalarType::Text));
        assert!(!field.is_collection());
    }

    #[test]
    fn test_many_to_one_field() {
        let field = FieldDef::many_to_one("user", "User_ID", "User");
        assert_eq!(field.column(), Some("User_ID"));
        assert_eq!(field.scalar_type(), None);
    }

    #[test]
    fn test_collection_fields() {
        let otm = FieldDef::one_to_many("addresses", "Address", "user");
        assert!(otm.is_collection());
        assert_eq!(otm.column(), None);

        let mtm = FieldDef::many_to_many("courses", "Student_Course", Side::A);
        assert!(mtm.is_collection());
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::A.opposite(), Side::B);
        assert_eq!(Side::B.opposite(), Side::A);
    }
}
