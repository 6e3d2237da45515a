//! Join alias registry and join clause rendering.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Join kinds used in rendered join clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// Inner join.
    Inner,
    /// Left outer join.
    Left,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER"),
            JoinKind::Left => write!(f, "LEFT"),
        }
    }
}

/// Structural identity of a join.
///
/// The base place is either a table name or the alias of an earlier join,
/// which is how join chains compose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinKey {
    /// Target entity name.
    pub entity: String,
    /// Join kind.
    pub kind: JoinKind,
    /// Table name or alias the join starts from.
    pub base_place: String,
    /// Column on the base place.
    pub base_column: String,
    /// Column on the joined table.
    pub join_column: String,
}

/// Alias counter shared by every [`Joiner`] in the process. Aliases only
/// need to be unique, never minimal, so a process-wide counter is the
/// simplest way to keep expressions built against different joiners
/// mergeable without collisions.
static ALIAS_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Deduplicating alias registry.
///
/// Structurally identical join keys map to the same alias for the lifetime
/// of the registry. Fresh aliases are `J{n}` with a monotonically increasing
/// `n`.
#[derive(Debug, Default)]
pub struct Joiner {
    names: DashMap<JoinKey, String>,
}

impl Joiner {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The alias for a join key, allocating one on first occurrence.
    pub fn alias(&self, key: &JoinKey) -> String {
        self.names
            .entry(key.clone())
            .or_insert_with(|| format!("J{}", ALIAS_COUNTER.fetch_add(1, Ordering::SeqCst)))
            .clone()
    }
}

/// A join required by an expression: its structural key, resolved alias,
/// and the table the alias stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Structural identity, used for merge dedup.
    pub key: JoinKey,
    /// Table being joined in under the alias.
    pub target_table: String,
    /// Alias resolved through the [`Joiner`].
    pub alias: String,
}

impl Join {
    /// Render the join clause fragment.
    pub fn render(&self) -> String {
        format!(
            "{} JOIN {} {} ON {}.{}={}.{}",
            self.key.kind,
            self.target_table,
            self.alias,
            self.key.base_place,
            self.key.base_column,
            self.alias,
            self.key.join_column
        )
    }
}

/// Merge joins from several expressions, deduplicating by structural key
/// and keeping first-seen order so an alias's definition precedes any join
/// based on it.
pub fn merge_joins<'a>(lists: impl IntoIterator<Item = &'a [Join]>) -> Vec<Join> {
    let mut merged: Vec<Join> = Vec::new();
    for list in lists {
        for join in list {
            if !merged.iter().any(|seen| seen.key == join.key) {
                merged.push(join.clone());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(base_place: &str) -> JoinKey {
        JoinKey {
            entity: "Address".into(),
            kind: JoinKind::Inner,
            base_place: base_place.into(),
            base_column: "Address_ID".into(),
            join_column: "ID".into(),
        }
    }

    #[test]
    fn test_alias_idempotent() {
        let joiner = Joiner::new();
        let first = joiner.alias(&key("User"));
        let second = joiner.alias(&key("User"));
        assert_eq!(first, second);
        assert!(first.starts_with('J'));
    }

    #[test]
    fn test_distinct_keys_get_distinct_aliases() {
        let joiner = Joiner::new();
        let a = joiner.alias(&key("User"));
        let b = joiner.alias(&key("Student"));
        let mut left_key = key("User");
        left_key.kind = JoinKind::Left;
        let c = joiner.alias(&left_key);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_render() {
        let join = Join {
            key: key("User"),
            target_table: "Address".into(),
            alias: "J3".into(),
        };
        assert_eq!(
            join.render(),
            "INNER JOIN Address J3 ON User.Address_ID=J3.ID"
        );
    }

    #[test]
    fn test_merge_dedups_in_first_seen_order() {
        let joiner = Joiner::new();
        let shared = Join {
            alias: joiner.alias(&key("User")),
            key: key("User"),
            target_table: "Address".into(),
        };
        let other = Join {
            alias: joiner.alias(&key("Student")),
            key: key("Student"),
            target_table: "Address".into(),
        };

        let merged = merge_joins([
            &[shared.clone()][..],
            &[other.clone(), shared.clone()][..],
        ]);
        assert_eq!(merged, vec![shared, other]);
    }
}
