//! Criteria: AND-composed expression lists rendered for execution.

use super::expression::Expression;
use super::join::merge_joins;
use crate::error::Error;
use crate::value::StatementParams;

/// Rendered form of a criteria: join clause text, WHERE text, and the
/// flattened bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    /// Join clause fragments joined with single spaces, empty when no joins
    /// are needed. Every alias is defined before any fragment based on it.
    pub joins: String,
    /// WHERE text without the leading keyword, `(t1) AND (t2)` style, empty
    /// when no expressions were added.
    pub restrictions: String,
    /// Bind parameters flattened in expression order. Empty signals that the
    /// plain query path should be used.
    pub params: StatementParams,
}

/// A base entity type plus expressions combined with AND.
#[derive(Debug, Clone)]
pub struct Criteria {
    base: String,
    expressions: Vec<Expression>,
    prepared: Option<Prepared>,
}

impl Criteria {
    /// Create an empty criteria for a base entity type.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            expressions: Vec::new(),
            prepared: None,
        }
    }

    /// The base entity type.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Append an expression. Rejects expressions built for a different base
    /// entity type.
    pub fn add(&mut self, expression: Expression) -> Result<&mut Self, Error> {
        if expression.base != self.base {
            return Err(Error::Validation(format!(
                "criteria for '{}' cannot hold an expression for '{}'",
                self.base, expression.base
            )));
        }
        self.prepared = None;
        self.expressions.push(expression);
        Ok(self)
    }

    /// Append several expressions, flattening the collections the equality
    /// builder produces.
    pub fn add_all(
        &mut self,
        expressions: impl IntoIterator<Item = Expression>,
    ) -> Result<&mut Self, Error> {
        for expression in expressions {
            self.add(expression)?;
        }
        Ok(self)
    }

    /// Whether no expressions were added.
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Render the criteria. Memoized until the next `add`.
    pub fn prepare(&mut self) -> &Prepared {
        if self.prepared.is_none() {
            let joins = merge_joins(self.expressions.iter().map(|e| e.joins.as_slice()));
            let join_text = joins
                .iter()
                .map(|j| j.render())
                .collect::<Vec<_>>()
                .join(" ");

            let restrictions = self
                .expressions
                .iter()
                .map(|e| format!("({})", e.term))
                .collect::<Vec<_>>()
                .join(" AND ");

            let mut params = StatementParams::new();
            for expression in &self.expressions {
                params.extend(&expression.params);
            }

            self.prepared = Some(Prepared {
                joins: join_text,
                restrictions,
                params,
            });
        }
        self.prepared.as_ref().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BindTag;
    use crate::query::join::{Join, JoinKey, JoinKind};

    fn expr(base: &str, term: &str, values: &[&str], joins: Vec<Join>) -> Expression {
        let mut params = StatementParams::new();
        for value in values {
            params.push(BindTag::Text, value.to_string());
        }
        Expression {
            base: base.into(),
            joins,
            term: term.into(),
            params,
        }
    }

    fn join(alias: &str) -> Join {
        Join {
            key: JoinKey {
                entity: "Address".into(),
                kind: JoinKind::Inner,
                base_place: "User".into(),
                base_column: "Address_ID".into(),
                join_column: "ID".into(),
            },
            target_table: "Address".into(),
            alias: alias.into(),
        }
    }

    #[test]
    fn test_empty_criteria() {
        let mut criteria = Criteria::new("User");
        let prepared = criteria.prepare();
        assert!(prepared.joins.is_empty());
        assert!(prepared.restrictions.is_empty());
        assert!(prepared.params.is_empty());
    }

    #[test]
    fn test_rejects_base_mismatch() {
        let mut criteria = Criteria::new("User");
        let result = criteria.add(expr("Course", "Course.Title=?", &["x"], Vec::new()));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_renders_and_of_parenthesized_terms() {
        let mut criteria = Criteria::new("User");
        criteria
            .add(expr("User", "User.Name=?", &["Joe"], Vec::new()))
            .unwrap();
        criteria
            .add(expr("User", "User.Age=?", &["30"], Vec::new()))
            .unwrap();

        let prepared = criteria.prepare();
        assert_eq!(prepared.restrictions, "(User.Name=?) AND (User.Age=?)");
        assert_eq!(prepared.params.tags, "ss");
        assert_eq!(
            prepared.params.values,
            vec!["Joe".to_string(), "30".to_string()]
        );
    }

    #[test]
    fn test_join_dedup_across_expressions() {
        let mut criteria = Criteria::new("User");
        criteria
            .add(expr("User", "J1.Street=?", &["a"], vec![join("J1")]))
            .unwrap();
        criteria
            .add(expr("User", "J1.City=?", &["b"], vec![join("J1")]))
            .unwrap();

        let prepared = criteria.prepare();
        assert_eq!(
            prepared.joins,
            "INNER JOIN Address J1 ON User.Address_ID=J1.ID"
        );
    }

    #[test]
    fn test_memo_invalidated_by_add() {
        let mut criteria = Criteria::new("User");
        criteria
            .add(expr("User", "User.Name=?", &["Joe"], Vec::new()))
            .unwrap();
        assert_eq!(criteria.prepare().params.len(), 1);

        criteria
            .add(expr("User", "User.Age=?", &["30"], Vec::new()))
            .unwrap();
        assert_eq!(criteria.prepare().params.len(), 2);
    }
}
