//! SQL interface boundary.
//!
//! The mapper never talks to a driver directly. Everything goes through the
//! [`SqlInterface`] trait, which exposes plain and prepared statement
//! execution plus transaction control. Drivers report failures as
//! [`Error::QueryExecution`] with the server error code, and the helpers
//! here translate the codes the mapper cares about.

mod transaction;

pub use transaction::Transaction;

use std::time::Duration;

use tracing::warn;

use crate::error::Error;
use crate::value::StatementParams;

/// Duplicate entry for a unique key.
pub const ER_DUP_ENTRY: u32 = 1062;
/// Row is referenced by a foreign key.
pub const ER_ROW_IS_REFERENCED: u32 = 1451;
/// Prepared statement needs to be re-prepared.
pub const ER_NEED_REPREPARE: u32 = 1615;

/// Delay before retrying a statement that failed with re-prepare.
const REPREPARE_DELAY: Duration = Duration::from_millis(50);

/// One result row: column name and driver text value pairs, in SELECT order.
/// A `None` value is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, Option<String>)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column value.
    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) -> &mut Self {
        self.columns.push((column.into(), value));
        self
    }

    /// Get a column's text value. `None` for SQL NULL or an absent column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Whether the row carries the column at all.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|(name, _)| name == column)
    }

    /// Iterate the columns in SELECT order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }
}

impl FromIterator<(String, Option<String>)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Driver boundary for SQL execution.
///
/// Implementations are expected to surface server errors as
/// [`Error::QueryExecution`] carrying the server error code.
pub trait SqlInterface: Send + Sync {
    /// Run a SELECT without parameters.
    fn select(&self, query: &str) -> Result<Vec<Row>, Error>;

    /// Run a SELECT as a prepared statement.
    fn select_prepared(&self, query: &str, params: &StatementParams) -> Result<Vec<Row>, Error>;

    /// Run a non-SELECT statement as a prepared statement. Returns the number
    /// of affected rows.
    fn execute_prepared(&self, statement: &str, params: &StatementParams) -> Result<u64, Error>;

    /// The auto-generated ID of the last INSERT on this connection.
    fn last_insert_id(&self) -> Result<i64, Error>;

    /// Begin a transaction.
    fn begin(&self) -> Result<(), Error>;

    /// Commit the open transaction.
    fn commit(&self) -> Result<(), Error>;

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<(), Error>;

    /// Escape a string for literal embedding in SQL text.
    fn escape_string(&self, raw: &str) -> String {
        let mut escaped = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '\'' => escaped.push_str("''"),
                '\\' => escaped.push_str("\\\\"),
                _ => escaped.push(c),
            }
        }
        escaped
    }
}

/// Run a SELECT, prepared when parameters are present, plain otherwise.
pub(crate) fn select_auto(
    sql: &dyn SqlInterface,
    query: &str,
    params: &StatementParams,
) -> Result<Vec<Row>, Error> {
    if params.is_empty() {
        sql.select(query)
    } else {
        retry_reprepare(|| sql.select_prepared(query, params))
    }
}

/// Run a SELECT expected to match at most one row.
pub(crate) fn select_single(
    sql: &dyn SqlInterface,
    query: &str,
    params: &StatementParams,
) -> Result<Option<Row>, Error> {
    let mut rows = select_auto(sql, query, params)?;
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        n => Err(Error::AmbiguousResult(format!(
            "expected at most one row, query matched {n}"
        ))),
    }
}

/// Run a mutation statement, translating constraint error codes.
pub(crate) fn execute(
    sql: &dyn SqlInterface,
    statement: &str,
    params: &StatementParams,
) -> Result<u64, Error> {
    retry_reprepare(|| sql.execute_prepared(statement, params)).map_err(translate_constraint)
}

/// Retry a statement once after a short delay when the server asks for a
/// re-prepare. Statements can be invalidated by concurrent DDL.
fn retry_reprepare<T>(run: impl Fn() -> Result<T, Error>) -> Result<T, Error> {
    match run() {
        Err(Error::QueryExecution { code, message }) if code == ER_NEED_REPREPARE => {
            warn!(code, "statement needs re-prepare, retrying: {message}");
            std::thread::sleep(REPREPARE_DELAY);
            run()
        }
        other => other,
    }
}

/// Map duplicate-key and referenced-row server errors to constraint errors.
fn translate_constraint(err: Error) -> Error {
    match err {
        Error::QueryExecution { code, message }
            if code == ER_DUP_ENTRY || code == ER_ROW_IS_REFERENCED =>
        {
            Error::Constraint(message)
        }
        other => other,
    }
}
