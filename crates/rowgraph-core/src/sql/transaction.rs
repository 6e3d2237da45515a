//! Scoped transaction guard.

use tracing::warn;

use super::SqlInterface;
use crate::error::Error;

/// An open transaction on the SQL interface.
///
/// The guard must be consumed by [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback). Dropping it with neither called
/// rolls the transaction back, so an early `?` return cannot leave the
/// connection inside an open transaction.
pub struct Transaction<'a> {
    sql: &'a dyn SqlInterface,
    finished: bool,
}

impl<'a> Transaction<'a> {
    /// Begin a transaction.
    pub(crate) fn begin(sql: &'a dyn SqlInterface) -> Result<Self, Error> {
        sql.begin()?;
        Ok(Self {
            sql,
            finished: false,
        })
    }

    /// Commit the transaction.
    pub fn commit(mut self) -> Result<(), Error> {
        self.finished = true;
        self.sql.commit()
    }

    /// Roll back the transaction.
    pub fn rollback(mut self) -> Result<(), Error> {
        self.finished = true;
        self.sql.rollback()
    }

    /// The SQL interface this transaction runs on.
    pub(crate) fn sql(&self) -> &'a dyn SqlInterface {
        self.sql
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.sql.rollback() {
                warn!("rollback of abandoned transaction failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Row;
    use crate::value::StatementParams;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TxLog {
        log: Mutex<Vec<&'static str>>,
    }

    impl SqlInterface for TxLog {
        fn select(&self, _query: &str) -> Result<Vec<Row>, Error> {
            Ok(Vec::new())
        }
        fn select_prepared(
            &self,
            _query: &str,
            _params: &StatementParams,
        ) -> Result<Vec<Row>, Error> {
            Ok(Vec::new())
        }
        fn execute_prepared(
            &self,
            _statement: &str,
            _params: &StatementParams,
        ) -> Result<u64, Error> {
            Ok(0)
        }
        fn last_insert_id(&self) -> Result<i64, Error> {
            Ok(0)
        }
        fn begin(&self) -> Result<(), Error> {
            self.log.lock().unwrap().push("begin");
            Ok(())
        }
        fn commit(&self) -> Result<(), Error> {
            self.log.lock().unwrap().push("commit");
            Ok(())
        }
        fn rollback(&self) -> Result<(), Error> {
            self.log.lock().unwrap().push("rollback");
            Ok(())
        }
    }

    #[test]
    fn test_commit_consumes_guard() {
        let sql = TxLog::default();
        let tx = Transaction::begin(&sql).unwrap();
        tx.commit().unwrap();
        assert_eq!(*sql.log.lock().unwrap(), vec!["begin", "commit"]);
    }

    #[test]
    fn test_drop_rolls_back() {
        let sql = TxLog::default();
        {
            let _tx = Transaction::begin(&sql).unwrap();
        }
        assert_eq!(*sql.log.lock().unwrap(), vec!["begin", "rollback"]);
    }

    #[test]
    fn test_explicit_rollback_not_doubled() {
        let sql = TxLog::default();
        let tx = Transaction::begin(&sql).unwrap();
        tx.rollback().unwrap();
        assert_eq!(*sql.log.lock().unwrap(), vec!["begin", "rollback"]);
    }
}
