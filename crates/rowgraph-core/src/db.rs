//! Mapper entry point.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::Error;
use crate::query::{Criteria, Expressions, Joiner};
use crate::sql::{SqlInterface, Transaction};

/// The mapper: catalog, join registry, configuration, and the SQL interface
/// everything executes through.
///
/// Cheap to share; the join registry is deliberately long-lived so aliases
/// stay stable across queries.
pub struct Db {
    catalog: Arc<Catalog>,
    joiner: Arc<Joiner>,
    sql: Arc<dyn SqlInterface>,
    config: Config,
}

impl Db {
    /// Create a mapper over a registered catalog and a SQL interface.
    pub fn new(catalog: Arc<Catalog>, sql: Arc<dyn SqlInterface>, config: Config) -> Self {
        Self {
            catalog,
            joiner: Arc::new(Joiner::new()),
            sql,
            config,
        }
    }

    /// The entity catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The mapper configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Expression builder bound to this mapper's catalog and join registry.
    pub fn expressions(&self) -> Expressions<'_> {
        Expressions::new(
            &self.catalog,
            &self.joiner,
            &self.config.formats,
            self.sql.as_ref(),
        )
    }

    /// Convenience constructor for a criteria over a base entity type.
    pub fn criteria(&self, base: &str) -> Result<Criteria, Error> {
        self.catalog.entity(base)?;
        Ok(Criteria::new(base))
    }

    /// Begin a transaction. The returned guard rolls back on drop unless
    /// committed.
    pub fn begin(&self) -> Result<Transaction<'_>, Error> {
        Transaction::begin(self.sql.as_ref())
    }

    /// Run a closure inside a transaction, committing on success and rolling
    /// back on error.
    pub fn transaction<T>(
        &self,
        run: impl FnOnce(&Transaction<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let tx = self.begin()?;
        let value = run(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub(crate) fn sql(&self) -> &dyn SqlInterface {
        self.sql.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionSettings;
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

    fn db(sql: Arc<TxLog>) -> Db {
        let config =
            Config::new(ConnectionSettings::new("localhost", "app", "root", "")).unwrap();
        Db::new(Arc::new(Catalog::new()), sql, config)
    }

    #[test]
    fn test_transaction_commits_on_success() {
        let sql = Arc::new(TxLog::default());
        let db = db(sql.clone());
        db.transaction(|_tx| Ok(())).unwrap();
        assert_eq!(*sql.log.lock().unwrap(), vec!["begin", "commit"]);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let sql = Arc::new(TxLog::default());
        let db = db(sql.clone());
        let result: Result<(), Error> =
            db.transaction(|_tx| Err(Error::Validation("boom".into())));
        assert!(result.is_err());
        assert_eq!(*sql.log.lock().unwrap(), vec!["begin", "rollback"]);
    }

    #[test]
    fn test_criteria_rejects_unknown_base() {
        let sql = Arc::new(TxLog::default());
        let db = db(sql);
        assert!(db.criteria("Ghost").is_err());
    }
}
