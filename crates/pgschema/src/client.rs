//! Generic client trait for unified database access.

use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::value::Value;
use tokio_postgres::types::ToSql;

/// Longest SQL text (in bytes) emitted in `pgschema.sql` events.
const MAX_LOGGED_SQL: usize = 200;

/// A trait that unifies database clients and transactions.
///
/// Every schema operation takes `&impl GenericClient`, so the same table can be
/// driven by a plain connection, a pooled connection or an open transaction.
/// Parameters are bound positionally (`$1`, `$2`, ...) and result rows come
/// back as [`Record`]s.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Execute a query and return the first row, if any.
    ///
    /// Extra rows are ignored.
    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(rows.into_iter().next())
        }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Whether statements already run inside a transaction.
    ///
    /// Multi-statement operations nest with a savepoint instead of issuing
    /// `BEGIN`/`COMMIT` of their own.
    fn in_transaction(&self) -> bool {
        false
    }

    /// Execute one statement once per parameter set and return the total
    /// number of affected rows.
    fn execute_many(
        &self,
        sql: &str,
        rows: &[Vec<Value>],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send {
        async move {
            let mut total = 0;
            for params in rows {
                total += self.execute(sql, params).await?;
            }
            Ok(total)
        }
    }
}

fn as_params(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn truncate_sql(sql: &str) -> &str {
    if sql.len() <= MAX_LOGGED_SQL {
        return sql;
    }
    let mut end = MAX_LOGGED_SQL;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

pub(crate) fn log_statement(sql: &str, params: usize) {
    tracing::debug!(target: "pgschema.sql", sql = truncate_sql(sql), params, "executing");
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        log_statement(sql, params.len());
        let rows = tokio_postgres::Client::query(self, sql, &as_params(params))
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(Record::from_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        log_statement(sql, params.len());
        tokio_postgres::Client::execute(self, sql, &as_params(params))
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        log_statement(sql, rows.len());
        let stmt = tokio_postgres::Client::prepare(self, sql)
            .await
            .map_err(OrmError::from_db_error)?;
        let mut total = 0;
        for params in rows {
            total += tokio_postgres::Client::execute(self, &stmt, &as_params(params))
                .await
                .map_err(OrmError::from_db_error)?;
        }
        Ok(total)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    fn in_transaction(&self) -> bool {
        true
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        log_statement(sql, params.len());
        let rows = tokio_postgres::Transaction::query(self, sql, &as_params(params))
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(Record::from_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        log_statement(sql, params.len());
        tokio_postgres::Transaction::execute(self, sql, &as_params(params))
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        log_statement(sql, rows.len());
        let stmt = tokio_postgres::Transaction::prepare(self, sql)
            .await
            .map_err(OrmError::from_db_error)?;
        let mut total = 0;
        for params in rows {
            total += tokio_postgres::Transaction::execute(self, &stmt, &as_params(params))
                .await
                .map_err(OrmError::from_db_error)?;
        }
        Ok(total)
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::ClientWrapper {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        GenericClient::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        GenericClient::execute(&**self, sql, params).await
    }

    async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        GenericClient::execute_many(&**self, sql, rows).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        GenericClient::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        GenericClient::execute(&**self, sql, params).await
    }

    async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        GenericClient::execute_many(&**self, sql, rows).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Transaction<'_> {
    fn in_transaction(&self) -> bool {
        true
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        GenericClient::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        GenericClient::execute(&**self, sql, params).await
    }

    async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        GenericClient::execute_many(&**self, sql, rows).await
    }
}

impl<C: GenericClient> GenericClient for &C {
    fn in_transaction(&self) -> bool {
        (*self).in_transaction()
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        (*self).query(sql, params).await
    }

    async fn query_opt(&self, sql: &str, params: &[Value]) -> OrmResult<Option<Record>> {
        (*self).query_opt(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        (*self).execute(sql, params).await
    }

    async fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> OrmResult<u64> {
        (*self).execute_many(sql, rows).await
    }
}
