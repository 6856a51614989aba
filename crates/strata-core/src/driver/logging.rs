//! Statement log wrapped around a connection, for tests.
//!
//! [`LoggingConnection`] records every statement and transaction call before
//! handing it to the wrapped connection, so tests can assert on the SQL text
//! and count round trips. By default it wraps an in-memory SQLite database.

use super::{Backend, Connection, Row, SqliteConnection, Statement};
use crate::{stmt::Value, Error, Result};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Builds a row from `(column, value)` pairs.
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Query,
    Execute,
}

#[derive(Debug)]
pub struct LoggingConnection<C = SqliteConnection> {
    inner: C,
    backend: Backend,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    log: Vec<(LogKind, Statement)>,
    events: Vec<&'static str>,
    fail_quoting: bool,
    fail_next: Option<Error>,
}

impl LoggingConnection<SqliteConnection> {
    /// A fresh in-memory SQLite database that reports `backend`, so queries
    /// are rendered in that backend's dialect.
    ///
    /// SQLite accepts backtick, bracket and double quote identifiers as well
    /// as `?` and `$n` placeholders. Statements using syntax only another
    /// backend understands are rejected when executed.
    pub fn sqlite(backend: Backend) -> Result<LoggingConnection> {
        Ok(LoggingConnection::new(SqliteConnection::in_memory()?).with_backend(backend))
    }

    /// Runs setup SQL directly on the database. Nothing is logged.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.inner.execute_batch(sql)
    }
}

impl<C: Connection> LoggingConnection<C> {
    pub fn new(inner: C) -> LoggingConnection<C> {
        LoggingConnection {
            backend: inner.backend(),
            inner,
            state: Mutex::new(State::default()),
        }
    }

    /// Reports `backend` instead of the backend of the wrapped connection.
    pub fn with_backend(mut self, backend: Backend) -> LoggingConnection<C> {
        self.backend = backend;
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Inserts `row` into `table` with `?` placeholders. Nothing is logged.
    pub fn insert(&self, table: &str, row: Row) -> Result<()> {
        let columns = row
            .keys()
            .map(|column| ident(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; row.len()].join(", ");
        let sql = format!(
            "insert into {} ({columns}) values ({placeholders})",
            ident(table)
        );

        self.inner
            .execute(&Statement::new(sql, row.into_values().collect()))?;
        Ok(())
    }

    /// Every row of `table` in insertion order. Nothing is logged.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let sql = format!("select * from {} order by rowid", ident(table));
        self.inner.query(&Statement::new(sql, vec![]))
    }

    /// All statements received so far, in order.
    pub fn log(&self) -> Vec<Statement> {
        self.lock().log.iter().map(|(_, stmt)| stmt.clone()).collect()
    }

    /// The SQL of every statement sent through [`Connection::query`].
    pub fn queries(&self) -> Vec<String> {
        self.lock()
            .log
            .iter()
            .filter(|(kind, _)| *kind == LogKind::Query)
            .map(|(_, stmt)| stmt.sql.clone())
            .collect()
    }

    pub fn query_count(&self) -> usize {
        self.queries().len()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Transaction control calls (`begin`, `commit`, `rollback`) in order.
    pub fn transaction_events(&self) -> Vec<&'static str> {
        self.lock().events.clone()
    }

    /// Makes every following call to [`Connection::quote`] fail.
    pub fn fail_quoting(&self) {
        self.lock().fail_quoting = true;
    }

    /// Makes the next `query` or `execute` call fail with `err`. The
    /// statement is logged but not run.
    pub fn fail_next(&self, err: Error) {
        self.lock().fail_next = Some(err);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test must not poison the log for the others.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, kind: LogKind, stmt: &Statement) -> Result<()> {
        let mut state = self.lock();
        state.log.push((kind, stmt.clone()));
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn event(&self, event: &'static str) {
        self.lock().events.push(event);
    }
}

impl<C: Connection> Connection for LoggingConnection<C> {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn quote(&self, value: &Value) -> Result<String> {
        if self.lock().fail_quoting {
            return Err(Error::connection("quoting rejected by the connection"));
        }
        self.inner.quote(value)
    }

    fn execute(&self, stmt: &Statement) -> Result<u64> {
        self.record(LogKind::Execute, stmt)?;
        self.inner.execute(stmt)
    }

    fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        self.record(LogKind::Query, stmt)?;
        self.inner.query(stmt)
    }

    fn begin(&self) -> Result<()> {
        self.inner.begin()?;
        self.event("begin");
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.inner.commit()?;
        self.event("commit");
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.inner.rollback()?;
        self.event("rollback");
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn last_insert_id(&self) -> Result<Value> {
        self.inner.last_insert_id()
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        self.inner.table_exists(table)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        self.inner.table_columns(table)
    }
}

fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tags() -> LoggingConnection {
        let conn = LoggingConnection::sqlite(Backend::Sqlite).unwrap();
        conn.execute_batch("create table tags (id integer primary key, name text)")
            .unwrap();
        conn
    }

    #[test]
    fn seeding_is_not_logged() {
        let conn = tags();
        conn.insert("tags", row([("name", "rust")])).unwrap();

        assert_eq!(conn.rows("tags").unwrap()[0]["id"], Value::I64(1));
        assert!(conn.log().is_empty());
    }

    #[test]
    fn statements_are_logged_by_kind() {
        let conn = tags();

        conn.execute(&Statement::new(
            "insert into tags (name) values (?)",
            vec![Value::from("sql")],
        ))
        .unwrap();
        conn.query(&Statement::new("select * from tags", vec![])).unwrap();

        assert_eq!(conn.log().len(), 2);
        assert_eq!(conn.queries(), vec!["select * from tags"]);
        assert_eq!(conn.query_count(), 1);
    }

    #[test]
    fn injected_failure_skips_the_statement() {
        let conn = tags();
        conn.fail_next(Error::execution_sqlstate("23000", "duplicate entry"));

        let err = conn
            .execute(&Statement::new(
                "insert into tags (name) values (?)",
                vec![Value::from("sql")],
            ))
            .unwrap_err();

        assert!(err.is_execution());
        assert!(conn.rows("tags").unwrap().is_empty());
        assert_eq!(conn.log().len(), 1);
    }

    #[test]
    fn reported_backend() {
        let conn = LoggingConnection::sqlite(Backend::MySql).unwrap();
        assert_eq!(conn.backend(), Backend::MySql);
        assert_eq!(conn.inner().backend(), Backend::Sqlite);
    }

    #[test]
    fn transaction_events_are_recorded() {
        let conn = tags();

        conn.begin().unwrap();
        conn.insert("tags", row([("name", "orm")])).unwrap();
        conn.rollback().unwrap();

        assert_eq!(conn.transaction_events(), vec!["begin", "rollback"]);
        assert!(conn.rows("tags").unwrap().is_empty());
    }
}
