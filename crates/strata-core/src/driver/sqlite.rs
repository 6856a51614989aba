use super::{quote_literal, Backend, Connection, Row, Statement};
use crate::{stmt::Value, Error, ExecutionErrorCode, Result};

use rusqlite::{
    ffi,
    types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef},
};
use std::{
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// A [`Connection`] to a SQLite database through `rusqlite`.
#[derive(Debug)]
pub struct SqliteConnection {
    connection: Mutex<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Opens a private in-memory database.
    pub fn in_memory() -> Result<SqliteConnection> {
        let connection = rusqlite::Connection::open_in_memory()
            .map_err(|err| Error::connection_failed("cannot open in-memory database", err))?;
        Ok(SqliteConnection::from_rusqlite(connection))
    }

    /// Opens the database file at `path`, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<SqliteConnection> {
        let path = path.as_ref();
        let connection = rusqlite::Connection::open(path).map_err(|err| {
            Error::connection_failed(format!("cannot open `{}`", path.display()), err)
        })?;
        Ok(SqliteConnection::from_rusqlite(connection))
    }

    pub fn from_rusqlite(connection: rusqlite::Connection) -> SqliteConnection {
        SqliteConnection {
            connection: Mutex::new(connection),
        }
    }

    /// Runs one or more `;`-separated statements without parameters, e.g.
    /// schema setup.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock().execute_batch(sql).map_err(execution_error)
    }

    fn lock(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connection for SqliteConnection {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn quote(&self, value: &Value) -> Result<String> {
        quote_literal(value)
    }

    fn execute(&self, stmt: &Statement) -> Result<u64> {
        let connection = self.lock();
        let mut prepared = connection.prepare(&stmt.sql).map_err(execution_error)?;
        let count = prepared
            .execute(rusqlite::params_from_iter(stmt.params.iter().map(Param)))
            .map_err(execution_error)?;
        Ok(count as u64)
    }

    fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let connection = self.lock();
        let mut prepared = connection.prepare(&stmt.sql).map_err(execution_error)?;
        let columns: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = prepared
            .query(rusqlite::params_from_iter(stmt.params.iter().map(Param)))
            .map_err(execution_error)?;

        let mut ret = vec![];
        while let Some(row) = rows.next().map_err(execution_error)? {
            let mut record = Row::with_capacity(columns.len());
            for (index, column) in columns.iter().enumerate() {
                let value = row.get_ref(index).map_err(execution_error)?;
                record.insert(column.clone(), from_sql(value));
            }
            ret.push(record);
        }
        Ok(ret)
    }

    fn begin(&self) -> Result<()> {
        self.execute_batch("begin")
    }

    fn commit(&self) -> Result<()> {
        self.execute_batch("commit")
    }

    fn rollback(&self) -> Result<()> {
        self.execute_batch("rollback")
    }

    fn in_transaction(&self) -> bool {
        !self.lock().is_autocommit()
    }

    fn last_insert_id(&self) -> Result<Value> {
        Ok(match self.lock().last_insert_rowid() {
            0 => Value::Null,
            id => Value::I64(id),
        })
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self
            .lock()
            .query_row(
                "select count(*) from sqlite_master where type = 'table' and name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(execution_error)?;
        Ok(count > 0)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let connection = self.lock();
        let mut prepared = connection
            .prepare("select name from pragma_table_info(?1)")
            .map_err(execution_error)?;
        let columns = prepared
            .query_map([table], |row| row.get::<_, String>(0))
            .map_err(execution_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(execution_error)?;

        if columns.is_empty() {
            return Err(Error::execution(
                ExecutionErrorCode::UndefinedTable,
                format!("no such table: {table}"),
            ));
        }
        Ok(columns)
    }
}

/// Binds a [`Value`] as a SQLite parameter.
struct Param<'a>(&'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::I64(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::F64(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::String(v) | Value::Enum(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            Value::Timestamp(v) => {
                ToSqlOutput::Owned(SqlValue::Text(v.format("%Y-%m-%d %H:%M:%S").to_string()))
            }
            Value::Json(v) => ToSqlOutput::Owned(SqlValue::Text(v.to_string())),
            Value::List(_) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    "a list cannot be bound as a single parameter".into(),
                ))
            }
        })
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::I64(v),
        ValueRef::Real(v) => Value::F64(v),
        ValueRef::Text(v) => Value::String(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
    }
}

fn execution_error(err: rusqlite::Error) -> Error {
    use ExecutionErrorCode::*;

    let code = match &err {
        rusqlite::Error::SqliteFailure(failure, message) => match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => DuplicateKey,
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ForeignKeyViolation,
            ffi::SQLITE_CONSTRAINT_NOTNULL => NotNullViolation,
            ffi::SQLITE_CONSTRAINT_CHECK => CheckViolation,
            _ => match message.as_deref() {
                Some(message) if message.starts_with("no such table") => UndefinedTable,
                Some(message) if message.starts_with("no such column") => UndefinedColumn,
                Some(message) if message.contains("syntax error") => SyntaxError,
                _ => Unknown,
            },
        },
        _ => Unknown,
    };

    Error::execution(code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users() -> SqliteConnection {
        let conn = SqliteConnection::in_memory().unwrap();
        conn.execute_batch(
            "create table users (id integer primary key, name text not null unique, score real);
             insert into users (name, score) values ('ann', 1.5), ('bob', null);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn query_returns_named_columns() {
        let conn = users();

        let rows = conn
            .query(&Statement::new(
                "select id, name, score from users where id = ?",
                vec![Value::from(1)],
            ))
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], Value::I64(1));
        assert_eq!(rows[0]["name"], Value::from("ann"));
        assert_eq!(rows[0]["score"], Value::F64(1.5));
    }

    #[test]
    fn numbered_placeholders_bind_in_order() {
        let conn = users();

        let rows = conn
            .query(&Statement::new(
                r#"select "name" from "users" where "id" = $1 or "name" = $2"#,
                vec![Value::from(2), Value::from("ann")],
            ))
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn insert_reports_the_row_id() {
        let conn = users();

        let count = conn
            .execute(&Statement::new(
                "insert into users (name) values (?)",
                vec![Value::from("cid")],
            ))
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(conn.last_insert_id().unwrap(), Value::I64(3));
    }

    #[test]
    fn constraint_failures_are_classified() {
        let conn = users();

        let err = conn
            .execute(&Statement::new(
                "insert into users (name) values (?)",
                vec![Value::from("ann")],
            ))
            .unwrap_err();
        assert_eq!(err.execution_code(), Some(ExecutionErrorCode::DuplicateKey));

        let err = conn
            .query(&Statement::new("select * from missing", vec![]))
            .unwrap_err();
        assert_eq!(err.execution_code(), Some(ExecutionErrorCode::UndefinedTable));
    }

    #[test]
    fn rollback_discards_changes() {
        let conn = users();

        conn.begin().unwrap();
        assert!(conn.in_transaction());
        conn.execute(&Statement::new("delete from users", vec![])).unwrap();
        conn.rollback().unwrap();

        assert!(!conn.in_transaction());
        let rows = conn.query(&Statement::new("select * from users", vec![])).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn schema_introspection() {
        let conn = users();

        assert!(conn.table_exists("users").unwrap());
        assert!(!conn.table_exists("posts").unwrap());
        assert_eq!(conn.table_columns("users").unwrap(), vec!["id", "name", "score"]);
        assert!(conn.table_columns("posts").unwrap_err().is_execution());
    }

    #[test]
    fn lists_are_not_bound() {
        let conn = users();

        let err = conn
            .query(&Statement::new(
                "select * from users where id = ?",
                vec![Value::List(vec![Value::from(1)])],
            ))
            .unwrap_err();
        assert!(err.is_execution());
    }
}
