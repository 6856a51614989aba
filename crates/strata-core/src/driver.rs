#[cfg(feature = "test-util")]
pub mod logging;

#[cfg(feature = "sqlite")]
mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConnection;

use crate::{stmt::Value, Error, Result};

use indexmap::IndexMap;
use std::fmt::Debug;

/// A row returned by a connection, keyed by column name in select order.
pub type Row = IndexMap<String, Value>;

/// The database family a connection talks to.
///
/// The backend selects the SQL grammar used to render queries for the
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    MySql,
    MariaDb,
    Postgresql,
    Sqlite,
    SqlServer,

    /// Unknown backend. Identifiers are not escaped.
    Generic,
}

impl Backend {
    /// Returns `true` for backends that understand `on duplicate key update`.
    pub fn supports_upsert_on_duplicate_key(self) -> bool {
        matches!(self, Backend::MySql | Backend::MariaDb)
    }
}

/// A compiled statement: SQL text and its bound parameters in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Statement {
        Statement {
            sql: sql.into(),
            params,
        }
    }
}

/// An open connection to a database.
///
/// Connections are provided by the application; Strata only renders SQL and
/// hands it over. Failures are reported as connection errors (connect, auth)
/// or execution errors (statement rejected).
pub trait Connection: Debug + Send + Sync {
    /// The backend this connection talks to.
    fn backend(&self) -> Backend;

    /// Renders `value` as a SQL literal that is safe to embed in a statement.
    fn quote(&self, value: &Value) -> Result<String>;

    /// Executes a statement that returns no rows, returning the number of
    /// affected rows.
    fn execute(&self, stmt: &Statement) -> Result<u64>;

    /// Executes a statement and returns all of its rows.
    fn query(&self, stmt: &Statement) -> Result<Vec<Row>>;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    fn in_transaction(&self) -> bool;

    /// The id generated by the most recent insert.
    fn last_insert_id(&self) -> Result<Value>;

    fn table_exists(&self, table: &str) -> Result<bool>;

    fn table_columns(&self, table: &str) -> Result<Vec<String>>;
}

/// Renders `value` as an ANSI SQL literal.
///
/// Connections without a native quoting primitive can use this for their
/// [`Connection::quote`] implementation.
pub fn quote_literal(value: &Value) -> Result<String> {
    fn quote_str(s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    Ok(match value {
        Value::Null => "null".to_string(),
        Value::Bool(v) => (if *v { "1" } else { "0" }).to_string(),
        Value::I64(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::String(v) => quote_str(v),
        Value::Enum(v) => quote_str(v),
        Value::Bytes(v) => {
            let hex: String = v.iter().map(|byte| format!("{byte:02x}")).collect();
            format!("X'{hex}'")
        }
        Value::Timestamp(v) => quote_str(&v.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::Json(v) => quote_str(&v.to_string()),
        Value::List(_) => {
            return Err(Error::connection(
                "a list cannot be quoted as a single literal",
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(
            quote_literal(&Value::from("O'Brien")).unwrap(),
            "'O''Brien'"
        );
    }

    #[test]
    fn quote_bytes_as_hex() {
        assert_eq!(
            quote_literal(&Value::Bytes(vec![0xde, 0xad])).unwrap(),
            "X'dead'"
        );
    }

    #[test]
    fn quote_rejects_lists() {
        let err = quote_literal(&Value::List(vec![])).unwrap_err();
        assert!(err.is_connection());
    }
}
