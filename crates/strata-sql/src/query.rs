use crate::{Condition, Grammar, Placeholder, QueryValue};

use strata_core::{
    driver::{Connection, Row, Statement},
    stmt::Value,
    Error, Result,
};

use std::{fmt::Write, sync::Arc};

/// Sort direction of an `order by` item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    None,
    Select,
    Where,
    GroupBy,
    OrderBy,
    Values,
    Set,
}

/// A SQL statement under construction.
///
/// The query accumulates SQL text and bound parameters left to right. Each
/// bound parameter leaves a `?` in the text and a marker recording its byte
/// offset; [`Query::build`] renders the markers in the style of the
/// connection's dialect.
///
/// Builder methods take `self` and never fail. The first error is kept and
/// returned by [`Query::build`], [`Query::fetch_all`] and
/// [`Query::execute`]; later builder calls are ignored once an error is set.
#[derive(Debug, Clone)]
pub struct Query {
    connection: Arc<dyn Connection>,
    grammar: Grammar,
    sql: String,
    params: Vec<Value>,
    markers: Vec<usize>,
    clause: Clause,
    error: Option<Error>,
}

impl Query {
    /// An empty query rendered with the grammar of the connection's backend.
    pub fn new(connection: Arc<dyn Connection>) -> Query {
        let grammar = Grammar::for_backend(connection.backend());
        Query::with_grammar(connection, grammar)
    }

    pub fn with_grammar(connection: Arc<dyn Connection>, grammar: Grammar) -> Query {
        Query {
            connection,
            grammar,
            sql: String::new(),
            params: vec![],
            markers: vec![],
            clause: Clause::None,
            error: None,
        }
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// The accumulated SQL text with `?` at every bound parameter.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    // ===== Accumulation =====

    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Appends a value inline.
    ///
    /// Numbers are stringified, booleans become `1`/`0`, and `null` and enum
    /// constants are written as-is. Every other value is quoted by the
    /// connection; a quoting failure is reported as a query error.
    pub fn push_value(&mut self, value: &QueryValue) -> Result<()> {
        match value {
            QueryValue::Literal(literal) => self.push_sql(literal.as_str()),
            QueryValue::Column(column) => self.push_sql(column.literal()),
            QueryValue::Value(value) => {
                let sql = self.render_value(value)?;
                self.push_sql(&sql);
            }
            QueryValue::Struct(fragment) => fragment.compile(self)?,
            QueryValue::Query(query) => self.splice(query)?,
        }
        Ok(())
    }

    /// Appends a value as a bound parameter. Enum constants and values that
    /// are not plain values are appended as with [`Query::push_value`].
    pub fn push_param(&mut self, value: &QueryValue) -> Result<()> {
        match value {
            QueryValue::Value(Value::List(items)) => {
                self.push_sql("(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.push_sql(self.grammar.field_separator);
                    }
                    self.bind(item.clone());
                }
                self.push_sql(")");
                Ok(())
            }
            QueryValue::Value(Value::Enum(_)) => self.push_value(value),
            QueryValue::Value(value) => {
                self.bind(value.clone());
                Ok(())
            }
            _ => self.push_value(value),
        }
    }

    /// Appends values inline, separated by the grammar's field separator.
    pub fn push_list(&mut self, values: &[QueryValue]) -> Result<()> {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.push_sql(self.grammar.field_separator);
            }
            self.push_value(value)?;
        }
        Ok(())
    }

    /// Appends `nested` in parentheses, carrying over its parameters.
    ///
    /// An error stored in `nested` is returned.
    pub fn splice(&mut self, nested: &Query) -> Result<()> {
        if let Some(err) = &nested.error {
            return Err(err.clone());
        }

        self.push_sql("(");
        let base = self.sql.len();
        self.sql.push_str(&nested.sql);
        self.markers
            .extend(nested.markers.iter().map(|marker| marker + base));
        self.params.extend(nested.params.iter().cloned());
        self.push_sql(")");
        Ok(())
    }

    fn bind(&mut self, value: Value) {
        self.markers.push(self.sql.len());
        self.sql.push('?');
        self.params.push(value);
    }

    fn render_value(&self, value: &Value) -> Result<String> {
        match value {
            Value::Null => Ok("null".to_string()),
            Value::Bool(true) => Ok("1".to_string()),
            Value::Bool(false) => Ok("0".to_string()),
            Value::I64(v) => Ok(v.to_string()),
            Value::F64(v) => Ok(v.to_string()),
            Value::Enum(v) => Ok(v.clone()),
            Value::List(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    rendered.push(self.render_value(item)?);
                }
                Ok(format!("({})", rendered.join(self.grammar.field_separator)))
            }
            _ => self.connection.quote(value).map_err(|err| {
                err.context(Error::query(format!(
                    "failed to quote {} value",
                    value.type_name()
                )))
            }),
        }
    }

    fn then(mut self, f: impl FnOnce(&mut Query) -> Result<()>) -> Query {
        if self.error.is_none() {
            if let Err(err) = f(&mut self) {
                self.error = Some(err);
            }
        }
        self
    }

    /// Continues `clause` with `separator`, or opens it with `keyword` after
    /// a space.
    fn separate(&mut self, clause: Clause, keyword: &str, separator: &str) {
        if self.clause == clause {
            self.push_sql(separator);
        } else {
            self.push_space();
            self.push_sql(keyword);
            self.clause = clause;
        }
    }

    fn push_space(&mut self) {
        if !self.sql.is_empty() && !self.sql.ends_with(' ') {
            self.sql.push(' ');
        }
    }

    // ===== Builder =====

    /// Records `err` unless an earlier error is already recorded.
    pub fn fail(mut self, err: Error) -> Query {
        if self.error.is_none() {
            self.error = Some(err);
        }
        self
    }

    /// Appends raw SQL, separated from the text before it by a space.
    pub fn raw(self, sql: &str) -> Query {
        self.then(|query| {
            query.push_space();
            query.push_sql(sql);
            query.clause = Clause::None;
            Ok(())
        })
    }

    /// `select {fields}`. Plain string values are treated as field names
    /// and escaped; `select *` when `fields` is empty.
    pub fn select<V: Into<QueryValue>>(self, fields: impl IntoIterator<Item = V>) -> Query {
        let fields: Vec<QueryValue> = fields.into_iter().map(Into::into).collect();

        self.then(|query| {
            query.separate(Clause::Select, "select ", ", ");

            if fields.is_empty() {
                query.push_sql("*");
                return Ok(());
            }

            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    query.push_sql(query.grammar.field_separator);
                }
                match field {
                    QueryValue::Value(Value::String(name)) => {
                        let escaped = query.grammar.escape_fields(name);
                        query.push_sql(&escaped);
                    }
                    field => query.push_value(field)?,
                }
            }
            Ok(())
        })
    }

    pub fn from(self, table: &str) -> Query {
        self.then(|query| {
            let table = query.grammar.escape_table(table);
            query.push_space();
            query.push_sql("from ");
            query.push_sql(&table);
            query.clause = Clause::None;
            Ok(())
        })
    }

    pub fn join(self, table: &str, lhs: impl Into<QueryValue>, rhs: impl Into<QueryValue>) -> Query {
        self.join_with("join", table, lhs.into(), rhs.into())
    }

    pub fn left_join(
        self,
        table: &str,
        lhs: impl Into<QueryValue>,
        rhs: impl Into<QueryValue>,
    ) -> Query {
        self.join_with("left join", table, lhs.into(), rhs.into())
    }

    fn join_with(self, keyword: &str, table: &str, lhs: QueryValue, rhs: QueryValue) -> Query {
        self.then(|query| {
            let table = query.grammar.escape_table(table);
            query.push_space();
            query.push_sql(keyword);
            query.push_sql(" ");
            query.push_sql(&table);
            query.push_sql(" on ");
            query.push_value(&lhs)?;
            query.push_sql(" = ");
            query.push_value(&rhs)?;
            query.clause = Clause::None;
            Ok(())
        })
    }

    /// Adds a condition to the `where` clause, joined with `and` when the
    /// clause already has one.
    pub fn where_(self, condition: Condition) -> Query {
        self.then(|query| {
            query.separate(Clause::Where, "where ", " and ");
            condition.compile(query)
        })
    }

    pub fn and_where(self, condition: Condition) -> Query {
        self.where_(condition)
    }

    pub fn or_where(self, condition: Condition) -> Query {
        self.then(|query| {
            query.separate(Clause::Where, "where ", " or ");
            condition.compile(query)
        })
    }

    /// Shorthand for `where_(Condition::is(lhs, fragment))`.
    pub fn where_struct(self, lhs: impl Into<QueryValue>, fragment: crate::QueryStruct) -> Query {
        self.where_(Condition::is(lhs, fragment))
    }

    pub fn group_by<V: Into<QueryValue>>(self, fields: impl IntoIterator<Item = V>) -> Query {
        let fields: Vec<QueryValue> = fields.into_iter().map(Into::into).collect();

        self.then(|query| {
            if fields.is_empty() {
                return Err(Error::query("group by requires at least one field"));
            }
            query.separate(Clause::GroupBy, "group by ", ", ");
            query.push_list(&fields)
        })
    }

    pub fn order_by(self, field: impl Into<QueryValue>, order: Order) -> Query {
        let field = field.into();

        self.then(|query| {
            query.separate(Clause::OrderBy, "order by ", ", ");
            query.push_value(&field)?;
            query.push_sql(" ");
            query.push_sql(order.as_str());
            Ok(())
        })
    }

    pub fn limit(self, limit: u64) -> Query {
        self.then(|query| {
            query.push_space();
            let _ = write!(query.sql, "limit {limit}");
            query.clause = Clause::None;
            Ok(())
        })
    }

    pub fn offset(self, offset: u64) -> Query {
        self.then(|query| {
            query.push_space();
            let _ = write!(query.sql, "offset {offset}");
            query.clause = Clause::None;
            Ok(())
        })
    }

    /// `insert into {table} ({columns})`
    pub fn insert_into(self, table: &str, columns: &[&str]) -> Query {
        self.then(|query| {
            if columns.is_empty() {
                return Err(Error::query("insert requires at least one column"));
            }

            let table = query.grammar.escape_table(table);
            let columns = columns
                .iter()
                .map(|column| query.grammar.escape_field(column))
                .collect::<Vec<_>>()
                .join(query.grammar.field_separator);

            query.push_space();
            query.push_sql("insert into ");
            query.push_sql(&table);
            query.push_sql(" (");
            query.push_sql(&columns);
            query.push_sql(")");
            query.clause = Clause::None;
            Ok(())
        })
    }

    /// Appends one row of bound values to an insert.
    pub fn values<V: Into<QueryValue>>(self, row: impl IntoIterator<Item = V>) -> Query {
        let row: Vec<QueryValue> = row.into_iter().map(Into::into).collect();

        self.then(|query| {
            query.separate(Clause::Values, "values ", ", ");
            query.push_sql("(");
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    query.push_sql(query.grammar.field_separator);
                }
                query.push_param(value)?;
            }
            query.push_sql(")");
            Ok(())
        })
    }

    /// `on duplicate key update c = values(c), ...`. Only MySQL and MariaDB
    /// understand it.
    pub fn on_duplicate_key_update(self, columns: &[&str]) -> Query {
        self.then(|query| {
            let backend = query.connection.backend();
            if !backend.supports_upsert_on_duplicate_key() {
                return Err(Error::query(format!(
                    "`on duplicate key update` is not supported by {backend:?}"
                )));
            }

            let assignments = columns
                .iter()
                .map(|column| {
                    let column = query.grammar.escape_field(column);
                    format!("{column} = values({column})")
                })
                .collect::<Vec<_>>()
                .join(query.grammar.field_separator);

            query.push_space();
            query.push_sql("on duplicate key update ");
            query.push_sql(&assignments);
            query.clause = Clause::None;
            Ok(())
        })
    }

    pub fn update(self, table: &str) -> Query {
        self.then(|query| {
            let table = query.grammar.escape_table(table);
            query.push_space();
            query.push_sql("update ");
            query.push_sql(&table);
            query.clause = Clause::None;
            Ok(())
        })
    }

    /// Adds `{column} = ?` to the `set` clause of an update.
    pub fn set(self, column: &str, value: impl Into<QueryValue>) -> Query {
        let value = value.into();

        self.then(|query| {
            let column = query.grammar.escape_field(column);
            query.separate(Clause::Set, "set ", ", ");
            query.push_sql(&column);
            query.push_sql(" = ");
            query.push_param(&value)
        })
    }

    pub fn delete_from(self, table: &str) -> Query {
        self.then(|query| {
            let table = query.grammar.escape_table(table);
            query.push_space();
            query.push_sql("delete from ");
            query.push_sql(&table);
            query.clause = Clause::None;
            Ok(())
        })
    }

    /// Appends another query in parentheses, merging its parameters.
    pub fn merge(self, nested: &Query) -> Query {
        self.then(|query| {
            query.push_space();
            query.splice(nested)
        })
    }

    /// Appends a fragment.
    pub fn fragment(self, fragment: &crate::QueryStruct) -> Query {
        self.then(|query| {
            query.push_space();
            fragment.compile(query)
        })
    }

    // ===== Finalization =====

    /// Renders the placeholders and returns the statement, or the first
    /// error raised while building.
    pub fn build(&self) -> Result<Statement> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let sql = match self.grammar.placeholder {
            Placeholder::Question => self.sql.clone(),
            Placeholder::Numbered => {
                let mut sql = String::with_capacity(self.sql.len() + self.markers.len() * 2);
                let mut last = 0;
                for (i, marker) in self.markers.iter().enumerate() {
                    sql.push_str(&self.sql[last..*marker]);
                    let _ = write!(sql, "${}", i + 1);
                    last = marker + 1;
                }
                sql.push_str(&self.sql[last..]);
                sql
            }
        };

        Ok(Statement::new(sql, self.params.clone()))
    }

    /// The rendered SQL text.
    pub fn to_sql(&self) -> Result<String> {
        Ok(self.build()?.sql)
    }

    pub fn fetch_all(&self) -> Result<Vec<Row>> {
        let stmt = self.build()?;
        tracing::trace!(sql = %stmt.sql, params = stmt.params.len(), "strata.query");
        self.connection.query(&stmt)
    }

    pub fn fetch_one(&self) -> Result<Option<Row>> {
        Ok(self.fetch_all()?.into_iter().next())
    }

    /// Executes the statement, returning the number of affected rows.
    pub fn execute(&self) -> Result<u64> {
        let stmt = self.build()?;
        tracing::trace!(sql = %stmt.sql, params = stmt.params.len(), "strata.execute");
        self.connection.execute(&stmt)
    }
}
