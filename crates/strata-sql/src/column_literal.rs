use crate::Grammar;

use std::{
    fmt,
    hash::{Hash, Hasher},
};

/// Anything that names a table, such as a model structure.
pub trait TableName {
    fn table_name(&self) -> &str;
}

impl TableName for str {
    fn table_name(&self) -> &str {
        self
    }
}

impl TableName for String {
    fn table_name(&self) -> &str {
        self
    }
}

/// A pre-escaped, qualified column reference.
///
/// The literal is computed once at construction: every present part
/// (`schema`, `table`, `column`) is escaped with the grammar and the parts are
/// joined with the table separator. `*` is never escaped. Two literals are
/// equal when their rendered text is equal.
#[derive(Debug, Clone)]
pub struct ColumnLiteral {
    grammar: Grammar,
    column: String,
    table: Option<String>,
    schema: Option<String>,
    literal: String,
}

impl ColumnLiteral {
    /// An unqualified column.
    pub fn new(grammar: Grammar, column: impl Into<String>) -> ColumnLiteral {
        ColumnLiteral::of(grammar, column, None, None)
    }

    pub fn of(
        grammar: Grammar,
        column: impl Into<String>,
        table: Option<&str>,
        schema: Option<&str>,
    ) -> ColumnLiteral {
        let column = column.into();
        let table = table.map(str::to_string);
        let schema = schema.map(str::to_string);

        let mut parts = Vec::with_capacity(3);
        if let Some(schema) = &schema {
            parts.push(grammar.escape_field(schema));
        }
        if let Some(table) = &table {
            parts.push(grammar.escape_field(table));
        }
        parts.push(grammar.escape_field(&column));

        let literal = parts.join(grammar.table_separator);

        ColumnLiteral {
            grammar,
            column,
            table,
            schema,
            literal,
        }
    }

    /// The same column scoped to another table.
    pub fn with_table(&self, table: &str) -> ColumnLiteral {
        ColumnLiteral::of(self.grammar, &self.column, Some(table), self.schema.as_deref())
    }

    pub fn with_schema(&self, schema: &str) -> ColumnLiteral {
        ColumnLiteral::of(self.grammar, &self.column, self.table.as_deref(), Some(schema))
    }

    /// The implicit foreign key pointing at this column, located on the
    /// table of `owner`.
    pub fn as_foreign_key_for<T: TableName + ?Sized>(&self, owner: &T) -> ColumnLiteral {
        self.as_foreign_key_for_table(owner.table_name())
    }

    /// The implicit foreign key pointing at this column, located on `table`.
    ///
    /// The key is named `{table}_{column}` after this literal's own table, so
    /// `users.id` becomes `posts.users_id` for the table `posts`.
    pub fn as_foreign_key_for_table(&self, table: &str) -> ColumnLiteral {
        let column = match &self.table {
            Some(own) => format!("{own}_{}", self.column),
            None => self.column.clone(),
        };

        ColumnLiteral::of(self.grammar, column, Some(table), None)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// The escaped SQL text of the reference.
    pub fn literal(&self) -> &str {
        &self.literal
    }
}

impl PartialEq for ColumnLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.literal == other.literal
    }
}

impl Eq for ColumnLiteral {}

impl Hash for ColumnLiteral {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.literal.hash(state);
    }
}

impl fmt::Display for ColumnLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}
