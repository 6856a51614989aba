use strata_core::driver::Backend;

/// How bound parameters are written into the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?` for every parameter
    Question,

    /// `$1`, `$2`, ... in order of appearance
    Numbered,
}

/// Identifier escaping and separator rules of one SQL dialect.
///
/// A grammar is a plain configuration value; one constant exists per
/// backend and [`Grammar::for_backend`] selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grammar {
    /// Opening identifier escaper, possibly empty.
    pub open: &'static str,

    /// Closing identifier escaper, possibly empty.
    pub close: &'static str,

    /// Separates items of a field list.
    pub field_separator: &'static str,

    /// Separates the parts of a qualified name.
    pub table_separator: &'static str,

    pub placeholder: Placeholder,
}

impl Grammar {
    /// No escaping at all. Used for unknown backends.
    pub const GENERIC: Grammar = Grammar::new("", "", Placeholder::Question);

    pub const MYSQL: Grammar = Grammar::new("`", "`", Placeholder::Question);

    pub const SQL_SERVER: Grammar = Grammar::new("[", "]", Placeholder::Question);

    pub const POSTGRESQL: Grammar = Grammar::new("\"", "\"", Placeholder::Numbered);

    pub const SQLITE: Grammar = Grammar::new("\"", "\"", Placeholder::Question);

    const fn new(open: &'static str, close: &'static str, placeholder: Placeholder) -> Grammar {
        Grammar {
            open,
            close,
            field_separator: ", ",
            table_separator: ".",
            placeholder,
        }
    }

    pub const fn for_backend(backend: Backend) -> Grammar {
        match backend {
            Backend::MySql | Backend::MariaDb => Grammar::MYSQL,
            Backend::SqlServer => Grammar::SQL_SERVER,
            Backend::Postgresql => Grammar::POSTGRESQL,
            Backend::Sqlite => Grammar::SQLITE,
            Backend::Generic => Grammar::GENERIC,
        }
    }

    /// Escapes a single identifier.
    ///
    /// `*` and identifiers that already contain the opening escaper are
    /// returned unchanged, so escaping is idempotent.
    pub fn escape_field(&self, name: &str) -> String {
        if name == "*" || name.contains(self.open) {
            return name.to_string();
        }

        format!("{}{}{}", self.open, name, self.close)
    }

    /// Escapes every segment of a qualified name such as `users.id`.
    ///
    /// Input that looks like an expression (contains `(`, a space or `:=`)
    /// is returned unchanged. This is a heuristic, not a parser: a quoted
    /// identifier containing a space is left unescaped as well.
    pub fn escape_fields(&self, name: &str) -> String {
        if name.contains('(') || name.contains(' ') || name.contains(":=") {
            return name.to_string();
        }

        name.split(self.table_separator)
            .map(|segment| self.escape_field(segment))
            .collect::<Vec<_>>()
            .join(self.table_separator)
    }

    /// Escapes a table reference, leaving an alias after the first space
    /// untouched: `users u` becomes `` `users` u ``.
    pub fn escape_table(&self, table: &str) -> String {
        match table.split_once(' ') {
            Some((name, alias)) => format!("{} {}", self.escape_fields(name), alias),
            None => self.escape_fields(table),
        }
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Grammar::GENERIC
    }
}
