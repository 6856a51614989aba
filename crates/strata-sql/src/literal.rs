use std::fmt;

/// Raw SQL text that is embedded into a query without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal(String);

impl Literal {
    pub fn new(sql: impl Into<String>) -> Literal {
        Literal(sql.into())
    }

    pub fn null() -> Literal {
        Literal::new("null")
    }

    pub fn now() -> Literal {
        Literal::new("now()")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
