use super::Compile;
use crate::{ColumnLiteral, Query, QueryValue};

use strata_core::{Error, Result};

/// MySQL full-text search: `match({fields}) against ({expression})`.
#[derive(Debug, Clone)]
pub struct MatchAgainst {
    pub fields: Vec<ColumnLiteral>,
    pub expression: QueryValue,
    pub boolean_mode: bool,
    pub query_expansion: bool,
}

impl MatchAgainst {
    pub fn new(
        fields: impl IntoIterator<Item = ColumnLiteral>,
        expression: impl Into<QueryValue>,
    ) -> MatchAgainst {
        MatchAgainst {
            fields: fields.into_iter().collect(),
            expression: expression.into(),
            boolean_mode: false,
            query_expansion: false,
        }
    }

    pub fn boolean_mode(mut self) -> MatchAgainst {
        self.boolean_mode = true;
        self
    }

    pub fn query_expansion(mut self) -> MatchAgainst {
        self.query_expansion = true;
        self
    }
}

impl Compile for MatchAgainst {
    fn compile(&self, query: &mut Query) -> Result<()> {
        if self.fields.is_empty() {
            return Err(Error::query("match requires at least one field"));
        }

        let separator = query.grammar().field_separator;
        let fields = self
            .fields
            .iter()
            .map(ColumnLiteral::literal)
            .collect::<Vec<_>>()
            .join(separator);

        query.push_sql("match(");
        query.push_sql(&fields);
        query.push_sql(") against (");
        query.push_value(&self.expression)?;
        if self.boolean_mode {
            query.push_sql(" in boolean mode");
        }
        if self.query_expansion {
            query.push_sql(" with query expansion");
        }
        query.push_sql(")");
        Ok(())
    }
}
