use super::Compile;
use crate::Query;

use strata_core::Result;

/// A parenthesized nested query with an optional alias.
#[derive(Debug, Clone)]
pub struct SubQuery {
    pub query: Box<Query>,
    pub alias: Option<String>,
}

impl SubQuery {
    pub fn new(query: Query) -> SubQuery {
        SubQuery {
            query: Box::new(query),
            alias: None,
        }
    }

    pub fn alias(mut self, alias: &str) -> SubQuery {
        self.alias = Some(alias.to_string());
        self
    }
}

impl Compile for SubQuery {
    fn compile(&self, query: &mut Query) -> Result<()> {
        query.splice(&self.query)?;
        if let Some(alias) = &self.alias {
            let alias = query.grammar().escape_field(alias);
            query.push_sql(" as ");
            query.push_sql(&alias);
        }
        Ok(())
    }
}
