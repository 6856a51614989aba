use super::Compile;
use crate::{Query, QueryValue};

use strata_core::{Error, Result};

/// `{name}({args})`
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<QueryValue>,
}

impl FunctionCall {
    pub fn new<V: Into<QueryValue>>(name: &str, args: impl IntoIterator<Item = V>) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Compile for FunctionCall {
    fn compile(&self, query: &mut Query) -> Result<()> {
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::query(format!("invalid function name `{}`", self.name)));
        }

        query.push_sql(&self.name);
        query.push_sql("(");
        query.push_list(&self.args)?;
        query.push_sql(")");
        Ok(())
    }
}
