use crate::{Query, QueryValue};

use strata_core::{Error, Result};

/// The value list of `in(...)` and `not in(...)`.
///
/// An empty list is rejected when compiled since `in()` is not valid SQL.
#[derive(Debug, Clone)]
pub struct InList {
    pub values: Vec<QueryValue>,
}

impl InList {
    pub fn new<V: Into<QueryValue>>(values: impl IntoIterator<Item = V>) -> InList {
        InList {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub(super) fn compile_with(&self, query: &mut Query, keyword: &str) -> Result<()> {
        if self.values.is_empty() {
            return Err(Error::query(format!("empty `{keyword}` list")));
        }

        query.push_sql(keyword);

        // A lone sub-query supplies its own parentheses.
        if let [QueryValue::Query(nested)] = self.values.as_slice() {
            return query.splice(nested);
        }

        query.push_sql("(");
        query.push_list(&self.values)?;
        query.push_sql(")");
        Ok(())
    }
}
