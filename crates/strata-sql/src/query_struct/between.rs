use super::Compile;
use crate::{Query, QueryValue};

use strata_core::Result;

/// `between {low} and {high}`
#[derive(Debug, Clone)]
pub struct Between {
    pub low: QueryValue,
    pub high: QueryValue,
}

impl Between {
    pub fn new(low: impl Into<QueryValue>, high: impl Into<QueryValue>) -> Between {
        Between {
            low: low.into(),
            high: high.into(),
        }
    }
}

impl Compile for Between {
    fn compile(&self, query: &mut Query) -> Result<()> {
        query.push_sql("between ");
        query.push_value(&self.low)?;
        query.push_sql(" and ");
        query.push_value(&self.high)
    }
}
