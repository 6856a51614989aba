use super::Compile;
use crate::Query;

use strata_core::Result;

/// `exists ({query})`
#[derive(Debug, Clone)]
pub struct Exists {
    pub query: Box<Query>,
}

impl Exists {
    pub fn new(query: Query) -> Exists {
        Exists {
            query: Box::new(query),
        }
    }
}

impl Compile for Exists {
    fn compile(&self, query: &mut Query) -> Result<()> {
        query.push_sql("exists ");
        query.splice(&self.query)
    }
}
