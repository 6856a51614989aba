mod between;
pub use between::Between;

mod exists;
pub use exists::Exists;

mod function;
pub use function::FunctionCall;

mod in_list;
pub use in_list::InList;

mod match_against;
pub use match_against::MatchAgainst;

mod sub_query;
pub use sub_query::SubQuery;

use crate::{ColumnLiteral, Query, QueryValue};

use strata_core::Result;

/// A reusable SQL fragment.
///
/// Fragments compile themselves into a [`Query`]. Values inside a fragment
/// are rendered inline: numbers are stringified and everything else is
/// quoted by the query's connection.
#[derive(Debug, Clone)]
pub enum QueryStruct {
    /// A single value rendered in place
    Literal(QueryValue),

    In(InList),

    NotIn(InList),

    Between(Between),

    Coalesce(FunctionCall),

    Greatest(FunctionCall),

    Least(FunctionCall),

    /// Any other SQL function call
    Function(FunctionCall),

    Exists(Exists),

    SubQuery(SubQuery),

    MatchAgainst(MatchAgainst),
}

/// Compiles a fragment into a query accumulator.
pub trait Compile {
    fn compile(&self, query: &mut Query) -> Result<()>;
}

impl QueryStruct {
    pub fn literal(value: impl Into<QueryValue>) -> QueryStruct {
        QueryStruct::Literal(value.into())
    }

    pub fn in_list<V: Into<QueryValue>>(values: impl IntoIterator<Item = V>) -> QueryStruct {
        QueryStruct::In(InList::new(values))
    }

    pub fn not_in<V: Into<QueryValue>>(values: impl IntoIterator<Item = V>) -> QueryStruct {
        QueryStruct::NotIn(InList::new(values))
    }

    pub fn between(low: impl Into<QueryValue>, high: impl Into<QueryValue>) -> QueryStruct {
        QueryStruct::Between(Between::new(low, high))
    }

    pub fn coalesce<V: Into<QueryValue>>(values: impl IntoIterator<Item = V>) -> QueryStruct {
        QueryStruct::Coalesce(FunctionCall::new("coalesce", values))
    }

    pub fn greatest<V: Into<QueryValue>>(values: impl IntoIterator<Item = V>) -> QueryStruct {
        QueryStruct::Greatest(FunctionCall::new("greatest", values))
    }

    pub fn least<V: Into<QueryValue>>(values: impl IntoIterator<Item = V>) -> QueryStruct {
        QueryStruct::Least(FunctionCall::new("least", values))
    }

    pub fn function<V: Into<QueryValue>>(
        name: &str,
        args: impl IntoIterator<Item = V>,
    ) -> QueryStruct {
        QueryStruct::Function(FunctionCall::new(name, args))
    }

    pub fn exists(query: Query) -> QueryStruct {
        QueryStruct::Exists(Exists::new(query))
    }

    pub fn sub_query(query: Query) -> QueryStruct {
        QueryStruct::SubQuery(SubQuery::new(query))
    }

    pub fn match_against(
        fields: impl IntoIterator<Item = ColumnLiteral>,
        expression: impl Into<QueryValue>,
    ) -> QueryStruct {
        QueryStruct::MatchAgainst(MatchAgainst::new(fields, expression))
    }

    pub fn compile(&self, query: &mut Query) -> Result<()> {
        match self {
            QueryStruct::Literal(value) => query.push_value(value),
            QueryStruct::In(list) => list.compile_with(query, "in"),
            QueryStruct::NotIn(list) => list.compile_with(query, "not in"),
            QueryStruct::Between(between) => between.compile(query),
            QueryStruct::Coalesce(call)
            | QueryStruct::Greatest(call)
            | QueryStruct::Least(call)
            | QueryStruct::Function(call) => call.compile(query),
            QueryStruct::Exists(exists) => exists.compile(query),
            QueryStruct::SubQuery(sub_query) => sub_query.compile(query),
            QueryStruct::MatchAgainst(match_against) => match_against.compile(query),
        }
    }
}

impl Compile for QueryStruct {
    fn compile(&self, query: &mut Query) -> Result<()> {
        QueryStruct::compile(self, query)
    }
}
