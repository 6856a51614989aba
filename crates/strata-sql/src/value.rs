use crate::{ColumnLiteral, Literal, Query, QueryStruct};

use strata_core::stmt::Value;

/// Anything that can appear where a query expects a value.
#[derive(Debug, Clone)]
pub enum QueryValue {
    /// Raw SQL, emitted as-is
    Literal(Literal),

    /// Escaped column reference, emitted as-is
    Column(ColumnLiteral),

    /// Plain value: stringified, quoted or bound depending on the context
    Value(Value),

    /// Nested fragment, compiled in place
    Struct(Box<QueryStruct>),

    /// Nested query, spliced in as a sub-query
    Query(Box<Query>),
}

impl From<Literal> for QueryValue {
    fn from(value: Literal) -> Self {
        QueryValue::Literal(value)
    }
}

impl From<ColumnLiteral> for QueryValue {
    fn from(value: ColumnLiteral) -> Self {
        QueryValue::Column(value)
    }
}

impl From<&ColumnLiteral> for QueryValue {
    fn from(value: &ColumnLiteral) -> Self {
        QueryValue::Column(value.clone())
    }
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        QueryValue::Value(value)
    }
}

impl From<QueryStruct> for QueryValue {
    fn from(value: QueryStruct) -> Self {
        QueryValue::Struct(Box::new(value))
    }
}

impl From<Query> for QueryValue {
    fn from(value: Query) -> Self {
        QueryValue::Query(Box::new(value))
    }
}

macro_rules! impl_from_scalar {
    ( $( $ty:ty ),* ) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    QueryValue::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_from_scalar!(bool, i32, i64, u32, f64, &str, String);
