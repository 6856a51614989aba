use crate::{Query, QueryStruct, QueryValue};

use strata_core::{Error, Result};

/// Comparison operators accepted by [`Condition::cmp`].
const OPERATORS: &[&str] = &[
    "=", "<>", "!=", "<", "<=", ">", ">=", "like", "not like",
];

/// A boolean expression used by `where` clauses.
///
/// Both sides of a comparison are bound as parameters when they are plain
/// values; columns and literals are emitted as-is.
#[derive(Debug, Clone)]
pub enum Condition {
    Compare {
        lhs: QueryValue,
        op: String,
        rhs: QueryValue,
    },

    /// `lhs` followed by a fragment, as in `id in(1, 2)`
    Is { lhs: QueryValue, fragment: QueryStruct },

    Null { lhs: QueryValue, negated: bool },

    /// A fragment standing on its own, such as `exists (...)`
    Fragment(QueryStruct),

    /// Parenthesized conjunction
    All(Vec<Condition>),

    /// Parenthesized disjunction
    Any(Vec<Condition>),
}

impl Condition {
    pub fn cmp(lhs: impl Into<QueryValue>, op: &str, rhs: impl Into<QueryValue>) -> Condition {
        Condition::Compare {
            lhs: lhs.into(),
            op: op.to_string(),
            rhs: rhs.into(),
        }
    }

    pub fn eq(lhs: impl Into<QueryValue>, rhs: impl Into<QueryValue>) -> Condition {
        Condition::cmp(lhs, "=", rhs)
    }

    pub fn ne(lhs: impl Into<QueryValue>, rhs: impl Into<QueryValue>) -> Condition {
        Condition::cmp(lhs, "<>", rhs)
    }

    pub fn lt(lhs: impl Into<QueryValue>, rhs: impl Into<QueryValue>) -> Condition {
        Condition::cmp(lhs, "<", rhs)
    }

    pub fn le(lhs: impl Into<QueryValue>, rhs: impl Into<QueryValue>) -> Condition {
        Condition::cmp(lhs, "<=", rhs)
    }

    pub fn gt(lhs: impl Into<QueryValue>, rhs: impl Into<QueryValue>) -> Condition {
        Condition::cmp(lhs, ">", rhs)
    }

    pub fn ge(lhs: impl Into<QueryValue>, rhs: impl Into<QueryValue>) -> Condition {
        Condition::cmp(lhs, ">=", rhs)
    }

    pub fn is(lhs: impl Into<QueryValue>, fragment: QueryStruct) -> Condition {
        Condition::Is {
            lhs: lhs.into(),
            fragment,
        }
    }

    pub fn in_list<V: Into<QueryValue>>(
        lhs: impl Into<QueryValue>,
        values: impl IntoIterator<Item = V>,
    ) -> Condition {
        Condition::is(lhs, QueryStruct::in_list(values))
    }

    pub fn null(lhs: impl Into<QueryValue>) -> Condition {
        Condition::Null {
            lhs: lhs.into(),
            negated: false,
        }
    }

    pub fn not_null(lhs: impl Into<QueryValue>) -> Condition {
        Condition::Null {
            lhs: lhs.into(),
            negated: true,
        }
    }

    pub fn fragment(fragment: QueryStruct) -> Condition {
        Condition::Fragment(fragment)
    }

    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Condition::All(conditions.into_iter().collect())
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Condition::Any(conditions.into_iter().collect())
    }

    pub(crate) fn compile(&self, query: &mut Query) -> Result<()> {
        match self {
            Condition::Compare { lhs, op, rhs } => {
                if !OPERATORS.contains(&op.as_str()) {
                    return Err(Error::query(format!(
                        "unsupported comparison operator `{op}`"
                    )));
                }

                query.push_param(lhs)?;
                query.push_sql(" ");
                query.push_sql(op);
                query.push_sql(" ");
                query.push_param(rhs)
            }
            Condition::Is { lhs, fragment } => {
                query.push_param(lhs)?;
                query.push_sql(" ");
                fragment.compile(query)
            }
            Condition::Null { lhs, negated } => {
                query.push_param(lhs)?;
                query.push_sql(if *negated { " is not null" } else { " is null" });
                Ok(())
            }
            Condition::Fragment(fragment) => fragment.compile(query),
            Condition::All(conditions) => compile_group(query, conditions, " and "),
            Condition::Any(conditions) => compile_group(query, conditions, " or "),
        }
    }
}

fn compile_group(query: &mut Query, conditions: &[Condition], connector: &str) -> Result<()> {
    if conditions.is_empty() {
        return Err(Error::query("empty condition group"));
    }

    query.push_sql("(");
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            query.push_sql(connector);
        }
        condition.compile(query)?;
    }
    query.push_sql(")");

    Ok(())
}
