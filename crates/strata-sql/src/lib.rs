pub mod column_literal;
pub use column_literal::{ColumnLiteral, TableName};

pub mod condition;
pub use condition::Condition;

pub mod grammar;
pub use grammar::{Grammar, Placeholder};

mod literal;
pub use literal::Literal;

pub mod query;
pub use query::{Order, Query};

pub mod query_struct;
pub use query_struct::QueryStruct;

mod value;
pub use value::QueryValue;
