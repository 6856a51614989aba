pub mod db;
pub use db::Db;

mod instance;
pub use instance::Instance;

mod model;
pub use model::Model;

mod model_list;
pub use model_list::ModelList;

mod query;
pub use query::ModelQuery;

pub mod relation;
pub use relation::{Related, Relation, RelationHandler};

pub mod schema;
pub use schema::Structure;

pub use strata_core::{
    bail, caster, driver, err, stmt::Value, Error, InstanceErrorKind, Result, StructureErrorKind,
};

pub use strata_sql as sql;
