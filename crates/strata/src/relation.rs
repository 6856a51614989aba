mod belongs_to;
pub use belongs_to::BelongsTo;

mod belongs_to_many;
pub use belongs_to_many::BelongsToMany;

mod custom;
pub use custom::{Custom, RelationHandler};

pub(crate) mod eager;

mod has_many;
pub use has_many::HasMany;

mod has_one;
pub use has_one::HasOne;

mod morph_to;
pub use morph_to::MorphTo;

use crate::{
    schema::{RelationDefinition, RelationKind},
    Db, Instance, ModelList, ModelQuery, Structure,
};

use std::{fmt, sync::Arc};
use strata_core::{Error, Result};
use strata_sql::{ColumnLiteral, Grammar, TableName};

/// The loaded value of a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Instance>),
    Many(ModelList<Instance>),
}

impl Related {
    pub fn as_one(&self) -> Option<&Instance> {
        match self {
            Related::One(instance) => instance.as_ref(),
            Related::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&ModelList<Instance>> {
        match self {
            Related::Many(list) => Some(list),
            Related::One(_) => None,
        }
    }

    /// Number of related records.
    pub fn len(&self) -> usize {
        match self {
            Related::One(instance) => usize::from(instance.is_some()),
            Related::Many(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A relation of one model, bound to its declaring structure.
///
/// Relations are built once per structure by [`Structure::get_relation`].
pub trait Relation: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> &RelationDefinition;

    /// Key column on the owner and key column on the target.
    fn keys(&self) -> (&str, &str);

    /// Queries the related records of `owner`.
    fn fetch(&self, db: &Db, owner: &Instance) -> Result<Related>;

    /// The related records of `owner` as a query that is not yet executed.
    fn query(&self, db: &Db, owner: &Instance) -> Result<ModelQuery<Instance>>;

    /// The unscoped query the relation starts from.
    fn raw_query(&self, db: &Db) -> Result<ModelQuery<Instance>>;

    /// Loads the relation for all `instances` with a bounded number of
    /// queries, independent of the number of instances.
    fn eager_load(&self, db: &Db, instances: &mut [&mut Instance]) -> Result<()>;
}

/// Builds the relation `name` declared on `owner`.
pub(crate) fn build(
    owner: &Structure,
    name: &str,
    definition: &RelationDefinition,
) -> Result<Arc<dyn Relation>> {
    let relation: Arc<dyn Relation> = match definition.kind {
        RelationKind::BelongsTo => Arc::new(BelongsTo::new(owner, name, definition)?),
        RelationKind::HasOne => Arc::new(HasOne::new(owner, name, definition)?),
        RelationKind::HasMany => Arc::new(HasMany::new(owner, name, definition)?),
        RelationKind::BelongsToMany => Arc::new(BelongsToMany::new(owner, name, definition)?),
        RelationKind::MorphTo => Arc::new(MorphTo::new(owner, name, definition)?),
        RelationKind::Custom => Arc::new(Custom::new(name, definition)?),
    };

    tracing::debug!(
        model = owner.model_name(),
        relation = name,
        kind = ?definition.kind,
        "strata.relation"
    );
    Ok(relation)
}

fn target_of(name: &str, definition: &RelationDefinition) -> Result<Arc<Structure>> {
    definition
        .target
        .as_ref()
        .ok_or_else(|| Error::relation(format!("relation `{name}` has no target")))?
        .resolve()
}

/// The primary key column of a structure related through a single key.
fn single_key<'a>(structure: &'a Structure, relation: &str) -> Result<&'a str> {
    match structure.primary_key() {
        [key] => Ok(key),
        _ => Err(Error::relation(format!(
            "relation `{relation}` needs a single column primary key on {}",
            structure.model_name()
        ))),
    }
}

fn check_column(structure: &Structure, key: &str, relation: &str) -> Result<()> {
    if structure.has_column(key) {
        Ok(())
    } else {
        Err(Error::relation(format!(
            "relation `{relation}`: {} has no column `{key}`",
            structure.model_name()
        )))
    }
}

/// Implicit foreign key naming: `{table}_{column}` of `key` on `table`,
/// located on `other`.
fn implicit_key<T: TableName + ?Sized>(table: &str, key: &str, other: &T) -> String {
    ColumnLiteral::of(Grammar::GENERIC, key, Some(table), None)
        .as_foreign_key_for(other)
        .column()
        .to_string()
}
