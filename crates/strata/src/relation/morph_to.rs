use super::{check_column, eager, single_key, Related, Relation};
use crate::{schema::RelationDefinition, Db, Instance, ModelQuery, Structure};

use indexmap::IndexMap;
use std::{collections::HashMap, sync::Arc};
use strata_core::{stmt::Value, Error, Result, StructureErrorKind};
use strata_sql::Condition;

/// The owner names both the type and the key of its target.
///
/// The id column defaults to `{name}_id` and the type column to
/// `{name}_type`. Type values map to target models through the relation's
/// morph map.
#[derive(Debug)]
pub struct MorphTo {
    name: String,
    definition: RelationDefinition,
    id_column: String,
    type_column: String,

    /// Type value to target structure and its key column
    targets: IndexMap<String, (Arc<Structure>, String)>,
}

impl MorphTo {
    pub(crate) fn new(
        owner: &Structure,
        name: &str,
        definition: &RelationDefinition,
    ) -> Result<MorphTo> {
        let id_column = definition
            .local_key
            .clone()
            .unwrap_or_else(|| format!("{name}_id"));
        let type_column = definition
            .foreign_key
            .clone()
            .unwrap_or_else(|| format!("{name}_type"));

        check_column(owner, &id_column, name)?;
        check_column(owner, &type_column, name)?;

        let mut targets = IndexMap::with_capacity(definition.morph_map.len());
        for (type_value, target) in &definition.morph_map {
            let structure = target.resolve()?;
            let key = single_key(&structure, name)?.to_string();
            targets.insert(type_value.clone(), (structure, key));
        }

        Ok(MorphTo {
            name: name.to_string(),
            definition: definition.clone(),
            id_column,
            type_column,
            targets,
        })
    }

    /// Type value of `owner`, `None` when it is null.
    fn type_of(&self, owner: &Instance) -> Result<Option<String>> {
        match owner.column_value(&self.type_column)? {
            Value::Null => Ok(None),
            value => value.into_string().map(Some),
        }
    }

    fn target(&self, type_value: &str) -> Result<&(Arc<Structure>, String)> {
        self.targets.get(type_value).ok_or_else(|| {
            Error::structure(
                StructureErrorKind::UnknownPolymorphicType,
                format!("relation `{}` has no target for `{type_value}`", self.name),
            )
        })
    }

    fn scoped(
        &self,
        db: &Db,
        (structure, key): &(Arc<Structure>, String),
        condition: impl FnOnce(strata_sql::ColumnLiteral) -> Condition,
    ) -> Result<ModelQuery<Instance>> {
        let column = structure.column_literal(structure.grammar(db)?, key, None);
        Ok(ModelQuery::instances(db, structure.clone())?.where_(condition(column)))
    }
}

impl Relation for MorphTo {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> &RelationDefinition {
        &self.definition
    }

    /// Both columns live on the owner: the id column and the type column.
    fn keys(&self) -> (&str, &str) {
        (&self.id_column, &self.type_column)
    }

    fn fetch(&self, db: &Db, owner: &Instance) -> Result<Related> {
        let id = owner.column_value(&self.id_column)?;
        let Some(type_value) = self.type_of(owner)? else {
            return Ok(Related::One(None));
        };
        if id.is_null() {
            return Ok(Related::One(None));
        }

        let target = self.target(&type_value)?;
        let instance = self
            .scoped(db, target, |column| Condition::eq(column, id))?
            .limit(1)
            .fetch_instances()?
            .into_iter()
            .next();
        Ok(Related::One(instance))
    }

    fn query(&self, db: &Db, owner: &Instance) -> Result<ModelQuery<Instance>> {
        let id = owner.column_value(&self.id_column)?;
        let Some(type_value) = self.type_of(owner)? else {
            return Err(Error::relation(format!(
                "relation `{}` has no type to query",
                self.name
            )));
        };

        self.scoped(db, self.target(&type_value)?, |column| Condition::eq(column, id))
    }

    fn raw_query(&self, _db: &Db) -> Result<ModelQuery<Instance>> {
        Err(Error::relation(format!(
            "relation `{}` targets several models and has no unscoped query",
            self.name
        )))
    }

    fn eager_load(&self, db: &Db, instances: &mut [&mut Instance]) -> Result<()> {
        // Owner indexes by type value
        let mut by_type: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (i, owner) in instances.iter().enumerate() {
            if let Some(type_value) = self.type_of(owner)? {
                by_type.entry(type_value).or_default().push(i);
            }
        }

        let mut loaded: HashMap<(String, Value), Instance> = HashMap::new();
        for (type_value, owners) in &by_type {
            let target = self.target(type_value)?;
            let keys = eager::distinct_keys(
                owners.iter().map(|&i| &*instances[i]),
                &self.id_column,
            )?;
            if keys.is_empty() {
                continue;
            }
            eager::trace_batch(&self.name, keys.len());

            let found = self
                .scoped(db, target, |column| Condition::in_list(column, keys))?
                .fetch_instances()?;
            for instance in found {
                let key = instance.column_value(&target.1)?;
                loaded.insert((type_value.clone(), key), instance);
            }
        }

        for owner in instances.iter_mut() {
            let related = match self.type_of(owner)? {
                Some(type_value) => {
                    let id = owner.column_value(&self.id_column)?;
                    loaded.get(&(type_value, id)).cloned()
                }
                None => None,
            };
            owner.set_related(&self.name, Related::One(related));
        }

        eager::trace_done(&self.name, instances.len());
        Ok(())
    }
}
