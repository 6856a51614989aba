use super::{check_column, eager, implicit_key, single_key, target_of, Related, Relation};
use crate::{schema::RelationDefinition, Db, Instance, ModelQuery, Structure};

use std::{collections::HashMap, sync::Arc};
use strata_core::{stmt::Value, Result};
use strata_sql::Condition;

/// The owner holds the key of one target record.
///
/// The local key defaults to `{target_table}_{target_pk}` and the foreign
/// key to the target's primary key.
#[derive(Debug)]
pub struct BelongsTo {
    name: String,
    definition: RelationDefinition,
    target: Arc<Structure>,
    local_key: String,
    foreign_key: String,
}

impl BelongsTo {
    pub(crate) fn new(
        owner: &Structure,
        name: &str,
        definition: &RelationDefinition,
    ) -> Result<BelongsTo> {
        let target = target_of(name, definition)?;
        let target_key = single_key(&target, name)?;

        let foreign_key = definition
            .foreign_key
            .clone()
            .unwrap_or_else(|| target_key.to_string());
        let local_key = definition
            .local_key
            .clone()
            .unwrap_or_else(|| implicit_key(target.table_name(), target_key, owner));

        check_column(owner, &local_key, name)?;
        check_column(&target, &foreign_key, name)?;

        Ok(BelongsTo {
            name: name.to_string(),
            definition: definition.clone(),
            target,
            local_key,
            foreign_key,
        })
    }

    fn scoped(&self, db: &Db, value: Value) -> Result<ModelQuery<Instance>> {
        let column = self.target.column_literal(self.target.grammar(db)?, &self.foreign_key, None);
        Ok(self.raw_query(db)?.where_(Condition::eq(column, value)))
    }
}

impl Relation for BelongsTo {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> &RelationDefinition {
        &self.definition
    }

    fn keys(&self) -> (&str, &str) {
        (&self.local_key, &self.foreign_key)
    }

    fn fetch(&self, db: &Db, owner: &Instance) -> Result<Related> {
        let value = owner.column_value(&self.local_key)?;
        if value.is_null() {
            return Ok(Related::One(None));
        }

        let instance = self.scoped(db, value)?.fetch_instances()?.into_iter().next();
        Ok(Related::One(instance))
    }

    fn query(&self, db: &Db, owner: &Instance) -> Result<ModelQuery<Instance>> {
        self.scoped(db, owner.column_value(&self.local_key)?)
    }

    fn raw_query(&self, db: &Db) -> Result<ModelQuery<Instance>> {
        ModelQuery::instances(db, self.target.clone())
    }

    fn eager_load(&self, db: &Db, instances: &mut [&mut Instance]) -> Result<()> {
        let keys = eager::distinct_keys(instances.iter().map(|owner| &**owner), &self.local_key)?;

        let mut by_key = HashMap::new();
        if !keys.is_empty() {
            eager::trace_batch(&self.name, keys.len());

            let column = self.target.column_literal(self.target.grammar(db)?, &self.foreign_key, None);
            let targets = self
                .raw_query(db)?
                .where_(Condition::in_list(column, keys))
                .fetch_instances()?;

            for target in targets {
                let key = target.column_value(&self.foreign_key)?;
                by_key.entry(key).or_insert(target);
            }
        }

        for owner in instances.iter_mut() {
            let key = owner.column_value(&self.local_key)?;
            let related = by_key.get(&key).cloned();
            owner.set_related(&self.name, Related::One(related));
        }

        Ok(())
    }
}
