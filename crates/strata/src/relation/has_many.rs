use super::{check_column, eager, implicit_key, single_key, target_of, Related, Relation};
use crate::{schema::RelationDefinition, Db, Instance, ModelList, ModelQuery, Structure};

use indexmap::IndexMap;
use std::sync::Arc;
use strata_core::{stmt::Value, Result};
use strata_sql::Condition;

/// The targets hold the key of their owner.
///
/// The local key defaults to the owner's primary key and the foreign key to
/// `{owner_table}_{owner_pk}` on the target.
#[derive(Debug)]
pub struct HasMany {
    name: String,
    definition: RelationDefinition,
    target: Arc<Structure>,
    local_key: String,
    foreign_key: String,
}

impl HasMany {
    pub(crate) fn new(
        owner: &Structure,
        name: &str,
        definition: &RelationDefinition,
    ) -> Result<HasMany> {
        let target = target_of(name, definition)?;
        let owner_key = single_key(owner, name)?;

        let local_key = definition
            .local_key
            .clone()
            .unwrap_or_else(|| owner_key.to_string());
        let foreign_key = definition
            .foreign_key
            .clone()
            .unwrap_or_else(|| implicit_key(owner.table_name(), &local_key, &*target));

        check_column(owner, &local_key, name)?;
        check_column(&target, &foreign_key, name)?;

        Ok(HasMany {
            name: name.to_string(),
            definition: definition.clone(),
            target,
            local_key,
            foreign_key,
        })
    }

    pub(super) fn local_key(&self) -> &str {
        &self.local_key
    }

    /// The targets of `owner`, or `None` when the owner has no key.
    pub(super) fn scoped(&self, db: &Db, owner: &Instance) -> Result<Option<ModelQuery<Instance>>> {
        let value = owner.column_value(&self.local_key)?;
        if value.is_null() {
            return Ok(None);
        }
        self.where_key(db, value).map(Some)
    }

    fn where_key(&self, db: &Db, value: Value) -> Result<ModelQuery<Instance>> {
        let column = self.target.column_literal(self.target.grammar(db)?, &self.foreign_key, None);
        Ok(self.raw_query(db)?.where_(Condition::eq(column, value)))
    }

    /// Targets of all `instances` grouped by foreign key value, in one
    /// query.
    pub(super) fn load_groups(
        &self,
        db: &Db,
        instances: &[&mut Instance],
    ) -> Result<IndexMap<Value, Vec<Instance>>> {
        let keys = eager::distinct_keys(instances.iter().map(|owner| &**owner), &self.local_key)?;

        let mut groups: IndexMap<Value, Vec<Instance>> = IndexMap::new();
        if keys.is_empty() {
            return Ok(groups);
        }
        eager::trace_batch(&self.name, keys.len());

        let column = self.target.column_literal(self.target.grammar(db)?, &self.foreign_key, None);
        let targets = self
            .raw_query(db)?
            .where_(Condition::in_list(column, keys))
            .fetch_instances()?;

        for target in targets {
            let key = target.column_value(&self.foreign_key)?;
            groups.entry(key).or_default().push(target);
        }

        Ok(groups)
    }
}

impl Relation for HasMany {
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
        let list = match self.scoped(db, owner)? {
            Some(query) => query.fetch_instances()?.into_iter().collect(),
            None => ModelList::new(),
        };
        Ok(Related::Many(list))
    }

    fn query(&self, db: &Db, owner: &Instance) -> Result<ModelQuery<Instance>> {
        self.where_key(db, owner.column_value(&self.local_key)?)
    }

    fn raw_query(&self, db: &Db) -> Result<ModelQuery<Instance>> {
        ModelQuery::instances(db, self.target.clone())
    }

    fn eager_load(&self, db: &Db, instances: &mut [&mut Instance]) -> Result<()> {
        let groups = self.load_groups(db, instances)?;

        for owner in instances.iter_mut() {
            let key = owner.column_value(&self.local_key)?;
            let list = groups.get(&key).cloned().unwrap_or_default();
            owner.set_related(&self.name, Related::Many(list.into()));
        }

        eager::trace_done(&self.name, instances.len());
        Ok(())
    }
}
