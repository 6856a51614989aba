use super::{check_column, eager, implicit_key, single_key, target_of, Related, Relation};
use crate::{schema::RelationDefinition, Db, Instance, ModelList, ModelQuery, Structure};

use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use strata_core::{driver::Row, stmt::Value, Error, Result};
use strata_sql::{ColumnLiteral, Condition, Query};

/// Owners and targets linked through rows of a pivot table.
///
/// The pivot table defaults to `{owner_table}_{target_table}`, its columns
/// to `{owner_table}_{owner_pk}` and `{target_table}_{target_pk}`.
#[derive(Debug)]
pub struct BelongsToMany {
    name: String,
    definition: RelationDefinition,
    target: Arc<Structure>,
    local_key: String,
    foreign_key: String,
    pivot_table: String,
    pivot_local_key: String,
    pivot_foreign_key: String,
}

impl BelongsToMany {
    pub(crate) fn new(
        owner: &Structure,
        name: &str,
        definition: &RelationDefinition,
    ) -> Result<BelongsToMany> {
        let target = target_of(name, definition)?;

        let local_key = match &definition.local_key {
            Some(key) => key.clone(),
            None => single_key(owner, name)?.to_string(),
        };
        let foreign_key = match &definition.foreign_key {
            Some(key) => key.clone(),
            None => single_key(&target, name)?.to_string(),
        };
        check_column(owner, &local_key, name)?;
        check_column(&target, &foreign_key, name)?;

        let pivot = definition.pivot.as_ref();
        let pivot_table = pivot
            .and_then(|pivot| pivot.table.clone())
            .unwrap_or_else(|| format!("{}_{}", owner.table_name(), target.table_name()));
        let pivot_local_key = pivot
            .and_then(|pivot| pivot.local_key.clone())
            .unwrap_or_else(|| implicit_key(owner.table_name(), &local_key, &pivot_table));
        let pivot_foreign_key = pivot
            .and_then(|pivot| pivot.foreign_key.clone())
            .unwrap_or_else(|| implicit_key(target.table_name(), &foreign_key, &pivot_table));

        Ok(BelongsToMany {
            name: name.to_string(),
            definition: definition.clone(),
            target,
            local_key,
            foreign_key,
            pivot_table,
            pivot_local_key,
            pivot_foreign_key,
        })
    }

    pub fn pivot_table(&self) -> &str {
        &self.pivot_table
    }

    /// `select {pivot_local}, {pivot_foreign} from {pivot} where {pivot_local} in (...)`
    fn pivot_query(&self, db: &Db, owner_keys: Vec<Value>) -> Result<Query> {
        let connection = db.connection(self.target.connection_id())?;
        let query = Query::new(connection);
        let grammar = query.grammar();
        let column = |name: &str| ColumnLiteral::of(grammar, name, Some(&self.pivot_table), None);

        Ok(query
            .select([column(&self.pivot_local_key), column(&self.pivot_foreign_key)])
            .from(&self.pivot_table)
            .where_(Condition::in_list(column(&self.pivot_local_key), owner_keys)))
    }

    /// Pivot rows as `(owner key, target key)` pairs, in row order.
    fn links(&self, db: &Db, owner_keys: Vec<Value>) -> Result<Vec<(Value, Value)>> {
        let rows = self.pivot_query(db, owner_keys)?.fetch_all()?;

        let column = |row: &Row, key: &str| {
            row.get(key).cloned().ok_or_else(|| {
                Error::relation(format!(
                    "pivot table `{}` of `{}` returned no `{key}` column",
                    self.pivot_table, self.name
                ))
            })
        };

        rows.iter()
            .map(|row| {
                Ok((
                    column(row, &self.pivot_local_key)?,
                    column(row, &self.pivot_foreign_key)?,
                ))
            })
            .collect()
    }

    /// Distinct target keys linked to each owner key, in pivot row order.
    fn targets_by_owner(
        &self,
        db: &Db,
        owner_keys: Vec<Value>,
    ) -> Result<IndexMap<Value, IndexSet<Value>>> {
        let mut links: IndexMap<Value, IndexSet<Value>> = IndexMap::new();
        for (local, foreign) in self.links(db, owner_keys)? {
            links.entry(local).or_default().insert(foreign);
        }
        Ok(links)
    }

    /// Targets by key, in one query.
    fn targets(&self, db: &Db, keys: Vec<Value>) -> Result<IndexMap<Value, Instance>> {
        let mut by_key = IndexMap::new();
        if keys.is_empty() {
            return Ok(by_key);
        }

        let column = self.target.column_literal(self.target.grammar(db)?, &self.foreign_key, None);
        let targets = self
            .raw_query(db)?
            .where_(Condition::in_list(column, keys))
            .fetch_instances()?;

        for target in targets {
            by_key.insert(target.column_value(&self.foreign_key)?, target);
        }
        Ok(by_key)
    }
}

impl Relation for BelongsToMany {
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
        let key = owner.column_value(&self.local_key)?;
        if key.is_null() {
            return Ok(Related::Many(ModelList::new()));
        }

        let keys = self
            .targets_by_owner(db, vec![key])?
            .into_values()
            .next()
            .unwrap_or_default();
        let mut targets = self.targets(db, keys.iter().cloned().collect())?;

        let list = keys
            .iter()
            .filter_map(|key| targets.swap_remove(key))
            .collect();
        Ok(Related::Many(list))
    }

    fn query(&self, db: &Db, owner: &Instance) -> Result<ModelQuery<Instance>> {
        let key = owner.column_value(&self.local_key)?;

        let pivot = Query::new(db.connection(self.target.connection_id())?);
        let grammar = pivot.grammar();
        let column = |name: &str| ColumnLiteral::of(grammar, name, Some(&self.pivot_table), None);
        let pivot = pivot
            .select([column(&self.pivot_foreign_key)])
            .from(&self.pivot_table)
            .where_(Condition::eq(column(&self.pivot_local_key), key));

        let target_column = self.target.column_literal(self.target.grammar(db)?, &self.foreign_key, None);
        Ok(self
            .raw_query(db)?
            .where_(Condition::in_list(target_column, [pivot])))
    }

    fn raw_query(&self, db: &Db) -> Result<ModelQuery<Instance>> {
        ModelQuery::instances(db, self.target.clone())
    }

    fn eager_load(&self, db: &Db, instances: &mut [&mut Instance]) -> Result<()> {
        let keys = eager::distinct_keys(instances.iter().map(|owner| &**owner), &self.local_key)?;

        let mut links = IndexMap::new();
        let mut targets = IndexMap::new();
        if !keys.is_empty() {
            eager::trace_batch(&self.name, keys.len());

            links = self.targets_by_owner(db, keys)?;

            let target_keys: IndexSet<Value> = links.values().flatten().cloned().collect();
            targets = self.targets(db, target_keys.into_iter().collect())?;
        }

        for owner in instances.iter_mut() {
            let key = owner.column_value(&self.local_key)?;
            let list: ModelList<Instance> = links
                .get(&key)
                .into_iter()
                .flatten()
                .filter_map(|foreign| targets.get(foreign).cloned())
                .collect();
            owner.set_related(&self.name, Related::Many(list));
        }

        eager::trace_done(&self.name, instances.len());
        Ok(())
    }
}
