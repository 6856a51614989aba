use crate::{relation::eager, Db, Instance, Model, ModelList, Structure};

use std::{fmt, sync::Arc};
use strata_core::{stmt::Value, Error, Result};
use strata_sql::{ColumnLiteral, Condition, Order, Query};

/// A select over one model's table that materializes its rows.
///
/// Filters are given as [`Condition`]s or by property name; a property that
/// cannot be resolved is recorded and reported when the query runs.
pub struct ModelQuery<M = Instance> {
    db: Db,
    structure: Arc<Structure>,
    query: Query,
    with: Vec<String>,
    without: Vec<String>,
    convert: fn(Instance) -> Result<M>,
}

impl ModelQuery<Instance> {
    /// Selects untyped instances of `structure`.
    pub fn instances(db: &Db, structure: Arc<Structure>) -> Result<ModelQuery<Instance>> {
        let query = structure.select(db)?;
        Ok(ModelQuery {
            db: db.clone(),
            structure,
            query,
            with: vec![],
            without: vec![],
            convert: Ok,
        })
    }
}

impl<M: Model> ModelQuery<M> {
    pub fn new(db: &Db) -> Result<ModelQuery<M>> {
        let structure = M::structure()?;
        let query = structure.select(db)?;
        Ok(ModelQuery {
            db: db.clone(),
            structure,
            query,
            with: vec![],
            without: vec![],
            convert: M::from_instance,
        })
    }
}

impl<M> ModelQuery<M> {
    pub fn structure(&self) -> &Arc<Structure> {
        &self.structure
    }

    /// Column reference for the column property `key`.
    pub fn column(&self, key: &str) -> Result<ColumnLiteral> {
        self.structure.get_column(&self.db, key, None)
    }

    pub fn where_(self, condition: Condition) -> Self {
        self.map_query(|query| query.where_(condition))
    }

    pub fn and_where(self, condition: Condition) -> Self {
        self.map_query(|query| query.and_where(condition))
    }

    pub fn or_where(self, condition: Condition) -> Self {
        self.map_query(|query| query.or_where(condition))
    }

    /// `{key} = {value}` on the column property `key`.
    pub fn where_eq(self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.where_column(key, |column| Condition::eq(column, value))
    }

    pub fn where_in<V: Into<Value>>(self, key: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.where_column(key, |column| Condition::in_list(column, values))
    }

    pub fn where_null(self, key: &str) -> Self {
        self.where_column(key, |column| Condition::null(column))
    }

    fn where_column(self, key: &str, condition: impl FnOnce(ColumnLiteral) -> Condition) -> Self {
        match self.column(key) {
            Ok(column) => self.where_(condition(column)),
            Err(err) => self.map_query(|query| query.fail(err)),
        }
    }

    pub fn order_by(self, key: &str, order: Order) -> Self {
        match self.column(key) {
            Ok(column) => self.map_query(|query| query.order_by(column, order)),
            Err(err) => self.map_query(|query| query.fail(err)),
        }
    }

    pub fn limit(self, limit: u64) -> Self {
        self.map_query(|query| query.limit(limit))
    }

    pub fn offset(self, offset: u64) -> Self {
        self.map_query(|query| query.offset(offset))
    }

    /// Eager loads `relations` on the results. Dotted names load nested
    /// relations.
    pub fn with(mut self, relations: &[&str]) -> Self {
        self.with.extend(relations.iter().map(|name| name.to_string()));
        self
    }

    /// Skips `relations` that would otherwise be loaded.
    pub fn without(mut self, relations: &[&str]) -> Self {
        self.without
            .extend(relations.iter().map(|name| name.to_string()));
        self
    }

    /// Applies `f` to the underlying SQL query.
    pub fn map_query(mut self, f: impl FnOnce(Query) -> Query) -> Self {
        self.query = f(self.query);
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn into_query(self) -> Query {
        self.query
    }

    /// Runs the query and materializes the rows, without loading any
    /// relation.
    pub(crate) fn fetch_instances(&self) -> Result<ModelList<Instance>> {
        self.query
            .fetch_all()?
            .into_iter()
            .map(|row| self.structure.create_instance(row))
            .collect()
    }

    /// Runs the query and loads the requested relations, or the
    /// eager-by-default ones when none were requested.
    pub fn all(self) -> Result<ModelList<M>> {
        let mut instances = self.fetch_instances()?;

        let with: Vec<&str> = self.with.iter().map(String::as_str).collect();
        let without: Vec<&str> = self.without.iter().map(String::as_str).collect();
        eager::load_mixed(&self.db, instances.iter_mut().collect(), &with, &without)?;

        instances.into_iter().map(self.convert).collect()
    }

    pub fn first(self) -> Result<Option<M>> {
        Ok(self.limit(1).all()?.into_iter().next())
    }

    /// The only matching record. No match is a not found error, more than
    /// one is a query error.
    pub fn single(self) -> Result<M> {
        let model = self.structure.model_name();
        let mut found = self.limit(2).all()?.into_vec();

        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(Error::not_found(format!("no {model} matches the query"))),
            _ => Err(Error::query(format!("more than one {model} matches the query"))),
        }
    }
}

impl<M> fmt::Debug for ModelQuery<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelQuery")
            .field("model", &self.structure.model_name())
            .field("sql", &self.query.sql())
            .field("with", &self.with)
            .field("without", &self.without)
            .finish()
    }
}
