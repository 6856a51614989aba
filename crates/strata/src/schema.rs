mod builder;
pub use builder::{Builder, PolymorphicBuilder, PropertyBuilder, RelationBuilder};

mod property;
pub use property::{
    ColumnDefinition, MacroDefinition, MacroFn, PivotDefinition, PolymorphicDefinition,
    PropertyDefinition, PropertyKind, RelationDefinition, RelationKind, Target,
};

mod registry;

use crate::{relation, Db, Instance, Model, Relation};

use indexmap::IndexMap;
use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};
use strata_core::{
    driver::Row, err, stmt::Value, Error, Result, StructureErrorKind,
};
use strata_sql::{ColumnLiteral, Condition, Grammar, Query, TableName};

type RelationCell = Arc<OnceLock<Result<Arc<dyn Relation>>>>;

/// Relation instances of one structure, built on first use.
#[derive(Default)]
pub(crate) struct RelationCache(RwLock<HashMap<String, RelationCell>>);

impl RelationCache {
    fn cell(&self, name: &str) -> RelationCell {
        if let Some(cell) = self
            .0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return cell.clone();
        }

        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

/// Reflected metadata of one model type.
///
/// A structure is discovered once per model type by [`Structure::of`] and
/// shared for the lifetime of the process.
pub struct Structure {
    model_type: TypeId,
    model_name: &'static str,
    table: String,
    connection_id: Option<String>,

    /// Column keys of the primary key
    primary_key: Vec<String>,

    /// Own and inherited properties by name, in declaration order
    properties: IndexMap<String, PropertyDefinition>,

    /// Alias to property name
    aliases: HashMap<String, String>,

    /// Name of the polymorphic property
    polymorphic: Option<String>,
    soft_delete_column: Option<String>,
    on_duplicate_key_update: Option<Vec<String>>,
    parent: Option<Arc<Structure>>,
    relations: RelationCache,
}

/// Short name of a model type, without its module path.
pub(crate) fn model_name<M: 'static>() -> &'static str {
    let name = std::any::type_name::<M>();
    let name = name.split('<').next().unwrap_or(name);
    name.rsplit("::").next().unwrap_or(name)
}

impl Structure {
    /// Returns the structure of `M`, discovering it on first use.
    ///
    /// Every call returns the same `Arc`. A failed discovery is cached and
    /// returned to every later caller.
    pub fn of<M: Model>() -> Result<Arc<Structure>> {
        registry::structure_of::<M>()
    }

    /// A builder holding what [`Model::define`] declares for `M`. The
    /// structure it builds is not registered.
    pub fn builder<M: Model>() -> Builder {
        let mut builder = Builder::new::<M>();
        M::define(&mut builder);
        builder
    }

    pub fn is<M: Model>(&self) -> bool {
        self.model_type == TypeId::of::<M>()
    }

    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// Column keys of the primary key.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn parent(&self) -> Option<&Arc<Structure>> {
        self.parent.as_ref()
    }

    pub fn polymorphic(&self) -> Option<&PolymorphicDefinition> {
        match &self.properties.get(self.polymorphic.as_deref()?)?.kind {
            PropertyKind::Polymorphic(definition) => Some(definition),
            _ => None,
        }
    }

    pub fn soft_delete_column(&self) -> Option<&str> {
        self.soft_delete_column.as_deref()
    }

    pub fn on_duplicate_key_update(&self) -> Option<&[String]> {
        self.on_duplicate_key_update.as_deref()
    }

    pub fn properties(&self) -> impl Iterator<Item = (&String, &PropertyDefinition)> {
        self.properties.iter()
    }

    /// Resolves a property by name or alias.
    pub fn get_property(&self, key: &str) -> Result<&PropertyDefinition> {
        self.find_property(key)
            .ok_or_else(|| Error::unknown_property(self.model_name, key))
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.find_property(key).is_some()
    }

    fn find_property(&self, key: &str) -> Option<&PropertyDefinition> {
        self.properties.get(key).or_else(|| {
            self.aliases
                .get(key)
                .and_then(|name| self.properties.get(name))
        })
    }

    /// The column property stored in the column `key`.
    pub fn column_property(&self, key: &str) -> Option<&PropertyDefinition> {
        self.properties
            .values()
            .find(|property| property.as_column().is_some_and(|column| column.key == key))
    }

    pub fn has_column(&self, key: &str) -> bool {
        self.column_property(key).is_some()
    }

    /// Column properties in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = (&PropertyDefinition, &ColumnDefinition)> {
        self.properties
            .values()
            .filter_map(|property| Some((property, property.as_column()?)))
    }

    /// The grammar of the connection this model lives on.
    pub fn grammar(&self, db: &Db) -> Result<Grammar> {
        Ok(Grammar::for_backend(db.connection(self.connection_id())?.backend()))
    }

    /// A column reference for the column property `key`, scoped to this
    /// structure's table or to `table`.
    pub fn get_column(&self, db: &Db, key: &str, table: Option<&str>) -> Result<ColumnLiteral> {
        let property = self.get_property(key)?;
        let Some(column) = property.as_column() else {
            return Err(Error::structure(
                StructureErrorKind::UnknownProperty,
                format!("{}: `{key}` is not a column", self.model_name),
            ));
        };

        Ok(self.column_literal(self.grammar(db)?, &column.key, table))
    }

    pub(crate) fn column_literal(
        &self,
        grammar: Grammar,
        key: &str,
        table: Option<&str>,
    ) -> ColumnLiteral {
        ColumnLiteral::of(grammar, key, Some(table.unwrap_or(&self.table)), None)
    }

    /// Returns the relation declared as `name`, building it on first use.
    ///
    /// Building resolves the target structure and checks the key columns; a
    /// failure is a relation error and is cached like a success.
    pub fn get_relation(&self, name: &str) -> Result<Arc<dyn Relation>> {
        let property = self.get_property(name)?;
        let Some(definition) = property.as_relation() else {
            return Err(Error::relation(format!(
                "`{name}` of {} is not a relation",
                self.model_name
            )));
        };

        let property_name = property.name.clone();
        self.relations
            .cell(&property_name)
            .get_or_init(|| {
                relation::build(self, &property_name, definition).map_err(|err| {
                    if err.is_relation() {
                        err
                    } else {
                        err.context(Error::relation(format!(
                            "cannot build relation `{property_name}` of {}",
                            self.model_name
                        )))
                    }
                })
            })
            .clone()
    }

    /// Relation properties in declaration order. The iterator can be cloned
    /// to restart it.
    pub fn relations(&self) -> impl Iterator<Item = &PropertyDefinition> + Clone {
        self.properties.values().filter(|property| property.is_relation())
    }

    /// Loads one relation for all `instances` with a bounded number of
    /// queries.
    pub fn eager_load_relation(
        &self,
        db: &Db,
        relation: &str,
        instances: &mut [&mut Instance],
    ) -> Result<()> {
        self.get_relation(relation)?
            .eager_load(db, instances)
            .map_err(|err| {
                err.context(err!(
                    "eager loading relation `{relation}` of {}",
                    self.model_name
                ))
            })
    }

    /// Loads the `enabled` relations, or the eager-by-default relations when
    /// `enabled` is empty, skipping the `disabled` ones.
    ///
    /// Dotted names such as `posts.comments` load `comments` on the loaded
    /// posts.
    pub fn eager_load_relations(
        &self,
        db: &Db,
        instances: &mut [&mut Instance],
        enabled: &[&str],
        disabled: &[&str],
    ) -> Result<()> {
        relation::eager::load_relations(self, db, instances, enabled, disabled)
    }

    /// Materializes a row.
    ///
    /// When the model is polymorphic the discriminator selects the subtype
    /// structure the row is materialized with. Columns missing from the row
    /// take their default, and every column is decoded by its caster with
    /// the stored values as context.
    pub fn create_instance(self: &Arc<Self>, row: Row) -> Result<Instance> {
        if let Some(subtype) = self.subtype_for(&row)? {
            return subtype.create_instance(row);
        }

        let mut stored = IndexMap::with_capacity(row.len());
        for (property, column) in self.columns() {
            let value = match row.get(&column.key) {
                Some(value) => value.clone(),
                None => column.default.clone().unwrap_or_default(),
            };
            stored.insert(property.name.clone(), value);
        }

        let raw = Instance::from_values(self.clone(), stored.clone(), true);

        let mut values = IndexMap::with_capacity(stored.len());
        for (name, value) in stored {
            let caster = self
                .properties
                .get(&name)
                .and_then(PropertyDefinition::as_column)
                .and_then(|column| column.caster.clone());

            let value = match caster {
                Some(caster) => caster.decode(value, Some(&raw)).map_err(|err| {
                    err.context(err!("decoding `{name}` of {}", self.model_name))
                })?,
                None => value,
            };
            values.insert(name, value);
        }

        Ok(Instance::from_values(self.clone(), values, true))
    }

    fn subtype_for(self: &Arc<Self>, row: &Row) -> Result<Option<Arc<Structure>>> {
        let Some(polymorphic) = self.polymorphic() else {
            return Ok(None);
        };

        let key = self
            .get_property(&polymorphic.column)?
            .as_column()
            .map(|column| column.key.as_str())
            .unwrap_or(polymorphic.column.as_str());

        let Some(discriminator) = row.get(key) else {
            return Err(Error::structure(
                StructureErrorKind::MissingPolymorphicColumn,
                format!("{}: row has no discriminator `{key}`", self.model_name),
            ));
        };

        let discriminator = match discriminator {
            Value::Null => return Ok(None),
            Value::I64(v) => v.to_string(),
            other => other.clone().into_string()?,
        };

        let Some(target) = polymorphic.map.get(&discriminator) else {
            return Err(Error::structure(
                StructureErrorKind::UnknownPolymorphicType,
                format!("{}: no subtype for `{discriminator}`", self.model_name),
            ));
        };

        let subtype = target.resolve()?;
        Ok((!Arc::ptr_eq(&subtype, self)).then_some(subtype))
    }

    /// A new, unsaved instance with every column at its default.
    pub fn new_instance(self: &Arc<Self>) -> Instance {
        let values = self
            .columns()
            .map(|(property, column)| {
                (
                    property.name.clone(),
                    column.default.clone().unwrap_or_default(),
                )
            })
            .collect();

        Instance::from_values(self.clone(), values, false)
    }

    /// The primary key of `instance`; a list for composite keys.
    pub fn primary_key_value(&self, instance: &Instance) -> Result<Value> {
        let mut values = self
            .primary_key
            .iter()
            .map(|key| instance.column_value(key))
            .collect::<Result<Vec<_>>>()?;

        Ok(if values.len() == 1 {
            values.remove(0)
        } else {
            Value::List(values)
        })
    }

    /// Condition matching the row of `instance` by primary key.
    pub(crate) fn primary_key_condition(
        &self,
        grammar: Grammar,
        instance: &Instance,
    ) -> Result<Condition> {
        let mut conditions = Vec::with_capacity(self.primary_key.len());
        for key in &self.primary_key {
            let value = instance.column_value(key)?;
            if value.is_null() {
                return Err(Error::query(format!(
                    "{} has no value for primary key `{key}`",
                    self.model_name
                )));
            }
            conditions.push(Condition::eq(self.column_literal(grammar, key, None), value));
        }

        Ok(match conditions.len() {
            1 => conditions.remove(0),
            _ => Condition::all(conditions),
        })
    }

    /// `select {table}.* from {table}`, skipping soft deleted rows.
    pub fn select(&self, db: &Db) -> Result<Query> {
        let connection = db.connection(self.connection_id())?;
        let grammar = Grammar::for_backend(connection.backend());

        let mut query = Query::new(connection)
            .select([self.column_literal(grammar, "*", None)])
            .from(&self.table);

        if let Some(column) = &self.soft_delete_column {
            query = query.where_(Condition::null(self.column_literal(grammar, column, None)));
        }

        Ok(query)
    }

    /// Structured description of the structure for introspection.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        #[derive(serde::Serialize)]
        struct Description<'a> {
            model: &'a str,
            table: &'a str,
            connection: Option<&'a str>,
            primary_key: &'a [String],
            properties: Vec<&'a PropertyDefinition>,
            polymorphic: Option<&'a PolymorphicDefinition>,
            soft_delete: Option<&'a str>,
            parent: Option<&'a str>,
        }

        Ok(serde_json::to_value(Description {
            model: self.model_name,
            table: &self.table,
            connection: self.connection_id(),
            primary_key: &self.primary_key,
            properties: self.properties.values().collect(),
            polymorphic: self.polymorphic(),
            soft_delete: self.soft_delete_column(),
            parent: self.parent.as_ref().map(|parent| parent.model_name()),
        })?)
    }
}

impl TableName for Structure {
    fn table_name(&self) -> &str {
        &self.table
    }
}

impl fmt::Debug for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Structure")
            .field("model", &self.model_name)
            .field("table", &self.table)
            .field("connection_id", &self.connection_id)
            .field("primary_key", &self.primary_key)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("parent", &self.parent.as_ref().map(|parent| parent.model_name))
            .finish()
    }
}
