use crate::{
    schema::{PropertyDefinition, PropertyKind, RelationKind},
    Db, Related, Structure,
};

use indexmap::IndexMap;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};
use strata_core::{stmt::Value, Error, InstanceErrorKind, PropertyBag, Result};

/// The property values of one record.
///
/// Column values are kept in their decoded form, keyed by property name.
/// The values loaded from the database are remembered so changes can be
/// detected.
pub struct Instance {
    structure: Arc<Structure>,
    values: IndexMap<String, Value>,
    original: IndexMap<String, Value>,
    relations: IndexMap<String, Related>,
    macros: Mutex<HashMap<String, Value>>,
    persisted: bool,
}

impl Instance {
    pub(crate) fn from_values(
        structure: Arc<Structure>,
        values: IndexMap<String, Value>,
        persisted: bool,
    ) -> Instance {
        Instance {
            structure,
            original: values.clone(),
            values,
            relations: IndexMap::new(),
            macros: Mutex::new(HashMap::new()),
            persisted,
        }
    }

    pub fn structure(&self) -> &Arc<Structure> {
        &self.structure
    }

    /// Returns `true` once the record exists in the database.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Column values by property name.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Reads a column, macro or polymorphic property by name or alias.
    pub fn get(&self, key: &str) -> Result<Value> {
        let property = self.structure.get_property(key)?;

        match &property.kind {
            PropertyKind::Column(_) => Ok(self.values.get(&property.name).cloned().unwrap_or_default()),
            PropertyKind::Macro(_) => self.get_macro(property),
            PropertyKind::Polymorphic(_) => Ok(Value::from(self.structure.model_name())),
            PropertyKind::Relation(_) => Err(Error::relation(format!(
                "`{}` of {} is a relation; use `related`",
                property.name,
                self.structure.model_name()
            ))),
        }
    }

    fn get_macro(&self, property: &PropertyDefinition) -> Result<Value> {
        let Some(definition) = property.as_macro() else {
            return Err(Error::unknown_property(self.structure.model_name(), &property.name));
        };

        if definition.is_cached {
            if let Some(value) = self.lock_macros().get(&property.name) {
                return Ok(value.clone());
            }
        }

        let Some(implementation) = &definition.implementation else {
            return Err(Error::instance(
                InstanceErrorKind::MissingMacroImplementation,
                format!(
                    "macro `{}` of {} has no implementation",
                    property.name,
                    self.structure.model_name()
                ),
            ));
        };

        // The lock is released while the macro runs; it may read other macros.
        let value = implementation(self)?;
        if definition.is_cached {
            self.lock_macros()
                .insert(property.name.clone(), value.clone());
        }
        Ok(value)
    }

    /// Writes a column property by name or alias.
    ///
    /// Primary keys of persisted records, computed columns, macros,
    /// relations and the polymorphic discriminator cannot be written.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let property = self.structure.get_property(key)?;
        let model = self.structure.model_name();

        let (kind, what) = match &property.kind {
            PropertyKind::Column(column) if column.is_primary_key && self.persisted => {
                (InstanceErrorKind::Immutable, "primary key")
            }
            PropertyKind::Column(column) if column.is_computed => {
                (InstanceErrorKind::Immutable, "computed column")
            }
            PropertyKind::Column(_) => {
                let name = property.name.clone();
                self.values.insert(name, value);
                self.lock_macros().clear();
                return Ok(());
            }
            PropertyKind::Macro(_) => (InstanceErrorKind::ImmutableMacro, "macro"),
            PropertyKind::Relation(_) => (InstanceErrorKind::ImmutableRelation, "relation"),
            PropertyKind::Polymorphic(_) => {
                (InstanceErrorKind::Immutable, "polymorphic discriminator")
            }
        };

        Err(Error::instance(
            kind,
            format!("cannot write {what} `{}` of {model}", property.name),
        ))
    }

    /// Value of the column stored as `key`.
    pub fn column_value(&self, key: &str) -> Result<Value> {
        let property = self
            .structure
            .column_property(key)
            .ok_or_else(|| Error::unknown_property(self.structure.model_name(), key))?;
        Ok(self.values.get(&property.name).cloned().unwrap_or_default())
    }

    /// Writes the column stored as `key`, bypassing write protection.
    pub(crate) fn set_column_value(&mut self, key: &str, value: Value) -> Result<()> {
        let name = self
            .structure
            .column_property(key)
            .ok_or_else(|| Error::unknown_property(self.structure.model_name(), key))?
            .name
            .clone();
        self.values.insert(name, value);
        self.lock_macros().clear();
        Ok(())
    }

    pub fn primary_key_value(&self) -> Result<Value> {
        self.structure.primary_key_value(self)
    }

    // ===== Relations =====

    /// The loaded value of relation `name`, if it was loaded.
    pub fn related(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Stores a loaded relation value. Used by custom relation handlers.
    pub fn set_related(&mut self, name: &str, related: Related) {
        self.relations.insert(name.to_string(), related);
    }

    /// Loaded instances of relation `name`.
    pub(crate) fn related_instances_mut(&mut self, name: &str) -> Vec<&mut Instance> {
        match self.relations.get_mut(name) {
            Some(Related::One(Some(instance))) => vec![instance],
            Some(Related::Many(list)) => list.iter_mut().collect(),
            _ => vec![],
        }
    }

    /// Queries relation `name` for this instance without storing the result.
    pub fn fetch(&self, db: &Db, name: &str) -> Result<Related> {
        self.structure.get_relation(name)?.fetch(db, self)
    }

    /// Queries relation `name` and stores the result.
    pub fn load(&mut self, db: &Db, name: &str) -> Result<&Related> {
        let relation = self.structure.get_relation(name)?;
        let related = relation.fetch(db, self)?;
        let name = relation.name();
        self.relations.insert(name.to_string(), related);
        Ok(&self.relations[name])
    }

    /// Points the `belongs_to` relation `name` at `target`, copying the key.
    pub fn associate(&mut self, name: &str, target: &Instance) -> Result<()> {
        let relation = self.structure.get_relation(name)?;
        let definition = relation.definition();

        if definition.kind != RelationKind::BelongsTo {
            return Err(Error::instance(
                InstanceErrorKind::ImmutableRelation,
                format!(
                    "cannot associate `{name}` of {}; only belongs_to relations can be assigned",
                    self.structure.model_name()
                ),
            ));
        }

        let (local_key, foreign_key) = relation.keys();
        let value = target.column_value(foreign_key)?;
        self.set_column_value(local_key, value)?;
        self.set_related(relation.name(), Related::One(Some(target.clone())));
        Ok(())
    }

    // ===== Changes =====

    /// Returns `true` if the column property `key` changed since the record
    /// was loaded or saved.
    pub fn is_modified(&self, key: &str) -> bool {
        let Ok(property) = self.structure.get_property(key) else {
            return false;
        };
        self.values.get(&property.name) != self.original.get(&property.name)
    }

    /// Names of the changed column properties.
    pub fn modified(&self) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.modified().is_empty()
    }

    pub(crate) fn mark_saved(&mut self) {
        self.persisted = true;
        self.original = self.values.clone();
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.persisted = false;
    }

    // ===== Export =====

    /// Exports visible columns, visible macros and loaded relations.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut object = serde_json::Map::new();

        for (name, property) in self.structure.properties() {
            if !property.is_exported() {
                continue;
            }

            let value = match &property.kind {
                PropertyKind::Column(_) => self
                    .values
                    .get(name)
                    .map(Value::to_json)
                    .unwrap_or(serde_json::Value::Null),
                PropertyKind::Macro(_) => self.get(name)?.to_json(),
                PropertyKind::Relation(_) => match self.relations.get(name) {
                    Some(Related::One(Some(instance))) => instance.to_json()?,
                    Some(Related::One(None)) => serde_json::Value::Null,
                    Some(Related::Many(list)) => serde_json::Value::Array(
                        list.iter().map(Instance::to_json).collect::<Result<_>>()?,
                    ),
                    None => continue,
                },
                PropertyKind::Polymorphic(_) => self.structure.model_name().into(),
            };

            object.insert(name.clone(), value);
        }

        Ok(serde_json::Value::Object(object))
    }

    fn lock_macros(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.macros.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PropertyBag for Instance {
    fn get(&self, key: &str) -> Result<Value> {
        Instance::get(self, key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        Instance::set(self, key, value)
    }

    fn has(&self, key: &str) -> bool {
        self.structure.has_property(key)
    }
}

impl Clone for Instance {
    fn clone(&self) -> Self {
        Instance {
            structure: self.structure.clone(),
            values: self.values.clone(),
            original: self.original.clone(),
            relations: self.relations.clone(),
            macros: Mutex::new(self.lock_macros().clone()),
            persisted: self.persisted,
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.structure, &other.structure)
            && self.values == other.values
            && self.relations == other.relations
            && self.persisted == other.persisted
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.structure.model_name())
            .field("values", &self.values)
            .field("relations", &self.relations)
            .field("persisted", &self.persisted)
            .finish()
    }
}
