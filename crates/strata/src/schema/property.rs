use super::Structure;
use crate::{relation::RelationHandler, Instance};

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::{fmt, sync::Arc};
use strata_core::{stmt::Value, Caster, Result};

/// Computes the value of a macro property from its instance.
pub type MacroFn = Arc<dyn Fn(&Instance) -> Result<Value> + Send + Sync>;

/// A declared property of a model.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyDefinition {
    pub name: String,
    pub alias: Option<String>,
    pub is_hidden: bool,
    pub is_visible: bool,

    #[serde(flatten)]
    pub kind: PropertyKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyKind {
    Column(ColumnDefinition),
    Relation(RelationDefinition),
    Macro(MacroDefinition),
    Polymorphic(PolymorphicDefinition),
}

/// Maps a property onto a stored column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDefinition {
    /// Name of the column in the table
    pub key: String,
    pub is_primary_key: bool,

    /// Computed by the database, never written
    pub is_computed: bool,

    #[serde(serialize_with = "serialize_value")]
    pub default: Option<Value>,

    #[serde(serialize_with = "serialize_caster")]
    pub caster: Option<Arc<dyn Caster>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
    MorphTo,
    Custom,
}

impl RelationKind {
    pub fn is_many(self) -> bool {
        matches!(self, RelationKind::HasMany | RelationKind::BelongsToMany)
    }
}

/// A reference to another model's structure, resolved on demand.
#[derive(Clone, Copy)]
pub struct Target {
    pub name: &'static str,
    pub(crate) resolve: fn() -> Result<Arc<Structure>>,
}

impl Target {
    pub fn of<M: crate::Model>() -> Target {
        Target {
            name: super::model_name::<M>(),
            resolve: Structure::of::<M>,
        }
    }

    pub fn resolve(&self) -> Result<Arc<Structure>> {
        (self.resolve)()
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PivotDefinition {
    pub table: Option<String>,

    /// Pivot column pointing at the owner
    pub local_key: Option<String>,

    /// Pivot column pointing at the target
    pub foreign_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationDefinition {
    #[serde(rename = "relation")]
    pub kind: RelationKind,
    pub target: Option<Target>,

    /// Column on the owner
    pub local_key: Option<String>,

    /// Column on the target
    pub foreign_key: Option<String>,

    pub pivot: Option<PivotDefinition>,

    /// Discriminator value to target, for `morph_to`
    pub morph_map: IndexMap<String, Target>,

    /// Loaded by default when no relation names are requested
    pub eager: bool,

    #[serde(skip)]
    pub handler: Option<Arc<dyn RelationHandler>>,
}

impl RelationDefinition {
    pub(crate) fn new(kind: RelationKind, target: Option<Target>) -> RelationDefinition {
        RelationDefinition {
            kind,
            target,
            local_key: None,
            foreign_key: None,
            pivot: None,
            morph_map: IndexMap::new(),
            eager: false,
            handler: None,
        }
    }
}

#[derive(Clone, Serialize)]
pub struct MacroDefinition {
    pub is_cached: bool,

    #[serde(skip)]
    pub implementation: Option<MacroFn>,
}

impl fmt::Debug for MacroDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroDefinition")
            .field("is_cached", &self.is_cached)
            .field("implementation", &self.implementation.is_some())
            .finish()
    }
}

/// Selects the concrete subtype of a row from a discriminator column.
#[derive(Debug, Clone, Serialize)]
pub struct PolymorphicDefinition {
    /// Column property holding the discriminator
    pub column: String,
    pub map: IndexMap<String, Target>,
}

impl PropertyDefinition {
    pub(crate) fn new(name: &str, kind: PropertyKind) -> PropertyDefinition {
        let is_visible = !matches!(kind, PropertyKind::Macro(_));

        PropertyDefinition {
            name: name.to_string(),
            alias: None,
            is_hidden: false,
            is_visible,
            kind,
        }
    }

    /// Returns `true` if `key` is the name or the alias of this property.
    pub fn answers_to(&self, key: &str) -> bool {
        self.name == key || self.alias.as_deref() == Some(key)
    }

    pub fn as_column(&self) -> Option<&ColumnDefinition> {
        match &self.kind {
            PropertyKind::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_relation(&self) -> Option<&RelationDefinition> {
        match &self.kind {
            PropertyKind::Relation(relation) => Some(relation),
            _ => None,
        }
    }

    pub fn as_macro(&self) -> Option<&MacroDefinition> {
        match &self.kind {
            PropertyKind::Macro(macro_) => Some(macro_),
            _ => None,
        }
    }

    pub fn is_column(&self) -> bool {
        self.as_column().is_some()
    }

    pub fn is_relation(&self) -> bool {
        self.as_relation().is_some()
    }

    /// Included in [`Instance::to_json`] exports.
    pub fn is_exported(&self) -> bool {
        self.is_visible && !self.is_hidden
    }
}

fn serialize_value<S: Serializer>(
    value: &Option<Value>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(value) => value.to_json().serialize(serializer),
        None => serializer.serialize_none(),
    }
}

fn serialize_caster<S: Serializer>(
    caster: &Option<Arc<dyn Caster>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match caster {
        Some(caster) => serializer.serialize_str(caster.name()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strata_core::caster::BooleanCaster;

    #[test]
    fn column_serializes_flat() {
        let mut property = PropertyDefinition::new(
            "is_admin",
            PropertyKind::Column(ColumnDefinition {
                key: "is_admin".to_string(),
                is_primary_key: false,
                is_computed: false,
                default: Some(Value::Bool(false)),
                caster: Some(Arc::new(BooleanCaster)),
            }),
        );
        property.alias = Some("admin".to_string());

        assert_eq!(
            serde_json::to_value(&property).unwrap(),
            serde_json::json!({
                "name": "is_admin",
                "alias": "admin",
                "is_hidden": false,
                "is_visible": true,
                "kind": "column",
                "key": "is_admin",
                "is_primary_key": false,
                "is_computed": false,
                "default": false,
                "caster": "boolean",
            })
        );
    }

    #[test]
    fn macro_is_not_visible_by_default() {
        let property = PropertyDefinition::new(
            "display_name",
            PropertyKind::Macro(MacroDefinition {
                is_cached: true,
                implementation: None,
            }),
        );

        assert!(!property.is_exported());
        assert_eq!(
            serde_json::to_value(&property).unwrap(),
            serde_json::json!({
                "name": "display_name",
                "alias": null,
                "is_hidden": false,
                "is_visible": false,
                "kind": "macro",
                "is_cached": true,
            })
        );
    }
}
