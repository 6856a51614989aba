use super::{
    property::{
        ColumnDefinition, MacroDefinition, PivotDefinition, PolymorphicDefinition,
        PropertyDefinition, PropertyKind, RelationDefinition, RelationKind, Target,
    },
    RelationCache, Structure,
};
use crate::{relation::RelationHandler, Instance, Model};

use heck::ToSnakeCase;
use indexmap::IndexMap;
use std::{any::TypeId, collections::HashMap, sync::Arc};
use strata_core::{stmt::Value, Caster, Error, Result, StructureErrorKind};

/// Declarative definition of a model's structure.
///
/// [`Model::define`] receives a builder and declares the table, the
/// properties and the relations of the model. Validation happens once, in
/// [`Builder::build`].
#[derive(Debug)]
pub struct Builder {
    model_type: TypeId,
    model_name: &'static str,
    table: Option<String>,
    table_name_prefix: Option<String>,
    connection: Option<String>,
    properties: Vec<PropertyDefinition>,
    soft_delete: Option<String>,
    on_duplicate_key_update: Option<Vec<String>>,
    parent: Option<(TypeId, Target)>,
}

/// Configures the property most recently declared on a [`Builder`].
pub struct PropertyBuilder<'a> {
    property: &'a mut PropertyDefinition,
}

/// Configures a relation declared on a [`Builder`].
pub struct RelationBuilder<'a> {
    property: &'a mut PropertyDefinition,
}

/// Configures the polymorphic discriminator of a [`Builder`].
pub struct PolymorphicBuilder<'a> {
    property: &'a mut PropertyDefinition,
}

impl Builder {
    pub fn new<M: Model>() -> Builder {
        Builder {
            model_type: TypeId::of::<M>(),
            model_name: super::model_name::<M>(),
            table: None,
            table_name_prefix: None,
            connection: None,
            properties: vec![],
            soft_delete: None,
            on_duplicate_key_update: None,
            parent: None,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model_name
    }

    /// Sets the table. Defaults to the pluralised snake case model name.
    pub fn table(&mut self, table: &str) -> &mut Self {
        self.table = Some(table.to_string());
        self
    }

    /// Prefix applied to the default table name.
    pub fn table_name_prefix(&mut self, prefix: &str) -> &mut Self {
        self.table_name_prefix = Some(prefix.to_string());
        self
    }

    /// Id of the [`Db`](crate::Db) connection the model lives on.
    pub fn connection(&mut self, id: &str) -> &mut Self {
        self.connection = Some(id.to_string());
        self
    }

    pub fn column(&mut self, name: &str) -> PropertyBuilder<'_> {
        self.push(PropertyDefinition::new(
            name,
            PropertyKind::Column(ColumnDefinition {
                key: name.to_string(),
                is_primary_key: false,
                is_computed: false,
                default: None,
                caster: None,
            }),
        ))
    }

    /// Shorthand for `column(name).primary_key()`.
    pub fn primary_key(&mut self, name: &str) -> PropertyBuilder<'_> {
        self.column(name).primary_key()
    }

    pub fn belongs_to<T: Model>(&mut self, name: &str) -> RelationBuilder<'_> {
        self.relation(name, RelationDefinition::new(RelationKind::BelongsTo, Some(Target::of::<T>())))
    }

    pub fn has_one<T: Model>(&mut self, name: &str) -> RelationBuilder<'_> {
        self.relation(name, RelationDefinition::new(RelationKind::HasOne, Some(Target::of::<T>())))
    }

    pub fn has_many<T: Model>(&mut self, name: &str) -> RelationBuilder<'_> {
        self.relation(name, RelationDefinition::new(RelationKind::HasMany, Some(Target::of::<T>())))
    }

    pub fn belongs_to_many<T: Model>(&mut self, name: &str) -> RelationBuilder<'_> {
        let mut definition =
            RelationDefinition::new(RelationKind::BelongsToMany, Some(Target::of::<T>()));
        definition.pivot = Some(PivotDefinition {
            table: None,
            local_key: None,
            foreign_key: None,
        });
        self.relation(name, definition)
    }

    /// A relation whose target model is named by a type column on the owner.
    ///
    /// Targets are registered with [`RelationBuilder::morph`].
    pub fn morph_to(&mut self, name: &str) -> RelationBuilder<'_> {
        self.relation(name, RelationDefinition::new(RelationKind::MorphTo, None))
    }

    pub fn custom_relation(
        &mut self,
        name: &str,
        handler: impl RelationHandler + 'static,
    ) -> RelationBuilder<'_> {
        let mut definition = RelationDefinition::new(RelationKind::Custom, None);
        definition.handler = Some(Arc::new(handler));
        self.relation(name, definition)
    }

    /// A computed property.
    pub fn macro_(
        &mut self,
        name: &str,
        implementation: impl Fn(&Instance) -> Result<Value> + Send + Sync + 'static,
    ) -> PropertyBuilder<'_> {
        self.push_macro(name, false, Some(Arc::new(implementation)))
    }

    /// A computed property evaluated at most once per instance until the
    /// instance changes.
    pub fn cached_macro(
        &mut self,
        name: &str,
        implementation: impl Fn(&Instance) -> Result<Value> + Send + Sync + 'static,
    ) -> PropertyBuilder<'_> {
        self.push_macro(name, true, Some(Arc::new(implementation)))
    }

    /// A macro whose implementation is supplied elsewhere. Reading it fails
    /// until then.
    pub fn declare_macro(&mut self, name: &str) -> PropertyBuilder<'_> {
        self.push_macro(name, false, None)
    }

    fn push_macro(
        &mut self,
        name: &str,
        is_cached: bool,
        implementation: Option<super::property::MacroFn>,
    ) -> PropertyBuilder<'_> {
        self.push(PropertyDefinition::new(
            name,
            PropertyKind::Macro(MacroDefinition {
                is_cached,
                implementation,
            }),
        ))
    }

    /// Declares the column property `column` as the discriminator choosing
    /// the subtype of each row. Reading the property `name` yields the model
    /// name of the materialized subtype.
    pub fn polymorphic(&mut self, name: &str, column: &str) -> PolymorphicBuilder<'_> {
        let mut property = PropertyDefinition::new(
            name,
            PropertyKind::Polymorphic(PolymorphicDefinition {
                column: column.to_string(),
                map: IndexMap::new(),
            }),
        );
        property.is_visible = false;

        self.properties.push(property);
        let index = self.properties.len() - 1;
        PolymorphicBuilder {
            property: &mut self.properties[index],
        }
    }

    /// Rows with a non-null `column` are treated as deleted.
    pub fn soft_delete(&mut self, column: &str) -> &mut Self {
        self.soft_delete = Some(column.to_string());
        self
    }

    /// Columns refreshed by `on duplicate key update` when saving a new
    /// record on MySQL or MariaDB.
    pub fn on_duplicate_key_update(&mut self, columns: &[&str]) -> &mut Self {
        self.on_duplicate_key_update = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Inherits the table, primary key and properties of `P`.
    pub fn parent<P: Model>(&mut self) -> &mut Self {
        self.parent = Some((TypeId::of::<P>(), Target::of::<P>()));
        self
    }

    fn push(&mut self, property: PropertyDefinition) -> PropertyBuilder<'_> {
        self.properties.push(property);
        let index = self.properties.len() - 1;
        PropertyBuilder {
            property: &mut self.properties[index],
        }
    }

    fn relation(&mut self, name: &str, definition: RelationDefinition) -> RelationBuilder<'_> {
        self.properties
            .push(PropertyDefinition::new(name, PropertyKind::Relation(definition)));
        let index = self.properties.len() - 1;
        RelationBuilder {
            property: &mut self.properties[index],
        }
    }

    /// Validates the declarations and builds the structure.
    pub fn build(self) -> Result<Structure> {
        let Builder {
            model_type,
            model_name,
            table,
            table_name_prefix,
            connection,
            properties: own,
            soft_delete,
            on_duplicate_key_update,
            parent,
        } = self;

        let invalid = |kind: StructureErrorKind, message: String| {
            Error::structure(kind, format!("{model_name}: {message}"))
        };

        // Names and aliases are unique among the model's own declarations.
        let mut seen = HashMap::new();
        for property in &own {
            for key in std::iter::once(&property.name).chain(property.alias.as_ref()) {
                if let Some(previous) = seen.insert(key.clone(), property.name.clone()) {
                    return Err(invalid(
                        StructureErrorKind::DuplicateProperty,
                        format!("`{key}` is declared by both `{previous}` and `{}`", property.name),
                    ));
                }
            }

            if let Some(relation) = property.as_relation() {
                validate_relation(&property.name, relation)
                    .map_err(|message| invalid(StructureErrorKind::InvalidRelation, message))?;
            }
        }

        let parent = match parent {
            Some((parent_type, _)) if parent_type == model_type => {
                return Err(invalid(
                    StructureErrorKind::InvalidRelation,
                    "a model cannot be its own parent".to_string(),
                ));
            }
            Some((_, target)) => Some(target.resolve()?),
            None => None,
        };

        // Inherited properties come first; own declarations override them.
        // Subtypes do not inherit the discriminator.
        let mut properties = IndexMap::new();
        if let Some(parent) = &parent {
            for (name, property) in parent.properties() {
                if !matches!(property.kind, PropertyKind::Polymorphic(_)) {
                    properties.insert(name.clone(), property.clone());
                }
            }
        }
        for property in own {
            properties.insert(property.name.clone(), property);
        }

        let mut aliases = HashMap::new();
        for property in properties.values() {
            if let Some(alias) = &property.alias {
                aliases.insert(alias.clone(), property.name.clone());
            }
        }

        let table = match (table, &parent) {
            (Some(table), _) => table,
            (None, Some(parent)) => parent.table_name().to_string(),
            (None, None) => {
                let base = pluralizer::pluralize(&model_name.to_snake_case(), 2, false);
                format!("{}{base}", table_name_prefix.unwrap_or_default())
            }
        };
        if table.is_empty() {
            return Err(invalid(
                StructureErrorKind::MissingTable,
                "the table name is empty".to_string(),
            ));
        }

        let primary_key: Vec<String> = properties
            .values()
            .filter_map(|property| property.as_column())
            .filter(|column| column.is_primary_key)
            .map(|column| column.key.clone())
            .collect();
        if primary_key.is_empty() {
            return Err(invalid(
                StructureErrorKind::MissingPrimaryKey,
                "no primary key declared".to_string(),
            ));
        }

        let is_column = |name: &str| properties.get(name).is_some_and(PropertyDefinition::is_column);

        let mut polymorphic = None;
        for property in properties.values() {
            let PropertyKind::Polymorphic(definition) = &property.kind else {
                continue;
            };
            if polymorphic.replace(property.name.clone()).is_some() {
                return Err(invalid(
                    StructureErrorKind::DuplicateProperty,
                    "more than one polymorphic discriminator".to_string(),
                ));
            }
            if !is_column(&definition.column) {
                return Err(invalid(
                    StructureErrorKind::MissingPolymorphicColumn,
                    format!("discriminator `{}` is not a declared column", definition.column),
                ));
            }
        }

        // Soft delete and upsert columns are declared by property name and
        // stored as column keys.
        let column_key = |name: &str, what: &str| {
            properties
                .get(name)
                .and_then(PropertyDefinition::as_column)
                .map(|column| column.key.clone())
                .ok_or_else(|| {
                    invalid(
                        StructureErrorKind::UnknownProperty,
                        format!("{what} column `{name}` is not a declared column"),
                    )
                })
        };

        let soft_delete = match soft_delete {
            Some(name) => Some(column_key(&name, "soft delete")?),
            None => parent
                .as_ref()
                .and_then(|parent| parent.soft_delete_column().map(str::to_string)),
        };

        let on_duplicate_key_update = on_duplicate_key_update
            .map(|names| {
                names
                    .iter()
                    .map(|name| column_key(name, "upsert"))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let connection_id = connection.or_else(|| {
            parent
                .as_ref()
                .and_then(|parent| parent.connection_id().map(str::to_string))
        });

        Ok(Structure {
            model_type,
            model_name,
            table,
            connection_id,
            primary_key,
            properties,
            aliases,
            polymorphic,
            soft_delete_column: soft_delete,
            on_duplicate_key_update,
            parent,
            relations: RelationCache::default(),
        })
    }
}

fn validate_relation(name: &str, relation: &RelationDefinition) -> std::result::Result<(), String> {
    match relation.kind {
        RelationKind::MorphTo if relation.morph_map.is_empty() => {
            Err(format!("relation `{name}` maps no target types"))
        }
        RelationKind::Custom if relation.handler.is_none() => {
            Err(format!("relation `{name}` has no handler"))
        }
        RelationKind::BelongsTo
        | RelationKind::HasOne
        | RelationKind::HasMany
        | RelationKind::BelongsToMany
            if relation.target.is_none() =>
        {
            Err(format!("relation `{name}` has no target"))
        }
        _ => Ok(()),
    }
}

impl PropertyBuilder<'_> {
    /// An alternative name the property answers to.
    pub fn alias(self, alias: &str) -> Self {
        self.property.alias = Some(alias.to_string());
        self
    }

    /// Excluded from exports.
    pub fn hidden(self) -> Self {
        self.property.is_hidden = true;
        self
    }

    /// Included in exports. Macros are not exported unless visible.
    pub fn visible(self) -> Self {
        self.property.is_visible = true;
        self
    }

    /// Name of the stored column when it differs from the property name.
    pub fn key(self, key: &str) -> Self {
        self.with_column(|column| column.key = key.to_string())
    }

    pub fn primary_key(self) -> Self {
        self.with_column(|column| column.is_primary_key = true)
    }

    pub fn computed(self) -> Self {
        self.with_column(|column| column.is_computed = true)
    }

    pub fn default(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.with_column(|column| column.default = Some(value))
    }

    pub fn caster(self, caster: impl Caster + 'static) -> Self {
        self.with_column(|column| column.caster = Some(Arc::new(caster)))
    }

    fn with_column(self, f: impl FnOnce(&mut ColumnDefinition)) -> Self {
        if let PropertyKind::Column(column) = &mut self.property.kind {
            f(column);
        }
        self
    }
}

impl RelationBuilder<'_> {
    /// Key column on the owner.
    pub fn local_key(self, column: &str) -> Self {
        self.with(|relation| relation.local_key = Some(column.to_string()))
    }

    /// Key column on the target.
    pub fn foreign_key(self, column: &str) -> Self {
        self.with(|relation| relation.foreign_key = Some(column.to_string()))
    }

    /// Pivot table of a `belongs_to_many` relation.
    pub fn pivot(self, table: &str) -> Self {
        self.with(|relation| {
            if let Some(pivot) = &mut relation.pivot {
                pivot.table = Some(table.to_string());
            }
        })
    }

    /// Pivot columns pointing at the owner and at the target.
    pub fn pivot_keys(self, local: &str, foreign: &str) -> Self {
        self.with(|relation| {
            if let Some(pivot) = &mut relation.pivot {
                pivot.local_key = Some(local.to_string());
                pivot.foreign_key = Some(foreign.to_string());
            }
        })
    }

    /// Maps a type column value to a target model of a `morph_to` relation.
    pub fn morph<T: Model>(self, type_value: &str) -> Self {
        self.with(|relation| {
            relation
                .morph_map
                .insert(type_value.to_string(), Target::of::<T>());
        })
    }

    /// Load the relation whenever no explicit relation list is requested.
    pub fn eager(self) -> Self {
        self.with(|relation| relation.eager = true)
    }

    pub fn hidden(self) -> Self {
        self.property.is_hidden = true;
        self
    }

    fn with(self, f: impl FnOnce(&mut RelationDefinition)) -> Self {
        if let PropertyKind::Relation(relation) = &mut self.property.kind {
            f(relation);
        }
        self
    }
}

impl PolymorphicBuilder<'_> {
    /// Rows whose discriminator equals `value` are materialized as `T`.
    pub fn subtype<T: Model>(self, value: &str) -> Self {
        if let PropertyKind::Polymorphic(definition) = &mut self.property.kind {
            definition.map.insert(value.to_string(), Target::of::<T>());
        }
        self
    }
}
