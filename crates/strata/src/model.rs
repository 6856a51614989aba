use crate::{schema::Builder, Instance, Structure};

use std::sync::Arc;
use strata_core::{stmt::Value, Result};

/// A typed model backed by an [`Instance`].
///
/// ```ignore
/// struct User(Instance);
///
/// impl Model for User {
///     fn define(model: &mut Builder) {
///         model.primary_key("id");
///         model.column("name");
///         model.has_many::<Post>("posts");
///     }
///
///     fn from_instance(instance: Instance) -> Result<Self> {
///         Ok(User(instance))
///     }
///
///     fn into_instance(self) -> Instance {
///         self.0
///     }
///
///     fn instance(&self) -> &Instance {
///         &self.0
///     }
///
///     fn instance_mut(&mut self) -> &mut Instance {
///         &mut self.0
///     }
/// }
/// ```
pub trait Model: Sized + Send + Sync + 'static {
    /// Declares the table, properties and relations of the model.
    ///
    /// Called once, the first time the structure of the model is needed.
    fn define(model: &mut Builder);

    fn from_instance(instance: Instance) -> Result<Self>;

    fn into_instance(self) -> Instance;

    fn instance(&self) -> &Instance;

    fn instance_mut(&mut self) -> &mut Instance;

    fn structure() -> Result<Arc<Structure>> {
        Structure::of::<Self>()
    }

    /// A new, unsaved model with every column at its default.
    fn new() -> Result<Self> {
        Self::from_instance(Self::structure()?.new_instance())
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.instance().get(key)
    }

    fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.instance_mut().set(key, value.into())
    }
}
