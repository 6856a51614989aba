use super::{Related, Relation};
use crate::{schema::RelationDefinition, Db, Instance, ModelQuery};

use std::{fmt, sync::Arc};
use strata_core::{Error, Result};

/// User supplied loading logic for a relation declared with
/// [`Builder::custom_relation`](crate::schema::Builder::custom_relation).
///
/// Only [`fetch`](RelationHandler::fetch) and
/// [`query`](RelationHandler::query) are required. Without an override,
/// eager loading fetches every owner separately.
pub trait RelationHandler: fmt::Debug + Send + Sync {
    fn fetch(&self, db: &Db, owner: &Instance) -> Result<Related>;

    fn query(&self, db: &Db, owner: &Instance) -> Result<ModelQuery<Instance>>;

    fn raw_query(&self, _db: &Db) -> Result<ModelQuery<Instance>> {
        Err(Error::relation("custom relation has no unscoped query"))
    }

    fn eager_load(&self, db: &Db, name: &str, instances: &mut [&mut Instance]) -> Result<()> {
        for owner in instances.iter_mut() {
            let related = self.fetch(db, owner)?;
            owner.set_related(name, related);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Custom {
    name: String,
    definition: RelationDefinition,
    handler: Arc<dyn RelationHandler>,
}

impl Custom {
    pub(crate) fn new(name: &str, definition: &RelationDefinition) -> Result<Custom> {
        let Some(handler) = definition.handler.clone() else {
            return Err(Error::relation(format!(
                "custom relation `{name}` has no handler"
            )));
        };

        Ok(Custom {
            name: name.to_string(),
            definition: definition.clone(),
            handler,
        })
    }
}

impl Relation for Custom {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> &RelationDefinition {
        &self.definition
    }

    fn keys(&self) -> (&str, &str) {
        (
            self.definition.local_key.as_deref().unwrap_or_default(),
            self.definition.foreign_key.as_deref().unwrap_or_default(),
        )
    }

    fn fetch(&self, db: &Db, owner: &Instance) -> Result<Related> {
        self.handler.fetch(db, owner)
    }

    fn query(&self, db: &Db, owner: &Instance) -> Result<ModelQuery<Instance>> {
        self.handler.query(db, owner)
    }

    fn raw_query(&self, db: &Db) -> Result<ModelQuery<Instance>> {
        self.handler.raw_query(db)
    }

    fn eager_load(&self, db: &Db, instances: &mut [&mut Instance]) -> Result<()> {
        self.handler.eager_load(db, &self.name, instances)
    }
}
