use super::{eager, has_many::HasMany, Related, Relation};
use crate::{schema::RelationDefinition, Db, Instance, ModelQuery, Structure};

use strata_core::Result;

/// The target holds the key of its owner; at most one target per owner.
///
/// Keys default as for [`HasMany`].
#[derive(Debug)]
pub struct HasOne {
    inner: HasMany,
}

impl HasOne {
    pub(crate) fn new(
        owner: &Structure,
        name: &str,
        definition: &RelationDefinition,
    ) -> Result<HasOne> {
        Ok(HasOne {
            inner: HasMany::new(owner, name, definition)?,
        })
    }
}

impl Relation for HasOne {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn definition(&self) -> &RelationDefinition {
        self.inner.definition()
    }

    fn keys(&self) -> (&str, &str) {
        self.inner.keys()
    }

    fn fetch(&self, db: &Db, owner: &Instance) -> Result<Related> {
        let Some(query) = self.inner.scoped(db, owner)? else {
            return Ok(Related::One(None));
        };

        Ok(Related::One(query.limit(1).fetch_instances()?.into_iter().next()))
    }

    fn query(&self, db: &Db, owner: &Instance) -> Result<ModelQuery<Instance>> {
        self.inner.query(db, owner)
    }

    fn raw_query(&self, db: &Db) -> Result<ModelQuery<Instance>> {
        self.inner.raw_query(db)
    }

    fn eager_load(&self, db: &Db, instances: &mut [&mut Instance]) -> Result<()> {
        let groups = self.inner.load_groups(db, instances)?;

        for owner in instances.iter_mut() {
            let key = owner.column_value(self.inner.local_key())?;
            let related = groups.get(&key).and_then(|group| group.first().cloned());
            owner.set_related(self.name(), Related::One(related));
        }

        eager::trace_done(self.name(), instances.len());
        Ok(())
    }
}
