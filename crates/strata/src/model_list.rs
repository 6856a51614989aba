use crate::{Db, Instance, Model};

use std::{ops::Index, slice, vec};
use strata_core::Result;

/// Records in the order they were loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelList<T> {
    items: Vec<T>,
}

impl<T> ModelList<T> {
    pub fn new() -> ModelList<T> {
        ModelList { items: vec![] }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl ModelList<Instance> {
    /// Eager loads `relations` (dotted names allowed) on every record.
    ///
    /// Records of different subtypes are loaded per structure.
    pub fn load(&mut self, db: &Db, relations: &[&str]) -> Result<()> {
        crate::relation::eager::load_mixed(db, self.items.iter_mut().collect(), relations, &[])
    }
}

impl<M: Model> ModelList<M> {
    /// Eager loads `relations` on every model.
    pub fn load_relations(self, db: &Db, relations: &[&str]) -> Result<ModelList<M>> {
        let mut instances: ModelList<Instance> =
            self.items.into_iter().map(Model::into_instance).collect();
        instances.load(db, relations)?;
        instances.into_iter().map(M::from_instance).collect()
    }
}

impl<T> Default for ModelList<T> {
    fn default() -> Self {
        ModelList::new()
    }
}

impl<T> From<Vec<T>> for ModelList<T> {
    fn from(items: Vec<T>) -> Self {
        ModelList { items }
    }
}

impl<T> FromIterator<T> for ModelList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ModelList {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for ModelList<T> {
    type Item = T;
    type IntoIter = vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ModelList<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut ModelList<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter_mut()
    }
}

impl<T> Index<usize> for ModelList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}
