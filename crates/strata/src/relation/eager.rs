use crate::{Db, Instance, Structure};

use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use strata_core::{stmt::Value, Result};

/// Distinct non-null values of the column `key` across `instances`, in
/// first-seen order.
pub(super) fn distinct_keys<'a>(
    instances: impl IntoIterator<Item = &'a Instance>,
    key: &str,
) -> Result<Vec<Value>> {
    let mut keys = IndexSet::new();
    for instance in instances {
        let value = instance.column_value(key)?;
        if !value.is_null() {
            keys.insert(value);
        }
    }
    Ok(keys.into_iter().collect())
}

pub(super) fn trace_batch(relation: &str, keys: usize) {
    tracing::debug!(relation, keys, "strata.eager_load");
}

pub(super) fn trace_done(relation: &str, owners: usize) {
    tracing::trace!(relation, owners, "strata.eager_load done");
}

fn head(name: &str) -> &str {
    name.split_once('.').map_or(name, |(head, _)| head)
}

/// Requested relation names grouped by their first segment.
///
/// `["posts.comments", "posts.tags", "author"]` becomes
/// `{posts: [comments, tags], author: []}`.
fn plan<'a>(
    structure: &Structure,
    enabled: &[&'a str],
    disabled: &[&str],
) -> IndexMap<String, Vec<&'a str>> {
    let mut plan: IndexMap<String, Vec<&'a str>> = IndexMap::new();

    let is_disabled = |name: &str| {
        disabled.iter().any(|disabled| {
            name == *disabled
                || name
                    .strip_prefix(*disabled)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    };

    if enabled.is_empty() {
        for property in structure.relations() {
            let eager = property.as_relation().is_some_and(|relation| relation.eager);
            if eager && !is_disabled(&property.name) {
                plan.entry(property.name.clone()).or_default();
            }
        }
        return plan;
    }

    for name in enabled {
        if is_disabled(name) {
            continue;
        }
        match name.split_once('.') {
            Some((head, rest)) => plan.entry(head.to_string()).or_default().push(rest),
            None => {
                plan.entry(name.to_string()).or_default();
            }
        }
    }
    plan
}

/// Loads relations on instances that all share `structure`.
pub(crate) fn load_relations(
    structure: &Structure,
    db: &Db,
    instances: &mut [&mut Instance],
    enabled: &[&str],
    disabled: &[&str],
) -> Result<()> {
    if instances.is_empty() {
        return Ok(());
    }

    for (name, nested) in plan(structure, enabled, disabled) {
        structure.eager_load_relation(db, &name, instances)?;

        if nested.is_empty() {
            continue;
        }

        let relation = structure.get_relation(&name)?;
        let children = instances
            .iter_mut()
            .flat_map(|instance| instance.related_instances_mut(relation.name()))
            .collect();
        load_mixed(db, children, &nested, &[])?;
    }

    Ok(())
}

/// Loads relations on instances of possibly different structures, such as
/// the subtypes of a polymorphic model. Each structure is loaded as one
/// batch.
///
/// A name only has to exist on one of the structures; the others skip it.
pub(crate) fn load_mixed(
    db: &Db,
    instances: Vec<&mut Instance>,
    enabled: &[&str],
    disabled: &[&str],
) -> Result<()> {
    let mut groups: IndexMap<*const Structure, (Arc<Structure>, Vec<&mut Instance>)> =
        IndexMap::new();
    for instance in instances {
        let structure = instance.structure().clone();
        groups
            .entry(Arc::as_ptr(&structure))
            .or_insert_with(|| (structure, vec![]))
            .1
            .push(instance);
    }

    if groups.len() == 1 {
        if let Some((_, (structure, mut instances))) = groups.pop() {
            return load_relations(&structure, db, &mut instances, enabled, disabled);
        }
    }

    for name in enabled {
        let relation = head(name);
        let known = groups
            .values()
            .any(|(structure, _)| structure.has_property(relation));
        if !known {
            if let Some((structure, _)) = groups.values().next() {
                structure.get_property(relation)?;
            }
        }
    }

    for (structure, mut instances) in groups.into_values() {
        let own: Vec<&str> = enabled
            .iter()
            .copied()
            .filter(|name| structure.has_property(head(name)))
            .collect();

        // An empty list would mean the eager-by-default relations
        if own.is_empty() && !enabled.is_empty() {
            continue;
        }
        load_relations(&structure, db, &mut instances, &own, disabled)?;
    }

    Ok(())
}
