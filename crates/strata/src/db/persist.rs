use super::Db;
use crate::{Instance, Structure};

use strata_core::{err, stmt::Value, Error, PropertyBag, Result};
use strata_sql::Query;

pub(super) fn save(db: &Db, instance: &mut Instance) -> Result<()> {
    let structure = instance.structure().clone();

    let result = if instance.is_persisted() {
        update(db, &structure, instance)
    } else {
        insert(db, &structure, instance)
    };

    result.map_err(|err| err.context(err!("saving {}", structure.model_name())))
}

pub(super) fn delete(db: &Db, instance: &mut Instance) -> Result<()> {
    let structure = instance.structure().clone();

    let result = match structure.soft_delete_column() {
        Some(column) => soft_delete(db, &structure, instance, column),
        None => hard_delete(db, &structure, instance),
    };

    result.map_err(|err| err.context(err!("deleting {}", structure.model_name())))
}

/// The stored form of the column property `name`.
fn encode(structure: &Structure, instance: &Instance, name: &str, value: Value) -> Result<Value> {
    let caster = structure
        .get_property(name)?
        .as_column()
        .and_then(|column| column.caster.clone());

    match caster {
        Some(caster) => caster
            .encode(value, Some(instance as &dyn PropertyBag))
            .map_err(|err| err.context(err!("encoding `{name}`"))),
        None => Ok(value),
    }
}

fn insert(db: &Db, structure: &Structure, instance: &mut Instance) -> Result<()> {
    let mut columns = vec![];
    let mut values = vec![];

    for (property, column) in structure.columns() {
        if column.is_computed {
            continue;
        }

        let value = instance.column_value(&column.key)?;
        // Left to the database, e.g. auto increment keys
        if column.is_primary_key && value.is_null() {
            continue;
        }

        values.push(encode(structure, instance, &property.name, value)?);
        columns.push(column.key.as_str());
    }

    let connection = db.connection(structure.connection_id())?;
    let backend = connection.backend();
    let mut query = Query::new(connection.clone())
        .insert_into(structure.table_name(), &columns)
        .values(values);

    if let Some(update) = structure.on_duplicate_key_update() {
        if backend.supports_upsert_on_duplicate_key() {
            let update: Vec<&str> = update.iter().map(String::as_str).collect();
            query = query.on_duplicate_key_update(&update);
        }
    }

    query.execute()?;

    if let [key] = structure.primary_key() {
        if instance.column_value(key)?.is_null() {
            let id = connection.last_insert_id()?;
            instance.set_column_value(key, id)?;
        }
    }

    instance.mark_saved();
    Ok(())
}

fn update(db: &Db, structure: &Structure, instance: &mut Instance) -> Result<()> {
    let modified: Vec<String> = instance.modified().into_iter().map(str::to_string).collect();
    if modified.is_empty() {
        return Ok(());
    }

    let connection = db.connection(structure.connection_id())?;
    let mut query = Query::new(connection).update(structure.table_name());
    let grammar = query.grammar();
    let mut columns = 0;

    for name in &modified {
        let Some(column) = structure.get_property(name)?.as_column() else {
            continue;
        };
        if column.is_computed {
            continue;
        }

        let value = encode(structure, instance, name, instance.get(name)?)?;
        query = query.set(&column.key, value);
        columns += 1;
    }

    // Only computed or relation properties changed
    if columns == 0 {
        instance.mark_saved();
        return Ok(());
    }

    let affected = query
        .where_(structure.primary_key_condition(grammar, instance)?)
        .execute()?;
    tracing::debug!(model = structure.model_name(), columns, affected, "strata.update");

    instance.mark_saved();
    Ok(())
}

fn soft_delete(db: &Db, structure: &Structure, instance: &mut Instance, column: &str) -> Result<()> {
    if !instance.is_persisted() {
        return Err(Error::query("cannot delete a record that was never saved"));
    }

    let now = Value::from(chrono::Utc::now().naive_utc());
    let name = structure
        .column_property(column)
        .map(|property| property.name.clone())
        .ok_or_else(|| Error::unknown_property(structure.model_name(), column))?;
    let stored = encode(structure, instance, &name, now.clone())?;

    let connection = db.connection(structure.connection_id())?;
    let query = Query::new(connection);
    let grammar = query.grammar();
    query
        .update(structure.table_name())
        .set(column, stored)
        .where_(structure.primary_key_condition(grammar, instance)?)
        .execute()?;

    instance.set_column_value(column, now)?;
    instance.mark_saved();
    instance.mark_deleted();
    Ok(())
}

fn hard_delete(db: &Db, structure: &Structure, instance: &mut Instance) -> Result<()> {
    if !instance.is_persisted() {
        return Err(Error::query("cannot delete a record that was never saved"));
    }

    let connection = db.connection(structure.connection_id())?;
    let query = Query::new(connection);
    let grammar = query.grammar();
    let affected = query
        .delete_from(structure.table_name())
        .where_(structure.primary_key_condition(grammar, instance)?)
        .execute()?;

    if affected == 0 {
        return Err(Error::not_found(format!(
            "no {} with that key",
            structure.model_name()
        )));
    }

    instance.mark_deleted();
    Ok(())
}
