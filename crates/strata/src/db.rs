mod builder;
pub use builder::Builder;

mod persist;

use crate::{Instance, Model, ModelList, ModelQuery};

use indexmap::IndexMap;
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError, RwLock},
};
use strata_core::{stmt::Value, Connection, Error, Result};
use strata_sql::Condition;

/// Opens a connection when it is first needed.
pub type ConnectionFactory = Box<dyn Fn() -> Result<Arc<dyn Connection>> + Send + Sync>;

/// Connection id used when a model does not name one.
pub const DEFAULT_CONNECTION: &str = "default";

/// Shared state between all `Db` clones.
pub(crate) struct Shared {
    connections: RwLock<IndexMap<String, Arc<Entry>>>,
    default: String,
}

/// A registered connection, opened on first use.
struct Entry {
    factory: ConnectionFactory,
    connection: Mutex<Option<Arc<dyn Connection>>>,
}

impl Entry {
    /// Returns the open connection or opens it. A failed attempt is not
    /// remembered; the next call tries again.
    fn get(&self, id: &str) -> Result<Arc<dyn Connection>> {
        let mut slot = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(connection) = &*slot {
            return Ok(connection.clone());
        }

        let connection = (self.factory)().map_err(|err| {
            err.context(Error::connection(format!("cannot open connection `{id}`")))
        })?;
        tracing::debug!(id, backend = ?connection.backend(), "strata.connect");

        *slot = Some(connection.clone());
        Ok(connection)
    }
}

/// A registry of named connections, shared by every clone of the handle.
#[derive(Clone)]
pub struct Db {
    shared: Arc<Shared>,
}

impl Db {
    pub fn builder() -> Builder {
        Builder::default()
    }

    fn from_parts(connections: IndexMap<String, ConnectionFactory>, default: String) -> Db {
        let connections = connections
            .into_iter()
            .map(|(id, factory)| {
                let entry = Entry {
                    factory,
                    connection: Mutex::new(None),
                };
                (id, Arc::new(entry))
            })
            .collect();

        Db {
            shared: Arc::new(Shared {
                connections: RwLock::new(connections),
                default,
            }),
        }
    }

    // ===== Registry =====

    /// Registers `factory` under `id`, replacing any earlier registration
    /// and its open connection.
    pub fn register(
        &self,
        id: &str,
        factory: impl Fn() -> Result<Arc<dyn Connection>> + Send + Sync + 'static,
    ) {
        let entry = Entry {
            factory: Box::new(factory),
            connection: Mutex::new(None),
        };

        self.shared
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::new(entry));
    }

    /// Registers an already open connection under `id`.
    pub fn register_connection(&self, id: &str, connection: Arc<dyn Connection>) {
        self.register(id, move || Ok(connection.clone()));
    }

    /// Removes `id` from the registry. Returns `false` if it was not
    /// registered.
    pub fn unregister(&self, id: &str) -> bool {
        self.shared
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(id)
            .is_some()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.shared
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// The id used when none is given.
    pub fn default_connection_id(&self) -> &str {
        &self.shared.default
    }

    /// The connection registered as `id`, or the default connection.
    pub fn connection(&self, id: Option<&str>) -> Result<Arc<dyn Connection>> {
        let id = id.unwrap_or(&self.shared.default);

        let entry = self
            .shared
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| Error::connection(format!("no connection registered as `{id}`")))?;

        entry.get(id)
    }

    pub fn default_connection(&self) -> Result<Arc<dyn Connection>> {
        self.connection(None)
    }

    // ===== Transactions =====

    /// Runs `f` inside a transaction on the default connection.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back when it
    /// returns `Err`.
    pub fn transaction<T>(&self, f: impl FnOnce(&Db) -> Result<T>) -> Result<T> {
        self.transaction_on(None, f)
    }

    pub fn transaction_on<T>(
        &self,
        id: Option<&str>,
        f: impl FnOnce(&Db) -> Result<T>,
    ) -> Result<T> {
        let connection = self.connection(id)?;
        connection.begin()?;

        match f(self) {
            Ok(value) => {
                connection.commit()?;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(error = %err, "strata.transaction rolled back");

                if let Err(rollback) = connection.rollback() {
                    return Err(err.context(rollback));
                }
                Err(err)
            }
        }
    }

    // ===== Models =====

    /// The record of `M` with primary key `key`. A list value matches a
    /// composite key column by column.
    pub fn find<M: Model>(&self, key: impl Into<Value>) -> Result<M> {
        let structure = M::structure()?;
        let grammar = structure.grammar(self)?;

        let values = match key.into() {
            Value::List(values) => values,
            value => vec![value],
        };
        if values.len() != structure.primary_key().len() {
            return Err(Error::query(format!(
                "{} has a primary key of {} columns, got {} values",
                structure.model_name(),
                structure.primary_key().len(),
                values.len()
            )));
        }

        let condition = Condition::all(
            structure
                .primary_key()
                .iter()
                .zip(values)
                .map(|(key, value)| Condition::eq(structure.column_literal(grammar, key, None), value)),
        );

        self.query::<M>()?
            .where_(condition)
            .first()?
            .ok_or_else(|| Error::not_found(format!("no {} with that key", structure.model_name())))
    }

    pub fn all<M: Model>(&self) -> Result<ModelList<M>> {
        self.query::<M>()?.all()
    }

    pub fn query<M: Model>(&self) -> Result<ModelQuery<M>> {
        ModelQuery::new(self)
    }

    /// Inserts a new model or writes the changed columns of a loaded one.
    pub fn save<M: Model>(&self, model: &mut M) -> Result<()> {
        self.save_instance(model.instance_mut())
    }

    /// Deletes a loaded model. Models with a soft delete column are only
    /// marked as deleted.
    pub fn delete<M: Model>(&self, model: &mut M) -> Result<()> {
        self.delete_instance(model.instance_mut())
    }

    pub fn save_instance(&self, instance: &mut Instance) -> Result<()> {
        persist::save(self, instance)
    }

    pub fn delete_instance(&self, instance: &mut Instance) -> Result<()> {
        persist::delete(self, instance)
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connections = self
            .shared
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        f.debug_struct("Db")
            .field("connections", &connections.keys().collect::<Vec<_>>())
            .field("default", &self.shared.default)
            .finish()
    }
}
