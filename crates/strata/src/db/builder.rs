use super::{ConnectionFactory, Db, DEFAULT_CONNECTION};

use indexmap::IndexMap;
use std::sync::Arc;
use strata_core::{Connection, Result};

/// Configures the connections of a [`Db`].
///
/// ```ignore
/// let db = Db::builder()
///     .connection("default", || Ok(Arc::new(open_primary()?)))
///     .connection("reports", || Ok(Arc::new(open_replica()?)))
///     .build();
/// ```
#[derive(Default)]
pub struct Builder {
    connections: IndexMap<String, ConnectionFactory>,
    default: Option<String>,
}

impl Builder {
    /// Registers a connection opened by `factory` on first use.
    pub fn connection(
        &mut self,
        id: &str,
        factory: impl Fn() -> Result<Arc<dyn Connection>> + Send + Sync + 'static,
    ) -> &mut Self {
        self.connections.insert(id.to_string(), Box::new(factory));
        self
    }

    /// The id used by models that do not name a connection. Defaults to
    /// `"default"`.
    pub fn default_connection(&mut self, id: &str) -> &mut Self {
        self.default = Some(id.to_string());
        self
    }

    pub fn build(&mut self) -> Db {
        let default = self
            .default
            .take()
            .unwrap_or_else(|| DEFAULT_CONNECTION.to_string());
        Db::from_parts(std::mem::take(&mut self.connections), default)
    }
}
