use super::Structure;
use crate::Model;

use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, LazyLock, OnceLock, PoisonError, RwLock},
};
use strata_core::Result;

type Cell = Arc<OnceLock<Result<Arc<Structure>>>>;

/// Discovered structures by model type, including failed discoveries.
static STRUCTURES: LazyLock<RwLock<HashMap<TypeId, Cell>>> = LazyLock::new(Default::default);

/// Returns the structure of `M`, discovering it on first use.
///
/// The map lock is only held to find or insert the cell of `M`; discovery
/// runs inside the cell so concurrent first callers wait for the same
/// result, and discoveries of other models (parents, relation targets) can
/// proceed meanwhile.
pub(super) fn structure_of<M: Model>() -> Result<Arc<Structure>> {
    cell(TypeId::of::<M>())
        .get_or_init(discover::<M>)
        .clone()
}

fn cell(type_id: TypeId) -> Cell {
    if let Some(cell) = STRUCTURES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
    {
        return cell.clone();
    }

    STRUCTURES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(type_id)
        .or_default()
        .clone()
}

fn discover<M: Model>() -> Result<Arc<Structure>> {
    match Structure::builder::<M>().build() {
        Ok(structure) => {
            tracing::debug!(
                model = structure.model_name(),
                table = structure.table_name(),
                properties = structure.properties.len(),
                "strata.structure"
            );
            Ok(Arc::new(structure))
        }
        Err(err) => {
            tracing::debug!(model = super::model_name::<M>(), error = %err, "strata.structure failed");
            Err(err)
        }
    }
}
