use crate::{stmt::Value, Result};

/// Keyed access to the properties of a model instance.
///
/// Instance-aware casters receive the owning instance through this trait so
/// they can make decisions based on other columns.
pub trait PropertyBag {
    /// Returns the value of the property `key`.
    fn get(&self, key: &str) -> Result<Value>;

    /// Assigns `value` to the property `key`.
    fn set(&mut self, key: &str, value: Value) -> Result<()>;

    /// Returns `true` if the bag knows the property `key`.
    fn has(&self, key: &str) -> bool;
}
