//! Bidirectional transforms between stored and domain values.
//!
//! A caster is attached to a column property. Rows read from a connection
//! are decoded before they reach a model instance; values written back are
//! encoded first. Every caster passes `Null` through unchanged and bails with
//! a caster error on input outside its domain instead of coercing it.

mod boolean;
pub use boolean::BooleanCaster;

mod comma_list;
pub use comma_list::CommaListCaster;

mod datetime;
pub use datetime::DateTimeCaster;

mod enumeration;
pub use enumeration::EnumCaster;

mod json;
pub use json::JsonCaster;

use crate::{stmt::Value, PropertyBag, Result};

use std::fmt::Debug;

pub trait Caster: Debug + Send + Sync {
    /// Name used when the owning property is serialized for introspection.
    fn name(&self) -> &'static str;

    /// Converts a stored value into its domain representation.
    ///
    /// `cx` is the owning instance for instance-aware casters.
    fn decode(&self, value: Value, cx: Option<&dyn PropertyBag>) -> Result<Value>;

    /// Converts a domain value into its stored representation.
    fn encode(&self, value: Value, cx: Option<&dyn PropertyBag>) -> Result<Value>;
}
