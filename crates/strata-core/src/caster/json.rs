use super::Caster;
use crate::{stmt::Value, Error, PropertyBag, Result};

/// Stores JSON documents as text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCaster;

impl Caster for JsonCaster {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Json(v) => Ok(Value::Json(v)),
            Value::String(v) => serde_json::from_str(&v)
                .map(Value::Json)
                .map_err(|err| Error::caster(format!("invalid JSON document: {err}"))),
            other => Err(Error::caster(format!(
                "cannot decode {} as JSON",
                other.type_name()
            ))),
        }
    }

    fn encode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bytes(_) => Err(Error::caster("cannot encode bytes as JSON")),
            other => Ok(Value::String(other.to_json().to_string())),
        }
    }
}
