use super::Caster;
use crate::{stmt::Value, Error, PropertyBag, Result};

/// Stores a list of scalars as a comma separated string.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommaListCaster;

impl Caster for CommaListCaster {
    fn name(&self) -> &'static str {
        "comma_list"
    }

    fn decode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::List(items) => Ok(Value::List(items)),
            Value::String(v) if v.is_empty() => Ok(Value::List(vec![])),
            Value::String(v) => Ok(Value::List(
                v.split(',').map(|item| Value::from(item.trim())).collect(),
            )),
            other => Err(Error::caster(format!(
                "cannot decode {} as a comma separated list",
                other.type_name()
            ))),
        }
    }

    fn encode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        let items = match value {
            Value::Null => return Ok(Value::Null),
            Value::List(items) => items,
            other => {
                return Err(Error::caster(format!(
                    "cannot encode {} as a comma separated list",
                    other.type_name()
                )))
            }
        };

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::String(v) | Value::Enum(v) if v.contains(',') => {
                    return Err(Error::caster(format!(
                        "list item `{v}` contains the separator"
                    )))
                }
                Value::String(v) | Value::Enum(v) => parts.push(v),
                Value::I64(v) => parts.push(v.to_string()),
                Value::F64(v) => parts.push(v.to_string()),
                other => {
                    return Err(Error::caster(format!(
                        "{} cannot be stored in a comma separated list",
                        other.type_name()
                    )))
                }
            }
        }

        Ok(Value::String(parts.join(",")))
    }
}
