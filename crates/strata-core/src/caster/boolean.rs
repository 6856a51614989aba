use super::Caster;
use crate::{stmt::Value, Error, PropertyBag, Result};

/// Stores booleans as `0`/`1` integers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanCaster;

impl Caster for BooleanCaster {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn decode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        Ok(match value {
            Value::Null => Value::Null,
            Value::Bool(v) => Value::Bool(v),
            Value::I64(v) => Value::Bool(v != 0),
            Value::F64(v) => Value::Bool(v != 0.0),
            Value::String(ref v) => match v.as_str() {
                "1" | "true" => Value::Bool(true),
                "0" | "false" | "" => Value::Bool(false),
                other => {
                    return Err(Error::caster(format!(
                        "`{other}` is not a boolean"
                    )))
                }
            },
            other => {
                return Err(Error::caster(format!(
                    "cannot decode {} as boolean",
                    other.type_name()
                )))
            }
        })
    }

    fn encode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        Ok(match value {
            Value::Null => Value::Null,
            Value::Bool(v) => Value::I64(i64::from(v)),
            Value::I64(v) => Value::I64(i64::from(v != 0)),
            other => {
                return Err(Error::caster(format!(
                    "cannot encode {} as boolean",
                    other.type_name()
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_truthy_values() {
        let caster = BooleanCaster;

        assert_eq!(caster.decode(Value::I64(1), None).unwrap(), Value::Bool(true));
        assert_eq!(caster.decode(Value::from("1"), None).unwrap(), Value::Bool(true));
        assert_eq!(caster.decode(Value::I64(0), None).unwrap(), Value::Bool(false));
        assert_eq!(caster.decode(Value::Null, None).unwrap(), Value::Null);
    }

    #[test]
    fn encode_as_integer() {
        let caster = BooleanCaster;

        assert_eq!(caster.encode(Value::Bool(true), None).unwrap(), Value::I64(1));
        assert_eq!(caster.encode(Value::Bool(false), None).unwrap(), Value::I64(0));
    }

    #[test]
    fn bail_on_garbage() {
        let err = BooleanCaster.decode(Value::from("maybe"), None).unwrap_err();

        assert!(err.is_caster());
        assert_eq!(err.to_string(), "caster error: `maybe` is not a boolean");
    }
}
