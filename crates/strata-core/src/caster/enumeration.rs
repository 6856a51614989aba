use super::Caster;
use crate::{stmt::Value, Error, PropertyBag, Result};

/// Restricts a string column to a fixed set of cases.
///
/// Decoded values become [`Value::Enum`]. Encoding turns them back into
/// strings, so stored cases are bound as parameters rather than written into
/// the SQL text verbatim.
#[derive(Debug, Clone, Copy)]
pub struct EnumCaster {
    name: &'static str,
    cases: &'static [&'static str],
}

impl EnumCaster {
    pub const fn new(name: &'static str, cases: &'static [&'static str]) -> EnumCaster {
        EnumCaster { name, cases }
    }

    fn check(&self, case: String) -> Result<String> {
        if self.cases.contains(&case.as_str()) {
            Ok(case)
        } else {
            Err(Error::caster(format!(
                "`{case}` is not a valid {}",
                self.name
            )))
        }
    }
}

impl Caster for EnumCaster {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn decode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(v) | Value::Enum(v) => self.check(v).map(Value::Enum),
            other => Err(Error::caster(format!(
                "cannot decode {} as {}",
                other.type_name(),
                self.name
            ))),
        }
    }

    fn encode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(v) | Value::Enum(v) => self.check(v).map(Value::String),
            other => Err(Error::caster(format!(
                "cannot encode {} as {}",
                other.type_name(),
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: EnumCaster = EnumCaster::new("Status", &["draft", "published"]);

    #[test]
    fn round_trip() {
        let decoded = STATUS.decode(Value::from("draft"), None).unwrap();
        assert_eq!(decoded, Value::Enum("draft".into()));
        assert_eq!(STATUS.encode(decoded, None).unwrap(), Value::from("draft"));
    }

    #[test]
    fn unknown_case() {
        let err = STATUS.decode(Value::from("deleted"), None).unwrap_err();
        assert_eq!(err.to_string(), "caster error: `deleted` is not a valid Status");
    }
}
