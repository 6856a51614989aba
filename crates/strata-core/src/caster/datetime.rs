use super::Caster;
use crate::{stmt::Value, Error, PropertyBag, Result};

use chrono::{DateTime, NaiveDateTime};

/// Stores timestamps as formatted text.
///
/// Integers are accepted on decode and read as unix timestamps.
#[derive(Debug, Clone, Copy)]
pub struct DateTimeCaster {
    format: &'static str,
}

impl DateTimeCaster {
    pub const DEFAULT_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub const fn new() -> DateTimeCaster {
        DateTimeCaster {
            format: Self::DEFAULT_FORMAT,
        }
    }

    pub const fn with_format(format: &'static str) -> DateTimeCaster {
        DateTimeCaster { format }
    }
}

impl Default for DateTimeCaster {
    fn default() -> Self {
        DateTimeCaster::new()
    }
}

impl Caster for DateTimeCaster {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn decode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Timestamp(v) => Ok(Value::Timestamp(v)),
            Value::String(v) => NaiveDateTime::parse_from_str(&v, self.format)
                .map(Value::Timestamp)
                .map_err(|err| Error::caster(format!("`{v}` is not a valid date: {err}"))),
            Value::I64(v) => DateTime::from_timestamp(v, 0)
                .map(|date| Value::Timestamp(date.naive_utc()))
                .ok_or_else(|| Error::caster(format!("{v} is out of range for a timestamp"))),
            other => Err(Error::caster(format!(
                "cannot decode {} as a timestamp",
                other.type_name()
            ))),
        }
    }

    fn encode(&self, value: Value, _cx: Option<&dyn PropertyBag>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Timestamp(v) => Ok(Value::String(v.format(self.format).to_string())),
            other => Err(Error::caster(format!(
                "cannot encode {} as a timestamp",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn decode_text() {
        let value = DateTimeCaster::new()
            .decode(Value::from("2024-03-01 12:00:00"), None)
            .unwrap();
        assert_eq!(value, Value::Timestamp(noon()));
    }

    #[test]
    fn decode_unix_timestamp() {
        let value = DateTimeCaster::new().decode(Value::I64(0), None).unwrap();
        assert_eq!(
            value,
            Value::Timestamp(DateTime::from_timestamp(0, 0).unwrap().naive_utc())
        );
    }

    #[test]
    fn encode_with_custom_format() {
        let value = DateTimeCaster::with_format("%d/%m/%Y")
            .encode(Value::Timestamp(noon()), None)
            .unwrap();
        assert_eq!(value, Value::from("01/03/2024"));
    }

    #[test]
    fn bail_on_invalid_text() {
        let err = DateTimeCaster::new()
            .decode(Value::from("yesterday"), None)
            .unwrap_err();
        assert!(err.is_caster());
    }
}
