//! Built-in scalar coercers.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use graft_core::{Error, Result, Value};
use std::fmt;

/// Input and output coercion for a scalar type.
///
/// `coerce_in` turns an external literal or variable value into the internal
/// representation; `coerce_out` turns a resolved value into a JSON-safe one.
pub trait ScalarCoercer: Send + Sync + fmt::Debug {
    /// Coerces an external value.
    fn coerce_in(&self, value: &Value) -> Result<Value>;

    /// Coerces a resolved value for output.
    fn coerce_out(&self, value: &Value) -> Result<Value>;
}

fn cannot(value: &Value, target: &str) -> Error {
    Error::coerce(format!("can not coerce {} {value} into {target}", value.kind_name()))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15).then_some(f as i64)
}

/// `Int` and `Int64`. `Int` is range checked to 32 bits.
#[derive(Debug, Clone, Copy)]
pub struct IntCoercer {
    pub wide: bool,
}

impl IntCoercer {
    fn name(self) -> &'static str {
        if self.wide {
            "Int64"
        } else {
            "Int"
        }
    }

    fn check(self, value: &Value, i: i64) -> Result<Value> {
        if self.wide || i32::try_from(i).is_ok() {
            Ok(Value::Int(i))
        } else {
            Err(Error::coerce(format!(
                "{value} is out of range for {}",
                self.name()
            )))
        }
    }
}

impl ScalarCoercer for IntCoercer {
    fn coerce_in(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => self.check(value, *i),
            Value::Float(f) => match integral(*f) {
                Some(i) => self.check(value, i),
                None => Err(cannot(value, self.name())),
            },
            _ => Err(cannot(value, self.name())),
        }
    }

    fn coerce_out(&self, value: &Value) -> Result<Value> {
        self.coerce_in(value)
    }
}

/// `Float` and `Float64`.
#[derive(Debug, Clone, Copy)]
pub struct FloatCoercer;

impl ScalarCoercer for FloatCoercer {
    fn coerce_in(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Int(_) | Value::Float(_) => {
                Ok(value.as_f64().map_or(Value::Null, Value::Float))
            }
            _ => Err(cannot(value, "Float")),
        }
    }

    fn coerce_out(&self, value: &Value) -> Result<Value> {
        self.coerce_in(value)
    }
}

/// `Boolean`.
#[derive(Debug, Clone, Copy)]
pub struct BooleanCoercer;

impl ScalarCoercer for BooleanCoercer {
    fn coerce_in(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null | Value::Bool(_) => Ok(value.clone()),
            _ => Err(cannot(value, "Boolean")),
        }
    }

    fn coerce_out(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null | Value::Bool(_) => Ok(value.clone()),
            Value::Int(i) => Ok(Value::Bool(*i != 0)),
            Value::Float(f) => Ok(Value::Bool(*f != 0.0)),
            Value::String(s) if s == "true" => Ok(Value::Bool(true)),
            Value::String(s) if s == "false" => Ok(Value::Bool(false)),
            _ => Err(cannot(value, "Boolean")),
        }
    }
}

/// `ID`. Accepts strings and integers, always produces a string.
#[derive(Debug, Clone, Copy)]
pub struct IdCoercer;

impl ScalarCoercer for IdCoercer {
    fn coerce_in(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null | Value::String(_) => Ok(value.clone()),
            Value::Int(i) => Ok(Value::String(i.to_string())),
            _ => Err(cannot(value, "ID")),
        }
    }

    fn coerce_out(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null | Value::String(_) => Ok(value.clone()),
            Value::Enum(s) => Ok(Value::String(s.clone())),
            Value::Int(i) => Ok(Value::String(i.to_string())),
            Value::Float(f) => match integral(*f) {
                Some(i) => Ok(Value::String(i.to_string())),
                None => Err(cannot(value, "ID")),
            },
            _ => Err(cannot(value, "ID")),
        }
    }
}

/// `String`. Output stringifies any scalar.
#[derive(Debug, Clone, Copy)]
pub struct StringCoercer;

impl ScalarCoercer for StringCoercer {
    fn coerce_in(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null | Value::String(_) => Ok(value.clone()),
            _ => Err(cannot(value, "String")),
        }
    }

    fn coerce_out(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null | Value::String(_) => Ok(value.clone()),
            Value::Enum(s) => Ok(Value::String(s.clone())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Int(i) => Ok(Value::String(i.to_string())),
            Value::Float(f) => Ok(Value::String(f.to_string())),
            Value::Time(t) => Ok(Value::String(graft_core::value::format_time(t))),
            _ => Err(cannot(value, "String")),
        }
    }
}

/// `Time`. Accepts epoch seconds, RFC 3339 strings, or native times and
/// always outputs an RFC 3339 string with nanosecond precision.
#[derive(Debug, Clone, Copy)]
pub struct TimeCoercer;

impl TimeCoercer {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn to_time(value: &Value) -> Result<Option<DateTime<FixedOffset>>> {
        let time = match value {
            Value::Null => return Ok(None),
            Value::Time(t) => Some(t.with_timezone(&Utc)),
            Value::Int(secs) => Utc.timestamp_opt(*secs, 0).single(),
            Value::Float(secs) => {
                let mut whole = secs.floor() as i64;
                let mut nanos = ((secs - secs.floor()) * 1e9).round() as u32;
                if nanos >= 1_000_000_000 {
                    whole += 1;
                    nanos -= 1_000_000_000;
                }
                Utc.timestamp_opt(whole, nanos).single()
            }
            Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc)),
            _ => None,
        };
        match time {
            Some(t) => Ok(Some(t.fixed_offset())),
            None => Err(cannot(value, "Time")),
        }
    }
}

impl ScalarCoercer for TimeCoercer {
    fn coerce_in(&self, value: &Value) -> Result<Value> {
        Ok(Self::to_time(value)?.map_or(Value::Null, Value::Time))
    }

    fn coerce_out(&self, value: &Value) -> Result<Value> {
        Ok(Self::to_time(value)?.map_or(Value::Null, |t| {
            Value::String(graft_core::value::format_time(&t))
        }))
    }
}

/// Identity coercion for user scalars declared in SDL.
#[derive(Debug, Clone, Copy)]
pub struct PassThrough;

impl ScalarCoercer for PassThrough {
    fn coerce_in(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }

    fn coerce_out(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int() {
        let int = IntCoercer { wide: false };
        assert_eq!(int.coerce_in(&Value::Int(3)).unwrap(), Value::Int(3));
        assert_eq!(int.coerce_in(&Value::Float(4.0)).unwrap(), Value::Int(4));
        assert!(int.coerce_in(&Value::Float(4.5)).is_err());
        assert!(int.coerce_in(&Value::from("3")).is_err());
        assert!(int.coerce_in(&Value::Int(1 << 40)).is_err());

        let wide = IntCoercer { wide: true };
        assert_eq!(wide.coerce_in(&Value::Int(1 << 40)).unwrap(), Value::Int(1 << 40));
    }

    #[test]
    fn test_float() {
        assert_eq!(FloatCoercer.coerce_in(&Value::Int(2)).unwrap(), Value::Float(2.0));
        assert_eq!(FloatCoercer.coerce_out(&Value::Float(2.5)).unwrap(), Value::Float(2.5));
        assert!(FloatCoercer.coerce_in(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_boolean_output_is_lenient() {
        assert_eq!(BooleanCoercer.coerce_out(&Value::Int(0)).unwrap(), Value::Bool(false));
        assert_eq!(BooleanCoercer.coerce_out(&Value::Int(7)).unwrap(), Value::Bool(true));
        assert_eq!(
            BooleanCoercer.coerce_out(&Value::from("true")).unwrap(),
            Value::Bool(true)
        );
        assert!(BooleanCoercer.coerce_in(&Value::Int(1)).is_err());
        assert!(BooleanCoercer.coerce_out(&Value::from("yes")).is_err());
    }

    #[test]
    fn test_id() {
        assert_eq!(IdCoercer.coerce_out(&Value::Int(123)).unwrap(), Value::from("123"));
        assert_eq!(IdCoercer.coerce_in(&Value::Int(5)).unwrap(), Value::from("5"));
        assert_eq!(IdCoercer.coerce_in(&Value::from("a1")).unwrap(), Value::from("a1"));
        assert!(IdCoercer.coerce_in(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_string() {
        assert_eq!(StringCoercer.coerce_out(&Value::Int(1)).unwrap(), Value::from("1"));
        assert_eq!(StringCoercer.coerce_out(&Value::Bool(false)).unwrap(), Value::from("false"));
        assert!(StringCoercer.coerce_in(&Value::Int(1)).is_err());
        assert!(StringCoercer.coerce_out(&Value::List(vec![])).is_err());
    }

    #[test]
    fn test_time() {
        let t = TimeCoercer.coerce_in(&Value::Int(0)).unwrap();
        assert_eq!(
            TimeCoercer.coerce_out(&t).unwrap(),
            Value::from("1970-01-01T00:00:00.000000000Z")
        );
        let t = TimeCoercer
            .coerce_in(&Value::from("2021-03-04T05:06:07.5+02:00"))
            .unwrap();
        assert_eq!(
            TimeCoercer.coerce_out(&t).unwrap(),
            Value::from("2021-03-04T03:06:07.500000000Z")
        );
        assert!(TimeCoercer.coerce_in(&Value::from("yesterday")).is_err());
    }

    #[test]
    fn test_time_fraction_rounds_up_to_next_second() {
        let rounded = TimeCoercer.coerce_in(&Value::Float(1.999_999_999_9)).unwrap();
        assert_eq!(rounded, TimeCoercer.coerce_in(&Value::Int(2)).unwrap());

        let half = TimeCoercer.coerce_in(&Value::Float(-0.5)).unwrap();
        assert_eq!(
            TimeCoercer.coerce_out(&half).unwrap(),
            Value::from("1969-12-31T23:59:59.500000000Z")
        );
    }

    #[test]
    fn test_roundtrip_preserves_values() {
        let int = IntCoercer { wide: false };
        let wide = IntCoercer { wide: true };
        let cases: Vec<(&dyn ScalarCoercer, Value)> = vec![
            (&int, Value::Int(3)),
            (&wide, Value::Int(1 << 50)),
            (&FloatCoercer, Value::Float(1.25)),
            (&BooleanCoercer, Value::Bool(true)),
            (&IdCoercer, Value::from("abc")),
            (&StringCoercer, Value::from("text")),
        ];
        for (coercer, v) in cases {
            let inner = coercer.coerce_in(&v).unwrap();
            assert_eq!(coercer.coerce_out(&inner).unwrap(), v);
            let out = coercer.coerce_out(&v).unwrap();
            assert_eq!(coercer.coerce_in(&out).unwrap(), v);
        }
    }
}
