//! Runtime values seen by trigger conditions.
//!
//! A tool's output arrives as JSON and is converted once into a [`Value`]
//! before any rule of the contract runs. Conditions can only ever observe
//! these values; nothing in this module hands out a handle to the host.

use std::cmp::Ordering;
use std::fmt;

/// The closed set of functions a condition may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    All,
    Any,
    IsInstance,
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
    Min,
    Max,
    Sum,
    Abs,
}

impl Builtin {
    /// Every builtin, in documentation order.
    pub const ALL: [Builtin; 14] = [
        Builtin::Len,
        Builtin::All,
        Builtin::Any,
        Builtin::IsInstance,
        Builtin::Str,
        Builtin::Int,
        Builtin::Float,
        Builtin::Bool,
        Builtin::List,
        Builtin::Dict,
        Builtin::Min,
        Builtin::Max,
        Builtin::Sum,
        Builtin::Abs,
    ];

    /// The name conditions use to refer to this builtin.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::All => "all",
            Builtin::Any => "any",
            Builtin::IsInstance => "isinstance",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Dict => "dict",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Abs => "abs",
        }
    }

    /// Resolve a name against the allow-list.
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Whether this builtin also names a type (usable with `isinstance`).
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Builtin::Str
                | Builtin::Int
                | Builtin::Float
                | Builtin::Bool
                | Builtin::List
                | Builtin::Dict
        )
    }
}

/// A value inside the sandbox.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered key/value pairs.
    Dict(Vec<(Value, Value)>),
    Builtin(Builtin),
}

/// Numeric view of a value; booleans count as integers.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl Value {
    /// The type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Builtin(_) => "builtin",
        }
    }

    /// Truthiness: empty containers, zero, `None` and `False` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
            Value::Builtin(_) => true,
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Whether the value may be used as a dict key.
    pub(crate) fn is_hashable(&self) -> bool {
        matches!(
            self,
            Value::None
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::Str(_)
                | Value::Builtin(_)
        )
    }

    /// Equality with numeric coercion (`1 == 1.0 == True`) and
    /// order-insensitive dict comparison.
    pub fn loose_eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Int(x), Number::Int(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            };
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| dict_lookup(b, k).is_some_and(|w| v.loose_eq(w)))
            }
            _ => false,
        }
    }

    /// Ordering between comparable values.
    ///
    /// `Err(())` means the two types cannot be ordered; `Ok(None)` means
    /// they can but this pair is unordered (NaN).
    pub(crate) fn loose_cmp(&self, other: &Value) -> Result<Option<Ordering>, ()> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(match (a, b) {
                (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
                _ => a.as_f64().partial_cmp(&b.as_f64()),
            });
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.loose_eq(y) {
                        return x.loose_cmp(y);
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => Err(()),
        }
    }

    /// Quoted representation, as used inside containers.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('\'');
                for c in s.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        other => out.push(other),
                    }
                }
                out.push('\'');
                out
            }
            other => other.to_string(),
        }
    }
}

/// Find a key in dict entries, using [`Value::loose_eq`].
pub(crate) fn dict_lookup<'v>(entries: &'v [(Value, Value)], key: &Value) -> Option<&'v Value> {
    entries
        .iter()
        .find(|(k, _)| k.loose_eq(key))
        .map(|(_, v)| v)
}

/// Shortest round-tripping form. Magnitudes outside `[1e-4, 1e16)` switch to
/// exponent notation with a signed, two-digit exponent (`1e+16`, `2.5e-07`).
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let scientific = format!("{f:e}");
        let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }
    if f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Value::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k.repr(), v.repr())?;
                }
                f.write_str("}")
            }
            Value::Builtin(b) => write!(f, "<built-in {}>", b.name()),
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Dict(
                map.iter()
                    .map(|(k, v)| (Value::Str(k.clone()), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion_keeps_integers_integral() {
        let v = Value::from(json!({"count": 3, "ratio": 0.5, "tags": ["a"], "none": null}));
        let Value::Dict(entries) = v else {
            panic!("expected dict");
        };
        assert_eq!(dict_lookup(&entries, &Value::Str("count".into())), Some(&Value::Int(3)));
        assert_eq!(dict_lookup(&entries, &Value::Str("ratio".into())), Some(&Value::Float(0.5)));
        assert_eq!(dict_lookup(&entries, &Value::Str("none".into())), Some(&Value::None));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::Dict(vec![(Value::Int(1), Value::None)]).is_truthy());
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(!Value::Str("1".into()).loose_eq(&Value::Int(1)));
    }

    #[test]
    fn dict_equality_ignores_order() {
        let a = Value::from(json!({"a": 1, "b": 2}));
        let b = Value::Dict(vec![
            (Value::Str("b".into()), Value::Int(2)),
            (Value::Str("a".into()), Value::Int(1)),
        ]);
        assert!(a.loose_eq(&b));
    }

    #[test]
    fn ordering_rejects_mixed_types() {
        assert!(Value::Str("a".into()).loose_cmp(&Value::Int(1)).is_err());
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)])
                .loose_cmp(&Value::List(vec![Value::Int(1), Value::Int(3)])),
            Ok(Some(Ordering::Less))
        );
        assert_eq!(Value::Float(f64::NAN).loose_cmp(&Value::Int(1)), Ok(None));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.0001).to_string(), "0.0001");
        assert_eq!(Value::Float(9999999999999998.0).to_string(), "9999999999999998.0");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(
            Value::from(json!(["x", 1, null])).to_string(),
            "['x', 1, None]"
        );
        assert_eq!(Value::from(json!({"k": "v"})).to_string(), "{'k': 'v'}");
    }

    #[test]
    fn extreme_floats_use_exponent_notation() {
        assert_eq!(Value::Float(1e16).to_string(), "1e+16");
        assert_eq!(Value::Float(-1.5e20).to_string(), "-1.5e+20");
        assert_eq!(Value::Float(1e-5).to_string(), "1e-05");
        assert_eq!(Value::Float(2.5e-7).to_string(), "2.5e-07");
        assert_eq!(Value::Float(1e300).to_string(), "1e+300");
        assert_eq!(Value::Float(-0.0).to_string(), "-0.0");
    }

    #[test]
    fn builtin_lookup_is_closed() {
        assert_eq!(Builtin::lookup("len"), Some(Builtin::Len));
        assert_eq!(Builtin::lookup("eval"), None);
        assert_eq!(Builtin::lookup("__import__"), None);
        assert!(Builtin::Dict.is_type());
        assert!(!Builtin::Len.is_type());
    }
}
