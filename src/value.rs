// Value: the JSON-like domain filters read from and write to.
// Rc-wrapped payloads keep clones O(1) when one value fans out into many contexts.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Mapping from field name to value, iterated in insertion order.
pub type Map = IndexMap<String, Value>;

/// A JSON value with cheap clone semantics.
///
/// Arrays, objects and strings are reference counted, so copying a value into
/// several contexts never deep-copies its contents.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Object(Rc<Map>),
}

// ── Type checks ──────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Arrays and objects; the only values field access applies to.
    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// The jq name of this value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Look up `key` on an object, or on an array when `key` spells an index.
    ///
    /// Returns `None` for scalars; a missing field yields `Some(Value::Null)`.
    pub fn field(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => Some(map.get(key).cloned().unwrap_or(Value::Null)),
            Value::Array(arr) => Some(
                parse_array_key(key)
                    .and_then(|i| arr.get(i).cloned())
                    .unwrap_or(Value::Null),
            ),
            _ => None,
        }
    }

    /// Positional access on an array; negative positions count from the end.
    ///
    /// Returns `None` for non-arrays and `Some(Value::Null)` when `index`
    /// falls outside the array.
    pub fn element(&self, index: i64) -> Option<Value> {
        let arr = self.as_array()?;
        let len = arr.len() as i64;
        if index.unsigned_abs() > len as u64 || index == len {
            return Some(Value::Null);
        }
        let position = if index < 0 { len + index } else { index };
        Some(arr[position as usize].clone())
    }

    /// Half-open sub-range of an array or string.
    ///
    /// Missing bounds default to the start and end; negative bounds count from
    /// the end. Strings are measured in characters. Returns `None` when the
    /// value has no notion of a range.
    pub fn slice(&self, start: Option<i64>, end: Option<i64>) -> Option<Value> {
        match self {
            Value::Array(arr) => {
                let (from, to) = resolve_range(arr.len(), start, end);
                Some(Value::array(arr[from..to].to_vec()))
            }
            Value::String(s) => {
                let (from, to) = resolve_range(s.chars().count(), start, end);
                Some(Value::string(
                    s.chars().skip(from).take(to - from).collect::<String>(),
                ))
            }
            _ => None,
        }
    }

    /// The members one level down: array elements, or object values in
    /// insertion order. `None` for anything that cannot be iterated.
    pub fn members(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr.to_vec()),
            Value::Object(map) => Some(map.values().cloned().collect()),
            _ => None,
        }
    }
}

fn parse_array_key(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    if canonical {
        key.parse().ok()
    } else {
        None
    }
}

fn resolve_range(len: usize, start: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let clamp = |offset: i64| -> usize {
        if offset < 0 {
            (len as i64).saturating_add(offset).max(0) as usize
        } else {
            (offset as u64).min(len as u64) as usize
        }
    };
    let from = start.map_or(0, clamp);
    let to = end.map_or(len, clamp);
    (from, to.max(from))
}

// ── Constructors ─────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    #[inline]
    pub fn array(v: Vec<Value>) -> Self {
        Value::Array(Rc::new(v))
    }

    #[inline]
    pub fn object(m: Map) -> Self {
        Value::Object(Rc::new(m))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::array(v)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Value::object(m)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            // Field order is part of the value: {"a":1,"b":2} and {"b":2,"a":1}
            // render differently, so they compare unequal.
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            _ => false,
        }
    }
}

// ── Display (compact JSON) ───────────────────────────────────────────────────

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => format_number(*n, f),
            Value::String(s) => write!(f, "\"{}\"", escape_json_string(s)),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{}\":{}", escape_json_string(k), v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn escape_json_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c < '\x20' => escaped.push_str(&format!("\\u{:04x}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

fn is_integral(n: f64) -> bool {
    n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !n.is_finite() {
        write!(f, "null")
    } else if is_integral(n) && n.abs() < 1e17 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

// ── Serde ────────────────────────────────────────────────────────────────────

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if !n.is_finite() => serializer.serialize_none(),
            Value::Number(n) if is_integral(*n) => serializer.serialize_i64(*n as i64),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "any valid JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::string(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut fields = Map::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((k, v)) = map.next_entry()? {
            fields.insert(k, v);
        }
        Ok(Value::object(fields))
    }
}

impl Value {
    /// Parse a JSON document straight into a `Value`.
    pub fn from_json_str(s: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to compact JSON.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(arr) => {
                Value::array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if !n.is_finite() => serde_json::Value::Null,
            Value::Number(n) if is_integral(*n) => serde_json::json!(*n as i64),
            Value::Number(n) => serde_json::json!(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(j: serde_json::Value) -> Value {
        Value::from(j)
    }

    #[test]
    fn test_clone_shares_payload() {
        let arr = v(json!([1, 2, 3]));
        let copy = arr.clone();
        match (&arr, &copy) {
            (Value::Array(a), Value::Array(b)) => assert!(Rc::ptr_eq(a, b)),
            _ => panic!("expected arrays"),
        }
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Bool(false).type_name(), "boolean");
        assert_eq!(Value::from(1).type_name(), "number");
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(v(json!([])).type_name(), "array");
        assert_eq!(v(json!({})).type_name(), "object");
    }

    #[test]
    fn test_field_on_object_and_array() {
        let obj = v(json!({"a": 1}));
        assert_eq!(obj.field("a"), Some(Value::from(1)));
        assert_eq!(obj.field("b"), Some(Value::Null));

        let arr = v(json!(["x", "y"]));
        assert_eq!(arr.field("1"), Some(Value::from("y")));
        assert_eq!(arr.field("01"), Some(Value::Null));
        assert_eq!(arr.field("length"), Some(Value::Null));
        assert_eq!(arr.field("5"), Some(Value::Null));

        assert_eq!(Value::from(3).field("a"), None);
        assert_eq!(Value::Null.field("a"), None);
    }

    #[test]
    fn test_element_bounds() {
        let arr = v(json!([1, 2, 3]));
        assert_eq!(arr.element(0), Some(Value::from(1)));
        assert_eq!(arr.element(-1), Some(Value::from(3)));
        assert_eq!(arr.element(-3), Some(Value::from(1)));
        assert_eq!(arr.element(3), Some(Value::Null));
        assert_eq!(arr.element(-4), Some(Value::Null));
        assert_eq!(arr.element(i64::MIN), Some(Value::Null));
        assert_eq!(Value::from("abc").element(0), None);
    }

    #[test]
    fn test_slice_arrays_and_strings() {
        let arr = v(json!([0, 1, 2, 3, 4]));
        assert_eq!(arr.slice(Some(1), Some(3)), Some(v(json!([1, 2]))));
        assert_eq!(arr.slice(Some(-2), None), Some(v(json!([3, 4]))));
        assert_eq!(arr.slice(None, Some(-3)), Some(v(json!([0, 1]))));
        assert_eq!(arr.slice(Some(4), Some(2)), Some(v(json!([]))));
        assert_eq!(arr.slice(Some(-100), Some(100)), Some(arr.clone()));

        let s = Value::from("héllo");
        assert_eq!(s.slice(Some(1), Some(3)), Some(Value::from("él")));
        assert_eq!(s.slice(Some(-2), None), Some(Value::from("lo")));

        assert_eq!(Value::Null.slice(Some(0), None), None);
    }

    #[test]
    fn test_members_preserve_insertion_order() {
        let obj = v(json!({"z": 1, "a": 2, "m": 3}));
        assert_eq!(
            obj.members(),
            Some(vec![Value::from(1), Value::from(2), Value::from(3)])
        );
        assert_eq!(Value::from(true).members(), None);
    }

    #[test]
    fn test_object_equality_is_order_sensitive() {
        assert_eq!(v(json!({"a": 1, "b": 2})), v(json!({"a": 1, "b": 2})));
        assert_ne!(v(json!({"a": 1, "b": 2})), v(json!({"b": 2, "a": 1})));
    }

    #[test]
    fn test_display_and_serialize_agree() {
        let value = v(json!({"name": "A\"b", "n": [1, 2.5, null, true]}));
        let shown = value.to_string();
        assert_eq!(shown, r#"{"name":"A\"b","n":[1,2.5,null,true]}"#);
        assert_eq!(value.to_json_string().unwrap(), shown);
        assert_eq!(Value::from_json_str(&shown).unwrap(), value);
    }

    #[test]
    fn test_back_to_serde_json() {
        let value = v(json!({"a": [1, 2.5], "b": null}));
        assert_eq!(serde_json::Value::from(&value), json!({"a": [1, 2.5], "b": null}));
        assert_eq!(serde_json::Value::from(&Value::Number(f64::NAN)), json!(null));
    }
}
