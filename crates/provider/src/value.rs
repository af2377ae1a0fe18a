//! Typed attribute values and JSON coercion
//!
//! Every model field is a [`Value`], which keeps Terraform's distinction
//! between null, unknown and known. The `parse_*` helpers coerce untyped API
//! JSON into typed values; [`RequestBody`] and the `expand_*` helpers turn
//! typed values back into request JSON, leaving out anything not known.

use serde_json::{json, Value as Json};
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::state::DynamicValue;
use fortisase_client::JsonObject;

/// Tri-state attribute value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value<T> {
    #[default]
    Null,
    Unknown,
    Known(T),
}

impl<T> Value<T> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Value::Known(_))
    }

    pub fn as_known(&self) -> Option<&T> {
        match self {
            Value::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Value::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Value<U> {
        match self {
            Value::Null => Value::Null,
            Value::Unknown => Value::Unknown,
            Value::Known(v) => Value::Known(f(v)),
        }
    }
}

impl<T> From<Option<T>> for Value<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Value::Known(v),
            None => Value::Null,
        }
    }
}

impl From<&str> for Value<String> {
    fn from(s: &str) -> Self {
        Value::Known(s.to_string())
    }
}

impl Value<String> {
    pub fn as_str(&self) -> Option<&str> {
        self.as_known().map(String::as_str)
    }
}

/// Conversion between a Terraform value and a concrete Rust type
pub trait AttrValue: Sized {
    fn from_dynamic(value: &DynamicValue) -> Option<Self>;
    fn to_dynamic(&self) -> DynamicValue;
}

impl AttrValue for String {
    fn from_dynamic(value: &DynamicValue) -> Option<Self> {
        value.as_string().map(str::to_string)
    }

    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::String(self.clone())
    }
}

impl AttrValue for i64 {
    fn from_dynamic(value: &DynamicValue) -> Option<Self> {
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
    }

    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::Number((*self).into())
    }
}

impl AttrValue for bool {
    fn from_dynamic(value: &DynamicValue) -> Option<Self> {
        value.as_bool()
    }

    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::Bool(*self)
    }
}

impl AttrValue for Vec<String> {
    fn from_dynamic(value: &DynamicValue) -> Option<Self> {
        value
            .as_list()?
            .iter()
            .map(|v| v.as_string().map(str::to_string))
            .collect()
    }

    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::List(self.iter().cloned().map(DynamicValue::String).collect())
    }
}

impl AttrValue for BTreeSet<String> {
    fn from_dynamic(value: &DynamicValue) -> Option<Self> {
        value
            .as_list()?
            .iter()
            .map(|v| v.as_string().map(str::to_string))
            .collect()
    }

    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::List(self.iter().cloned().map(DynamicValue::String).collect())
    }
}

impl<T: AttrValue> Value<T> {
    pub fn from_dynamic(value: &DynamicValue) -> Option<Self> {
        match value {
            DynamicValue::Null => Some(Value::Null),
            DynamicValue::Unknown => Some(Value::Unknown),
            v => T::from_dynamic(v).map(Value::Known),
        }
    }

    pub fn to_dynamic(&self) -> DynamicValue {
        match self {
            Value::Null => DynamicValue::Null,
            Value::Unknown => DynamicValue::Unknown,
            Value::Known(v) => v.to_dynamic(),
        }
    }
}

/// Read attribute `key` of an object value; a missing key reads as null
pub fn attr<T: AttrValue>(object: &DynamicValue, key: &str) -> Result<Value<T>> {
    match object.get(key) {
        None => Ok(Value::Null),
        Some(v) => Value::from_dynamic(v)
            .ok_or_else(|| Error::state(format!("attribute {} has an unexpected type", key))),
    }
}

/// Read a nested single block; null or missing reads as `None`
pub fn block<B>(
    object: &DynamicValue,
    key: &str,
    decode: impl Fn(&DynamicValue) -> Result<B>,
) -> Result<Option<B>> {
    match object.get(key) {
        None | Some(DynamicValue::Null) | Some(DynamicValue::Unknown) => Ok(None),
        Some(v @ DynamicValue::Map(_)) => decode(v).map(Some),
        Some(_) => Err(Error::state(format!("block {} is not an object", key))),
    }
}

/// Read a nested list block; null or missing reads as empty
pub fn block_list<B>(
    object: &DynamicValue,
    key: &str,
    decode: impl Fn(&DynamicValue) -> Result<B>,
) -> Result<Vec<B>> {
    match object.get(key) {
        None | Some(DynamicValue::Null) | Some(DynamicValue::Unknown) => Ok(Vec::new()),
        Some(DynamicValue::List(items)) => items.iter().map(decode).collect(),
        Some(_) => Err(Error::state(format!("block {} is not a list", key))),
    }
}

// API JSON -> typed values

/// Coerce any scalar JSON value to a string
pub fn parse_string_value(v: Option<&Json>) -> Value<String> {
    match v {
        Some(Json::String(s)) => Value::Known(s.clone()),
        Some(Json::Number(n)) => Value::Known(n.to_string()),
        Some(Json::Bool(b)) => Value::Known(b.to_string()),
        _ => Value::Null,
    }
}

/// Coerce a JSON number, or a numeric string, to an integer
pub fn parse_int_value(v: Option<&Json>) -> Value<i64> {
    match v {
        Some(Json::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .into(),
        Some(Json::String(s)) => s.trim().parse::<i64>().ok().into(),
        _ => Value::Null,
    }
}

/// Coerce a JSON float, or a numeric string, to a float
pub fn parse_float_value(v: Option<&Json>) -> Value<f64> {
    match v {
        Some(Json::Number(n)) => n.as_f64().into(),
        Some(Json::String(s)) => s.trim().parse::<f64>().ok().into(),
        _ => Value::Null,
    }
}

/// Coerce a JSON bool, or `"true"`/`"false"`/`"enable"`/`"disable"`, to a bool
pub fn parse_bool_value(v: Option<&Json>) -> Value<bool> {
    match v {
        Some(Json::Bool(b)) => Value::Known(*b),
        Some(Json::String(s)) => match s.as_str() {
            "true" | "enable" => Value::Known(true),
            "false" | "disable" => Value::Known(false),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

/// A JSON array of scalars, order preserved
pub fn parse_string_list(v: Option<&Json>) -> Value<Vec<String>> {
    match v {
        Some(Json::Array(items)) => Value::Known(
            items
                .iter()
                .filter_map(|i| parse_string_value(Some(i)).into_option())
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// A JSON array of scalars as a set
pub fn parse_string_set(v: Option<&Json>) -> Value<BTreeSet<String>> {
    parse_string_list(v).map(|items| items.into_iter().collect())
}

/// A reference object `{"primaryKey": ..., "datasource": ...}` or a bare key
pub fn parse_reference_value(v: Option<&Json>) -> Value<String> {
    match v {
        Some(Json::Object(obj)) => parse_string_value(obj.get("primaryKey")),
        other => parse_string_value(other),
    }
}

/// An array of references as the set of their primary keys
pub fn parse_reference_set(v: Option<&Json>) -> Value<BTreeSet<String>> {
    match v {
        Some(Json::Array(items)) => Value::Known(
            items
                .iter()
                .filter_map(|i| parse_reference_value(Some(i)).into_option())
                .collect(),
        ),
        _ => Value::Null,
    }
}

// Typed values -> API JSON

/// Conversion of a known value into request JSON
pub trait ToJson {
    fn to_json(&self) -> Json;
}

impl ToJson for String {
    fn to_json(&self) -> Json {
        Json::String(self.clone())
    }
}

impl ToJson for i64 {
    fn to_json(&self) -> Json {
        json!(self)
    }
}

impl ToJson for f64 {
    fn to_json(&self) -> Json {
        json!(self)
    }
}

impl ToJson for bool {
    fn to_json(&self) -> Json {
        Json::Bool(*self)
    }
}

impl ToJson for Vec<String> {
    fn to_json(&self) -> Json {
        json!(self)
    }
}

impl ToJson for BTreeSet<String> {
    fn to_json(&self) -> Json {
        Json::Array(self.iter().cloned().map(Json::String).collect())
    }
}

/// A set of strings as a JSON array; `None` unless known
pub fn expand_set_to_string_list(v: &Value<BTreeSet<String>>) -> Option<Json> {
    v.as_known().map(ToJson::to_json)
}

/// A key as a reference object pointing into `datasource`
pub fn expand_reference(v: &Value<String>, datasource: &str) -> Option<Json> {
    v.as_known()
        .map(|key| json!({"primaryKey": key, "datasource": datasource}))
}

/// A set of keys as an array of reference objects
pub fn expand_reference_list(v: &Value<BTreeSet<String>>, datasource: &str) -> Option<Json> {
    v.as_known().map(|keys| {
        Json::Array(
            keys.iter()
                .map(|key| json!({"primaryKey": key, "datasource": datasource}))
                .collect(),
        )
    })
}

/// Presence-based request body: null and unknown values are left out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBody(JsonObject);

impl RequestBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` when `value` is known
    pub fn put<T: ToJson>(&mut self, key: &str, value: &Value<T>) -> &mut Self {
        if let Value::Known(v) = value {
            self.0.insert(key.to_string(), v.to_json());
        }
        self
    }

    /// Add `key` when `planned` is known and differs from `prior`
    pub fn put_changed<T: ToJson + PartialEq>(
        &mut self,
        key: &str,
        prior: &Value<T>,
        planned: &Value<T>,
    ) -> &mut Self {
        if planned.is_known() && prior != planned {
            self.put(key, planned);
        }
        self
    }

    /// Add a pre-built JSON value when present
    pub fn put_json(&mut self, key: &str, value: Option<Json>) -> &mut Self {
        if let Some(v) = value {
            self.0.insert(key.to_string(), v);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> JsonObject {
        self.0
    }
}
