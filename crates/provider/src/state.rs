//! Terraform State Management
//!
//! Handles encoding and decoding of Terraform values. Terraform sends and
//! expects cty values encoded as msgpack, with unknown values carried as a
//! msgpack extension; legacy raw state arrives as JSON.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tfplugin6;

/// Dynamic value exchanged with Terraform
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    #[default]
    Null,
    /// Not known until apply
    Unknown,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(HashMap<String, DynamicValue>),
}

impl DynamicValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DynamicValue::Unknown)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DynamicValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut HashMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map()?.get(key)
    }

    /// True when this value or anything nested in it is unknown
    pub fn contains_unknown(&self) -> bool {
        match self {
            DynamicValue::Unknown => true,
            DynamicValue::List(l) => l.iter().any(DynamicValue::contains_unknown),
            DynamicValue::Map(m) => m.values().any(DynamicValue::contains_unknown),
            _ => false,
        }
    }
}

/// Extension type Terraform uses for unknown values
const UNKNOWN_EXT: i8 = 0;

/// Decode a Terraform DynamicValue, preferring msgpack over JSON
pub fn decode_dynamic_value(value: &tfplugin6::DynamicValue) -> Result<DynamicValue> {
    if !value.msgpack.is_empty() {
        decode_msgpack(&value.msgpack)
    } else {
        decode_json(&value.json)
    }
}

/// Decode an optional request value; absent means null
pub fn decode_optional(value: Option<&tfplugin6::DynamicValue>) -> Result<DynamicValue> {
    match value {
        Some(v) => decode_dynamic_value(v),
        None => Ok(DynamicValue::Null),
    }
}

/// Encode a value into the msgpack form Terraform expects
pub fn encode_dynamic_value(value: &DynamicValue) -> Result<tfplugin6::DynamicValue> {
    Ok(tfplugin6::DynamicValue {
        msgpack: encode_msgpack(value)?,
        json: vec![],
    })
}

pub fn decode_msgpack(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }
    let mut reader = data;
    let value = rmpv::decode::read_value(&mut reader)
        .map_err(|e| Error::state(format!("invalid msgpack value: {}", e)))?;
    from_msgpack(value)
}

pub fn encode_msgpack(value: &DynamicValue) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &to_msgpack(value))
        .map_err(|e| Error::state(format!("cannot encode msgpack value: {}", e)))?;
    Ok(buf)
}

pub fn decode_json(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }
    let value: serde_json::Value = serde_json::from_slice(data)?;
    Ok(from_json(value))
}

fn from_msgpack(value: rmpv::Value) -> Result<DynamicValue> {
    Ok(match value {
        rmpv::Value::Nil => DynamicValue::Null,
        rmpv::Value::Boolean(b) => DynamicValue::Bool(b),
        rmpv::Value::Integer(i) => match (i.as_i64(), i.as_u64()) {
            (Some(n), _) => DynamicValue::Number(n.into()),
            (None, Some(n)) => DynamicValue::Number(n.into()),
            _ => return Err(Error::state("integer out of range")),
        },
        rmpv::Value::F32(f) => float_number(f as f64)?,
        rmpv::Value::F64(f) => float_number(f)?,
        rmpv::Value::String(s) => match s.into_str() {
            Some(s) => DynamicValue::String(s),
            None => return Err(Error::state("string is not valid UTF-8")),
        },
        rmpv::Value::Binary(_) => return Err(Error::state("unexpected binary value")),
        rmpv::Value::Array(items) => DynamicValue::List(
            items
                .into_iter()
                .map(from_msgpack)
                .collect::<Result<Vec<_>>>()?,
        ),
        rmpv::Value::Map(entries) => {
            let mut map = HashMap::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    rmpv::Value::String(s) => s
                        .into_str()
                        .ok_or_else(|| Error::state("map key is not valid UTF-8"))?,
                    other => return Err(Error::state(format!("unexpected map key {}", other))),
                };
                map.insert(key, from_msgpack(value)?);
            }
            DynamicValue::Map(map)
        }
        // Refined unknowns use other extension codes; all of them are unknown to us.
        rmpv::Value::Ext(_, _) => DynamicValue::Unknown,
    })
}

fn float_number(f: f64) -> Result<DynamicValue> {
    serde_json::Number::from_f64(f)
        .map(DynamicValue::Number)
        .ok_or_else(|| Error::state("non-finite number"))
}

fn to_msgpack(value: &DynamicValue) -> rmpv::Value {
    match value {
        DynamicValue::Null => rmpv::Value::Nil,
        DynamicValue::Unknown => rmpv::Value::Ext(UNKNOWN_EXT, vec![0]),
        DynamicValue::Bool(b) => rmpv::Value::Boolean(*b),
        DynamicValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                rmpv::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                rmpv::Value::from(u)
            } else {
                rmpv::Value::F64(n.as_f64().unwrap_or_default())
            }
        }
        DynamicValue::String(s) => rmpv::Value::from(s.as_str()),
        DynamicValue::List(items) => rmpv::Value::Array(items.iter().map(to_msgpack).collect()),
        DynamicValue::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            rmpv::Value::Map(
                keys.into_iter()
                    .map(|k| (rmpv::Value::from(k.as_str()), to_msgpack(&map[k])))
                    .collect(),
            )
        }
    }
}

/// Convert a JSON value; JSON has no unknowns
pub fn from_json(value: serde_json::Value) -> DynamicValue {
    match value {
        serde_json::Value::Null => DynamicValue::Null,
        serde_json::Value::Bool(b) => DynamicValue::Bool(b),
        serde_json::Value::Number(n) => DynamicValue::Number(n),
        serde_json::Value::String(s) => DynamicValue::String(s),
        serde_json::Value::Array(items) => {
            DynamicValue::List(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(map) => {
            DynamicValue::Map(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

/// Create a DynamicValue map with the given attributes
pub fn make_state(attrs: Vec<(&str, DynamicValue)>) -> DynamicValue {
    let mut map = HashMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    DynamicValue::Map(map)
}

/// Create a string DynamicValue
pub fn string_value(s: impl Into<String>) -> DynamicValue {
    DynamicValue::String(s.into())
}

/// Create a number DynamicValue from i64
pub fn int_value(n: i64) -> DynamicValue {
    DynamicValue::Number(serde_json::Number::from(n))
}

/// Create a bool DynamicValue
pub fn bool_value(b: bool) -> DynamicValue {
    DynamicValue::Bool(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msgpack_object_round_trip() {
        let value = make_state(vec![
            ("primary_key", string_value("bob")),
            ("enabled", bool_value(true)),
            ("timeout", int_value(30)),
            ("domains", DynamicValue::List(vec![string_value("a.example.com")])),
            ("email", DynamicValue::Null),
        ]);
        let bytes = encode_msgpack(&value).unwrap();
        assert_eq!(decode_msgpack(&bytes).unwrap(), value);
    }

    #[test]
    fn test_unknown_is_extension() {
        let bytes = encode_msgpack(&DynamicValue::Unknown).unwrap();
        // fixext1, type 0, payload 0
        assert_eq!(bytes, vec![0xd4, 0x00, 0x00]);
        assert!(decode_msgpack(&bytes).unwrap().is_unknown());
    }

    #[test]
    fn test_refined_unknown_decodes_as_unknown() {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &rmpv::Value::Ext(12, vec![0x81, 0x01, 0xc3])).unwrap();
        assert!(decode_msgpack(&buf).unwrap().is_unknown());
    }

    #[test]
    fn test_empty_payload_is_null() {
        assert!(decode_msgpack(&[]).unwrap().is_null());
        assert!(decode_json(&[]).unwrap().is_null());
        let empty = tfplugin6::DynamicValue::default();
        assert!(decode_dynamic_value(&empty).unwrap().is_null());
        assert!(decode_optional(None).unwrap().is_null());
    }

    #[test]
    fn test_json_state_decoding() {
        let value = decode_json(br#"{"id": "bob", "status": "enable", "count": 2}"#).unwrap();
        assert_eq!(value.get("id").and_then(|v| v.as_string()), Some("bob"));
        assert_eq!(value.get("count").and_then(|v| v.as_i64()), Some(2));
        assert!(value.get("missing").is_none());
    }

    #[test]
    fn test_contains_unknown() {
        let value = make_state(vec![(
            "sessions",
            DynamicValue::List(vec![make_state(vec![("ip", DynamicValue::Unknown)])]),
        )]);
        assert!(value.contains_unknown());
        assert!(!make_state(vec![("ip", string_value("10.0.0.1"))]).contains_unknown());
    }
}
