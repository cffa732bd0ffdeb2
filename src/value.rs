use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use std::ops::Index;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use educe::Educe;

use crate::error;

/// A value the codec can store.
///
/// Floats compare by bit pattern, so a `NaN` equals itself and `0.0` differs from `-0.0`. That is
/// exactly the distinction the encoding preserves.
#[derive(Clone, Debug, Educe)]
#[educe(PartialEq(bound()))]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(#[educe(PartialEq(method(float_eq)))] f64),
    /// Milliseconds since the Unix epoch.
    Date(#[educe(PartialEq(method(float_eq)))] f64),
    Bytes(Vec<u8>),
    Str(String),
    Duple(Box<Value>, Box<Value>),
    Array(Vec<Value>),
    Sparse(SparseArray),
    /// Entries in insertion order. The order is part of the value's encoding.
    Object(Vec<(String, Value)>),
}

fn float_eq(a: &f64, b: &f64) -> bool {
    a.to_bits() == b.to_bits()
}

/// A sequence with holes. Indices at or above `len` are never present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseArray {
    len: usize,
    items: BTreeMap<usize, Value>,
}

impl SparseArray {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            items: BTreeMap::new(),
        }
    }

    /// Set an item, returning the one it replaced. Setting past the end grows the array.
    pub fn insert(&mut self, index: usize, value: Value) -> error::Result<Option<Value>> {
        if index >= self.len {
            self.len = index.checked_add(1).ok_or_else(|| {
                let msg = format!("Sparse array index {} is too large", index);
                error::Error::UnsupportedValue(msg)
            })?;
        }
        Ok(self.items.insert(index, value))
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(&index)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if every index below `len` holds an item.
    pub fn is_dense(&self) -> bool {
        self.items.len() == self.len
    }

    /// Present items, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.items.iter().map(|(i, v)| (*i, v))
    }

    /// Convert into a plain array, or give the sparse array back if it has holes.
    pub fn into_dense(self) -> Result<Vec<Value>, SparseArray> {
        if self.is_dense() {
            Ok(self.items.into_values().collect())
        } else {
            Err(self)
        }
    }
}

impl Value {
    /// Build an object from key-value pairs, keeping their order.
    pub fn object<K, V, I>(entries: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build an ordered pair.
    pub fn duple(left: impl Into<Value>, right: impl Into<Value>) -> Value {
        Value::Duple(Box::new(left.into()), Box::new(right.into()))
    }

    pub fn name(&self) -> &'static str {
        use self::Value::*;
        match self {
            Undefined => "Undefined",
            Null => "Null",
            Bool(_) => "Bool",
            Number(_) => "Number",
            Date(_) => "Date",
            Bytes(_) => "Bytes",
            Str(_) => "Str",
            Duple(_, _) => "Duple",
            Array(_) => "Array",
            Sparse(_) => "Sparse",
            Object(_) => "Object",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_duple(&self) -> bool {
        matches!(self, Value::Duple(_, _))
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::Str(ref val) = *self {
            Some(val.as_str())
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> Option<&[u8]> {
        if let Value::Bytes(ref val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        if let Value::Array(ref array) = *self {
            Some(array)
        } else {
            None
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        if let Value::Object(ref entries) = *self {
            Some(entries)
        } else {
            None
        }
    }

    /// Look up an object entry by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()
            .and_then(|entries| entries.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v)
    }
}

impl std::default::Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

static UNDEFINED: Value = Value::Undefined;

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        match self {
            Value::Array(v) => v.get(index),
            Value::Sparse(v) => v.get(index),
            _ => None,
        }
        .unwrap_or(&UNDEFINED)
    }
}

impl Index<&str> for Value {
    type Output = Value;

    fn index(&self, index: &str) -> &Self::Output {
        self.get(index).unwrap_or(&UNDEFINED)
    }
}

macro_rules! impl_value_from_number {
    ($t: ty) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Number(v as f64)
            }
        }
    };
}

macro_rules! impl_value_from {
    ($t: ty, $p: ident) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$p(v)
            }
        }
    };
}

impl_value_from!(bool, Bool);
impl_value_from!(f64, Number);
impl_value_from!(String, Str);
impl_value_from!(Vec<u8>, Bytes);
impl_value_from!(Vec<Value>, Array);
impl_value_from!(SparseArray, Sparse);
impl_value_from!(Vec<(String, Value)>, Object);
impl_value_from_number!(f32);
impl_value_from_number!(u8);
impl_value_from_number!(u16);
impl_value_from_number!(u32);
impl_value_from_number!(u64);
impl_value_from_number!(usize);
impl_value_from_number!(i8);
impl_value_from_number!(i16);
impl_value_from_number!(i32);
impl_value_from_number!(i64);
impl_value_from_number!(isize);

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.into())
    }
}

impl<'a> From<&'a [u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Undefined, Into::into)
    }
}

impl<V: Into<Value>> std::iter::FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        let v: Vec<Value> = iter.into_iter().map(Into::into).collect();
        Value::Array(v)
    }
}

macro_rules! impl_try_from_value {
    ($t: ty, $p: ident) => {
        impl TryFrom<Value> for $t {
            type Error = Value;
            fn try_from(v: Value) -> Result<Self, Self::Error> {
                match v {
                    Value::$p(v) => Ok(v),
                    _ => Err(v),
                }
            }
        }
    };
}

impl_try_from_value!(bool, Bool);
impl_try_from_value!(f64, Number);
impl_try_from_value!(String, Str);
impl_try_from_value!(Vec<u8>, Bytes);
impl_try_from_value!(Vec<Value>, Array);
impl_try_from_value!(SparseArray, Sparse);
impl_try_from_value!(Vec<(String, Value)>, Object);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Number(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "Date({})", v),
            Value::Bytes(v) => write!(f, "b64:{}", STANDARD.encode(v)),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Duple(l, r) => write!(f, "({}, {})", l, r),
            Value::Array(v) => {
                f.write_str("[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Sparse(v) => {
                write!(f, "<sparse len={}", v.len())?;
                for (i, item) in v.iter() {
                    write!(f, " {}: {}", i, item)?;
                }
                f.write_str(">")
            }
            Value::Object(v) => {
                f.write_str("{")?;
                for (i, (key, item)) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", key, item)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeTuple};
        match self {
            Value::Undefined => serializer.serialize_none(),
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Number(v) => serializer.serialize_f64(*v),
            Value::Date(v) => serializer.serialize_newtype_struct("Date", v),
            Value::Bytes(v) => {
                serde::Serialize::serialize(&serde_bytes::Bytes::new(v), serializer)
            }
            Value::Str(v) => serializer.serialize_str(v),
            Value::Duple(l, r) => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(l)?;
                tuple.serialize_element(r)?;
                tuple.end()
            }
            Value::Array(v) => serde::Serialize::serialize(v, serializer),
            Value::Sparse(v) => {
                // Same shape the encoding uses: present indices, then the length
                let mut map = serializer.serialize_map(Some(v.items.len() + 1))?;
                for (i, item) in v.iter() {
                    map.serialize_entry(&i.to_string(), item)?;
                }
                map.serialize_entry("length", &v.len())?;
                map.end()
            }
            Value::Object(v) => {
                let mut map = serializer.serialize_map(Some(v.len()))?;
                for (key, item) in v.iter() {
                    map.serialize_entry(key, item)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::*;

        struct ValueVisitor;
        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                fmt.write_str("any valid turtle-pack Value")
            }

            fn visit_bool<E: Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(Value::Bool(v))
            }

            fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Value::Number(v as f64))
            }

            fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Value::Number(v as f64))
            }

            fn visit_f64<E: Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(Value::Number(v))
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Value::Str(v.into()))
            }

            fn visit_string<E: Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(Value::Str(v))
            }

            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(Value::Bytes(v.into()))
            }

            fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(Value::Bytes(v))
            }

            fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Undefined)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
                Value::deserialize(d)
            }

            fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Null)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                // Allocate with the size hint, but be conservative. 4096 is what serde uses
                // internally for collections, so we'll do likewise.
                let mut seq = match access.size_hint() {
                    Some(size) => Vec::with_capacity(size.min(4096)),
                    None => Vec::new(),
                };
                while let Some(elem) = access.next_element()? {
                    seq.push(elem);
                }
                Ok(Value::Array(seq))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, val)) = access.next_entry::<String, Value>()? {
                    entries.push((key, val));
                }
                Ok(Value::Object(entries))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}
