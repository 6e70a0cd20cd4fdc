//! In-memory document tree: the shape callers build up before writing an
//! archive, and the shape a reader hands back after opening one.

use crate::error::{Error, Result};

/// A scalar or nested value held by a [`Document`] field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    String(String),
    Object(Document),
    Array(ArrayValue),
}

/// A homogeneous array value. Every element shares one primitive type, per
/// the archive's typed-array-group model; `Object` arrays hold nested
/// documents rather than a generic `Value`.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Null(usize),
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    String(Vec<String>),
    Object(Vec<Document>),
}

impl ArrayValue {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Null(n) => *n,
            ArrayValue::Bool(v) => v.len(),
            ArrayValue::I8(v) => v.len(),
            ArrayValue::I16(v) => v.len(),
            ArrayValue::I32(v) => v.len(),
            ArrayValue::I64(v) => v.len(),
            ArrayValue::U8(v) => v.len(),
            ArrayValue::U16(v) => v.len(),
            ArrayValue::U32(v) => v.len(),
            ArrayValue::U64(v) => v.len(),
            ArrayValue::F32(v) => v.len(),
            ArrayValue::String(v) => v.len(),
            ArrayValue::Object(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered, insertion-preserving object: the unit of nesting in a
/// document tree, and the unit a single archive record encodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    /// Insert or replace a field, preserving first-insertion order on
    /// replace.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Collect every string that will need a string-table entry: field
    /// names and `String`-typed values, recursively, in depth-first
    /// insertion order.
    pub(crate) fn collect_strings<'a>(&'a self, out: &mut Vec<&'a str>) {
        for (key, value) in &self.fields {
            out.push(key.as_str());
            collect_value_strings(value, out);
        }
    }
}

fn collect_value_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s.as_str()),
        Value::Object(doc) => doc.collect_strings(out),
        Value::Array(ArrayValue::String(items)) => out.extend(items.iter().map(String::as_str)),
        Value::Array(ArrayValue::Object(docs)) => docs.iter().for_each(|d| d.collect_strings(out)),
        _ => {}
    }
}

#[cfg(feature = "json")]
impl Document {
    /// Parse a JSON object into a [`Document`]. Every JSON object becomes a
    /// `Document`, every JSON array is classified into the narrowest
    /// homogeneous [`ArrayValue`] its elements support (numbers default to
    /// `I64`/`F32` as JSON carries no fixed-width type information); a
    /// non-object top-level value is rejected since every CARBON record is
    /// an object.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Document> {
        match value {
            serde_json::Value::Object(map) => {
                let mut doc = Document::new();
                for (k, v) in map {
                    doc.insert(k.clone(), json_value_to_value(v)?);
                }
                Ok(doc)
            }
            _ => Err(Error::IllegalArgument("top-level JSON value must be an object")),
        }
    }

    /// Parse a JSON document from text.
    pub fn from_json_str(text: &str) -> Result<Document> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Document::from_json_value(&value)
    }
}

#[cfg(feature = "json")]
fn json_value_to_value(value: &serde_json::Value) -> Result<Value> {
    Ok(match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::I64(i)
            } else if let Some(f) = n.as_f64() {
                Value::F32(f as f32)
            } else {
                return Err(Error::IllegalArgument("unrepresentable JSON number"));
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Object(_) => Value::Object(Document::from_json_value(value)?),
        serde_json::Value::Array(items) => Value::Array(json_array_to_array_value(items)?),
    })
}

#[cfg(feature = "json")]
fn json_array_to_array_value(items: &[serde_json::Value]) -> Result<ArrayValue> {
    use serde_json::Value as J;
    if items.is_empty() {
        return Ok(ArrayValue::Null(0));
    }
    if items.iter().all(|v| matches!(v, J::Object(_))) {
        let docs = items.iter().map(Document::from_json_value).collect::<Result<Vec<_>>>()?;
        return Ok(ArrayValue::Object(docs));
    }
    if items.iter().all(|v| matches!(v, J::String(_))) {
        return Ok(ArrayValue::String(
            items.iter().map(|v| v.as_str().unwrap().to_string()).collect(),
        ));
    }
    if items.iter().all(|v| matches!(v, J::Bool(_))) {
        return Ok(ArrayValue::Bool(items.iter().map(|v| v.as_bool().unwrap()).collect()));
    }
    if items.iter().all(|v| matches!(v, J::Number(n) if n.is_i64())) {
        return Ok(ArrayValue::I64(items.iter().map(|v| v.as_i64().unwrap()).collect()));
    }
    if items.iter().all(|v| matches!(v, J::Number(_))) {
        return Ok(ArrayValue::F32(items.iter().map(|v| v.as_f64().unwrap() as f32).collect()));
    }
    Err(Error::IllegalArgument("JSON array elements are not homogeneously typed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_first_seen_order() {
        let mut doc = Document::new();
        doc.insert("b", Value::I32(2));
        doc.insert("a", Value::I32(1));
        doc.insert("b", Value::I32(20));
        let keys: Vec<_> = doc.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(doc.get("b"), Some(&Value::I32(20)));
    }

    #[test]
    fn collect_strings_walks_nested_objects_and_arrays() {
        let mut inner = Document::new();
        inner.insert("name", Value::String("bob".into()));
        let mut doc = Document::new();
        doc.insert("title", Value::String("hi".into()));
        doc.insert("child", Value::Object(inner));
        doc.insert("tags", Value::Array(ArrayValue::String(vec!["x".into(), "y".into()])));

        let mut strings = Vec::new();
        doc.collect_strings(&mut strings);
        assert!(strings.contains(&"title"));
        assert!(strings.contains(&"hi"));
        assert!(strings.contains(&"child"));
        assert!(strings.contains(&"name"));
        assert!(strings.contains(&"bob"));
        assert!(strings.contains(&"tags"));
        assert!(strings.contains(&"x"));
        assert!(strings.contains(&"y"));
    }
}
