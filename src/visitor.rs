//! A push-based visitor over a [`Document`] tree, in the same spirit as the
//! reference bitstream visitor: the walker decides what to recurse into,
//! the visitor decides what to do with what it sees and whether to descend
//! further.
//!
//! Fields are grouped by type before being handed to the visitor (mirroring
//! how the wire format itself groups same-typed fields into one property
//! group) rather than visited one at a time, so a visitor only overrides
//! the per-type callbacks it actually cares about. Object-array fields get
//! their own hooks: a visitor can skip the whole array, or veto individual
//! objects within it before their properties are visited.

use std::collections::BTreeMap;

use crate::model::{ArrayValue, Document, Value};
use crate::record::props::PropertyMask;
use crate::value::ValueType;

/// What to do after a `should_enter_object`/`before_visit_object_array`
/// check: descend, or treat the thing as absent entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Include,
    Exclude,
}

macro_rules! scalar_pairs_hook {
    ($name:ident, $ty:ty) => {
        /// Called once per object with every present field of this type,
        /// keys and values in matching order.
        fn $name(&mut self, _path: &[String], _keys: &[String], _values: &[$ty]) {}
    };
}

macro_rules! array_pairs_hook {
    ($enter:ident, $visit:ident, $leave:ident, $ty:ty) => {
        /// Called before any array field of this element type is visited.
        /// Returning [`Policy::Exclude`] skips every array of this type on
        /// this object.
        fn $enter(&mut self, _path: &[String], _keys: &[String]) -> Policy {
            Policy::Include
        }
        /// Called once per array field of this element type.
        fn $visit(&mut self, _path: &[String], _key: &str, _values: &[$ty]) {}
        /// Called after every array field of this element type has been
        /// visited.
        fn $leave(&mut self, _path: &[String]) {}
    };
}

/// Receives callbacks while walking a document tree. All methods have
/// default no-op/[`Policy::Include`] implementations, so a visitor only
/// needs to override what it cares about.
pub trait Visitor {
    /// Called before descending into an object reached at `path`. Return
    /// [`Policy::Exclude`] to skip its fields (and any nested objects).
    fn before_object_visit(&mut self, _path: &[String]) -> Policy {
        Policy::Include
    }

    /// Called after every field of an object at `path` has been visited.
    fn after_object_visit(&mut self, _path: &[String]) {}

    /// Called once per object with every present `null`-valued key.
    fn visit_null_pairs(&mut self, _path: &[String], _keys: &[String]) {}

    scalar_pairs_hook!(visit_bool_pairs, bool);
    scalar_pairs_hook!(visit_i8_pairs, i8);
    scalar_pairs_hook!(visit_i16_pairs, i16);
    scalar_pairs_hook!(visit_i32_pairs, i32);
    scalar_pairs_hook!(visit_i64_pairs, i64);
    scalar_pairs_hook!(visit_u8_pairs, u8);
    scalar_pairs_hook!(visit_u16_pairs, u16);
    scalar_pairs_hook!(visit_u32_pairs, u32);
    scalar_pairs_hook!(visit_u64_pairs, u64);
    scalar_pairs_hook!(visit_number_pairs, f32);
    scalar_pairs_hook!(visit_string_pairs, String);

    array_pairs_hook!(visit_enter_bool_array_pairs, visit_bool_array_pair, visit_leave_bool_array_pairs, bool);
    array_pairs_hook!(visit_enter_i8_array_pairs, visit_i8_array_pair, visit_leave_i8_array_pairs, i8);
    array_pairs_hook!(visit_enter_i16_array_pairs, visit_i16_array_pair, visit_leave_i16_array_pairs, i16);
    array_pairs_hook!(visit_enter_i32_array_pairs, visit_i32_array_pair, visit_leave_i32_array_pairs, i32);
    array_pairs_hook!(visit_enter_i64_array_pairs, visit_i64_array_pair, visit_leave_i64_array_pairs, i64);
    array_pairs_hook!(visit_enter_u8_array_pairs, visit_u8_array_pair, visit_leave_u8_array_pairs, u8);
    array_pairs_hook!(visit_enter_u16_array_pairs, visit_u16_array_pair, visit_leave_u16_array_pairs, u16);
    array_pairs_hook!(visit_enter_u32_array_pairs, visit_u32_array_pair, visit_leave_u32_array_pairs, u32);
    array_pairs_hook!(visit_enter_u64_array_pairs, visit_u64_array_pair, visit_leave_u64_array_pairs, u64);
    array_pairs_hook!(visit_enter_number_array_pairs, visit_number_array_pair, visit_leave_number_array_pairs, f32);
    array_pairs_hook!(visit_enter_string_array_pairs, visit_string_array_pair, visit_leave_string_array_pairs, String);

    /// Called before any `null`-typed array field is visited.
    fn visit_enter_null_array_pairs(&mut self, _path: &[String], _keys: &[String]) -> Policy {
        Policy::Include
    }
    /// Called once per `null`-typed array field, with its length.
    fn visit_null_array_pair(&mut self, _path: &[String], _key: &str, _len: usize) {}
    fn visit_leave_null_array_pairs(&mut self, _path: &[String]) {}

    /// Called before a homogeneous-object-array field is visited. Return
    /// [`Policy::Exclude`] to skip the whole array.
    fn before_visit_object_array(&mut self, _path: &[String], _key: &str) -> Policy {
        Policy::Include
    }

    /// Called with the number of objects in an entered object-array, before
    /// any of them are visited. Set `skip_objects[i]` to exclude the object
    /// at index `i` from the rest of the walk, mirroring the reference
    /// visitor's per-object skip mask for column-group scans.
    fn before_visit_object_array_objects(
        &mut self,
        _path: &[String],
        _key: &str,
        _num_objects: usize,
        _skip_objects: &mut [bool],
    ) {
    }

    /// Called for one property of one object inside an entered
    /// object-array (after the object's own `skip_objects` check passed).
    fn visit_object_array_object_property(
        &mut self,
        _path: &[String],
        _array_key: &str,
        _object_idx: usize,
        _field_key: &str,
        _value: &Value,
    ) {
    }

    fn did_exit_object_array(&mut self, _path: &[String], _key: &str) {}
}

/// Walk `doc` depth-first, grouping each object's fields by type before
/// dispatching to `visitor`. Equivalent to `walk_masked(doc, visitor,
/// PropertyMask::ANY)`.
pub fn walk(doc: &Document, visitor: &mut impl Visitor) {
    walk_masked(doc, visitor, PropertyMask::ANY);
}

/// Walk `doc`, skipping any field whose type/array-ness `mask` does not
/// admit.
pub fn walk_masked(doc: &Document, visitor: &mut impl Visitor, mask: PropertyMask) {
    let mut path = Vec::new();
    walk_object(doc, &mut path, visitor, mask);
}

fn walk_object(doc: &Document, path: &mut Vec<String>, visitor: &mut impl Visitor, mask: PropertyMask) {
    if visitor.before_object_visit(path) == Policy::Exclude {
        return;
    }

    let mut nulls = Vec::new();
    let mut bools = (Vec::new(), Vec::new());
    let mut i8s = (Vec::new(), Vec::new());
    let mut i16s = (Vec::new(), Vec::new());
    let mut i32s = (Vec::new(), Vec::new());
    let mut i64s = (Vec::new(), Vec::new());
    let mut u8s = (Vec::new(), Vec::new());
    let mut u16s = (Vec::new(), Vec::new());
    let mut u32s = (Vec::new(), Vec::new());
    let mut u64s = (Vec::new(), Vec::new());
    let mut numbers = (Vec::new(), Vec::new());
    let mut strings = (Vec::new(), Vec::new());
    let mut objects: Vec<(String, &Document)> = Vec::new();
    let mut arrays: BTreeMap<ValueType, (Vec<String>, Vec<&ArrayValue>)> = BTreeMap::new();
    let mut null_arrays: Vec<(String, usize)> = Vec::new();
    let mut object_arrays: Vec<(String, &[Document])> = Vec::new();

    for (key, value) in doc.fields() {
        match value {
            Value::Null if mask.admits(ValueType::Null, false) => nulls.push(key.clone()),
            Value::Bool(v) if mask.admits(ValueType::Bool, false) => push_pair(&mut bools, key, *v),
            Value::I8(v) if mask.admits(ValueType::I8, false) => push_pair(&mut i8s, key, *v),
            Value::I16(v) if mask.admits(ValueType::I16, false) => push_pair(&mut i16s, key, *v),
            Value::I32(v) if mask.admits(ValueType::I32, false) => push_pair(&mut i32s, key, *v),
            Value::I64(v) if mask.admits(ValueType::I64, false) => push_pair(&mut i64s, key, *v),
            Value::U8(v) if mask.admits(ValueType::U8, false) => push_pair(&mut u8s, key, *v),
            Value::U16(v) if mask.admits(ValueType::U16, false) => push_pair(&mut u16s, key, *v),
            Value::U32(v) if mask.admits(ValueType::U32, false) => push_pair(&mut u32s, key, *v),
            Value::U64(v) if mask.admits(ValueType::U64, false) => push_pair(&mut u64s, key, *v),
            Value::F32(v) if mask.admits(ValueType::F32, false) => push_pair(&mut numbers, key, *v),
            Value::String(v) if mask.admits(ValueType::String, false) => push_pair(&mut strings, key, v.clone()),
            Value::Object(child) if mask.admits(ValueType::Object, false) => objects.push((key.clone(), child)),
            Value::Array(ArrayValue::Object(rows)) if mask.admits(ValueType::Object, true) => {
                object_arrays.push((key.clone(), rows.as_slice()));
            }
            Value::Array(ArrayValue::Null(n)) if mask.admits(ValueType::Null, true) => {
                null_arrays.push((key.clone(), *n));
            }
            Value::Array(av) => {
                let ty = array_element_type(av);
                if mask.admits(ty, true) {
                    let entry = arrays.entry(ty).or_default();
                    entry.0.push(key.clone());
                    entry.1.push(av);
                }
            }
            _ => {}
        }
    }

    if !nulls.is_empty() {
        visitor.visit_null_pairs(path, &nulls);
    }
    emit_scalar_pairs(path, bools, |v, p, k, vs| v.visit_bool_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, i8s, |v, p, k, vs| v.visit_i8_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, i16s, |v, p, k, vs| v.visit_i16_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, i32s, |v, p, k, vs| v.visit_i32_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, i64s, |v, p, k, vs| v.visit_i64_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, u8s, |v, p, k, vs| v.visit_u8_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, u16s, |v, p, k, vs| v.visit_u16_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, u32s, |v, p, k, vs| v.visit_u32_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, u64s, |v, p, k, vs| v.visit_u64_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, numbers, |v, p, k, vs| v.visit_number_pairs(p, k, vs), visitor);
    emit_scalar_pairs(path, strings, |v, p, k, vs| v.visit_string_pairs(p, k, vs), visitor);

    if !null_arrays.is_empty() {
        let keys: Vec<String> = null_arrays.iter().map(|(k, _)| k.clone()).collect();
        if visitor.visit_enter_null_array_pairs(path, &keys) == Policy::Include {
            for (key, len) in &null_arrays {
                visitor.visit_null_array_pair(path, key, *len);
            }
        }
        visitor.visit_leave_null_array_pairs(path);
    }

    emit_array_pairs(path, &arrays, ValueType::Bool, visitor, Visitor::visit_enter_bool_array_pairs, |v, p, k, av| {
        v.visit_bool_array_pair(p, k, as_bool(av))
    }, Visitor::visit_leave_bool_array_pairs);
    emit_array_pairs(path, &arrays, ValueType::I8, visitor, Visitor::visit_enter_i8_array_pairs, |v, p, k, av| {
        v.visit_i8_array_pair(p, k, as_i8(av))
    }, Visitor::visit_leave_i8_array_pairs);
    emit_array_pairs(path, &arrays, ValueType::I16, visitor, Visitor::visit_enter_i16_array_pairs, |v, p, k, av| {
        v.visit_i16_array_pair(p, k, as_i16(av))
    }, Visitor::visit_leave_i16_array_pairs);
    emit_array_pairs(path, &arrays, ValueType::I32, visitor, Visitor::visit_enter_i32_array_pairs, |v, p, k, av| {
        v.visit_i32_array_pair(p, k, as_i32(av))
    }, Visitor::visit_leave_i32_array_pairs);
    emit_array_pairs(path, &arrays, ValueType::I64, visitor, Visitor::visit_enter_i64_array_pairs, |v, p, k, av| {
        v.visit_i64_array_pair(p, k, as_i64(av))
    }, Visitor::visit_leave_i64_array_pairs);
    emit_array_pairs(path, &arrays, ValueType::U8, visitor, Visitor::visit_enter_u8_array_pairs, |v, p, k, av| {
        v.visit_u8_array_pair(p, k, as_u8(av))
    }, Visitor::visit_leave_u8_array_pairs);
    emit_array_pairs(path, &arrays, ValueType::U16, visitor, Visitor::visit_enter_u16_array_pairs, |v, p, k, av| {
        v.visit_u16_array_pair(p, k, as_u16(av))
    }, Visitor::visit_leave_u16_array_pairs);
    emit_array_pairs(path, &arrays, ValueType::U32, visitor, Visitor::visit_enter_u32_array_pairs, |v, p, k, av| {
        v.visit_u32_array_pair(p, k, as_u32(av))
    }, Visitor::visit_leave_u32_array_pairs);
    emit_array_pairs(path, &arrays, ValueType::U64, visitor, Visitor::visit_enter_u64_array_pairs, |v, p, k, av| {
        v.visit_u64_array_pair(p, k, as_u64(av))
    }, Visitor::visit_leave_u64_array_pairs);
    emit_array_pairs(path, &arrays, ValueType::F32, visitor, Visitor::visit_enter_number_array_pairs, |v, p, k, av| {
        v.visit_number_array_pair(p, k, as_f32(av))
    }, Visitor::visit_leave_number_array_pairs);
    emit_string_array_pairs(path, &arrays, visitor);

    for (key, child) in &objects {
        path.push(key.clone());
        walk_object(child, path, visitor, mask);
        path.pop();
    }

    for (key, rows) in &object_arrays {
        if visitor.before_visit_object_array(path, key) == Policy::Exclude {
            continue;
        }
        let mut skip_objects = vec![false; rows.len()];
        visitor.before_visit_object_array_objects(path, key, rows.len(), &mut skip_objects);
        path.push(key.clone());
        for (idx, row) in rows.iter().enumerate() {
            if skip_objects[idx] {
                continue;
            }
            for (field_key, value) in row.fields() {
                visitor.visit_object_array_object_property(path, key, idx, field_key, value);
            }
        }
        path.pop();
        visitor.did_exit_object_array(path, key);
    }

    visitor.after_object_visit(path);
}

fn push_pair<T>(acc: &mut (Vec<String>, Vec<T>), key: &str, value: T) {
    acc.0.push(key.to_string());
    acc.1.push(value);
}

fn emit_scalar_pairs<T, V: Visitor>(
    path: &[String],
    pairs: (Vec<String>, Vec<T>),
    call: impl FnOnce(&mut V, &[String], &[String], &[T]),
    visitor: &mut V,
) {
    if !pairs.0.is_empty() {
        call(visitor, path, &pairs.0, &pairs.1);
    }
}

fn array_element_type(av: &ArrayValue) -> ValueType {
    match av {
        ArrayValue::Null(_) => ValueType::Null,
        ArrayValue::Bool(_) => ValueType::Bool,
        ArrayValue::I8(_) => ValueType::I8,
        ArrayValue::I16(_) => ValueType::I16,
        ArrayValue::I32(_) => ValueType::I32,
        ArrayValue::I64(_) => ValueType::I64,
        ArrayValue::U8(_) => ValueType::U8,
        ArrayValue::U16(_) => ValueType::U16,
        ArrayValue::U32(_) => ValueType::U32,
        ArrayValue::U64(_) => ValueType::U64,
        ArrayValue::F32(_) => ValueType::F32,
        ArrayValue::String(_) => ValueType::String,
        ArrayValue::Object(_) => ValueType::Object,
    }
}

macro_rules! array_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        fn $name(av: &ArrayValue) -> &[$ty] {
            match av {
                ArrayValue::$variant(v) => v.as_slice(),
                _ => unreachable!("emit_array_pairs only calls this for its own type bucket"),
            }
        }
    };
}
array_accessor!(as_bool, Bool, bool);
array_accessor!(as_i8, I8, i8);
array_accessor!(as_i16, I16, i16);
array_accessor!(as_i32, I32, i32);
array_accessor!(as_i64, I64, i64);
array_accessor!(as_u8, U8, u8);
array_accessor!(as_u16, U16, u16);
array_accessor!(as_u32, U32, u32);
array_accessor!(as_u64, U64, u64);
array_accessor!(as_f32, F32, f32);

#[allow(clippy::too_many_arguments)]
fn emit_array_pairs<V: Visitor + ?Sized>(
    path: &[String],
    arrays: &BTreeMap<ValueType, (Vec<String>, Vec<&ArrayValue>)>,
    ty: ValueType,
    visitor: &mut V,
    enter: impl FnOnce(&mut V, &[String], &[String]) -> Policy,
    visit_one: impl Fn(&mut V, &[String], &str, &ArrayValue),
    leave: impl FnOnce(&mut V, &[String]),
) {
    let Some((keys, values)) = arrays.get(&ty) else { return };
    if enter(visitor, path, keys) == Policy::Include {
        for (key, av) in keys.iter().zip(values.iter()) {
            visit_one(visitor, path, key, av);
        }
    }
    leave(visitor, path);
}

fn emit_string_array_pairs(path: &[String], arrays: &BTreeMap<ValueType, (Vec<String>, Vec<&ArrayValue>)>, visitor: &mut impl Visitor) {
    let Some((keys, values)) = arrays.get(&ValueType::String) else { return };
    if visitor.visit_enter_string_array_pairs(path, keys) == Policy::Include {
        for (key, av) in keys.iter().zip(values.iter()) {
            let ArrayValue::String(strings) = av else {
                unreachable!("bucketed under ValueType::String");
            };
            visitor.visit_string_array_pair(path, key, strings);
        }
    }
    visitor.visit_leave_string_array_pairs(path);
}

/// A basic visitor that collects the path and value of every leaf field,
/// for tests and simple inspection tasks.
#[derive(Debug, Default)]
pub struct CollectingVisitor {
    pub fields: Vec<(Vec<String>, Value)>,
}

impl Visitor for CollectingVisitor {
    fn visit_null_pairs(&mut self, path: &[String], keys: &[String]) {
        for key in keys {
            self.fields.push((push_key(path, key), Value::Null));
        }
    }
    fn visit_bool_pairs(&mut self, path: &[String], keys: &[String], values: &[bool]) {
        collect_scalar(&mut self.fields, path, keys, values, |v| Value::Bool(v));
    }
    fn visit_i32_pairs(&mut self, path: &[String], keys: &[String], values: &[i32]) {
        collect_scalar(&mut self.fields, path, keys, values, Value::I32);
    }
    fn visit_i64_pairs(&mut self, path: &[String], keys: &[String], values: &[i64]) {
        collect_scalar(&mut self.fields, path, keys, values, Value::I64);
    }
    fn visit_u64_pairs(&mut self, path: &[String], keys: &[String], values: &[u64]) {
        collect_scalar(&mut self.fields, path, keys, values, Value::U64);
    }
    fn visit_number_pairs(&mut self, path: &[String], keys: &[String], values: &[f32]) {
        collect_scalar(&mut self.fields, path, keys, values, Value::F32);
    }
    fn visit_string_pairs(&mut self, path: &[String], keys: &[String], values: &[String]) {
        collect_scalar(&mut self.fields, path, keys, values, |v: String| Value::String(v));
    }
    fn visit_string_array_pair(&mut self, path: &[String], key: &str, values: &[String]) {
        self.fields.push((push_key(path, key), Value::Array(ArrayValue::String(values.to_vec()))));
    }
    fn visit_i32_array_pair(&mut self, path: &[String], key: &str, values: &[i32]) {
        self.fields.push((push_key(path, key), Value::Array(ArrayValue::I32(values.to_vec()))));
    }
    fn visit_object_array_object_property(
        &mut self,
        path: &[String],
        array_key: &str,
        _object_idx: usize,
        field_key: &str,
        value: &Value,
    ) {
        let mut p = push_key(path, array_key);
        p.push(field_key.to_string());
        self.fields.push((p, value.clone()));
    }
}

fn push_key(path: &[String], key: &str) -> Vec<String> {
    let mut p = path.to_vec();
    p.push(key.to_string());
    p
}

fn collect_scalar<T: Clone>(
    fields: &mut Vec<(Vec<String>, Value)>,
    path: &[String],
    keys: &[String],
    values: &[T],
    into: impl Fn(T) -> Value,
) {
    for (key, value) in keys.iter().zip(values.iter()) {
        fields.push((push_key(path, key), into(value.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_nested_paths() {
        let mut inner = Document::new();
        inner.insert("city", Value::String("nyc".into()));
        let mut doc = Document::new();
        doc.insert("name", Value::String("ada".into()));
        doc.insert("address", Value::Object(inner));

        let mut visitor = CollectingVisitor::default();
        walk(&doc, &mut visitor);

        let paths: Vec<Vec<String>> = visitor.fields.iter().map(|(p, _)| p.clone()).collect();
        assert!(paths.contains(&vec!["name".to_string()]));
        assert!(paths.contains(&vec!["address".to_string(), "city".to_string()]));
    }

    struct ExcludeKey(String);
    impl Visitor for ExcludeKey {
        fn before_object_visit(&mut self, path: &[String]) -> Policy {
            if path.last() == Some(&self.0) {
                Policy::Exclude
            } else {
                Policy::Include
            }
        }
    }

    #[test]
    fn exclude_policy_skips_subtree() {
        let mut secret = Document::new();
        secret.insert("ssn", Value::String("hidden".into()));
        let mut doc = Document::new();
        doc.insert("secret", Value::Object(secret));

        struct Combined {
            exclude: ExcludeKey,
            collector: CollectingVisitor,
        }
        impl Visitor for Combined {
            fn before_object_visit(&mut self, path: &[String]) -> Policy {
                self.exclude.before_object_visit(path)
            }
            fn visit_string_pairs(&mut self, path: &[String], keys: &[String], values: &[String]) {
                self.collector.visit_string_pairs(path, keys, values);
            }
        }
        let mut combined =
            Combined { exclude: ExcludeKey("secret".to_string()), collector: CollectingVisitor::default() };
        walk(&doc, &mut combined);
        assert!(combined.collector.fields.is_empty());
    }

    #[test]
    fn object_array_properties_are_visited_per_object() {
        let mut a = Document::new();
        a.insert("n", Value::I32(1));
        let mut b = Document::new();
        b.insert("n", Value::I32(2));
        let mut doc = Document::new();
        doc.insert("items", Value::Array(ArrayValue::Object(vec![a, b])));

        let mut visitor = CollectingVisitor::default();
        walk(&doc, &mut visitor);
        assert_eq!(visitor.fields.len(), 2);
    }

    #[test]
    fn skip_objects_mask_excludes_an_object() {
        struct SkipFirst;
        impl Visitor for SkipFirst {
            fn before_visit_object_array_objects(
                &mut self,
                _path: &[String],
                _key: &str,
                _num_objects: usize,
                skip_objects: &mut [bool],
            ) {
                if !skip_objects.is_empty() {
                    skip_objects[0] = true;
                }
            }
        }

        struct Combined {
            skip: SkipFirst,
            collector: CollectingVisitor,
        }
        impl Visitor for Combined {
            fn before_visit_object_array_objects(
                &mut self,
                path: &[String],
                key: &str,
                num_objects: usize,
                skip_objects: &mut [bool],
            ) {
                self.skip.before_visit_object_array_objects(path, key, num_objects, skip_objects);
            }
            fn visit_object_array_object_property(
                &mut self,
                path: &[String],
                array_key: &str,
                object_idx: usize,
                field_key: &str,
                value: &Value,
            ) {
                self.collector.visit_object_array_object_property(path, array_key, object_idx, field_key, value);
            }
        }

        let mut a = Document::new();
        a.insert("n", Value::I32(1));
        let mut b = Document::new();
        b.insert("n", Value::I32(2));
        let mut doc = Document::new();
        doc.insert("items", Value::Array(ArrayValue::Object(vec![a, b])));

        let mut combined = Combined { skip: SkipFirst, collector: CollectingVisitor::default() };
        walk(&doc, &mut combined);
        assert_eq!(combined.collector.fields.len(), 1);
        assert_eq!(combined.collector.fields[0].1, Value::I32(2));
    }
}
