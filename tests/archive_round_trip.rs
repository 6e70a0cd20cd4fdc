//! End-to-end scenarios exercising only the public API: build a `Document`,
//! write it, read it back, and check the result against what went in.

use carbon::reader::open_bytes;
use carbon::{ArrayValue, Document, Policy, Value, Visitor, read, walk, write};

fn doc_with_every_scalar() -> Document {
    let mut doc = Document::new();
    doc.insert("a_null", Value::Null);
    doc.insert("a_bool", Value::Bool(true));
    doc.insert("an_i8", Value::I8(-3));
    doc.insert("an_i16", Value::I16(-300));
    doc.insert("an_i32", Value::I32(-70000));
    doc.insert("an_i64", Value::I64(-5_000_000_000));
    doc.insert("a_u8", Value::U8(200));
    doc.insert("a_u16", Value::U16(60000));
    doc.insert("a_u32", Value::U32(4_000_000_000));
    doc.insert("a_u64", Value::U64(18_000_000_000_000_000_000));
    doc.insert("an_f32", Value::F32(std::f32::consts::PI));
    doc.insert("a_string", Value::String("hello carbon".to_string()));
    doc
}

#[test]
fn round_trips_every_scalar_type() {
    let doc = doc_with_every_scalar();
    let bytes = write(&doc).unwrap();
    let back = read(&bytes).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn round_trips_with_uncompressed_strings() {
    let doc = doc_with_every_scalar();
    let bytes = carbon::writer::write_with_compressor(&doc, carbon::compressor::CompressorTag::None).unwrap();
    let back = read(&bytes).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn round_trips_homogeneous_arrays_of_each_type() {
    let mut doc = Document::new();
    doc.insert("bools", Value::Array(ArrayValue::Bool(vec![true, false, true])));
    doc.insert("ints", Value::Array(ArrayValue::I32(vec![1, 2, 3, -4])));
    doc.insert("strings", Value::Array(ArrayValue::String(vec!["x".into(), "y".into(), "x".into()])));
    doc.insert("empties", Value::Array(ArrayValue::Null(5)));

    let bytes = write(&doc).unwrap();
    let back = read(&bytes).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn round_trips_deeply_nested_objects() {
    let mut leaf = Document::new();
    leaf.insert("value", Value::I32(42));

    let mut middle = Document::new();
    middle.insert("leaf", Value::Object(leaf));
    middle.insert("tag", Value::String("middle".into()));

    let mut root = Document::new();
    root.insert("middle", Value::Object(middle));
    root.insert("name", Value::String("root".into()));

    let bytes = write(&root).unwrap();
    let back = read(&bytes).unwrap();
    assert_eq!(back, root);
}

#[test]
fn round_trips_a_heterogeneous_object_array_via_column_groups() {
    let mut a = Document::new();
    a.insert("n", Value::I32(1));
    a.insert("label", Value::String("a".into()));
    let mut b = Document::new();
    b.insert("n", Value::I32(2));
    b.insert("extra", Value::Bool(true));

    let mut doc = Document::new();
    doc.insert("rows", Value::Array(ArrayValue::Object(vec![a, b])));

    let bytes = write(&doc).unwrap();
    let back = read(&bytes).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn open_exposes_the_string_table_alongside_the_root() {
    let mut doc = Document::new();
    doc.insert("city", Value::String("berlin".into()));

    let bytes = write(&doc).unwrap();
    let archive = open_bytes(&bytes).unwrap();
    assert_eq!(archive.root, doc);
    assert!(archive.string_table().iter().any(|(_, s)| *s == "berlin"));
    assert!(archive.string_table().iter().any(|(_, s)| *s == "city"));
}

#[test]
fn rejects_truncated_archives() {
    let doc = doc_with_every_scalar();
    let mut bytes = write(&doc).unwrap();
    bytes.truncate(bytes.len() / 2);
    assert!(read(&bytes).is_err());
}

#[derive(Default)]
struct FieldCounter {
    count: usize,
}

impl Visitor for FieldCounter {
    fn visit_string_pairs(&mut self, _path: &[String], keys: &[String], _values: &[String]) {
        self.count += keys.len();
    }
    fn visit_i32_pairs(&mut self, _path: &[String], keys: &[String], _values: &[i32]) {
        self.count += keys.len();
    }
}

struct SkipSubtree(String);
impl Visitor for SkipSubtree {
    fn before_object_visit(&mut self, path: &[String]) -> Policy {
        if path.last() == Some(&self.0) { Policy::Exclude } else { Policy::Include }
    }
}

#[test]
fn visitor_walk_sees_every_leaf_field_through_the_public_api() {
    let mut inner = Document::new();
    inner.insert("x", Value::I32(1));
    inner.insert("y", Value::I32(2));
    let mut doc = Document::new();
    doc.insert("point", Value::Object(inner));
    doc.insert("label", Value::String("p".into()));

    struct Combined {
        skip: SkipSubtree,
        counter: FieldCounter,
    }
    impl Visitor for Combined {
        fn before_object_visit(&mut self, path: &[String]) -> Policy {
            self.skip.before_object_visit(path)
        }
        fn visit_string_pairs(&mut self, path: &[String], keys: &[String], values: &[String]) {
            self.counter.visit_string_pairs(path, keys, values);
        }
        fn visit_i32_pairs(&mut self, path: &[String], keys: &[String], values: &[i32]) {
            self.counter.visit_i32_pairs(path, keys, values);
        }
    }

    let mut all = FieldCounter::default();
    walk(&doc, &mut all);
    assert_eq!(all.count, 3);

    let mut excluding = Combined { skip: SkipSubtree("point".to_string()), counter: FieldCounter::default() };
    walk(&doc, &mut excluding);
    assert_eq!(excluding.counter.count, 1);
}

#[cfg(feature = "json")]
#[test]
fn builds_a_document_from_json_and_round_trips_it() {
    let json = r#"{
        "name": "ada",
        "age": 36,
        "tags": ["pioneer", "mathematician"],
        "address": {"city": "london"}
    }"#;
    let doc = Document::from_json_str(json).unwrap();
    let bytes = write(&doc).unwrap();
    let back = read(&bytes).unwrap();
    assert_eq!(back, doc);
}
