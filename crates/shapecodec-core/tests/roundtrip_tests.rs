/// Encode-then-decode roundtrips for described types, and text roundtrips
/// through dynamic values.
mod common;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::Arc;

use common::*;
use shapecodec_core::{
    from_slice, from_slice_with, to_string, to_vec, to_vec_pretty, DecodeOptions, Describe, Dynamic, EncodeOptions,
};

/// Assert that encode → decode reproduces `value`.
fn assert_roundtrip<T: Describe + PartialEq + Debug>(value: T) {
    let bytes = to_vec(&value).expect("encode failed");
    let back: T = from_slice(&bytes).expect("decode failed");
    assert_eq!(
        value,
        back,
        "Roundtrip failed:\n  encoded: {}",
        String::from_utf8_lossy(&bytes)
    );
}

/// Assert that JSON text survives decoding into a dynamic value and
/// re-encoding (as a JSON value; member order may change).
fn assert_text_roundtrip(json: &str) {
    let opts = DecodeOptions::default().with_use_number(true);
    let dynamic: Dynamic = from_slice_with(json.as_bytes(), &opts).expect("decode failed");
    let encoded = to_string(&dynamic).expect("encode failed");
    let original: serde_json::Value = serde_json::from_str(json).unwrap();
    let roundtripped: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(
        original, roundtripped,
        "Roundtrip failed:\n  input:  {json}\n  output: {encoded}"
    );
}

// ============================================================================
// Primitive Roundtrips
// ============================================================================

#[test]
fn roundtrip_integers() {
    assert_roundtrip(0i8);
    assert_roundtrip(i16::MIN);
    assert_roundtrip(i64::MAX);
    assert_roundtrip(u64::MAX);
    assert_roundtrip(usize::MAX);
}

#[test]
fn roundtrip_floats() {
    assert_roundtrip(0.1f64);
    assert_roundtrip(-2.5e-9f64);
    assert_roundtrip(1.7976931348623157e308f64);
    assert_roundtrip(3.25f32);
}

#[test]
fn roundtrip_text() {
    assert_roundtrip(String::new());
    assert_roundtrip("caf\u{e9} \u{4f60}\u{597d} \u{1F600}".to_string());
    assert_roundtrip("<tag attr=\"v\">&amp;</tag>\n\t\u{7}".to_string());
    assert_roundtrip("line\u{2028}sep".to_string());
    assert_roundtrip('\u{e9}');
}

// ============================================================================
// Container Roundtrips
// ============================================================================

#[test]
fn roundtrip_sequences() {
    assert_roundtrip(vec![vec![1u8, 2], vec![], vec![3]]);
    assert_roundtrip(VecDeque::from(vec!["a".to_string(), "b".to_string()]));
    assert_roundtrip([[1i32, 2], [3, 4]]);
}

#[test]
fn roundtrip_maps() {
    let mut m = HashMap::new();
    m.insert("x".to_string(), vec![true]);
    m.insert("y".to_string(), vec![]);
    assert_roundtrip(m);

    let keyed: BTreeMap<u16, String> = [(1, "one".to_string()), (20, "twenty".to_string())].into_iter().collect();
    assert_roundtrip(keyed);
}

#[test]
fn roundtrip_pointers() {
    assert_roundtrip(Box::new(Person {
        name: "boxed".into(),
        age: 1,
    }));
    assert_roundtrip(Arc::new(vec![1u8, 2]));
    assert_roundtrip(Rc::new("rc".to_string()));
    assert_roundtrip(Some(Some(5u8)));
}

// ============================================================================
// Record Roundtrips
// ============================================================================

#[test]
fn roundtrip_inventory() {
    assert_roundtrip(Inventory {
        id: 77,
        title: "Desk".into(),
        price: 199.99,
        tags: vec!["wood".into(), "large".into()],
        counts: [("left".to_string(), 2), ("right".to_string(), 0)].into_iter().collect(),
        owner: Some(Person {
            name: "Max".into(),
            age: 51,
        }),
        serial: -9,
        note: String::new(),
        flags: [false, true, false],
        internal: 0,
    });
}

#[test]
fn roundtrip_recursive_tree() {
    let mut tree = Node::chain(30);
    tree.children = vec![Node::chain(3), Node::leaf(-1)];
    assert_roundtrip(tree);
}

#[test]
fn roundtrip_deep_values_with_default_options() {
    assert_roundtrip(Node::chain(500));

    let mut nested = Dynamic::from(vec![Dynamic::null()]);
    for _ in 1..500 {
        nested = Dynamic::from(vec![nested]);
    }
    let bytes = to_vec(&nested).unwrap();
    assert_eq!(bytes.len(), 500 * 2 + "null".len());
    let back: Dynamic = from_slice(&bytes).unwrap();
    assert_eq!(to_vec(&back).unwrap(), bytes);
}

#[test]
fn roundtrip_embedded() {
    assert_roundtrip(Derived {
        base: Base { id: 4, kind: String::new() },
        kind: "k".into(),
        extra: false,
    });
}

#[test]
fn roundtrip_through_hooks() {
    let p = Palette {
        name: "cool".into(),
        colors: vec![Rgb(0, 128, 255)],
    };
    let back: Palette = from_slice(&to_vec(&p).unwrap()).unwrap();
    assert_eq!(back.colors, p.colors);
}

#[test]
fn roundtrip_indented_and_colorless_options() {
    let p = Person {
        name: "<ann>".into(),
        age: 3,
    };
    let pretty = to_vec_pretty(&p, "  ", "\t").unwrap();
    assert_eq!(from_slice::<Person>(&pretty).unwrap(), p);
    let raw = shapecodec_core::to_vec_with(&p, &EncodeOptions::default().with_escape_html(false)).unwrap();
    assert_eq!(from_slice::<Person>(&raw).unwrap(), p);
}

// ============================================================================
// Text Roundtrips
// ============================================================================

#[test]
fn roundtrip_text_scalars() {
    assert_text_roundtrip("null");
    assert_text_roundtrip("true");
    assert_text_roundtrip("-0.5e10");
    assert_text_roundtrip(r#""esc \" \\ \/ \n""#);
}

#[test]
fn roundtrip_text_nested() {
    assert_text_roundtrip(r#"{"a":{"b":[1,{"c":null}],"d":"x"},"e":[]}"#);
    assert_text_roundtrip(r#"[[[]],{},[{"k":false}]]"#);
}

#[test]
fn roundtrip_text_large_numbers() {
    assert_text_roundtrip("[12345678901234567890, 1e300, 0.000001]");
}
