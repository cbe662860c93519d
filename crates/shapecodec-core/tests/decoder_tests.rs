/// Input-side contract tests: duplicate keys, unknown fields, null handling,
/// type mismatches with paths, syntax offsets and decode limits.
mod common;

use std::collections::{BTreeMap, HashMap};

use common::*;
use shapecodec_core::{
    from_slice, from_slice_into, from_slice_into_with, from_slice_with, from_str, valid, CancelToken, CodecError,
    DecodeOptions, DuplicateKeyPolicy, Dynamic, Number, RawValue,
};

fn first_wins() -> DecodeOptions {
    DecodeOptions::default().with_duplicate_keys(DuplicateKeyPolicy::FirstWins)
}

fn assert_syntax_at(err: CodecError, expected: usize) {
    match err {
        CodecError::Syntax { offset, .. } => assert_eq!(offset, expected),
        other => panic!("expected syntax error, got {other:?}"),
    }
}

fn assert_mismatch(err: CodecError, expected_path: &str) {
    match err {
        CodecError::TypeMismatch { path, .. } => assert_eq!(path, expected_path),
        other => panic!("expected type mismatch, got {other:?}"),
    }
}

// ============================================================================
// Records
// ============================================================================

#[test]
fn decode_record() {
    let p: Person = from_str(r#"{"Name":"Ann","Age":3}"#).unwrap();
    assert_eq!(
        p,
        Person {
            name: "Ann".into(),
            age: 3
        }
    );
}

#[test]
fn keys_match_case_insensitively() {
    let p: Person = from_str(r#"{"name":"x","AGE":4}"#).unwrap();
    assert_eq!(p.name, "x");
    assert_eq!(p.age, 4);
}

#[test]
fn absent_fields_keep_current_values() {
    let mut p = Person {
        name: "keep".into(),
        age: 9,
    };
    from_slice_into(br#"{"Age":10}"#, &mut p).unwrap();
    assert_eq!(p.name, "keep");
    assert_eq!(p.age, 10);
}

#[test]
fn field_tags_on_input() {
    let inv: Inventory = from_str(
        r#"{"id":3,"tags":["a","b"],"owner":{"Name":"z"},"serial":"77","Note":"n","note":"n","internal":4}"#,
    )
    .unwrap();
    assert_eq!(inv.id, 3);
    assert_eq!(inv.tags, ["a", "b"]);
    assert_eq!(inv.owner.as_ref().map(|p| p.name.as_str()), Some("z"));
    assert_eq!(inv.serial, 77);
    assert_eq!(inv.note, "");
    assert_eq!(inv.internal, 0);
}

#[test]
fn quoted_field_requires_quoted_scalar() {
    let err = from_str::<Inventory>(r#"{"serial":77}"#).unwrap_err();
    assert_mismatch(err, "$.serial");
    let err = from_str::<Inventory>(r#"{"serial":"7x"}"#).unwrap_err();
    assert_mismatch(err, "$.serial");
}

#[test]
fn embedded_fields_decode_into_promoted_target() {
    let d: Derived = from_str(r#"{"ID":5,"Kind":"k","Extra":true}"#).unwrap();
    assert_eq!(d.base.id, 5);
    assert_eq!(d.kind, "k");
    assert_eq!(d.base.kind, "");
    assert!(d.extra);
}

#[test]
fn recursive_type_decodes() {
    let n: Node = from_str(r#"{"value":1,"children":[{"value":2}],"next":{"value":3,"next":{"value":4}}}"#).unwrap();
    assert_eq!(n.children, vec![Node::leaf(2)]);
    let third = n.next.as_ref().unwrap();
    assert_eq!(third.value, 3);
    assert_eq!(third.next.as_ref().unwrap().value, 4);
}

// ============================================================================
// Duplicate keys
// ============================================================================

#[test]
fn last_occurrence_wins_by_default() {
    let k: Keyed = from_str(r#"{"a":1,"a":2}"#).unwrap();
    assert_eq!(k.a, 2);
}

#[test]
fn first_occurrence_wins_when_configured() {
    let k: Keyed = from_slice_with(br#"{"a":1,"a":2}"#, &first_wins()).unwrap();
    assert_eq!(k.a, 1);

    let m: BTreeMap<String, u8> = from_slice_with(br#"{"x":1,"y":5,"x":2}"#, &first_wins()).unwrap();
    assert_eq!(m.get("x"), Some(&1));
    assert_eq!(m.get("y"), Some(&5));

    let d: Dynamic = from_slice_with(br#"{"x":"first","x":"second"}"#, &first_wins()).unwrap();
    assert_eq!(d.get("x").and_then(Dynamic::as_str), Some("first"));
}

#[test]
fn discarded_duplicate_still_validated() {
    let err = from_slice_with::<Keyed>(br#"{"a":1,"a":[1,}"#, &first_wins()).unwrap_err();
    assert_syntax_at(err, 14);
}

// ============================================================================
// Unknown fields
// ============================================================================

#[test]
fn unknown_fields_skipped() {
    let p: Person = from_str(r#"{"Name":"a","x":{"deep":[1,2,{"y":null}]},"Age":2}"#).unwrap();
    assert_eq!(p.age, 2);
}

#[test]
fn unknown_fields_denied() {
    let opts = DecodeOptions::default().with_deny_unknown_fields(true);
    match from_slice_with::<Person>(br#"{"Name":"a","x":1}"#, &opts).unwrap_err() {
        CodecError::UnknownField { key, offset, .. } => {
            assert_eq!(key, "x");
            assert_eq!(offset, 12);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Null semantics
// ============================================================================

#[test]
fn null_leaves_scalars_and_structs_unchanged() {
    let mut p = Person {
        name: "n".into(),
        age: 1,
    };
    from_slice_into(br#"{"Name":null,"Age":null}"#, &mut p).unwrap();
    assert_eq!(p.name, "n");
    assert_eq!(p.age, 1);
    from_slice_into(b"null", &mut p).unwrap();
    assert_eq!(p.age, 1);
}

#[test]
fn null_clears_options_sequences_and_maps() {
    let mut inv = Inventory {
        tags: vec!["t".into()],
        owner: Some(Person::default()),
        counts: [("a".to_string(), 1)].into_iter().collect(),
        ..Inventory::default()
    };
    from_slice_into(br#"{"tags":null,"owner":null,"counts":null}"#, &mut inv).unwrap();
    assert!(inv.tags.is_empty());
    assert!(inv.owner.is_none());
    assert!(inv.counts.is_empty());
}

// ============================================================================
// Sequences and maps
// ============================================================================

#[test]
fn fixed_arrays_zero_missing_and_drop_extra_elements() {
    let mut flags = [true, true, true];
    from_slice_into(b"[false]", &mut flags).unwrap();
    assert_eq!(flags, [false, false, false]);
    let flags: [bool; 3] = from_str("[true,true,true,true,true]").unwrap();
    assert_eq!(flags, [true, true, true]);
}

#[test]
fn vectors_are_replaced() {
    let mut v = vec![9u8, 9, 9];
    from_slice_into(b"[1]", &mut v).unwrap();
    assert_eq!(v, [1]);
}

#[test]
fn maps_keep_existing_entries() {
    let mut m: HashMap<String, u32> = [("keep".to_string(), 1)].into_iter().collect();
    from_slice_into(br#"{"new":2}"#, &mut m).unwrap();
    assert_eq!(m.len(), 2);
    assert_eq!(m["keep"], 1);
    assert_eq!(m["new"], 2);
}

#[test]
fn integer_map_keys() {
    let m: BTreeMap<i32, bool> = from_str(r#"{"-4":true,"10":false}"#).unwrap();
    assert_eq!(m.get(&-4), Some(&true));
    assert_eq!(m.get(&10), Some(&false));
    let err = from_str::<BTreeMap<i32, bool>>(r#"{"zz":true}"#).unwrap_err();
    assert!(matches!(err, CodecError::TypeMismatch { .. }), "{err:?}");
}

// ============================================================================
// Type mismatches
// ============================================================================

#[test]
fn mismatch_reports_path_type_and_offset() {
    match from_str::<Person>(r#"{"Name":5}"#).unwrap_err() {
        CodecError::TypeMismatch {
            found,
            type_name,
            path,
            offset,
        } => {
            assert_eq!(found, "number");
            assert_eq!(type_name, "String");
            assert_eq!(path, "$.Name");
            assert_eq!(offset, 8);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn mismatch_paths_through_containers() {
    assert_mismatch(from_str::<Inventory>(r#"{"tags":["a",1]}"#).unwrap_err(), "$.tags[1]");
    assert_mismatch(from_str::<Inventory>(r#"{"counts":{"a":"x"}}"#).unwrap_err(), "$.counts.a");
    assert_mismatch(from_str::<u8>(r#""s""#).unwrap_err(), "$");
}

#[test]
fn integer_widths_enforced() {
    assert!(matches!(from_str::<u8>("300"), Err(CodecError::TypeMismatch { .. })));
    assert!(matches!(from_str::<u32>("-1"), Err(CodecError::TypeMismatch { .. })));
    assert!(matches!(from_str::<i64>("1.5"), Err(CodecError::TypeMismatch { .. })));
    assert_eq!(from_str::<i16>("-32768").unwrap(), i16::MIN);
    assert_eq!(from_str::<f32>("2.5e1").unwrap(), 25.0);
}

// ============================================================================
// Syntax
// ============================================================================

#[test]
fn trailing_comma_reported_at_offset() {
    assert_syntax_at(from_str::<Keyed>(r#"{"a":1,}"#).unwrap_err(), 7);
}

#[test]
fn trailing_bytes_rejected() {
    assert_syntax_at(from_str::<Keyed>(r#"{"a":1} x"#).unwrap_err(), 8);
    assert!(from_str::<Keyed>("{\"a\":1} \n\t").is_ok());
}

#[test]
fn empty_and_truncated_input() {
    assert_syntax_at(from_str::<u8>("").unwrap_err(), 0);
    assert_syntax_at(from_str::<Vec<u8>>("[1,2").unwrap_err(), 4);
}

#[test]
fn invalid_escape_rejected() {
    assert!(matches!(from_str::<String>(r#""a\x""#), Err(CodecError::Syntax { .. })));
}

#[test]
fn escapes_and_surrogate_pairs_decoded() {
    let text = format!("\"{}{}{}\"", u("0041"), u("d83d"), u("de00"));
    let s: String = from_str(&text).unwrap();
    assert_eq!(s, "A\u{1F600}");
}

#[test]
fn valid_checks_syntax_only() {
    assert!(valid(br#"{"a":[1,2,{"b":null}]}"#));
    assert!(valid(b"  3  "));
    assert!(!valid(b"[1,]"));
    assert!(!valid(b"1 2"));
    assert!(!valid(b""));
}

// ============================================================================
// Limits
// ============================================================================

fn nested_arrays(levels: usize) -> String {
    format!("{}1{}", "[".repeat(levels), "]".repeat(levels))
}

#[test]
fn nesting_beyond_max_depth_rejected() {
    let ordinary = nested_arrays(500);
    assert!(from_str::<Dynamic>(&ordinary).is_ok());

    let deep = nested_arrays(1001);
    let err = from_str::<Dynamic>(&deep).unwrap_err();
    assert_syntax_at(err, 1000);

    let opts = DecodeOptions::default().with_max_depth(1001);
    assert!(from_slice_with::<Dynamic>(deep.as_bytes(), &opts).is_ok());
}

#[test]
fn very_deep_input_decodes_with_raised_limit() {
    for levels in [10_000, 200_000] {
        let deep = nested_arrays(levels);
        let opts = DecodeOptions::default().with_max_depth(levels + 1);
        let d: Dynamic = from_slice_with(deep.as_bytes(), &opts).unwrap();
        assert!(d.as_array().is_some_and(|a| a.len() == 1));

        let raw: RawValue = from_slice_with(deep.as_bytes(), &opts).unwrap();
        assert_eq!(raw.get().len(), deep.len());
        assert!(valid(deep.as_bytes()));

        let err = from_slice_with::<Dynamic>(deep.as_bytes(), &opts.clone().with_max_depth(levels / 2)).unwrap_err();
        assert_syntax_at(err, levels / 2);
    }
}

#[test]
fn deep_typed_input_fails_with_depth_error() {
    let levels = 20_000;
    let mut text = r#"{"value":0,"next":"#.repeat(levels);
    text.push_str("null");
    text.push_str(&"}".repeat(levels));
    let opts = DecodeOptions::default().with_max_depth(levels * 2);
    let err = from_slice_with::<Node>(text.as_bytes(), &opts).unwrap_err();
    assert!(matches!(err, CodecError::Syntax { .. }), "{err:?}");
    assert!(err.to_string().contains("exceeded max depth"), "{err}");
}

#[test]
fn recursive_types_decode_deep_chains() {
    let chain = Node::chain(400);
    let text = shapecodec_core::to_vec(&chain).unwrap();
    let back: Node = from_slice(&text).unwrap();
    assert_eq!(back, chain);
}

#[test]
fn cancelled_token_stops_decoding() {
    let token = CancelToken::new();
    token.cancel();
    let opts = DecodeOptions::default().with_cancel(token);
    let err = from_slice_with::<Vec<u8>>(b"[1,2]", &opts).unwrap_err();
    assert!(matches!(err, CodecError::Cancelled));
}

// ============================================================================
// Dynamic, Number and RawValue destinations
// ============================================================================

#[test]
fn dynamic_generic_forms() {
    let d: Dynamic = from_str(r#"{"a":[1,"x",true,null],"b":{"c":2.5}}"#).unwrap();
    let a = d.get("a").and_then(Dynamic::as_array).unwrap();
    assert_eq!(a[0].as_f64(), Some(1.0));
    assert_eq!(a[1].as_str(), Some("x"));
    assert_eq!(a[2].as_bool(), Some(true));
    assert!(a[3].is_null());
    assert_eq!(d.get("b").and_then(|b| b.get("c")).and_then(Dynamic::as_f64), Some(2.5));
}

#[test]
fn dynamic_numbers_kept_as_text_with_use_number() {
    let opts = DecodeOptions::default().with_use_number(true);
    let d: Dynamic = from_slice_with(br#"{"n":1.50,"big":123456789012345678901234567890}"#, &opts).unwrap();
    assert_eq!(d.get("n").and_then(Dynamic::as_number).map(Number::as_str), Some("1.50"));
    assert_eq!(
        d.get("big").and_then(Dynamic::as_number).map(Number::as_str),
        Some("123456789012345678901234567890")
    );
}

#[test]
fn number_destination() {
    assert_eq!(from_str::<Number>("12.50").unwrap().as_str(), "12.50");
    assert_eq!(from_str::<Number>(r#""7""#).unwrap().as_str(), "7");
    assert!(matches!(from_str::<Number>(r#""x""#), Err(CodecError::TypeMismatch { .. })));
}

#[test]
fn raw_value_captures_text_verbatim() {
    let v: Vec<RawValue> = from_str(r#"[ {"a" : 1} , "s" ]"#).unwrap();
    assert_eq!(v[0].get(), r#"{"a" : 1}"#);
    assert_eq!(v[1].get(), r#""s""#);
}

#[test]
fn decode_hook_receives_value_text() {
    let p: Palette = from_str(r##"{"name":"p","colors":["#0a0b0c","#ffffff"]}"##).unwrap();
    assert_eq!(p.colors, vec![Rgb(10, 11, 12), Rgb(255, 255, 255)]);

    match from_str::<Palette>(r#"{"colors":["nope"]}"#).unwrap_err() {
        CodecError::Hook { routine, .. } => assert_eq!(routine, "decode_json"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn decode_hooks_see_call_state() {
    assert_eq!(from_str::<Gauge>("0").unwrap(), Gauge::default());

    let opts = DecodeOptions::default().with_use_number(true).with_cancel(CancelToken::new());
    let nested: Vec<Vec<Gauge>> = from_slice_with(b"[[0]]", &opts).unwrap();
    assert_eq!(
        nested[0][0],
        Gauge {
            depth: 2,
            use_number: true,
            cancellable: true,
        }
    );
}

#[test]
fn types_without_zero_cannot_be_decoded_fresh() {
    let err = from_slice::<fn() -> u8>(b"null").unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedType { .. }), "{err:?}");
}

#[test]
fn options_reused_across_calls() {
    let opts = DecodeOptions::default().with_deny_unknown_fields(true);
    let mut k = Keyed::default();
    from_slice_into_with(br#"{"a":5}"#, &mut k, &opts).unwrap();
    assert_eq!(k.a, 5);
    assert!(from_slice_into_with(br#"{"b":5}"#, &mut k, &opts).is_err());
}
