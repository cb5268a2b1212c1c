//! Behavioural tests for the header map and message builder.
//!
//! These exercise the public API only, the way transports and adapters use
//! it.

use std::sync::Arc;
use std::thread;

use riff_proto::{Codec, HeaderError, HeaderMap, Message, MessageBuilder};
use rstest::{fixture, rstest};

#[fixture]
fn base() -> HeaderMap {
    HeaderMap::new()
        .add_header("Content-Type", ["application/json"])
        .unwrap()
        .add_header("X-Hop", ["gateway"])
        .unwrap()
}

#[rstest]
#[case("Content-Type")]
#[case("content-type")]
#[case("CONTENT-TYPE")]
#[case("cOnTeNt-TyPe")]
fn lookup_ignores_case(base: HeaderMap, #[case] name: &str) {
    assert_eq!(base.get_value(name), Some("application/json"));
    assert!(base.contains(name));
}

#[rstest]
fn derived_maps_leave_original_untouched(base: HeaderMap) {
    let snapshot = base.to_wire_form();

    let added = base.add_header("x-hop", ["sidecar"]).unwrap();
    let replaced = base.replace_header("X-HOP", ["function"]).unwrap();

    assert_eq!(base.to_wire_form(), snapshot);
    assert_eq!(added.get_values("X-Hop").unwrap(), ["gateway", "sidecar"]);
    assert_eq!(replaced.get_values("X-Hop").unwrap(), ["function"]);
    assert!(replaced.to_wire_form().contains_key("X-HOP"));
}

#[rstest]
#[case::string(HeaderMap::new().add_header("V", ["abc"]), "abc")]
#[case::integer(HeaderMap::new().add_header("V", [42_i64]), "42")]
#[case::negative(HeaderMap::new().add_header("V", [-7_i32]), "-7")]
#[case::boolean(HeaderMap::new().add_header("V", [false]), "false")]
#[case::float(HeaderMap::new().add_header("V", [1.5_f64]), "1.5")]
#[case::whole_float(HeaderMap::new().add_header("V", [2.0_f64]), "2")]
#[case::negative_zero(HeaderMap::new().add_header("V", [-0.0_f64]), "0")]
#[case::nan(HeaderMap::new().add_header("V", [f64::NAN]), "NaN")]
#[case::infinity(HeaderMap::new().add_header("V", [f64::NEG_INFINITY]), "-Infinity")]
fn values_are_coerced_to_strings(
    #[case] map: Result<HeaderMap, HeaderError>,
    #[case] expected: &str,
) {
    assert_eq!(map.unwrap().get_value("v"), Some(expected));
}

#[rstest]
fn empty_value_list_is_rejected(base: HeaderMap) {
    let err = base.add_header("X-Empty", Vec::<String>::new()).unwrap_err();
    assert_eq!(err, HeaderError::NoValues("X-Empty".into()));
    assert_eq!(err.error_type(), "no_values");

    assert!(base.replace_header("X-Hop", Vec::<&str>::new()).is_err());
    assert_eq!(base.get_value("x-hop"), Some("gateway"));
}

#[rstest]
fn require_value_reports_missing_header(base: HeaderMap) {
    assert_eq!(base.require_value("x-hop"), Ok("gateway"));
    assert_eq!(
        base.require_value("Authorization"),
        Err(HeaderError::MissingHeader("Authorization".into()))
    );
}

#[test]
fn wire_form_merges_keys_differing_in_case() {
    let map = HeaderMap::from_wire_form([
        ("Accept", vec!["a"]),
        ("accept", vec!["b"]),
        ("X-Empty", vec![]),
    ])
    .unwrap();

    assert_eq!(map.len(), 1);
    assert_eq!(map.get_values("ACCEPT").unwrap(), ["a", "b"]);
    assert!(!map.contains("X-Empty"));
}

#[test]
fn equality_ignores_insertion_order() {
    let a = HeaderMap::new()
        .add_header("A", [1])
        .unwrap()
        .add_header("B", [2])
        .unwrap();
    let b = HeaderMap::new()
        .add_header("B", [2])
        .unwrap()
        .add_header("A", [1])
        .unwrap();
    assert_eq!(a, b);

    let with_extra_value = HeaderMap::new()
        .add_header("A", [1])
        .unwrap()
        .add_header("B", [2])
        .unwrap()
        .add_header("a", [3])
        .unwrap();
    assert_ne!(a, with_extra_value);
}

#[test]
fn concurrent_branches_from_shared_builder() {
    let root = Arc::new(
        MessageBuilder::new()
            .add_header("Content-Type", ["text/plain"])
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let root = Arc::clone(&root);
            thread::spawn(move || {
                root.add_header("X-Branch", [i])
                    .unwrap()
                    .payload(format!("branch {i}"))
                    .build()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let message = handle.join().unwrap();
        assert_eq!(message.headers().get_values("x-branch").unwrap(), [i.to_string()]);
        assert_eq!(message.payload().as_ref(), format!("branch {i}").as_bytes());
    }

    let untouched = root.build();
    assert!(!untouched.headers().contains("X-Branch"));
    assert!(untouched.payload().is_empty());
}

#[rstest]
fn framed_message_survives_transport(base: HeaderMap) {
    let message = MessageBuilder::from_headers(base)
        .payload(&b"{\"ok\":true}"[..])
        .build();

    let mut codec = Codec::new();
    let frame = codec.encode(&message).unwrap().to_vec();
    let decoded: Message = Codec::decode(&frame).unwrap();

    assert_eq!(decoded, message);
    assert_eq!(decoded.headers().get_value("x-hop"), Some("gateway"));
}

#[rstest]
fn wire_form_round_trip_preserves_map(base: HeaderMap) {
    let map = base
        .add_header("x-hop", ["sidecar"])
        .unwrap()
        .add_header("Accept", ["*/*"])
        .unwrap();

    let restored = HeaderMap::from_wire_form(map.to_wire_form()).unwrap();

    assert_eq!(restored, map);
    assert_eq!(restored.to_wire_form(), map.to_wire_form());
}
