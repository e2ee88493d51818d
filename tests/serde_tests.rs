//! Wire-format round-trip tests
//!
//! Every variant must survive serialize → deserialize field-wise intact,
//! through whichever dispatch path its records use: the variant tag for
//! chain/group/chord, the dedicated task name for map/starmap/chunks.

use serde_json::{json, Value};
use weft::{
    Chain, Chord, ChunkPartitioner, Descriptor, ElementwiseMap, Group, Signature, StarMap,
};

fn sig(name: &str) -> Signature {
    Signature::Task(Descriptor::new(name))
}

fn round_trip(sig: &Signature) -> Signature {
    let wire = serde_json::to_string(sig).unwrap();
    serde_json::from_str(&wire).unwrap()
}

#[test]
fn descriptor_round_trips() {
    let mut kwargs = serde_json::Map::new();
    kwargs.insert("debug".into(), json!(true));
    let original = Signature::Task(
        Descriptor::new("tasks.add")
            .with_args(vec![json!(2), json!(2)])
            .with_kwargs(kwargs)
            .with_immutable(true),
    );
    assert_eq!(round_trip(&original), original);
}

#[test]
fn chain_round_trips_with_members() {
    let original = Signature::Chain(Chain::new([sig("a"), sig("b"), sig("c")]));
    assert_eq!(round_trip(&original), original);
}

#[test]
fn group_round_trips_with_members() {
    let original = Signature::Group(Group::new([sig("a"), sig("b")]));
    assert_eq!(round_trip(&original), original);
}

#[test]
fn chord_round_trips_with_and_without_body() {
    let with_body = Signature::Chord(Chord::new(
        Group::new([sig("add"), sig("add")]),
        Some(sig("tsum")),
    ));
    assert_eq!(round_trip(&with_body), with_body);

    let bodiless = Signature::Chord(Chord::new(Group::new([sig("add")]), None));
    let back = round_trip(&bodiless);
    assert_eq!(back, bodiless);
    match back {
        Signature::Chord(chord) => assert!(chord.body().is_none()),
        other => panic!("expected chord, got {other}"),
    }
}

#[test]
fn map_and_starmap_round_trip_via_task_name() {
    let items: Vec<Value> = (0..5).map(|i| json!(i)).collect();
    let map = Signature::Map(ElementwiseMap::new(sig("add"), items.clone()));
    assert_eq!(round_trip(&map), map);

    let star = Signature::StarMap(StarMap::new(sig("add"), items));
    assert_eq!(round_trip(&star), star);
}

#[test]
fn chunks_round_trip_preserves_size() {
    let items: Vec<Value> = (0..10).map(|i| json!(i)).collect();
    let chunks =
        Signature::Chunks(ChunkPartitioner::new(sig("add"), items, 3).unwrap());
    let back = round_trip(&chunks);
    assert_eq!(back, chunks);
    match back {
        Signature::Chunks(chunks) => assert_eq!(chunks.size(), 3),
        other => panic!("expected chunks, got {other}"),
    }
}

#[test]
fn nested_composites_round_trip() {
    let pipeline = Signature::Chain(Chain::new([
        sig("fetch"),
        Signature::Group(Group::new([sig("resize"), sig("annotate")])),
        Signature::Map(ElementwiseMap::new(sig("upload"), vec![json!("a"), json!("b")])),
    ]));
    assert_eq!(round_trip(&pipeline), pipeline);
}

#[test]
fn wire_shape_matches_the_record_contract() {
    let wire: Value =
        serde_json::to_value(Signature::Chain(Chain::new([sig("a")]))).unwrap();
    assert_eq!(wire["task"], json!("weft.chain"));
    assert_eq!(wire["variantTag"], json!("chain"));
    assert!(wire["args"].as_array().unwrap().is_empty());
    assert!(wire["kwargs"]["tasks"].is_array());
    assert_eq!(wire["immutable"], json!(false));
}

#[test]
fn fan_out_wire_records_carry_no_tag() {
    let wire: Value = serde_json::to_value(Signature::Map(ElementwiseMap::new(
        sig("add"),
        vec![json!(1)],
    )))
    .unwrap();
    assert_eq!(wire["task"], json!("weft.map"));
    assert!(wire.get("variantTag").is_none());
    assert_eq!(wire["immutable"], json!(true));
}

#[test]
fn linked_callbacks_survive_the_round_trip() {
    let mut task = sig("a");
    task.link(sig("on_success")).unwrap();
    task.link_error(sig("on_failure")).unwrap();
    let back = round_trip(&task);
    assert_eq!(back, task);
    let flat = back.flatten_links().unwrap();
    assert_eq!(flat.len(), 2);
    assert_eq!(flat[1].task_name(), "on_success");
}
