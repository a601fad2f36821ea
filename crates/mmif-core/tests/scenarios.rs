//! End-to-end scenarios over realistic MMIF files.
//!
//! Fixtures under `tests/fixtures/`:
//! - `pipeline.json`: a video, a shot/slate detection view with TimePoints
//!   0..4 and a TimeFrame over them, and an OCR view aligning a TextDocument
//!   to one of the TimePoints.
//! - `legacy.json`: a 0.4.2 file with unversioned type URIs and a capital
//!   annotation describing the video.

use mmif_core::vocabulary::{self, ALIGNMENT, ANNOTATION, BOUNDING_BOX, TIME_FRAME, TIME_POINT};
use mmif_core::{AtType, Mmif, MmifConfig, MmifError, Properties, SerializeOptions};
use serde_json::{Value, json};

const PIPELINE: &str = include_str!("fixtures/pipeline.json");
const LEGACY: &str = include_str!("fixtures/legacy.json");

// =============================================================================
// Test Helpers
// =============================================================================

fn pipeline() -> Mmif {
    Mmif::from_json(PIPELINE).expect("pipeline fixture loads")
}

fn serialize(mmif: &mut Mmif) -> String {
    mmif.serialize(SerializeOptions::default()).expect("serializes")
}

/// Number of capital annotations across all views.
fn capital_count(mmif: &Mmif) -> usize {
    mmif.views()
        .iter()
        .map(|v| v.get_annotations(Some(&ANNOTATION), &[]).count())
        .sum()
}

// =============================================================================
// Round trip and identifiers
// =============================================================================

#[test]
fn roundtrip_preserves_structure() {
    let mut original = pipeline();
    let json = serialize(&mut original);
    let reloaded = Mmif::from_json(&json).unwrap();
    assert_eq!(reloaded, original);

    // the second trip is byte-identical
    let mut reloaded = reloaded;
    assert_eq!(serialize(&mut reloaded), json);
}

#[test]
fn roundtrip_through_a_file() {
    let mut original = pipeline();
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), serialize(&mut original)).unwrap();

    let reloaded: Mmif = std::fs::read_to_string(file.path()).unwrap().parse().unwrap();
    assert_eq!(reloaded, original);
}

#[test]
fn annotation_ids_are_view_qualified() {
    let mut mmif = pipeline();
    let wire: Value = serde_json::from_str(&serialize(&mut mmif)).unwrap();

    for doc in wire["documents"].as_array().unwrap() {
        assert!(!doc["properties"]["id"].as_str().unwrap().contains(':'));
    }
    for view in wire["views"].as_array().unwrap() {
        let prefix = format!("{}:", view["id"].as_str().unwrap());
        for ann in view["annotations"].as_array().unwrap() {
            assert!(ann["properties"]["id"].as_str().unwrap().starts_with(&prefix));
        }
    }
    // references are kept as written
    assert_eq!(wire["views"][0]["annotations"][5]["properties"]["targets"][0], "tp_1");
}

#[test]
fn document_and_view_ids_cannot_collide() {
    let mut payload: Value = serde_json::from_str(PIPELINE).unwrap();
    payload["documents"][0]["properties"]["id"] = json!("v_1");
    let err = Mmif::from_json(&payload.to_string()).unwrap_err();
    assert!(matches!(err, MmifError::Ambiguous { .. }));
}

#[test]
fn invalid_payload_is_rejected_before_building() {
    let mut payload: Value = serde_json::from_str(PIPELINE).unwrap();
    payload["views"][0]["annotations"][5]["properties"]["start"] = json!(0);

    let err = Mmif::from_json(&payload.to_string()).unwrap_err();
    assert!(matches!(err, MmifError::SchemaViolation(_)));

    // without the validator the model's own check still refuses it
    let config = MmifConfig {
        validate: false,
        ..MmifConfig::default()
    };
    let err = Mmif::from_json_with(&payload.to_string(), config).unwrap_err();
    assert!(matches!(err, MmifError::AmbiguousAnchor { .. }));
}

// =============================================================================
// Anchors and alignments
// =============================================================================

#[test]
fn timeframe_spans_its_timepoints() {
    let mmif = pipeline();
    assert_eq!(mmif.anchor_start("v_0:tf_1").unwrap(), 0.0);
    assert_eq!(mmif.anchor_end("v_0:tf_1").unwrap(), 4.0);
    assert_eq!(mmif.anchor_start("v_0:tp_4").unwrap(), 3.0);
}

#[test]
fn ambiguous_anchor_is_refused_when_set() {
    let mut mmif = pipeline();
    let mut view = mmif.get_view_mut("v_0").unwrap();
    let err = view
        .get_annotation_mut("tf_1")
        .unwrap()
        .add_property("end", json!(4))
        .unwrap_err();
    assert!(matches!(err, MmifError::AmbiguousAnchor { .. }));
}

#[test]
fn alignment_links_views() {
    let mmif = pipeline();
    let text = mmif.aligned_to_by("v_0:tp_3", "v_1:al_1").unwrap();
    assert_eq!(text.id(), "v_1:td_1");
    let point = mmif.aligned_to_by("v_1:td_1", "v_1:al_1").unwrap();
    assert_eq!(point.get_property("timePoint").unwrap(), json!(2));

    let alignments = mmif.get_alignments(&TIME_POINT, &vocabulary::TEXT_DOCUMENT);
    assert_eq!(alignments.keys().collect::<Vec<_>>(), vec!["v_1"]);
    assert!(mmif.get_alignments(&TIME_FRAME, &vocabulary::TEXT_DOCUMENT).is_empty());
}

#[test]
fn alignment_across_views_built_step_by_step() {
    let mut mmif = pipeline();
    let app = |name: &str| format!("http://apps.clams.ai/{name}/v1");

    // a face detector boxes the frame at the third TimePoint
    let detector = {
        let mut view = mmif.new_view().unwrap();
        view.set_app(app("face-detector"));
        view.new_annotation(
            BOUNDING_BOX,
            Some("bb_1"),
            Properties::new().with("coordinates", json!([[0, 0], [10, 10]])),
        )
        .unwrap();
        view.id().to_string()
    };
    // a third view links the point to the box
    let linker = {
        let mut view = mmif.new_view().unwrap();
        view.set_app(app("linker"));
        let source = "v_0:tp_3".to_string();
        let target = format!("{detector}:bb_1");
        view.new_annotation(
            ALIGNMENT,
            Some("al_1"),
            Properties::new().with("source", source).with("target", target),
        )
        .unwrap();
        view.id().to_string()
    };
    let alignment = format!("{linker}:al_1");
    let bb = format!("{detector}:bb_1");

    let aligned: Vec<_> = mmif.get_aligned("v_0:tp_3").iter().map(|a| a.id().to_string()).collect();
    assert_eq!(aligned, vec!["v_1:td_1".to_string(), bb.clone()]);
    assert_eq!(mmif.aligned_to_by(&bb, &alignment).unwrap().id(), "v_0:tp_3");
    let found = mmif.get_alignments(&TIME_POINT, &BOUNDING_BOX);
    assert_eq!(found.keys().collect::<Vec<_>>(), vec![&linker]);

    // the cache survives a round trip
    let reloaded = Mmif::from_json(&serialize(&mut mmif)).unwrap();
    assert_eq!(reloaded.aligned_to_by("v_0:tp_3", &alignment).unwrap().id(), bb);
}

#[test]
fn alignment_resolves_once_its_target_is_added() {
    let mut mmif = pipeline();
    mmif.new_view()
        .unwrap()
        .new_annotation(
            ALIGNMENT,
            Some("al_1"),
            Properties::new().with("source", "v_0:tp_1").with("target", "v_3:bb_1"),
        )
        .unwrap();
    assert!(mmif.get_aligned("v_0:tp_1").is_empty());

    mmif.new_view()
        .unwrap()
        .new_annotation(BOUNDING_BOX, Some("bb_1"), Properties::new())
        .unwrap();
    assert_eq!(mmif.aligned_to_by("v_0:tp_1", "v_2:al_1").unwrap().id(), "v_3:bb_1");
}

#[test]
fn annotations_keep_their_ids() {
    let mut mmif = pipeline();
    let err = mmif
        .get_view_mut("v_0")
        .unwrap()
        .get_annotation_mut("tp_1")
        .unwrap()
        .add_property("id", json!("x"))
        .unwrap_err();
    assert!(matches!(err, MmifError::InvalidIdentifier { .. }));
    assert!(mmif.find("v_0:tp_1").is_some());
    assert!(mmif.find("v_0:x").is_none());

    let wire: Value = serde_json::from_str(&serialize(&mut mmif)).unwrap();
    assert_eq!(wire["views"][0]["annotations"][0]["properties"]["id"], "v_0:tp_1");
}

#[test]
fn errored_views_stay_empty() {
    let mut mmif = pipeline();
    let mut view = mmif.new_view().unwrap();
    view.set_app("http://apps.clams.ai/crashy/v1");
    view.set_error("out of memory", "");
    let err = view.new_annotation(TIME_FRAME, None, Properties::new()).unwrap_err();
    assert!(matches!(err, MmifError::ViewHasError { .. }));
    drop(view);

    let wire: Value = serde_json::from_str(&serialize(&mut mmif)).unwrap();
    let last = wire["views"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["annotations"], json!([]));
    assert_eq!(last["metadata"]["error"]["message"], "out of memory");
}

#[test]
fn contains_lookup_is_fuzzy_by_type_and_exact_by_string() {
    let mmif = pipeline();
    let contains = &mmif.get_view_by_id("v_0").unwrap().metadata().contains;

    let older = AtType::clams("TimeFrame", 4);
    assert!(contains.get(&older).is_some());
    assert!(contains.get_raw("http://mmif.clams.ai/vocabulary/TimeFrame/v4").is_none());
    assert_eq!(
        contains
            .get_raw("http://mmif.clams.ai/vocabulary/TimeFrame/v5")
            .and_then(|c| c.get("timeUnit")),
        Some(&json!("milliseconds"))
    );
}

#[test]
fn view_metadata_reaches_annotations() {
    let mmif = pipeline();
    let view = mmif.get_view_by_id("v_0").unwrap();
    let tf = view.get_annotation_by_id("tf_1").unwrap();
    assert_eq!(tf.get_property("timeUnit").unwrap(), json!("milliseconds"));
    assert_eq!(tf.get_property("label").unwrap(), json!("slate"));

    let filters = [("document", json!("d1")), ("label", json!("S"))];
    assert_eq!(view.get_annotations(Some(&TIME_POINT), &filters).count(), 3);
    assert_eq!(mmif.get_views_for_document("d1").len(), 1);
}

// =============================================================================
// Capital annotations
// =============================================================================

#[test]
fn capital_annotations_are_idempotent() {
    let mut mmif = pipeline();
    mmif.get_document_mut("d1")
        .unwrap()
        .add_property("duration", json!(5000))
        .unwrap();

    let first = serialize(&mut mmif);
    assert_eq!(capital_count(&mmif), 1);
    assert_eq!(serialize(&mut mmif), first);

    let mut reloaded = Mmif::from_json(&first).unwrap();
    assert_eq!(serialize(&mut reloaded), first);
    let d1 = reloaded.get_document_by_id("d1").unwrap();
    assert_eq!(d1.get_property("duration").unwrap(), json!(5000));
    assert!(d1.annotation().properties().get("duration").is_none());
}

#[test]
fn documents_are_append_only_across_apps() {
    let mut mmif = pipeline();
    mmif.get_document_mut("d1")
        .unwrap()
        .add_property("duration", json!(5000))
        .unwrap();
    let mut mmif = Mmif::from_json(&serialize(&mut mmif)).unwrap();

    // a later app measures differently
    {
        let mut view = mmif.new_view().unwrap();
        view.set_app("http://apps.clams.ai/scene-recognition/v2.0");
        view.new_annotation(TIME_FRAME, None, Properties::new().with("document", "d1").with("start", 0).with("end", 10))
            .unwrap();
    }
    // structured fields stay writable
    mmif.get_document_mut("d1")
        .unwrap()
        .add_property("mime", json!("video/mp4"))
        .unwrap();
    mmif.get_document_mut("d1")
        .unwrap()
        .add_property("duration", json!(4990))
        .unwrap();

    let mut mmif = Mmif::from_json(&serialize(&mut mmif)).unwrap();
    assert_eq!(capital_count(&mmif), 2);
    let recorded: Vec<Value> = mmif
        .views()
        .iter()
        .flat_map(|v| v.get_annotations(Some(&ANNOTATION), &[]))
        .map(|a| a.get_property("duration").unwrap())
        .collect();
    assert_eq!(recorded, vec![json!(5000), json!(4990)]);
    assert_eq!(
        mmif.get_document_by_id("d1").unwrap().get_property("duration").unwrap(),
        json!(4990)
    );

    // re-stating a recorded value adds nothing
    mmif.get_document_mut("d1")
        .unwrap()
        .add_property("duration", json!(4990))
        .unwrap();
    serialize(&mut mmif);
    assert_eq!(capital_count(&mmif), 2);
    assert!(mmif.get_document_by_id("d1").unwrap().pending().is_empty());
}

#[test]
fn original_document_properties_are_read_only() {
    let mut mmif = pipeline();
    let mut payload: Value = serde_json::from_str(PIPELINE).unwrap();
    payload["documents"][0]["properties"]["fps"] = json!(29.97);
    let mut with_fps = Mmif::from_json(&payload.to_string()).unwrap();

    let err = with_fps
        .get_document_mut("d1")
        .unwrap()
        .add_property("fps", json!(30))
        .unwrap_err();
    assert!(matches!(err, MmifError::ReadOnlyProperty { .. }));
    assert_eq!(
        with_fps.get_document_by_id("d1").unwrap().get_property("fps").unwrap(),
        json!(29.97)
    );
    assert!(with_fps.serialize(SerializeOptions::default()).unwrap().contains("29.97"));
    assert!(mmif.get_document_mut("d1").unwrap().add_property("fps", json!(30)).is_ok());
}

#[test]
fn disabling_generation_keeps_pending_off_the_wire() {
    let mut mmif = pipeline();
    mmif.get_document_mut("d1")
        .unwrap()
        .add_property("duration", json!(5000))
        .unwrap();
    let options = SerializeOptions {
        autogenerate_capital_annotations: false,
        ..SerializeOptions::default()
    };
    let json = mmif.serialize(options).unwrap();
    assert!(!json.contains("duration"));
    assert_eq!(capital_count(&mmif), 0);
}

// =============================================================================
// Legacy files
// =============================================================================

#[test]
fn legacy_types_normalize_on_load() {
    let mmif = Mmif::from_json(LEGACY).unwrap();
    let v1 = mmif.get_view_by_id("v1").unwrap();
    let capital = v1.get_annotation_by_id("a1").unwrap();
    assert_eq!(capital.at_type(), &AtType::clams("Annotation", 2));
    assert!(capital.at_type().matches(&AtType::clams("Annotation", 1), true));
    assert!(!capital.at_type().matches(&ANNOTATION, true));

    let wire = mmif.to_value();
    assert_eq!(
        wire["views"][0]["annotations"][0]["@type"],
        "http://mmif.clams.ai/vocabulary/Annotation/v2"
    );
    assert_eq!(mmif.metadata().spec_version(), "0.4.2");
}

#[test]
fn legacy_capital_annotation_feeds_document() {
    let mmif = Mmif::from_json(LEGACY).unwrap();
    let m1 = mmif.get_document_by_id("m1").unwrap();
    assert_eq!(m1.get_property("fps").unwrap(), json!(29.97));
    assert_eq!(m1.get_property("frameCount").unwrap(), json!(1798));
    assert!(m1.annotation().properties().is_empty());
}

#[test]
fn legacy_alignment_is_cached() {
    let mmif = Mmif::from_json(LEGACY).unwrap();
    let frame = mmif.aligned_to_by("m1", "v2:al1").unwrap();
    assert_eq!(frame.id(), "v2:f1");
    assert_eq!(frame.get_property("label").unwrap(), json!("bars"));
    assert_eq!(mmif.get_views_contain(&[ALIGNMENT]).len(), 1);
    assert_eq!(mmif.anchor_end("v2:f1").unwrap(), 30.0);
}
