//! Load / Serialize Benchmark
//!
//! Measures parsing and serialization throughput for files with growing
//! numbers of annotations.
//!
//! This benchmark tests:
//! - Mmif::from_json() including structural validation
//! - Mmif::serialize() including capital annotation generation
//! - Anchor resolution over a TimeFrame spanning every TimePoint

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mmif_core::vocabulary::{TIME_FRAME, TIME_POINT, VIDEO_DOCUMENT};
use mmif_core::{Document, Mmif, Properties, SerializeOptions};
use serde_json::json;

/// Builds a file with one video and one view holding `size` TimePoints.
fn build_mmif(size: usize) -> Mmif {
    let mut mmif = Mmif::new();
    let mut video = Document::new(VIDEO_DOCUMENT, "d1");
    video.set_mime("video/mp4");
    video
        .set_location("/data/bench.mp4")
        .expect("absolute path is a valid location");
    mmif.add_document(video, false).expect("fresh document id");

    let mut view = mmif.new_view().expect("fresh view");
    view.set_app("http://apps.clams.ai/bench/v1");
    view.new_contain(
        TIME_POINT,
        Properties::new().with("timeUnit", "milliseconds").with("document", "d1"),
    )
    .expect("healthy view");
    let mut targets = Vec::with_capacity(size);
    for i in 0..size {
        let point = view
            .new_annotation(TIME_POINT, None, Properties::new().with("timePoint", i * 33).with("label", "S"))
            .expect("autogenerated id");
        targets.push(json!(point.local_id()));
    }
    view.new_annotation(TIME_FRAME, Some("tf_all"), Properties::new().with("targets", targets))
        .expect("fresh id");
    drop(view);
    mmif
}

fn load_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for size in [100, 1_000, 10_000] {
        let json = build_mmif(size)
            .serialize(SerializeOptions::default())
            .expect("serializes");
        group.throughput(Throughput::Bytes(json.len() as u64));
        group.bench_with_input(BenchmarkId::new("annotations", size), &json, |b, json| {
            b.iter(|| Mmif::from_json(black_box(json)).expect("loads"));
        });
    }

    group.finish();
}

fn serialize_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    for size in [100, 1_000, 10_000] {
        let mut mmif = build_mmif(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::new("annotations", size), |b| {
            b.iter(|| black_box(&mut mmif).serialize(SerializeOptions::default()).expect("serializes"));
        });
    }

    group.finish();
}

fn anchor_benchmark(c: &mut Criterion) {
    let mmif = build_mmif(1_000);

    c.bench_function("anchor_end_1k_targets", |b| {
        b.iter(|| mmif.anchor_end(black_box("v_0:tf_all")).expect("anchored"));
    });
}

criterion_group!(benches, load_benchmark, serialize_benchmark, anchor_benchmark);
criterion_main!(benches);
