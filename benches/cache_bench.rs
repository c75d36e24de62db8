//! Benchmarks for the frame cache and upload path.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use splat_stream::cache::evictor::Evictor;
use splat_stream::cache::{PrefetchCache, Window};
use splat_stream::config::PrefetchConfig;
use splat_stream::loader::decoder::{encode_splat_rows, parse_splat_rows};
use splat_stream::loader::scripted::ScriptedLoader;
use splat_stream::render::recording::RecordingSink;
use splat_stream::render::RenderSink;
use splat_stream::source::FrameRef;
use splat_stream::splat::SplatFrame;
use splat_stream::transfer::{RenderPolicy, UploadMode, UploadScheduler};

fn bench_victim_selection(c: &mut Criterion) {
    let evictor = Evictor::new();
    let window = Window::around(5_000, 8, 8, 10_000).unwrap();

    c.bench_function("eviction_select_100_from_10k", |b| {
        b.iter(|| {
            let victims = evictor.select_victims(black_box(0..10_000), &window, 100);
            black_box(victims);
        })
    });
}

fn bench_request_window(c: &mut Criterion) {
    let loader = ScriptedLoader::new(1, 0);
    let mut cache = PrefetchCache::new(
        PrefetchConfig {
            preload_behind: 4,
            preload_ahead: 8,
            max_cached_frames: 16,
            hold_last_frame_while_loading: true,
        },
        Arc::new(loader.clone()),
    );
    cache.set_frames((0..1_000).map(|i| FrameRef::named(format!("f{i}"))).collect());
    let mut cursor = 0;

    c.bench_function("request_window_sliding", |b| {
        b.iter(|| {
            cursor = (cursor + 1) % 1_000;
            black_box(cache.request_window(cursor));
            loader.complete_all();
            cache.poll_completions();
        })
    });
}

fn bench_upload_step(c: &mut Criterion) {
    let payload = Arc::new(SplatFrame::synthetic(1, 250_000, 3));
    let mut sink = RecordingSink::new();
    sink.create_or_resize(payload.count(), payload.sh_bands());
    let mut scheduler = UploadScheduler::new(UploadMode::Incremental, RenderPolicy::Progressive, 100_000);

    c.bench_function("upload_full_frame_250k_sh3", |b| {
        b.iter(|| {
            scheduler.begin_frame(payload.clone(), &mut sink);
            while let Some(batch) = scheduler.step(&mut sink) {
                black_box(batch);
            }
        })
    });
}

fn bench_splat_parse(c: &mut Criterion) {
    let frame = SplatFrame::synthetic(2, 100_000, 0);
    let data = encode_splat_rows(&frame);

    c.bench_function("parse_splat_100k_rows", |b| {
        b.iter(|| {
            let parsed = parse_splat_rows("bench", black_box(&data)).unwrap();
            black_box(parsed);
        })
    });
}

criterion_group!(
    benches,
    bench_victim_selection,
    bench_request_window,
    bench_upload_step,
    bench_splat_parse
);
criterion_main!(benches);
