//! Integration tests for the eviction policy.

use std::sync::Arc;

use splat_stream::cache::evictor::Evictor;
use splat_stream::cache::{PrefetchCache, Window};
use splat_stream::config::PrefetchConfig;
use splat_stream::loader::scripted::ScriptedLoader;
use splat_stream::source::FrameRef;

#[test]
fn test_eviction_order_by_distance() {
    let evictor = Evictor::new();
    let window = Window::around(50, 2, 2, 100).unwrap();

    let victims = evictor.select_victims([10, 45, 90, 60, 30].into_iter(), &window, 5);
    let keys: Vec<_> = victims.iter().map(|v| v.key).collect();
    assert_eq!(keys, vec![10, 90, 30, 60, 45]);

    for pair in victims.windows(2) {
        assert!(pair[0].distance >= pair[1].distance);
    }
}

#[test]
fn test_eviction_never_selects_window_keys() {
    let evictor = Evictor::new();
    for cursor in 0..20 {
        let window = Window::around(cursor, 3, 4, 20).unwrap();
        let victims = evictor.select_victims(0..20, &window, 20);
        assert!(victims.iter().all(|v| !window.contains(v.key)));
        assert_eq!(victims.len(), 20 - window.len());
    }
}

#[test]
fn test_eviction_empty_returns_nothing() {
    let evictor = Evictor::new();
    let window = Window::around(0, 0, 0, 1).unwrap();
    assert!(evictor.select_victims(std::iter::empty(), &window, 4).is_empty());
    assert!(evictor.select_victims([0].into_iter(), &window, 4).is_empty());
}

#[test]
fn test_trim_keeps_window_when_capacity_is_tight() {
    let loader = ScriptedLoader::new(4, 0);
    let mut cache = PrefetchCache::new(
        PrefetchConfig {
            preload_behind: 2,
            preload_ahead: 2,
            max_cached_frames: 1,
            hold_last_frame_while_loading: false,
        },
        Arc::new(loader.clone()),
    );
    cache.set_frames((0..10).map(|i| FrameRef::named(format!("f{i}"))).collect());

    cache.request_window(5);
    loader.complete_all();
    cache.poll_completions();

    assert_eq!(cache.trim(), 0);
    assert_eq!(cache.cached_keys(), vec![3, 4, 5, 6, 7]);
    assert!(loader.released().is_empty());
}

#[test]
fn test_trim_evicts_everything_outside_window() {
    let loader = ScriptedLoader::new(4, 0);
    let mut cache = PrefetchCache::new(
        PrefetchConfig {
            preload_behind: 0,
            preload_ahead: 1,
            max_cached_frames: 10,
            hold_last_frame_while_loading: true,
        },
        Arc::new(loader.clone()),
    );
    cache.set_frames((0..10).map(|i| FrameRef::named(format!("f{i}"))).collect());

    cache.request_window(0);
    loader.complete_all();
    cache.poll_completions();
    cache.request_window(4);

    // Capacity would allow keeping 0 and 1, but they are outside the window.
    assert_eq!(cache.cached_keys(), vec![4, 5]);
    assert_eq!(cache.stats().evictions, 2);
}
