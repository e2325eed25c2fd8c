//! Integration tests for counter-to-rate conversion.

use herakles_live_monitor::rate::{sectors_to_megabytes, RateSample, RateState};
use std::time::{Duration, Instant};

const READ: &str = "sectors_read";

fn disk(id: &str, at: Instant, sectors: u64) -> RateSample {
    RateSample::new(id, at).with_counter(READ, sectors)
}

/// One full tick: observe, convert, smooth.
fn tick(state: &mut RateState, samples: Vec<RateSample>) -> Vec<(String, f64)> {
    let mut out: Vec<(String, f64)> = state
        .observe(samples)
        .into_iter()
        .map(|(id, t)| {
            let raw = t.rate(READ, sectors_to_megabytes);
            let smoothed = state.smooth(&id, READ, raw);
            (id, smoothed)
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

#[test]
fn test_disk_throughput_over_three_ticks() {
    let mut state = RateState::smoothed(0.4);
    state.set_entities(["sda"]);
    let t0 = Instant::now();

    assert!(tick(&mut state, vec![disk("sda", t0, 0)]).is_empty());

    // 20480 sectors = 10 MB in one second
    let first = tick(&mut state, vec![disk("sda", t0 + Duration::from_secs(1), 20_480)]);
    assert_eq!(first, vec![("sda".to_string(), 10.0)]);

    // 20 MB/s raw, smoothed: 0.4 * 20 + 0.6 * 10 = 14
    let second = tick(&mut state, vec![disk("sda", t0 + Duration::from_secs(2), 61_440)]);
    assert_eq!(second.len(), 1);
    assert!((second[0].1 - 14.0).abs() < 1e-9);
}

#[test]
fn test_new_disk_reports_from_its_second_tick() {
    let mut state = RateState::unsmoothed();
    state.set_entities(["sda"]);
    let t0 = Instant::now();
    tick(&mut state, vec![disk("sda", t0, 0)]);

    state.set_entities(["sda", "sdb"]);
    let t1 = t0 + Duration::from_secs(1);
    let out = tick(&mut state, vec![disk("sda", t1, 2048), disk("sdb", t1, 9999)]);
    assert_eq!(out, vec![("sda".to_string(), 1.0)]);

    let t2 = t0 + Duration::from_secs(2);
    let out = tick(&mut state, vec![disk("sda", t2, 2048), disk("sdb", t2, 9999 + 4096)]);
    assert_eq!(
        out,
        vec![("sda".to_string(), 0.0), ("sdb".to_string(), 2.0)]
    );
}

#[test]
fn test_removed_disk_state_is_pruned() {
    let mut state = RateState::smoothed(0.5);
    state.set_entities(["sda", "sdb"]);
    let t0 = Instant::now();
    tick(&mut state, vec![disk("sda", t0, 0), disk("sdb", t0, 0)]);
    let t1 = t0 + Duration::from_secs(1);
    tick(&mut state, vec![disk("sda", t1, 10), disk("sdb", t1, 10)]);
    assert_eq!(state.smoothed_entities(), 2);

    state.set_entities(["sda"]);
    let t2 = t0 + Duration::from_secs(2);
    let out = tick(&mut state, vec![disk("sda", t2, 20), disk("sdb", t2, 20)]);

    assert_eq!(out.len(), 1);
    assert_eq!(state.remembered_entities(), 1);
    assert_eq!(state.smoothed_entities(), 1);
    assert!(!state.is_tracked("sdb"));
}

#[test]
fn test_counter_reset_yields_zero_not_negative() {
    let mut state = RateState::unsmoothed();
    state.set_entities(["sda"]);
    let t0 = Instant::now();
    tick(&mut state, vec![disk("sda", t0, 50_000)]);

    let out = tick(&mut state, vec![disk("sda", t0 + Duration::from_secs(1), 100)]);
    assert_eq!(out, vec![("sda".to_string(), 0.0)]);
}

#[test]
fn test_zero_elapsed_yields_zero() {
    let mut state = RateState::unsmoothed();
    state.set_entities(["sda"]);
    let t0 = Instant::now();
    tick(&mut state, vec![disk("sda", t0, 0)]);

    let out = tick(&mut state, vec![disk("sda", t0, 4096)]);
    assert_eq!(out, vec![("sda".to_string(), 0.0)]);
}
