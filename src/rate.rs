//! Rate computation over monotonic kernel counters.
//!
//! A [`RateState`] remembers the previous [`RateSample`] of every tracked
//! entity (disk, interface) and turns the next sample into per-tick deltas.
//! Deltas are clamped at zero, so a counter reset after a device is
//! re-enumerated yields "no throughput" rather than a negative rate.
//! Optional exponential smoothing damps bursty readings.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::time::Instant;

/// Size of a block-layer sector as reported by /proc/diskstats.
pub const SECTOR_SIZE_BYTES: u64 = 512;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Converts a sector count into megabytes (2048 sectors = 1 MB).
pub fn sectors_to_megabytes(sectors: u64) -> f64 {
    sectors as f64 * SECTOR_SIZE_BYTES as f64 / BYTES_PER_MB
}

/// Converts a byte count into megabytes.
pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Per-second rate of `amount` over `elapsed_seconds`.
///
/// Returns 0.0 for a zero amount or a non-positive interval.
pub fn per_second(amount: f64, elapsed_seconds: f64) -> f64 {
    if amount > 0.0 && elapsed_seconds > 0.0 {
        amount / elapsed_seconds
    } else {
        0.0
    }
}

/// Counter values for one entity taken at one instant.
#[derive(Debug, Clone)]
pub struct RateSample {
    pub entity_id: String,
    pub counters: HashMap<&'static str, u64>,
    pub timestamp: Instant,
}

impl RateSample {
    pub fn new(entity_id: impl Into<String>, timestamp: Instant) -> Self {
        Self {
            entity_id: entity_id.into(),
            counters: HashMap::new(),
            timestamp,
        }
    }

    pub fn with_counter(mut self, name: &'static str, value: u64) -> Self {
        self.counters.insert(name, value);
        self
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }
}

/// Counter deltas for one entity between two consecutive samples.
#[derive(Debug, Clone, Default)]
pub struct TickDelta {
    pub elapsed_seconds: f64,
    pub deltas: HashMap<&'static str, u64>,
}

impl TickDelta {
    /// Clamped delta of a counter; 0 when the counter is missing from either sample.
    pub fn delta(&self, counter: &str) -> u64 {
        self.deltas.get(counter).copied().unwrap_or(0)
    }

    /// Raw per-second rate of a counter after converting the delta with `convert`.
    pub fn rate(&self, counter: &str, convert: fn(u64) -> f64) -> f64 {
        per_second(convert(self.delta(counter)), self.elapsed_seconds)
    }
}

/// Previous samples and smoothing state owned by exactly one monitor.
#[derive(Debug, Clone)]
pub struct RateState {
    tracked: HashSet<String>,
    previous: HashMap<String, RateSample>,
    ema: HashMap<String, HashMap<&'static str, f64>>,
    smoothing: Option<f64>,
}

impl RateState {
    /// Raw rates every tick, no smoothing.
    pub fn unsmoothed() -> Self {
        Self::with_smoothing(None)
    }

    /// Exponentially smoothed rates with the given factor in (0, 1].
    ///
    /// Factors outside that range are clamped into it.
    pub fn smoothed(factor: f64) -> Self {
        let factor = if factor.is_finite() {
            factor.clamp(f64::EPSILON, 1.0)
        } else {
            1.0
        };
        Self::with_smoothing(Some(factor))
    }

    fn with_smoothing(smoothing: Option<f64>) -> Self {
        Self {
            tracked: HashSet::new(),
            previous: HashMap::new(),
            ema: HashMap::new(),
            smoothing,
        }
    }

    pub fn smoothing_factor(&self) -> Option<f64> {
        self.smoothing
    }

    /// Replaces the set of tracked entities. State of dropped entities is pruned.
    pub fn set_entities<I, S>(&mut self, entities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked = entities.into_iter().map(Into::into).collect();
        self.prune();
    }

    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.tracked.iter().map(String::as_str)
    }

    pub fn is_tracked(&self, entity_id: &str) -> bool {
        self.tracked.contains(entity_id)
    }

    /// Records a new tick of samples and returns deltas against the previous tick.
    ///
    /// Samples for untracked entities are ignored. Entities without a previous
    /// sample produce no entry this tick; their sample is stored so the next
    /// tick reports them. Tracked entities missing from `samples` lose their
    /// previous sample.
    pub fn observe(&mut self, samples: Vec<RateSample>) -> HashMap<String, TickDelta> {
        let mut deltas = HashMap::new();
        let mut current = HashMap::with_capacity(samples.len());

        for sample in samples {
            if !self.tracked.contains(&sample.entity_id) {
                continue;
            }

            if let Some(prev) = self.previous.get(&sample.entity_id) {
                let elapsed_seconds = sample
                    .timestamp
                    .saturating_duration_since(prev.timestamp)
                    .as_secs_f64();

                let tick = TickDelta {
                    elapsed_seconds,
                    deltas: sample
                        .counters
                        .iter()
                        .filter_map(|(name, value)| {
                            prev.counter(name)
                                .map(|before| (*name, value.saturating_sub(before)))
                        })
                        .collect(),
                };
                deltas.insert(sample.entity_id.clone(), tick);
            }

            current.insert(sample.entity_id.clone(), sample);
        }

        self.previous = current;
        self.prune();
        deltas
    }

    /// Applies the configured smoothing to a raw rate.
    ///
    /// The first observation of an (entity, counter) pair seeds the average
    /// with the raw rate.
    pub fn smooth(&mut self, entity_id: &str, counter: &'static str, raw_rate: f64) -> f64 {
        let Some(factor) = self.smoothing else {
            return raw_rate;
        };

        let entity = self.ema.entry(entity_id.to_string()).or_default();
        let value = match entity.get(counter) {
            Some(previous) => factor * raw_rate + (1.0 - factor) * previous,
            None => raw_rate,
        };
        entity.insert(counter, value);
        value
    }

    /// Number of entities with stored smoothing state.
    pub fn smoothed_entities(&self) -> usize {
        self.ema.len()
    }

    /// Number of entities with a stored previous sample.
    pub fn remembered_entities(&self) -> usize {
        self.previous.len()
    }

    fn prune(&mut self) {
        let tracked = &self.tracked;
        self.previous.retain(|id, _| tracked.contains(id));
        self.ema.retain(|id, _| tracked.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample(id: &str, at: Instant, read: u64) -> RateSample {
        RateSample::new(id, at).with_counter("read", read)
    }

    #[test]
    fn test_sectors_to_megabytes() {
        assert_eq!(sectors_to_megabytes(2048), 1.0);
        assert_eq!(sectors_to_megabytes(4096), 2.0);
        assert_eq!(sectors_to_megabytes(0), 0.0);
    }

    #[test]
    fn test_sectors_to_megabytes_huge_delta_does_not_overflow() {
        let mb = sectors_to_megabytes(u64::MAX);
        assert!(mb.is_finite());
        assert!(mb > 0.0);

        let mut state = RateState::unsmoothed();
        state.set_entities(["sda"]);
        let t0 = Instant::now();
        state.observe(vec![sample("sda", t0, 0)]);
        let deltas = state.observe(vec![sample("sda", t0 + Duration::from_secs(1), u64::MAX)]);
        let rate = deltas.get("sda").unwrap().rate("read", sectors_to_megabytes);
        assert!(rate.is_finite() && rate > 0.0);
    }

    #[test]
    fn test_per_second_guards() {
        assert_eq!(per_second(10.0, 2.0), 5.0);
        assert_eq!(per_second(0.0, 2.0), 0.0);
        assert_eq!(per_second(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_first_tick_produces_no_delta() {
        let mut state = RateState::unsmoothed();
        state.set_entities(["sda"]);

        let t0 = Instant::now();
        let deltas = state.observe(vec![sample("sda", t0, 100)]);
        assert!(deltas.is_empty());

        let deltas = state.observe(vec![sample("sda", t0 + Duration::from_secs(1), 300)]);
        let tick = deltas.get("sda").expect("second tick should report");
        assert_eq!(tick.delta("read"), 200);
        assert!((tick.elapsed_seconds - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_counter_rollback_clamps_to_zero() {
        let mut state = RateState::unsmoothed();
        state.set_entities(["sda"]);

        let t0 = Instant::now();
        state.observe(vec![sample("sda", t0, 5000)]);
        let deltas = state.observe(vec![sample("sda", t0 + Duration::from_secs(1), 10)]);

        let tick = &deltas["sda"];
        assert_eq!(tick.delta("read"), 0);
        assert_eq!(tick.rate("read", sectors_to_megabytes), 0.0);
    }

    #[test]
    fn test_ema_seed_and_update() {
        let mut state = RateState::smoothed(0.4);
        state.set_entities(["sda"]);

        assert_eq!(state.smooth("sda", "read", 10.0), 10.0);
        let second = state.smooth("sda", "read", 20.0);
        assert!((second - 14.0).abs() < 1e-9, "got {second}");
    }

    #[test]
    fn test_unsmoothed_passes_raw_rate() {
        let mut state = RateState::unsmoothed();
        state.set_entities(["eth0"]);
        assert_eq!(state.smooth("eth0", "rx", 3.5), 3.5);
        assert_eq!(state.smooth("eth0", "rx", 7.0), 7.0);
        assert_eq!(state.smoothed_entities(), 0);
    }

    #[test]
    fn test_untracked_entities_are_pruned() {
        let mut state = RateState::smoothed(0.4);
        state.set_entities(["sda", "sdb"]);

        let t0 = Instant::now();
        state.observe(vec![sample("sda", t0, 1), sample("sdb", t0, 1)]);
        state.smooth("sda", "read", 1.0);
        state.smooth("sdb", "read", 1.0);
        assert_eq!(state.remembered_entities(), 2);
        assert_eq!(state.smoothed_entities(), 2);

        state.set_entities(["sda"]);
        assert_eq!(state.remembered_entities(), 1);
        assert_eq!(state.smoothed_entities(), 1);
    }

    #[test]
    fn test_missing_sample_forgets_previous() {
        let mut state = RateState::unsmoothed();
        state.set_entities(["sda", "sdb"]);

        let t0 = Instant::now();
        state.observe(vec![sample("sda", t0, 1), sample("sdb", t0, 1)]);
        let deltas = state.observe(vec![sample("sda", t0 + Duration::from_secs(1), 2)]);
        assert!(deltas.contains_key("sda"));
        assert!(!deltas.contains_key("sdb"));

        // sdb comes back: needs two samples again
        let deltas = state.observe(vec![sample("sdb", t0 + Duration::from_secs(2), 9)]);
        assert!(deltas.is_empty());
    }

    #[test]
    fn test_smoothing_factor_is_clamped() {
        assert_eq!(RateState::smoothed(3.0).smoothing_factor(), Some(1.0));
        assert!(RateState::smoothed(-1.0).smoothing_factor().unwrap() > 0.0);
        assert_eq!(RateState::unsmoothed().smoothing_factor(), None);
    }
}
