//! The shared count/flush/rebuild contract and the generic heavy+light
//! composition every concrete scheme is an instance of.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::bucket::{sample, Basis, CountOutcome, Layout};
use crate::config::{Algorithm, SchemeConfig};
use crate::error::Result;
use crate::flow_key::FlowKey;
use crate::hashing::SeededHash;
use crate::heavy_part::{HeavyInsert, HeavyPart};
use crate::light_part::{CurveCache, LightPart};
use crate::param::window_of;

/// Half-open time range `[start_us, end_us)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start_us: u64,
    pub end_us: u64,
}

impl TimeRange {
    pub fn new(start_us: u64, end_us: u64) -> Self {
        Self { start_us, end_us }
    }

    /// Global window numbers intersecting the range.
    pub fn windows(&self, window_us: u64) -> std::ops::Range<u64> {
        if self.end_us <= self.start_us {
            return 0..0;
        }
        let first = window_of(self.start_us, window_us);
        let last = window_of(self.end_us - 1, window_us);
        first..last + 1
    }
}

pub type Query = BTreeMap<FlowKey, TimeRange>;

/// Per-flow `(window start in us, value)` points in ascending time order.
pub type Rebuilt = BTreeMap<FlowKey, Vec<(u64, f64)>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchemeStats {
    pub events: u64,
    pub late_events: u64,
    /// Buckets that discarded their span to move to a newer one.
    pub rolled_buckets: u64,
    pub heavy_admissions: u64,
    pub heavy_evictions: u64,
    pub light_updates: u64,
}

pub trait Scheme {
    fn algorithm(&self) -> Algorithm;

    /// Records `value` packets of `key` at `timestamp_us`. Never fails; events
    /// older than every bucket that could hold them are dropped and tallied
    /// in [`SchemeStats`].
    fn count(&mut self, key: &FlowKey, timestamp_us: u64, value: u32);

    /// Closes every open window and finalizes pending coefficients.
    fn flush(&mut self);

    /// Reconstructs one point per window for each queried flow. Flows the
    /// scheme never saw (or lost to eviction) read as zeros.
    fn rebuild(&mut self, query: &Query) -> Rebuilt;

    /// Returns to the freshly constructed state without reallocating.
    fn reset(&mut self);

    fn memory_usage(&self) -> usize;

    fn memory_budget(&self) -> usize;

    /// Effective coefficient budget per bucket, after clamping.
    fn top_k(&self) -> usize;

    fn window_us(&self) -> u64;

    fn stats(&self) -> &SchemeStats;
}

/// A heavy table of exactly tracked flows in front of a Count-Min grid, both
/// holding buckets compressed with basis `B`.
pub struct SketchScheme<B> {
    layout: Layout,
    window_us: u64,
    heavy: HeavyPart<B>,
    light: LightPart<B>,
    stats: SchemeStats,
    budget: usize,
    usage: usize,
}

impl<B: Basis> SketchScheme<B> {
    pub fn new(config: &SchemeConfig) -> Result<Self> {
        let dims = config.dimensions::<B>()?;
        let mut family = SeededHash::distinct_family(dims.light_depth + 1, config.seed);
        let heavy_hash = family.remove(0);

        let heavy = HeavyPart::new(dims.heavy_slots, &dims.layout, config.vote_max, heavy_hash);
        let light = LightPart::new(dims.light_depth, dims.light_width, &dims.layout, family);
        let usage = heavy.get_memory_usage() + light.get_memory_usage();

        debug!(
            algorithm = %B::ALGORITHM,
            budget = dims.budget,
            usage,
            heavy_slots = dims.heavy_slots,
            light_depth = dims.light_depth,
            light_width = dims.light_width,
            top_k = dims.layout.top_k,
            "scheme dimensions"
        );

        Ok(Self {
            layout: dims.layout,
            window_us: config.window_us,
            heavy,
            light,
            stats: SchemeStats::default(),
            budget: dims.budget,
            usage,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn heavy(&self) -> &HeavyPart<B> {
        &self.heavy
    }

    pub fn light(&self) -> &LightPart<B> {
        &self.light
    }

    fn tally(&mut self, key: &FlowKey, window: u64, outcome: CountOutcome) {
        match outcome {
            CountOutcome::Accepted => {}
            CountOutcome::Late => {
                self.stats.late_events += 1;
                trace!(flow = %key, window, "late event dropped");
            }
            CountOutcome::Rolled => {
                self.stats.rolled_buckets += 1;
                trace!(flow = %key, window, "heavy bucket rolled to a new span");
            }
        }
    }

    fn count_light(&mut self, key: &FlowKey, window: u64, value: u32) {
        let rows = self.light.insert(key, window, value);
        self.stats.rolled_buckets += rows.rolled as u64;
        if rows.stored > 0 {
            self.stats.light_updates += 1;
        } else {
            self.tally(key, window, CountOutcome::Late);
        }
    }

    fn rebuild_flow(&self, key: &FlowKey, range: &TimeRange, cache: &mut CurveCache) -> Vec<(u64, f64)> {
        let heavy = self.heavy.get(key).map(|b| (b, b.curve()));
        range
            .windows(self.window_us)
            .map(|g| {
                let value = match &heavy {
                    Some((bucket, curve)) if bucket.covers(g) => sample(bucket.origin(), curve, g),
                    _ => self.light.estimate(key, g, cache),
                };
                (g * self.window_us, value)
            })
            .collect()
    }
}

impl<B: Basis> Scheme for SketchScheme<B> {
    fn algorithm(&self) -> Algorithm {
        B::ALGORITHM
    }

    fn count(&mut self, key: &FlowKey, timestamp_us: u64, value: u32) {
        self.stats.events += 1;
        let window = window_of(timestamp_us, self.window_us);
        if !B::USES_HEAVY_PART {
            self.count_light(key, window, value);
            return;
        }

        match self.heavy.insert(key, window, value) {
            // windows before a resident's span belong to the light grid
            HeavyInsert::Hit(CountOutcome::Late) => self.count_light(key, window, value),
            HeavyInsert::Hit(outcome) => self.tally(key, window, outcome),
            HeavyInsert::Admitted { evicted, outcome } => {
                self.stats.heavy_admissions += 1;
                if evicted.is_some() {
                    self.stats.heavy_evictions += 1;
                }
                self.tally(key, window, outcome);
            }
            HeavyInsert::Rejected => self.count_light(key, window, value),
        }
    }

    fn flush(&mut self) {
        self.heavy.flush();
        self.light.flush();
    }

    fn rebuild(&mut self, query: &Query) -> Rebuilt {
        self.flush();
        let mut cache = CurveCache::new();
        query
            .iter()
            .map(|(key, range)| (*key, self.rebuild_flow(key, range, &mut cache)))
            .collect()
    }

    fn reset(&mut self) {
        self.heavy.clear();
        self.light.clear();
        self.stats = SchemeStats::default();
    }

    fn memory_usage(&self) -> usize {
        self.usage
    }

    fn memory_budget(&self) -> usize {
        self.budget
    }

    fn top_k(&self) -> usize {
        self.layout.top_k
    }

    fn window_us(&self) -> u64 {
        self.window_us
    }

    fn stats(&self) -> &SchemeStats {
        &self.stats
    }
}
