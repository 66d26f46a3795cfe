use std::collections::BTreeMap;

use crate::flow_key::FlowKey;
use crate::param::window_of;
use crate::scheme::TimeRange;

/// Exact per-flow windowed packet counts, the reference every scheme is
/// scored against.
#[derive(Clone, Debug, Default)]
pub struct GroundTruth {
    window_us: u64,
    counts: BTreeMap<FlowKey, BTreeMap<u64, u64>>,
}

impl GroundTruth {
    pub fn new(window_us: u64) -> Self {
        Self {
            window_us,
            counts: BTreeMap::new(),
        }
    }

    pub fn window_us(&self) -> u64 {
        self.window_us
    }

    pub fn insert(&mut self, key: &FlowKey, timestamp_us: u64, count: u64) {
        let window = window_of(timestamp_us, self.window_us);
        *self
            .counts
            .entry(*key)
            .or_default()
            .entry(window)
            .or_insert(0) += count;
    }

    /// Count in global window `window`.
    pub fn query(&self, key: &FlowKey, window: u64) -> u64 {
        self.counts
            .get(key)
            .and_then(|w| w.get(&window))
            .copied()
            .unwrap_or(0)
    }

    pub fn flows(&self) -> impl Iterator<Item = &FlowKey> {
        self.counts.keys()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// First to last non-empty window of the flow, as a time range.
    pub fn active_range(&self, key: &FlowKey) -> Option<TimeRange> {
        let windows = self.counts.get(key)?;
        let first = *windows.keys().next()?;
        let last = *windows.keys().next_back()?;
        Some(TimeRange::new(
            first * self.window_us,
            (last + 1) * self.window_us,
        ))
    }

    /// Dense `(window start, count)` series over the windows of `range`.
    pub fn curve(&self, key: &FlowKey, range: &TimeRange) -> Vec<(u64, f64)> {
        range
            .windows(self.window_us)
            .map(|g| (g * self.window_us, self.query(key, g) as f64))
            .collect()
    }

    pub fn packets(&self, key: &FlowKey) -> u64 {
        self.counts.get(key).map_or(0, |w| w.values().sum())
    }

    pub fn total_packets(&self) -> u64 {
        self.counts.values().flat_map(|w| w.values()).sum()
    }

    /// Every non-empty `(flow, window, count)` ordered by window, then flow.
    pub fn events(&self) -> Vec<(FlowKey, u64, u64)> {
        let mut events: Vec<(FlowKey, u64, u64)> = self
            .counts
            .iter()
            .flat_map(|(key, windows)| windows.iter().map(move |(&w, &c)| (*key, w, c)))
            .filter(|&(_, _, c)| c > 0)
            .collect();
        events.sort_by_key(|&(key, w, _)| (w, key));
        events
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}
