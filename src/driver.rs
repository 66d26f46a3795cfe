//! Replays exact traffic through a scheme and scores the reconstruction.

use serde::Serialize;
use tracing::info;

use crate::config::Algorithm;
use crate::flow_key::FlowKey;
use crate::ground_truth::GroundTruth;
use crate::metrics::Metrics;
use crate::scheme::{Query, Scheme};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Spread each window's count as single packets evenly through the window
    /// instead of one aggregated event at the window start.
    pub per_packet: bool,
}

/// One scored flow, shaped like a row of the results CSV.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowReport {
    pub time_s: f64,
    pub algorithm: Algorithm,
    pub memory_kb: usize,
    pub flow_id: u64,
    pub k: usize,
    pub window_us: u64,
    pub packets: u64,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// Feeds every event of `truth` to `scheme` in global time order, then flushes.
pub fn replay<S: Scheme + ?Sized>(scheme: &mut S, truth: &GroundTruth, options: ReplayOptions) {
    let window_us = truth.window_us();
    let mut events: Vec<(u64, FlowKey, u32)> = Vec::new();
    for (key, window, count) in truth.events() {
        let start = window * window_us;
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        if options.per_packet {
            let step = window_us / (u64::from(count) + 1);
            events.extend((1..=u64::from(count)).map(|i| (start + i * step, key, 1)));
        } else {
            events.push((start, key, count));
        }
    }
    events.sort_by_key(|&(t, key, _)| (t, key));

    for (t, key, value) in &events {
        scheme.count(key, *t, *value);
    }
    scheme.flush();
}

/// Resets `scheme`, replays `truth` into it and scores every flow over its
/// active range.
pub fn evaluate<S: Scheme + ?Sized>(
    scheme: &mut S,
    truth: &GroundTruth,
    options: ReplayOptions,
) -> Vec<FlowReport> {
    scheme.reset();
    replay(scheme, truth, options);

    let query: Query = truth
        .flows()
        .filter_map(|key| truth.active_range(key).map(|range| (*key, range)))
        .collect();
    let rebuilt = scheme.rebuild(&query);

    let window_us = scheme.window_us();
    let reports: Vec<FlowReport> = query
        .iter()
        .map(|(key, range)| {
            let original: Vec<f64> = truth.curve(key, range).into_iter().map(|(_, v)| v).collect();
            let mut estimate = vec![0.0; original.len()];
            let first = range.start_us / window_us;
            for &(t, v) in rebuilt.get(key).map(Vec::as_slice).unwrap_or_default() {
                if let Some(slot) = (t / window_us)
                    .checked_sub(first)
                    .and_then(|i| estimate.get_mut(i as usize))
                {
                    *slot += v;
                }
            }
            FlowReport {
                time_s: range.start_us as f64 / 1e6,
                algorithm: scheme.algorithm(),
                memory_kb: scheme.memory_budget() / 1024,
                flow_id: key.flow_id(),
                k: scheme.top_k(),
                window_us,
                packets: truth.packets(key),
                metrics: Metrics::compute(&original, &estimate),
            }
        })
        .collect();

    let stats = scheme.stats();
    info!(
        algorithm = %scheme.algorithm(),
        flows = reports.len(),
        avg_are = average(reports.iter().map(|r| r.metrics.are)),
        avg_cosine = average(reports.iter().map(|r| r.metrics.cosine_sim)),
        usage = scheme.memory_usage(),
        late = stats.late_events,
        rolled = stats.rolled_buckets,
        evictions = stats.heavy_evictions,
        "scheme evaluated"
    );
    reports
}

pub fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
