use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::flow_key::FlowKey;
use crate::ground_truth::GroundTruth;

/// Shape of a reproducible traffic mix: a few elephant flows with long on/off
/// bursts over many short, light mouse flows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficProfile {
    pub flows: usize,
    /// Fraction of flows that are elephants.
    pub elephant_share: f64,
    /// Length of the trace in windows.
    pub windows: u64,
    pub window_us: u64,
    /// Per-window packet range of an elephant while on.
    pub elephant_rate: (u32, u32),
    pub mouse_rate: (u32, u32),
    /// Mean length of an on or off period, in windows.
    pub burst_len: u64,
    pub seed: u64,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self {
            flows: 200,
            elephant_share: 0.05,
            windows: 512,
            window_us: 100,
            elephant_rate: (20, 80),
            mouse_rate: (1, 4),
            burst_len: 16,
            seed: 0,
        }
    }
}

pub fn generate(profile: &TrafficProfile) -> GroundTruth {
    let mut rng = StdRng::seed_from_u64(profile.seed);
    let mut truth = GroundTruth::new(profile.window_us);
    let windows = profile.windows.max(1);
    let burst = profile.burst_len.max(1);

    for id in 0..profile.flows as u64 {
        let key = FlowKey::from_flow_id(id + 1);
        let elephant = rng.gen_bool(profile.elephant_share.clamp(0.0, 1.0));
        let (lo, hi) = if elephant {
            profile.elephant_rate
        } else {
            profile.mouse_rate
        };
        let (lo, hi) = (lo.min(hi), lo.max(hi));

        let start = rng.gen_range(0..windows);
        let span = if elephant {
            windows - start
        } else {
            rng.gen_range(1..=burst.min(windows - start))
        };

        let mut on = true;
        let mut left = rng.gen_range(1..=2 * burst);
        for w in start..start + span {
            if on {
                let packets = rng.gen_range(lo..=hi);
                if packets > 0 {
                    truth.insert(&key, w * profile.window_us, u64::from(packets));
                }
            }
            left -= 1;
            if left == 0 {
                on = !on;
                left = rng.gen_range(1..=2 * burst);
            }
        }
        // every flow sends at least once
        if truth.active_range(&key).is_none() {
            truth.insert(&key, start * profile.window_us, u64::from(hi.max(1)));
        }
    }
    truth
}
