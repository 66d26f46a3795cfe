pub const KEY_LENGTH_13: usize = 13;
pub const CONSTANT_NUMBER: u32 = 2654435761;

// heavy part associativity: slots probed per hashed group
pub const SLOTS_PER_GROUP: usize = 4;

// per-bucket horizon, in windows
pub const DEFAULT_TOTAL_WINDOWS: u32 = 1024;
// stop the decomposition this many levels short of the top, leaving 2^3 approximation cells
pub const RESERVED_LEVELS: u32 = 3;
pub const DEFAULT_LIGHT_DEPTH: usize = 3;
pub const DEFAULT_HEAVY_SHARE: f64 = 0.25;
pub const DEFAULT_VOTE_MAX: u32 = 64;
pub const DEFAULT_FOURIER_FRAME: u32 = 64;
pub const DEFAULT_TOP_K: usize = 64;

pub const ZERO_EPSILON: f64 = 1e-9;

pub fn calculate_group_pos(hash: u64, groups: usize) -> usize {
    let fp = hash as u32;
    (((fp as u64 * CONSTANT_NUMBER as u64) >> 15) as usize) % groups
}

/// Weight of a level-`level` Haar detail relative to its orthonormal value.
///
/// Details are kept as unnormalized half-block differences, so a level-`l`
/// coefficient spans `2^(l+1)` windows and its orthonormal magnitude is
/// `|d| / sqrt(2)^(l+1)`.
pub fn level_weight(level: u32) -> f64 {
    std::f64::consts::FRAC_1_SQRT_2.powi(level as i32 + 1)
}

pub fn update_vote(vote: u32, vote_max: u32) -> u32 {
    vote.saturating_add(1).min(vote_max)
}

pub fn judge_if_evict(vote: u32) -> bool {
    vote == 0
}

pub fn window_of(timestamp_us: u64, window_us: u64) -> u64 {
    timestamp_us / window_us
}
