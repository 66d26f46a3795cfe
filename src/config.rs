use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::mem::size_of;
use std::path::Path;
use std::str::FromStr;

use crate::bucket::{Basis, Bucket, Layout};
use crate::error::{Error, Result};
use crate::hashing::SeededHash;
use crate::heavy_part::HeavyPart;
use crate::param::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    Wavelet,
    Fourier,
    OmniWindow,
    PersistCms,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Wavelet,
        Algorithm::Fourier,
        Algorithm::OmniWindow,
        Algorithm::PersistCms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Wavelet => "wavesketch",
            Algorithm::Fourier => "fourier",
            Algorithm::OmniWindow => "omniwindow",
            Algorithm::PersistCms => "persistcms",
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wavesketch" | "wavelet" | "wavesketch-ideal" => Ok(Algorithm::Wavelet),
            "fourier" => Ok(Algorithm::Fourier),
            "omniwindow" => Ok(Algorithm::OmniWindow),
            "persistcms" => Ok(Algorithm::PersistCms),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Algorithm> for String {
    fn from(a: Algorithm) -> String {
        a.as_str().to_string()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_total_windows() -> u32 {
    DEFAULT_TOTAL_WINDOWS
}

fn default_light_depth() -> usize {
    DEFAULT_LIGHT_DEPTH
}

fn default_heavy_share() -> f64 {
    DEFAULT_HEAVY_SHARE
}

fn default_vote_max() -> u32 {
    DEFAULT_VOTE_MAX
}

fn default_fourier_frame() -> u32 {
    DEFAULT_FOURIER_FRAME
}

/// Construction-time configuration shared by every scheme.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemeConfig {
    pub algorithm: Algorithm,
    #[serde(default)]
    pub memory_bytes: Option<usize>,
    #[serde(default)]
    pub memory_kb: Option<usize>,
    pub window_us: u64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_total_windows")]
    pub total_windows: u32,
    #[serde(default)]
    pub levels: Option<u32>,
    #[serde(default = "default_light_depth")]
    pub light_depth: usize,
    #[serde(default = "default_heavy_share")]
    pub heavy_share: f64,
    #[serde(default = "default_vote_max")]
    pub vote_max: u32,
    #[serde(default = "default_fourier_frame")]
    pub fourier_frame: u32,
    #[serde(default)]
    pub seed: u64,
}

/// Table sizes derived from the budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub layout: Layout,
    pub heavy_slots: usize,
    pub light_depth: usize,
    pub light_width: usize,
    pub budget: usize,
}

impl SchemeConfig {
    pub fn new(algorithm: Algorithm, memory_bytes: usize, window_us: u64, top_k: usize) -> Self {
        Self {
            algorithm,
            memory_bytes: Some(memory_bytes),
            memory_kb: None,
            window_us,
            top_k,
            total_windows: DEFAULT_TOTAL_WINDOWS,
            levels: None,
            light_depth: DEFAULT_LIGHT_DEPTH,
            heavy_share: DEFAULT_HEAVY_SHARE,
            vote_max: DEFAULT_VOTE_MAX,
            fourier_frame: DEFAULT_FOURIER_FRAME,
            seed: 0,
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_total_windows(mut self, total_windows: u32) -> Self {
        self.total_windows = total_windows;
        self
    }

    pub fn with_levels(mut self, levels: u32) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn with_light_depth(mut self, depth: usize) -> Self {
        self.light_depth = depth;
        self
    }

    pub fn with_heavy_share(mut self, share: f64) -> Self {
        self.heavy_share = share;
        self
    }

    pub fn with_vote_max(mut self, vote_max: u32) -> Self {
        self.vote_max = vote_max;
        self
    }

    pub fn with_fourier_frame(mut self, frame: u32) -> Self {
        self.fourier_frame = frame;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn memory_budget(&self) -> Result<usize> {
        match (self.memory_bytes, self.memory_kb) {
            (Some(bytes), None) => Ok(bytes),
            (None, Some(kb)) => Ok(kb.saturating_mul(1024)),
            (Some(_), Some(_)) => Err(Error::invalid(
                "memory_bytes",
                "give either memory_bytes or memory_kb, not both",
            )),
            (None, None) => Err(Error::invalid("memory_bytes", "a memory budget is required")),
        }
    }

    pub fn levels(&self) -> u32 {
        let max = self.total_windows.trailing_zeros();
        self.levels
            .unwrap_or_else(|| max.saturating_sub(RESERVED_LEVELS).max(1))
    }

    pub fn validate(&self) -> Result<()> {
        self.memory_budget()?;
        if self.window_us == 0 {
            return Err(Error::invalid("window_us", "must be positive"));
        }
        if self.total_windows < 2 || !self.total_windows.is_power_of_two() {
            return Err(Error::invalid(
                "total_windows",
                format!("{} is not a power of two >= 2", self.total_windows),
            ));
        }
        let levels = self.levels();
        let max = self.total_windows.trailing_zeros();
        if levels == 0 || levels > max {
            return Err(Error::invalid(
                "levels",
                format!("{} outside 1..={}", levels, max),
            ));
        }
        if self.light_depth == 0 {
            return Err(Error::invalid("light_depth", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.heavy_share) {
            return Err(Error::invalid(
                "heavy_share",
                format!("{} outside [0, 1]", self.heavy_share),
            ));
        }
        if self.vote_max == 0 {
            return Err(Error::invalid("vote_max", "must be at least 1"));
        }
        // frames longer than the horizon are cut down to it
        if self.fourier_frame < 2 || !self.fourier_frame.is_power_of_two() {
            return Err(Error::invalid(
                "fourier_frame",
                format!("{} is not a power of two >= 2", self.fourier_frame),
            ));
        }
        Ok(())
    }

    /// Sizes the heavy table and light grid for basis `B`.
    ///
    /// K is clamped to what a bucket can produce, then halved until one light
    /// column fits next to the heavy share of the budget.
    pub fn dimensions<B: Basis>(&self) -> Result<Dimensions> {
        self.validate()?;
        let budget = self.memory_budget()?;
        let mut layout = Layout {
            total_windows: self.total_windows,
            levels: self.levels(),
            top_k: 0,
            frame: self.fourier_frame,
        };
        layout.top_k = self.top_k.min(B::max_coefficients(&layout));
        let seed_bytes = size_of::<SeededHash>();

        loop {
            let slot = HeavyPart::<B>::slot_footprint(&layout);
            let cell = Bucket::<B>::footprint(&layout);

            let column = self.light_depth * cell;
            let heavy_slots = if B::USES_HEAVY_PART {
                // one light column is always left over
                let reserve = column + self.light_depth * seed_bytes;
                let share = ((budget as f64 * self.heavy_share) as usize)
                    .min(budget.saturating_sub(reserve));
                let raw = share.saturating_sub(seed_bytes) / slot;
                let ways = SLOTS_PER_GROUP.min(raw.max(1));
                raw / ways * ways
            } else {
                0
            };
            let heavy_bytes = HeavyPart::<B>::footprint(heavy_slots, &layout);
            let light_room = budget
                .saturating_sub(heavy_bytes)
                .saturating_sub(self.light_depth * seed_bytes);
            let light_width = light_room / column;

            if light_width >= 1 {
                return Ok(Dimensions {
                    layout,
                    heavy_slots,
                    light_depth: self.light_depth,
                    light_width,
                    budget,
                });
            }
            if layout.top_k == 0 {
                return Err(Error::BudgetTooSmall {
                    budget,
                    needed: heavy_bytes + column + self.light_depth * seed_bytes,
                });
            }
            layout.top_k /= 2;
        }
    }
}

pub fn read_config(file_path: impl AsRef<Path>) -> Result<SchemeConfig> {
    let config_data = fs::read_to_string(file_path)?;
    let config: SchemeConfig = serde_json::from_str(&config_data)?;
    config.validate()?;
    Ok(config)
}
