//! Fixed-memory per-flow rate curves.
//!
//! Every scheme records `(flow, timestamp, count)` events into a bounded
//! structure sized once from a byte budget, and later rebuilds an approximate
//! per-window curve for any flow. Four bases share one heavy/light layout:
//! Haar wavelets ([`wavelet`]), a framed DFT ([`fourier`]), coarsening
//! sub-window counters ([`omniwindow`]) and plain per-window Count-Min
//! ([`persist_cms`]).

pub mod bucket;
pub mod config;
pub mod driver;
pub mod error;
pub mod flow_key;
pub mod fourier;
pub mod ground_truth;
pub mod hashing;
pub mod heavy_part;
pub mod light_part;
pub mod logger;
pub mod metrics;
pub mod omniwindow;
pub mod param;
pub mod persist_cms;
pub mod scheme;
pub mod sketch;
pub mod synthetic;
pub mod topk;
pub mod wavelet;

pub use config::{read_config, Algorithm, SchemeConfig};
pub use error::{Error, Result};
pub use flow_key::FlowKey;
pub use scheme::{Query, Rebuilt, Scheme, SchemeStats, TimeRange};
pub use sketch::Sketch;
