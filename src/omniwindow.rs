//! Multi-granularity sub-window counters without any transform.
//!
//! A bucket keeps a fixed set of `slots` counters. They start at one window
//! each; whenever a window falls past the range they can cover, adjacent
//! pairs are merged and the granularity doubles. Reconstruction spreads each
//! counter evenly over the windows it covers, so curves come back
//! piecewise-constant at the coarsest granularity the flow forced.

use std::mem::size_of;

use crate::bucket::{Basis, Layout};
use crate::config::Algorithm;
use crate::scheme::SketchScheme;

pub type OmniWindowScheme = SketchScheme<SubWindows>;

#[derive(Clone, Debug)]
pub struct SubWindows {
    span: u32,
    slots: Box<[u64]>,
}

fn slot_count(layout: &Layout) -> usize {
    let k = layout.top_k.max(1);
    // largest power of two not above k
    let pow = 1usize << (usize::BITS - 1 - k.leading_zeros());
    pow.min(layout.total_windows as usize)
}

impl SubWindows {
    pub fn span(&self) -> u32 {
        self.span
    }

    fn coarsen(&mut self) {
        let n = self.slots.len();
        if n > 1 {
            for s in 0..n / 2 {
                self.slots[s] = self.slots[2 * s].saturating_add(self.slots[2 * s + 1]);
            }
            self.slots[n / 2..].fill(0);
        }
        self.span *= 2;
    }
}

impl Basis for SubWindows {
    const ALGORITHM: Algorithm = Algorithm::OmniWindow;

    fn with_layout(layout: &Layout) -> Self {
        Self {
            span: 1,
            slots: vec![0; slot_count(layout)].into_boxed_slice(),
        }
    }

    fn heap_bytes(layout: &Layout) -> usize {
        slot_count(layout) * size_of::<u64>()
    }

    fn max_coefficients(layout: &Layout) -> usize {
        layout.total_windows as usize
    }

    fn transform(&mut self, index: u32, count: u32) {
        while u64::from(index) >= self.slots.len() as u64 * u64::from(self.span) {
            self.coarsen();
        }
        let slot = (index / self.span) as usize;
        self.slots[slot] = self.slots[slot].saturating_add(u64::from(count));
    }

    fn seal(&mut self) {}

    fn reconstruct(&self, out: &mut [f64]) {
        out.fill(0.0);
        let span = self.span as usize;
        for (s, &total) in self.slots.iter().enumerate() {
            if total == 0 {
                continue;
            }
            let level = total as f64 / span as f64;
            let start = s * span;
            let end = (start + span).min(out.len());
            if start < end {
                out[start..end].fill(level);
            }
        }
    }

    fn clear(&mut self) {
        self.span = 1;
        self.slots.fill(0);
    }
}
