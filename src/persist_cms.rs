use std::mem::size_of;

use crate::bucket::{Basis, Layout};
use crate::config::Algorithm;
use crate::scheme::SketchScheme;

/// Plain Count-Min over time: every cell stores one counter per window.
pub type PersistCmsScheme = SketchScheme<PerWindow>;

#[derive(Clone, Debug)]
pub struct PerWindow {
    counters: Box<[u32]>,
}

impl Basis for PerWindow {
    const ALGORITHM: Algorithm = Algorithm::PersistCms;
    const USES_HEAVY_PART: bool = false;

    fn with_layout(layout: &Layout) -> Self {
        Self {
            counters: vec![0; layout.total_windows as usize].into_boxed_slice(),
        }
    }

    fn heap_bytes(layout: &Layout) -> usize {
        layout.total_windows as usize * size_of::<u32>()
    }

    fn max_coefficients(layout: &Layout) -> usize {
        layout.total_windows as usize
    }

    fn transform(&mut self, index: u32, count: u32) {
        let slot = &mut self.counters[index as usize];
        *slot = slot.saturating_add(count);
    }

    fn seal(&mut self) {}

    fn reconstruct(&self, out: &mut [f64]) {
        for (slot, &c) in out.iter_mut().zip(self.counters.iter()) {
            *slot = f64::from(c);
        }
    }

    fn clear(&mut self) {
        self.counters.fill(0);
    }
}
