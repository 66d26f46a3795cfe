//! Frame-wise real DFT with Top-K spectral retention.
//!
//! The horizon is cut into frames of `frame` windows. When the cursor leaves
//! a frame (or on flush) the frame is transformed, the non-redundant bins
//! `0..=frame/2` are offered to the bucket's Top-K store by energy
//! contribution, and the frame buffer is cleared.

use std::f64::consts::PI;
use std::mem::size_of;

use crate::bucket::{Basis, Layout};
use crate::config::Algorithm;
use crate::param::ZERO_EPSILON;
use crate::scheme::SketchScheme;
use crate::topk::TopK;

pub type FourierScheme = SketchScheme<Spectrum>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bin {
    pub frame: u32,
    pub k: u32,
    pub re: f64,
    pub im: f64,
}

#[derive(Clone, Debug)]
pub struct Spectrum {
    frame: u32,
    current: u32,
    buffer: Box<[u64]>,
    bins: TopK<Bin>,
}

fn frame_len(layout: &Layout) -> u32 {
    layout.frame.min(layout.total_windows).max(1)
}

impl Spectrum {
    // conjugate-symmetric partner bins are folded into k, so they count twice
    fn multiplicity(&self, k: u32) -> f64 {
        if k == 0 || (self.frame % 2 == 0 && k == self.frame / 2) {
            1.0
        } else {
            2.0
        }
    }

    pub fn retained(&self) -> impl Iterator<Item = &Bin> {
        self.bins.iter().map(|w| &w.item)
    }
}

impl Basis for Spectrum {
    const ALGORITHM: Algorithm = Algorithm::Fourier;

    fn with_layout(layout: &Layout) -> Self {
        let frame = frame_len(layout);
        Self {
            frame,
            current: 0,
            buffer: vec![0; frame as usize].into_boxed_slice(),
            bins: TopK::new(layout.top_k),
        }
    }

    fn heap_bytes(layout: &Layout) -> usize {
        frame_len(layout) as usize * size_of::<u64>() + TopK::<Bin>::footprint(layout.top_k)
    }

    fn max_coefficients(layout: &Layout) -> usize {
        let frame = frame_len(layout);
        (layout.total_windows / frame) as usize * (frame / 2 + 1) as usize
    }

    fn transform(&mut self, index: u32, count: u32) {
        let frame = index / self.frame;
        if frame != self.current {
            self.seal();
            self.current = frame;
        }
        let slot = (index % self.frame) as usize;
        self.buffer[slot] = self.buffer[slot].saturating_add(u64::from(count));
    }

    fn seal(&mut self) {
        if self.buffer.iter().all(|&x| x == 0) {
            return;
        }
        let n = self.frame as f64;
        for k in 0..=self.frame / 2 {
            let (mut re, mut im) = (0.0, 0.0);
            for (t, &x) in self.buffer.iter().enumerate() {
                if x == 0 {
                    continue;
                }
                let theta = 2.0 * PI * f64::from(k) * t as f64 / n;
                re += x as f64 * theta.cos();
                im -= x as f64 * theta.sin();
            }
            let magnitude = re.hypot(im);
            if magnitude <= ZERO_EPSILON {
                continue;
            }
            let weight = magnitude * self.multiplicity(k).sqrt();
            self.bins.offer(
                Bin {
                    frame: self.current,
                    k,
                    re,
                    im,
                },
                weight,
            );
        }
        self.buffer.fill(0);
    }

    fn reconstruct(&self, out: &mut [f64]) {
        out.fill(0.0);
        let n = self.frame as f64;
        for bin in self.retained() {
            let scale = self.multiplicity(bin.k) / n;
            let base = (bin.frame * self.frame) as usize;
            for t in 0..self.frame as usize {
                let theta = 2.0 * PI * f64::from(bin.k) * t as f64 / n;
                if let Some(slot) = out.get_mut(base + t) {
                    *slot += scale * (bin.re * theta.cos() - bin.im * theta.sin());
                }
            }
        }
    }

    fn clear(&mut self) {
        self.current = 0;
        self.buffer.fill(0);
        self.bins.clear();
    }
}
