//! Per-flow compression state shared by every scheme.
//!
//! A [`Bucket`] owns the window cursor (first window, open window index,
//! open-window accumulator) and hands every closed window to its [`Basis`],
//! which decides how the curve is compressed.

use std::mem::size_of;

use crate::config::Algorithm;

/// Fixed geometry of one bucket, derived once from the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    /// Windows a bucket covers from its origin; also the light-grid epoch.
    pub total_windows: u32,
    /// Haar decomposition depth.
    pub levels: u32,
    /// Effective coefficient budget after clamping.
    pub top_k: usize,
    /// DFT frame length.
    pub frame: u32,
}

/// How a bucket turns closed windows into a bounded summary.
pub trait Basis: Sized {
    const ALGORITHM: Algorithm;
    const USES_HEAVY_PART: bool = true;

    fn with_layout(layout: &Layout) -> Self;

    /// Bytes a basis reserves outside its own struct.
    fn heap_bytes(layout: &Layout) -> usize;

    /// Upper bound on the coefficients one bucket can produce; K is clamped to it.
    fn max_coefficients(layout: &Layout) -> usize;

    /// Folds the closed window `index` holding `count` into the summary.
    fn transform(&mut self, index: u32, count: u32);

    /// Finalizes partially accumulated coefficients.
    fn seal(&mut self);

    /// Writes the decoded per-window curve into `out` (`total_windows` long).
    fn reconstruct(&self, out: &mut [f64]);

    fn clear(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountOutcome {
    Accepted,
    /// Window precedes the bucket origin; dropped.
    Late,
    /// Window lay past the horizon: the bucket discarded its span and
    /// restarted there before storing the count.
    Rolled,
}

/// Where a bucket's span starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    /// At the first window counted; used for buckets owned by one flow.
    FirstWindow,
    /// On the global grid of `total_windows`-aligned epochs; used for cells
    /// shared by several flows, so every flow sees the same span.
    Grid,
}

#[derive(Clone, Debug)]
pub struct Bucket<B> {
    w0: Option<u64>,
    i: u32,
    c: u32,
    open: bool,
    horizon: u32,
    anchor: Anchor,
    basis: B,
}

impl<B: Basis> Bucket<B> {
    pub fn new(layout: &Layout) -> Self {
        Self::with_anchor(layout, Anchor::FirstWindow)
    }

    /// A bucket whose span follows the global epoch grid.
    pub fn aligned(layout: &Layout) -> Self {
        Self::with_anchor(layout, Anchor::Grid)
    }

    fn with_anchor(layout: &Layout, anchor: Anchor) -> Self {
        Self {
            w0: None,
            i: 0,
            c: 0,
            open: false,
            horizon: layout.total_windows,
            anchor,
            basis: B::with_layout(layout),
        }
    }

    pub fn footprint(layout: &Layout) -> usize {
        size_of::<Self>() + B::heap_bytes(layout)
    }

    /// Global window number where the current span starts.
    pub fn origin(&self) -> Option<u64> {
        self.w0
    }

    pub fn is_empty(&self) -> bool {
        self.w0.is_none()
    }

    pub fn basis(&self) -> &B {
        &self.basis
    }

    fn origin_for(&self, window: u64) -> u64 {
        match self.anchor {
            Anchor::FirstWindow => window,
            Anchor::Grid => window - window % u64::from(self.horizon),
        }
    }

    /// Whether global window `window` lies in the span this bucket holds.
    pub fn covers(&self, window: u64) -> bool {
        match self.w0 {
            Some(w0) => window >= w0 && window - w0 < u64::from(self.horizon),
            None => false,
        }
    }

    /// Adds `value` to global window `window`.
    ///
    /// Windows behind the open one but inside the span are folded straight
    /// into the basis as an extra contribution; every basis is linear, so
    /// the order of contributions does not change the decoded curve.
    pub fn count(&mut self, window: u64, value: u32) -> CountOutcome {
        let origin = self.origin_for(window);
        let w0 = *self.w0.get_or_insert(origin);
        if window < w0 {
            return CountOutcome::Late;
        }

        let mut outcome = CountOutcome::Accepted;
        let w0 = if window - w0 >= u64::from(self.horizon) {
            self.reset();
            self.w0 = Some(origin);
            outcome = CountOutcome::Rolled;
            origin
        } else {
            w0
        };

        let index = (window - w0) as u32;
        if index < self.i {
            self.basis.transform(index, value);
        } else if index == self.i {
            self.c = self.c.saturating_add(value);
            self.open = true;
        } else {
            self.close();
            self.i = index;
            self.c = value;
            self.open = true;
        }
        outcome
    }

    fn close(&mut self) {
        if self.open {
            self.basis.transform(self.i, self.c);
            self.c = 0;
            self.open = false;
        }
    }

    /// Closes the open window and finalizes pending coefficients. A second
    /// call without an intervening `count` changes nothing.
    pub fn flush(&mut self) {
        self.close();
        self.basis.seal();
    }

    /// Decoded curve over the bucket horizon, clamped at zero.
    pub fn curve(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.horizon as usize];
        if self.w0.is_some() {
            self.basis.reconstruct(&mut out);
            for v in out.iter_mut() {
                if *v < 0.0 {
                    *v = 0.0;
                }
            }
        }
        out
    }

    pub fn reset(&mut self) {
        self.w0 = None;
        self.i = 0;
        self.c = 0;
        self.open = false;
        self.basis.clear();
    }
}

/// Value of global window `window` in a curve decoded from a bucket whose
/// first window is `origin`.
pub fn sample(origin: Option<u64>, curve: &[f64], window: u64) -> f64 {
    match origin {
        Some(w0) if window >= w0 => curve
            .get((window - w0) as usize)
            .copied()
            .unwrap_or(0.0),
        _ => 0.0,
    }
}
