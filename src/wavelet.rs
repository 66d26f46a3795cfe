//! Online multi-level Haar decomposition with Top-K detail retention.
//!
//! Each closed window `i` with count `c` is folded in as follows:
//!
//! - the deepest approximation cell `i >> L` gains `c`;
//! - for every level `l < L`, the running detail of block `i >> (l + 1)`
//!   gains `+c` when bit `l` of `i` is 0 and `-c` when it is 1.
//!
//! A level-`l` detail is therefore `sum(first half) - sum(second half)` of a
//! block of `2^(l+1)` windows, and the approximation cells hold block sums.
//! Inverting one step gives `left = (s + d) / 2`, `right = (s - d) / 2`, the
//! exact algebraic inverse of the forward sum/difference. Halving is exact in
//! binary floating point, so integer curves round-trip bit-for-bit when every
//! non-zero detail is retained.
//!
//! Details are finalized when the window index leaves their block. Skipped
//! windows hold zero and contribute nothing, so a jump closes every block it
//! crosses without replaying the empty windows one by one. Finalized details
//! of zero are implicit and never occupy a Top-K slot.

use std::collections::HashMap;
use std::mem::size_of;

use crate::bucket::{Basis, Layout};
use crate::config::Algorithm;
use crate::param::level_weight;
use crate::scheme::SketchScheme;
use crate::topk::TopK;

pub type WaveletScheme = SketchScheme<Haar>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detail {
    pub level: u32,
    pub index: u32,
    pub value: i64,
}

#[derive(Clone, Debug)]
pub struct Haar {
    levels: u32,
    approx: Box<[u64]>,
    partial: Box<[i64]>,
    block: Box<[u32]>,
    details: TopK<Detail>,
}

impl Haar {
    fn compress(&mut self, level: u32) {
        let l = level as usize;
        let value = std::mem::take(&mut self.partial[l]);
        if value == 0 {
            return;
        }
        let weight = value.unsigned_abs() as f64 * level_weight(level);
        self.details.offer(
            Detail {
                level,
                index: self.block[l],
                value,
            },
            weight,
        );
    }

    pub fn approximation(&self) -> &[u64] {
        &self.approx
    }

    pub fn details(&self) -> impl Iterator<Item = &Detail> {
        self.details.iter().map(|w| &w.item)
    }
}

impl Basis for Haar {
    const ALGORITHM: Algorithm = Algorithm::Wavelet;

    fn with_layout(layout: &Layout) -> Self {
        let levels = layout.levels as usize;
        Self {
            levels: layout.levels,
            approx: vec![0; (layout.total_windows >> layout.levels) as usize].into_boxed_slice(),
            partial: vec![0; levels].into_boxed_slice(),
            block: vec![0; levels].into_boxed_slice(),
            details: TopK::new(layout.top_k),
        }
    }

    fn heap_bytes(layout: &Layout) -> usize {
        (layout.total_windows >> layout.levels) as usize * size_of::<u64>()
            + layout.levels as usize * (size_of::<i64>() + size_of::<u32>())
            + TopK::<Detail>::footprint(layout.top_k)
    }

    fn max_coefficients(layout: &Layout) -> usize {
        (layout.total_windows - (layout.total_windows >> layout.levels)) as usize
    }

    fn transform(&mut self, index: u32, count: u32) {
        for level in 0..self.levels {
            let j = index >> (level + 1);
            if j != self.block[level as usize] {
                self.compress(level);
                self.block[level as usize] = j;
            }
        }

        let cell = (index >> self.levels) as usize;
        self.approx[cell] = self.approx[cell].saturating_add(u64::from(count));

        let c = i64::from(count);
        for (level, partial) in self.partial.iter_mut().enumerate() {
            if (index >> level) & 1 == 0 {
                *partial = partial.saturating_add(c);
            } else {
                *partial = partial.saturating_sub(c);
            }
        }
    }

    fn seal(&mut self) {
        for level in 0..self.levels {
            self.compress(level);
        }
    }

    fn reconstruct(&self, out: &mut [f64]) {
        // duplicates appear when a flushed block is reopened; the transform is linear
        let mut stored: HashMap<(u32, u32), f64> = HashMap::with_capacity(self.details.len());
        for d in self.details() {
            *stored.entry((d.level, d.index)).or_insert(0.0) += d.value as f64;
        }

        for (slot, a) in out.iter_mut().zip(self.approx.iter()) {
            *slot = *a as f64;
        }
        let mut len = self.approx.len();
        for level in (0..self.levels).rev() {
            for j in (0..len).rev() {
                let s = out[j];
                let d = stored.get(&(level, j as u32)).copied().unwrap_or(0.0);
                out[2 * j] = (s + d) / 2.0;
                out[2 * j + 1] = (s - d) / 2.0;
            }
            len *= 2;
        }
    }

    fn clear(&mut self) {
        self.approx.fill(0);
        self.partial.fill(0);
        self.block.fill(0);
        self.details.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Bucket;

    fn layout(total_windows: u32, levels: u32, top_k: usize) -> Layout {
        Layout {
            total_windows,
            levels,
            top_k,
            frame: total_windows,
        }
    }

    fn feed(bucket: &mut Bucket<Haar>, curve: &[u32]) {
        for (w, &c) in curve.iter().enumerate() {
            if c > 0 {
                bucket.count(w as u64, c);
            }
        }
        bucket.flush();
    }

    #[test]
    fn two_spikes_round_trip() {
        let mut bucket = Bucket::<Haar>::new(&layout(8, 3, 4));
        // window 0 must be seen first so the origin lines up
        bucket.count(0, 0);
        feed(&mut bucket, &[0, 0, 5, 0, 0, 0, 5, 0]);
        assert_eq!(bucket.curve(), vec![0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 5.0, 0.0]);
        assert_eq!(bucket.basis().approximation(), &[10]);
        assert_eq!(bucket.basis().details().count(), 4);
    }

    #[test]
    fn details_match_block_differences() {
        let mut bucket = Bucket::<Haar>::new(&layout(4, 2, 8));
        feed(&mut bucket, &[3, 1, 4, 1]);
        let mut details: Vec<Detail> = bucket.basis().details().copied().collect();
        details.sort_by_key(|d| (d.level, d.index));
        assert_eq!(
            details,
            vec![
                Detail { level: 0, index: 0, value: 2 },
                Detail { level: 0, index: 1, value: 3 },
                Detail { level: 1, index: 0, value: -1 },
            ]
        );
        assert_eq!(bucket.curve(), vec![3.0, 1.0, 4.0, 1.0]);
    }

    #[test]
    fn zero_budget_keeps_block_means() {
        let mut bucket = Bucket::<Haar>::new(&layout(4, 2, 0));
        feed(&mut bucket, &[3, 1, 4, 1]);
        assert_eq!(bucket.curve(), vec![2.25; 4]);
    }

    #[test]
    fn keeps_heaviest_detail() {
        // level-0 detail 8 outweighs the level-1 detail -2 (8/sqrt2 > 2/2)
        let mut bucket = Bucket::<Haar>::new(&layout(4, 2, 1));
        feed(&mut bucket, &[8, 0, 5, 5]);
        let kept: Vec<Detail> = bucket.basis().details().copied().collect();
        assert_eq!(kept, vec![Detail { level: 0, index: 0, value: 8 }]);
        assert_eq!(bucket.curve(), vec![8.5, 0.5, 4.5, 4.5]);
    }

    #[test]
    fn reopened_window_sums_duplicates() {
        let mut bucket = Bucket::<Haar>::new(&layout(4, 2, 8));
        bucket.count(0, 2);
        bucket.flush();
        bucket.count(0, 1);
        bucket.count(1, 4);
        bucket.flush();
        assert_eq!(bucket.curve(), vec![3.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn negative_estimates_clamp_to_zero() {
        let mut bucket = Bucket::<Haar>::new(&layout(4, 2, 1));
        // the level-0 detail of block 1 (-9) survives, the block-0 one (1) is dropped
        feed(&mut bucket, &[1, 0, 0, 9]);
        let curve = bucket.curve();
        assert!(curve.iter().all(|v| *v >= 0.0));
        assert_eq!(curve, vec![2.5, 2.5, 0.0, 7.0]);
    }
}
