use std::collections::HashMap;
use std::mem::size_of;

use crate::bucket::{sample, Basis, Bucket, CountOutcome, Layout};
use crate::flow_key::FlowKey;
use crate::hashing::SeededHash;

/// Per-row result of one light-part update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowTally {
    pub stored: usize,
    pub late: usize,
    /// Rows whose cell rolled into a newer epoch to take the update.
    pub rolled: usize,
}

/// `depth x width` grid of shared buckets laid out row-major in one arena.
///
/// Each row hashes a flow to one column with its own hash function. Buckets
/// are shared by every flow that collides into them, so a row only ever
/// over-reports a flow, and reads take the minimum across rows.
///
/// Cells are anchored to the global epoch grid (`total_windows`-aligned), so
/// flows that start at different times still land in one shared span, and a
/// newer epoch rolls a cell forward rather than being dropped.
pub struct LightPart<B> {
    depth: usize,
    width: usize,
    cells: Box<[Bucket<B>]>,
    hashes: Vec<SeededHash>,
    layout: Layout,
}

impl<B: Basis> LightPart<B> {
    pub fn new(depth: usize, width: usize, layout: &Layout, hashes: Vec<SeededHash>) -> Self {
        debug_assert_eq!(hashes.len(), depth);
        let cells = (0..depth * width)
            .map(|_| Bucket::aligned(layout))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            depth,
            width,
            cells,
            hashes,
            layout: *layout,
        }
    }

    pub fn footprint(depth: usize, width: usize, layout: &Layout) -> usize {
        depth * width * Bucket::<B>::footprint(layout) + depth * size_of::<SeededHash>()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Arena index of the key's cell in `row`.
    pub fn position(&self, row: usize, key: &FlowKey) -> usize {
        let col = (self.hashes[row].run_key(key) % self.width as u64) as usize;
        row * self.width + col
    }

    pub fn positions<'a>(&'a self, key: &'a FlowKey) -> impl Iterator<Item = usize> + 'a {
        (0..self.depth).map(move |row| self.position(row, key))
    }

    pub fn cell(&self, index: usize) -> &Bucket<B> {
        &self.cells[index]
    }

    pub fn insert(&mut self, key: &FlowKey, window: u64, value: u32) -> RowTally {
        let mut tally = RowTally::default();
        for row in 0..self.depth {
            let pos = self.position(row, key);
            match self.cells[pos].count(window, value) {
                CountOutcome::Accepted => tally.stored += 1,
                CountOutcome::Late => tally.late += 1,
                CountOutcome::Rolled => {
                    tally.stored += 1;
                    tally.rolled += 1;
                }
            }
        }
        tally
    }

    /// Count-Min read of global window `window` from already decoded cells.
    /// Rows whose cell has moved on to another epoch hold nothing for the
    /// window and are skipped.
    pub fn estimate(&self, key: &FlowKey, window: u64, decoded: &mut CurveCache) -> f64 {
        let mut best = f64::INFINITY;
        for pos in self.positions(key) {
            let cell = &self.cells[pos];
            if !cell.covers(window) {
                continue;
            }
            let curve = decoded.entry(pos).or_insert_with(|| cell.curve());
            best = best.min(sample(cell.origin(), curve, window));
        }
        if best.is_finite() {
            best
        } else {
            0.0
        }
    }

    pub fn flush(&mut self) {
        for cell in self.cells.iter_mut().filter(|c| !c.is_empty()) {
            cell.flush();
        }
    }

    pub fn clear(&mut self) {
        for cell in self.cells.iter_mut() {
            cell.reset();
        }
    }

    pub fn get_memory_usage(&self) -> usize {
        Self::footprint(self.depth, self.width, &self.layout)
    }
}

/// Decoded light cells, keyed by arena index, reused within one rebuild.
pub type CurveCache = HashMap<usize, Vec<f64>>;
