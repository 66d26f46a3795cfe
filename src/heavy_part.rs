use std::mem::size_of;
use tracing::debug;

use crate::bucket::{Basis, Bucket, CountOutcome, Layout};
use crate::flow_key::FlowKey;
use crate::hashing::SeededHash;
use crate::param::*;

pub struct Slot<B> {
    key: Option<FlowKey>,
    vote: u32,
    bucket: Bucket<B>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeavyInsert {
    /// Flow was resident.
    Hit(CountOutcome),
    /// Flow took a slot, displacing `evicted` if the slot was occupied.
    Admitted {
        evicted: Option<FlowKey>,
        outcome: CountOutcome,
    },
    /// Flow lost the vote; the caller routes the event to the light part.
    Rejected,
}

/// Fixed set-associative table of exactly tracked flows.
///
/// A flow hashes to one group of slots. Residents gain a vote per event up to
/// `vote_max`; a newcomer facing a full group takes one vote off the weakest
/// resident and replaces it once that vote reaches zero.
pub struct HeavyPart<B> {
    slots: Box<[Slot<B>]>,
    ways: usize,
    groups: usize,
    vote_max: u32,
    hash: SeededHash,
    layout: Layout,
}

impl<B: Basis> HeavyPart<B> {
    pub fn new(slot_num: usize, layout: &Layout, vote_max: u32, hash: SeededHash) -> Self {
        let ways = SLOTS_PER_GROUP.min(slot_num);
        let groups = if ways == 0 { 0 } else { slot_num / ways };
        let slots = (0..groups * ways)
            .map(|_| Slot {
                key: None,
                vote: 0,
                bucket: Bucket::new(layout),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            ways,
            groups,
            vote_max,
            hash,
            layout: *layout,
        }
    }

    pub fn slot_footprint(layout: &Layout) -> usize {
        size_of::<Slot<B>>() + B::heap_bytes(layout)
    }

    pub fn footprint(slot_num: usize, layout: &Layout) -> usize {
        if slot_num == 0 {
            0
        } else {
            slot_num * Self::slot_footprint(layout) + size_of::<SeededHash>()
        }
    }

    fn group_range(&self, key: &FlowKey) -> std::ops::Range<usize> {
        let pos = calculate_group_pos(self.hash.run_key(key), self.groups);
        pos * self.ways..(pos + 1) * self.ways
    }

    pub fn insert(&mut self, key: &FlowKey, window: u64, value: u32) -> HeavyInsert {
        if self.slots.is_empty() {
            return HeavyInsert::Rejected;
        }
        let range = self.group_range(key);

        if let Some(slot) = self.slots[range.clone()]
            .iter_mut()
            .find(|s| s.key.as_ref() == Some(key))
        {
            slot.vote = update_vote(slot.vote, self.vote_max);
            return HeavyInsert::Hit(slot.bucket.count(window, value));
        }

        if let Some(slot) = self.slots[range.clone()].iter_mut().find(|s| s.key.is_none()) {
            slot.key = Some(*key);
            slot.vote = 1;
            slot.bucket.reset();
            let outcome = slot.bucket.count(window, value);
            return HeavyInsert::Admitted {
                evicted: None,
                outcome,
            };
        }

        let weakest = range
            .min_by_key(|&i| self.slots[i].vote)
            .unwrap_or(0);
        let slot = &mut self.slots[weakest];
        slot.vote = slot.vote.saturating_sub(1);
        if !judge_if_evict(slot.vote) {
            return HeavyInsert::Rejected;
        }

        let evicted = slot.key.replace(*key);
        if let Some(old) = &evicted {
            debug!(evicted = %old, admitted = %key, "heavy slot changed hands");
        }
        slot.vote = 1;
        slot.bucket.reset();
        let outcome = slot.bucket.count(window, value);
        HeavyInsert::Admitted { evicted, outcome }
    }

    pub fn get(&self, key: &FlowKey) -> Option<&Bucket<B>> {
        if self.slots.is_empty() {
            return None;
        }
        self.slots[self.group_range(key)]
            .iter()
            .find(|s| s.key.as_ref() == Some(key))
            .map(|s| &s.bucket)
    }

    pub fn vote(&self, key: &FlowKey) -> Option<u32> {
        if self.slots.is_empty() {
            return None;
        }
        self.slots[self.group_range(key)]
            .iter()
            .find(|s| s.key.as_ref() == Some(key))
            .map(|s| s.vote)
    }

    pub fn flush(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| s.key.is_some()) {
            slot.bucket.flush();
        }
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.key = None;
            slot.vote = 0;
            slot.bucket.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.key.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get_memory_usage(&self) -> usize {
        Self::footprint(self.slots.len(), &self.layout)
    }
}
