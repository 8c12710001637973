//! Interval set over inode numbers.
//!
//! Preallocated inode grants arrive as ranges; the set keeps them maximally
//! coalesced so membership, first-available peek, and single-ino erase stay
//! cheap regardless of how fragmented consumption gets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::identity::Ino;

/// Coalesced set of inode numbers, stored as `start -> len` ranges.
///
/// Ranges never overlap or abut; inserts union with existing ranges and
/// merge neighbours.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InoSet {
    ranges: BTreeMap<u64, u64>,
}

impl InoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a range of `len` inos starting at `start`, merging with any
    /// overlapping or adjacent ranges.
    pub fn insert_span(&mut self, start: Ino, len: u64) {
        if len == 0 {
            return;
        }
        let mut new_start = start.get();
        let mut new_end = new_start
            .checked_add(len)
            .expect("ino range end overflows u64");

        if let Some((&prev_start, &prev_len)) = self.ranges.range(..=new_start).next_back() {
            if prev_start + prev_len >= new_start {
                new_start = prev_start;
                new_end = new_end.max(prev_start + prev_len);
                self.ranges.remove(&prev_start);
            }
        }
        loop {
            let next = self
                .ranges
                .range(new_start..)
                .next()
                .map(|(&s, &l)| (s, l));
            match next {
                Some((next_start, next_len)) if next_start <= new_end => {
                    new_end = new_end.max(next_start + next_len);
                    self.ranges.remove(&next_start);
                }
                _ => break,
            }
        }
        self.ranges.insert(new_start, new_end - new_start);
    }

    pub fn insert(&mut self, ino: Ino) {
        self.insert_span(ino, 1);
    }

    /// Merge every range of `other` into this set.
    pub fn insert_all(&mut self, other: &InoSet) {
        for (start, len) in other.iter_ranges() {
            self.insert_span(start, len);
        }
    }

    /// Remove a single ino, splitting its containing range if needed.
    /// Returns whether the ino was present.
    pub fn erase(&mut self, ino: Ino) -> bool {
        let target = ino.get();
        let (start, len) = match self.ranges.range(..=target).next_back() {
            Some((&s, &l)) => (s, l),
            None => return false,
        };
        let end = start + len;
        if target >= end {
            return false;
        }
        self.ranges.remove(&start);
        if target > start {
            self.ranges.insert(start, target - start);
        }
        if target + 1 < end {
            self.ranges.insert(target + 1, end - (target + 1));
        }
        true
    }

    pub fn contains(&self, ino: Ino) -> bool {
        let target = ino.get();
        self.ranges
            .range(..=target)
            .next_back()
            .is_some_and(|(&start, &len)| target < start + len)
    }

    /// Lowest ino in the set.
    pub fn first(&self) -> Option<Ino> {
        self.ranges.first_key_value().map(|(&start, _)| Ino::new(start))
    }

    /// Total number of inos across all ranges.
    pub fn count(&self) -> u64 {
        self.ranges.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn iter_ranges(&self) -> impl Iterator<Item = (Ino, u64)> + '_ {
        self.ranges.iter().map(|(&start, &len)| (Ino::new(start), len))
    }

    /// Whether this set shares any ino with `other`.
    pub fn intersects(&self, other: &InoSet) -> bool {
        let (small, large) = if self.ranges.len() <= other.ranges.len() {
            (self, other)
        } else {
            (other, self)
        };
        for (&start, &len) in &small.ranges {
            if let Some((&other_start, &other_len)) = large.ranges.range(..start + len).next_back()
            {
                if other_start + other_len > start {
                    return true;
                }
            }
        }
        false
    }
}

impl fmt::Debug for InoSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InoSet[")?;
        for (i, (&start, &len)) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{:#x}+{}", start, len)?;
        }
        write!(f, "]")
    }
}
