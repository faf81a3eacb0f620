//! Integer domains
//!
//! A domain is an interval `[lb, ub]`, optionally refined once values are removed from
//! its interior: a bitset for narrow domains, sorted sets for wide ones. Bounds are
//! authoritative: refinement entries outside `[lb, ub]` are ignored, which keeps bound
//! updates cheap.

use std::collections::BTreeSet;

/// Widest domain refined with a dense bitset
const DENSE_WIDTH: u64 = 1 << 16;

fn width(lb: i64, ub: i64) -> u64 {
    (ub - lb) as u64 + 1
}

/// The domain would become empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyDomain;

#[derive(Debug, Clone, PartialEq, Eq)]
struct BitSet {
    offset: i64,
    words: Vec<u64>,
}

impl BitSet {
    fn full(lb: i64, ub: i64) -> Self {
        let len = (ub - lb + 1) as usize;
        Self {
            offset: lb,
            words: vec![u64::MAX; len.div_ceil(64)],
        }
    }

    fn empty(lb: i64, ub: i64) -> Self {
        let len = (ub - lb + 1) as usize;
        Self {
            offset: lb,
            words: vec![0; len.div_ceil(64)],
        }
    }

    fn position(&self, value: i64) -> Option<(usize, usize)> {
        if value < self.offset {
            return None;
        }
        let idx = (value - self.offset) as usize;
        let word = idx / 64;
        (word < self.words.len()).then_some((word, idx % 64))
    }

    fn contains(&self, value: i64) -> bool {
        self.position(value)
            .map_or(false, |(word, bit)| self.words[word] & (1 << bit) != 0)
    }

    fn insert(&mut self, value: i64) {
        if let Some((word, bit)) = self.position(value) {
            self.words[word] |= 1 << bit;
        }
    }

    fn remove(&mut self, value: i64) {
        if let Some((word, bit)) = self.position(value) {
            self.words[word] &= !(1 << bit);
        }
    }

    /// Smallest member in `[from, to]`
    fn next_set(&self, from: i64, to: i64) -> Option<i64> {
        let mut value = from.max(self.offset);
        while value <= to {
            let (word, bit) = self.position(value)?;
            let bits = self.words[word] >> bit;
            if bits != 0 {
                let found = value + bits.trailing_zeros() as i64;
                return (found <= to).then_some(found);
            }
            value += (64 - bit) as i64;
        }
        None
    }

    /// Largest member in `[to, from]`
    fn prev_set(&self, from: i64, to: i64) -> Option<i64> {
        let last = self.offset + (self.words.len() * 64) as i64 - 1;
        let mut value = from.min(last);
        while value >= to && value >= self.offset {
            let (word, bit) = self.position(value)?;
            let mask = if bit == 63 {
                u64::MAX
            } else {
                (1u64 << (bit + 1)) - 1
            };
            let bits = self.words[word] & mask;
            if bits != 0 {
                let found =
                    self.offset + (word * 64) as i64 + (63 - bits.leading_zeros()) as i64;
                return (found >= to).then_some(found);
            }
            value = self.offset + (word * 64) as i64 - 1;
        }
        None
    }

    fn count(&self, lb: i64, ub: i64) -> u64 {
        let mut count = 0;
        let mut value = lb;
        while let Some(found) = self.next_set(value, ub) {
            count += 1;
            value = found + 1;
        }
        count
    }
}

/// Membership beyond the bounds of a domain
#[derive(Debug, Clone, PartialEq, Eq)]
enum Refinement {
    Bits(BitSet),
    /// Values removed from the interior of a wide interval
    Holes(BTreeSet<i64>),
    /// Members of a wide enumerated domain
    Values(BTreeSet<i64>),
}

impl Refinement {
    fn full(lb: i64, ub: i64) -> Self {
        if width(lb, ub) <= DENSE_WIDTH {
            Refinement::Bits(BitSet::full(lb, ub))
        } else {
            Refinement::Holes(BTreeSet::new())
        }
    }

    fn of_values(values: &[i64], lb: i64, ub: i64) -> Self {
        if width(lb, ub) <= DENSE_WIDTH {
            let mut bits = BitSet::empty(lb, ub);
            for value in values {
                bits.insert(*value);
            }
            Refinement::Bits(bits)
        } else {
            Refinement::Values(values.iter().copied().collect())
        }
    }

    fn contains(&self, value: i64) -> bool {
        match self {
            Refinement::Bits(bits) => bits.contains(value),
            Refinement::Holes(holes) => !holes.contains(&value),
            Refinement::Values(values) => values.contains(&value),
        }
    }

    fn remove(&mut self, value: i64) {
        match self {
            Refinement::Bits(bits) => bits.remove(value),
            Refinement::Holes(holes) => {
                holes.insert(value);
            }
            Refinement::Values(values) => {
                values.remove(&value);
            }
        }
    }

    /// Smallest member in `[from, to]`
    fn next_set(&self, from: i64, to: i64) -> Option<i64> {
        if from > to {
            return None;
        }
        match self {
            Refinement::Bits(bits) => bits.next_set(from, to),
            Refinement::Holes(holes) => {
                let mut value = from;
                for hole in holes.range(from..=to) {
                    if *hole != value {
                        break;
                    }
                    value += 1;
                }
                (value <= to).then_some(value)
            }
            Refinement::Values(values) => values.range(from..=to).next().copied(),
        }
    }

    /// Largest member in `[to, from]`
    fn prev_set(&self, from: i64, to: i64) -> Option<i64> {
        if from < to {
            return None;
        }
        match self {
            Refinement::Bits(bits) => bits.prev_set(from, to),
            Refinement::Holes(holes) => {
                let mut value = from;
                for hole in holes.range(to..=from).rev() {
                    if *hole != value {
                        break;
                    }
                    value -= 1;
                }
                (value >= to).then_some(value)
            }
            Refinement::Values(values) => values.range(to..=from).next_back().copied(),
        }
    }

    fn count(&self, lb: i64, ub: i64) -> u64 {
        if lb > ub {
            return 0;
        }
        match self {
            Refinement::Bits(bits) => bits.count(lb, ub),
            Refinement::Holes(holes) => width(lb, ub) - holes.range(lb..=ub).count() as u64,
            Refinement::Values(values) => values.range(lb..=ub).count() as u64,
        }
    }
}

/// Finite domain of an integer variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntDomain {
    lb: i64,
    ub: i64,
    size: u64,
    refinement: Option<Refinement>,
}

impl IntDomain {
    /// Every integer of `[lb, ub]`
    pub fn interval(lb: i64, ub: i64) -> Self {
        assert!(lb <= ub, "empty interval [{}, {}]", lb, ub);
        Self {
            lb,
            ub,
            size: width(lb, ub),
            refinement: None,
        }
    }

    /// Exactly the given values; `None` when there are none
    pub fn from_values(values: &[i64]) -> Option<Self> {
        let lb = *values.iter().min()?;
        let ub = *values.iter().max()?;
        let refinement = Refinement::of_values(values, lb, ub);
        let size = refinement.count(lb, ub);
        Some(Self {
            lb,
            ub,
            size,
            refinement: Some(refinement),
        })
    }

    pub fn singleton(value: i64) -> Self {
        Self::interval(value, value)
    }

    pub fn lb(&self) -> i64 {
        self.lb
    }

    pub fn ub(&self) -> i64 {
        self.ub
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_fixed(&self) -> bool {
        self.lb == self.ub
    }

    pub fn value(&self) -> Option<i64> {
        self.is_fixed().then_some(self.lb)
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.lb
            && value <= self.ub
            && self
                .refinement
                .as_ref()
                .map_or(true, |refinement| refinement.contains(value))
    }

    /// Smallest value of the domain that is at least `value`
    pub fn next_value(&self, value: i64) -> Option<i64> {
        let from = value.max(self.lb);
        match &self.refinement {
            _ if from > self.ub => None,
            Some(refinement) => refinement.next_set(from, self.ub),
            None => Some(from),
        }
    }

    /// Largest value of the domain that is at most `value`
    pub fn prev_value(&self, value: i64) -> Option<i64> {
        let from = value.min(self.ub);
        match &self.refinement {
            _ if from < self.lb => None,
            Some(refinement) => refinement.prev_set(from, self.lb),
            None => Some(from),
        }
    }

    /// Values in increasing order
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        let mut next = self.next_value(self.lb);
        std::iter::from_fn(move || {
            let current = next?;
            next = if current == self.ub {
                None
            } else {
                self.next_value(current + 1)
            };
            Some(current)
        })
    }

    /// Raise the lower bound; returns whether the domain changed
    pub fn set_lb(&mut self, value: i64) -> Result<bool, EmptyDomain> {
        if value <= self.lb {
            return Ok(false);
        }
        let lb = self.next_value(value).ok_or(EmptyDomain)?;
        self.lb = lb;
        self.recount();
        Ok(true)
    }

    /// Lower the upper bound; returns whether the domain changed
    pub fn set_ub(&mut self, value: i64) -> Result<bool, EmptyDomain> {
        if value >= self.ub {
            return Ok(false);
        }
        let ub = self.prev_value(value).ok_or(EmptyDomain)?;
        self.ub = ub;
        self.recount();
        Ok(true)
    }

    /// Remove a single value; returns whether the domain changed
    pub fn remove(&mut self, value: i64) -> Result<bool, EmptyDomain> {
        if !self.contains(value) {
            return Ok(false);
        }
        if self.is_fixed() {
            return Err(EmptyDomain);
        }
        if value == self.lb {
            return self.set_lb(value + 1);
        }
        if value == self.ub {
            return self.set_ub(value - 1);
        }
        let (lb, ub) = (self.lb, self.ub);
        self.refinement
            .get_or_insert_with(|| Refinement::full(lb, ub))
            .remove(value);
        self.size -= 1;
        Ok(true)
    }

    /// Reduce the domain to one value; returns whether the domain changed
    pub fn instantiate(&mut self, value: i64) -> Result<bool, EmptyDomain> {
        if !self.contains(value) {
            return Err(EmptyDomain);
        }
        if self.is_fixed() {
            return Ok(false);
        }
        self.lb = value;
        self.ub = value;
        self.size = 1;
        Ok(true)
    }

    fn recount(&mut self) {
        self.size = match &self.refinement {
            Some(refinement) => refinement.count(self.lb, self.ub),
            None => width(self.lb, self.ub),
        };
    }
}
