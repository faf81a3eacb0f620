//! Bin packing
//!
//! `load[b] = Σ size[i] for every item i with bin[i] = b`. Each run derives, from the
//! current domains, the load already required by the items assigned to a bin and the
//! load still possible with the candidate items. Loads are tightened to that window,
//! items are removed from the bins they can no longer fit in, and the total load is
//! kept equal to the total size.

use smallvec::SmallVec;

use crate::solver::constraints::Propagation;
use crate::solver::store::{Store, VarId};
use crate::solver::PropagationResult;

#[derive(Debug, Clone)]
pub struct BinPacking {
    loads: Vec<VarId>,
    sizes: Vec<VarId>,
    bins: Vec<VarId>,
}

impl BinPacking {
    /// `bins[i]` takes values in `0..loads.len()`
    pub fn new(loads: Vec<VarId>, sizes: Vec<VarId>, bins: Vec<VarId>) -> Self {
        assert_eq!(sizes.len(), bins.len(), "one size per item");
        Self { loads, sizes, bins }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        self.loads
            .iter()
            .chain(&self.sizes)
            .chain(&self.bins)
            .copied()
            .collect()
    }

    fn bin_index(&self, value: i64) -> Option<usize> {
        usize::try_from(value).ok().filter(|b| *b < self.loads.len())
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        let nb_bins = self.loads.len();

        for bin in &self.bins {
            let out_of_range: SmallVec<[i64; 4]> = store
                .values(*bin)
                .filter(|v| self.bin_index(*v).is_none())
                .collect();
            for value in out_of_range {
                store.remove_value(*bin, value)?;
            }
        }

        let mut required = vec![0i64; nb_bins];
        let mut possible = vec![0i64; nb_bins];
        let mut total_lb = 0;
        let mut total_ub = 0;
        for (size, bin) in self.sizes.iter().zip(&self.bins) {
            let (lb, ub) = (store.lb(*size), store.ub(*size));
            total_lb += lb;
            total_ub += ub;
            if let Some(b) = store.value(*bin).and_then(|v| self.bin_index(v)) {
                required[b] += lb;
                possible[b] += ub;
            } else {
                for b in store.values(*bin).filter_map(|v| self.bin_index(v)) {
                    possible[b] += ub;
                }
            }
        }

        for (b, load) in self.loads.iter().enumerate() {
            store.set_lb(*load, required[b])?;
            store.set_ub(*load, possible[b])?;
        }

        let sum_lb: i64 = self.loads.iter().map(|l| store.lb(*l)).sum();
        let sum_ub: i64 = self.loads.iter().map(|l| store.ub(*l)).sum();
        for load in &self.loads {
            let (lb, ub) = (store.lb(*load), store.ub(*load));
            store.set_lb(*load, total_lb - (sum_ub - ub))?;
            store.set_ub(*load, total_ub - (sum_lb - lb))?;
        }

        for (size, bin) in self.sizes.iter().zip(&self.bins) {
            if store.is_fixed(*bin) {
                continue;
            }
            let lb = store.lb(*size);
            let rejected: SmallVec<[i64; 8]> = store
                .values(*bin)
                .filter(|v| {
                    self.bin_index(*v)
                        .map_or(true, |b| required[b] + lb > store.ub(self.loads[b]))
                })
                .collect();
            for value in rejected {
                store.remove_value(*bin, value)?;
            }
        }

        for (size, bin) in self.sizes.iter().zip(&self.bins) {
            if let Some(b) = store.value(*bin).and_then(|v| self.bin_index(v)) {
                let others = required[b] - store.lb(*size);
                store.set_ub(*size, store.ub(self.loads[b]) - others)?;
            }
        }

        let settled = self
            .bins
            .iter()
            .chain(&self.sizes)
            .chain(&self.loads)
            .all(|v| store.is_fixed(*v));
        Ok(if settled {
            Propagation::Entailed
        } else {
            Propagation::Active
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::store::VarKind;
    use crate::solver::Cause;

    fn packing(store: &mut Store, capacities: &[i64], sizes: &[i64]) -> BinPacking {
        let loads = capacities
            .iter()
            .enumerate()
            .map(|(i, c)| store.new_interval(format!("load{}", i), VarKind::Load, 0, *c))
            .collect();
        let size_vars = sizes
            .iter()
            .enumerate()
            .map(|(i, s)| store.new_constant(format!("size{}", i), VarKind::Other, *s))
            .collect();
        let bins = (0..sizes.len())
            .map(|i| {
                store.new_interval(
                    format!("bin{}", i),
                    VarKind::Hoster,
                    0,
                    capacities.len() as i64 - 1,
                )
            })
            .collect();
        BinPacking::new(loads, size_vars, bins)
    }

    #[test]
    fn test_full_bin_rejects_items() {
        let mut store = Store::new();
        let c = packing(&mut store, &[4, 4], &[3, 2]);
        store.instantiate(c.bins[0], 0).unwrap();
        c.propagate(&mut store).unwrap();
        assert_eq!(store.value(c.bins[1]), Some(1));
        assert_eq!(c.propagate(&mut store), Ok(Propagation::Entailed));
        assert_eq!(store.lb(c.loads[0]), 3);
        assert_eq!(store.ub(c.loads[0]), 3);
    }

    #[test]
    fn test_total_size_exceeding_capacity_fails() {
        let mut store = Store::new();
        let c = packing(&mut store, &[3, 3], &[2, 2, 2, 2]);
        assert!(c.propagate(&mut store).is_err());
    }

    #[test]
    fn test_load_bounds_follow_candidates() {
        let mut store = Store::new();
        let c = packing(&mut store, &[10, 10, 10], &[2, 3]);
        store.remove_value(c.bins[0], 2).unwrap();
        store.remove_value(c.bins[1], 2).unwrap();
        c.propagate(&mut store).unwrap();
        assert_eq!(store.ub(c.loads[2]), 0);
        assert_eq!(store.ub(c.loads[0]), 5);
    }

    #[test]
    fn test_overloaded_fixed_bin() {
        let mut store = Store::new();
        let c = packing(&mut store, &[3, 3], &[2, 2]);
        store.instantiate(c.bins[0], 1).unwrap();
        store.instantiate(c.bins[1], 1).unwrap();
        let err = c.propagate(&mut store).unwrap_err();
        assert_eq!(err.cause, Cause::EmptyDomain);
    }
}
