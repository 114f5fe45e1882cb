//! Lazy, best-first per-element enumeration: IsoSpec's "marginal trek",
//! growing one partition at a time out of a max-heap.
//!
//! Grows only as far as asked: [`MarginalTrek::process_until_cutoff`] pulls
//! partitions out of a max-heap, in descending log-probability order, until
//! the accumulated probability crosses a caller-given cutoff. This is the
//! shape the layered joint engine needs — each marginal should grow only
//! enough to service the *current* layer's threshold, not the whole
//! distribution.

use super::{log_prob, mass_of, Marginal, Partition};
use crate::summator::Summator;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

#[derive(Debug, Clone)]
struct HeapEntry {
    log_prob: f64,
    partition: Partition,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.log_prob == other.log_prob
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.log_prob.total_cmp(&other.log_prob)
    }
}

/// A per-element enumerator that expands the unit-swap neighbourhood of the
/// modal partition breadth-first, but only ever *materialises* partitions
/// in best-first (descending log-probability) order.
pub struct MarginalTrek {
    marginal: Marginal,
    heap: BinaryHeap<HeapEntry>,
    visited: HashSet<Partition>,
    total_prob: Summator,
    confs: Vec<Partition>,
    conf_masses: Vec<f64>,
    conf_probs: Vec<f64>,
}

impl MarginalTrek {
    /// Build a trek over `marginal`, seeded at its modal partition.
    #[must_use]
    pub fn new(marginal: Marginal) -> Self {
        let mode = marginal.mode_conf().clone();
        let lp = log_prob(&mode, marginal.ln_abundances());
        let mut heap = BinaryHeap::new();
        let mut visited = HashSet::new();
        visited.insert(mode.clone());
        heap.push(HeapEntry {
            log_prob: lp,
            partition: mode,
        });

        let mut trek = Self {
            marginal,
            heap,
            visited,
            total_prob: Summator::new(),
            confs: Vec::new(),
            conf_masses: Vec::new(),
            conf_probs: Vec::new(),
        };
        trek.add_next_conf();
        trek
    }

    /// The underlying per-element model.
    #[must_use]
    pub const fn marginal(&self) -> &Marginal {
        &self.marginal
    }

    /// Partitions discovered so far, in the order they were popped from the
    /// heap (descending log-probability).
    #[must_use]
    pub fn confs(&self) -> &[Partition] {
        &self.confs
    }

    /// Masses of the discovered partitions, parallel to [`Self::confs`].
    #[must_use]
    pub fn conf_masses(&self) -> &[f64] {
        &self.conf_masses
    }

    /// Log-probabilities of the discovered partitions, parallel to
    /// [`Self::confs`].
    #[must_use]
    pub fn conf_probs(&self) -> &[f64] {
        &self.conf_probs
    }

    /// Pop the best remaining candidate, record it, and push its unseen
    /// unit-swap neighbours. Returns `false` once the heap is exhausted.
    pub fn add_next_conf(&mut self) -> bool {
        let Some(top) = self.heap.pop() else {
            return false;
        };

        let isotope_no = self.marginal.isotope_no();
        self.conf_masses
            .push(mass_of(&top.partition, self.marginal.masses()));
        self.conf_probs.push(top.log_prob);
        self.total_prob.add(top.log_prob.exp());

        for i in 0..isotope_no {
            for j in 0..isotope_no {
                if i != j && top.partition[j] > 0 {
                    let mut candidate = top.partition.clone();
                    candidate[i] += 1;
                    candidate[j] -= 1;
                    if self.visited.insert(candidate.clone()) {
                        let lp = log_prob(&candidate, self.marginal.ln_abundances());
                        self.heap.push(HeapEntry {
                            log_prob: lp,
                            partition: candidate,
                        });
                    }
                }
            }
        }

        self.confs.push(top.partition);
        true
    }

    /// Grow (if needed) until at least `len` partitions have been
    /// discovered. Returns `false` if the heap empties first (the element
    /// has fewer than `len` reachable partitions).
    pub fn ensure_len(&mut self, len: usize) -> bool {
        while self.confs.len() < len && self.add_next_conf() {}
        self.confs.len() >= len
    }

    /// Grow (if needed) until the accumulated probability of the discovered
    /// prefix reaches `cutoff`, then return the smallest index `k` such
    /// that `sum(conf_probs[..=k].exp()) >= cutoff` — or `confs().len()` if
    /// the cutoff was never reached (heap exhausted first).
    pub fn process_until_cutoff(&mut self, cutoff: f64) -> usize {
        let mut running = Summator::new();
        for (i, &lp) in self.conf_probs.iter().enumerate() {
            running.add(lp.exp());
            if running.get() >= cutoff {
                return i;
            }
        }

        while self.total_prob.get() < cutoff && self.add_next_conf() {}
        self.conf_probs.len()
    }
}
