//! The ordered joint engine: a single global best-first heap over joint
//! configurations,
//! deduplicated with an explicit visited set rather than the layered
//! engine's canonical direction rule. Emits in strict descending joint
//! log-probability order — useful as a reference/oracle in tests, and
//! correct for any input, but considerably slower than the layered engine
//! once the fringe gets large (the visited set alone costs what the
//! canonical rule gets for free).

use crate::error::{IsoError, Result};
use crate::iso::IsoConfig;
use crate::joint::AcceptedConfig;
use crate::marginal::precalculated::PrecalculatedMarginal;
use crate::marginal::Marginal;
use crate::summator::Summator;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

#[derive(Debug, Clone)]
struct HeapEntry {
    log_prob: f64,
    idx: Vec<u32>,
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

/// The ordered joint enumerator.
pub struct OrderedJoint {
    pms: Vec<PrecalculatedMarginal>,
    l_cutoff: f64,
    heap: BinaryHeap<HeapEntry>,
    visited: HashSet<Vec<u32>>,
    total_prob: Summator,
}

impl OrderedJoint {
    /// Build the engine from one [`Marginal`] per element and a joint
    /// log-probability cutoff (same `config` convention as
    /// [`super::threshold::ThresholdJoint::new`]).
    ///
    /// # Errors
    /// [`IsoError::EmptyIsotopeList`] if `marginals` is empty.
    pub fn new(marginals: Vec<Marginal>, config: IsoConfig) -> Result<Self> {
        if marginals.is_empty() {
            return Err(IsoError::EmptyIsotopeList { element_index: 0 });
        }
        let mode_log_probs: Vec<f64> = marginals.iter().map(Marginal::mode_log_prob).collect();
        let mode_joint_log_prob: f64 = mode_log_probs.iter().sum();
        let l_cutoff = if config.absolute {
            config.cutoff_value
        } else {
            mode_joint_log_prob + config.cutoff_value.ln()
        };

        let pms: Vec<PrecalculatedMarginal> = marginals
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                let per_element_cutoff = l_cutoff - (mode_joint_log_prob - mode_log_probs[i]);
                PrecalculatedMarginal::new(m, per_element_cutoff)
            })
            .collect();

        let mode_idx = vec![0u32; pms.len()];
        let mut heap = BinaryHeap::new();
        let mut visited = HashSet::new();
        if mode_joint_log_prob >= l_cutoff {
            visited.insert(mode_idx.clone());
            heap.push(HeapEntry {
                log_prob: mode_joint_log_prob,
                idx: mode_idx,
            });
        }

        Ok(Self {
            pms,
            l_cutoff,
            heap,
            visited,
            total_prob: Summator::new(),
        })
    }

    /// Pop and accept the next-best configuration, pushing its unseen
    /// unit-increment neighbours (any dimension, not just the canonical
    /// one — this engine needs the visited set precisely because it does
    /// not use the layered engine's direction rule). Returns `false` once
    /// the heap empties.
    pub fn advance_to_next_configuration(&mut self) -> Option<AcceptedConfig> {
        let top = self.heap.pop()?;
        self.total_prob.add(top.log_prob.exp());

        let d = self.pms.len();
        for j in 0..d {
            let nj = top.idx[j] + 1;
            if self.pms[j].in_range(nj as usize) {
                let mut neighbour = top.idx.clone();
                neighbour[j] = nj;
                if self.visited.insert(neighbour.clone()) {
                    let lp: f64 = neighbour
                        .iter()
                        .enumerate()
                        .map(|(k, &ix)| self.pms[k].log_probs()[ix as usize])
                        .sum();
                    if lp >= self.l_cutoff {
                        self.heap.push(HeapEntry {
                            log_prob: lp,
                            idx: neighbour,
                        });
                    }
                }
            }
        }

        Some(self.expand(&top))
    }

    fn expand(&self, entry: &HeapEntry) -> AcceptedConfig {
        let mut isotopes = Vec::new();
        let mut mass = 0.0;
        for (k, &ix) in entry.idx.iter().enumerate() {
            isotopes.extend_from_slice(&self.pms[k].confs()[ix as usize]);
            mass += self.pms[k].masses()[ix as usize];
        }
        AcceptedConfig {
            mass,
            log_prob: entry.log_prob,
            isotopes,
        }
    }

    /// Drain every configuration at or above the cutoff, in strict
    /// descending log-probability order.
    pub fn collect_all(&mut self) -> Vec<AcceptedConfig> {
        let mut out = Vec::new();
        while let Some(c) = self.advance_to_next_configuration() {
            out.push(c);
        }
        out
    }

    /// The accumulated probability of every configuration emitted so far.
    #[must_use]
    pub fn total_prob(&self) -> f64 {
        self.total_prob.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water_marginals() -> Vec<Marginal> {
        vec![
            Marginal::new(
                &[1.007_825_032_07, 2.014_101_777_8],
                &[0.999_885, 0.000_115],
                2,
            )
            .unwrap(),
            Marginal::new(
                &[15.994_914_619_56, 16.999_131_70, 17.999_161_0],
                &[0.997_57, 0.000_38, 0.002_05],
                1,
            )
            .unwrap(),
        ]
    }

    #[test]
    fn strictly_descending_order() {
        let mode_joint_lp: f64 = water_marginals().iter().map(Marginal::mode_log_prob).sum();
        let mut engine =
            OrderedJoint::new(water_marginals(), IsoConfig::with_absolute_cutoff(mode_joint_lp - 10.0))
                .unwrap();
        let configs = engine.collect_all();
        for w in configs.windows(2) {
            assert!(w[0].log_prob >= w[1].log_prob);
        }
    }

    #[test]
    fn no_duplicates() {
        let mode_joint_lp: f64 = water_marginals().iter().map(Marginal::mode_log_prob).sum();
        let mut engine =
            OrderedJoint::new(water_marginals(), IsoConfig::with_absolute_cutoff(mode_joint_lp - 10.0))
                .unwrap();
        let configs = engine.collect_all();
        let mut seen = std::collections::HashSet::new();
        for c in &configs {
            assert!(seen.insert(c.isotopes.clone()));
        }
    }

    #[test]
    fn empty_band_when_mode_fails_cutoff() {
        let mode_joint_lp: f64 = water_marginals().iter().map(Marginal::mode_log_prob).sum();
        let mut engine =
            OrderedJoint::new(water_marginals(), IsoConfig::with_absolute_cutoff(mode_joint_lp + 1.0))
                .unwrap();
        assert!(engine.advance_to_next_configuration().is_none());
    }
}
