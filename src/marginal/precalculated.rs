//! Eager, bounded per-element enumeration: IsoSpec's "precalculated
//! marginal", one element's isotope partitions gathered up front rather
//! than streamed lazily.
//!
//! Unlike [`super::trek::MarginalTrek`], a `PrecalculatedMarginal` commits
//! to a fixed log-probability cutoff up front and enumerates *every*
//! partition at or above it in one breadth-first pass, using a plain queue
//! rather than a heap — order within the set does not matter until the
//! final sort, which the threshold joint engines (`crate::joint::threshold`)
//! require so they can binary-search/odometer over the result.

use super::{log_prob, mass_of, Marginal, Partition};
use std::collections::HashSet;

/// Every partition of one element's atoms with log-probability at or above
/// a fixed cutoff, as four parallel arrays (partitions, masses,
/// log-probabilities, exp-probabilities) sorted descending by
/// log-probability.
#[derive(Debug, Clone)]
pub struct PrecalculatedMarginal {
    marginal: Marginal,
    confs: Vec<Partition>,
    masses: Vec<f64>,
    log_probs: Vec<f64>,
    exp_probs: Vec<f64>,
}

impl PrecalculatedMarginal {
    /// Enumerate every partition of `marginal`'s atoms with log-probability
    /// `>= l_cutoff`, sorted descending by log-probability.
    #[must_use]
    pub fn new(marginal: Marginal, l_cutoff: f64) -> Self {
        Self::build(marginal, l_cutoff, true)
    }

    /// As [`Self::new`], but skip the final sort (the caller does not need
    /// order — e.g. an [`super::rgt::RgtMarginal`] about to re-sort by a
    /// different key anyway). Kept private: every current caller wants the
    /// sorted form, but the distinction mirrors the C++ original's `sort`
    /// flag and is cheap to keep available.
    fn build(marginal: Marginal, l_cutoff: f64, sort: bool) -> Self {
        let isotope_no = marginal.isotope_no();
        let mut confs: Vec<Partition> = Vec::new();
        let mut visited: HashSet<Partition> = HashSet::new();

        let mode = marginal.mode_conf().clone();
        if log_prob(&mode, marginal.ln_abundances()) >= l_cutoff {
            visited.insert(mode.clone());
            confs.push(mode);
        }

        let mut idx = 0;
        while idx < confs.len() {
            let current = confs[idx].clone();
            idx += 1;
            for i in 0..isotope_no {
                for j in 0..isotope_no {
                    if i != j && current[j] > 0 {
                        let mut candidate = current.clone();
                        candidate[i] += 1;
                        candidate[j] -= 1;
                        if !visited.contains(&candidate)
                            && log_prob(&candidate, marginal.ln_abundances()) >= l_cutoff
                        {
                            visited.insert(candidate.clone());
                            confs.push(candidate);
                        }
                    }
                }
            }
        }

        if sort {
            confs.sort_by(|a, b| {
                let la = log_prob(a, marginal.ln_abundances());
                let lb = log_prob(b, marginal.ln_abundances());
                lb.total_cmp(&la)
            });
        }

        let masses: Vec<f64> = confs.iter().map(|c| mass_of(c, marginal.masses())).collect();
        let log_probs: Vec<f64> = confs
            .iter()
            .map(|c| log_prob(c, marginal.ln_abundances()))
            .collect();
        let exp_probs: Vec<f64> = log_probs.iter().map(|lp| lp.exp()).collect();

        Self {
            marginal,
            confs,
            masses,
            log_probs,
            exp_probs,
        }
    }

    /// The underlying per-element model.
    #[must_use]
    pub const fn marginal(&self) -> &Marginal {
        &self.marginal
    }

    /// All enumerated partitions.
    #[must_use]
    pub fn confs(&self) -> &[Partition] {
        &self.confs
    }

    /// Masses, parallel to [`Self::confs`].
    #[must_use]
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    /// Log-probabilities, parallel to [`Self::confs`].
    #[must_use]
    pub fn log_probs(&self) -> &[f64] {
        &self.log_probs
    }

    /// `exp(log_probs[i])`, parallel to [`Self::confs`].
    #[must_use]
    pub fn exp_probs(&self) -> &[f64] {
        &self.exp_probs
    }

    /// Number of enumerated partitions.
    #[must_use]
    pub fn no_confs(&self) -> usize {
        self.confs.len()
    }

    /// Whether index `idx` refers to an enumerated partition.
    #[must_use]
    pub fn in_range(&self, idx: usize) -> bool {
        idx < self.confs.len()
    }

    /// Log-probability of the modal partition (not necessarily present in
    /// the list if the cutoff excluded it, though it always is in
    /// practice since the mode is the global maximum).
    #[must_use]
    pub fn mode_log_prob(&self) -> f64 {
        self.marginal.mode_log_prob()
    }

    /// `atom_count * min(mass)` admissibility bound, forwarded from the
    /// underlying marginal.
    #[must_use]
    pub fn lightest_conf_mass(&self) -> f64 {
        self.marginal.lightest_conf_mass()
    }

    /// `atom_count * max(mass)` admissibility bound, forwarded from the
    /// underlying marginal.
    #[must_use]
    pub fn heaviest_conf_mass(&self) -> f64 {
        self.marginal.heaviest_conf_mass()
    }
}
