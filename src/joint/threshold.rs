//! The threshold joint engine: given a fixed joint log-probability cutoff,
//! enumerate every joint configuration at or above it, exactly once, in an
//! order driven by precomputed per-element tables — no visited set, no heap.
//!
//! Each element gets a [`PrecalculatedMarginal`] built with the tightest
//! admissible per-element cutoff: a configuration's joint log-probability
//! can only reach the global cutoff `L` if every other element sits at its
//! own mode, so element `i` only needs partitions with
//! `logP >= L - (modeJointLogP - modeLogP[i])`. The engine then drives a
//! per-element odometer over these lists, using the suffix sums
//! `partial_lprobs`/`partial_masses` to test admissibility of a carry
//! without re-summing from scratch each step.

use crate::error::{IsoError, Result};
use crate::iso::IsoConfig;
use crate::joint::AcceptedConfig;
use crate::marginal::precalculated::PrecalculatedMarginal;
use crate::marginal::Marginal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Started,
    Exhausted,
}

/// The threshold joint enumerator.
pub struct ThresholdJoint {
    pms: Vec<PrecalculatedMarginal>,
    l_cutoff: f64,
    counter: Vec<usize>,
    /// `partial_lprobs[i] = sum_{k >= i} pms[k].log_probs()[counter[k]]`;
    /// `partial_lprobs[d] == 0.0`.
    partial_lprobs: Vec<f64>,
    /// As `partial_lprobs`, but summing masses.
    partial_masses: Vec<f64>,
    state: State,
}

impl ThresholdJoint {
    /// Build the engine from one [`Marginal`] per element.
    ///
    /// `config.absolute` selects whether `config.cutoff_value` is an
    /// absolute joint log-probability or a fraction relative to the joint
    /// mode — e.g. "threshold = 1e-4 relative to mode" means
    /// `L = modeJointLogP + ln(1e-4)`.
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

        let d = marginals.len();
        let pms: Vec<PrecalculatedMarginal> = marginals
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                let per_element_cutoff = l_cutoff - (mode_joint_log_prob - mode_log_probs[i]);
                PrecalculatedMarginal::new(m, per_element_cutoff)
            })
            .collect();

        let counter = vec![0usize; d];
        let mut partial_lprobs = vec![0.0; d + 1];
        let mut partial_masses = vec![0.0; d + 1];
        for i in (0..d).rev() {
            partial_lprobs[i] = partial_lprobs[i + 1] + pms[i].log_probs()[0];
            partial_masses[i] = partial_masses[i + 1] + pms[i].masses()[0];
        }

        Ok(Self {
            pms,
            l_cutoff,
            counter,
            partial_lprobs,
            partial_masses,
            state: State::NotStarted,
        })
    }

    /// Advance to the next joint configuration at or above the cutoff.
    /// The first call yields the joint mode (if it clears the cutoff at
    /// all); returns `false` once the odometer is exhausted.
    pub fn advance_to_next_configuration(&mut self) -> bool {
        match self.state {
            State::Exhausted => false,
            State::NotStarted => {
                self.state = State::Started;
                if self.partial_lprobs[0] >= self.l_cutoff {
                    true
                } else {
                    self.state = State::Exhausted;
                    false
                }
            }
            State::Started => self.advance(),
        }
    }

    fn advance(&mut self) -> bool {
        let d = self.pms.len();

        let c0 = self.counter[0] + 1;
        if self.pms[0].in_range(c0) {
            let candidate = self.partial_lprobs[1] + self.pms[0].log_probs()[c0];
            if candidate >= self.l_cutoff {
                self.counter[0] = c0;
                self.partial_lprobs[0] = candidate;
                self.partial_masses[0] = self.partial_masses[1] + self.pms[0].masses()[c0];
                return true;
            }
        }

        for i in 1..d {
            let ci = self.counter[i] + 1;
            if !self.pms[i].in_range(ci) {
                continue;
            }
            let mode_prefix: f64 = (0..i).map(|k| self.pms[k].mode_log_prob()).sum();
            let candidate = self.partial_lprobs[i + 1] + self.pms[i].log_probs()[ci] + mode_prefix;
            if candidate < self.l_cutoff {
                continue;
            }

            self.counter[i] = ci;
            for j in 0..i {
                self.counter[j] = 0;
            }
            self.partial_lprobs[i] = self.partial_lprobs[i + 1] + self.pms[i].log_probs()[ci];
            self.partial_masses[i] = self.partial_masses[i + 1] + self.pms[i].masses()[ci];
            for j in (0..i).rev() {
                self.partial_lprobs[j] = self.partial_lprobs[j + 1] + self.pms[j].log_probs()[0];
                self.partial_masses[j] = self.partial_masses[j + 1] + self.pms[j].masses()[0];
            }
            return true;
        }

        self.state = State::Exhausted;
        false
    }

    /// The current configuration, expanded into a caller-facing row. Only
    /// meaningful after [`Self::advance_to_next_configuration`] returned
    /// `true`.
    #[must_use]
    pub fn current(&self) -> AcceptedConfig {
        let mut isotopes = Vec::new();
        for (i, &ci) in self.counter.iter().enumerate() {
            isotopes.extend_from_slice(&self.pms[i].confs()[ci]);
        }
        AcceptedConfig {
            mass: self.partial_masses[0],
            log_prob: self.partial_lprobs[0],
            isotopes,
        }
    }

    /// Drain every configuration at or above the cutoff.
    pub fn collect_all(&mut self) -> Vec<AcceptedConfig> {
        let mut out = Vec::new();
        while self.advance_to_next_configuration() {
            out.push(self.current());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marginal::{log_prob, mass_of};

    fn methane_marginals() -> Vec<Marginal> {
        vec![
            // Carbon, 1 atom.
            Marginal::new(&[12.0, 13.003_354_837_8], &[0.9893, 0.0107], 1).unwrap(),
            // Hydrogen, 4 atoms.
            Marginal::new(
                &[1.007_825_032_07, 2.014_101_777_8],
                &[0.999_885, 0.000_115],
                4,
            )
            .unwrap(),
        ]
    }

    fn brute_force_above(marginals: &[Marginal], l_cutoff: f64) -> Vec<(f64, f64)> {
        fn rec(
            marginals: &[Marginal],
            idx: usize,
            partition_so_far: &mut Vec<Vec<u32>>,
            out: &mut Vec<(f64, f64)>,
        ) {
            if idx == marginals.len() {
                let lp: f64 = partition_so_far
                    .iter()
                    .zip(marginals)
                    .map(|(p, m)| log_prob(p, m.ln_abundances()))
                    .sum();
                let mass: f64 = partition_so_far
                    .iter()
                    .zip(marginals)
                    .map(|(p, m)| mass_of(p, m.masses()))
                    .sum();
                out.push((lp, mass));
                return;
            }
            let m = &marginals[idx];
            for p in all_partitions(m.isotope_no(), m.atom_count()) {
                partition_so_far.push(p);
                rec(marginals, idx + 1, partition_so_far, out);
                partition_so_far.pop();
            }
        }
        fn all_partitions(isotope_no: usize, atom_count: u32) -> Vec<Vec<u32>> {
            if isotope_no == 1 {
                return vec![vec![atom_count]];
            }
            let mut out = Vec::new();
            for first in 0..=atom_count {
                for mut rest in all_partitions(isotope_no - 1, atom_count - first) {
                    let mut p = vec![first];
                    p.append(&mut rest);
                    out.push(p);
                }
            }
            out
        }
        let mut out = Vec::new();
        rec(marginals, 0, &mut Vec::new(), &mut out);
        out.retain(|&(lp, _)| lp >= l_cutoff);
        out
    }

    #[test]
    fn matches_brute_force_completeness() {
        let marginals = methane_marginals();
        let mode_joint_lp: f64 = marginals.iter().map(Marginal::mode_log_prob).sum();
        let l_cutoff = mode_joint_lp - 10.0;

        let mut brute = brute_force_above(&marginals, l_cutoff);
        brute.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut engine =
            ThresholdJoint::new(marginals, IsoConfig::with_absolute_cutoff(l_cutoff)).unwrap();
        let mut got: Vec<(f64, f64)> = Vec::new();
        while engine.advance_to_next_configuration() {
            let c = engine.current();
            got.push((c.log_prob, c.mass));
        }
        got.sort_by(|a, b| b.0.total_cmp(&a.0));

        assert_eq!(got.len(), brute.len());
        for ((g_lp, g_m), (b_lp, b_m)) in got.iter().zip(brute.iter()) {
            assert!((g_lp - b_lp).abs() < 1e-9);
            assert!((g_m - b_m).abs() < 1e-6);
        }
    }

    #[test]
    fn no_duplicates() {
        let marginals = methane_marginals();
        let mode_joint_lp: f64 = marginals.iter().map(Marginal::mode_log_prob).sum();
        let mut engine = ThresholdJoint::new(
            marginals,
            IsoConfig::with_absolute_cutoff(mode_joint_lp - 15.0),
        )
        .unwrap();
        let configs = engine.collect_all();
        let mut seen = std::collections::HashSet::new();
        for c in &configs {
            assert!(seen.insert(c.isotopes.clone()));
        }
    }

    #[test]
    fn relative_cutoff_of_1e_minus_4_matches_mode_minus_4ln10() {
        // threshold 1e-4 relative to mode means every configuration with
        // logP >= logMode - 4*ln(10) is returned.
        let marginals = methane_marginals();
        let mode_joint_lp: f64 = marginals.iter().map(Marginal::mode_log_prob).sum();
        let mut engine =
            ThresholdJoint::new(marginals, IsoConfig::with_cutoff(1e-4)).unwrap();
        let expected_l = mode_joint_lp - 4.0 * 10f64.ln();
        let configs = engine.collect_all();
        for c in &configs {
            assert!(c.log_prob >= expected_l - 1e-9);
        }
    }

    #[test]
    fn empty_band_when_mode_fails_cutoff() {
        let marginals = methane_marginals();
        let mode_joint_lp: f64 = marginals.iter().map(Marginal::mode_log_prob).sum();
        let mut engine = ThresholdJoint::new(
            marginals,
            IsoConfig::with_absolute_cutoff(mode_joint_lp + 1.0),
        )
        .unwrap();
        assert!(!engine.advance_to_next_configuration());
    }
}
