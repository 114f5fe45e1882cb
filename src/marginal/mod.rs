//! One element's isotope model: masses, log-abundances, atom count and the
//! modal (most probable) partition, fixed once and queried afterward.
//!
//! A [`Marginal`] is immutable once built: masses, log-abundances, atom
//! count and modal partition never change after construction. The
//! enumerator variants in [`crate::marginal::trek`],
//! [`crate::marginal::precalculated`] and [`crate::marginal::rgt`] each
//! take ownership of one (moved in, not cloned — see the module docs on
//! why this crate does not need a "disowned" flag the way the C++ original
//! does).

pub mod precalculated;
pub mod rgt;
pub mod trek;

use crate::error::{IsoError, Result};
use crate::system::Mass;

/// A partition: how many atoms of each of an element's isotopes are
/// present in one configuration. Length equals the element's isotope
/// count; entries are non-negative and sum to the element's atom count.
pub type Partition = Vec<u32>;

/// The summed log-probability of a partition under a multinomial model
/// with per-isotope log-abundances `ln_abundances`.
///
/// `ln P(n_1, ..., n_I) = sum_i n_i * ln(p_i)` — the multinomial
/// coefficient itself is common to every partition of a fixed atom count
/// and so drops out of every comparison the engines make; only this
/// partial (un-normalised) log-probability is tracked, exactly as the
/// C++ original's `logProb` does.
#[must_use]
pub fn log_prob(partition: &[u32], ln_abundances: &[f64]) -> f64 {
    partition
        .iter()
        .zip(ln_abundances)
        .map(|(&n, &lp)| f64::from(n) * lp)
        .sum()
}

/// The mass of a partition given per-isotope masses.
#[must_use]
pub fn mass_of(partition: &[u32], masses: &[f64]) -> f64 {
    partition
        .iter()
        .zip(masses)
        .map(|(&n, &m)| f64::from(n) * m)
        .sum()
}

/// Find the modal (highest log-probability) partition of `atom_count`
/// atoms over isotopes with log-abundances `ln_abundances` and raw
/// abundances `abundances` (used only to seed the search).
///
/// Seeds near the mode by rounding the expected count per isotope down and
/// distributing the remainder/deficit through slot 0, then hill-climbs
/// single-unit moves until no such move strictly improves the
/// log-probability. The seed is close enough that hill-climbing converges
/// in `O(isotope_count^2)` moves rather than `O(atom_count)`.
#[must_use]
pub fn modal_partition(atom_count: u32, abundances: &[f64], ln_abundances: &[f64]) -> Partition {
    let isotope_no = abundances.len();
    let mut res: Vec<i64> = abundances
        .iter()
        .map(|p| (f64::from(atom_count) * p) as i64 + 1)
        .collect();

    let s: i64 = res.iter().sum();
    let mut diff = i64::from(atom_count) - s;

    if diff > 0 {
        res[0] += diff;
    } else if diff < 0 {
        diff = diff.abs();
        let mut i = 0;
        while diff > 0 {
            let coord_diff = res[i] - diff;
            if coord_diff >= 0 {
                res[i] -= diff;
                diff = 0;
            } else {
                res[i] = 0;
                diff = coord_diff.abs();
                i += 1;
            }
        }
    }

    // Hill-climb: repeat passes over every ordered pair (i, j) moving one
    // unit i -> j whenever that strictly raises the log-probability, until
    // a full pass makes no move (a local maximum, ties broken towards
    // "no move").
    let mut modified = true;
    let mut lp = log_prob_i64(&res, ln_abundances);
    while modified {
        modified = false;
        for i in 0..isotope_no {
            for j in 0..isotope_no {
                if i != j && res[i] > 0 {
                    res[i] -= 1;
                    res[j] += 1;
                    let new_lp = log_prob_i64(&res, ln_abundances);
                    if new_lp > lp {
                        modified = true;
                        lp = new_lp;
                    } else {
                        res[i] += 1;
                        res[j] -= 1;
                    }
                }
            }
        }
    }

    res.into_iter().map(|n| n as u32).collect()
}

fn log_prob_i64(partition: &[i64], ln_abundances: &[f64]) -> f64 {
    partition
        .iter()
        .zip(ln_abundances)
        .map(|(&n, &lp)| n as f64 * lp)
        .sum()
}

/// One element's isotope model: masses, log-abundances, atom count and
/// modal partition.
#[derive(Debug, Clone)]
pub struct Marginal {
    isotope_no: usize,
    atom_count: u32,
    masses: Vec<f64>,
    ln_abundances: Vec<f64>,
    mode_conf: Partition,
}

impl Marginal {
    /// Build a marginal from an element's raw masses and abundances.
    ///
    /// # Errors
    /// Returns [`IsoError::MismatchedLengths`] if `masses` and
    /// `abundances` disagree in length, and [`IsoError::EmptyIsotopeList`]
    /// if either is empty.
    pub fn new(masses: &[f64], abundances: &[f64], atom_count: u32) -> Result<Self> {
        if masses.len() != abundances.len() {
            return Err(IsoError::MismatchedLengths {
                element_index: 0,
                expected: masses.len(),
                got: abundances.len(),
            });
        }
        if masses.is_empty() {
            return Err(IsoError::EmptyIsotopeList { element_index: 0 });
        }

        let ln_abundances: Vec<f64> = abundances
            .iter()
            .map(|&p| crate::element::fidelity_ln(p))
            .collect();
        let mode_conf = modal_partition(atom_count, abundances, &ln_abundances);

        Ok(Self {
            isotope_no: masses.len(),
            atom_count,
            masses: masses.to_vec(),
            ln_abundances,
            mode_conf,
        })
    }

    /// Number of isotopes this element's model distinguishes.
    #[must_use]
    pub const fn isotope_no(&self) -> usize {
        self.isotope_no
    }

    /// Number of atoms of this element in the formula.
    #[must_use]
    pub const fn atom_count(&self) -> u32 {
        self.atom_count
    }

    /// Per-isotope masses, in catalogue order.
    #[must_use]
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    /// Per-isotope natural log-abundances, in catalogue order.
    #[must_use]
    pub fn ln_abundances(&self) -> &[f64] {
        &self.ln_abundances
    }

    /// The modal (most probable) partition.
    #[must_use]
    pub fn mode_conf(&self) -> &Partition {
        &self.mode_conf
    }

    /// Log-probability of the modal partition.
    #[must_use]
    pub fn mode_log_prob(&self) -> f64 {
        log_prob(&self.mode_conf, &self.ln_abundances)
    }

    /// `atom_count * min(mass)`: the lightest possible configuration of
    /// this element's atoms, used as a cheap admissibility bound.
    #[must_use]
    pub fn lightest_conf_mass(&self) -> f64 {
        self.masses.iter().cloned().fold(f64::INFINITY, f64::min) * f64::from(self.atom_count)
    }

    /// `atom_count * max(mass)`: the heaviest possible configuration.
    #[must_use]
    pub fn heaviest_conf_mass(&self) -> f64 {
        self.masses.iter().cloned().fold(0.0, f64::max) * f64::from(self.atom_count)
    }

    /// Convenience: mass as a typed [`Mass`] rather than a raw `f64`.
    #[must_use]
    pub fn lightest_conf_mass_typed(&self) -> Mass {
        crate::system::da(self.lightest_conf_mass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hydrogen() -> Marginal {
        Marginal::new(&[1.007_825_032_07, 2.014_101_777_8], &[0.999_885, 0.000_115], 1).unwrap()
    }

    #[test]
    fn modal_partition_beats_every_unit_swap_neighbour() {
        // Glucose-scale carbon: 6 atoms, two isotopes.
        let m = Marginal::new(&[12.0, 13.003_354_837_8], &[0.9893, 0.0107], 6).unwrap();
        let mode = m.mode_conf().clone();
        let base_lp = log_prob(&mode, m.ln_abundances());
        for i in 0..mode.len() {
            for j in 0..mode.len() {
                if i != j && mode[i] > 0 {
                    let mut neighbour = mode.clone();
                    neighbour[i] -= 1;
                    neighbour[j] += 1;
                    assert!(log_prob(&neighbour, m.ln_abundances()) <= base_lp);
                }
            }
        }
    }

    #[test]
    fn single_atom_mode_is_the_most_abundant_isotope() {
        let h = hydrogen();
        assert_eq!(*h.mode_conf(), vec![1, 0]);
    }

    #[test]
    fn mismatched_lengths_error() {
        let err = Marginal::new(&[1.0, 2.0], &[1.0], 1).unwrap_err();
        assert!(matches!(err, IsoError::MismatchedLengths { .. }));
    }

    #[test]
    fn mass_bounds_are_admissible() {
        let h = hydrogen();
        assert!((h.lightest_conf_mass() - 1.007_825_032_07).abs() < 1e-9);
        assert!((h.heaviest_conf_mass() - 2.014_101_777_8).abs() < 1e-9);
    }
}
