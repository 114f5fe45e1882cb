//! Optional multithreaded threshold engine (`parallel` feature): the same
//! cutoff semantics as
//! [`super::threshold::ThresholdJoint`], but with the last dimension's
//! marginal shared across worker threads behind a [`SyncMarginal`] —
//! an atomic odometer that hands out disjoint, not-yet-claimed indices of
//! that one dimension. Each worker claims an index, checks it against a
//! cheap admissibility bound (that index's log-probability plus every
//! other dimension's mode can still clear the cutoff), and if so runs a
//! private pruned backtracking search over the remaining dimensions with
//! that last index held fixed. The shared atomic counter is the *only*
//! synchronisation point; everything else — the per-worker backtracking,
//! the accumulation of results — is independent.

use crate::error::{IsoError, Result};
use crate::iso::IsoConfig;
use crate::joint::AcceptedConfig;
use crate::marginal::precalculated::PrecalculatedMarginal;
use crate::marginal::Marginal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A [`PrecalculatedMarginal`] wrapped with an atomic cursor so that many
/// worker threads can each claim a disjoint index of it.
pub struct SyncMarginal {
    pm: PrecalculatedMarginal,
    next_idx: AtomicUsize,
}

impl SyncMarginal {
    fn new(pm: PrecalculatedMarginal) -> Self {
        Self {
            pm,
            next_idx: AtomicUsize::new(0),
        }
    }

    /// Claim the next unclaimed index, or `None` once every index of the
    /// wrapped marginal has been handed out.
    pub fn get_next_conf_idx(&self) -> Option<usize> {
        let i = self.next_idx.fetch_add(1, Ordering::Relaxed);
        self.pm.in_range(i).then_some(i)
    }

    /// The wrapped marginal, for read-only access (masses, log-probs,
    /// confs) once an index has been claimed.
    #[must_use]
    pub const fn pm(&self) -> &PrecalculatedMarginal {
        &self.pm
    }
}

/// Run the threshold engine across `workers` threads. `marginals` and
/// `config` follow the same convention as
/// [`super::threshold::ThresholdJoint::new`]; the result is the full,
/// unordered set of accepted configurations (merge + sort downstream if a
/// particular order is wanted).
///
/// # Errors
/// [`IsoError::EmptyIsotopeList`] if `marginals` is empty.
pub fn run(marginals: Vec<Marginal>, config: IsoConfig, workers: usize) -> Result<Vec<AcceptedConfig>> {
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

    let mut pms: Vec<PrecalculatedMarginal> = marginals
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            let per_element_cutoff = l_cutoff - (mode_joint_log_prob - mode_log_probs[i]);
            PrecalculatedMarginal::new(m, per_element_cutoff)
        })
        .collect();

    // The last dimension is the one shared behind the atomic cursor; the
    // rest are searched privately by each worker.
    let last = pms.pop().expect("non-empty by construction");
    let sync = SyncMarginal::new(last);
    let other_mode_sum: f64 = pms.iter().map(PrecalculatedMarginal::mode_log_prob).sum();

    let results: Mutex<Vec<AcceptedConfig>> = Mutex::new(Vec::new());
    let num_workers = workers.max(1);

    rayon::scope(|scope| {
        for _ in 0..num_workers {
            let pms = &pms;
            let sync = &sync;
            let results = &results;
            scope.spawn(move |_| {
                let mut local = Vec::new();
                while let Some(last_idx) = sync.get_next_conf_idx() {
                    let last_lp = sync.pm().log_probs()[last_idx];
                    if last_lp + other_mode_sum < l_cutoff {
                        continue;
                    }
                    enumerate_prefix(pms, last_idx, sync, l_cutoff, last_lp, &mut local);
                }
                if !local.is_empty() {
                    results.lock().expect("mutex poisoned by a panicking worker").extend(local);
                }
            });
        }
    });

    Ok(results.into_inner().expect("mutex poisoned by a panicking worker"))
}

/// Pruned backtracking search over dimensions `0..pms.len()` with the last
/// dimension's configuration (`last_idx`, contributing `last_lp` to the
/// running log-probability) held fixed. Each dimension's partitions are
/// sorted descending by log-probability, so as soon as one index at a
/// given depth — combined with every remaining dimension's mode — cannot
/// clear the cutoff, no later (lower-probability) index at that depth can
/// either.
fn enumerate_prefix(
    pms: &[PrecalculatedMarginal],
    last_idx: usize,
    last: &SyncMarginal,
    l_cutoff: f64,
    last_lp: f64,
    out: &mut Vec<AcceptedConfig>,
) {
    let d = pms.len();
    let mut idx = vec![0usize; d];

    fn rec(
        pms: &[PrecalculatedMarginal],
        dim: usize,
        idx: &mut [usize],
        acc_lp: f64,
        acc_mass: f64,
        l_cutoff: f64,
        out: &mut Vec<(f64, f64, Vec<usize>)>,
    ) {
        if dim == pms.len() {
            out.push((acc_lp, acc_mass, idx.to_vec()));
            return;
        }
        let remaining_mode_sum: f64 = pms[dim + 1..].iter().map(PrecalculatedMarginal::mode_log_prob).sum();
        for i in 0..pms[dim].no_confs() {
            let lp = pms[dim].log_probs()[i];
            if acc_lp + lp + remaining_mode_sum < l_cutoff {
                break;
            }
            idx[dim] = i;
            rec(
                pms,
                dim + 1,
                idx,
                acc_lp + lp,
                acc_mass + pms[dim].masses()[i],
                l_cutoff,
                out,
            );
        }
    }

    let mut collected = Vec::new();
    rec(
        pms,
        0,
        &mut idx,
        last_lp,
        last.pm().masses()[last_idx],
        l_cutoff,
        &mut collected,
    );

    out.extend(collected.into_iter().map(|(log_prob, mass, local_idx)| {
        let mut isotopes = Vec::new();
        for (k, &i) in local_idx.iter().enumerate() {
            isotopes.extend_from_slice(&pms[k].confs()[i]);
        }
        isotopes.extend_from_slice(&last.pm().confs()[last_idx]);
        AcceptedConfig {
            mass,
            log_prob,
            isotopes,
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn methane_marginals() -> Vec<Marginal> {
        vec![
            Marginal::new(&[12.0, 13.003_354_837_8], &[0.9893, 0.0107], 1).unwrap(),
            Marginal::new(
                &[1.007_825_032_07, 2.014_101_777_8],
                &[0.999_885, 0.000_115],
                4,
            )
            .unwrap(),
        ]
    }

    #[test]
    fn matches_single_threaded_threshold_engine() {
        use crate::joint::threshold::ThresholdJoint;

        let marginals = methane_marginals();
        let mode_joint_lp: f64 = marginals.iter().map(Marginal::mode_log_prob).sum();
        let l_cutoff = mode_joint_lp - 10.0;

        let mut single = ThresholdJoint::new(marginals.clone(), IsoConfig::with_absolute_cutoff(l_cutoff))
            .unwrap();
        let mut expected = single.collect_all();
        expected.sort_by(|a, b| b.log_prob.total_cmp(&a.log_prob));

        let mut got = run(marginals, IsoConfig::with_absolute_cutoff(l_cutoff), 4).unwrap();
        got.sort_by(|a, b| b.log_prob.total_cmp(&a.log_prob));

        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected.iter()) {
            assert!((g.log_prob - e.log_prob).abs() < 1e-9);
            assert!((g.mass - e.mass).abs() < 1e-6);
        }
    }

    #[test]
    fn no_duplicates_across_workers() {
        let marginals = methane_marginals();
        let mode_joint_lp: f64 = marginals.iter().map(Marginal::mode_log_prob).sum();
        let configs = run(
            marginals,
            IsoConfig::with_absolute_cutoff(mode_joint_lp - 15.0),
            8,
        )
        .unwrap();
        let mut seen = std::collections::HashSet::new();
        for c in &configs {
            assert!(seen.insert(c.isotopes.clone()));
        }
    }

    #[test]
    fn empty_when_mode_fails_cutoff() {
        let marginals = methane_marginals();
        let mode_joint_lp: f64 = marginals.iter().map(Marginal::mode_log_prob).sum();
        let configs = run(
            marginals,
            IsoConfig::with_absolute_cutoff(mode_joint_lp + 1.0),
            4,
        )
        .unwrap();
        assert!(configs.is_empty());
    }
}
