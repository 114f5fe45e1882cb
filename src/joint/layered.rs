//! The layered joint engine: the default, approximate-order enumerator.
//! Grows a fringe of joint configurations
//! layer by layer, each layer accepting everything at or above a dynamic
//! threshold and demoting the rest, until the accepted set's cumulative
//! probability reaches the caller's target.
//!
//! The key trick keeping this engine visited-set-free is the **canonical
//! direction rule** in [`LayeredJoint::expand_neighbours`]: a joint
//! configuration's neighbours are only ever generated by incrementing one
//! element's marginal index at a time, and generation of dimension `j`
//! stops as soon as the parent already has a nonzero index in some
//! dimension `< j`. Every reachable configuration then has exactly one
//! generating parent, so duplicates are structurally impossible.

use crate::arena::{Arena, ConfId};
use crate::error::{IsoError, Result};
use crate::iso::IsoConfig;
use crate::joint::{AcceptedConfig, JointRecord};
use crate::marginal::trek::MarginalTrek;
use crate::marginal::Marginal;
use crate::summator::Summator;

/// The layered joint enumerator.
pub struct LayeredJoint {
    treks: Vec<MarginalTrek>,
    arena: Arena<JointRecord>,
    current: Vec<ConfId>,
    next: Vec<ConfId>,
    accepted: Vec<ConfId>,
    last_layer_start: usize,
    total_prob: Summator,
    lprob_thr: f64,
    layer: u32,
    layer_step: f64,
    estimate_thresholds: bool,
    config: IsoConfig,
    finished: bool,
    pivot: Box<dyn FnMut(usize, usize) -> usize>,
}

impl LayeredJoint {
    /// Build and seed the engine, but do not run any layers yet. Useful
    /// for tests that want to drive [`Self::advance_to_next_configuration`]
    /// one layer at a time.
    ///
    /// # Errors
    /// [`IsoError::EmptyIsotopeList`] if `marginals` is empty.
    pub fn new(marginals: Vec<Marginal>, config: IsoConfig) -> Result<Self> {
        Self::with_pivot(marginals, config, default_pivot())
    }

    /// As [`Self::new`], but with an injected pivot-index chooser for the
    /// trimming quickselect — the release build's system-RNG pivot and the
    /// deterministic midpoint pivot used when the `rand` feature is off
    /// both satisfy this signature, which exists so tests can inject a
    /// fixed pivot instead of depending on `rand`.
    ///
    /// # Errors
    /// [`IsoError::EmptyIsotopeList`] if `marginals` is empty.
    pub fn with_pivot(
        marginals: Vec<Marginal>,
        config: IsoConfig,
        pivot: impl FnMut(usize, usize) -> usize + 'static,
    ) -> Result<Self> {
        if marginals.is_empty() {
            return Err(IsoError::EmptyIsotopeList { element_index: 0 });
        }
        let d = marginals.len();
        let treks: Vec<MarginalTrek> = marginals.into_iter().map(MarginalTrek::new).collect();
        let mut arena = Arena::new(config.tab_size);
        let mode_idx = vec![0u32; d];
        let mode_lp: f64 = treks.iter().map(|t| t.conf_probs()[0]).sum();
        let seed_id = arena.alloc(JointRecord {
            log_prob: mode_lp,
            idx: mode_idx,
        });

        Ok(Self {
            treks,
            arena,
            current: vec![seed_id],
            next: Vec::new(),
            accepted: Vec::new(),
            last_layer_start: 0,
            total_prob: Summator::new(),
            lprob_thr: mode_lp,
            layer: 0,
            layer_step: config.layer_step,
            estimate_thresholds: config.estimate_thresholds,
            config,
            finished: false,
            pivot: Box::new(pivot),
        })
    }

    /// Build the engine and run it to completion (every layer until
    /// [`Self::advance_to_next_configuration`] returns `false`), so a
    /// caller gets a handle to an engine that has already run to its
    /// cutoff — the contract [`crate::ffi::setupIsoLayered`] exposes over
    /// the FFI boundary.
    ///
    /// # Errors
    /// [`IsoError::EmptyIsotopeList`] if `marginals` is empty.
    pub fn run(marginals: Vec<Marginal>, config: IsoConfig) -> Result<Self> {
        let mut engine = Self::new(marginals, config)?;
        while engine.advance_to_next_configuration() {}
        Ok(engine)
    }

    /// Process one layer: drain `current`, accepting everything at or
    /// above `lprob_thr` and demoting the rest, then either set up the
    /// next layer's threshold or finish (trimming if configured). Returns
    /// `false` once the engine has nothing further to do, whether because
    /// the cumulative target was reached or the whole space was exhausted
    /// first.
    pub fn advance_to_next_configuration(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.last_layer_start = self.accepted.len();
        let mut prob_in_this_layer = self.total_prob;

        while let Some(top_id) = self.current.pop() {
            let top = self.arena.get(top_id).clone();
            if top.log_prob >= self.lprob_thr {
                self.accepted.push(top_id);
                prob_in_this_layer.add(top.log_prob.exp());
                self.expand_neighbours(&top);
            } else {
                self.next.push(top_id);
            }
        }

        if prob_in_this_layer.get() < self.config.cutoff_value {
            if self.next.is_empty() {
                self.finished = true;
                self.total_prob = prob_in_this_layer;
                return false;
            }
            std::mem::swap(&mut self.current, &mut self.next);
            self.next.clear();
            self.layer += 1;
            self.recompute_threshold(prob_in_this_layer);
            self.total_prob = prob_in_this_layer;
            true
        } else {
            if self.config.trim {
                self.trim_accepted();
            }
            self.finished = true;
            self.total_prob = prob_in_this_layer;
            true
        }
    }

    /// Expand `top`'s unit-neighbours under the canonical direction rule:
    /// for each element `j` in order, propose incrementing `j`'s marginal
    /// index by one (growing that element's trek if needed), sort the
    /// result into `current` or `next` by the current threshold, then stop
    /// as soon as `top`'s own index in dimension `j` is nonzero. This
    /// guarantees a unique generating parent per configuration.
    fn expand_neighbours(&mut self, top: &JointRecord) {
        let d = self.treks.len();
        for j in 0..d {
            let new_idx = top.idx[j] + 1;
            if self.treks[j].ensure_len(new_idx as usize + 1) {
                let mut neighbour_idx = top.idx.clone();
                neighbour_idx[j] = new_idx;
                let lp: f64 = neighbour_idx
                    .iter()
                    .enumerate()
                    .map(|(k, &ix)| self.treks[k].conf_probs()[ix as usize])
                    .sum();
                let id = self.arena.alloc(JointRecord {
                    log_prob: lp,
                    idx: neighbour_idx,
                });
                if lp >= self.lprob_thr {
                    self.current.push(id);
                } else {
                    self.next.push(id);
                }
            }
            if top.idx[j] > 0 {
                break;
            }
        }
    }

    /// Recompute `lprob_thr` for the layer that just became `current`:
    /// either the analytic estimate (falling back to a clamp-and-quickselect
    /// if the estimate overshoots the observed fringe) or a direct
    /// quickselect for the `floor(layer_step * |current|)`-th largest
    /// log-probability.
    fn recompute_threshold(&mut self, prob_in_this_layer: Summator) {
        let mut use_quickselect = !self.estimate_thresholds;

        if self.estimate_thresholds {
            let layers = f64::from(self.layer.max(1));
            let candidate = self.lprob_thr
                + (1.0 - self.config.cutoff_value).ln()
                + (1.0 - (1.0 - self.layer_step) / (layers * layers)).ln()
                - (1.0 - prob_in_this_layer.get()).ln();

            let max_fringe = self
                .current
                .iter()
                .map(|&id| self.arena.get(id).log_prob)
                .fold(f64::NEG_INFINITY, f64::max);

            if candidate > max_fringe {
                self.lprob_thr = max_fringe;
                self.estimate_thresholds = false;
                self.layer_step = 0.3;
                use_quickselect = true;
            } else {
                self.lprob_thr = candidate;
            }
        }

        if use_quickselect {
            let k = ((self.layer_step * self.current.len() as f64).floor() as usize)
                .min(self.current.len().saturating_sub(1));
            self.lprob_thr = quickselect_kth_desc(&mut self.current, k, &self.arena, &mut *self.pivot);
        }
    }

    /// Truncate the last layer's accepted records: sort them descending by
    /// log-probability and keep only as many, from the top, as are needed
    /// to push the cumulative probability across `cutoff`.
    fn trim_accepted(&mut self) {
        let start = self.last_layer_start;
        let arena = &self.arena;
        self.accepted[start..]
            .sort_by(|&a, &b| arena.get(b).log_prob.total_cmp(&arena.get(a).log_prob));

        let mut cumulative = self.total_prob;
        let mut cut_at = self.accepted.len();
        for (offset, &id) in self.accepted[start..].iter().enumerate() {
            cumulative.add(arena.get(id).log_prob.exp());
            if cumulative.get() >= self.config.cutoff_value {
                cut_at = start + offset + 1;
                break;
            }
        }
        self.accepted.truncate(cut_at);
    }

    /// The number of accepted configurations so far.
    #[must_use]
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    /// The accumulated probability of every accepted configuration (the
    /// engine's reported `totalProb`).
    #[must_use]
    pub fn total_prob(&self) -> f64 {
        self.total_prob.get()
    }

    /// Expand every accepted configuration into caller-facing rows.
    #[must_use]
    pub fn accepted_configs(&self) -> Vec<AcceptedConfig> {
        self.accepted.iter().map(|&id| self.expand(id)).collect()
    }

    fn expand(&self, id: ConfId) -> AcceptedConfig {
        let rec = self.arena.get(id);
        let mut isotopes = Vec::new();
        let mut mass = 0.0;
        for (k, &ix) in rec.idx.iter().enumerate() {
            isotopes.extend_from_slice(&self.treks[k].confs()[ix as usize]);
            mass += self.treks[k].conf_masses()[ix as usize];
        }
        AcceptedConfig {
            mass,
            log_prob: rec.log_prob,
            isotopes,
        }
    }
}

/// Select the `k`-th largest (0-indexed) log-probability among `items`,
/// partially reordering `items` in place (Lomuto quickselect, descending).
fn quickselect_kth_desc(
    items: &mut [ConfId],
    k: usize,
    arena: &Arena<JointRecord>,
    pivot: &mut dyn FnMut(usize, usize) -> usize,
) -> f64 {
    if items.is_empty() {
        return f64::NEG_INFINITY;
    }
    let mut lo = 0usize;
    let mut hi = items.len() - 1;
    loop {
        if lo == hi {
            return arena.get(items[lo]).log_prob;
        }
        let pivot_idx = pivot(lo, hi).clamp(lo, hi);
        items.swap(pivot_idx, hi);
        let pivot_val = arena.get(items[hi]).log_prob;
        let mut store = lo;
        for i in lo..hi {
            if arena.get(items[i]).log_prob > pivot_val {
                items.swap(i, store);
                store += 1;
            }
        }
        items.swap(store, hi);
        match k.cmp(&store) {
            std::cmp::Ordering::Equal => return arena.get(items[store]).log_prob,
            std::cmp::Ordering::Less => hi = store - 1,
            std::cmp::Ordering::Greater => lo = store + 1,
        }
    }
}

/// The release-build pivot choice: the system RNG.
#[cfg(feature = "rand")]
fn default_pivot() -> impl FnMut(usize, usize) -> usize {
    |lo, hi| {
        use rand::Rng;
        rand::thread_rng().gen_range(lo..=hi)
    }
}

/// The deterministic fallback pivot when the `rand` feature is disabled —
/// mirrors the source's own "deterministic midpoint in R builds" branch,
/// used here whenever a caller cannot or does not want a system RNG.
#[cfg(not(feature = "rand"))]
fn default_pivot() -> impl FnMut(usize, usize) -> usize {
    |lo, hi| lo + (hi - lo) / 2
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

    fn deterministic_pivot() -> impl FnMut(usize, usize) -> usize {
        |lo, hi| lo + (hi - lo) / 2
    }

    #[test]
    fn water_reaches_coverage_target() {
        let cfg = IsoConfig::with_cutoff(0.99);
        let mut engine =
            LayeredJoint::with_pivot(water_marginals(), cfg.clone(), deterministic_pivot())
                .unwrap();
        while engine.advance_to_next_configuration() {}
        assert!(engine.total_prob() >= cfg.cutoff_value - 1e-9);
        assert!(engine.accepted_count() >= 2);
    }

    #[test]
    fn monoisotopic_water_is_first_accepted() {
        let cfg = IsoConfig::with_cutoff(0.99);
        let mut engine =
            LayeredJoint::with_pivot(water_marginals(), cfg, deterministic_pivot()).unwrap();
        while engine.advance_to_next_configuration() {}
        let configs = engine.accepted_configs();
        let mono = configs
            .iter()
            .find(|c| c.isotopes == vec![2, 0, 1, 0, 0])
            .expect("monoisotopic water must be accepted");
        assert!((mono.mass - 18.010_564_684_4).abs() < 1e-6);
    }

    #[test]
    fn no_duplicate_configurations() {
        let cfg = IsoConfig::with_cutoff(0.999);
        let mut engine =
            LayeredJoint::with_pivot(water_marginals(), cfg, deterministic_pivot()).unwrap();
        while engine.advance_to_next_configuration() {}
        let configs = engine.accepted_configs();
        let mut seen = std::collections::HashSet::new();
        for c in &configs {
            assert!(seen.insert(c.isotopes.clone()), "duplicate: {:?}", c.isotopes);
        }
    }

    #[test]
    fn empty_band_when_mode_already_fails_cutoff() {
        // A cutoff target so close to 1 combined with trim=false still
        // terminates cleanly even if no layer ever collects it — here we
        // just check construction never panics for a trivial one-atom case
        // and immediately satisfies the target.
        let m = vec![Marginal::new(&[1.0], &[1.0], 1).unwrap()];
        let mut engine =
            LayeredJoint::with_pivot(m, IsoConfig::with_cutoff(0.5), deterministic_pivot())
                .unwrap();
        while engine.advance_to_next_configuration() {}
        assert_eq!(engine.accepted_count(), 1);
    }
}
