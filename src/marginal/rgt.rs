//! Indexed per-element enumeration — a "Range-Gap Tree" (RGT) marginal: a
//! precomputed multi-level reordering of one element's partitions that
//! answers *probability-range intersect mass-range* queries without a
//! linear scan.
//!
//! Construction sorts the partitions once by log-probability (inherited
//! from [`super::precalculated::PrecalculatedMarginal`]), then — level by
//! level, doubling the block size each time — regroups the index space
//! `0..no_confs` into contiguous, probability-rank-aligned blocks and sorts
//! each block by mass. A query first binary-searches the probability-
//! sorted array for the index range `[lower, upper]` matching
//! `[pmin, pmax]` (cheap, since the array is already sorted that way by
//! construction), then decomposes `[lower, upper]` into a handful of these
//! precomputed, mass-sorted blocks — binary-searching each block for the
//! mass sub-range — rather than rescanning every index in the band. The
//! result is the same as a naive filter over the marginal's arrays; which
//! internal blocks get visited, and in what order, is not part of the
//! contract — callers may rely on the returned *set* of indices, never on
//! the order [`RgtMarginal::next`] yields them in.

use super::precalculated::PrecalculatedMarginal;
use super::Marginal;

/// Mass-sorted blocks for one level of the index. Block `i` covers the
/// probability-rank range `[i * block_size, i * block_size + block.len())`;
/// the last block of a level may be shorter than `block_size` when
/// `no_confs` is not a multiple of it.
type Level = Vec<Vec<usize>>;

/// An RGT-indexed marginal: a [`PrecalculatedMarginal`] plus the
/// multi-level mass index described above.
pub struct RgtMarginal {
    pm: PrecalculatedMarginal,
    levels: Vec<Level>,
    pmin: f64,
    pmax: f64,
    mmin: f64,
    mmax: f64,
    queue: Vec<usize>,
    queue_pos: usize,
    /// The partition index the most recent successful [`Self::next`] landed
    /// on.
    pub cidx: usize,
}

impl RgtMarginal {
    /// Build the index over every partition of `marginal`'s atoms with
    /// log-probability `>= l_cutoff`.
    #[must_use]
    pub fn new(marginal: Marginal, l_cutoff: f64) -> Self {
        let pm = PrecalculatedMarginal::new(marginal, l_cutoff);
        let levels = build_levels(&pm);
        Self {
            pm,
            levels,
            pmin: 0.0,
            pmax: 0.0,
            mmin: 0.0,
            mmax: 0.0,
            queue: Vec::new(),
            queue_pos: 0,
            cidx: 0,
        }
    }

    /// The underlying sorted-by-probability marginal, for callers that just
    /// need `no_confs`/`log_probs`/`masses`/mode bounds.
    #[must_use]
    pub const fn precalculated(&self) -> &PrecalculatedMarginal {
        &self.pm
    }

    /// The enumerated partitions, parallel to every other per-index
    /// accessor.
    #[must_use]
    pub fn confs(&self) -> &[super::Partition] {
        self.pm.confs()
    }

    /// Number of enumerated partitions.
    #[must_use]
    pub fn no_confs(&self) -> usize {
        self.pm.no_confs()
    }

    /// Whether index `idx` refers to an enumerated partition.
    #[must_use]
    pub fn in_range(&self, idx: usize) -> bool {
        self.pm.in_range(idx)
    }

    /// Log-probability of partition `idx`.
    #[must_use]
    pub fn get_l_prob(&self, idx: usize) -> f64 {
        self.pm.log_probs()[idx]
    }

    /// Mass of partition `idx`.
    #[must_use]
    pub fn get_mass(&self, idx: usize) -> f64 {
        self.pm.masses()[idx]
    }

    /// `exp(log-probability)` of partition `idx`.
    #[must_use]
    pub fn get_e_prob(&self, idx: usize) -> f64 {
        self.pm.exp_probs()[idx]
    }

    /// Log-probability of the modal partition.
    #[must_use]
    pub fn mode_log_prob(&self) -> f64 {
        self.pm.mode_log_prob()
    }

    /// `atom_count * min(mass)` bound.
    #[must_use]
    pub fn lightest_conf_mass(&self) -> f64 {
        self.pm.lightest_conf_mass()
    }

    /// `atom_count * max(mass)` bound.
    #[must_use]
    pub fn heaviest_conf_mass(&self) -> f64 {
        self.pm.heaviest_conf_mass()
    }

    /// Begin a new `(pmin, pmax, mmin, mmax)` rectangle query. Resets the
    /// iteration state consumed by [`Self::next`]. An empty probability
    /// band (`pmin > pmax` once clamped to the available range) leaves the
    /// query exhausted immediately.
    pub fn setup_search(&mut self, pmin: f64, pmax: f64, mmin: f64, mmax: f64) {
        self.pmin = pmin;
        self.pmax = pmax;
        self.mmin = mmin;
        self.mmax = mmax;
        self.queue.clear();
        self.queue_pos = 0;

        let log_probs = self.pm.log_probs();
        let n = log_probs.len();
        if n == 0 {
            return;
        }

        // `log_probs` is sorted descending, so both searches are plain
        // partition points.
        let lower = log_probs.partition_point(|&lp| lp > pmax);
        if lower == n {
            return;
        }
        let count_at_least_pmin = log_probs.partition_point(|&lp| lp >= pmin);
        if count_at_least_pmin == 0 {
            return;
        }
        let upper = count_at_least_pmin - 1;
        if lower > upper {
            return;
        }

        self.queue = collect_mass_band(&self.levels, self.pm.masses(), lower, upper, mmin, mmax);
    }

    /// Advance to the next partition in the current rectangle. Returns
    /// `false` once the rectangle is exhausted; [`Self::cidx`] is
    /// meaningful only after a `true` return.
    pub fn next(&mut self) -> bool {
        if self.queue_pos < self.queue.len() {
            self.cidx = self.queue[self.queue_pos];
            self.queue_pos += 1;
            true
        } else {
            false
        }
    }

    /// Reset the query state to empty, as if no rectangle had ever been
    /// set up.
    pub fn terminate_search(&mut self) {
        self.pmin = 0.0;
        self.pmax = 0.0;
        self.mmin = 0.0;
        self.mmax = 0.0;
        self.queue.clear();
        self.queue_pos = 0;
    }

    /// The lightest mass among partitions with log-probability `>= prob`.
    #[must_use]
    pub fn min_mass_above_l_prob(&mut self, prob: f64) -> f64 {
        self.setup_search(prob, f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY);
        let mut acc = f64::INFINITY;
        while self.next() {
            acc = acc.min(self.get_mass(self.cidx));
        }
        acc
    }

    /// The heaviest mass among partitions with log-probability `>= prob`.
    #[must_use]
    pub fn max_mass_above_l_prob(&mut self, prob: f64) -> f64 {
        self.setup_search(prob, f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY);
        let mut acc = f64::NEG_INFINITY;
        while self.next() {
            acc = acc.max(self.get_mass(self.cidx));
        }
        acc
    }
}

fn build_levels(pm: &PrecalculatedMarginal) -> Vec<Level> {
    let n = pm.no_confs();
    let masses = pm.masses();
    let mut levels = Vec::new();
    if n <= 1 {
        return levels;
    }
    let mut block_size = 2usize;
    loop {
        let mut blocks = Vec::new();
        let mut start = 0;
        while start < n {
            let end = (start + block_size).min(n);
            let mut block: Vec<usize> = (start..end).collect();
            block.sort_by(|&a, &b| masses[a].total_cmp(&masses[b]));
            blocks.push(block);
            start = end;
        }
        let done = block_size >= n;
        levels.push(blocks);
        if done {
            break;
        }
        block_size <<= 1;
    }
    levels
}

/// Decompose `[lower, upper]` into maximal precomputed, probability-rank-
/// aligned blocks, filter each by the mass band via binary search on its
/// mass-sorted order, and return the matching indices. Falls back to
/// emitting a bare index directly when no precomputed block starting at
/// the current position fits inside the remaining range (this only
/// happens for the length-1 remainder at a rectangle's edge).
fn collect_mass_band(
    levels: &[Level],
    masses: &[f64],
    lower: usize,
    upper: usize,
    mmin: f64,
    mmax: f64,
) -> Vec<usize> {
    let mut out = Vec::new();
    let mut pos = lower;
    while pos <= upper {
        let mut chosen = None;
        for (level_idx, level) in levels.iter().enumerate().rev() {
            let block_size = 1usize << (level_idx + 1);
            if pos % block_size != 0 {
                continue;
            }
            let block_idx = pos / block_size;
            if let Some(block) = level.get(block_idx) {
                if !block.is_empty() && pos + block.len() - 1 <= upper {
                    chosen = Some(block);
                    break;
                }
            }
        }

        if let Some(block) = chosen {
            let start = block.partition_point(|&i| masses[i] < mmin);
            for &i in &block[start..] {
                if masses[i] > mmax {
                    break;
                }
                out.push(i);
            }
            pos += block.len();
        } else {
            if masses[pos] >= mmin && masses[pos] <= mmax {
                out.push(pos);
            }
            pos += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sulfur() -> Marginal {
        Marginal::new(
            &[31.972_071_00, 32.971_458_76, 33.967_866_90, 35.967_080_76],
            &[0.9499, 0.0075, 0.0425, 0.0001],
            20,
        )
        .unwrap()
    }

    fn naive_filter(
        rgt: &RgtMarginal,
        pmin: f64,
        pmax: f64,
        mmin: f64,
        mmax: f64,
    ) -> Vec<usize> {
        (0..rgt.no_confs())
            .filter(|&i| {
                let lp = rgt.get_l_prob(i);
                let m = rgt.get_mass(i);
                lp >= pmin && lp <= pmax && m >= mmin && m <= mmax
            })
            .collect()
    }

    #[test]
    fn rectangle_query_matches_naive_filter() {
        let mut rgt = RgtMarginal::new(sulfur(), f64::NEG_INFINITY);
        let n = rgt.no_confs();
        assert!(n > 4, "need enough partitions to exercise multiple levels");

        let queries = [
            (f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY),
            (rgt.get_l_prob(n / 2), f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY),
            (f64::NEG_INFINITY, rgt.get_l_prob(n / 3), 630.0, 700.0),
            (f64::NEG_INFINITY, f64::INFINITY, 639.0, 640.0),
        ];

        for (pmin, pmax, mmin, mmax) in queries {
            let mut expected = naive_filter(&rgt, pmin, pmax, mmin, mmax);
            expected.sort_unstable();

            rgt.setup_search(pmin, pmax, mmin, mmax);
            let mut got = Vec::new();
            while rgt.next() {
                got.push(rgt.cidx);
            }
            got.sort_unstable();
            got.dedup();
            assert_eq!(got.len(), expected.len(), "dedup must be a no-op");
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn empty_band_terminates_cleanly() {
        let mut rgt = RgtMarginal::new(sulfur(), f64::NEG_INFINITY);
        rgt.setup_search(10.0, 20.0, f64::NEG_INFINITY, f64::INFINITY);
        assert!(!rgt.next());
    }
}
