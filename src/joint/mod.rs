//! Multi-dimensional search over the product of marginals: composing
//! per-element enumerators into full isotopologues.
//!
//! Four engine variants live in their own modules: [`layered`] (the
//! default, approximate-order engine), [`threshold`] (exact, fixed-cutoff),
//! [`bound_mass`] (threshold plus an RGT-driven mass band), and [`ordered`]
//! (reference, exact order, slower). [`parallel`] adds an optional
//! multi-threaded variant of the threshold engine behind the `parallel`
//! feature.
//!
//! What they share is gathered here: the joint configuration record (a
//! leading log-probability followed by one partition index per element)
//! and the expanded, caller-facing result row.

pub mod bound_mass;
pub mod layered;
pub mod ordered;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod threshold;

use crate::marginal::Partition;

/// One joint configuration as stored in the arena: its summed
/// log-probability plus, per element, the index of that element's chosen
/// partition within its marginal's enumerated list. The full isotope
/// vector is reconstructed on demand rather than duplicated per record.
#[derive(Debug, Clone, PartialEq)]
pub struct JointRecord {
    /// Summed log-probability across every element's chosen partition.
    pub log_prob: f64,
    /// Per-element index into that element's enumerated partition list.
    pub idx: Vec<u32>,
}

/// One fully expanded, caller-facing result: mass, log-probability, and
/// the concatenation (in element order) of every element's chosen
/// partition — the same `isoCounts` layout [`crate::ffi::getIsoConfs`]
/// writes into its buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedConfig {
    /// Total mass of this isotopologue.
    pub mass: f64,
    /// Joint log-probability.
    pub log_prob: f64,
    /// Concatenation, in element order, of each element's chosen
    /// partition vector.
    pub isotopes: Vec<u32>,
}

/// Concatenate each element's partition at `idx[k]` into one vector, in
/// element order — the `isoCounts` layout [`AcceptedConfig::isotopes`] uses.
#[must_use]
pub fn expand_isotopes(idx: &[u32], confs: &[&[Partition]]) -> Vec<u32> {
    let mut out = Vec::new();
    for (k, &ix) in idx.iter().enumerate() {
        out.extend_from_slice(&confs[k][ix as usize]);
    }
    out
}
