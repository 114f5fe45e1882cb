//! Construction parameters and the validated element-set descriptor.

use crate::error::{IsoError, Result};
use crate::marginal::Marginal;

/// Construction parameters shared by the joint engines, gathered in one
/// place the way `rustyms`'s various `*Parameters` structs bundle
/// peptide-complexity knobs, rather than threading six positional
/// arguments through every constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct IsoConfig {
    /// Cumulative probability target, `(0, 1]`, or an absolute
    /// log-probability cutoff when [`Self::absolute`] is set (only
    /// meaningful to [`crate::joint::threshold::ThresholdJoint`] — the
    /// layered engine always reads this as a cumulative-probability
    /// target).
    pub cutoff_value: f64,
    /// Whether [`Self::cutoff_value`] is an absolute log-probability
    /// rather than a cumulative-probability target.
    pub absolute: bool,
    /// Arena slab size (mirrors the original `tabSize`).
    pub tab_size: usize,
    /// Fraction of the current fringe promoted per layer (mirrors the
    /// original `layerStep`), default `0.3`.
    pub layer_step: f64,
    /// Initial visited-set bucket count (mirrors the original `hashSize`);
    /// the layered engine needs no visited set (canonical direction rule)
    /// but the ordered engine does.
    pub visited_capacity: usize,
    /// Whether the layered engine uses the analytic threshold-update
    /// heuristic instead of quickselect every layer.
    pub estimate_thresholds: bool,
    /// Whether to truncate the last layer to land on the cumulative
    /// target exactly (within one layer's worth of overshoot).
    pub trim: bool,
}

impl Default for IsoConfig {
    fn default() -> Self {
        Self {
            cutoff_value: 0.99,
            absolute: false,
            tab_size: 1000,
            layer_step: 0.3,
            visited_capacity: 1024,
            estimate_thresholds: true,
            trim: true,
        }
    }
}

impl IsoConfig {
    /// Build a config targeting cumulative probability `cutoff`, with
    /// every other knob at its documented default.
    #[must_use]
    pub fn with_cutoff(cutoff: f64) -> Self {
        Self {
            cutoff_value: cutoff,
            ..Self::default()
        }
    }

    /// Build a config for an absolute log-probability cutoff (section
    /// 4.5.2's threshold engine, `absolute = true`).
    #[must_use]
    pub fn with_absolute_cutoff(log_prob_cutoff: f64) -> Self {
        Self {
            cutoff_value: log_prob_cutoff,
            absolute: true,
            ..Self::default()
        }
    }
}

/// One element's raw input: its isotope masses, natural abundances, and
/// atom count. Validated on the way into [`Iso::new`]; never constructed
/// any other way.
#[derive(Debug, Clone)]
pub struct ElementInput {
    /// Per-isotope exact masses.
    pub masses: Vec<f64>,
    /// Per-isotope natural abundances, summing to ~1.
    pub abundances: Vec<f64>,
    /// Number of atoms of this element in the formula.
    pub atom_count: u32,
}

/// The validated element set a compound's isotopic fine structure is
/// computed over: element count, per-element isotope count, atom count,
/// masses, abundances.
///
/// `Iso` itself holds no enumerator state — it is the immutable input
/// description every joint engine is built from via [`Iso::marginals`].
/// The C++ original's `Iso` carries an "is this moved-from" flag so a
/// half-destroyed object isn't used twice; here that is simply
/// unrepresentable: `Iso::marginals` takes `&self` and can be called as
/// many times as needed, or not at all if a caller only wants
/// [`Self::isotopes_no`].
#[derive(Debug, Clone)]
pub struct Iso {
    elements: Vec<ElementInput>,
}

impl Iso {
    /// Validate and wrap an element set.
    ///
    /// # Errors
    /// [`IsoError::EmptyIsotopeList`] if `elements` itself is empty or any
    /// element has no isotopes; [`IsoError::MismatchedLengths`] if an
    /// element's mass and abundance vectors disagree in length.
    pub fn new(elements: Vec<ElementInput>) -> Result<Self> {
        if elements.is_empty() {
            return Err(IsoError::EmptyIsotopeList { element_index: 0 });
        }
        for (i, e) in elements.iter().enumerate() {
            if e.masses.is_empty() {
                return Err(IsoError::EmptyIsotopeList { element_index: i });
            }
            if e.masses.len() != e.abundances.len() {
                return Err(IsoError::MismatchedLengths {
                    element_index: i,
                    expected: e.masses.len(),
                    got: e.abundances.len(),
                });
            }
        }
        Ok(Self { elements })
    }

    /// Number of elements (dimensions of the joint search).
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Total isotope count `sum_i I[i]` (mirrors the original `getIsotopesNo`).
    #[must_use]
    pub fn isotopes_no(&self) -> usize {
        self.elements.iter().map(|e| e.masses.len()).sum()
    }

    /// Build one [`Marginal`] per element, in element order.
    ///
    /// # Errors
    /// Propagates any [`Marginal::new`] failure (should not occur given
    /// `Self::new`'s own validation, but kept fallible rather than
    /// panicking on a future invariant change).
    pub fn marginals(&self) -> Result<Vec<Marginal>> {
        self.elements
            .iter()
            .map(|e| Marginal::new(&e.masses, &e.abundances, e.atom_count))
            .collect()
    }

    /// Build an `Iso` from a formula string, looking up each element's
    /// isotope table from [`crate::element`]'s catalogue.
    ///
    /// # Errors
    /// Propagates [`crate::formula::parse_merged`]'s parse errors, plus
    /// anything [`Self::new`] itself would reject.
    pub fn from_formula(formula: &str) -> Result<Self> {
        let terms = crate::formula::parse_merged(formula)?;
        let elements = terms
            .into_iter()
            .map(|t| ElementInput {
                masses: t.element.isotopes.iter().map(|i| i.mass.value).collect(),
                abundances: t.element.isotopes.iter().map(|i| i.abundance).collect(),
                atom_count: t.count,
            })
            .collect();
        Self::new(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hydrogen() -> ElementInput {
        ElementInput {
            masses: vec![1.007_825_032_07, 2.014_101_777_8],
            abundances: vec![0.999_885, 0.000_115],
            atom_count: 2,
        }
    }

    #[test]
    fn isotopes_no_sums_across_elements() {
        let iso = Iso::new(vec![hydrogen(), hydrogen()]).unwrap();
        assert_eq!(iso.isotopes_no(), 4);
    }

    #[test]
    fn empty_element_list_errors() {
        assert!(matches!(
            Iso::new(vec![]).unwrap_err(),
            IsoError::EmptyIsotopeList { element_index: 0 }
        ));
    }

    #[test]
    fn default_config_matches_documented_defaults() {
        let cfg = IsoConfig::default();
        assert!((cfg.layer_step - 0.3).abs() < 1e-12);
        assert_eq!(cfg.tab_size, 1000);
        assert!(cfg.estimate_thresholds);
        assert!(cfg.trim);
    }
}
