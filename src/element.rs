//! The static, process-wide element/isotope catalogue.
//!
//! This table is an external collaborator, not part of the core engine: the
//! engine's primary API takes masses and abundances as plain arrays and
//! never looks an element up by name. The catalogue below exists purely to
//! back [`crate::formula`]'s debug-aid formula grammar, the same role
//! `original_source/IsoSpec++/isoSpec++.cpp`'s `elem_table_*` arrays play
//! for `parse_formula`.
//!
//! It is deliberately **not exhaustive**: only H, C, N, O and S are
//! included. Extending it is a matter of appending rows; nothing downstream
//! assumes a particular element count.

use crate::system::{da, Mass};
use std::sync::OnceLock;

/// One isotope of one element: mass number, exact mass, natural abundance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Isotope {
    /// Mass number (protons + neutrons).
    pub mass_number: u16,
    /// Exact isotopic mass.
    pub mass: Mass,
    /// Natural abundance, in `[0, 1]`.
    pub abundance: f64,
    /// Natural log of `abundance`, tabulated separately rather than
    /// recomputed from it. `f64::ln` is not a `const fn`, so this is typed
    /// in by hand alongside each row instead of living in a `static`
    /// initialiser; see [`fidelity_ln`].
    pub ln_abundance: f64,
}

/// A chemical element and its stable isotopes, in the order the catalogue
/// declares them (index 0 is always the most abundant / monoisotopic
/// isotope, by convention of the data below, though nothing enforces it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementEntry {
    /// The element's symbol, e.g. `"H"`.
    pub symbol: &'static str,
    /// Atomic number.
    pub atomic_number: u8,
    /// The element's isotopes.
    pub isotopes: &'static [Isotope],
}

macro_rules! isotope {
    ($mass_number:expr, $mass:expr, $abundance:expr, $ln_abundance:expr) => {
        Isotope {
            mass_number: $mass_number,
            mass: da($mass),
            abundance: $abundance,
            ln_abundance: $ln_abundance,
        }
    };
}

static HYDROGEN: &[Isotope] = &[
    isotope!(1, 1.007_825_032_07, 0.999_885, -0.000_115_006_613_006_978_3),
    isotope!(2, 2.014_101_777_8, 0.000_115, -9.070_578_429_601_024),
];
static CARBON: &[Isotope] = &[
    isotope!(12, 12.0, 0.9893, -0.010_757_656_652_960_208),
    isotope!(13, 13.003_354_837_8, 0.0107, -4.537_511_537_514_277),
];
static NITROGEN: &[Isotope] = &[
    isotope!(14, 14.003_074_004_8, 0.996_36, -0.003_646_640_920_197_475_5),
    isotope!(15, 15.000_108_898_2, 0.003_64, -5.615_771_597_333_488),
];
static OXYGEN: &[Isotope] = &[
    isotope!(16, 15.994_914_619_56, 0.997_57, -0.002_432_957_241_702_984_4),
    isotope!(17, 16.999_131_70, 0.000_38, -7.875_339_305_243_843),
    isotope!(18, 17.999_161_0, 0.002_05, -6.189_915_485_831_82),
];
static SULFUR: &[Isotope] = &[
    isotope!(32, 31.972_071_00, 0.9499, -0.051_398_563_086_000_326),
    isotope!(33, 32.971_458_76, 0.0075, -4.892_852_258_439_873),
    isotope!(34, 33.967_866_90, 0.0425, -3.158_251_203_051_766),
    isotope!(36, 35.967_080_76, 0.0001, -9.210_340_371_976_182),
];

static CATALOGUE: &[ElementEntry] = &[
    ElementEntry {
        symbol: "H",
        atomic_number: 1,
        isotopes: HYDROGEN,
    },
    ElementEntry {
        symbol: "C",
        atomic_number: 6,
        isotopes: CARBON,
    },
    ElementEntry {
        symbol: "N",
        atomic_number: 7,
        isotopes: NITROGEN,
    },
    ElementEntry {
        symbol: "O",
        atomic_number: 8,
        isotopes: OXYGEN,
    },
    ElementEntry {
        symbol: "S",
        atomic_number: 16,
        isotopes: SULFUR,
    },
];

/// Look up an element by its symbol (case-sensitive, e.g. `"Na"` not
/// `"NA"`).
#[must_use]
pub fn lookup(symbol: &str) -> Option<&'static ElementEntry> {
    catalogue().iter().find(|e| e.symbol == symbol)
}

/// The full catalogue, memoised behind a [`OnceLock`] so repeated lookups
/// do not re-walk a `const` initialiser.
#[must_use]
pub fn catalogue() -> &'static [ElementEntry] {
    CATALOGUE_CELL.get_or_init(|| CATALOGUE)
}
static CATALOGUE_CELL: OnceLock<&'static [ElementEntry]> = OnceLock::new();

/// Return the log-abundance for a probability, preferring the catalogue's
/// own tabulated [`Isotope::ln_abundance`] over recomputing `probability.ln()`
/// when the probability matches a catalogue entry bit-for-bit. A directly
/// tabulated value and a freshly computed `ln()` of the same `f64` agree to
/// within rounding almost always, but not by construction — looking the
/// tabulated figure up keeps a marginal built from catalogue data bound to
/// the one source of truth instead of two independently-rounded ones.
/// Probabilities not found in the catalogue (e.g. supplied directly by a
/// caller bypassing [`crate::formula`]) fall back to `probability.ln()`.
#[must_use]
pub fn fidelity_ln(probability: f64) -> f64 {
    for entry in catalogue() {
        for isotope in entry.isotopes {
            if isotope.abundance == probability {
                return isotope.ln_abundance;
            }
        }
    }
    probability.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydrogen_abundances_sum_to_one() {
        let h = lookup("H").unwrap();
        let total: f64 = h.isotopes.iter().map(|i| i.abundance).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_symbol_is_none() {
        assert!(lookup("Xx").is_none());
    }

    #[test]
    fn fidelity_prefers_the_tabulated_value_over_a_fresh_ln() {
        let h1 = HYDROGEN[0];
        assert_eq!(fidelity_ln(h1.abundance), h1.ln_abundance);
        assert!((fidelity_ln(h1.abundance) - h1.abundance.ln()).abs() < 1e-12);
    }

    #[test]
    fn unmatched_probability_falls_back_to_ln() {
        let p = 0.123_456;
        assert_eq!(fidelity_ln(p), p.ln());
    }
}
