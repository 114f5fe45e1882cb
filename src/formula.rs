//! The debug-aid formula grammar: alternating runs of ASCII letters (an
//! element symbol) and decimal digits (its atom count, defaulting to 1 when
//! omitted), e.g. `"C6H12O6"` or `"H2O"`.
//!
//! This is a convenience layered on top of the catalogue in [`crate::element`]
//! — nothing elsewhere in the crate requires a formula string; every engine
//! takes masses/abundances/atom-counts directly. Parsing is hand-scanned
//! rather than regex-based, mirroring how small a grammar this actually is.

use crate::element::{lookup, ElementEntry};
use crate::error::{IsoError, Result};

/// One element symbol paired with how many atoms of it the formula asked
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormulaTerm {
    /// The resolved catalogue entry.
    pub element: &'static ElementEntry,
    /// Atom count (always `>= 1`; a symbol with no trailing digits means
    /// 1, not 0 — the grammar has no way to write "zero atoms of X", and
    /// nothing emits a zero-count term).
    pub count: u32,
}

/// Parse a formula string into its element terms, in the order they
/// appear. Symbols may repeat (`"CH3CH3"` is valid and yields two separate
/// carbon/hydrogen term pairs); callers that want totals per element
/// should sum counts across terms with the same symbol.
///
/// # Errors
/// [`IsoError::InvalidFormula`] if the string is empty, starts with a
/// digit, contains anything outside `[A-Za-z0-9]`, or has a digit run that
/// overflows `u32`. [`IsoError::UnknownElement`] if a parsed symbol is not
/// in the catalogue.
pub fn parse(formula: &str) -> Result<Vec<FormulaTerm>> {
    if formula.is_empty() {
        return Err(IsoError::InvalidFormula {
            formula: formula.to_string(),
            reason: "empty formula".to_string(),
        });
    }

    let bytes = formula.as_bytes();
    let mut terms = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if !bytes[pos].is_ascii_alphabetic() {
            return Err(IsoError::InvalidFormula {
                formula: formula.to_string(),
                reason: format!("expected an element symbol at byte {pos}"),
            });
        }

        let symbol_start = pos;
        pos += 1;
        // A symbol is one uppercase letter followed by zero or more
        // lowercase letters ("Na", "Cl"), matching how every catalogue
        // entry is spelled.
        while pos < bytes.len() && bytes[pos].is_ascii_lowercase() {
            pos += 1;
        }
        let symbol = &formula[symbol_start..pos];

        let digits_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        let count = if digits_start == pos {
            1
        } else {
            formula[digits_start..pos]
                .parse::<u32>()
                .map_err(|_| IsoError::InvalidFormula {
                    formula: formula.to_string(),
                    reason: format!("atom count at byte {digits_start} overflows u32"),
                })?
        };

        let element = lookup(symbol).ok_or_else(|| IsoError::UnknownElement(symbol.to_string()))?;
        terms.push(FormulaTerm { element, count });
    }

    Ok(terms)
}

/// As [`parse`], but merge repeated symbols into a single term with the
/// summed atom count, in first-occurrence order.
///
/// # Errors
/// Same as [`parse`].
pub fn parse_merged(formula: &str) -> Result<Vec<FormulaTerm>> {
    let terms = parse(formula)?;
    let mut merged: Vec<FormulaTerm> = Vec::new();
    for term in terms {
        if let Some(existing) = merged
            .iter_mut()
            .find(|t| t.element.symbol == term.element.symbol)
        {
            existing.count += term.count;
        } else {
            merged.push(term);
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glucose() {
        let terms = parse("C6H12O6").unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0].element.symbol, "C");
        assert_eq!(terms[0].count, 6);
        assert_eq!(terms[1].element.symbol, "H");
        assert_eq!(terms[1].count, 12);
        assert_eq!(terms[2].element.symbol, "O");
        assert_eq!(terms[2].count, 6);
    }

    #[test]
    fn implicit_count_of_one() {
        let terms = parse("H2O").unwrap();
        assert_eq!(terms[1].element.symbol, "O");
        assert_eq!(terms[1].count, 1);
    }

    #[test]
    fn single_atom_no_digits() {
        let terms = parse("H").unwrap();
        assert_eq!(terms, vec![FormulaTerm { element: lookup("H").unwrap(), count: 1 }]);
    }

    #[test]
    fn repeated_symbol_kept_separate_by_parse() {
        let terms = parse("CH3CH3").unwrap();
        assert_eq!(terms.len(), 4);
    }

    #[test]
    fn repeated_symbol_merged_by_parse_merged() {
        let terms = parse_merged("CH3CH3").unwrap();
        assert_eq!(terms.len(), 2);
        let carbon = terms.iter().find(|t| t.element.symbol == "C").unwrap();
        assert_eq!(carbon.count, 2);
        let hydrogen = terms.iter().find(|t| t.element.symbol == "H").unwrap();
        assert_eq!(hydrogen.count, 6);
    }

    #[test]
    fn empty_formula_errors() {
        assert!(matches!(parse(""), Err(IsoError::InvalidFormula { .. })));
    }

    #[test]
    fn leading_digit_errors() {
        assert!(matches!(parse("6C"), Err(IsoError::InvalidFormula { .. })));
    }

    #[test]
    fn unknown_element_errors() {
        assert!(matches!(parse("Xx2"), Err(IsoError::UnknownElement(_))));
    }

    #[test]
    fn insulin() {
        let terms = parse_merged("C257H383N65O77S6").unwrap();
        assert_eq!(terms.len(), 5);
        let sulfur = terms.iter().find(|t| t.element.symbol == "S").unwrap();
        assert_eq!(sulfur.count, 6);
    }
}
