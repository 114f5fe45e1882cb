//! Error types for construction-time failures.
//!
//! Every failure in this crate is terminal for the engine instance being
//! built: there is no retry, no partial-result recovery and no timeout.
//! Input errors and allocation failures are both reported synchronously,
//! before any (partially built) engine becomes observable to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Something went wrong while constructing an [`crate::Iso`] or one of the
/// enumerators built on top of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsoError {
    /// A formula string did not parse under the formula grammar (alternating
    /// runs of ASCII letters and digits; see [`crate::formula`]).
    InvalidFormula {
        /// The formula as given by the caller.
        formula: String,
        /// Why it was rejected.
        reason: String,
    },
    /// An element symbol is not present in the catalogue.
    UnknownElement(String),
    /// The masses/abundances arrays for one element disagree in length, or
    /// disagree with the declared isotope count.
    MismatchedLengths {
        /// Which element (by index) triggered the mismatch.
        element_index: usize,
        /// The isotope count declared for that element.
        expected: usize,
        /// The length actually observed.
        got: usize,
    },
    /// An element was given zero isotopes; no partition can sum to a
    /// positive atom count over an empty isotope list.
    EmptyIsotopeList {
        /// Which element (by index) is empty.
        element_index: usize,
    },
    /// A bulk allocation needed while expanding a layer could not be
    /// satisfied. Mirrors the C surface returning a null handle on OOM.
    AllocationFailure,
    /// Attempting a full (non-move) copy of an owning structure whose
    /// clone path was never implemented upstream. A programmer error, not a
    /// runtime condition.
    CloneNotImplemented,
}

impl fmt::Display for IsoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormula { formula, reason } => {
                write!(f, "invalid formula '{formula}': {reason}")
            }
            Self::UnknownElement(symbol) => write!(f, "unknown element '{symbol}'"),
            Self::MismatchedLengths {
                element_index,
                expected,
                got,
            } => write!(
                f,
                "element {element_index}: expected {expected} isotopes, got {got}"
            ),
            Self::EmptyIsotopeList { element_index } => {
                write!(f, "element {element_index} has no isotopes")
            }
            Self::AllocationFailure => write!(f, "allocation failure while expanding a layer"),
            Self::CloneNotImplemented => {
                write!(f, "full-copy clone of this type is not implemented")
            }
        }
    }
}

impl std::error::Error for IsoError {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IsoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let err = IsoError::MismatchedLengths {
            element_index: 2,
            expected: 3,
            got: 4,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: IsoError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }

    #[test]
    fn unknown_element_json_shape() {
        let err = IsoError::UnknownElement("Xx".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!({"UnknownElement": "Xx"}));
    }
}
