#![doc = include_str!("../README.md")]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, missing_docs)]
#![allow(
    clippy::must_use_candidate,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::similar_names
)]

//! Isotopic fine structure calculator: given one or more elements' isotope
//! masses and natural abundances plus atom counts, enumerate the most
//! probable isotopologues of the resulting molecular formula above a
//! probability threshold.
//!
//! The search is layered, mirroring how the crate's modules build on one
//! another:
//!
//! - [`marginal`] — per-element enumeration (the modal partition, a
//!   lazy best-first [`marginal::trek::MarginalTrek`], an eager
//!   [`marginal::precalculated::PrecalculatedMarginal`], and an
//!   [`marginal::rgt::RgtMarginal`] index for combined probability/mass
//!   range queries).
//! - [`joint`] — composing marginals into full isotopologues: the default
//!   [`joint::layered::LayeredJoint`] engine, the exact
//!   [`joint::threshold::ThresholdJoint`] engine, its mass-bounded sibling
//!   [`joint::bound_mass::BoundMassJoint`], the sketched exact-order
//!   [`joint::ordered::OrderedJoint`], and (behind the `parallel` feature)
//!   a multithreaded threshold variant.
//! - [`iso`] — the validated, immutable element-set description
//!   ([`iso::Iso`]) and the shared construction knobs ([`iso::IsoConfig`])
//!   every engine above is built from.
//!
//! [`formula`] and [`element`] are a convenience layer on top of all of
//! this — a small formula grammar and a static isotope catalogue — for
//! callers who would rather hand over `"C6H12O6"` than four parallel
//! arrays. [`ffi`] exposes the opaque-handle surface for non-Rust callers.

pub mod arena;
pub mod element;
pub mod error;
pub mod ffi;
pub mod formula;
pub mod iso;
pub mod joint;
pub mod marginal;
pub mod summator;
pub mod system;

pub use crate::element::{lookup as lookup_element, ElementEntry, Isotope};
pub use crate::error::{IsoError, Result};
pub use crate::formula::{parse as parse_formula, parse_merged as parse_formula_merged, FormulaTerm};
pub use crate::iso::{ElementInput, Iso, IsoConfig};
pub use crate::joint::{bound_mass::BoundMassJoint, layered::LayeredJoint, ordered::OrderedJoint, threshold::ThresholdJoint, AcceptedConfig};
pub use crate::marginal::Marginal;
