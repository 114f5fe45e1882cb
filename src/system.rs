//! The measurement system used in this crate.
//!
//! This crate only ever talks about masses (in dalton) and dimensionless
//! ratios, so `Charge`, `Time` and `MassOverCharge` — which belong to the
//! spectrum/instrument side of mass spectrometry — are dropped.

#![allow(clippy::non_canonical_clone_impl)]
#![allow(clippy::ignored_unit_patterns)]

use uom::*;

pub use self::f64::*;

/// The mass quantity in dalton.
#[macro_use]
pub mod mass {
    use uom::*;

    quantity! {
        /// Mass in dalton
        quantity: Mass; "mass";
        /// Mass
        dimension: Q<P1, Z0>;
        units {
            @millidalton: 0.001; "mDa", "millidalton", "millidaltons";
            @dalton: 1.0; "Da", "dalton", "daltons";
            @kilodalton: 1_000.0; "kDa", "kilodalton", "kilodaltons";
        }
    }
}

/// A unit-less quantity, used for ratios such as relative probability
/// thresholds.
#[macro_use]
pub mod ratio {
    use uom::*;

    quantity! {
        /// Unit less quantity for general calculations
        quantity: Ratio; "ratio";
        /// Unit less quantity for general calculations
        dimension: Q<Z0, Z0>;
        units {
            @fraction: 1.0; "⅟", "fraction", "fraction";
            @percent: 0.01; "%", "percent", "percent";
            @ppm: 0.000_001; "ppm", "ppm", "ppm";
        }
    }
}

system! {
    /// Quantities
    #[doc(hidden)]
    quantities: Q {
        mass: dalton, M;
        ratio: fraction, R;
    }

    /// Units
    units: U {
        mod mass::Mass,
        mod ratio::Ratio,
    }
}

/// The whole system with f64 as storage type.
#[allow(unused_imports)]
pub mod f64 {
    mod mks {
        pub use super::super::*;
    }

    Q!(self::mks, f64);

    pub use super::mass::dalton;
    pub use super::ratio::fraction;

    /// Annotate the given number as being in Da.
    #[allow(dead_code)]
    pub fn da(v: f64) -> Mass {
        Mass::new::<super::mass::dalton>(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn da_round_trips() {
        let m = da(18.010_565);
        assert!((m.value - 18.010_565).abs() < 1e-9);
    }
}
