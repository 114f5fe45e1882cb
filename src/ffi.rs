//! The opaque-handle foreign-function surface: a thin `extern "C"` shim over
//! [`crate::iso`] and [`crate::joint`], following the handle-over-boxed-pointer
//! pattern `original_source/IsoSpec++/cwrapper.cpp` uses ahead of this crate.
//!
//! Two distinct handle kinds cross this boundary: an `Iso` handle (the
//! validated element set from `setupIso`) and an engine handle (an
//! already-run enumeration, from one of the `setupIso*` constructors below).
//! Mixing them up — e.g. passing an `Iso` handle to `getIsoConfs` — is
//! undefined behaviour, exactly as in the original; callers on the C side
//! are trusted to keep the two straight, same as any other opaque-pointer C
//! API.

use crate::iso::{ElementInput, Iso, IsoConfig};
use crate::joint::layered::LayeredJoint;
use crate::joint::threshold::ThresholdJoint;
use crate::joint::AcceptedConfig;
use std::os::raw::c_void;
use std::slice;

/// A completed enumeration: the accepted configurations plus the
/// `Σ I[i]` isotope count `getIsotopesNo` reports.
struct EngineHandle {
    isotopes_no: usize,
    configs: Vec<AcceptedConfig>,
}

/// Build the opaque `Iso` handle from flat per-element arrays (mirrors the
/// original `setupIso`).
///
/// `isotope_numbers` and `atom_counts` have `dim_number` entries each;
/// `isotope_masses`/`isotope_probabilities` are the concatenation, in
/// element order, of each element's per-isotope values (total length
/// `Σ isotope_numbers[i]`). Returns null if `dim_number <= 0` or any
/// element declares zero isotopes.
///
/// # Safety
/// All four pointers must be valid for reads of their documented lengths,
/// non-null, and properly aligned for their element type.
#[no_mangle]
pub unsafe extern "C" fn setupIso(
    dim_number: i32,
    isotope_numbers: *const i32,
    atom_counts: *const i32,
    isotope_masses: *const f64,
    isotope_probabilities: *const f64,
) -> *mut c_void {
    if dim_number <= 0 {
        return std::ptr::null_mut();
    }
    let d = dim_number as usize;
    let isotope_numbers = slice::from_raw_parts(isotope_numbers, d);
    let atom_counts = slice::from_raw_parts(atom_counts, d);

    let mut elements = Vec::with_capacity(d);
    let mut offset = 0usize;
    for i in 0..d {
        let Ok(isotope_no) = usize::try_from(isotope_numbers[i]) else {
            return std::ptr::null_mut();
        };
        let Ok(atom_count) = u32::try_from(atom_counts[i]) else {
            return std::ptr::null_mut();
        };
        let masses = slice::from_raw_parts(isotope_masses.add(offset), isotope_no).to_vec();
        let abundances =
            slice::from_raw_parts(isotope_probabilities.add(offset), isotope_no).to_vec();
        offset += isotope_no;
        elements.push(ElementInput {
            masses,
            abundances,
            atom_count,
        });
    }

    match Iso::new(elements) {
        Ok(iso) => Box::into_raw(Box::new(iso)).cast(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Build and fully run the layered engine (mirrors the original
/// `setupIsoLayered`) against a previously built `Iso` handle. Returns null
/// on any construction failure, including an allocation failure while
/// expanding a layer.
///
/// # Safety
/// `iso` must be a live handle returned by [`setupIso`] and not yet passed
/// to [`destroyIsoInput`].
#[no_mangle]
pub unsafe extern "C" fn setupIsoLayered(
    iso: *const c_void,
    cutoff: f64,
    tab_size: usize,
    layer_step: f64,
    estimate_thresholds: bool,
    trim: bool,
) -> *mut c_void {
    if iso.is_null() {
        return std::ptr::null_mut();
    }
    let iso = &*iso.cast::<Iso>();
    let Ok(marginals) = iso.marginals() else {
        return std::ptr::null_mut();
    };
    let config = IsoConfig {
        cutoff_value: cutoff,
        absolute: false,
        tab_size,
        layer_step,
        estimate_thresholds,
        trim,
        ..IsoConfig::default()
    };
    let Ok(engine) = LayeredJoint::run(marginals, config) else {
        return std::ptr::null_mut();
    };

    let handle = Box::new(EngineHandle {
        isotopes_no: iso.isotopes_no(),
        configs: engine.accepted_configs(),
    });
    Box::into_raw(handle).cast()
}

/// Build and fully run the threshold engine. `original_source`'s
/// `cwrapper.cpp` exposes both the layered and threshold constructors, and
/// this surface does the same rather than treating the threshold engine as
/// a debug extra. `absolute` selects whether `cutoff` is a joint
/// log-probability or a cumulative-probability fraction relative to the
/// joint mode.
///
/// # Safety
/// `iso` must be a live handle returned by [`setupIso`] and not yet passed
/// to [`destroyIsoInput`].
#[no_mangle]
pub unsafe extern "C" fn setupIsoThreshold(
    iso: *const c_void,
    cutoff: f64,
    absolute: bool,
) -> *mut c_void {
    if iso.is_null() {
        return std::ptr::null_mut();
    }
    let iso = &*iso.cast::<Iso>();
    let Ok(marginals) = iso.marginals() else {
        return std::ptr::null_mut();
    };
    let config = IsoConfig {
        cutoff_value: cutoff,
        absolute,
        ..IsoConfig::default()
    };
    let Ok(mut engine) = ThresholdJoint::new(marginals, config) else {
        return std::ptr::null_mut();
    };
    let configs = engine.collect_all();

    let handle = Box::new(EngineHandle {
        isotopes_no: iso.isotopes_no(),
        configs,
    });
    Box::into_raw(handle).cast()
}

/// `Σ I[i]`, the per-configuration segment length `getIsoConfs` writes.
///
/// # Safety
/// `engine` must be a live handle returned by one of the `setupIso*`
/// engine constructors above.
#[no_mangle]
pub unsafe extern "C" fn getIsotopesNo(engine: *const c_void) -> usize {
    (*engine.cast::<EngineHandle>()).isotopes_no
}

/// Number of accepted configurations.
///
/// # Safety
/// `engine` must be a live handle returned by one of the `setupIso*`
/// engine constructors above.
#[no_mangle]
pub unsafe extern "C" fn getIsoConfNo(engine: *const c_void) -> usize {
    (*engine.cast::<EngineHandle>()).configs.len()
}

/// Fill the caller's buffers: `mass`/`log_prob` need `getIsoConfNo(engine)`
/// entries each; `iso_counts` needs `getIsoConfNo(engine) * getIsotopesNo(engine)`
/// entries, laid out as the concatenation, in element order, of each
/// accepted configuration's isotope counts (mirrors the original
/// `isoCounts` layout).
///
/// # Safety
/// `engine` must be a live handle returned by one of the `setupIso*` engine
/// constructors above; `mass` and `log_prob` must be valid for writes of
/// `getIsoConfNo(engine)` `f64`s; `iso_counts` must be valid for writes of
/// `getIsoConfNo(engine) * getIsotopesNo(engine)` `u32`s.
#[no_mangle]
pub unsafe extern "C" fn getIsoConfs(
    engine: *const c_void,
    mass: *mut f64,
    log_prob: *mut f64,
    iso_counts: *mut u32,
) {
    let engine = &*engine.cast::<EngineHandle>();
    for (k, conf) in engine.configs.iter().enumerate() {
        *mass.add(k) = conf.mass;
        *log_prob.add(k) = conf.log_prob;
        let base = k * engine.isotopes_no;
        for (j, &count) in conf.isotopes.iter().enumerate() {
            *iso_counts.add(base + j) = count;
        }
    }
}

/// Free an engine handle returned by one of the `setupIso*` engine
/// constructors (mirrors the original `destroyIso`).
///
/// # Safety
/// `engine` must be a handle returned by one of the `setupIso*` engine
/// constructors, not already freed, and not used again after this call.
#[no_mangle]
pub unsafe extern "C" fn destroyIso(engine: *mut c_void) {
    if !engine.is_null() {
        drop(Box::from_raw(engine.cast::<EngineHandle>()));
    }
}

/// Free an `Iso` handle returned by [`setupIso`]. The original C API only
/// names one `destroyIso`; since this surface's `Iso` and engine handles
/// are distinct Rust types behind the same `void*`, freeing them needs two
/// distinct functions — this is the `Iso`-handle one.
///
/// # Safety
/// `iso` must be a handle returned by [`setupIso`], not already freed, and
/// not used again after this call.
#[no_mangle]
pub unsafe extern "C" fn destroyIsoInput(iso: *mut c_void) {
    if !iso.is_null() {
        drop(Box::from_raw(iso.cast::<Iso>()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_threshold_through_the_ffi_surface() {
        let masses = [1.007_825_032_07, 2.014_101_777_8];
        let abundances = [0.999_885, 0.000_115];
        let isotope_numbers = [2i32];
        let atom_counts = [3i32];

        unsafe {
            let iso = setupIso(
                1,
                isotope_numbers.as_ptr(),
                atom_counts.as_ptr(),
                masses.as_ptr(),
                abundances.as_ptr(),
            );
            assert!(!iso.is_null());

            let engine = setupIsoThreshold(iso, 1e-6, false);
            assert!(!engine.is_null());

            let n_isotopes = getIsotopesNo(engine);
            assert_eq!(n_isotopes, 2);
            let n_confs = getIsoConfNo(engine);
            assert!(n_confs >= 1);

            let mut mass = vec![0.0f64; n_confs];
            let mut log_prob = vec![0.0f64; n_confs];
            let mut iso_counts = vec![0u32; n_confs * n_isotopes];
            getIsoConfs(
                engine,
                mass.as_mut_ptr(),
                log_prob.as_mut_ptr(),
                iso_counts.as_mut_ptr(),
            );
            // The monoisotopic configuration (all 3 atoms on the light
            // isotope) must be present and is necessarily the mode.
            assert!(iso_counts
                .chunks(n_isotopes)
                .any(|c| c == [3, 0]));

            destroyIso(engine);
            destroyIsoInput(iso);
        }
    }

    #[test]
    fn setup_iso_rejects_non_positive_dim() {
        unsafe {
            assert!(setupIso(0, std::ptr::null(), std::ptr::null(), std::ptr::null(), std::ptr::null())
                .is_null());
        }
    }
}
