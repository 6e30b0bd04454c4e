//! Deterministic signal transforms applied to a model window before inference.
//!
//! Every transform is length preserving: coefficients that come out shorter
//! than the input row are zero padded on the right.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde::Serialize;
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::fmt;

/// Transform names advertised to clients
pub const ADVERTISED_TRANSFORMS: [&str; 3] = ["DCT", "DWT", "CS"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Transform {
    #[default]
    Identity,
    Dct,
    Dwt,
    Cs,
}

/// Outcome of resolving a client supplied transform tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransform {
    pub transform: Transform,
    /// Set when a non-empty tag was not recognised and passthrough was used instead
    pub unrecognized: Option<String>,
}

impl Transform {
    /// Resolve a tag case-insensitively. Unknown tags fall back to passthrough.
    pub fn from_tag(tag: Option<&str>) -> ResolvedTransform {
        let Some(raw) = tag.map(str::trim).filter(|t| !t.is_empty()) else {
            return ResolvedTransform {
                transform: Transform::Identity,
                unrecognized: None,
            };
        };

        let transform = match raw.to_lowercase().as_str() {
            "dct" => Some(Transform::Dct),
            "dwt" => Some(Transform::Dwt),
            "cs" => Some(Transform::Cs),
            "none" => Some(Transform::Identity),
            _ => None,
        };

        match transform {
            Some(transform) => ResolvedTransform {
                transform,
                unrecognized: None,
            },
            None => ResolvedTransform {
                transform: Transform::Identity,
                unrecognized: Some(raw.to_string()),
            },
        }
    }

    pub fn apply(&self, row: &[f64]) -> Vec<f64> {
        match self {
            Transform::Identity => row.to_vec(),
            Transform::Dct => dct(row),
            Transform::Dwt => haar_approximation(row),
            Transform::Cs => compressive_sample(row),
        }
    }

    /// Apply the transform independently to each row of a batch
    pub fn apply_rows(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.apply(row)).collect()
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transform::Identity => "none",
            Transform::Dct => "DCT",
            Transform::Dwt => "DWT",
            Transform::Cs => "CS",
        };
        write!(f, "{}", name)
    }
}

/// Orthonormal DCT-II.
///
/// Computed from the FFT of the even-symmetric extension `[x, reverse(x)]`.
pub fn dct(row: &[f64]) -> Vec<f64> {
    let n = row.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex<f64>> = row
        .iter()
        .chain(row.iter().rev())
        .map(|&x| Complex::new(x, 0.0))
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(2 * n);
    fft.process(&mut buffer);

    let n_f = n as f64;
    let dc_norm = (1.0 / (4.0 * n_f)).sqrt();
    let ac_norm = (1.0 / (2.0 * n_f)).sqrt();

    (0..n)
        .map(|k| {
            let twiddle = Complex::from_polar(1.0, -PI * k as f64 / (2.0 * n_f));
            let raw = (twiddle * buffer[k]).re;
            if k == 0 { raw * dc_norm } else { raw * ac_norm }
        })
        .collect()
}

/// Orthonormal DCT-III, the inverse of [`dct`].
pub fn inverse_dct(coefficients: &[f64]) -> Vec<f64> {
    let n = coefficients.len();
    if n == 0 {
        return Vec::new();
    }

    let n_f = n as f64;
    let dc_weight = 1.0 / n_f.sqrt();
    let ac_weight = (2.0 / n_f).sqrt();

    (0..n)
        .map(|i| {
            let mut acc = coefficients[0] * dc_weight;
            for (k, &c) in coefficients.iter().enumerate().skip(1) {
                acc += ac_weight * c * (PI * k as f64 * (2 * i + 1) as f64 / (2.0 * n_f)).cos();
            }
            acc
        })
        .collect()
}

/// Single level Haar low-pass coefficients, zero padded back to the input length.
///
/// Odd lengths use symmetric extension, so the last pair is `(x[n-1], x[n-1])`.
pub fn haar_approximation(row: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = row
        .chunks(2)
        .map(|pair| {
            let second = pair.get(1).copied().unwrap_or(pair[0]);
            (pair[0] + second) * FRAC_1_SQRT_2
        })
        .collect();
    out.resize(row.len(), 0.0);
    out
}

/// Keep every second sample starting at index 0, zero padded back to the input length.
pub fn compressive_sample(row: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = row.iter().step_by(2).copied().collect();
    out.resize(row.len(), 0.0);
    out
}
