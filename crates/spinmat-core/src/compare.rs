//! Pairwise comparison of two maps against the first map's null ensemble.
//!
//! Only the first map's surrogates are used, so the p-value of `(A, B)` is in
//! general not the p-value of `(B, A)`. The real correlation is symmetric.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::map::BrainMap;
use crate::nulls::NullEnsemble;
use crate::stats::{pearson_r, permutation_p_value};
use crate::surface::Hemisphere;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompareOptions {
    /// Treat exact zeros as missing vertices.
    pub ignore_zero: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self { ignore_zero: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    /// Pearson r between the two real maps.
    pub r: f64,
    /// Spin-test p-value of `r` against `nulls`.
    pub p: f64,
    /// r between each surrogate of the first map and the real second map,
    /// in surrogate order.
    pub nulls: Vec<f64>,
}

/// Correlation of two maps over their concatenated hemispheres.
pub fn correlate(a: &BrainMap, b: &BrainMap, opts: &CompareOptions) -> Result<f64> {
    for hemi in Hemisphere::BOTH {
        check_lengths(&a.key.to_string(), a.n_vertices(hemi), b, hemi)?;
    }
    Ok(pearson_r(a.values().zip(b.values()), opts.ignore_zero))
}

/// Compare `a` with `b`, using `nulls_a` (surrogates of `a`) as the null.
pub fn compare(
    a: &BrainMap,
    nulls_a: &NullEnsemble,
    b: &BrainMap,
    opts: &CompareOptions,
) -> Result<PairResult> {
    let r = correlate(a, b, opts)?;

    let null_name = format!("nulls of {}", a.key);
    for hemi in Hemisphere::BOTH {
        check_lengths(&null_name, nulls_a.n_vertices(hemi), b, hemi)?;
    }

    let nulls: Vec<f64> = nulls_a
        .iter()
        .map(|s| pearson_r(s.iter().copied().zip(b.values()), opts.ignore_zero))
        .collect();
    let p = permutation_p_value(r, &nulls);

    Ok(PairResult { r, p, nulls })
}

fn check_lengths(a_name: &str, len_a: usize, b: &BrainMap, hemi: Hemisphere) -> Result<()> {
    let len_b = b.n_vertices(hemi);
    if len_a != len_b {
        return Err(Error::ShapeMismatch {
            a: a_name.to_string(),
            b: b.key.to_string(),
            hemisphere: hemi,
            len_a,
            len_b,
        });
    }
    Ok(())
}
