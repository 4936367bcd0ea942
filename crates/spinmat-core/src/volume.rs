use serde::{Deserialize, Serialize};

use crate::nan::null_as_nan_vec;
use crate::sphere::Vec3;

/// A 3-D scalar volume on an axis-aligned voxel grid in MNI millimetres.
/// Storage is x-fastest: `data[(k * ny + j) * nx + i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Voxel values; NaN marks voxels without data.
    #[serde(deserialize_with = "null_as_nan_vec")]
    pub data: Vec<f64>,
    /// Grid size `[nx, ny, nz]`.
    pub dims: [usize; 3],
    /// World coordinate (mm) of voxel `(0, 0, 0)`.
    pub origin: [f64; 3],
    /// Voxel edge length (mm) along each axis.
    pub voxel_size: [f64; 3],
}

impl Volume {
    pub fn new(dims: [usize; 3], origin: [f64; 3], voxel_size: [f64; 3], fill: f64) -> Self {
        Self {
            data: vec![fill; dims[0] * dims[1] * dims[2]],
            dims,
            origin,
            voxel_size,
        }
    }

    /// `true` when `data` has exactly one value per voxel.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.dims[0] * self.dims[1] * self.dims[2]
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[(k * self.dims[1] + j) * self.dims[0] + i]
    }

    #[cfg(test)]
    pub fn set(&mut self, i: usize, j: usize, k: usize, val: f64) {
        let idx = (k * self.dims[1] + j) * self.dims[0] + i;
        self.data[idx] = val;
    }

    /// Sample at world position `p` (mm) with trilinear interpolation.
    /// Returns None if `p` is outside the grid.
    pub fn sample(&self, p: Vec3) -> Option<f64> {
        let mut base = [0usize; 3];
        let mut frac = [0f64; 3];
        for d in 0..3 {
            let f = (p.axis(d) - self.origin[d]) / self.voxel_size[d];
            let last = self.dims[d].checked_sub(1)? as f64;
            if !(0.0..=last).contains(&f) {
                return None;
            }
            let i0 = (f.floor() as usize).min(self.dims[d].saturating_sub(2));
            base[d] = i0;
            frac[d] = f - i0 as f64;
        }

        let idx = |d: usize, step: usize| (base[d] + step).min(self.dims[d] - 1);
        let mut v = 0.0;
        for (dk, wk) in [(0, 1.0 - frac[2]), (1, frac[2])] {
            for (dj, wj) in [(0, 1.0 - frac[1]), (1, frac[1])] {
                for (di, wi) in [(0, 1.0 - frac[0]), (1, frac[0])] {
                    let w = wi * wj * wk;
                    if w == 0.0 {
                        continue;
                    }
                    v += w * self.get(idx(0, di), idx(1, dj), idx(2, dk));
                }
            }
        }
        Some(v)
    }
}
