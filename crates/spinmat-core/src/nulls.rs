//! Spatially-constrained null surrogates.
//!
//! A surrogate keeps the values of its parent map but moves them around the
//! sphere by a random rigid rotation, so spatial autocorrelation survives while
//! the specific layout is destroyed (Alexander-Bloch et al., 2018).

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::kdtree::KdTree;
use crate::map::BrainMap;
use crate::sphere::{Rotation, Vec3};
use crate::surface::{HemiPair, Hemisphere, Surface};

/// Per-map seeds derived from one base seed: the `i`-th map (0-based) gets
/// `base + i + 1`. Distinct for every map of a run.
#[derive(Debug, Clone)]
pub struct SeedSequence {
    current: u64,
}

impl SeedSequence {
    pub fn new(base: u64) -> Self {
        Self { current: base }
    }

    /// Seed of the map at `index` without walking the sequence.
    pub fn seed_for(base: u64, index: usize) -> u64 {
        base.wrapping_add(index as u64).wrapping_add(1)
    }
}

impl Iterator for SeedSequence {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        self.current = self.current.wrapping_add(1);
        Some(self.current)
    }
}

/// `P` surrogates of one map, each stored as left-then-right values.
#[derive(Debug, Clone, PartialEq)]
pub struct NullEnsemble {
    n_vertices: HemiPair<usize>,
    n_perm: usize,
    values: Vec<f64>,
}

impl NullEnsemble {
    /// Assemble from `n_perm` concatenated surrogates laid out back to back.
    pub fn from_flat(n_vertices: HemiPair<usize>, n_perm: usize, values: Vec<f64>) -> Result<Self> {
        let width = n_vertices.left + n_vertices.right;
        if values.len() != width * n_perm {
            return Err(Error::config(format!(
                "null ensemble holds {} values, expected {n_perm} surrogates of {width}",
                values.len()
            )));
        }
        Ok(Self { n_vertices, n_perm, values })
    }

    pub fn n_perm(&self) -> usize {
        self.n_perm
    }

    pub fn n_vertices(&self, hemi: Hemisphere) -> usize {
        *self.n_vertices.get(hemi)
    }

    fn width(&self) -> usize {
        self.n_vertices.left + self.n_vertices.right
    }

    /// Surrogate `k` (0-based), left hemisphere first. `None` past the last
    /// surrogate.
    pub fn surrogate(&self, k: usize) -> Option<&[f64]> {
        if k >= self.n_perm {
            return None;
        }
        let w = self.width();
        self.values.get(k * w..(k + 1) * w)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> + '_ {
        let w = self.width();
        (0..self.n_perm).map(move |k| &self.values[k * w..(k + 1) * w])
    }
}

/// Produces a [`NullEnsemble`] for a map. Implementations must be
/// deterministic in `(map, n_perm, seed)`.
pub trait NullGenerator: Sync {
    fn generate(&self, map: &BrainMap, n_perm: usize, seed: u64) -> Result<NullEnsemble>;
}

/// Rotation-based spin surrogates on a sphere mesh.
///
/// Each permutation draws one uniform random rotation `R`. The left hemisphere
/// is spun by `R`, the right by its mirror image across the midsagittal plane,
/// so homologous regions move coherently. Vertex `v` takes the value of the
/// original vertex nearest to `Rᵀ v`.
pub struct SpinNulls {
    sphere: HemiPair<Vec<Vec3>>,
    trees: HemiPair<KdTree>,
}

impl SpinNulls {
    pub fn new(surface: &Surface) -> Self {
        let sphere = surface.sphere.clone();
        let trees = HemiPair::new(KdTree::build(&sphere.left), KdTree::build(&sphere.right));
        Self { sphere, trees }
    }

    /// The rotation pairs (left, right) used for the first `n_perm` spins.
    pub fn rotations(n_perm: usize, seed: u64) -> Vec<HemiPair<Rotation>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n_perm)
            .map(|_| {
                let r = Rotation::random(&mut rng);
                HemiPair::new(r, r.mirrored())
            })
            .collect()
    }

    fn check_geometry(&self, map: &BrainMap) -> Result<()> {
        for hemi in Hemisphere::BOTH {
            let expected = self.sphere.get(hemi).len();
            let got = map.n_vertices(hemi);
            if expected == 0 || got != expected {
                return Err(Error::GeometryMismatch {
                    map: map.key.to_string(),
                    hemisphere: hemi,
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }

    fn spin_into(&self, hemi: Hemisphere, rotation: &Rotation, data: &[f64], out: &mut Vec<f64>) {
        let inverse = rotation.transpose();
        let tree = self.trees.get(hemi);
        for &v in self.sphere.get(hemi) {
            let value = tree.nearest(inverse.apply(v)).map_or(f64::NAN, |hit| data[hit.index]);
            out.push(value);
        }
    }
}

impl NullGenerator for SpinNulls {
    fn generate(&self, map: &BrainMap, n_perm: usize, seed: u64) -> Result<NullEnsemble> {
        self.check_geometry(map)?;
        let n_vertices = HemiPair::new(map.n_vertices(Hemisphere::Left), map.n_vertices(Hemisphere::Right));
        let mut values = Vec::with_capacity((n_vertices.left + n_vertices.right) * n_perm);
        for rotations in Self::rotations(n_perm, seed) {
            for hemi in Hemisphere::BOTH {
                self.spin_into(hemi, rotations.get(hemi), map.hemi(hemi), &mut values);
            }
        }
        NullEnsemble::from_flat(n_vertices, n_perm, values)
    }
}
