use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sphere::{fibonacci_sphere, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    Left,
    Right,
}

impl Hemisphere {
    pub const BOTH: [Hemisphere; 2] = [Hemisphere::Left, Hemisphere::Right];
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hemisphere::Left => "left",
            Hemisphere::Right => "right",
        })
    }
}

/// One value per hemisphere. Left always precedes right when the two are
/// concatenated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HemiPair<T> {
    pub left: T,
    pub right: T,
}

impl<T> HemiPair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn get(&self, hemi: Hemisphere) -> &T {
        match hemi {
            Hemisphere::Left => &self.left,
            Hemisphere::Right => &self.right,
        }
    }

    pub fn as_ref(&self) -> HemiPair<&T> {
        HemiPair { left: &self.left, right: &self.right }
    }

    pub fn map<U>(self, mut f: impl FnMut(Hemisphere, T) -> U) -> HemiPair<U> {
        HemiPair {
            left: f(Hemisphere::Left, self.left),
            right: f(Hemisphere::Right, self.right),
        }
    }
}

/// The shared target geometry every registered map lives on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSpec {
    /// Atlas name, e.g. `fsLR`.
    pub atlas: String,
    /// Resolution qualifier, e.g. `32k`.
    pub density: String,
}

impl SurfaceSpec {
    pub fn new(atlas: impl Into<String>, density: impl Into<String>) -> Self {
        Self { atlas: atlas.into(), density: density.into() }
    }

    /// File-name prefix for outputs on this surface, e.g. `fsLR_32k`.
    pub fn prefix(&self) -> String {
        format!("{}_{}", self.atlas, self.density)
    }
}

/// Vertex geometry of a surface mesh.
///
/// `sphere` holds unit-sphere coordinates per hemisphere and is the structural
/// reference for spin surrogates and nearest-vertex resampling. `midthickness`
/// holds the same vertices in MNI millimetres and is only needed to project
/// volumetric data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Surface {
    pub sphere: HemiPair<Vec<Vec3>>,
    #[serde(default)]
    pub midthickness: Option<HemiPair<Vec<Vec3>>>,
}

impl Surface {
    pub fn new(sphere: HemiPair<Vec<Vec3>>) -> Self {
        Self { sphere, midthickness: None }
    }

    /// Mirror-symmetric synthetic surface with `n` vertices per hemisphere:
    /// the right sphere is the left one reflected across x = 0.
    pub fn fibonacci(n: usize) -> Self {
        let left = fibonacci_sphere(n);
        let right = left.iter().map(|p| Vec3::new(-p.x, p.y, p.z)).collect();
        Self::new(HemiPair::new(left, right))
    }

    pub fn with_midthickness(mut self, midthickness: HemiPair<Vec<Vec3>>) -> Self {
        self.midthickness = Some(midthickness);
        self
    }

    pub fn n_vertices(&self, hemi: Hemisphere) -> usize {
        self.sphere.get(hemi).len()
    }
}
