//! Map identity and hemisphere-split signals on the shared surface.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::surface::{HemiPair, Hemisphere};

/// Composite identity of a map: `(source, desc, space, den)`.
///
/// Ordering and equality are field-wise, so keys can be used to detect
/// duplicates and to label output rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapKey {
    pub source: String,
    pub desc: String,
    /// Declared native space name, e.g. `MNI152`, `fsaverage`.
    pub space: String,
    /// Resolution qualifier in the native space, e.g. `10k`, `2mm`.
    pub den: String,
}

impl MapKey {
    pub fn new(
        source: impl Into<String>,
        desc: impl Into<String>,
        space: impl Into<String>,
        den: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            desc: desc.into(),
            space: space.into(),
            den: den.into(),
        }
    }

    /// Fields joined with `_`, as written to the label file.
    pub fn label(&self) -> String {
        format!("{}_{}_{}_{}", self.source, self.desc, self.space, self.den)
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.source, self.desc, self.space, self.den)
    }
}

/// A map already resampled to the shared surface. Missing vertices are NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainMap {
    pub key: MapKey,
    pub data: HemiPair<Vec<f64>>,
}

impl BrainMap {
    pub fn new(key: MapKey, left: Vec<f64>, right: Vec<f64>) -> Self {
        Self { key, data: HemiPair::new(left, right) }
    }

    pub fn hemi(&self, hemi: Hemisphere) -> &[f64] {
        self.data.get(hemi)
    }

    pub fn n_vertices(&self, hemi: Hemisphere) -> usize {
        self.data.get(hemi).len()
    }

    pub fn len(&self) -> usize {
        self.data.left.len() + self.data.right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Left then right hemisphere values.
    pub fn values(&self) -> impl Iterator<Item = f64> + Clone + '_ {
        self.data.left.iter().chain(self.data.right.iter()).copied()
    }
}
