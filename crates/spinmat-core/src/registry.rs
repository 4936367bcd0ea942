//! Ordered, deduplicated collection of maps on the shared surface.
//!
//! Maps covering only one hemisphere cannot be compared against whole-brain
//! maps and are dropped here. Every drop is reported back as an
//! [`Exclusion`] and logged; nothing leaves the registry silently.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::map::{BrainMap, MapKey};
use crate::surface::{Hemisphere, SurfaceSpec};
use crate::transforms::{resample, NativeData, NativeSpace, SpaceTransforms};

/// A map as acquired, before resampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMap {
    #[serde(flatten)]
    pub key: MapKey,
    pub data: NativeData,
}

/// Why a raw map is absent from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Surface data for one hemisphere only.
    PartialGeometry { key: MapKey, missing: Hemisphere },
    /// Same key as an earlier map; the first occurrence is kept.
    Duplicate { key: MapKey },
}

impl Exclusion {
    pub fn key(&self) -> &MapKey {
        match self {
            Exclusion::PartialGeometry { key, .. } | Exclusion::Duplicate { key } => key,
        }
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::PartialGeometry { key, missing } => {
                write!(f, "{key}: no {missing} hemisphere data, excluded from comparison")
            }
            Exclusion::Duplicate { key } => write!(f, "{key}: duplicate key, later copy dropped"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    spec: SurfaceSpec,
    maps: Vec<BrainMap>,
}

impl Registry {
    /// Resample `raw` onto `target`, keeping input order.
    ///
    /// All native space names are parsed before any resampling starts, so an
    /// unsupported space fails the build up front.
    pub fn build<T: SpaceTransforms + ?Sized>(
        raw: Vec<RawMap>,
        transforms: &T,
        target: &SurfaceSpec,
    ) -> Result<(Self, Vec<Exclusion>)> {
        let spaces = raw
            .iter()
            .map(|m| m.key.space.parse::<NativeSpace>())
            .collect::<Result<Vec<_>>>()?;

        info!("Converting {} maps to {}...", raw.len(), target.prefix());

        let mut exclusions = Vec::new();
        let mut seen = HashSet::new();
        let mut maps = Vec::with_capacity(raw.len());

        for (m, space) in raw.into_iter().zip(spaces) {
            if let Some(missing) = m.data.missing_hemisphere() {
                let excl = Exclusion::PartialGeometry { key: m.key, missing };
                warn!("{excl}");
                exclusions.push(excl);
                continue;
            }
            if !seen.insert(m.key.clone()) {
                let excl = Exclusion::Duplicate { key: m.key };
                warn!("{excl}");
                exclusions.push(excl);
                continue;
            }
            let data = resample(transforms, space, &m.key, &m.data, target)?;
            maps.push(BrainMap { key: m.key, data });
        }

        let registry = Self::from_maps(target.clone(), maps)?;
        Ok((registry, exclusions))
    }

    /// Wrap maps that are already on `spec`. Keys must be unique and every
    /// map must have the same per-hemisphere vertex counts.
    pub fn from_maps(spec: SurfaceSpec, maps: Vec<BrainMap>) -> Result<Self> {
        let mut seen = HashSet::new();
        for m in &maps {
            if !seen.insert(&m.key) {
                return Err(Error::config(format!("duplicate map key {}", m.key)));
            }
        }
        if let Some(first) = maps.first() {
            for m in &maps[1..] {
                for hemi in Hemisphere::BOTH {
                    if m.n_vertices(hemi) != first.n_vertices(hemi) {
                        return Err(Error::config(format!(
                            "{} has {} {hemi} vertices, {} has {}: maps are not on one surface",
                            m.key,
                            m.n_vertices(hemi),
                            first.key,
                            first.n_vertices(hemi)
                        )));
                    }
                }
            }
        }
        Ok(Self { spec, maps })
    }

    pub fn spec(&self) -> &SurfaceSpec {
        &self.spec
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BrainMap> {
        self.maps.get(index)
    }

    pub fn maps(&self) -> &[BrainMap] {
        &self.maps
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.maps.iter().map(|m| &m.key)
    }
}
