//! Resampling of native-space data onto the shared surface.
//!
//! The set of native spaces is closed. Each variant of [`NativeSpace`] maps to
//! exactly one method of [`SpaceTransforms`], and [`resample`] dispatches with
//! an exhaustive `match`, so adding a space without a strategy fails to build.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::kdtree::KdTree;
use crate::map::MapKey;
use crate::nan::opt_null_as_nan_vec;
use crate::sphere::Vec3;
use crate::surface::{HemiPair, Hemisphere, Surface, SurfaceSpec};
use crate::volume::Volume;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeSpace {
    #[serde(rename = "MNI152")]
    Mni152,
    #[serde(rename = "civet")]
    Civet,
    #[serde(rename = "fsLR")]
    FsLr,
    #[serde(rename = "fsaverage")]
    FsAverage,
}

impl NativeSpace {
    pub const ALL: [NativeSpace; 4] = [
        NativeSpace::Mni152,
        NativeSpace::Civet,
        NativeSpace::FsLr,
        NativeSpace::FsAverage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NativeSpace::Mni152 => "MNI152",
            NativeSpace::Civet => "civet",
            NativeSpace::FsLr => "fsLR",
            NativeSpace::FsAverage => "fsaverage",
        }
    }
}

impl fmt::Display for NativeSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NativeSpace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NativeSpace::ALL
            .into_iter()
            .find(|space| space.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::config(format!(
                    "unsupported native space '{s}' (supported: MNI152, civet, fsLR, fsaverage)"
                ))
            })
    }
}

/// Raw data as acquired in its native space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeData {
    /// Per-vertex values. A hemisphere without data is `None`.
    Surface {
        #[serde(default, deserialize_with = "opt_null_as_nan_vec")]
        left: Option<Vec<f64>>,
        #[serde(default, deserialize_with = "opt_null_as_nan_vec")]
        right: Option<Vec<f64>>,
    },
    Volume(Volume),
}

impl NativeData {
    /// The first hemisphere with no data, if any. Volumes always cover both.
    pub fn missing_hemisphere(&self) -> Option<Hemisphere> {
        match self {
            NativeData::Surface { left: None, .. } => Some(Hemisphere::Left),
            NativeData::Surface { right: None, .. } => Some(Hemisphere::Right),
            _ => None,
        }
    }
}

/// One resampling strategy per native space.
pub trait SpaceTransforms {
    fn mni152_to_surface(&self, key: &MapKey, volume: &Volume, target: &SurfaceSpec)
        -> Result<HemiPair<Vec<f64>>>;

    fn civet_to_surface(&self, key: &MapKey, data: HemiPair<&[f64]>, target: &SurfaceSpec)
        -> Result<HemiPair<Vec<f64>>>;

    fn fslr_to_surface(&self, key: &MapKey, data: HemiPair<&[f64]>, target: &SurfaceSpec)
        -> Result<HemiPair<Vec<f64>>>;

    fn fsaverage_to_surface(&self, key: &MapKey, data: HemiPair<&[f64]>, target: &SurfaceSpec)
        -> Result<HemiPair<Vec<f64>>>;
}

/// Resample `data`, declared to be in `space`, onto `target`.
///
/// Surface spaces need both hemispheres; partial maps must be filtered out
/// before this point.
pub fn resample<T: SpaceTransforms + ?Sized>(
    transforms: &T,
    space: NativeSpace,
    key: &MapKey,
    data: &NativeData,
    target: &SurfaceSpec,
) -> Result<HemiPair<Vec<f64>>> {
    debug!(map = %key, %space, "resampling to {}", target.prefix());
    match space {
        NativeSpace::Mni152 => match data {
            NativeData::Volume(volume) => transforms.mni152_to_surface(key, volume, target),
            NativeData::Surface { .. } => Err(Error::config(format!(
                "{key}: MNI152 maps must carry volumetric data"
            ))),
        },
        NativeSpace::Civet => transforms.civet_to_surface(key, surface_hemis(key, space, data)?, target),
        NativeSpace::FsLr => transforms.fslr_to_surface(key, surface_hemis(key, space, data)?, target),
        NativeSpace::FsAverage => {
            transforms.fsaverage_to_surface(key, surface_hemis(key, space, data)?, target)
        }
    }
}

fn surface_hemis<'a>(
    key: &MapKey,
    space: NativeSpace,
    data: &'a NativeData,
) -> Result<HemiPair<&'a [f64]>> {
    match data {
        NativeData::Surface { left: Some(l), right: Some(r) } => {
            Ok(HemiPair::new(l.as_slice(), r.as_slice()))
        }
        NativeData::Surface { .. } => Err(Error::config(format!(
            "{key}: partial-geometry map reached resampling"
        ))),
        NativeData::Volume(_) => Err(Error::config(format!(
            "{key}: {space} maps must carry surface data"
        ))),
    }
}

/// Reference sphere for one `(space, den)` combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeMesh {
    pub space: NativeSpace,
    pub den: String,
    pub surface: Surface,
}

/// Geometry needed to bring every supported native space onto one target
/// surface: the target mesh itself plus the native reference spheres.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atlas {
    pub spec: SurfaceSpec,
    pub target: Surface,
    #[serde(default)]
    pub native: Vec<NativeMesh>,
}

impl Atlas {
    pub fn new(spec: SurfaceSpec, target: Surface) -> Self {
        Self { spec, target, native: Vec::new() }
    }

    pub fn with_native(mut self, space: NativeSpace, den: impl Into<String>, surface: Surface) -> Self {
        self.native.push(NativeMesh { space, den: den.into(), surface });
        self
    }

    fn reference(&self, space: NativeSpace, den: &str) -> Result<&Surface> {
        self.native
            .iter()
            .find(|m| m.space == space && m.den == den)
            .map(|m| &m.surface)
            .ok_or_else(|| {
                Error::config(format!("no reference sphere registered for {space} {den}"))
            })
    }

    fn check_target(&self, target: &SurfaceSpec) -> Result<()> {
        if *target != self.spec {
            return Err(Error::config(format!(
                "atlas describes {}, requested {}",
                self.spec.prefix(),
                target.prefix()
            )));
        }
        Ok(())
    }

    /// Nearest-vertex resampling from the registered native sphere.
    fn nearest_vertex(
        &self,
        key: &MapKey,
        space: NativeSpace,
        data: HemiPair<&[f64]>,
    ) -> Result<HemiPair<Vec<f64>>> {
        let source = self.reference(space, &key.den)?;
        let mut out = HemiPair::new(Vec::new(), Vec::new());
        for hemi in Hemisphere::BOTH {
            let values = *data.get(hemi);
            let src_sphere = source.sphere.get(hemi);
            if values.len() != src_sphere.len() {
                return Err(Error::config(format!(
                    "{key}: {hemi} hemisphere has {} values, {space} {} sphere has {} vertices",
                    values.len(),
                    key.den,
                    src_sphere.len()
                )));
            }
            let tree = KdTree::build(src_sphere);
            let resampled: Vec<f64> = self
                .target
                .sphere
                .get(hemi)
                .iter()
                .map(|&v| tree.nearest(v).map_or(f64::NAN, |hit| values[hit.index]))
                .collect();
            match hemi {
                Hemisphere::Left => out.left = resampled,
                Hemisphere::Right => out.right = resampled,
            }
        }
        Ok(out)
    }
}

impl SpaceTransforms for Atlas {
    /// Trilinear sampling at the target midthickness vertices.
    fn mni152_to_surface(
        &self,
        key: &MapKey,
        volume: &Volume,
        target: &SurfaceSpec,
    ) -> Result<HemiPair<Vec<f64>>> {
        self.check_target(target)?;
        if !volume.is_consistent() {
            return Err(Error::config(format!(
                "{key}: volume data length {} does not match dims {:?}",
                volume.data.len(),
                volume.dims
            )));
        }
        let mid = self.target.midthickness.as_ref().ok_or_else(|| {
            Error::config(format!(
                "{key}: projecting MNI152 data needs midthickness coordinates for {}",
                target.prefix()
            ))
        })?;
        let project = |pts: &Vec<Vec3>| -> Vec<f64> {
            pts.iter().map(|&p| volume.sample(p).unwrap_or(f64::NAN)).collect()
        };
        Ok(HemiPair::new(project(&mid.left), project(&mid.right)))
    }

    fn civet_to_surface(
        &self,
        key: &MapKey,
        data: HemiPair<&[f64]>,
        target: &SurfaceSpec,
    ) -> Result<HemiPair<Vec<f64>>> {
        self.check_target(target)?;
        self.nearest_vertex(key, NativeSpace::Civet, data)
    }

    /// Identity at the target density, nearest-vertex otherwise.
    fn fslr_to_surface(
        &self,
        key: &MapKey,
        data: HemiPair<&[f64]>,
        target: &SurfaceSpec,
    ) -> Result<HemiPair<Vec<f64>>> {
        self.check_target(target)?;
        if target.atlas == NativeSpace::FsLr.name() && key.den == target.density {
            for hemi in Hemisphere::BOTH {
                let (got, expected) = (data.get(hemi).len(), self.target.n_vertices(hemi));
                if got != expected {
                    return Err(Error::config(format!(
                        "{key}: {hemi} hemisphere has {got} values, target surface has {expected}"
                    )));
                }
            }
            return Ok(HemiPair::new(data.left.to_vec(), data.right.to_vec()));
        }
        self.nearest_vertex(key, NativeSpace::FsLr, data)
    }

    fn fsaverage_to_surface(
        &self,
        key: &MapKey,
        data: HemiPair<&[f64]>,
        target: &SurfaceSpec,
    ) -> Result<HemiPair<Vec<f64>>> {
        self.check_target(target)?;
        self.nearest_vertex(key, NativeSpace::FsAverage, data)
    }
}
