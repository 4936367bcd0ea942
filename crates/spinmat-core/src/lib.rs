//! Spatial-null corrected pairwise comparison of cortical brain maps.
//!
//! Maps are brought onto one shared surface ([`registry`]), each receives an
//! ensemble of spin surrogates ([`nulls`]), and every unordered pair is
//! correlated and tested against the first map's surrogates ([`compare`],
//! [`pipeline`]). Results land in upper-triangular matrices ([`matrix`]) and
//! are written by [`output`].

pub mod compare;
pub mod config;
pub mod error;
pub mod kdtree;
pub mod map;
pub mod matrix;
mod maybe_rayon;
pub mod nan;
pub mod nulls;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod sphere;
pub mod stats;
pub mod surface;
pub mod transforms;
pub mod volume;

pub use compare::{CompareOptions, PairResult};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use map::{BrainMap, MapKey};
pub use matrix::{NullRow, NullTable, ResultMatrices, UpperTriangle};
pub use nulls::{NullEnsemble, NullGenerator, SeedSequence, SpinNulls};
pub use output::OutputSet;
pub use pipeline::run;
pub use registry::{Exclusion, RawMap, Registry};
pub use surface::{HemiPair, Hemisphere, Surface, SurfaceSpec};
pub use transforms::{Atlas, NativeData, NativeSpace, SpaceTransforms};
