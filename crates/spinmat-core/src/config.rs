use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compare::CompareOptions;
use crate::error::{Error, Result};
use crate::surface::SurfaceSpec;

/// Run parameters. Missing fields in a config file take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Surrogates per map. Default 1000.
    pub n_perm: usize,
    /// Base seed; map `i` uses `seed + i + 1`. Default 1234.
    pub seed: u64,
    /// Target atlas. Default `fsLR`.
    pub atlas: String,
    /// Target surface resolution. Default `32k`.
    pub density: String,
    /// Treat exact zeros as missing vertices. Default true.
    pub ignore_zero: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_perm: 1000,
            seed: 1234,
            atlas: "fsLR".into(),
            density: "32k".into(),
            ignore_zero: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_perm == 0 {
            return Err(Error::config("permutation count must be at least 1"));
        }
        if self.atlas.is_empty() || self.density.is_empty() {
            return Err(Error::config("target atlas and density must be set"));
        }
        Ok(())
    }

    pub fn surface_spec(&self) -> SurfaceSpec {
        SurfaceSpec::new(self.atlas.clone(), self.density.clone())
    }

    pub fn compare_options(&self) -> CompareOptions {
        CompareOptions { ignore_zero: self.ignore_zero }
    }
}
