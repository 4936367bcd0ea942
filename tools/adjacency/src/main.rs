/// Adjacency tool: resamples a set of brain maps onto one atlas surface,
/// spins every map, and writes the pairwise correlation matrix, its spin-test
/// p-values, the map labels and the full null distributions.
///
/// Outputs (in --output):
///   {atlas}_{den}_adjacency_matrix.csv
///   {atlas}_{den}_pval_matrix.csv
///   {atlas}_{den}_annotation_labels.csv
///   {atlas}_{den}_null_distributions.csv
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use spinmat_core::output::OutputSet;
use spinmat_core::{run, Atlas, PipelineConfig, RawMap, Registry, SpinNulls};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "adjacency",
    about = "Spin-test corrected correlation matrix over a set of brain maps"
)]
struct Args {
    /// JSON manifest: array of maps with source, desc, space, den and data
    #[arg(long)]
    maps: PathBuf,

    /// JSON atlas: target surface plus native reference spheres
    #[arg(long)]
    atlas: PathBuf,

    /// Output directory (created if absent)
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Pipeline config JSON; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Spin surrogates per map
    #[arg(long)]
    n_perm: Option<usize>,

    /// Base random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Target surface density, e.g. 32k
    #[arg(long)]
    density: Option<String>,

    /// Keep exact zeros as valid vertex values
    #[arg(long)]
    keep_zeros: bool,

    /// Also write the full result set as one JSON document
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write every resampled map as JSON into this directory
    #[arg(long)]
    save_resampled: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(n) = args.n_perm {
        config.n_perm = n;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(den) = &args.density {
        config.density = den.clone();
    }
    if args.keep_zeros {
        config.ignore_zero = false;
    }
    config.validate()?;
    Ok(config)
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Load inputs, run the comparison, then write every output file in one
/// commit. Nothing is written unless the run succeeds.
fn execute(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let target = config.surface_spec();

    let atlas: Atlas = read_json(&args.atlas)?;
    if atlas.spec != target {
        bail!(
            "Atlas {} describes {}, run targets {}",
            args.atlas.display(),
            atlas.spec.prefix(),
            target.prefix()
        );
    }
    let raw: Vec<RawMap> = read_json(&args.maps)?;
    info!("Loaded {} maps from {}", raw.len(), args.maps.display());

    let (registry, exclusions) =
        Registry::build(raw, &atlas, &target).context("Failed to build map registry")?;
    if !exclusions.is_empty() {
        warn!("{} maps excluded", exclusions.len());
    }

    let generator = SpinNulls::new(&atlas.target);
    let results = run(&registry, &generator, &config)?;

    let mut out = OutputSet::new();
    if let Some(dir) = &args.save_resampled {
        out.add_resampled(dir, registry.maps())
            .with_context(|| format!("Failed to stage resampled maps in {}", dir.display()))?;
    }
    let paths = out
        .add_csv_set(&args.output, &target.prefix(), &results)
        .with_context(|| format!("Failed to stage results in {}", args.output.display()))?;
    if let Some(path) = &args.json {
        out.add_json(path, &results)
            .with_context(|| format!("Failed to stage {}", path.display()))?;
    }
    out.commit().context("Failed to commit output files")?;

    info!("Adjacency matrix: {}", paths.adjacency.display());
    if let Some(dir) = &args.save_resampled {
        info!("Resampled maps: {}", dir.display());
    }
    if let Some(path) = &args.json {
        info!("JSON results: {}", path.display());
    }
    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose)?;
    execute(&args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinmat_core::{Surface, SurfaceSpec};

    const N: usize = 40;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("adjacency-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["adjacency", "--maps", "maps.json", "--atlas", "atlas.json"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    /// Writes an fsLR 32k atlas and a manifest with the given maps into `dir`.
    fn write_inputs(dir: &Path, maps: serde_json::Value) -> (PathBuf, PathBuf) {
        let atlas = Atlas::new(SurfaceSpec::new("fsLR", "32k"), Surface::fibonacci(N));
        let atlas_path = dir.join("atlas.json");
        fs::write(&atlas_path, serde_json::to_string(&atlas).unwrap()).unwrap();
        let maps_path = dir.join("maps.json");
        fs::write(&maps_path, maps.to_string()).unwrap();
        (maps_path, atlas_path)
    }

    fn surface_map(source: &str, scale: f64) -> serde_json::Value {
        let s = Surface::fibonacci(N);
        let values = |pts: &Vec<spinmat_core::sphere::Vec3>| -> Vec<f64> {
            pts.iter().map(|p| 2.0 + scale * p.z + p.x).collect()
        };
        serde_json::json!({
            "source": source, "desc": "d", "space": "fsLR", "den": "32k",
            "data": {"surface": {"left": values(&s.sphere.left), "right": values(&s.sphere.right)}}
        })
    }

    fn run_args(maps: &Path, atlas: &Path, out: &Path, resampled: &Path, json: &Path) -> Args {
        Args::parse_from([
            "adjacency",
            "--maps", maps.to_str().unwrap(),
            "--atlas", atlas.to_str().unwrap(),
            "--output", out.to_str().unwrap(),
            "--save-resampled", resampled.to_str().unwrap(),
            "--json", json.to_str().unwrap(),
            "--n-perm", "5",
        ])
    }

    #[test]
    fn defaults_without_config_file() {
        let c = load_config(&args(&[])).unwrap();
        assert_eq!(c, PipelineConfig::default());
    }

    #[test]
    fn flags_override_defaults() {
        let c = load_config(&args(&["--n-perm", "50", "--seed", "9", "--keep-zeros"])).unwrap();
        assert_eq!(c.n_perm, 50);
        assert_eq!(c.seed, 9);
        assert!(!c.ignore_zero);
        assert_eq!(c.density, "32k");
    }

    #[test]
    fn flags_override_config_file() {
        let dir = scratch_dir("config");
        let path = dir.join("config.json");
        fs::write(&path, r#"{"n_perm": 20, "seed": 7, "density": "10k"}"#).unwrap();
        let c = load_config(&args(&["--config", path.to_str().unwrap(), "--n-perm", "30"])).unwrap();
        assert_eq!(c.n_perm, 30);
        assert_eq!(c.seed, 7);
        assert_eq!(c.density, "10k");
        assert!(c.ignore_zero);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn zero_permutations_rejected() {
        assert!(load_config(&args(&["--n-perm", "0"])).is_err());
    }

    #[test]
    fn successful_run_writes_every_output() {
        let dir = scratch_dir("ok");
        let maps = serde_json::json!([surface_map("a", 1.0), surface_map("b", -1.0)]);
        let (maps_path, atlas_path) = write_inputs(&dir, maps);
        let (out, resampled, json) = (dir.join("out"), dir.join("resampled"), dir.join("r.json"));
        execute(&run_args(&maps_path, &atlas_path, &out, &resampled, &json)).unwrap();

        assert!(out.join("fsLR_32k_adjacency_matrix.csv").is_file());
        assert!(out.join("fsLR_32k_null_distributions.csv").is_file());
        assert!(resampled.join("a_d_fsLR_32k.json").is_file());
        assert!(json.is_file());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_run_writes_nothing() {
        let dir = scratch_dir("fail");
        // The partial map is excluded, leaving a single comparable map.
        let right = vec![1.0; N];
        let partial = serde_json::json!({
            "source": "hill2010", "desc": "evoexp", "space": "fsLR", "den": "32k",
            "data": {"surface": {"left": null, "right": right}}
        });
        let (maps_path, atlas_path) = write_inputs(&dir, serde_json::json!([surface_map("a", 1.0), partial]));
        let (out, resampled, json) = (dir.join("out"), dir.join("resampled"), dir.join("r.json"));

        assert!(execute(&run_args(&maps_path, &atlas_path, &out, &resampled, &json)).is_err());
        assert!(!out.exists());
        assert!(!resampled.exists());
        assert!(!json.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_json_stage_leaves_no_csv_files() {
        let dir = scratch_dir("json-fail");
        let maps = serde_json::json!([surface_map("a", 1.0), surface_map("b", -1.0)]);
        let (maps_path, atlas_path) = write_inputs(&dir, maps);
        let (out, resampled) = (dir.join("out"), dir.join("resampled"));
        let json = dir.join("no-such-dir").join("r.json");

        assert!(execute(&run_args(&maps_path, &atlas_path, &out, &resampled, &json)).is_err());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
        assert_eq!(fs::read_dir(&resampled).unwrap().count(), 0);
        let _ = fs::remove_dir_all(&dir);
    }
}
