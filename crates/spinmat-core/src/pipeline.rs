//! Pipeline orchestrator: nulls per map, then every unordered pair.
//!
//! Order of work:
//!   1. Validate configuration and registry
//!   2. Null ensemble for every map (seed `base + i + 1`)
//!   3. Compare each pair `(i, j)`, `i < j`, against map `i`'s ensemble
//!   4. Fill matrices and null table in traversal order
//!
//! Nothing is returned unless every step succeeds.

use tracing::{debug, info};

use crate::compare::{compare, CompareOptions, PairResult};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::matrix::{n_pairs, NullRow, NullTable, ResultMatrices, UpperTriangle};
use crate::maybe_rayon::*;
use crate::nulls::{NullEnsemble, NullGenerator, SeedSequence};
use crate::registry::Registry;

// ── Traversal ────────────────────────────────────────────────────────────────

/// Strict upper triangle, row-major: (0,1), (0,2), …, (0,n-1), (1,2), …
pub fn pair_indices(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n.saturating_sub(1)).flat_map(move |i| (i + 1..n).map(move |j| (i, j)))
}

// ── Stage 2: nulls ───────────────────────────────────────────────────────────

/// One ensemble per registered map, in registry order.
pub fn generate_nulls<G: NullGenerator + ?Sized>(
    registry: &Registry,
    generator: &G,
    n_perm: usize,
    base_seed: u64,
) -> Result<Vec<NullEnsemble>> {
    let maps = registry.maps();
    let seeds: Vec<u64> = SeedSequence::new(base_seed).take(maps.len()).collect();

    (0..maps.len())
        .into_par_iter()
        .map(|i| {
            info!("Generating spatial nulls for {}...", maps[i].key);
            generator.generate(&maps[i], n_perm, seeds[i])
        })
        .collect()
}

// ── Stage 3 + 4: pairs ───────────────────────────────────────────────────────

/// Compare every pair and assemble the result set.
pub fn assemble(
    registry: &Registry,
    ensembles: &[NullEnsemble],
    n_perm: usize,
    opts: &CompareOptions,
) -> Result<ResultMatrices> {
    let maps = registry.maps();
    let n = maps.len();
    if ensembles.len() != n {
        return Err(Error::config(format!(
            "{} null ensembles for {n} maps",
            ensembles.len()
        )));
    }
    if let Some(e) = ensembles.iter().find(|e| e.n_perm() != n_perm) {
        return Err(Error::config(format!(
            "null ensemble has {} surrogates, expected {n_perm}",
            e.n_perm()
        )));
    }

    let pairs: Vec<(usize, usize)> = pair_indices(n).collect();
    let results: Vec<PairResult> = pairs
        .clone()
        .into_par_iter()
        .map(|(i, j)| -> Result<PairResult> {
            if j == i + 1 {
                info!("Computing spatial correlations with {}...", maps[i].key);
            }
            let res = compare(&maps[i], &ensembles[i], &maps[j], opts)?;
            debug!(i, j, r = res.r, p = res.p, "pair done");
            Ok(res)
        })
        .collect::<Result<_>>()?;

    // Single writer: each pair owns one cell per matrix and one table row.
    let mut correlations = UpperTriangle::new(n);
    let mut p_values = UpperTriangle::new(n);
    let mut null_table = NullTable::with_capacity(n_perm, n_pairs(n));
    for ((i, j), res) in pairs.into_iter().zip(results) {
        correlations.set(i, j, res.r);
        p_values.set(i, j, res.p);
        null_table.rows.push(NullRow { row: i + 1, col: j + 1, values: res.nulls });
    }

    Ok(ResultMatrices {
        labels: registry.keys().cloned().collect(),
        correlations,
        p_values,
        null_table,
    })
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// Run the full comparison for `registry` with `config`.
pub fn run<G: NullGenerator + ?Sized>(
    registry: &Registry,
    generator: &G,
    config: &PipelineConfig,
) -> Result<ResultMatrices> {
    // ── 1. Validation ───────────────────────────────────────────────────────
    config.validate()?;
    if *registry.spec() != config.surface_spec() {
        return Err(Error::config(format!(
            "registry is on {}, configuration asks for {}",
            registry.spec().prefix(),
            config.surface_spec().prefix()
        )));
    }
    if registry.len() < 2 {
        return Err(Error::config(format!(
            "need at least two maps to compare, registry has {}",
            registry.len()
        )));
    }

    // ── 2. Nulls ────────────────────────────────────────────────────────────
    let ensembles = generate_nulls(registry, generator, config.n_perm, config.seed)?;

    // ── 3-4. Pairs ──────────────────────────────────────────────────────────
    let results = assemble(registry, &ensembles, config.n_perm, &config.compare_options())?;
    info!(
        "Compared {} pairs of {} maps with {} spins each",
        results.null_table.rows.len(),
        registry.len(),
        config.n_perm
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{BrainMap, MapKey};
    use crate::nulls::SpinNulls;
    use crate::registry::RawMap;
    use crate::sphere::Vec3;
    use crate::surface::{Surface, SurfaceSpec};
    use crate::transforms::{Atlas, NativeData};

    const N_VERT: usize = 120;

    fn surface() -> Surface {
        Surface::fibonacci(N_VERT)
    }

    fn map(surface: &Surface, source: &str, f: impl Fn(Vec3) -> f64) -> BrainMap {
        BrainMap::new(
            MapKey::new(source, "d", "fsLR", "32k"),
            surface.sphere.left.iter().map(|&p| f(p)).collect(),
            surface.sphere.right.iter().map(|&p| f(p)).collect(),
        )
    }

    fn three_maps(surface: &Surface) -> Registry {
        let maps = vec![
            map(surface, "a", |p| 2.0 + p.z),
            map(surface, "b", |p| 2.0 + p.z + 0.4 * p.x),
            map(surface, "c", |p| 2.0 + p.y * p.x),
        ];
        Registry::from_maps(SurfaceSpec::new("fsLR", "32k"), maps).unwrap()
    }

    fn config(n_perm: usize) -> PipelineConfig {
        PipelineConfig { n_perm, ..Default::default() }
    }

    /// Spin generator that refuses one named map.
    struct FailOn {
        inner: SpinNulls,
        source: &'static str,
    }

    impl NullGenerator for FailOn {
        fn generate(&self, map: &BrainMap, n_perm: usize, seed: u64) -> Result<NullEnsemble> {
            if map.key.source == self.source {
                return Err(Error::GeometryMismatch {
                    map: map.key.to_string(),
                    hemisphere: crate::surface::Hemisphere::Left,
                    expected: map.n_vertices(crate::surface::Hemisphere::Left) + 1,
                    got: map.n_vertices(crate::surface::Hemisphere::Left),
                });
            }
            self.inner.generate(map, n_perm, seed)
        }
    }

    #[test]
    fn traversal_order() {
        assert_eq!(pair_indices(3).collect::<Vec<_>>(), vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(pair_indices(1).count(), 0);
        assert_eq!(pair_indices(0).count(), 0);
        assert_eq!(pair_indices(7).count(), n_pairs(7));
    }

    #[test]
    fn three_maps_ten_spins() {
        let s = surface();
        let reg = three_maps(&s);
        let res = run(&reg, &SpinNulls::new(&s), &config(10)).unwrap();

        let defined: Vec<(usize, usize)> = res.correlations.defined().map(|(i, j, _)| (i, j)).collect();
        assert_eq!(defined, vec![(0, 1), (0, 2), (1, 2)]);
        let defined_p: Vec<(usize, usize)> = res.p_values.defined().map(|(i, j, _)| (i, j)).collect();
        assert_eq!(defined_p, defined);

        assert_eq!(res.null_table.rows.len(), 3);
        assert_eq!(res.null_table.n_columns(), 12);
        let order: Vec<(usize, usize)> = res.null_table.rows.iter().map(|r| (r.row, r.col)).collect();
        assert_eq!(order, vec![(1, 2), (1, 3), (2, 3)]);
        for row in &res.null_table.rows {
            assert_eq!(row.values.len(), 10);
            assert!(row.values.iter().all(|v| v.is_finite() && (-1.0..=1.0).contains(v)));
        }
        assert_eq!(res.labels.len(), 3);
    }

    #[test]
    fn undefined_cells_everywhere_else() {
        let s = surface();
        let res = run(&three_maps(&s), &SpinNulls::new(&s), &config(5)).unwrap();
        for m in [&res.correlations, &res.p_values] {
            for r in 0..3 {
                for c in 0..=r {
                    assert_eq!(m.get(r, c), None, "cell ({r}, {c}) should be undefined");
                }
            }
        }
    }

    #[test]
    fn runs_are_bit_identical() {
        let s = surface();
        let reg = three_maps(&s);
        let gen = SpinNulls::new(&s);
        let a = run(&reg, &gen, &config(8)).unwrap();
        let b = run(&reg, &gen, &config(8)).unwrap();
        assert_eq!(a, b);
        for ((_, _, x), (_, _, y)) in a.correlations.defined().zip(b.correlations.defined()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn seeds_are_per_map() {
        let s = surface();
        let reg = three_maps(&s);
        let gen = SpinNulls::new(&s);
        let base = generate_nulls(&reg, &gen, 6, 1234).unwrap();
        // Map 1 with its own seed reproduces; a different seed for map 0 leaves map 1 alone.
        let solo = gen.generate(reg.get(1).unwrap(), 6, SeedSequence::seed_for(1234, 1)).unwrap();
        assert_eq!(base[1], solo);
        let shifted_first = gen.generate(reg.get(0).unwrap(), 6, 9999).unwrap();
        assert_ne!(base[0], shifted_first);
    }

    #[test]
    fn correlation_matches_direct_comparison() {
        let s = surface();
        let reg = three_maps(&s);
        let res = run(&reg, &SpinNulls::new(&s), &config(4)).unwrap();
        let direct = crate::compare::correlate(
            reg.get(0).unwrap(),
            reg.get(2).unwrap(),
            &CompareOptions::default(),
        )
        .unwrap();
        assert_eq!(res.correlations.get(0, 2), Some(direct));
    }

    #[test]
    fn partial_map_never_reaches_output() {
        let s = surface();
        let atlas = Atlas::new(SurfaceSpec::new("fsLR", "32k"), s.clone());
        let full = |source: &str, k: f64| RawMap {
            key: MapKey::new(source, "d", "fsLR", "32k"),
            data: NativeData::Surface {
                left: Some(s.sphere.left.iter().map(|p| 2.0 + k * p.z + p.x).collect()),
                right: Some(s.sphere.right.iter().map(|p| 2.0 + k * p.z + p.x).collect()),
            },
        };
        let partial = RawMap {
            key: MapKey::new("hill2010", "evoexp", "fsLR", "164k"),
            data: NativeData::Surface { left: None, right: Some(vec![1.0; N_VERT]) },
        };
        let raw = vec![full("a", 1.0), partial, full("b", -1.0), full("c", 0.5)];
        let (reg, excl) = Registry::build(raw, &atlas, &atlas.spec).unwrap();
        assert_eq!(excl.len(), 1);

        let res = run(&reg, &SpinNulls::new(&s), &config(3)).unwrap();
        assert_eq!(res.labels.len(), 3);
        assert!(res.labels.iter().all(|k| k.source != "hill2010"));
        assert_eq!(res.correlations.n(), 3);
        assert!(res.null_table.rows.iter().all(|r| r.row <= 3 && r.col <= 3));
    }

    #[test]
    fn generator_failure_aborts_run() {
        let s = surface();
        let gen = FailOn { inner: SpinNulls::new(&s), source: "b" };
        let err = run(&three_maps(&s), &gen, &config(3)).unwrap_err();
        assert!(matches!(err, Error::GeometryMismatch { .. }));
    }

    #[test]
    fn single_map_is_configuration_error() {
        let s = surface();
        let reg = Registry::from_maps(SurfaceSpec::new("fsLR", "32k"), vec![map(&s, "a", |p| p.z)]).unwrap();
        assert!(matches!(
            run(&reg, &SpinNulls::new(&s), &config(3)),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn invalid_permutation_count_fails_first() {
        let s = surface();
        let gen = FailOn { inner: SpinNulls::new(&s), source: "a" };
        let err = run(&three_maps(&s), &gen, &config(0)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn assemble_rejects_missing_ensembles() {
        let s = surface();
        let reg = three_maps(&s);
        let gen = SpinNulls::new(&s);
        let mut ens = generate_nulls(&reg, &gen, 3, 1).unwrap();
        ens.pop();
        assert!(assemble(&reg, &ens, 3, &CompareOptions::default()).is_err());
    }

    /// 20 maps × 100 spins on a 2k-vertex surface (release builds only).
    #[cfg(not(debug_assertions))]
    #[test]
    fn twenty_maps_within_budget() {
        let s = Surface::fibonacci(2_000);
        let maps = (0..20)
            .map(|k| map(&s, &format!("m{k}"), move |p| 3.0 + (k as f64 * 0.3 * p.x).sin() + p.z))
            .collect();
        let reg = Registry::from_maps(SurfaceSpec::new("fsLR", "32k"), maps).unwrap();
        let t = std::time::Instant::now();
        let res = run(&reg, &SpinNulls::new(&s), &config(100)).unwrap();
        let ms = t.elapsed().as_millis();
        assert_eq!(res.null_table.rows.len(), 190);
        assert!(ms < 20_000, "20-map run took {ms} ms");
    }
}
