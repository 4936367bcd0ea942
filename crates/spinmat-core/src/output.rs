//! Persistence of a finished run.
//!
//! Every file of a run goes through one [`OutputSet`]: it is first written
//! under a `.tmp` suffix, and only [`OutputSet::commit`] renames the whole set
//! into place. A failed write or rename leaves neither final files nor
//! `.tmp` files behind.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::map::{BrainMap, MapKey};
use crate::matrix::{NullTable, ResultMatrices, UpperTriangle};

/// Six decimals, `nan` for undefined cells.
fn fmt_cell(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.6}"),
        None => "nan".to_string(),
    }
}

pub fn write_matrix<W: Write>(w: &mut W, m: &UpperTriangle) -> io::Result<()> {
    for row in m.rows() {
        let line: Vec<String> = row.iter().map(|&v| fmt_cell(v)).collect();
        writeln!(w, "{}", line.join(","))?;
    }
    Ok(())
}

pub fn write_labels<W: Write>(w: &mut W, labels: &[MapKey]) -> io::Result<()> {
    for key in labels {
        writeln!(w, "{}", key.label())?;
    }
    Ok(())
}

/// `row,col,r_1,…,r_P` per pair; indices are 1-based integers.
pub fn write_null_table<W: Write>(w: &mut W, table: &NullTable) -> io::Result<()> {
    for row in &table.rows {
        write!(w, "{},{}", row.row, row.col)?;
        for v in &row.values {
            write!(w, ",{v:.6}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Output file paths for one run, named `{prefix}_{kind}.csv`.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub adjacency: PathBuf,
    pub pvals: PathBuf,
    pub labels: PathBuf,
    pub nulls: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: &Path, prefix: &str) -> Self {
        let file = |kind: &str| dir.join(format!("{prefix}_{kind}.csv"));
        Self {
            adjacency: file("adjacency_matrix"),
            pvals: file("pval_matrix"),
            labels: file("annotation_labels"),
            nulls: file("null_distributions"),
        }
    }
}

/// Files staged under `.tmp` names, waiting for one commit. Dropping the set
/// without committing removes everything staged so far.
#[derive(Debug, Default)]
pub struct OutputSet {
    pending: Vec<(PathBuf, PathBuf)>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files staged so far.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stage the four CSV outputs in `dir`.
    pub fn add_csv_set(&mut self, dir: &Path, prefix: &str, results: &ResultMatrices) -> Result<OutputPaths> {
        fs::create_dir_all(dir)?;
        let paths = OutputPaths::new(dir, prefix);
        self.stage(&paths.adjacency, |w| write_matrix(w, &results.correlations))?;
        self.stage(&paths.pvals, |w| write_matrix(w, &results.p_values))?;
        self.stage(&paths.labels, |w| write_labels(w, &results.labels))?;
        self.stage(&paths.nulls, |w| write_null_table(w, &results.null_table))?;
        Ok(paths)
    }

    /// Stage the whole result set as one JSON document.
    pub fn add_json(&mut self, path: &Path, results: &ResultMatrices) -> Result<()> {
        self.stage(path, |w| serde_json::to_writer(&mut *w, results).map_err(io::Error::from))
    }

    /// Stage one `{label}.json` per map with its left/right vectors on the
    /// shared surface. Returns the final paths.
    pub fn add_resampled(&mut self, dir: &Path, maps: &[BrainMap]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut paths = Vec::with_capacity(maps.len());
        for m in maps {
            let path = dir.join(format!("{}.json", m.key.label()));
            self.stage(&path, |w| serde_json::to_writer(&mut *w, m).map_err(io::Error::from))?;
            paths.push(path);
        }
        Ok(paths)
    }

    fn stage<F>(&mut self, path: &Path, f: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<fs::File>) -> io::Result<()>,
    {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        self.pending.push((tmp.clone(), path.to_path_buf()));

        let mut w = BufWriter::new(fs::File::create(&tmp)?);
        f(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Rename every staged file into place. If one rename fails, files
    /// already renamed are removed along with the remaining `.tmp` files.
    pub fn commit(mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        for (done, (tmp, dest)) in pending.iter().enumerate() {
            if let Err(err) = fs::rename(tmp, dest) {
                warn!("Renaming {} failed, rolling back {done} files", dest.display());
                for (_, dest) in &pending[..done] {
                    let _ = fs::remove_file(dest);
                }
                for (tmp, _) in &pending[done..] {
                    let _ = fs::remove_file(tmp);
                }
                return Err(err.into());
            }
        }
        info!("Committed {} output files", pending.len());
        Ok(())
    }
}

impl Drop for OutputSet {
    fn drop(&mut self) {
        for (tmp, _) in &self.pending {
            let _ = fs::remove_file(tmp);
        }
    }
}
