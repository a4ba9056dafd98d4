//! Spot tables and run summary written after the last stage.

pub mod json;
pub mod text;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ThresholdsConfig;
use crate::model::ShapeError;
use crate::notebook::{Notebook, NotebookError};
use crate::pipeline::stage9_thresholds::{omp_spot_passes, ref_spot_passes};

pub use json::{build_summary, render_summary_json};
pub use text::write_spots_tsv;

pub const REF_SPOTS_FILE: &str = "ref_spots.tsv";
pub const OMP_SPOTS_FILE: &str = "omp_spots.tsv";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Notebook(#[from] NotebookError),
    #[error("failed to serialise summary: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spot of gene {gene} on tile {tile} but only {n} genes/tiles are known")]
    OutOfRange { gene: usize, tile: usize, n: usize },
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// One reported spot in global coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotRow {
    pub tile: usize,
    pub global_yxz: [f32; 3],
    pub gene: String,
    pub score: f32,
}

pub fn format_f32_6(v: f32) -> String {
    format!("{:.6}", v)
}

/// Spots passing `keep`, moved to global coordinates with the tile origins.
/// Every per-spot slice must be as long as `local_yxz`.
pub fn spot_rows(
    local_yxz: &[[i32; 3]],
    tile: &[usize],
    gene_no: &[usize],
    score: &[f32],
    keep: &[bool],
    tile_origin: &[Option<[f32; 3]>],
    gene_names: &[String],
) -> Result<Vec<SpotRow>, ReportError> {
    let n_spots = local_yxz.len();
    for (name, len) in [
        ("tile", tile.len()),
        ("gene_no", gene_no.len()),
        ("score", score.len()),
        ("keep", keep.len()),
    ] {
        if len != n_spots {
            return Err(ShapeError::new(name, vec![len], vec![n_spots]).into());
        }
    }
    let mut rows = Vec::new();
    for i in 0..n_spots {
        if !keep[i] {
            continue;
        }
        let (t, g) = (tile[i], gene_no[i]);
        let origin = tile_origin.get(t).copied().flatten();
        let (Some(origin), Some(gene)) = (origin, gene_names.get(g)) else {
            return Err(ReportError::OutOfRange {
                gene: g,
                tile: t,
                n: gene_names.len().min(tile_origin.len()),
            });
        };
        let p = local_yxz[i];
        rows.push(SpotRow {
            tile: t,
            global_yxz: [
                p[0] as f32 + origin[0],
                p[1] as f32 + origin[1],
                p[2] as f32 + origin[2],
            ],
            gene: gene.clone(),
            score: score[i],
        });
    }
    Ok(rows)
}

/// Writes the reference and OMP spot tables plus the summary into `out_dir`.
pub fn write_reports(nb: &Notebook, out_dir: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(out_dir).map_err(|source| ReportError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;
    let thresholds: ThresholdsConfig = {
        let page = nb.page("thresholds")?;
        ThresholdsConfig {
            score_ref: page.get("score_ref")?,
            score_omp: page.get("score_omp")?,
            intensity: page.get("intensity")?,
        }
    };
    let tile_origin: Vec<Option<[f32; 3]>> = nb.get("stitch", "tile_origin")?;
    let gene_names: Vec<String> = nb.get("call_spots", "gene_names")?;

    let ref_score: Vec<f32> = nb.get("call_spots", "gene_score")?;
    let ref_intensity: Vec<f32> = nb.get("call_spots", "intensity")?;
    let ref_keep: Vec<bool> = ref_score
        .iter()
        .zip(&ref_intensity)
        .map(|(&s, &i)| ref_spot_passes(&thresholds, s, i))
        .collect();
    let ref_rows = spot_rows(
        &nb.get::<Vec<[i32; 3]>>("ref_spots", "local_yxz")?,
        &nb.get::<Vec<usize>>("ref_spots", "tile")?,
        &nb.get::<Vec<usize>>("call_spots", "gene_no")?,
        &ref_score,
        &ref_keep,
        &tile_origin,
        &gene_names,
    )?;

    let omp_score: Vec<f32> = nb.get("omp", "scores")?;
    let omp_keep: Vec<bool> = omp_score
        .iter()
        .map(|&s| omp_spot_passes(&thresholds, s))
        .collect();
    let omp_rows = spot_rows(
        &nb.get::<Vec<[i32; 3]>>("omp", "local_yxz")?,
        &nb.get::<Vec<usize>>("omp", "tile")?,
        &nb.get::<Vec<usize>>("omp", "gene_no")?,
        &omp_score,
        &omp_keep,
        &tile_origin,
        &gene_names,
    )?;

    let io = |path: PathBuf| move |source| ReportError::Io { path, source };
    let ref_path = out_dir.join(REF_SPOTS_FILE);
    write_spots_tsv(&ref_path, &ref_rows).map_err(io(ref_path.clone()))?;
    let omp_path = out_dir.join(OMP_SPOTS_FILE);
    write_spots_tsv(&omp_path, &omp_rows).map_err(io(omp_path.clone()))?;

    let summary = build_summary(nb, &gene_names, ref_score.len(), &ref_rows, omp_score.len(), &omp_rows);
    let summary_path = out_dir.join(SUMMARY_FILE);
    fs::write(&summary_path, render_summary_json(&summary)?).map_err(io(summary_path.clone()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
