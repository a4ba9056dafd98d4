use std::collections::BTreeMap;

use serde::Serialize;

use crate::notebook::Notebook;
use crate::report::SpotRow;
use crate::simd;
use crate::utils::stats::median;
use crate::utils::system::software_version;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSummary {
    pub n_spots: usize,
    pub n_pass: usize,
    pub score_median: f32,
    /// Passing spots per gene; genes without spots are listed with zero.
    pub gene_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryData {
    pub tool: String,
    pub version: String,
    pub notebook_version: String,
    pub simd_backend: String,
    pub n_genes: usize,
    pub ref_spots: MethodSummary,
    pub omp_spots: MethodSummary,
}

fn method_summary(gene_names: &[String], n_spots: usize, rows: &[SpotRow]) -> MethodSummary {
    let mut gene_counts: BTreeMap<String, usize> =
        gene_names.iter().map(|g| (g.clone(), 0)).collect();
    for row in rows {
        *gene_counts.entry(row.gene.clone()).or_default() += 1;
    }
    let scores: Vec<f32> = rows.iter().map(|r| r.score).collect();
    MethodSummary {
        n_spots,
        n_pass: rows.len(),
        score_median: if scores.is_empty() { 0.0 } else { median(&scores) },
        gene_counts,
    }
}

pub fn build_summary(
    nb: &Notebook,
    gene_names: &[String],
    n_ref: usize,
    ref_rows: &[SpotRow],
    n_omp: usize,
    omp_rows: &[SpotRow],
) -> SummaryData {
    SummaryData {
        tool: env!("CARGO_PKG_NAME").to_string(),
        version: software_version().to_string(),
        notebook_version: nb.version().to_string(),
        simd_backend: simd::backend_name().to_string(),
        n_genes: gene_names.len(),
        ref_spots: method_summary(gene_names, n_ref, ref_rows),
        omp_spots: method_summary(gene_names, n_omp, omp_rows),
    }
}

pub fn render_summary_json(data: &SummaryData) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(data)?;
    out.push('\n');
    Ok(out)
}
