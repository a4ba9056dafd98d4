use serde::{Deserialize, Serialize};
use tracing::info;

use super::{PipelineError, StageContext};
use crate::config::ThresholdsConfig;
use crate::notebook::NotebookPage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsPage {
    pub score_ref: f32,
    pub score_omp: f32,
    pub intensity: f32,
    pub n_ref_pass: usize,
    pub n_omp_pass: usize,
}

/// Reference spots need both a score and an intensity above threshold.
pub fn ref_spot_passes(thresholds: &ThresholdsConfig, score: f32, intensity: f32) -> bool {
    score > thresholds.score_ref && intensity > thresholds.intensity
}

pub fn omp_spot_passes(thresholds: &ThresholdsConfig, score: f32) -> bool {
    score > thresholds.score_omp
}

pub fn run_stage9(ctx: &StageContext<'_>) -> Result<Vec<NotebookPage>, PipelineError> {
    let t = &ctx.config.thresholds;
    let ref_score: Vec<f32> = ctx.nb.get("call_spots", "gene_score")?;
    let ref_intensity: Vec<f32> = ctx.nb.get("call_spots", "intensity")?;
    let omp_scores: Vec<f32> = ctx.nb.get("omp", "scores")?;

    let n_ref_pass = ref_score
        .iter()
        .zip(&ref_intensity)
        .filter(|&(&s, &i)| ref_spot_passes(t, s, i))
        .count();
    let n_omp_pass = omp_scores.iter().filter(|&&s| omp_spot_passes(t, s)).count();
    info!(n_ref_pass, n_omp_pass, "applied thresholds");

    let mut page = NotebookPage::new("thresholds")?;
    page.set_all(&ThresholdsPage {
        score_ref: t.score_ref,
        score_omp: t.score_omp,
        intensity: t.intensity,
        n_ref_pass,
        n_omp_pass,
    })?;
    Ok(vec![page])
}
