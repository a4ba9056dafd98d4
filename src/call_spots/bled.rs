use super::CallSpotsError;
use crate::model::{BledCodes, BleedMatrix, GeneCodes, ShapeError};
use crate::simd;

/// Expected colour of every gene: `eff[g, r] * bleed[r, :, code[g, r]]`,
/// scaled to unit L2 norm per gene. A gene whose code is all zero stays zero.
pub fn get_bled_codes(
    gene_codes: &GeneCodes,
    bleed_matrix: &BleedMatrix,
    gene_efficiency: &[f32],
) -> Result<BledCodes, CallSpotsError> {
    let n_genes = gene_codes.n_genes();
    let (n_rounds, n_channels, n_dyes) = (
        bleed_matrix.n_rounds,
        bleed_matrix.n_channels,
        bleed_matrix.n_dyes,
    );
    if let Some(g) = gene_codes.codes.iter().position(|c| c.len() != n_rounds) {
        return Err(ShapeError::new(
            "gene_codes",
            vec![n_genes, gene_codes.codes[g].len()],
            vec![n_genes, n_rounds],
        )
        .into());
    }
    if gene_efficiency.len() != n_genes * n_rounds {
        return Err(ShapeError::new(
            "gene_efficiency",
            vec![gene_efficiency.len()],
            vec![n_genes, n_rounds],
        )
        .into());
    }
    for (g, code) in gene_codes.codes.iter().enumerate() {
        if let Some(r) = code.iter().position(|&d| d as usize >= n_dyes) {
            return Err(CallSpotsError::DyeOutOfRange {
                gene: g,
                round: r,
                dye: code[r] as usize,
                n_dyes,
            });
        }
    }

    let code_len = n_rounds * n_channels;
    let mut data = vec![0f32; n_genes * code_len];
    for (g, code) in gene_codes.codes.iter().enumerate() {
        let out = &mut data[g * code_len..(g + 1) * code_len];
        for (r, &dye) in code.iter().enumerate() {
            let eff = gene_efficiency[g * n_rounds + r];
            for c in 0..n_channels {
                out[r * n_channels + c] = eff * bleed_matrix.get(r, c, dye as usize);
            }
        }
        simd::normalise_l2(out);
    }
    Ok(BledCodes {
        n_genes,
        n_rounds,
        n_channels,
        data,
    })
}
