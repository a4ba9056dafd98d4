use crate::simd;

/// One unit-norm code per channel: ones in that channel in every round.
/// Each code is laid out `[round][channel]`.
pub fn background_codes(n_rounds: usize, n_channels: usize) -> Vec<Vec<f32>> {
    let value = 1.0 / (n_rounds as f32).sqrt();
    (0..n_channels)
        .map(|c| {
            let mut code = vec![0f32; n_rounds * n_channels];
            for r in 0..n_rounds {
                code[r * n_channels + c] = value;
            }
            code
        })
        .collect()
}

/// Projects `colour` onto each background code and removes it.
/// Returns one coefficient per code.
pub fn fit_background(colour: &mut [f32], codes: &[Vec<f32>]) -> Vec<f32> {
    let coefs: Vec<f32> = codes.iter().map(|b| simd::dot_f32(colour, b)).collect();
    for (code, &k) in codes.iter().zip(&coefs) {
        for (v, b) in colour.iter_mut().zip(code) {
            *v -= k * b;
        }
    }
    coefs
}
