//! Reading registered intensities at anchor-frame positions.

use crate::input::InputError;
use crate::input::tile_bin::TileStack;
use crate::model::{Affine, Image3d, SpotColours, Transforms};
use crate::utils::linalg::scale_fit;
use crate::utils::stats::{argmax, mean, median, percentile};

/// Per-pixel `y`, `x` and `z` shifts taking the anchor frame to a round.
pub type Flow = [Image3d; 3];

/// Moves anchor-frame positions into a round/channel frame.
///
/// The flow shift at each position is subtracted first, then the affine is
/// applied and the result rounded half to even. The second vector flags
/// positions that land inside `tile_shape`.
pub fn apply_transform(
    yxz: &[[i32; 3]],
    flow: Option<&Flow>,
    affine: &Affine,
    tile_shape: [usize; 3],
) -> (Vec<[i32; 3]>, Vec<bool>) {
    let mut out = Vec::with_capacity(yxz.len());
    let mut in_range = Vec::with_capacity(yxz.len());
    for &p in yxz {
        let mut q = [p[0] as f32, p[1] as f32, p[2] as f32];
        if let Some(flow) = flow {
            for (i, f) in flow.iter().enumerate() {
                let shift = f
                    .get_checked(p[0] as i64, p[1] as i64, p[2] as i64)
                    .unwrap_or(0.0);
                q[i] -= shift;
            }
        }
        let t = affine.apply(q);
        let r = [
            t[0].round_ties_even() as i32,
            t[1].round_ties_even() as i32,
            t[2].round_ties_even() as i32,
        ];
        let inside = (0..3).all(|i| r[i] >= 0 && (r[i] as usize) < tile_shape[i]);
        out.push(r);
        in_range.push(inside);
    }
    (out, in_range)
}

/// Trilinear interpolation with zeros outside the volume.
pub fn sample_trilinear(image: &Image3d, p: [f32; 3]) -> f32 {
    let base = [p[0].floor(), p[1].floor(), p[2].floor()];
    let frac = [p[0] - base[0], p[1] - base[1], p[2] - base[2]];
    let (y0, x0, z0) = (base[0] as i64, base[1] as i64, base[2] as i64);
    let mut acc = 0f32;
    for dy in 0..2i64 {
        let wy = if dy == 0 { 1.0 - frac[0] } else { frac[0] };
        if wy == 0.0 {
            continue;
        }
        for dx in 0..2i64 {
            let wx = if dx == 0 { 1.0 - frac[1] } else { frac[1] };
            if wx == 0.0 {
                continue;
            }
            for dz in 0..2i64 {
                let wz = if dz == 0 { 1.0 - frac[2] } else { frac[2] };
                if wz == 0.0 {
                    continue;
                }
                if let Some(v) = image.get_checked(y0 + dy, x0 + dx, z0 + dz) {
                    acc += wy * wx * wz * v;
                }
            }
        }
    }
    acc
}

/// Registered intensities of `round` at anchor-frame `yxz` for every
/// channel in `channels`, laid out `[point][channel]`.
///
/// The DAPI channel is read without a transform.
pub fn get_spot_colours(
    stack: &TileStack,
    tile: usize,
    round: usize,
    channels: &[usize],
    dapi_channel: Option<usize>,
    yxz: &[[i32; 3]],
    transforms: &Transforms,
) -> Result<Vec<f32>, InputError> {
    let n_channels = channels.len();
    let mut out = vec![0f32; yxz.len() * n_channels];
    for (ci, &c) in channels.iter().enumerate() {
        let image = stack.image(round, c)?;
        let affine = if Some(c) == dapi_channel {
            Affine::identity()
        } else {
            *transforms.get(tile, round, c)
        };
        for (i, p) in yxz.iter().enumerate() {
            let q = affine.apply([p[0] as f32, p[1] as f32, p[2] as f32]);
            out[i * n_channels + ci] = sample_trilinear(&image, q);
        }
    }
    Ok(out)
}

/// Positions of every pixel on `z_planes`, z slowest then y then x.
pub fn all_pixel_yxz(ny: usize, nx: usize, z_planes: &[usize]) -> Vec<[i32; 3]> {
    let mut out = Vec::with_capacity(ny * nx * z_planes.len());
    for &z in z_planes {
        for y in 0..ny {
            for x in 0..nx {
                out.push([y as i32, x as i32, z as i32]);
            }
        }
    }
    out
}

/// Subtracts, per spot and channel, the 25th percentile across rounds.
/// Returns that background as `[spot][channel]`.
pub fn remove_background(colours: &mut SpotColours) -> Vec<f32> {
    let (n_rounds, n_channels) = (colours.n_rounds, colours.n_channels);
    let mut background = vec![0f32; colours.n_spots * n_channels];
    let mut column = Vec::with_capacity(n_rounds);
    for s in 0..colours.n_spots {
        for c in 0..n_channels {
            column.clear();
            column.extend((0..n_rounds).map(|r| colours.get(s, r, c)));
            let bg = percentile(&column, 25.0);
            background[s * n_channels + c] = bg;
            for r in 0..n_rounds {
                let v = colours.get(s, r, c);
                colours.set(s, r, c, v - bg);
            }
        }
    }
    background
}

/// Round and channel normalisation factors, `[round][channel]`.
///
/// Round slopes come from regressing each round against the round of median
/// brightness on pixels below `cutoff_percentile`. Channel strength is the
/// median of the `num_spots` brightest spots whose strongest channel in that
/// round is the channel. Factors that cannot be estimated are 1.
pub fn normalise_rc(
    pixel_colours: &SpotColours,
    spot_colours: &SpotColours,
    cutoff_percentile: f32,
    num_spots: usize,
) -> Vec<f32> {
    let (n_rounds, n_channels) = (pixel_colours.n_rounds, pixel_colours.n_channels);
    let n_pixels = pixel_colours.n_spots;
    let mut round_slopes = vec![1f32; n_rounds * n_channels];

    for c in 0..n_channels {
        let brightness: Vec<f32> = (0..n_rounds)
            .map(|r| {
                let abs: Vec<f32> = (0..n_pixels)
                    .map(|p| pixel_colours.get(p, r, c).abs())
                    .collect();
                mean(&abs)
            })
            .collect();
        let med = median(&brightness);
        let mut median_round = 0;
        for r in 1..n_rounds {
            if (brightness[r] - med).abs() < (brightness[median_round] - med).abs() {
                median_round = r;
            }
        }
        let base_all: Vec<f32> = (0..n_pixels)
            .map(|p| pixel_colours.get(p, median_round, c))
            .collect();
        let cutoff = percentile(&base_all, cutoff_percentile);
        let mask: Vec<bool> = base_all.iter().map(|&v| v < cutoff).collect();
        let base: Vec<f32> = base_all
            .iter()
            .zip(&mask)
            .filter(|(_, m)| **m)
            .map(|(v, _)| *v)
            .collect();
        for r in 0..n_rounds {
            let target: Vec<f32> = (0..n_pixels)
                .filter(|&p| mask[p])
                .map(|p| pixel_colours.get(p, r, c))
                .collect();
            let slope = scale_fit(&base, &target);
            if slope.is_finite() && slope != 0.0 {
                round_slopes[r * n_channels + c] = slope;
            }
        }
    }

    let mut factors = vec![1f32; n_rounds * n_channels];
    for r in 0..n_rounds {
        let mut per_channel: Vec<Vec<f32>> = vec![Vec::new(); n_channels];
        for s in 0..spot_colours.n_spots {
            if let Some(best) = argmax(spot_colours.round(s, r)) {
                per_channel[best].push(spot_colours.get(s, r, best));
            }
        }
        for (c, values) in per_channel.iter_mut().enumerate() {
            values.sort_by(|a, b| a.total_cmp(b));
            let bright = &values[values.len().saturating_sub(num_spots)..];
            let strength = if bright.is_empty() { 1.0 } else { median(bright) };
            let strength = if strength.is_finite() && strength != 0.0 {
                strength
            } else {
                1.0
            };
            factors[r * n_channels + c] = strength * round_slopes[r * n_channels + c];
        }
    }
    factors
}

#[cfg(test)]
#[path = "../tests/src_inline/spot_colours.rs"]
mod tests;
