//! Kernels and filters for single z planes and whole volumes.

use thiserror::Error;

use crate::model::{Image2d, Image3d};

#[derive(Debug, Error, PartialEq)]
pub enum MorphologyError {
    #[error("kernel dimensions are {0:?}, require all dimensions to be odd")]
    EvenKernel(Vec<usize>),
    #[error("kernel can only contain ones and zeros")]
    NonBinaryKernel,
    #[error("1D filter must have odd length of at least 3, got {0}")]
    FilterLength(usize),
    #[error("hanning radii must satisfy 0 < r1 < r2, got r1={0} r2={1}")]
    HanningRadii(usize, usize),
}

/// Pads even dimensions with one leading plane of zeros so every dimension
/// is odd: `[[5,4],[3,1]]` becomes `[[0,0,0],[0,5,4],[0,3,1]]`.
pub fn ensure_odd_kernel(kernel: &Image2d) -> Image2d {
    let (shape, data) = pad_odd(&[kernel.ny, kernel.nx], &kernel.data);
    Image2d {
        ny: shape[0],
        nx: shape[1],
        data,
    }
}

pub fn ensure_odd_kernel_3d(kernel: &Image3d) -> Image3d {
    let (shape, data) = pad_odd(&[kernel.ny, kernel.nx, kernel.nz], &kernel.data);
    Image3d {
        ny: shape[0],
        nx: shape[1],
        nz: shape[2],
        data,
    }
}

fn pad_odd(shape: &[usize], data: &[f32]) -> (Vec<usize>, Vec<f32>) {
    let new_shape: Vec<usize> = shape.iter().map(|&s| if s % 2 == 0 { s + 1 } else { s }).collect();
    if new_shape == shape {
        return (new_shape, data.to_vec());
    }
    let offset: Vec<usize> = shape
        .iter()
        .map(|&s| usize::from(s % 2 == 0))
        .collect();
    let n_new: usize = new_shape.iter().product();
    let mut out = vec![0f32; n_new];
    for (flat, &v) in data.iter().enumerate() {
        let mut rem = flat;
        let mut dst = 0usize;
        let mut stride = 1usize;
        for d in (0..shape.len()).rev() {
            let i = rem % shape[d];
            rem /= shape[d];
            dst += (i + offset[d]) * stride;
            stride *= new_shape[d];
        }
        out[dst] = v;
    }
    (new_shape, out)
}

/// Flat structuring element of radius `r`, `(2r+1) x (2r+1)`.
pub fn disk(r: usize) -> Image2d {
    let n = 2 * r + 1;
    let mut out = Image2d::zeros(n, n);
    let r2 = (r * r) as i64;
    for y in 0..n {
        for x in 0..n {
            let dy = y as i64 - r as i64;
            let dx = x as i64 - r as i64;
            if dy * dy + dx * dx <= r2 {
                out.set(y, x, 1.0);
            }
        }
    }
    out
}

/// Ellipsoid footprint with yx radius `r_xy` and z radius `r_z`.
pub fn ball(r_xy: usize, r_z: usize) -> Image3d {
    let (ny, nz) = (2 * r_xy + 1, 2 * r_z + 1);
    let mut out = Image3d::zeros(ny, ny, nz);
    for y in 0..ny {
        for x in 0..ny {
            for z in 0..nz {
                let dy = y as f32 - r_xy as f32;
                let dx = x as f32 - r_xy as f32;
                let dz = z as f32 - r_z as f32;
                let mut d = 0f32;
                if r_xy > 0 {
                    d += (dy * dy + dx * dx) / (r_xy * r_xy) as f32;
                } else if dy != 0.0 || dx != 0.0 {
                    continue;
                }
                if r_z > 0 {
                    d += dz * dz / (r_z * r_z) as f32;
                } else if dz != 0.0 {
                    continue;
                }
                if d <= 1.0 {
                    out.set(y, x, z, 1.0);
                }
            }
        }
    }
    out
}

fn is_binary(data: &[f32]) -> bool {
    data.iter().all(|&v| v == 0.0 || v == 1.0)
}

/// Convolution with replicated border pixels. The output keeps the image
/// shape; the kernel anchor is its centre element.
pub fn convolve_2d(image: &Image2d, kernel: &Image2d) -> Image2d {
    let (ky, kx) = (kernel.ny, kernel.nx);
    let (ay, ax) = ((ky / 2) as i64, (kx / 2) as i64);
    let max_y = image.ny as i64 - 1;
    let max_x = image.nx as i64 - 1;
    let mut out = Image2d::zeros(image.ny, image.nx);
    for y in 0..image.ny {
        for x in 0..image.nx {
            let mut acc = 0f64;
            for i in 0..ky {
                let sy = (y as i64 + i as i64 - ay).clamp(0, max_y) as usize;
                for j in 0..kx {
                    let k = kernel.get(ky - 1 - i, kx - 1 - j);
                    if k == 0.0 {
                        continue;
                    }
                    let sx = (x as i64 + j as i64 - ax).clamp(0, max_x) as usize;
                    acc += k as f64 * image.get(sy, sx) as f64;
                }
            }
            out.set(y, x, acc as f32);
        }
    }
    out
}

/// Full 2D convolution; output is `(a.ny + b.ny - 1) x (a.nx + b.nx - 1)`.
fn convolve_full(a: &Image2d, b: &Image2d) -> Image2d {
    let mut out = Image2d::zeros(a.ny + b.ny - 1, a.nx + b.nx - 1);
    for ay in 0..a.ny {
        for ax in 0..a.nx {
            let av = a.get(ay, ax);
            if av == 0.0 {
                continue;
            }
            for by in 0..b.ny {
                for bx in 0..b.nx {
                    let idx = (ay + by) * out.nx + ax + bx;
                    out.data[idx] += av * b.get(by, bx);
                }
            }
        }
    }
    out
}

fn flat_extreme_2d(image: &Image2d, kernel: &Image2d, take_max: bool) -> Image2d {
    let (ay, ax) = ((kernel.ny / 2) as i64, (kernel.nx / 2) as i64);
    let mut out = Image2d::zeros(image.ny, image.nx);
    for y in 0..image.ny {
        for x in 0..image.nx {
            let mut best = if take_max { f32::NEG_INFINITY } else { f32::INFINITY };
            for i in 0..kernel.ny {
                let sy = y as i64 + i as i64 - ay;
                if sy < 0 || sy >= image.ny as i64 {
                    continue;
                }
                for j in 0..kernel.nx {
                    if kernel.get(i, j) == 0.0 {
                        continue;
                    }
                    let sx = x as i64 + j as i64 - ax;
                    if sx < 0 || sx >= image.nx as i64 {
                        continue;
                    }
                    let v = image.get(sy as usize, sx as usize);
                    best = if take_max { best.max(v) } else { best.min(v) };
                }
            }
            out.set(y, x, if best.is_finite() { best } else { image.get(y, x) });
        }
    }
    out
}

/// White top-hat: the image minus its morphological opening. Pixels outside
/// the image are ignored by the erosion and the dilation. Even footprints
/// are padded at the start first.
pub fn top_hat(image: &Image2d, kernel: &Image2d) -> Result<Image2d, MorphologyError> {
    if !is_binary(&kernel.data) {
        return Err(MorphologyError::NonBinaryKernel);
    }
    let kernel = ensure_odd_kernel(kernel);
    let eroded = flat_extreme_2d(image, &kernel, false);
    let opened = flat_extreme_2d(&eroded, &kernel, true);
    let mut out = image.clone();
    for (o, &v) in out.data.iter_mut().zip(&opened.data) {
        *o -= v;
    }
    Ok(out)
}

/// Grey dilation with a binary footprint; voxels outside the volume count
/// as zero. Even footprints are padded at the start first.
pub fn dilate(image: &Image3d, kernel: &Image3d) -> Result<Image3d, MorphologyError> {
    if !is_binary(&kernel.data) {
        return Err(MorphologyError::NonBinaryKernel);
    }
    let kernel = ensure_odd_kernel_3d(kernel);
    let (ry, rx, rz) = (
        (kernel.ny / 2) as i64,
        (kernel.nx / 2) as i64,
        (kernel.nz / 2) as i64,
    );
    let mut offsets = Vec::new();
    for i in 0..kernel.ny {
        for j in 0..kernel.nx {
            for k in 0..kernel.nz {
                if kernel.get(i, j, k) != 0.0 {
                    offsets.push((i as i64 - ry, j as i64 - rx, k as i64 - rz));
                }
            }
        }
    }

    let mut out = Image3d::zeros(image.ny, image.nx, image.nz);
    for y in 0..image.ny {
        for x in 0..image.nx {
            for z in 0..image.nz {
                let mut best = f32::NEG_INFINITY;
                for &(dy, dx, dz) in &offsets {
                    let v = image.get_checked(y as i64 + dy, x as i64 + dx, z as i64 + dz);
                    best = best.max(v.unwrap_or(0.0));
                }
                let idx = out.index(y, x, z);
                out.data[idx] = if best.is_finite() { best } else { 0.0 };
            }
        }
    }
    Ok(out)
}

/// McClellan transform of a symmetric odd-length 1D filter into a 2D filter
/// of size `(len(b) x len(b))` when `t` is the default 3x3 transform.
pub fn ftrans2(b: &[f32], t: Option<&Image2d>) -> Result<Image2d, MorphologyError> {
    if b.len() < 3 || b.len() % 2 == 0 {
        return Err(MorphologyError::FilterLength(b.len()));
    }
    let mcclellan = Image2d {
        ny: 3,
        nx: 3,
        data: [1.0, 2.0, 1.0, 2.0, -4.0, 2.0, 1.0, 2.0, 1.0]
            .iter()
            .map(|v| v / 8.0)
            .collect(),
    };
    let t = t.unwrap_or(&mcclellan);
    if t.ny % 2 == 0 || t.nx % 2 == 0 {
        return Err(MorphologyError::EvenKernel(vec![t.ny, t.nx]));
    }

    // b as a sum of a(k) cos(wk) terms
    let n = (b.len() - 1) / 2;
    let mut a = Vec::with_capacity(n + 1);
    a.push(b[n]);
    for k in 1..=n {
        a.push(2.0 * b[n - k]);
    }

    // Chebyshev recursion: P_k = 2 t * P_{k-1} - P_{k-2}
    let one = Image2d {
        ny: 1,
        nx: 1,
        data: vec![1.0],
    };
    let mut p0 = one;
    let mut p1 = t.clone();
    let mut h = scaled(&p1, a[1]);
    add_centred(&mut h, &p0, a[0]);
    for &ak in a.iter().skip(2) {
        let mut p2 = scaled(&convolve_full(t, &p1), 2.0);
        add_centred(&mut p2, &p0, -1.0);
        let mut next = scaled(&p2, ak);
        add_centred(&mut next, &h, 1.0);
        h = next;
        p0 = p1;
        p1 = p2;
    }
    Ok(rot90(&h))
}

fn scaled(m: &Image2d, s: f32) -> Image2d {
    Image2d {
        ny: m.ny,
        nx: m.nx,
        data: m.data.iter().map(|v| v * s).collect(),
    }
}

/// `dst += s * src` with `src` centred inside `dst`.
fn add_centred(dst: &mut Image2d, src: &Image2d, s: f32) {
    let oy = (dst.ny - src.ny) / 2;
    let ox = (dst.nx - src.nx) / 2;
    for y in 0..src.ny {
        for x in 0..src.nx {
            let idx = (oy + y) * dst.nx + ox + x;
            dst.data[idx] += s * src.get(y, x);
        }
    }
}

/// Counter-clockwise quarter turn.
fn rot90(m: &Image2d) -> Image2d {
    let mut out = Image2d::zeros(m.nx, m.ny);
    for i in 0..m.nx {
        for j in 0..m.ny {
            out.set(i, j, m.get(j, m.nx - 1 - i));
        }
    }
    out
}

fn hanning(m: usize) -> Vec<f32> {
    if m == 1 {
        return vec![1.0];
    }
    (0..m)
        .map(|k| {
            let w = 2.0 * std::f64::consts::PI * k as f64 / (m - 1) as f64;
            (0.5 - 0.5 * w.cos()) as f32
        })
        .collect()
}

/// Difference of hanning windows turned into a 2D kernel: a positive inner
/// window of radius `r1` minus an outer window of radius `r2`, each summing
/// to one.
pub fn hanning_diff(r1: usize, r2: usize) -> Result<Image2d, MorphologyError> {
    if r1 == 0 || r1 >= r2 {
        return Err(MorphologyError::HanningRadii(r1, r2));
    }
    let outer = hanning(2 * r2 + 3);
    let outer = &outer[1..outer.len() - 1];
    let outer_sum: f32 = outer.iter().sum();
    let inner = hanning(2 * r1 + 3);
    let inner = &inner[1..inner.len() - 1];
    let inner_sum: f32 = inner.iter().sum();

    let mut h: Vec<f32> = outer.iter().map(|v| -v / outer_sum).collect();
    for (i, v) in inner.iter().enumerate() {
        h[r2 - r1 + i] += v / inner_sum;
    }
    ftrans2(&h, None)
}

#[cfg(test)]
#[path = "../tests/src_inline/morphology.rs"]
mod tests;
