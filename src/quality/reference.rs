use rayon::prelude::*;

use crate::foundation::{
    core::ImageRgba8,
    error::{BlurError, BlurResult},
};

/// Direct separable Gaussian blur used as ground truth for the pyramid approximation.
///
/// `sigma = radius / 2`, truncated at `ceil(3σ)`, clamp-to-edge, Q16 fixed-point weights.
pub fn reference_gaussian_blur(image: &ImageRgba8, radius: f32) -> BlurResult<ImageRgba8> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(BlurError::InvalidRadius(radius));
    }
    image.validate()?;
    let sigma = radius * 0.5;
    let half_width = (3.0 * sigma).ceil() as u32;
    if half_width == 0 {
        return Ok(image.clone());
    }

    let kernel = gaussian_kernel_q16(half_width, sigma)?;
    let mut tmp = vec![0u8; image.data.len()];
    let mut out = vec![0u8; image.data.len()];
    horizontal_pass(&image.data, &mut tmp, image.width, &kernel);
    vertical_pass(&tmp, &mut out, image.width, image.height, &kernel);
    ImageRgba8::new(image.width, image.height, out)
}

fn gaussian_kernel_q16(half_width: u32, sigma: f32) -> BlurResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(BlurError::validation("blur sigma must be > 0"));
    }

    let r = half_width as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = f64::from(i);
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();
    if sum <= 0.0 {
        return Err(BlurError::validation("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    // Rounding drift goes to the centre tap so the kernel sums to exactly 1.0 in Q16.
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let row_len = width as usize * 4;
    dst.par_chunks_mut(row_len)
        .zip(src.par_chunks(row_len))
        .for_each(|(out_row, in_row)| {
            for x in 0..w {
                let mut acc = [0u64; 4];
                for (ki, &kw) in k.iter().enumerate() {
                    let sx = (x + ki as i32 - radius).clamp(0, w - 1) as usize * 4;
                    for c in 0..4 {
                        acc[c] += u64::from(kw) * u64::from(in_row[sx + c]);
                    }
                }
                let o = x as usize * 4;
                for c in 0..4 {
                    out_row[o + c] = q16_to_u8(acc[c]);
                }
            }
        });
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let h = height as i32;
    let row_len = width as usize * 4;
    dst.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, out_row)| {
            let mut acc = vec![[0u64; 4]; width as usize];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y as i32 + ki as i32 - radius).clamp(0, h - 1) as usize;
                let in_row = &src[sy * row_len..(sy + 1) * row_len];
                for (a, px) in acc.iter_mut().zip(in_row.chunks_exact(4)) {
                    for c in 0..4 {
                        a[c] += u64::from(kw) * u64::from(px[c]);
                    }
                }
            }
            for (o, a) in out_row.chunks_exact_mut(4).zip(&acc) {
                for c in 0..4 {
                    o[c] = q16_to_u8(a[c]);
                }
            }
        });
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/quality/reference.rs"]
mod tests;
