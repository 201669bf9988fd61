use crate::foundation::{
    core::ImageRgba8,
    error::{BlurError, BlurResult},
};

/// Image similarity score in `[0, 1]`, `1` meaning identical.
pub trait SimilarityMetric {
    fn score(&self, a: &ImageRgba8, b: &ImageRgba8) -> BlurResult<f64>;
}

/// Mean structural similarity over luma.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MeanSsim {
    pub window: u32,
    pub stride: u32,
    pub k1: f64,
    pub k2: f64,
}

impl Default for MeanSsim {
    fn default() -> Self {
        Self {
            window: 8,
            stride: 4,
            k1: 0.01,
            k2: 0.03,
        }
    }
}

impl SimilarityMetric for MeanSsim {
    #[tracing::instrument(skip_all, fields(size = %a.size()))]
    fn score(&self, a: &ImageRgba8, b: &ImageRgba8) -> BlurResult<f64> {
        a.validate()?;
        b.validate()?;
        if a.size() != b.size() {
            return Err(BlurError::validation(format!(
                "cannot compare a {} image with a {} image",
                a.size(),
                b.size()
            )));
        }
        if self.window == 0 || self.stride == 0 {
            return Err(BlurError::validation("ssim window and stride must be >= 1"));
        }

        let (w, h) = (a.width as usize, a.height as usize);
        let win = (self.window as usize).min(w).min(h);
        let la = luma(a);
        let lb = luma(b);
        let c1 = (self.k1 * 255.0).powi(2);
        let c2 = (self.k2 * 255.0).powi(2);

        let mut total = 0.0;
        let mut count = 0usize;
        for y0 in (0..=h - win).step_by(self.stride as usize) {
            for x0 in (0..=w - win).step_by(self.stride as usize) {
                total += window_ssim(&la, &lb, w, x0, y0, win, c1, c2);
                count += 1;
            }
        }
        let mean = total / count as f64;
        tracing::debug!(windows = count, mean, "ssim");
        Ok(mean.clamp(0.0, 1.0))
    }
}

fn luma(img: &ImageRgba8) -> Vec<f64> {
    img.data
        .chunks_exact(4)
        .map(|px| 0.299 * f64::from(px[0]) + 0.587 * f64::from(px[1]) + 0.114 * f64::from(px[2]))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn window_ssim(
    a: &[f64],
    b: &[f64],
    row_len: usize,
    x0: usize,
    y0: usize,
    win: usize,
    c1: f64,
    c2: f64,
) -> f64 {
    let n = (win * win) as f64;
    let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for y in y0..y0 + win {
        let row = y * row_len;
        for x in x0..x0 + win {
            let (va, vb) = (a[row + x], b[row + x]);
            sa += va;
            sb += vb;
            saa += va * va;
            sbb += vb * vb;
            sab += va * vb;
        }
    }
    let (ma, mb) = (sa / n, sb / n);
    let var_a = saa / n - ma * ma;
    let var_b = sbb / n - mb * mb;
    let cov = sab / n - ma * mb;
    ((2.0 * ma * mb + c1) * (2.0 * cov + c2)) / ((ma * ma + mb * mb + c1) * (var_a + var_b + c2))
}

#[cfg(test)]
#[path = "../../tests/unit/quality/ssim.rs"]
mod tests;
