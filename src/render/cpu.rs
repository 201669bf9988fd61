use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::{
    foundation::{
        core::{Axis, ImageRgba8, Size2},
        error::{BlurError, BlurResult},
    },
    kernel::weights::{Tap, TapPattern},
    render::backend::{PassTimer, SurfaceId, TransformBackend, Uniforms},
    schedule::plan::KernelId,
};

/// Options for the CPU backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CpuBackendOpts {
    /// Split each transform over destination rows (rayon).
    pub parallel: bool,
    /// Maximum bytes held across all surfaces; allocations past it fail.
    pub max_surface_bytes: usize,
    /// Advertise the [`PassTimer`] capability.
    pub timing: bool,
}

/// Surface budget used when `PYRBLUR_MAX_SURFACE_BYTES` is unset or invalid.
pub const DEFAULT_MAX_SURFACE_BYTES: usize = 512 * 1024 * 1024;

impl Default for CpuBackendOpts {
    fn default() -> Self {
        let max_surface_bytes = std::env::var("PYRBLUR_MAX_SURFACE_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_SURFACE_BYTES);
        Self {
            parallel: true,
            max_surface_bytes,
            timing: false,
        }
    }
}

impl CpuBackendOpts {
    pub fn with_timing(mut self, timing: bool) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_max_surface_bytes(mut self, bytes: usize) -> Self {
        self.max_surface_bytes = bytes;
        self
    }
}

struct Surface {
    size: Size2,
    data: Vec<u8>,
}

#[derive(Default)]
struct CpuTimer {
    running: Option<(usize, Instant)>,
}

impl PassTimer for CpuTimer {
    fn begin_pass(&mut self, index: usize) {
        self.running = Some((index, Instant::now()));
    }

    fn end_pass(&mut self, index: usize) -> Option<Duration> {
        match self.running.take() {
            Some((i, start)) if i == index => Some(start.elapsed()),
            _ => None,
        }
    }
}

/// Software transform backend.
///
/// Sampling follows GPU texture rules: destination pixel centres map into source texel space,
/// every tap is read with bilinear filtering and clamp-to-edge addressing, and results are
/// stored back as RGBA8 with round-to-nearest.
pub struct CpuBackend {
    opts: CpuBackendOpts,
    surfaces: Vec<Surface>,
    timer: CpuTimer,
}

impl CpuBackend {
    pub fn new(opts: CpuBackendOpts) -> Self {
        Self {
            opts,
            surfaces: Vec::new(),
            timer: CpuTimer::default(),
        }
    }

    pub fn opts(&self) -> CpuBackendOpts {
        self.opts
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn retained_bytes(&self) -> usize {
        self.surfaces.iter().map(|s| s.data.len()).sum()
    }

    fn slot(&self, id: SurfaceId) -> BlurResult<&Surface> {
        self.surfaces
            .get(id.0 as usize)
            .ok_or_else(|| BlurError::backend(format!("unknown surface {}", id.0)))
    }

    fn checked_alloc(&self, size: Size2, replacing: usize) -> BlurResult<Vec<u8>> {
        if size.is_empty() {
            return Err(BlurError::backend(format!("invalid surface size {size}")));
        }
        let bytes = size
            .byte_len()
            .ok_or_else(|| BlurError::backend(format!("surface {size} overflows")))?;
        let total = self
            .retained_bytes()
            .saturating_sub(replacing)
            .saturating_add(bytes);
        if total > self.opts.max_surface_bytes {
            return Err(BlurError::backend(format!(
                "out of surface memory: {total} bytes requested, budget {}",
                self.opts.max_surface_bytes
            )));
        }
        Ok(vec![0; bytes])
    }

    fn taps_for(kernel: KernelId, uniforms: &Uniforms) -> BlurResult<Vec<Tap>> {
        if kernel == KernelId::Blit {
            return Ok(vec![Tap {
                dx: 0.0,
                dy: 0.0,
                weight: 1.0,
            }]);
        }
        let weights = uniforms
            .weights
            .as_ref()
            .ok_or_else(|| BlurError::backend(format!("{kernel:?} pass bound without weights")))?;
        let pattern_ok = matches!(
            (kernel, weights.pattern()),
            (KernelId::Separable, TapPattern::Separable { .. })
                | (KernelId::Footprint9, TapPattern::Footprint9)
        ) || matches!(
            (kernel, weights.pattern()),
            (KernelId::Footprint6(a), TapPattern::Footprint6 { wide }) if a == wide
        );
        if !pattern_ok {
            return Err(BlurError::backend(format!(
                "{kernel:?} cannot sample {:?} weights",
                weights.pattern()
            )));
        }

        let mut taps = weights.expand();
        if kernel == KernelId::Separable {
            match uniforms.direction {
                Some(Axis::Horizontal) => {}
                Some(Axis::Vertical) => {
                    for t in &mut taps {
                        std::mem::swap(&mut t.dx, &mut t.dy);
                    }
                }
                None => {
                    return Err(BlurError::backend("separable pass bound without direction"));
                }
            }
        }
        Ok(taps)
    }
}

fn recip_matches(recip: [f32; 2], size: Size2) -> bool {
    let [rx, ry] = size.recip();
    (recip[0] - rx).abs() <= rx * 1e-4 && (recip[1] - ry).abs() <= ry * 1e-4
}

impl TransformBackend for CpuBackend {
    fn create_buffer(&mut self, width: u32, height: u32) -> BlurResult<SurfaceId> {
        let size = Size2::new(width, height);
        let data = self.checked_alloc(size, 0)?;
        let id = SurfaceId(
            self.surfaces
                .len()
                .try_into()
                .map_err(|_| BlurError::backend("surface id overflow"))?,
        );
        self.surfaces.push(Surface { size, data });
        Ok(id)
    }

    fn resize(&mut self, id: SurfaceId, width: u32, height: u32) -> BlurResult<()> {
        let size = Size2::new(width, height);
        let old = self.slot(id)?.data.len();
        let data = self.checked_alloc(size, old)?;
        let surface = &mut self.surfaces[id.0 as usize];
        surface.size = size;
        surface.data = data;
        Ok(())
    }

    fn surface_size(&self, id: SurfaceId) -> BlurResult<Size2> {
        Ok(self.slot(id)?.size)
    }

    fn upload(&mut self, id: SurfaceId, image: &ImageRgba8) -> BlurResult<()> {
        if self.slot(id)?.size != image.size() {
            self.resize(id, image.width, image.height)?;
        }
        let surface = &mut self.surfaces[id.0 as usize];
        if surface.data.len() != image.data.len() {
            return Err(BlurError::backend("upload buffer size mismatch"));
        }
        surface.data.copy_from_slice(&image.data);
        Ok(())
    }

    fn run_transform(
        &mut self,
        kernel: KernelId,
        dest: SurfaceId,
        src: SurfaceId,
        uniforms: &Uniforms,
    ) -> BlurResult<()> {
        if dest == src {
            return Err(BlurError::backend(
                "transform cannot read and write the same surface",
            ));
        }
        let src_size = self.slot(src)?.size;
        let dst_size = self.slot(dest)?.size;
        if !recip_matches(uniforms.src_size_recip, src_size)
            || !recip_matches(uniforms.dst_size_recip, dst_size)
        {
            return Err(BlurError::backend(format!(
                "uniform sizes do not match bound surfaces {src_size} -> {dst_size}"
            )));
        }
        let taps = Self::taps_for(kernel, uniforms)?;

        // Destination pixel centre -> source texel coordinate, per column and per row.
        let map = |i: u32, axis: usize| {
            (i as f32 + 0.5) * uniforms.dst_size_recip[axis] / uniforms.src_size_recip[axis] - 0.5
        };
        let cols: Vec<f32> = (0..dst_size.width).map(|x| map(x, 0)).collect();
        let rows: Vec<f32> = (0..dst_size.height).map(|y| map(y, 1)).collect();

        let mut dst = std::mem::take(&mut self.surfaces[dest.0 as usize].data);
        {
            let src_px = &self.surfaces[src.0 as usize].data;
            let row_len = dst_size.width as usize * 4;
            let fill = |(y, row): (usize, &mut [u8])| {
                transform_row(row, &cols, rows[y], src_px, src_size, &taps);
            };
            if self.opts.parallel {
                dst.par_chunks_mut(row_len).enumerate().for_each(fill);
            } else {
                dst.chunks_mut(row_len).enumerate().for_each(fill);
            }
        }
        self.surfaces[dest.0 as usize].data = dst;
        Ok(())
    }

    fn readback(&mut self, id: SurfaceId) -> BlurResult<ImageRgba8> {
        let surface = self.slot(id)?;
        ImageRgba8::new(surface.size.width, surface.size.height, surface.data.clone())
    }

    fn timer(&mut self) -> Option<&mut dyn PassTimer> {
        if self.opts.timing {
            Some(&mut self.timer)
        } else {
            None
        }
    }
}

fn transform_row(row: &mut [u8], cols: &[f32], sy: f32, src: &[u8], size: Size2, taps: &[Tap]) {
    for (x, &sx) in cols.iter().enumerate() {
        let mut acc = [0f32; 4];
        for t in taps {
            let px = sample_bilinear(src, size, sx + t.dx, sy + t.dy);
            for c in 0..4 {
                acc[c] += t.weight * px[c];
            }
        }
        let out = &mut row[x * 4..x * 4 + 4];
        for c in 0..4 {
            out[c] = (acc[c].clamp(0.0, 255.0) + 0.5) as u8;
        }
    }
}

fn sample_bilinear(src: &[u8], size: Size2, x: f32, y: f32) -> [f32; 4] {
    let max_x = (size.width - 1) as f32;
    let max_y = (size.height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let x0 = x0 as usize;
    let y0 = y0 as usize;
    let x1 = (x0 + 1).min(size.width as usize - 1);
    let y1 = (y0 + 1).min(size.height as usize - 1);

    let w = size.width as usize;
    let texel = |xi: usize, yi: usize| {
        let i = (yi * w + xi) * 4;
        [
            f32::from(src[i]),
            f32::from(src[i + 1]),
            f32::from(src[i + 2]),
            f32::from(src[i + 3]),
        ]
    };
    let (a, b, c, d) = (texel(x0, y0), texel(x1, y0), texel(x0, y1), texel(x1, y1));

    let mut out = [0f32; 4];
    for ch in 0..4 {
        let top = a[ch] + (b[ch] - a[ch]) * fx;
        let bottom = c[ch] + (d[ch] - c[ch]) * fx;
        out[ch] = top + (bottom - top) * fy;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
