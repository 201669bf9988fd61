use std::time::Duration;

use crate::{
    foundation::{
        core::{Axis, ImageRgba8, Size2},
        error::BlurResult,
    },
    kernel::weights::KernelWeights,
    render::cpu::{CpuBackend, CpuBackendOpts},
    schedule::plan::KernelId,
};

/// Handle to a backend-owned pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// Per-pass parameters bound alongside a transform kernel.
///
/// Tap offsets are in source pixels; backends scale them by `src_size_recip` regardless of the
/// destination resolution, so one kernel serves every scale factor.
#[derive(Clone, Debug, PartialEq)]
pub struct Uniforms {
    pub src_size_recip: [f32; 2],
    pub dst_size_recip: [f32; 2],
    /// Separable passes only.
    pub direction: Option<Axis>,
    /// `None` for a plain blit.
    pub weights: Option<KernelWeights>,
}

impl Uniforms {
    pub fn new(src: Size2, dst: Size2) -> Self {
        Self {
            src_size_recip: src.recip(),
            dst_size_recip: dst.recip(),
            direction: None,
            weights: None,
        }
    }
}

/// Optional telemetry capability: wall-clock (or device) time per transform.
pub trait PassTimer {
    fn begin_pass(&mut self, index: usize);

    /// Elapsed time of the pass started by the matching `begin_pass`, if measurable.
    fn end_pass(&mut self, index: usize) -> Option<Duration>;
}

/// Two-buffer image transform executor the pyramid runs on.
///
/// Every call is blocking from the caller's point of view: when `run_transform` returns, `dest`
/// is ready to be sampled by the next pass.
pub trait TransformBackend {
    fn create_buffer(&mut self, width: u32, height: u32) -> BlurResult<SurfaceId>;

    /// Reallocate `id` at the new size. Previous contents are discarded.
    fn resize(&mut self, id: SurfaceId, width: u32, height: u32) -> BlurResult<()>;

    fn surface_size(&self, id: SurfaceId) -> BlurResult<Size2>;

    /// Copy `image` into `id`, resizing it to the image's size.
    fn upload(&mut self, id: SurfaceId, image: &ImageRgba8) -> BlurResult<()>;

    fn run_transform(
        &mut self,
        kernel: KernelId,
        dest: SurfaceId,
        src: SurfaceId,
        uniforms: &Uniforms,
    ) -> BlurResult<()>;

    fn readback(&mut self, id: SurfaceId) -> BlurResult<ImageRgba8>;

    /// Timing capability, if this backend has one.
    fn timer(&mut self) -> Option<&mut dyn PassTimer> {
        None
    }
}

/// Available backend kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Software transforms with GPU sampling semantics.
    #[default]
    Cpu,
}

/// Create a transform backend implementation.
pub fn create_backend(
    kind: BackendKind,
    opts: CpuBackendOpts,
) -> BlurResult<Box<dyn TransformBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(CpuBackend::new(opts))),
    }
}
