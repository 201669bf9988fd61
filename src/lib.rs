//! pyrblur approximates large-radius Gaussian blurs with an image pyramid.
//!
//! A direct Gaussian costs `O(R)` taps per pixel. Downsampling first shrinks the effective radius
//! by the scale factor, so a small fixed-size kernel applied at a reduced resolution, followed by
//! mirrored upsampling, approximates the full blur at near-constant cost per pixel.
//!
//! # Pipeline overview
//!
//! 1. **Schedule**: `(radius, size, method) -> Plan` ([`PassScheduler`], pure)
//! 2. **Synthesize**: per pass, `(effective_radius, pattern) -> KernelWeights` ([`weights`])
//! 3. **Execute**: `Plan -> passes on a TransformBackend` ([`PyramidExecutor`], two ping-pong slots)
//! 4. **Read back**: the caller gets a fresh [`ImageRgba8`] ([`BlurEngine`])
//!
//! Quality against a direct Gaussian is measured with [`reference_gaussian_blur`] and
//! [`MeanSsim`].
#![forbid(unsafe_code)]

mod config;
mod engine;
mod foundation;
mod kernel;
mod quality;
mod render;
mod schedule;

pub use config::Config;
pub use engine::blur_engine::{BlurEngine, BlurStats, EngineOpts, EngineState};
pub use foundation::core::{Axis, ImageRgba8, Size2};
pub use foundation::error::{BlurError, BlurResult};
pub use kernel::weights::{
    KernelWeights, SEPARABLE_HALF_WIDTHS, Tap, TapPattern, gaussian_density, weights,
};
pub use quality::reference::reference_gaussian_blur;
pub use quality::ssim::{MeanSsim, SimilarityMetric};
pub use render::backend::{
    BackendKind, PassTimer, SurfaceId, TransformBackend, Uniforms, create_backend,
};
pub use render::cpu::{CpuBackend, CpuBackendOpts, DEFAULT_MAX_SURFACE_BYTES};
pub use render::executor::{ExecutionStats, PyramidExecutor};
pub use schedule::plan::{BlurMethod, KernelId, PassKind, PassSpec, Plan};
pub use schedule::scheduler::{
    BudgetStep, PassCountFormula, PassScheduler, ScheduleOpts, fixed_log_pass_count,
    radius_budget_steps,
};
