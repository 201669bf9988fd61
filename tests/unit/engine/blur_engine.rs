use std::{cell::Cell, rc::Rc};

use super::*;
use crate::{
    foundation::{core::Size2, error::BlurError},
    render::{
        backend::{PassTimer, Uniforms},
        cpu::CpuBackend,
    },
    schedule::plan::KernelId,
};

const ALL_METHODS: [BlurMethod; 4] = [
    BlurMethod::FixedLog,
    BlurMethod::FixedLogCorrected,
    BlurMethod::RadiusBudget,
    BlurMethod::Dyadic,
];

fn engine() -> BlurEngine {
    BlurEngine::cpu(EngineOpts::default(), CpuBackendOpts::default()).unwrap()
}

fn gradient(width: u32, height: u32) -> ImageRgba8 {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[(x * 255 / width) as u8, (y * 255 / height) as u8, 128, 255]);
        }
    }
    ImageRgba8::new(width, height, data).unwrap()
}

/// CPU backend whose transforms can be switched to fail.
struct FlakyBackend {
    inner: CpuBackend,
    failing: Rc<Cell<bool>>,
}

impl TransformBackend for FlakyBackend {
    fn create_buffer(&mut self, width: u32, height: u32) -> BlurResult<SurfaceId> {
        self.inner.create_buffer(width, height)
    }

    fn resize(&mut self, id: SurfaceId, width: u32, height: u32) -> BlurResult<()> {
        self.inner.resize(id, width, height)
    }

    fn surface_size(&self, id: SurfaceId) -> BlurResult<Size2> {
        self.inner.surface_size(id)
    }

    fn upload(&mut self, id: SurfaceId, image: &ImageRgba8) -> BlurResult<()> {
        self.inner.upload(id, image)
    }

    fn run_transform(
        &mut self,
        kernel: KernelId,
        dest: SurfaceId,
        src: SurfaceId,
        uniforms: &Uniforms,
    ) -> BlurResult<()> {
        if self.failing.get() {
            return Err(BlurError::backend("transform rejected"));
        }
        self.inner.run_transform(kernel, dest, src, uniforms)
    }

    fn readback(&mut self, id: SurfaceId) -> BlurResult<ImageRgba8> {
        self.inner.readback(id)
    }

    fn timer(&mut self) -> Option<&mut dyn PassTimer> {
        self.inner.timer()
    }
}

#[test]
fn zero_radius_returns_the_source_untouched() {
    let img = gradient(31, 17);
    let mut e = engine();
    for method in ALL_METHODS {
        let (out, stats) = e.blur_with_stats(&img, 0.0, method).unwrap();
        assert_eq!(out, img);
        assert!(stats.plan.is_empty());
        assert!(stats.pass_timings.is_none());
        assert_eq!(e.state(), EngineState::Idle);
    }
}

#[test]
fn constant_images_stay_constant() {
    let img = ImageRgba8::filled(37, 23, [12, 200, 77, 255]).unwrap();
    let mut e = engine();
    for method in ALL_METHODS {
        for radius in [0.7f32, 5.0, 40.0] {
            let out = e.blur(&img, radius, method).unwrap();
            assert_eq!(out.size(), img.size());
            for px in out.data.chunks_exact(4) {
                for (&got, want) in px.iter().zip([12i32, 200, 77, 255]) {
                    assert!(
                        (i32::from(got) - want).abs() <= 1,
                        "{method:?} r={radius}: {px:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn blurring_smooths_an_edge() {
    let mut data = Vec::new();
    for _y in 0..32 {
        for x in 0..64 {
            let v = if x < 32 { 0 } else { 255 };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    let img = ImageRgba8::new(64, 32, data).unwrap();
    let out = engine().blur(&img, 12.0, BlurMethod::RadiusBudget).unwrap();

    let row: Vec<u8> = (0..64).map(|x| out.pixel(x, 16)[0]).collect();
    assert!(row[31] > 20 && row[31] < 235, "{row:?}");
    assert!(row[32] > 20 && row[32] < 235, "{row:?}");
    assert!(row.windows(2).all(|w| w[0] <= w[1].saturating_add(1)));
}

#[test]
fn engine_follows_image_size_between_calls() {
    let mut e = engine();
    let a = e.blur(&gradient(64, 64), 9.0, BlurMethod::FixedLog).unwrap();
    let b = e.blur(&gradient(30, 20), 9.0, BlurMethod::FixedLog).unwrap();
    assert_eq!(a.size(), Size2::new(64, 64));
    assert_eq!(b.size(), Size2::new(30, 20));
}

#[test]
fn repeated_calls_are_deterministic() {
    let img = gradient(48, 40);
    let mut e = engine();
    let first = e.blur(&img, 20.0, BlurMethod::RadiusBudget).unwrap();
    e.blur(&gradient(16, 16), 3.0, BlurMethod::Dyadic).unwrap();
    let again = e.blur(&img, 20.0, BlurMethod::RadiusBudget).unwrap();
    assert_eq!(first, again);
}

#[test]
fn failed_calls_leave_previous_results_and_return_to_idle() {
    let failing = Rc::new(Cell::new(false));
    let backend = FlakyBackend {
        inner: CpuBackend::new(CpuBackendOpts::default()),
        failing: Rc::clone(&failing),
    };
    let mut e = BlurEngine::new(Box::new(backend), EngineOpts::default());
    let img = gradient(40, 40);

    let good = e.blur(&img, 10.0, BlurMethod::FixedLog).unwrap();
    let kept = good.clone();

    failing.set(true);
    let err = e.blur(&img, 10.0, BlurMethod::FixedLog).unwrap_err();
    assert!(matches!(err, BlurError::BackendFailure(_)));
    assert_eq!(e.state(), EngineState::Idle);
    assert_eq!(good, kept);

    failing.set(false);
    assert_eq!(e.blur(&img, 10.0, BlurMethod::FixedLog).unwrap(), kept);
}

#[test]
fn exhausted_surface_budget_is_a_backend_failure() {
    let cpu = CpuBackendOpts::default().with_max_surface_bytes(64 * 64 * 4);
    let mut e = BlurEngine::cpu(EngineOpts::default(), cpu).unwrap();
    let err = e.blur(&gradient(64, 64), 8.0, BlurMethod::FixedLog).unwrap_err();
    assert!(matches!(err, BlurError::BackendFailure(_)));
    assert_eq!(e.state(), EngineState::Idle);
}

#[test]
fn explicit_surface_budget_is_kept_by_the_backend() {
    let cpu = CpuBackendOpts::default().with_max_surface_bytes(64 * 64 * 4);
    assert_eq!(CpuBackend::new(cpu).opts().max_surface_bytes, 64 * 64 * 4);
}

#[test]
fn malformed_source_is_a_validation_error() {
    let mut e = engine();
    let mut img = gradient(16, 16);
    img.data.truncate(100);
    let err = e.blur(&img, 4.0, BlurMethod::RadiusBudget).unwrap_err();
    assert!(matches!(err, BlurError::Validation(_)));
    assert_eq!(e.state(), EngineState::Idle);
}

#[test]
fn invalid_radius_is_reported_before_any_work() {
    let mut e = engine();
    let err = e
        .blur(&gradient(8, 8), -1.0, BlurMethod::FixedLog)
        .unwrap_err();
    assert!(matches!(err, BlurError::InvalidRadius(_)));
    assert_eq!(e.state(), EngineState::Idle);
}

#[test]
fn timings_follow_the_backend_capability() {
    let img = gradient(32, 32);

    let (_, stats) = engine()
        .blur_with_stats(&img, 6.0, BlurMethod::Dyadic)
        .unwrap();
    assert!(stats.pass_timings.is_none());

    let mut timed =
        BlurEngine::cpu(EngineOpts::default(), CpuBackendOpts::default().with_timing(true))
            .unwrap();
    let (_, stats) = timed.blur_with_stats(&img, 6.0, BlurMethod::Dyadic).unwrap();
    assert_eq!(stats.pass_timings.unwrap().len(), stats.plan.len());
}

#[test]
fn schedule_opts_reach_the_scheduler() {
    let opts = EngineOpts {
        schedule: ScheduleOpts {
            dyadic_levels: 2,
            ..ScheduleOpts::default()
        },
    };
    let mut e = BlurEngine::cpu(opts, CpuBackendOpts::default()).unwrap();
    assert_eq!(e.scheduler().opts().dyadic_levels, 2);
    let (_, stats) = e
        .blur_with_stats(&gradient(32, 32), 4.0, BlurMethod::Dyadic)
        .unwrap();
    assert_eq!(stats.plan.reduction_count(), 2);
}
