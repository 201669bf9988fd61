use super::*;
use crate::{
    foundation::core::ImageRgba8,
    render::backend::PassTimer,
    schedule::{
        plan::{BlurMethod, KernelId, PassKind},
        scheduler::{PassScheduler, ScheduleOpts},
    },
};

#[derive(Debug, PartialEq)]
enum Call {
    Create(Size2),
    Resize(SurfaceId, Size2),
    Transform {
        kernel: KernelId,
        dest: SurfaceId,
        src: SurfaceId,
        uniforms: Uniforms,
    },
}

#[derive(Default)]
struct MockTimer {
    begun: Vec<usize>,
}

impl PassTimer for MockTimer {
    fn begin_pass(&mut self, index: usize) {
        self.begun.push(index);
    }

    fn end_pass(&mut self, index: usize) -> Option<Duration> {
        Some(Duration::from_micros(index as u64 + 1))
    }
}

#[derive(Default)]
struct MockBackend {
    sizes: Vec<Size2>,
    calls: Vec<Call>,
    fail_at_transform: Option<usize>,
    timer: Option<MockTimer>,
}

impl MockBackend {
    fn with_surface(mut self, size: Size2) -> Self {
        self.sizes.push(size);
        self
    }

    fn transforms(&self) -> Vec<(KernelId, SurfaceId, SurfaceId, &Uniforms)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Transform {
                    kernel,
                    dest,
                    src,
                    uniforms,
                } => Some((*kernel, *dest, *src, uniforms)),
                _ => None,
            })
            .collect()
    }
}

impl TransformBackend for MockBackend {
    fn create_buffer(&mut self, width: u32, height: u32) -> BlurResult<SurfaceId> {
        let size = Size2::new(width, height);
        self.calls.push(Call::Create(size));
        self.sizes.push(size);
        Ok(SurfaceId(self.sizes.len() as u32 - 1))
    }

    fn resize(&mut self, id: SurfaceId, width: u32, height: u32) -> BlurResult<()> {
        let size = Size2::new(width, height);
        self.calls.push(Call::Resize(id, size));
        self.sizes[id.0 as usize] = size;
        Ok(())
    }

    fn surface_size(&self, id: SurfaceId) -> BlurResult<Size2> {
        self.sizes
            .get(id.0 as usize)
            .copied()
            .ok_or_else(|| BlurError::backend("unknown surface"))
    }

    fn upload(&mut self, _id: SurfaceId, _image: &ImageRgba8) -> BlurResult<()> {
        Ok(())
    }

    fn run_transform(
        &mut self,
        kernel: KernelId,
        dest: SurfaceId,
        src: SurfaceId,
        uniforms: &Uniforms,
    ) -> BlurResult<()> {
        if self.fail_at_transform == Some(self.transforms().len()) {
            return Err(BlurError::backend("device lost"));
        }
        self.calls.push(Call::Transform {
            kernel,
            dest,
            src,
            uniforms: uniforms.clone(),
        });
        Ok(())
    }

    fn readback(&mut self, id: SurfaceId) -> BlurResult<ImageRgba8> {
        let size = self.surface_size(id)?;
        ImageRgba8::filled(size.width, size.height, [0, 0, 0, 0])
    }

    fn timer(&mut self) -> Option<&mut dyn PassTimer> {
        self.timer.as_mut().map(|t| t as &mut dyn PassTimer)
    }
}

const SOURCE: SurfaceId = SurfaceId(0);
const OUTPUT: SurfaceId = SurfaceId(1);

fn backend_for(size: Size2) -> MockBackend {
    MockBackend::default()
        .with_surface(size)
        .with_surface(Size2::new(1, 1))
}

fn plan(method: BlurMethod, radius: f32, width: u32, height: u32) -> Plan {
    PassScheduler::new(ScheduleOpts::default())
        .plan(method, radius, width, height)
        .unwrap()
}

#[test]
fn execute_ping_pongs_between_two_slots() {
    let plan = plan(BlurMethod::FixedLog, 16.0, 64, 64);
    assert_eq!(plan.len(), 8);
    let mut backend = backend_for(plan.output_size);
    let mut exec = PyramidExecutor::new();

    let stats = exec.execute(&plan, SOURCE, OUTPUT, &mut backend).unwrap();
    assert_eq!(stats.passes, 8);
    assert!(stats.pass_timings.is_none());

    let t = backend.transforms();
    assert_eq!(t.len(), 8);
    assert_eq!(t[0].2, SOURCE);
    assert_eq!(t[7].1, OUTPUT);
    for (i, &(_, dest, src, _)) in t.iter().enumerate() {
        assert_ne!(dest, src, "pass {i}");
        if i > 0 {
            assert_eq!(src, t[i - 1].1, "pass {i} reads its predecessor");
        }
    }

    let [a, b] = exec.slot_surfaces();
    let (a, b) = (a.unwrap(), b.unwrap());
    for (i, &(_, dest, _, _)) in t[..7].iter().enumerate() {
        assert_eq!(dest, if i % 2 == 0 { a } else { b });
    }
    let creates = backend
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Create(_)))
        .count();
    assert_eq!(creates, 2);
}

#[test]
fn slots_resize_only_when_size_changes() {
    let plan = plan(BlurMethod::FixedLog, 16.0, 64, 64);
    let mut backend = backend_for(plan.output_size);
    let mut exec = PyramidExecutor::new();
    exec.execute(&plan, SOURCE, OUTPUT, &mut backend).unwrap();

    let resized = |b: &MockBackend| {
        b.calls
            .iter()
            .filter(|c| matches!(c, Call::Resize(..)))
            .count()
    };
    // The second run finds the output and the first two slots already sized.
    let first = resized(&backend);
    assert!(first > 0);

    backend.calls.clear();
    exec.execute(&plan, SOURCE, OUTPUT, &mut backend).unwrap();
    let second = resized(&backend);
    assert!(second < first);
    assert!(
        backend
            .calls
            .iter()
            .all(|c| !matches!(c, Call::Create(_)))
    );
}

#[test]
fn uniforms_carry_pass_parameters() {
    let plan = plan(BlurMethod::FixedLog, 74.0, 512, 512);
    let mut backend = backend_for(plan.output_size);
    PyramidExecutor::new()
        .execute(&plan, SOURCE, OUTPUT, &mut backend)
        .unwrap();

    for ((kernel, _, _, u), pass) in backend.transforms().into_iter().zip(&plan.passes) {
        assert_eq!(kernel, pass.kernel);
        assert_eq!(u.src_size_recip, pass.source_size.recip());
        assert_eq!(u.dst_size_recip, pass.dest_size.recip());
        assert_eq!(u.direction, pass.axis);
        match pass.kernel {
            KernelId::Blit => {
                assert_eq!(pass.kind, PassKind::Reduce);
                assert!(u.weights.is_none());
            }
            _ => {
                let w = u.weights.as_ref().unwrap();
                assert!((w.weighted_sum() - 1.0).abs() < 1e-6);
            }
        }
    }
}

#[test]
fn single_pass_plans_read_source_and_write_output() {
    let mut plan = plan(BlurMethod::FixedLogCorrected, 2.0, 32, 32);
    plan.passes.truncate(1);
    plan.passes[0].kind = PassKind::Final;
    let mut backend = backend_for(plan.output_size);
    let mut exec = PyramidExecutor::new();
    exec.execute(&plan, SOURCE, OUTPUT, &mut backend).unwrap();

    let t = backend.transforms();
    assert_eq!(t.len(), 1);
    assert_eq!((t[0].1, t[0].2), (OUTPUT, SOURCE));
    assert_eq!(exec.slot_surfaces(), [None, None]);
}

#[test]
fn output_is_resized_to_plan_size() {
    let plan = plan(BlurMethod::Dyadic, 1.0, 40, 30);
    let mut backend = backend_for(plan.output_size);
    PyramidExecutor::new()
        .execute(&plan, SOURCE, OUTPUT, &mut backend)
        .unwrap();
    assert_eq!(backend.surface_size(OUTPUT).unwrap(), Size2::new(40, 30));
}

#[test]
fn timings_are_recorded_when_backend_has_a_timer() {
    let plan = plan(BlurMethod::RadiusBudget, 30.0, 100, 80);
    let mut backend = backend_for(plan.output_size);
    backend.timer = Some(MockTimer::default());

    let stats = PyramidExecutor::new()
        .execute(&plan, SOURCE, OUTPUT, &mut backend)
        .unwrap();
    let timings = stats.pass_timings.unwrap();
    assert_eq!(timings.len(), plan.len());
    assert_eq!(timings[0], Duration::from_micros(1));
    let begun = &backend.timer.as_ref().unwrap().begun;
    assert_eq!(*begun, (0..plan.len()).collect::<Vec<_>>());
}

#[test]
fn backend_failures_stop_execution() {
    let plan = plan(BlurMethod::FixedLog, 16.0, 64, 64);
    let mut backend = backend_for(plan.output_size);
    backend.fail_at_transform = Some(3);

    let err = PyramidExecutor::new()
        .execute(&plan, SOURCE, OUTPUT, &mut backend)
        .unwrap_err();
    assert!(matches!(err, BlurError::BackendFailure(_)));
    assert_eq!(backend.transforms().len(), 3);
}

#[test]
fn malformed_invocations_are_rejected() {
    let mut exec = PyramidExecutor::new();
    let full = plan(BlurMethod::FixedLog, 16.0, 64, 64);
    let mut backend = backend_for(full.output_size);

    let empty = plan(BlurMethod::FixedLog, 0.0, 64, 64);
    assert!(matches!(
        exec.execute(&empty, SOURCE, OUTPUT, &mut backend),
        Err(BlurError::Validation(_))
    ));
    assert!(exec.execute(&full, SOURCE, SOURCE, &mut backend).is_err());

    let other = plan(BlurMethod::FixedLog, 16.0, 32, 64);
    assert!(exec.execute(&other, SOURCE, OUTPUT, &mut backend).is_err());
    assert!(backend.transforms().is_empty());

    exec.execute(&full, SOURCE, OUTPUT, &mut backend).unwrap();
    let slot = exec.slot_surfaces()[0].unwrap();
    assert!(exec.execute(&full, slot, OUTPUT, &mut backend).is_err());
}
