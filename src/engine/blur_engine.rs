use std::time::Duration;

use crate::{
    foundation::{core::ImageRgba8, error::BlurResult},
    render::{
        backend::{BackendKind, SurfaceId, TransformBackend, create_backend},
        cpu::CpuBackendOpts,
        executor::PyramidExecutor,
    },
    schedule::{
        plan::{BlurMethod, Plan},
        scheduler::{PassScheduler, ScheduleOpts},
    },
};

/// Options for [`BlurEngine`].
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineOpts {
    pub schedule: ScheduleOpts,
}

/// Observable lifecycle of a [`BlurEngine`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    Scheduling,
    Executing,
}

/// Plan-level statistics of one blur.
#[derive(Clone, Debug, PartialEq)]
pub struct BlurStats {
    pub plan: Plan,
    /// Present only when the backend advertises a timer and at least one pass ran.
    pub pass_timings: Option<Vec<Duration>>,
}

/// Façade tying the scheduler, the executor and a backend together.
///
/// Every call re-plans from scratch; only the backend and the surfaces it owns persist between
/// calls. A failed call returns an error and leaves nothing half-published.
pub struct BlurEngine {
    scheduler: PassScheduler,
    executor: PyramidExecutor,
    backend: Box<dyn TransformBackend>,
    source: Option<SurfaceId>,
    output: Option<SurfaceId>,
    state: EngineState,
}

impl BlurEngine {
    pub fn new(backend: Box<dyn TransformBackend>, opts: EngineOpts) -> Self {
        Self {
            scheduler: PassScheduler::new(opts.schedule),
            executor: PyramidExecutor::new(),
            backend,
            source: None,
            output: None,
            state: EngineState::Idle,
        }
    }

    /// Engine over the software backend.
    pub fn cpu(opts: EngineOpts, cpu: CpuBackendOpts) -> BlurResult<Self> {
        Ok(Self::new(create_backend(BackendKind::Cpu, cpu)?, opts))
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn scheduler(&self) -> &PassScheduler {
        &self.scheduler
    }

    pub fn blur(
        &mut self,
        source: &ImageRgba8,
        radius: f32,
        method: BlurMethod,
    ) -> BlurResult<ImageRgba8> {
        self.blur_with_stats(source, radius, method)
            .map(|(image, _)| image)
    }

    #[tracing::instrument(skip(self, source), fields(size = %source.size()))]
    pub fn blur_with_stats(
        &mut self,
        source: &ImageRgba8,
        radius: f32,
        method: BlurMethod,
    ) -> BlurResult<(ImageRgba8, BlurStats)> {
        let result = self.run(source, radius, method);
        self.transition(EngineState::Idle);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "blur failed");
        }
        result
    }

    fn run(
        &mut self,
        source: &ImageRgba8,
        radius: f32,
        method: BlurMethod,
    ) -> BlurResult<(ImageRgba8, BlurStats)> {
        self.transition(EngineState::Scheduling);
        source.validate()?;
        let plan = self
            .scheduler
            .plan(method, radius, source.width, source.height)?;
        if plan.is_empty() {
            return Ok((
                source.clone(),
                BlurStats {
                    plan,
                    pass_timings: None,
                },
            ));
        }

        self.transition(EngineState::Executing);
        let src = self.surface(SurfaceRole::Source, source)?;
        let out = self.surface(SurfaceRole::Output, source)?;
        self.backend.upload(src, source)?;
        let stats = self
            .executor
            .execute(&plan, src, out, self.backend.as_mut())?;
        let image = self.backend.readback(out)?;

        Ok((
            image,
            BlurStats {
                plan,
                pass_timings: stats.pass_timings,
            },
        ))
    }

    fn surface(&mut self, role: SurfaceRole, like: &ImageRgba8) -> BlurResult<SurfaceId> {
        let slot = match role {
            SurfaceRole::Source => &mut self.source,
            SurfaceRole::Output => &mut self.output,
        };
        if let Some(id) = *slot {
            return Ok(id);
        }
        let id = self.backend.create_buffer(like.width, like.height)?;
        *slot = Some(id);
        Ok(id)
    }

    fn transition(&mut self, next: EngineState) {
        tracing::trace!(from = ?self.state, to = ?next, "engine state");
        self.state = next;
    }
}

#[derive(Clone, Copy)]
enum SurfaceRole {
    Source,
    Output,
}

#[cfg(test)]
#[path = "../../tests/unit/engine/blur_engine.rs"]
mod tests;
