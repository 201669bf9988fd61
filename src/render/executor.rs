use std::time::Duration;

use crate::{
    foundation::{
        core::Size2,
        error::{BlurError, BlurResult},
    },
    render::backend::{SurfaceId, TransformBackend, Uniforms},
    schedule::plan::Plan,
};

/// What one plan execution did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionStats {
    pub passes: usize,
    /// Per-pass durations; `None` when the backend has no timer.
    pub pass_timings: Option<Vec<Duration>>,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    id: SurfaceId,
    size: Size2,
}

/// Runs a [`Plan`] on a backend using two ping-pong intermediate surfaces.
///
/// Pass `i` writes slot `i % 2` (the caller's output for the last pass) and reads whatever the
/// previous pass wrote, so a pass never samples its own destination. Slots persist across runs
/// and are only reallocated when a pass needs a different size.
#[derive(Debug, Default)]
pub struct PyramidExecutor {
    slots: [Option<Slot>; 2],
}

impl PyramidExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surfaces currently held by the two slots.
    pub fn slot_surfaces(&self) -> [Option<SurfaceId>; 2] {
        self.slots.map(|s| s.map(|s| s.id))
    }

    #[tracing::instrument(skip_all, fields(method = ?plan.method, passes = plan.len()))]
    pub fn execute<B: TransformBackend + ?Sized>(
        &mut self,
        plan: &Plan,
        source: SurfaceId,
        output: SurfaceId,
        backend: &mut B,
    ) -> BlurResult<ExecutionStats> {
        if plan.is_empty() {
            return Err(BlurError::validation("cannot execute an empty plan"));
        }
        if source == output {
            return Err(BlurError::validation(
                "source and output must be distinct surfaces",
            ));
        }
        let slots = self.slot_surfaces();
        if slots.contains(&Some(source)) || slots.contains(&Some(output)) {
            return Err(BlurError::validation(
                "source and output must not be executor slots",
            ));
        }
        let input_size = backend.surface_size(source)?;
        if input_size != plan.output_size {
            return Err(BlurError::validation(format!(
                "source is {input_size}, plan expects {}",
                plan.output_size
            )));
        }
        if backend.surface_size(output)? != plan.output_size {
            backend.resize(output, plan.output_size.width, plan.output_size.height)?;
        }

        let last = plan.len() - 1;
        let mut timings = backend.timer().is_some().then(|| Vec::with_capacity(plan.len()));
        let mut read = source;

        for (i, pass) in plan.passes.iter().enumerate() {
            let dest = if i == last {
                output
            } else {
                self.slot(i % 2, pass.dest_size, backend)?
            };

            let mut uniforms = Uniforms::new(pass.source_size, pass.dest_size);
            uniforms.direction = pass.axis;
            uniforms.weights = pass.weights();

            if let Some(timer) = backend.timer() {
                timer.begin_pass(i);
            }
            backend.run_transform(pass.kernel, dest, read, &uniforms)?;
            if let (Some(ts), Some(timer)) = (timings.as_mut(), backend.timer()) {
                ts.push(timer.end_pass(i).unwrap_or_default());
            }

            tracing::debug!(
                pass = i,
                kind = ?pass.kind,
                kernel = ?pass.kernel,
                src = %pass.source_size,
                dst = %pass.dest_size,
                radius = pass.effective_radius,
                "ran pass"
            );
            read = dest;
        }

        Ok(ExecutionStats {
            passes: plan.len(),
            pass_timings: timings,
        })
    }

    fn slot<B: TransformBackend + ?Sized>(
        &mut self,
        index: usize,
        size: Size2,
        backend: &mut B,
    ) -> BlurResult<SurfaceId> {
        match self.slots[index] {
            Some(slot) if slot.size == size => Ok(slot.id),
            Some(slot) => {
                backend.resize(slot.id, size.width, size.height)?;
                self.slots[index] = Some(Slot { id: slot.id, size });
                Ok(slot.id)
            }
            None => {
                let id = backend.create_buffer(size.width, size.height)?;
                self.slots[index] = Some(Slot { id, size });
                Ok(id)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/executor.rs"]
mod tests;
