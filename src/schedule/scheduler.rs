use std::f64::consts::SQRT_2;

use crate::{
    foundation::{
        core::{Axis, Size2},
        error::{BlurError, BlurResult},
    },
    schedule::plan::{BlurMethod, KernelId, PassKind, PassSpec, Plan, scale_of},
};

/// Tunables for the scheduling policies.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScheduleOpts {
    /// Radius one radius-budget step contributes, in pixels of the level it runs at.
    pub step_radius: f32,
    /// Radius left over below which the radius-budget loop stops.
    pub epsilon: f32,
    /// Radius-budget iteration cap.
    pub max_iterations: u32,
    /// Halvings performed by [`BlurMethod::Dyadic`].
    pub dyadic_levels: u32,
    /// Per-level radius used by [`BlurMethod::Dyadic`].
    pub dyadic_step_radius: f32,
}

impl Default for ScheduleOpts {
    fn default() -> Self {
        Self {
            step_radius: 2.0,
            epsilon: 0.001,
            max_iterations: 16,
            dyadic_levels: 4,
            dyadic_step_radius: 2.0,
        }
    }
}

impl ScheduleOpts {
    pub fn validate(&self) -> BlurResult<()> {
        if !(self.step_radius.is_finite() && self.step_radius > 0.0) {
            return Err(BlurError::validation("step_radius must be > 0"));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(BlurError::validation("epsilon must be > 0"));
        }
        if self.max_iterations == 0 {
            return Err(BlurError::validation("max_iterations must be >= 1"));
        }
        if self.dyadic_levels == 0 {
            return Err(BlurError::validation("dyadic_levels must be >= 1"));
        }
        if !(self.dyadic_step_radius.is_finite() && self.dyadic_step_radius > 0.0) {
            return Err(BlurError::validation("dyadic_step_radius must be > 0"));
        }
        Ok(())
    }
}

/// Floor applied to the fixed-log pass count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassCountFormula {
    /// `max(1, floor(log2 R) - 1)`: small radii still get one halving and under-blur.
    Literal,
    /// `max(0, floor(log2 R) - 1)`: small radii blur at full resolution.
    Corrected,
}

/// Number of halvings the fixed-log policy performs for `radius`.
pub fn fixed_log_pass_count(radius: f32, formula: PassCountFormula) -> u32 {
    let floor = match formula {
        PassCountFormula::Literal => 1.0,
        PassCountFormula::Corrected => 0.0,
    };
    (f64::from(radius).log2().floor() - 1.0).max(floor) as u32
}

/// One iteration of the radius-budget loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BudgetStep {
    pub scale_factor: f64,
    /// Cumulative scale after this step.
    pub total_scale: f64,
    /// Radius consumed by this step, in output pixels.
    pub radius: f64,
}

/// Consume `radius` in quadrature into steps of `step_radius · total_scale`.
///
/// Radii at or below `epsilon` produce no steps.
pub fn radius_budget_steps(radius: f32, opts: &ScheduleOpts) -> BlurResult<Vec<BudgetStep>> {
    let step_radius = f64::from(opts.step_radius);
    let epsilon = f64::from(opts.epsilon);

    let mut total_scale = 1.0f64;
    let mut left = f64::from(radius);
    let mut steps = Vec::new();
    while left > epsilon {
        if steps.len() >= opts.max_iterations as usize {
            return Err(BlurError::UnschedulableRadius {
                radius,
                left: left as f32,
                iterations: steps.len() as u32,
            });
        }
        let scale_factor = (left / (total_scale * step_radius)).min(2.0);
        total_scale *= scale_factor;
        let consumed = (step_radius * total_scale).min(left);
        left = (left * left - consumed * consumed).max(0.0).sqrt();
        steps.push(BudgetStep {
            scale_factor,
            total_scale,
            radius: consumed,
        });
    }
    Ok(steps)
}

/// Pure planner turning `(radius, size, method)` into a [`Plan`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PassScheduler {
    opts: ScheduleOpts,
}

impl PassScheduler {
    pub fn new(opts: ScheduleOpts) -> Self {
        Self { opts }
    }

    pub fn opts(&self) -> &ScheduleOpts {
        &self.opts
    }

    #[tracing::instrument(skip(self))]
    pub fn plan(
        &self,
        method: BlurMethod,
        radius: f32,
        width: u32,
        height: u32,
    ) -> BlurResult<Plan> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(BlurError::InvalidRadius(radius));
        }
        let output = Size2::new(width, height);
        if output.is_empty() {
            return Err(BlurError::validation(format!(
                "cannot schedule a blur for a {output} image"
            )));
        }
        self.opts.validate()?;

        let passes = if radius == 0.0 {
            Vec::new()
        } else {
            match method {
                BlurMethod::FixedLog => {
                    fixed_log_passes(radius, output, PassCountFormula::Literal)
                }
                BlurMethod::FixedLogCorrected => {
                    fixed_log_passes(radius, output, PassCountFormula::Corrected)
                }
                BlurMethod::RadiusBudget => {
                    let steps = radius_budget_steps(radius, &self.opts)?;
                    budget_passes(&steps, output)
                }
                BlurMethod::Dyadic => dyadic_passes(&self.opts, output),
            }
        };

        let plan = Plan {
            method,
            requested_radius: radius,
            output_size: output,
            passes,
        };
        tracing::debug!(
            passes = plan.len(),
            reductions = plan.reduction_count(),
            working = ?plan.working_size(),
            "scheduled blur"
        );
        Ok(plan)
    }
}

fn halving_levels(output: Size2, count: u32) -> Vec<Size2> {
    let mut levels = vec![output];
    for _ in 0..count {
        let next = levels[levels.len() - 1].halved();
        levels.push(next);
    }
    levels
}

fn footprint6_orientation(level: usize) -> Axis {
    if level % 2 == 0 {
        Axis::Horizontal
    } else {
        Axis::Vertical
    }
}

/// Mirror `levels` back up to `levels[0]`; the last pass is [`PassKind::Final`].
fn push_reconstruction(
    passes: &mut Vec<PassSpec>,
    levels: &[Size2],
    output: Size2,
    kernel_for: impl Fn(usize, &PassSpec) -> (KernelId, f32),
) {
    for k in (0..levels.len().saturating_sub(1)).rev() {
        let kind = if k == 0 {
            PassKind::Final
        } else {
            PassKind::Reconstruct
        };
        let pass = PassSpec::new(kind, levels[k + 1], levels[k], output);
        let (kernel, radius) = kernel_for(k, &pass);
        passes.push(pass.with_kernel(kernel, radius));
    }
}

/// Footprint radius folded into each fixed-log reconstruction pass, in source pixels of the pass.
const FIXED_LOG_RECONSTRUCT_RADIUS: f32 = 1.0;

fn fixed_log_passes(radius: f32, output: Size2, formula: PassCountFormula) -> Vec<PassSpec> {
    let n = fixed_log_pass_count(radius, formula);
    let levels = halving_levels(output, n);
    let mut passes = Vec::with_capacity(2 * levels.len());

    for k in 0..n as usize {
        passes.push(PassSpec::new(
            PassKind::Reduce,
            levels[k],
            levels[k + 1],
            output,
        ));
    }

    // Reconstruction variance per axis, in output pixels². `fold` caps it at half of R², the
    // separable pair takes the rest.
    let r = f64::from(radius);
    let up_sq = |axis: usize| -> f64 {
        levels[1..]
            .iter()
            .map(|&l| {
                let s = f64::from(FIXED_LOG_RECONSTRUCT_RADIUS * scale_of(l, output)[axis]);
                s * s
            })
            .sum()
    };
    let (up_x, up_y) = (up_sq(0), up_sq(1));
    let widest = up_x.max(up_y);
    let fold = if widest > 0.0 {
        (r * r / (2.0 * widest)).sqrt().min(1.0)
    } else {
        1.0
    };
    let left = |up: f64, scale: f32| {
        ((r * r - fold * fold * up).max(0.0).sqrt() / f64::from(scale)) as f32
    };

    let work = levels[levels.len() - 1];
    let [sx, sy] = scale_of(work, output);
    passes.push(
        PassSpec::new(PassKind::Blur, work, work, output)
            .with_kernel(KernelId::Separable, left(up_x, sx))
            .with_axis(Axis::Horizontal),
    );
    passes.push(
        PassSpec::new(PassKind::Blur, work, work, output)
            .with_kernel(KernelId::Separable, left(up_y, sy))
            .with_axis(Axis::Vertical),
    );

    let up_radius = (f64::from(FIXED_LOG_RECONSTRUCT_RADIUS) * fold) as f32;
    push_reconstruction(&mut passes, &levels, output, |_, _| {
        (KernelId::Footprint9, up_radius)
    });
    passes
}

fn budget_passes(steps: &[BudgetStep], output: Size2) -> Vec<PassSpec> {
    let mut levels = vec![output];
    for step in steps {
        let prev = levels[levels.len() - 1];
        let next = output.scaled_down(step.total_scale);
        levels.push(Size2::new(
            next.width.min(prev.width),
            next.height.min(prev.height),
        ));
    }

    // Each step's variance is split evenly between its down and up pass.
    let shares: Vec<f64> = steps.iter().map(|s| s.radius / SQRT_2).collect();
    let mut passes = Vec::with_capacity(2 * steps.len());

    for (k, &share) in shares.iter().enumerate() {
        let pass = PassSpec::new(PassKind::Reduce, levels[k], levels[k + 1], output);
        let r = (share / f64::from(pass.scale[0])) as f32;
        passes.push(pass.with_kernel(KernelId::Footprint6(footprint6_orientation(k)), r));
    }
    push_reconstruction(&mut passes, &levels, output, |k, pass| {
        let r = (shares[k] / f64::from(pass.scale[0])) as f32;
        (KernelId::Footprint9, r)
    });
    passes
}

fn dyadic_passes(opts: &ScheduleOpts, output: Size2) -> Vec<PassSpec> {
    let levels = halving_levels(output, opts.dyadic_levels);
    let r = opts.dyadic_step_radius;
    let mut passes = Vec::with_capacity(2 * levels.len());

    for k in 0..opts.dyadic_levels as usize {
        passes.push(
            PassSpec::new(PassKind::Reduce, levels[k], levels[k + 1], output)
                .with_kernel(KernelId::Footprint6(footprint6_orientation(k)), r),
        );
    }
    push_reconstruction(&mut passes, &levels, output, |_, _| {
        (KernelId::Footprint9, r)
    });
    passes
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scheduler.rs"]
mod tests;
