use crate::{
    foundation::core::{Axis, Size2},
    kernel::weights::{KernelWeights, TapPattern, weights},
};

/// Which variant of the pyramid is built.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BlurMethod {
    /// `max(1, floor(log2 R) - 1)` halvings, separable blur at the working level, footprint
    /// reconstruction.
    #[default]
    FixedLog,
    /// Same as [`BlurMethod::FixedLog`] with the pass count floored at 0 instead of 1.
    FixedLogCorrected,
    /// Radius consumed in quadrature over non-power-of-two levels, footprint kernels both ways.
    RadiusBudget,
    /// Fixed level count and fixed per-level radius, ignoring the requested radius.
    Dyadic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Down phase; may keep the size when the level does not shrink.
    Reduce,
    /// Same-size pass at the working level.
    Blur,
    /// Up phase.
    Reconstruct,
    /// Last pass of the up phase; always targets the requested output size.
    Final,
}

/// Transform kernel a pass binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelId {
    /// Single bilinear tap: a copy when sizes match, a 2×2 box on exact halving.
    Blit,
    /// 1D Gaussian along [`PassSpec::axis`].
    Separable,
    /// 6-tap half-integer footprint, three columns along the given axis.
    Footprint6(Axis),
    /// 9-tap integer footprint.
    Footprint9,
}

/// One step of a [`Plan`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PassSpec {
    pub kind: PassKind,
    pub source_size: Size2,
    pub dest_size: Size2,
    /// Blur radius in source pixels of this pass; `0` for pure resampling.
    pub effective_radius: f32,
    /// Output pixels per source pixel, per axis.
    pub scale: [f32; 2],
    /// Direction of a separable pass.
    pub axis: Option<Axis>,
    pub kernel: KernelId,
}

impl PassSpec {
    pub(crate) fn new(kind: PassKind, source: Size2, dest: Size2, output: Size2) -> Self {
        Self {
            kind,
            source_size: source,
            dest_size: dest,
            effective_radius: 0.0,
            scale: scale_of(source, output),
            axis: None,
            kernel: KernelId::Blit,
        }
    }

    pub(crate) fn with_kernel(mut self, kernel: KernelId, effective_radius: f32) -> Self {
        self.kernel = kernel;
        self.effective_radius = effective_radius;
        self
    }

    pub(crate) fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = Some(axis);
        self
    }

    /// Tap pattern the kernel samples, `None` for a plain blit.
    pub fn tap_pattern(&self) -> Option<TapPattern> {
        match self.kernel {
            KernelId::Blit => None,
            KernelId::Separable => Some(TapPattern::separable_for_radius(self.effective_radius)),
            KernelId::Footprint6(wide) => Some(TapPattern::Footprint6 { wide }),
            KernelId::Footprint9 => Some(TapPattern::Footprint9),
        }
    }

    /// Freshly synthesized weights for this pass.
    pub fn weights(&self) -> Option<KernelWeights> {
        if self.effective_radius <= 0.0 {
            return None;
        }
        self.tap_pattern()
            .map(|pattern| weights(self.effective_radius, pattern))
    }
}

/// Output pixels per pixel of `grid`, per axis.
pub(crate) fn scale_of(grid: Size2, output: Size2) -> [f32; 2] {
    [
        output.width as f32 / grid.width as f32,
        output.height as f32 / grid.height as f32,
    ]
}

/// Immutable pass sequence produced by the scheduler and consumed by one executor run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Plan {
    pub method: BlurMethod,
    pub requested_radius: f32,
    pub output_size: Size2,
    pub passes: Vec<PassSpec>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// An empty plan means "no blur": the output is the source.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn reduction_count(&self) -> usize {
        self.count(|k| k == PassKind::Reduce)
    }

    pub fn reconstruction_count(&self) -> usize {
        self.count(|k| matches!(k, PassKind::Reconstruct | PassKind::Final))
    }

    /// Smallest resolution any pass writes.
    pub fn working_size(&self) -> Option<Size2> {
        self.passes
            .iter()
            .map(|p| p.dest_size)
            .min_by_key(|s| u64::from(s.width) * u64::from(s.height))
    }

    /// `sqrt(Σ (effective_radius · scale)²)` along `axis`, in output pixels.
    ///
    /// Separable passes only contribute to their own axis.
    pub fn quadrature_radius(&self, axis: Axis) -> f64 {
        let i = match axis {
            Axis::Horizontal => 0,
            Axis::Vertical => 1,
        };
        self.passes
            .iter()
            .filter(|p| p.axis.is_none_or(|a| a == axis))
            .map(|p| {
                let r = f64::from(p.effective_radius) * f64::from(p.scale[i]);
                r * r
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Check that sizes chain and the last pass lands on the output size.
    pub fn is_chained(&self) -> bool {
        let links_ok = self
            .passes
            .windows(2)
            .all(|w| w[0].dest_size == w[1].source_size);
        let first_ok = self
            .passes
            .first()
            .is_none_or(|p| p.source_size == self.output_size);
        let last_ok = self
            .passes
            .last()
            .is_none_or(|p| p.dest_size == self.output_size);
        links_ok && first_ok && last_ok
    }

    fn count(&self, f: impl Fn(PassKind) -> bool) -> usize {
        self.passes.iter().filter(|p| f(p.kind)).count()
    }
}
