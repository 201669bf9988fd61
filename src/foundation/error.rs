/// Convenience result type used across pyrblur.
pub type BlurResult<T> = Result<T, BlurError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Every variant is terminal for the `blur()` call that produced it. Nothing inside the crate
/// retries; fallback policy (for example switching from the radius-budget schedule to fixed-log)
/// belongs to the caller.
#[derive(thiserror::Error, Debug)]
pub enum BlurError {
    /// The requested radius is negative or not a finite number.
    #[error("invalid radius: {0}")]
    InvalidRadius(f32),

    /// The radius-budget schedule did not converge within its iteration cap.
    #[error("unschedulable radius {radius}: {left} px of radius left after {iterations} steps")]
    UnschedulableRadius {
        /// Radius requested by the caller.
        radius: f32,
        /// Radius still unassigned when the cap was hit.
        left: f32,
        /// Iterations performed.
        iterations: u32,
    },

    /// The execution backend could not perform a pass.
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// Malformed images, mismatched sizes or otherwise invalid caller data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BlurError {
    /// Build a [`BlurError::BackendFailure`] value.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendFailure(msg.into())
    }

    /// Build a [`BlurError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
