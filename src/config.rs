use std::{fs::File, io::BufReader, path::Path};

use crate::{
    engine::blur_engine::EngineOpts,
    foundation::error::{BlurError, BlurResult},
    quality::ssim::MeanSsim,
    render::cpu::CpuBackendOpts,
    schedule::scheduler::ScheduleOpts,
};

/// JSON-facing configuration. Every field is optional and falls back to its default.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub schedule: ScheduleOpts,
    pub cpu: CpuBackendOpts,
    pub ssim: MeanSsim,
}

impl Config {
    pub fn from_reader<R: std::io::Read>(r: R) -> BlurResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| BlurError::validation(format!("parse config JSON: {e}")))?;
        cfg.schedule.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> BlurResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            BlurError::validation(format!("open config JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn engine_opts(&self) -> EngineOpts {
        EngineOpts {
            schedule: self.schedule,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
