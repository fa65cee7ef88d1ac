use tensile_hardware::error::HwError;
use thiserror::Error;

/// Typed failures surfaced by the rig. Wrapped in `eyre::Report` at the API
/// boundary; callers recover the variant with `downcast_ref::<RigError>()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RigError {
    #[error("a test run is already in progress")]
    Busy,
    #[error("invalid run config: {0}")]
    InvalidConfig(String),
    #[error("motion error: {0}")]
    Motion(String),
    #[error("log file error: {0}")]
    LogFile(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("calibration error: {0}")]
    Calibration(String),
}

impl From<HwError> for RigError {
    fn from(e: HwError) -> Self {
        match e {
            HwError::InvalidReferenceUnit(_) => Self::Calibration(e.to_string()),
            other => Self::Hardware(other.to_string()),
        }
    }
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
