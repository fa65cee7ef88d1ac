use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("hx711 data-ready timeout")]
    DataReadyTimeout,
    #[error("invalid reference unit: {0} (must be finite and non-zero)")]
    InvalidReferenceUnit(f64),
}

pub type Result<T> = std::result::Result<T, HwError>;
