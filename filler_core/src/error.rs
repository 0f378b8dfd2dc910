use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FillerError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for sensor")]
    Timeout,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing station io")]
    MissingIo,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

// Map any boxed hardware error to a typed FillerError, with precise
// handling when the concrete filler_hardware error type is available.
pub(crate) fn map_hw_error_dyn(e: &(dyn std::error::Error + 'static)) -> FillerError {
    #[cfg(feature = "hardware-errors")]
    {
        use filler_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => FillerError::Timeout,
                other => FillerError::HardwareFault(other.to_string()),
            };
        }
    }
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        FillerError::Timeout
    } else {
        FillerError::Hardware(s)
    }
}
