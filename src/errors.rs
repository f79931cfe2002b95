// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the pipeline handler

use crate::media::formats::DeviceFormat;
use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for raw hardware device calls
pub type HwResult<T> = Result<T, HwError>;

/// Failure reported by a hardware device call
///
/// Device calls report a signed result where a negative value carries the
/// error code. `errno` stores that code as a positive value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwError {
    /// Device operation that failed (e.g. "VIDIOC_STREAMON")
    pub operation: String,
    /// Positive errno value
    pub errno: i32,
}

impl HwError {
    pub fn new(operation: impl Into<String>, errno: i32) -> Self {
        Self {
            operation: operation.into(),
            errno: errno.saturating_abs(),
        }
    }

    /// Build from a signed return value (`ret < 0` carries `-errno`)
    pub fn from_ret(operation: impl Into<String>, ret: i32) -> Option<Self> {
        if ret < 0 {
            Some(Self::new(operation, ret.saturating_neg()))
        } else {
            None
        }
    }

    /// Signed return value as the device layer reports it
    pub fn as_ret(&self) -> i32 {
        -self.errno
    }
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed: {}",
            self.operation,
            std::io::Error::from_raw_os_error(self.errno)
        )
    }
}

impl std::error::Error for HwError {}

/// Pipeline handler error taxonomy
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Entity, link, device or camera absent
    NotFound(String),
    /// Request exceeds hardware capability
    InvalidConfiguration(String),
    /// Negotiated capture format differs from the requested one
    ConfigurationMismatch {
        requested: DeviceFormat,
        accepted: DeviceFormat,
    },
    /// Hardware exported fewer buffers than requested
    ResourceExhausted { requested: u32, exported: u32 },
    /// Malformed client request
    InvalidRequest(String),
    /// Propagated device call failure
    Hardware(HwError),
    /// Completion arrived in a state that should be impossible
    InternalInconsistency(String),
    /// Operation not allowed in the camera's current state
    InvalidState(String),
    /// Configuration file errors
    Config(String),
}

impl PipelineError {
    /// Errno of the underlying hardware failure, if any
    pub fn errno(&self) -> Option<i32> {
        match self {
            PipelineError::Hardware(e) => Some(e.errno),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::NotFound(msg) => write!(f, "Not found: {}", msg),
            PipelineError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            PipelineError::ConfigurationMismatch {
                requested,
                accepted,
            } => write!(
                f,
                "Configuration mismatch: requested {}, capture node accepted {}",
                requested, accepted
            ),
            PipelineError::ResourceExhausted {
                requested,
                exported,
            } => write!(
                f,
                "Resource exhausted: requested {} buffers, hardware exported {}",
                requested, exported
            ),
            PipelineError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            PipelineError::Hardware(e) => write!(f, "Hardware error: {}", e),
            PipelineError::InternalInconsistency(msg) => {
                write!(f, "Internal inconsistency: {}", msg)
            }
            PipelineError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Hardware(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HwError> for PipelineError {
    fn from(err: HwError) -> Self {
        PipelineError::Hardware(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hw_error_from_signed_result() {
        assert!(HwError::from_ret("MEDIA_IOC_SETUP_LINK", 0).is_none());

        let err = HwError::from_ret("MEDIA_IOC_SETUP_LINK", -libc::EBUSY).unwrap();
        assert_eq!(err.errno, libc::EBUSY);
        assert_eq!(err.as_ret(), -libc::EBUSY);
        assert!(err.to_string().starts_with("MEDIA_IOC_SETUP_LINK failed"));
    }

    #[test]
    fn test_hardware_errno_is_exposed() {
        let err: PipelineError = HwError::new("VIDIOC_STREAMON", libc::EIO).into();
        assert_eq!(err.errno(), Some(libc::EIO));
        assert_eq!(PipelineError::NotFound("x".into()).errno(), None);
    }

    #[test]
    fn test_extreme_return_values_saturate() {
        let err = HwError::from_ret("VIDIOC_DQBUF", i32::MIN).unwrap();
        assert_eq!(err.errno, i32::MAX);
        assert_eq!(err.as_ret(), -i32::MAX);
        assert_eq!(HwError::new("VIDIOC_DQBUF", i32::MIN).errno, i32::MAX);
    }
}
