// Error types - everything the façade can report
//
// No recovery happens here: backend failures are mapped to one of four kinds
// and handed straight back to the caller.

use ash::vk;
use thiserror::Error;

use crate::registry::BackendType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Adapter index outside the most recent discovery pass
    #[error("adapter index {index} out of range ({count} adapters discovered)")]
    OutOfRange { index: usize, count: usize },

    /// The backend rejected the device descriptor
    #[error("device creation failed: {0}")]
    DeviceCreationFailed(String),

    /// Operation invoked against a device of the wrong backend family, or a
    /// family that is not compiled into this build
    #[error("{operation} is not supported for {backend} devices")]
    UnsupportedBackend {
        backend: BackendType,
        operation: &'static str,
    },

    /// Opaque failure from the wrapped library
    #[error("backend internal error: {0}")]
    BackendInternal(String),
}

impl Error {
    pub(crate) fn device_creation(message: impl Into<String>) -> Self {
        Self::DeviceCreationFailed(message.into())
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::BackendInternal(message.into())
    }
}

impl From<vk::Result> for Error {
    fn from(result: vk::Result) -> Self {
        Self::BackendInternal(format!("vulkan: {}", result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vulkan_results_are_internal_errors() {
        let err: Error = vk::Result::ERROR_OUT_OF_HOST_MEMORY.into();
        assert!(matches!(err, Error::BackendInternal(_)));
    }

    #[test]
    fn unsupported_backend_names_the_operation() {
        let err = Error::UnsupportedBackend {
            backend: BackendType::Null,
            operation: "vulkan_instance",
        };
        assert_eq!(
            err.to_string(),
            "vulkan_instance is not supported for Null devices"
        );
    }
}
