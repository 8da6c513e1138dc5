// Capability Registry - public enumerations and build-time feature set
//
// Responsibilities:
// - Public adapter/backend enums as seen across the boundary
// - Exhaustive conversion from backend-native enums (no fallback arm, so a
//   new native variant is a compile error here rather than a silent default)
// - Which swap-chain families this build was compiled with

use std::fmt;

use crate::backend::{NativeAdapterType, NativeBackendType};
use crate::error::{Error, Result};

/// Physical kind of an adapter
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AdapterType {
    DiscreteGPU = 0,
    IntegratedGPU = 1,
    CPU = 2,
    #[default]
    Unknown = 3,
}

/// Native graphics API an adapter or device belongs to
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum BackendType {
    #[default]
    Null = 0,
    D3D11 = 1,
    D3D12 = 2,
    Metal = 3,
    Vulkan = 4,
    OpenGL = 5,
    OpenGLES = 6,
}

impl AdapterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiscreteGPU => "DiscreteGPU",
            Self::IntegratedGPU => "IntegratedGPU",
            Self::CPU => "CPU",
            Self::Unknown => "Unknown",
        }
    }
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::D3D11 => "D3D11",
            Self::D3D12 => "D3D12",
            Self::Metal => "Metal",
            Self::Vulkan => "Vulkan",
            Self::OpenGL => "OpenGL",
            Self::OpenGLES => "OpenGLES",
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Raw values only arrive from C callers; anything else is a caller bug.
impl TryFrom<i32> for AdapterType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::DiscreteGPU),
            1 => Ok(Self::IntegratedGPU),
            2 => Ok(Self::CPU),
            3 => Ok(Self::Unknown),
            _ => Err(Error::internal(format!("invalid adapter type: {}", value))),
        }
    }
}

impl TryFrom<i32> for BackendType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Null),
            1 => Ok(Self::D3D11),
            2 => Ok(Self::D3D12),
            3 => Ok(Self::Metal),
            4 => Ok(Self::Vulkan),
            5 => Ok(Self::OpenGL),
            6 => Ok(Self::OpenGLES),
            _ => Err(Error::internal(format!("invalid backend type: {}", value))),
        }
    }
}

pub fn convert_adapter_type(native: NativeAdapterType) -> AdapterType {
    match native {
        NativeAdapterType::DiscreteGpu => AdapterType::DiscreteGPU,
        NativeAdapterType::IntegratedGpu => AdapterType::IntegratedGPU,
        NativeAdapterType::Cpu => AdapterType::CPU,
        NativeAdapterType::Unknown => AdapterType::Unknown,
    }
}

pub fn convert_backend_type(native: NativeBackendType) -> BackendType {
    match native {
        NativeBackendType::Vulkan => BackendType::Vulkan,
        NativeBackendType::D3D12 => BackendType::D3D12,
        NativeBackendType::D3D11 => BackendType::D3D11,
        NativeBackendType::Metal => BackendType::Metal,
        NativeBackendType::OpenGL => BackendType::OpenGL,
        NativeBackendType::OpenGLES => BackendType::OpenGLES,
        NativeBackendType::Null => BackendType::Null,
    }
}

/// Swap-chain families compiled into this build.
///
/// Resolved at build time; the API surface is the same on every platform and
/// callers ask here instead of probing for missing functions.
///
/// `d3d12_swap_chain` only says the D3D12 swap-chain path is compiled in. No
/// backend in this crate discovers real D3D12 adapters; only null-backend
/// adapters configured as `d3d12` produce devices that can take that path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub vulkan_swap_chain: bool,
    pub d3d12_swap_chain: bool,
}

impl Capabilities {
    pub const fn current() -> Self {
        Self {
            vulkan_swap_chain: true,
            d3d12_swap_chain: cfg!(windows),
        }
    }

    pub fn supports_swap_chain(&self, backend: BackendType) -> bool {
        match backend {
            BackendType::Vulkan => self.vulkan_swap_chain,
            BackendType::D3D12 => self.d3d12_swap_chain,
            BackendType::Null
            | BackendType::D3D11
            | BackendType::Metal
            | BackendType::OpenGL
            | BackendType::OpenGLES => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE_BACKENDS: [NativeBackendType; 7] = [
        NativeBackendType::Vulkan,
        NativeBackendType::D3D12,
        NativeBackendType::D3D11,
        NativeBackendType::Metal,
        NativeBackendType::OpenGL,
        NativeBackendType::OpenGLES,
        NativeBackendType::Null,
    ];

    #[test]
    fn backend_conversion_is_injective() {
        let mut seen: Vec<BackendType> = NATIVE_BACKENDS
            .iter()
            .map(|&native| convert_backend_type(native))
            .collect();
        seen.sort_by_key(|backend| *backend as i32);
        seen.dedup();
        assert_eq!(seen.len(), NATIVE_BACKENDS.len());
    }

    #[test]
    fn raw_values_round_trip() {
        for native in NATIVE_BACKENDS {
            let backend = convert_backend_type(native);
            assert_eq!(BackendType::try_from(backend as i32), Ok(backend));
        }
        for adapter in [
            AdapterType::DiscreteGPU,
            AdapterType::IntegratedGPU,
            AdapterType::CPU,
            AdapterType::Unknown,
        ] {
            assert_eq!(AdapterType::try_from(adapter as i32), Ok(adapter));
        }
    }

    #[test]
    fn unknown_raw_values_are_rejected() {
        assert!(BackendType::try_from(7).is_err());
        assert!(AdapterType::try_from(-1).is_err());
    }

    #[test]
    fn swap_chain_capabilities_follow_target() {
        let caps = Capabilities::current();
        assert!(caps.supports_swap_chain(BackendType::Vulkan));
        assert_eq!(caps.supports_swap_chain(BackendType::D3D12), cfg!(windows));
        assert!(!caps.supports_swap_chain(BackendType::Metal));
        assert!(!caps.supports_swap_chain(BackendType::Null));
    }

    #[test]
    fn capabilities_only_describe_swap_chain_families() {
        assert_eq!(
            Capabilities::current(),
            Capabilities {
                vulkan_swap_chain: true,
                d3d12_swap_chain: cfg!(windows),
            }
        );
    }
}
