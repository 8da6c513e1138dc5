// Backend module - the seam between the façade and native GPU backends
//
// Backends expose discovery and device creation through these traits only.
// Nothing above this module reads a backend's memory layout.
//
// Backends:
// - vulkan: ash-based, probes the host's Vulkan loader
// - null:   in-process, adapters come from configuration (testing)

pub mod null;
pub mod swapchain;
pub mod vulkan;

use ash::vk;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::swap_chain::{Hwnd, PresentMode, TextureFormat};

pub use null::{MockAdapter, NullBackend};
pub use vulkan::{VulkanBackend, VulkanBackendConfig};

/// Adapter kind as reported by a backend
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
pub enum NativeAdapterType {
    #[serde(rename = "discrete_gpu")]
    DiscreteGpu,
    #[serde(rename = "integrated_gpu")]
    IntegratedGpu,
    #[serde(rename = "cpu")]
    Cpu,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Backend family as reported by a backend
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeBackendType {
    Vulkan,
    D3D12,
    D3D11,
    Metal,
    OpenGL,
    OpenGLES,
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAdapterProperties {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub adapter_type: NativeAdapterType,
    pub backend_type: NativeBackendType,
}

/// Owned copy of the caller's creation options, in backend terms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeDeviceDescriptor {
    pub required_extensions: Vec<String>,
    pub force_enabled_toggles: Vec<String>,
    pub force_disabled_toggles: Vec<String>,
}

/// Discovery capability of a backend instance.
///
/// `adapters` returns the result of the most recent discovery pass, in a
/// stable order for the lifetime of that pass. Re-running discovery replaces
/// the list.
pub trait AdapterDiscovery: Send + Sync {
    fn name(&self) -> &'static str;

    fn discover_default_adapters(&self);

    fn adapters(&self) -> Vec<Arc<dyn NativeAdapter>>;

    fn adapter_count(&self) -> usize {
        self.adapters().len()
    }
}

pub trait NativeAdapter: Send + Sync {
    fn properties(&self) -> NativeAdapterProperties;

    /// Extension names the adapter can enable at device creation
    fn extensions(&self) -> Vec<String>;

    fn create_device(&self, descriptor: &NativeDeviceDescriptor) -> Result<Box<dyn NativeDevice>>;
}

pub trait NativeDevice: Send {
    fn backend_type(&self) -> NativeBackendType;

    fn vulkan_instance(&self) -> Option<vk::Instance> {
        None
    }

    fn create_vulkan_swap_chain(&self, _surface: vk::SurfaceKHR) -> Result<Box<dyn NativeSwapChain>> {
        Err(Error::UnsupportedBackend {
            backend: crate::registry::convert_backend_type(self.backend_type()),
            operation: "vulkan swap chain",
        })
    }

    fn create_d3d12_swap_chain(&self, _hwnd: Hwnd) -> Result<Box<dyn NativeSwapChain>> {
        Err(Error::UnsupportedBackend {
            backend: crate::registry::convert_backend_type(self.backend_type()),
            operation: "d3d12 swap chain",
        })
    }
}

pub trait NativeSwapChain: Send {
    fn preferred_format(&self) -> TextureFormat;

    fn configure(&mut self, width: u32, height: u32, present_mode: PresentMode) -> Result<()>;
}
