// Null backend - in-process adapters for testing and headless use
//
// Adapters are described up front (usually from config.toml). A mock adapter
// may claim any backend family, so swap-chain and handle paths of other
// families can be exercised without the hardware.

use ash::vk::{self, Handle};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

use super::{
    AdapterDiscovery, NativeAdapter, NativeAdapterProperties, NativeAdapterType, NativeBackendType,
    NativeDevice, NativeDeviceDescriptor, NativeSwapChain,
};
use crate::error::{Error, Result};
use crate::swap_chain::{Hwnd, PresentMode, TextureFormat};

/// Sentinel handed out as the Vulkan instance of mock Vulkan devices
pub const MOCK_VK_INSTANCE: u64 = 0x6e75_6c6c;

/// Description of one adapter the null backend reports
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MockAdapter {
    pub name: String,
    #[serde(default)]
    pub vendor_id: u32,
    #[serde(default)]
    pub device_id: u32,
    pub adapter_type: NativeAdapterType,
    pub backend_type: NativeBackendType,
    /// Extensions a device on this adapter may require
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Toggles this adapter recognizes
    #[serde(default)]
    pub toggles: Vec<String>,
}

pub struct NullBackend {
    available: Vec<MockAdapter>,
    discovered: Mutex<Vec<Arc<dyn NativeAdapter>>>,
}

impl NullBackend {
    pub fn new(available: Vec<MockAdapter>) -> Self {
        Self {
            available,
            discovered: Mutex::new(Vec::new()),
        }
    }
}

impl AdapterDiscovery for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn discover_default_adapters(&self) {
        let adapters = self
            .available
            .iter()
            .cloned()
            .map(|description| Arc::new(NullAdapter { description }) as Arc<dyn NativeAdapter>)
            .collect();
        *self.discovered.lock() = adapters;
    }

    fn adapters(&self) -> Vec<Arc<dyn NativeAdapter>> {
        self.discovered.lock().clone()
    }

    fn adapter_count(&self) -> usize {
        self.discovered.lock().len()
    }
}

struct NullAdapter {
    description: MockAdapter,
}

impl NullAdapter {
    fn check_toggles(&self, toggles: &[String]) -> Result<()> {
        match toggles.iter().find(|t| !self.description.toggles.contains(t)) {
            Some(toggle) => Err(Error::device_creation(format!(
                "unknown toggle '{}' for adapter '{}'",
                toggle, self.description.name
            ))),
            None => Ok(()),
        }
    }
}

impl NativeAdapter for NullAdapter {
    fn properties(&self) -> NativeAdapterProperties {
        NativeAdapterProperties {
            name: self.description.name.clone(),
            vendor_id: self.description.vendor_id,
            device_id: self.description.device_id,
            adapter_type: self.description.adapter_type,
            backend_type: self.description.backend_type,
        }
    }

    fn extensions(&self) -> Vec<String> {
        self.description.extensions.clone()
    }

    fn create_device(&self, descriptor: &NativeDeviceDescriptor) -> Result<Box<dyn NativeDevice>> {
        if let Some(extension) = descriptor
            .required_extensions
            .iter()
            .find(|e| !self.description.extensions.contains(e))
        {
            return Err(Error::device_creation(format!(
                "extension '{}' not supported by adapter '{}'",
                extension, self.description.name
            )));
        }
        self.check_toggles(&descriptor.force_enabled_toggles)?;
        self.check_toggles(&descriptor.force_disabled_toggles)?;

        Ok(Box::new(NullDevice {
            backend_type: self.description.backend_type,
        }))
    }
}

struct NullDevice {
    backend_type: NativeBackendType,
}

impl NativeDevice for NullDevice {
    fn backend_type(&self) -> NativeBackendType {
        self.backend_type
    }

    fn vulkan_instance(&self) -> Option<vk::Instance> {
        (self.backend_type == NativeBackendType::Vulkan)
            .then(|| vk::Instance::from_raw(MOCK_VK_INSTANCE))
    }

    fn create_vulkan_swap_chain(&self, surface: vk::SurfaceKHR) -> Result<Box<dyn NativeSwapChain>> {
        if surface == vk::SurfaceKHR::null() {
            return Err(Error::internal("null Vulkan surface"));
        }
        Ok(Box::new(NullSwapChain::new(TextureFormat::BGRA8UnormSrgb)))
    }

    fn create_d3d12_swap_chain(&self, _hwnd: Hwnd) -> Result<Box<dyn NativeSwapChain>> {
        Ok(Box::new(NullSwapChain::new(TextureFormat::RGBA8Unorm)))
    }
}

/// Records its configuration instead of presenting anything
struct NullSwapChain {
    format: TextureFormat,
    configured: Option<(u32, u32, PresentMode)>,
}

impl NullSwapChain {
    fn new(format: TextureFormat) -> Self {
        Self {
            format,
            configured: None,
        }
    }
}

impl NativeSwapChain for NullSwapChain {
    fn preferred_format(&self) -> TextureFormat {
        self.format
    }

    fn configure(&mut self, width: u32, height: u32, present_mode: PresentMode) -> Result<()> {
        if let Some((w, h, mode)) = self.configured {
            log::debug!("Reconfiguring null swap chain from {}x{} {:?}", w, h, mode);
        }
        self.configured = Some((width, height, present_mode));
        Ok(())
    }
}
