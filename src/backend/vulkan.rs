// Vulkan backend - adapter discovery and device creation on ash
//
// Responsibilities:
// - Instance creation with validation layers (lazily, on first discovery)
// - Physical device discovery (every device the loader reports, loader order)
// - Logical device creation honoring extensions and toggles
//
// Toggles are named VkPhysicalDeviceFeatures members. A small default set is
// enabled whenever the adapter supports it; callers force others on or off.

use ash::extensions::{ext, khr};
use ash::{vk, Entry};
use parking_lot::Mutex;
use std::ffi::{CStr, CString};
use std::sync::Arc;

use super::swapchain::VulkanSwapChain;
use super::{
    AdapterDiscovery, NativeAdapter, NativeAdapterProperties, NativeAdapterType, NativeBackendType,
    NativeDevice, NativeDeviceDescriptor, NativeSwapChain,
};
use crate::error::{Error, Result};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Enabled when supported unless force-disabled
const DEFAULT_TOGGLES: &[&str] = &["fill_mode_non_solid", "sampler_anisotropy"];

pub struct VulkanBackendConfig {
    pub app_name: String,
    pub enable_validation: bool,
}

pub struct VulkanBackend {
    config: VulkanBackendConfig,
    instance: Mutex<Option<Arc<VulkanInstance>>>,
    adapters: Mutex<Vec<Arc<dyn NativeAdapter>>>,
}

/// Vulkan instance shared by every adapter and device created from it
pub(super) struct VulkanInstance {
    pub(super) entry: Entry,
    pub(super) instance: ash::Instance,
    debug_utils: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanBackend {
    pub fn new(config: VulkanBackendConfig) -> Self {
        Self {
            config,
            instance: Mutex::new(None),
            adapters: Mutex::new(Vec::new()),
        }
    }

    fn ensure_instance(&self) -> Result<Arc<VulkanInstance>> {
        let mut slot = self.instance.lock();
        if let Some(instance) = slot.as_ref() {
            return Ok(instance.clone());
        }
        let instance = Arc::new(VulkanInstance::new(&self.config)?);
        *slot = Some(instance.clone());
        Ok(instance)
    }
}

impl AdapterDiscovery for VulkanBackend {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn discover_default_adapters(&self) {
        let instance = match self.ensure_instance() {
            Ok(instance) => instance,
            Err(e) => {
                log::warn!("Vulkan backend unavailable: {}", e);
                self.adapters.lock().clear();
                return;
            }
        };

        let physical_devices = match unsafe { instance.instance.enumerate_physical_devices() } {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("Failed to enumerate Vulkan physical devices: {}", e);
                Vec::new()
            }
        };

        let adapters: Vec<Arc<dyn NativeAdapter>> = physical_devices
            .into_iter()
            .map(|physical_device| {
                let properties = unsafe {
                    instance.instance.get_physical_device_properties(physical_device)
                };
                Arc::new(VulkanAdapter {
                    instance: instance.clone(),
                    physical_device,
                    properties,
                }) as Arc<dyn NativeAdapter>
            })
            .collect();

        log::info!("Discovered {} Vulkan adapter(s)", adapters.len());
        *self.adapters.lock() = adapters;
    }

    fn adapters(&self) -> Vec<Arc<dyn NativeAdapter>> {
        self.adapters.lock().clone()
    }

    fn adapter_count(&self) -> usize {
        self.adapters.lock().len()
    }
}

impl VulkanInstance {
    fn new(config: &VulkanBackendConfig) -> Result<Self> {
        log::info!("Creating Vulkan instance: {}", config.app_name);

        let entry = unsafe { Entry::load() }
            .map_err(|e| Error::internal(format!("failed to load Vulkan library: {}", e)))?;

        let app_name = CString::new(config.app_name.as_str())
            .map_err(|_| Error::internal("application name contains a NUL byte"))?;
        let engine_name = c"gpu-shim";

        let api_version = match entry.try_enumerate_instance_version() {
            Ok(Some(version)) => version.min(vk::API_VERSION_1_3),
            _ => vk::API_VERSION_1_0,
        };

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(api_version);

        // Surface extensions so callers can create VkSurfaceKHR on our instance
        let available: Vec<String> = entry
            .enumerate_instance_extension_properties(None)?
            .iter()
            .map(|e| extension_name(&e.extension_name))
            .collect();
        let mut wanted = vec![
            khr::Surface::name(),
            khr::Win32Surface::name(),
            khr::XlibSurface::name(),
            khr::XcbSurface::name(),
            khr::WaylandSurface::name(),
            ext::MetalSurface::name(),
        ];

        let mut enable_validation = config.enable_validation;
        if enable_validation {
            let layers = entry.enumerate_instance_layer_properties()?;
            let has_layer = layers
                .iter()
                .any(|layer| extension_name(&layer.layer_name) == VALIDATION_LAYER.to_string_lossy());
            if !has_layer {
                log::warn!("Validation layers requested but not installed; continuing without");
                enable_validation = false;
            } else {
                wanted.push(ext::DebugUtils::name());
            }
        }

        let enabled = enabled_extensions(wanted, &available);
        // The messenger needs VK_EXT_debug_utils, which the loader may lack
        // even when the validation layer is installed.
        let debug_utils_enabled = enable_validation && enabled.contains(&ext::DebugUtils::name());
        if enable_validation && !debug_utils_enabled {
            log::warn!("VK_EXT_debug_utils unavailable; validation messages will not be logged");
        }
        let extensions: Vec<_> = enabled.iter().map(|name| name.as_ptr()).collect();

        let layer_names = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }?;

        let debug_utils = if debug_utils_enabled {
            match setup_debug_messenger(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    log::warn!("Failed to create debug messenger: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        log::debug!("Destroying Vulkan instance");
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// The subset of `wanted` the loader reports, in `wanted` order
fn enabled_extensions(wanted: Vec<&'static CStr>, available: &[String]) -> Vec<&'static CStr> {
    wanted
        .into_iter()
        .filter(|name| available.iter().any(|a| a.as_str() == name.to_string_lossy()))
        .collect()
}

fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Result<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ext::DebugUtils::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

    Ok((debug_utils, messenger))
}

struct VulkanAdapter {
    instance: Arc<VulkanInstance>,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
}

impl VulkanAdapter {
    fn graphics_queue_family(&self) -> Option<u32> {
        let families = unsafe {
            self.instance
                .instance
                .get_physical_device_queue_family_properties(self.physical_device)
        };
        families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|index| index as u32)
    }
}

impl NativeAdapter for VulkanAdapter {
    fn properties(&self) -> NativeAdapterProperties {
        NativeAdapterProperties {
            name: extension_name(&self.properties.device_name),
            vendor_id: self.properties.vendor_id,
            device_id: self.properties.device_id,
            adapter_type: adapter_type(self.properties.device_type),
            backend_type: NativeBackendType::Vulkan,
        }
    }

    fn extensions(&self) -> Vec<String> {
        let properties = unsafe {
            self.instance
                .instance
                .enumerate_device_extension_properties(self.physical_device)
        };
        match properties {
            Ok(properties) => properties
                .iter()
                .map(|e| extension_name(&e.extension_name))
                .collect(),
            Err(e) => {
                log::warn!("Failed to enumerate device extensions: {}", e);
                Vec::new()
            }
        }
    }

    fn create_device(&self, descriptor: &NativeDeviceDescriptor) -> Result<Box<dyn NativeDevice>> {
        Ok(Box::new(self.open_device(descriptor)?))
    }
}

impl VulkanAdapter {
    fn open_device(&self, descriptor: &NativeDeviceDescriptor) -> Result<VulkanDevice> {
        let graphics_queue_family = self
            .graphics_queue_family()
            .ok_or_else(|| Error::device_creation("adapter has no graphics queue family"))?;

        let available = self.extensions();
        if let Some(missing) = descriptor
            .required_extensions
            .iter()
            .find(|name| !available.contains(name))
        {
            return Err(Error::device_creation(format!(
                "extension '{}' not supported by adapter",
                missing
            )));
        }

        let supported = unsafe {
            self.instance
                .instance
                .get_physical_device_features(self.physical_device)
        };
        let features = resolve_toggles(&supported, descriptor)?;

        let mut extension_names = descriptor
            .required_extensions
            .iter()
            .map(|name| {
                CString::new(name.as_str())
                    .map_err(|_| Error::device_creation(format!("extension name '{}' contains NUL", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        // The swap-chain bridge needs VK_KHR_swapchain; enable it when present
        let swapchain_name = khr::Swapchain::name();
        let swapchain_enabled = available
            .iter()
            .any(|name| name.as_str() == swapchain_name.to_string_lossy());
        if swapchain_enabled && !extension_names.iter().any(|name| name.as_c_str() == swapchain_name) {
            extension_names.push(swapchain_name.to_owned());
        }
        let extension_ptrs: Vec<_> = extension_names.iter().map(|name| name.as_ptr()).collect();

        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features);

        let device = unsafe {
            self.instance
                .instance
                .create_device(self.physical_device, &create_info, None)
        }
        .map_err(|e| match e {
            vk::Result::ERROR_EXTENSION_NOT_PRESENT | vk::Result::ERROR_FEATURE_NOT_PRESENT => {
                Error::device_creation(format!("vulkan rejected the descriptor: {}", e))
            }
            other => Error::from(other),
        })?;

        log::info!(
            "Created Vulkan device on {} ({} extension(s))",
            extension_name(&self.properties.device_name),
            extension_ptrs.len()
        );

        Ok(VulkanDevice {
            shared: Arc::new(DeviceShared {
                instance: self.instance.clone(),
                physical_device: self.physical_device,
                device,
                graphics_queue_family,
            }),
            swapchain_enabled,
        })
    }
}

/// Logical device state kept alive by the device and its swap chains
pub(super) struct DeviceShared {
    pub(super) instance: Arc<VulkanInstance>,
    pub(super) physical_device: vk::PhysicalDevice,
    pub(super) device: ash::Device,
    pub(super) graphics_queue_family: u32,
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

struct VulkanDevice {
    shared: Arc<DeviceShared>,
    swapchain_enabled: bool,
}

impl NativeDevice for VulkanDevice {
    fn backend_type(&self) -> NativeBackendType {
        NativeBackendType::Vulkan
    }

    fn vulkan_instance(&self) -> Option<vk::Instance> {
        Some(self.shared.instance.instance.handle())
    }

    fn create_vulkan_swap_chain(&self, surface: vk::SurfaceKHR) -> Result<Box<dyn NativeSwapChain>> {
        if !self.swapchain_enabled {
            return Err(Error::internal("adapter does not support VK_KHR_swapchain"));
        }
        let swap_chain = VulkanSwapChain::new(self.shared.clone(), surface)?;
        Ok(Box::new(swap_chain))
    }
}

fn adapter_type(device_type: vk::PhysicalDeviceType) -> NativeAdapterType {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => NativeAdapterType::DiscreteGpu,
        vk::PhysicalDeviceType::INTEGRATED_GPU => NativeAdapterType::IntegratedGpu,
        vk::PhysicalDeviceType::CPU => NativeAdapterType::Cpu,
        _ => NativeAdapterType::Unknown,
    }
}

/// Fixed-size, NUL-terminated name array to String
fn extension_name(raw: &[std::os::raw::c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn feature_slot<'a>(features: &'a mut vk::PhysicalDeviceFeatures, toggle: &str) -> Option<&'a mut vk::Bool32> {
    Some(match toggle {
        "fill_mode_non_solid" => &mut features.fill_mode_non_solid,
        "wide_lines" => &mut features.wide_lines,
        "sampler_anisotropy" => &mut features.sampler_anisotropy,
        "geometry_shader" => &mut features.geometry_shader,
        "tessellation_shader" => &mut features.tessellation_shader,
        "shader_int64" => &mut features.shader_int64,
        "multi_draw_indirect" => &mut features.multi_draw_indirect,
        _ => return None,
    })
}

fn resolve_toggles(
    supported: &vk::PhysicalDeviceFeatures,
    descriptor: &NativeDeviceDescriptor,
) -> Result<vk::PhysicalDeviceFeatures> {
    let mut supported = *supported;
    let mut enabled = vk::PhysicalDeviceFeatures::default();

    let unknown = |toggle: &str| Error::device_creation(format!("unknown toggle '{}'", toggle));

    for &toggle in DEFAULT_TOGGLES {
        let available = feature_slot(&mut supported, toggle).map_or(false, |slot| *slot == vk::TRUE);
        if available && !descriptor.force_disabled_toggles.iter().any(|t| t == toggle) {
            if let Some(slot) = feature_slot(&mut enabled, toggle) {
                *slot = vk::TRUE;
            }
        }
    }

    for toggle in &descriptor.force_enabled_toggles {
        let available = *feature_slot(&mut supported, toggle).ok_or_else(|| unknown(toggle.as_str()))?;
        if available != vk::TRUE {
            return Err(Error::device_creation(format!(
                "toggle '{}' not supported by adapter",
                toggle
            )));
        }
        if let Some(slot) = feature_slot(&mut enabled, toggle) {
            *slot = vk::TRUE;
        }
    }

    for toggle in &descriptor.force_disabled_toggles {
        let slot = feature_slot(&mut enabled, toggle).ok_or_else(|| unknown(toggle.as_str()))?;
        *slot = vk::FALSE;
    }

    Ok(enabled)
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
