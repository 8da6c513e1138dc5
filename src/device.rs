// Device Factory - logical device creation from a discovered adapter
//
// The caller's option lists are borrowed only for the duration of the call;
// they are copied into an owned NativeDeviceDescriptor before the backend
// sees them.

use ash::vk;
use std::fmt;

use crate::backend::{NativeDevice, NativeDeviceDescriptor};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::registry::{convert_backend_type, BackendType};

/// Declarative device creation options. All lists may be empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCreationOptions<'a> {
    pub required_extensions: &'a [&'a str],
    pub force_enabled_toggles: &'a [&'a str],
    pub force_disabled_toggles: &'a [&'a str],
}

impl DeviceCreationOptions<'_> {
    fn to_native(&self) -> Result<NativeDeviceDescriptor> {
        if let Some(toggle) = self
            .force_enabled_toggles
            .iter()
            .find(|toggle| self.force_disabled_toggles.contains(toggle))
        {
            return Err(Error::device_creation(format!(
                "toggle '{}' is both force-enabled and force-disabled",
                toggle
            )));
        }

        let copy = |names: &[&str]| names.iter().map(|name| name.to_string()).collect();
        Ok(NativeDeviceDescriptor {
            required_extensions: copy(self.required_extensions),
            force_enabled_toggles: copy(self.force_enabled_toggles),
            force_disabled_toggles: copy(self.force_disabled_toggles),
        })
    }
}

/// Logical device. Owned by the caller; dropping it releases the backend
/// device.
pub struct Device {
    pub(crate) raw: Box<dyn NativeDevice>,
    backend_type: BackendType,
    adapter_name: String,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("backend_type", &self.backend_type)
            .field("adapter_name", &self.adapter_name)
            .finish()
    }
}

impl Device {
    pub fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Native Vulkan instance the device was created on
    pub fn vulkan_instance(&self) -> Result<vk::Instance> {
        if self.backend_type != BackendType::Vulkan {
            return Err(Error::UnsupportedBackend {
                backend: self.backend_type,
                operation: "vulkan_instance",
            });
        }
        self.raw
            .vulkan_instance()
            .ok_or_else(|| Error::internal("vulkan device did not expose its instance"))
    }
}

impl Instance {
    /// Create a device on the adapter at `index`.
    ///
    /// `None` options means defaults. Fails with `OutOfRange` for a bad index
    /// and `DeviceCreationFailed` when the backend rejects the descriptor.
    pub fn create_device(
        &self,
        index: usize,
        options: Option<&DeviceCreationOptions>,
    ) -> Result<Device> {
        let adapter = self.resolve_adapter(index)?;
        let descriptor = match options {
            Some(options) => options.to_native()?,
            None => NativeDeviceDescriptor::default(),
        };

        let properties = adapter.properties();
        log::info!(
            "Creating device on adapter {} ({}, {:?})",
            index,
            properties.name,
            properties.backend_type
        );
        log::debug!("Device descriptor: {:?}", descriptor);

        let raw = adapter.create_device(&descriptor).map_err(|e| {
            log::warn!("Device creation on adapter {} failed: {}", index, e);
            e
        })?;

        // Trust the device, not the adapter listing, for its family.
        let backend_type = convert_backend_type(raw.backend_type());

        Ok(Device {
            raw,
            backend_type,
            adapter_name: properties.name,
        })
    }
}
