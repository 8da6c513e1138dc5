// C boundary - extern "C" entry points and the procedure table
//
// Ownership rules for C callers:
// - Instances, devices and swap chains returned here are owned by the caller
//   and released with the matching *_release function.
// - Option name lists are only read during the call.
// - Adapter property names are allocated here and released with
//   gpushim_adapter_properties_free.
//
// None of these functions are safe to call concurrently on the same handle.

use ash::vk;
use std::ffi::{c_char, CStr, CString};
use std::num::NonZeroIsize;
use std::ptr;

use crate::config::Config;
use crate::device::{Device, DeviceCreationOptions};
use crate::error::Error;
use crate::instance::{AdapterDescriptor, Instance};
use crate::registry::{AdapterType, BackendType, Capabilities};
use crate::swap_chain::{Hwnd, PresentMode, SurfaceHandle, SwapChainImplementation, TextureFormat};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Success = 0,
    OutOfRange = 1,
    DeviceCreationFailed = 2,
    UnsupportedBackend = 3,
    BackendInternalError = 4,
    NullPointer = 5,
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        match error {
            Error::OutOfRange { .. } => Status::OutOfRange,
            Error::DeviceCreationFailed(_) => Status::DeviceCreationFailed,
            Error::UnsupportedBackend { .. } => Status::UnsupportedBackend,
            Error::BackendInternal(_) => Status::BackendInternalError,
        }
    }
}

/// Three (pointer, count) lists of NUL-terminated names. Counts may be zero,
/// in which case the pointer may be null.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawDeviceCreationOptions {
    pub required_extensions: *const *const c_char,
    pub required_extensions_count: usize,
    pub force_enabled_toggles: *const *const c_char,
    pub force_enabled_toggles_count: usize,
    pub force_disabled_toggles: *const *const c_char,
    pub force_disabled_toggles_count: usize,
}

#[repr(C)]
#[derive(Debug)]
pub struct RawAdapterProperties {
    pub name: *mut c_char,
    pub vendor_id: u32,
    pub device_id: u32,
    pub adapter_type: AdapterType,
    pub backend_type: BackendType,
}

impl RawAdapterProperties {
    fn empty() -> Self {
        Self {
            name: ptr::null_mut(),
            vendor_id: 0,
            device_id: 0,
            adapter_type: AdapterType::Unknown,
            backend_type: BackendType::Null,
        }
    }

    fn from_descriptor(descriptor: AdapterDescriptor) -> Self {
        // Interior NULs are dropped from the name.
        let name = CString::new(descriptor.name.replace('\0', ""))
            .map(CString::into_raw)
            .unwrap_or(ptr::null_mut());
        Self {
            name,
            vendor_id: descriptor.vendor_id,
            device_id: descriptor.device_id,
            adapter_type: descriptor.adapter_type,
            backend_type: descriptor.backend_type,
        }
    }
}

/// Function table for callers that bind at runtime
#[repr(C)]
#[derive(Copy, Clone)]
pub struct ProcTable {
    pub instance_create: unsafe extern "C" fn(*const c_char) -> *mut Instance,
    pub instance_release: unsafe extern "C" fn(*mut Instance),
    pub discover_default_adapters: unsafe extern "C" fn(*const Instance),
    pub adapter_count: unsafe extern "C" fn(*const Instance) -> usize,
    pub adapter_properties: unsafe extern "C" fn(*const Instance, usize, *mut Status) -> RawAdapterProperties,
    pub adapter_get_properties: unsafe extern "C" fn(*const Instance, usize, *mut RawAdapterProperties) -> Status,
    pub adapter_properties_free: unsafe extern "C" fn(*mut RawAdapterProperties),
    pub adapter_create_device:
        unsafe extern "C" fn(*const Instance, usize, *const RawDeviceCreationOptions, *mut *mut Device) -> Status,
    pub device_release: unsafe extern "C" fn(*mut Device),
    pub vulkan_get_instance: unsafe extern "C" fn(*const Device, *mut vk::Instance) -> Status,
    pub vulkan_create_swap_chain:
        unsafe extern "C" fn(*const Device, vk::SurfaceKHR, *mut *mut SwapChainImplementation) -> Status,
    pub d3d12_create_swap_chain:
        unsafe extern "C" fn(*const Device, isize, *mut *mut SwapChainImplementation) -> Status,
    pub swap_chain_preferred_format: unsafe extern "C" fn(*const SwapChainImplementation) -> TextureFormat,
    pub swap_chain_configure: unsafe extern "C" fn(*mut SwapChainImplementation, u32, u32, i32) -> Status,
    pub swap_chain_release: unsafe extern "C" fn(*mut SwapChainImplementation),
    pub supports_swap_chain: extern "C" fn(i32) -> bool,
}

#[no_mangle]
pub extern "C" fn gpushim_get_proc_table() -> ProcTable {
    ProcTable {
        instance_create: gpushim_instance_create,
        instance_release: gpushim_instance_release,
        discover_default_adapters: gpushim_instance_discover_default_adapters,
        adapter_count: gpushim_instance_adapter_count,
        adapter_properties: gpushim_adapter_properties,
        adapter_get_properties: gpushim_adapter_get_properties,
        adapter_properties_free: gpushim_adapter_properties_free,
        adapter_create_device: gpushim_adapter_create_device,
        device_release: gpushim_device_release,
        vulkan_get_instance: gpushim_vulkan_get_instance,
        vulkan_create_swap_chain: gpushim_vulkan_create_swap_chain,
        d3d12_create_swap_chain: gpushim_d3d12_create_swap_chain,
        swap_chain_preferred_format: gpushim_swap_chain_preferred_format,
        swap_chain_configure: gpushim_swap_chain_configure,
        swap_chain_release: gpushim_swap_chain_release,
        supports_swap_chain: gpushim_supports_swap_chain,
    }
}

/// Create an instance from a config file, or defaults when `config_path` is
/// null. Returns null if the file exists but cannot be loaded.
///
/// # Safety
/// `config_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn gpushim_instance_create(config_path: *const c_char) -> *mut Instance {
    let config = if config_path.is_null() {
        Config::default()
    } else {
        let path = CStr::from_ptr(config_path).to_string_lossy();
        match Config::load_from_path(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to create instance: {:#}", e);
                return ptr::null_mut();
            }
        }
    };
    Box::into_raw(Box::new(Instance::from_config(&config)))
}

/// # Safety
/// `instance` must be null or come from `gpushim_instance_create`.
#[no_mangle]
pub unsafe extern "C" fn gpushim_instance_release(instance: *mut Instance) {
    if !instance.is_null() {
        drop(Box::from_raw(instance));
    }
}

/// # Safety
/// `instance` must be null or a valid instance pointer.
#[no_mangle]
pub unsafe extern "C" fn gpushim_instance_discover_default_adapters(instance: *const Instance) {
    if let Some(instance) = instance.as_ref() {
        instance.discover_default_adapters();
    }
}

/// # Safety
/// `instance` must be null or a valid instance pointer.
#[no_mangle]
pub unsafe extern "C" fn gpushim_instance_adapter_count(instance: *const Instance) -> usize {
    instance.as_ref().map_or(0, Instance::adapter_count)
}

/// By-value variant. On failure the returned name is null and `status`
/// (when non-null) receives the reason.
///
/// # Safety
/// `instance` must be null or valid; `status` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn gpushim_adapter_properties(
    instance: *const Instance,
    index: usize,
    status: *mut Status,
) -> RawAdapterProperties {
    let result = match instance.as_ref() {
        Some(instance) => instance.adapter_properties(index).map_err(Status::from),
        None => Err(Status::NullPointer),
    };
    let (properties, code) = match result {
        Ok(descriptor) => (RawAdapterProperties::from_descriptor(descriptor), Status::Success),
        Err(code) => (RawAdapterProperties::empty(), code),
    };
    if !status.is_null() {
        *status = code;
    }
    properties
}

/// Mutation-style variant; `out` is untouched on failure.
///
/// On success `out` is overwritten without being read, so a name left in it
/// by an earlier call leaks. Release it with `gpushim_adapter_properties_free`
/// before reusing the struct.
///
/// # Safety
/// `instance` must be null or valid; `out` must be null or writable and must
/// not hold a name that has not been freed.
#[no_mangle]
pub unsafe extern "C" fn gpushim_adapter_get_properties(
    instance: *const Instance,
    index: usize,
    out: *mut RawAdapterProperties,
) -> Status {
    let (Some(instance), false) = (instance.as_ref(), out.is_null()) else {
        return Status::NullPointer;
    };
    match instance.adapter_properties(index) {
        Ok(descriptor) => {
            out.write(RawAdapterProperties::from_descriptor(descriptor));
            Status::Success
        }
        Err(e) => e.into(),
    }
}

/// Release the name owned by `properties`.
///
/// # Safety
/// `properties` must be null or filled by one of the property functions.
#[no_mangle]
pub unsafe extern "C" fn gpushim_adapter_properties_free(properties: *mut RawAdapterProperties) {
    if let Some(properties) = properties.as_mut() {
        if !properties.name.is_null() {
            drop(CString::from_raw(properties.name));
            properties.name = ptr::null_mut();
        }
    }
}

unsafe fn decode_names<'a>(names: *const *const c_char, count: usize) -> Result<Vec<&'a str>, Status> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if names.is_null() {
        return Err(Status::NullPointer);
    }
    std::slice::from_raw_parts(names, count)
        .iter()
        .map(|&name| {
            if name.is_null() {
                return Err(Status::NullPointer);
            }
            CStr::from_ptr(name)
                .to_str()
                .map_err(|_| Status::DeviceCreationFailed)
        })
        .collect()
}

unsafe fn create_device(
    instance: &Instance,
    index: usize,
    options: *const RawDeviceCreationOptions,
) -> Result<Device, Status> {
    let Some(raw) = options.as_ref() else {
        return Ok(instance.create_device(index, None)?);
    };

    let required_extensions = decode_names(raw.required_extensions, raw.required_extensions_count)?;
    let force_enabled_toggles = decode_names(raw.force_enabled_toggles, raw.force_enabled_toggles_count)?;
    let force_disabled_toggles =
        decode_names(raw.force_disabled_toggles, raw.force_disabled_toggles_count)?;

    let options = DeviceCreationOptions {
        required_extensions: &required_extensions,
        force_enabled_toggles: &force_enabled_toggles,
        force_disabled_toggles: &force_disabled_toggles,
    };
    Ok(instance.create_device(index, Some(&options))?)
}

/// Create a device on adapter `index`. `options` may be null for defaults.
///
/// # Safety
/// `instance` must be null or valid, `options` null or valid with readable
/// name lists, `out_device` null or writable.
#[no_mangle]
pub unsafe extern "C" fn gpushim_adapter_create_device(
    instance: *const Instance,
    index: usize,
    options: *const RawDeviceCreationOptions,
    out_device: *mut *mut Device,
) -> Status {
    let (Some(instance), false) = (instance.as_ref(), out_device.is_null()) else {
        return Status::NullPointer;
    };
    match create_device(instance, index, options) {
        Ok(device) => {
            *out_device = Box::into_raw(Box::new(device));
            Status::Success
        }
        Err(status) => status,
    }
}

/// # Safety
/// `device` must be null or come from `gpushim_adapter_create_device`, and
/// every swap chain created from it must already be released.
#[no_mangle]
pub unsafe extern "C" fn gpushim_device_release(device: *mut Device) {
    if !device.is_null() {
        drop(Box::from_raw(device));
    }
}

/// # Safety
/// `device` must be null or valid; `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn gpushim_vulkan_get_instance(device: *const Device, out: *mut vk::Instance) -> Status {
    let (Some(device), false) = (device.as_ref(), out.is_null()) else {
        return Status::NullPointer;
    };
    match device.vulkan_instance() {
        Ok(instance) => {
            *out = instance;
            Status::Success
        }
        Err(e) => e.into(),
    }
}

unsafe fn create_swap_chain(
    device: *const Device,
    surface: Option<SurfaceHandle>,
    out: *mut *mut SwapChainImplementation,
) -> Status {
    let (Some(device), Some(surface), false) = (device.as_ref(), surface, out.is_null()) else {
        return Status::NullPointer;
    };
    match device.create_swap_chain(surface) {
        Ok(swap_chain) => {
            *out = Box::into_raw(Box::new(swap_chain));
            Status::Success
        }
        Err(e) => e.into(),
    }
}

/// # Safety
/// `device` must be null or valid; `surface` must be a surface created on the
/// device's Vulkan instance; `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn gpushim_vulkan_create_swap_chain(
    device: *const Device,
    surface: vk::SurfaceKHR,
    out: *mut *mut SwapChainImplementation,
) -> Status {
    let surface = (surface != vk::SurfaceKHR::null()).then_some(SurfaceHandle::Vulkan(surface));
    create_swap_chain(device, surface, out)
}

/// # Safety
/// `device` must be null or valid; `hwnd` must be a live window; `out` must
/// be null or writable.
#[no_mangle]
pub unsafe extern "C" fn gpushim_d3d12_create_swap_chain(
    device: *const Device,
    hwnd: isize,
    out: *mut *mut SwapChainImplementation,
) -> Status {
    let surface = NonZeroIsize::new(hwnd).map(|hwnd| SurfaceHandle::D3D12(Hwnd(hwnd)));
    create_swap_chain(device, surface, out)
}

/// `Undefined` for a null swap chain.
///
/// # Safety
/// `swap_chain` must be null or valid.
#[no_mangle]
pub unsafe extern "C" fn gpushim_swap_chain_preferred_format(
    swap_chain: *const SwapChainImplementation,
) -> TextureFormat {
    swap_chain
        .as_ref()
        .map_or(TextureFormat::Undefined, SwapChainImplementation::preferred_format)
}

/// `present_mode`: 0 immediate, 1 mailbox, 2 fifo, 3 fifo relaxed.
///
/// # Safety
/// `swap_chain` must be null or valid.
#[no_mangle]
pub unsafe extern "C" fn gpushim_swap_chain_configure(
    swap_chain: *mut SwapChainImplementation,
    width: u32,
    height: u32,
    present_mode: i32,
) -> Status {
    let Some(swap_chain) = swap_chain.as_mut() else {
        return Status::NullPointer;
    };
    let present_mode = match present_mode {
        0 => PresentMode::Immediate,
        1 => PresentMode::Mailbox,
        2 => PresentMode::Fifo,
        3 => PresentMode::FifoRelaxed,
        _ => return Status::BackendInternalError,
    };
    match swap_chain.configure(width, height, present_mode) {
        Ok(()) => Status::Success,
        Err(e) => e.into(),
    }
}

/// # Safety
/// `swap_chain` must be null or come from one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn gpushim_swap_chain_release(swap_chain: *mut SwapChainImplementation) {
    if !swap_chain.is_null() {
        drop(Box::from_raw(swap_chain));
    }
}

/// Whether swap chains for `backend_type` are compiled into this build
#[no_mangle]
pub extern "C" fn gpushim_supports_swap_chain(backend_type: i32) -> bool {
    BackendType::try_from(backend_type)
        .map_or(false, |backend| Capabilities::current().supports_swap_chain(backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockAdapter, NativeAdapterType, NativeBackendType, NullBackend};
    use ash::vk::Handle;
    use pretty_assertions::assert_eq;

    fn instance() -> Instance {
        let adapter = |name: &str, adapter_type, backend_type| MockAdapter {
            name: name.to_string(),
            vendor_id: 0x1002,
            device_id: 0x73bf,
            adapter_type,
            backend_type,
            extensions: vec!["texture_compression_bc".to_string()],
            toggles: vec!["skip_validation".to_string()],
        };
        let instance = Instance::builder()
            .backend(NullBackend::new(vec![
                adapter("Discrete", NativeAdapterType::DiscreteGpu, NativeBackendType::Vulkan),
                adapter("Software", NativeAdapterType::Cpu, NativeBackendType::Null),
            ]))
            .build();
        instance.discover_default_adapters();
        instance
    }

    #[test]
    fn get_properties_writes_owned_name() {
        let instance = instance();
        let mut raw = RawAdapterProperties::empty();
        unsafe {
            assert_eq!(gpushim_adapter_get_properties(&instance, 0, &mut raw), Status::Success);
            assert_eq!(CStr::from_ptr(raw.name).to_str().unwrap(), "Discrete");
            assert_eq!(raw.adapter_type, AdapterType::DiscreteGPU);
            assert_eq!(raw.backend_type, BackendType::Vulkan);
            gpushim_adapter_properties_free(&mut raw);
        }
        assert!(raw.name.is_null());
    }

    #[test]
    fn properties_struct_can_be_reused_after_free() {
        let instance = instance();
        let mut raw = RawAdapterProperties::empty();
        let mut names = Vec::new();
        unsafe {
            for index in 0..2 {
                assert_eq!(gpushim_adapter_get_properties(&instance, index, &mut raw), Status::Success);
                names.push(CStr::from_ptr(raw.name).to_str().unwrap().to_string());
                gpushim_adapter_properties_free(&mut raw);
                assert!(raw.name.is_null());
            }
            // Freeing twice is harmless once the name is cleared
            gpushim_adapter_properties_free(&mut raw);
        }
        assert_eq!(names, vec!["Discrete", "Software"]);
    }

    #[test]
    fn by_value_properties_report_out_of_range() {
        let instance = instance();
        let mut status = Status::Success;
        let raw = unsafe { gpushim_adapter_properties(&instance, 2, &mut status) };
        assert_eq!(status, Status::OutOfRange);
        assert!(raw.name.is_null());
    }

    #[test]
    fn null_instance_is_reported() {
        let mut raw = RawAdapterProperties::empty();
        unsafe {
            assert_eq!(gpushim_instance_adapter_count(ptr::null()), 0);
            assert_eq!(
                gpushim_adapter_get_properties(ptr::null(), 0, &mut raw),
                Status::NullPointer
            );
        }
    }

    #[test]
    fn create_device_with_null_options_uses_defaults() {
        let instance = instance();
        let mut device = ptr::null_mut();
        unsafe {
            assert_eq!(
                gpushim_adapter_create_device(&instance, 1, ptr::null(), &mut device),
                Status::Success
            );
            assert_eq!((*device).backend_type(), BackendType::Null);
            gpushim_device_release(device);
        }
    }

    #[test]
    fn create_device_decodes_option_lists() {
        let instance = instance();
        let extension = CString::new("texture_compression_bc").unwrap();
        let toggle = CString::new("skip_validation").unwrap();
        let extensions = [extension.as_ptr()];
        let toggles = [toggle.as_ptr()];
        let options = RawDeviceCreationOptions {
            required_extensions: extensions.as_ptr(),
            required_extensions_count: 1,
            force_enabled_toggles: toggles.as_ptr(),
            force_enabled_toggles_count: 1,
            force_disabled_toggles: ptr::null(),
            force_disabled_toggles_count: 0,
        };
        let mut device = ptr::null_mut();
        unsafe {
            assert_eq!(
                gpushim_adapter_create_device(&instance, 0, &options, &mut device),
                Status::Success
            );
            gpushim_device_release(device);
        }
    }

    #[test]
    fn create_device_reports_rejection_and_bad_lists() {
        let instance = instance();
        let unknown = CString::new("shader_f16").unwrap();
        let names = [unknown.as_ptr()];
        let mut options = RawDeviceCreationOptions {
            required_extensions: names.as_ptr(),
            required_extensions_count: 1,
            force_enabled_toggles: ptr::null(),
            force_enabled_toggles_count: 0,
            force_disabled_toggles: ptr::null(),
            force_disabled_toggles_count: 0,
        };
        let mut device = ptr::null_mut();
        unsafe {
            assert_eq!(
                gpushim_adapter_create_device(&instance, 0, &options, &mut device),
                Status::DeviceCreationFailed
            );
            assert_eq!(
                gpushim_adapter_create_device(&instance, 5, &options, &mut device),
                Status::OutOfRange
            );

            options.force_enabled_toggles_count = 2;
            assert_eq!(
                gpushim_adapter_create_device(&instance, 0, &options, &mut device),
                Status::NullPointer
            );
        }
        assert!(device.is_null());
    }

    #[test]
    fn swap_chain_family_mismatch_is_unsupported() {
        let instance = instance();
        let mut device = ptr::null_mut();
        let mut swap_chain = ptr::null_mut();
        unsafe {
            gpushim_adapter_create_device(&instance, 1, ptr::null(), &mut device);
            assert_eq!(
                gpushim_vulkan_create_swap_chain(device, vk::SurfaceKHR::from_raw(1), &mut swap_chain),
                Status::UnsupportedBackend
            );
            let mut vk_instance = vk::Instance::null();
            assert_eq!(
                gpushim_vulkan_get_instance(device, &mut vk_instance),
                Status::UnsupportedBackend
            );
            gpushim_device_release(device);
        }
        assert!(swap_chain.is_null());
    }

    #[test]
    fn vulkan_swap_chain_round_trip() {
        let instance = instance();
        let mut device = ptr::null_mut();
        let mut swap_chain = ptr::null_mut();
        unsafe {
            gpushim_adapter_create_device(&instance, 0, ptr::null(), &mut device);
            assert_eq!(
                gpushim_vulkan_create_swap_chain(device, vk::SurfaceKHR::from_raw(1), &mut swap_chain),
                Status::Success
            );
            assert_eq!(
                gpushim_swap_chain_preferred_format(swap_chain),
                TextureFormat::BGRA8UnormSrgb
            );
            assert_eq!(gpushim_swap_chain_configure(swap_chain, 640, 480, 2), Status::Success);
            assert_eq!(gpushim_swap_chain_configure(swap_chain, 640, 480, 9), Status::BackendInternalError);
            gpushim_swap_chain_release(swap_chain);
            gpushim_device_release(device);
        }
    }

    #[test]
    fn proc_table_dispatches_to_exports() {
        let procs = gpushim_get_proc_table();
        let instance = instance();
        unsafe {
            assert_eq!((procs.adapter_count)(&instance), 2);
        }
        assert!((procs.supports_swap_chain)(BackendType::Vulkan as i32));
        assert!(!(procs.supports_swap_chain)(42));
    }
}
