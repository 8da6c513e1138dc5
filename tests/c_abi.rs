// Full lifecycle through the exported C functions

use gpu_shim::ffi::{
    gpushim_adapter_create_device, gpushim_adapter_get_properties, gpushim_adapter_properties_free,
    gpushim_device_release, gpushim_get_proc_table, gpushim_instance_adapter_count,
    gpushim_instance_create, gpushim_instance_discover_default_adapters, gpushim_instance_release,
    RawAdapterProperties, Status,
};
use gpu_shim::{AdapterType, BackendType};
use pretty_assertions::assert_eq;
use std::ffi::{CStr, CString};
use std::io::Write;
use std::ptr;

const CONFIG: &str = r#"
[instance]
backends = ["null"]

[[null_backend.adapters]]
name = "Mock CPU"
vendor_id = 5140
adapter_type = "cpu"
backend_type = "null"
"#;

fn write_config() -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("gpu-shim-c-abi-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    path
}

#[test]
fn instance_lifecycle_from_config_file() {
    let path = write_config();
    let c_path = CString::new(path.to_str().unwrap()).unwrap();

    unsafe {
        let instance = gpushim_instance_create(c_path.as_ptr());
        assert!(!instance.is_null());
        assert_eq!(gpushim_instance_adapter_count(instance), 0);

        gpushim_instance_discover_default_adapters(instance);
        assert_eq!(gpushim_instance_adapter_count(instance), 1);

        let mut properties = RawAdapterProperties {
            name: ptr::null_mut(),
            vendor_id: 0,
            device_id: 0,
            adapter_type: AdapterType::Unknown,
            backend_type: BackendType::Vulkan,
        };
        assert_eq!(gpushim_adapter_get_properties(instance, 0, &mut properties), Status::Success);
        assert_eq!(CStr::from_ptr(properties.name).to_str().unwrap(), "Mock CPU");
        assert_eq!(properties.vendor_id, 5140);
        assert_eq!(properties.adapter_type, AdapterType::CPU);
        assert_eq!(properties.backend_type, BackendType::Null);
        gpushim_adapter_properties_free(&mut properties);

        let mut device = ptr::null_mut();
        assert_eq!(
            gpushim_adapter_create_device(instance, 0, ptr::null(), &mut device),
            Status::Success
        );
        assert_eq!(
            gpushim_adapter_create_device(instance, 1, ptr::null(), &mut device),
            Status::OutOfRange
        );
        gpushim_device_release(device);
        gpushim_instance_release(instance);
    }

    let _ = std::fs::remove_file(path);
}

#[test]
fn unreadable_config_yields_null_instance() {
    let path = std::env::temp_dir().join(format!("gpu-shim-bad-{}.toml", std::process::id()));
    std::fs::write(&path, "[instance\n").unwrap();
    let c_path = CString::new(path.to_str().unwrap()).unwrap();

    let instance = unsafe { gpushim_instance_create(c_path.as_ptr()) };
    assert!(instance.is_null());

    let _ = std::fs::remove_file(path);
}

#[test]
fn proc_table_matches_exports() {
    let procs = gpushim_get_proc_table();
    assert!((procs.supports_swap_chain)(BackendType::Vulkan as i32));
    assert!(!(procs.supports_swap_chain)(BackendType::Metal as i32));
    assert!(!(procs.supports_swap_chain)(-1));
}
