// =============================================================================
// GPU SHIM CLI - List adapters and optionally open a device
// =============================================================================
//
// Usage: gpu-shim [config.toml]
//
// FLOW:
// 1. Load configuration (argument, else ./config.toml, else defaults)
// 2. Build an instance with the configured backends
// 3. Discover default adapters and print their properties
// 4. If [device] adapter_index is set, create a device on that adapter
//
// =============================================================================

use anyhow::{Context, Result};
use env_logger::Builder;
use gpu_shim::{BackendType, Config, DeviceCreationOptions, Instance};

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_from_path(&path)?,
        None => Config::load(),
    };

    init_logging(&config);
    log::info!("Starting gpu-shim ({})", config.instance.app_name);

    let instance = Instance::from_config(&config);
    instance.discover_default_adapters();

    let count = instance.adapter_count();
    println!("{} adapter(s)", count);
    for index in 0..count {
        let properties = instance.adapter_properties(index)?;
        let extensions = instance.adapter_extensions(index)?;
        println!(
            "[{}] {} ({}, {}) vendor 0x{:04x} device 0x{:04x}",
            index,
            properties.name,
            properties.adapter_type,
            properties.backend_type,
            properties.vendor_id,
            properties.device_id
        );
        if !extensions.is_empty() {
            println!("    extensions: {}", extensions.join(", "));
        }
    }

    if let Some(index) = config.device.adapter_index {
        create_device(&instance, &config, index)?;
    }

    Ok(())
}

/// RUST_LOG wins over the configured level
fn init_logging(config: &Config) {
    let mut builder = Builder::new();
    builder.parse_filters(&config.debug.log_level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn create_device(instance: &Instance, config: &Config, index: usize) -> Result<()> {
    fn as_strs(names: &[String]) -> Vec<&str> {
        names.iter().map(String::as_str).collect()
    }
    let required_extensions = as_strs(&config.device.required_extensions);
    let force_enabled_toggles = as_strs(&config.device.force_enabled_toggles);
    let force_disabled_toggles = as_strs(&config.device.force_disabled_toggles);

    let options = DeviceCreationOptions {
        required_extensions: &required_extensions,
        force_enabled_toggles: &force_enabled_toggles,
        force_disabled_toggles: &force_disabled_toggles,
    };
    let device = instance
        .create_device(index, Some(&options))
        .with_context(|| format!("Failed to create device on adapter {}", index))?;

    println!("Created {} device on '{}'", device.backend_type(), device.adapter_name());
    if device.backend_type() == BackendType::Vulkan {
        log::info!("VkInstance: {:?}", device.vulkan_instance()?);
    }
    Ok(())
}
