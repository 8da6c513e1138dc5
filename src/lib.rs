// =============================================================================
// GPU SHIM - Backend-agnostic adapter enumeration, device creation and
// swap-chain binding
// =============================================================================
//
// LAYERS:
// ┌─────────────────────────────────────────────────────────────────┐
// │  ffi (C ABI, status codes, procedure table)                     │
// │    └── Instance → Device → SwapChainImplementation              │
// │          └── registry (public enums, capabilities)              │
// │                └── backend (vulkan, null) behind trait seams    │
// └─────────────────────────────────────────────────────────────────┘
//
// =============================================================================

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod ffi;
pub mod instance;
pub mod registry;
pub mod swap_chain;

pub use config::Config;
pub use device::{Device, DeviceCreationOptions};
pub use error::{Error, Result};
pub use instance::{AdapterDescriptor, DiscoveryPolicy, Instance, InstanceBuilder};
pub use registry::{convert_adapter_type, convert_backend_type, AdapterType, BackendType, Capabilities};
pub use swap_chain::{Hwnd, PresentMode, SurfaceHandle, SwapChainImplementation, TextureFormat};
