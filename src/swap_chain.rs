// Swap-chain Bridge - binds a device to a presentable native surface
//
// Vulkan devices take a VkSurfaceKHR, D3D12 devices take a window handle.
// The surface family must match the device family, and the family must be
// compiled into this build (see registry::Capabilities).

use ash::vk;
use raw_window_handle::RawWindowHandle;
use std::fmt;
use std::num::NonZeroIsize;

use crate::backend::NativeSwapChain;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::registry::{BackendType, Capabilities};

/// Presentable texture formats a swap chain may prefer
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TextureFormat {
    #[default]
    Undefined = 0,
    RGBA8Unorm = 1,
    RGBA8UnormSrgb = 2,
    BGRA8Unorm = 3,
    BGRA8UnormSrgb = 4,
    RGB10A2Unorm = 5,
    RGBA16Float = 6,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    #[default]
    Fifo,
    FifoRelaxed,
}

/// Win32 window handle
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Hwnd(pub NonZeroIsize);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SurfaceHandle {
    Vulkan(vk::SurfaceKHR),
    D3D12(Hwnd),
}

impl SurfaceHandle {
    /// D3D12 surface from a Win32 window handle
    pub fn from_raw_window_handle(handle: RawWindowHandle) -> Result<Self> {
        match handle {
            RawWindowHandle::Win32(handle) => Ok(Self::D3D12(Hwnd(handle.hwnd))),
            other => Err(Error::internal(format!(
                "window handle {:?} cannot back a D3D12 swap chain",
                other
            ))),
        }
    }

    fn backend_type(&self) -> BackendType {
        match self {
            Self::Vulkan(_) => BackendType::Vulkan,
            Self::D3D12(_) => BackendType::D3D12,
        }
    }
}

/// Backend-specific object binding a device to one surface
pub struct SwapChainImplementation {
    raw: Box<dyn NativeSwapChain>,
    backend_type: BackendType,
}

impl fmt::Debug for SwapChainImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapChainImplementation")
            .field("backend_type", &self.backend_type)
            .field("preferred_format", &self.raw.preferred_format())
            .finish()
    }
}

impl SwapChainImplementation {
    pub fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    pub fn preferred_format(&self) -> TextureFormat {
        self.raw.preferred_format()
    }

    /// Create (or recreate) the presentable images
    pub fn configure(&mut self, width: u32, height: u32, present_mode: PresentMode) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::internal(format!(
                "cannot configure a {}x{} swap chain",
                width, height
            )));
        }
        log::info!(
            "Configuring {} swap chain: {}x{} {:?}",
            self.backend_type,
            width,
            height,
            present_mode
        );
        self.raw.configure(width, height, present_mode)
    }
}

impl Device {
    pub fn create_swap_chain(&self, surface: SurfaceHandle) -> Result<SwapChainImplementation> {
        let family = surface.backend_type();
        if family != self.backend_type() {
            return Err(Error::UnsupportedBackend {
                backend: self.backend_type(),
                operation: match family {
                    BackendType::D3D12 => "d3d12 swap chain",
                    _ => "vulkan swap chain",
                },
            });
        }
        if !Capabilities::current().supports_swap_chain(family) {
            return Err(Error::UnsupportedBackend {
                backend: family,
                operation: "swap chain creation in this build",
            });
        }

        let raw = match surface {
            SurfaceHandle::Vulkan(surface) => self.raw.create_vulkan_swap_chain(surface)?,
            SurfaceHandle::D3D12(hwnd) => self.raw.create_d3d12_swap_chain(hwnd)?,
        };
        log::info!(
            "Created {} swap chain, preferred format {:?}",
            family,
            raw.preferred_format()
        );

        Ok(SwapChainImplementation {
            raw,
            backend_type: family,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{Win32WindowHandle, XlibWindowHandle};

    #[test]
    fn win32_handles_become_d3d12_surfaces() {
        let hwnd = NonZeroIsize::new(0x1234).unwrap();
        let surface =
            SurfaceHandle::from_raw_window_handle(RawWindowHandle::Win32(Win32WindowHandle::new(hwnd)))
                .unwrap();
        assert_eq!(surface, SurfaceHandle::D3D12(Hwnd(hwnd)));
    }

    #[test]
    fn other_window_handles_are_rejected() {
        let handle = RawWindowHandle::Xlib(XlibWindowHandle::new(7));
        assert!(SurfaceHandle::from_raw_window_handle(handle).is_err());
    }
}
