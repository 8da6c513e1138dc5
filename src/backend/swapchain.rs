// Vulkan swap chain - binds a device to a caller-owned VkSurfaceKHR
//
// The surface format is picked once at creation (that is the preferred
// format). The VkSwapchainKHR itself is created on configure and recreated
// on every later configure, reusing the old chain as old_swapchain.
// The surface belongs to the caller and is never destroyed here.

use ash::extensions::khr;
use ash::vk;
use std::sync::Arc;

use super::vulkan::DeviceShared;
use super::NativeSwapChain;
use crate::error::{Error, Result};
use crate::swap_chain::{PresentMode, TextureFormat};

pub(super) struct VulkanSwapChain {
    device: Arc<DeviceShared>,
    surface: vk::SurfaceKHR,
    surface_loader: khr::Surface,
    swapchain_loader: khr::Swapchain,
    surface_format: vk::SurfaceFormatKHR,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
}

impl VulkanSwapChain {
    pub(super) fn new(device: Arc<DeviceShared>, surface: vk::SurfaceKHR) -> Result<Self> {
        let instance = &device.instance;
        let surface_loader = khr::Surface::new(&instance.entry, &instance.instance);

        // Verify the GPU supports presenting to this surface
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(
                device.physical_device,
                device.graphics_queue_family,
                surface,
            )
        }?;
        if !supported {
            return Err(Error::internal("device cannot present to this surface"));
        }

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device, surface)
        }?;
        let surface_format = choose_surface_format(&formats)
            .ok_or_else(|| Error::internal("surface reports no formats"))?;
        log::debug!("Surface format: {:?}", surface_format);

        let swapchain_loader = khr::Swapchain::new(&instance.instance, &device.device);

        Ok(Self {
            device,
            surface,
            surface_loader,
            swapchain_loader,
            surface_format,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
        })
    }
}

impl NativeSwapChain for VulkanSwapChain {
    fn preferred_format(&self) -> TextureFormat {
        texture_format(self.surface_format.format)
    }

    fn configure(&mut self, width: u32, height: u32, present_mode: PresentMode) -> Result<()> {
        let physical_device = self.device.physical_device;

        let surface_caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
        }?;
        let present_modes = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
        }?;

        let requested = vk_present_mode(present_mode);
        let mode = if present_modes.contains(&requested) {
            requested
        } else {
            log::warn!("Present mode {:?} unavailable, falling back to FIFO", present_mode);
            vk::PresentModeKHR::FIFO // FIFO is always supported
        };

        let extent = choose_extent(&surface_caps, width, height);
        let image_count = choose_image_count(&surface_caps);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(mode)
            .clipped(true)
            .old_swapchain(self.swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }?;

        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(self.swapchain, None) };
        }
        self.swapchain = swapchain;
        self.images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }?;

        log::info!(
            "Created swapchain with {} images ({}x{}, {:?})",
            self.images.len(),
            extent.width,
            extent.height,
            mode
        );
        Ok(())
    }
}

impl Drop for VulkanSwapChain {
    fn drop(&mut self) {
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                let _ = self.device.device.device_wait_idle();
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}

/// Prefer BGRA8 sRGB, then anything the public enum can express
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| {
            formats
                .iter()
                .find(|f| texture_format(f.format) != TextureFormat::Undefined)
        })
        .or_else(|| formats.first())
        .copied()
}

fn texture_format(format: vk::Format) -> TextureFormat {
    match format {
        vk::Format::R8G8B8A8_UNORM => TextureFormat::RGBA8Unorm,
        vk::Format::R8G8B8A8_SRGB => TextureFormat::RGBA8UnormSrgb,
        vk::Format::B8G8R8A8_UNORM => TextureFormat::BGRA8Unorm,
        vk::Format::B8G8R8A8_SRGB => TextureFormat::BGRA8UnormSrgb,
        vk::Format::A2B10G10R10_UNORM_PACK32 => TextureFormat::RGB10A2Unorm,
        vk::Format::R16G16B16A16_SFLOAT => TextureFormat::RGBA16Float,
        _ => TextureFormat::Undefined,
    }
}

fn vk_present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

// One more than the minimum, capped by the maximum (0 = unbounded)
fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        caps.max_image_count
    } else {
        image_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn prefers_bgra8_srgb() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(texture_format(chosen.format), TextureFormat::BGRA8UnormSrgb);
    }

    #[test]
    fn skips_formats_without_a_public_name() {
        let formats = [
            surface_format(vk::Format::R5G6B5_UNORM_PACK16),
            surface_format(vk::Format::R16G16B16A16_SFLOAT),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R16G16B16A16_SFLOAT);
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [surface_format(vk::Format::R5G6B5_UNORM_PACK16)];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(texture_format(chosen.format), TextureFormat::Undefined);
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn extent_is_clamped_when_surface_defers_to_swapchain() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };
        let extent = choose_extent(&caps, 4096, 600);
        assert_eq!((extent.width, extent.height), (1920, 600));
    }

    #[test]
    fn extent_follows_surface_when_fixed() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let extent = choose_extent(&caps, 1280, 720);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn image_count_respects_maximum() {
        let bounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&bounded), 2);

        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&unbounded), 3);
    }
}
