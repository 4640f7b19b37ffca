//! Swapchain, render pass and framebuffer management
//!
//! Everything whose lifetime is tied to the window surface lives here:
//! the swapchain images and views, the depth buffer, the render pass
//! describing one color plus one depth attachment, and the framebuffers
//! binding them together. Resize recreates the whole set.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Instance};

use super::context::{PhysicalDeviceInfo, VulkanError, VulkanResult};
use super::texture;

/// Prefer B8G8R8A8_SRGB with a nonlinear sRGB color space
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|sf| {
            sf.format == vk::Format::B8G8R8A8_SRGB
                && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .cloned()
        .unwrap_or(formats[0])
}

/// Prefer MAILBOX, fall back to the always-available FIFO
fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .cloned()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Resolve the swapchain extent from surface capabilities
///
/// `u32::MAX` in `current_extent` means the surface lets the swapchain
/// pick; clamp the framebuffer size into the supported range.
fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: window_extent
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window_extent
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 means no cap)
fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Pick the first depth format the device supports for attachment use
fn find_depth_format(instance: &Instance, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::Format> {
    let candidates = [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ];

    for format in candidates {
        let props = unsafe { instance.get_physical_device_format_properties(physical_device, format) };
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return Ok(format);
        }
    }

    Err(VulkanError::InitializationFailed(
        "No supported depth format found".to_string(),
    ))
}

/// Swapchain with depth buffer, render pass and framebuffers
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    image_views: Vec<vk::ImageView>,
    depth_image: vk::Image,
    depth_memory: vk::DeviceMemory,
    depth_view: vk::ImageView,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain sized to the current framebuffer
    pub fn new(
        instance: &Instance,
        device: Device,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        physical_device_info: &PhysicalDeviceInfo,
        mem_properties: &vk::PhysicalDeviceMemoryProperties,
        window_extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        Self::create(
            instance,
            device,
            surface,
            surface_loader,
            physical_device_info,
            mem_properties,
            window_extent,
            vk::SwapchainKHR::null(),
        )
    }

    /// Recreate the swapchain after a resize, retiring the old one
    ///
    /// The caller must have waited for the device to go idle; the old
    /// swapchain handle is passed so in-flight presents can drain.
    pub fn recreate(
        instance: &Instance,
        device: Device,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        physical_device_info: &PhysicalDeviceInfo,
        mem_properties: &vk::PhysicalDeviceMemoryProperties,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        log::debug!(
            "Recreating swapchain at {}x{}",
            window_extent.width,
            window_extent.height
        );
        Self::create(
            instance,
            device,
            surface,
            surface_loader,
            physical_device_info,
            mem_properties,
            window_extent,
            old_swapchain,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn create(
        instance: &Instance,
        device: Device,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        physical_device_info: &PhysicalDeviceInfo,
        mem_properties: &vk::PhysicalDeviceMemoryProperties,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        // Capabilities change with the window, so query fresh every time
        let support = PhysicalDeviceInfo::query_swapchain_support(
            physical_device_info.device,
            surface,
            surface_loader,
        )?;

        let format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, window_extent);
        let image_count = choose_image_count(&support.capabilities);

        log::debug!(
            "Swapchain: {:?} {:?} {}x{} ({} images)",
            format.format,
            present_mode,
            extent.width,
            extent.height,
            image_count
        );

        // Images used across two queue families need concurrent sharing
        let family_indices = [
            physical_device_info.graphics_family,
            physical_device_info.present_family,
        ];
        let distinct_families =
            physical_device_info.graphics_family != physical_device_info.present_family;

        let mut swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        swapchain_create_info = if distinct_families {
            swapchain_create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            swapchain_create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe {
            swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        let image_views: Result<Vec<_>, _> = images
            .iter()
            .map(|&image| {
                texture::create_image_view(&device, image, format.format, vk::ImageAspectFlags::COLOR)
            })
            .collect();
        let image_views = image_views?;

        // Depth buffer shared by all framebuffers
        let depth_format = find_depth_format(instance, physical_device_info.device)?;
        let (depth_image, depth_memory) = texture::create_image(
            &device,
            mem_properties,
            extent,
            depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let depth_view =
            texture::create_image_view(&device, depth_image, depth_format, vk::ImageAspectFlags::DEPTH)?;

        let render_pass = Self::create_render_pass(&device, format.format, depth_format)?;

        let framebuffers: Result<Vec<_>, _> = image_views
            .iter()
            .map(|&view| {
                let attachments = [view, depth_view];
                let framebuffer_info = vk::FramebufferCreateInfo::builder()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);

                unsafe {
                    device
                        .create_framebuffer(&framebuffer_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect();
        let framebuffers = framebuffers?;

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            image_views,
            depth_image,
            depth_memory,
            depth_view,
            render_pass,
            framebuffers,
            format,
            extent,
        })
    }

    /// Render pass with one cleared color and one cleared depth attachment
    ///
    /// The external dependency delays the first attachment write until the
    /// image-available semaphore's wait stage has passed.
    fn create_render_pass(
        device: &Device,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> VulkanResult<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let depth_attachment = vk::AttachmentDescription::builder()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();
        let depth_ref = vk::AttachmentReference::builder()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_refs = [color_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)
            .build();

        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .build();

        let attachments = [color_attachment, depth_attachment];
        let subpasses = [subpass];
        let dependencies = [dependency];
        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe {
            device
                .create_render_pass(&render_pass_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Get the swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get the surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get the render pass
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Get the framebuffer for a swapchain image index
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    /// Get the swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get the swapchain loader
    pub fn loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> u32 {
        self.image_views.len() as u32
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);

            self.device.destroy_image_view(self.depth_view, None);
            self.device.destroy_image(self.depth_image, None);
            self.device.free_memory(self.depth_memory, None);

            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        let mut caps = vk::SurfaceCapabilitiesKHR::default();
        caps.current_extent = vk::Extent2D {
            width: current.0,
            height: current.1,
        };
        caps.min_image_extent = vk::Extent2D {
            width: min.0,
            height: min.1,
        };
        caps.max_image_extent = vk::Extent2D {
            width: max.0,
            height: max.1,
        };
        caps
    }

    #[test]
    fn test_surface_format_prefers_bgra_srgb() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_surface_format_falls_back_to_first() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_extent_uses_current_when_fixed() {
        let caps = caps((800, 600), (1, 1), (4096, 4096));
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 1024,
                height: 768,
            },
        );
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn test_extent_clamps_when_surface_defers() {
        let caps = caps((u32::MAX, u32::MAX), (200, 200), (1000, 1000));
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 5000,
                height: 100,
            },
        );
        assert_eq!(extent.width, 1000);
        assert_eq!(extent.height, 200);
    }

    #[test]
    fn test_extent_zero_size_clamps_up_to_minimum() {
        let caps = caps((u32::MAX, u32::MAX), (400, 300), (4096, 4096));
        let extent = choose_extent(&caps, vk::Extent2D { width: 0, height: 0 });
        assert_eq!(extent.width, 400);
        assert_eq!(extent.height, 300);
    }

    #[test]
    fn test_image_count_is_min_plus_one() {
        let mut c = caps((800, 600), (1, 1), (4096, 4096));
        c.min_image_count = 2;
        c.max_image_count = 8;
        assert_eq!(choose_image_count(&c), 3);
    }

    #[test]
    fn test_image_count_respects_max() {
        let mut c = caps((800, 600), (1, 1), (4096, 4096));
        c.min_image_count = 3;
        c.max_image_count = 3;
        assert_eq!(choose_image_count(&c), 3);
    }

    #[test]
    fn test_image_count_unbounded_when_max_is_zero() {
        let mut c = caps((800, 600), (1, 1), (4096, 4096));
        c.min_image_count = 4;
        c.max_image_count = 0;
        assert_eq!(choose_image_count(&c), 5);
    }
}
