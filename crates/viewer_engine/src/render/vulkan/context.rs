//! Vulkan context management
//!
//! Instance creation with validation layers, physical device selection,
//! logical device and queue setup. The [`VulkanContext`] owns everything
//! with instance lifetime; resources with frame or window lifetime are
//! created from it by the other modules.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use super::window::{Window, WindowError};

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Validation was requested but the Khronos validation layer is absent
    #[error("Validation layer VK_LAYER_KHRONOS_validation is not available")]
    ValidationLayerUnavailable,

    /// No physical device satisfies the viewer's requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// No memory type satisfies both the resource's type filter and the
    /// requested property flags
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// An image layout transition outside the supported set was requested
    #[error("Unsupported layout transition: {from:?} -> {to:?}")]
    UnsupportedLayoutTransition {
        /// Current image layout
        from: vk::ImageLayout,
        /// Requested image layout
        to: vk::ImageLayout,
    },

    /// Underlying window system error
    #[error("Window error: {0}")]
    Window(#[from] WindowError),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    validation_enabled: bool,
    /// Debug utilities extension (debug builds)
    #[cfg(debug_assertions)]
    debug_utils: Option<DebugUtils>,
    /// Debug messenger handle (debug builds)
    #[cfg(debug_assertions)]
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance with the extensions the window needs
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e))
        })?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InvalidOperation {
                reason: "Application name contains a NUL byte".to_string(),
            })?;
        let engine_name_cstr = CString::new("viewer_engine").map_err(|_| {
            VulkanError::InvalidOperation {
                reason: "Engine name contains a NUL byte".to_string(),
            }
        })?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.get_required_instance_extensions()?;
        log::debug!("GLFW requires instance extensions: {:?}", required_extensions);

        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .filter_map(|ext| CString::new(ext.as_str()).ok())
            .collect();

        #[allow(unused_mut)]
        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        #[cfg(debug_assertions)]
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let validation_enabled = cfg!(debug_assertions) && enable_validation;
        let layer_names = if validation_enabled {
            // Validation was asked for; a silently missing layer would
            // hide every problem it exists to catch
            if !Self::validation_layer_available(&entry)? {
                return Err(VulkanError::ValidationLayerUnavailable);
            }
            match CString::new("VK_LAYER_KHRONOS_validation") {
                Ok(name) => vec![name],
                Err(_) => vec![],
            }
        } else {
            vec![]
        };
        let layer_names_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let debug_messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(debug_messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            validation_enabled,
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    /// Whether validation layers were enabled at instance creation
    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::Api)?;

        Ok(layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_bytes() == b"VK_LAYER_KHRONOS_validation"
        }))
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(
        debug_utils: &DebugUtils,
    ) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
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

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(debug_messenger)) =
                (&self.debug_utils, &self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(*debug_messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback routing validation messages into the log
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Queue family indices resolved for a physical device
///
/// Resolution is idempotent: the first family with each capability wins,
/// so repeated queries over the same device return the same indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family supporting graphics operations
    pub graphics: Option<u32>,
    /// First family able to present to the surface
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both required families have been found
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }
}

/// Pick the first family with each capability
fn resolve_queue_families(
    flags: &[vk::QueueFlags],
    present_support: &[bool],
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (index, family_flags) in flags.iter().enumerate() {
        if family_flags.contains(vk::QueueFlags::GRAPHICS) && indices.graphics.is_none() {
            indices.graphics = Some(index as u32);
        }

        if present_support.get(index).copied().unwrap_or(false) && indices.present.is_none() {
            indices.present = Some(index as u32);
        }

        if indices.is_complete() {
            break;
        }
    }

    indices
}

/// Surface support queried from a physical device
///
/// Queried fresh at device selection and again on every swapchain
/// (re)creation, since capabilities change with the window.
pub struct SwapchainSupport {
    /// Surface capabilities (extents, image counts, transforms)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// The surface offers at least one format and one present mode
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select the first physical device suitable for rendering
    ///
    /// Suitable means: a graphics queue family, a queue family that can
    /// present to the surface, swapchain extension support, at least one
    /// surface format and present mode, and anisotropic filtering.
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        for device in devices {
            if let Ok(device_info) = Self::evaluate_device(instance, device, surface, surface_loader)
            {
                log::info!("Selected GPU: {}", unsafe {
                    CStr::from_ptr(device_info.properties.device_name.as_ptr()).to_string_lossy()
                });
                return Ok(device_info);
            }
        }

        Err(VulkanError::NoSuitableGpu)
    }

    /// Resolve queue family indices for a device against the surface
    pub fn find_queue_families(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<QueueFamilyIndices> {
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let flags: Vec<vk::QueueFlags> = queue_families.iter().map(|f| f.queue_flags).collect();

        let mut present_support = Vec::with_capacity(queue_families.len());
        for index in 0..queue_families.len() as u32 {
            let supported = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };
            present_support.push(supported);
        }

        Ok(resolve_queue_families(&flags, &present_support))
    }

    /// Query the surface support a swapchain will be built from
    pub fn query_swapchain_support(
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<SwapchainSupport> {
        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(device, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
        };

        Ok(SwapchainSupport {
            capabilities,
            formats,
            present_modes,
        })
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };

        let indices = Self::find_queue_families(instance, device, surface, surface_loader)?;
        let (graphics_family, present_family) = match (indices.graphics, indices.present) {
            (Some(graphics), Some(present)) => (graphics, present),
            _ => return Err(VulkanError::NoSuitableGpu),
        };

        // Swapchain extension support
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };

        let has_swapchain = extensions.iter().any(|available| {
            let extension_name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            extension_name == SwapchainLoader::name()
        });

        if !has_swapchain {
            return Err(VulkanError::InitializationFailed(
                "Swapchain extension not supported".to_string(),
            ));
        }

        let support = Self::query_swapchain_support(device, surface, surface_loader)?;
        if !support.is_adequate() {
            return Err(VulkanError::InitializationFailed(
                "Surface offers no formats or present modes".to_string(),
            ));
        }

        if features.sampler_anisotropy != vk::TRUE {
            return Err(VulkanError::InitializationFailed(
                "Anisotropic filtering not supported".to_string(),
            ));
        }

        Ok(Self {
            device,
            properties,
            features,
            graphics_family,
            present_family,
        })
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a new logical device with graphics and present queues
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        // Graphics and present may be the same family; creating the same
        // family twice is an error, hence the dedup
        let unique_families: std::collections::HashSet<u32> = [
            physical_device_info.graphics_family,
            physical_device_info.present_family,
        ]
        .iter()
        .cloned()
        .collect();

        let queue_priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device_info.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue =
            unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue =
            unsafe { device.get_device_queue(physical_device_info.present_family, 0) };

        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical_device_info.graphics_family,
            present_family: physical_device_info.present_family,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Core Vulkan context owning instance-lifetime resources
pub struct VulkanContext {
    /// Vulkan surface for rendering
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader
    pub surface_loader: Surface,
    /// Selected physical device information
    pub physical_device: PhysicalDeviceInfo,
    /// Logical device for operations
    pub device: LogicalDevice,
    /// Vulkan instance and debug utilities
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Create a new Vulkan context for the window
    pub fn new(window: &mut Window, app_name: &str) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name, cfg!(debug_assertions))?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window.create_vulkan_surface(instance.instance.handle())?;

        let physical_device =
            PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader)?;

        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        log::debug!(
            "Queue families: graphics={}, present={}",
            device.graphics_family,
            device.present_family
        );

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            device,
            instance,
        })
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get a cloned raw Device handle
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Remaining fields drop in reverse declaration order, so the
        // device is destroyed before the instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_family_indices_completeness() {
        let mut indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());

        indices.graphics = Some(0);
        assert!(!indices.is_complete());

        indices.present = Some(0);
        assert!(indices.is_complete());
    }

    #[test]
    fn test_queue_family_resolution_first_wins() {
        let flags = [
            vk::QueueFlags::TRANSFER,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
            vk::QueueFlags::GRAPHICS,
        ];
        let present = [false, false, true];

        let indices = resolve_queue_families(&flags, &present);
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(2));
        assert!(indices.is_complete());
    }

    #[test]
    fn test_queue_family_resolution_is_idempotent() {
        let flags = [vk::QueueFlags::GRAPHICS, vk::QueueFlags::GRAPHICS];
        let present = [true, true];

        let first = resolve_queue_families(&flags, &present);
        let second = resolve_queue_families(&flags, &present);
        assert_eq!(first, second);
        assert_eq!(first.graphics, Some(0));
        assert_eq!(first.present, Some(0));
    }

    #[test]
    fn test_queue_family_resolution_incomplete_without_present() {
        let flags = [vk::QueueFlags::GRAPHICS];
        let present = [false];

        let indices = resolve_queue_families(&flags, &present);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, None);
        assert!(!indices.is_complete());
    }
}
