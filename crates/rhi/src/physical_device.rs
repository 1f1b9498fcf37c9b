//! Physical device (GPU) selection.
//!
//! A device is usable when it has a graphics queue, a queue that can present
//! to the window surface, the swapchain extension, and at least one surface
//! format and present mode. Usable devices are ranked with discrete GPUs
//! first, then by device-local memory.
//!
//! # Example
//!
//! ```no_run
//! use renderer_rhi::instance::Instance;
//! use renderer_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! # fn example(surface: vk::SurfaceKHR) -> Result<(), renderer_rhi::RhiError> {
//! let instance = Instance::new("demo", false, &[])?;
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let device_info = select_physical_device(instance.handle(), surface, &surface_loader)?;
//! println!("Selected GPU: {}", device_info.device_name());
//! # Ok(())
//! # }
//! ```

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::DEVICE_EXTENSIONS;
use crate::error::RhiError;
use crate::swapchain::SwapchainSupportDetails;

/// Queue family indices used for rendering and presentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Distinct family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }
}

/// A usable physical device and what was learned while checking it.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Total device-local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.properties.api_version;
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field(
                "api_version",
                &format!(
                    "{}.{}.{}",
                    vk::api_version_major(version),
                    vk::api_version_minor(version),
                    vk::api_version_patch(version)
                ),
            )
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the highest-ranked usable GPU for presenting to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", devices.len());

    let selected = devices
        .into_iter()
        .filter_map(|device| check_device_suitability(instance, device, surface, surface_loader))
        .max_by_key(|info| {
            let score = rate_device(info.properties.device_type, info.device_local_memory());
            debug!(
                "GPU '{}' ({}) - Score: {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            score
        });

    match selected {
        Some(info) => {
            info!(
                "Selected GPU: '{}' ({})",
                info.device_name(),
                info.device_type_name()
            );
            Ok(info)
        }
        None => {
            warn!("No GPU can present to the window surface");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing queue families (graphics={}, present={})",
            name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    if !supports_device_extensions(instance, device) {
        debug!("GPU '{}' skipped: swapchain extension not supported", name);
        return None;
    }

    let adequate = SwapchainSupportDetails::query(device, surface, surface_loader)
        .map(|support| support.is_adequate())
        .unwrap_or(false);
    if !adequate {
        debug!("GPU '{}' skipped: no surface formats or present modes", name);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
    })
}

fn supports_device_extensions(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    let Ok(available) = (unsafe { instance.enumerate_device_extension_properties(device) }) else {
        return false;
    };

    DEVICE_EXTENSIONS.iter().all(|required| {
        available
            .iter()
            .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == *required))
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let capabilities = families.iter().zip(0u32..).map(|(family, index)| {
        let can_present = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .unwrap_or(false)
        };
        FamilyCapability {
            usable: family.queue_count > 0,
            graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present: can_present,
        }
    });
    choose_queue_families(capabilities)
}

/// What one queue family can do, as far as family selection cares.
#[derive(Debug, Clone, Copy)]
struct FamilyCapability {
    usable: bool,
    graphics: bool,
    present: bool,
}

/// Picks a single family that can both draw and present if there is one,
/// otherwise the first graphics family and the first presenting family.
fn choose_queue_families(
    families: impl IntoIterator<Item = FamilyCapability>,
) -> QueueFamilyIndices {
    let mut fallback = QueueFamilyIndices::default();

    for (family, index) in families.into_iter().zip(0u32..) {
        if !family.usable {
            continue;
        }
        if family.graphics && family.present {
            return QueueFamilyIndices {
                graphics_family: Some(index),
                present_family: Some(index),
            };
        }
        if family.graphics {
            fallback.graphics_family.get_or_insert(index);
        }
        if family.present {
            fallback.present_family.get_or_insert(index);
        }
    }

    fallback
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

fn rate_device(device_type: vk::PhysicalDeviceType, device_local_memory: u64) -> u64 {
    let type_score = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 10_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1_000,
        vk::PhysicalDeviceType::CPU => 100,
        _ => 1,
    };
    // VRAM in MB, capped at 16 GB.
    type_score + (device_local_memory / (1024 * 1024)).min(16_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_family_indices_default_is_incomplete() {
        let indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());
        assert!(indices.unique_families().is_empty());
    }

    #[test]
    fn test_queue_family_indices_incomplete() {
        let graphics_only = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!graphics_only.is_complete());

        let present_only = QueueFamilyIndices {
            graphics_family: None,
            present_family: Some(0),
        };
        assert!(!present_only.is_complete());
    }

    #[test]
    fn test_unique_families_shared_family() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(2),
            present_family: Some(2),
        };
        assert!(indices.is_complete());
        assert_eq!(indices.unique_families(), vec![2]);
    }

    #[test]
    fn test_unique_families_separate_families() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
        };
        assert_eq!(indices.unique_families(), vec![0, 1]);
    }

    #[test]
    fn test_rate_device_prefers_discrete() {
        let discrete = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 0);
        let integrated = rate_device(vk::PhysicalDeviceType::INTEGRATED_GPU, 64 << 30);
        assert!(discrete > integrated);
    }

    #[test]
    fn test_rate_device_memory_breaks_ties() {
        let small = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 4 << 30);
        let large = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 8 << 30);
        assert!(large > small);
    }

    fn family(usable: bool, graphics: bool, present: bool) -> FamilyCapability {
        FamilyCapability {
            usable,
            graphics,
            present,
        }
    }

    #[test]
    fn test_shared_family_wins_over_earlier_split_families() {
        let indices = choose_queue_families([
            family(true, true, false),
            family(true, false, true),
            family(true, true, true),
        ]);
        assert_eq!(indices.graphics_family, Some(2));
        assert_eq!(indices.present_family, Some(2));
    }

    #[test]
    fn test_split_families_take_first_of_each() {
        let indices = choose_queue_families([
            family(true, false, true),
            family(true, true, false),
            family(true, true, false),
        ]);
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(0));
        assert_eq!(indices.unique_families(), vec![1, 0]);
    }

    #[test]
    fn test_empty_families_are_skipped() {
        let indices = choose_queue_families([family(false, true, true), family(true, true, false)]);
        assert_eq!(indices.graphics_family, Some(1));
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_device_type_name() {
        assert_eq!(device_type_name(vk::PhysicalDeviceType::CPU), "CPU");
        assert_eq!(device_type_name(vk::PhysicalDeviceType::OTHER), "Other");
    }
}
