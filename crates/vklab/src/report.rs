//! Logged reports about the available adapters and what a surface supports
//! on them. Everything goes through [log] at info level.
use std::ffi::CStr;
use std::os::raw::c_char;

use ash::vk;

use crate::context::Instance;
use crate::error::InstanceError;
use crate::surface::Surface;

///Parses one of the fixed-size name fields Vulkan reports, for instance
/// `device_name` or `layer_name`.
pub fn parse_name_field(raw: &[c_char]) -> String {
    CStr::from_bytes_until_nul(bytemuck::cast_slice(raw))
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from("<unparsable>"))
}

///Adapter name out of its properties.
pub fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    parse_name_field(properties.device_name.as_slice())
}

///Renders a packed Vulkan version as `major.minor.patch`.
pub fn api_version_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

///Logs every adapter the instance sees: name, type, api version, queue
/// families and memory heaps.
pub fn log_adapters(instance: &Instance) -> Result<(), vk::Result> {
    let adapters = unsafe { instance.inner.enumerate_physical_devices()? };
    log::info!("{} Vulkan adapter(s)", adapters.len());

    for (index, adapter) in adapters.iter().enumerate() {
        let properties = unsafe { instance.inner.get_physical_device_properties(*adapter) };
        log::info!(
            "Adapter {}: {} ({:?})",
            index,
            device_name(&properties),
            properties.device_type
        );
        log::info!(
            "  api version {}, driver version {}",
            api_version_string(properties.api_version),
            properties.driver_version
        );

        let families = unsafe {
            instance
                .inner
                .get_physical_device_queue_family_properties(*adapter)
        };
        for (family, family_properties) in families.iter().enumerate() {
            log::info!(
                "  queue family {}: {:?} x{}",
                family,
                family_properties.queue_flags,
                family_properties.queue_count
            );
        }

        let memory = unsafe {
            instance
                .inner
                .get_physical_device_memory_properties(*adapter)
        };
        for heap_index in 0..memory.memory_heap_count as usize {
            let heap = memory.memory_heaps[heap_index];
            log::info!(
                "  heap {}: {} MiB {:?}",
                heap_index,
                heap.size / (1024 * 1024),
                heap.flags
            );
        }
    }
    Ok(())
}

///Logs what `surface` supports on `adapter`: image count and extent limits,
/// formats and present modes.
pub fn log_surface_support(
    surface: &Surface,
    adapter: vk::PhysicalDevice,
) -> Result<(), InstanceError> {
    let capabilities = surface.capabilities(adapter)?;
    log::info!(
        "Surface: {} to {} images, current extent {:?}",
        capabilities.min_image_count,
        capabilities.max_image_count,
        capabilities.current_extent
    );

    for format in surface.formats(adapter)? {
        log::info!("  format {:?} / {:?}", format.format, format.color_space);
    }
    for mode in surface.present_modes(adapter)? {
        log::info!("  present mode {:?}", mode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_field_stops_at_the_terminator() {
        let mut raw = [0 as c_char; 16];
        for (index, byte) in b"TestGpu\0junk".iter().enumerate() {
            raw[index] = *byte as c_char;
        }
        assert_eq!(parse_name_field(&raw), "TestGpu");
    }

    #[test]
    fn unterminated_name_field_is_flagged() {
        let raw = [b'x' as c_char; 4];
        assert_eq!(parse_name_field(&raw), "<unparsable>");
    }

    #[test]
    fn version_string_unpacks_the_parts() {
        assert_eq!(api_version_string(vk::make_api_version(0, 1, 2, 0)), "1.2.0");
        assert_eq!(
            api_version_string(vk::make_api_version(0, 1, 3, 281)),
            "1.3.281"
        );
    }
}
