//! Window surface wrapper. Owns the `VK_KHR_surface` handle and answers the
//! capability queries swapchain creation is based on.
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::context::Instance;
use crate::error::InstanceError;

///A window surface. Keeps the instance it was created on alive and destroys
/// the surface handle on drop.
pub struct Surface {
    pub instance: Arc<Instance>,
    pub inner: vk::SurfaceKHR,
    pub loader: ash::khr::surface::Instance,
}

impl Surface {
    pub fn new<W>(instance: &Arc<Instance>, window: &W) -> Result<Self, InstanceError>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.inner,
                window.display_handle()?.as_raw(),
                window.window_handle()?.as_raw(),
                None,
            )?
        };
        let loader = ash::khr::surface::Instance::new(&instance.entry, &instance.inner);

        Ok(Surface {
            instance: instance.clone(),
            inner: surface,
            loader,
        })
    }

    pub fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR, InstanceError> {
        let capabilities = unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.inner)?
        };
        Ok(capabilities)
    }

    pub fn formats(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, InstanceError> {
        let formats = unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.inner)?
        };
        Ok(formats)
    }

    pub fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::PresentModeKHR>, InstanceError> {
        let modes = unsafe {
            self.loader
                .get_physical_device_surface_present_modes(physical_device, self.inner)?
        };
        Ok(modes)
    }

    ///True if `family_index` of `physical_device` can present to this
    /// surface.
    pub fn supports_family(
        &self,
        physical_device: vk::PhysicalDevice,
        family_index: u32,
    ) -> Result<bool, InstanceError> {
        let supported = unsafe {
            self.loader.get_physical_device_surface_support(
                physical_device,
                family_index,
                self.inner,
            )?
        };
        Ok(supported)
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.inner, None) };
    }
}
