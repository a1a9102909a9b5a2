//! # Context
//!
//! Startup path shared by every program in this crate: load the Vulkan
//! library, create an [Instance], pick a physical device and create a
//! [Device] with the single queue the frame loop runs on.
//!
//! The pieces compose freely for unusual setups, [Ctx] bundles the common
//! case.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

mod device;
pub use device::{Device, DeviceBuilder};
mod instance;
pub use instance::{Debugger, Instance, InstanceBuilder};
mod physical_device;
pub use physical_device::{PhyDeviceProperties, PhysicalDeviceFilter};
mod queue;
pub use queue::{Queue, QueueBuilder};

use crate::error::{DeviceError, VklabError};
use crate::surface::Surface;

///Queue capabilities the bootstrap paths select for.
fn required_queue_flags() -> vk::QueueFlags {
    vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER
}

///Instance and device bundle for the common single-queue setup.
pub struct Ctx {
    pub device: Arc<Device>,
    pub instance: Arc<Instance>,
}

impl Ctx {
    ///Context without any surface related setup, for inspection tools and
    /// tests that never present.
    pub fn new_headless(use_validation: bool) -> Result<Self, VklabError> {
        let mut builder = Instance::load()?;
        if use_validation {
            builder = builder.enable_validation();
        }
        let instance = builder.build()?;

        let mut candidates = instance
            .create_physical_device_filter()?
            .filter_queue_flags(required_queue_flags())
            .prefer_discrete()
            .release();
        if candidates.is_empty() {
            return Err(DeviceError::NoPhysicalDevice.into());
        }
        let candidate = candidates.remove(0);
        log::info!(
            "Using adapter {}",
            crate::report::device_name(&candidate.properties)
        );

        let family = candidate
            .find_queue_family(required_queue_flags())
            .ok_or(DeviceError::NoSuitableQueueFamily)?;
        let device = candidate
            .into_device_builder(instance.clone(), family)?
            .build()?;

        Ok(Ctx { device, instance })
    }

    ///Context that can present to `window`: an instance with the surface
    /// extensions of the windowing system, a queue family that is both
    /// capable and presentable, and a device with the swapchain extension.
    /// Returns the created [Surface] alongside.
    pub fn with_surface<W>(
        window: &W,
        use_validation: bool,
    ) -> Result<(Self, Arc<Surface>), VklabError>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let mut builder = Instance::load()?.for_surface(window)?;
        if use_validation {
            builder = builder.enable_validation();
        }
        let instance = builder.build()?;
        let surface = Arc::new(Surface::new(&instance, window)?);

        let mut candidates = instance
            .create_physical_device_filter()?
            .filter_queue_flags(required_queue_flags())
            .filter_presentable(&surface.loader, surface.inner)?
            .prefer_discrete()
            .release();
        if candidates.is_empty() {
            return Err(DeviceError::NoPhysicalDevice.into());
        }
        let candidate = candidates.remove(0);
        log::info!(
            "Using adapter {}",
            crate::report::device_name(&candidate.properties)
        );

        let family = candidate
            .find_queue_family(required_queue_flags())
            .ok_or(DeviceError::NoSuitableQueueFamily)?;
        let device = candidate
            .into_device_builder(instance.clone(), family)?
            .push_extension(ash::khr::swapchain::NAME)
            .build()?;

        Ok((Ctx { device, instance }, surface))
    }

    ///The queue created at bootstrap. Construction guarantees exactly one.
    pub fn queue(&self) -> &Queue {
        &self.device.queues[0]
    }
}

#[cfg(test)]
mod send_sync_test {
    use super::*;
    use static_assertions::assert_impl_all;

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(Ctx: Send, Sync);
        assert_impl_all!(Device: Send, Sync);
        assert_impl_all!(Instance: Send, Sync);
        assert_impl_all!(Queue: Send, Sync);
    }
}
