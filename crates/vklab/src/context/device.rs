use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::Arc;

use ash::vk;

use crate::context::{Instance, Queue, QueueBuilder};
use crate::error::DeviceError;

///Collects everything needed to create a [Device] on one physical device.
/// Usually obtained through
/// [PhyDeviceProperties::into_device_builder](crate::context::PhyDeviceProperties::into_device_builder).
pub struct DeviceBuilder {
    pub instance: Arc<Instance>,
    pub physical_device: vk::PhysicalDevice,
    pub queues: Vec<QueueBuilder>,
    pub features: vk::PhysicalDeviceFeatures,
    pub device_extensions: Vec<&'static CStr>,
}

impl DeviceBuilder {
    ///Applies `mapping` to the builder. Can be chained for several changes.
    pub fn with(mut self, mapping: impl FnOnce(&mut DeviceBuilder)) -> Self {
        mapping(&mut self);
        self
    }

    pub fn push_extension(mut self, extension: &'static CStr) -> Self {
        if self.device_extensions.contains(&extension) {
            log::warn!("Device extension {:?} was already added", extension);
        } else {
            self.device_extensions.push(extension);
        }
        self
    }

    ///Checks that every requested extension is supported by the physical
    /// device.
    fn check_extensions(&self) -> Result<(), DeviceError> {
        let supported = unsafe {
            self.instance
                .inner
                .enumerate_device_extension_properties(self.physical_device)
                .map_err(DeviceError::VkError)?
        };

        for requested in self.device_extensions.iter() {
            let found = supported.iter().any(|properties| {
                CStr::from_bytes_until_nul(bytemuck::cast_slice(
                    properties.extension_name.as_slice(),
                )) == Ok(*requested)
            });
            if !found {
                return Err(DeviceError::UnsupportedExtension((*requested).to_owned()));
            }
        }
        Ok(())
    }

    pub fn build(self) -> Result<Arc<Device>, DeviceError> {
        self.check_extensions()?;

        let DeviceBuilder {
            instance,
            physical_device,
            queues,
            features,
            device_extensions,
        } = self;

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queues
            .iter()
            .map(|builder| builder.as_create_info())
            .collect();
        let extension_names: Vec<*const c_char> = device_extensions
            .iter()
            .map(|extension| extension.as_ptr())
            .collect();

        log::info!(
            "Creating device on {} queue families with extensions {:?}",
            queue_create_infos.len(),
            device_extensions
        );

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .inner
                .create_device(physical_device, &create_info, None)?
        };

        let created_queues = queues
            .iter()
            .flat_map(|family| {
                (0..family.priorities.len() as u32).map(|queue_index| Queue {
                    inner: unsafe { device.get_device_queue(family.family_index, queue_index) },
                    family_index: family.family_index,
                    properties: family.properties,
                })
            })
            .collect();

        Ok(Arc::new(Device {
            inner: device,
            instance,
            physical_device,
            queues: created_queues,
        }))
    }
}

///A logical device and the queues that were created with it. Keeps the
/// instance alive. The raw `ash` device stays reachable through
/// [inner](Self::inner) for everything this crate does not wrap.
pub struct Device {
    pub inner: ash::Device,
    pub instance: Arc<Instance>,
    pub physical_device: vk::PhysicalDevice,
    pub queues: Vec<Queue>,
}

impl Device {
    ///First queue created on `family_index`, if any.
    pub fn first_queue_for_family(&self, family_index: u32) -> Option<&Queue> {
        self.queues
            .iter()
            .find(|queue| queue.family_index == family_index)
    }

    ///Blocks until all queues of this device finished their submitted work.
    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        unsafe { self.inner.device_wait_idle() }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { self.inner.destroy_device(None) };
    }
}
