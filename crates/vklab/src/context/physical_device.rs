use std::sync::Arc;

use ash::vk;

use crate::context::{DeviceBuilder, Instance, QueueBuilder};
use crate::error::{DeviceError, InstanceError};

///A physical device candidate: the raw handle, its properties and the queue
/// families that survived filtering so far.
#[derive(Clone, Debug)]
pub struct PhyDeviceProperties {
    pub phydev: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    ///Remaining queue families as `(family_index, properties)` pairs.
    pub queue_properties: Vec<(u32, vk::QueueFamilyProperties)>,
}

impl PhyDeviceProperties {
    pub fn new(instance: &ash::Instance, phydev: vk::PhysicalDevice) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(phydev) };
        let queue_properties = unsafe {
            instance
                .get_physical_device_queue_family_properties(phydev)
                .into_iter()
                .enumerate()
                .map(|(index, properties)| (index as u32, properties))
                .collect()
        };

        PhyDeviceProperties {
            phydev,
            properties,
            queue_properties,
        }
    }

    ///First remaining family whose flags contain `flags`.
    pub fn find_queue_family(&self, flags: vk::QueueFlags) -> Option<u32> {
        self.queue_properties
            .iter()
            .find(|(_, properties)| properties.queue_flags.contains(flags))
            .map(|(index, _)| *index)
    }

    ///Turns the candidate into a [DeviceBuilder] that creates a single queue
    /// on `family_index`. Fails if the family was filtered away.
    pub fn into_device_builder(
        self,
        instance: Arc<Instance>,
        family_index: u32,
    ) -> Result<DeviceBuilder, DeviceError> {
        let (_, family_properties) = *self
            .queue_properties
            .iter()
            .find(|(index, _)| *index == family_index)
            .ok_or(DeviceError::NoSuitableQueueFamily)?;

        Ok(DeviceBuilder {
            instance,
            physical_device: self.phydev,
            queues: vec![QueueBuilder::new(family_index, family_properties)],
            features: vk::PhysicalDeviceFeatures::default(),
            device_extensions: Vec::new(),
        })
    }
}

///Filter chain over all physical devices of an instance. Each filter narrows
/// the candidate list (or the queue families within the candidates), the
/// remaining devices are handed out through [release](Self::release).
pub struct PhysicalDeviceFilter {
    pub pdevices: Vec<PhyDeviceProperties>,
}

impl PhysicalDeviceFilter {
    pub fn new(instance: &ash::Instance, pdevices: Vec<vk::PhysicalDevice>) -> Self {
        let pdevices = pdevices
            .into_iter()
            .map(|phydev| PhyDeviceProperties::new(instance, phydev))
            .collect();
        PhysicalDeviceFilter { pdevices }
    }

    ///Keeps only devices with at least one queue family containing `flags`.
    pub fn filter_queue_flags(mut self, flags: vk::QueueFlags) -> Self {
        self.pdevices
            .retain(|candidate| candidate.find_queue_family(flags).is_some());
        self
    }

    ///Drops queue families that cannot present to `surface`, then every
    /// device with no presentable family left.
    pub fn filter_presentable(
        mut self,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<Self, InstanceError> {
        for candidate in self.pdevices.iter_mut() {
            let mut presentable = Vec::with_capacity(candidate.queue_properties.len());
            for (family_index, properties) in candidate.queue_properties.drain(..) {
                let supported = unsafe {
                    surface_loader.get_physical_device_surface_support(
                        candidate.phydev,
                        family_index,
                        surface,
                    )?
                };
                if supported {
                    presentable.push((family_index, properties));
                } else {
                    log::info!(
                        "Dropping queue family {} of {:?}, not presentable",
                        family_index,
                        candidate.phydev
                    );
                }
            }
            candidate.queue_properties = presentable;
        }

        self.pdevices
            .retain(|candidate| !candidate.queue_properties.is_empty());
        Ok(self)
    }

    ///Custom filter predicate over the remaining candidates.
    pub fn filter(mut self, filter: impl Fn(&PhyDeviceProperties) -> bool) -> Self {
        self.pdevices.retain(|candidate| filter(candidate));
        self
    }

    ///Sorts the remaining candidates so that discrete GPUs come first,
    /// integrated ones second and everything else after.
    pub fn prefer_discrete(mut self) -> Self {
        self.pdevices
            .sort_by_key(|candidate| match candidate.properties.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 0,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                _ => 2,
            });
        self
    }

    pub fn release(self) -> Vec<PhyDeviceProperties> {
        self.pdevices
    }
}
