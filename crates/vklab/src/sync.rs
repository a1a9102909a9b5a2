//! Thin wrappers around the binary synchronisation primitives the frame loop
//! is built from. Each wrapper owns its handle and keeps the creating device
//! alive until the handle is destroyed.
use std::sync::Arc;

use crate::context::Device;
use ash::vk;

///Binary semaphore for device internal ordering, for instance between image
/// acquisition and the first write to that image.
pub struct BinarySemaphore {
    pub inner: vk::Semaphore,
    pub device: Arc<Device>,
}

impl BinarySemaphore {
    pub fn new(device: &Arc<Device>) -> Result<Self, vk::Result> {
        let semaphore = unsafe {
            device
                .inner
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };

        Ok(BinarySemaphore {
            inner: semaphore,
            device: device.clone(),
        })
    }
}

impl Drop for BinarySemaphore {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_semaphore(self.inner, None) };
    }
}

///Fence through which the device signals completion back to the host.
pub struct Fence {
    pub inner: vk::Fence,
    pub device: Arc<Device>,
}

impl Fence {
    ///Creates the fence, already signaled if `signaled` is set.
    pub fn new(device: &Arc<Device>, signaled: bool) -> Result<Self, vk::Result> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe {
            device
                .inner
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)?
        };

        Ok(Fence {
            inner: fence,
            device: device.clone(),
        })
    }

    ///Blocks until the fence is signaled or `timeout` nanoseconds passed. An
    /// expired timeout surfaces as `Err(vk::Result::TIMEOUT)`, a timeout of
    /// zero therefore only probes the state.
    pub fn wait(&self, timeout: u64) -> Result<(), vk::Result> {
        unsafe {
            self.device
                .inner
                .wait_for_fences(core::slice::from_ref(&self.inner), true, timeout)
        }
    }

    ///Moves the fence back into the unsignaled state.
    pub fn reset(&self) -> Result<(), vk::Result> {
        unsafe {
            self.device
                .inner
                .reset_fences(core::slice::from_ref(&self.inner))
        }
    }

    ///True if the fence is currently signaled, without blocking.
    pub fn is_signaled(&self) -> Result<bool, vk::Result> {
        unsafe { self.device.inner.get_fence_status(self.inner) }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_fence(self.inner, None) };
    }
}
