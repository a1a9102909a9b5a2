//! Command pool plus the fixed set of per-slot primary command buffers the
//! frame loop re-records each iteration.
use std::sync::Arc;

use ash::vk;

use crate::context::Device;
use crate::error::RecorderError;

///One resettable primary command buffer per frame slot, all allocated from
/// one pool. The buffer of a slot may only be re-recorded once the slot's
/// fence came back, which the frame driver guarantees.
pub struct FrameRecorder {
    device: Arc<Device>,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl FrameRecorder {
    pub fn new(
        device: &Arc<Device>,
        queue_family: u32,
        slot_count: usize,
    ) -> Result<Self, RecorderError> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);
        let pool = unsafe { device.inner.create_command_pool(&pool_info, None)? };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(slot_count as u32);
        let buffers = match unsafe { device.inner.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers,
            Err(error) => {
                unsafe { device.inner.destroy_command_pool(pool, None) };
                return Err(error.into());
            }
        };
        if buffers.len() != slot_count {
            unsafe { device.inner.destroy_command_pool(pool, None) };
            return Err(RecorderError::FailedToAllocate {
                requested: slot_count,
                allocated: buffers.len(),
            });
        }

        Ok(FrameRecorder {
            device: device.clone(),
            pool,
            buffers,
        })
    }

    pub fn buffer(&self, slot: usize) -> vk::CommandBuffer {
        self.buffers[slot]
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    ///Recycles the slot's buffer for re-recording.
    pub fn reset(&self, slot: usize) -> Result<(), vk::Result> {
        unsafe {
            self.device
                .inner
                .reset_command_buffer(self.buffers[slot], vk::CommandBufferResetFlags::empty())
        }
    }

    ///Destroys the pool and with it every buffer. The device must be idle.
    /// Dropping an unreleased recorder does the same.
    pub fn release(&mut self) {
        if self.pool != vk::CommandPool::null() {
            unsafe { self.device.inner.destroy_command_pool(self.pool, None) };
            self.pool = vk::CommandPool::null();
            self.buffers.clear();
        }
    }
}

impl Drop for FrameRecorder {
    fn drop(&mut self) {
        self.release();
    }
}
