use std::ffi::CString;

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstanceError {
    #[error("vulkan error")]
    VkError(#[from] vk::Result),
    #[error("Failed to load vulkan library: {0}")]
    EntryLoading(#[from] ash::LoadingError),
    #[error("Instance layer {0:?} is not available")]
    MissingLayer(CString),
    #[error("Instance extension {0:?} is not available")]
    MissingExtension(CString),
    #[error("Could not access window or display handle: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("vulkan error")]
    VkError(#[from] vk::Result),
    #[error("Device extension {0:?} is not supported")]
    UnsupportedExtension(CString),
    #[error("No physical device fulfilled all requirements")]
    NoPhysicalDevice,
    #[error("No queue family with the requested capabilities")]
    NoSuitableQueueFamily,
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("vulkan error")]
    VkError(#[from] vk::Result),
    #[error("Surface query failed: {0}")]
    Surface(#[from] InstanceError),
    #[error("Requested drawable extent {0:?} has a zero dimension")]
    ZeroExtent(vk::Extent2D),
    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,
}

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("vulkan error")]
    VkError(#[from] vk::Result),
    #[error("Requested {requested} command buffers, allocator returned {allocated}")]
    FailedToAllocate { requested: usize, allocated: usize },
}

///Error of a single frame iteration. Each variant names the stage that
/// failed. All of them are fatal for the frame loop, recoverable conditions
/// (busy slot, no image in time) are reported through
/// [FrameOutcome](crate::frame::FrameOutcome) instead.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Waiting for the slot fence failed: {0}")]
    WaitFence(#[source] vk::Result),
    #[error("Acquiring a swapchain image failed: {0}")]
    Acquire(#[source] vk::Result),
    #[error("Recording the frame commands failed: {0}")]
    Record(#[source] vk::Result),
    #[error("Submitting the frame commands failed: {0}")]
    Submit(#[source] vk::Result),
    #[error("Presenting the swapchain image failed: {0}")]
    Present(#[source] vk::Result),
}

///Top level error of this crate. Mostly transports the module-local errors.
#[derive(Error, Debug)]
pub enum VklabError {
    #[error("Instance error")]
    Instance(#[from] InstanceError),
    #[error("Device error")]
    Device(#[from] DeviceError),
    #[error("Swapchain target error")]
    Chain(#[from] ChainError),
    #[error("Recorder error")]
    Recorder(#[from] RecorderError),
    #[error("Frame error")]
    Frame(#[from] FrameError),
    #[error("vulkan error")]
    VkError(#[from] vk::Result),
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod send_sync_test {
    use super::*;
    use static_assertions::assert_impl_all;

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(InstanceError: Send, Sync);
        assert_impl_all!(DeviceError: Send, Sync);
        assert_impl_all!(ChainError: Send, Sync);
        assert_impl_all!(RecorderError: Send, Sync);
        assert_impl_all!(FrameError: Send, Sync);
        assert_impl_all!(VklabError: Send, Sync);
    }
}
