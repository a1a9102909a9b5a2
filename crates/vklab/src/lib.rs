//! # VkLab
//!
//! Small toolkit for Vulkan frame loops, built on [ash]. It covers the path
//! from "a window exists" to "a cleared image is presented every frame":
//! context bootstrap, the swapchain as a render target, the in-flight slot
//! ring and a driver that runs the per-frame protocol.
//!
//! The wrappers stay transparent: raw handles remain reachable through
//! `inner` fields, object lifetimes are tracked with
//! [Arc](std::sync::Arc) keep-alive chains, and teardown happens either
//! through the explicit `release` methods (in dependency order, after an
//! idle wait) or as a best effort fallback on drop.

///Re-exported so programs can use `ash`/`vk` items without keeping the
/// versions in sync themselves.
pub use ash;

///Instance, adapter selection and device creation.
pub mod context;
///The per-frame protocol, its driver and the overlay hook.
pub mod frame;
///The in-flight frame slot ring.
pub mod inflight;
///Command pool and per-slot command buffers.
pub mod recorder;
///Logged adapter and surface reports.
pub mod report;
///Window surface wrapper and capability queries.
pub mod surface;
///The swapchain bundled with its views, framebuffers and render pass.
pub mod swapchain;
///Binary semaphore and fence wrappers.
pub mod sync;
///Frame timing and the smoothed FPS estimate.
pub mod timer;

mod error;
pub use error::{
    ChainError, DeviceError, FrameError, InstanceError, RecorderError, VklabError,
};
