//! The swapchain as a ready-to-render target: the images, one view and one
//! framebuffer per image, and the single render pass that clears an image
//! and hands it to the presentation engine.
use std::sync::Arc;

use ash::vk;

use crate::context::{Device, Queue};
use crate::error::ChainError;
use crate::surface::Surface;

///Result of asking the presentation engine for the next writable image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    ///The image at this index is reserved for the caller. The semaphore
    /// passed to the acquire call fires once the image is safe to write.
    Acquired(u32),
    ///No image became available in time. Skip the frame and retry later.
    Timeout,
}

///Picks the first entry of `preference` the surface supports, or falls back
/// to the first supported pair.
pub fn pick_format(
    preference: &[vk::SurfaceFormatKHR],
    supported: &[vk::SurfaceFormatKHR],
) -> Option<vk::SurfaceFormatKHR> {
    for wanted in preference {
        if supported.contains(wanted) {
            return Some(*wanted);
        }
    }
    supported.first().copied()
}

///Clamps a requested extent into the range the surface supports.
pub fn clamp_extent(
    desired: vk::Extent2D,
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::Extent2D {
    vk::Extent2D {
        width: desired.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

///Clamps a requested image count into the range the surface supports. A
/// `max_image_count` of zero means no upper bound.
pub fn clamp_image_count(desired: u32, capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = desired.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count = count.min(capabilities.max_image_count);
    }
    count
}

///Configuration of a [SwapchainTarget]. Start from
/// [SwapchainTarget::builder] and adjust fields directly or through
/// [with](Self::with).
pub struct SwapchainTargetBuilder {
    pub device: Arc<Device>,
    pub surface: Arc<Surface>,
    ///Ordered format preference. The first supported entry wins, if none is
    /// supported the first format the surface offers is used.
    pub format_preference: Vec<vk::SurfaceFormatKHR>,
    pub present_mode: vk::PresentModeKHR,
    pub image_count: u32,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub is_clipped: bool,
}

impl SwapchainTargetBuilder {
    ///Applies `mapping` to the builder. Can be chained for several changes.
    pub fn with(mut self, mapping: impl FnOnce(&mut SwapchainTargetBuilder)) -> Self {
        mapping(&mut self);
        self
    }

    pub fn build(self) -> Result<SwapchainTarget, ChainError> {
        if self.extent.width == 0 || self.extent.height == 0 {
            return Err(ChainError::ZeroExtent(self.extent));
        }

        let capabilities = self
            .surface
            .capabilities(self.device.physical_device)?;
        let supported_formats = self.surface.formats(self.device.physical_device)?;
        let format = pick_format(&self.format_preference, &supported_formats)
            .ok_or(ChainError::NoSurfaceFormat)?;
        let extent = clamp_extent(self.extent, &capabilities);
        let image_count = clamp_image_count(self.image_count, &capabilities);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.inner)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(self.usage)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(self.pre_transform)
            .composite_alpha(self.composite_alpha)
            .present_mode(self.present_mode)
            .clipped(self.is_clipped);

        let loader =
            ash::khr::swapchain::Device::new(&self.device.instance.inner, &self.device.inner);
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

        //from here on the partially built target owns the handles, so an
        // error on any later step tears down everything created so far
        let mut target = SwapchainTarget {
            device: self.device,
            surface: self.surface,
            loader,
            swapchain,
            format,
            extent,
            images: Vec::new(),
            views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            current: 0,
        };

        target.images = unsafe { target.loader.get_swapchain_images(target.swapchain)? };

        for image in target.images.iter() {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(*image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { target.device.inner.create_image_view(&view_info, None)? };
            target.views.push(view);
        }

        target.render_pass = create_present_pass(&target.device, format.format)?;

        for view in target.views.iter() {
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(target.render_pass)
                .attachments(core::slice::from_ref(view))
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe {
                target
                    .device
                    .inner
                    .create_framebuffer(&framebuffer_info, None)?
            };
            target.framebuffers.push(framebuffer);
        }

        log::info!(
            "Created swapchain target: {} images, {:?}, {:?} / {:?}",
            target.images.len(),
            extent,
            format.format,
            format.color_space
        );

        Ok(target)
    }
}

///Single subpass render pass that clears the image on load and leaves it in
/// the presentable layout. The external dependency orders any previous use
/// of the image before the first color write of the new frame.
fn create_present_pass(
    device: &Arc<Device>,
    format: vk::Format,
) -> Result<vk::RenderPass, vk::Result> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];

    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
        .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.inner.create_render_pass(&create_info, None) }
}

///Swapchain plus everything rendering into it needs: per-image views and
/// framebuffers sharing one render pass, extent and format. The target is
/// built for a fixed drawable size, a resized surface needs a fresh target.
pub struct SwapchainTarget {
    pub device: Arc<Device>,
    ///Keeps the surface alive for as long as the swapchain references it.
    pub surface: Arc<Surface>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    //index of the image between acquire and present
    current: u32,
}

impl SwapchainTarget {
    ///Builder preloaded with the fixed presentation setup: triple buffering,
    /// color attachment usage, exclusive sharing, identity transform, opaque
    /// composition, fifo presentation and 8 bit BGRA/RGBA with the sRGB
    /// color space as preferred formats.
    pub fn builder(
        device: &Arc<Device>,
        surface: &Arc<Surface>,
        extent: vk::Extent2D,
    ) -> SwapchainTargetBuilder {
        SwapchainTargetBuilder {
            device: device.clone(),
            surface: surface.clone(),
            format_preference: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_mode: vk::PresentModeKHR::FIFO,
            image_count: 3,
            extent,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            is_clipped: true,
        }
    }

    ///Reserves the next image for rendering. `available` fires once the
    /// image may be written. On success the returned index becomes the
    /// current image. Expired timeouts and an out of date surface are
    /// reported as [AcquireOutcome::Timeout], the caller skips the frame.
    pub fn acquire_next(
        &mut self,
        available: vk::Semaphore,
        timeout: u64,
    ) -> Result<AcquireOutcome, vk::Result> {
        let acquired = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, timeout, available, vk::Fence::null())
        };
        match acquired {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::warn!("Acquired suboptimal swapchain image {}", index);
                }
                self.current = index;
                Ok(AcquireOutcome::Acquired(index))
            }
            //a zero timeout reports expiry as NOT_READY instead of TIMEOUT
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Ok(AcquireOutcome::Timeout),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Surface out of date while acquiring, skipping frame");
                Ok(AcquireOutcome::Timeout)
            }
            Err(error) => Err(error),
        }
    }

    ///Enqueues presentation of the current image after `wait` fired. A
    /// swapchain that no longer matches the surface surfaces as an error,
    /// rebuilding at a new size is outside this target's contract.
    pub fn present(&self, queue: &Queue, wait: vk::Semaphore) -> Result<(), vk::Result> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [self.current];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue.inner, &present_info) } {
            Ok(false) => Ok(()),
            Ok(true) => {
                log::warn!("Swapchain suboptimal for surface while presenting");
                Err(vk::Result::SUBOPTIMAL_KHR)
            }
            Err(error) => Err(error),
        }
    }

    ///Framebuffer of the most recently acquired image. Stable until the
    /// next successful acquire.
    pub fn current_framebuffer(&self) -> vk::Framebuffer {
        self.framebuffers[self.current as usize]
    }

    ///Index of the most recently acquired image.
    pub fn current_index(&self) -> u32 {
        self.current
    }

    ///Full-image render area at offset zero.
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    ///Number of images the device actually created, which may exceed the
    /// requested count.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    ///Destroys the framebuffers, then the views, the render pass and the
    /// swapchain itself. The device must be idle. Dropping an unreleased
    /// target performs the same teardown.
    pub fn release(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.inner.destroy_framebuffer(framebuffer, None);
            }
            for view in self.views.drain(..) {
                self.device.inner.destroy_image_view(view, None);
            }
            if self.render_pass != vk::RenderPass::null() {
                self.device.inner.destroy_render_pass(self.render_pass, None);
                self.render_pass = vk::RenderPass::null();
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
        self.images.clear();
    }
}

impl Drop for SwapchainTarget {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn preferred_format_wins() {
        let preference = [vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let supported = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(pick_format(&preference, &supported), Some(supported[1]));
    }

    #[test]
    fn unsupported_preference_falls_back_to_first() {
        let preference = [vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let supported = [vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        }];
        assert_eq!(pick_format(&preference, &supported), Some(supported[0]));
        assert_eq!(pick_format(&preference, &[]), None);
    }

    #[test]
    fn extent_is_clamped_into_the_supported_range() {
        let capabilities = capabilities();
        assert_eq!(
            clamp_extent(
                vk::Extent2D {
                    width: 1280,
                    height: 720
                },
                &capabilities
            ),
            vk::Extent2D {
                width: 1280,
                height: 720
            }
        );
        assert_eq!(
            clamp_extent(
                vk::Extent2D {
                    width: 10_000,
                    height: 0
                },
                &capabilities
            ),
            vk::Extent2D {
                width: 4096,
                height: 1
            }
        );
    }

    #[test]
    fn image_count_is_clamped_into_the_supported_range() {
        let capabilities = capabilities();
        assert_eq!(clamp_image_count(3, &capabilities), 3);
        assert_eq!(clamp_image_count(1, &capabilities), 2);
        assert_eq!(clamp_image_count(100, &capabilities), 8);

        let unbounded = vk::SurfaceCapabilitiesKHR {
            max_image_count: 0,
            ..capabilities
        };
        assert_eq!(clamp_image_count(100, &unbounded), 100);
    }
}
