//! The per-frame protocol and its driver.
//!
//! One frame iteration walks a fixed sequence of stages: wait for the
//! current slot, acquire an image, record and submit the frame's commands,
//! present, advance the slot ring. [FrameDriver] owns that sequence and the
//! frame timing, the [FrameStages] trait binds the stages either to a real
//! device through [FrameContext] or to a test double.
//!
//! Two conditions are not errors but skipped iterations: the slot fence not
//! coming back in time ([FrameOutcome::SlotBusy]) and no image becoming
//! available in time ([FrameOutcome::NoImage]). In the second case the slot
//! fence was already consumed, so the slot is re-armed before the driver
//! returns, otherwise the next iteration would wait on a fence that no
//! submission is going to fire.
use std::sync::Arc;

use ash::vk;

use crate::context::{Device, Queue};
use crate::error::FrameError;
use crate::inflight::{FrameRing, SlotWait};
use crate::recorder::FrameRecorder;
use crate::swapchain::{AcquireOutcome, SwapchainTarget};
use crate::timer::FrameTimer;

///Color the image is cleared to before the overlay draws.
pub const CLEAR_COLOR: [f32; 4] = [0.1, 0.0, 0.0, 1.0];

///The stages of one frame iteration, in calling order. [FrameDriver] runs
/// the protocol over any implementation.
pub trait FrameStages {
    ///Waits for the current slot's previous frame to retire, consuming the
    /// slot fence on success.
    fn wait_slot(&mut self, timeout: u64) -> Result<SlotWait, FrameError>;
    ///Reserves the next swapchain image, tied to the current slot's
    /// image-available semaphore.
    fn acquire_image(&mut self, timeout: u64) -> Result<AcquireOutcome, FrameError>;
    ///Recovery path for aborting after [wait_slot](Self::wait_slot)
    /// consumed the fence. Must make the next wait on the same slot pass.
    fn re_arm_slot(&mut self);
    ///Records the commands rendering into `image_index` and submits them.
    /// The submission re-signals the slot fence on completion.
    fn record_and_submit(&mut self, image_index: u32) -> Result<(), FrameError>;
    ///Enqueues presentation of `image_index`.
    fn present(&mut self, image_index: u32) -> Result<(), FrameError>;
    ///Moves on to the next slot of the ring.
    fn advance_slot(&mut self);
    ///Slot the next iteration will run on.
    fn current_slot(&self) -> usize;
}

///How a frame iteration ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    ///The frame was submitted and queued for presentation.
    Rendered { image_index: u32 },
    ///The slot fence did not come back in time, nothing was touched.
    SlotBusy,
    ///No swapchain image became available in time, the slot was re-armed.
    NoImage,
}

///Summary of one driver iteration.
#[derive(Clone, Copy, Debug)]
pub struct FrameReport {
    pub outcome: FrameOutcome,
    ///Wall clock seconds since the previous iteration.
    pub seconds: f64,
    ///Smoothed frames per second, see [FrameTimer](crate::timer::FrameTimer).
    pub fps: f64,
    ///Completed frame count. Skipped iterations do not count.
    pub frame: u64,
    ///Slot this iteration ran on.
    pub slot: usize,
}

///Runs the frame protocol over a [FrameStages] implementation, once per
/// call to [run_one_frame](Self::run_one_frame). Owns the frame timer and
/// the completed frame counter.
pub struct FrameDriver<S: FrameStages> {
    stages: S,
    timer: FrameTimer,
    frame: u64,
    ///Nanoseconds to wait for the slot fence before skipping the iteration.
    pub wait_timeout: u64,
    ///Nanoseconds to wait for an image before skipping the iteration.
    pub acquire_timeout: u64,
}

impl<S: FrameStages> FrameDriver<S> {
    pub fn new(stages: S) -> Self {
        FrameDriver {
            stages,
            timer: FrameTimer::new(),
            frame: 0,
            wait_timeout: u64::MAX,
            acquire_timeout: u64::MAX,
        }
    }

    pub fn stages(&self) -> &S {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut S {
        &mut self.stages
    }

    pub fn into_stages(self) -> S {
        self.stages
    }

    ///Runs one iteration. Skipped iterations return a report like completed
    /// ones, any returned error is fatal for the loop.
    pub fn run_one_frame(&mut self) -> Result<FrameReport, FrameError> {
        let seconds = self.timer.tick();
        let fps = self.timer.smoothed_fps();
        let slot = self.stages.current_slot();

        if self.stages.wait_slot(self.wait_timeout)? == SlotWait::Timeout {
            return Ok(self.report(FrameOutcome::SlotBusy, seconds, fps, slot));
        }

        let image_index = match self.stages.acquire_image(self.acquire_timeout)? {
            AcquireOutcome::Acquired(index) => index,
            AcquireOutcome::Timeout => {
                self.stages.re_arm_slot();
                return Ok(self.report(FrameOutcome::NoImage, seconds, fps, slot));
            }
        };

        self.stages.record_and_submit(image_index)?;
        self.stages.present(image_index)?;
        self.stages.advance_slot();
        self.frame += 1;

        Ok(self.report(FrameOutcome::Rendered { image_index }, seconds, fps, slot))
    }

    fn report(&self, outcome: FrameOutcome, seconds: f64, fps: f64, slot: usize) -> FrameReport {
        FrameReport {
            outcome,
            seconds,
            fps,
            frame: self.frame,
            slot,
        }
    }
}

///Hook for drawing on top of the cleared image. [FrameContext] calls
/// [record](Self::record) inside the active render pass instance of every
/// frame, an immediate mode UI backend slots in here.
pub trait Overlay {
    ///Called once when the context is assembled, before the first frame.
    /// Backends build their pipelines against `render_pass` and size their
    /// per-image state with `image_count` here.
    fn setup(&mut self, render_pass: vk::RenderPass, image_count: u32);
    ///Records draw commands into `cmd`. The render pass is already active
    /// and `area` covers the whole image.
    fn record(&mut self, device: &ash::Device, cmd: vk::CommandBuffer, area: vk::Rect2D);
}

///Overlay that draws nothing, leaving the cleared image as is.
pub struct NoOverlay;

impl Overlay for NoOverlay {
    fn setup(&mut self, _render_pass: vk::RenderPass, _image_count: u32) {}
    fn record(&mut self, _device: &ash::Device, _cmd: vk::CommandBuffer, _area: vk::Rect2D) {}
}

///Everything one window's frame loop owns: swapchain target, slot ring,
/// recorder and overlay. Implements [FrameStages] on a real device.
pub struct FrameContext<O: Overlay> {
    pub device: Arc<Device>,
    pub queue: Queue,
    target: SwapchainTarget,
    ring: FrameRing,
    recorder: FrameRecorder,
    overlay: O,
    pub clear_color: vk::ClearValue,
}

impl<O: Overlay> FrameContext<O> {
    ///Assembles the context and runs the overlay's [setup](Overlay::setup).
    /// The recorder must provide one buffer per ring slot.
    pub fn new(
        device: &Arc<Device>,
        queue: Queue,
        target: SwapchainTarget,
        ring: FrameRing,
        recorder: FrameRecorder,
        mut overlay: O,
    ) -> Self {
        debug_assert_eq!(ring.slot_count(), recorder.buffer_count());
        overlay.setup(target.render_pass(), target.image_count() as u32);

        FrameContext {
            device: device.clone(),
            queue,
            target,
            ring,
            recorder,
            overlay,
            clear_color: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
        }
    }

    pub fn target(&self) -> &SwapchainTarget {
        &self.target
    }

    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }

    pub fn overlay_mut(&mut self) -> &mut O {
        &mut self.overlay
    }

    ///Tears the context down in dependency order: waits for the device to
    /// go idle, then releases the recorder, the slot ring and the swapchain
    /// target. Dropping an unreleased context does the same, logging
    /// instead of returning a failed idle wait.
    pub fn release(&mut self) -> Result<(), vk::Result> {
        self.device.wait_idle()?;
        self.recorder.release();
        self.ring.release();
        self.target.release();
        Ok(())
    }
}

impl<O: Overlay> FrameStages for FrameContext<O> {
    fn wait_slot(&mut self, timeout: u64) -> Result<SlotWait, FrameError> {
        self.ring
            .wait_current(timeout)
            .map_err(FrameError::WaitFence)
    }

    fn acquire_image(&mut self, timeout: u64) -> Result<AcquireOutcome, FrameError> {
        let available = self.ring.image_available();
        self.target
            .acquire_next(available, timeout)
            .map_err(FrameError::Acquire)
    }

    fn re_arm_slot(&mut self) {
        self.ring.re_arm_current();
    }

    fn record_and_submit(&mut self, image_index: u32) -> Result<(), FrameError> {
        debug_assert_eq!(image_index, self.target.current_index());
        let slot = self.ring.current();
        let cmd = self.recorder.buffer(slot);
        self.recorder.reset(slot).map_err(FrameError::Record)?;

        let device = &self.device.inner;
        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(FrameError::Record)?;
        }

        let clear_values = [self.clear_color];
        let pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.target.render_pass())
            .framebuffer(self.target.current_framebuffer())
            .render_area(self.target.render_area())
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(cmd, &pass_info, vk::SubpassContents::INLINE);
            self.overlay.record(device, cmd, self.target.render_area());
            device.cmd_end_render_pass(cmd);
            device.end_command_buffer(cmd).map_err(FrameError::Record)?;
        }

        let wait_semaphores = [self.ring.image_available()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd];
        let signal_semaphores = [self.ring.render_finished()];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .inner
                .queue_submit(
                    self.queue.inner,
                    core::slice::from_ref(&submit),
                    self.ring.fence(),
                )
                .map_err(FrameError::Submit)?;
        }
        Ok(())
    }

    fn present(&mut self, image_index: u32) -> Result<(), FrameError> {
        debug_assert_eq!(image_index, self.target.current_index());
        self.target
            .present(&self.queue, self.ring.render_finished())
            .map_err(FrameError::Present)
    }

    fn advance_slot(&mut self) {
        self.ring.advance();
    }

    fn current_slot(&self) -> usize {
        self.ring.current()
    }
}

impl<O: Overlay> Drop for FrameContext<O> {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            log::error!("Frame context teardown failed: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflight::next_slot;

    ///Stage double that models the device side of the protocol: fences that
    /// only come back through a submission, images handed out round robin.
    struct MockStages {
        slot_count: usize,
        image_count: u32,
        current: usize,
        re_armed: bool,
        fence_signaled: Vec<bool>,
        ///If set, a submission completes instantly and re-signals the slot
        /// fence.
        auto_complete: bool,
        next_image: u32,
        ///Number of upcoming acquires that run into the timeout.
        blocked_acquires: usize,
        fail_submit: bool,
        calls: Vec<&'static str>,
    }

    impl MockStages {
        fn new(slot_count: usize, image_count: u32) -> Self {
            MockStages {
                slot_count,
                image_count,
                current: 0,
                re_armed: false,
                fence_signaled: vec![true; slot_count],
                auto_complete: true,
                next_image: 0,
                blocked_acquires: 0,
                fail_submit: false,
                calls: Vec::new(),
            }
        }
    }

    impl FrameStages for MockStages {
        fn wait_slot(&mut self, _timeout: u64) -> Result<SlotWait, FrameError> {
            self.calls.push("wait");
            if std::mem::take(&mut self.re_armed) {
                return Ok(SlotWait::Ready);
            }
            if self.fence_signaled[self.current] {
                self.fence_signaled[self.current] = false;
                Ok(SlotWait::Ready)
            } else {
                Ok(SlotWait::Timeout)
            }
        }

        fn acquire_image(&mut self, _timeout: u64) -> Result<AcquireOutcome, FrameError> {
            self.calls.push("acquire");
            if self.blocked_acquires > 0 {
                self.blocked_acquires -= 1;
                return Ok(AcquireOutcome::Timeout);
            }
            let index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(AcquireOutcome::Acquired(index))
        }

        fn re_arm_slot(&mut self) {
            self.calls.push("re_arm");
            self.re_armed = true;
        }

        fn record_and_submit(&mut self, _image_index: u32) -> Result<(), FrameError> {
            self.calls.push("submit");
            if self.fail_submit {
                return Err(FrameError::Submit(vk::Result::ERROR_DEVICE_LOST));
            }
            if self.auto_complete {
                self.fence_signaled[self.current] = true;
            }
            Ok(())
        }

        fn present(&mut self, _image_index: u32) -> Result<(), FrameError> {
            self.calls.push("present");
            Ok(())
        }

        fn advance_slot(&mut self) {
            self.calls.push("advance");
            self.current = next_slot(self.current, self.slot_count);
        }

        fn current_slot(&self) -> usize {
            self.current
        }
    }

    #[test]
    fn ten_frames_rotate_two_slots_over_three_images() {
        let mut driver = FrameDriver::new(MockStages::new(2, 3));

        let mut slots = Vec::new();
        let mut images = Vec::new();
        for expected_frame in 1..=10u64 {
            let report = driver.run_one_frame().unwrap();
            let FrameOutcome::Rendered { image_index } = report.outcome else {
                panic!("frame {} was skipped", expected_frame);
            };
            assert_eq!(report.frame, expected_frame);
            slots.push(report.slot);
            images.push(image_index);
        }

        assert_eq!(slots, vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
        assert_eq!(images, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
        for pair in images.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn busy_slot_skips_the_iteration() {
        let mut stages = MockStages::new(2, 3);
        stages.fence_signaled[0] = false;
        let mut driver = FrameDriver::new(stages);

        let report = driver.run_one_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::SlotBusy);
        assert_eq!(report.frame, 0);
        //nothing beyond the fence wait may have happened
        assert_eq!(driver.stages().calls, vec!["wait"]);
        assert_eq!(driver.stages().current_slot(), 0);
    }

    #[test]
    fn acquire_timeout_re_arms_the_slot() {
        let mut stages = MockStages::new(2, 3);
        stages.blocked_acquires = 1;
        let mut driver = FrameDriver::new(stages);

        let report = driver.run_one_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::NoImage);
        assert_eq!(driver.stages().calls, vec!["wait", "acquire", "re_arm"]);

        //the fence of slot 0 was consumed above, the latch makes the retry
        // pass anyway and the frame completes on the same slot
        let report = driver.run_one_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::Rendered { image_index: 0 });
        assert_eq!(report.slot, 0);
        assert_eq!(report.frame, 1);
    }

    #[test]
    fn slot_is_not_ready_twice_without_a_new_submission() {
        let mut stages = MockStages::new(1, 2);
        stages.auto_complete = false;
        let mut driver = FrameDriver::new(stages);

        let report = driver.run_one_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::Rendered { image_index: 0 });

        //the single slot's fence was consumed and nothing re-signaled it
        let report = driver.run_one_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::SlotBusy);

        //once the device side retires the frame, the loop continues
        driver.stages_mut().fence_signaled[0] = true;
        let report = driver.run_one_frame().unwrap();
        assert_eq!(report.outcome, FrameOutcome::Rendered { image_index: 1 });
    }

    #[test]
    fn submit_failure_stops_the_protocol() {
        let mut stages = MockStages::new(2, 3);
        stages.fail_submit = true;
        let mut driver = FrameDriver::new(stages);

        let error = driver.run_one_frame().unwrap_err();
        assert!(matches!(error, FrameError::Submit(vk::Result::ERROR_DEVICE_LOST)));
        //neither presented nor advanced
        assert_eq!(
            driver.stages().calls,
            vec!["wait", "acquire", "submit"]
        );
        assert_eq!(driver.stages().current_slot(), 0);
    }

    #[test]
    fn reports_carry_timer_output() {
        let mut driver = FrameDriver::new(MockStages::new(2, 3));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let report = driver.run_one_frame().unwrap();
        assert!(report.seconds > 0.0);
        assert!(report.fps.is_finite());
        assert!(report.fps > 0.0);
    }

}

#[cfg(test)]
mod send_sync_test {
    use super::*;
    use static_assertions::assert_impl_all;

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(FrameContext<NoOverlay>: Send, Sync);
        assert_impl_all!(FrameReport: Send, Sync);
    }
}
