//! The ring of per-frame synchronisation slots that keeps the host at most
//! `slot_count` frames ahead of the device.
use std::sync::Arc;

use ash::vk;

use crate::context::Device;
use crate::sync::{BinarySemaphore, Fence};

///Outcome of waiting on the current slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotWait {
    ///The slot is free, its fence was consumed and reset.
    Ready,
    ///The slot is still owned by the device. The fence was left untouched.
    Timeout,
}

///Synchronisation primitives of one pipelined frame.
pub struct FrameSlot {
    ///Fired by the presentation engine once the acquired image may be
    /// written.
    pub image_available: BinarySemaphore,
    ///Fired by the queue once the slot's submission finished rendering.
    pub render_finished: BinarySemaphore,
    ///Fired by the device once the slot's submission completed. Starts out
    /// signaled so the first `slot_count` frames pass without waiting.
    pub in_flight: Fence,
}

///Host side ring position plus the one-shot latch that marks the current
/// slot as ready again after an aborted frame.
#[derive(Debug)]
pub(crate) struct SlotCursor {
    current: usize,
    count: usize,
    re_armed: bool,
}

impl SlotCursor {
    pub(crate) fn new(count: usize) -> Self {
        SlotCursor {
            current: 0,
            count,
            re_armed: false,
        }
    }

    pub(crate) fn current(&self) -> usize {
        self.current
    }

    ///One step forward, never skipping a slot. A pending latch belongs to
    /// the slot being left behind and is dropped.
    pub(crate) fn advance(&mut self) {
        self.current = next_slot(self.current, self.count);
        self.re_armed = false;
    }

    pub(crate) fn re_arm(&mut self) {
        self.re_armed = true;
    }

    ///Consumes the latch. Returns true at most once per [re_arm](Self::re_arm).
    pub(crate) fn take_re_armed(&mut self) -> bool {
        std::mem::take(&mut self.re_armed)
    }
}

pub(crate) fn next_slot(current: usize, count: usize) -> usize {
    (current + 1) % count
}

///Fixed ring of [FrameSlot]s. Exactly one slot is current at any time and
/// the ring advances by exactly one slot per completed frame, so a frame
/// started `slot_count` frames ago must have retired before the same slot is
/// handed out again.
pub struct FrameRing {
    slots: Vec<FrameSlot>,
    cursor: SlotCursor,
}

impl FrameRing {
    ///Creates `slot_count` slots with initially signaled fences. If any
    /// primitive fails to create, everything built so far is destroyed
    /// again.
    pub fn new(device: &Arc<Device>, slot_count: usize) -> Result<Self, vk::Result> {
        debug_assert!(slot_count > 0);
        let mut slots = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            slots.push(FrameSlot {
                image_available: BinarySemaphore::new(device)?,
                render_finished: BinarySemaphore::new(device)?,
                in_flight: Fence::new(device, true)?,
            });
        }

        Ok(FrameRing {
            slots,
            cursor: SlotCursor::new(slot_count),
        })
    }

    ///Waits up to `timeout` nanoseconds for the current slot to come back
    /// from the device, then consumes and resets its fence. A re-armed slot
    /// (see [re_arm_current](Self::re_arm_current)) reports ready without
    /// touching the fence.
    pub fn wait_current(&mut self, timeout: u64) -> Result<SlotWait, vk::Result> {
        if self.cursor.take_re_armed() {
            return Ok(SlotWait::Ready);
        }

        let slot = &self.slots[self.cursor.current()];
        match slot.in_flight.wait(timeout) {
            Ok(()) => {
                slot.in_flight.reset()?;
                Ok(SlotWait::Ready)
            }
            Err(vk::Result::TIMEOUT) => Ok(SlotWait::Timeout),
            Err(error) => Err(error),
        }
    }

    ///Marks the current slot ready again. Required whenever a frame aborts
    /// between the fence wait and the submission that would re-signal the
    /// fence. Without it the next [wait_current](Self::wait_current) would
    /// block on a fence no submission is going to fire.
    pub fn re_arm_current(&mut self) {
        self.cursor.re_arm();
    }

    ///Moves to the next slot. Call exactly once per frame, after the frame's
    /// submission and presentation are enqueued.
    pub fn advance(&mut self) {
        self.cursor.advance();
    }

    pub fn current(&self) -> usize {
        self.cursor.current()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    ///Image-available semaphore of the current slot.
    pub fn image_available(&self) -> vk::Semaphore {
        self.slots[self.cursor.current()].image_available.inner
    }

    ///Render-finished semaphore of the current slot.
    pub fn render_finished(&self) -> vk::Semaphore {
        self.slots[self.cursor.current()].render_finished.inner
    }

    ///In-flight fence of the current slot.
    pub fn fence(&self) -> vk::Fence {
        self.slots[self.cursor.current()].in_flight.inner
    }

    ///Destroys every slot. The device must be idle. Dropping the ring does
    /// the same if this was never called.
    pub fn release(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_rotates_without_skipping() {
        for count in [1usize, 2, 3, 5] {
            let mut cursor = SlotCursor::new(count);
            assert_eq!(cursor.current(), 0);
            for step in 1..=10 {
                cursor.advance();
                assert_eq!(cursor.current(), step % count);
            }
        }
    }

    #[test]
    fn latch_is_consumed_once() {
        let mut cursor = SlotCursor::new(2);
        assert!(!cursor.take_re_armed());
        cursor.re_arm();
        assert!(cursor.take_re_armed());
        assert!(!cursor.take_re_armed());
    }

    #[test]
    fn advancing_drops_a_pending_latch() {
        let mut cursor = SlotCursor::new(2);
        cursor.re_arm();
        cursor.advance();
        assert!(!cursor.take_re_armed());
        assert_eq!(cursor.current(), 1);
    }
}
