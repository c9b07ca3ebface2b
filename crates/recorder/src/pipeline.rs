//! Double-buffered frame handoff between the recording and draw threads.
//!
//! Two SPSC rings: sealed frames flow from the recording side to the replay
//! side, recycled slots flow back. A capacity-1 notification channel in each
//! direction backs the blocking variants. With `slot_count` slots the
//! recording thread can run up to `slot_count - 1` frames ahead of replay.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::{FrameSlot, SealedFrame};

const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct RecordingSide {
    recycled_slots: Consumer<FrameSlot>,
    sealed_frames: Producer<SealedFrame>,
    frame_notify: Sender<()>,
    slot_notify: Receiver<()>,
}

pub struct ReplaySide {
    sealed_frames: Consumer<SealedFrame>,
    recycled_slots: Producer<FrameSlot>,
    frame_notify: Receiver<()>,
    slot_notify: Sender<()>,
}

pub fn create_frame_pipeline(slot_count: usize) -> (RecordingSide, ReplaySide) {
    assert!(
        slot_count >= 2,
        "double buffering requires at least two frame slots"
    );

    let (mut slot_producer, slot_consumer) = RingBuffer::new(slot_count);
    for _ in 0..slot_count {
        match slot_producer.push(FrameSlot::new()) {
            Ok(()) => {}
            Err(PushError::Full(_)) => panic!("slot ring full during prefill"),
        }
    }
    let (frame_producer, frame_consumer) = RingBuffer::new(slot_count);
    let (frame_notify_sender, frame_notify_receiver) = bounded(1);
    let (slot_notify_sender, slot_notify_receiver) = bounded(1);

    let recording_side = RecordingSide {
        recycled_slots: slot_consumer,
        sealed_frames: frame_producer,
        frame_notify: frame_notify_sender,
        slot_notify: slot_notify_receiver,
    };
    let replay_side = ReplaySide {
        sealed_frames: frame_consumer,
        recycled_slots: slot_producer,
        frame_notify: frame_notify_receiver,
        slot_notify: slot_notify_sender,
    };
    (recording_side, replay_side)
}

impl RecordingSide {
    pub fn try_acquire_slot(&mut self) -> Option<FrameSlot> {
        self.recycled_slots.pop().ok()
    }

    /// Blocks until the replay side recycles a slot. The only wait on the
    /// recording thread, and it ends as soon as replay finishes a frame.
    pub fn acquire_slot(&mut self) -> FrameSlot {
        loop {
            if let Ok(slot) = self.recycled_slots.pop() {
                return slot;
            }
            if self.recycled_slots.is_abandoned() {
                panic!("frame pipeline replay side disconnected");
            }
            match self.slot_notify.recv_timeout(BLOCKING_POLL_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    panic!("frame pipeline replay side disconnected")
                }
            }
        }
    }

    pub fn submit(&mut self, frame: SealedFrame) {
        match self.sealed_frames.push(frame) {
            Ok(()) => {}
            Err(PushError::Full(_)) => {
                panic!("sealed frame ring full: more frames in flight than slots")
            }
        }
        match self.frame_notify.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                panic!("frame pipeline replay side disconnected")
            }
        }
    }
}

impl ReplaySide {
    pub fn try_next_frame(&mut self) -> Option<SealedFrame> {
        self.sealed_frames.pop().ok()
    }

    pub fn next_frame_blocking(&mut self) -> SealedFrame {
        loop {
            if let Ok(frame) = self.sealed_frames.pop() {
                return frame;
            }
            if self.sealed_frames.is_abandoned() {
                panic!("frame pipeline recording side disconnected");
            }
            match self.frame_notify.recv_timeout(BLOCKING_POLL_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    panic!("frame pipeline recording side disconnected")
                }
            }
        }
    }

    /// Returns a replayed frame's slot to the recording side.
    pub fn recycle(&mut self, slot: FrameSlot) {
        match self.recycled_slots.push(slot) {
            Ok(()) => {}
            Err(PushError::Full(_)) => panic!("slot ring full: recycled more slots than exist"),
        }
        match self.slot_notify.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {}
        }
    }
}
