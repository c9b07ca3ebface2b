//! Append-only byte-encoded event log for one frame.
//!
//! Each record is one tag byte followed by the fixed-size Pod payload of its
//! kind, packed with no alignment padding. The log is written once by the
//! recording thread, sealed, then read sequentially (twice, for the two-pass
//! batching replay) on the draw thread. `reset` empties it without releasing
//! capacity.

use bytemuck::Pod;
use render_protocol::{EventKind, RenderEvent};

pub struct EventLog {
    bytes: Vec<u8>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Appends one event: tag byte, then the payload bytes of its kind.
    pub fn enqueue(&mut self, event: &RenderEvent) {
        match event {
            RenderEvent::PushViewport(payload) => self.write(event.kind(), payload),
            RenderEvent::PopViewport => self.write_empty(event.kind()),
            RenderEvent::PushScissor(payload) => self.write(event.kind(), payload),
            RenderEvent::PopScissor => self.write_empty(event.kind()),
            RenderEvent::PushScissorOffset(payload) => self.write(event.kind(), payload),
            RenderEvent::PopScissorOffset => self.write_empty(event.kind()),
            RenderEvent::PushMasking(payload) => self.write(event.kind(), payload),
            RenderEvent::PopMasking => self.write_empty(event.kind()),
            RenderEvent::PushDepthInfo(payload) => self.write(event.kind(), payload),
            RenderEvent::PopDepthInfo => self.write_empty(event.kind()),
            RenderEvent::PushStencilInfo(payload) => self.write(event.kind(), payload),
            RenderEvent::PopStencilInfo => self.write_empty(event.kind()),
            RenderEvent::PushProjection(payload) => self.write(event.kind(), payload),
            RenderEvent::PopProjection => self.write_empty(event.kind()),
            RenderEvent::SetBlend(payload) => self.write(event.kind(), payload),
            RenderEvent::SetBlendMask(payload) => self.write(event.kind(), payload),
            RenderEvent::Clear(payload) => self.write(event.kind(), payload),
            RenderEvent::BindShader(payload) => self.write(event.kind(), payload),
            RenderEvent::UnbindShader(payload) => self.write(event.kind(), payload),
            RenderEvent::BindTexture(payload) => self.write(event.kind(), payload),
            RenderEvent::BindUniformBlock(payload) => self.write(event.kind(), payload),
            RenderEvent::BindFrameBuffer(payload) => self.write(event.kind(), payload),
            RenderEvent::UnbindFrameBuffer(payload) => self.write(event.kind(), payload),
            RenderEvent::AddVertexToBatch(payload) => self.write(event.kind(), payload),
            RenderEvent::DisposeResource(payload) => self.write(event.kind(), payload),
        }
    }

    fn write<T: Pod>(&mut self, kind: EventKind, payload: &T) {
        let payload_bytes = bytemuck::bytes_of(payload);
        debug_assert_eq!(payload_bytes.len(), kind.payload_size());
        self.bytes.push(kind.tag());
        self.bytes.extend_from_slice(payload_bytes);
    }

    fn write_empty(&mut self, kind: EventKind) {
        debug_assert_eq!(kind.payload_size(), 0);
        self.bytes.push(kind.tag());
    }

    /// Empties the log for reuse without freeing backing storage. Idempotent.
    pub fn reset(&mut self) {
        self.bytes.clear();
    }

    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn reader(&self) -> EventReader<'_> {
        EventReader {
            bytes: &self.bytes,
            cursor: 0,
            current: None,
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

struct CurrentRecord {
    kind: EventKind,
    payload_start: usize,
    payload_end: usize,
}

/// Sequential cursor over an event log. `next` advances; the `current_*`
/// accessors read the record it stopped on. `rewind` restarts from the
/// beginning for the second replay pass.
pub struct EventReader<'log> {
    bytes: &'log [u8],
    cursor: usize,
    current: Option<CurrentRecord>,
}

impl EventReader<'_> {
    /// Advances to the next record. Returns false at end of log.
    pub fn next(&mut self) -> bool {
        if self.cursor >= self.bytes.len() {
            self.current = None;
            return false;
        }
        let kind = EventKind::from_tag(self.bytes[self.cursor]);
        let payload_start = self.cursor + 1;
        let payload_end = payload_start + kind.payload_size();
        if payload_end > self.bytes.len() {
            panic!(
                "truncated event log: {:?} payload needs {} bytes, {} remain",
                kind,
                kind.payload_size(),
                self.bytes.len() - payload_start
            );
        }
        self.current = Some(CurrentRecord {
            kind,
            payload_start,
            payload_end,
        });
        self.cursor = payload_end;
        true
    }

    pub fn current_kind(&self) -> EventKind {
        self.current_record().kind
    }

    /// Decodes the current payload as `T`. Callers must have branched on
    /// `current_kind` first; a size mismatch is a fatal integrity error.
    pub fn decode<T: Pod>(&self) -> T {
        let record = self.current_record();
        let payload = &self.bytes[record.payload_start..record.payload_end];
        if payload.len() != size_of::<T>() {
            panic!(
                "decoding {:?} payload ({} bytes) as {} ({} bytes)",
                record.kind,
                payload.len(),
                std::any::type_name::<T>(),
                size_of::<T>()
            );
        }
        bytemuck::pod_read_unaligned(payload)
    }

    /// Decodes the current record into the event sum type. This is the one
    /// place that maps every kind to its payload.
    pub fn decode_event(&self) -> RenderEvent {
        match self.current_kind() {
            EventKind::PushViewport => RenderEvent::PushViewport(self.decode()),
            EventKind::PopViewport => RenderEvent::PopViewport,
            EventKind::PushScissor => RenderEvent::PushScissor(self.decode()),
            EventKind::PopScissor => RenderEvent::PopScissor,
            EventKind::PushScissorOffset => RenderEvent::PushScissorOffset(self.decode()),
            EventKind::PopScissorOffset => RenderEvent::PopScissorOffset,
            EventKind::PushMasking => RenderEvent::PushMasking(self.decode()),
            EventKind::PopMasking => RenderEvent::PopMasking,
            EventKind::PushDepthInfo => RenderEvent::PushDepthInfo(self.decode()),
            EventKind::PopDepthInfo => RenderEvent::PopDepthInfo,
            EventKind::PushStencilInfo => RenderEvent::PushStencilInfo(self.decode()),
            EventKind::PopStencilInfo => RenderEvent::PopStencilInfo,
            EventKind::PushProjection => RenderEvent::PushProjection(self.decode()),
            EventKind::PopProjection => RenderEvent::PopProjection,
            EventKind::SetBlend => RenderEvent::SetBlend(self.decode()),
            EventKind::SetBlendMask => RenderEvent::SetBlendMask(self.decode()),
            EventKind::Clear => RenderEvent::Clear(self.decode()),
            EventKind::BindShader => RenderEvent::BindShader(self.decode()),
            EventKind::UnbindShader => RenderEvent::UnbindShader(self.decode()),
            EventKind::BindTexture => RenderEvent::BindTexture(self.decode()),
            EventKind::BindUniformBlock => RenderEvent::BindUniformBlock(self.decode()),
            EventKind::BindFrameBuffer => RenderEvent::BindFrameBuffer(self.decode()),
            EventKind::UnbindFrameBuffer => RenderEvent::UnbindFrameBuffer(self.decode()),
            EventKind::AddVertexToBatch => RenderEvent::AddVertexToBatch(self.decode()),
            EventKind::DisposeResource => RenderEvent::DisposeResource(self.decode()),
        }
    }

    /// Restarts the cursor at the first record.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.current = None;
    }

    fn current_record(&self) -> &CurrentRecord {
        self.current
            .as_ref()
            .unwrap_or_else(|| panic!("event reader accessed before next() succeeded"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_protocol::{
        AddVertexPayload, BindTexturePayload, ClearInfo, HandlePayload, MemoryBlockHandle,
        RectI, RectPayload, ResourceHandle,
    };

    fn handle(index: u32) -> ResourceHandle {
        ResourceHandle {
            index,
            generation: 1,
        }
    }

    fn block(offset: u32, length: u32) -> MemoryBlockHandle {
        MemoryBlockHandle {
            offset,
            length,
            generation: 1,
        }
    }

    #[test]
    fn events_replay_in_recording_order() {
        let mut log = EventLog::new();
        let recorded = [
            RenderEvent::PushScissor(RectPayload {
                rect: RectI::new(1, 2, 3, 4),
            }),
            RenderEvent::BindShader(HandlePayload { handle: handle(5) }),
            RenderEvent::AddVertexToBatch(AddVertexPayload {
                batch: handle(0),
                vertex: block(0, 8),
            }),
            RenderEvent::PopScissor,
            RenderEvent::Clear(ClearInfo::color_only([0.0, 0.0, 0.0, 1.0])),
        ];
        for event in &recorded {
            log.enqueue(event);
        }

        let mut reader = log.reader();
        let mut replayed = Vec::new();
        while reader.next() {
            replayed.push(reader.decode_event());
        }
        assert_eq!(replayed.as_slice(), recorded.as_slice());
    }

    #[test]
    fn payloads_roundtrip_bit_for_bit() {
        let mut log = EventLog::new();
        let payload = BindTexturePayload {
            texture: handle(3),
            unit: 2,
            wrap_s: 1,
            wrap_t: 0,
        };
        log.enqueue(&RenderEvent::BindTexture(payload));

        let mut reader = log.reader();
        assert!(reader.next());
        assert_eq!(reader.current_kind(), EventKind::BindTexture);
        assert_eq!(reader.decode::<BindTexturePayload>(), payload);
        assert!(!reader.next());
    }

    #[test]
    fn rewind_rereads_from_the_start() {
        let mut log = EventLog::new();
        log.enqueue(&RenderEvent::PopViewport);
        log.enqueue(&RenderEvent::PopScissor);

        let mut reader = log.reader();
        assert!(reader.next());
        assert!(reader.next());
        assert!(!reader.next());

        reader.rewind();
        assert!(reader.next());
        assert_eq!(reader.current_kind(), EventKind::PopViewport);
        assert!(reader.next());
        assert_eq!(reader.current_kind(), EventKind::PopScissor);
        assert!(!reader.next());
    }

    #[test]
    fn reset_empties_without_freeing_capacity() {
        let mut log = EventLog::new();
        log.enqueue(&RenderEvent::PushScissor(RectPayload {
            rect: RectI::new(0, 0, 10, 10),
        }));
        let capacity_before = log.bytes.capacity();
        log.reset();
        log.reset();
        assert!(log.is_empty());
        assert_eq!(log.bytes.capacity(), capacity_before);
        assert!(!log.reader().next());
    }

    #[test]
    #[should_panic(expected = "payload (8 bytes) as")]
    fn decode_with_wrong_type_size_panics() {
        let mut log = EventLog::new();
        log.enqueue(&RenderEvent::BindShader(HandlePayload { handle: handle(1) }));
        let mut reader = log.reader();
        assert!(reader.next());
        let _ = reader.decode::<BindTexturePayload>();
    }

    #[test]
    #[should_panic(expected = "event reader accessed before next() succeeded")]
    fn reader_access_before_next_panics() {
        let log = EventLog::new();
        let reader = log.reader();
        let _ = reader.current_kind();
    }
}
