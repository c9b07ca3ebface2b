//! Recording front-end.
//!
//! The scene-graph side of the deferred command system. Every operation here
//! either appends an event to the frame's log or registers a reference with
//! the frame's arena; none of it touches the graphics backend, so all of it
//! is safe to call from the single-threaded update loop without synchronizing
//! against the draw thread. The handoff unit is the `SealedFrame`, produced
//! by `finish_frame` and consumed whole by the painter.

mod pipeline;

pub use pipeline::{RecordingSide, ReplaySide, create_frame_pipeline};

use bytemuck::Pod;
use event_log::EventLog;
use frame_arena::FrameArena;
use render_protocol::{
    AddVertexPayload, BindTexturePayload, BindUniformBlockPayload, BlendMask, BlendMaskPayload,
    BlendParameters, ClearInfo, DepthInfo, DisposalTarget, FrameBufferId, HandlePayload,
    MaskingInfo, OffsetPayload, ProjectionPayload, RectI, RectPayload, RenderEvent, ShaderId,
    StencilInfo, TextureId, UniformBufferId, Vec2I, VertexBatchId, WrapMode,
};

/// One frame's worth of recording storage: arena plus event log. Slots are
/// created once and re-initialized per frame; with two or more slots the
/// recording thread can start frame N+1 while the draw thread replays N.
pub struct FrameSlot {
    arena: FrameArena,
    log: EventLog,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            arena: FrameArena::new(),
            log: EventLog::new(),
        }
    }

    fn reset(&mut self) {
        self.arena.reset();
        self.log.reset();
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// A finished frame, sealed against further writes. Hand it to the painter,
/// then recover the slot with `into_slot`.
pub struct SealedFrame {
    arena: FrameArena,
    log: EventLog,
    viewport: RectI,
    frame_index: u64,
}

impl SealedFrame {
    pub fn arena(&self) -> &FrameArena {
        &self.arena
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn viewport(&self) -> RectI {
        self.viewport
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Resets both halves and returns the slot for the next frame. Every
    /// handle issued while this frame recorded is invalid afterwards.
    pub fn into_slot(self) -> FrameSlot {
        let mut slot = FrameSlot {
            arena: self.arena,
            log: self.log,
        };
        slot.reset();
        slot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecorderPhase {
    Idle,
    Recording,
}

/// Records one frame at a time. Strictly single-threaded; the phase machine
/// turns misuse (recording outside a frame, double begin) into immediate
/// panics instead of corrupt logs.
pub struct FrameRecorder {
    phase: RecorderPhase,
    slot: Option<FrameSlot>,
    viewport: RectI,
    next_frame_index: u64,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self {
            phase: RecorderPhase::Idle,
            slot: None,
            viewport: RectI::new(0, 0, 0, 0),
            next_frame_index: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.phase == RecorderPhase::Recording
    }

    pub fn begin_frame(&mut self, slot: FrameSlot, viewport: RectI) {
        if self.phase == RecorderPhase::Recording {
            panic!("begin_frame while a frame is still recording");
        }
        self.slot = Some(slot);
        self.viewport = viewport;
        self.phase = RecorderPhase::Recording;
    }

    /// Seals the log against further writes and hands the frame over.
    pub fn finish_frame(&mut self) -> SealedFrame {
        if self.phase != RecorderPhase::Recording {
            panic!("finish_frame without a frame being recorded");
        }
        let slot = self
            .slot
            .take()
            .unwrap_or_else(|| panic!("recording phase with no frame slot"));
        self.phase = RecorderPhase::Idle;
        let frame_index = self.next_frame_index;
        self.next_frame_index = frame_index
            .checked_add(1)
            .unwrap_or_else(|| panic!("frame index overflow"));
        SealedFrame {
            arena: slot.arena,
            log: slot.log,
            viewport: self.viewport,
            frame_index,
        }
    }

    /// Drops the current frame wholesale (window resize mid-frame and the
    /// like). Nothing recorded so far is replayed; the slot comes back empty.
    pub fn discard_frame(&mut self) -> FrameSlot {
        if self.phase != RecorderPhase::Recording {
            panic!("discard_frame without a frame being recorded");
        }
        let mut slot = self
            .slot
            .take()
            .unwrap_or_else(|| panic!("recording phase with no frame slot"));
        slot.reset();
        self.phase = RecorderPhase::Idle;
        slot
    }

    pub fn push_viewport(&mut self, rect: RectI) {
        self.enqueue(RenderEvent::PushViewport(RectPayload { rect }));
    }

    pub fn pop_viewport(&mut self) {
        self.enqueue(RenderEvent::PopViewport);
    }

    pub fn push_scissor(&mut self, rect: RectI) {
        self.enqueue(RenderEvent::PushScissor(RectPayload { rect }));
    }

    pub fn pop_scissor(&mut self) {
        self.enqueue(RenderEvent::PopScissor);
    }

    pub fn push_scissor_offset(&mut self, offset: Vec2I) {
        self.enqueue(RenderEvent::PushScissorOffset(OffsetPayload { offset }));
    }

    pub fn pop_scissor_offset(&mut self) {
        self.enqueue(RenderEvent::PopScissorOffset);
    }

    pub fn push_masking(&mut self, info: MaskingInfo) {
        self.enqueue(RenderEvent::PushMasking(info));
    }

    pub fn pop_masking(&mut self) {
        self.enqueue(RenderEvent::PopMasking);
    }

    pub fn push_depth_info(&mut self, info: DepthInfo) {
        self.enqueue(RenderEvent::PushDepthInfo(info));
    }

    pub fn pop_depth_info(&mut self) {
        self.enqueue(RenderEvent::PopDepthInfo);
    }

    pub fn push_stencil_info(&mut self, info: StencilInfo) {
        self.enqueue(RenderEvent::PushStencilInfo(info));
    }

    pub fn pop_stencil_info(&mut self) {
        self.enqueue(RenderEvent::PopStencilInfo);
    }

    pub fn push_projection(&mut self, matrix: [f32; 16]) {
        self.enqueue(RenderEvent::PushProjection(ProjectionPayload { matrix }));
    }

    pub fn pop_projection(&mut self) {
        self.enqueue(RenderEvent::PopProjection);
    }

    pub fn set_blend(&mut self, parameters: BlendParameters) {
        self.enqueue(RenderEvent::SetBlend(parameters));
    }

    pub fn set_blend_mask(&mut self, mask: BlendMask) {
        self.enqueue(RenderEvent::SetBlendMask(BlendMaskPayload { bits: mask.bits }));
    }

    pub fn clear(&mut self, info: ClearInfo) {
        self.enqueue(RenderEvent::Clear(info));
    }

    pub fn bind_shader(&mut self, shader: ShaderId) {
        let handle = self.recording_slot().arena.reference(shader);
        self.enqueue(RenderEvent::BindShader(HandlePayload { handle }));
    }

    pub fn unbind_shader(&mut self, shader: ShaderId) {
        let handle = self.recording_slot().arena.reference(shader);
        self.enqueue(RenderEvent::UnbindShader(HandlePayload { handle }));
    }

    pub fn bind_texture(
        &mut self,
        texture: TextureId,
        unit: u32,
        wrap_s: WrapMode,
        wrap_t: WrapMode,
    ) {
        let handle = self.recording_slot().arena.reference(texture);
        self.enqueue(RenderEvent::BindTexture(BindTexturePayload {
            texture: handle,
            unit,
            wrap_s: wrap_s as u32,
            wrap_t: wrap_t as u32,
        }));
    }

    pub fn bind_uniform_block(
        &mut self,
        shader: ShaderId,
        block_name: &str,
        buffer: UniformBufferId,
    ) {
        let slot = self.recording_slot();
        let shader_handle = slot.arena.reference(shader);
        let name_block = slot.arena.alloc_bytes(block_name.as_bytes());
        let buffer_handle = slot.arena.reference(buffer);
        self.enqueue(RenderEvent::BindUniformBlock(BindUniformBlockPayload {
            shader: shader_handle,
            block_name: name_block,
            buffer: buffer_handle,
        }));
    }

    pub fn bind_frame_buffer(&mut self, frame_buffer: FrameBufferId) {
        let handle = self.recording_slot().arena.reference(frame_buffer);
        self.enqueue(RenderEvent::BindFrameBuffer(HandlePayload { handle }));
    }

    pub fn unbind_frame_buffer(&mut self, frame_buffer: FrameBufferId) {
        let handle = self.recording_slot().arena.reference(frame_buffer);
        self.enqueue(RenderEvent::UnbindFrameBuffer(HandlePayload { handle }));
    }

    /// Appends one vertex to a batch. Free at record time: the vertex bytes
    /// go into the arena and a single event into the log; actual draw calls
    /// are decided during replay.
    pub fn add_vertex(&mut self, batch: VertexBatchId, vertex_bytes: &[u8]) {
        let slot = self.recording_slot();
        let batch_handle = slot.arena.reference(batch);
        let vertex_block = slot.arena.alloc_bytes(vertex_bytes);
        self.enqueue(RenderEvent::AddVertexToBatch(AddVertexPayload {
            batch: batch_handle,
            vertex: vertex_block,
        }));
    }

    pub fn add_vertex_value<T: Pod>(&mut self, batch: VertexBatchId, vertex: T) {
        self.add_vertex(batch, bytemuck::bytes_of(&vertex));
    }

    pub fn schedule_disposal(&mut self, target: DisposalTarget) {
        let handle = self.recording_slot().arena.reference(target);
        self.enqueue(RenderEvent::DisposeResource(HandlePayload { handle }));
    }

    fn enqueue(&mut self, event: RenderEvent) {
        self.recording_slot().log.enqueue(&event);
    }

    fn recording_slot(&mut self) -> &mut FrameSlot {
        if self.phase != RecorderPhase::Recording {
            panic!("recording operation outside begin_frame/finish_frame");
        }
        self.slot
            .as_mut()
            .unwrap_or_else(|| panic!("recording phase with no frame slot"))
    }
}

impl Default for FrameRecorder {
    fn default() -> Self {
        Self::new()
    }
}
