//! Replay engine.
//!
//! Walks a sealed frame's event log in recording order and drives the real
//! graphics backend. Batched vertex events go through two passes: the first
//! copies every vertex into its batch's backing storage with simple bump
//! indices, the second decides draw-call boundaries so that any interleaving
//! non-batch event splits the contiguous range exactly where it was recorded.

mod batch_store;
mod state_stack;

pub use batch_store::VertexBatchStore;
pub use state_stack::StateStack;

use event_log::EventLog;
use frame_arena::FrameArena;
use render_protocol::{
    AddVertexPayload, BlendMask, DepthInfo, DisposalTarget, EventKind, FrameBufferId,
    GraphicsBackend, MaskingInfo, ProjectionPayload, RectI, RenderEvent, ShaderId, StencilInfo,
    TextureId, UniformBufferId, Vec2I, VertexBatchId, WrapMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScissorState {
    rect: RectI,
    enabled: bool,
}

struct PendingRange {
    batch: VertexBatchId,
    count: u32,
}

/// Owns one state stack per pushable state kind and replays sealed frames.
/// Stacks are cleared at the start of every replay, so a painter instance can
/// serve frame after frame on the draw thread.
pub struct Painter {
    viewport: StateStack<RectI>,
    scissor: StateStack<ScissorState>,
    scissor_offset: StateStack<Vec2I>,
    masking: StateStack<MaskingInfo>,
    depth: StateStack<DepthInfo>,
    stencil: StateStack<StencilInfo>,
    projection: StateStack<ProjectionPayload>,
}

impl Painter {
    pub fn new() -> Self {
        Self {
            viewport: StateStack::new(),
            scissor: StateStack::new(),
            scissor_offset: StateStack::new(),
            masking: StateStack::new(),
            depth: StateStack::new(),
            stencil: StateStack::new(),
            projection: StateStack::new(),
        }
    }

    /// Replays one frame against the backend. All-or-nothing: integrity
    /// failures (stale handles, corrupt log) panic rather than executing a
    /// partial command stream.
    pub fn replay<B: GraphicsBackend>(
        &mut self,
        arena: &FrameArena,
        log: &EventLog,
        frame_viewport: RectI,
        store: &mut VertexBatchStore,
        backend: &mut B,
    ) {
        self.begin_frame(frame_viewport, backend);
        store.begin_frame();

        // Pass 1: populate batch backing storage. No draw state is touched.
        let mut reader = log.reader();
        while reader.next() {
            if reader.current_kind() == EventKind::AddVertexToBatch {
                let payload: AddVertexPayload = reader.decode();
                let batch = *arena.resolve::<VertexBatchId>(payload.batch);
                let _ = store.write_next(batch, arena.region(payload.vertex));
            }
        }

        for (batch, bytes) in store.written_batches() {
            backend.upload_vertex_batch(batch, bytes);
        }

        // Pass 2: replay in recorded order, accumulating contiguous vertex
        // runs and flushing them whenever anything else interleaves.
        reader.rewind();
        let mut pending: Option<PendingRange> = None;
        while reader.next() {
            let event = reader.decode_event();
            if let RenderEvent::AddVertexToBatch(payload) = event {
                let batch = *arena.resolve::<VertexBatchId>(payload.batch);
                match &mut pending {
                    Some(range) if range.batch == batch => {
                        range.count = range
                            .count
                            .checked_add(1)
                            .unwrap_or_else(|| panic!("batched vertex run length overflow"));
                    }
                    _ => {
                        flush_pending(&mut pending, store, backend);
                        pending = Some(PendingRange { batch, count: 1 });
                    }
                }
                continue;
            }
            flush_pending(&mut pending, store, backend);
            self.dispatch(event, arena, backend);
        }
        flush_pending(&mut pending, store, backend);
    }

    /// Frame prelude: empty every stack, then seed the frame viewport and a
    /// disabled full-viewport scissor so pops can never underflow past frame
    /// defaults.
    fn begin_frame<B: GraphicsBackend>(&mut self, frame_viewport: RectI, backend: &mut B) {
        self.viewport.clear();
        self.scissor.clear();
        self.scissor_offset.clear();
        self.masking.clear();
        self.depth.clear();
        self.stencil.clear();
        self.projection.clear();

        if let Some(rect) = self.viewport.push(frame_viewport) {
            backend.set_viewport(*rect);
        }
        if let Some(state) = self.scissor.push(ScissorState {
            rect: frame_viewport,
            enabled: false,
        }) {
            backend.set_scissor(state.rect, state.enabled);
        }
    }

    fn dispatch<B: GraphicsBackend>(
        &mut self,
        event: RenderEvent,
        arena: &FrameArena,
        backend: &mut B,
    ) {
        match event {
            RenderEvent::PushViewport(payload) => {
                if let Some(rect) = self.viewport.push(payload.rect) {
                    backend.set_viewport(*rect);
                }
            }
            RenderEvent::PopViewport => {
                if let Some(rect) = self.viewport.pop() {
                    backend.set_viewport(*rect);
                }
            }
            RenderEvent::PushScissor(payload) => {
                let state = ScissorState {
                    rect: payload.rect,
                    enabled: true,
                };
                if let Some(state) = self.scissor.push(state) {
                    backend.set_scissor(state.rect, state.enabled);
                }
            }
            RenderEvent::PopScissor => {
                if let Some(state) = self.scissor.pop() {
                    backend.set_scissor(state.rect, state.enabled);
                }
            }
            RenderEvent::PushScissorOffset(payload) => {
                if let Some(offset) = self.scissor_offset.push(payload.offset) {
                    backend.set_scissor_offset(*offset);
                }
            }
            RenderEvent::PopScissorOffset => {
                if let Some(offset) = self.scissor_offset.pop() {
                    backend.set_scissor_offset(*offset);
                }
            }
            RenderEvent::PushMasking(info) => {
                if let Some(info) = self.masking.push(info) {
                    backend.set_masking(*info);
                }
            }
            RenderEvent::PopMasking => {
                if let Some(info) = self.masking.pop() {
                    backend.set_masking(*info);
                }
            }
            RenderEvent::PushDepthInfo(info) => {
                if let Some(info) = self.depth.push(info) {
                    backend.set_depth_info(*info);
                }
            }
            RenderEvent::PopDepthInfo => {
                if let Some(info) = self.depth.pop() {
                    backend.set_depth_info(*info);
                }
            }
            RenderEvent::PushStencilInfo(info) => {
                if let Some(info) = self.stencil.push(info) {
                    backend.set_stencil_info(*info);
                }
            }
            RenderEvent::PopStencilInfo => {
                if let Some(info) = self.stencil.pop() {
                    backend.set_stencil_info(*info);
                }
            }
            RenderEvent::PushProjection(payload) => {
                if let Some(projection) = self.projection.push(payload) {
                    backend.set_projection(projection.matrix);
                }
            }
            RenderEvent::PopProjection => {
                if let Some(projection) = self.projection.pop() {
                    backend.set_projection(projection.matrix);
                }
            }
            RenderEvent::SetBlend(parameters) => backend.set_blend(parameters),
            RenderEvent::SetBlendMask(payload) => backend.set_blend_mask(BlendMask {
                bits: payload.bits,
            }),
            RenderEvent::Clear(info) => backend.clear(info),
            RenderEvent::BindShader(payload) => {
                backend.bind_shader(*arena.resolve::<ShaderId>(payload.handle));
            }
            RenderEvent::UnbindShader(payload) => {
                backend.unbind_shader(*arena.resolve::<ShaderId>(payload.handle));
            }
            RenderEvent::BindTexture(payload) => {
                let texture = *arena.resolve::<TextureId>(payload.texture);
                backend.bind_texture(
                    texture,
                    payload.unit,
                    WrapMode::from_raw(payload.wrap_s),
                    WrapMode::from_raw(payload.wrap_t),
                );
            }
            RenderEvent::BindUniformBlock(payload) => {
                let shader = *arena.resolve::<ShaderId>(payload.shader);
                let buffer = *arena.resolve::<UniformBufferId>(payload.buffer);
                let name_bytes = arena.region(payload.block_name);
                let block_name = std::str::from_utf8(name_bytes)
                    .unwrap_or_else(|error| panic!("uniform block name is not UTF-8: {error}"));
                backend.bind_uniform_block(shader, block_name, buffer);
            }
            RenderEvent::BindFrameBuffer(payload) => {
                backend.bind_frame_buffer(*arena.resolve::<FrameBufferId>(payload.handle));
            }
            RenderEvent::UnbindFrameBuffer(payload) => {
                backend.unbind_frame_buffer(*arena.resolve::<FrameBufferId>(payload.handle));
            }
            RenderEvent::AddVertexToBatch(_) => {
                unreachable!("batched vertex events are consumed by the accumulator")
            }
            RenderEvent::DisposeResource(payload) => {
                backend.schedule_disposal(*arena.resolve::<DisposalTarget>(payload.handle));
            }
        }
    }
}

impl Default for Painter {
    fn default() -> Self {
        Self::new()
    }
}

fn flush_pending<B: GraphicsBackend>(
    pending: &mut Option<PendingRange>,
    store: &mut VertexBatchStore,
    backend: &mut B,
) {
    let Some(range) = pending.take() else {
        return;
    };
    let start = store.drawn_cursor(range.batch);
    let end = start
        .checked_add(range.count)
        .unwrap_or_else(|| panic!("vertex draw range end overflow"));
    backend.draw_vertex_range(range.batch, start, end);
    store.advance_drawn(range.batch, range.count);
}

#[cfg(test)]
mod tests;
