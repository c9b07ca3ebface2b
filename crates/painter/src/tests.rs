//! Replay engine tests.
//!
//! These validate the two central guarantees of the deferred command system:
//! backend calls come out in exactly the recorded order, and vertex batching
//! only merges runs that were contiguous in that order.

use bytemuck::{Pod, Zeroable};
use event_log::EventLog;
use frame_arena::FrameArena;
use render_protocol::{
    AddVertexPayload, BatchIdentity, BindTexturePayload, BindUniformBlockPayload, ClearInfo,
    DepthInfo, CompareFunction, DisposalTarget, HandlePayload, PrimitiveTopology, RectI,
    RectPayload, RenderEvent, ShaderId, TextureId, UniformBufferId, VertexBatchId,
    VertexLayoutId, WrapMode,
};
use replay_trace::{BackendCall, TraceBackend, compare_call_streams, vertex_data_digest};
use slotmap::{Key, SlotMap};

use super::*;

const FRAME_VIEWPORT: RectI = RectI::new(0, 0, 640, 480);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct TestVertex {
    x: f32,
    y: f32,
}

fn vertex(x: f32, y: f32) -> TestVertex {
    TestVertex { x, y }
}

struct Harness {
    arena: FrameArena,
    log: EventLog,
    store: VertexBatchStore,
    textures: SlotMap<TextureId, ()>,
    shaders: SlotMap<ShaderId, ()>,
    uniform_buffers: SlotMap<UniformBufferId, ()>,
}

impl Harness {
    fn new() -> Self {
        Self {
            arena: FrameArena::new(),
            log: EventLog::new(),
            store: VertexBatchStore::new(),
            textures: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            uniform_buffers: SlotMap::with_key(),
        }
    }

    fn create_batch(&mut self) -> VertexBatchId {
        self.store.create_batch(
            BatchIdentity {
                layout: VertexLayoutId(0),
                topology: PrimitiveTopology::Triangles,
            },
            size_of::<TestVertex>(),
        )
    }

    fn push_scissor(&mut self, rect: RectI) {
        self.log
            .enqueue(&RenderEvent::PushScissor(RectPayload { rect }));
    }

    fn pop_scissor(&mut self) {
        self.log.enqueue(&RenderEvent::PopScissor);
    }

    fn bind_texture(&mut self, texture: TextureId, unit: u32) {
        let handle = self.arena.reference(texture);
        self.log.enqueue(&RenderEvent::BindTexture(BindTexturePayload {
            texture: handle,
            unit,
            wrap_s: WrapMode::ClampToEdge as u32,
            wrap_t: WrapMode::ClampToEdge as u32,
        }));
    }

    fn add_vertex(&mut self, batch: VertexBatchId, value: TestVertex) {
        let batch_handle = self.arena.reference(batch);
        let vertex_block = self.arena.alloc_value(value);
        self.log
            .enqueue(&RenderEvent::AddVertexToBatch(AddVertexPayload {
                batch: batch_handle,
                vertex: vertex_block,
            }));
    }

    fn replay(&mut self) -> Vec<BackendCall> {
        let mut painter = Painter::new();
        let mut backend = TraceBackend::new();
        painter.replay(
            &self.arena,
            &self.log,
            FRAME_VIEWPORT,
            &mut self.store,
            &mut backend,
        );
        backend.take_calls()
    }
}

fn prelude() -> Vec<BackendCall> {
    vec![
        BackendCall::SetViewport {
            rect: FRAME_VIEWPORT,
        },
        BackendCall::SetScissor {
            rect: FRAME_VIEWPORT,
            enabled: false,
        },
    ]
}

fn upload_call(batch: VertexBatchId, vertices: &[TestVertex]) -> BackendCall {
    let bytes = bytemuck::cast_slice(vertices);
    BackendCall::UploadVertexBatch {
        batch: batch.data().as_ffi(),
        byte_len: u32::try_from(bytes.len()).expect("upload length"),
        data_digest: vertex_data_digest(bytes),
    }
}

fn draw_call(batch: VertexBatchId, start: u32, end: u32) -> BackendCall {
    BackendCall::DrawVertexRange {
        batch: batch.data().as_ffi(),
        start_index: start,
        end_index: end,
    }
}

#[test]
fn empty_frame_emits_only_the_prelude() {
    let mut harness = Harness::new();
    let calls = harness.replay();
    assert_eq!(compare_call_streams(&prelude(), &calls), Ok(()));
}

#[test]
fn uninterrupted_vertex_run_draws_once() {
    let mut harness = Harness::new();
    let batch = harness.create_batch();
    let vertices: Vec<TestVertex> = (0..10).map(|i| vertex(i as f32, 0.0)).collect();
    for v in &vertices {
        harness.add_vertex(batch, *v);
    }

    let calls = harness.replay();
    let mut expected = prelude();
    expected.push(upload_call(batch, &vertices));
    expected.push(draw_call(batch, 0, 10));
    assert_eq!(compare_call_streams(&expected, &calls), Ok(()));
}

#[test]
fn interleaved_batch_splits_the_run_in_recorded_order() {
    let mut harness = Harness::new();
    let batch_b = harness.create_batch();
    let batch_c = harness.create_batch();

    let b_vertices: Vec<TestVertex> = (0..10).map(|i| vertex(i as f32, 1.0)).collect();
    let c_vertex = vertex(100.0, 2.0);
    for v in &b_vertices[..5] {
        harness.add_vertex(batch_b, *v);
    }
    harness.add_vertex(batch_c, c_vertex);
    for v in &b_vertices[5..] {
        harness.add_vertex(batch_b, *v);
    }

    let calls = harness.replay();
    let mut expected = prelude();
    expected.push(upload_call(batch_b, &b_vertices));
    expected.push(upload_call(batch_c, &[c_vertex]));
    expected.push(draw_call(batch_b, 0, 5));
    expected.push(draw_call(batch_c, 0, 1));
    expected.push(draw_call(batch_b, 5, 10));
    assert_eq!(compare_call_streams(&expected, &calls), Ok(()));
}

#[test]
fn state_event_between_vertices_forces_a_flush() {
    let mut harness = Harness::new();
    let batch = harness.create_batch();
    let vertices: Vec<TestVertex> = (0..4).map(|i| vertex(i as f32, 3.0)).collect();
    let scissor = RectI::new(10, 10, 50, 50);

    harness.add_vertex(batch, vertices[0]);
    harness.add_vertex(batch, vertices[1]);
    harness.push_scissor(scissor);
    harness.add_vertex(batch, vertices[2]);
    harness.add_vertex(batch, vertices[3]);

    let calls = harness.replay();
    let mut expected = prelude();
    expected.push(upload_call(batch, &vertices));
    expected.push(draw_call(batch, 0, 2));
    expected.push(BackendCall::SetScissor {
        rect: scissor,
        enabled: true,
    });
    expected.push(draw_call(batch, 2, 4));
    assert_eq!(compare_call_streams(&expected, &calls), Ok(()));
}

#[test]
fn recorded_scenario_replays_in_exact_order() {
    // BindTexture, PushScissor(prior), PushScissor(A), 4 vertices, PopScissor:
    // the pop must re-apply the prior scissor after the draw.
    let mut harness = Harness::new();
    let texture = harness.textures.insert(());
    let batch = harness.create_batch();
    let prior = RectI::new(0, 0, 200, 200);
    let inner = RectI::new(20, 20, 60, 60);
    let vertices: Vec<TestVertex> = (0..4).map(|i| vertex(i as f32, 4.0)).collect();

    harness.bind_texture(texture, 0);
    harness.push_scissor(prior);
    harness.push_scissor(inner);
    for v in &vertices {
        harness.add_vertex(batch, *v);
    }
    harness.pop_scissor();

    let calls = harness.replay();
    let mut expected = prelude();
    expected.push(upload_call(batch, &vertices));
    expected.push(BackendCall::BindTexture {
        texture: texture.data().as_ffi(),
        unit: 0,
        wrap_s: WrapMode::ClampToEdge as u32,
        wrap_t: WrapMode::ClampToEdge as u32,
    });
    expected.push(BackendCall::SetScissor {
        rect: prior,
        enabled: true,
    });
    expected.push(BackendCall::SetScissor {
        rect: inner,
        enabled: true,
    });
    expected.push(draw_call(batch, 0, 4));
    expected.push(BackendCall::SetScissor {
        rect: prior,
        enabled: true,
    });
    assert_eq!(compare_call_streams(&expected, &calls), Ok(()));
}

#[test]
fn redundant_scissor_pushes_reach_the_backend_once() {
    let mut harness = Harness::new();
    let scissor = RectI::new(5, 5, 10, 10);
    harness.push_scissor(scissor);
    harness.push_scissor(scissor);
    harness.pop_scissor();
    harness.pop_scissor();

    let calls = harness.replay();
    let mut expected = prelude();
    expected.push(BackendCall::SetScissor {
        rect: scissor,
        enabled: true,
    });
    expected.push(BackendCall::SetScissor {
        rect: FRAME_VIEWPORT,
        enabled: false,
    });
    assert_eq!(compare_call_streams(&expected, &calls), Ok(()));
}

#[test]
fn depth_pushes_deduplicate_by_value() {
    let mut harness = Harness::new();
    let depth = DepthInfo::new(true, CompareFunction::Less);
    harness
        .log
        .enqueue(&RenderEvent::PushDepthInfo(depth));
    harness
        .log
        .enqueue(&RenderEvent::PushDepthInfo(depth));
    harness.log.enqueue(&RenderEvent::PopDepthInfo);
    harness.log.enqueue(&RenderEvent::PopDepthInfo);

    let calls = harness.replay();
    let mut expected = prelude();
    expected.push(BackendCall::SetDepthInfo { info: depth });
    assert_eq!(compare_call_streams(&expected, &calls), Ok(()));
}

#[test]
fn clear_and_binds_flow_through_in_order() {
    let mut harness = Harness::new();
    let shader = harness.shaders.insert(());
    let buffer = harness.uniform_buffers.insert(());
    let clear = ClearInfo::color_only([0.1, 0.2, 0.3, 1.0]);

    let shader_handle = harness.arena.reference(shader);
    harness
        .log
        .enqueue(&RenderEvent::BindShader(HandlePayload {
            handle: shader_handle,
        }));
    harness.log.enqueue(&RenderEvent::Clear(clear));
    let shader_handle = harness.arena.reference(shader);
    let buffer_handle = harness.arena.reference(buffer);
    let name_block = harness.arena.alloc_bytes(b"globals");
    harness
        .log
        .enqueue(&RenderEvent::BindUniformBlock(BindUniformBlockPayload {
            shader: shader_handle,
            block_name: name_block,
            buffer: buffer_handle,
        }));

    let calls = harness.replay();
    let mut expected = prelude();
    expected.push(BackendCall::BindShader {
        shader: shader.data().as_ffi(),
    });
    expected.push(BackendCall::Clear { info: clear });
    expected.push(BackendCall::BindUniformBlock {
        shader: shader.data().as_ffi(),
        block_name: String::from("globals"),
        buffer: buffer.data().as_ffi(),
    });
    assert_eq!(compare_call_streams(&expected, &calls), Ok(()));
}

#[test]
fn disposal_happens_in_stream_order_after_the_flush() {
    let mut harness = Harness::new();
    let texture = harness.textures.insert(());
    let batch = harness.create_batch();
    let v = vertex(1.0, 1.0);

    harness.add_vertex(batch, v);
    let target_handle = harness.arena.reference(DisposalTarget::Texture(texture));
    harness
        .log
        .enqueue(&RenderEvent::DisposeResource(HandlePayload {
            handle: target_handle,
        }));

    let calls = harness.replay();
    let mut expected = prelude();
    expected.push(upload_call(batch, &[v]));
    expected.push(draw_call(batch, 0, 1));
    expected.push(BackendCall::ScheduleDisposal {
        target: format!("texture:{}", texture.data().as_ffi()),
    });
    assert_eq!(compare_call_streams(&expected, &calls), Ok(()));
}

#[test]
fn replaying_consecutive_frames_reuses_batch_storage() {
    let mut harness = Harness::new();
    let batch = harness.create_batch();
    let first = vertex(1.0, 0.0);
    harness.add_vertex(batch, first);
    let _ = harness.replay();

    harness.arena.reset();
    harness.log.reset();
    let second = vertex(2.0, 0.0);
    harness.add_vertex(batch, second);

    let calls = harness.replay();
    let mut expected = prelude();
    expected.push(upload_call(batch, &[second]));
    expected.push(draw_call(batch, 0, 1));
    assert_eq!(compare_call_streams(&expected, &calls), Ok(()));
}

#[test]
#[should_panic(expected = "handles do not survive a frame reset")]
fn replay_rejects_handles_from_a_previous_frame() {
    let mut harness = Harness::new();
    let batch = harness.create_batch();
    harness.add_vertex(batch, vertex(0.0, 0.0));
    harness.arena.reset();
    let _ = harness.replay();
}
