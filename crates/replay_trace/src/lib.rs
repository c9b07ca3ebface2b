//! Backend-call tracing for replay diagnostics and tests.
//!
//! `TraceBackend` implements the graphics backend interface by recording
//! every call as a serializable `BackendCall` value. Call streams can be
//! written and read as JSONL and compared semantically, so a replay can be
//! diffed against a golden trace without a real graphics device.

use std::io::{BufRead, Write};

use render_protocol::{
    BlendMask, BlendParameters, ClearInfo, DepthInfo, DisposalTarget, FrameBufferId,
    GraphicsBackend, MaskingInfo, RectI, ShaderId, StencilInfo, TextureId, UniformBufferId, Vec2I,
    VertexBatchId, WrapMode,
};
use serde::{Deserialize, Serialize};
use slotmap::Key;

/// One backend invocation with its arguments. Slotmap ids are flattened to
/// their ffi representation so streams stay comparable across runs that
/// allocate ids in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum BackendCall {
    SetViewport { rect: RectI },
    SetScissor { rect: RectI, enabled: bool },
    SetScissorOffset { offset: Vec2I },
    SetMasking { info: MaskingInfo },
    SetDepthInfo { info: DepthInfo },
    SetStencilInfo { info: StencilInfo },
    SetProjection { matrix: [f32; 16] },
    SetBlend { parameters: BlendParameters },
    SetBlendMask { bits: u32 },
    BindShader { shader: u64 },
    UnbindShader { shader: u64 },
    BindTexture { texture: u64, unit: u32, wrap_s: u32, wrap_t: u32 },
    BindUniformBlock { shader: u64, block_name: String, buffer: u64 },
    BindFrameBuffer { frame_buffer: u64 },
    UnbindFrameBuffer { frame_buffer: u64 },
    Clear { info: ClearInfo },
    UploadVertexBatch { batch: u64, byte_len: u32, data_digest: String },
    DrawVertexRange { batch: u64, start_index: u32, end_index: u32 },
    ScheduleDisposal { target: String },
}

/// 64-bit FNV-1a over the uploaded vertex bytes; enough to diff traces
/// without embedding whole buffers in the stream.
pub fn vertex_data_digest(bytes: &[u8]) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("fnv1a:{hash:016x}")
}

fn disposal_target_label(target: DisposalTarget) -> String {
    match target {
        DisposalTarget::Texture(id) => format!("texture:{}", id.data().as_ffi()),
        DisposalTarget::Shader(id) => format!("shader:{}", id.data().as_ffi()),
        DisposalTarget::FrameBuffer(id) => format!("frame_buffer:{}", id.data().as_ffi()),
        DisposalTarget::UniformBuffer(id) => format!("uniform_buffer:{}", id.data().as_ffi()),
        DisposalTarget::VertexBatch(id) => format!("vertex_batch:{}", id.data().as_ffi()),
    }
}

#[derive(Debug, Default)]
pub struct TraceBackend {
    calls: Vec<BackendCall>,
}

impl TraceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }
}

impl GraphicsBackend for TraceBackend {
    fn set_viewport(&mut self, rect: RectI) {
        self.calls.push(BackendCall::SetViewport { rect });
    }

    fn set_scissor(&mut self, rect: RectI, enabled: bool) {
        self.calls.push(BackendCall::SetScissor { rect, enabled });
    }

    fn set_scissor_offset(&mut self, offset: Vec2I) {
        self.calls.push(BackendCall::SetScissorOffset { offset });
    }

    fn set_masking(&mut self, info: MaskingInfo) {
        self.calls.push(BackendCall::SetMasking { info });
    }

    fn set_depth_info(&mut self, info: DepthInfo) {
        self.calls.push(BackendCall::SetDepthInfo { info });
    }

    fn set_stencil_info(&mut self, info: StencilInfo) {
        self.calls.push(BackendCall::SetStencilInfo { info });
    }

    fn set_projection(&mut self, matrix: [f32; 16]) {
        self.calls.push(BackendCall::SetProjection { matrix });
    }

    fn set_blend(&mut self, parameters: BlendParameters) {
        self.calls.push(BackendCall::SetBlend { parameters });
    }

    fn set_blend_mask(&mut self, mask: BlendMask) {
        self.calls.push(BackendCall::SetBlendMask { bits: mask.bits });
    }

    fn bind_shader(&mut self, shader: ShaderId) {
        self.calls.push(BackendCall::BindShader {
            shader: shader.data().as_ffi(),
        });
    }

    fn unbind_shader(&mut self, shader: ShaderId) {
        self.calls.push(BackendCall::UnbindShader {
            shader: shader.data().as_ffi(),
        });
    }

    fn bind_texture(&mut self, texture: TextureId, unit: u32, wrap_s: WrapMode, wrap_t: WrapMode) {
        self.calls.push(BackendCall::BindTexture {
            texture: texture.data().as_ffi(),
            unit,
            wrap_s: wrap_s as u32,
            wrap_t: wrap_t as u32,
        });
    }

    fn bind_uniform_block(&mut self, shader: ShaderId, block_name: &str, buffer: UniformBufferId) {
        self.calls.push(BackendCall::BindUniformBlock {
            shader: shader.data().as_ffi(),
            block_name: block_name.to_owned(),
            buffer: buffer.data().as_ffi(),
        });
    }

    fn bind_frame_buffer(&mut self, frame_buffer: FrameBufferId) {
        self.calls.push(BackendCall::BindFrameBuffer {
            frame_buffer: frame_buffer.data().as_ffi(),
        });
    }

    fn unbind_frame_buffer(&mut self, frame_buffer: FrameBufferId) {
        self.calls.push(BackendCall::UnbindFrameBuffer {
            frame_buffer: frame_buffer.data().as_ffi(),
        });
    }

    fn clear(&mut self, info: ClearInfo) {
        self.calls.push(BackendCall::Clear { info });
    }

    fn upload_vertex_batch(&mut self, batch: VertexBatchId, vertex_data: &[u8]) {
        let byte_len = u32::try_from(vertex_data.len())
            .unwrap_or_else(|_| panic!("vertex upload byte length overflow"));
        self.calls.push(BackendCall::UploadVertexBatch {
            batch: batch.data().as_ffi(),
            byte_len,
            data_digest: vertex_data_digest(vertex_data),
        });
    }

    fn draw_vertex_range(&mut self, batch: VertexBatchId, start_index: u32, end_index: u32) {
        self.calls.push(BackendCall::DrawVertexRange {
            batch: batch.data().as_ffi(),
            start_index,
            end_index,
        });
    }

    fn schedule_disposal(&mut self, target: DisposalTarget) {
        self.calls.push(BackendCall::ScheduleDisposal {
            target: disposal_target_label(target),
        });
    }
}

pub fn write_jsonl_calls(
    writer: &mut dyn Write,
    calls: &[BackendCall],
) -> Result<(), std::io::Error> {
    for call in calls {
        serde_json::to_writer(&mut *writer, call).map_err(|error| {
            std::io::Error::other(format!("serialize backend call as JSON failed: {error}"))
        })?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

pub fn read_jsonl_calls(reader: &mut dyn BufRead) -> Result<Vec<BackendCall>, std::io::Error> {
    let mut calls = Vec::new();
    let mut line_buffer = String::new();
    let mut line_number = 0usize;
    loop {
        line_buffer.clear();
        let bytes = reader.read_line(&mut line_buffer)?;
        if bytes == 0 {
            break;
        }
        line_number += 1;
        if line_buffer.trim().is_empty() {
            continue;
        }
        let call = serde_json::from_str::<BackendCall>(&line_buffer).map_err(|error| {
            std::io::Error::other(format!(
                "parse backend call JSON at line {line_number} failed: {error}"
            ))
        })?;
        calls.push(call);
    }
    Ok(calls)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareError {
    CallCountMismatch { expected: usize, actual: usize },
    CallMismatch { index: usize },
}

pub fn compare_call_streams(
    expected: &[BackendCall],
    actual: &[BackendCall],
) -> Result<(), CompareError> {
    if expected.len() != actual.len() {
        return Err(CompareError::CallCountMismatch {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    for (index, (left, right)) in expected.iter().zip(actual.iter()).enumerate() {
        if left != right {
            return Err(CompareError::CallMismatch { index });
        }
    }
    Ok(())
}
