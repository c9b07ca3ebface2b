use crate::{
    BlendMask, BlendParameters, ClearInfo, DepthInfo, FrameBufferId, MaskingInfo, RectI, ShaderId,
    StencilInfo, TextureId, UniformBufferId, Vec2I, VertexBatchId, WrapMode,
};

/// A backend resource whose disposal has been deferred until replay has
/// caught up with the last event that referenced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisposalTarget {
    Texture(TextureId),
    Shader(ShaderId),
    FrameBuffer(FrameBufferId),
    UniformBuffer(UniformBufferId),
    VertexBatch(VertexBatchId),
}

/// The native-graphics collaborator, driven only by the replay engine on the
/// draw thread. Recording code never calls any of these.
///
/// Device-level failures (device loss, shader compilation) belong to the
/// implementor and surface through its own channels; nothing here returns
/// them.
pub trait GraphicsBackend {
    fn set_viewport(&mut self, rect: RectI);
    fn set_scissor(&mut self, rect: RectI, enabled: bool);
    fn set_scissor_offset(&mut self, offset: Vec2I);
    fn set_masking(&mut self, info: MaskingInfo);
    fn set_depth_info(&mut self, info: DepthInfo);
    fn set_stencil_info(&mut self, info: StencilInfo);
    fn set_projection(&mut self, matrix: [f32; 16]);
    fn set_blend(&mut self, parameters: BlendParameters);
    fn set_blend_mask(&mut self, mask: BlendMask);

    fn bind_shader(&mut self, shader: ShaderId);
    fn unbind_shader(&mut self, shader: ShaderId);
    fn bind_texture(&mut self, texture: TextureId, unit: u32, wrap_s: WrapMode, wrap_t: WrapMode);
    fn bind_uniform_block(&mut self, shader: ShaderId, block_name: &str, buffer: UniformBufferId);
    fn bind_frame_buffer(&mut self, frame_buffer: FrameBufferId);
    fn unbind_frame_buffer(&mut self, frame_buffer: FrameBufferId);

    fn clear(&mut self, info: ClearInfo);

    /// Hands the batch's vertex bytes for this frame to the backend, once per
    /// batch, before any `draw_vertex_range` for it.
    fn upload_vertex_batch(&mut self, batch: VertexBatchId, vertex_data: &[u8]);

    /// Draws the contiguous vertex range `[start_index, end_index)` of a
    /// previously uploaded batch.
    fn draw_vertex_range(&mut self, batch: VertexBatchId, start_index: u32, end_index: u32);

    fn schedule_disposal(&mut self, target: DisposalTarget);
}
