//! The closed event catalogue for one recorded frame.
//!
//! Every recorded operation is one tag byte followed by a fixed-size Pod
//! payload. The catalogue is a closed sum type: adding a variant without
//! updating every dispatch site is a compile error, and the payload sizes are
//! pinned by const asserts so the byte format cannot drift silently.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

use crate::{
    BlendParameters, ClearInfo, DepthInfo, MaskingInfo, MemoryBlockHandle, RectI, ResourceHandle,
    StencilInfo, Vec2I,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    PushViewport = 0,
    PopViewport = 1,
    PushScissor = 2,
    PopScissor = 3,
    PushScissorOffset = 4,
    PopScissorOffset = 5,
    PushMasking = 6,
    PopMasking = 7,
    PushDepthInfo = 8,
    PopDepthInfo = 9,
    PushStencilInfo = 10,
    PopStencilInfo = 11,
    PushProjection = 12,
    PopProjection = 13,
    SetBlend = 14,
    SetBlendMask = 15,
    Clear = 16,
    BindShader = 17,
    UnbindShader = 18,
    BindTexture = 19,
    BindUniformBlock = 20,
    BindFrameBuffer = 21,
    UnbindFrameBuffer = 22,
    AddVertexToBatch = 23,
    DisposeResource = 24,
}

impl EventKind {
    /// Decodes a tag byte read back from an event log. An unknown tag means
    /// the log is corrupted, which recording can never produce, so it is a
    /// fatal integrity error.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::PushViewport,
            1 => Self::PopViewport,
            2 => Self::PushScissor,
            3 => Self::PopScissor,
            4 => Self::PushScissorOffset,
            5 => Self::PopScissorOffset,
            6 => Self::PushMasking,
            7 => Self::PopMasking,
            8 => Self::PushDepthInfo,
            9 => Self::PopDepthInfo,
            10 => Self::PushStencilInfo,
            11 => Self::PopStencilInfo,
            12 => Self::PushProjection,
            13 => Self::PopProjection,
            14 => Self::SetBlend,
            15 => Self::SetBlendMask,
            16 => Self::Clear,
            17 => Self::BindShader,
            18 => Self::UnbindShader,
            19 => Self::BindTexture,
            20 => Self::BindUniformBlock,
            21 => Self::BindFrameBuffer,
            22 => Self::UnbindFrameBuffer,
            23 => Self::AddVertexToBatch,
            24 => Self::DisposeResource,
            other => panic!("unknown event tag {other} in event log"),
        }
    }

    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Fixed payload size in bytes for this kind.
    pub const fn payload_size(self) -> usize {
        match self {
            Self::PushViewport | Self::PushScissor => size_of::<RectPayload>(),
            Self::PopViewport
            | Self::PopScissor
            | Self::PopScissorOffset
            | Self::PopMasking
            | Self::PopDepthInfo
            | Self::PopStencilInfo
            | Self::PopProjection => 0,
            Self::PushScissorOffset => size_of::<OffsetPayload>(),
            Self::PushMasking => size_of::<MaskingInfo>(),
            Self::PushDepthInfo => size_of::<DepthInfo>(),
            Self::PushStencilInfo => size_of::<StencilInfo>(),
            Self::PushProjection => size_of::<ProjectionPayload>(),
            Self::SetBlend => size_of::<BlendParameters>(),
            Self::SetBlendMask => size_of::<BlendMaskPayload>(),
            Self::Clear => size_of::<ClearInfo>(),
            Self::BindShader
            | Self::UnbindShader
            | Self::BindFrameBuffer
            | Self::UnbindFrameBuffer
            | Self::DisposeResource => size_of::<HandlePayload>(),
            Self::BindTexture => size_of::<BindTexturePayload>(),
            Self::BindUniformBlock => size_of::<BindUniformBlockPayload>(),
            Self::AddVertexToBatch => size_of::<AddVertexPayload>(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct RectPayload {
    pub rect: RectI,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct OffsetPayload {
    pub offset: Vec2I,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ProjectionPayload {
    pub matrix: [f32; 16],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct BlendMaskPayload {
    pub bits: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct HandlePayload {
    pub handle: ResourceHandle,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct BindTexturePayload {
    pub texture: ResourceHandle,
    pub unit: u32,
    pub wrap_s: u32,
    pub wrap_t: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct BindUniformBlockPayload {
    pub shader: ResourceHandle,
    pub block_name: MemoryBlockHandle,
    pub buffer: ResourceHandle,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct AddVertexPayload {
    pub batch: ResourceHandle,
    pub vertex: MemoryBlockHandle,
}

// Pin the wire sizes. A payload struct picking up padding or a widened field
// changes the log format for every frame, so it must be a deliberate edit here.
const_assert_eq!(size_of::<RectPayload>(), 16);
const_assert_eq!(size_of::<OffsetPayload>(), 8);
const_assert_eq!(size_of::<ProjectionPayload>(), 64);
const_assert_eq!(size_of::<MaskingInfo>(), 32);
const_assert_eq!(size_of::<DepthInfo>(), 8);
const_assert_eq!(size_of::<StencilInfo>(), 20);
const_assert_eq!(size_of::<BlendParameters>(), 16);
const_assert_eq!(size_of::<BlendMaskPayload>(), 4);
const_assert_eq!(size_of::<ClearInfo>(), 24);
const_assert_eq!(size_of::<HandlePayload>(), 8);
const_assert_eq!(size_of::<BindTexturePayload>(), 20);
const_assert_eq!(size_of::<BindUniformBlockPayload>(), 28);
const_assert_eq!(size_of::<AddVertexPayload>(), 20);

/// One recorded, replayable operation. Insertion order in the event log is
/// the only ordering that exists; replay must observe it exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderEvent {
    PushViewport(RectPayload),
    PopViewport,
    PushScissor(RectPayload),
    PopScissor,
    PushScissorOffset(OffsetPayload),
    PopScissorOffset,
    PushMasking(MaskingInfo),
    PopMasking,
    PushDepthInfo(DepthInfo),
    PopDepthInfo,
    PushStencilInfo(StencilInfo),
    PopStencilInfo,
    PushProjection(ProjectionPayload),
    PopProjection,
    SetBlend(BlendParameters),
    SetBlendMask(BlendMaskPayload),
    Clear(ClearInfo),
    BindShader(HandlePayload),
    UnbindShader(HandlePayload),
    BindTexture(BindTexturePayload),
    BindUniformBlock(BindUniformBlockPayload),
    BindFrameBuffer(HandlePayload),
    UnbindFrameBuffer(HandlePayload),
    AddVertexToBatch(AddVertexPayload),
    DisposeResource(HandlePayload),
}

impl RenderEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PushViewport(_) => EventKind::PushViewport,
            Self::PopViewport => EventKind::PopViewport,
            Self::PushScissor(_) => EventKind::PushScissor,
            Self::PopScissor => EventKind::PopScissor,
            Self::PushScissorOffset(_) => EventKind::PushScissorOffset,
            Self::PopScissorOffset => EventKind::PopScissorOffset,
            Self::PushMasking(_) => EventKind::PushMasking,
            Self::PopMasking => EventKind::PopMasking,
            Self::PushDepthInfo(_) => EventKind::PushDepthInfo,
            Self::PopDepthInfo => EventKind::PopDepthInfo,
            Self::PushStencilInfo(_) => EventKind::PushStencilInfo,
            Self::PopStencilInfo => EventKind::PopStencilInfo,
            Self::PushProjection(_) => EventKind::PushProjection,
            Self::PopProjection => EventKind::PopProjection,
            Self::SetBlend(_) => EventKind::SetBlend,
            Self::SetBlendMask(_) => EventKind::SetBlendMask,
            Self::Clear(_) => EventKind::Clear,
            Self::BindShader(_) => EventKind::BindShader,
            Self::UnbindShader(_) => EventKind::UnbindShader,
            Self::BindTexture(_) => EventKind::BindTexture,
            Self::BindUniformBlock(_) => EventKind::BindUniformBlock,
            Self::BindFrameBuffer(_) => EventKind::BindFrameBuffer,
            Self::UnbindFrameBuffer(_) => EventKind::UnbindFrameBuffer,
            Self::AddVertexToBatch(_) => EventKind::AddVertexToBatch,
            Self::DisposeResource(_) => EventKind::DisposeResource,
        }
    }
}
