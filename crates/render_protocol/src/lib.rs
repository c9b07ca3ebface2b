use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

mod backend;
mod events;

pub use backend::{DisposalTarget, GraphicsBackend};
pub use events::{
    AddVertexPayload, BindTexturePayload, BindUniformBlockPayload, BlendMaskPayload, EventKind,
    HandlePayload, OffsetPayload, ProjectionPayload, RectPayload, RenderEvent,
};

slotmap::new_key_type! {
    pub struct TextureId;
    pub struct ShaderId;
    pub struct FrameBufferId;
    pub struct UniformBufferId;
    pub struct VertexBatchId;
}

/// Frame-scoped reference to an object registered with the frame arena.
/// Resolved only during replay; the generation rejects handles that outlive
/// their frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct ResourceHandle {
    pub index: u32,
    pub generation: u32,
}

/// Frame-scoped reference to a byte range in the frame arena's scratch
/// storage. Carries small typed payloads (a vertex, a uniform name) by value
/// across the thread handoff.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct MemoryBlockHandle {
    pub offset: u32,
    pub length: u32,
    pub generation: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct RectI {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RectI {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec2I {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum WrapMode {
    Repeat = 0,
    ClampToEdge = 1,
    MirroredRepeat = 2,
}

impl WrapMode {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Repeat,
            1 => Self::ClampToEdge,
            2 => Self::MirroredRepeat,
            other => panic!("unknown wrap mode value {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PrimitiveTopology {
    Points = 0,
    Lines = 1,
    Triangles = 2,
    TriangleStrip = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CompareFunction {
    Never = 0,
    Less = 1,
    Equal = 2,
    LessOrEqual = 3,
    Greater = 4,
    NotEqual = 5,
    GreaterOrEqual = 6,
    Always = 7,
}

impl CompareFunction {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Never,
            1 => Self::Less,
            2 => Self::Equal,
            3 => Self::LessOrEqual,
            4 => Self::Greater,
            5 => Self::NotEqual,
            6 => Self::GreaterOrEqual,
            7 => Self::Always,
            other => panic!("unknown compare function value {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    SrcColor = 2,
    OneMinusSrcColor = 3,
    DstColor = 4,
    OneMinusDstColor = 5,
    SrcAlpha = 6,
    OneMinusSrcAlpha = 7,
    DstAlpha = 8,
    OneMinusDstAlpha = 9,
}

impl BlendFactor {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Zero,
            1 => Self::One,
            2 => Self::SrcColor,
            3 => Self::OneMinusSrcColor,
            4 => Self::DstColor,
            5 => Self::OneMinusDstColor,
            6 => Self::SrcAlpha,
            7 => Self::OneMinusSrcAlpha,
            8 => Self::DstAlpha,
            9 => Self::OneMinusDstAlpha,
            other => panic!("unknown blend factor value {other}"),
        }
    }
}

/// Blend function parameters, stored raw so the struct stays Pod for the
/// event log. Construct via `new` and read back through the typed accessors.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct BlendParameters {
    pub source_color: u32,
    pub destination_color: u32,
    pub source_alpha: u32,
    pub destination_alpha: u32,
}

impl BlendParameters {
    pub fn new(
        source_color: BlendFactor,
        destination_color: BlendFactor,
        source_alpha: BlendFactor,
        destination_alpha: BlendFactor,
    ) -> Self {
        Self {
            source_color: source_color as u32,
            destination_color: destination_color as u32,
            source_alpha: source_alpha as u32,
            destination_alpha: destination_alpha as u32,
        }
    }

    pub fn source_color(&self) -> BlendFactor {
        BlendFactor::from_raw(self.source_color)
    }

    pub fn destination_color(&self) -> BlendFactor {
        BlendFactor::from_raw(self.destination_color)
    }

    pub fn source_alpha(&self) -> BlendFactor {
        BlendFactor::from_raw(self.source_alpha)
    }

    pub fn destination_alpha(&self) -> BlendFactor {
        BlendFactor::from_raw(self.destination_alpha)
    }
}

/// Per-channel color/alpha write mask.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct BlendMask {
    pub bits: u32,
}

impl BlendMask {
    pub const RED: u32 = 1 << 0;
    pub const GREEN: u32 = 1 << 1;
    pub const BLUE: u32 = 1 << 2;
    pub const ALPHA: u32 = 1 << 3;
    pub const ALL: u32 = Self::RED | Self::GREEN | Self::BLUE | Self::ALPHA;

    pub const fn all() -> Self {
        Self { bits: Self::ALL }
    }

    pub const fn contains(&self, channel: u32) -> bool {
        self.bits & channel != 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct MaskingInfo {
    pub mask_rect: RectI,
    pub border_thickness: f32,
    pub corner_radius: f32,
    pub blend_range: f32,
    pub alpha_exponent: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct DepthInfo {
    pub write_enabled: u32,
    pub function: u32,
}

impl DepthInfo {
    pub fn new(write_enabled: bool, function: CompareFunction) -> Self {
        Self {
            write_enabled: write_enabled as u32,
            function: function as u32,
        }
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled != 0
    }

    pub fn function(&self) -> CompareFunction {
        CompareFunction::from_raw(self.function)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct StencilInfo {
    pub enabled: u32,
    pub function: u32,
    pub reference: i32,
    pub test_mask: u32,
    pub write_mask: u32,
}

impl StencilInfo {
    pub fn new(enabled: bool, function: CompareFunction, reference: i32) -> Self {
        Self {
            enabled: enabled as u32,
            function: function as u32,
            reference,
            test_mask: u32::MAX,
            write_mask: u32::MAX,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled != 0
    }

    pub fn function(&self) -> CompareFunction {
        CompareFunction::from_raw(self.function)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct ClearInfo {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: i32,
}

impl ClearInfo {
    pub const fn color_only(color: [f32; 4]) -> Self {
        Self {
            color,
            depth: 1.0,
            stencil: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayoutId(pub u32);

/// Logical batch key: vertex layout plus primitive topology. Batches with the
/// same identity may still draw separately when other events interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchIdentity {
    pub layout: VertexLayoutId,
    pub topology: PrimitiveTopology,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_parameters_roundtrip_through_raw_fields() {
        let parameters = BlendParameters::new(
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha,
            BlendFactor::One,
            BlendFactor::Zero,
        );
        assert_eq!(parameters.source_color(), BlendFactor::SrcAlpha);
        assert_eq!(parameters.destination_color(), BlendFactor::OneMinusSrcAlpha);
        assert_eq!(parameters.source_alpha(), BlendFactor::One);
        assert_eq!(parameters.destination_alpha(), BlendFactor::Zero);
    }

    #[test]
    fn blend_mask_channel_membership() {
        let mask = BlendMask {
            bits: BlendMask::RED | BlendMask::ALPHA,
        };
        assert!(mask.contains(BlendMask::RED));
        assert!(!mask.contains(BlendMask::GREEN));
        assert!(BlendMask::all().contains(BlendMask::BLUE));
    }

    #[test]
    #[should_panic(expected = "unknown wrap mode value 9")]
    fn wrap_mode_rejects_unknown_raw_value() {
        let _ = WrapMode::from_raw(9);
    }

    #[test]
    fn depth_info_accessors_match_constructor() {
        let depth = DepthInfo::new(true, CompareFunction::LessOrEqual);
        assert!(depth.write_enabled());
        assert_eq!(depth.function(), CompareFunction::LessOrEqual);
    }
}
