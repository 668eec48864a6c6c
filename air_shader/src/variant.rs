//! Variant keys for shader specialization.
//!
//! A single DXBC shader lowers into multiple AIR functions; the variant
//! key carries the small set of pipeline parameters each one is
//! specialized against.

use std::fmt::{self, Display, Formatter};

/// Stable identity of another shader participating in the pipeline.
pub type ShaderHandle = u64;

/// Identity of an input layout state object.
pub type InputLayoutHandle = u64;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum IndexBufferFormat {
    #[default]
    None,
    Uint16,
    Uint32,
}

/// Which vertex output registers a pass-through geometry stage copies.
/// The sentinel means the shader is a real geometry shader.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GsPassthrough(pub u32);

impl GsPassthrough {
    pub const NOT_PASSTHROUGH: Self = Self(!0);

    pub fn is_passthrough(self) -> bool {
        self != Self::NOT_PASSTHROUGH
    }
}

impl Default for GsPassthrough {
    fn default() -> Self {
        Self::NOT_PASSTHROUGH
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum GsStripTopology {
    #[default]
    Point,
    Line,
    Triangle,
}

/// Tessellation factor quantized to its bit pattern so variant keys can
/// be hashed and compared exactly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TessFactor(u32);

impl TessFactor {
    pub fn new(factor: f32) -> Self {
        Self(factor.to_bits())
    }

    pub fn get(self) -> f32 {
        f32::from_bits(self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderVariant {
    /// Plain entry for a stage without cross-stage specialization
    /// (standalone VS, PS with default knobs, CS).
    Default,
    /// Vertex stage feeding the tessellation (object) pipeline.
    VertexTessellation {
        input_layout: InputLayoutHandle,
        hull_shader: ShaderHandle,
        index_buffer_format: IndexBufferFormat,
        max_tess_factor: TessFactor,
    },
    /// Vertex stage feeding an emulated geometry pipeline.
    VertexGeometry {
        input_layout: InputLayoutHandle,
        index_buffer_format: IndexBufferFormat,
        strip_topology: GsStripTopology,
    },
    /// Plain vertex stage specialized against an input layout.
    Vertex {
        input_layout: InputLayoutHandle,
    },
    Geometry {
        vertex_shader: ShaderHandle,
        strip_topology: GsStripTopology,
        /// Non-sentinel when the shader only re-emits its inputs; the
        /// emitter then produces a mesh-stage copy helper instead of
        /// lowering EMIT/CUT.
        passthrough: GsPassthrough,
    },
    Hull {
        vertex_shader: ShaderHandle,
    },
    Domain {
        hull_shader: ShaderHandle,
        gs_passthrough: GsPassthrough,
        max_tess_factor: TessFactor,
    },
    Pixel {
        sample_mask: u32,
        dual_source_blending: bool,
        disable_depth_output: bool,
        /// Render targets with unorm8 formats get a saturating clamp to
        /// match D3D11 blending precision.
        unorm_output_mask: u8,
    },
}

impl ShaderVariant {
    /// Stable suffix distinguishing the emitted function names of one
    /// module.
    pub fn name_suffix(&self) -> String {
        match self {
            Self::Default => String::new(),
            other => {
                use std::collections::hash_map::DefaultHasher;
                use std::hash::{Hash, Hasher};
                let mut hasher = DefaultHasher::new();
                other.hash(&mut hasher);
                format!("_{:08x}", hasher.finish() as u32)
            }
        }
    }
}

impl Display for ShaderVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::VertexTessellation { .. } => write!(f, "vertex_tessellation"),
            Self::VertexGeometry { .. } => write!(f, "vertex_geometry"),
            Self::Vertex { .. } => write!(f, "vertex"),
            Self::Geometry { .. } => write!(f, "geometry"),
            Self::Hull { .. } => write!(f, "hull"),
            Self::Domain { .. } => write!(f, "domain"),
            Self::Pixel { .. } => write!(f, "pixel"),
        }
    }
}

impl Default for ShaderVariant {
    fn default() -> Self {
        Self::Default
    }
}
