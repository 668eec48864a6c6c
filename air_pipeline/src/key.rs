//! Pipeline fingerprints.
//!
//! Blend state enters the key in a *normalized* form so that derived
//! `Eq`/`Hash` compare behavior, not object identity: with independent
//! blending off only target 0 survives, and factor/op fields of
//! disabled targets are reset to their defaults.

use air_shader::variant::{
    GsPassthrough, GsStripTopology, IndexBufferFormat, ShaderVariant, TessFactor,
};

use crate::shader_id::ShaderId;

pub const MAX_RENDER_TARGETS: usize = 8;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    #[default]
    Invalid,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rg11B10Float,
    Rgba32Float,
    R32Uint,
    Depth32Float,
    Depth32FloatStencil8,
    Depth16Unorm,
}

impl PixelFormat {
    pub const fn is_unorm8(self) -> bool {
        matches!(
            self,
            Self::Rgba8Unorm | Self::Rgba8UnormSrgb | Self::Bgra8Unorm | Self::Bgra8UnormSrgb
        )
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TopologyClass {
    Point,
    Line,
    #[default]
    Triangle,
    Patch,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
    DestColor,
    InvDestColor,
    SrcAlphaSaturate,
    BlendFactor,
    InvBlendFactor,
    Src1Color,
    InvSrc1Color,
    Src1Alpha,
    InvSrc1Alpha,
}

impl BlendFactor {
    pub const fn is_dual_source(self) -> bool {
        matches!(
            self,
            Self::Src1Color | Self::InvSrc1Color | Self::Src1Alpha | Self::InvSrc1Alpha
        )
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LogicOp {
    #[default]
    Clear,
    Set,
    Copy,
    CopyInverted,
    Noop,
    Invert,
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Equiv,
    AndReverse,
    AndInverted,
    OrReverse,
    OrInverted,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlendTargetDesc {
    pub blend_enable: bool,
    pub logic_op_enable: bool,
    pub src_blend: BlendFactor,
    pub dest_blend: BlendFactor,
    pub blend_op: BlendOp,
    pub src_blend_alpha: BlendFactor,
    pub dest_blend_alpha: BlendFactor,
    pub blend_op_alpha: BlendOp,
    pub logic_op: LogicOp,
    pub write_mask: u8,
}

impl Default for BlendTargetDesc {
    fn default() -> Self {
        Self {
            blend_enable: false,
            logic_op_enable: false,
            src_blend: BlendFactor::One,
            dest_blend: BlendFactor::Zero,
            blend_op: BlendOp::Add,
            src_blend_alpha: BlendFactor::One,
            dest_blend_alpha: BlendFactor::Zero,
            blend_op_alpha: BlendOp::Add,
            logic_op: LogicOp::Noop,
            write_mask: 0xF,
        }
    }
}

impl BlendTargetDesc {
    /// Clears every field whose enable bit is off, so equal behavior
    /// yields equal values.
    fn normalized(mut self) -> Self {
        if !self.blend_enable {
            self.src_blend = BlendFactor::One;
            self.dest_blend = BlendFactor::Zero;
            self.blend_op = BlendOp::Add;
            self.src_blend_alpha = BlendFactor::One;
            self.dest_blend_alpha = BlendFactor::Zero;
            self.blend_op_alpha = BlendOp::Add;
        }
        if !self.logic_op_enable {
            self.logic_op = LogicOp::Noop;
        }
        self
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    pub alpha_to_coverage: bool,
    pub independent_blend: bool,
    pub targets: [BlendTargetDesc; MAX_RENDER_TARGETS],
}

impl BlendDesc {
    fn normalized(&self, num_color_attachments: u32) -> Self {
        let mut out = *self;
        let live = if self.independent_blend {
            (num_color_attachments as usize).min(MAX_RENDER_TARGETS)
        } else {
            1
        };
        for (i, target) in out.targets.iter_mut().enumerate() {
            *target = if i < live {
                target.normalized()
            } else {
                BlendTargetDesc::default()
            };
        }
        out
    }

    pub fn uses_dual_source(&self) -> bool {
        let target = &self.targets[0];
        target.blend_enable
            && (target.src_blend.is_dual_source()
                || target.dest_blend.is_dual_source()
                || target.src_blend_alpha.is_dual_source()
                || target.dest_blend_alpha.is_dual_source())
    }
}

/// Everything the runtime knows when it asks for a graphics pipeline.
#[derive(Clone, Debug)]
pub struct GraphicsPipelineDesc {
    pub vertex_shader: ShaderId,
    pub hull_shader: Option<ShaderId>,
    pub domain_shader: Option<ShaderId>,
    pub geometry_shader: Option<ShaderId>,
    pub pixel_shader: Option<ShaderId>,
    pub input_layout: u64,
    pub blend_state: BlendDesc,
    pub num_color_attachments: u32,
    pub color_attachment_formats: [PixelFormat; MAX_RENDER_TARGETS],
    pub depth_stencil_format: PixelFormat,
    pub rasterization_enabled: bool,
    pub sample_mask: u32,
    pub sample_count: u32,
    pub index_buffer_format: IndexBufferFormat,
    pub topology_class: TopologyClass,
    pub gs_strip_topology: GsStripTopology,
    pub gs_passthrough: GsPassthrough,
    pub max_tess_factor: f32,
}

impl Default for GraphicsPipelineDesc {
    fn default() -> Self {
        Self {
            vertex_shader: ShaderId::NULL,
            hull_shader: None,
            domain_shader: None,
            geometry_shader: None,
            pixel_shader: None,
            input_layout: 0,
            blend_state: BlendDesc::default(),
            num_color_attachments: 0,
            color_attachment_formats: [PixelFormat::Invalid; MAX_RENDER_TARGETS],
            depth_stencil_format: PixelFormat::Invalid,
            rasterization_enabled: true,
            sample_mask: u32::MAX,
            sample_count: 1,
            index_buffer_format: IndexBufferFormat::None,
            topology_class: TopologyClass::Triangle,
            gs_strip_topology: GsStripTopology::Triangle,
            gs_passthrough: GsPassthrough::NOT_PASSTHROUGH,
            max_tess_factor: 64.0,
        }
    }
}

/// Canonical fingerprint of a graphics pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineKey {
    vertex_shader: ShaderId,
    hull_shader: Option<ShaderId>,
    domain_shader: Option<ShaderId>,
    geometry_shader: Option<ShaderId>,
    pixel_shader: Option<ShaderId>,
    input_layout: u64,
    blend_state: BlendDesc,
    num_color_attachments: u32,
    color_attachment_formats: [PixelFormat; MAX_RENDER_TARGETS],
    depth_stencil_format: PixelFormat,
    rasterization_enabled: bool,
    sample_mask: u32,
    sample_count: u32,
    index_buffer_format: IndexBufferFormat,
    topology_class: TopologyClass,
    gs_strip_topology: GsStripTopology,
    gs_passthrough: GsPassthrough,
    max_tess_factor: TessFactor,
}

impl GraphicsPipelineKey {
    pub fn new(desc: &GraphicsPipelineDesc) -> Self {
        let mut color_attachment_formats = [PixelFormat::Invalid; MAX_RENDER_TARGETS];
        let live = (desc.num_color_attachments as usize).min(MAX_RENDER_TARGETS);
        color_attachment_formats[..live].copy_from_slice(&desc.color_attachment_formats[..live]);

        Self {
            vertex_shader: desc.vertex_shader,
            hull_shader: desc.hull_shader,
            domain_shader: desc.domain_shader,
            geometry_shader: desc.geometry_shader,
            pixel_shader: desc.pixel_shader,
            input_layout: desc.input_layout,
            blend_state: desc.blend_state.normalized(desc.num_color_attachments),
            num_color_attachments: desc.num_color_attachments,
            color_attachment_formats,
            depth_stencil_format: desc.depth_stencil_format,
            rasterization_enabled: desc.rasterization_enabled,
            sample_mask: desc.sample_mask,
            sample_count: desc.sample_count,
            index_buffer_format: desc.index_buffer_format,
            topology_class: desc.topology_class,
            gs_strip_topology: desc.gs_strip_topology,
            gs_passthrough: desc.gs_passthrough,
            max_tess_factor: TessFactor::new(desc.max_tess_factor),
        }
    }

    /// The exact shader-variant set a compile of this key consumes.
    pub fn stage_variants(&self) -> StageVariants {
        let unorm_output_mask = {
            let mut mask = 0u8;
            for (i, format) in self
                .color_attachment_formats
                .iter()
                .enumerate()
                .take(self.num_color_attachments as usize)
            {
                if format.is_unorm8() {
                    mask |= 1 << i;
                }
            }
            mask
        };
        let pixel = self.pixel_shader.map(|_| ShaderVariant::Pixel {
            sample_mask: self.sample_mask,
            dual_source_blending: self.blend_state.uses_dual_source(),
            disable_depth_output: self.depth_stencil_format == PixelFormat::Invalid,
            unorm_output_mask,
        });

        match (self.hull_shader, self.domain_shader, self.geometry_shader) {
            (Some(hull), Some(domain), _) => StageVariants {
                vertex: ShaderVariant::VertexTessellation {
                    input_layout: self.input_layout,
                    hull_shader: hull.to_raw(),
                    index_buffer_format: self.index_buffer_format,
                    max_tess_factor: self.max_tess_factor,
                },
                hull: Some((
                    hull,
                    ShaderVariant::Hull {
                        vertex_shader: self.vertex_shader.to_raw(),
                    },
                )),
                domain: Some((
                    domain,
                    ShaderVariant::Domain {
                        hull_shader: hull.to_raw(),
                        gs_passthrough: self.gs_passthrough,
                        max_tess_factor: self.max_tess_factor,
                    },
                )),
                geometry: None,
                pixel,
            },
            (_, _, Some(geometry)) => StageVariants {
                vertex: ShaderVariant::VertexGeometry {
                    input_layout: self.input_layout,
                    index_buffer_format: self.index_buffer_format,
                    strip_topology: self.gs_strip_topology,
                },
                hull: None,
                domain: None,
                geometry: Some((
                    geometry,
                    ShaderVariant::Geometry {
                        vertex_shader: self.vertex_shader.to_raw(),
                        strip_topology: self.gs_strip_topology,
                        passthrough: self.gs_passthrough,
                    },
                )),
                pixel,
            },
            _ => StageVariants {
                vertex: ShaderVariant::Vertex {
                    input_layout: self.input_layout,
                },
                hull: None,
                domain: None,
                geometry: None,
                pixel,
            },
        }
    }

    pub fn vertex_shader(&self) -> ShaderId {
        self.vertex_shader
    }
}

/// Variant selection for each participating stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageVariants {
    pub vertex: ShaderVariant,
    pub hull: Option<(ShaderId, ShaderVariant)>,
    pub domain: Option<(ShaderId, ShaderVariant)>,
    pub geometry: Option<(ShaderId, ShaderVariant)>,
    pub pixel: Option<ShaderVariant>,
}

#[derive(Clone, Debug, Default)]
pub struct ComputePipelineDesc {
    pub compute_shader: ShaderId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComputePipelineKey {
    compute_shader: ShaderId,
}

impl ComputePipelineKey {
    pub fn new(desc: &ComputePipelineDesc) -> Self {
        Self {
            compute_shader: desc.compute_shader,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use air_shader::variant::ShaderVariant;

    use super::{
        BlendDesc, BlendFactor, BlendOp, GraphicsPipelineDesc, GraphicsPipelineKey, PixelFormat,
        TopologyClass,
    };
    use crate::shader_id::ShaderId;

    fn hash_of(key: &GraphicsPipelineKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn base_desc() -> GraphicsPipelineDesc {
        GraphicsPipelineDesc {
            vertex_shader: ShaderId::from_bytes(b"vs"),
            pixel_shader: Some(ShaderId::from_bytes(b"ps")),
            num_color_attachments: 1,
            color_attachment_formats: {
                let mut formats = [PixelFormat::Invalid; 8];
                formats[0] = PixelFormat::Bgra8Unorm;
                formats
            },
            ..Default::default()
        }
    }

    #[test]
    fn equivalent_blend_states_produce_equal_keys() {
        let mut a = base_desc();
        let mut b = base_desc();

        // Disabled blending: the factors must not matter.
        a.blend_state.targets[0].blend_enable = false;
        a.blend_state.targets[0].src_blend = BlendFactor::SrcAlpha;
        b.blend_state.targets[0].blend_enable = false;
        b.blend_state.targets[0].src_blend = BlendFactor::DestColor;

        // With independent blending off, targets beyond 0 must not
        // matter either.
        a.blend_state.targets[3].blend_op = BlendOp::Max;
        b.blend_state.targets[3].blend_op = BlendOp::Min;

        let ka = GraphicsPipelineKey::new(&a);
        let kb = GraphicsPipelineKey::new(&b);
        assert_eq!(ka, kb);
        assert_eq!(hash_of(&ka), hash_of(&kb));
    }

    #[test]
    fn enabled_blend_factors_are_significant() {
        let mut a = base_desc();
        let mut b = base_desc();
        a.blend_state.targets[0].blend_enable = true;
        a.blend_state.targets[0].src_blend = BlendFactor::SrcAlpha;
        b.blend_state.targets[0].blend_enable = true;
        b.blend_state.targets[0].src_blend = BlendFactor::DestColor;

        assert_ne!(GraphicsPipelineKey::new(&a), GraphicsPipelineKey::new(&b));
    }

    #[test]
    fn key_is_pure_function_of_options() {
        let desc = base_desc();
        assert_eq!(
            GraphicsPipelineKey::new(&desc),
            GraphicsPipelineKey::new(&desc.clone())
        );
    }

    #[test]
    fn attachment_formats_beyond_count_are_ignored() {
        let mut a = base_desc();
        let mut b = base_desc();
        a.color_attachment_formats[5] = PixelFormat::Rgba16Float;
        b.color_attachment_formats[5] = PixelFormat::R32Uint;
        assert_eq!(GraphicsPipelineKey::new(&a), GraphicsPipelineKey::new(&b));
    }

    #[test]
    fn tessellation_variants() {
        let mut desc = base_desc();
        let hull = ShaderId::from_bytes(b"hs");
        let domain = ShaderId::from_bytes(b"ds");
        desc.hull_shader = Some(hull);
        desc.domain_shader = Some(domain);
        desc.topology_class = TopologyClass::Patch;
        desc.index_buffer_format = air_shader::variant::IndexBufferFormat::Uint16;
        desc.max_tess_factor = 16.0;

        let key = GraphicsPipelineKey::new(&desc);
        let variants = key.stage_variants();

        match variants.vertex {
            ShaderVariant::VertexTessellation {
                hull_shader,
                index_buffer_format,
                max_tess_factor,
                ..
            } => {
                assert_eq!(hull_shader, hull.to_raw());
                assert_eq!(
                    index_buffer_format,
                    air_shader::variant::IndexBufferFormat::Uint16
                );
                assert_eq!(max_tess_factor.get(), 16.0);
            }
            other => panic!("unexpected vertex variant {other:?}"),
        }
        let (hull_id, hull_variant) = variants.hull.unwrap();
        assert_eq!(hull_id, hull);
        assert_eq!(
            hull_variant,
            ShaderVariant::Hull {
                vertex_shader: desc.vertex_shader.to_raw()
            }
        );
        assert!(variants.domain.is_some());
        assert!(variants.geometry.is_none());
        match variants.pixel.unwrap() {
            ShaderVariant::Pixel {
                sample_mask,
                dual_source_blending,
                unorm_output_mask,
                ..
            } => {
                assert_eq!(sample_mask, u32::MAX);
                assert!(!dual_source_blending);
                assert_eq!(unorm_output_mask, 0b1);
            }
            other => panic!("unexpected pixel variant {other:?}"),
        }
    }

    #[test]
    fn dual_source_detection() {
        let mut desc = base_desc();
        desc.blend_state.targets[0].blend_enable = true;
        desc.blend_state.targets[0].src_blend = BlendFactor::Src1Color;
        assert!(desc.blend_state.uses_dual_source());
        assert!(!BlendDesc::default().uses_dual_source());
    }
}
