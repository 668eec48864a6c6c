//! Reflection data collected while walking the declaration stream.
//!
//! Everything the surrounding engine needs to bind resources and size
//! dispatches lives here, keyed by the bytecode-level `range_id`.

use std::collections::BTreeMap;

use air_dxbc::sm50::{
    GsInputPrimitive, GsOutputTopology, InterpolationMode, SystemName, TessellatorDomain,
    TessellatorOutputPrimitive, TessellatorPartitioning,
};

use crate::ir::PHASE_NONE;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Float,
    Uint,
    Int,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    TextureBuffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMultisampled,
    Texture2DMultisampledArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    /// Raw and structured buffers have no texture dimension.
    NonApplicable,
}

/// A resource binding range as declared in the bytecode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceRange {
    pub range_id: u32,
    pub lower_bound: u32,
    pub size: u32,
    pub space: u32,
}

#[derive(Clone, Debug)]
pub struct SrvInfo {
    pub range: ResourceRange,
    pub scalar_type: ScalarType,
    pub kind: ResourceKind,
    /// `None` for typed resources, 0 for raw buffers.
    pub structure_stride: Option<u32>,
    pub read: bool,
    pub sampled: bool,
    /// Sampled with comparison; lowers to a depth texture.
    pub compared: bool,
}

#[derive(Clone, Debug)]
pub struct UavInfo {
    pub range: ResourceRange,
    pub scalar_type: ScalarType,
    pub kind: ResourceKind,
    pub structure_stride: Option<u32>,
    pub read: bool,
    pub written: bool,
    pub global_coherent: bool,
    pub rasterizer_order: bool,
    pub with_counter: bool,
}

#[derive(Clone, Debug)]
pub struct ConstantBufferInfo {
    pub range: ResourceRange,
    pub size_in_vec4: u32,
}

#[derive(Clone, Debug)]
pub struct SamplerInfo {
    pub range: ResourceRange,
}

#[derive(Clone, Debug)]
pub struct TgsmInfo {
    pub size_in_uint: u32,
    pub size: u32,
    pub stride: u32,
    pub structured: bool,
}

/// Register-file sizes of one hull-shader fork/join phase.
#[derive(Clone, Debug, Default)]
pub struct PhaseInfo {
    pub temp_register_count: u32,
    /// file id -> (register count, component mask).
    pub indexable_temps: BTreeMap<u32, (u32, u32)>,
}

/// Input/output registers declared by the program.
#[derive(Clone, Debug, Default)]
pub struct IoDecl {
    pub reg: u32,
    pub mask: u8,
    pub system_value: Option<SystemName>,
    pub interpolation: Option<InterpolationMode>,
}

#[derive(Clone, Debug, Default)]
pub struct ShaderInfo {
    pub imm_constant_buffer: Vec<[u32; 4]>,
    pub srvs: BTreeMap<u32, SrvInfo>,
    pub uavs: BTreeMap<u32, UavInfo>,
    pub cbuffers: BTreeMap<u32, ConstantBufferInfo>,
    pub samplers: BTreeMap<u32, SamplerInfo>,
    pub tgsm: BTreeMap<u32, TgsmInfo>,

    pub temp_register_count: u32,
    /// file id -> (register count, component mask).
    pub indexable_temps: BTreeMap<u32, (u32, u32)>,
    pub phases: Vec<PhaseInfo>,

    pub inputs: Vec<IoDecl>,
    pub outputs: Vec<IoDecl>,
    pub patch_constants: Vec<IoDecl>,

    /// From `dcl_globalFlags`; defaults to allowed.
    pub refactoring_allowed: bool,
    pub skip_optimization: bool,
    pub force_early_depth_stencil: bool,

    /// Input registers read through pull-mode interpolation (`eval_*`).
    pub pull_mode_reg_mask: u32,
    pub use_samplepos: bool,
    pub use_msad: bool,
    pub use_cmp_exch: bool,

    /// Patch-constant phases read `vocp` registers.
    pub output_control_point_read: bool,
    /// Set when a control-point phase exists; its absence requires the
    /// pass-through output epilogue.
    pub no_control_point_phase_passthrough: bool,
}

impl ShaderInfo {
    pub fn new() -> Self {
        Self {
            refactoring_allowed: true,
            ..Default::default()
        }
    }

    /// Raises the temp register count so that every referenced register
    /// fits; some producers under-report `dcl_temps`.
    pub fn raise_temp_count(&mut self, reg: u32, phase: u32) {
        if phase == PHASE_NONE {
            self.temp_register_count = self.temp_register_count.max(reg + 1);
        } else if let Some(info) = self.phases.get_mut(phase as usize) {
            info.temp_register_count = info.temp_register_count.max(reg + 1);
        }
    }

    pub fn temp_count(&self, phase: u32) -> u32 {
        if phase == PHASE_NONE {
            self.temp_register_count
        } else {
            self.phases
                .get(phase as usize)
                .map(|p| p.temp_register_count)
                .unwrap_or(0)
        }
    }

    pub fn indexable_temps(&self, phase: u32) -> &BTreeMap<u32, (u32, u32)> {
        if phase == PHASE_NONE {
            &self.indexable_temps
        } else {
            &self.phases[phase as usize].indexable_temps
        }
    }
}

/// Per-stage parameters gathered from declarations, handed to the
/// pipeline layer next to the reflection tables.
#[derive(Clone, Debug)]
pub struct StageInfo {
    pub threadgroup_size: [u32; 3],

    pub tessellation_domain: TessellatorDomain,
    pub tessellation_partition: TessellatorPartitioning,
    pub tessellator_output_primitive: TessellatorOutputPrimitive,
    pub max_tessellation_factor: f32,
    pub input_control_point_count: u32,
    pub output_control_point_count: u32,
    pub hull_maximum_threads_per_patch: u32,

    pub gs_input_primitive: GsInputPrimitive,
    pub gs_output_topology: GsOutputTopology,
    pub gs_max_vertex_output: u32,
    pub gs_instance_count: u32,
}

impl Default for StageInfo {
    fn default() -> Self {
        Self {
            threadgroup_size: [1, 1, 1],
            tessellation_domain: TessellatorDomain::Undefined,
            tessellation_partition: TessellatorPartitioning::Undefined,
            tessellator_output_primitive: TessellatorOutputPrimitive::Undefined,
            max_tessellation_factor: 64.0,
            input_control_point_count: 0,
            output_control_point_count: 0,
            hull_maximum_threads_per_patch: 0,
            gs_input_primitive: GsInputPrimitive::Undefined,
            gs_output_topology: GsOutputTopology::Undefined,
            gs_max_vertex_output: 0,
            gs_instance_count: 1,
        }
    }
}
