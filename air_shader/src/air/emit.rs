//! Walks the block graph in reverse post order and emits one AIR
//! function per requested variant.
//!
//! Register files become allocas; the downstream compiler promotes them
//! to SSA. Resource accesses lower to `air.*` intrinsics with argument
//! bindings recorded in function metadata, one table entry per
//! `range_id`.

use air_dxbc::sm50::ProgramType;
use hashbrown::HashMap;

use crate::air::builder::{const_v4i32, float_constant, FunctionBuilder, ModuleBuilder};
use crate::cfg::{BlockKey, ShaderProgram, Terminator};
use crate::ir::{
    AtomicBinaryOp, AtomicDst, AtomicUavDst, Condition, ConversionOp, DataType, DstOperand,
    FloatBinaryOp, FloatComparison, FloatUnaryOp, InputAttribute, InstCommon, Instruction,
    IntegerBinaryOp, IntegerBinaryOpWithTwoDst, IntegerComparison, IntegerUnaryOp, OperandIndex,
    ResInfoModifier, SamplerRef, SrcOperand, SrvOrUav, SrvRef, Swizzle, TgsmRef, TypelessSrc,
    UavBoundary, UavRef, PHASE_NONE,
};
use crate::reflect::ResourceKind;
use crate::variant::ShaderVariant;
use crate::{Error, IoSignatures};

#[derive(Clone, Debug)]
pub struct EmitOptions {
    pub fast_math: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self { fast_math: true }
    }
}

/// Emits the function for `variant` into `module`.
pub fn emit_program(
    module: &mut ModuleBuilder,
    program: &ShaderProgram,
    signatures: &IoSignatures,
    variant: &ShaderVariant,
    options: &EmitOptions,
) -> Result<(), Error> {
    let stage = FunctionStage::select(program.program_type, variant)?;
    let name = format!("{}{}", stage.entry_name(), variant.name_suffix());

    let mut emitter = Emitter {
        module,
        f: FunctionBuilder::new(name.clone(), "void"),
        program,
        signatures,
        variant,
        options,
        stage,
        temps: String::new(),
        phase_temps: Vec::new(),
        indexable: HashMap::new(),
        inputs: String::new(),
        outputs: String::new(),
        depth_out: None,
        coverage_out: None,
        attributes: HashMap::new(),
        cb_args: HashMap::new(),
        srv_args: HashMap::new(),
        srv_size_args: HashMap::new(),
        uav_args: HashMap::new(),
        uav_size_args: HashMap::new(),
        uav_counter_args: HashMap::new(),
        sampler_args: HashMap::new(),
        tgsm_globals: HashMap::new(),
        icb_global: None,
        control_points: None,
        patch_constants: None,
        payload: None,
        blocks: HashMap::new(),
        arg_metadata: Vec::new(),
        function_name: name,
    };

    emitter.run()
}

/// Metal stage a variant lowers into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionStage {
    Vertex,
    /// Vertex stage writing into a buffer for a downstream
    /// tessellation or geometry expansion pass.
    VertexObject,
    Fragment,
    Kernel,
    /// Hull shaders run in the object stage of the mesh pipeline.
    HullObject,
    /// Domain shaders run in the mesh stage.
    DomainMesh,
    GeometryObject,
    /// Pass-through geometry expansion without EMIT/CUT handling.
    GeometryMeshPassthrough,
}

impl FunctionStage {
    fn select(program_type: ProgramType, variant: &ShaderVariant) -> Result<Self, Error> {
        let stage = match (program_type, variant) {
            (ProgramType::Vertex, ShaderVariant::VertexTessellation { .. })
            | (ProgramType::Vertex, ShaderVariant::VertexGeometry { .. }) => Self::VertexObject,
            (ProgramType::Vertex, _) => Self::Vertex,
            (ProgramType::Pixel, _) => Self::Fragment,
            (ProgramType::Compute, _) => Self::Kernel,
            (ProgramType::Hull, _) => Self::HullObject,
            (ProgramType::Domain, _) => Self::DomainMesh,
            (ProgramType::Geometry, ShaderVariant::Geometry { passthrough, .. })
                if passthrough.is_passthrough() =>
            {
                Self::GeometryMeshPassthrough
            }
            (ProgramType::Geometry, _) => Self::GeometryObject,
        };
        Ok(stage)
    }

    fn entry_name(self) -> &'static str {
        match self {
            Self::Vertex => "shader_main_vertex",
            Self::VertexObject => "shader_main_vertex_object",
            Self::Fragment => "shader_main_fragment",
            Self::Kernel => "shader_main_kernel",
            Self::HullObject => "shader_main_hull",
            Self::DomainMesh => "shader_main_domain",
            Self::GeometryObject => "shader_main_geometry",
            Self::GeometryMeshPassthrough => "shader_main_geometry_passthrough",
        }
    }

    fn air_stage(self) -> &'static str {
        match self {
            Self::Vertex => "air.vertex",
            Self::VertexObject | Self::HullObject | Self::GeometryObject => "air.object",
            Self::Fragment => "air.fragment",
            Self::Kernel => "air.kernel",
            Self::DomainMesh | Self::GeometryMeshPassthrough => "air.mesh",
        }
    }
}

struct Emitter<'a> {
    module: &'a mut ModuleBuilder,
    f: FunctionBuilder,
    program: &'a ShaderProgram,
    signatures: &'a IoSignatures,
    variant: &'a ShaderVariant,
    options: &'a EmitOptions,
    stage: FunctionStage,

    temps: String,
    phase_temps: Vec<String>,
    /// (phase, file) -> (alloca, register count).
    indexable: HashMap<(u32, u32), String>,
    inputs: String,
    outputs: String,
    depth_out: Option<String>,
    coverage_out: Option<String>,
    attributes: HashMap<InputAttribute, String>,

    cb_args: HashMap<u32, String>,
    srv_args: HashMap<u32, String>,
    srv_size_args: HashMap<u32, String>,
    uav_args: HashMap<u32, String>,
    uav_size_args: HashMap<u32, String>,
    uav_counter_args: HashMap<u32, String>,
    sampler_args: HashMap<u32, String>,
    tgsm_globals: HashMap<u32, String>,
    icb_global: Option<String>,
    /// Input control points (hull input / domain control points).
    control_points: Option<String>,
    /// Patch constants seen by the domain stage.
    patch_constants: Option<String>,
    /// Tessellation payload pointer for object/mesh linkage.
    payload: Option<String>,

    blocks: HashMap<BlockKey, usize>,
    arg_metadata: Vec<u32>,
    function_name: String,
}

const INPUT_REGISTER_FILE: u32 = 32;
const OUTPUT_REGISTER_FILE: u32 = 32;
const MAX_CONTROL_POINTS: u32 = 32;
/// Rows in the hull staging area: per-control-point outputs plus one
/// trailing region for patch constants.
const HULL_STAGING_ROWS: u32 = (MAX_CONTROL_POINTS + 1) * OUTPUT_REGISTER_FILE;

impl Emitter<'_> {
    fn run(mut self) -> Result<(), Error> {
        self.declare_parameters();
        if self.stage == FunctionStage::GeometryMeshPassthrough {
            // The shader body never runs; the helper copies the
            // recorded vertex outputs straight into the strip.
            self.emit_passthrough_body();
        } else {
            self.emit_prologue();
            self.emit_blocks()?;
        }
        self.emit_metadata();

        let Emitter { module, f, .. } = self;
        module.push_function(f);
        Ok(())
    }

    fn fast(&self, common: &InstCommon) -> &'static str {
        // Precise bits disable contraction and reassociation.
        if self.options.fast_math && common.precise_mask == 0 {
            "fast "
        } else {
            ""
        }
    }

    // ---- Function interface -------------------------------------------------

    fn declare_parameters(&mut self) {
        match self.stage {
            FunctionStage::Vertex | FunctionStage::VertexObject => {
                let v = self.f.param("i32", "vertex_id");
                let node = self.metadata_arg("air.vertex_id", "uint");
                self.arg_metadata.push(node);
                self.attributes.insert(InputAttribute::VertexId, v);
                let v = self.f.param("i32", "instance_id");
                let node = self.metadata_arg("air.instance_id", "uint");
                self.arg_metadata.push(node);
                self.attributes.insert(InputAttribute::InstanceId, v);
                if self.stage == FunctionStage::VertexObject {
                    let v = self.f.param("ptr addrspace(1)", "vertex_output");
                    let node = self.metadata_arg("air.buffer", "vertex_output");
                    self.arg_metadata.push(node);
                    self.payload = Some(v);
                }
            }
            FunctionStage::Fragment => {
                let _position = self.f.param("<4 x float>", "frag_coord");
                let node = self.metadata_arg("air.position", "float4");
                self.arg_metadata.push(node);
                let primitive = self.f.param("i32", "primitive_id");
                let node = self.metadata_arg("air.primitive_id", "uint");
                self.arg_metadata.push(node);
                self.attributes
                    .insert(InputAttribute::PrimitiveId, primitive);
                let mask = self.f.param("i32", "sample_mask_in");
                let node = self.metadata_arg("air.sample_mask_in", "uint");
                self.arg_metadata.push(node);
                self.attributes.insert(InputAttribute::CoverageMask, mask);
            }
            FunctionStage::Kernel
            | FunctionStage::HullObject
            | FunctionStage::GeometryObject => {
                let groups = [
                    (InputAttribute::ThreadId, "thread_position_in_grid"),
                    (
                        InputAttribute::ThreadIdInGroup,
                        "thread_position_in_threadgroup",
                    ),
                    (InputAttribute::ThreadGroupId, "threadgroup_position_in_grid"),
                    (
                        InputAttribute::ThreadIdInGroupFlattened,
                        "thread_index_in_threadgroup",
                    ),
                ];
                for (attribute, name) in groups {
                    let ty = if matches!(
                        attribute,
                        InputAttribute::ThreadIdInGroupFlattened
                    ) {
                        "i32"
                    } else {
                        "<3 x i32>"
                    };
                    let v = self.f.param(ty, name);
                    let node = self.metadata_arg(&format!("air.{name}"), "uint3");
                    self.arg_metadata.push(node);
                    self.attributes.insert(attribute, v);
                }
                if self.stage != FunctionStage::Kernel {
                    let v = self.f.param("ptr addrspace(1)", "payload");
                    let node = self.metadata_arg("air.buffer", "payload");
                    self.arg_metadata.push(node);
                    self.payload = Some(v.clone());
                    self.control_points = Some(v);
                }
            }
            FunctionStage::DomainMesh | FunctionStage::GeometryMeshPassthrough => {
                let v = self.f.param("<3 x float>", "position_in_patch");
                let node = self.metadata_arg("air.position_in_patch", "float3");
                self.arg_metadata.push(node);
                self.attributes.insert(InputAttribute::DomainPoint, v);
                let p = self.f.param("ptr addrspace(1)", "payload");
                let node = self.metadata_arg("air.payload", "payload");
                self.arg_metadata.push(node);
                self.payload = Some(p.clone());
                self.control_points = Some(p.clone());
                self.patch_constants = Some(p);
                let tid = self.f.param("i32", "thread_index_in_threadgroup");
                let node = self.metadata_arg("air.thread_index_in_threadgroup", "uint");
                self.arg_metadata.push(node);
                self.attributes
                    .insert(InputAttribute::ThreadIdInGroupFlattened, tid);
            }
        }

        // Hull-shader instance builtins share the flattened thread
        // index inside the patch group.
        if self.stage == FunctionStage::HullObject {
            if let Some(tid) = self
                .attributes
                .get(&InputAttribute::ThreadIdInGroupFlattened)
                .cloned()
            {
                self.attributes
                    .insert(InputAttribute::OutputControlPointId, tid.clone());
                self.attributes
                    .insert(InputAttribute::ForkInstanceId, tid.clone());
                self.attributes.insert(InputAttribute::JoinInstanceId, tid);
            }
        }
        if self.stage == FunctionStage::GeometryObject {
            if let Some(tid) = self
                .attributes
                .get(&InputAttribute::ThreadIdInGroupFlattened)
                .cloned()
            {
                self.attributes.insert(InputAttribute::GsInstanceId, tid);
            }
            let v = self.f.param("i32", "primitive_id");
            let node = self.metadata_arg("air.primitive_id", "uint");
            self.arg_metadata.push(node);
            self.attributes.insert(InputAttribute::PrimitiveId, v);
        }

        // Stage input registers become attribute parameters on the
        // render stages; compute-like stages read them from buffers.
        if matches!(self.stage, FunctionStage::Vertex | FunctionStage::VertexObject) {
            let elements: Vec<(u32, String)> = self
                .signatures
                .input
                .as_ref()
                .map(|sig| {
                    sig.elements
                        .iter()
                        .map(|e| (e.register, format!("{}{}", e.semantic, e.semantic_index)))
                        .collect()
                })
                .unwrap_or_else(|| {
                    self.program
                        .info
                        .inputs
                        .iter()
                        .map(|d| (d.reg, format!("ATTRIBUTE{}", d.reg)))
                        .collect()
                });
            for (register, semantic) in elements {
                let v = self.f.param("<4 x float>", format!("in{register}"));
                let node = self.module.metadata(format!(
                    "!{{i32 {register}, !\"air.vertex_input\", !\"air.location_index\", i32 {register}, !\"air.arg_name\", !\"{semantic}\"}}"
                ));
                self.arg_metadata.push(node);
                let _ = v;
            }
        }
        if self.stage == FunctionStage::Fragment {
            for decl in &self.program.info.inputs {
                let register = decl.reg;
                // Pull-mode registers are materialized through the
                // interpolant intrinsics instead.
                let pull = self.program.info.pull_mode_reg_mask & (1 << register) != 0;
                let semantic = self
                    .signatures
                    .input
                    .as_ref()
                    .and_then(|sig| sig.find_register(register))
                    .map(|e| format!("{}{}", e.semantic, e.semantic_index))
                    .unwrap_or_else(|| format!("TEXCOORD{register}"));
                let ty = if pull {
                    "ptr".to_string()
                } else {
                    "<4 x float>".to_string()
                };
                let v = self.f.param(ty, format!("in{register}"));
                let kind = if pull {
                    "air.fragment_input_interpolant"
                } else {
                    "air.fragment_input"
                };
                let node = self.module.metadata(format!(
                    "!{{i32 {register}, !\"{kind}\", !\"air.arg_name\", !\"{semantic}\"}}"
                ));
                self.arg_metadata.push(node);
                let _ = v;
            }
        }

        // Resource bindings, one argument-table slot per range id.
        let info = &self.program.info;
        for (&id, cb) in &info.cbuffers {
            let v = self.f.param("ptr addrspace(2)", format!("cb{id}"));
            let node = self.module.metadata(format!(
                "!{{i32 {id}, !\"air.buffer\", !\"air.location_index\", i32 {id}, !\"air.read\", !\"air.address_space\", i32 2, !\"air.arg_type_size\", i32 {}, !\"air.arg_name\", !\"cb{id}\"}}",
                cb.size_in_vec4 * 16
            ));
            self.arg_metadata.push(node);
            self.cb_args.insert(id, v);
        }
        for (&id, srv) in &info.srvs {
            if srv.kind == ResourceKind::NonApplicable {
                let v = self.f.param("ptr addrspace(1)", format!("t{id}"));
                let node = self.module.metadata(format!(
                    "!{{i32 {id}, !\"air.buffer\", !\"air.location_index\", i32 {id}, !\"air.read\", !\"air.address_space\", i32 1, !\"air.arg_name\", !\"t{id}\"}}"
                ));
                self.arg_metadata.push(node);
                self.srv_args.insert(id, v);
                let v = self.f.param("i32", format!("t{id}_size"));
                let node = self.module.metadata(format!(
                    "!{{i32 {id}, !\"air.buffer_size\", !\"air.arg_name\", !\"t{id}_size\"}}"
                ));
                self.arg_metadata.push(node);
                self.srv_size_args.insert(id, v);
            } else {
                let texture_kind = texture_type_name(srv.kind, srv.compared);
                let v = self.f.param("ptr", format!("t{id}"));
                let node = self.module.metadata(format!(
                    "!{{i32 {id}, !\"air.texture\", !\"air.location_index\", i32 {id}, !\"air.read\", !\"air.arg_type_name\", !\"{texture_kind}\", !\"air.arg_name\", !\"t{id}\"}}"
                ));
                self.arg_metadata.push(node);
                self.srv_args.insert(id, v);
            }
        }
        for (&id, uav) in &info.uavs {
            let access = match (uav.read, uav.written) {
                (true, true) | (false, false) => "air.read_write",
                (true, false) => "air.read",
                (false, true) => "air.write",
            };
            if uav.kind == ResourceKind::NonApplicable {
                let v = self.f.param("ptr addrspace(1)", format!("u{id}"));
                let node = self.module.metadata(format!(
                    "!{{i32 {id}, !\"air.buffer\", !\"air.location_index\", i32 {id}, !\"{access}\", !\"air.address_space\", i32 1, !\"air.arg_name\", !\"u{id}\"}}"
                ));
                self.arg_metadata.push(node);
                self.uav_args.insert(id, v);
                let v = self.f.param("i32", format!("u{id}_size"));
                let node = self.module.metadata(format!(
                    "!{{i32 {id}, !\"air.buffer_size\", !\"air.arg_name\", !\"u{id}_size\"}}"
                ));
                self.arg_metadata.push(node);
                self.uav_size_args.insert(id, v);
            } else {
                let texture_kind = texture_type_name(uav.kind, false);
                let v = self.f.param("ptr", format!("u{id}"));
                let node = self.module.metadata(format!(
                    "!{{i32 {id}, !\"air.texture\", !\"air.location_index\", i32 {id}, !\"{access}\", !\"air.arg_type_name\", !\"{texture_kind}\", !\"air.arg_name\", !\"u{id}\"}}"
                ));
                self.arg_metadata.push(node);
                self.uav_args.insert(id, v);
            }
            if uav.with_counter {
                // The allocation counter is its own argument-table
                // entry, not part of the data buffer.
                let v = self.f.param("ptr addrspace(1)", format!("u{id}_counter"));
                let node = self.module.metadata(format!(
                    "!{{i32 {id}, !\"air.buffer\", !\"air.location_index\", i32 {id}, !\"air.read_write\", !\"air.address_space\", i32 1, !\"air.arg_name\", !\"u{id}_counter\"}}"
                ));
                self.arg_metadata.push(node);
                self.uav_counter_args.insert(id, v);
            }
        }
        for &id in info.samplers.keys() {
            let v = self.f.param("ptr", format!("s{id}"));
            let node = self.module.metadata(format!(
                "!{{i32 {id}, !\"air.sampler\", !\"air.location_index\", i32 {id}, !\"air.arg_name\", !\"s{id}\"}}"
            ));
            self.arg_metadata.push(node);
            self.sampler_args.insert(id, v);
        }

        // Threadgroup memory lives in module-scope addrspace(3)
        // globals, named per function to keep variants independent.
        for (&id, tgsm) in &info.tgsm {
            let name = format!("@{}_tg{id}", self.function_name);
            self.module.global(format!(
                "{name} = internal addrspace(3) global [{} x i32] undef, align 4",
                tgsm.size_in_uint.max(1)
            ));
            self.tgsm_globals.insert(id, name);
        }
        if self.stage == FunctionStage::HullObject {
            // Control-point outputs and patch constants staged in
            // threadgroup memory until the payload copy.
            let name = format!("@{}_ocp", self.function_name);
            self.module.global(format!(
                "{name} = internal addrspace(3) global [{HULL_STAGING_ROWS} x <4 x i32>] undef, align 16"
            ));
        }

        if !info.imm_constant_buffer.is_empty() {
            let name = format!("@{}_icb", self.function_name);
            let mut elements = Vec::new();
            for row in &info.imm_constant_buffer {
                elements.push(format!(
                    "<4 x i32> <i32 {}, i32 {}, i32 {}, i32 {}>",
                    row[0] as i32, row[1] as i32, row[2] as i32, row[3] as i32
                ));
            }
            self.module.global(format!(
                "{name} = internal addrspace(2) constant [{} x <4 x i32>] [{}], align 16",
                info.imm_constant_buffer.len(),
                elements.join(", ")
            ));
            self.icb_global = Some(name);
        }
    }

    fn metadata_arg(&mut self, kind: &str, type_name: &str) -> u32 {
        let index = self.arg_metadata.len();
        self.module.metadata(format!(
            "!{{i32 {index}, !\"{kind}\", !\"air.arg_type_name\", !\"{type_name}\"}}"
        ))
    }

    // ---- Prologue -----------------------------------------------------------

    fn emit_prologue(&mut self) {
        let info = &self.program.info;

        let temp_count = info.temp_register_count.max(1);
        self.temps = self
            .f
            .emit(format!("alloca [{temp_count} x <4 x i32>], align 16"));

        for phase in &info.phases {
            let count = phase.temp_register_count.max(1);
            let alloca = self
                .f
                .emit(format!("alloca [{count} x <4 x i32>], align 16"));
            self.phase_temps.push(alloca);
        }

        let mut files: Vec<(u32, u32, u32)> = info
            .indexable_temps
            .iter()
            .map(|(&file, &(count, _))| (PHASE_NONE, file, count))
            .collect();
        for (index, phase) in info.phases.iter().enumerate() {
            for (&file, &(count, _)) in &phase.indexable_temps {
                files.push((index as u32, file, count));
            }
        }
        for (phase, file, count) in files {
            let alloca = self
                .f
                .emit(format!("alloca [{} x <4 x i32>], align 16", count.max(1)));
            self.indexable.insert((phase, file), alloca);
        }

        self.inputs = self.f.emit(format!(
            "alloca [{INPUT_REGISTER_FILE} x <4 x i32>], align 16"
        ));
        self.outputs = self.f.emit(format!(
            "alloca [{OUTPUT_REGISTER_FILE} x <4 x i32>], align 16"
        ));
        if self.stage == FunctionStage::Fragment {
            self.depth_out = Some(self.f.emit("alloca float, align 4"));
            self.coverage_out = Some(self.f.emit("alloca i32, align 4"));
        }

        // Copy attribute parameters into the input register file.
        match self.stage {
            FunctionStage::Vertex | FunctionStage::VertexObject => {
                let registers: Vec<u32> = self
                    .signatures
                    .input
                    .as_ref()
                    .map(|sig| sig.elements.iter().map(|e| e.register).collect())
                    .unwrap_or_else(|| info.inputs.iter().map(|d| d.reg).collect());
                for register in registers {
                    let cast = self
                        .f
                        .emit(format!("bitcast <4 x float> %in{register} to <4 x i32>"));
                    let slot = self.input_slot(&register.to_string());
                    self.f
                        .emit_void(format!("store <4 x i32> {cast}, ptr {slot}, align 16"));
                }
            }
            FunctionStage::Fragment => {
                for decl in &info.inputs {
                    let register = decl.reg;
                    if info.pull_mode_reg_mask & (1 << register) != 0 {
                        continue;
                    }
                    let cast = self
                        .f
                        .emit(format!("bitcast <4 x float> %in{register} to <4 x i32>"));
                    let slot = self.input_slot(&register.to_string());
                    self.f
                        .emit_void(format!("store <4 x i32> {cast}, ptr {slot}, align 16"));
                }
            }
            _ => {}
        }
    }

    // ---- Block emission -----------------------------------------------------

    fn emit_blocks(&mut self) -> Result<(), Error> {
        let cfg = &self.program.cfg;
        let order = cfg.reverse_post_order();

        for (i, &key) in order.iter().enumerate() {
            if i == 0 {
                // The function's entry (prologue) block falls through
                // into the first CFG block.
                let index = self.f.add_block(format!("bb{i}"));
                self.f.emit_void(format!("br label %bb{i}"));
                self.blocks.insert(key, index);
            } else {
                let index = self.f.add_block(format!("bb{i}"));
                self.blocks.insert(key, index);
            }
        }

        for &key in &order {
            let index = self.blocks[&key];
            self.f.select_block(index);
            let block = &cfg.blocks[key];
            let instructions = block.instructions.clone();
            for instruction in &instructions {
                self.emit_instruction(instruction)?;
            }
            let terminator = block.terminator.clone();
            self.emit_terminator(&terminator)?;
        }

        Ok(())
    }

    fn block_ref(&self, key: BlockKey) -> String {
        format!("%{}", self.f.block_label(self.blocks[&key]))
    }

    fn emit_terminator(&mut self, terminator: &Terminator) -> Result<(), Error> {
        match terminator {
            Terminator::Undefined => {
                // Unreachable scratch blocks still need a terminator in
                // the output.
                self.f.emit_void("unreachable");
            }
            Terminator::Return => {
                self.emit_return()?;
            }
            Terminator::Branch { target } => {
                let label = self.block_ref(*target);
                self.f.emit_void(format!("br label {label}"));
            }
            Terminator::BranchConditional {
                cond,
                if_true,
                if_false,
            } => {
                let flag = self.emit_condition(cond)?;
                let t = self.block_ref(*if_true);
                let e = self.block_ref(*if_false);
                self.f
                    .emit_void(format!("br i1 {flag}, label {t}, label {e}"));
            }
            Terminator::Switch {
                value,
                cases,
                default,
            } => {
                let scrutinee = self.load_scalar(value)?;
                let default_label = self.block_ref(*default);
                let mut arms = String::new();
                for (case, target) in cases {
                    let label = self.block_ref(*target);
                    arms.push_str(&format!(" i32 {}, label {label}", *case as i32));
                }
                self.f.emit_void(format!(
                    "switch i32 {scrutinee}, label {default_label} [{}]",
                    arms.trim_start()
                ));
            }
            Terminator::InstanceBarrier {
                instance_count,
                active,
                sync,
            } => {
                let tid = self
                    .attributes
                    .get(&InputAttribute::ThreadIdInGroupFlattened)
                    .cloned()
                    .unwrap_or_else(|| "0".into());
                let flag = self
                    .f
                    .emit(format!("icmp ult i32 {tid}, {instance_count}"));
                let a = self.block_ref(*active);
                let s = self.block_ref(*sync);
                self.f
                    .emit_void(format!("br i1 {flag}, label {a}, label {s}"));
            }
            Terminator::HullShaderWriteOutput {
                instance_count,
                epilogue,
            } => {
                let payload = self.payload.clone().unwrap_or_else(|| "null".into());
                let tg = format!("@{}_ocp", self.function_name);
                self.module.declare(
                    "declare void @air.tess.write_patch_output(ptr addrspace(1), ptr addrspace(3), i32, i32)",
                );
                self.f.emit_void(format!(
                    "call void @air.tess.write_patch_output(ptr addrspace(1) {payload}, ptr addrspace(3) {tg}, i32 {instance_count}, i32 {OUTPUT_REGISTER_FILE})"
                ));
                let label = self.block_ref(*epilogue);
                self.f.emit_void(format!("br label {label}"));
            }
            Terminator::Call { .. } => {
                return Err(Error::Codegen {
                    what: "call terminator survived inlining".into(),
                });
            }
        }
        Ok(())
    }

    fn emit_condition(&mut self, cond: &Condition) -> Result<String, Error> {
        let value = self.load_scalar(&cond.operand)?;
        let op = if cond.test_nonzero { "ne" } else { "eq" };
        Ok(self.f.emit(format!("icmp {op} i32 {value}, 0")))
    }

    /// Loads the first selected component of a source operand as `i32`.
    fn load_scalar(&mut self, src: &SrcOperand) -> Result<String, Error> {
        let vec = self.load_src_as(src, DataType::Integer)?;
        Ok(self.f.emit(format!("extractelement <4 x i32> {vec}, i32 0")))
    }

    // ---- Return -------------------------------------------------------------

    fn emit_return(&mut self) -> Result<(), Error> {
        match self.stage {
            FunctionStage::Vertex => {
                // Vertex outputs leave through the stage-out buffer
                // next to the argument table.
                self.module.declare(
                    "declare void @air.store_vertex_output(i32, i32, <4 x float>)",
                );
                let outputs: Vec<u32> = self.output_registers();
                for register in outputs {
                    let slot = self.output_slot(&register.to_string());
                    let raw = self
                        .f
                        .emit(format!("load <4 x i32>, ptr {slot}, align 16"));
                    let value = self
                        .f
                        .emit(format!("bitcast <4 x i32> {raw} to <4 x float>"));
                    let vid = self
                        .attributes
                        .get(&InputAttribute::VertexId)
                        .cloned()
                        .unwrap_or_else(|| "0".into());
                    self.f.emit_void(format!(
                        "call void @air.store_vertex_output(i32 {vid}, i32 {register}, <4 x float> {value})"
                    ));
                }
                self.f.emit_void("ret void");
            }
            FunctionStage::VertexObject => {
                // Outputs land in the expansion buffer indexed by
                // vertex id.
                let payload = self.payload.clone().unwrap_or_else(|| "null".into());
                let vid = self
                    .attributes
                    .get(&InputAttribute::VertexId)
                    .cloned()
                    .unwrap_or_else(|| "0".into());
                for register in self.output_registers() {
                    let slot = self.output_slot(&register.to_string());
                    let raw = self
                        .f
                        .emit(format!("load <4 x i32>, ptr {slot}, align 16"));
                    let base = self.f.emit(format!(
                        "mul i32 {vid}, {OUTPUT_REGISTER_FILE}"
                    ));
                    let index = self.f.emit(format!("add i32 {base}, {register}"));
                    let gep = self.f.emit(format!(
                        "getelementptr <4 x i32>, ptr addrspace(1) {payload}, i32 {index}"
                    ));
                    self.f.emit_void(format!(
                        "store <4 x i32> {raw}, ptr addrspace(1) {gep}, align 16"
                    ));
                }
                self.f.emit_void("ret void");
            }
            FunctionStage::Fragment => {
                self.emit_fragment_return()?;
            }
            FunctionStage::Kernel
            | FunctionStage::HullObject
            | FunctionStage::GeometryObject
            | FunctionStage::DomainMesh
            | FunctionStage::GeometryMeshPassthrough => {
                self.f.emit_void("ret void");
            }
        }
        Ok(())
    }

    fn emit_fragment_return(&mut self) -> Result<(), Error> {
        let (sample_mask, dual_source, disable_depth, unorm_mask) = match self.variant {
            ShaderVariant::Pixel {
                sample_mask,
                dual_source_blending,
                disable_depth_output,
                unorm_output_mask,
            } => (
                *sample_mask,
                *dual_source_blending,
                *disable_depth_output,
                *unorm_output_mask,
            ),
            _ => (u32::MAX, false, false, 0),
        };

        self.module
            .declare("declare void @air.store_render_target(i32, i32, <4 x float>)");

        for register in self.output_registers() {
            let slot = self.output_slot(&register.to_string());
            let raw = self
                .f
                .emit(format!("load <4 x i32>, ptr {slot}, align 16"));
            let mut value = self
                .f
                .emit(format!("bitcast <4 x i32> {raw} to <4 x float>"));
            if unorm_mask & (1 << register) != 0 {
                // Emulate D3D11 blending precision on unorm8 targets.
                self.module.declare(
                    "declare <4 x float> @air.fast_saturate.v4f32(<4 x float>)",
                );
                value = self
                    .f
                    .emit(format!("call <4 x float> @air.fast_saturate.v4f32(<4 x float> {value})"));
            }
            // Dual-source blending renames color 1 to the second
            // source of color 0.
            let (index, source) = if dual_source && register == 1 {
                (0, 1)
            } else {
                (register, 0)
            };
            self.f.emit_void(format!(
                "call void @air.store_render_target(i32 {index}, i32 {source}, <4 x float> {value})"
            ));
        }

        let writes_depth = self.depth_written();
        if writes_depth && !disable_depth {
            if let Some(depth) = self.depth_out.clone() {
                self.module
                    .declare("declare void @air.store_depth(float)");
                let value = self.f.emit(format!("load float, ptr {depth}, align 4"));
                self.f
                    .emit_void(format!("call void @air.store_depth(float {value})"));
            }
        }

        if sample_mask != u32::MAX || self.coverage_written() {
            if let Some(coverage) = self.coverage_out.clone() {
                self.module
                    .declare("declare void @air.store_sample_mask(i32)");
                let value = if self.coverage_written() {
                    let raw = self
                        .f
                        .emit(format!("load i32, ptr {coverage}, align 4"));
                    self.f
                        .emit(format!("and i32 {raw}, {}", sample_mask as i32))
                } else {
                    format!("{}", sample_mask as i32)
                };
                self.f
                    .emit_void(format!("call void @air.store_sample_mask(i32 {value})"));
            }
        }

        self.f.emit_void("ret void");
        Ok(())
    }

    fn output_registers(&self) -> Vec<u32> {
        let mut registers: Vec<u32> = self
            .program
            .info
            .outputs
            .iter()
            .filter(|o| o.system_value.is_none())
            .map(|o| o.reg)
            .collect();
        if registers.is_empty() {
            if let Some(sig) = &self.signatures.output {
                registers = sig.elements.iter().map(|e| e.register).collect();
            }
        }
        registers.sort_unstable();
        registers.dedup();
        registers
    }

    fn depth_written(&self) -> bool {
        self.walk_instructions(|inst| {
            matches!(
                inst,
                Instruction::Mov {
                    dst: DstOperand::Depth { .. },
                    ..
                }
            ) || matches!(dst_of(inst), Some(DstOperand::Depth { .. }))
        })
    }

    fn coverage_written(&self) -> bool {
        self.walk_instructions(|inst| matches!(dst_of(inst), Some(DstOperand::CoverageMask { .. })))
    }

    fn walk_instructions(&self, mut f: impl FnMut(&Instruction) -> bool) -> bool {
        self.program
            .cfg
            .blocks
            .values()
            .flat_map(|b| b.instructions.iter())
            .any(|inst| f(inst))
    }

    // ---- Operand access -----------------------------------------------------

    fn input_slot(&mut self, index: &str) -> String {
        let inputs = self.inputs.clone();
        self.f.emit(format!(
            "getelementptr inbounds [{INPUT_REGISTER_FILE} x <4 x i32>], ptr {inputs}, i32 0, i32 {index}"
        ))
    }

    fn output_slot(&mut self, index: &str) -> String {
        let outputs = self.outputs.clone();
        self.f.emit(format!(
            "getelementptr inbounds [{OUTPUT_REGISTER_FILE} x <4 x i32>], ptr {outputs}, i32 0, i32 {index}"
        ))
    }

    fn temp_slot(&mut self, reg_expr: &str, phase: u32) -> String {
        let (alloca, count) = if phase == PHASE_NONE {
            (
                self.temps.clone(),
                self.program.info.temp_register_count.max(1),
            )
        } else {
            (
                self.phase_temps[phase as usize].clone(),
                self.program.info.phases[phase as usize]
                    .temp_register_count
                    .max(1),
            )
        };
        self.f.emit(format!(
            "getelementptr inbounds [{count} x <4 x i32>], ptr {alloca}, i32 0, i32 {reg_expr}"
        ))
    }

    fn indexable_slot(&mut self, file: u32, phase: u32, index_expr: &str) -> Result<String, Error> {
        let Some(alloca) = self.indexable.get(&(phase, file)).cloned() else {
            return Err(Error::Codegen {
                what: format!("undeclared indexable temp file x{file}"),
            });
        };
        let count = self
            .program
            .info
            .indexable_temps(phase)
            .get(&file)
            .map(|&(count, _)| count)
            .unwrap_or(1)
            .max(1);
        Ok(self.f.emit(format!(
            "getelementptr inbounds [{count} x <4 x i32>], ptr {alloca}, i32 0, i32 {index_expr}"
        )))
    }

    /// Lowers a dynamic operand index to an `i32` expression.
    fn index_value(&mut self, index: &OperandIndex) -> Result<String, Error> {
        match index {
            OperandIndex::Immediate(value) => Ok(format!("{value}")),
            OperandIndex::TempComponent(idx) => {
                let slot = self.temp_slot(&idx.reg.to_string(), idx.phase);
                let vec = self.f.emit(format!("load <4 x i32>, ptr {slot}, align 16"));
                let component = self.f.emit(format!(
                    "extractelement <4 x i32> {vec}, i32 {}",
                    idx.component
                ));
                if idx.offset != 0 {
                    Ok(self.f.emit(format!("add i32 {component}, {}", idx.offset)))
                } else {
                    Ok(component)
                }
            }
            OperandIndex::IndexableTempComponent(idx) => {
                let slot = self.indexable_slot(idx.file, idx.phase, &idx.reg.to_string())?;
                let vec = self.f.emit(format!("load <4 x i32>, ptr {slot}, align 16"));
                let component = self.f.emit(format!(
                    "extractelement <4 x i32> {vec}, i32 {}",
                    idx.component
                ));
                if idx.offset != 0 {
                    Ok(self.f.emit(format!("add i32 {component}, {}", idx.offset)))
                } else {
                    Ok(component)
                }
            }
        }
    }

    /// Materializes a source operand as a 4-vector of its read type.
    fn load_src(&mut self, src: &SrcOperand) -> Result<String, Error> {
        self.load_src_as(src, src.modifier().read_type)
    }

    fn load_src_as(&mut self, src: &SrcOperand, read_type: DataType) -> Result<String, Error> {
        let modifier = *src.modifier();

        let raw = match src {
            SrcOperand::Immediate32 { value, .. } => const_vector(*value),
            SrcOperand::Temp { reg, phase, .. } => {
                let slot = self.temp_slot(&reg.to_string(), *phase);
                self.f.emit(format!("load <4 x i32>, ptr {slot}, align 16"))
            }
            SrcOperand::IndexableTemp {
                file, index, phase, ..
            } => {
                let index = self.index_value(index)?;
                let slot = self.indexable_slot(*file, *phase, &index)?;
                self.f.emit(format!("load <4 x i32>, ptr {slot}, align 16"))
            }
            SrcOperand::Input { reg, .. } => {
                let slot = self.input_slot(&reg.to_string());
                self.f.emit(format!("load <4 x i32>, ptr {slot}, align 16"))
            }
            SrcOperand::IndexableInput { index, .. } => {
                let index = self.index_value(index)?;
                let slot = self.input_slot(&index);
                self.f.emit(format!("load <4 x i32>, ptr {slot}, align 16"))
            }
            SrcOperand::InputControlPoint {
                control_point, reg, ..
            }
            | SrcOperand::OutputControlPoint {
                control_point, reg, ..
            } => {
                let is_output = matches!(src, SrcOperand::OutputControlPoint { .. });
                let cp = self.index_value(control_point)?;
                let base = self
                    .f
                    .emit(format!("mul i32 {cp}, {INPUT_REGISTER_FILE}"));
                let index = self.f.emit(format!("add i32 {base}, {reg}"));
                if is_output && self.stage == FunctionStage::HullObject {
                    let tg = format!("@{}_ocp", self.function_name);
                    let gep = self.f.emit(format!(
                        "getelementptr inbounds [{HULL_STAGING_ROWS} x <4 x i32>], ptr addrspace(3) {tg}, i32 0, i32 {index}"
                    ));
                    self.f
                        .emit(format!("load <4 x i32>, ptr addrspace(3) {gep}, align 16"))
                } else {
                    let buffer = self
                        .control_points
                        .clone()
                        .unwrap_or_else(|| "null".into());
                    let gep = self.f.emit(format!(
                        "getelementptr <4 x i32>, ptr addrspace(1) {buffer}, i32 {index}"
                    ));
                    self.f
                        .emit(format!("load <4 x i32>, ptr addrspace(1) {gep}, align 16"))
                }
            }
            SrcOperand::PatchConstant { index, .. } => {
                let index = self.index_value(index)?;
                let buffer = self
                    .patch_constants
                    .clone()
                    .or_else(|| self.payload.clone())
                    .unwrap_or_else(|| "null".into());
                // Patch constants follow the control points in the
                // payload.
                let base = self.f.emit(format!(
                    "add i32 {index}, {}",
                    MAX_CONTROL_POINTS * OUTPUT_REGISTER_FILE
                ));
                let gep = self.f.emit(format!(
                    "getelementptr <4 x i32>, ptr addrspace(1) {buffer}, i32 {base}"
                ));
                self.f
                    .emit(format!("load <4 x i32>, ptr addrspace(1) {gep}, align 16"))
            }
            SrcOperand::ConstantBuffer {
                range_id,
                reg_index,
                ..
            } => {
                let Some(arg) = self.cb_args.get(range_id).cloned() else {
                    return Err(Error::Codegen {
                        what: format!("undeclared constant buffer cb{range_id}"),
                    });
                };
                let index = self.index_value(reg_index)?;
                let gep = self.f.emit(format!(
                    "getelementptr <4 x i32>, ptr addrspace(2) {arg}, i32 {index}"
                ));
                self.f
                    .emit(format!("load <4 x i32>, ptr addrspace(2) {gep}, align 16"))
            }
            SrcOperand::ImmediateConstantBuffer { index, .. } => {
                let Some(global) = self.icb_global.clone() else {
                    return Err(Error::Codegen {
                        what: "immediate constant buffer read without customdata".into(),
                    });
                };
                let rows = self.program.info.imm_constant_buffer.len().max(1);
                let index = self.index_value(index)?;
                let gep = self.f.emit(format!(
                    "getelementptr inbounds [{rows} x <4 x i32>], ptr addrspace(2) {global}, i32 0, i32 {index}"
                ));
                self.f
                    .emit(format!("load <4 x i32>, ptr addrspace(2) {gep}, align 16"))
            }
            SrcOperand::Attribute { attribute, .. } => self.attribute_vector(*attribute)?,
        };

        // Swizzle in the integer domain, then cast, then abs and neg.
        let swizzled = self.swizzle_v4i32(&raw, modifier.swizzle);
        let mut value = self.cast_from_raw(&swizzled, read_type);

        if modifier.abs {
            value = match read_type {
                DataType::Float => {
                    self.module
                        .declare("declare <4 x float> @air.fast_fabs.v4f32(<4 x float>)");
                    self.f.emit(format!(
                        "call <4 x float> @air.fast_fabs.v4f32(<4 x float> {value})"
                    ))
                }
                _ => {
                    self.module
                        .declare("declare <4 x i32> @air.abs.s.v4i32(<4 x i32>)");
                    self.f
                        .emit(format!("call <4 x i32> @air.abs.s.v4i32(<4 x i32> {value})"))
                }
            };
        }
        if modifier.neg {
            value = match read_type {
                DataType::Float => self.f.emit(format!("fneg <4 x float> {value}")),
                _ => self
                    .f
                    .emit(format!("sub <4 x i32> zeroinitializer, {value}")),
            };
        }

        Ok(value)
    }

    fn attribute_vector(&mut self, attribute: InputAttribute) -> Result<String, Error> {
        let Some(value) = self.attributes.get(&attribute).cloned() else {
            return Err(Error::Codegen {
                what: format!("builtin {attribute:?} unavailable in this stage"),
            });
        };
        // Widen the builtin to the uniform <4 x i32> shape.
        match attribute {
            InputAttribute::DomainPoint => {
                let cast = self
                    .f
                    .emit(format!("bitcast <3 x float> {value} to <3 x i32>"));
                let widened = self.f.emit(format!(
                    "shufflevector <3 x i32> {cast}, <3 x i32> undef, <4 x i32> <i32 0, i32 1, i32 2, i32 undef>"
                ));
                Ok(widened)
            }
            InputAttribute::ThreadId
            | InputAttribute::ThreadIdInGroup
            | InputAttribute::ThreadGroupId => Ok(self.f.emit(format!(
                "shufflevector <3 x i32> {value}, <3 x i32> undef, <4 x i32> <i32 0, i32 1, i32 2, i32 undef>"
            ))),
            _ => {
                let insert = self
                    .f
                    .emit(format!("insertelement <4 x i32> undef, i32 {value}, i32 0"));
                Ok(self.f.emit(format!(
                    "shufflevector <4 x i32> {insert}, <4 x i32> undef, <4 x i32> zeroinitializer"
                )))
            }
        }
    }

    fn swizzle_v4i32(&mut self, value: &str, swizzle: Swizzle) -> String {
        if swizzle.is_identity() {
            return value.to_string();
        }
        let Swizzle([x, y, z, w]) = swizzle;
        self.f.emit(format!(
            "shufflevector <4 x i32> {value}, <4 x i32> undef, <4 x i32> <i32 {x}, i32 {y}, i32 {z}, i32 {w}>"
        ))
    }

    fn cast_from_raw(&mut self, value: &str, ty: DataType) -> String {
        match ty {
            DataType::Float => self
                .f
                .emit(format!("bitcast <4 x i32> {value} to <4 x float>")),
            DataType::Integer | DataType::Half16X16 => value.to_string(),
        }
    }

    fn cast_to_raw(&mut self, value: &str, ty: DataType) -> String {
        match ty {
            DataType::Float => self
                .f
                .emit(format!("bitcast <4 x float> {value} to <4 x i32>")),
            DataType::Integer | DataType::Half16X16 => value.to_string(),
        }
    }

    /// Stores a value (typed per `value_type`) into a destination,
    /// applying saturation and the write mask.
    fn store_dst(
        &mut self,
        dst: &DstOperand,
        value: String,
        value_type: DataType,
        common: Option<&InstCommon>,
    ) -> Result<(), Error> {
        let modifier = *dst.modifier();

        let mut value = value;
        if common.is_some_and(|c| c.saturate) && value_type == DataType::Float {
            self.module
                .declare("declare <4 x float> @air.fast_saturate.v4f32(<4 x float>)");
            value = self.f.emit(format!(
                "call <4 x float> @air.fast_saturate.v4f32(<4 x float> {value})"
            ));
        }

        // Cast at the store site per the write type assigned by the
        // lifter; the register files hold raw 32-bit lanes.
        let mut raw = self.cast_to_raw(&value, value_type);

        match dst {
            DstOperand::Null { .. } | DstOperand::SideEffect { .. } => Ok(()),
            DstOperand::Temp { reg, phase, .. } => {
                let slot = self.temp_slot(&reg.to_string(), *phase);
                self.masked_store(&slot, "", &mut raw, modifier.mask);
                Ok(())
            }
            DstOperand::IndexableTemp {
                file, index, phase, ..
            } => {
                let index = self.index_value(index)?;
                let slot = self.indexable_slot(*file, *phase, &index)?;
                self.masked_store(&slot, "", &mut raw, modifier.mask);
                Ok(())
            }
            DstOperand::Output { reg, phase, .. } => {
                if self.stage == FunctionStage::HullObject {
                    self.store_hull_output(&reg.to_string(), *phase, &raw, modifier.mask);
                } else {
                    let slot = self.output_slot(&reg.to_string());
                    self.masked_store(&slot, "", &mut raw, modifier.mask);
                }
                Ok(())
            }
            DstOperand::IndexableOutput { index, phase, .. } => {
                let index = self.index_value(index)?;
                if self.stage == FunctionStage::HullObject {
                    self.store_hull_output(&index, *phase, &raw, modifier.mask);
                } else {
                    let slot = self.output_slot(&index);
                    self.masked_store(&slot, "", &mut raw, modifier.mask);
                }
                Ok(())
            }
            DstOperand::Depth { .. } => {
                let Some(depth) = self.depth_out.clone() else {
                    return Ok(());
                };
                let as_float = self.cast_from_raw(&raw, DataType::Float);
                let scalar = self
                    .f
                    .emit(format!("extractelement <4 x float> {as_float}, i32 0"));
                self.f
                    .emit_void(format!("store float {scalar}, ptr {depth}, align 4"));
                Ok(())
            }
            DstOperand::CoverageMask { .. } => {
                let Some(coverage) = self.coverage_out.clone() else {
                    return Ok(());
                };
                let scalar = self
                    .f
                    .emit(format!("extractelement <4 x i32> {raw}, i32 0"));
                self.f
                    .emit_void(format!("store i32 {scalar}, ptr {coverage}, align 4"));
                Ok(())
            }
        }
    }

    /// Control-point-phase outputs go to the threadgroup staging area
    /// indexed by the output control point id; other stages use the
    /// plain output file.
    fn store_hull_output(&mut self, reg_expr: &str, phase: u32, raw: &str, mask: u8) {
        let tg = format!("@{}_ocp", self.function_name);
        let index = if phase == PHASE_NONE {
            let cp = self
                .attributes
                .get(&InputAttribute::OutputControlPointId)
                .cloned()
                .unwrap_or_else(|| "0".into());
            let base = self.f.emit(format!("mul i32 {cp}, {OUTPUT_REGISTER_FILE}"));
            self.f.emit(format!("add i32 {base}, {reg_expr}"))
        } else {
            // Patch constants live after the per-control-point rows.
            self.f.emit(format!(
                "add i32 {}, {reg_expr}",
                MAX_CONTROL_POINTS * OUTPUT_REGISTER_FILE
            ))
        };
        let gep = self.f.emit(format!(
            "getelementptr inbounds [{HULL_STAGING_ROWS} x <4 x i32>], ptr addrspace(3) {tg}, i32 0, i32 {index}"
        ));
        let mut raw = raw.to_string();
        self.masked_store_addrspace(&gep, "addrspace(3) ", &mut raw, mask);
    }

    fn masked_store(&mut self, slot: &str, addrspace: &str, raw: &mut String, mask: u8) {
        self.masked_store_addrspace(slot, addrspace, raw, mask);
    }

    fn masked_store_addrspace(&mut self, slot: &str, addrspace: &str, raw: &mut String, mask: u8) {
        if mask == 0 {
            return;
        }
        if mask != 0b1111 {
            let old = self.f.emit(format!(
                "load <4 x i32>, ptr {addrspace}{slot}, align 16"
            ));
            let lanes: Vec<&str> = (0..4)
                .map(|i| if mask & (1 << i) != 0 { "i1 true" } else { "i1 false" })
                .collect();
            *raw = self.f.emit(format!(
                "select <4 x i1> <{}>, <4 x i32> {raw}, <4 x i32> {old}",
                lanes.join(", ")
            ));
        }
        self.f.emit_void(format!(
            "store <4 x i32> {raw}, ptr {addrspace}{slot}, align 16"
        ));
    }

    // ---- Intrinsic plumbing -------------------------------------------------

    /// Declares and calls an `air.*` intrinsic in one step so that the
    /// declaration always matches the call site.
    fn call(&mut self, ret: &str, name: &str, args: &[(String, String)]) -> String {
        let sig: Vec<&str> = args.iter().map(|(t, _)| t.as_str()).collect();
        self.module
            .declare(format!("declare {ret} @{name}({})", sig.join(", ")));
        let rendered: Vec<String> = args.iter().map(|(t, v)| format!("{t} {v}")).collect();
        if ret == "void" {
            self.f
                .emit_void(format!("call void @{name}({})", rendered.join(", ")));
            String::new()
        } else {
            self.f
                .emit(format!("call {ret} @{name}({})", rendered.join(", ")))
        }
    }

    fn srv_kind(&self, id: u32) -> ResourceKind {
        self.program
            .info
            .srvs
            .get(&id)
            .map(|s| s.kind)
            .unwrap_or(ResourceKind::Texture2D)
    }

    fn uav_kind(&self, id: u32) -> ResourceKind {
        self.program
            .info
            .uavs
            .get(&id)
            .map(|u| u.kind)
            .unwrap_or(ResourceKind::Texture2D)
    }

    fn srv_arg(&self, id: u32) -> Result<String, Error> {
        self.srv_args.get(&id).cloned().ok_or_else(|| Error::Codegen {
            what: format!("undeclared resource t{id}"),
        })
    }

    fn uav_arg(&self, id: u32) -> Result<String, Error> {
        self.uav_args.get(&id).cloned().ok_or_else(|| Error::Codegen {
            what: format!("undeclared UAV u{id}"),
        })
    }

    fn sampler_arg(&self, sampler: &SamplerRef) -> Result<String, Error> {
        self.sampler_args
            .get(&sampler.range_id)
            .cloned()
            .ok_or_else(|| Error::Codegen {
                what: format!("undeclared sampler s{}", sampler.range_id),
            })
    }

    /// Extracts the first `arity` float lanes of an address vector as
    /// the coordinate argument.
    fn float_coords(&mut self, address: &str, arity: usize) -> (String, String) {
        if arity == 1 {
            let v = self
                .f
                .emit(format!("extractelement <4 x float> {address}, i32 0"));
            ("float".into(), v)
        } else {
            let lanes: Vec<String> = (0..arity).map(|i| format!("i32 {i}")).collect();
            let v = self.f.emit(format!(
                "shufflevector <4 x float> {address}, <4 x float> undef, <{arity} x i32> <{}>",
                lanes.join(", ")
            ));
            (format!("<{arity} x float>"), v)
        }
    }

    fn int_coords(&mut self, address: &str, arity: usize) -> (String, String) {
        if arity == 1 {
            let v = self
                .f
                .emit(format!("extractelement <4 x i32> {address}, i32 0"));
            ("i32".into(), v)
        } else {
            let lanes: Vec<String> = (0..arity).map(|i| format!("i32 {i}")).collect();
            let v = self.f.emit(format!(
                "shufflevector <4 x i32> {address}, <4 x i32> undef, <{arity} x i32> <{}>",
                lanes.join(", ")
            ));
            (format!("<{arity} x i32>"), v)
        }
    }

    fn offsets_constant(offsets: [i32; 3]) -> (String, String) {
        (
            "<4 x i32>".into(),
            format!(
                "<i32 {}, i32 {}, i32 {}, i32 0>",
                offsets[0], offsets[1], offsets[2]
            ),
        )
    }

    fn result_type(write_type: DataType) -> (&'static str, &'static str) {
        match write_type {
            DataType::Float => ("<4 x float>", "v4f32"),
            DataType::Integer | DataType::Half16X16 => ("<4 x i32>", "v4i32"),
        }
    }

    /// Splats a scalar into all four lanes.
    fn splat(&mut self, scalar_ty: &str, value: &str) -> String {
        let vec_ty = format!("<4 x {scalar_ty}>");
        let insert = self.f.emit(format!(
            "insertelement {vec_ty} undef, {scalar_ty} {value}, i32 0"
        ));
        self.f.emit(format!(
            "shufflevector {vec_ty} {insert}, {vec_ty} undef, <4 x i32> zeroinitializer"
        ))
    }

    fn extract_x(&mut self, ty: &str, vec: &str) -> String {
        self.f
            .emit(format!("extractelement <4 x {ty}> {vec}, i32 0"))
    }

    fn apply_read_swizzle(&mut self, value: &str, swizzle: Swizzle, ty: DataType) -> String {
        if swizzle.is_identity() {
            return value.to_string();
        }
        let Swizzle([x, y, z, w]) = swizzle;
        let vec_ty = Self::result_type(ty).0;
        self.f.emit(format!(
            "shufflevector {vec_ty} {value}, {vec_ty} undef, <4 x i32> <i32 {x}, i32 {y}, i32 {z}, i32 {w}>"
        ))
    }

    fn store_feedback(&mut self, feedback: &Option<DstOperand>) -> Result<(), Error> {
        if let Some(dst) = feedback {
            // Sparse feedback reports full residency.
            self.store_dst(
                dst,
                "<i32 -1, i32 -1, i32 -1, i32 -1>".into(),
                DataType::Integer,
                None,
            )?;
        }
        Ok(())
    }

    /// Byte offset -> dword index.
    fn dword_index(&mut self, byte_offset: &str) -> String {
        self.f.emit(format!("lshr i32 {byte_offset}, 2"))
    }

    /// Base pointer + address space for a typeless source.
    fn typeless_ptr(&mut self, src: &TypelessSrc) -> Result<(String, &'static str, u32), Error> {
        match src {
            TypelessSrc::Srv(srv) => Ok((
                self.srv_arg(srv.range_id)?,
                "addrspace(1)",
                self.program
                    .info
                    .srvs
                    .get(&srv.range_id)
                    .and_then(|s| s.structure_stride)
                    .unwrap_or(0),
            )),
            TypelessSrc::Uav(uav) => Ok((
                self.uav_arg(uav.range_id)?,
                "addrspace(1)",
                self.program
                    .info
                    .uavs
                    .get(&uav.range_id)
                    .and_then(|u| u.structure_stride)
                    .unwrap_or(0),
            )),
            TypelessSrc::Tgsm(tgsm) => {
                let (ptr, stride) = self.tgsm_base(tgsm.id)?;
                Ok((ptr, "addrspace(3)", stride))
            }
        }
    }

    fn tgsm_base(&mut self, id: u32) -> Result<(String, u32), Error> {
        let Some(global) = self.tgsm_globals.get(&id).cloned() else {
            return Err(Error::Codegen {
                what: format!("undeclared TGSM g{id}"),
            });
        };
        let info = &self.program.info.tgsm[&id];
        let size = info.size_in_uint.max(1);
        let stride = info.stride;
        let base = self.f.emit(format!(
            "getelementptr inbounds [{size} x i32], ptr addrspace(3) {global}, i32 0, i32 0"
        ));
        Ok((base, stride))
    }

    fn atomic_dst_ptr(
        &mut self,
        dst: &AtomicDst,
        address: &str,
    ) -> Result<(String, &'static str), Error> {
        match dst {
            AtomicDst::Uav(uav) => {
                let base = self.uav_arg(uav.range_id)?;
                let stride = self
                    .program
                    .info
                    .uavs
                    .get(&uav.range_id)
                    .and_then(|u| u.structure_stride)
                    .unwrap_or(0);
                let index = self.atomic_index(address, stride);
                let ptr = self.f.emit(format!(
                    "getelementptr i32, ptr addrspace(1) {base}, i32 {index}"
                ));
                Ok((ptr, "air.atomic.global"))
            }
            AtomicDst::Tgsm(tgsm) => {
                let (base, stride) = self.tgsm_base(tgsm.id)?;
                let index = self.atomic_index(address, stride);
                let ptr = self.f.emit(format!(
                    "getelementptr i32, ptr addrspace(3) {base}, i32 {index}"
                ));
                Ok((ptr, "air.atomic.local"))
            }
        }
    }

    /// Raw destinations address by byte, structured destinations by
    /// (element, byte-offset) pair.
    fn atomic_index(&mut self, address: &str, stride: u32) -> String {
        if stride > 1 {
            let elem = self.extract_x("i32", address);
            let offset = self
                .f
                .emit(format!("extractelement <4 x i32> {address}, i32 1"));
            let dwords = self.dword_index(&offset);
            let base = self.f.emit(format!("mul i32 {elem}, {}", stride / 4));
            self.f.emit(format!("add i32 {base}, {dwords}"))
        } else {
            let byte = self.extract_x("i32", address);
            self.dword_index(&byte)
        }
    }

    fn atomic_addrspace(ns: &str) -> &'static str {
        if ns == "air.atomic.local" {
            "addrspace(3)"
        } else {
            "addrspace(1)"
        }
    }

    // ---- Instruction lowering ----------------------------------------------

    fn emit_instruction(&mut self, inst: &Instruction) -> Result<(), Error> {
        match inst {
            Instruction::Nop => Ok(()),
            Instruction::Mov { common, dst, src } => {
                let value = self.load_src(src)?;
                self.store_dst(dst, value, src.modifier().read_type, Some(common))
            }
            Instruction::MovConditional {
                common,
                dst,
                src_cond,
                src0,
                src1,
            } => {
                let cond = self.load_src(src_cond)?;
                let flags = self
                    .f
                    .emit(format!("icmp ne <4 x i32> {cond}, zeroinitializer"));
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let value = self.f.emit(format!(
                    "select <4 x i1> {flags}, <4 x float> {a}, <4 x float> {b}"
                ));
                self.store_dst(dst, value, DataType::Float, Some(common))
            }
            Instruction::SwapConditional {
                dst0,
                dst1,
                src_cond,
                src0,
                src1,
            } => {
                let cond = self.load_src(src_cond)?;
                let flags = self
                    .f
                    .emit(format!("icmp ne <4 x i32> {cond}, zeroinitializer"));
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let first = self.f.emit(format!(
                    "select <4 x i1> {flags}, <4 x float> {b}, <4 x float> {a}"
                ));
                let second = self.f.emit(format!(
                    "select <4 x i1> {flags}, <4 x float> {a}, <4 x float> {b}"
                ));
                self.store_dst(dst0, first, DataType::Float, None)?;
                self.store_dst(dst1, second, DataType::Float, None)
            }
            Instruction::DotProduct {
                common,
                dst,
                src0,
                src1,
                dimension,
            } => {
                let fast = self.fast(common);
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let product = self
                    .f
                    .emit(format!("fmul {fast}<4 x float> {a}, {b}"));
                let mut sum = self.extract_x("float", &product);
                for lane in 1..*dimension {
                    let component = self
                        .f
                        .emit(format!("extractelement <4 x float> {product}, i32 {lane}"));
                    sum = self
                        .f
                        .emit(format!("fadd {fast}float {sum}, {component}"));
                }
                let value = self.splat("float", &sum);
                self.store_dst(dst, value, DataType::Float, Some(common))
            }
            Instruction::SinCos {
                common,
                dst_sin,
                dst_cos,
                src,
            } => {
                let value = self.load_src(src)?;
                if !matches!(dst_sin, DstOperand::Null { .. }) {
                    let sin = self.call(
                        "<4 x float>",
                        "air.fast_sin.v4f32",
                        &[("<4 x float>".into(), value.clone())],
                    );
                    self.store_dst(dst_sin, sin, DataType::Float, Some(common))?;
                }
                if !matches!(dst_cos, DstOperand::Null { .. }) {
                    let cos = self.call(
                        "<4 x float>",
                        "air.fast_cos.v4f32",
                        &[("<4 x float>".into(), value)],
                    );
                    self.store_dst(dst_cos, cos, DataType::Float, Some(common))?;
                }
                Ok(())
            }
            Instruction::Convert { op, dst, src } => {
                let value = self.load_src(src)?;
                let (result, ty) = match op {
                    ConversionOp::FloatToSigned => (
                        self.f
                            .emit(format!("fptosi <4 x float> {value} to <4 x i32>")),
                        DataType::Integer,
                    ),
                    ConversionOp::FloatToUnsigned => (
                        self.f
                            .emit(format!("fptoui <4 x float> {value} to <4 x i32>")),
                        DataType::Integer,
                    ),
                    ConversionOp::SignedToFloat => (
                        self.f
                            .emit(format!("sitofp <4 x i32> {value} to <4 x float>")),
                        DataType::Float,
                    ),
                    ConversionOp::UnsignedToFloat => (
                        self.f
                            .emit(format!("uitofp <4 x i32> {value} to <4 x float>")),
                        DataType::Float,
                    ),
                    ConversionOp::HalfToFloat => (
                        self.call(
                            "<4 x float>",
                            "air.f16tof32.v4f32",
                            &[("<4 x i32>".into(), value)],
                        ),
                        DataType::Float,
                    ),
                    ConversionOp::FloatToHalf => (
                        self.call(
                            "<4 x i32>",
                            "air.f32tof16.v4i32",
                            &[("<4 x float>".into(), value)],
                        ),
                        DataType::Half16X16,
                    ),
                };
                self.store_dst(dst, result, ty, None)
            }
            Instruction::FloatCompare {
                common,
                cmp,
                dst,
                src0,
                src1,
            } => {
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let pred = match cmp {
                    FloatComparison::Equal => "oeq",
                    FloatComparison::NotEqual => "une",
                    FloatComparison::GreaterEqual => "oge",
                    FloatComparison::LessThan => "olt",
                };
                let flags = self
                    .f
                    .emit(format!("fcmp {pred} <4 x float> {a}, {b}"));
                let value = self
                    .f
                    .emit(format!("sext <4 x i1> {flags} to <4 x i32>"));
                self.store_dst(dst, value, DataType::Integer, Some(common))
            }
            Instruction::IntegerCompare {
                cmp,
                dst,
                src0,
                src1,
            } => {
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let pred = match cmp {
                    IntegerComparison::Equal => "eq",
                    IntegerComparison::NotEqual => "ne",
                    IntegerComparison::SignedLessThan => "slt",
                    IntegerComparison::SignedGreaterEqual => "sge",
                    IntegerComparison::UnsignedLessThan => "ult",
                    IntegerComparison::UnsignedGreaterEqual => "uge",
                };
                let flags = self.f.emit(format!("icmp {pred} <4 x i32> {a}, {b}"));
                let value = self
                    .f
                    .emit(format!("sext <4 x i1> {flags} to <4 x i32>"));
                self.store_dst(dst, value, DataType::Integer, None)
            }
            Instruction::FloatBinary {
                common,
                op,
                dst,
                src0,
                src1,
            } => {
                let fast = self.fast(common);
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let value = match op {
                    FloatBinaryOp::Add => self
                        .f
                        .emit(format!("fadd {fast}<4 x float> {a}, {b}")),
                    FloatBinaryOp::Mul => self
                        .f
                        .emit(format!("fmul {fast}<4 x float> {a}, {b}")),
                    FloatBinaryOp::Div => self
                        .f
                        .emit(format!("fdiv {fast}<4 x float> {a}, {b}")),
                    FloatBinaryOp::Min => self.call(
                        "<4 x float>",
                        "air.fast_fmin.v4f32",
                        &[("<4 x float>".into(), a), ("<4 x float>".into(), b)],
                    ),
                    FloatBinaryOp::Max => self.call(
                        "<4 x float>",
                        "air.fast_fmax.v4f32",
                        &[("<4 x float>".into(), a), ("<4 x float>".into(), b)],
                    ),
                };
                self.store_dst(dst, value, DataType::Float, Some(common))
            }
            Instruction::FloatUnary {
                common,
                op,
                dst,
                src,
            } => {
                let fast = self.fast(common);
                let value = self.load_src(src)?;
                let result = match op {
                    FloatUnaryOp::Log2 => self.unary_intrinsic("air.fast_log2.v4f32", value),
                    FloatUnaryOp::Exp2 => self.unary_intrinsic("air.fast_exp2.v4f32", value),
                    FloatUnaryOp::Sqrt => self.unary_intrinsic("air.fast_sqrt.v4f32", value),
                    FloatUnaryOp::Rsq => self.unary_intrinsic("air.fast_rsqrt.v4f32", value),
                    FloatUnaryOp::Fraction => self.unary_intrinsic("air.fast_fract.v4f32", value),
                    FloatUnaryOp::RoundNearestEven => {
                        self.unary_intrinsic("air.fast_rint.v4f32", value)
                    }
                    FloatUnaryOp::RoundNegativeInf => {
                        self.unary_intrinsic("air.fast_floor.v4f32", value)
                    }
                    FloatUnaryOp::RoundPositiveInf => {
                        self.unary_intrinsic("air.fast_ceil.v4f32", value)
                    }
                    FloatUnaryOp::RoundZero => self.unary_intrinsic("air.fast_trunc.v4f32", value),
                    FloatUnaryOp::Rcp => {
                        let one = float_constant(1.0);
                        self.f.emit(format!(
                            "fdiv {fast}<4 x float> <float {one}, float {one}, float {one}, float {one}>, {value}"
                        ))
                    }
                };
                self.store_dst(dst, result, DataType::Float, Some(common))
            }
            Instruction::IntegerUnary { op, dst, src } => {
                let value = self.load_src(src)?;
                let result = match op {
                    IntegerUnaryOp::Neg => self
                        .f
                        .emit(format!("sub <4 x i32> zeroinitializer, {value}")),
                    IntegerUnaryOp::Not => self.f.emit(format!(
                        "xor <4 x i32> {value}, <i32 -1, i32 -1, i32 -1, i32 -1>"
                    )),
                    IntegerUnaryOp::ReverseBits => {
                        self.int_unary_intrinsic("air.reverse_bits.v4i32", value)
                    }
                    IntegerUnaryOp::CountBits => {
                        self.int_unary_intrinsic("air.popcount.v4i32", value)
                    }
                    IntegerUnaryOp::FirstHiBit => {
                        self.int_unary_intrinsic("air.firstbit_hi.v4i32", value)
                    }
                    IntegerUnaryOp::FirstHiBitSigned => {
                        self.int_unary_intrinsic("air.firstbit_shi.v4i32", value)
                    }
                    IntegerUnaryOp::FirstLowBit => {
                        self.int_unary_intrinsic("air.firstbit_lo.v4i32", value)
                    }
                };
                self.store_dst(dst, result, DataType::Integer, None)
            }
            Instruction::IntegerBinary {
                op,
                dst,
                src0,
                src1,
            } => {
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let value = match op {
                    IntegerBinaryOp::Add => self.f.emit(format!("add <4 x i32> {a}, {b}")),
                    IntegerBinaryOp::And => self.f.emit(format!("and <4 x i32> {a}, {b}")),
                    IntegerBinaryOp::Or => self.f.emit(format!("or <4 x i32> {a}, {b}")),
                    IntegerBinaryOp::Xor => self.f.emit(format!("xor <4 x i32> {a}, {b}")),
                    IntegerBinaryOp::IShl | IntegerBinaryOp::IShr | IntegerBinaryOp::UShr => {
                        // Shift counts use the low 5 bits only.
                        let masked = self.f.emit(format!(
                            "and <4 x i32> {b}, <i32 31, i32 31, i32 31, i32 31>"
                        ));
                        let opcode = match op {
                            IntegerBinaryOp::IShl => "shl",
                            IntegerBinaryOp::IShr => "ashr",
                            _ => "lshr",
                        };
                        self.f
                            .emit(format!("{opcode} <4 x i32> {a}, {masked}"))
                    }
                    IntegerBinaryOp::UMin
                    | IntegerBinaryOp::UMax
                    | IntegerBinaryOp::IMin
                    | IntegerBinaryOp::IMax => {
                        let pred = match op {
                            IntegerBinaryOp::UMin => "ult",
                            IntegerBinaryOp::UMax => "ugt",
                            IntegerBinaryOp::IMin => "slt",
                            _ => "sgt",
                        };
                        let flags = self.f.emit(format!("icmp {pred} <4 x i32> {a}, {b}"));
                        self.f.emit(format!(
                            "select <4 x i1> {flags}, <4 x i32> {a}, <4 x i32> {b}"
                        ))
                    }
                };
                self.store_dst(dst, value, DataType::Integer, None)
            }
            Instruction::IntegerBinaryTwoDst {
                common,
                op,
                dst_hi,
                dst_lo,
                src0,
                src1,
            } => {
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let (hi, lo) = match op {
                    IntegerBinaryOpWithTwoDst::IMul => {
                        let hi = self.call(
                            "<4 x i32>",
                            "air.mul_hi.s.v4i32",
                            &[("<4 x i32>".into(), a.clone()), ("<4 x i32>".into(), b.clone())],
                        );
                        let lo = self.f.emit(format!("mul <4 x i32> {a}, {b}"));
                        (hi, lo)
                    }
                    IntegerBinaryOpWithTwoDst::UMul => {
                        let hi = self.call(
                            "<4 x i32>",
                            "air.mul_hi.u.v4i32",
                            &[("<4 x i32>".into(), a.clone()), ("<4 x i32>".into(), b.clone())],
                        );
                        let lo = self.f.emit(format!("mul <4 x i32> {a}, {b}"));
                        (hi, lo)
                    }
                    IntegerBinaryOpWithTwoDst::UDiv => {
                        let quot = self.f.emit(format!("udiv <4 x i32> {a}, {b}"));
                        let rem = self.f.emit(format!("urem <4 x i32> {a}, {b}"));
                        (quot, rem)
                    }
                    IntegerBinaryOpWithTwoDst::UAddCarry => {
                        let sum = self.f.emit(format!("add <4 x i32> {a}, {b}"));
                        let flags = self.f.emit(format!("icmp ult <4 x i32> {sum}, {a}"));
                        let carry = self
                            .f
                            .emit(format!("zext <4 x i1> {flags} to <4 x i32>"));
                        (sum, carry)
                    }
                    IntegerBinaryOpWithTwoDst::USubBorrow => {
                        let diff = self.f.emit(format!("sub <4 x i32> {a}, {b}"));
                        let flags = self.f.emit(format!("icmp ult <4 x i32> {a}, {b}"));
                        let borrow = self
                            .f
                            .emit(format!("zext <4 x i1> {flags} to <4 x i32>"));
                        (diff, borrow)
                    }
                };
                self.store_dst(dst_hi, hi, DataType::Integer, Some(common))?;
                self.store_dst(dst_lo, lo, DataType::Integer, Some(common))
            }
            Instruction::FloatMad {
                common,
                dst,
                src0,
                src1,
                src2,
            } => {
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let c = self.load_src(src2)?;
                let value = self.call(
                    "<4 x float>",
                    "air.fma.v4f32",
                    &[
                        ("<4 x float>".into(), a),
                        ("<4 x float>".into(), b),
                        ("<4 x float>".into(), c),
                    ],
                );
                self.store_dst(dst, value, DataType::Float, Some(common))
            }
            Instruction::IntegerMad {
                dst,
                src0,
                src1,
                src2,
                ..
            } => {
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let c = self.load_src(src2)?;
                let product = self.f.emit(format!("mul <4 x i32> {a}, {b}"));
                let value = self.f.emit(format!("add <4 x i32> {product}, {c}"));
                self.store_dst(dst, value, DataType::Integer, None)
            }
            Instruction::MaskedSumOfAbsDiff {
                dst,
                src0,
                src1,
                src2,
            } => {
                let a = self.load_src(src0)?;
                let b = self.load_src(src1)?;
                let c = self.load_src(src2)?;
                let value = self.call(
                    "<4 x i32>",
                    "air.msad.v4i32",
                    &[
                        ("<4 x i32>".into(), a),
                        ("<4 x i32>".into(), b),
                        ("<4 x i32>".into(), c),
                    ],
                );
                self.store_dst(dst, value, DataType::Integer, None)
            }
            Instruction::ExtractBits {
                dst,
                src0,
                src1,
                src2,
                is_signed,
            } => {
                let width = self.load_src(src0)?;
                let offset = self.load_src(src1)?;
                let value = self.load_src(src2)?;
                let name = if *is_signed {
                    "air.ibfe.v4i32"
                } else {
                    "air.ubfe.v4i32"
                };
                let result = self.call(
                    "<4 x i32>",
                    name,
                    &[
                        ("<4 x i32>".into(), value),
                        ("<4 x i32>".into(), offset),
                        ("<4 x i32>".into(), width),
                    ],
                );
                self.store_dst(dst, result, DataType::Integer, None)
            }
            Instruction::BitFieldInsert {
                dst,
                src0,
                src1,
                src2,
                src3,
            } => {
                let width = self.load_src(src0)?;
                let offset = self.load_src(src1)?;
                let insert = self.load_src(src2)?;
                let base = self.load_src(src3)?;
                let result = self.call(
                    "<4 x i32>",
                    "air.bfi.v4i32",
                    &[
                        ("<4 x i32>".into(), base),
                        ("<4 x i32>".into(), insert),
                        ("<4 x i32>".into(), offset),
                        ("<4 x i32>".into(), width),
                    ],
                );
                self.store_dst(dst, result, DataType::Integer, None)
            }

            Instruction::Sample {
                dst,
                src_address,
                src_resource,
                src_sampler,
                offsets,
                min_lod_clamp,
                feedback,
            } => {
                self.emit_sample(
                    dst,
                    src_address,
                    src_resource,
                    src_sampler,
                    *offsets,
                    min_lod_clamp,
                    feedback,
                    SampleKind::Implicit,
                )
            }
            Instruction::SampleBias {
                dst,
                src_address,
                src_resource,
                src_sampler,
                src_bias,
                offsets,
                min_lod_clamp,
                feedback,
            } => {
                let bias = self.load_src(src_bias)?;
                let bias = self.extract_x("float", &bias);
                self.emit_sample(
                    dst,
                    src_address,
                    src_resource,
                    src_sampler,
                    *offsets,
                    min_lod_clamp,
                    feedback,
                    SampleKind::Bias(bias),
                )
            }
            Instruction::SampleLod {
                dst,
                src_address,
                src_resource,
                src_sampler,
                src_lod,
                offsets,
                feedback,
            } => {
                let lod = self.load_src(src_lod)?;
                let lod = self.extract_x("float", &lod);
                self.emit_sample(
                    dst,
                    src_address,
                    src_resource,
                    src_sampler,
                    *offsets,
                    &None,
                    feedback,
                    SampleKind::Level(lod),
                )
            }
            Instruction::SampleDerivative {
                dst,
                src_address,
                src_resource,
                src_sampler,
                src_x_derivative,
                src_y_derivative,
                offsets,
                min_lod_clamp,
                feedback,
            } => {
                let dx = self.load_src(src_x_derivative)?;
                let dy = self.load_src(src_y_derivative)?;
                self.emit_sample(
                    dst,
                    src_address,
                    src_resource,
                    src_sampler,
                    *offsets,
                    min_lod_clamp,
                    feedback,
                    SampleKind::Gradient(dx, dy),
                )
            }
            Instruction::SampleCompare {
                dst,
                src_address,
                src_resource,
                src_sampler,
                src_reference,
                offsets,
                min_lod_clamp,
                feedback,
                level_zero,
            } => {
                let arity = coord_arity(self.srv_kind(src_resource.range_id));
                let suffix = texture_suffix(self.srv_kind(src_resource.range_id));
                let tex = self.srv_arg(src_resource.range_id)?;
                let sampler = self.sampler_arg(src_sampler)?;
                let address = self.load_src(src_address)?;
                let (coord_ty, coords) = self.float_coords(&address, arity);
                let reference = self.load_src(src_reference)?;
                let dref = self.extract_x("float", &reference);
                let (off_ty, off) = Self::offsets_constant(*offsets);
                let clamp = match min_lod_clamp {
                    Some(op) => {
                        let v = self.load_src(op)?;
                        self.extract_x("float", &v)
                    }
                    None => format!("{}", float_constant(0.0)),
                };
                let lz = if *level_zero { 1 } else { 0 };
                let result = self.call(
                    "float",
                    &format!("air.sample_compare_{suffix}.f32"),
                    &[
                        ("ptr".into(), tex),
                        ("ptr".into(), sampler),
                        (coord_ty, coords),
                        ("float".into(), dref),
                        (off_ty, off),
                        ("i1".into(), format!("{lz}")),
                        ("float".into(), clamp),
                    ],
                );
                let value = self.splat("float", &result);
                let value =
                    self.apply_read_swizzle(&value, src_resource.read_swizzle, DataType::Float);
                self.store_feedback(feedback)?;
                self.store_dst(dst, value, DataType::Float, None)
            }
            Instruction::Gather {
                dst,
                src_address,
                src_resource,
                src_sampler,
                offset,
                feedback,
            } => {
                let kind = self.srv_kind(src_resource.range_id);
                let suffix = texture_suffix(kind);
                let (ret_ty, ret_suffix) = Self::result_type(dst.modifier().write_type);
                let tex = self.srv_arg(src_resource.range_id)?;
                let sampler_arg = self.sampler_arg(src_sampler)?;
                let address = self.load_src(src_address)?;
                let (coord_ty, coords) = self.float_coords(&address, coord_arity(kind));
                let off_vec = self.load_src_as(offset, DataType::Integer)?;
                let channel = src_sampler.gather_channel;
                let result = self.call(
                    ret_ty,
                    &format!("air.gather_{suffix}.{ret_suffix}"),
                    &[
                        ("ptr".into(), tex),
                        ("ptr".into(), sampler_arg),
                        (coord_ty, coords),
                        ("<4 x i32>".into(), off_vec),
                        ("i32".into(), format!("{channel}")),
                    ],
                );
                let value = self.apply_read_swizzle(
                    &result,
                    src_resource.read_swizzle,
                    dst.modifier().write_type,
                );
                self.store_feedback(feedback)?;
                self.store_dst(dst, value, dst.modifier().write_type, None)
            }
            Instruction::GatherCompare {
                dst,
                src_address,
                src_resource,
                src_sampler,
                src_reference,
                offset,
                feedback,
            } => {
                let kind = self.srv_kind(src_resource.range_id);
                let suffix = texture_suffix(kind);
                let tex = self.srv_arg(src_resource.range_id)?;
                let sampler_arg = self.sampler_arg(src_sampler)?;
                let address = self.load_src(src_address)?;
                let (coord_ty, coords) = self.float_coords(&address, coord_arity(kind));
                let reference = self.load_src(src_reference)?;
                let dref = self.extract_x("float", &reference);
                let off_vec = self.load_src_as(offset, DataType::Integer)?;
                let result = self.call(
                    "<4 x float>",
                    &format!("air.gather_compare_{suffix}.v4f32"),
                    &[
                        ("ptr".into(), tex),
                        ("ptr".into(), sampler_arg),
                        (coord_ty, coords),
                        ("float".into(), dref),
                        ("<4 x i32>".into(), off_vec),
                    ],
                );
                let value =
                    self.apply_read_swizzle(&result, src_resource.read_swizzle, DataType::Float);
                self.store_feedback(feedback)?;
                self.store_dst(dst, value, DataType::Float, None)
            }
            Instruction::SampleInfo {
                dst,
                src,
                uint_result,
                read_swizzle,
            } => {
                let count = match src {
                    Some(srv) => {
                        let tex = self.srv_arg(srv.range_id)?;
                        self.call(
                            "i32",
                            "air.get_num_samples",
                            &[("ptr".into(), tex)],
                        )
                    }
                    None => self.call("i32", "air.get_render_target_sample_count", &[]),
                };
                let vec = self.splat("i32", &count);
                let vec = self.apply_read_swizzle(&vec, *read_swizzle, DataType::Integer);
                if *uint_result {
                    self.store_dst(dst, vec, DataType::Integer, None)
                } else {
                    let value = self
                        .f
                        .emit(format!("uitofp <4 x i32> {vec} to <4 x float>"));
                    self.store_dst(dst, value, DataType::Float, None)
                }
            }
            Instruction::SamplePos {
                dst,
                src,
                src_sample_index,
                read_swizzle,
            } => {
                let index = self.load_scalar(src_sample_index)?;
                let position = match src {
                    Some(srv) => {
                        let tex = self.srv_arg(srv.range_id)?;
                        self.call(
                            "<2 x float>",
                            "air.get_sample_position",
                            &[("ptr".into(), tex), ("i32".into(), index)],
                        )
                    }
                    None => self.call(
                        "<2 x float>",
                        "air.get_render_target_sample_position",
                        &[("i32".into(), index)],
                    ),
                };
                let widened = self.f.emit(format!(
                    "shufflevector <2 x float> {position}, <2 x float> zeroinitializer, <4 x i32> <i32 0, i32 1, i32 2, i32 3>"
                ));
                let value = self.apply_read_swizzle(&widened, *read_swizzle, DataType::Float);
                self.store_dst(dst, value, DataType::Float, None)
            }
            Instruction::BufferInfo { dst, src } => {
                let (size, stride) = match src {
                    SrvOrUav::Srv(srv) => (
                        self.srv_size_args
                            .get(&srv.range_id)
                            .cloned()
                            .ok_or_else(|| Error::Codegen {
                                what: format!("bufinfo on non-buffer t{}", srv.range_id),
                            })?,
                        self.program
                            .info
                            .srvs
                            .get(&srv.range_id)
                            .and_then(|s| s.structure_stride)
                            .unwrap_or(0),
                    ),
                    SrvOrUav::Uav(uav) => (
                        self.uav_size_args
                            .get(&uav.range_id)
                            .cloned()
                            .ok_or_else(|| Error::Codegen {
                                what: format!("bufinfo on non-buffer u{}", uav.range_id),
                            })?,
                        self.program
                            .info
                            .uavs
                            .get(&uav.range_id)
                            .and_then(|u| u.structure_stride)
                            .unwrap_or(0),
                    ),
                };
                let result = if stride > 0 {
                    self.f.emit(format!("udiv i32 {size}, {stride}"))
                } else {
                    size
                };
                let value = self.splat("i32", &result);
                self.store_dst(dst, value, DataType::Integer, None)
            }
            Instruction::ResourceInfo {
                dst,
                src_mip_level,
                src_resource,
                modifier,
            } => self.emit_resinfo(dst, src_mip_level, src_resource, *modifier),
            Instruction::Load {
                dst,
                src_address,
                src_resource,
                src_sample_index,
                offsets,
            } => {
                let kind = self.srv_kind(src_resource.range_id);
                let suffix = texture_suffix(kind);
                let (ret_ty, ret_suffix) = Self::result_type(dst.modifier().write_type);
                let tex = self.srv_arg(src_resource.range_id)?;
                let mut address = self.load_src(src_address)?;
                if *offsets != [0; 3] {
                    let (_, off) = Self::offsets_constant(*offsets);
                    address = self.f.emit(format!("add <4 x i32> {address}, {off}"));
                }
                let (coord_ty, coords) = self.int_coords(&address, coord_arity(kind));
                // The fourth address lane carries the mip level; for
                // multisampled resources the sample index replaces it.
                let level_or_sample = match src_sample_index {
                    Some(op) => self.load_scalar(op)?,
                    None => self
                        .f
                        .emit(format!("extractelement <4 x i32> {address}, i32 3")),
                };
                let result = self.call(
                    ret_ty,
                    &format!("air.read_{suffix}.{ret_suffix}"),
                    &[
                        ("ptr".into(), tex),
                        (coord_ty, coords),
                        ("i32".into(), level_or_sample),
                    ],
                );
                let value = self.apply_read_swizzle(
                    &result,
                    src_resource.read_swizzle,
                    dst.modifier().write_type,
                );
                self.store_dst(dst, value, dst.modifier().write_type, None)
            }
            Instruction::LoadUavTyped {
                dst,
                src_address,
                src_uav,
            } => {
                let kind = self.uav_kind(src_uav.range_id);
                let suffix = texture_suffix(kind);
                let (ret_ty, ret_suffix) = Self::result_type(dst.modifier().write_type);
                let tex = self.uav_arg(src_uav.range_id)?;
                let address = self.load_src(src_address)?;
                let (coord_ty, coords) = self.int_coords(&address, coord_arity(kind));
                let result = self.call(
                    ret_ty,
                    &format!("air.read_{suffix}.{ret_suffix}"),
                    &[
                        ("ptr".into(), tex),
                        (coord_ty, coords),
                        ("i32".into(), "0".into()),
                    ],
                );
                let value = self.apply_read_swizzle(
                    &result,
                    src_uav.read_swizzle,
                    dst.modifier().write_type,
                );
                self.store_dst(dst, value, dst.modifier().write_type, None)
            }
            Instruction::StoreUavTyped {
                dst,
                src_address,
                src,
            } => {
                let kind = self.uav_kind(dst.range_id);
                let suffix = texture_suffix(kind);
                let tex = self.uav_arg(dst.range_id)?;
                let address = self.load_src(src_address)?;
                let (coord_ty, coords) = self.int_coords(&address, coord_arity(kind));
                let value = self.load_src(src)?;
                let (value_ty, value_suffix) = Self::result_type(src.modifier().read_type);
                self.call(
                    "void",
                    &format!("air.write_{suffix}.{value_suffix}"),
                    &[
                        ("ptr".into(), tex),
                        (coord_ty, coords),
                        (value_ty.into(), value),
                    ],
                );
                Ok(())
            }
            Instruction::LoadRaw {
                dst,
                src_byte_offset,
                src,
                offset_is_vec4_aligned,
            } => {
                let swizzle = typeless_swizzle(src);
                let (base, addrspace, _) = self.typeless_ptr(src)?;
                let offset = self.load_scalar(src_byte_offset)?;
                let index = self.dword_index(&offset);
                let value = self.raw_load(
                    &base,
                    addrspace,
                    &index,
                    dst.modifier().mask,
                    *offset_is_vec4_aligned,
                );
                let value = self.apply_read_swizzle(&value, swizzle, DataType::Integer);
                self.store_dst(dst, value, DataType::Integer, None)
            }
            Instruction::LoadStructured {
                dst,
                src_address,
                src_byte_offset,
                src,
                offset_is_vec4_aligned,
            } => {
                let swizzle = typeless_swizzle(src);
                let (base, addrspace, stride) = self.typeless_ptr(src)?;
                let element = self.load_scalar(src_address)?;
                let offset = self.load_scalar(src_byte_offset)?;
                let byte_base = self
                    .f
                    .emit(format!("mul i32 {element}, {}", stride.max(4)));
                let byte = self.f.emit(format!("add i32 {byte_base}, {offset}"));
                let index = self.dword_index(&byte);
                let aligned = *offset_is_vec4_aligned && stride % 16 == 0;
                let value =
                    self.raw_load(&base, addrspace, &index, dst.modifier().mask, aligned);
                let value = self.apply_read_swizzle(&value, swizzle, DataType::Integer);
                self.store_dst(dst, value, DataType::Integer, None)
            }
            Instruction::StoreRaw {
                dst,
                dst_byte_offset,
                src,
            } => {
                let (base, addrspace, mask) = self.atomic_store_target(dst)?;
                let offset = self.load_scalar(dst_byte_offset)?;
                let index = self.dword_index(&offset);
                let value = self.load_src_as(src, DataType::Integer)?;
                self.raw_store(&base, addrspace, &index, &value, mask);
                Ok(())
            }
            Instruction::StoreStructured {
                dst,
                dst_address,
                dst_byte_offset,
                src,
            } => {
                let (base, addrspace, mask) = self.atomic_store_target(dst)?;
                let stride = self.atomic_dst_stride(dst);
                let element = self.load_scalar(dst_address)?;
                let offset = self.load_scalar(dst_byte_offset)?;
                let byte_base = self
                    .f
                    .emit(format!("mul i32 {element}, {}", stride.max(4)));
                let byte = self.f.emit(format!("add i32 {byte_base}, {offset}"));
                let index = self.dword_index(&byte);
                let value = self.load_src_as(src, DataType::Integer)?;
                self.raw_store(&base, addrspace, &index, &value, mask);
                Ok(())
            }
            Instruction::PixelDiscard => {
                self.call("void", "air.discard_fragment", &[]);
                Ok(())
            }
            Instruction::PartialDerivative {
                common,
                dst,
                src,
                ddy,
                coarse,
            } => {
                let value = self.load_src(src)?;
                let axis = if *ddy { "dfdy" } else { "dfdx" };
                let precision = if *coarse { "coarse" } else { "fine" };
                let result = self.call(
                    "<4 x float>",
                    &format!("air.{axis}.{precision}.v4f32"),
                    &[("<4 x float>".into(), value)],
                );
                self.store_dst(dst, result, DataType::Float, Some(common))
            }
            Instruction::CalcLod {
                dst,
                src_address,
                src_resource,
                src_sampler,
            } => {
                let kind = self.srv_kind(src_resource.range_id);
                let suffix = texture_suffix(kind);
                let tex = self.srv_arg(src_resource.range_id)?;
                let sampler = self.sampler_arg(src_sampler)?;
                let address = self.load_src(src_address)?;
                let (coord_ty, coords) = self.float_coords(&address, coord_arity(kind));
                let lod = self.call(
                    "<2 x float>",
                    &format!("air.calculate_lod_{suffix}.v2f32"),
                    &[("ptr".into(), tex), ("ptr".into(), sampler), (coord_ty, coords)],
                );
                let widened = self.f.emit(format!(
                    "shufflevector <2 x float> {lod}, <2 x float> zeroinitializer, <4 x i32> <i32 0, i32 1, i32 2, i32 3>"
                ));
                let value = self.apply_read_swizzle(
                    &widened,
                    src_resource.read_swizzle,
                    DataType::Float,
                );
                self.store_dst(dst, value, DataType::Float, None)
            }
            Instruction::Sync {
                uav_boundary,
                tgsm_memory_barrier,
                ..
            } => {
                // mem_flags: device | threadgroup, after Metal's
                // mem_flags encoding.
                let mut flags = 0;
                if *tgsm_memory_barrier {
                    flags |= 2;
                }
                if !matches!(uav_boundary, UavBoundary::None) {
                    flags |= 1;
                }
                self.call(
                    "void",
                    "air.wg.barrier",
                    &[("i32".into(), format!("{flags}")), ("i32".into(), "1".into())],
                );
                Ok(())
            }
            Instruction::AtomicBinOp {
                op,
                dst,
                dst_address,
                src,
                dst_original,
            } => {
                let address = self.load_src_as(dst_address, DataType::Integer)?;
                let (ptr, ns) = self.atomic_dst_ptr(dst, &address)?;
                let addrspace = Self::atomic_addrspace(ns);
                let operand = self.load_src_as(src, DataType::Integer)?;
                let operand = self.extract_x("i32", &operand);
                let name = match op {
                    AtomicBinaryOp::And => "and",
                    AtomicBinaryOp::Or => "or",
                    AtomicBinaryOp::Xor => "xor",
                    AtomicBinaryOp::Add => "add",
                    AtomicBinaryOp::IMax => "max.s",
                    AtomicBinaryOp::IMin => "min.s",
                    AtomicBinaryOp::UMax => "max.u",
                    AtomicBinaryOp::UMin => "min.u",
                    AtomicBinaryOp::Exchange => "xchg",
                };
                let old = self.call(
                    "i32",
                    &format!("{ns}.{name}.i32"),
                    &[
                        (format!("ptr {addrspace}"), ptr),
                        ("i32".into(), operand),
                    ],
                );
                let value = self.splat("i32", &old);
                self.store_dst(dst_original, value, DataType::Integer, None)
            }
            Instruction::AtomicImmCmpExchange {
                dst,
                dst_resource,
                dst_address,
                src0,
                src1,
            } => {
                let address = self.load_src_as(dst_address, DataType::Integer)?;
                let (ptr, ns) = self.atomic_dst_ptr(dst_resource, &address)?;
                let addrspace = Self::atomic_addrspace(ns);
                let compare = self.load_src_as(src0, DataType::Integer)?;
                let compare = self.extract_x("i32", &compare);
                let value = self.load_src_as(src1, DataType::Integer)?;
                let value = self.extract_x("i32", &value);
                let old = self.call(
                    "i32",
                    &format!("{ns}.cmpxchg.i32"),
                    &[
                        (format!("ptr {addrspace}"), ptr),
                        ("i32".into(), compare),
                        ("i32".into(), value),
                    ],
                );
                let result = self.splat("i32", &old);
                self.store_dst(dst, result, DataType::Integer, None)
            }
            Instruction::AtomicImmIncrement { dst, uav } => {
                let counter = self.counter_arg(uav)?;
                let old = self.call(
                    "i32",
                    "air.atomic.global.add.i32",
                    &[("ptr addrspace(1)".into(), counter), ("i32".into(), "1".into())],
                );
                let value = self.splat("i32", &old);
                self.store_dst(dst, value, DataType::Integer, None)
            }
            Instruction::AtomicImmDecrement { dst, uav } => {
                let counter = self.counter_arg(uav)?;
                let old = self.call(
                    "i32",
                    "air.atomic.global.sub.i32",
                    &[("ptr addrspace(1)".into(), counter), ("i32".into(), "1".into())],
                );
                // The instruction reports the post-decrement value.
                let new = self.f.emit(format!("sub i32 {old}, 1"));
                let value = self.splat("i32", &new);
                self.store_dst(dst, value, DataType::Integer, None)
            }
            Instruction::Emit => {
                let payload = self.payload.clone().unwrap_or_else(|| "null".into());
                let outputs = self.outputs.clone();
                self.call(
                    "void",
                    "air.geometry.emit_vertex",
                    &[
                        ("ptr addrspace(1)".into(), payload),
                        ("ptr".into(), outputs),
                        (
                            "i32".into(),
                            format!("{}", self.program.stage.gs_max_vertex_output),
                        ),
                    ],
                );
                Ok(())
            }
            Instruction::Cut => {
                let payload = self.payload.clone().unwrap_or_else(|| "null".into());
                self.call(
                    "void",
                    "air.geometry.end_primitive",
                    &[("ptr addrspace(1)".into(), payload)],
                );
                Ok(())
            }
            Instruction::InterpolateCentroid {
                dst,
                reg,
                read_swizzle,
            } => {
                let result = self.call(
                    "<4 x float>",
                    "air.interpolate_at_centroid.v4f32",
                    &[("ptr".into(), format!("%in{reg}"))],
                );
                let value = self.apply_read_swizzle(&result, *read_swizzle, DataType::Float);
                self.store_dst(dst, value, DataType::Float, None)
            }
            Instruction::InterpolateSample {
                dst,
                sample_index,
                reg,
                read_swizzle,
            } => {
                let index = self.load_scalar(sample_index)?;
                let result = self.call(
                    "<4 x float>",
                    "air.interpolate_at_sample.v4f32",
                    &[("ptr".into(), format!("%in{reg}")), ("i32".into(), index)],
                );
                let value = self.apply_read_swizzle(&result, *read_swizzle, DataType::Float);
                self.store_dst(dst, value, DataType::Float, None)
            }
            Instruction::InterpolateOffset {
                dst,
                offset,
                reg,
                read_swizzle,
            } => {
                let off = self.load_src_as(offset, DataType::Integer)?;
                let x = self.extract_x("i32", &off);
                let y = self
                    .f
                    .emit(format!("extractelement <4 x i32> {off}, i32 1"));
                let result = self.call(
                    "<4 x float>",
                    "air.interpolate_at_offset.v4f32",
                    &[
                        ("ptr".into(), format!("%in{reg}")),
                        ("i32".into(), x),
                        ("i32".into(), y),
                    ],
                );
                let value = self.apply_read_swizzle(&result, *read_swizzle, DataType::Float);
                self.store_dst(dst, value, DataType::Float, None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_sample(
        &mut self,
        dst: &DstOperand,
        src_address: &SrcOperand,
        src_resource: &SrvRef,
        src_sampler: &SamplerRef,
        offsets: [i32; 3],
        min_lod_clamp: &Option<SrcOperand>,
        feedback: &Option<DstOperand>,
        kind: SampleKind,
    ) -> Result<(), Error> {
        let resource_kind = self.srv_kind(src_resource.range_id);
        let suffix = texture_suffix(resource_kind);
        let (ret_ty, ret_suffix) = Self::result_type(dst.modifier().write_type);
        let tex = self.srv_arg(src_resource.range_id)?;
        let sampler = self.sampler_arg(src_sampler)?;
        let address = self.load_src(src_address)?;
        let (coord_ty, coords) = self.float_coords(&address, coord_arity(resource_kind));
        let (off_ty, off) = Self::offsets_constant(offsets);
        let clamp = match min_lod_clamp {
            Some(op) => {
                let v = self.load_src(op)?;
                self.extract_x("float", &v)
            }
            None => float_constant(0.0),
        };

        let mut args: Vec<(String, String)> = vec![
            ("ptr".into(), tex),
            ("ptr".into(), sampler),
            (coord_ty, coords),
            (off_ty, off),
        ];
        let name = match kind {
            SampleKind::Implicit => format!("air.sample_{suffix}.{ret_suffix}"),
            SampleKind::Bias(bias) => {
                args.push(("float".into(), bias));
                format!("air.sample_bias_{suffix}.{ret_suffix}")
            }
            SampleKind::Level(level) => {
                args.push(("float".into(), level));
                format!("air.sample_level_{suffix}.{ret_suffix}")
            }
            SampleKind::Gradient(dx, dy) => {
                args.push(("<4 x float>".into(), dx));
                args.push(("<4 x float>".into(), dy));
                format!("air.sample_grad_{suffix}.{ret_suffix}")
            }
        };
        args.push(("float".into(), clamp));

        let result = self.call(ret_ty, &name, &args);
        let value = self.apply_read_swizzle(
            &result,
            src_resource.read_swizzle,
            dst.modifier().write_type,
        );
        self.store_feedback(feedback)?;
        self.store_dst(dst, value, dst.modifier().write_type, None)
    }

    fn emit_resinfo(
        &mut self,
        dst: &DstOperand,
        src_mip_level: &SrcOperand,
        src_resource: &SrvOrUav,
        modifier: ResInfoModifier,
    ) -> Result<(), Error> {
        let tex = match src_resource {
            SrvOrUav::Srv(srv) => self.srv_arg(srv.range_id)?,
            SrvOrUav::Uav(uav) => self.uav_arg(uav.range_id)?,
        };
        let mip = self.load_scalar(src_mip_level)?;

        let width = self.call(
            "i32",
            "air.get_width",
            &[("ptr".into(), tex.clone()), ("i32".into(), mip.clone())],
        );
        let height = self.call(
            "i32",
            "air.get_height",
            &[("ptr".into(), tex.clone()), ("i32".into(), mip.clone())],
        );
        let depth = self.call(
            "i32",
            "air.get_depth",
            &[("ptr".into(), tex.clone()), ("i32".into(), mip)],
        );
        let mips = self.call("i32", "air.get_num_mip_levels", &[("ptr".into(), tex)]);

        let mut vec = self
            .f
            .emit(format!("insertelement <4 x i32> undef, i32 {width}, i32 0"));
        vec = self
            .f
            .emit(format!("insertelement <4 x i32> {vec}, i32 {height}, i32 1"));
        vec = self
            .f
            .emit(format!("insertelement <4 x i32> {vec}, i32 {depth}, i32 2"));
        vec = self
            .f
            .emit(format!("insertelement <4 x i32> {vec}, i32 {mips}, i32 3"));

        let swizzle = match src_resource {
            SrvOrUav::Srv(srv) => srv.read_swizzle,
            SrvOrUav::Uav(uav) => uav.read_swizzle,
        };

        match modifier {
            ResInfoModifier::Uint => {
                let value = self.apply_read_swizzle(&vec, swizzle, DataType::Integer);
                self.store_dst(dst, value, DataType::Integer, None)
            }
            ResInfoModifier::None => {
                let floats = self
                    .f
                    .emit(format!("uitofp <4 x i32> {vec} to <4 x float>"));
                let value = self.apply_read_swizzle(&floats, swizzle, DataType::Float);
                self.store_dst(dst, value, DataType::Float, None)
            }
            ResInfoModifier::Rcp => {
                let floats = self
                    .f
                    .emit(format!("uitofp <4 x i32> {vec} to <4 x float>"));
                let one = float_constant(1.0);
                let rcp = self.f.emit(format!(
                    "fdiv <4 x float> <float {one}, float {one}, float {one}, float {one}>, {floats}"
                ));
                let value = self.apply_read_swizzle(&rcp, swizzle, DataType::Float);
                self.store_dst(dst, value, DataType::Float, None)
            }
        }
    }

    fn counter_arg(&self, uav: &AtomicUavDst) -> Result<String, Error> {
        self.uav_counter_args
            .get(&uav.range_id)
            .cloned()
            .ok_or_else(|| Error::Codegen {
                what: format!("UAV u{} has no counter binding", uav.range_id),
            })
    }

    fn atomic_store_target(
        &mut self,
        dst: &AtomicDst,
    ) -> Result<(String, &'static str, u8), Error> {
        match dst {
            AtomicDst::Uav(uav) => Ok((self.uav_arg(uav.range_id)?, "addrspace(1)", uav.mask)),
            AtomicDst::Tgsm(tgsm) => {
                let (base, _) = self.tgsm_base(tgsm.id)?;
                Ok((base, "addrspace(3)", tgsm.mask))
            }
        }
    }

    fn atomic_dst_stride(&self, dst: &AtomicDst) -> u32 {
        match dst {
            AtomicDst::Uav(uav) => self
                .program
                .info
                .uavs
                .get(&uav.range_id)
                .and_then(|u| u.structure_stride)
                .unwrap_or(0),
            AtomicDst::Tgsm(tgsm) => self
                .program
                .info
                .tgsm
                .get(&tgsm.id)
                .map(|t| t.stride)
                .unwrap_or(0),
        }
    }

    /// Loads up to four consecutive dwords starting at `index`. An
    /// aligned full-mask load collapses to one 128-bit access.
    fn raw_load(
        &mut self,
        base: &str,
        addrspace: &str,
        index: &str,
        mask: u8,
        vec4_aligned: bool,
    ) -> String {
        if vec4_aligned && mask == 0b1111 {
            let gep = self.f.emit(format!(
                "getelementptr i32, ptr {addrspace} {base}, i32 {index}"
            ));
            return self.f.emit(format!(
                "load <4 x i32>, ptr {addrspace} {gep}, align 16"
            ));
        }
        let mut vec = "undef".to_string();
        for lane in 0..4u8 {
            if mask & (1 << lane) == 0 {
                continue;
            }
            let offset = if lane == 0 {
                index.to_string()
            } else {
                self.f.emit(format!("add i32 {index}, {lane}"))
            };
            let gep = self.f.emit(format!(
                "getelementptr i32, ptr {addrspace} {base}, i32 {offset}"
            ));
            let scalar = self
                .f
                .emit(format!("load i32, ptr {addrspace} {gep}, align 4"));
            vec = self.f.emit(format!(
                "insertelement <4 x i32> {vec}, i32 {scalar}, i32 {lane}"
            ));
        }
        vec
    }

    fn raw_store(&mut self, base: &str, addrspace: &str, index: &str, value: &str, mask: u8) {
        let mut lane_cursor = 0u8;
        for lane in 0..4u8 {
            if mask & (1 << lane) == 0 {
                continue;
            }
            let scalar = self.f.emit(format!(
                "extractelement <4 x i32> {value}, i32 {lane}"
            ));
            let offset = if lane_cursor == 0 {
                index.to_string()
            } else {
                self.f.emit(format!("add i32 {index}, {lane_cursor}"))
            };
            let gep = self.f.emit(format!(
                "getelementptr i32, ptr {addrspace} {base}, i32 {offset}"
            ));
            self.f
                .emit_void(format!("store i32 {scalar}, ptr {addrspace} {gep}, align 4"));
            lane_cursor += 1;
        }
    }

    fn unary_intrinsic(&mut self, name: &str, value: String) -> String {
        self.call("<4 x float>", name, &[("<4 x float>".into(), value)])
    }

    fn int_unary_intrinsic(&mut self, name: &str, value: String) -> String {
        self.call("<4 x i32>", name, &[("<4 x i32>".into(), value)])
    }

    /// The pass-through geometry body copies the recorded vertex
    /// outputs into the output strip per the declared topology.
    fn emit_passthrough_body(&mut self) {
        let payload = self.payload.clone().unwrap_or_else(|| "null".into());
        let vertices_per_primitive = match self.program.stage.gs_input_primitive {
            air_dxbc::sm50::GsInputPrimitive::Point => 1,
            air_dxbc::sm50::GsInputPrimitive::Line
            | air_dxbc::sm50::GsInputPrimitive::LineAdj => 2,
            _ => 3,
        };
        let tid = self
            .attributes
            .get(&InputAttribute::ThreadIdInGroupFlattened)
            .cloned()
            .unwrap_or_else(|| "0".into());
        for vertex in 0..vertices_per_primitive {
            let base = self
                .f
                .emit(format!("mul i32 {tid}, {vertices_per_primitive}"));
            let index = self.f.emit(format!("add i32 {base}, {vertex}"));
            self.call(
                "void",
                "air.mesh.set_vertex",
                &[
                    ("ptr addrspace(1)".into(), payload.clone()),
                    ("i32".into(), index),
                ],
            );
        }
        self.call(
            "void",
            "air.mesh.set_primitive",
            &[
                ("ptr addrspace(1)".into(), payload),
                ("i32".into(), tid),
            ],
        );
        self.f.emit_void("ret void");
    }

    fn emit_metadata(&mut self) {
        let refs: Vec<String> = self.arg_metadata.iter().map(|n| format!("!{n}")).collect();
        let args_node = self.module.metadata(format!("!{{{}}}", refs.join(", ")));

        let mut extra = String::new();
        if matches!(
            self.stage,
            FunctionStage::Kernel | FunctionStage::HullObject | FunctionStage::GeometryObject
        ) {
            let [x, y, z] = match self.stage {
                FunctionStage::Kernel => self.program.stage.threadgroup_size,
                _ => [
                    self.program.stage.hull_maximum_threads_per_patch.max(1),
                    1,
                    1,
                ],
            };
            let node = self.module.metadata(format!(
                "!{{!\"air.max_total_threads_per_threadgroup\", i32 {}}}",
                x * y * z
            ));
            extra = format!(", !{node}");
        }
        if self.program.info.use_cmp_exch {
            let node = self
                .module
                .metadata("!{!\"air.compare_exchange_weak\", i1 true}");
            extra.push_str(&format!(", !{node}"));
        }
        if self.program.info.force_early_depth_stencil && self.stage == FunctionStage::Fragment {
            let node = self
                .module
                .metadata("!{!\"air.early_fragment_tests\", i1 true}");
            extra.push_str(&format!(", !{node}"));
        }

        let fn_node = self.module.metadata(format!(
            "!{{ptr @{}, !{args_node}{extra}}}",
            self.function_name
        ));
        self.module
            .named_metadata(format!("!{}", self.stage.air_stage()), vec![fn_node]);
    }
}

enum SampleKind {
    Implicit,
    Bias(String),
    Level(String),
    Gradient(String, String),
}

fn typeless_swizzle(src: &TypelessSrc) -> Swizzle {
    match src {
        TypelessSrc::Srv(SrvRef { read_swizzle, .. })
        | TypelessSrc::Uav(UavRef { read_swizzle, .. })
        | TypelessSrc::Tgsm(TgsmRef { read_swizzle, .. }) => *read_swizzle,
    }
}

fn const_vector(values: [u32; 4]) -> String {
    const_v4i32(values)
}

fn dst_of(inst: &Instruction) -> Option<&DstOperand> {
    match inst {
        Instruction::Mov { dst, .. }
        | Instruction::MovConditional { dst, .. }
        | Instruction::DotProduct { dst, .. }
        | Instruction::Convert { dst, .. }
        | Instruction::IntegerCompare { dst, .. }
        | Instruction::FloatCompare { dst, .. }
        | Instruction::FloatBinary { dst, .. }
        | Instruction::IntegerBinary { dst, .. }
        | Instruction::FloatUnary { dst, .. }
        | Instruction::IntegerUnary { dst, .. }
        | Instruction::FloatMad { dst, .. }
        | Instruction::IntegerMad { dst, .. }
        | Instruction::MaskedSumOfAbsDiff { dst, .. }
        | Instruction::ExtractBits { dst, .. }
        | Instruction::BitFieldInsert { dst, .. }
        | Instruction::Sample { dst, .. }
        | Instruction::SampleCompare { dst, .. }
        | Instruction::SampleBias { dst, .. }
        | Instruction::SampleDerivative { dst, .. }
        | Instruction::SampleLod { dst, .. }
        | Instruction::Gather { dst, .. }
        | Instruction::GatherCompare { dst, .. }
        | Instruction::SampleInfo { dst, .. }
        | Instruction::SamplePos { dst, .. }
        | Instruction::BufferInfo { dst, .. }
        | Instruction::ResourceInfo { dst, .. }
        | Instruction::Load { dst, .. }
        | Instruction::LoadUavTyped { dst, .. }
        | Instruction::LoadRaw { dst, .. }
        | Instruction::LoadStructured { dst, .. }
        | Instruction::PartialDerivative { dst, .. }
        | Instruction::CalcLod { dst, .. }
        | Instruction::AtomicImmIncrement { dst, .. }
        | Instruction::AtomicImmDecrement { dst, .. }
        | Instruction::AtomicImmCmpExchange { dst, .. }
        | Instruction::InterpolateCentroid { dst, .. }
        | Instruction::InterpolateSample { dst, .. }
        | Instruction::InterpolateOffset { dst, .. } => Some(dst),
        _ => None,
    }
}

fn texture_type_name(kind: ResourceKind, compared: bool) -> &'static str {
    if compared {
        return "depth2d_t";
    }
    match kind {
        ResourceKind::TextureBuffer => "texture_buffer_t",
        ResourceKind::Texture1D => "texture1d_t",
        ResourceKind::Texture1DArray => "texture1d_array_t",
        ResourceKind::Texture2D => "texture2d_t",
        ResourceKind::Texture2DArray => "texture2d_array_t",
        ResourceKind::Texture2DMultisampled => "texture2d_ms_t",
        ResourceKind::Texture2DMultisampledArray => "texture2d_ms_array_t",
        ResourceKind::Texture3D => "texture3d_t",
        ResourceKind::TextureCube => "texturecube_t",
        ResourceKind::TextureCubeArray => "texturecube_array_t",
        ResourceKind::NonApplicable => "device_buffer_t",
    }
}

fn texture_suffix(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::TextureBuffer | ResourceKind::NonApplicable => "texture_buffer",
        ResourceKind::Texture1D => "texture_1d",
        ResourceKind::Texture1DArray => "texture_1d_array",
        ResourceKind::Texture2D => "texture_2d",
        ResourceKind::Texture2DArray => "texture_2d_array",
        ResourceKind::Texture2DMultisampled => "texture_2d_ms",
        ResourceKind::Texture2DMultisampledArray => "texture_2d_ms_array",
        ResourceKind::Texture3D => "texture_3d",
        ResourceKind::TextureCube => "texture_cube",
        ResourceKind::TextureCubeArray => "texture_cube_array",
    }
}

fn coord_arity(kind: ResourceKind) -> usize {
    match kind {
        ResourceKind::TextureBuffer | ResourceKind::NonApplicable | ResourceKind::Texture1D => 1,
        ResourceKind::Texture1DArray
        | ResourceKind::Texture2D
        | ResourceKind::Texture2DMultisampled => 2,
        ResourceKind::Texture2DArray
        | ResourceKind::Texture2DMultisampledArray
        | ResourceKind::Texture3D
        | ResourceKind::TextureCube => 3,
        ResourceKind::TextureCubeArray => 4,
    }
}
