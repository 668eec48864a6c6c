//! Reconstructs the block graph from the structured-control-flow token
//! stream, folds hull-shader phases into instance barriers, and inlines
//! subroutine calls.

use std::collections::BTreeMap;

use air_dxbc::reader::{CustomDataClass, DeclPayload, Instruction as RawInst, ShaderCodeReader};
use air_dxbc::sm50::{
    Opcode, ProgramType, ResourceDimension, ResourceReturnType, TessellatorDomain,
    TessellatorOutputPrimitive,
};
use hashbrown::HashMap;
use slotmap::{new_key_type, SlotMap};

use crate::ir::{Condition, Instruction, SrcOperand, UavBoundary, PHASE_NONE};
use crate::lift;
use crate::reflect::{
    ConstantBufferInfo, IoDecl, PhaseInfo, ResourceKind, ResourceRange, SamplerInfo, ScalarType,
    ShaderInfo, SrvInfo, StageInfo, TgsmInfo, UavInfo,
};
use crate::Error;

new_key_type! {
    /// Handle to a block in the arena. Terminators hold keys, the arena
    /// owns the blocks; join blocks with several predecessors need no
    /// reference counting.
    pub struct BlockKey;
}

#[derive(Clone, Debug)]
pub enum Terminator {
    /// Only valid while the graph is under construction.
    Undefined,
    Return,
    Branch {
        target: BlockKey,
    },
    BranchConditional {
        cond: Condition,
        if_true: BlockKey,
        if_false: BlockKey,
    },
    Switch {
        value: SrcOperand,
        cases: BTreeMap<u32, BlockKey>,
        default: BlockKey,
    },
    /// Hull-shader phase fan-out: threads below `instance_count` run
    /// `active`, everyone meets again at `sync`.
    InstanceBarrier {
        instance_count: u32,
        active: BlockKey,
        sync: BlockKey,
    },
    /// Copies control-point outputs from threadgroup storage to payload
    /// memory before running `epilogue`.
    HullShaderWriteOutput {
        instance_count: u32,
        epilogue: BlockKey,
    },
    Call {
        func: u32,
        return_point: BlockKey,
    },
}

#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
    pub debug_name: &'static str,
}

impl BasicBlock {
    fn new(debug_name: &'static str) -> Self {
        Self {
            instructions: Vec::new(),
            terminator: Terminator::Undefined,
            debug_name,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ControlFlowGraph {
    pub blocks: SlotMap<BlockKey, BasicBlock>,
    pub entry: BlockKey,
    pub ret: BlockKey,
}

impl ControlFlowGraph {
    /// Reverse post order from the entry block. Every reachable block
    /// appears exactly once.
    pub fn reverse_post_order(&self) -> Vec<BlockKey> {
        let mut visited: HashMap<BlockKey, ()> = HashMap::new();
        let mut order = Vec::new();
        // Iterative DFS with an explicit "children done" marker.
        let mut stack = vec![(self.entry, false)];
        while let Some((key, children_done)) = stack.pop() {
            if children_done {
                order.push(key);
                continue;
            }
            if visited.contains_key(&key) {
                continue;
            }
            visited.insert(key, ());
            stack.push((key, true));
            for succ in self.successors(key) {
                if !visited.contains_key(&succ) {
                    stack.push((succ, false));
                }
            }
        }
        order.reverse();
        order
    }

    pub fn successors(&self, key: BlockKey) -> Vec<BlockKey> {
        match &self.blocks[key].terminator {
            Terminator::Undefined | Terminator::Return => Vec::new(),
            Terminator::Branch { target } => vec![*target],
            Terminator::BranchConditional {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            Terminator::Switch { cases, default, .. } => {
                let mut out: Vec<_> = cases.values().copied().collect();
                out.push(*default);
                out
            }
            Terminator::InstanceBarrier { active, sync, .. } => vec![*active, *sync],
            Terminator::HullShaderWriteOutput { epilogue, .. } => vec![*epilogue],
            Terminator::Call { return_point, .. } => vec![*return_point],
        }
    }
}

/// Everything produced by one pass over the token stream.
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    pub program_type: ProgramType,
    pub version: (u8, u8),
    pub cfg: ControlFlowGraph,
    pub info: ShaderInfo,
    pub stage: StageInfo,
}

const INLINE_DEPTH_LIMIT: u32 = 32;

fn malformed(what: impl Into<String>) -> Error {
    Error::Malformed { what: what.into() }
}

struct Builder {
    blocks: SlotMap<BlockKey, BasicBlock>,
    current: BlockKey,
    /// Swallows instructions after an unconditional exit from a
    /// structured region.
    void: BlockKey,
    ret: BlockKey,
    entry: BlockKey,

    endif_stack: Vec<BlockKey>,
    continue_stack: Vec<BlockKey>,
    break_stack: Vec<BlockKey>,
    /// Blocks whose terminator is the active `Switch`.
    switch_stack: Vec<BlockKey>,
    /// Blocks whose terminator is the active `InstanceBarrier`.
    instance_stack: Vec<BlockKey>,

    func_entries: HashMap<u32, BlockKey>,
    func_return_point: Option<BlockKey>,
    call_sites: Vec<BlockKey>,

    phase: u32,
    program_type: ProgramType,
    info: ShaderInfo,
    stage: StageInfo,
    mixed_return_warned: bool,
    sm51: bool,
}

/// Builds the block graph for one program.
pub fn build(reader: &mut ShaderCodeReader<'_>) -> Result<ShaderProgram, Error> {
    let program_type = reader.program_type();
    let version = (reader.version_major(), reader.version_minor());
    let sm51 = version.0 == 5 && version.1 >= 1;

    let mut blocks = SlotMap::with_key();
    let entry = blocks.insert(BasicBlock::new("entrybb"));
    let void = blocks.insert(BasicBlock::new("voidbb"));
    let ret = blocks.insert(BasicBlock::new("returnbb"));
    blocks[ret].terminator = Terminator::Return;

    let mut builder = Builder {
        blocks,
        current: entry,
        void,
        ret,
        entry,
        endif_stack: Vec::new(),
        continue_stack: Vec::new(),
        break_stack: Vec::new(),
        switch_stack: Vec::new(),
        instance_stack: Vec::new(),
        func_entries: HashMap::new(),
        func_return_point: None,
        call_sites: Vec::new(),
        phase: PHASE_NONE,
        program_type,
        info: ShaderInfo::new(),
        stage: StageInfo::default(),
        mixed_return_warned: false,
        sm51,
    };

    while !reader.end_of_shader() {
        let inst = reader.parse_instruction()?;
        builder.step(&inst)?;
    }
    builder.append_epilogue();
    builder.inline_calls();

    let Builder {
        blocks,
        entry,
        ret,
        info,
        stage,
        ..
    } = builder;

    Ok(ShaderProgram {
        program_type,
        version,
        cfg: ControlFlowGraph { blocks, entry, ret },
        info,
        stage,
    })
}

impl Builder {
    fn fresh(&mut self, name: &'static str) -> BlockKey {
        self.blocks.insert(BasicBlock::new(name))
    }

    fn set_terminator(&mut self, terminator: Terminator) {
        self.blocks[self.current].terminator = terminator;
    }

    fn push(&mut self, instruction: Instruction) {
        self.blocks[self.current].instructions.push(instruction);
    }

    fn return_target(&self) -> BlockKey {
        if let Some(point) = self.func_return_point {
            point
        } else if let Some(&barrier) = self.instance_stack.last() {
            match &self.blocks[barrier].terminator {
                Terminator::InstanceBarrier { sync, .. } => *sync,
                _ => self.ret,
            }
        } else {
            self.ret
        }
    }

    fn condition(&mut self, inst: &RawInst, index: usize) -> Result<Condition, Error> {
        lift::read_condition(inst, index, self.phase, &mut self.info)
    }

    fn step(&mut self, inst: &RawInst) -> Result<(), Error> {
        match inst.opcode() {
            Opcode::If => {
                let cond = self.condition(inst, 0)?;
                let if_true = self.fresh("if_true");
                let end_if = self.fresh("end_if");
                self.endif_stack.push(end_if);
                self.set_terminator(Terminator::BranchConditional {
                    cond,
                    if_true,
                    if_false: end_if,
                });
                self.current = if_true;
            }
            Opcode::Else => {
                let end_if = self.fresh("end_if");
                let top = self
                    .endif_stack
                    .pop()
                    .ok_or_else(|| malformed("else without if"))?;
                self.set_terminator(Terminator::Branch { target: end_if });
                self.current = top;
                // This block was created as the merge point; it now
                // holds the alternative body.
                self.blocks[top].debug_name = "if_alternative";
                self.endif_stack.push(end_if);
            }
            Opcode::EndIf => {
                let top = self
                    .endif_stack
                    .pop()
                    .ok_or_else(|| malformed("endif without if"))?;
                self.set_terminator(Terminator::Branch { target: top });
                self.current = top;
            }
            Opcode::Loop => {
                let loop_entrance = self.fresh("loop_entrance");
                let end_loop = self.fresh("end_loop");
                self.continue_stack.push(loop_entrance);
                self.break_stack.push(end_loop);
                self.set_terminator(Terminator::Branch {
                    target: loop_entrance,
                });
                self.current = loop_entrance;
            }
            Opcode::EndLoop => {
                let cont = self
                    .continue_stack
                    .pop()
                    .ok_or_else(|| malformed("endloop without loop"))?;
                let brk = self
                    .break_stack
                    .pop()
                    .ok_or_else(|| malformed("endloop without loop"))?;
                self.set_terminator(Terminator::Branch { target: cont });
                self.current = brk;
            }
            Opcode::Break => {
                let target = *self
                    .break_stack
                    .last()
                    .ok_or_else(|| malformed("break outside loop or switch"))?;
                self.set_terminator(Terminator::Branch { target });
                self.current = self.void;
            }
            Opcode::Continue => {
                let target = *self
                    .continue_stack
                    .last()
                    .ok_or_else(|| malformed("continue outside loop"))?;
                self.set_terminator(Terminator::Branch { target });
                self.current = self.void;
            }
            Opcode::Breakc => {
                let cond = self.condition(inst, 0)?;
                let target = *self
                    .break_stack
                    .last()
                    .ok_or_else(|| malformed("breakc outside loop or switch"))?;
                let after = self.fresh("after_breakc");
                self.set_terminator(Terminator::BranchConditional {
                    cond,
                    if_true: target,
                    if_false: after,
                });
                self.current = after;
            }
            Opcode::Continuec => {
                let cond = self.condition(inst, 0)?;
                let target = *self
                    .continue_stack
                    .last()
                    .ok_or_else(|| malformed("continuec outside loop"))?;
                let after = self.fresh("after_continuec");
                self.set_terminator(Terminator::BranchConditional {
                    cond,
                    if_true: target,
                    if_false: after,
                });
                self.current = after;
            }
            Opcode::Switch => {
                let value = lift::read_src_operand(
                    inst.operand(0),
                    self.phase,
                    crate::ir::DataType::Integer,
                    &mut self.info,
                )?;
                let end_switch = self.fresh("end_switch");
                self.break_stack.push(end_switch);
                self.set_terminator(Terminator::Switch {
                    value,
                    cases: BTreeMap::new(),
                    default: end_switch,
                });
                self.switch_stack.push(self.current);
                self.current = self.void;
            }
            Opcode::Case => {
                let op = inst.operand(0);
                if op.kind != air_dxbc::sm50::OperandKind::Immediate32 {
                    return Err(malformed("case label must be an immediate"));
                }
                let value = op.imm[0];
                let case_body = self.fresh("switch_case");
                let switch_block = *self
                    .switch_stack
                    .last()
                    .ok_or_else(|| malformed("case outside switch"))?;
                match &mut self.blocks[switch_block].terminator {
                    Terminator::Switch { cases, .. } => {
                        cases.insert(value, case_body);
                    }
                    _ => return Err(malformed("case outside switch")),
                }
                // Fall through from the previous case body.
                self.set_terminator(Terminator::Branch { target: case_body });
                self.current = case_body;
            }
            Opcode::Default => {
                let case_default = self.fresh("case_default");
                let switch_block = *self
                    .switch_stack
                    .last()
                    .ok_or_else(|| malformed("default outside switch"))?;
                match &mut self.blocks[switch_block].terminator {
                    Terminator::Switch { default, .. } => *default = case_default,
                    _ => return Err(malformed("default outside switch")),
                }
                self.set_terminator(Terminator::Branch {
                    target: case_default,
                });
                self.current = case_default;
            }
            Opcode::EndSwitch => {
                let brk = self
                    .break_stack
                    .pop()
                    .ok_or_else(|| malformed("endswitch without switch"))?;
                self.switch_stack
                    .pop()
                    .ok_or_else(|| malformed("endswitch without switch"))?;
                self.set_terminator(Terminator::Branch { target: brk });
                self.current = brk;
            }
            Opcode::Ret => {
                let target = self.return_target();
                self.set_terminator(Terminator::Branch { target });
                if self.break_stack.is_empty() && self.endif_stack.is_empty() {
                    // Top-level return.
                    self.current = target;
                    if self.func_return_point.take().is_some() {
                        self.current = self.ret;
                    } else if !self.instance_stack.is_empty() {
                        // In a hull shader RET only ends the current
                        // phase; execution continues at its sync block.
                        self.instance_stack.pop();
                    }
                } else {
                    self.current = self.void;
                }
            }
            Opcode::Retc => {
                let cond = self.condition(inst, 0)?;
                let target = self.return_target();
                let after = self.fresh("after_retc");
                self.set_terminator(Terminator::BranchConditional {
                    cond,
                    if_true: target,
                    if_false: after,
                });
                self.current = after;
            }
            Opcode::Discard => {
                let cond = self.condition(inst, 0)?;
                let fulfilled = self.fresh("discard_fulfilled");
                let otherwise = self.fresh("discard_otherwise");
                self.set_terminator(Terminator::BranchConditional {
                    cond,
                    if_true: fulfilled,
                    if_false: otherwise,
                });
                self.blocks[fulfilled].instructions.push(Instruction::PixelDiscard);
                self.blocks[fulfilled].terminator = Terminator::Branch { target: otherwise };
                self.current = otherwise;
            }
            Opcode::HsControlPointPhase => {
                self.info.no_control_point_phase_passthrough = true;
                let active = self.fresh("control_point_active");
                let end = self.fresh("control_point_end");
                self.blocks[end].instructions.push(Instruction::Sync {
                    uav_boundary: UavBoundary::None,
                    tgsm_memory_barrier: true,
                    tgsm_execution_barrier: true,
                });
                let instance_count = self.stage.output_control_point_count;
                self.set_terminator(Terminator::InstanceBarrier {
                    instance_count,
                    active,
                    sync: end,
                });
                self.instance_stack.push(self.current);
                self.current = active;
            }
            Opcode::HsForkPhase | Opcode::HsJoinPhase => {
                self.phase = if self.phase == PHASE_NONE {
                    0
                } else {
                    self.phase + 1
                };
                self.info.phases.push(PhaseInfo::default());

                let active = self.fresh("fork_join_active");
                let end = self.fresh("fork_join_end");
                self.blocks[end].instructions.push(Instruction::Sync {
                    uav_boundary: UavBoundary::None,
                    tgsm_memory_barrier: true,
                    tgsm_execution_barrier: true,
                });
                self.set_terminator(Terminator::InstanceBarrier {
                    instance_count: 1,
                    active,
                    sync: end,
                });
                self.instance_stack.push(self.current);
                self.current = active;
            }
            Opcode::DclHsForkPhaseInstanceCount | Opcode::DclHsJoinPhaseInstanceCount => {
                let Some(DeclPayload::HsPhaseInstanceCount(count)) = inst.dcl.clone() else {
                    return Err(malformed("phase instance count without payload"));
                };
                let barrier = *self
                    .instance_stack
                    .last()
                    .ok_or_else(|| malformed("phase instance count outside phase"))?;
                if let Terminator::InstanceBarrier { instance_count, .. } =
                    &mut self.blocks[barrier].terminator
                {
                    *instance_count = count;
                }
                self.stage.hull_maximum_threads_per_patch =
                    self.stage.hull_maximum_threads_per_patch.max(count);
            }
            Opcode::Label => {
                let func_body = self.fresh("func_body");
                let func_end = self.fresh("func_end");
                self.blocks[func_end].terminator = Terminator::Return;
                let func_id = inst.operand(0).reg_index(0);
                self.func_entries.insert(func_id, func_body);
                self.func_return_point = Some(func_end);
                self.current = func_body;
            }
            Opcode::Call => {
                let after = self.fresh("after_call");
                let func = inst.operand(0).reg_index(0);
                self.set_terminator(Terminator::Call {
                    func,
                    return_point: after,
                });
                self.call_sites.push(self.current);
                self.current = after;
            }
            Opcode::Callc => {
                let cond = self.condition(inst, 0)?;
                let if_true = self.fresh("if_true");
                let after = self.fresh("after_callc");
                self.set_terminator(Terminator::BranchConditional {
                    cond,
                    if_true,
                    if_false: after,
                });
                let func = inst.operand(1).reg_index(0);
                self.blocks[if_true].terminator = Terminator::Call {
                    func,
                    return_point: after,
                };
                self.call_sites.push(if_true);
                self.current = after;
            }
            Opcode::Emit => self.push(Instruction::Emit),
            Opcode::Cut => self.push(Instruction::Cut),
            Opcode::EmitThenCut => {
                self.push(Instruction::Emit);
                self.push(Instruction::Cut);
            }
            Opcode::EmitStream | Opcode::CutStream | Opcode::EmitThenCutStream => {
                let stream = inst.operand(0).reg_index(0);
                if stream != 0 {
                    tracing::warn!(stream, "geometry stream output beyond stream 0");
                    return Err(Error::Unsupported {
                        what: format!("emit/cut to stream {stream}"),
                    });
                }
                match inst.opcode() {
                    Opcode::EmitStream => self.push(Instruction::Emit),
                    Opcode::CutStream => self.push(Instruction::Cut),
                    _ => {
                        self.push(Instruction::Emit);
                        self.push(Instruction::Cut);
                    }
                }
            }
            Opcode::HsDecls => {}
            opcode if inst.dcl.is_some() || opcode.info().class == air_dxbc::sm50::OpcodeClass::Dcl => {
                self.declaration(inst)?;
            }
            Opcode::CustomData => {
                if let Some(data) = &inst.custom_data {
                    if data.class == CustomDataClass::ImmediateConstantBuffer {
                        // The payload must be a list of 4-tuples.
                        if data.data.len() % 4 != 0 {
                            return Err(malformed("immediate constant buffer size"));
                        }
                        self.info.imm_constant_buffer = data
                            .data
                            .chunks_exact(4)
                            .map(|c| [c[0], c[1], c[2], c[3]])
                            .collect();
                    }
                }
            }
            _ => {
                let lifted = lift::lift_instruction(inst, &mut self.info, self.phase)?;
                self.push(lifted);
            }
        }
        Ok(())
    }

    fn declaration(&mut self, inst: &RawInst) -> Result<(), Error> {
        let opcode = inst.opcode();
        match &inst.dcl {
            Some(DeclPayload::GlobalFlags(flags)) => {
                use air_dxbc::sm50::GlobalFlags;
                if flags.contains(GlobalFlags::FORCE_EARLY_DEPTH_STENCIL) {
                    self.info.force_early_depth_stencil = true;
                }
                if flags.contains(GlobalFlags::SKIP_OPTIMIZATION) {
                    self.info.skip_optimization = true;
                }
                if !flags.contains(GlobalFlags::REFACTORING_ALLOWED) {
                    self.info.refactoring_allowed = false;
                }
            }
            Some(DeclPayload::ConstantBuffer {
                size_in_vec4,
                space,
                ..
            }) => {
                let op = inst.operand(0);
                let (range_id, range) = self.range(op, *space);
                if self
                    .info
                    .cbuffers
                    .insert(
                        range_id,
                        ConstantBufferInfo {
                            range,
                            size_in_vec4: *size_in_vec4,
                        },
                    )
                    .is_some()
                {
                    return Err(malformed(format!("duplicate constant buffer cb{range_id}")));
                }
            }
            Some(DeclPayload::Sampler { space, .. }) => {
                let op = inst.operand(0);
                let (range_id, range) = self.range(op, *space);
                if self
                    .info
                    .samplers
                    .insert(range_id, SamplerInfo { range })
                    .is_some()
                {
                    return Err(malformed(format!("duplicate sampler s{range_id}")));
                }
            }
            Some(DeclPayload::Resource {
                dimension,
                return_type,
                space,
                ..
            }) => {
                let op = inst.operand(0);
                let (range_id, range) = self.range(op, *space);
                let srv = SrvInfo {
                    range,
                    scalar_type: self.scalar_type(return_type[0])?,
                    kind: resource_kind(*dimension)?,
                    structure_stride: None,
                    read: false,
                    sampled: false,
                    compared: false,
                };
                if self.info.srvs.insert(range_id, srv).is_some() {
                    return Err(malformed(format!("duplicate resource t{range_id}")));
                }
            }
            Some(DeclPayload::RawResource { space }) => {
                let op = inst.operand(0);
                let (range_id, range) = self.range(op, *space);
                let srv = SrvInfo {
                    range,
                    scalar_type: ScalarType::Uint,
                    kind: ResourceKind::NonApplicable,
                    structure_stride: Some(0),
                    read: false,
                    sampled: false,
                    compared: false,
                };
                if self.info.srvs.insert(range_id, srv).is_some() {
                    return Err(malformed(format!("duplicate resource t{range_id}")));
                }
            }
            Some(DeclPayload::StructuredResource { stride, space }) => {
                let op = inst.operand(0);
                let (range_id, range) = self.range(op, *space);
                let srv = SrvInfo {
                    range,
                    scalar_type: ScalarType::Uint,
                    kind: ResourceKind::NonApplicable,
                    structure_stride: Some(*stride),
                    read: false,
                    sampled: false,
                    compared: false,
                };
                if self.info.srvs.insert(range_id, srv).is_some() {
                    return Err(malformed(format!("duplicate resource t{range_id}")));
                }
            }
            Some(DeclPayload::TypedUav {
                dimension,
                return_type,
                flags,
                space,
            }) => {
                let op = inst.operand(0);
                let (range_id, range) = self.range(op, *space);
                let uav = UavInfo {
                    range,
                    scalar_type: self.scalar_type(return_type[0])?,
                    kind: resource_kind(*dimension)?,
                    structure_stride: None,
                    read: false,
                    written: false,
                    global_coherent: flags
                        .contains(air_dxbc::sm50::UavFlags::GLOBALLY_COHERENT),
                    rasterizer_order: flags
                        .contains(air_dxbc::sm50::UavFlags::RASTERIZER_ORDERED),
                    with_counter: false,
                };
                if self.info.uavs.insert(range_id, uav).is_some() {
                    return Err(malformed(format!("duplicate UAV u{range_id}")));
                }
            }
            Some(DeclPayload::RawUav { flags, space }) => {
                let op = inst.operand(0);
                let (range_id, range) = self.range(op, *space);
                let uav = UavInfo {
                    range,
                    scalar_type: ScalarType::Uint,
                    kind: ResourceKind::NonApplicable,
                    structure_stride: Some(0),
                    read: false,
                    written: false,
                    global_coherent: flags
                        .contains(air_dxbc::sm50::UavFlags::GLOBALLY_COHERENT),
                    rasterizer_order: flags
                        .contains(air_dxbc::sm50::UavFlags::RASTERIZER_ORDERED),
                    with_counter: false,
                };
                if self.info.uavs.insert(range_id, uav).is_some() {
                    return Err(malformed(format!("duplicate UAV u{range_id}")));
                }
            }
            Some(DeclPayload::StructuredUav {
                stride,
                flags,
                space,
            }) => {
                let op = inst.operand(0);
                let (range_id, range) = self.range(op, *space);
                let uav = UavInfo {
                    range,
                    scalar_type: ScalarType::Uint,
                    kind: ResourceKind::NonApplicable,
                    structure_stride: Some(*stride),
                    read: false,
                    written: false,
                    global_coherent: flags
                        .contains(air_dxbc::sm50::UavFlags::GLOBALLY_COHERENT),
                    rasterizer_order: flags
                        .contains(air_dxbc::sm50::UavFlags::RASTERIZER_ORDERED),
                    with_counter: false,
                };
                if self.info.uavs.insert(range_id, uav).is_some() {
                    return Err(malformed(format!("duplicate UAV u{range_id}")));
                }
            }
            Some(DeclPayload::RawTgsm { byte_count }) => {
                if byte_count & 0b11 != 0 {
                    return Err(malformed("raw TGSM size not a multiple of 4"));
                }
                let id = inst.operand(0).reg_index(0);
                let tgsm = TgsmInfo {
                    stride: 0,
                    size: *byte_count,
                    size_in_uint: byte_count / 4,
                    structured: false,
                };
                if self.info.tgsm.insert(id, tgsm).is_some() {
                    return Err(malformed(format!("duplicate TGSM g{id}")));
                }
            }
            Some(DeclPayload::StructuredTgsm { stride, count }) => {
                if stride & 0b11 != 0 {
                    return Err(malformed("structured TGSM stride not a multiple of 4"));
                }
                let id = inst.operand(0).reg_index(0);
                let tgsm = TgsmInfo {
                    stride: *stride,
                    size: *count,
                    size_in_uint: stride * count / 4,
                    structured: true,
                };
                if self.info.tgsm.insert(id, tgsm).is_some() {
                    return Err(malformed(format!("duplicate TGSM g{id}")));
                }
            }
            Some(DeclPayload::Temps { count }) => {
                if self.phase == PHASE_NONE {
                    self.info.temp_register_count = self.info.temp_register_count.max(*count);
                } else {
                    let phase = self.phase as usize;
                    let info = self
                        .info
                        .phases
                        .get_mut(phase)
                        .ok_or_else(|| malformed("dcl_temps outside a declared phase"))?;
                    info.temp_register_count = info.temp_register_count.max(*count);
                }
            }
            Some(DeclPayload::IndexableTemp {
                file,
                count,
                components,
            }) => {
                let mask = (1u32 << (*components).min(4)) - 1;
                if self.phase == PHASE_NONE {
                    self.info.indexable_temps.insert(*file, (*count, mask));
                } else {
                    let phase = self.phase as usize;
                    let info = self
                        .info
                        .phases
                        .get_mut(phase)
                        .ok_or_else(|| malformed("dcl_indexableTemp outside a declared phase"))?;
                    info.indexable_temps.insert(*file, (*count, mask));
                }
            }
            Some(DeclPayload::ThreadGroup { x, y, z }) => {
                self.stage.threadgroup_size = [*x, *y, *z];
            }
            Some(DeclPayload::Input {
                system_value,
                interpolation,
            }) => {
                let op = inst.operand(0);
                let decl = IoDecl {
                    reg: if op.index_dim >= 1 {
                        op.reg_index(op.index_dim as usize - 1)
                    } else {
                        0
                    },
                    mask: op.write_mask(),
                    system_value: *system_value,
                    interpolation: *interpolation,
                };
                self.info.inputs.push(decl);
            }
            Some(DeclPayload::Output { system_value }) => {
                let op = inst.operand(0);
                let decl = IoDecl {
                    reg: if op.index_dim >= 1 { op.reg_index(0) } else { 0 },
                    mask: op.write_mask(),
                    system_value: *system_value,
                    interpolation: None,
                };
                if self.phase == PHASE_NONE {
                    self.info.outputs.push(decl);
                } else {
                    self.info.patch_constants.push(decl);
                }
            }
            Some(DeclPayload::IndexRange { .. }) => {
                // The backend compiler handles dynamically indexed I/O
                // ranges through the register-file allocas.
            }
            Some(DeclPayload::GsInputPrimitive(primitive)) => {
                self.stage.gs_input_primitive = *primitive;
            }
            Some(DeclPayload::GsOutputTopology(topology)) => {
                self.stage.gs_output_topology = *topology;
            }
            Some(DeclPayload::MaxOutputVertexCount(count)) => {
                self.stage.gs_max_vertex_output = *count;
            }
            Some(DeclPayload::GsInstanceCount(count)) => {
                self.stage.gs_instance_count = *count;
            }
            Some(DeclPayload::InputControlPointCount(count)) => {
                self.stage.input_control_point_count = *count;
                self.stage.hull_maximum_threads_per_patch =
                    self.stage.hull_maximum_threads_per_patch.max(*count);
            }
            Some(DeclPayload::OutputControlPointCount(count)) => {
                self.stage.output_control_point_count = *count;
                self.stage.hull_maximum_threads_per_patch =
                    self.stage.hull_maximum_threads_per_patch.max(*count);
            }
            Some(DeclPayload::TessDomain(domain)) => {
                if *domain == TessellatorDomain::Isoline {
                    return Err(Error::Unsupported {
                        what: "isoline tessellation domain".into(),
                    });
                }
                self.stage.tessellation_domain = *domain;
            }
            Some(DeclPayload::TessPartitioning(partitioning)) => {
                self.stage.tessellation_partition = *partitioning;
            }
            Some(DeclPayload::TessOutputPrimitive(primitive)) => {
                if *primitive == TessellatorOutputPrimitive::Point {
                    return Err(Error::Unsupported {
                        what: "point tessellation output".into(),
                    });
                }
                self.stage.tessellator_output_primitive = *primitive;
            }
            Some(DeclPayload::MaxTessFactor(factor)) => {
                self.stage.max_tessellation_factor = *factor;
            }
            Some(DeclPayload::HsPhaseInstanceCount(_)) => {
                // Handled in `step`, where the active barrier is known.
                unreachable!("phase instance count handled by step");
            }
            None => match opcode {
                // Interface declarations carry no state we consume.
                Opcode::DclStream
                | Opcode::DclInterface
                | Opcode::DclFunctionTable
                | Opcode::DclFunctionBody
                | Opcode::HsDecls => {}
                other => {
                    return Err(Error::Unsupported {
                        what: format!("declaration {}", other.name()),
                    });
                }
            },
        }
        Ok(())
    }

    /// Range id, lower bound and size of a resource declaration
    /// operand. SM 5.1 uses a 3-D index with an explicit bound range.
    fn range(&self, op: &air_dxbc::reader::Operand, space: u32) -> (u32, ResourceRange) {
        let range_id = op.reg_index(0);
        let (lower_bound, size) = if self.sm51 && op.index_dim == 3 {
            let lb = op.reg_index(1);
            let upper = op.reg_index(2);
            let size = if upper == u32::MAX {
                u32::MAX
            } else {
                upper - lb + 1
            };
            (lb, size)
        } else {
            (range_id, 1)
        };
        (
            range_id,
            ResourceRange {
                range_id,
                lower_bound,
                size,
                space,
            },
        )
    }

    fn scalar_type(&mut self, ty: ResourceReturnType) -> Result<ScalarType, Error> {
        Ok(match ty {
            ResourceReturnType::Unorm | ResourceReturnType::Snorm | ResourceReturnType::Float => {
                ScalarType::Float
            }
            ResourceReturnType::Sint => ScalarType::Int,
            ResourceReturnType::Uint => ScalarType::Uint,
            ResourceReturnType::Mixed => {
                // Mixed-typed resources fold to uint; the raw bits pass
                // through and the consumer reinterprets per component.
                if !self.mixed_return_warned {
                    self.mixed_return_warned = true;
                    tracing::warn!("MIXED resource return type folded to uint");
                }
                ScalarType::Uint
            }
            ResourceReturnType::Double
            | ResourceReturnType::Continued
            | ResourceReturnType::Unused => {
                return Err(Error::Unsupported {
                    what: format!("resource return type {ty:?}"),
                });
            }
        })
    }

    /// After the main walk the final block either already reached the
    /// return block, or the hull shader still has to move its outputs.
    fn append_epilogue(&mut self) {
        if self.current == self.ret {
            return;
        }
        // When fork/join phases read control-point outputs, or no
        // control-point phase exists at all, the outputs live in
        // threadgroup memory and must be copied to the payload here.
        let needs_output_copy = self.program_type == ProgramType::Hull
            && (self.info.output_control_point_read
                || !self.info.no_control_point_phase_passthrough);
        if needs_output_copy {
            self.blocks[self.current].terminator = Terminator::HullShaderWriteOutput {
                instance_count: self.stage.output_control_point_count,
                epilogue: self.ret,
            };
        } else {
            self.blocks[self.current].terminator = Terminator::Branch { target: self.ret };
        }
        self.current = self.ret;
    }

    /// Replaces each `Call` terminator with a clone of the callee
    /// subgraph. Bounded; on the last iteration remaining calls become
    /// branches back to the original function entry, which caps the
    /// inlined recursion depth.
    fn inline_calls(&mut self) {
        let mut call_sites = std::mem::take(&mut self.call_sites);

        for depth_left in (1..=INLINE_DEPTH_LIMIT).rev() {
            if call_sites.is_empty() {
                break;
            }
            let mut next_round = Vec::new();

            for site in call_sites {
                let Terminator::Call { func, return_point } = self.blocks[site].terminator.clone()
                else {
                    continue;
                };
                let Some(&callee_entry) = self.func_entries.get(&func) else {
                    // A call to an unknown label branches straight to
                    // its return point.
                    self.blocks[site].terminator = Terminator::Branch {
                        target: return_point,
                    };
                    continue;
                };

                let mut visited: HashMap<BlockKey, BlockKey> = HashMap::new();
                let mut worklist: Vec<BlockKey> = Vec::new();

                let entry_clone =
                    self.clone_block(callee_entry, &mut visited, &mut worklist);
                self.blocks[site].terminator = Terminator::Branch {
                    target: entry_clone,
                };

                while let Some(original) = worklist.pop() {
                    let cloned = visited[&original];
                    let terminator = self.blocks[original].terminator.clone();
                    let new_terminator = match terminator {
                        Terminator::Undefined => Terminator::Undefined,
                        Terminator::Return => Terminator::Branch {
                            target: return_point,
                        },
                        Terminator::Branch { target } => Terminator::Branch {
                            target: self.clone_block(target, &mut visited, &mut worklist),
                        },
                        Terminator::BranchConditional {
                            cond,
                            if_true,
                            if_false,
                        } => Terminator::BranchConditional {
                            cond,
                            if_true: self.clone_block(if_true, &mut visited, &mut worklist),
                            if_false: self.clone_block(if_false, &mut visited, &mut worklist),
                        },
                        Terminator::Switch {
                            value,
                            cases,
                            default,
                        } => Terminator::Switch {
                            value,
                            cases: cases
                                .into_iter()
                                .map(|(v, b)| {
                                    (v, self.clone_block(b, &mut visited, &mut worklist))
                                })
                                .collect(),
                            default: self.clone_block(default, &mut visited, &mut worklist),
                        },
                        Terminator::InstanceBarrier {
                            instance_count,
                            active,
                            sync,
                        } => Terminator::InstanceBarrier {
                            instance_count,
                            active: self.clone_block(active, &mut visited, &mut worklist),
                            sync: self.clone_block(sync, &mut visited, &mut worklist),
                        },
                        Terminator::HullShaderWriteOutput {
                            instance_count,
                            epilogue,
                        } => Terminator::HullShaderWriteOutput {
                            instance_count,
                            epilogue: self.clone_block(epilogue, &mut visited, &mut worklist),
                        },
                        Terminator::Call {
                            func: callee,
                            return_point: inner_return,
                        } => {
                            if depth_left == 1 {
                                // Recursion budget exhausted; jump back
                                // to the already-materialized entry.
                                let entry = self
                                    .func_entries
                                    .get(&callee)
                                    .copied()
                                    .unwrap_or(inner_return);
                                Terminator::Branch { target: entry }
                            } else {
                                Terminator::Call {
                                    func: callee,
                                    return_point: self.clone_block(
                                        inner_return,
                                        &mut visited,
                                        &mut worklist,
                                    ),
                                }
                            }
                        }
                    };

                    if let Terminator::Call { .. } = &new_terminator {
                        next_round.push(cloned);
                    }
                    self.blocks[cloned].terminator = new_terminator;
                }
            }

            call_sites = next_round;
        }
    }

    fn clone_block(
        &mut self,
        original: BlockKey,
        visited: &mut HashMap<BlockKey, BlockKey>,
        worklist: &mut Vec<BlockKey>,
    ) -> BlockKey {
        Self::clone_block_impl(&mut self.blocks, original, visited, worklist)
    }

    fn clone_block_impl(
        blocks: &mut SlotMap<BlockKey, BasicBlock>,
        original: BlockKey,
        visited: &mut HashMap<BlockKey, BlockKey>,
        worklist: &mut Vec<BlockKey>,
    ) -> BlockKey {
        if let Some(&cloned) = visited.get(&original) {
            return cloned;
        }
        let instructions = blocks[original].instructions.clone();
        let debug_name = blocks[original].debug_name;
        let cloned = blocks.insert(BasicBlock {
            instructions,
            terminator: Terminator::Undefined,
            debug_name,
        });
        visited.insert(original, cloned);
        worklist.push(original);
        cloned
    }
}

fn resource_kind(dimension: ResourceDimension) -> Result<ResourceKind, Error> {
    Ok(match dimension {
        ResourceDimension::Unknown
        | ResourceDimension::Buffer
        | ResourceDimension::RawBuffer
        | ResourceDimension::StructuredBuffer => ResourceKind::TextureBuffer,
        ResourceDimension::Texture1D => ResourceKind::Texture1D,
        ResourceDimension::Texture2D => ResourceKind::Texture2D,
        ResourceDimension::Texture2DMs => ResourceKind::Texture2DMultisampled,
        ResourceDimension::Texture3D => ResourceKind::Texture3D,
        ResourceDimension::TextureCube => ResourceKind::TextureCube,
        ResourceDimension::Texture1DArray => ResourceKind::Texture1DArray,
        ResourceDimension::Texture2DArray => ResourceKind::Texture2DArray,
        ResourceDimension::Texture2DMsArray => ResourceKind::Texture2DMultisampledArray,
        ResourceDimension::TextureCubeArray => ResourceKind::TextureCubeArray,
    })
}
