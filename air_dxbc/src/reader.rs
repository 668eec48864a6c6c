//! Cursor over a tokenized SM 4/5 program.
//!
//! The reader consumes the two-word program header at construction and
//! then decodes one instruction at a time. Decoding is strictly
//! sequential; the cursor is resynchronized to the declared instruction
//! length after every instruction so a malformed operand tail cannot
//! desynchronize the stream.

use crate::sm50::{
    CbAccessPattern, ComponentSelection, GlobalFlags, GsInputPrimitive, GsOutputTopology,
    IndexRepr, InterpolationMode, MinPrecision, Opcode, OperandKind, ProgramType,
    ResInfoReturnType, ResourceDimension, ResourceReturnType, SamplerMode, SyncFlags, SystemName,
    TessellatorDomain, TessellatorOutputPrimitive, TessellatorPartitioning, UavFlags,
};
use crate::{DecodeError, ErrorImpl};

pub const MAX_INSTRUCTION_LENGTH: u32 = 128;
pub const MAX_INSTRUCTION_OPERANDS: usize = 8;

/// A single dimension index of an operand.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperandIndex {
    pub repr: IndexRepr,
    /// Immediate part. Holds the register index for `Immediate32` and the
    /// constant offset for `Immediate32PlusRelative`.
    pub imm: u32,
    pub imm64: u64,
    /// Register kind supplying the dynamic part of a relative index.
    /// Only `Temp` and `IndexableTemp` are legal here.
    pub rel_kind: Option<OperandKind>,
    pub rel_index: u32,
    /// Second dimension of an indexable-temp relative register.
    pub rel_index2: u32,
    pub rel_component: u8,
    pub rel_min_precision: MinPrecision,
}

/// A decoded operand.
#[derive(Clone, Debug, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    /// 0, 1 or 4.
    pub num_components: u8,
    pub selection: ComponentSelection,
    pub neg: bool,
    pub abs: bool,
    pub min_precision: MinPrecision,
    pub non_uniform: bool,
    pub index_dim: u8,
    pub indices: [OperandIndex; 3],
    pub imm: [u32; 4],
    pub imm64: [u64; 2],
}

impl Default for Operand {
    fn default() -> Self {
        Self {
            kind: OperandKind::Null,
            num_components: 0,
            selection: ComponentSelection::None,
            neg: false,
            abs: false,
            min_precision: MinPrecision::Default,
            non_uniform: false,
            index_dim: 0,
            indices: Default::default(),
            imm: [0; 4],
            imm64: [0; 2],
        }
    }
}

impl Operand {
    /// Register index of the given dimension, immediate part.
    pub fn reg_index(&self, dimension: usize) -> u32 {
        self.indices[dimension].imm
    }

    /// The source swizzle, with select-1 splatted to all four lanes and
    /// mask-selected operands reading as identity.
    pub fn swizzle(&self) -> [u8; 4] {
        match self.selection {
            ComponentSelection::Swizzle(s) => s,
            ComponentSelection::Select(c) => [c; 4],
            ComponentSelection::Mask(_) | ComponentSelection::None => [0, 1, 2, 3],
        }
    }

    /// Destination write mask with bit 0 = `.x`.
    pub fn write_mask(&self) -> u8 {
        match self.selection {
            ComponentSelection::Mask(m) => m,
            // Scalar outputs (oDepth, oMask) and select-1 destinations
            // behave as a single-component write.
            _ => 0b0001,
        }
    }

    pub fn select_component(&self) -> u8 {
        match self.selection {
            ComponentSelection::Select(c) => c,
            _ => 0,
        }
    }
}

/// Extra payload decoded from declaration instructions.
#[derive(Clone, Debug, PartialEq)]
pub enum DeclPayload {
    GlobalFlags(GlobalFlags),
    ConstantBuffer {
        access: CbAccessPattern,
        size_in_vec4: u32,
        space: u32,
    },
    Sampler {
        mode: SamplerMode,
        space: u32,
    },
    Resource {
        dimension: ResourceDimension,
        return_type: [ResourceReturnType; 4],
        sample_count: u32,
        space: u32,
    },
    RawResource {
        space: u32,
    },
    StructuredResource {
        stride: u32,
        space: u32,
    },
    TypedUav {
        dimension: ResourceDimension,
        return_type: [ResourceReturnType; 4],
        flags: UavFlags,
        space: u32,
    },
    RawUav {
        flags: UavFlags,
        space: u32,
    },
    StructuredUav {
        stride: u32,
        flags: UavFlags,
        space: u32,
    },
    RawTgsm {
        byte_count: u32,
    },
    StructuredTgsm {
        stride: u32,
        count: u32,
    },
    Temps {
        count: u32,
    },
    IndexableTemp {
        file: u32,
        count: u32,
        components: u32,
    },
    ThreadGroup {
        x: u32,
        y: u32,
        z: u32,
    },
    Input {
        system_value: Option<SystemName>,
        interpolation: Option<InterpolationMode>,
    },
    Output {
        system_value: Option<SystemName>,
    },
    IndexRange {
        count: u32,
    },
    GsInputPrimitive(GsInputPrimitive),
    GsOutputTopology(GsOutputTopology),
    MaxOutputVertexCount(u32),
    GsInstanceCount(u32),
    InputControlPointCount(u32),
    OutputControlPointCount(u32),
    TessDomain(TessellatorDomain),
    TessPartitioning(TessellatorPartitioning),
    TessOutputPrimitive(TessellatorOutputPrimitive),
    MaxTessFactor(f32),
    HsPhaseInstanceCount(u32),
}

/// CUSTOMDATA payload classes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CustomDataClass {
    Comment,
    DebugInfo,
    Opaque,
    ImmediateConstantBuffer,
    ShaderMessage,
    ClipPlaneConstantMappings,
}

impl CustomDataClass {
    fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Comment,
            1 => Self::DebugInfo,
            2 => Self::Opaque,
            3 => Self::ImmediateConstantBuffer,
            4 => Self::ShaderMessage,
            5 => Self::ClipPlaneConstantMappings,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CustomData {
    pub class: CustomDataClass,
    pub data: Vec<u32>,
}

/// A fully decoded instruction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Instruction {
    pub opcode: Option<Opcode>,
    /// Declared length in words, including the opcode token.
    pub length: u32,
    pub saturate: bool,
    pub test_nonzero: bool,
    pub precise_mask: u8,
    pub resinfo_return: ResInfoReturnType,
    /// `sample_info` return-type control: uint instead of float.
    pub return_uint: bool,
    pub sync_flags: SyncFlags,
    pub texel_offsets: [i32; 3],
    pub extended_dimension: Option<ResourceDimension>,
    pub extended_stride: u32,
    pub extended_return_type: Option<[ResourceReturnType; 4]>,
    pub operands: Vec<Operand>,
    pub dcl: Option<DeclPayload>,
    pub custom_data: Option<CustomData>,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        // Only constructed through the reader, which fails on unknown
        // opcodes.
        self.opcode.unwrap()
    }

    pub fn operand(&self, index: usize) -> &Operand {
        &self.operands[index]
    }
}

/// Cursor over the token stream of one shader program.
#[derive(Debug)]
pub struct ShaderCodeReader<'a> {
    words: &'a [u32],
    cursor: usize,
    program_type: ProgramType,
    version_major: u8,
    version_minor: u8,
    length_in_tokens: u32,
}

impl<'a> ShaderCodeReader<'a> {
    /// Consumes the two-word program header.
    pub fn new(words: &'a [u32]) -> Result<Self, DecodeError> {
        if words.len() < 2 {
            return Err(ErrorImpl::IncompleteHeader.into());
        }

        let version = words[0];
        let program_type = ProgramType::from_u32(version >> 16)
            .ok_or(ErrorImpl::UnknownProgramType(version >> 16))?;
        let length_in_tokens = words[1];

        Ok(Self {
            words,
            cursor: 2,
            program_type,
            version_major: ((version >> 4) & 0xF) as u8,
            version_minor: (version & 0xF) as u8,
            length_in_tokens,
        })
    }

    pub fn program_type(&self) -> ProgramType {
        self.program_type
    }

    pub fn version_major(&self) -> u8 {
        self.version_major
    }

    pub fn version_minor(&self) -> u8 {
        self.version_minor
    }

    pub fn length_in_tokens(&self) -> u32 {
        self.length_in_tokens
    }

    pub fn current_offset(&self) -> usize {
        self.cursor
    }

    pub fn end_of_shader(&self) -> bool {
        self.cursor >= self.words.len() || self.cursor >= self.length_in_tokens as usize
    }

    fn next(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        let Some(word) = self.words.get(self.cursor) else {
            return Err(ErrorImpl::UnexpectedEnd(what).into());
        };
        self.cursor += 1;
        Ok(*word)
    }

    /// Decodes the next instruction.
    pub fn parse_instruction(&mut self) -> Result<Instruction, DecodeError> {
        let start = self.cursor;
        let token = self.next("opcode token")?;

        let opcode_value = token & 0x7FF;
        let Some(opcode) = Opcode::from_u32(opcode_value) else {
            return Err(ErrorImpl::UnknownOpcode(opcode_value).into());
        };

        let mut inst = Instruction {
            opcode: Some(opcode),
            ..Default::default()
        };

        if opcode == Opcode::CustomData {
            // CUSTOMDATA carries its own 32-bit length at the next word,
            // counted in words including both header tokens.
            let class = CustomDataClass::from_u32(token >> 11)
                .ok_or(ErrorImpl::UnknownEnumValue("customdata class", token >> 11))?;
            let len = self.next("customdata length")?;
            if len < 2 || start + len as usize > self.words.len() {
                return Err(ErrorImpl::UnexpectedEnd("customdata payload").into());
            }
            let data = self.words[start + 2..start + len as usize].to_vec();
            self.cursor = start + len as usize;
            inst.length = len;
            inst.custom_data = Some(CustomData { class, data });
            return Ok(inst);
        }

        let length = (token >> 24) & 0x7F;
        if length == 0 || length > MAX_INSTRUCTION_LENGTH {
            return Err(ErrorImpl::OversizedInstruction(length, MAX_INSTRUCTION_LENGTH).into());
        }
        if start + length as usize > self.words.len() {
            return Err(ErrorImpl::UnexpectedEnd("instruction body").into());
        }
        inst.length = length;

        // Opcode-specific control bits [23:11].
        inst.saturate = token & (1 << 13) != 0;
        inst.test_nonzero = token & (1 << 18) != 0;
        inst.precise_mask = ((token >> 19) & 0xF) as u8;
        inst.resinfo_return = ResInfoReturnType::from_u32((token >> 11) & 0x3)
            .unwrap_or(ResInfoReturnType::Float);
        inst.return_uint = token & (1 << 11) != 0;
        inst.sync_flags = SyncFlags::from_bits_truncate(token);

        // Extended opcode tokens.
        let mut extended = token & (1 << 31) != 0;
        let mut chain = 0;
        while extended {
            chain += 1;
            if chain > 4 {
                return Err(ErrorImpl::ExtendedOperandChain.into());
            }
            let ext = self.next("extended opcode token")?;
            match ext & 0x3F {
                // Sample controls: 4-bit signed texel offsets.
                1 => {
                    inst.texel_offsets = [
                        sign_extend_4(ext >> 9),
                        sign_extend_4(ext >> 13),
                        sign_extend_4(ext >> 17),
                    ];
                }
                // Resource dimension (+ structured stride).
                2 => {
                    inst.extended_dimension = ResourceDimension::from_u32((ext >> 6) & 0x1F);
                    inst.extended_stride = (ext >> 11) & 0xFFF;
                }
                // Resource return type.
                3 => {
                    let mut ty = [ResourceReturnType::Unused; 4];
                    for (i, slot) in ty.iter_mut().enumerate() {
                        *slot = ResourceReturnType::from_u32((ext >> (6 + i * 4)) & 0xF)
                            .unwrap_or(ResourceReturnType::Unused);
                    }
                    inst.extended_return_type = Some(ty);
                }
                other => {
                    return Err(
                        ErrorImpl::UnknownEnumValue("extended opcode type", other).into()
                    );
                }
            }
            extended = ext & (1 << 31) != 0;
        }

        self.parse_body(&mut inst, token)?;

        // Resynchronize to the declared length. Trailing words we did not
        // interpret (future extensions) are skipped; overruns are a
        // decoder bug or corrupt stream.
        let end = start + length as usize;
        if self.cursor > end {
            return Err(ErrorImpl::InstructionOverrun {
                op: opcode.name(),
                len: length,
            }
            .into());
        }
        if self.cursor < end {
            tracing::trace!(
                op = opcode.name(),
                skipped = end - self.cursor,
                "skipping undecoded instruction tail"
            );
        }
        self.cursor = end;

        Ok(inst)
    }

    fn parse_body(&mut self, inst: &mut Instruction, token: u32) -> Result<(), DecodeError> {
        let opcode = inst.opcode();
        match opcode {
            Opcode::DclGlobalFlags => {
                inst.dcl = Some(DeclPayload::GlobalFlags(GlobalFlags::from_bits_truncate(
                    token,
                )));
            }
            Opcode::DclConstantBuffer => {
                let access = if token & (1 << 11) != 0 {
                    CbAccessPattern::DynamicIndexed
                } else {
                    CbAccessPattern::ImmediateIndexed
                };
                let op = self.parse_operand()?;
                // SM 5.0 encodes the size in vec4s as the second
                // dimension index; SM 5.1 appends a size word + space.
                let (size_in_vec4, space) = if self.is_sm51() {
                    (self.next("cb size")?, self.next("cb space")?)
                } else {
                    (op.reg_index(1), 0)
                };
                inst.operands.push(op);
                inst.dcl = Some(DeclPayload::ConstantBuffer {
                    access,
                    size_in_vec4,
                    space,
                });
            }
            Opcode::DclSampler => {
                let mode = SamplerMode::from_u32((token >> 11) & 0xF)
                    .ok_or(ErrorImpl::UnknownEnumValue("sampler mode", (token >> 11) & 0xF))?;
                let op = self.parse_operand()?;
                let space = if self.is_sm51() {
                    self.next("sampler space")?
                } else {
                    0
                };
                inst.operands.push(op);
                inst.dcl = Some(DeclPayload::Sampler { mode, space });
            }
            Opcode::DclResource | Opcode::DclUavTyped => {
                let dimension = ResourceDimension::from_u32((token >> 11) & 0x1F)
                    .ok_or(ErrorImpl::UnknownEnumValue("resource dimension", (token >> 11) & 0x1F))?;
                let sample_count = (token >> 16) & 0x7F;
                let flags = UavFlags::from_bits_truncate(token);
                let op = self.parse_operand()?;
                let rt = self.next("resource return type")?;
                let mut return_type = [ResourceReturnType::Unused; 4];
                for (i, slot) in return_type.iter_mut().enumerate() {
                    *slot = ResourceReturnType::from_u32((rt >> (i * 4)) & 0xF)
                        .unwrap_or(ResourceReturnType::Unused);
                }
                let space = if self.is_sm51() {
                    self.next("resource space")?
                } else {
                    0
                };
                inst.operands.push(op);
                inst.dcl = Some(if opcode == Opcode::DclResource {
                    DeclPayload::Resource {
                        dimension,
                        return_type,
                        sample_count,
                        space,
                    }
                } else {
                    DeclPayload::TypedUav {
                        dimension,
                        return_type,
                        flags,
                        space,
                    }
                });
            }
            Opcode::DclResourceRaw | Opcode::DclUavRaw => {
                let flags = UavFlags::from_bits_truncate(token);
                let op = self.parse_operand()?;
                let space = if self.is_sm51() {
                    self.next("resource space")?
                } else {
                    0
                };
                inst.operands.push(op);
                inst.dcl = Some(if opcode == Opcode::DclResourceRaw {
                    DeclPayload::RawResource { space }
                } else {
                    DeclPayload::RawUav { flags, space }
                });
            }
            Opcode::DclResourceStructured | Opcode::DclUavStructured => {
                let flags = UavFlags::from_bits_truncate(token);
                let op = self.parse_operand()?;
                let stride = self.next("structure stride")?;
                let space = if self.is_sm51() {
                    self.next("resource space")?
                } else {
                    0
                };
                inst.operands.push(op);
                inst.dcl = Some(if opcode == Opcode::DclResourceStructured {
                    DeclPayload::StructuredResource { stride, space }
                } else {
                    DeclPayload::StructuredUav {
                        stride,
                        flags,
                        space,
                    }
                });
            }
            Opcode::DclTgsmRaw => {
                let op = self.parse_operand()?;
                let byte_count = self.next("tgsm byte count")?;
                inst.operands.push(op);
                inst.dcl = Some(DeclPayload::RawTgsm { byte_count });
            }
            Opcode::DclTgsmStructured => {
                let op = self.parse_operand()?;
                let stride = self.next("tgsm stride")?;
                let count = self.next("tgsm count")?;
                inst.operands.push(op);
                inst.dcl = Some(DeclPayload::StructuredTgsm { stride, count });
            }
            Opcode::DclTemps => {
                let count = self.next("temp count")?;
                inst.dcl = Some(DeclPayload::Temps { count });
            }
            Opcode::DclIndexableTemp => {
                let file = self.next("indexable temp file")?;
                let count = self.next("indexable temp count")?;
                let components = self.next("indexable temp components")?;
                inst.dcl = Some(DeclPayload::IndexableTemp {
                    file,
                    count,
                    components,
                });
            }
            Opcode::DclThreadGroup => {
                let x = self.next("thread group x")?;
                let y = self.next("thread group y")?;
                let z = self.next("thread group z")?;
                inst.dcl = Some(DeclPayload::ThreadGroup { x, y, z });
            }
            Opcode::DclInput | Opcode::DclOutput => {
                inst.operands.push(self.parse_operand()?);
                inst.dcl = Some(match opcode {
                    Opcode::DclInput => DeclPayload::Input {
                        system_value: None,
                        interpolation: None,
                    },
                    _ => DeclPayload::Output { system_value: None },
                });
            }
            Opcode::DclInputSgv | Opcode::DclInputSiv => {
                inst.operands.push(self.parse_operand()?);
                let name = self.next("system value name")?;
                inst.dcl = Some(DeclPayload::Input {
                    system_value: SystemName::from_u32(name),
                    interpolation: None,
                });
            }
            Opcode::DclInputPs => {
                let interpolation = InterpolationMode::from_u32((token >> 11) & 0xF);
                inst.operands.push(self.parse_operand()?);
                inst.dcl = Some(DeclPayload::Input {
                    system_value: None,
                    interpolation,
                });
            }
            Opcode::DclInputPsSgv | Opcode::DclInputPsSiv => {
                let interpolation = InterpolationMode::from_u32((token >> 11) & 0xF);
                inst.operands.push(self.parse_operand()?);
                let name = self.next("system value name")?;
                inst.dcl = Some(DeclPayload::Input {
                    system_value: SystemName::from_u32(name),
                    interpolation,
                });
            }
            Opcode::DclOutputSgv | Opcode::DclOutputSiv => {
                inst.operands.push(self.parse_operand()?);
                let name = self.next("system value name")?;
                inst.dcl = Some(DeclPayload::Output {
                    system_value: SystemName::from_u32(name),
                });
            }
            Opcode::DclIndexRange => {
                inst.operands.push(self.parse_operand()?);
                let count = self.next("index range count")?;
                inst.dcl = Some(DeclPayload::IndexRange { count });
            }
            Opcode::DclGsInputPrimitive => {
                let primitive = GsInputPrimitive::from_u32((token >> 11) & 0x3F)
                    .ok_or(ErrorImpl::UnknownEnumValue("gs input primitive", (token >> 11) & 0x3F))?;
                inst.dcl = Some(DeclPayload::GsInputPrimitive(primitive));
            }
            Opcode::DclGsOutputPrimitiveTopology => {
                let topology = GsOutputTopology::from_u32((token >> 11) & 0x7F)
                    .ok_or(ErrorImpl::UnknownEnumValue("gs output topology", (token >> 11) & 0x7F))?;
                inst.dcl = Some(DeclPayload::GsOutputTopology(topology));
            }
            Opcode::DclMaxOutputVertexCount => {
                let count = self.next("max output vertex count")?;
                inst.dcl = Some(DeclPayload::MaxOutputVertexCount(count));
            }
            Opcode::DclGsInstanceCount => {
                let count = self.next("gs instance count")?;
                inst.dcl = Some(DeclPayload::GsInstanceCount(count));
            }
            Opcode::DclInputControlPointCount => {
                inst.dcl = Some(DeclPayload::InputControlPointCount((token >> 11) & 0x3F));
            }
            Opcode::DclOutputControlPointCount => {
                inst.dcl = Some(DeclPayload::OutputControlPointCount((token >> 11) & 0x3F));
            }
            Opcode::DclTessDomain => {
                let domain = TessellatorDomain::from_u32((token >> 11) & 0x3)
                    .ok_or(ErrorImpl::UnknownEnumValue("tess domain", (token >> 11) & 0x3))?;
                inst.dcl = Some(DeclPayload::TessDomain(domain));
            }
            Opcode::DclTessPartitioning => {
                let partitioning = TessellatorPartitioning::from_u32((token >> 11) & 0x7)
                    .ok_or(ErrorImpl::UnknownEnumValue("tess partitioning", (token >> 11) & 0x7))?;
                inst.dcl = Some(DeclPayload::TessPartitioning(partitioning));
            }
            Opcode::DclTessOutputPrimitive => {
                let primitive = TessellatorOutputPrimitive::from_u32((token >> 11) & 0x7)
                    .ok_or(ErrorImpl::UnknownEnumValue("tess output primitive", (token >> 11) & 0x7))?;
                inst.dcl = Some(DeclPayload::TessOutputPrimitive(primitive));
            }
            Opcode::DclHsMaxTessFactor => {
                let factor = f32::from_bits(self.next("max tess factor")?);
                inst.dcl = Some(DeclPayload::MaxTessFactor(factor));
            }
            Opcode::DclHsForkPhaseInstanceCount | Opcode::DclHsJoinPhaseInstanceCount => {
                let count = self.next("phase instance count")?;
                inst.dcl = Some(DeclPayload::HsPhaseInstanceCount(count));
            }
            // Interface/function-table declarations carry
            // variable-length payloads this translator does not consume;
            // the length-based resync skips them.
            Opcode::DclFunctionBody
            | Opcode::DclFunctionTable
            | Opcode::DclInterface
            | Opcode::HsDecls
            | Opcode::HsControlPointPhase
            | Opcode::HsForkPhase
            | Opcode::HsJoinPhase => {}
            _ => {
                let count = opcode.info().num_operands as usize;
                debug_assert!(count <= MAX_INSTRUCTION_OPERANDS);
                for _ in 0..count {
                    inst.operands.push(self.parse_operand()?);
                }
            }
        }

        Ok(())
    }

    /// Decodes one operand: the operand token, any extended-operand
    /// tokens, the per-dimension index tails and immediate values.
    pub fn parse_operand(&mut self) -> Result<Operand, DecodeError> {
        let token = self.next("operand token")?;

        let mut operand = Operand::default();

        let kind_value = (token >> 12) & 0xFF;
        operand.kind =
            OperandKind::from_u32(kind_value).ok_or(ErrorImpl::UnknownOperandType(kind_value))?;

        operand.num_components = match token & 0x3 {
            0 => 0,
            1 => 1,
            2 => 4,
            other => {
                return Err(ErrorImpl::UnknownEnumValue("operand component count", other).into());
            }
        };

        if operand.num_components == 4 {
            operand.selection = match (token >> 2) & 0x3 {
                0 => ComponentSelection::Mask(((token >> 4) & 0xF) as u8),
                1 => {
                    let swizzle = [
                        ((token >> 4) & 0x3) as u8,
                        ((token >> 6) & 0x3) as u8,
                        ((token >> 8) & 0x3) as u8,
                        ((token >> 10) & 0x3) as u8,
                    ];
                    ComponentSelection::Swizzle(swizzle)
                }
                2 => ComponentSelection::Select(((token >> 4) & 0x3) as u8),
                other => {
                    return Err(
                        ErrorImpl::UnknownEnumValue("component selection mode", other).into()
                    );
                }
            };
        }

        operand.index_dim = ((token >> 20) & 0x3) as u8;

        let mut reprs = [IndexRepr::Immediate32; 3];
        for (dim, repr) in reprs.iter_mut().enumerate().take(operand.index_dim as usize) {
            let raw = (token >> (22 + dim * 3)) & 0x7;
            *repr = IndexRepr::from_u32(raw).ok_or(ErrorImpl::InvalidIndexRepresentation {
                repr: raw,
                dimension: dim as u32,
            })?;
        }

        // Extended operand tokens. The modifier token is re-used for
        // min-precision and non-uniform markers.
        let mut extended = token & (1 << 31) != 0;
        let mut chain = 0;
        while extended {
            chain += 1;
            if chain > 4 {
                return Err(ErrorImpl::ExtendedOperandChain.into());
            }
            let ext = self.next("extended operand token")?;
            match ext & 0x3F {
                1 => {
                    let modifier = (ext >> 6) & 0xFF;
                    operand.neg = modifier == 1 || modifier == 3;
                    operand.abs = modifier == 2 || modifier == 3;
                    operand.min_precision = MinPrecision::from_u32((ext >> 14) & 0x7)?;
                    operand.non_uniform = ext & (1 << 17) != 0;
                }
                other => {
                    return Err(
                        ErrorImpl::UnknownEnumValue("extended operand type", other).into()
                    );
                }
            }
            extended = ext & (1 << 31) != 0;
        }

        for dim in 0..operand.index_dim as usize {
            operand.indices[dim] = self.parse_index(reprs[dim])?;
        }

        if operand.kind == OperandKind::Immediate32 {
            let n = if operand.num_components == 4 { 4 } else { 1 };
            for i in 0..n {
                operand.imm[i] = self.next("immediate value")?;
            }
        } else if operand.kind == OperandKind::Immediate64 {
            let n = if operand.num_components == 4 { 2 } else { 1 };
            for i in 0..n {
                let lo = self.next("immediate64 value")?;
                let hi = self.next("immediate64 value")?;
                operand.imm64[i] = (hi as u64) << 32 | lo as u64;
            }
        }

        Ok(operand)
    }

    /// Decodes a single index tail per its representation.
    pub fn parse_index(&mut self, repr: IndexRepr) -> Result<OperandIndex, DecodeError> {
        let mut index = OperandIndex {
            repr,
            ..Default::default()
        };

        match repr {
            IndexRepr::Immediate32 => {
                index.imm = self.next("immediate index")?;
            }
            IndexRepr::Immediate64 => {
                let lo = self.next("immediate64 index")?;
                let hi = self.next("immediate64 index")?;
                index.imm64 = (hi as u64) << 32 | lo as u64;
                index.imm = lo;
            }
            IndexRepr::Relative => {
                self.parse_relative(&mut index)?;
            }
            IndexRepr::Immediate32PlusRelative => {
                index.imm = self.next("immediate index")?;
                self.parse_relative(&mut index)?;
            }
            IndexRepr::Immediate64PlusRelative => {
                let lo = self.next("immediate64 index")?;
                let hi = self.next("immediate64 index")?;
                index.imm64 = (hi as u64) << 32 | lo as u64;
                index.imm = lo;
                self.parse_relative(&mut index)?;
            }
        }

        Ok(index)
    }

    /// The relative part of an index is a nested operand; only temp and
    /// indexable-temp registers can supply it.
    fn parse_relative(&mut self, index: &mut OperandIndex) -> Result<(), DecodeError> {
        let rel = self.parse_operand()?;
        match rel.kind {
            OperandKind::Temp => {
                index.rel_kind = Some(OperandKind::Temp);
                index.rel_index = rel.reg_index(0);
            }
            OperandKind::IndexableTemp => {
                index.rel_kind = Some(OperandKind::IndexableTemp);
                index.rel_index = rel.reg_index(0);
                index.rel_index2 = rel.reg_index(1);
            }
            _ => return Err(ErrorImpl::InvalidRelativeIndex.into()),
        }
        index.rel_component = rel.select_component();
        index.rel_min_precision = rel.min_precision;
        Ok(())
    }

    fn is_sm51(&self) -> bool {
        self.version_major == 5 && self.version_minor >= 1
    }
}

fn sign_extend_4(value: u32) -> i32 {
    let v = (value & 0xF) as i32;
    (v << 28) >> 28
}

#[cfg(test)]
mod tests {
    use super::ShaderCodeReader;
    use crate::sm50::{ComponentSelection, IndexRepr, Opcode, OperandKind, ProgramType};
    use crate::test_utils::{opcode_token, src_imm32_vec4, src_temp_swizzle, dst_temp_mask};

    fn reader(tokens: &[u32]) -> ShaderCodeReader<'_> {
        ShaderCodeReader::new(tokens).unwrap()
    }

    fn vs_program(body: &[u32]) -> Vec<u32> {
        let mut tokens = vec![0x0001_0050, 0];
        tokens.extend_from_slice(body);
        tokens[1] = tokens.len() as u32;
        tokens
    }

    #[test]
    fn header_fields() {
        let tokens = vs_program(&[opcode_token(62, 1)]);
        let r = reader(&tokens);
        assert_eq!(r.program_type(), ProgramType::Vertex);
        assert_eq!(r.version_major(), 5);
        assert_eq!(r.version_minor(), 0);
        assert_eq!(r.length_in_tokens(), tokens.len() as u32);
        assert!(!r.end_of_shader());
    }

    #[test]
    fn decode_mov_imm_to_temp() {
        let mut body = vec![opcode_token(54, 8)];
        body.extend_from_slice(&dst_temp_mask(0, 0xF));
        body.extend_from_slice(&src_imm32_vec4([
            1.0f32.to_bits(),
            2.0f32.to_bits(),
            3.0f32.to_bits(),
            4.0f32.to_bits(),
        ]));
        let tokens = vs_program(&body);
        let mut r = reader(&tokens);

        let inst = r.parse_instruction().unwrap();
        assert_eq!(inst.opcode(), Opcode::Mov);
        assert_eq!(inst.operands.len(), 2);

        let dst = inst.operand(0);
        assert_eq!(dst.kind, OperandKind::Temp);
        assert_eq!(dst.write_mask(), 0xF);
        assert_eq!(dst.reg_index(0), 0);

        let src = inst.operand(1);
        assert_eq!(src.kind, OperandKind::Immediate32);
        assert_eq!(src.imm[1], 2.0f32.to_bits());
        assert!(r.end_of_shader());
    }

    #[test]
    fn decode_swizzle_and_select() {
        let mut body = vec![opcode_token(54, 5)];
        body.extend_from_slice(&dst_temp_mask(1, 0b0011));
        body.extend_from_slice(&src_temp_swizzle(0, [3, 3, 0, 1]));
        let tokens = vs_program(&body);
        let mut r = reader(&tokens);

        let inst = r.parse_instruction().unwrap();
        let src = inst.operand(1);
        assert_eq!(src.selection, ComponentSelection::Swizzle([3, 3, 0, 1]));
        assert_eq!(src.swizzle(), [3, 3, 0, 1]);

        let dst = inst.operand(0);
        assert_eq!(dst.write_mask(), 0b0011);
        assert_eq!(dst.reg_index(0), 1);
    }

    #[test]
    fn decode_negated_operand() {
        // mov r0.x, -r1.x -> src carries an extended modifier token.
        let src_token: u32 = {
            // 4-component, select-1 mode of component 0, temp, 1D,
            // extended bit.
            2 | (2 << 2) | (0 << 12) | (1 << 20) | (1 << 31)
        };
        let ext_modifier: u32 = 1 | (1 << 6); // neg
        let body = [
            opcode_token(54, 6),
            dst_temp_mask(0, 0b0001)[0],
            dst_temp_mask(0, 0b0001)[1],
            src_token,
            ext_modifier,
            1, // r1
        ];
        let tokens = vs_program(&body);
        let mut r = reader(&tokens);

        let inst = r.parse_instruction().unwrap();
        let src = inst.operand(1);
        assert!(src.neg);
        assert!(!src.abs);
        assert_eq!(src.reg_index(0), 1);
    }

    #[test]
    fn decode_relative_index() {
        // x0[r1.x + 3]
        let src_token: u32 = {
            // indexable temp, 2D: dim0 imm32, dim1 imm32+relative,
            // swizzle identity.
            2 | (1 << 2) | (0 << 4) | (1 << 6) | (2 << 8) | (3 << 10)
                | (3 << 12)
                | (2 << 20)
                | (0 << 22)
                | (3 << 25)
        };
        let rel_operand: u32 = 2 | (2 << 2) | (0 << 4) | (0 << 12) | (1 << 20);
        let body = [
            opcode_token(54, 8),
            dst_temp_mask(0, 0xF)[0],
            dst_temp_mask(0, 0xF)[1],
            src_token,
            0, // x0
            3, // + 3
            rel_operand,
            1, // r1
        ];
        let tokens = vs_program(&body);
        let mut r = reader(&tokens);

        let inst = r.parse_instruction().unwrap();
        let src = inst.operand(1);
        assert_eq!(src.kind, OperandKind::IndexableTemp);
        assert_eq!(src.index_dim, 2);
        assert_eq!(src.indices[0].imm, 0);

        let idx = &src.indices[1];
        assert_eq!(idx.repr, IndexRepr::Immediate32PlusRelative);
        assert_eq!(idx.imm, 3);
        assert_eq!(idx.rel_kind, Some(OperandKind::Temp));
        assert_eq!(idx.rel_index, 1);
        assert_eq!(idx.rel_component, 0);
    }

    #[test]
    fn truncated_stream_errors() {
        let body = [opcode_token(54, 9), dst_temp_mask(0, 0xF)[0]];
        let mut tokens = vs_program(&body);
        // Lie about the program length so end_of_shader is not reached.
        tokens[1] = 20;
        let mut r = reader(&tokens);
        assert!(r.parse_instruction().is_err());
    }

    #[test]
    fn zero_length_instruction_rejected() {
        // The 7-bit length field cannot encode more than
        // MAX_INSTRUCTION_LENGTH words, so zero is the malformed case.
        let body = [opcode_token(54, 0)];
        let tokens = vs_program(&body);
        let mut r = reader(&tokens);
        assert!(r.parse_instruction().is_err());
    }

    #[test]
    fn unknown_opcode_rejected() {
        let body = [opcode_token(300, 1)];
        let tokens = vs_program(&body);
        let mut r = reader(&tokens);
        assert!(r.parse_instruction().is_err());
    }

    #[test]
    fn customdata_blob_captured() {
        // Immediate constant buffer with two vec4s.
        let mut body = vec![53 | (3 << 11), 10];
        body.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let tokens = vs_program(&body);
        let mut r = reader(&tokens);

        let inst = r.parse_instruction().unwrap();
        let data = inst.custom_data.unwrap();
        assert_eq!(data.data.len(), 8);
        assert_eq!(data.data[4], 5);
        assert!(r.end_of_shader());
    }
}
