//! Typed intermediate representation of a lifted shader.
//!
//! DXBC operands carry no static type; the lifter assigns read and write
//! types per opcode so the emitter knows where to cast. Instructions are
//! sum types over opcode categories, matched exhaustively downstream.

/// Phase tag for registers outside any hull-shader phase.
pub const PHASE_NONE: u32 = !0;

/// Sentinel for "every stream/target" style masks.
pub const MASK_ALL: u8 = 0b1111;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Swizzle(pub [u8; 4]);

impl Swizzle {
    pub const IDENTITY: Self = Self([0, 1, 2, 3]);

    pub fn splat(component: u8) -> Self {
        Self([component; 4])
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Type a source operand is read as, or a destination written as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Float,
    Integer,
    /// Two half floats packed in each 32-bit lane (`f16tof32` source and
    /// `f32tof16` destination).
    Half16X16,
}

/// A dynamic register-file index: `temp[r<reg>.<c> + offset]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexByTempComponent {
    pub reg: u32,
    pub phase: u32,
    pub component: u8,
    pub offset: u32,
}

/// `x<file>[...]` supplying the dynamic part of an index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexByIndexableTempComponent {
    pub file: u32,
    pub reg: u32,
    pub phase: u32,
    pub component: u8,
    pub offset: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandIndex {
    Immediate(u32),
    TempComponent(IndexByTempComponent),
    IndexableTempComponent(IndexByIndexableTempComponent),
}

/// Modifiers applied when a source operand is materialized. `abs` is
/// applied before `neg`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SrcModifier {
    pub swizzle: Swizzle,
    pub abs: bool,
    pub neg: bool,
    pub read_type: DataType,
}

impl SrcModifier {
    pub fn plain(read_type: DataType) -> Self {
        Self {
            swizzle: Swizzle::IDENTITY,
            abs: false,
            neg: false,
            read_type,
        }
    }
}

/// System-generated input values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InputAttribute {
    VertexId,
    InstanceId,
    PrimitiveId,
    ThreadId,
    ThreadIdInGroup,
    ThreadGroupId,
    ThreadIdInGroupFlattened,
    CoverageMask,
    OutputControlPointId,
    ForkInstanceId,
    JoinInstanceId,
    DomainPoint,
    GsInstanceId,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SrcOperand {
    Immediate32 {
        modifier: SrcModifier,
        value: [u32; 4],
    },
    Temp {
        modifier: SrcModifier,
        reg: u32,
        phase: u32,
    },
    IndexableTemp {
        modifier: SrcModifier,
        file: u32,
        index: OperandIndex,
        phase: u32,
    },
    Input {
        modifier: SrcModifier,
        reg: u32,
    },
    IndexableInput {
        modifier: SrcModifier,
        index: OperandIndex,
    },
    /// `vicp[cp][reg]`, per-control-point input.
    InputControlPoint {
        modifier: SrcModifier,
        control_point: OperandIndex,
        reg: u32,
    },
    /// `vocp[cp][reg]`, control-point outputs read back during
    /// patch-constant phases.
    OutputControlPoint {
        modifier: SrcModifier,
        control_point: OperandIndex,
        reg: u32,
    },
    /// `vpc[reg]`, patch constants read by the domain shader.
    PatchConstant {
        modifier: SrcModifier,
        index: OperandIndex,
    },
    ConstantBuffer {
        modifier: SrcModifier,
        range_id: u32,
        range_index: OperandIndex,
        reg_index: OperandIndex,
    },
    ImmediateConstantBuffer {
        modifier: SrcModifier,
        index: OperandIndex,
    },
    Attribute {
        modifier: SrcModifier,
        attribute: InputAttribute,
    },
}

impl SrcOperand {
    pub fn modifier(&self) -> &SrcModifier {
        match self {
            Self::Immediate32 { modifier, .. }
            | Self::Temp { modifier, .. }
            | Self::IndexableTemp { modifier, .. }
            | Self::Input { modifier, .. }
            | Self::IndexableInput { modifier, .. }
            | Self::InputControlPoint { modifier, .. }
            | Self::OutputControlPoint { modifier, .. }
            | Self::PatchConstant { modifier, .. }
            | Self::ConstantBuffer { modifier, .. }
            | Self::ImmediateConstantBuffer { modifier, .. }
            | Self::Attribute { modifier, .. } => modifier,
        }
    }
}

/// Write mask (bit 0 = `.x`) and store-site type of a destination.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DstModifier {
    pub mask: u8,
    pub write_type: DataType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DstOperand {
    Null {
        modifier: DstModifier,
    },
    /// Atomic results nobody reads; the operation still executes.
    SideEffect {
        modifier: DstModifier,
    },
    Temp {
        modifier: DstModifier,
        reg: u32,
        phase: u32,
    },
    IndexableTemp {
        modifier: DstModifier,
        file: u32,
        index: OperandIndex,
        phase: u32,
    },
    Output {
        modifier: DstModifier,
        reg: u32,
        phase: u32,
    },
    IndexableOutput {
        modifier: DstModifier,
        index: OperandIndex,
        phase: u32,
    },
    Depth {
        modifier: DstModifier,
    },
    CoverageMask {
        modifier: DstModifier,
    },
}

impl DstOperand {
    pub fn modifier(&self) -> &DstModifier {
        match self {
            Self::Null { modifier }
            | Self::SideEffect { modifier }
            | Self::Temp { modifier, .. }
            | Self::IndexableTemp { modifier, .. }
            | Self::Output { modifier, .. }
            | Self::IndexableOutput { modifier, .. }
            | Self::Depth { modifier }
            | Self::CoverageMask { modifier } => modifier,
        }
    }
}

/// Shader-resource-view operand (`t#`).
#[derive(Clone, Debug, PartialEq)]
pub struct SrvRef {
    pub range_id: u32,
    pub index: OperandIndex,
    pub read_swizzle: Swizzle,
}

/// Sampler operand (`s#`). `gather_channel` selects the channel of
/// `gather4`.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerRef {
    pub range_id: u32,
    pub index: OperandIndex,
    pub gather_channel: u8,
}

/// Unordered-access-view operand (`u#`).
#[derive(Clone, Debug, PartialEq)]
pub struct UavRef {
    pub range_id: u32,
    pub index: OperandIndex,
    pub read_swizzle: Swizzle,
}

/// Thread-group shared memory operand (`g#`).
#[derive(Clone, Debug, PartialEq)]
pub struct TgsmRef {
    pub id: u32,
    pub read_swizzle: Swizzle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtomicUavDst {
    pub range_id: u32,
    pub index: OperandIndex,
    pub mask: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtomicTgsmDst {
    pub id: u32,
    pub mask: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AtomicDst {
    Uav(AtomicUavDst),
    Tgsm(AtomicTgsmDst),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypelessSrc {
    Srv(SrvRef),
    Uav(UavRef),
    Tgsm(TgsmRef),
}

#[derive(Clone, Debug, PartialEq)]
pub enum SrvOrUav {
    Srv(SrvRef),
    Uav(UavRef),
}

/// Per-instruction flags from the opcode token.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InstCommon {
    pub saturate: bool,
    pub precise_mask: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatComparison {
    Equal,
    NotEqual,
    GreaterEqual,
    LessThan,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntegerComparison {
    Equal,
    NotEqual,
    SignedLessThan,
    SignedGreaterEqual,
    UnsignedLessThan,
    UnsignedGreaterEqual,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatBinaryOp {
    Add,
    Mul,
    Div,
    Min,
    Max,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatUnaryOp {
    Log2,
    Exp2,
    Rcp,
    Rsq,
    Sqrt,
    Fraction,
    RoundNearestEven,
    RoundNegativeInf,
    RoundPositiveInf,
    RoundZero,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntegerUnaryOp {
    Neg,
    Not,
    ReverseBits,
    CountBits,
    FirstHiBitSigned,
    FirstHiBit,
    FirstLowBit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntegerBinaryOp {
    UMin,
    UMax,
    IMin,
    IMax,
    IShl,
    IShr,
    UShr,
    Xor,
    Or,
    And,
    Add,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntegerBinaryOpWithTwoDst {
    IMul,
    UMul,
    UDiv,
    UAddCarry,
    USubBorrow,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConversionOp {
    HalfToFloat,
    FloatToHalf,
    FloatToSigned,
    SignedToFloat,
    FloatToUnsigned,
    UnsignedToFloat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtomicBinaryOp {
    And,
    Or,
    Xor,
    Add,
    IMax,
    IMin,
    UMax,
    UMin,
    Exchange,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResInfoModifier {
    None,
    Uint,
    Rcp,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UavBoundary {
    None,
    Group,
    Global,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Mov {
        common: InstCommon,
        dst: DstOperand,
        src: SrcOperand,
    },
    MovConditional {
        common: InstCommon,
        dst: DstOperand,
        src_cond: SrcOperand,
        src0: SrcOperand,
        src1: SrcOperand,
    },
    SwapConditional {
        dst0: DstOperand,
        dst1: DstOperand,
        src_cond: SrcOperand,
        src0: SrcOperand,
        src1: SrcOperand,
    },
    DotProduct {
        common: InstCommon,
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
        dimension: u8,
    },
    SinCos {
        common: InstCommon,
        dst_sin: DstOperand,
        dst_cos: DstOperand,
        src: SrcOperand,
    },
    Convert {
        op: ConversionOp,
        dst: DstOperand,
        src: SrcOperand,
    },
    IntegerCompare {
        cmp: IntegerComparison,
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
    },
    FloatCompare {
        common: InstCommon,
        cmp: FloatComparison,
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
    },
    FloatBinary {
        common: InstCommon,
        op: FloatBinaryOp,
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
    },
    IntegerBinary {
        op: IntegerBinaryOp,
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
    },
    IntegerBinaryTwoDst {
        common: InstCommon,
        op: IntegerBinaryOpWithTwoDst,
        dst_hi: DstOperand,
        dst_lo: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
    },
    FloatUnary {
        common: InstCommon,
        op: FloatUnaryOp,
        dst: DstOperand,
        src: SrcOperand,
    },
    IntegerUnary {
        op: IntegerUnaryOp,
        dst: DstOperand,
        src: SrcOperand,
    },
    FloatMad {
        common: InstCommon,
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
        src2: SrcOperand,
    },
    IntegerMad {
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
        src2: SrcOperand,
        is_signed: bool,
    },
    MaskedSumOfAbsDiff {
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
        src2: SrcOperand,
    },
    ExtractBits {
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
        src2: SrcOperand,
        is_signed: bool,
    },
    BitFieldInsert {
        dst: DstOperand,
        src0: SrcOperand,
        src1: SrcOperand,
        src2: SrcOperand,
        src3: SrcOperand,
    },
    Sample {
        dst: DstOperand,
        src_address: SrcOperand,
        src_resource: SrvRef,
        src_sampler: SamplerRef,
        offsets: [i32; 3],
        min_lod_clamp: Option<SrcOperand>,
        feedback: Option<DstOperand>,
    },
    SampleCompare {
        dst: DstOperand,
        src_address: SrcOperand,
        src_resource: SrvRef,
        src_sampler: SamplerRef,
        src_reference: SrcOperand,
        offsets: [i32; 3],
        min_lod_clamp: Option<SrcOperand>,
        feedback: Option<DstOperand>,
        level_zero: bool,
    },
    SampleBias {
        dst: DstOperand,
        src_address: SrcOperand,
        src_resource: SrvRef,
        src_sampler: SamplerRef,
        src_bias: SrcOperand,
        offsets: [i32; 3],
        min_lod_clamp: Option<SrcOperand>,
        feedback: Option<DstOperand>,
    },
    SampleDerivative {
        dst: DstOperand,
        src_address: SrcOperand,
        src_resource: SrvRef,
        src_sampler: SamplerRef,
        src_x_derivative: SrcOperand,
        src_y_derivative: SrcOperand,
        offsets: [i32; 3],
        min_lod_clamp: Option<SrcOperand>,
        feedback: Option<DstOperand>,
    },
    SampleLod {
        dst: DstOperand,
        src_address: SrcOperand,
        src_resource: SrvRef,
        src_sampler: SamplerRef,
        src_lod: SrcOperand,
        offsets: [i32; 3],
        feedback: Option<DstOperand>,
    },
    Gather {
        dst: DstOperand,
        src_address: SrcOperand,
        src_resource: SrvRef,
        src_sampler: SamplerRef,
        offset: SrcOperand,
        feedback: Option<DstOperand>,
    },
    GatherCompare {
        dst: DstOperand,
        src_address: SrcOperand,
        src_resource: SrvRef,
        src_sampler: SamplerRef,
        src_reference: SrcOperand,
        offset: SrcOperand,
        feedback: Option<DstOperand>,
    },
    SampleInfo {
        dst: DstOperand,
        /// Rasterizer info when absent.
        src: Option<SrvRef>,
        uint_result: bool,
        read_swizzle: Swizzle,
    },
    SamplePos {
        dst: DstOperand,
        src: Option<SrvRef>,
        src_sample_index: SrcOperand,
        read_swizzle: Swizzle,
    },
    BufferInfo {
        dst: DstOperand,
        src: SrvOrUav,
    },
    ResourceInfo {
        dst: DstOperand,
        src_mip_level: SrcOperand,
        src_resource: SrvOrUav,
        modifier: ResInfoModifier,
    },
    Load {
        dst: DstOperand,
        src_address: SrcOperand,
        src_resource: SrvRef,
        src_sample_index: Option<SrcOperand>,
        offsets: [i32; 3],
    },
    LoadUavTyped {
        dst: DstOperand,
        src_address: SrcOperand,
        src_uav: UavRef,
    },
    StoreUavTyped {
        dst: AtomicUavDst,
        src_address: SrcOperand,
        src: SrcOperand,
    },
    LoadRaw {
        dst: DstOperand,
        src_byte_offset: SrcOperand,
        src: TypelessSrc,
        /// An immediate byte offset aligned to 16 permits one 128-bit
        /// load instead of four scalar loads.
        offset_is_vec4_aligned: bool,
    },
    LoadStructured {
        dst: DstOperand,
        src_address: SrcOperand,
        src_byte_offset: SrcOperand,
        src: TypelessSrc,
        offset_is_vec4_aligned: bool,
    },
    StoreRaw {
        dst: AtomicDst,
        dst_byte_offset: SrcOperand,
        src: SrcOperand,
    },
    StoreStructured {
        dst: AtomicDst,
        dst_address: SrcOperand,
        dst_byte_offset: SrcOperand,
        src: SrcOperand,
    },
    Nop,
    PixelDiscard,
    PartialDerivative {
        common: InstCommon,
        dst: DstOperand,
        src: SrcOperand,
        ddy: bool,
        coarse: bool,
    },
    CalcLod {
        dst: DstOperand,
        src_address: SrcOperand,
        src_resource: SrvRef,
        src_sampler: SamplerRef,
    },
    Sync {
        uav_boundary: UavBoundary,
        tgsm_memory_barrier: bool,
        tgsm_execution_barrier: bool,
    },
    AtomicBinOp {
        op: AtomicBinaryOp,
        dst: AtomicDst,
        dst_address: SrcOperand,
        src: SrcOperand,
        dst_original: DstOperand,
    },
    AtomicImmIncrement {
        dst: DstOperand,
        uav: AtomicUavDst,
    },
    AtomicImmDecrement {
        dst: DstOperand,
        uav: AtomicUavDst,
    },
    AtomicImmCmpExchange {
        dst: DstOperand,
        dst_resource: AtomicDst,
        dst_address: SrcOperand,
        src0: SrcOperand,
        src1: SrcOperand,
    },
    Emit,
    Cut,
    InterpolateCentroid {
        dst: DstOperand,
        reg: u32,
        read_swizzle: Swizzle,
    },
    InterpolateSample {
        dst: DstOperand,
        sample_index: SrcOperand,
        reg: u32,
        read_swizzle: Swizzle,
    },
    InterpolateOffset {
        dst: DstOperand,
        offset: SrcOperand,
        reg: u32,
        read_swizzle: Swizzle,
    },
}

/// Branch condition: test a single component against zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub operand: SrcOperand,
    pub test_nonzero: bool,
}
