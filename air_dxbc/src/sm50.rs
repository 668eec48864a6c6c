//! Enumerations of the Shader Model 4/5 tokenized program format.
//!
//! Numeric values follow the public tokenized-program format so that raw
//! DXBC token streams decode without remapping tables.

use bitflags::bitflags;

use crate::{DecodeError, ErrorImpl};

/// Program type from the version token of a `SHDR`/`SHEX` chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProgramType {
    Pixel,
    Vertex,
    Geometry,
    Hull,
    Domain,
    Compute,
}

impl ProgramType {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Pixel,
            1 => Self::Vertex,
            2 => Self::Geometry,
            3 => Self::Hull,
            4 => Self::Domain,
            5 => Self::Compute,
            _ => return None,
        })
    }
}

/// Instruction operand count and class, indexed by opcode.
#[derive(Copy, Clone, Debug)]
pub struct OpcodeInfo {
    pub num_operands: u8,
    pub class: OpcodeClass,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpcodeClass {
    Float,
    Int,
    Uint,
    Bit,
    Flow,
    Tex,
    Dcl,
    Atomic,
    Mem,
    Double,
    FloatToDouble,
    DoubleToFloat,
    Debug,
}

macro_rules! opcodes {
    ($(($name:ident, $value:literal, $operands:literal, $class:ident)),* $(,)?) => {
        /// Opcode of a tokenized instruction.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($name,)*
        }

        impl Opcode {
            pub fn from_u32(value: u32) -> Option<Self> {
                Some(match value {
                    $($value => Self::$name,)*
                    _ => return None,
                })
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)*
                }
            }

            /// Operand count and opcode class from the static table.
            pub const fn info(self) -> OpcodeInfo {
                match self {
                    $(Self::$name => OpcodeInfo {
                        num_operands: $operands,
                        class: OpcodeClass::$class,
                    },)*
                }
            }
        }
    };
}

opcodes! {
    (Add, 0, 3, Float),
    (And, 1, 3, Bit),
    (Break, 2, 0, Flow),
    (Breakc, 3, 1, Flow),
    (Call, 4, 1, Flow),
    (Callc, 5, 2, Flow),
    (Case, 6, 1, Flow),
    (Continue, 7, 0, Flow),
    (Continuec, 8, 1, Flow),
    (Cut, 9, 0, Flow),
    (Default, 10, 0, Flow),
    (DerivRtx, 11, 2, Float),
    (DerivRty, 12, 2, Float),
    (Discard, 13, 1, Flow),
    (Div, 14, 3, Float),
    (Dp2, 15, 3, Float),
    (Dp3, 16, 3, Float),
    (Dp4, 17, 3, Float),
    (Else, 18, 0, Flow),
    (Emit, 19, 0, Flow),
    (EmitThenCut, 20, 0, Flow),
    (EndIf, 21, 0, Flow),
    (EndLoop, 22, 0, Flow),
    (EndSwitch, 23, 0, Flow),
    (Eq, 24, 3, Float),
    (Exp, 25, 2, Float),
    (Frc, 26, 2, Float),
    (Ftoi, 27, 2, Float),
    (Ftou, 28, 2, Float),
    (Ge, 29, 3, Float),
    (IAdd, 30, 3, Int),
    (If, 31, 1, Flow),
    (IEq, 32, 3, Int),
    (IGe, 33, 3, Int),
    (ILt, 34, 3, Int),
    (IMad, 35, 4, Int),
    (IMax, 36, 3, Int),
    (IMin, 37, 3, Int),
    (IMul, 38, 4, Int),
    (INe, 39, 3, Int),
    (INeg, 40, 2, Int),
    (IShl, 41, 3, Int),
    (IShr, 42, 3, Int),
    (Itof, 43, 2, Int),
    (Label, 44, 1, Flow),
    (Ld, 45, 3, Tex),
    (LdMs, 46, 4, Tex),
    (Log, 47, 2, Float),
    (Loop, 48, 0, Flow),
    (Lt, 49, 3, Float),
    (Mad, 50, 4, Float),
    (Min, 51, 3, Float),
    (Max, 52, 3, Float),
    (CustomData, 53, 0, Flow),
    (Mov, 54, 2, Float),
    (Movc, 55, 4, Float),
    (Mul, 56, 3, Float),
    (Ne, 57, 3, Float),
    (Nop, 58, 0, Flow),
    (Not, 59, 2, Bit),
    (Or, 60, 3, Bit),
    (ResInfo, 61, 3, Tex),
    (Ret, 62, 0, Flow),
    (Retc, 63, 1, Flow),
    (RoundNe, 64, 2, Float),
    (RoundNi, 65, 2, Float),
    (RoundPi, 66, 2, Float),
    (RoundZ, 67, 2, Float),
    (Rsq, 68, 2, Float),
    (Sample, 69, 4, Tex),
    (SampleC, 70, 5, Tex),
    (SampleCLz, 71, 5, Tex),
    (SampleL, 72, 5, Tex),
    (SampleD, 73, 6, Tex),
    (SampleB, 74, 5, Tex),
    (Sqrt, 75, 2, Float),
    (Switch, 76, 1, Flow),
    (SinCos, 77, 3, Float),
    (UDiv, 78, 4, Uint),
    (ULt, 79, 3, Uint),
    (UGe, 80, 3, Uint),
    (UMul, 81, 4, Uint),
    (UMad, 82, 4, Uint),
    (UMax, 83, 3, Uint),
    (UMin, 84, 3, Uint),
    (UShr, 85, 3, Uint),
    (Utof, 86, 2, Uint),
    (Xor, 87, 3, Bit),
    (DclResource, 88, 1, Dcl),
    (DclConstantBuffer, 89, 1, Dcl),
    (DclSampler, 90, 1, Dcl),
    (DclIndexRange, 91, 1, Dcl),
    (DclGsOutputPrimitiveTopology, 92, 0, Dcl),
    (DclGsInputPrimitive, 93, 0, Dcl),
    (DclMaxOutputVertexCount, 94, 0, Dcl),
    (DclInput, 95, 1, Dcl),
    (DclInputSgv, 96, 1, Dcl),
    (DclInputSiv, 97, 1, Dcl),
    (DclInputPs, 98, 1, Dcl),
    (DclInputPsSgv, 99, 1, Dcl),
    (DclInputPsSiv, 100, 1, Dcl),
    (DclOutput, 101, 1, Dcl),
    (DclOutputSgv, 102, 1, Dcl),
    (DclOutputSiv, 103, 1, Dcl),
    (DclTemps, 104, 0, Dcl),
    (DclIndexableTemp, 105, 0, Dcl),
    (DclGlobalFlags, 106, 0, Dcl),
    (Lod, 108, 4, Tex),
    (Gather4, 109, 4, Tex),
    (SamplePos, 110, 3, Tex),
    (SampleInfo, 111, 2, Tex),
    (HsDecls, 113, 0, Flow),
    (HsControlPointPhase, 114, 0, Flow),
    (HsForkPhase, 115, 0, Flow),
    (HsJoinPhase, 116, 0, Flow),
    (EmitStream, 117, 1, Flow),
    (CutStream, 118, 1, Flow),
    (EmitThenCutStream, 119, 1, Flow),
    (InterfaceCall, 120, 1, Flow),
    (BufInfo, 121, 2, Tex),
    (DerivRtxCoarse, 122, 2, Float),
    (DerivRtxFine, 123, 2, Float),
    (DerivRtyCoarse, 124, 2, Float),
    (DerivRtyFine, 125, 2, Float),
    (Gather4C, 126, 5, Tex),
    (Gather4Po, 127, 5, Tex),
    (Gather4PoC, 128, 6, Tex),
    (Rcp, 129, 2, Float),
    (F32ToF16, 130, 2, Float),
    (F16ToF32, 131, 2, Float),
    (UAddc, 132, 4, Uint),
    (USubb, 133, 4, Uint),
    (CountBits, 134, 2, Bit),
    (FirstBitHi, 135, 2, Bit),
    (FirstBitLo, 136, 2, Bit),
    (FirstBitShi, 137, 2, Int),
    (UBfe, 138, 4, Uint),
    (IBfe, 139, 4, Int),
    (Bfi, 140, 5, Bit),
    (BfRev, 141, 2, Bit),
    (Swapc, 142, 5, Float),
    (DclStream, 143, 1, Dcl),
    (DclFunctionBody, 144, 0, Dcl),
    (DclFunctionTable, 145, 0, Dcl),
    (DclInterface, 146, 0, Dcl),
    (DclInputControlPointCount, 147, 0, Dcl),
    (DclOutputControlPointCount, 148, 0, Dcl),
    (DclTessDomain, 149, 0, Dcl),
    (DclTessPartitioning, 150, 0, Dcl),
    (DclTessOutputPrimitive, 151, 0, Dcl),
    (DclHsMaxTessFactor, 152, 0, Dcl),
    (DclHsForkPhaseInstanceCount, 153, 0, Dcl),
    (DclHsJoinPhaseInstanceCount, 154, 0, Dcl),
    (DclThreadGroup, 155, 0, Dcl),
    (DclUavTyped, 156, 1, Dcl),
    (DclUavRaw, 157, 1, Dcl),
    (DclUavStructured, 158, 1, Dcl),
    (DclTgsmRaw, 159, 1, Dcl),
    (DclTgsmStructured, 160, 1, Dcl),
    (DclResourceRaw, 161, 1, Dcl),
    (DclResourceStructured, 162, 1, Dcl),
    (LdUavTyped, 163, 3, Mem),
    (StoreUavTyped, 164, 3, Mem),
    (LdRaw, 165, 3, Mem),
    (StoreRaw, 166, 3, Mem),
    (LdStructured, 167, 4, Mem),
    (StoreStructured, 168, 4, Mem),
    (AtomicAnd, 169, 3, Atomic),
    (AtomicOr, 170, 3, Atomic),
    (AtomicXor, 171, 3, Atomic),
    (AtomicCmpStore, 172, 4, Atomic),
    (AtomicIAdd, 173, 3, Atomic),
    (AtomicIMax, 174, 3, Atomic),
    (AtomicIMin, 175, 3, Atomic),
    (AtomicUMax, 176, 3, Atomic),
    (AtomicUMin, 177, 3, Atomic),
    (ImmAtomicAlloc, 178, 2, Atomic),
    (ImmAtomicConsume, 179, 2, Atomic),
    (ImmAtomicIAdd, 180, 4, Atomic),
    (ImmAtomicAnd, 181, 4, Atomic),
    (ImmAtomicOr, 182, 4, Atomic),
    (ImmAtomicXor, 183, 4, Atomic),
    (ImmAtomicExch, 184, 4, Atomic),
    (ImmAtomicCmpExch, 185, 5, Atomic),
    (ImmAtomicIMax, 186, 4, Atomic),
    (ImmAtomicIMin, 187, 4, Atomic),
    (ImmAtomicUMax, 188, 4, Atomic),
    (ImmAtomicUMin, 189, 4, Atomic),
    (Sync, 190, 0, Flow),
    (DAdd, 191, 3, Double),
    (DMax, 192, 3, Double),
    (DMin, 193, 3, Double),
    (DMul, 194, 3, Double),
    (DEq, 195, 3, Double),
    (DGe, 196, 3, Double),
    (DLt, 197, 3, Double),
    (DNe, 198, 3, Double),
    (DMov, 199, 2, Double),
    (DMovc, 200, 4, Double),
    (DtoF, 201, 2, DoubleToFloat),
    (FtoD, 202, 2, FloatToDouble),
    (EvalSnapped, 203, 3, Float),
    (EvalSampleIndex, 204, 3, Float),
    (EvalCentroid, 205, 2, Float),
    (DclGsInstanceCount, 206, 0, Dcl),
    (Abort, 207, 0, Debug),
    (DebugBreak, 208, 0, Debug),
    (DDiv, 210, 3, Double),
    (DFma, 211, 4, Double),
    (DRcp, 212, 2, Double),
    (Msad, 213, 4, Uint),
    (DtoI, 214, 2, DoubleToFloat),
    (DtoU, 215, 2, DoubleToFloat),
    (ItoD, 216, 2, FloatToDouble),
    (UtoD, 217, 2, FloatToDouble),
    (Gather4Feedback, 219, 5, Tex),
    (Gather4CFeedback, 220, 6, Tex),
    (Gather4PoFeedback, 221, 6, Tex),
    (Gather4PoCFeedback, 222, 7, Tex),
    (LdFeedback, 223, 4, Tex),
    (LdMsFeedback, 224, 5, Tex),
    (LdUavTypedFeedback, 225, 4, Mem),
    (SampleLFeedback, 226, 6, Tex),
    (SampleCClampFeedback, 227, 7, Tex),
    (SampleClampFeedback, 228, 6, Tex),
    (SampleBClampFeedback, 229, 7, Tex),
    (SampleDClampFeedback, 230, 8, Tex),
    (SampleCLzFeedback, 231, 6, Tex),
    (CheckAccessFullyMapped, 232, 2, Mem),
}

/// Operand register kind from bits [19:12] of an operand token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Temp,
    Input,
    Output,
    IndexableTemp,
    Immediate32,
    Immediate64,
    Sampler,
    Resource,
    ConstantBuffer,
    ImmediateConstantBuffer,
    Label,
    InputPrimitiveId,
    OutputDepth,
    Null,
    Rasterizer,
    OutputCoverageMask,
    Stream,
    FunctionBody,
    FunctionTable,
    Interface,
    FunctionInput,
    FunctionOutput,
    OutputControlPointId,
    InputForkInstanceId,
    InputJoinInstanceId,
    InputControlPoint,
    OutputControlPoint,
    InputPatchConstant,
    InputDomainPoint,
    ThisPointer,
    UnorderedAccessView,
    ThreadGroupSharedMemory,
    InputThreadId,
    InputThreadGroupId,
    InputThreadIdInGroup,
    InputCoverageMask,
    InputThreadIdInGroupFlattened,
    InputGsInstanceId,
    OutputDepthGreaterEqual,
    OutputDepthLessEqual,
    CycleCounter,
    OutputStencilRef,
    InnerCoverage,
}

impl OperandKind {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Temp,
            1 => Self::Input,
            2 => Self::Output,
            3 => Self::IndexableTemp,
            4 => Self::Immediate32,
            5 => Self::Immediate64,
            6 => Self::Sampler,
            7 => Self::Resource,
            8 => Self::ConstantBuffer,
            9 => Self::ImmediateConstantBuffer,
            10 => Self::Label,
            11 => Self::InputPrimitiveId,
            12 => Self::OutputDepth,
            13 => Self::Null,
            14 => Self::Rasterizer,
            15 => Self::OutputCoverageMask,
            16 => Self::Stream,
            17 => Self::FunctionBody,
            18 => Self::FunctionTable,
            19 => Self::Interface,
            20 => Self::FunctionInput,
            21 => Self::FunctionOutput,
            22 => Self::OutputControlPointId,
            23 => Self::InputForkInstanceId,
            24 => Self::InputJoinInstanceId,
            25 => Self::InputControlPoint,
            26 => Self::OutputControlPoint,
            27 => Self::InputPatchConstant,
            28 => Self::InputDomainPoint,
            29 => Self::ThisPointer,
            30 => Self::UnorderedAccessView,
            31 => Self::ThreadGroupSharedMemory,
            32 => Self::InputThreadId,
            33 => Self::InputThreadGroupId,
            34 => Self::InputThreadIdInGroup,
            35 => Self::InputCoverageMask,
            36 => Self::InputThreadIdInGroupFlattened,
            37 => Self::InputGsInstanceId,
            38 => Self::OutputDepthGreaterEqual,
            39 => Self::OutputDepthLessEqual,
            40 => Self::CycleCounter,
            41 => Self::OutputStencilRef,
            42 => Self::InnerCoverage,
            _ => return None,
        })
    }
}

/// Per-dimension index representation, bits [24:22]/[27:25]/[30:28].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum IndexRepr {
    #[default]
    Immediate32,
    Immediate64,
    Relative,
    Immediate32PlusRelative,
    Immediate64PlusRelative,
}

impl IndexRepr {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Immediate32,
            1 => Self::Immediate64,
            2 => Self::Relative,
            3 => Self::Immediate32PlusRelative,
            4 => Self::Immediate64PlusRelative,
            _ => return None,
        })
    }
}

/// Component selection carried by a 4-component operand token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComponentSelection {
    /// Write mask, already shifted so bit 0 is `.x`.
    Mask(u8),
    /// Four source components, 2 bits each in the encoding.
    Swizzle([u8; 4]),
    /// Single-component select.
    Select(u8),
    /// 0- or 1-component operands carry no selection.
    None,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MinPrecision {
    #[default]
    Default,
    Float16,
    Float2_8,
    Sint16,
    Uint16,
}

impl MinPrecision {
    pub(crate) fn from_u32(value: u32) -> Result<Self, DecodeError> {
        Ok(match value {
            0 => Self::Default,
            1 => Self::Float16,
            2 => Self::Float2_8,
            4 => Self::Sint16,
            5 => Self::Uint16,
            other => {
                return Err(ErrorImpl::UnknownEnumValue("min precision", other).into());
            }
        })
    }
}

/// Resource dimension from `dcl_resource` and the extended opcode token.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    #[default]
    Unknown,
    Buffer,
    Texture1D,
    Texture2D,
    Texture2DMs,
    Texture3D,
    TextureCube,
    Texture1DArray,
    Texture2DArray,
    Texture2DMsArray,
    TextureCubeArray,
    RawBuffer,
    StructuredBuffer,
}

impl ResourceDimension {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Unknown,
            1 => Self::Buffer,
            2 => Self::Texture1D,
            3 => Self::Texture2D,
            4 => Self::Texture2DMs,
            5 => Self::Texture3D,
            6 => Self::TextureCube,
            7 => Self::Texture1DArray,
            8 => Self::Texture2DArray,
            9 => Self::Texture2DMsArray,
            10 => Self::TextureCubeArray,
            11 => Self::RawBuffer,
            12 => Self::StructuredBuffer,
            _ => return None,
        })
    }
}

/// Scalar return type of a typed resource declaration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResourceReturnType {
    Unorm,
    Snorm,
    Sint,
    Uint,
    #[default]
    Float,
    Mixed,
    Double,
    Continued,
    Unused,
}

impl ResourceReturnType {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::Unorm,
            2 => Self::Snorm,
            3 => Self::Sint,
            4 => Self::Uint,
            5 => Self::Float,
            6 => Self::Mixed,
            7 => Self::Double,
            8 => Self::Continued,
            0 => Self::Unused,
            _ => return None,
        })
    }
}

/// System-value name attached to `dcl_input_siv`-style declarations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SystemName {
    Undefined,
    Position,
    ClipDistance,
    CullDistance,
    RenderTargetArrayIndex,
    ViewportArrayIndex,
    VertexId,
    PrimitiveId,
    InstanceId,
    IsFrontFace,
    SampleIndex,
    FinalQuadUeq0EdgeTessFactor,
    FinalQuadVeq0EdgeTessFactor,
    FinalQuadUeq1EdgeTessFactor,
    FinalQuadVeq1EdgeTessFactor,
    FinalQuadUInsideTessFactor,
    FinalQuadVInsideTessFactor,
    FinalTriUeq0EdgeTessFactor,
    FinalTriVeq0EdgeTessFactor,
    FinalTriWeq0EdgeTessFactor,
    FinalTriInsideTessFactor,
    FinalLineDetailTessFactor,
    FinalLineDensityTessFactor,
}

impl SystemName {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Undefined,
            1 => Self::Position,
            2 => Self::ClipDistance,
            3 => Self::CullDistance,
            4 => Self::RenderTargetArrayIndex,
            5 => Self::ViewportArrayIndex,
            6 => Self::VertexId,
            7 => Self::PrimitiveId,
            8 => Self::InstanceId,
            9 => Self::IsFrontFace,
            10 => Self::SampleIndex,
            11 => Self::FinalQuadUeq0EdgeTessFactor,
            12 => Self::FinalQuadVeq0EdgeTessFactor,
            13 => Self::FinalQuadUeq1EdgeTessFactor,
            14 => Self::FinalQuadVeq1EdgeTessFactor,
            15 => Self::FinalQuadUInsideTessFactor,
            16 => Self::FinalQuadVInsideTessFactor,
            17 => Self::FinalTriUeq0EdgeTessFactor,
            18 => Self::FinalTriVeq0EdgeTessFactor,
            19 => Self::FinalTriWeq0EdgeTessFactor,
            20 => Self::FinalTriInsideTessFactor,
            21 => Self::FinalLineDetailTessFactor,
            22 => Self::FinalLineDensityTessFactor,
            _ => return None,
        })
    }
}

/// Pixel-shader input interpolation mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum InterpolationMode {
    #[default]
    Undefined,
    Constant,
    Linear,
    LinearCentroid,
    LinearNoPerspective,
    LinearNoPerspectiveCentroid,
    LinearSample,
    LinearNoPerspectiveSample,
}

impl InterpolationMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Undefined,
            1 => Self::Constant,
            2 => Self::Linear,
            3 => Self::LinearCentroid,
            4 => Self::LinearNoPerspective,
            5 => Self::LinearNoPerspectiveCentroid,
            6 => Self::LinearSample,
            7 => Self::LinearNoPerspectiveSample,
            _ => return None,
        })
    }
}

/// Geometry-shader input primitive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum GsInputPrimitive {
    #[default]
    Undefined,
    Point,
    Line,
    Triangle,
    LineAdj,
    TriangleAdj,
}

impl GsInputPrimitive {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Undefined,
            1 => Self::Point,
            2 => Self::Line,
            3 => Self::Triangle,
            6 => Self::LineAdj,
            7 => Self::TriangleAdj,
            _ => return None,
        })
    }
}

/// Geometry-shader output topology.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum GsOutputTopology {
    #[default]
    Undefined,
    PointList,
    LineStrip,
    TriangleStrip,
}

impl GsOutputTopology {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Undefined,
            1 => Self::PointList,
            3 => Self::LineStrip,
            5 => Self::TriangleStrip,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TessellatorDomain {
    #[default]
    Undefined,
    Isoline,
    Triangle,
    Quad,
}

impl TessellatorDomain {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Undefined,
            1 => Self::Isoline,
            2 => Self::Triangle,
            3 => Self::Quad,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TessellatorPartitioning {
    #[default]
    Undefined,
    Integer,
    Pow2,
    FractionalOdd,
    FractionalEven,
}

impl TessellatorPartitioning {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Undefined,
            1 => Self::Integer,
            2 => Self::Pow2,
            3 => Self::FractionalOdd,
            4 => Self::FractionalEven,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TessellatorOutputPrimitive {
    #[default]
    Undefined,
    Point,
    Line,
    TriangleCw,
    TriangleCcw,
}

impl TessellatorOutputPrimitive {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Undefined,
            1 => Self::Point,
            2 => Self::Line,
            3 => Self::TriangleCw,
            4 => Self::TriangleCcw,
            _ => return None,
        })
    }
}

bitflags! {
    /// `dcl_globalFlags` bits, taken from the opcode token controls.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct GlobalFlags: u32 {
        const REFACTORING_ALLOWED = 1 << 11;
        const DOUBLE_PRECISION = 1 << 12;
        const FORCE_EARLY_DEPTH_STENCIL = 1 << 13;
        const RAW_AND_STRUCTURED_BUFFERS = 1 << 14;
        const SKIP_OPTIMIZATION = 1 << 15;
        const MIN_PRECISION = 1 << 16;
        const DOUBLE_EXTENSIONS_11_1 = 1 << 17;
        const SHADER_EXTENSIONS_11_1 = 1 << 18;
    }
}

bitflags! {
    /// `sync` instruction controls, taken from the opcode token.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SyncFlags: u32 {
        const THREADS_IN_GROUP = 1 << 11;
        const TGSM_MEMORY = 1 << 12;
        const UAV_MEMORY_GROUP = 1 << 13;
        const UAV_MEMORY_GLOBAL = 1 << 14;
    }
}

bitflags! {
    /// UAV declaration access flags, taken from the opcode token.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct UavFlags: u32 {
        const GLOBALLY_COHERENT = 1 << 16;
        const RASTERIZER_ORDERED = 1 << 17;
    }
}

/// `resinfo` return-type control, bits [12:11] of the opcode token.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ResInfoReturnType {
    #[default]
    Float,
    RcpFloat,
    Uint,
}

impl ResInfoReturnType {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Float,
            1 => Self::RcpFloat,
            2 => Self::Uint,
            _ => return None,
        })
    }
}

/// Constant-buffer access pattern, bit 11 of the opcode token.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CbAccessPattern {
    #[default]
    ImmediateIndexed,
    DynamicIndexed,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplerMode {
    #[default]
    Default,
    Comparison,
    Mono,
}

impl SamplerMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Default,
            1 => Self::Comparison,
            2 => Self::Mono,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Opcode, OpcodeClass, OperandKind};

    #[test]
    fn opcode_round_trip() {
        assert_eq!(Opcode::from_u32(54), Some(Opcode::Mov));
        assert_eq!(Opcode::from_u32(62), Some(Opcode::Ret));
        assert_eq!(Opcode::from_u32(190), Some(Opcode::Sync));
        assert_eq!(Opcode::from_u32(213), Some(Opcode::Msad));
        assert_eq!(Opcode::from_u32(107), None);
        assert_eq!(Opcode::from_u32(300), None);
    }

    #[test]
    fn operand_count_table() {
        assert_eq!(Opcode::Mov.info().num_operands, 2);
        assert_eq!(Opcode::Movc.info().num_operands, 4);
        assert_eq!(Opcode::Sample.info().num_operands, 4);
        assert_eq!(Opcode::ImmAtomicCmpExch.info().num_operands, 5);
        assert_eq!(Opcode::IAdd.info().class, OpcodeClass::Int);
        assert_eq!(Opcode::DclTemps.info().class, OpcodeClass::Dcl);
    }

    #[test]
    fn operand_kind_values() {
        assert_eq!(OperandKind::from_u32(0), Some(OperandKind::Temp));
        assert_eq!(OperandKind::from_u32(4), Some(OperandKind::Immediate32));
        assert_eq!(
            OperandKind::from_u32(30),
            Some(OperandKind::UnorderedAccessView)
        );
        assert_eq!(OperandKind::from_u32(43), None);
    }
}
