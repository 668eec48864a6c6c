//! Lifts decoded instructions into typed IR.
//!
//! The opcode → operand-type assignment lives entirely in
//! [`lift_instruction`]; every cast the emitter performs traces back to
//! a `DataType` chosen here.

use air_dxbc::reader::{Instruction as RawInst, Operand, OperandIndex as RawIndex};
use air_dxbc::sm50::{IndexRepr, Opcode, OperandKind};

use crate::ir::{
    AtomicBinaryOp, AtomicDst, AtomicTgsmDst, AtomicUavDst, Condition, ConversionOp, DataType,
    DstModifier, DstOperand, FloatBinaryOp, FloatComparison, FloatUnaryOp, IndexByIndexableTempComponent,
    IndexByTempComponent, InputAttribute, InstCommon, Instruction, IntegerBinaryOp,
    IntegerBinaryOpWithTwoDst, IntegerComparison, IntegerUnaryOp, OperandIndex, ResInfoModifier,
    SamplerRef, SrcModifier, SrcOperand, SrvOrUav, SrvRef, Swizzle, TgsmRef, TypelessSrc,
    UavBoundary, UavRef,
};
use crate::reflect::{ScalarType, ShaderInfo};
use crate::Error;

fn unsupported(what: impl Into<String>) -> Error {
    let what = what.into();
    tracing::warn!(%what, "rejecting unsupported shader construct");
    Error::Unsupported { what }
}

fn read_operand_index(index: &RawIndex, phase: u32) -> Result<OperandIndex, Error> {
    match index.repr {
        IndexRepr::Immediate32 => Ok(OperandIndex::Immediate(index.imm)),
        IndexRepr::Relative | IndexRepr::Immediate32PlusRelative => match index.rel_kind {
            Some(OperandKind::Temp) => Ok(OperandIndex::TempComponent(IndexByTempComponent {
                reg: index.rel_index,
                phase,
                component: index.rel_component,
                offset: index.imm,
            })),
            Some(OperandKind::IndexableTemp) => Ok(OperandIndex::IndexableTempComponent(
                IndexByIndexableTempComponent {
                    file: index.rel_index,
                    reg: index.rel_index2,
                    phase,
                    component: index.rel_component,
                    offset: index.imm,
                },
            )),
            _ => Err(Error::Malformed {
                what: "relative index without a register source".into(),
            }),
        },
        IndexRepr::Immediate64 | IndexRepr::Immediate64PlusRelative => {
            Err(unsupported("64-bit operand index"))
        }
    }
}

fn read_modifier(op: &Operand, read_type: DataType) -> SrcModifier {
    SrcModifier {
        swizzle: Swizzle(op.swizzle()),
        abs: op.abs,
        neg: op.neg,
        read_type,
    }
}

pub(crate) fn read_src_operand(
    op: &Operand,
    phase: u32,
    read_type: DataType,
    info: &mut ShaderInfo,
) -> Result<SrcOperand, Error> {
    match op.kind {
        OperandKind::Immediate32 => {
            let value = if op.num_components == 4 {
                op.imm
            } else {
                [op.imm[0]; 4]
            };
            Ok(SrcOperand::Immediate32 {
                modifier: SrcModifier {
                    swizzle: Swizzle::IDENTITY,
                    abs: op.abs,
                    neg: op.neg,
                    read_type,
                },
                value,
            })
        }
        OperandKind::Temp => Ok(SrcOperand::Temp {
            modifier: read_modifier(op, read_type),
            reg: op.reg_index(0),
            phase,
        }),
        OperandKind::Input => {
            if op.index_dim == 2 {
                // GS/HS per-vertex input.
                return Ok(SrcOperand::InputControlPoint {
                    modifier: read_modifier(op, read_type),
                    control_point: read_operand_index(&op.indices[0], phase)?,
                    reg: op.reg_index(1),
                });
            }
            if op.indices[0].repr == IndexRepr::Immediate32 {
                Ok(SrcOperand::Input {
                    modifier: read_modifier(op, read_type),
                    reg: op.reg_index(0),
                })
            } else {
                Ok(SrcOperand::IndexableInput {
                    modifier: read_modifier(op, read_type),
                    index: read_operand_index(&op.indices[0], phase)?,
                })
            }
        }
        OperandKind::InputControlPoint => Ok(SrcOperand::InputControlPoint {
            modifier: read_modifier(op, read_type),
            control_point: read_operand_index(&op.indices[0], phase)?,
            reg: op.reg_index(1),
        }),
        OperandKind::OutputControlPoint => {
            info.output_control_point_read = true;
            Ok(SrcOperand::OutputControlPoint {
                modifier: read_modifier(op, read_type),
                control_point: read_operand_index(&op.indices[0], phase)?,
                reg: op.reg_index(1),
            })
        }
        OperandKind::InputPatchConstant => Ok(SrcOperand::PatchConstant {
            modifier: read_modifier(op, read_type),
            index: read_operand_index(&op.indices[0], phase)?,
        }),
        OperandKind::IndexableTemp => Ok(SrcOperand::IndexableTemp {
            modifier: read_modifier(op, read_type),
            file: op.reg_index(0),
            index: read_operand_index(&op.indices[1], phase)?,
            phase,
        }),
        OperandKind::ConstantBuffer => {
            if op.index_dim != 2 {
                // SM 5.1 encodes descriptor-array accesses with a 3-D
                // index.
                return Err(unsupported("SM 5.1 constant buffer operand"));
            }
            Ok(SrcOperand::ConstantBuffer {
                modifier: read_modifier(op, read_type),
                range_id: op.reg_index(0),
                range_index: read_operand_index(&op.indices[0], phase)?,
                reg_index: read_operand_index(&op.indices[1], phase)?,
            })
        }
        OperandKind::ImmediateConstantBuffer => Ok(SrcOperand::ImmediateConstantBuffer {
            modifier: read_modifier(op, read_type),
            index: read_operand_index(&op.indices[0], phase)?,
        }),
        OperandKind::InputThreadGroupId => Ok(attribute(op, read_type, InputAttribute::ThreadGroupId)),
        OperandKind::InputThreadId => Ok(attribute(op, read_type, InputAttribute::ThreadId)),
        OperandKind::InputThreadIdInGroup => {
            Ok(attribute(op, read_type, InputAttribute::ThreadIdInGroup))
        }
        OperandKind::InputThreadIdInGroupFlattened => Ok(attribute(
            op,
            read_type,
            InputAttribute::ThreadIdInGroupFlattened,
        )),
        OperandKind::InputCoverageMask => Ok(attribute(op, read_type, InputAttribute::CoverageMask)),
        // The compiler emits mask-mode selection for these scalar
        // system values; force an identity swizzle.
        OperandKind::OutputControlPointId => Ok(attribute_identity(
            op,
            read_type,
            InputAttribute::OutputControlPointId,
        )),
        OperandKind::InputForkInstanceId => {
            Ok(attribute(op, read_type, InputAttribute::ForkInstanceId))
        }
        OperandKind::InputJoinInstanceId => {
            Ok(attribute(op, read_type, InputAttribute::JoinInstanceId))
        }
        OperandKind::InputDomainPoint => Ok(attribute(op, read_type, InputAttribute::DomainPoint)),
        OperandKind::InputPrimitiveId => {
            Ok(attribute_identity(op, read_type, InputAttribute::PrimitiveId))
        }
        OperandKind::InputGsInstanceId => {
            Ok(attribute(op, read_type, InputAttribute::GsInstanceId))
        }
        other => Err(unsupported(format!("source operand {other:?}"))),
    }
}

fn attribute(op: &Operand, read_type: DataType, attribute: InputAttribute) -> SrcOperand {
    SrcOperand::Attribute {
        modifier: read_modifier(op, read_type),
        attribute,
    }
}

fn attribute_identity(op: &Operand, read_type: DataType, attr: InputAttribute) -> SrcOperand {
    SrcOperand::Attribute {
        modifier: SrcModifier {
            swizzle: Swizzle::IDENTITY,
            abs: op.abs,
            neg: op.neg,
            read_type,
        },
        attribute: attr,
    }
}

pub(crate) fn read_dst_operand(
    op: &Operand,
    phase: u32,
    write_type: DataType,
) -> Result<DstOperand, Error> {
    let modifier = DstModifier {
        mask: op.write_mask(),
        write_type,
    };

    match op.kind {
        OperandKind::Temp => Ok(DstOperand::Temp {
            modifier,
            reg: op.reg_index(0),
            phase,
        }),
        OperandKind::IndexableTemp => Ok(DstOperand::IndexableTemp {
            modifier,
            file: op.reg_index(0),
            index: read_operand_index(&op.indices[1], phase)?,
            phase,
        }),
        OperandKind::Output => {
            if op.indices[0].repr == IndexRepr::Immediate32 {
                Ok(DstOperand::Output {
                    modifier,
                    reg: op.reg_index(0),
                    phase,
                })
            } else {
                Ok(DstOperand::IndexableOutput {
                    modifier,
                    index: read_operand_index(&op.indices[0], phase)?,
                    phase,
                })
            }
        }
        OperandKind::OutputDepth
        | OperandKind::OutputDepthGreaterEqual
        | OperandKind::OutputDepthLessEqual => Ok(DstOperand::Depth {
            modifier: DstModifier {
                mask: 1,
                write_type,
            },
        }),
        OperandKind::OutputCoverageMask => Ok(DstOperand::CoverageMask {
            modifier: DstModifier {
                mask: 1,
                write_type,
            },
        }),
        OperandKind::Null => Ok(DstOperand::Null {
            modifier: DstModifier {
                mask: 0,
                write_type,
            },
        }),
        other => Err(unsupported(format!("destination operand {other:?}"))),
    }
}

fn read_srv(op: &Operand, phase: u32) -> Result<SrvRef, Error> {
    let index = if op.index_dim <= 1 {
        read_operand_index(&op.indices[0], phase)?
    } else {
        read_operand_index(&op.indices[1], phase)?
    };
    Ok(SrvRef {
        range_id: op.reg_index(0),
        index,
        read_swizzle: Swizzle(op.swizzle()),
    })
}

fn read_sampler(op: &Operand, phase: u32) -> Result<SamplerRef, Error> {
    let index = if op.index_dim <= 1 {
        read_operand_index(&op.indices[0], phase)?
    } else {
        read_operand_index(&op.indices[1], phase)?
    };
    Ok(SamplerRef {
        range_id: op.reg_index(0),
        index,
        gather_channel: op.select_component(),
    })
}

fn read_uav(op: &Operand, phase: u32) -> Result<UavRef, Error> {
    let index = if op.index_dim <= 1 {
        read_operand_index(&op.indices[0], phase)?
    } else {
        read_operand_index(&op.indices[1], phase)?
    };
    Ok(UavRef {
        range_id: op.reg_index(0),
        index,
        read_swizzle: Swizzle(op.swizzle()),
    })
}

fn read_tgsm(op: &Operand) -> TgsmRef {
    TgsmRef {
        id: op.reg_index(0),
        read_swizzle: Swizzle(op.swizzle()),
    }
}

fn read_uav_dst(op: &Operand, phase: u32) -> Result<AtomicUavDst, Error> {
    let index = if op.index_dim <= 1 {
        read_operand_index(&op.indices[0], phase)?
    } else {
        read_operand_index(&op.indices[1], phase)?
    };
    Ok(AtomicUavDst {
        range_id: op.reg_index(0),
        index,
        mask: op.write_mask(),
    })
}

fn read_atomic_dst(op: &Operand, phase: u32) -> Result<AtomicDst, Error> {
    match op.kind {
        OperandKind::UnorderedAccessView => Ok(AtomicDst::Uav(read_uav_dst(op, phase)?)),
        OperandKind::ThreadGroupSharedMemory => Ok(AtomicDst::Tgsm(AtomicTgsmDst {
            id: op.reg_index(0),
            mask: op.write_mask(),
        })),
        other => Err(unsupported(format!("atomic destination {other:?}"))),
    }
}

fn read_typeless_src(op: &Operand, phase: u32) -> Result<TypelessSrc, Error> {
    match op.kind {
        OperandKind::UnorderedAccessView => Ok(TypelessSrc::Uav(read_uav(op, phase)?)),
        OperandKind::Resource => Ok(TypelessSrc::Srv(read_srv(op, phase)?)),
        OperandKind::ThreadGroupSharedMemory => Ok(TypelessSrc::Tgsm(read_tgsm(op))),
        other => Err(unsupported(format!("raw load/store source {other:?}"))),
    }
}

fn read_srv_or_uav(op: &Operand, phase: u32) -> Result<SrvOrUav, Error> {
    match op.kind {
        OperandKind::UnorderedAccessView => Ok(SrvOrUav::Uav(read_uav(op, phase)?)),
        OperandKind::Resource => Ok(SrvOrUav::Srv(read_srv(op, phase)?)),
        other => Err(unsupported(format!("resource-info source {other:?}"))),
    }
}

/// Reads the branch condition of a flow instruction.
pub(crate) fn read_condition(
    inst: &RawInst,
    op_index: usize,
    phase: u32,
    info: &mut ShaderInfo,
) -> Result<Condition, Error> {
    Ok(Condition {
        operand: read_src_operand(inst.operand(op_index), phase, DataType::Integer, info)?,
        test_nonzero: inst.test_nonzero,
    })
}

fn common(inst: &RawInst, info: &ShaderInfo) -> InstCommon {
    InstCommon {
        saturate: inst.saturate,
        precise_mask: if info.refactoring_allowed {
            inst.precise_mask
        } else {
            0b1111
        },
    }
}

/// Dst type of an access whose value type follows the declared scalar
/// return type of the resource.
fn sampled_type(scalar: Option<ScalarType>) -> DataType {
    match scalar {
        Some(ScalarType::Uint) | Some(ScalarType::Int) => DataType::Integer,
        _ => DataType::Float,
    }
}

/// Lifts one non-declaration, non-flow instruction.
pub(crate) fn lift_instruction(
    inst: &RawInst,
    info: &mut ShaderInfo,
    phase: u32,
) -> Result<Instruction, Error> {
    // Some producers address temp registers beyond the declared count;
    // grow the register file to match what the code actually touches.
    for op in &inst.operands {
        if op.kind == OperandKind::Temp && op.index_dim >= 1 {
            info.raise_temp_count(op.reg_index(0), phase);
        }
    }

    use DataType::{Float, Half16X16, Integer};

    let opcode = inst.opcode();
    match opcode {
        Opcode::Mov => Ok(Instruction::Mov {
            common: common(inst, info),
            dst: read_dst_operand(inst.operand(0), phase, Float)?,
            src: read_src_operand(inst.operand(1), phase, Float, info)?,
        }),
        Opcode::Movc => Ok(Instruction::MovConditional {
            common: common(inst, info),
            dst: read_dst_operand(inst.operand(0), phase, Float)?,
            src_cond: read_src_operand(inst.operand(1), phase, Integer, info)?,
            src0: read_src_operand(inst.operand(2), phase, Float, info)?,
            src1: read_src_operand(inst.operand(3), phase, Float, info)?,
        }),
        Opcode::Swapc => Ok(Instruction::SwapConditional {
            dst0: read_dst_operand(inst.operand(0), phase, Float)?,
            dst1: read_dst_operand(inst.operand(1), phase, Float)?,
            src_cond: read_src_operand(inst.operand(2), phase, Integer, info)?,
            src0: read_src_operand(inst.operand(3), phase, Float, info)?,
            src1: read_src_operand(inst.operand(4), phase, Float, info)?,
        }),

        Opcode::Sample | Opcode::SampleClampFeedback => {
            let sparse = opcode == Opcode::SampleClampFeedback;
            let s = sparse as usize;
            let src_resource = read_srv(inst.operand(2 + s), phase)?;
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.sampled = true;
            }
            Ok(Instruction::Sample {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src_address: read_src_operand(inst.operand(1 + s), phase, Float, info)?,
                src_resource,
                src_sampler: read_sampler(inst.operand(3 + s), phase)?,
                offsets: inst.texel_offsets,
                min_lod_clamp: if sparse
                    && inst.operand(4 + s).kind != OperandKind::Null
                {
                    Some(read_src_operand(inst.operand(4 + s), phase, Float, info)?)
                } else {
                    None
                },
                feedback: if sparse {
                    Some(read_dst_operand(inst.operand(s), phase, Integer)?)
                } else {
                    None
                },
            })
        }
        Opcode::SampleB | Opcode::SampleBClampFeedback => {
            let sparse = opcode == Opcode::SampleBClampFeedback;
            let s = sparse as usize;
            let src_resource = read_srv(inst.operand(2 + s), phase)?;
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.sampled = true;
            }
            Ok(Instruction::SampleBias {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src_address: read_src_operand(inst.operand(1 + s), phase, Float, info)?,
                src_resource,
                src_sampler: read_sampler(inst.operand(3 + s), phase)?,
                src_bias: read_src_operand(inst.operand(4 + s), phase, Float, info)?,
                offsets: inst.texel_offsets,
                min_lod_clamp: if sparse
                    && inst.operand(5 + s).kind != OperandKind::Null
                {
                    Some(read_src_operand(inst.operand(5 + s), phase, Float, info)?)
                } else {
                    None
                },
                feedback: if sparse {
                    Some(read_dst_operand(inst.operand(s), phase, Integer)?)
                } else {
                    None
                },
            })
        }
        Opcode::SampleD | Opcode::SampleDClampFeedback => {
            let sparse = opcode == Opcode::SampleDClampFeedback;
            let s = sparse as usize;
            let src_resource = read_srv(inst.operand(2 + s), phase)?;
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.sampled = true;
            }
            Ok(Instruction::SampleDerivative {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src_address: read_src_operand(inst.operand(1 + s), phase, Float, info)?,
                src_resource,
                src_sampler: read_sampler(inst.operand(3 + s), phase)?,
                src_x_derivative: read_src_operand(inst.operand(4 + s), phase, Float, info)?,
                src_y_derivative: read_src_operand(inst.operand(5 + s), phase, Float, info)?,
                offsets: inst.texel_offsets,
                min_lod_clamp: if sparse
                    && inst.operand(6 + s).kind != OperandKind::Null
                {
                    Some(read_src_operand(inst.operand(6 + s), phase, Float, info)?)
                } else {
                    None
                },
                feedback: if sparse {
                    Some(read_dst_operand(inst.operand(s), phase, Integer)?)
                } else {
                    None
                },
            })
        }
        Opcode::SampleL | Opcode::SampleLFeedback => {
            let sparse = opcode == Opcode::SampleLFeedback;
            let s = sparse as usize;
            let src_resource = read_srv(inst.operand(2 + s), phase)?;
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.sampled = true;
            }
            Ok(Instruction::SampleLod {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src_address: read_src_operand(inst.operand(1 + s), phase, Float, info)?,
                src_resource,
                src_sampler: read_sampler(inst.operand(3 + s), phase)?,
                src_lod: read_src_operand(inst.operand(4 + s), phase, Float, info)?,
                offsets: inst.texel_offsets,
                feedback: if sparse {
                    Some(read_dst_operand(inst.operand(s), phase, Integer)?)
                } else {
                    None
                },
            })
        }
        Opcode::SampleC
        | Opcode::SampleCLz
        | Opcode::SampleCClampFeedback
        | Opcode::SampleCLzFeedback => {
            let sparse = matches!(
                opcode,
                Opcode::SampleCClampFeedback | Opcode::SampleCLzFeedback
            );
            let sparse_clamp = opcode == Opcode::SampleCClampFeedback;
            let level_zero = matches!(opcode, Opcode::SampleCLz | Opcode::SampleCLzFeedback);
            let s = sparse as usize;
            let src_resource = read_srv(inst.operand(2 + s), phase)?;
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.compared = true;
            }
            Ok(Instruction::SampleCompare {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src_address: read_src_operand(inst.operand(1 + s), phase, Float, info)?,
                src_resource,
                src_sampler: read_sampler(inst.operand(3 + s), phase)?,
                src_reference: read_src_operand(inst.operand(4 + s), phase, Float, info)?,
                offsets: inst.texel_offsets,
                min_lod_clamp: if sparse_clamp
                    && inst.operand(5 + s).kind != OperandKind::Null
                {
                    Some(read_src_operand(inst.operand(5 + s), phase, Float, info)?)
                } else {
                    None
                },
                feedback: if sparse {
                    Some(read_dst_operand(inst.operand(s), phase, Integer)?)
                } else {
                    None
                },
                level_zero,
            })
        }
        Opcode::Gather4 | Opcode::Gather4Feedback => {
            let sparse = opcode == Opcode::Gather4Feedback;
            let s = sparse as usize;
            let src_resource = read_srv(inst.operand(2 + s), phase)?;
            let sample_type =
                sampled_type(info.srvs.get(&src_resource.range_id).map(|s| s.scalar_type));
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.sampled = true;
            }
            Ok(Instruction::Gather {
                dst: read_dst_operand(inst.operand(0), phase, sample_type)?,
                src_address: read_src_operand(inst.operand(1 + s), phase, Float, info)?,
                src_resource,
                src_sampler: read_sampler(inst.operand(3 + s), phase)?,
                offset: SrcOperand::Immediate32 {
                    modifier: SrcModifier::plain(Integer),
                    value: [
                        inst.texel_offsets[0] as u32,
                        inst.texel_offsets[1] as u32,
                        0,
                        0,
                    ],
                },
                feedback: if sparse {
                    Some(read_dst_operand(inst.operand(s), phase, Integer)?)
                } else {
                    None
                },
            })
        }
        Opcode::Gather4C | Opcode::Gather4CFeedback => {
            let sparse = opcode == Opcode::Gather4CFeedback;
            let s = sparse as usize;
            let src_resource = read_srv(inst.operand(2 + s), phase)?;
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.compared = true;
            }
            Ok(Instruction::GatherCompare {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src_address: read_src_operand(inst.operand(1 + s), phase, Float, info)?,
                src_resource,
                src_sampler: read_sampler(inst.operand(3 + s), phase)?,
                src_reference: read_src_operand(inst.operand(4 + s), phase, Float, info)?,
                offset: SrcOperand::Immediate32 {
                    modifier: SrcModifier::plain(Integer),
                    value: [
                        inst.texel_offsets[0] as u32,
                        inst.texel_offsets[1] as u32,
                        0,
                        0,
                    ],
                },
                feedback: if sparse {
                    Some(read_dst_operand(inst.operand(s), phase, Integer)?)
                } else {
                    None
                },
            })
        }
        Opcode::Gather4Po | Opcode::Gather4PoFeedback => {
            let sparse = opcode == Opcode::Gather4PoFeedback;
            let s = sparse as usize;
            let src_resource = read_srv(inst.operand(3 + s), phase)?;
            let sample_type =
                sampled_type(info.srvs.get(&src_resource.range_id).map(|s| s.scalar_type));
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.sampled = true;
            }
            Ok(Instruction::Gather {
                dst: read_dst_operand(inst.operand(0), phase, sample_type)?,
                src_address: read_src_operand(inst.operand(1 + s), phase, Float, info)?,
                src_resource,
                src_sampler: read_sampler(inst.operand(4 + s), phase)?,
                offset: read_src_operand(inst.operand(2 + s), phase, Integer, info)?,
                feedback: if sparse {
                    Some(read_dst_operand(inst.operand(s), phase, Integer)?)
                } else {
                    None
                },
            })
        }
        Opcode::Gather4PoC | Opcode::Gather4PoCFeedback => {
            let sparse = opcode == Opcode::Gather4PoCFeedback;
            let s = sparse as usize;
            let src_resource = read_srv(inst.operand(3 + s), phase)?;
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.compared = true;
            }
            Ok(Instruction::GatherCompare {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src_address: read_src_operand(inst.operand(1 + s), phase, Float, info)?,
                src_resource,
                src_sampler: read_sampler(inst.operand(4 + s), phase)?,
                src_reference: read_src_operand(inst.operand(5 + s), phase, Float, info)?,
                offset: read_src_operand(inst.operand(2 + s), phase, Integer, info)?,
                feedback: if sparse {
                    Some(read_dst_operand(inst.operand(s), phase, Integer)?)
                } else {
                    None
                },
            })
        }
        Opcode::SampleInfo => {
            let uint_result = inst.return_uint;
            let dst_ty = if uint_result { Integer } else { Float };
            if inst.operand(1).kind == OperandKind::Rasterizer {
                Ok(Instruction::SampleInfo {
                    dst: read_dst_operand(inst.operand(0), phase, dst_ty)?,
                    src: None,
                    uint_result,
                    read_swizzle: Swizzle(inst.operand(1).swizzle()),
                })
            } else {
                let src = read_srv(inst.operand(1), phase)?;
                if let Some(srv) = info.srvs.get_mut(&src.range_id) {
                    srv.read = true;
                }
                Ok(Instruction::SampleInfo {
                    dst: read_dst_operand(inst.operand(0), phase, dst_ty)?,
                    read_swizzle: Swizzle(inst.operand(1).swizzle()),
                    src: Some(src),
                    uint_result,
                })
            }
        }
        Opcode::SamplePos => {
            info.use_samplepos = true;
            let src = if inst.operand(1).kind == OperandKind::Rasterizer {
                None
            } else {
                let src = read_srv(inst.operand(1), phase)?;
                if let Some(srv) = info.srvs.get_mut(&src.range_id) {
                    srv.read = true;
                }
                Some(src)
            };
            Ok(Instruction::SamplePos {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                read_swizzle: Swizzle(inst.operand(1).swizzle()),
                src,
                src_sample_index: read_src_operand(inst.operand(2), phase, Integer, info)?,
            })
        }
        Opcode::BufInfo => {
            let src = read_srv_or_uav(inst.operand(1), phase)?;
            match &src {
                SrvOrUav::Srv(srv) => {
                    if let Some(e) = info.srvs.get_mut(&srv.range_id) {
                        e.read = true;
                    }
                }
                SrvOrUav::Uav(uav) => {
                    if let Some(e) = info.uavs.get_mut(&uav.range_id) {
                        e.read = true;
                    }
                }
            }
            Ok(Instruction::BufferInfo {
                dst: read_dst_operand(inst.operand(0), phase, Integer)?,
                src,
            })
        }
        Opcode::ResInfo => {
            let modifier = match inst.resinfo_return {
                air_dxbc::sm50::ResInfoReturnType::Uint => ResInfoModifier::Uint,
                air_dxbc::sm50::ResInfoReturnType::RcpFloat => ResInfoModifier::Rcp,
                air_dxbc::sm50::ResInfoReturnType::Float => ResInfoModifier::None,
            };
            let src_resource = read_srv_or_uav(inst.operand(2), phase)?;
            match &src_resource {
                SrvOrUav::Srv(srv) => {
                    if let Some(e) = info.srvs.get_mut(&srv.range_id) {
                        e.read = true;
                    }
                }
                SrvOrUav::Uav(uav) => {
                    if let Some(e) = info.uavs.get_mut(&uav.range_id) {
                        e.read = true;
                    }
                }
            }
            Ok(Instruction::ResourceInfo {
                dst: read_dst_operand(
                    inst.operand(0),
                    phase,
                    if modifier == ResInfoModifier::Uint {
                        Integer
                    } else {
                        Float
                    },
                )?,
                src_mip_level: read_src_operand(inst.operand(1), phase, Integer, info)?,
                src_resource,
                modifier,
            })
        }
        Opcode::Ld | Opcode::LdMs => {
            let src_resource = read_srv(inst.operand(2), phase)?;
            let sample_type =
                sampled_type(info.srvs.get(&src_resource.range_id).map(|s| s.scalar_type));
            if let Some(srv) = info.srvs.get_mut(&src_resource.range_id) {
                srv.read = true;
            }
            Ok(Instruction::Load {
                dst: read_dst_operand(inst.operand(0), phase, sample_type)?,
                src_address: read_src_operand(inst.operand(1), phase, Integer, info)?,
                src_resource,
                src_sample_index: if opcode == Opcode::LdMs {
                    Some(read_src_operand(inst.operand(3), phase, Integer, info)?)
                } else {
                    None
                },
                offsets: inst.texel_offsets,
            })
        }
        Opcode::LdUavTyped => {
            let src_uav = read_uav(inst.operand(2), phase)?;
            let sample_type =
                sampled_type(info.uavs.get(&src_uav.range_id).map(|u| u.scalar_type));
            if let Some(uav) = info.uavs.get_mut(&src_uav.range_id) {
                uav.read = true;
            }
            Ok(Instruction::LoadUavTyped {
                dst: read_dst_operand(inst.operand(0), phase, sample_type)?,
                src_address: read_src_operand(inst.operand(1), phase, Integer, info)?,
                src_uav,
            })
        }
        Opcode::StoreUavTyped => {
            let dst = read_uav_dst(inst.operand(0), phase)?;
            let sample_type = sampled_type(info.uavs.get(&dst.range_id).map(|u| u.scalar_type));
            if let Some(uav) = info.uavs.get_mut(&dst.range_id) {
                uav.written = true;
            }
            Ok(Instruction::StoreUavTyped {
                dst,
                src_address: read_src_operand(inst.operand(1), phase, Integer, info)?,
                src: read_src_operand(inst.operand(2), phase, sample_type, info)?,
            })
        }
        Opcode::LdRaw => {
            let src = read_typeless_src(inst.operand(2), phase)?;
            mark_typeless_read(&src, info);
            let src_byte_offset = read_src_operand(inst.operand(1), phase, Integer, info)?;
            Ok(Instruction::LoadRaw {
                dst: read_dst_operand(inst.operand(0), phase, Integer)?,
                offset_is_vec4_aligned: imm_is_vec4_aligned(&src_byte_offset),
                src_byte_offset,
                src,
            })
        }
        Opcode::StoreRaw => {
            let dst = read_atomic_dst(inst.operand(0), phase)?;
            if let AtomicDst::Uav(uav) = &dst {
                if let Some(e) = info.uavs.get_mut(&uav.range_id) {
                    e.written = true;
                }
            }
            Ok(Instruction::StoreRaw {
                dst,
                dst_byte_offset: read_src_operand(inst.operand(1), phase, Integer, info)?,
                src: read_src_operand(inst.operand(2), phase, Integer, info)?,
            })
        }
        Opcode::LdStructured => {
            let src = read_typeless_src(inst.operand(3), phase)?;
            mark_typeless_read(&src, info);
            let src_byte_offset = read_src_operand(inst.operand(2), phase, Integer, info)?;
            Ok(Instruction::LoadStructured {
                dst: read_dst_operand(inst.operand(0), phase, Integer)?,
                src_address: read_src_operand(inst.operand(1), phase, Integer, info)?,
                offset_is_vec4_aligned: imm_is_vec4_aligned(&src_byte_offset),
                src_byte_offset,
                src,
            })
        }
        Opcode::StoreStructured => {
            let dst = read_atomic_dst(inst.operand(0), phase)?;
            if let AtomicDst::Uav(uav) = &dst {
                if let Some(e) = info.uavs.get_mut(&uav.range_id) {
                    e.written = true;
                }
            }
            Ok(Instruction::StoreStructured {
                dst,
                dst_address: read_src_operand(inst.operand(1), phase, Integer, info)?,
                dst_byte_offset: read_src_operand(inst.operand(2), phase, Integer, info)?,
                src: read_src_operand(inst.operand(3), phase, Integer, info)?,
            })
        }

        Opcode::Dp2 | Opcode::Dp3 | Opcode::Dp4 => Ok(Instruction::DotProduct {
            common: common(inst, info),
            dst: read_dst_operand(inst.operand(0), phase, Float)?,
            src0: read_src_operand(inst.operand(1), phase, Float, info)?,
            src1: read_src_operand(inst.operand(2), phase, Float, info)?,
            dimension: match opcode {
                Opcode::Dp2 => 2,
                Opcode::Dp3 => 3,
                _ => 4,
            },
        }),
        Opcode::Mad => Ok(Instruction::FloatMad {
            common: common(inst, info),
            dst: read_dst_operand(inst.operand(0), phase, Float)?,
            src0: read_src_operand(inst.operand(1), phase, Float, info)?,
            src1: read_src_operand(inst.operand(2), phase, Float, info)?,
            src2: read_src_operand(inst.operand(3), phase, Float, info)?,
        }),
        Opcode::IMad | Opcode::UMad => Ok(Instruction::IntegerMad {
            dst: read_dst_operand(inst.operand(0), phase, Integer)?,
            src0: read_src_operand(inst.operand(1), phase, Integer, info)?,
            src1: read_src_operand(inst.operand(2), phase, Integer, info)?,
            src2: read_src_operand(inst.operand(3), phase, Integer, info)?,
            is_signed: opcode == Opcode::IMad,
        }),
        Opcode::Msad => {
            info.use_msad = true;
            Ok(Instruction::MaskedSumOfAbsDiff {
                dst: read_dst_operand(inst.operand(0), phase, Integer)?,
                src0: read_src_operand(inst.operand(1), phase, Integer, info)?,
                src1: read_src_operand(inst.operand(2), phase, Integer, info)?,
                src2: read_src_operand(inst.operand(3), phase, Integer, info)?,
            })
        }
        Opcode::SinCos => Ok(Instruction::SinCos {
            common: common(inst, info),
            dst_sin: read_dst_operand(inst.operand(0), phase, Float)?,
            dst_cos: read_dst_operand(inst.operand(1), phase, Float)?,
            src: read_src_operand(inst.operand(2), phase, Float, info)?,
        }),

        Opcode::Eq | Opcode::Ge | Opcode::Lt | Opcode::Ne => Ok(Instruction::FloatCompare {
            common: common(inst, info),
            cmp: match opcode {
                Opcode::Eq => FloatComparison::Equal,
                Opcode::Ge => FloatComparison::GreaterEqual,
                Opcode::Lt => FloatComparison::LessThan,
                _ => FloatComparison::NotEqual,
            },
            dst: read_dst_operand(inst.operand(0), phase, Integer)?,
            src0: read_src_operand(inst.operand(1), phase, Float, info)?,
            src1: read_src_operand(inst.operand(2), phase, Float, info)?,
        }),
        Opcode::IEq | Opcode::INe | Opcode::IGe | Opcode::ILt | Opcode::UGe | Opcode::ULt => {
            Ok(Instruction::IntegerCompare {
                cmp: match opcode {
                    Opcode::IEq => IntegerComparison::Equal,
                    Opcode::INe => IntegerComparison::NotEqual,
                    Opcode::IGe => IntegerComparison::SignedGreaterEqual,
                    Opcode::ILt => IntegerComparison::SignedLessThan,
                    Opcode::UGe => IntegerComparison::UnsignedGreaterEqual,
                    _ => IntegerComparison::UnsignedLessThan,
                },
                dst: read_dst_operand(inst.operand(0), phase, Integer)?,
                src0: read_src_operand(inst.operand(1), phase, Integer, info)?,
                src1: read_src_operand(inst.operand(2), phase, Integer, info)?,
            })
        }

        Opcode::Add | Opcode::Mul | Opcode::Div | Opcode::Min | Opcode::Max => {
            Ok(Instruction::FloatBinary {
                common: common(inst, info),
                op: match opcode {
                    Opcode::Add => FloatBinaryOp::Add,
                    Opcode::Mul => FloatBinaryOp::Mul,
                    Opcode::Div => FloatBinaryOp::Div,
                    Opcode::Min => FloatBinaryOp::Min,
                    _ => FloatBinaryOp::Max,
                },
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src0: read_src_operand(inst.operand(1), phase, Float, info)?,
                src1: read_src_operand(inst.operand(2), phase, Float, info)?,
            })
        }
        Opcode::Rsq
        | Opcode::Rcp
        | Opcode::Log
        | Opcode::Exp
        | Opcode::Sqrt
        | Opcode::Frc
        | Opcode::RoundNe
        | Opcode::RoundNi
        | Opcode::RoundPi
        | Opcode::RoundZ => Ok(Instruction::FloatUnary {
            common: common(inst, info),
            op: match opcode {
                Opcode::Rsq => FloatUnaryOp::Rsq,
                Opcode::Rcp => FloatUnaryOp::Rcp,
                Opcode::Log => FloatUnaryOp::Log2,
                Opcode::Exp => FloatUnaryOp::Exp2,
                Opcode::Sqrt => FloatUnaryOp::Sqrt,
                Opcode::Frc => FloatUnaryOp::Fraction,
                Opcode::RoundNe => FloatUnaryOp::RoundNearestEven,
                Opcode::RoundNi => FloatUnaryOp::RoundNegativeInf,
                Opcode::RoundPi => FloatUnaryOp::RoundPositiveInf,
                _ => FloatUnaryOp::RoundZero,
            },
            dst: read_dst_operand(inst.operand(0), phase, Float)?,
            src: read_src_operand(inst.operand(1), phase, Float, info)?,
        }),

        Opcode::Not
        | Opcode::INeg
        | Opcode::BfRev
        | Opcode::CountBits
        | Opcode::FirstBitHi
        | Opcode::FirstBitShi
        | Opcode::FirstBitLo => Ok(Instruction::IntegerUnary {
            op: match opcode {
                Opcode::Not => IntegerUnaryOp::Not,
                Opcode::INeg => IntegerUnaryOp::Neg,
                Opcode::BfRev => IntegerUnaryOp::ReverseBits,
                Opcode::CountBits => IntegerUnaryOp::CountBits,
                Opcode::FirstBitHi => IntegerUnaryOp::FirstHiBit,
                Opcode::FirstBitShi => IntegerUnaryOp::FirstHiBitSigned,
                _ => IntegerUnaryOp::FirstLowBit,
            },
            dst: read_dst_operand(inst.operand(0), phase, Integer)?,
            src: read_src_operand(inst.operand(1), phase, Integer, info)?,
        }),
        Opcode::IShl
        | Opcode::IShr
        | Opcode::UShr
        | Opcode::Xor
        | Opcode::Or
        | Opcode::And
        | Opcode::UMin
        | Opcode::UMax
        | Opcode::IMin
        | Opcode::IMax
        | Opcode::IAdd => Ok(Instruction::IntegerBinary {
            op: match opcode {
                Opcode::IShl => IntegerBinaryOp::IShl,
                Opcode::IShr => IntegerBinaryOp::IShr,
                Opcode::UShr => IntegerBinaryOp::UShr,
                Opcode::Xor => IntegerBinaryOp::Xor,
                Opcode::Or => IntegerBinaryOp::Or,
                Opcode::And => IntegerBinaryOp::And,
                Opcode::UMin => IntegerBinaryOp::UMin,
                Opcode::UMax => IntegerBinaryOp::UMax,
                Opcode::IMin => IntegerBinaryOp::IMin,
                Opcode::IMax => IntegerBinaryOp::IMax,
                _ => IntegerBinaryOp::Add,
            },
            dst: read_dst_operand(inst.operand(0), phase, Integer)?,
            src0: read_src_operand(inst.operand(1), phase, Integer, info)?,
            src1: read_src_operand(inst.operand(2), phase, Integer, info)?,
        }),
        Opcode::IMul | Opcode::UMul | Opcode::UDiv | Opcode::UAddc | Opcode::USubb => {
            Ok(Instruction::IntegerBinaryTwoDst {
                common: common(inst, info),
                op: match opcode {
                    Opcode::IMul => IntegerBinaryOpWithTwoDst::IMul,
                    Opcode::UMul => IntegerBinaryOpWithTwoDst::UMul,
                    Opcode::UDiv => IntegerBinaryOpWithTwoDst::UDiv,
                    Opcode::UAddc => IntegerBinaryOpWithTwoDst::UAddCarry,
                    _ => IntegerBinaryOpWithTwoDst::USubBorrow,
                },
                dst_hi: read_dst_operand(inst.operand(0), phase, Integer)?,
                dst_lo: read_dst_operand(inst.operand(1), phase, Integer)?,
                src0: read_src_operand(inst.operand(2), phase, Integer, info)?,
                src1: read_src_operand(inst.operand(3), phase, Integer, info)?,
            })
        }
        Opcode::UBfe | Opcode::IBfe => Ok(Instruction::ExtractBits {
            dst: read_dst_operand(inst.operand(0), phase, Integer)?,
            src0: read_src_operand(inst.operand(1), phase, Integer, info)?,
            src1: read_src_operand(inst.operand(2), phase, Integer, info)?,
            src2: read_src_operand(inst.operand(3), phase, Integer, info)?,
            is_signed: opcode == Opcode::IBfe,
        }),
        Opcode::Bfi => Ok(Instruction::BitFieldInsert {
            dst: read_dst_operand(inst.operand(0), phase, Integer)?,
            src0: read_src_operand(inst.operand(1), phase, Integer, info)?,
            src1: read_src_operand(inst.operand(2), phase, Integer, info)?,
            src2: read_src_operand(inst.operand(3), phase, Integer, info)?,
            src3: read_src_operand(inst.operand(4), phase, Integer, info)?,
        }),

        Opcode::F16ToF32 => Ok(Instruction::Convert {
            op: ConversionOp::HalfToFloat,
            dst: read_dst_operand(inst.operand(0), phase, Float)?,
            src: read_src_operand(inst.operand(1), phase, Half16X16, info)?,
        }),
        Opcode::F32ToF16 => Ok(Instruction::Convert {
            op: ConversionOp::FloatToHalf,
            dst: read_dst_operand(inst.operand(0), phase, Half16X16)?,
            src: read_src_operand(inst.operand(1), phase, Float, info)?,
        }),
        Opcode::Ftoi => Ok(Instruction::Convert {
            op: ConversionOp::FloatToSigned,
            dst: read_dst_operand(inst.operand(0), phase, Integer)?,
            src: read_src_operand(inst.operand(1), phase, Float, info)?,
        }),
        Opcode::Ftou => Ok(Instruction::Convert {
            op: ConversionOp::FloatToUnsigned,
            dst: read_dst_operand(inst.operand(0), phase, Integer)?,
            src: read_src_operand(inst.operand(1), phase, Float, info)?,
        }),
        Opcode::Itof => Ok(Instruction::Convert {
            op: ConversionOp::SignedToFloat,
            dst: read_dst_operand(inst.operand(0), phase, Float)?,
            src: read_src_operand(inst.operand(1), phase, Integer, info)?,
        }),
        Opcode::Utof => Ok(Instruction::Convert {
            op: ConversionOp::UnsignedToFloat,
            dst: read_dst_operand(inst.operand(0), phase, Float)?,
            src: read_src_operand(inst.operand(1), phase, Integer, info)?,
        }),

        Opcode::DerivRtx | Opcode::DerivRtxFine | Opcode::DerivRtxCoarse => {
            Ok(Instruction::PartialDerivative {
                common: common(inst, info),
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src: read_src_operand(inst.operand(1), phase, Float, info)?,
                ddy: false,
                coarse: opcode == Opcode::DerivRtxCoarse,
            })
        }
        Opcode::DerivRty | Opcode::DerivRtyFine | Opcode::DerivRtyCoarse => {
            Ok(Instruction::PartialDerivative {
                common: common(inst, info),
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                src: read_src_operand(inst.operand(1), phase, Float, info)?,
                ddy: true,
                coarse: opcode == Opcode::DerivRtyCoarse,
            })
        }
        Opcode::Lod => Ok(Instruction::CalcLod {
            dst: read_dst_operand(inst.operand(0), phase, Float)?,
            src_address: read_src_operand(inst.operand(1), phase, Float, info)?,
            src_resource: read_srv(inst.operand(2), phase)?,
            src_sampler: read_sampler(inst.operand(3), phase)?,
        }),
        Opcode::Nop => Ok(Instruction::Nop),
        Opcode::Sync => {
            let flags = inst.sync_flags;
            Ok(Instruction::Sync {
                uav_boundary: if flags.contains(air_dxbc::sm50::SyncFlags::UAV_MEMORY_GLOBAL) {
                    UavBoundary::Global
                } else if flags.contains(air_dxbc::sm50::SyncFlags::UAV_MEMORY_GROUP) {
                    UavBoundary::Group
                } else {
                    UavBoundary::None
                },
                tgsm_memory_barrier: flags.contains(air_dxbc::sm50::SyncFlags::TGSM_MEMORY),
                tgsm_execution_barrier: flags.contains(air_dxbc::sm50::SyncFlags::THREADS_IN_GROUP),
            })
        }

        Opcode::AtomicAnd
        | Opcode::AtomicOr
        | Opcode::AtomicXor
        | Opcode::AtomicIAdd
        | Opcode::AtomicIMax
        | Opcode::AtomicIMin
        | Opcode::AtomicUMax
        | Opcode::AtomicUMin => {
            let op = match opcode {
                Opcode::AtomicAnd => AtomicBinaryOp::And,
                Opcode::AtomicOr => AtomicBinaryOp::Or,
                Opcode::AtomicXor => AtomicBinaryOp::Xor,
                Opcode::AtomicIAdd => AtomicBinaryOp::Add,
                Opcode::AtomicIMax => AtomicBinaryOp::IMax,
                Opcode::AtomicIMin => AtomicBinaryOp::IMin,
                Opcode::AtomicUMax => AtomicBinaryOp::UMax,
                _ => AtomicBinaryOp::UMin,
            };
            let dst = read_atomic_dst(inst.operand(0), phase)?;
            mark_atomic_access(&dst, info);
            Ok(Instruction::AtomicBinOp {
                op,
                dst,
                dst_address: read_src_operand(inst.operand(1), phase, Integer, info)?,
                src: read_src_operand(inst.operand(2), phase, Integer, info)?,
                dst_original: DstOperand::SideEffect {
                    modifier: DstModifier {
                        mask: 0b1111,
                        write_type: Integer,
                    },
                },
            })
        }
        Opcode::ImmAtomicIAdd
        | Opcode::ImmAtomicAnd
        | Opcode::ImmAtomicOr
        | Opcode::ImmAtomicXor
        | Opcode::ImmAtomicExch
        | Opcode::ImmAtomicIMax
        | Opcode::ImmAtomicIMin
        | Opcode::ImmAtomicUMax
        | Opcode::ImmAtomicUMin => {
            let op = match opcode {
                Opcode::ImmAtomicIAdd => AtomicBinaryOp::Add,
                Opcode::ImmAtomicAnd => AtomicBinaryOp::And,
                Opcode::ImmAtomicOr => AtomicBinaryOp::Or,
                Opcode::ImmAtomicXor => AtomicBinaryOp::Xor,
                Opcode::ImmAtomicExch => AtomicBinaryOp::Exchange,
                Opcode::ImmAtomicIMax => AtomicBinaryOp::IMax,
                Opcode::ImmAtomicIMin => AtomicBinaryOp::IMin,
                Opcode::ImmAtomicUMax => AtomicBinaryOp::UMax,
                _ => AtomicBinaryOp::UMin,
            };
            let dst = read_atomic_dst(inst.operand(1), phase)?;
            mark_atomic_access(&dst, info);
            Ok(Instruction::AtomicBinOp {
                op,
                dst,
                dst_address: read_src_operand(inst.operand(2), phase, Integer, info)?,
                src: read_src_operand(inst.operand(3), phase, Integer, info)?,
                dst_original: read_dst_operand(inst.operand(0), phase, Integer)?,
            })
        }
        Opcode::AtomicCmpStore => {
            info.use_cmp_exch = true;
            let dst_resource = read_atomic_dst(inst.operand(0), phase)?;
            mark_atomic_access(&dst_resource, info);
            Ok(Instruction::AtomicImmCmpExchange {
                dst: DstOperand::SideEffect {
                    modifier: DstModifier {
                        mask: 0b1111,
                        write_type: Integer,
                    },
                },
                dst_resource,
                dst_address: read_src_operand(inst.operand(1), phase, Integer, info)?,
                src0: read_src_operand(inst.operand(2), phase, Integer, info)?,
                src1: read_src_operand(inst.operand(3), phase, Integer, info)?,
            })
        }
        Opcode::ImmAtomicCmpExch => {
            info.use_cmp_exch = true;
            let dst_resource = read_atomic_dst(inst.operand(1), phase)?;
            mark_atomic_access(&dst_resource, info);
            Ok(Instruction::AtomicImmCmpExchange {
                dst: read_dst_operand(inst.operand(0), phase, Integer)?,
                dst_resource,
                dst_address: read_src_operand(inst.operand(2), phase, Integer, info)?,
                src0: read_src_operand(inst.operand(3), phase, Integer, info)?,
                src1: read_src_operand(inst.operand(4), phase, Integer, info)?,
            })
        }
        Opcode::ImmAtomicAlloc => {
            let uav = read_uav_dst(inst.operand(1), phase)?;
            if let Some(e) = info.uavs.get_mut(&uav.range_id) {
                e.read = true;
                e.written = true;
                e.with_counter = true;
            }
            Ok(Instruction::AtomicImmIncrement {
                dst: read_dst_operand(inst.operand(0), phase, Integer)?,
                uav,
            })
        }
        Opcode::ImmAtomicConsume => {
            let uav = read_uav_dst(inst.operand(1), phase)?;
            if let Some(e) = info.uavs.get_mut(&uav.range_id) {
                e.read = true;
                e.written = true;
                e.with_counter = true;
            }
            Ok(Instruction::AtomicImmDecrement {
                dst: read_dst_operand(inst.operand(0), phase, Integer)?,
                uav,
            })
        }

        Opcode::EvalCentroid => {
            let reg = interpolated_register(inst.operand(1))?;
            info.pull_mode_reg_mask |= 1 << reg;
            Ok(Instruction::InterpolateCentroid {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                reg,
                read_swizzle: Swizzle(inst.operand(1).swizzle()),
            })
        }
        Opcode::EvalSampleIndex => {
            let reg = interpolated_register(inst.operand(1))?;
            info.pull_mode_reg_mask |= 1 << reg;
            Ok(Instruction::InterpolateSample {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                sample_index: read_src_operand(inst.operand(2), phase, Integer, info)?,
                reg,
                read_swizzle: Swizzle(inst.operand(1).swizzle()),
            })
        }
        Opcode::EvalSnapped => {
            let reg = interpolated_register(inst.operand(1))?;
            info.pull_mode_reg_mask |= 1 << reg;
            Ok(Instruction::InterpolateOffset {
                dst: read_dst_operand(inst.operand(0), phase, Float)?,
                offset: read_src_operand(inst.operand(2), phase, Integer, info)?,
                reg,
                read_swizzle: Swizzle(inst.operand(1).swizzle()),
            })
        }

        other => Err(unsupported(format!("opcode {}", other.name()))),
    }
}

fn interpolated_register(op: &Operand) -> Result<u32, Error> {
    if op.kind != OperandKind::Input || op.indices[0].repr != IndexRepr::Immediate32 {
        return Err(Error::Malformed {
            what: "pull-mode interpolation of a non-input register".into(),
        });
    }
    Ok(op.reg_index(0))
}

fn mark_typeless_read(src: &TypelessSrc, info: &mut ShaderInfo) {
    match src {
        TypelessSrc::Srv(srv) => {
            if let Some(e) = info.srvs.get_mut(&srv.range_id) {
                e.read = true;
            }
        }
        TypelessSrc::Uav(uav) => {
            if let Some(e) = info.uavs.get_mut(&uav.range_id) {
                e.read = true;
            }
        }
        TypelessSrc::Tgsm(_) => {}
    }
}

fn mark_atomic_access(dst: &AtomicDst, info: &mut ShaderInfo) {
    if let AtomicDst::Uav(uav) = dst {
        if let Some(e) = info.uavs.get_mut(&uav.range_id) {
            e.read = true;
            e.written = true;
        }
    }
}

fn imm_is_vec4_aligned(offset: &SrcOperand) -> bool {
    match offset {
        SrcOperand::Immediate32 { value, .. } => value[0] & 0xF == 0,
        _ => false,
    }
}
