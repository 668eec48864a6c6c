//! End-to-end translation scenarios over hand-assembled token streams.

use air_dxbc::test_utils::{
    build_program_container, dcl_constant_buffer, dcl_input, dcl_output, dcl_temps, dcl_uav_raw,
    dst_output_mask, dst_temp_mask, dst_uav_mask, opcode_token, opcode_token_controls, src_cb,
    src_imm32_scalar, src_imm32_vec4, src_input_swizzle, src_temp_select, src_temp_swizzle,
};
use air_shader::air::EmitOptions;
use air_shader::cfg::Terminator;
use air_shader::ir::Instruction;
use air_shader::variant::ShaderVariant;
use air_shader::{parse_program, translate, Error};

const VS: u32 = 1;
const PS: u32 = 0;
const CS: u32 = 5;

fn translate_default(bytes: &[u8]) -> air_shader::TranslatedShader {
    translate(bytes, &[], &EmitOptions::default()).unwrap()
}

/// `vs_5_0 { dcl_input v0.xyzw; dcl_output o0.xyzw; mov o0, v0; ret }`
fn minimal_vs_container() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&dcl_input(0, 0xF));
    body.extend_from_slice(&dcl_output(0, 0xF));
    body.push(opcode_token(54, 5));
    body.extend_from_slice(&dst_output_mask(0, 0xF));
    body.extend_from_slice(&src_input_swizzle(0, [0, 1, 2, 3]));
    body.push(opcode_token(62, 1));
    build_program_container(VS, 5, 0, &body)
}

#[test]
fn minimal_vertex_shader() {
    let container = minimal_vs_container();
    let shader = translate_default(&container);

    assert!(shader.air.contains("define void @shader_main_vertex("));
    assert!(shader.air.contains("!air.vertex"));
    assert_eq!(shader.info.temp_register_count, 0);
    assert!(shader.info.cbuffers.is_empty());
    assert!(shader.info.srvs.is_empty());
    assert!(shader.info.uavs.is_empty());
}

#[test]
fn translation_is_deterministic() {
    let container = minimal_vs_container();
    let first = translate_default(&container);
    let second = translate_default(&container);
    assert_eq!(first.air, second.air);
}

#[test]
fn empty_shader_returns_immediately() {
    let container = build_program_container(VS, 5, 0, &[]);
    let shader = translate_default(&container);
    assert!(shader.air.contains("ret void"));
}

/// `ps_5_0 { lt r0.x, v0.x, l(0); if_nz r0.x { discard_nz r0.x } mov o0,
/// l(1,1,1,1); ret }`
fn discard_ps_container() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&dcl_input(0, 0xF));
    body.extend_from_slice(&dcl_output(0, 0xF));
    body.extend_from_slice(&dcl_temps(1));
    // lt r0.x, v0.xxxx, l(0.0)
    body.push(opcode_token(49, 7));
    body.extend_from_slice(&dst_temp_mask(0, 0x1));
    body.extend_from_slice(&src_input_swizzle(0, [0, 0, 0, 0]));
    body.extend_from_slice(&src_imm32_scalar(0.0f32.to_bits()));
    // if_nz r0.x
    body.push(opcode_token_controls(31, 3, 1 << 18));
    body.extend_from_slice(&src_temp_select(0, 0));
    // discard_nz r0.x
    body.push(opcode_token_controls(13, 3, 1 << 18));
    body.extend_from_slice(&src_temp_select(0, 0));
    // endif
    body.push(opcode_token(21, 1));
    // mov o0, l(1,1,1,1)
    body.push(opcode_token(54, 8));
    body.extend_from_slice(&dst_output_mask(0, 0xF));
    body.extend_from_slice(&src_imm32_vec4([1.0f32.to_bits(); 4]));
    body.push(opcode_token(62, 1));
    build_program_container(PS, 5, 0, &body)
}

#[test]
fn conditional_discard_shape() {
    let container = discard_ps_container();
    let (program, _) = parse_program(&container).unwrap();

    // The discard expands into a conditional branch whose fulfilled
    // side holds the PixelDiscard and falls through to the other side.
    let discard_block = program
        .cfg
        .blocks
        .iter()
        .find(|(_, b)| b.instructions.contains(&Instruction::PixelDiscard))
        .map(|(k, _)| k)
        .expect("discard block missing");

    let mut found_branch = false;
    for (_, block) in program.cfg.blocks.iter() {
        if let Terminator::BranchConditional {
            if_true, if_false, ..
        } = &block.terminator
        {
            if *if_true == discard_block {
                let fulfilled = &program.cfg.blocks[discard_block];
                match fulfilled.terminator {
                    Terminator::Branch { target } => assert_eq!(target, *if_false),
                    _ => panic!("discard block must fall through"),
                }
                found_branch = true;
            }
        }
    }
    assert!(found_branch);

    let shader = translate(
        &container,
        &[ShaderVariant::Pixel {
            sample_mask: u32::MAX,
            dual_source_blending: false,
            disable_depth_output: false,
            unorm_output_mask: 0,
        }],
        &EmitOptions::default(),
    )
    .unwrap();
    assert!(shader.air.contains("call void @air.discard_fragment()"));
}

#[test]
fn constant_buffer_binding() {
    let mut body = Vec::new();
    body.extend_from_slice(&dcl_constant_buffer(0, 16));
    body.extend_from_slice(&dcl_output(0, 0xF));
    // mov o0, cb0[3]
    body.push(opcode_token(54, 6));
    body.extend_from_slice(&dst_output_mask(0, 0xF));
    body.extend_from_slice(&src_cb(0, 3, [0, 1, 2, 3]));
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    let shader = translate_default(&container);

    let cb = &shader.info.cbuffers[&0];
    assert_eq!(cb.range.range_id, 0);
    assert_eq!(cb.range.lower_bound, 0);
    assert_eq!(cb.range.size, 1);
    assert_eq!(cb.size_in_vec4, 16);

    assert!(shader.air.contains("ptr addrspace(2) %cb0"));
    assert!(shader
        .air
        .contains("getelementptr <4 x i32>, ptr addrspace(2) %cb0, i32 3"));
}

#[test]
fn uav_atomic_counter() {
    let mut body = Vec::new();
    // dcl_thread_group 1, 1, 1
    body.extend_from_slice(&[opcode_token(155, 4), 1, 1, 1]);
    body.extend_from_slice(&dcl_uav_raw(0));
    body.extend_from_slice(&dcl_temps(1));
    // imm_atomic_alloc r0.x, u0
    body.push(opcode_token(178, 5));
    body.extend_from_slice(&dst_temp_mask(0, 0x1));
    body.extend_from_slice(&dst_uav_mask(0, 0xF));
    // store_raw u0.x, r0.x, l(42)
    body.push(opcode_token(166, 7));
    body.extend_from_slice(&dst_uav_mask(0, 0x1));
    body.extend_from_slice(&src_temp_select(0, 0));
    body.extend_from_slice(&src_imm32_scalar(42));
    body.push(opcode_token(62, 1));
    let container = build_program_container(CS, 5, 0, &body);

    let shader = translate_default(&container);

    let uav = &shader.info.uavs[&0];
    assert!(uav.read);
    assert!(uav.written);
    assert!(uav.with_counter);
    assert_eq!(uav.structure_stride, Some(0));

    assert!(shader.air.contains("%u0_counter"));
    assert!(shader
        .air
        .contains("call i32 @air.atomic.global.add.i32(ptr addrspace(1) %u0_counter, i32 1)"));
    assert!(shader.air.contains("store i32"));
    assert_eq!(shader.stage.threadgroup_size, [1, 1, 1]);
}

#[test]
fn duplicate_range_id_rejected() {
    let mut body = Vec::new();
    body.extend_from_slice(&dcl_constant_buffer(0, 16));
    body.extend_from_slice(&dcl_constant_buffer(0, 8));
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    match parse_program(&container) {
        Err(Error::Malformed { .. }) => {}
        other => panic!("expected malformed error, got {other:?}"),
    }
}

#[test]
fn temp_count_raised_by_operand_scan() {
    let mut body = Vec::new();
    body.extend_from_slice(&dcl_temps(1));
    body.extend_from_slice(&dcl_output(0, 0xF));
    // mov r3, r0 — r3 exceeds the declared count.
    body.push(opcode_token(54, 5));
    body.extend_from_slice(&dst_temp_mask(3, 0xF));
    body.extend_from_slice(&src_temp_swizzle(0, [0, 1, 2, 3]));
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    let (program, _) = parse_program(&container).unwrap();
    assert!(program.info.temp_register_count >= 4);
}

#[test]
fn unsupported_stream_emit_rejected() {
    let mut body = Vec::new();
    // emit_stream m1
    body.push(opcode_token(117, 3));
    body.extend_from_slice(&[(16 << 12) | (1 << 20), 1]);
    body.push(opcode_token(62, 1));
    let container = build_program_container(2, 5, 0, &body);

    match parse_program(&container) {
        Err(Error::Unsupported { what }) => assert!(what.contains("stream")),
        other => panic!("expected unsupported error, got {other:?}"),
    }
}

#[test]
fn refactoring_disallowed_forces_precise() {
    let mut body = Vec::new();
    // dcl_globalFlags with no flags set: refactoring not allowed.
    body.push(opcode_token_controls(106, 1, 0));
    body.extend_from_slice(&dcl_temps(1));
    body.extend_from_slice(&dcl_output(0, 0xF));
    // add r0, r0, r0
    body.push(opcode_token(0, 7));
    body.extend_from_slice(&dst_temp_mask(0, 0xF));
    body.extend_from_slice(&src_temp_swizzle(0, [0, 1, 2, 3]));
    body.extend_from_slice(&src_temp_swizzle(0, [0, 1, 2, 3]));
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    let (program, _) = parse_program(&container).unwrap();
    assert!(!program.info.refactoring_allowed);

    let precise = program
        .cfg
        .blocks
        .values()
        .flat_map(|b| b.instructions.iter())
        .any(|inst| {
            matches!(
                inst,
                Instruction::FloatBinary { common, .. } if common.precise_mask == 0b1111
            )
        });
    assert!(precise);

    // Precise instructions keep their ordinary (non-fast) form.
    let shader = translate_default(&container);
    assert!(shader.air.contains("fadd <4 x float>"));
}
