//! Structural properties of the reconstructed block graph.

use air_dxbc::test_utils::{
    build_program_container, dcl_output, dcl_temps, dst_temp_mask, label_operand,
    opcode_token, opcode_token_controls, src_imm32_scalar, src_imm32_vec4, src_temp_select,
    src_temp_swizzle,
};
use air_shader::air::EmitOptions;
use air_shader::cfg::Terminator;
use air_shader::ir::Instruction;
use air_shader::{parse_program, translate, Error};

const VS: u32 = 1;
const HS: u32 = 3;

#[test]
fn every_block_has_a_terminator_and_valid_targets() {
    let mut body = Vec::new();
    body.extend_from_slice(&dcl_temps(1));
    body.extend_from_slice(&dcl_output(0, 0xF));
    // if_nz r0.x { mov r0, l(1,1,1,1) } else { mov r0, l(0,0,0,0) } endif
    body.push(opcode_token_controls(31, 3, 1 << 18));
    body.extend_from_slice(&src_temp_select(0, 0));
    body.push(opcode_token(54, 8));
    body.extend_from_slice(&dst_temp_mask(0, 0xF));
    body.extend_from_slice(&src_imm32_vec4([1.0f32.to_bits(); 4]));
    body.push(opcode_token(18, 1)); // else
    body.push(opcode_token(54, 8));
    body.extend_from_slice(&dst_temp_mask(0, 0xF));
    body.extend_from_slice(&src_imm32_vec4([0; 4]));
    body.push(opcode_token(21, 1)); // endif
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    let (program, _) = parse_program(&container).unwrap();

    for key in program.cfg.reverse_post_order() {
        let block = &program.cfg.blocks[key];
        assert!(
            !matches!(block.terminator, Terminator::Undefined),
            "reachable block {:?} has no terminator",
            block.debug_name
        );
        for successor in program.cfg.successors(key) {
            assert!(program.cfg.blocks.contains_key(successor));
        }
    }
}

#[test]
fn deeply_nested_ifs_balance() {
    const DEPTH: usize = 24;

    let mut body = Vec::new();
    body.extend_from_slice(&dcl_temps(1));
    body.extend_from_slice(&dcl_output(0, 0xF));
    for _ in 0..DEPTH {
        body.push(opcode_token_controls(31, 3, 1 << 18));
        body.extend_from_slice(&src_temp_select(0, 0));
    }
    for _ in 0..DEPTH {
        body.push(opcode_token(21, 1));
    }
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    let (program, _) = parse_program(&container).unwrap();
    // DEPTH conditional branches reconstruct, and emission does not
    // overflow.
    let conditionals = program
        .cfg
        .blocks
        .values()
        .filter(|b| matches!(b.terminator, Terminator::BranchConditional { .. }))
        .count();
    assert_eq!(conditionals, DEPTH);

    translate(&container, &[], &EmitOptions::default()).unwrap();
}

#[test]
fn unbalanced_endif_is_malformed() {
    let mut body = Vec::new();
    body.push(opcode_token(21, 1)); // endif without if
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    match parse_program(&container) {
        Err(Error::Malformed { .. }) => {}
        other => panic!("expected malformed error, got {other:?}"),
    }
}

#[test]
fn case_outside_switch_is_malformed() {
    let mut body = Vec::new();
    body.push(opcode_token(6, 3)); // case l(0)
    body.extend_from_slice(&src_imm32_scalar(0));
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    match parse_program(&container) {
        Err(Error::Malformed { .. }) => {}
        other => panic!("expected malformed error, got {other:?}"),
    }
}

#[test]
fn loop_with_breakc_builds_cycle() {
    let mut body = Vec::new();
    body.extend_from_slice(&dcl_temps(1));
    body.extend_from_slice(&dcl_output(0, 0xF));
    body.push(opcode_token(48, 1)); // loop
    body.push(opcode_token_controls(3, 3, 1 << 18)); // breakc_nz r0.x
    body.extend_from_slice(&src_temp_select(0, 0));
    body.push(opcode_token(22, 1)); // endloop
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    let (program, _) = parse_program(&container).unwrap();

    // The loop entrance is reachable from itself through the back
    // edge.
    let entrance = program
        .cfg
        .blocks
        .iter()
        .find(|(_, b)| b.debug_name == "loop_entrance")
        .map(|(k, _)| k)
        .unwrap();
    let mut reachable = vec![entrance];
    let mut visited = std::collections::HashSet::new();
    let mut cycle = false;
    while let Some(key) = reachable.pop() {
        for succ in program.cfg.successors(key) {
            if succ == entrance {
                cycle = true;
            }
            if visited.insert(succ) {
                reachable.push(succ);
            }
        }
    }
    assert!(cycle, "back edge to the loop entrance missing");

    translate(&container, &[], &EmitOptions::default()).unwrap();
}

#[test]
fn switch_collects_cases() {
    let mut body = Vec::new();
    body.extend_from_slice(&dcl_temps(1));
    body.extend_from_slice(&dcl_output(0, 0xF));
    body.push(opcode_token(76, 3)); // switch r0.x
    body.extend_from_slice(&src_temp_select(0, 0));
    body.push(opcode_token(6, 3)); // case l(3)
    body.extend_from_slice(&src_imm32_scalar(3));
    body.push(opcode_token(2, 1)); // break
    body.push(opcode_token(6, 3)); // case l(7)
    body.extend_from_slice(&src_imm32_scalar(7));
    body.push(opcode_token(2, 1)); // break
    body.push(opcode_token(10, 1)); // default
    body.push(opcode_token(2, 1)); // break
    body.push(opcode_token(23, 1)); // endswitch
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    let (program, _) = parse_program(&container).unwrap();

    let switch = program
        .cfg
        .blocks
        .values()
        .find_map(|b| match &b.terminator {
            Terminator::Switch { cases, default, .. } => Some((cases.clone(), *default)),
            _ => None,
        })
        .expect("switch terminator missing");
    let (cases, default) = switch;
    assert_eq!(cases.len(), 2);
    assert!(cases.contains_key(&3));
    assert!(cases.contains_key(&7));
    assert_ne!(
        program.cfg.blocks[default].debug_name, "end_switch",
        "default label must override the fall-through target"
    );

    translate(&container, &[], &EmitOptions::default()).unwrap();
}

/// A function that calls itself: inlining must stop after 32 levels
/// and fall back to a branch to the original entry.
#[test]
fn recursion_caps_at_32_inlined_copies() {
    let mut body = Vec::new();
    body.extend_from_slice(&dcl_temps(1));
    body.extend_from_slice(&dcl_output(0, 0xF));
    // call l0; ret
    body.push(opcode_token(4, 3));
    body.extend_from_slice(&label_operand(0));
    body.push(opcode_token(62, 1));
    // label l0; call l0; ret
    body.push(opcode_token(44, 3));
    body.extend_from_slice(&label_operand(0));
    body.push(opcode_token(4, 3));
    body.extend_from_slice(&label_operand(0));
    body.push(opcode_token(62, 1));
    let container = build_program_container(VS, 5, 0, &body);

    let (program, _) = parse_program(&container).unwrap();

    // No call survives inlining.
    assert!(!program
        .cfg
        .blocks
        .values()
        .any(|b| matches!(b.terminator, Terminator::Call { .. })));

    // The recursion unrolls to the 32-level cap and no further; after
    // the cap the remaining call collapses into a branch back into the
    // already-materialized body, so the graph stays bounded.
    let copies = program
        .cfg
        .blocks
        .values()
        .filter(|b| b.debug_name == "func_body")
        .count();
    assert!(copies > 32, "expected at least 32 inlined copies, got {copies}");
    assert!(copies < 256, "inlining must stay bounded, got {copies}");

    // Emission terminates and stays bounded.
    let shader = translate(&container, &[], &EmitOptions::default()).unwrap();
    assert!(shader.air.len() < 1 << 22);
}

#[test]
fn hull_phases_fold_into_instance_barriers() {
    let mut body = Vec::new();
    // dcl_input_control_point_count 3
    body.push(opcode_token_controls(147, 1, 3 << 11));
    // dcl_output_control_point_count 3
    body.push(opcode_token_controls(148, 1, 3 << 11));
    // dcl_tess_domain triangle
    body.push(opcode_token_controls(149, 1, 2 << 11));
    // dcl_tess_partitioning integer
    body.push(opcode_token_controls(150, 1, 1 << 11));
    // dcl_tess_output_primitive triangle_cw
    body.push(opcode_token_controls(151, 1, 3 << 11));
    // hs_fork_phase
    body.push(opcode_token(115, 1));
    // dcl_hs_fork_phase_instance_count 4
    body.push(opcode_token(153, 2));
    body.push(4);
    body.extend_from_slice(&dcl_temps(1));
    // mov r0, r0 (phase-local temp)
    body.push(opcode_token(54, 5));
    body.extend_from_slice(&dst_temp_mask(0, 0xF));
    body.extend_from_slice(&src_temp_swizzle(0, [0, 1, 2, 3]));
    body.push(opcode_token(62, 1));
    let container = build_program_container(HS, 5, 0, &body);

    let (program, _) = parse_program(&container).unwrap();

    let barrier = program
        .cfg
        .blocks
        .values()
        .find_map(|b| match &b.terminator {
            Terminator::InstanceBarrier {
                instance_count,
                sync,
                ..
            } => Some((*instance_count, *sync)),
            _ => None,
        })
        .expect("instance barrier missing");
    assert_eq!(barrier.0, 4);

    // The sync block carries the group barrier.
    let sync_block = &program.cfg.blocks[barrier.1];
    assert!(sync_block.instructions.iter().any(|inst| matches!(
        inst,
        Instruction::Sync {
            tgsm_memory_barrier: true,
            tgsm_execution_barrier: true,
            ..
        }
    )));

    assert_eq!(program.stage.hull_maximum_threads_per_patch, 4);
    assert_eq!(program.stage.output_control_point_count, 3);
    assert_eq!(program.info.phases.len(), 1);
    assert_eq!(program.info.phases[0].temp_register_count, 1);

    // Without a control-point phase the output epilogue copies the
    // pass-through outputs.
    assert!(program
        .cfg
        .blocks
        .values()
        .any(|b| matches!(b.terminator, Terminator::HullShaderWriteOutput { .. })));

    let shader = translate(&container, &[], &EmitOptions::default()).unwrap();
    assert!(shader.air.contains("air.wg.barrier"));
    assert!(shader.air.contains("air.tess.write_patch_output"));
}
