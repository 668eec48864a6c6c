//! Builders for DXBC containers and token streams.
//!
//! Only structural validity is provided: the container checksum field is
//! left zeroed because the parser does not verify it.

use crate::FourCC;

/// Builds a minimal DXBC container holding the given chunks.
pub fn build_container(chunks: &[(FourCC, &[u8])]) -> Vec<u8> {
    let header_size = 4 + 16 + 4 + 4 + 4 + 4 * chunks.len();
    let chunk_bytes = chunks.iter().map(|(_, data)| 8 + data.len()).sum::<usize>();

    let mut out = Vec::with_capacity(header_size + chunk_bytes);

    out.extend_from_slice(b"DXBC");
    out.extend_from_slice(&[0; 16]);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // total_size placeholder
    out.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

    let offsets_pos = out.len();
    out.resize(out.len() + 4 * chunks.len(), 0);

    for (i, (fourcc, data)) in chunks.iter().enumerate() {
        let offset = out.len() as u32;
        out[offsets_pos + i * 4..offsets_pos + i * 4 + 4].copy_from_slice(&offset.to_le_bytes());

        out.extend_from_slice(&fourcc.0);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }

    let total_size = out.len() as u32;
    out[24..28].copy_from_slice(&total_size.to_le_bytes());

    out
}

pub fn tokens_to_bytes(tokens: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tokens.len() * 4);
    for &t in tokens {
        out.extend_from_slice(&t.to_le_bytes());
    }
    out
}

/// Wraps a token body into a versioned program and a `SHDR` container.
///
/// `program_type` uses the version-token encoding (0 = pixel, 1 = vertex,
/// 2 = geometry, 3 = hull, 4 = domain, 5 = compute).
pub fn build_program_container(program_type: u32, major: u32, minor: u32, body: &[u32]) -> Vec<u8> {
    let tokens = build_program(program_type, major, minor, body);
    build_container(&[(FourCC::SHDR, &tokens_to_bytes(&tokens))])
}

pub fn build_program(program_type: u32, major: u32, minor: u32, body: &[u32]) -> Vec<u32> {
    let mut tokens = vec![(program_type << 16) | (major << 4) | minor, 0];
    tokens.extend_from_slice(body);
    tokens[1] = tokens.len() as u32;
    tokens
}

pub fn opcode_token(opcode: u32, len_words: u32) -> u32 {
    opcode | (len_words << 24)
}

pub fn opcode_token_controls(opcode: u32, len_words: u32, controls: u32) -> u32 {
    opcode | controls | (len_words << 24)
}

/// Destination register token pair with a write mask (`r<reg>.mask`).
pub fn dst_temp_mask(reg: u32, mask: u32) -> [u32; 2] {
    [2 | (0 << 2) | (mask << 4) | (1 << 20), reg]
}

/// Destination output token pair (`o<reg>.mask`).
pub fn dst_output_mask(reg: u32, mask: u32) -> [u32; 2] {
    [2 | (0 << 2) | (mask << 4) | (2 << 12) | (1 << 20), reg]
}

/// Destination depth output (no index).
pub fn dst_depth() -> [u32; 1] {
    [1 | (12 << 12)]
}

/// Null destination.
pub fn dst_null() -> [u32; 1] {
    [0 | (13 << 12)]
}

/// Source temp with a full swizzle (`r<reg>.xyzw` reordered).
pub fn src_temp_swizzle(reg: u32, swizzle: [u32; 4]) -> [u32; 2] {
    [
        2 | (1 << 2)
            | (swizzle[0] << 4)
            | (swizzle[1] << 6)
            | (swizzle[2] << 8)
            | (swizzle[3] << 10)
            | (1 << 20),
        reg,
    ]
}

/// Source temp selecting a single component (`r<reg>.<c>`).
pub fn src_temp_select(reg: u32, component: u32) -> [u32; 2] {
    [2 | (2 << 2) | (component << 4) | (1 << 20), reg]
}

/// Source input register with identity swizzle (`v<reg>.xyzw`).
pub fn src_input_swizzle(reg: u32, swizzle: [u32; 4]) -> [u32; 2] {
    [
        2 | (1 << 2)
            | (swizzle[0] << 4)
            | (swizzle[1] << 6)
            | (swizzle[2] << 8)
            | (swizzle[3] << 10)
            | (1 << 12)
            | (1 << 20),
        reg,
    ]
}

/// Four-component immediate.
pub fn src_imm32_vec4(values: [u32; 4]) -> [u32; 5] {
    [
        2 | (1 << 2) | (0 << 4) | (1 << 6) | (2 << 8) | (3 << 10) | (4 << 12),
        values[0],
        values[1],
        values[2],
        values[3],
    ]
}

/// Single-component immediate.
pub fn src_imm32_scalar(value: u32) -> [u32; 2] {
    [1 | (4 << 12), value]
}

/// Constant-buffer source `cb<slot>[<reg>]` with identity swizzle
/// (SM 5.0 2-D form).
pub fn src_cb(slot: u32, reg: u32, swizzle: [u32; 4]) -> [u32; 3] {
    [
        2 | (1 << 2)
            | (swizzle[0] << 4)
            | (swizzle[1] << 6)
            | (swizzle[2] << 8)
            | (swizzle[3] << 10)
            | (8 << 12)
            | (2 << 20),
        slot,
        reg,
    ]
}

/// Resource operand `t<slot>` with a read swizzle.
pub fn src_resource(slot: u32, swizzle: [u32; 4]) -> [u32; 2] {
    [
        2 | (1 << 2)
            | (swizzle[0] << 4)
            | (swizzle[1] << 6)
            | (swizzle[2] << 8)
            | (swizzle[3] << 10)
            | (7 << 12)
            | (1 << 20),
        slot,
    ]
}

/// Sampler operand `s<slot>`.
pub fn src_sampler(slot: u32) -> [u32; 2] {
    [0 | (6 << 12) | (1 << 20), slot]
}

/// UAV operand `u<slot>` with a read swizzle.
pub fn src_uav(slot: u32, swizzle: [u32; 4]) -> [u32; 2] {
    [
        2 | (1 << 2)
            | (swizzle[0] << 4)
            | (swizzle[1] << 6)
            | (swizzle[2] << 8)
            | (swizzle[3] << 10)
            | (30 << 12)
            | (1 << 20),
        slot,
    ]
}

/// UAV destination `u<slot>` with a write mask.
pub fn dst_uav_mask(slot: u32, mask: u32) -> [u32; 2] {
    [2 | (0 << 2) | (mask << 4) | (30 << 12) | (1 << 20), slot]
}

/// Label/function-body reference operand.
pub fn label_operand(index: u32) -> [u32; 2] {
    [0 | (10 << 12) | (1 << 20), index]
}

/// `dcl_temps <count>`.
pub fn dcl_temps(count: u32) -> [u32; 2] {
    [opcode_token(104, 2), count]
}

/// `dcl_input v<reg>.mask`.
pub fn dcl_input(reg: u32, mask: u32) -> [u32; 3] {
    let [a, b] = dst_input_mask(reg, mask);
    [opcode_token(95, 3), a, b]
}

fn dst_input_mask(reg: u32, mask: u32) -> [u32; 2] {
    [2 | (0 << 2) | (mask << 4) | (1 << 12) | (1 << 20), reg]
}

/// `dcl_output o<reg>.mask`.
pub fn dcl_output(reg: u32, mask: u32) -> [u32; 3] {
    let [a, b] = dst_output_mask(reg, mask);
    [opcode_token(101, 3), a, b]
}

/// `dcl_constantbuffer cb<slot>[<size_vec4>], immediateIndexed`.
pub fn dcl_constant_buffer(slot: u32, size_vec4: u32) -> [u32; 4] {
    [
        opcode_token(89, 4),
        2 | (1 << 2) | (0 << 4) | (1 << 6) | (2 << 8) | (3 << 10) | (8 << 12) | (2 << 20),
        slot,
        size_vec4,
    ]
}

/// `dcl_uav_raw u<slot>`.
pub fn dcl_uav_raw(slot: u32) -> [u32; 3] {
    [opcode_token(157, 3), 0 | (30 << 12) | (1 << 20), slot]
}

/// `dcl_resource_texture2d (float,float,float,float) t<slot>`.
pub fn dcl_resource_2d(slot: u32) -> [u32; 4] {
    [
        opcode_token_controls(88, 4, 3 << 11),
        0 | (7 << 12) | (1 << 20),
        slot,
        5 | (5 << 4) | (5 << 8) | (5 << 12),
    ]
}

/// `dcl_sampler s<slot>, mode_default`.
pub fn dcl_sampler(slot: u32) -> [u32; 3] {
    [opcode_token(90, 3), 0 | (6 << 12) | (1 << 20), slot]
}

/// Builds a signature chunk (ISGN/OSGN layout) from
/// `(semantic, semantic_index, register, mask, rw_mask)` rows.
pub fn build_signature(elements: &[(&str, u32, u32, u8, u8)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(elements.len() as u32).to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());

    let table_start = out.len();
    out.resize(out.len() + elements.len() * 24, 0);

    let mut strings = Vec::new();
    for (i, (semantic, semantic_index, register, mask, rw_mask)) in elements.iter().enumerate() {
        let name_offset = (8 + elements.len() * 24 + strings.len()) as u32;
        strings.extend_from_slice(semantic.as_bytes());
        strings.push(0);

        let row = table_start + i * 24;
        out[row..row + 4].copy_from_slice(&name_offset.to_le_bytes());
        out[row + 4..row + 8].copy_from_slice(&semantic_index.to_le_bytes());
        out[row + 8..row + 12].copy_from_slice(&0u32.to_le_bytes()); // system value
        out[row + 12..row + 16].copy_from_slice(&3u32.to_le_bytes()); // float32
        out[row + 16..row + 20].copy_from_slice(&register.to_le_bytes());
        out[row + 20] = *mask;
        out[row + 21] = *rw_mask;
    }
    out.extend_from_slice(&strings);

    out
}
