//! Parser for the I/O signature chunks (`ISGN`, `OSGN`, `OSG5`, `PCSG`).
//!
//! Signatures align tokenized register numbers with semantic names; the
//! emitter uses them to name vertex attributes and stage outputs.

use crate::{DecodeError, ErrorImpl};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComponentType {
    Unknown,
    Uint32,
    Sint32,
    Float32,
}

impl ComponentType {
    fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Uint32,
            2 => Self::Sint32,
            3 => Self::Float32,
            _ => Self::Unknown,
        }
    }
}

/// One signature row.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureElement {
    pub semantic: String,
    pub semantic_index: u32,
    pub system_value: u32,
    pub component_type: ComponentType,
    pub register: u32,
    /// Components present in the signature.
    pub mask: u8,
    /// Components actually read (inputs) or never written (outputs).
    pub rw_mask: u8,
    /// Output stream, only meaningful for `OSG5`.
    pub stream: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub elements: Vec<SignatureElement>,
}

impl Signature {
    /// Parses the 24-byte-element layout used by `ISGN`, `OSGN` and
    /// `PCSG`.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        Self::parse_inner(data, 24)
    }

    /// Parses the 28-byte-element `OSG5` layout (leading stream index).
    pub fn parse_v5(data: &[u8]) -> Result<Self, DecodeError> {
        Self::parse_inner(data, 28)
    }

    fn parse_inner(data: &[u8], element_size: usize) -> Result<Self, DecodeError> {
        if data.len() < 8 {
            return Err(ErrorImpl::MalformedSignature("missing header").into());
        }

        let count = read_u32(data, 0) as usize;
        let table_offset = read_u32(data, 4) as usize;

        if table_offset + count * element_size > data.len() {
            return Err(ErrorImpl::MalformedSignature("element table out of bounds").into());
        }

        let mut elements = Vec::with_capacity(count);
        for i in 0..count {
            let row = table_offset + i * element_size;
            let (stream, row) = if element_size == 28 {
                (read_u32(data, row), row + 4)
            } else {
                (0, row)
            };

            let name_offset = read_u32(data, row) as usize;
            let semantic = read_cstr(data, name_offset)
                .ok_or(ErrorImpl::MalformedSignature("semantic name out of bounds"))?;

            elements.push(SignatureElement {
                semantic,
                semantic_index: read_u32(data, row + 4),
                system_value: read_u32(data, row + 8),
                component_type: ComponentType::from_u32(read_u32(data, row + 12)),
                register: read_u32(data, row + 16),
                mask: data[row + 20],
                rw_mask: data[row + 21],
                stream,
            });
        }

        Ok(Self { elements })
    }

    /// Finds the element declared on a register.
    pub fn find_register(&self, register: u32) -> Option<&SignatureElement> {
        self.elements.iter().find(|e| e.register == register)
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn read_cstr(data: &[u8], offset: usize) -> Option<String> {
    if offset >= data.len() {
        return None;
    }
    let tail = &data[offset..];
    let end = tail.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::Signature;
    use crate::test_utils::build_signature;

    #[test]
    fn parse_two_elements() {
        let data = build_signature(&[
            ("POSITION", 0, 0, 0xF, 0xF),
            ("TEXCOORD", 3, 1, 0x3, 0x3),
        ]);

        let sig = Signature::parse(&data).unwrap();
        assert_eq!(sig.elements.len(), 2);
        assert_eq!(sig.elements[0].semantic, "POSITION");
        assert_eq!(sig.elements[0].register, 0);
        assert_eq!(sig.elements[1].semantic, "TEXCOORD");
        assert_eq!(sig.elements[1].semantic_index, 3);
        assert_eq!(sig.elements[1].mask, 0x3);

        assert_eq!(sig.find_register(1).unwrap().semantic, "TEXCOORD");
        assert!(sig.find_register(7).is_none());
    }

    #[test]
    fn truncated_table_rejected() {
        let data = build_signature(&[("POSITION", 0, 0, 0xF, 0xF)]);
        assert!(Signature::parse(&data[..16]).is_err());
    }

    #[test]
    fn empty_signature() {
        let sig = Signature::parse(&build_signature(&[])).unwrap();
        assert!(sig.elements.is_empty());
    }
}
