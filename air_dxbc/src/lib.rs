//! Decoder for DXBC shader containers and the SM 4/5 tokenized program
//! format they carry.
//!
//! # References
//!
//! - D3D tokenized program format (`d3d12tokenizedprogramformat.hpp`)

pub mod reader;
pub mod signature;
pub mod sm50;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct DecodeError(#[from] pub(crate) ErrorImpl);

#[derive(Debug, Error)]
pub(crate) enum ErrorImpl {
    #[error("incomplete word: the stream is not a multiple of 4 bytes")]
    IncompleteWord,
    #[error("incomplete header")]
    IncompleteHeader,
    #[error("bad magic: {0:#010x}")]
    BadMagic(u32),
    #[error("chunk {0} is out of bounds")]
    ChunkOutOfBounds(FourCC),
    #[error("unknown program type: {0}")]
    UnknownProgramType(u32),
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u32),
    #[error("unknown operand type: {0}")]
    UnknownOperandType(u32),
    #[error("unknown value {1} for {0}")]
    UnknownEnumValue(&'static str, u32),
    #[error("invalid index representation {repr} for dimension {dimension}")]
    InvalidIndexRepresentation { repr: u32, dimension: u32 },
    #[error("unexpected end of token stream in {0}")]
    UnexpectedEnd(&'static str),
    #[error("instruction length {0} exceeds the {1}-word limit")]
    OversizedInstruction(u32, u32),
    #[error("instruction {op} decoded past its declared length of {len} words")]
    InstructionOverrun { op: &'static str, len: u32 },
    #[error("relative index must be a temp or indexable temp operand")]
    InvalidRelativeIndex,
    #[error("extended operand chain is too long")]
    ExtendedOperandChain,
    #[error("malformed signature chunk: {0}")]
    MalformedSignature(&'static str),
}

/// Four-byte chunk tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const SHDR: Self = Self(*b"SHDR");
    pub const SHEX: Self = Self(*b"SHEX");
    pub const ISGN: Self = Self(*b"ISGN");
    pub const OSGN: Self = Self(*b"OSGN");
    pub const OSG5: Self = Self(*b"OSG5");
    pub const PCSG: Self = Self(*b"PCSG");
    pub const RDEF: Self = Self(*b"RDEF");
}

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

const DXBC_MAGIC: u32 = u32::from_le_bytes(*b"DXBC");

/// Container header preceding the chunk table.
#[derive(Copy, Clone, Debug)]
pub struct Header {
    pub magic: FourCC,
    pub checksum: [u8; 16],
    pub reserved: u32,
    pub total_size: u32,
    pub chunk_count: u32,
}

/// A parsed DXBC container.
///
/// Chunk payloads borrow from the input buffer; the container performs no
/// copies beyond the offset table.
#[derive(Clone, Debug)]
pub struct DxbcFile<'a> {
    header: Header,
    chunks: Vec<Chunk<'a>>,
}

#[derive(Copy, Clone, Debug)]
pub struct Chunk<'a> {
    pub fourcc: FourCC,
    pub data: &'a [u8],
}

impl<'a> DxbcFile<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        // magic + checksum + reserved + total_size + chunk_count
        const FIXED_HEADER: usize = 4 + 16 + 4 + 4 + 4;

        if bytes.len() < FIXED_HEADER {
            return Err(ErrorImpl::IncompleteHeader.into());
        }

        let magic = read_u32(bytes, 0);
        if magic != DXBC_MAGIC {
            return Err(ErrorImpl::BadMagic(magic).into());
        }

        let mut checksum = [0; 16];
        checksum.copy_from_slice(&bytes[4..20]);

        let header = Header {
            magic: FourCC(*b"DXBC"),
            checksum,
            reserved: read_u32(bytes, 20),
            total_size: read_u32(bytes, 24),
            chunk_count: read_u32(bytes, 28),
        };

        let table_end = FIXED_HEADER + header.chunk_count as usize * 4;
        if bytes.len() < table_end {
            return Err(ErrorImpl::IncompleteHeader.into());
        }

        let mut chunks = Vec::with_capacity(header.chunk_count as usize);
        for i in 0..header.chunk_count as usize {
            let offset = read_u32(bytes, FIXED_HEADER + i * 4) as usize;

            if offset + 8 > bytes.len() {
                return Err(ErrorImpl::ChunkOutOfBounds(FourCC(*b"????")).into());
            }
            let fourcc = FourCC(bytes[offset..offset + 4].try_into().unwrap());
            let size = read_u32(bytes, offset + 4) as usize;
            let data_start = offset + 8;
            if data_start + size > bytes.len() {
                return Err(ErrorImpl::ChunkOutOfBounds(fourcc).into());
            }

            chunks.push(Chunk {
                fourcc,
                data: &bytes[data_start..data_start + size],
            });
        }

        Ok(Self { header, chunks })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn chunks(&self) -> &[Chunk<'a>] {
        &self.chunks
    }

    pub fn get_chunk(&self, fourcc: FourCC) -> Option<Chunk<'a>> {
        self.chunks.iter().find(|c| c.fourcc == fourcc).copied()
    }

    /// The tokenized program chunk (`SHEX` preferred over `SHDR`).
    pub fn program_chunk(&self) -> Option<Chunk<'a>> {
        self.get_chunk(FourCC::SHEX)
            .or_else(|| self.get_chunk(FourCC::SHDR))
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

/// Casts a little-endian byte stream to 32-bit words.
///
/// If the slice is already aligned it is cast in place, otherwise the
/// words are reassembled into a fresh buffer.
pub fn bytes_to_words(bytes: &[u8]) -> Result<Cow<'_, [u32]>, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(ErrorImpl::IncompleteWord.into());
    }

    let words = match bytemuck::try_cast_slice(bytes) {
        Ok(words) => Cow::Borrowed(words),
        Err(_) => Cow::Owned(
            bytes
                .chunks(4)
                .map(|bytes| u32::from_le_bytes(bytes.try_into().unwrap()))
                .collect(),
        ),
    };

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::{bytes_to_words, DxbcFile, FourCC};
    use crate::test_utils::build_container;

    #[test]
    fn parse_minimal_container() {
        let payload = [1u8, 2, 3, 4];
        let bytes = build_container(&[(FourCC::SHDR, &payload)]);

        let file = DxbcFile::parse(&bytes).unwrap();
        assert_eq!(file.header().magic, FourCC(*b"DXBC"));
        assert_eq!(file.header().chunk_count, 1);
        assert_eq!(file.header().total_size as usize, bytes.len());

        let chunk = file.get_chunk(FourCC::SHDR).unwrap();
        assert_eq!(chunk.data, &payload);
        assert!(file.get_chunk(FourCC::OSGN).is_none());
        assert_eq!(file.program_chunk().unwrap().fourcc, FourCC::SHDR);
    }

    #[test]
    fn shex_preferred_over_shdr() {
        let bytes = build_container(&[(FourCC::SHDR, &[0; 8]), (FourCC::SHEX, &[1; 8])]);
        let file = DxbcFile::parse(&bytes).unwrap();
        assert_eq!(file.program_chunk().unwrap().fourcc, FourCC::SHEX);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = build_container(&[(FourCC::SHDR, &[0; 4])]);
        bytes[0] = b'X';
        assert!(DxbcFile::parse(&bytes).is_err());
    }

    #[test]
    fn truncated_chunk_rejected() {
        let bytes = build_container(&[(FourCC::SHDR, &[0; 64])]);
        assert!(DxbcFile::parse(&bytes[..bytes.len() - 8]).is_err());
    }

    #[test]
    fn word_cast_requires_multiple_of_four() {
        assert!(bytes_to_words(&[0, 1, 2]).is_err());
        let words = bytes_to_words(&[1, 0, 0, 0, 2, 0, 0, 0]).unwrap();
        assert_eq!(&*words, &[1, 2]);
    }
}
