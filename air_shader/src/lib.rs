//! Translator from DXBC shader containers to AIR modules.
//!
//! The pipeline is: decode the tokenized program (`air_dxbc`), lift each
//! instruction into typed IR, reconstruct the block graph, then walk it
//! and emit one AIR function per requested variant. Translation is a
//! pure function of the input bytes and the variant list; running it
//! twice yields byte-identical modules.

pub mod air;
pub mod cfg;
pub mod ir;
mod lift;
pub mod reflect;
pub mod variant;

use air_dxbc::signature::Signature;
use air_dxbc::reader::ShaderCodeReader;
use air_dxbc::sm50::ProgramType;
use air_dxbc::{DxbcFile, FourCC};
use thiserror::Error as ThisError;

use crate::air::{EmitOptions, ModuleBuilder};
use crate::cfg::ShaderProgram;
use crate::reflect::{ShaderInfo, StageInfo};
use crate::variant::ShaderVariant;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The input bytes are not a decodable DXBC program.
    #[error("failed to decode shader: {0}")]
    Decode(#[from] air_dxbc::DecodeError),
    /// A construct this translator does not handle. Callers may fall
    /// back gracefully.
    #[error("unsupported shader: {what}")]
    Unsupported { what: String },
    /// The producer emitted structurally invalid code (unbalanced
    /// control flow, duplicate declarations).
    #[error("malformed shader: {what}")]
    Malformed { what: String },
    /// Lowering failed for one variant; other variants are unaffected.
    #[error("code generation failed: {what}")]
    Codegen { what: String },
}

/// Signature chunks accompanying the tokenized program.
#[derive(Clone, Debug, Default)]
pub struct IoSignatures {
    pub input: Option<Signature>,
    pub output: Option<Signature>,
    pub patch_constant: Option<Signature>,
}

/// Output of one translation: the AIR module plus reflection.
#[derive(Clone, Debug)]
pub struct TranslatedShader {
    /// Textual AIR module with one function per requested variant.
    pub air: String,
    pub program_type: ProgramType,
    pub version: (u8, u8),
    pub info: ShaderInfo,
    pub stage: StageInfo,
}

/// Parses and lifts a DXBC container without emitting code. Exposed
/// for reflection-only consumers and the test suite.
pub fn parse_program(bytes: &[u8]) -> Result<(ShaderProgram, IoSignatures), Error> {
    let file = DxbcFile::parse(bytes)?;

    let chunk = file.program_chunk().ok_or_else(|| Error::Malformed {
        what: "container has no SHDR/SHEX chunk".into(),
    })?;
    let words = air_dxbc::bytes_to_words(chunk.data)?;
    let mut reader = ShaderCodeReader::new(&words)?;

    let signatures = IoSignatures {
        input: parse_signature(&file, FourCC::ISGN, false)?,
        output: match parse_signature(&file, FourCC::OSG5, true)? {
            Some(sig) => Some(sig),
            None => parse_signature(&file, FourCC::OSGN, false)?,
        },
        patch_constant: parse_signature(&file, FourCC::PCSG, false)?,
    };

    let program = cfg::build(&mut reader)?;
    Ok((program, signatures))
}

fn parse_signature(
    file: &DxbcFile<'_>,
    fourcc: FourCC,
    v5: bool,
) -> Result<Option<Signature>, Error> {
    let Some(chunk) = file.get_chunk(fourcc) else {
        return Ok(None);
    };
    let signature = if v5 {
        Signature::parse_v5(chunk.data)?
    } else {
        Signature::parse(chunk.data)?
    };
    Ok(Some(signature))
}

/// Translates a DXBC container into an AIR module containing one
/// function per requested variant.
///
/// Errors abort the whole translation; no partial module is returned.
pub fn translate(
    bytes: &[u8],
    variants: &[ShaderVariant],
    options: &EmitOptions,
) -> Result<TranslatedShader, Error> {
    let (program, signatures) = parse_program(bytes).inspect_err(|err| {
        tracing::error!(%err, "shader translation failed");
    })?;

    let mut module = ModuleBuilder::new();
    // `dcl_globalFlags` may forbid refactoring; that also turns off
    // fast math for the whole module.
    let effective = EmitOptions {
        fast_math: options.fast_math
            && !program.info.skip_optimization
            && program.info.refactoring_allowed,
    };
    let node = module.metadata(format!(
        "!{{!\"air.compile_fast_math_{}\"}}",
        if effective.fast_math { "enable" } else { "disable" }
    ));
    module.named_metadata("!air.compile_options", vec![node]);
    let node = module.metadata("!{i32 2, i32 6, i32 0}");
    module.named_metadata("!air.version", vec![node]);

    let default = [ShaderVariant::Default];
    let requested: &[ShaderVariant] = if variants.is_empty() {
        &default
    } else {
        variants
    };

    for variant in requested {
        air::emit_program(&mut module, &program, &signatures, variant, &effective).inspect_err(
            |err| {
                tracing::error!(%err, %variant, "variant lowering failed");
            },
        )?;
    }

    Ok(TranslatedShader {
        air: module.build(),
        program_type: program.program_type,
        version: program.version,
        info: program.info,
        stage: program.stage,
    })
}
