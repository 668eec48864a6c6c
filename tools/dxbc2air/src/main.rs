//! One-shot DXBC to AIR translator.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use air_shader::air::EmitOptions;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "dxbc2air", about = "DXBC to Metal AIR transpiler")]
struct Args {
    /// Input DXBC container, or `-` for stdin.
    #[arg(default_value = "-")]
    input: String,

    /// Override the output filename.
    #[arg(short = 'o', value_name = "filename")]
    output: Option<PathBuf>,

    /// Write output as textual IR.
    #[arg(short = 'S', default_value_t = false)]
    emit_ll: bool,

    /// Optimization level (`-O0`, `-O1`, `-O2`).
    #[arg(short = 'O', value_name = "level", default_value_t = 2)]
    opt_level: u8,

    /// Use fast math.
    #[arg(long = "fast-math", default_value_t = true)]
    fast_math: bool,

    /// Preserve use-list order when writing bitcode. Accepted for
    /// compatibility; emission order is already deterministic.
    #[arg(long = "preserve-bc-uselistorder", hide = true, default_value_t = false)]
    preserve_bc_uselistorder: bool,

    /// Preserve use-list order when writing assembly. Accepted for
    /// compatibility; emission order is already deterministic.
    #[arg(long = "preserve-ll-uselistorder", hide = true, default_value_t = false)]
    preserve_ll_uselistorder: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("dxbc2air: error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let bytes = if args.input == "-" {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .map_err(|err| format!("could not read stdin: {err}"))?;
        buffer
    } else {
        std::fs::read(&args.input)
            .map_err(|err| format!("could not open input file: {err}"))?
    };

    // -O0/-O1 only affect the downstream compiler; translation itself
    // always emits the same module, -O0 just turns fast math off.
    let fast_math = args.fast_math && args.opt_level > 0;
    let options = EmitOptions { fast_math };

    let translated = air_shader::translate(&bytes, &[], &options)
        .map_err(|err| format!("translation failed: {err}"))?;

    let output = match &args.output {
        Some(path) => path.clone(),
        None => infer_output(&args.input, args.emit_ll),
    };

    if output == Path::new("-") {
        std::io::stdout()
            .write_all(translated.air.as_bytes())
            .map_err(|err| format!("could not write output: {err}"))?;
    } else {
        std::fs::write(&output, translated.air.as_bytes())
            .map_err(|err| format!("could not write {}: {err}", output.display()))?;
    }

    Ok(())
}

fn infer_output(input: &str, emit_ll: bool) -> PathBuf {
    if input == "-" {
        return PathBuf::from("-");
    }
    let stem = input
        .strip_suffix(".cso")
        .or_else(|| input.strip_suffix(".fxc"))
        .or_else(|| input.strip_suffix(".obj"))
        .or_else(|| input.strip_suffix(".o"))
        .or_else(|| input.strip_suffix(".dxbc"))
        .unwrap_or(input);
    let extension = if emit_ll { "ll" } else { "air" };
    PathBuf::from(format!("{stem}.{extension}"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::infer_output;

    #[test]
    fn output_name_inference() {
        assert_eq!(infer_output("a.cso", false), PathBuf::from("a.air"));
        assert_eq!(infer_output("a.cso", true), PathBuf::from("a.ll"));
        assert_eq!(infer_output("b.dxbc", false), PathBuf::from("b.air"));
        assert_eq!(infer_output("noext", true), PathBuf::from("noext.ll"));
        assert_eq!(infer_output("-", false), PathBuf::from("-"));
    }
}
