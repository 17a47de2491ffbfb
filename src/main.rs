use std::env;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pasc::{compile_with, Error, Options};

const USAGE: &str = "usage: pasc [-O0] [--fold-nested] <source>";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let Some((options, source)) = parse_args(env::args().skip(1)) else {
        eprintln!("{USAGE}");
        return ExitCode::from(1);
    };

    match run(&source, &options) {
        Ok(output) => {
            info!(output = %output.display(), "wrote assembly");
            ExitCode::SUCCESS
        }
        Err(err @ Error::Io(_)) => {
            error!("{}: {err}", source.display());
            ExitCode::from(1)
        }
        Err(err) => {
            error!("{}: {err}", source.display());
            ExitCode::from(2)
        }
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> Option<(Options, PathBuf)> {
    let mut options = Options::default();
    let mut source = None;
    for arg in args {
        match arg.as_str() {
            "-O0" => options.optimize = false,
            "--fold-nested" => options.fold_nested_blocks = true,
            _ if arg.starts_with('-') => return None,
            _ if source.is_none() => source = Some(PathBuf::from(arg)),
            _ => return None,
        }
    }
    source.map(|source| (options, source))
}

fn run(source: &Path, options: &Options) -> Result<PathBuf, Error> {
    let src = fs::read_to_string(source)?;
    let output = source.with_extension("s");
    let mut dest = BufWriter::new(fs::File::create(&output)?);
    compile_with(&src, &mut dest, options)?;
    dest.flush()?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::parse_args;

    fn args(args: &[&str]) -> impl Iterator<Item = String> {
        args.iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn flags_and_source() {
        let (options, source) = parse_args(args(&["-O0", "--fold-nested", "prog.pas"])).unwrap();
        assert!(!options.optimize);
        assert!(options.fold_nested_blocks);
        assert_eq!(source, PathBuf::from("prog.pas"));
    }

    #[test]
    fn rejects_bad_usage() {
        assert!(parse_args(args(&[])).is_none());
        assert!(parse_args(args(&["-x", "prog.pas"])).is_none());
        assert!(parse_args(args(&["a.pas", "b.pas"])).is_none());
    }
}
