//! `sbnfc` - compiles an SGL grammar into a `.sublime-syntax` file.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use colored::Colorize;
use log::info;

use sbnfc::context::MaybeContext;
use sbnfc::error::Error;
use sbnfc::frontend::parse;
use sbnfc::grammar::{analyze, emit, normalize};
use sbnfc::serialize::dump;

/// Command line arguments accepted by the compiler.
#[derive(Clone, PartialEq, Eq, ClapParser)]
#[command(version, about)]
struct Args {
    /// the SGL (`.sbnf`) source file to compile
    input: PathBuf,
    /// output path; defaults to the input file with a `.sublime-syntax`
    /// extension
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// print progress information as each compile stage runs
    #[arg(short, long)]
    verbose: bool,
    /// arguments substituted for the top-level `main` rule's parameters,
    /// if it is parameterized
    global_args: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match compile(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn compile(args: &Args) -> Result<(), MaybeContext<Error>> {
    let file_name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<input>")
        .to_string();

    let source = fs::read_to_string(&args.input).map_err(|e| {
        MaybeContext::NoContext(Error::Unsupported(format!("could not read {}: {e}", args.input.display())))
    })?;

    if args.verbose {
        info!("parsing {file_name}");
    }
    let parsed = parse(&source, &file_name, &args.global_args)?;

    if args.verbose {
        info!("normalizing grammar");
    }
    let grammar = normalize(parsed.grammar, parsed.start).map_err(MaybeContext::NoContext)?;

    if args.verbose {
        info!("computing FIRST/FOLLOW and lookahead tables");
    }
    let analysis = analyze(&grammar).map_err(MaybeContext::NoContext)?;

    if args.verbose {
        info!("emitting sublime-syntax contexts");
    }
    let contexts = emit(&grammar, &analysis, parsed.scope_postfix.as_deref()).map_err(MaybeContext::NoContext)?;

    if args.verbose {
        info!("serializing to YAML");
    }
    let yaml = dump(&parsed.header, contexts).map_err(MaybeContext::NoContext)?;

    let out_path = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("sublime-syntax"));
    fs::write(&out_path, yaml).map_err(|e| {
        MaybeContext::NoContext(Error::Unsupported(format!("could not write {}: {e}", out_path.display())))
    })?;

    if args.verbose {
        info!("wrote {}", out_path.display());
    }

    Ok(())
}
