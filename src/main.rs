use std::fs;
use std::path::PathBuf;
use std::process::exit;

use adze::backend::IrBackend;
use adze::engine::{self, Options, Report};
use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "adze", version, about = "Compiler front end for the adze language")]
struct Opts {
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the token stream
    Tokens(SourceOpts),
    /// Print the parsed syntax tree
    Ast(SourceOpts),
    /// Print the lowered IR
    Ir(SourceOpts),
    /// Run a function with the reference interpreter
    Run(RunOpts),
    /// Build a native executable
    #[cfg(feature = "llvm")]
    Build(BuildOpts),
}

#[derive(Args)]
struct SourceOpts {
    filename: PathBuf,
    #[clap(long, default_value = "adze")]
    module: String,
}

#[derive(Args)]
struct RunOpts {
    #[clap(flatten)]
    source: SourceOpts,
    #[clap(long, default_value = "main")]
    entry: String,
    #[clap(allow_hyphen_values = true)]
    args: Vec<i32>,
}

#[cfg(feature = "llvm")]
#[derive(Args)]
struct BuildOpts {
    #[clap(flatten)]
    source: SourceOpts,
    #[clap(short, long)]
    output: PathBuf,
    #[clap(long)]
    no_optimize: bool,
}

impl SourceOpts {
    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.filename)
            .map_err(|e| anyhow!("unable to read '{}': {}", self.filename.display(), e))
    }

    fn options(&self) -> Options {
        Options {
            module_name: self.module.clone(),
            ..Options::default()
        }
    }
}

fn print_diagnostics<F>(report: &Report<F>) -> Result<()> {
    for diagnostic in report.diagnostics.iter() {
        eprintln!("{}", diagnostic);
    }

    if !report.is_ok() {
        return Err(anyhow!("{} diagnostics", report.diagnostics.len()));
    }

    Ok(())
}

fn inspect(source: &SourceOpts, opts: Options) -> Result<()> {
    let mut backend = IrBackend::new(&opts.module_name);
    let report = engine::compile(&mut backend, &source.read()?, &opts);

    print_diagnostics(&report)
}

fn cmd(opts: Opts) -> Result<()> {
    match opts.cmd {
        Cmd::Tokens(source) => inspect(
            &source,
            Options {
                print_tokens: true,
                ..source.options()
            },
        ),
        Cmd::Ast(source) => inspect(
            &source,
            Options {
                print_ast: true,
                ..source.options()
            },
        ),
        Cmd::Ir(source) => inspect(
            &source,
            Options {
                print_ir: true,
                ..source.options()
            },
        ),
        Cmd::Run(run) => {
            let opts = run.source.options();
            let mut backend = IrBackend::new(&opts.module_name);
            let report = engine::compile(&mut backend, &run.source.read()?, &opts);

            print_diagnostics(&report)?;

            let module = backend.into_module();
            let args = run
                .args
                .into_iter()
                .map(adze::backend::RuntimeValue::Int)
                .collect();
            let value = adze::backend::Interpreter::new(&module).call(&run.entry, args)?;

            println!("{}", value);

            Ok(())
        }
        #[cfg(feature = "llvm")]
        Cmd::Build(build) => engine::build(
            &build.source.read()?,
            &build.source.options(),
            &build.output,
            !build.no_optimize,
        ),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = cmd(Opts::parse()) {
        eprintln!("error: {}", e);
        exit(1);
    }
}
