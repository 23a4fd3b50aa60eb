//! Command-line driver for the compiler and runtime.

use clap::{Parser, Subcommand};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::assembler::{disassemble, render_executable};
use crate::compile::{compile_source, CompileFailed};
use crate::interpreter::{load_executable, run_program, LoadError, RuntimeError};
use crate::report::StderrSink;

#[derive(Parser)]
#[command(name = "rill")]
#[command(about = "The Rill compiler and runtime", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a source file to an executable artifact
    Build {
        /// Source file
        source: PathBuf,
        /// Output path (defaults to the source with extension .ric)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Run a compiled artifact
    Run {
        /// Artifact produced by build
        program: PathBuf,
    },
    /// Compile and run in one step, without writing an artifact
    Exec {
        /// Source file
        source: PathBuf,
    },
    /// Compile without producing an artifact
    Check {
        /// Source file
        source: PathBuf,
    },
    /// List an artifact's instructions
    Dump {
        /// Artifact produced by build
        program: PathBuf,
    },
}

#[derive(Debug)]
pub enum CliError {
    Io(io::Error),
    Load(LoadError),
    Compile(CompileFailed),
    Runtime(RuntimeError),
}

impl CliError {
    /// Runtime failures get their own status so scripts can tell a bad
    /// program from a bad invocation.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Runtime(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "{e}"),
            CliError::Load(e) => write!(f, "{e}"),
            CliError::Compile(e) => write!(f, "{e}"),
            CliError::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        CliError::Load(e)
    }
}

impl From<CompileFailed> for CliError {
    fn from(e: CompileFailed) -> Self {
        CliError::Compile(e)
    }
}

impl From<RuntimeError> for CliError {
    fn from(e: RuntimeError) -> Self {
        CliError::Runtime(e)
    }
}

pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build { source, output } => {
            let code = compile_file(&source)?;
            let output = output.unwrap_or_else(|| source.with_extension("ric"));
            fs::write(&output, render_executable(&code))?;
            Ok(())
        }
        Commands::Run { program } => {
            let code = load_executable(&program)?;
            run_loaded(code)
        }
        Commands::Exec { source } => {
            let code = compile_file(&source)?;
            run_loaded(code)
        }
        Commands::Check { source } => {
            compile_file(&source)?;
            Ok(())
        }
        Commands::Dump { program } => {
            let code = load_executable(&program)?;
            print!("{}", disassemble(&code));
            Ok(())
        }
    }
}

fn compile_file(source: &PathBuf) -> Result<Vec<i64>, CliError> {
    let text = fs::read_to_string(source)?;
    let mut sink = StderrSink;
    Ok(compile_source(&text, &mut sink)?)
}

fn run_loaded(code: Vec<i64>) -> Result<(), CliError> {
    let input = io::BufReader::new(io::stdin());
    let output = io::stdout();
    run_program(code, input, output)?;
    Ok(())
}
