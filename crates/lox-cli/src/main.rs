//! `lox` — command-line shell
//!
//! Argument parsing, logger and colour setup, then delegation to `lox_cli`.
//! Exit codes: 0 ok, 65 compile error, 70 runtime error, 1 for I/O and usage failures.

#![forbid(unsafe_code)]

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use lox_cli as cli;

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "lox", version, about = "Lox bytecode interpreter: run, REPL, disassemble", long_about = None)]
struct Opt {
    /// More log output (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    /// Colour for status lines
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    /// Subcommand (REPL when omitted)
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile and run a file (`-` for stdin)
    Run {
        /// Source file
        file: PathBuf,
        /// Log every executed instruction and the compiled chunk
        #[arg(long)]
        trace: bool,
        /// Treat the input as an assembler listing
        #[arg(long)]
        asm: bool,
    },

    /// Interactive session
    Repl {
        /// Prompt text
        #[arg(long, default_value = cli::DEFAULT_PROMPT)]
        prompt: String,
        /// Log every executed instruction
        #[arg(long)]
        trace: bool,
    },

    /// Print the bytecode of a file
    Disasm {
        /// Source file (`-` for stdin)
        file: PathBuf,
        /// Treat the input as an assembler listing
        #[arg(long)]
        asm: bool,
        /// Offsets and instructions only
        #[arg(long, conflicts_with = "json")]
        compact: bool,
        /// JSON document
        #[arg(long)]
        json: bool,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the tokens of a file, grouped by line
    Tokens {
        /// Source file (`-` for stdin)
        file: PathBuf,
    },
}

impl Command {
    fn traces(&self) -> bool {
        matches!(self, Self::Run { trace: true, .. } | Self::Repl { trace: true, .. })
    }
}

// ──────────────────────────── Logger / verbosity ────────────────────────────

fn init_telemetry(verbose: u8, quiet: bool, trace: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let mut filter = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    if trace {
        filter.push_str(",lox_vm::trace=trace,lox_compiler=debug,lox_cli=debug");
    }
    std::env::set_var("RUST_LOG", filter);
    cli::init_logger();
}

fn init_color(choice: ColorChoice) {
    match choice {
        ColorChoice::Auto => {}
        ColorChoice::Always => {
            std::env::set_var("CLICOLOR_FORCE", "1");
            std::env::remove_var("NO_COLOR");
        }
        ColorChoice::Never => {
            std::env::set_var("NO_COLOR", "1");
            std::env::remove_var("CLICOLOR_FORCE");
        }
    }
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<i32> {
    let opt = Opt::parse();

    init_color(opt.color);
    init_telemetry(opt.verbose, opt.quiet, opt.cmd.as_ref().is_some_and(Command::traces));

    use cli::{DisasmTask, DisasmView, Input, Output, ReplTask, RunTask, SourceFormat, TokensTask};

    let format = |asm: bool| if asm { SourceFormat::Asm } else { SourceFormat::Lox };

    let command = match opt.cmd {
        None => cli::Command::Repl(ReplTask::default()),
        Some(Command::Run { file, trace, asm }) => {
            cli::Command::Run(RunTask { input: Input::from_arg(file), format: format(asm), trace })
        }
        Some(Command::Repl { prompt, trace }) => cli::Command::Repl(ReplTask { prompt, trace }),
        Some(Command::Disasm { file, asm, compact, json, output }) => {
            let view = match (compact, json) {
                (_, true) => DisasmView::Json,
                (true, false) => DisasmView::Compact,
                (false, false) => DisasmView::Listing,
            };
            let output = output.map_or(Output::Stdout, Output::Path);
            cli::Command::Disasm(DisasmTask { input: Input::from_arg(file), format: format(asm), view, output })
        }
        Some(Command::Tokens { file }) => cli::Command::Tokens(TokensTask { input: Input::from_arg(file) }),
    };

    cli::execute(command).context("command failed")
}
