//! lox-cli — library behind the `lox` binary
//!
//! Argument parsing lives in `main.rs`; this crate holds everything that can
//! be tested without a terminal:
//! - [`interpret`] / [`interpret_to`]: source → compile → run → [`InterpretResult`]
//! - [`Repl`]: line-at-a-time evaluation with a few `:` meta commands
//! - disassembly views (listing, compact, JSON) and token dumps
//! - [`execute`]: dispatch of a parsed [`Command`] to an exit code
//!
//! Features: `trace` (env_logger), `color` (owo-colors status lines),
//! `repl` (rustyline line editing).

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

use std::{
    fs,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};

use lox_compiler::{compile_with, dump_tokens, CompilerOptions};
use lox_core::{asm::assemble, disasm, helpers::validate_chunk, Chunk};
use lox_vm::{InterpretResult, Vm};

#[cfg(feature = "color")]
use owo_colors::{OwoColorize, Stream, Style};

// ───────────────────────────── Public types ─────────────────────────────

/// A high-level command, already parsed.
#[derive(Clone, Debug)]
pub enum Command {
    /// Compile and run a source file.
    Run(RunTask),
    /// Interactive session.
    Repl(ReplTask),
    /// Print the bytecode of a source file.
    Disasm(DisasmTask),
    /// Print the token stream of a source file.
    Tokens(TokensTask),
}

#[derive(Clone, Debug, Default)]
pub struct RunTask {
    pub input: Input,
    pub format: SourceFormat,
    pub trace: bool, // disassemble the chunk at debug level before running
}

#[derive(Clone, Debug)]
pub struct ReplTask {
    pub prompt: String,
    pub trace: bool,
}

impl Default for ReplTask {
    fn default() -> Self { Self { prompt: DEFAULT_PROMPT.to_string(), trace: false } }
}

#[derive(Clone, Debug, Default)]
pub struct DisasmTask {
    pub input: Input,
    pub format: SourceFormat,
    pub view: DisasmView,
    pub output: Output,
}

#[derive(Clone, Debug, Default)]
pub struct TokensTask {
    pub input: Input,
}

/// How to read the input text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceFormat {
    /// Lox source, through the compiler.
    #[default]
    Lox,
    /// Assembler listing (see `lox_core::asm`).
    Asm,
}

/// Disassembly rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisasmView {
    /// `== name ==` header, offsets, lines.
    #[default]
    Listing,
    /// Offsets and instructions only.
    Compact,
    /// Pretty-printed JSON document.
    Json,
}

/// Text input: a file or `-` (stdin).
#[derive(Clone, Debug, Default)]
pub enum Input {
    Path(PathBuf),
    #[default]
    Stdin,
}

impl Input {
    /// `-` maps to stdin, anything else to a path.
    pub fn from_arg(path: PathBuf) -> Self {
        if path.as_os_str() == "-" { Self::Stdin } else { Self::Path(path) }
    }

    fn name(&self) -> String {
        match self {
            Self::Path(p) => p.file_name().map_or_else(|| display(p), |n| n.to_string_lossy().into_owned()),
            Self::Stdin => "stdin".to_string(),
        }
    }
}

/// Where generated text goes.
#[derive(Clone, Debug, Default)]
pub enum Output {
    Path(PathBuf),
    #[default]
    Stdout,
}

/// Prompt used when none is given.
pub const DEFAULT_PROMPT: &str = "> ";

// ───────────────────────────── Initialisation ─────────────────────────────

/// Install env_logger (with the `trace` feature). `RUST_LOG` wins, default `warn`.
pub fn init_logger() {
    #[cfg(feature = "trace")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .format_timestamp(None)
            .format_target(true)
            .try_init();
    }
}

// ───────────────────────────── Interpretation ─────────────────────────────

/// Compile and run `source`, printing the result to stdout and errors to stderr.
pub fn interpret(source: &str) -> InterpretResult {
    interpret_to(source, CompilerOptions::default(), &mut io::stdout().lock(), &mut io::stderr().lock())
}

/// [`interpret`] against explicit writers.
pub fn interpret_to(
    source: &str,
    options: CompilerOptions,
    out: &mut impl Write,
    err: &mut impl Write,
) -> InterpretResult {
    match compile_with(source, options) {
        Ok(chunk) => run_chunk(&chunk, out, err),
        Err(e) => {
            let _ = writeln!(err, "{e}");
            InterpretResult::CompileError
        }
    }
}

/// Run a finished chunk: the returned value goes to `out`, a runtime error to `err`.
pub fn run_chunk(chunk: &Chunk, out: &mut impl Write, err: &mut impl Write) -> InterpretResult {
    match Vm::new(chunk).run() {
        Ok(value) => {
            let _ = writeln!(out, "{value}");
            InterpretResult::Ok
        }
        Err(e) => {
            log::debug!("runtime error at offset {}", e.offset);
            let _ = writeln!(err, "{e}");
            InterpretResult::RuntimeError
        }
    }
}

/// Turn input text into a validated chunk.
pub fn build_chunk(source: &str, format: SourceFormat, options: CompilerOptions) -> Result<Chunk> {
    let chunk = match format {
        SourceFormat::Lox => compile_with(source, options)?,
        SourceFormat::Asm => {
            let chunk = assemble(source)?;
            validate_chunk(&chunk).context("invalid listing")?;
            if options.dump {
                log::debug!("\n{}", disasm::disassemble_chunk(&chunk, "listing"));
            }
            chunk
        }
    };
    Ok(chunk)
}

/// Run one file (or stdin) to completion.
pub fn run_source(source: &str, format: SourceFormat, trace: bool) -> InterpretResult {
    let mut out = io::stdout().lock();
    let mut err = io::stderr().lock();
    match build_chunk(source, format, CompilerOptions { dump: trace }) {
        Ok(chunk) => run_chunk(&chunk, &mut out, &mut err),
        Err(e) => {
            let _ = writeln!(err, "{e:#}");
            InterpretResult::CompileError
        }
    }
}

// ───────────────────────────── REPL ─────────────────────────────

/// What the caller should do after a REPL line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplAction {
    /// Read the next line.
    Continue,
    /// Leave the session.
    Quit,
}

/// REPL state: each line is compiled and run on its own.
#[derive(Debug, Default)]
pub struct Repl {
    options: CompilerOptions,
    last_chunk: Option<Chunk>,
    last_result: Option<InterpretResult>,
}

impl Repl {
    /// Fresh session.
    pub fn new(options: CompilerOptions) -> Self { Self { options, ..Self::default() } }

    /// Outcome of the last evaluated expression.
    pub fn last_result(&self) -> Option<InterpretResult> { self.last_result }

    /// Evaluate one input line (expression or `:` command).
    pub fn eval_line(&mut self, line: &str, out: &mut impl Write, err: &mut impl Write) -> ReplAction {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ReplAction::Continue;
        }
        if let Some(meta) = trimmed.strip_prefix(':') {
            return self.meta(meta, out);
        }

        let result = match compile_with(trimmed, self.options) {
            Ok(chunk) => {
                let result = run_chunk(&chunk, out, err);
                self.last_chunk = Some(chunk);
                result
            }
            Err(e) => {
                let _ = writeln!(err, "{e}");
                InterpretResult::CompileError
            }
        };
        self.last_result = Some(result);
        ReplAction::Continue
    }

    fn meta(&mut self, command: &str, out: &mut impl Write) -> ReplAction {
        let (head, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        match head {
            "q" | "quit" => return ReplAction::Quit,
            "help" => {
                let _ = out.write_all(HELP_TEXT.as_bytes());
            }
            "disasm" => match &self.last_chunk {
                Some(chunk) if rest.trim() == "compact" => {
                    let _ = out.write_all(disasm::disassemble_compact(chunk).as_bytes());
                }
                Some(chunk) => {
                    let _ = out.write_all(disasm::disassemble_chunk(chunk, "repl").as_bytes());
                }
                None => {
                    let _ = writeln!(out, "(no chunk yet)");
                }
            },
            "tokens" => {
                let _ = out.write_all(dump_tokens(rest).as_bytes());
            }
            other => {
                let _ = writeln!(out, "unknown command :{other} (try :help)");
            }
        }
        ReplAction::Continue
    }
}

const HELP_TEXT: &str = "\
:help              this help
:quit / :q         leave
:disasm [compact]  disassemble the last compiled expression
:tokens <source>   show the tokens of <source>
";

/// Interactive loop on the terminal.
#[cfg(feature = "repl")]
pub fn run_repl(task: &ReplTask) -> Result<i32> {
    use rustyline::{error::ReadlineError, history::DefaultHistory, Config, Editor};

    let config = Config::builder()
        .history_ignore_dups(true)
        .map_err(|e| anyhow!("repl config: {e}"))?
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;
    let mut repl = Repl::new(CompilerOptions { dump: task.trace });

    loop {
        let line = match rl.readline(&task.prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(anyhow!("readline: {e}")),
        };
        if !line.trim().is_empty() {
            let _ = rl.add_history_entry(line.as_str());
        }
        if repl.eval_line(&line, &mut io::stdout().lock(), &mut io::stderr().lock()) == ReplAction::Quit {
            break;
        }
    }
    Ok(0)
}

/// Line loop on plain stdin.
#[cfg(not(feature = "repl"))]
pub fn run_repl(task: &ReplTask) -> Result<i32> {
    let stdin = io::stdin();
    run_repl_on(&task.prompt, CompilerOptions { dump: task.trace }, stdin.lock(), &mut io::stdout(), &mut io::stderr())
}

/// Prompted loop over any reader; stops at end of input or `:quit`.
pub fn run_repl_on(
    prompt: &str,
    options: CompilerOptions,
    input: impl BufRead,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<i32> {
    let mut repl = Repl::new(options);
    write!(out, "{prompt}")?;
    out.flush()?;
    for line in input.lines() {
        if repl.eval_line(&line?, out, err) == ReplAction::Quit {
            return Ok(0);
        }
        write!(out, "{prompt}")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(0)
}

// ───────────────────────────── Disassembly ─────────────────────────────

/// Render `chunk` in the requested view.
pub fn render_disasm(chunk: &Chunk, name: &str, view: DisasmView) -> Result<String> {
    Ok(match view {
        DisasmView::Listing => disasm::disassemble_chunk(chunk, name),
        DisasmView::Compact => disasm::disassemble_compact(chunk),
        DisasmView::Json => {
            let lines: Vec<_> = chunk
                .lines()
                .iter_ranges()
                .map(|(range, line)| serde_json::json!({ "start": range.start, "end": range.end, "line": line }))
                .collect();
            let instructions: Vec<_> = disasm::instructions(chunk).collect();
            let doc = serde_json::json!({
                "name": name,
                "code_len": chunk.len(),
                "constants": chunk.constants(),
                "lines": lines,
                "instructions": instructions,
            });
            let mut text = serde_json::to_string_pretty(&doc)?;
            text.push('\n');
            text
        }
    })
}

// ───────────────────────────── Dispatch ─────────────────────────────

/// Run a command; the value is the process exit code.
pub fn execute(cmd: Command) -> Result<i32> {
    match cmd {
        Command::Run(t) => {
            let source = read_source(&t.input)?;
            log::info!("running {} ({} bytes)", t.input.name(), source.len());
            Ok(run_source(&source, t.format, t.trace).exit_code())
        }
        Command::Repl(t) => run_repl(&t),
        Command::Disasm(t) => disasm_entry(&t),
        Command::Tokens(t) => {
            let source = read_source(&t.input)?;
            write_output(&Output::Stdout, &dump_tokens(&source))?;
            Ok(0)
        }
    }
}

fn disasm_entry(task: &DisasmTask) -> Result<i32> {
    let source = read_source(&task.input)?;
    let chunk = match build_chunk(&source, task.format, CompilerOptions::default()) {
        Ok(chunk) => chunk,
        Err(e) => {
            status_err("ERROR", &format!("{e:#}"));
            return Ok(InterpretResult::CompileError.exit_code());
        }
    };
    let text = render_disasm(&chunk, &task.input.name(), task.view)?;
    write_output(&task.output, &text)?;
    if let Output::Path(p) = &task.output {
        status_ok("DISASM", &display(p));
    }
    Ok(0)
}

// ───────────────────────────── I/O helpers ─────────────────────────────

fn read_source(input: &Input) -> Result<String> {
    let mut s = String::new();
    match input {
        Input::Stdin => {
            io::stdin().read_to_string(&mut s).context("reading stdin")?;
        }
        Input::Path(p) => {
            let f = File::open(p).with_context(|| format!("opening {}", display(p)))?;
            BufReader::new(f).read_to_string(&mut s).with_context(|| format!("reading {}", display(p)))?;
        }
    }
    Ok(s)
}

fn write_output(output: &Output, text: &str) -> Result<()> {
    match output {
        Output::Stdout => {
            let mut w = BufWriter::new(io::stdout().lock());
            w.write_all(text.as_bytes())?;
            w.flush()?;
        }
        Output::Path(p) => write_text_atomic(p, text).with_context(|| format!("writing {}", display(p)))?,
    }
    Ok(())
}

fn write_text_atomic(path: &Path, text: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let base = path.file_name().ok_or_else(|| anyhow!("output path has no file name: {}", display(path)))?;
    let tmp = parent.join(format!("{}.tmp", base.to_string_lossy()));
    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        w.write_all(text.as_bytes())?;
        w.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn display(p: &Path) -> String { p.to_string_lossy().to_string() }

// ───────────────────────────── Status lines ─────────────────────────────

fn status_ok(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {msg}", tag.if_supports_color(Stream::Stderr, |t| t.style(Style::new().green().bold())));
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

fn status_err(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {msg}", tag.if_supports_color(Stream::Stderr, |t| t.style(Style::new().red().bold())));
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

// ───────────────────────────── Tests ─────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn capture(source: &str) -> (InterpretResult, String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = interpret_to(source, CompilerOptions::default(), &mut out, &mut err);
        (result, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn ok_prints_the_value() {
        assert_eq!(capture("(-1.2 + 3.4) / 5.6"), (InterpretResult::Ok, "0.392857\n".into(), String::new()));
        assert_eq!(capture("nil"), (InterpretResult::Ok, "nil\n".into(), String::new()));
        assert!(capture("1").0.is_ok());
        assert!(!capture("-nil").0.is_ok());
    }

    #[test]
    fn compile_error_maps_to_65() {
        let (result, out, err) = capture("1 +");
        assert_eq!(result, InterpretResult::CompileError);
        assert_eq!(result.exit_code(), 65);
        assert_eq!(out, "");
        assert_eq!(err, "[line 1] Error at end: Expect expression.\n");
    }

    #[test]
    fn runtime_error_maps_to_70() {
        let (result, out, err) = capture("-false");
        assert_eq!(result.exit_code(), 70);
        assert_eq!(out, "");
        assert_eq!(err, "Operand must be a number.\n[line 1] in script\n");
    }

    #[test]
    fn assembler_listings_are_validated() {
        let chunk = build_chunk("CONSTANT 2\nNEGATE\nRETURN", SourceFormat::Asm, CompilerOptions::default()).unwrap();
        assert_eq!(chunk.len(), 4);
        assert!(build_chunk("LOAD 4\nRETURN", SourceFormat::Asm, CompilerOptions::default()).is_err());
        assert!(build_chunk("PUSH 1", SourceFormat::Asm, CompilerOptions::default()).is_err());
    }

    #[test]
    fn repl_evaluates_lines_and_meta_commands() {
        let mut repl = Repl::default();
        let (mut out, mut err) = (Vec::new(), Vec::new());

        assert_eq!(repl.eval_line("1 + 2", &mut out, &mut err), ReplAction::Continue);
        assert_eq!(repl.last_result(), Some(InterpretResult::Ok));
        assert_eq!(repl.eval_line("   ", &mut out, &mut err), ReplAction::Continue);
        assert_eq!(repl.eval_line("true * 2", &mut out, &mut err), ReplAction::Continue);
        assert_eq!(repl.last_result(), Some(InterpretResult::RuntimeError));
        assert_eq!(repl.eval_line(":disasm compact", &mut out, &mut err), ReplAction::Continue);
        assert_eq!(repl.eval_line(":q", &mut out, &mut err), ReplAction::Quit);

        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "3\n\
             0000: OP_TRUE\n\
             0001: OP_CONSTANT         0 '2'\n\
             0003: OP_MULTIPLY\n\
             0004: OP_RETURN\n"
        );
        assert_eq!(String::from_utf8(err).unwrap(), "Operands must be numbers.\n[line 1] in script\n");
    }

    #[test]
    fn repl_loop_over_reader() {
        let input = io::Cursor::new("1 + 1\n:tokens (2)\n:quit\n3\n");
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = run_repl_on("> ", CompilerOptions::default(), input, &mut out, &mut err).unwrap();
        assert_eq!(code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "> 2\n>    1: ( 2 )\n> ");
    }

    #[test]
    fn json_view_carries_lines_and_instructions() {
        let chunk = build_chunk("1 +\n2", SourceFormat::Lox, CompilerOptions::default()).unwrap();
        let text = render_disasm(&chunk, "t", DisasmView::Json).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["name"], "t");
        assert_eq!(doc["code_len"], 6);
        assert_eq!(doc["constants"].as_array().unwrap().len(), 2);
        assert_eq!(doc["instructions"].as_array().unwrap().len(), 4);
        assert_eq!(doc["instructions"][0]["instruction"]["kind"], "constant");
        assert_eq!(doc["lines"][0]["line"], 1);
    }

    #[test]
    fn stdin_dash_is_recognised() {
        assert!(matches!(Input::from_arg(PathBuf::from("-")), Input::Stdin));
        assert!(matches!(Input::from_arg(PathBuf::from("a.lox")), Input::Path(_)));
    }
}
