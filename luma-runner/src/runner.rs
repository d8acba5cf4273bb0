use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use luma_core::ast::Program;
use luma_core::lexer::{self, LexError, Token};
use luma_core::parser::{self, ParseError};
use luma_interpreter::{Interpreter, InterpreterConfig, RuntimeError};
use thiserror::Error;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::repl;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{}", join_lines(.0))]
    Parse(Vec<ParseError>),
    #[error("{0}")]
    Runtime(#[from] RuntimeError),
    #[error("REPL failed: {0}")]
    Repl(#[from] rustyline::error::ReadlineError),
}

fn join_lines(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn init_tracing(verbosity: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

pub fn execute(cli: Cli) -> Result<(), RunError> {
    match (&cli.command, &cli.path) {
        (Some(Command::Tokens { path }), _) => {
            let tokens = lexer::scan(&read_source(path)?)?;
            print!("{}", render_tokens(&tokens));
            Ok(())
        }
        (Some(Command::Ast { path }), _) => {
            let program = parse_source(&read_source(path)?)?;
            print!("{program}");
            Ok(())
        }
        (Some(Command::Run { path }), _) | (None, Some(path)) => {
            let mut interpreter = Interpreter::new(config_for(&cli, Some(path.as_path())));
            run_file(&mut interpreter, path)?;
            if cli.interactive {
                repl::start(interpreter)?;
            }
            Ok(())
        }
        (None, None) => {
            info!("starting REPL");
            repl::start(Interpreter::new(config_for(&cli, None)))?;
            Ok(())
        }
    }
}

fn config_for(cli: &Cli, entry: Option<&Path>) -> InterpreterConfig {
    let mut config = match entry {
        Some(entry) => InterpreterConfig::for_entry_file(entry),
        None => InterpreterConfig::default(),
    };
    if let Some(root) = &cli.std_root {
        config = config.with_stdlib_root(root);
    }
    if let Some(depth) = cli.max_depth {
        config = config.with_max_call_depth(depth);
    }
    if let Ok(executable) = std::env::current_exe() {
        config = config.with_executable_path(executable);
    }
    config
}

fn read_source(path: &Path) -> Result<String, RunError> {
    std::fs::read_to_string(path).map_err(|source| RunError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_source(source: &str) -> Result<Program, RunError> {
    let tokens = lexer::scan(source)?;
    parser::parse(tokens).map_err(RunError::Parse)
}

pub fn run_file(interpreter: &mut Interpreter, path: &Path) -> Result<(), RunError> {
    info!(path = %path.display(), "running file");
    let program = parse_source(&read_source(path)?)?;
    interpreter.run(&program)?;
    Ok(())
}

/// One token per line: `line  Kind  "lexeme"`.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{:<4}  {:<12}  \"{}\"",
            token.line,
            token.kind.name(),
            token.lexeme
        );
    }
    out
}
