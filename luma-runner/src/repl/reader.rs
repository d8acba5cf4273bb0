use std::ops::ControlFlow;
use std::path::PathBuf;

use luma_core::ast::Program;
use luma_core::lexer;
use luma_core::parser;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tracing::{debug, warn};

const PROMPT: &str = ">> ";
const HISTORY_FILE: &str = ".luma_history";

pub enum ReadOutput {
    ControlFlow(ControlFlow<()>),
    Value(Program),
}

pub struct Reader {
    rl: Editor<(), DefaultHistory>,
    history: Option<PathBuf>,
}

impl Reader {
    pub fn new() -> Result<Self, ReadlineError> {
        let mut rl = Editor::<(), DefaultHistory>::new()?;
        let history = std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE));
        if let Some(path) = &history {
            // Missing on first start.
            if let Err(err) = rl.load_history(path) {
                debug!("no history loaded from {}: {err}", path.display());
            }
        }
        Ok(Self { rl, history })
    }

    pub fn read(&mut self) -> ReadOutput {
        let readline = self.rl.readline(PROMPT);

        let line = match readline {
            Err(ReadlineError::Interrupted) => {
                return ReadOutput::ControlFlow(ControlFlow::Continue(())); // Clear line
            }
            Err(ReadlineError::Eof) => {
                return ReadOutput::ControlFlow(ControlFlow::Break(()));
            }
            Err(err) => {
                eprintln!("Error: {err}");
                return ReadOutput::ControlFlow(ControlFlow::Break(()));
            }
            Ok(line) => line,
        };

        match line.trim() {
            "" => return ReadOutput::ControlFlow(ControlFlow::Continue(())),
            "exit" | "quit" => return ReadOutput::ControlFlow(ControlFlow::Break(())),
            _ => {}
        }
        if let Err(err) = self.rl.add_history_entry(line.as_str()) {
            warn!("could not record history: {err}");
        }

        match read_program(&line) {
            Ok(program) => ReadOutput::Value(program),
            Err(messages) => {
                for message in messages {
                    eprintln!("Error: {message}");
                }
                ReadOutput::ControlFlow(ControlFlow::Continue(()))
            }
        }
    }

    pub fn save_history(&mut self) {
        if let Some(path) = &self.history {
            if let Err(err) = self.rl.save_history(path) {
                warn!("could not save history to {}: {err}", path.display());
            }
        }
    }
}

fn read_program(line: &str) -> Result<Program, Vec<String>> {
    let tokens = lexer::scan(line).map_err(|err| vec![err.to_string()])?;
    parser::parse(tokens).map_err(|errors| errors.iter().map(ToString::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_program() {
        assert!(read_program("x = 1; print(x)").is_ok());
        assert_eq!(
            read_program("x = \"open"),
            Err(vec!["Unterminated string at line 1".to_owned()])
        );
        assert!(read_program("print(1 +)").is_err());
    }
}
