mod evaluator;
mod printer;
mod reader;

use std::ops::ControlFlow;

use luma_interpreter::Interpreter;
use rustyline::error::ReadlineError;
use tracing::info;

use evaluator::{Evaluator, LumaEvaluator};
use printer::{LumaPrinter, Printer};
use reader::{ReadOutput, Reader};

struct Repl<E: Evaluator, P: Printer> {
    reader: Reader,
    evaluator: E,
    printer: P,
}

impl<O, E: Evaluator<Object = O>, P: Printer<Object = O>> Repl<E, P> {
    fn run(mut self) {
        loop {
            let input = self.reader.read();
            match input {
                ReadOutput::ControlFlow(ControlFlow::Break(())) => break,
                ReadOutput::ControlFlow(ControlFlow::Continue(())) => continue,
                ReadOutput::Value(program) => {
                    let result = self.evaluator.evaluate(program);
                    self.printer.print(result)
                }
            }
        }
        self.reader.save_history();
    }
}

/// Read-eval-print loop over `interpreter`, keeping its globals between lines.
pub fn start(interpreter: Interpreter) -> Result<(), ReadlineError> {
    info!("entering REPL");
    Repl {
        reader: Reader::new()?,
        evaluator: LumaEvaluator::new(interpreter),
        printer: LumaPrinter {},
    }
    .run();
    Ok(())
}
