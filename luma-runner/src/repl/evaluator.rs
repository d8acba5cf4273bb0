use luma_core::ast::Program;
use luma_interpreter::{Interpreter, RuntimeError, Value};

pub trait Evaluator {
    type Object;

    fn evaluate(&mut self, program: Program) -> Self::Object;
}

pub struct LumaEvaluator {
    interpreter: Interpreter,
}

impl LumaEvaluator {
    pub fn new(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }
}

impl Evaluator for LumaEvaluator {
    type Object = Result<Value, RuntimeError>;

    fn evaluate(&mut self, program: Program) -> Self::Object {
        self.interpreter.eval_program(&program)
    }
}
