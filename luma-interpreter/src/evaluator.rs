use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use luma_core::ast::{
    BinaryOperator, Block, ClassDecl, ElseBranch, Expression, Identifier, IfStatement, Literal,
    Program, Statement, UnaryOperator,
};
use luma_core::stack::ensure_sufficient_stack;
use tracing::debug;

use crate::builtins::builtins;
use crate::config::InterpreterConfig;
use crate::environment::Environment;
use crate::modules::ModuleCache;
use crate::natives::{NativeModules, StdNatives};
use crate::value::{Class, Function, Instance, NativeFunction, QuickReturn, RuntimeError, Value};

/// One interpreter session: globals, module cache and configuration. Sessions
/// share nothing, so several can live in one process.
pub struct Interpreter {
    pub(crate) globals: Environment,
    pub(crate) config: InterpreterConfig,
    pub(crate) std_root: Option<PathBuf>,
    pub(crate) modules: ModuleCache,
    pub(crate) natives: Box<dyn NativeModules>,
    output: Box<dyn Write>,
    call_depth: usize,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        let globals = Environment::new();
        for native in builtins() {
            globals.define(native.name.clone(), Value::native(native));
        }
        let std_root = config.std_root();

        Interpreter {
            globals,
            config,
            std_root,
            modules: ModuleCache::default(),
            natives: Box::new(StdNatives),
            output: Box::new(std::io::stdout()),
            call_depth: 0,
        }
    }

    /// Send `print` output somewhere other than stdout.
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn with_native_modules(mut self, natives: impl NativeModules + 'static) -> Self {
        self.natives = Box::new(natives);
        self
    }

    /// Register a native as a global.
    pub fn define_native(&mut self, native: NativeFunction) {
        self.globals
            .define(native.name.clone(), Value::native(native));
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        self.eval_program(program).map(|_| ())
    }

    /// Run `program` in the global scope. Yields the value of the last
    /// statement when it is an expression statement, `nil` otherwise.
    pub fn eval_program(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let globals = self.globals.clone();
        let mut output = Value::Nil;
        for statement in &program.statements {
            output = match statement {
                Statement::Expression(expression) => self.eval_expression(expression, &globals)?,
                statement => {
                    self.eval_statement(statement, &globals)
                        .map_err(|quick_return| match quick_return {
                            QuickReturn::Return(_) => RuntimeError::ReturnOutsideFunction,
                            QuickReturn::Error(error) => error,
                        })?;
                    Value::Nil
                }
            };
        }
        Ok(output)
    }

    pub(crate) fn eval_statement(
        &mut self,
        statement: &Statement,
        environment: &Environment,
    ) -> Result<(), QuickReturn> {
        ensure_sufficient_stack(|| match statement {
            Statement::Expression(expression) => {
                self.eval_expression(expression, environment)?;
                Ok(())
            }
            Statement::Print(expression) => {
                let value = self.eval_expression(expression, environment)?;
                writeln!(self.output, "{value}")
                    .map_err(|err| RuntimeError::Output(err.to_string()))?;
                Ok(())
            }
            Statement::VarAssign { name, value } => {
                let value = self.eval_expression(value, environment)?;
                environment.assign_or_define(name, value);
                Ok(())
            }
            Statement::Block(block) => self.eval_scoped_block(block, environment),
            Statement::If(statement) => self.eval_if_statement(statement, environment),
            Statement::While { condition, body } => {
                while self.eval_expression(condition, environment)?.is_truthy() {
                    self.eval_scoped_block(body, environment)?;
                }
                Ok(())
            }
            Statement::Until { condition, body } => {
                while !self.eval_expression(condition, environment)?.is_truthy() {
                    self.eval_scoped_block(body, environment)?;
                }
                Ok(())
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(value) => self.eval_expression(value, environment)?,
                    None => Value::Nil,
                };
                Err(QuickReturn::Return(value))
            }
            Statement::FuncDef(decl) => {
                let function = Function {
                    decl: decl.clone(),
                    closure: environment.clone(),
                };
                environment.define(decl.name.name.clone(), Value::Function(Rc::new(function)));
                Ok(())
            }
            Statement::Class(decl) => self.eval_class_statement(decl, environment),
            Statement::Echo { count, body } => {
                let count = match self.eval_expression(count, environment)? {
                    Value::Number(count) => count.trunc(),
                    _ => return Err(RuntimeError::type_error("Echo count must be a number.").into()),
                };
                if count < 0.0 {
                    return Err(RuntimeError::NegativeEchoCount.into());
                }
                for _ in 0..count as u64 {
                    self.eval_scoped_block(body, environment)?;
                }
                Ok(())
            }
            Statement::Swap { left, right } => {
                let left_value = environment.get(left)?;
                let right_value = environment.get(right)?;
                environment.assign(left, right_value)?;
                environment.assign(right, left_value)?;
                Ok(())
            }
            Statement::Maybe { body, otherwise } => {
                match self.eval_scoped_block(body, environment) {
                    Err(QuickReturn::Error(error)) => {
                        debug!("maybe block suppressed: {error}");
                        match otherwise {
                            Some(otherwise) => self.eval_scoped_block(otherwise, environment),
                            None => Ok(()),
                        }
                    }
                    other => other,
                }
            }
            Statement::Module(module) => {
                debug!(module = %module, "module declaration");
                Ok(())
            }
            Statement::Use { module, alias } => {
                let exports = self.load_module(module)?;
                environment.define(alias.name.clone(), exports);
                Ok(())
            }
        })
    }

    fn eval_if_statement(
        &mut self,
        statement: &IfStatement,
        environment: &Environment,
    ) -> Result<(), QuickReturn> {
        if self
            .eval_expression(&statement.condition, environment)?
            .is_truthy()
        {
            return self.eval_scoped_block(&statement.consequence, environment);
        }
        match &statement.alternative {
            // else-if conditions see the same scope as the `if` itself
            Some(ElseBranch::ElseIf(next)) => self.eval_if_statement(next, environment),
            Some(ElseBranch::Else(block)) => self.eval_scoped_block(block, environment),
            None => Ok(()),
        }
    }

    fn eval_class_statement(
        &mut self,
        decl: &Rc<ClassDecl>,
        environment: &Environment,
    ) -> Result<(), QuickReturn> {
        environment.define(decl.name.name.clone(), Value::Nil);

        let methods = decl
            .methods
            .iter()
            .map(|method| {
                let function = Function {
                    decl: method.clone(),
                    closure: environment.clone(),
                };
                (method.name.name.clone(), Rc::new(function))
            })
            .collect::<HashMap<_, _>>();
        let class = Class {
            name: decl.name.name.clone(),
            methods,
        };

        environment.assign(&decl.name, Value::Class(Rc::new(class)))?;
        Ok(())
    }

    /// Run `block` in a fresh child of `environment`.
    fn eval_scoped_block(
        &mut self,
        block: &Block,
        environment: &Environment,
    ) -> Result<(), QuickReturn> {
        let scope = Environment::new_enclosed(environment);
        self.eval_block_statement(block, &scope)
    }

    fn eval_block_statement(
        &mut self,
        block: &Block,
        environment: &Environment,
    ) -> Result<(), QuickReturn> {
        for statement in &block.statements {
            self.eval_statement(statement, environment)?;
        }
        Ok(())
    }

    pub(crate) fn eval_expression(
        &mut self,
        expression: &Expression,
        environment: &Environment,
    ) -> Result<Value, RuntimeError> {
        ensure_sufficient_stack(|| match expression {
            Expression::Literal(literal) => Ok(match literal {
                Literal::Number(value) => Value::Number(*value),
                Literal::String(value) => Value::String(value.clone()),
                Literal::Bool(value) => Value::Bool(*value),
                Literal::Nil => Value::Nil,
            }),
            Expression::Variable(identifier) => environment.get(identifier),
            Expression::Grouping(inner) => self.eval_expression(inner, environment),
            Expression::Unary(operator, operand) => {
                let operand = self.eval_expression(operand, environment)?;
                eval_prefix_operation(*operator, operand)
            }
            Expression::Binary(BinaryOperator::And, left, right) => {
                let left = self.eval_expression(left, environment)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                self.eval_expression(right, environment)
            }
            Expression::Binary(BinaryOperator::Or, left, right) => {
                let left = self.eval_expression(left, environment)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                self.eval_expression(right, environment)
            }
            Expression::Binary(operator, left, right) => {
                let left = self.eval_expression(left, environment)?;
                let right = self.eval_expression(right, environment)?;
                eval_infix_operation(*operator, left, right)
            }
            Expression::Call { callee, arguments } => {
                let callee = self.eval_expression(callee, environment)?;
                let arguments = self.eval_expressions(arguments, environment)?;
                self.call_value(&callee, arguments)
            }
            Expression::List(items) => Ok(Value::list(self.eval_expressions(items, environment)?)),
            Expression::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = self.eval_expression(key, environment)?;
                    let value = self.eval_expression(value, environment)?;
                    let Value::String(key) = key else {
                        return Err(RuntimeError::type_error("Map keys must be strings."));
                    };
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expression::Get { object, name } => {
                let object = self.eval_expression(object, environment)?;
                eval_get(&object, name)
            }
            Expression::Set {
                object,
                name,
                value,
            } => {
                let object = self.eval_expression(object, environment)?;
                let Value::Instance(instance) = object else {
                    return Err(RuntimeError::type_error("Only instances have properties."));
                };
                let value = self.eval_expression(value, environment)?;
                instance
                    .fields
                    .borrow_mut()
                    .insert(name.name.clone(), value.clone());
                Ok(value)
            }
            Expression::Index { object, index } => {
                let object = self.eval_expression(object, environment)?;
                let index = self.eval_expression(index, environment)?;
                eval_index(&object, &index)
            }
            Expression::IndexSet {
                object,
                index,
                value,
            } => {
                let object = self.eval_expression(object, environment)?;
                let index = self.eval_expression(index, environment)?;
                let value = self.eval_expression(value, environment)?;
                eval_index_set(&object, &index, value)
            }
            Expression::This(line) => environment.get(&Identifier {
                name: "this".into(),
                line: *line,
            }),
        })
    }

    fn eval_expressions(
        &mut self,
        expressions: &[Expression],
        environment: &Environment,
    ) -> Result<Vec<Value>, RuntimeError> {
        let mut result = Vec::with_capacity(expressions.len());
        for expression in expressions {
            result.push(self.eval_expression(expression, environment)?);
        }
        Ok(result)
    }

    /// Call any callable value: functions, natives and classes.
    pub fn call_value(&mut self, callee: &Value, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(function) => self.eval_call_function(function, arguments),
            Value::NativeFunction(native) => {
                if !native.variadic && native.arity != arguments.len() {
                    return Err(RuntimeError::ArityMismatch {
                        expected: native.arity,
                        got: arguments.len(),
                    });
                }
                native.call(arguments)
            }
            Value::Class(class) => {
                let instance = Rc::new(Instance::new(class.clone()));
                match class.find_method("init") {
                    // Whatever `init` returns, the call yields the instance.
                    Some(init) => {
                        let bound = init.bind(instance.clone());
                        self.eval_call_function(&bound, arguments)?;
                    }
                    None if !arguments.is_empty() => {
                        return Err(RuntimeError::ArityMismatch {
                            expected: 0,
                            got: arguments.len(),
                        })
                    }
                    None => {}
                }
                Ok(Value::Instance(instance))
            }
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn eval_call_function(
        &mut self,
        function: &Function,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if function.arity() != arguments.len() {
            return Err(RuntimeError::ArityMismatch {
                expected: function.arity(),
                got: arguments.len(),
            });
        }
        if self.call_depth >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow(self.config.max_call_depth));
        }

        self.call_depth += 1;
        let result = ensure_sufficient_stack(|| self.apply_function(function, arguments));
        self.call_depth -= 1;
        result
    }

    fn apply_function(
        &mut self,
        function: &Function,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let environment = Environment::new_enclosed(&function.closure);
        for (parameter, argument) in function.decl.parameters.iter().zip(arguments) {
            environment.define(parameter.name.clone(), argument);
        }
        match self.eval_block_statement(&function.decl.body, &environment) {
            Ok(()) => Ok(Value::Nil),
            Err(QuickReturn::Return(value)) => Ok(value),
            Err(QuickReturn::Error(error)) => Err(error),
        }
    }
}

fn eval_prefix_operation(operator: UnaryOperator, operand: Value) -> Result<Value, RuntimeError> {
    match (operator, operand) {
        (UnaryOperator::Negate, Value::Number(value)) => Ok(Value::Number(-value)),
        (UnaryOperator::Negate, other) => Err(expected_number(&other, "unary '-'")),
        (UnaryOperator::Not, operand) => Ok(Value::Bool(!operand.is_truthy())),
    }
}

fn expected_number(value: &Value, context: &str) -> RuntimeError {
    RuntimeError::type_error(format!(
        "Type error: expected number in {context}, got {value}"
    ))
}

fn numbers(left: &Value, right: &Value, context: &str) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => Ok((*left, *right)),
        (Value::Number(_), other) | (other, _) => Err(expected_number(other, context)),
    }
}

fn eval_infix_operation(
    operator: BinaryOperator,
    left: Value,
    right: Value,
) -> Result<Value, RuntimeError> {
    use BinaryOperator as Op;

    match operator {
        Op::Add => match (&left, &right) {
            (Value::Number(left), Value::Number(right)) => Ok(Value::Number(left + right)),
            (Value::String(left), Value::String(right)) => {
                Ok(Value::string(format!("{left}{right}")))
            }
            _ => Err(RuntimeError::type_error(
                "Type error: '+' needs (number,number) or (string,string).",
            )),
        },
        Op::Subtract => {
            let (left, right) = numbers(&left, &right, "binary '-'")?;
            Ok(Value::Number(left - right))
        }
        Op::Multiply => {
            let (left, right) = numbers(&left, &right, "binary '*'")?;
            Ok(Value::Number(left * right))
        }
        Op::Divide => {
            let (left, right) = numbers(&left, &right, "binary '/'")?;
            if right == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(Value::Number(left / right))
        }
        Op::Less | Op::LessEqual | Op::Greater | Op::GreaterEqual => {
            let (left, right) = numbers(&left, &right, "comparison")?;
            Ok(Value::Bool(match operator {
                Op::Less => left < right,
                Op::LessEqual => left <= right,
                Op::Greater => left > right,
                _ => left >= right,
            }))
        }
        Op::Equal => Ok(Value::Bool(left == right)),
        Op::NotEqual => Ok(Value::Bool(left != right)),
        // Both operands already evaluated; only reachable without short-circuiting.
        Op::And => Ok(if left.is_truthy() { right } else { left }),
        Op::Or => Ok(if left.is_truthy() { left } else { right }),
    }
}

fn eval_get(object: &Value, name: &Identifier) -> Result<Value, RuntimeError> {
    match object {
        Value::Map(entries) => entries
            .borrow()
            .get(&name.name)
            .cloned()
            .ok_or_else(|| RuntimeError::MissingExport(name.name.clone())),
        Value::Instance(instance) => {
            if let Some(value) = instance.fields.borrow().get(&name.name) {
                return Ok(value.clone());
            }
            // A fresh bound method on every access; bound methods are never cached.
            match instance.class.find_method(&name.name) {
                Some(method) => Ok(Value::Function(Rc::new(method.bind(instance.clone())))),
                None => Err(RuntimeError::UndefinedProperty(name.name.clone())),
            }
        }
        _ => Err(RuntimeError::type_error(
            "Only instances and modules have properties.",
        )),
    }
}

fn list_index(index: &Value, len: usize) -> Result<usize, RuntimeError> {
    let Value::Number(index) = index else {
        return Err(RuntimeError::type_error("List index must be a number."));
    };
    let index = index.trunc() as i64;
    if index < 0 || index as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds { index, len });
    }
    Ok(index as usize)
}

fn eval_index(object: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            let index = list_index(index, items.len())?;
            Ok(items[index].clone())
        }
        Value::Map(entries) => {
            let Value::String(key) = index else {
                return Err(RuntimeError::type_error("Map key must be a string."));
            };
            let value = entries.borrow().get(key).cloned();
            value.ok_or_else(|| RuntimeError::UndefinedKey(key.clone()))
        }
        _ => Err(RuntimeError::type_error(
            "Only lists and maps support subscription.",
        )),
    }
}

fn eval_index_set(object: &Value, index: &Value, value: Value) -> Result<Value, RuntimeError> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let index = list_index(index, items.len())?;
            items[index] = value.clone();
            Ok(value)
        }
        Value::Map(entries) => {
            let Value::String(key) = index else {
                return Err(RuntimeError::type_error("Map key must be a string."));
            };
            entries.borrow_mut().insert(key.clone(), value.clone());
            Ok(value)
        }
        _ => Err(RuntimeError::type_error(
            "Only lists and maps support assignment.",
        )),
    }
}

/// An in-memory `print` sink that stays readable after being handed to an
/// interpreter.
#[derive(Clone, Default)]
pub struct CapturedOutput(Rc<RefCell<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
