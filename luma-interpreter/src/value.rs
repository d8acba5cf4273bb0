use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::path::PathBuf;
use std::rc::Rc;

use luma_core::ast::FunctionDecl;
use luma_core::stack::ensure_sufficient_stack;
use thiserror::Error;

use crate::environment::Environment;

pub type List = Rc<RefCell<Vec<Value>>>;
pub type Map = Rc<RefCell<BTreeMap<Rc<str>, Value>>>;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Number(f64),
    String(Rc<str>),
    Bool(bool),
    Function(Rc<Function>),
    NativeFunction(Rc<NativeFunction>),
    List(List),
    Map(Map),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
}

impl Value {
    pub fn string(value: impl Into<Rc<str>>) -> Value {
        Value::String(value.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: BTreeMap<Rc<str>, Value>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn native(native: NativeFunction) -> Value {
        Value::NativeFunction(Rc::new(native))
    }

    /// `nil` and `false` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Function(_) => "function",
            Value::NativeFunction(_) => "native function",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }
}

/// Scalars compare by value, everything else by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            (Value::NativeFunction(left), Value::NativeFunction(right)) => Rc::ptr_eq(left, right),
            (Value::List(left), Value::List(right)) => Rc::ptr_eq(left, right),
            (Value::Map(left), Value::Map(right)) => Rc::ptr_eq(left, right),
            (Value::Class(left), Value::Class(right)) => Rc::ptr_eq(left, right),
            (Value::Instance(left), Value::Instance(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_value(f, self, &mut Vec::new())
    }
}

/// `open` holds the lists and maps currently being written. A container that
/// shows up inside itself prints as `[...]` or `{...}`.
fn write_value(
    f: &mut std::fmt::Formatter<'_>,
    value: &Value,
    open: &mut Vec<*const ()>,
) -> std::fmt::Result {
    match value {
        Value::Nil => write!(f, "nil"),
        Value::Number(value) => write!(f, "{}", format_number(*value)),
        Value::String(value) => write!(f, "{value}"),
        Value::Bool(value) => write!(f, "{value}"),
        Value::Function(function) => write!(f, "<fn {}>", function.name()),
        Value::NativeFunction(native) => write!(f, "<native fn {}>", native.name),
        Value::List(items) => {
            let address = Rc::as_ptr(items) as *const ();
            if open.contains(&address) {
                return write!(f, "[...]");
            }
            open.push(address);
            write!(f, "[")?;
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                ensure_sufficient_stack(|| write_value(f, item, open))?;
            }
            open.pop();
            write!(f, "]")
        }
        Value::Map(entries) => {
            let address = Rc::as_ptr(entries) as *const ();
            if open.contains(&address) {
                return write!(f, "{{...}}");
            }
            open.push(address);
            write!(f, "{{")?;
            for (i, (key, value)) in entries.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: ")?;
                ensure_sufficient_stack(|| write_value(f, value, open))?;
            }
            open.pop();
            write!(f, "}}")
        }
        Value::Class(class) => write!(f, "<class {}>", class.name),
        Value::Instance(instance) => write!(f, "<instance {}>", instance.class.name),
    }
}

/// Integral values print without a fraction; everything else gets up to 15
/// significant digits with trailing zeros trimmed.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if value.fract() == 0.0 && value.abs() < 9.2e18 {
        return (value as i64).to_string();
    }

    let exponent = value.abs().log10().floor() as i32;
    if !(-5..15).contains(&exponent) {
        let formatted = format!("{:.14e}", value);
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
        let mantissa = trim_fraction(mantissa);
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }

    let decimals = (14 - exponent).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, value)).to_owned()
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// A user function: its declaration plus the environment it closes over.
pub struct Function {
    pub decl: Rc<FunctionDecl>,
    pub closure: Environment,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.decl.name.name
    }

    pub fn arity(&self) -> usize {
        self.decl.parameters.len()
    }

    /// A copy of this method whose closure has `this` bound to `instance`.
    pub fn bind(&self, instance: Rc<Instance>) -> Function {
        let environment = Environment::new_enclosed(&self.closure);
        environment.define("this".into(), Value::Instance(instance));
        Function {
            decl: self.decl.clone(),
            closure: environment,
        }
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .finish()
    }
}

pub type NativeFn = dyn Fn(Vec<Value>) -> Result<Value, RuntimeError>;

/// A host function callable from scripts. Non-variadic natives are only
/// invoked with exactly `arity` arguments; variadic ones validate their own.
pub struct NativeFunction {
    pub name: Rc<str>,
    pub arity: usize,
    pub variadic: bool,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: &str,
        arity: usize,
        func: impl Fn(Vec<Value>) -> Result<Value, RuntimeError> + 'static,
    ) -> Self {
        NativeFunction {
            name: name.into(),
            arity,
            variadic: false,
            func: Box::new(func),
        }
    }

    pub fn variadic(
        name: &str,
        func: impl Fn(Vec<Value>) -> Result<Value, RuntimeError> + 'static,
    ) -> Self {
        NativeFunction {
            name: name.into(),
            arity: 0,
            variadic: true,
            func: Box::new(func),
        }
    }

    pub fn call(&self, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        (self.func)(arguments)
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("variadic", &self.variadic)
            .finish()
    }
}

pub struct Class {
    pub name: Rc<str>,
    pub methods: HashMap<Rc<str>, Rc<Function>>,
}

impl Class {
    pub fn find_method(&self, name: &str) -> Option<&Rc<Function>> {
        self.methods.get(name)
    }
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class").field("name", &self.name).finish()
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<HashMap<Rc<str>, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Instance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .finish()
    }
}

/// Non-local exits out of statement execution.
#[derive(Debug)]
pub enum QuickReturn {
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for QuickReturn {
    fn from(error: RuntimeError) -> Self {
        QuickReturn::Error(error)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Undefined variable '{name}' at line {line}")]
    UndefinedVariable { name: Rc<str>, line: usize },
    #[error("{0}")]
    Type(String),
    #[error("Runtime error: division by zero.")]
    DivisionByZero,
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: usize, got: usize },
    #[error("Can only call functions and classes.")]
    NotCallable(&'static str),
    #[error("List index out of bounds.")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("Undefined key '{0}'.")]
    UndefinedKey(Rc<str>),
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(Rc<str>),
    #[error("Module has no exported member '{0}'.")]
    MissingExport(Rc<str>),
    #[error("Echo count cannot be negative.")]
    NegativeEchoCount,
    #[error("Cyclic import detected: {0}")]
    CyclicImport(String),
    #[error("Unknown module mount '@{0}'. Use '@std' or '@app'.")]
    UnknownMount(Rc<str>),
    #[error("Module ID '{0}' must have at least one component after mount.")]
    InvalidModuleId(String),
    #[error("Module file not found: {} (for module {module})", .path.display())]
    ModuleNotFound { module: String, path: PathBuf },
    #[error("Could not open module file: {}: {message}", .path.display())]
    ModuleIo { path: PathBuf, message: String },
    #[error("Could not load module {module}:\n{}", .diagnostics.join("\n"))]
    ModuleSyntax {
        module: String,
        diagnostics: Vec<String>,
    },
    #[error("Stack overflow: call depth exceeded {0}.")]
    StackOverflow(usize),
    #[error("Return used outside of a function.")]
    ReturnOutsideFunction,
    #[error("{0}")]
    Native(String),
    #[error("Could not write output: {0}")]
    Output(String),
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type(message.into())
    }

    pub fn native(message: impl Into<String>) -> Self {
        RuntimeError::Native(message.into())
    }
}
