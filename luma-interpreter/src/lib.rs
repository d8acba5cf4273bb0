pub mod builtins;
pub mod config;
pub mod environment;
pub mod evaluator;
pub mod modules;
pub mod natives;
pub mod value;

pub use config::InterpreterConfig;
pub use evaluator::{CapturedOutput, Interpreter};
pub use natives::{NativeModules, NoNatives, StdNatives};
pub use value::{NativeFunction, RuntimeError, Value};
