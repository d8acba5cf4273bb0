use luma_interpreter::{RuntimeError, Value};

pub trait Printer {
    type Object;

    fn print(&mut self, object: Self::Object);
}

pub struct LumaPrinter {}

impl Printer for LumaPrinter {
    type Object = Result<Value, RuntimeError>;

    fn print(&mut self, object: Self::Object) {
        match object {
            Ok(Value::Nil) => {}
            Ok(value) => println!("{value}"),
            Err(err) => eprintln!("Error: {err}"),
        }
    }
}
