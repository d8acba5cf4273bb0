//! Natives attached to specific `@std` modules after their Luma source runs.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::builtins::{expect_number, expect_string};
use crate::value::{NativeFunction, RuntimeError, Value};

pub type Exports = BTreeMap<Rc<str>, Value>;

/// Supplies host functions for a module id. Called once per module load,
/// after the module body ran, with the module's export map.
pub trait NativeModules {
    fn inject(&self, module_id: &str, exports: &mut Exports);
}

/// No module-specific natives at all.
pub struct NoNatives;

impl NativeModules for NoNatives {
    fn inject(&self, _module_id: &str, _exports: &mut Exports) {}
}

/// `@std.math`, `@std.string`, `@std.time` and `@std.os`.
#[derive(Default)]
pub struct StdNatives;

impl NativeModules for StdNatives {
    fn inject(&self, module_id: &str, exports: &mut Exports) {
        let natives = match module_id {
            "@std.math" => math(),
            "@std.string" => string(),
            "@std.time" => time(),
            "@std.os" => os(),
            _ => return,
        };
        trace!(module = module_id, count = natives.len(), "injecting natives");
        for native in natives {
            exports.insert(native.name.clone(), Value::native(native));
        }
    }
}

fn unary_math(name: &'static str, op: fn(f64) -> f64) -> NativeFunction {
    NativeFunction::new(name, 1, move |args| {
        let value = expect_number(&args[0], &format!("math.{name}"))?;
        Ok(Value::Number(op(value)))
    })
}

fn math() -> Vec<NativeFunction> {
    vec![
        unary_math("sqrt", f64::sqrt),
        unary_math("sin", f64::sin),
        unary_math("cos", f64::cos),
        unary_math("tan", f64::tan),
        unary_math("abs", f64::abs),
        unary_math("ceil", f64::ceil),
        unary_math("floor", f64::floor),
        NativeFunction::new("pi", 0, |_| Ok(Value::Number(std::f64::consts::PI))),
    ]
}

fn string_map(name: &'static str, op: fn(&str) -> String) -> NativeFunction {
    NativeFunction::new(name, 1, move |args| {
        let value = expect_string(&args[0], &format!("string.{name}"))?;
        Ok(Value::string(op(&value)))
    })
}

fn string_test(name: &'static str, op: fn(&str, &str) -> bool) -> NativeFunction {
    NativeFunction::new(name, 2, move |args| {
        let value = expect_string(&args[0], &format!("string.{name} value"))?;
        let affix = expect_string(&args[1], &format!("string.{name} affix"))?;
        Ok(Value::Bool(op(&value, &affix)))
    })
}

fn string() -> Vec<NativeFunction> {
    vec![
        string_map("upper", str::to_uppercase),
        string_map("lower", str::to_lowercase),
        string_map("trim", |s| s.trim().to_owned()),
        string_test("starts_with", |s, prefix| s.starts_with(prefix)),
        string_test("ends_with", |s, suffix| s.ends_with(suffix)),
        NativeFunction::new("split", 2, |args| {
            let value = expect_string(&args[0], "string.split value")?;
            let delimiter = expect_string(&args[1], "string.split delimiter")?;
            if delimiter.is_empty() {
                return Err(RuntimeError::native(
                    "Delimiter cannot be empty in string.split.",
                ));
            }
            Ok(Value::list(
                value.split(&*delimiter).map(Value::string).collect(),
            ))
        }),
        NativeFunction::new("join", 2, |args| {
            let Value::List(items) = &args[0] else {
                return Err(RuntimeError::native("Expected list in string.join."));
            };
            let delimiter = expect_string(&args[1], "string.join delimiter")?;
            let parts = items
                .borrow()
                .iter()
                .map(|item| expect_string(item, "string.join elements"))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::string(parts.join(&*delimiter)))
        }),
    ]
}

fn time() -> Vec<NativeFunction> {
    vec![
        NativeFunction::new("now", 0, |_| {
            let elapsed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            Ok(Value::Number(elapsed.as_millis() as f64 / 1000.0))
        }),
        NativeFunction::new("sleep", 1, |args| {
            let millis = expect_number(&args[0], "time.sleep")?;
            if millis > 0.0 {
                std::thread::sleep(Duration::from_millis(millis as u64));
            }
            Ok(Value::Nil)
        }),
    ]
}

fn os() -> Vec<NativeFunction> {
    vec![
        NativeFunction::new("name", 0, |_| {
            let name = match std::env::consts::OS {
                "windows" => "Windows",
                "macos" => "macOS",
                "linux" => "Linux",
                _ => "Unknown",
            };
            Ok(Value::string(name))
        }),
        NativeFunction::new("cwd", 0, |_| {
            let cwd = std::env::current_dir()
                .map_err(|err| RuntimeError::native(format!("Could not read cwd: {err}")))?;
            Ok(Value::string(cwd.to_string_lossy().into_owned()))
        }),
        NativeFunction::new("env", 1, |args| {
            let key = expect_string(&args[0], "os.env")?;
            Ok(std::env::var(&*key)
                .map(Value::string)
                .unwrap_or(Value::Nil))
        }),
        NativeFunction::new("exit", 1, |args| {
            let code = expect_number(&args[0], "os.exit")?;
            std::process::exit(code as i32)
        }),
    ]
}
