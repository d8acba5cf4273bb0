use std::fs;
use std::path::Path;

use luma_core::lexer::scan;
use luma_core::parser::parse;
use luma_interpreter::{CapturedOutput, Interpreter, InterpreterConfig, NoNatives, RuntimeError};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// A project directory with `std/` and `src/` roots.
struct Project {
    dir: TempDir,
}

impl Project {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("std")).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        for (path, source) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, source).unwrap();
        }
        Project { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn interpreter(&self) -> (Interpreter, CapturedOutput) {
        let output = CapturedOutput::default();
        let config = InterpreterConfig::for_entry_file(&self.root().join("src").join("main.lu"))
            .with_stdlib_root(self.root().join("std"));
        (Interpreter::new(config).with_output(output.clone()), output)
    }

    fn run(&self, source: &str) -> (Result<(), RuntimeError>, String) {
        let (mut interpreter, output) = self.interpreter();
        let program = parse(scan(source).unwrap()).unwrap();
        let result = interpreter.run(&program);
        (result, output.contents())
    }
}

#[test]
fn test_module_body_runs_once() {
    let project = Project::new(&[
        (
            "std/counter.lu",
            "print(\"loading counter\")\nopen def next() { return 1 }\n",
        ),
        (
            "src/first.lu",
            "use @std.counter as c\nopen def value() { return c.next() }\n",
        ),
        (
            "src/second.lu",
            "use @std.counter as c\nopen def value() { return c.next() + 1 }\n",
        ),
    ]);

    let (result, output) = project.run(
        "use @std.counter as a\n\
         use @std.counter as b\n\
         use @app.first as f\n\
         use @app.second as s\n\
         print(a == b)\n\
         print(f.value() + s.value())\n",
    );

    assert_eq!(result, Ok(()));
    assert_eq!(output, "loading counter\ntrue\n3\n");
}

#[test]
fn test_cyclic_imports_fail() {
    let tests = vec![
        (
            vec![("src/self_ref.lu", "use @app.self_ref as me\n")],
            "use @app.self_ref as m",
            "@app.self_ref",
        ),
        (
            vec![
                ("src/a.lu", "use @app.b as b\nopen def a() { return 1 }\n"),
                ("src/b.lu", "use @app.c as c\n"),
                ("src/c.lu", "use @app.a as a\n"),
            ],
            "use @app.a as a",
            "@app.a",
        ),
    ];

    for (files, source, cycle) in tests {
        let project = Project::new(&files);
        let (result, _) = project.run(source);
        assert_eq!(result, Err(RuntimeError::CyclicImport(cycle.to_owned())));
    }
}

#[test]
fn test_failed_load_can_be_retried() {
    let project = Project::new(&[("src/flaky.lu", "open def f() { return 1 }\nboom()\n")]);
    let (mut interpreter, output) = project.interpreter();

    let program = parse(scan("maybe { use @app.flaky as f } otherwise { print(\"failed\") }").unwrap()).unwrap();
    interpreter.run(&program).unwrap();
    assert!(interpreter.loaded_modules().is_empty());

    fs::write(
        project.root().join("src").join("flaky.lu"),
        "open def f() { return 1 }\n",
    )
    .unwrap();
    let program = parse(scan("use @app.flaky as f\nprint(f.f())").unwrap()).unwrap();
    interpreter.run(&program).unwrap();
    assert_eq!(output.contents(), "failed\n1\n");
}

#[test]
fn test_exports_and_visibility() {
    let project = Project::new(&[(
        "src/geometry/shapes.lu",
        "open class Rect {\n\
           def init(w, h) { this.w = w; this.h = h }\n\
           def area() { return this.w * this.h }\n\
         }\n\
         closed def secret() { return 42 }\n\
         open def square(s) { return Rect(s, s) }\n",
    )]);

    let (result, output) = project.run(
        "use @app.geometry.shapes as shapes\n\
         print(shapes.square(3).area())\n\
         print(shapes.Rect)\n\
         shapes.secret()\n",
    );

    assert_eq!(output, "9\n<class Rect>\n");
    assert_eq!(result, Err(RuntimeError::MissingExport("secret".into())));
}

#[test]
fn test_module_errors() {
    let project = Project::new(&[
        ("src/broken.lu", "def f( {\n"),
        ("src/bad_lex.lu", "x = \"open\n"),
        ("src/returns.lu", "return 1\n"),
    ]);

    let (result, _) = project.run("use @lib.x as x");
    assert_eq!(result, Err(RuntimeError::UnknownMount("lib".into())));

    let (result, _) = project.run("use @std as s");
    assert_eq!(result, Err(RuntimeError::InvalidModuleId("@std".to_owned())));

    let (result, _) = project.run("use @app.missing as m");
    assert_eq!(
        result,
        Err(RuntimeError::ModuleNotFound {
            module: "@app.missing".to_owned(),
            path: project.root().join("src").join("missing.lu"),
        })
    );

    let (result, _) = project.run("use @app.broken as b");
    assert!(
        matches!(result, Err(RuntimeError::ModuleSyntax { ref module, ref diagnostics })
            if module == "@app.broken" && !diagnostics.is_empty()),
        "{result:?}"
    );

    let (result, _) = project.run("use @app.bad_lex as b");
    assert_eq!(
        result,
        Err(RuntimeError::ModuleSyntax {
            module: "@app.bad_lex".to_owned(),
            diagnostics: vec!["Unterminated string at line 1".to_owned()],
        })
    );

    let (result, _) = project.run("use @app.returns as r");
    assert_eq!(result, Err(RuntimeError::ReturnOutsideFunction));
}

#[test]
fn test_std_natives_are_injected() {
    let project = Project::new(&[
        ("std/math.lu", "open def square(x) { return x * x }\n"),
        ("std/string.lu", ""),
    ]);

    let (result, output) = project.run(
        "use @std.math as math\n\
         use @std.string as string\n\
         print(math.square(math.sqrt(9)))\n\
         print(string.upper(\"luma\"))\n",
    );
    assert_eq!(result, Ok(()));
    assert_eq!(output, "9\nLUMA\n");

    let output = CapturedOutput::default();
    let config = InterpreterConfig::default().with_stdlib_root(project.root().join("std"));
    let mut interpreter = Interpreter::new(config)
        .with_output(output.clone())
        .with_native_modules(NoNatives);
    let program = parse(scan("use @std.math as math\nmath.sqrt(9)").unwrap()).unwrap();
    assert_eq!(
        interpreter.run(&program),
        Err(RuntimeError::MissingExport("sqrt".into()))
    );
}

#[test]
fn test_module_scope_is_isolated() {
    let project = Project::new(&[(
        "src/state.lu",
        "hidden = 10\n\
         open def bump() { hidden = hidden + 1; return hidden }\n",
    )]);

    let (result, output) = project.run(
        "use @app.state as state\n\
         print(state.bump())\n\
         print(state.bump())\n\
         print(hidden)\n",
    );
    assert_eq!(output, "11\n12\n");
    assert_eq!(
        result,
        Err(RuntimeError::UndefinedVariable {
            name: "hidden".into(),
            line: 4,
        })
    );
}
