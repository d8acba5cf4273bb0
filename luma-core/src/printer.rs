//! Canonical source rendering of the syntax tree.
//!
//! The output is valid Luma: parsing it again yields a tree that prints the
//! same way and behaves the same when run. Binary and unary expressions always
//! carry their own parentheses, so precedence never depends on layout.

use std::fmt::{Display, Formatter, Result, Write};

use crate::ast::{
    Block, ClassDecl, ElseBranch, Expression, FunctionDecl, IfStatement, Literal, Program,
    Statement, Visibility,
};

const INDENT: &str = "  ";

struct SourceWriter<'a, 'b> {
    f: &'a mut Formatter<'b>,
    depth: usize,
}

impl SourceWriter<'_, '_> {
    fn indent(&mut self) -> Result {
        for _ in 0..self.depth {
            self.f.write_str(INDENT)?;
        }
        Ok(())
    }

    fn block(&mut self, block: &Block) -> Result {
        if block.statements.is_empty() {
            return self.f.write_str("{}");
        }
        self.f.write_str("{\n")?;
        self.depth += 1;
        for statement in &block.statements {
            self.indent()?;
            self.statement(statement)?;
            self.f.write_char('\n')?;
        }
        self.depth -= 1;
        self.indent()?;
        self.f.write_char('}')
    }

    fn visibility(&mut self, visibility: Visibility) -> Result {
        match visibility {
            Visibility::Open => self.f.write_str("open "),
            Visibility::Closed => Ok(()),
        }
    }

    fn function(&mut self, function: &FunctionDecl) -> Result {
        self.visibility(function.visibility)?;
        write!(self.f, "def {}(", function.name)?;
        for (i, parameter) in function.parameters.iter().enumerate() {
            if i > 0 {
                self.f.write_str(", ")?;
            }
            write!(self.f, "{parameter}")?;
        }
        self.f.write_str(") ")?;
        self.block(&function.body)
    }

    fn class(&mut self, class: &ClassDecl) -> Result {
        self.visibility(class.visibility)?;
        write!(self.f, "class {} ", class.name)?;
        if class.methods.is_empty() {
            return self.f.write_str("{}");
        }
        self.f.write_str("{\n")?;
        self.depth += 1;
        for method in &class.methods {
            self.indent()?;
            self.function(method)?;
            self.f.write_char('\n')?;
        }
        self.depth -= 1;
        self.indent()?;
        self.f.write_char('}')
    }

    fn if_statement(&mut self, statement: &IfStatement) -> Result {
        write!(self.f, "if {} ", Parenthesized(&statement.condition))?;
        self.block(&statement.consequence)?;
        match &statement.alternative {
            Some(ElseBranch::ElseIf(next)) => {
                self.f.write_str(" else ")?;
                self.if_statement(next)
            }
            Some(ElseBranch::Else(block)) => {
                self.f.write_str(" else ")?;
                self.block(block)
            }
            None => Ok(()),
        }
    }

    fn statement(&mut self, statement: &Statement) -> Result {
        match statement {
            Statement::Expression(expression) => write!(self.f, "{expression};"),
            Statement::Print(value) => write!(self.f, "print{};", Parenthesized(value)),
            Statement::VarAssign { name, value } => write!(self.f, "{name} = {value};"),
            Statement::Block(block) => self.block(block),
            Statement::If(statement) => self.if_statement(statement),
            Statement::While { condition, body } => {
                write!(self.f, "while {} ", Parenthesized(condition))?;
                self.block(body)
            }
            Statement::Until { condition, body } => {
                write!(self.f, "until {} ", Parenthesized(condition))?;
                self.block(body)
            }
            Statement::Return(Some(value)) => write!(self.f, "return {value};"),
            Statement::Return(None) => self.f.write_str("return;"),
            Statement::FuncDef(function) => self.function(function),
            Statement::Class(class) => self.class(class),
            Statement::Echo { count, body } => {
                write!(self.f, "echo {count} ")?;
                self.block(body)
            }
            Statement::Swap { left, right } => write!(self.f, "{left} <-> {right};"),
            Statement::Maybe { body, otherwise } => {
                self.f.write_str("maybe ")?;
                self.block(body)?;
                if let Some(otherwise) = otherwise {
                    self.f.write_str(" otherwise ")?;
                    self.block(otherwise)?;
                }
                Ok(())
            }
            Statement::Module(module) => write!(self.f, "module {module};"),
            Statement::Use { module, alias } => write!(self.f, "use {module} as {alias};"),
        }
    }
}

/// An expression in a position that needs surrounding parentheses, without
/// doubling the ones binary and unary expressions print themselves.
struct Parenthesized<'a>(&'a Expression);

impl Display for Parenthesized<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.0 {
            Expression::Binary(..) | Expression::Unary(..) => write!(f, "{}", self.0),
            other => write!(f, "({other})"),
        }
    }
}

fn write_escaped(f: &mut Formatter<'_>, value: &str) -> Result {
    f.write_char('"')?;
    for ch in value.chars() {
        match ch {
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn write_list(f: &mut Formatter<'_>, items: &[Expression]) -> Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Literal::Number(value) => write!(f, "{value}"),
            Literal::String(value) => write_escaped(f, value),
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Nil => f.write_str("nil"),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        use Expression::*;
        match self {
            Literal(literal) => write!(f, "{literal}"),
            Variable(name) => write!(f, "{name}"),
            Grouping(inner) => match inner.as_ref() {
                Binary(..) | Unary(..) => write!(f, "{inner}"),
                _ => write!(f, "({inner})"),
            },
            Unary(operator, operand) => write!(f, "({}{})", operator.to_str(), operand),
            Binary(operator, left, right) => {
                write!(f, "({} {} {})", left, operator.to_str(), right)
            }
            Call { callee, arguments } => {
                write!(f, "{callee}(")?;
                write_list(f, arguments)?;
                f.write_char(')')
            }
            List(items) => {
                f.write_char('[')?;
                write_list(f, items)?;
                f.write_char(']')
            }
            Get { object, name } => write!(f, "{object}.{name}"),
            Index { object, index } => write!(f, "{object}[{index}]"),
            IndexSet {
                object,
                index,
                value,
            } => write!(f, "{object}[{index}] = {value}"),
            Set {
                object,
                name,
                value,
            } => write!(f, "{object}.{name} = {value}"),
            This(_) => f.write_str("this"),
            Map(entries) => {
                f.write_char('{')?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_char('}')
            }
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        SourceWriter { f, depth: 0 }.statement(self)
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        SourceWriter { f, depth: 0 }.block(self)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for statement in &self.statements {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::lexer::scan;
    use crate::parser::parse;

    fn reprint(source: &str) -> String {
        parse(scan(source).unwrap()).unwrap().to_string()
    }

    #[test]
    fn test_printed_program_is_a_fixed_point() {
        let sources = vec![
            "a = [1, 2, 3]; push(a, 4); print(a)",
            "def f(x){ if (x<=1) { return 1 } return x*f(x-1) }; print(f(5))",
            "def make(){ i=0; def inc(){ i=i+1; return i }; return inc }; f=make(); f(); f()",
            "x = ((1 + 2)) * -(3); y = (x); z = !(x == 9) and not y or nil",
            "m = {\"a\": 1, \"b\\n\": [true, false]}; m[\"a\"] = m.b; m.c = this",
            "open class Counter { def init(n) { this.n = n } def next() { this.n = this.n + 1; return this.n } }",
            "if (a) { 1 } else if (b) { 2 } else { maybe { 3 / 0 } otherwise { print(\"no\") } }",
            "while (i < 10) { echo i { i = i + 1 } } until (done) { a <-> b }",
            "module @app.main; use @std.math as m; print(m.sqrt(16))",
            "n = 3.25; k = 0.1; big = 12345678901234567890",
        ];

        for source in sources {
            let once = reprint(source);
            let twice = reprint(&once);
            assert_eq!(once, twice, "source: {source}");
        }
    }

    #[test]
    fn test_layout() {
        let source = "class A { def m(x) { if (x) { return 1 } } } open def g() { }";
        let expected = "class A {\n  def m(x) {\n    if (x) {\n      return 1;\n    }\n  }\n}\nopen def g() {}\n";
        assert_eq!(reprint(source), expected);
    }
}
