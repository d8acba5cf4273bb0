use std::fmt::Display;
use std::rc::Rc;

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Expression(Expression),
    Print(Expression),
    VarAssign {
        name: Identifier,
        value: Expression,
    },
    Block(Block),
    If(IfStatement),
    While {
        condition: Expression,
        body: Block,
    },
    Until {
        condition: Expression,
        body: Block,
    },
    Return(Option<Expression>),
    FuncDef(Rc<FunctionDecl>),
    Class(Rc<ClassDecl>),
    Echo {
        count: Expression,
        body: Block,
    },
    Swap {
        left: Identifier,
        right: Identifier,
    },
    Maybe {
        body: Block,
        otherwise: Option<Block>,
    },
    Module(ModuleId),
    Use {
        module: ModuleId,
        alias: Identifier,
    },
}

#[derive(Debug, PartialEq, Clone)]
pub struct IfStatement {
    pub condition: Expression,
    pub consequence: Block,
    pub alternative: Option<ElseBranch>,
}

/// `else if` chains nest another `IfStatement` instead of wrapping it in a block.
#[derive(Debug, PartialEq, Clone)]
pub enum ElseBranch {
    ElseIf(Box<IfStatement>),
    Else(Block),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Visibility {
    Open,
    #[default]
    Closed,
}

/// A parsed `def`. Runtime functions hold the declaration behind an `Rc`, so
/// every closure created from it shares one body.
#[derive(Debug, PartialEq, Clone)]
pub struct FunctionDecl {
    pub name: Identifier,
    pub parameters: Vec<Identifier>,
    pub body: Block,
    pub visibility: Visibility,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ClassDecl {
    pub name: Identifier,
    pub methods: Vec<Rc<FunctionDecl>>,
    pub visibility: Visibility,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(Literal),
    Variable(Identifier),
    Grouping(Box<Expression>),
    Unary(UnaryOperator, Box<Expression>),
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    List(Vec<Expression>),
    Get {
        object: Box<Expression>,
        name: Identifier,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    IndexSet {
        object: Box<Expression>,
        index: Box<Expression>,
        value: Box<Expression>,
    },
    Set {
        object: Box<Expression>,
        name: Identifier,
        value: Box<Expression>,
    },
    This(usize),
    Map(Vec<(Expression, Expression)>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Number(f64),
    String(Rc<str>),
    Bool(bool),
    Nil,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Identifier {
    pub name: Rc<str>,
    pub line: usize,
}

/// `@mount.segment...`; `segments[0]` is the mount.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ModuleId {
    pub segments: Vec<Rc<str>>,
    pub line: usize,
}

impl UnaryOperator {
    pub fn to_str(self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "!",
        }
    }
}

impl BinaryOperator {
    pub fn to_str(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
            And => "and",
            Or => "or",
        }
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.segments.join("."))
    }
}

impl ModuleId {
    pub fn mount(&self) -> &str {
        self.segments.first().map(|s| s.as_ref()).unwrap_or("")
    }

    /// Segments after the mount.
    pub fn path(&self) -> &[Rc<str>] {
        self.segments.get(1..).unwrap_or(&[])
    }
}
