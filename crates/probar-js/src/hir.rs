//! Executable syntax tree.
//!
//! [`lower`](crate::lower) turns a parsed swc [`Script`](swc_core::ecma::ast::Script)
//! into this tree. It keeps only what evaluation needs: types and
//! decorators are gone, parentheses are folded away, arrow expression
//! bodies become `return` statements, and every statement and expression
//! still records the byte range it came from.
//!
//! Function nodes sit behind [`Rc`] so closures can share their body with
//! the tree instead of copying it on every evaluation.

use std::rc::Rc;

use crate::ident::Identifier;
use crate::span::Span;

/// A lowered module body.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements
    pub body: Vec<Stmt>,
    /// Range of the whole program
    pub span: Span,
}

/// A statement with its source range.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// What kind of statement this is
    pub kind: StmtKind,
    /// Source range, including a trailing `;` when present
    pub span: Span,
}

impl Stmt {
    /// Create a statement with the given span.
    #[must_use]
    pub const fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// JavaScript statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement: `expr;`
    Expr(Expr),
    /// Variable declaration: `var a = 1, b;`
    Var {
        /// `var`, `let` or `const`
        kind: VarKind,
        /// Declared names
        decls: Vec<VarDeclarator>,
    },
    /// Function declaration: `function name(params) { body }`
    Function(Rc<Function>),
    /// Return statement: `return expr;` or `return;`
    Return(Option<Expr>),
    /// If statement: `if (test) consequent else alternate`
    If {
        /// Condition
        test: Expr,
        /// Taken when the condition is truthy
        consequent: Box<Stmt>,
        /// Optional else branch
        alternate: Option<Box<Stmt>>,
    },
    /// Block: `{ stmts }`
    Block(Block),
    /// While loop: `while (test) body`
    While {
        /// Condition
        test: Expr,
        /// Loop body
        body: Box<Stmt>,
    },
    /// Do-while loop: `do body while (test);`
    DoWhile {
        /// Loop body
        body: Box<Stmt>,
        /// Condition
        test: Expr,
    },
    /// For loop: `for (init; test; update) body`
    For {
        /// Initializer
        init: Option<ForInit>,
        /// Condition
        test: Option<Expr>,
        /// Update expression
        update: Option<Expr>,
        /// Loop body
        body: Box<Stmt>,
    },
    /// Enumeration loop: `for (left in right) body`
    ForIn {
        /// Binding or assignment target receiving each key
        left: ForInLeft,
        /// Object whose keys are enumerated
        right: Expr,
        /// Loop body
        body: Box<Stmt>,
    },
    /// `label: body`
    Labeled {
        /// Label name
        label: Identifier,
        /// Labelled statement
        body: Box<Stmt>,
    },
    /// Switch statement
    Switch {
        /// Expression to switch on
        discriminant: Expr,
        /// Cases in source order
        cases: Vec<SwitchCase>,
    },
    /// `break;` or `break label;`
    Break(Option<Identifier>),
    /// `continue;` or `continue label;`
    Continue(Option<Identifier>),
    /// `throw expr;`
    Throw(Expr),
    /// `try { } catch (e) { } finally { }`
    Try {
        /// Protected block
        block: Block,
        /// Catch clause
        handler: Option<CatchClause>,
        /// Finally block
        finalizer: Option<Block>,
    },
    /// `with (object) body`
    With {
        /// Object whose properties shadow outer bindings
        object: Expr,
        /// Statement evaluated in the object scope
        body: Box<Stmt>,
    },
    /// `debugger;`
    Debugger,
    /// Empty statement: `;`
    Empty,
}

/// `{ ... }` statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Statements in order
    pub body: Vec<Stmt>,
    /// Range including the braces
    pub span: Span,
}

/// Declaration keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
}

impl VarKind {
    /// Get the JavaScript keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::Let => "let",
            Self::Const => "const",
        }
    }
}

/// One `name = init` entry of a declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    /// Declared name
    pub name: Identifier,
    /// Initial value
    pub init: Option<Expr>,
    /// Source range
    pub span: Span,
}

/// Initializer clause of a `for` loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// `for (var i = 0; ...)`
    Var {
        /// Declaration keyword
        kind: VarKind,
        /// Declared names
        decls: Vec<VarDeclarator>,
    },
    /// `for (i = 0; ...)`
    Expr(Expr),
}

/// Left side of `for (left in right)`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInLeft {
    /// `for (var k in o)`
    Var {
        /// Declaration keyword
        kind: VarKind,
        /// Declared name
        name: Identifier,
    },
    /// `for (k in o)` or `for (o.k in p)`
    Target(Expr),
}

/// `case test:` or `default:` with its statements.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expr>,
    /// Statements executed when the case matches
    pub consequent: Vec<Stmt>,
    /// Source range
    pub span: Span,
}

/// `catch (param) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Bound exception name; `None` for `catch { }`
    pub param: Option<Identifier>,
    /// Handler body
    pub body: Block,
    /// Source range
    pub span: Span,
}

/// Function declaration, function expression or arrow function.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Name (required for declarations)
    pub name: Option<Identifier>,
    /// Parameter names
    pub params: Vec<Identifier>,
    /// Function body; an arrow's expression body is a single `return`
    pub body: Block,
    /// Arrows take `this` and `arguments` from the enclosing function
    pub is_arrow: bool,
    /// Source range
    pub span: Span,
}

/// An expression with its source range.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// What kind of expression this is
    pub kind: ExprKind,
    /// Source range
    pub span: Span,
}

impl Expr {
    /// Create an expression with the given span.
    #[must_use]
    pub const fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// JavaScript expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Number literal
    Num(f64),
    /// String literal (unescaped value)
    Str(String),
    /// Regular expression literal: `/pattern/flags`
    Regex {
        /// Pattern source between the slashes
        pattern: String,
        /// Flag letters
        flags: String,
    },
    /// Template literal: `` `a${b}c` ``
    Template {
        /// Cooked text chunks, one more than `exprs`
        quasis: Vec<String>,
        /// Substitutions
        exprs: Vec<Expr>,
    },
    /// Identifier reference
    Ident(Identifier),
    /// `this`
    This,
    /// Array literal: `[a, , b]`; `None` marks a hole
    Array(Vec<Option<Expr>>),
    /// Object literal: `{ key: value, get k() {} }`
    Object(Vec<Property>),
    /// Function or arrow expression
    Function(Rc<Function>),
    /// Prefix unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        argument: Box<Expr>,
    },
    /// `++x`, `x--`, ...
    Update {
        /// Operator
        op: UpdateOp,
        /// Whether the operator comes first
        prefix: bool,
        /// Target
        argument: Box<Expr>,
    },
    /// Binary operation: `left op right`
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Short-circuit operation: `left && right`
    Logical {
        /// Operator
        op: LogicalOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Assignment: `target op value`
    Assign {
        /// Operator
        op: AssignOp,
        /// Identifier or member target
        target: Box<Expr>,
        /// New value
        value: Box<Expr>,
    },
    /// Ternary: `test ? consequent : alternate`
    Conditional {
        /// Condition
        test: Box<Expr>,
        /// Value when truthy
        consequent: Box<Expr>,
        /// Value when falsy
        alternate: Box<Expr>,
    },
    /// Function call: `callee(args)`
    Call {
        /// Function expression
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Expr>,
    },
    /// Construction: `new callee(args)`
    New {
        /// Constructor expression
        callee: Box<Expr>,
        /// Arguments; `new F` has none
        args: Vec<Expr>,
    },
    /// Member access: `object.property`
    Member {
        /// Object
        object: Box<Expr>,
        /// Property name
        property: Identifier,
    },
    /// Computed member: `object[index]`
    Index {
        /// Object
        object: Box<Expr>,
        /// Index expression
        index: Box<Expr>,
    },
    /// Comma sequence: `a, b`
    Sequence(Vec<Expr>),
}

/// Entry of an object literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name
    pub key: PropertyKey,
    /// Plain value or accessor half
    pub kind: PropertyKind,
    /// Value, or the accessor function for `get`/`set`
    pub value: Expr,
}

/// Name of an object literal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    /// Identifier, string or number key, as its string value
    Static(String),
    /// `[expr]: value`
    Computed(Expr),
}

/// What an object literal entry defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// `key: value`, shorthand or method
    Init,
    /// `get key() {}`
    Get,
    /// `set key(v) {}`
    Set,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// Addition: `+`
    Add,
    /// Subtraction: `-`
    Sub,
    /// Multiplication: `*`
    Mul,
    /// Division: `/`
    Div,
    /// Modulo: `%`
    Mod,
    /// Exponentiation: `**`
    Exp,
    /// Equality: `==`
    Eq,
    /// Strict equality: `===`
    EqStrict,
    /// Inequality: `!=`
    Ne,
    /// Strict inequality: `!==`
    NeStrict,
    /// Less than: `<`
    Lt,
    /// Less than or equal: `<=`
    Le,
    /// Greater than: `>`
    Gt,
    /// Greater than or equal: `>=`
    Ge,
    /// Bitwise and: `&`
    BitAnd,
    /// Bitwise or: `|`
    BitOr,
    /// Bitwise xor: `^`
    BitXor,
    /// Left shift: `<<`
    Shl,
    /// Signed right shift: `>>`
    Shr,
    /// Unsigned right shift: `>>>`
    UShr,
    /// Property test: `in`
    In,
    /// Prototype test: `instanceof`
    InstanceOf,
}

/// Short-circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `??`
    Nullish,
}

/// Prefix unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical not: `!`
    Not,
    /// Negation: `-`
    Neg,
    /// Numeric conversion: `+`
    Plus,
    /// Bitwise not: `~`
    BitNot,
    /// `typeof`
    TypeOf,
    /// `void`
    Void,
    /// `delete`
    Delete,
}

/// `++` / `--`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    /// `++`
    Increment,
    /// `--`
    Decrement,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// Compound assignment such as `+=` or `>>>=`
    Compound(BinOp),
    /// Short-circuit assignment: `&&=`, `||=`, `??=`
    Logical(LogicalOp),
}
