//! Source text to swc [`Script`].
//!
//! Sources are parsed as sloppy-mode scripts with `return` allowed at the
//! top level, which is how CommonJS module bodies run. Before swc sees the
//! text, a token pass rejects inputs nested deeper than
//! [`MAX_NESTING_DEPTH`]; after parsing, the tree is measured again so
//! every later recursive walk (lowering, code generation, evaluation) has
//! a known bound.

use swc_core::common::{BytePos, Spanned};
use swc_core::ecma::ast::{EsVersion, Expr, Script, Stmt};
use swc_core::ecma::parser::error::Error as SwcError;
use swc_core::ecma::parser::lexer::Lexer;
use swc_core::ecma::parser::token::{BinOpToken, Keyword, Token, Word};
use swc_core::ecma::parser::{EsSyntax, Parser, StringInput, Syntax};
use swc_core::ecma::visit::{Visit, VisitWith};

use crate::error::{ParseError, Result};
use crate::span::{offset, BASE};

/// Deepest bracket, operator or statement nesting accepted.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Remaining stack below which parsing moves to a fresh segment.
pub(crate) const STACK_RED_ZONE: usize = 4 * 1024 * 1024;

/// Size of the segment allocated when the red zone is hit.
pub(crate) const STACK_SIZE: usize = 32 * 1024 * 1024;

/// Parse a module body with the default nesting limit.
///
/// # Example
///
/// ```rust
/// let script = probar_js::parse("exports.answer = 42;").unwrap();
/// assert_eq!(script.body.len(), 1);
/// ```
pub fn parse(source: &str) -> Result<Script> {
    parse_with_limit(source, MAX_NESTING_DEPTH)
}

/// Parse a module body, rejecting nesting deeper than `limit`.
pub fn parse_with_limit(source: &str, limit: usize) -> Result<Script> {
    check_token_nesting(source, limit)?;
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SIZE, || {
        let script = parse_script(source)?;
        check_tree_nesting(&script, limit)?;
        Ok(script)
    })
}

fn syntax() -> Syntax {
    Syntax::Es(EsSyntax {
        allow_return_outside_function: true,
        ..EsSyntax::default()
    })
}

fn input(source: &str) -> Result<StringInput<'_>> {
    let end = u32::try_from(source.len())
        .ok()
        .and_then(|len| len.checked_add(BASE))
        .ok_or_else(|| ParseError::Syntax {
            message: "Source is too large".to_string(),
            offset: 0,
        })?;
    Ok(StringInput::new(source, BytePos(BASE), BytePos(end)))
}

fn parse_script(source: &str) -> Result<Script> {
    let lexer = Lexer::new(syntax(), EsVersion::EsNext, input(source)?, None);
    let mut parser = Parser::new_from(lexer);
    let script = parser.parse_script().map_err(syntax_error)?;
    // Recovered errors still mean the text is not valid JavaScript.
    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(syntax_error(err));
    }
    Ok(script)
}

fn syntax_error(err: SwcError) -> ParseError {
    ParseError::Syntax {
        message: err.kind().msg().into_owned(),
        offset: offset(err.span().lo),
    }
}

fn check_token_nesting(source: &str, limit: usize) -> Result<()> {
    let lexer = Lexer::new(syntax(), EsVersion::EsNext, input(source)?, None);
    let mut meter = NestingMeter::new(limit);
    for item in lexer {
        if matches!(item.token, Token::Error(..)) {
            // Left for the parser to report with its own message.
            break;
        }
        if meter.step(&item.token) {
            return Err(ParseError::TooDeep {
                limit,
                offset: offset(item.span.lo),
            });
        }
    }
    Ok(())
}

/// Upper bound on parser recursion, tracked token by token.
///
/// Every open bracket is one level. Inside a bracket level, each prefix
/// operator and each right-associative operator (`=`, `?`, `=>`, `**`)
/// adds one more until the expression ends at `;`, `,`, a statement
/// keyword, or two operands in a row (an inserted semicolon).
#[derive(Debug)]
struct NestingMeter {
    limit: usize,
    chains: Vec<usize>,
    depth: usize,
    after_operand: bool,
}

impl NestingMeter {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            chains: vec![0],
            depth: 0,
            after_operand: false,
        }
    }

    /// Account for one token; `true` once the limit is crossed.
    fn step(&mut self, token: &Token) -> bool {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace | Token::DollarLBrace => {
                self.chains.push(0);
                self.depth += 1;
                self.after_operand = false;
            }
            Token::RParen | Token::RBracket | Token::RBrace => {
                if self.chains.len() > 1 {
                    let chain = self.chains.pop().unwrap_or_default();
                    self.depth = self.depth.saturating_sub(chain + 1);
                }
                self.after_operand = true;
            }
            Token::Semi | Token::Comma => {
                self.reset_chain();
                self.after_operand = false;
            }
            Token::Word(Word::Keyword(keyword)) if starts_statement(keyword) => {
                self.reset_chain();
                self.after_operand = false;
            }
            Token::AssignOp(_) | Token::QuestionMark | Token::Arrow | Token::BinOp(BinOpToken::Exp) => {
                self.extend_chain();
                self.after_operand = false;
            }
            Token::PlusPlus | Token::MinusMinus if self.after_operand => {}
            Token::BinOp(BinOpToken::Add | BinOpToken::Sub) if self.after_operand => {
                self.after_operand = false;
            }
            Token::Bang
            | Token::Tilde
            | Token::PlusPlus
            | Token::MinusMinus
            | Token::BinOp(BinOpToken::Add | BinOpToken::Sub)
            | Token::Word(Word::Keyword(
                Keyword::TypeOf | Keyword::Void | Keyword::Delete | Keyword::New | Keyword::Await,
            )) => {
                if self.after_operand {
                    self.reset_chain();
                }
                self.extend_chain();
                self.after_operand = false;
            }
            Token::Word(Word::Ident(..) | Word::Null | Word::True | Word::False)
            | Token::Word(Word::Keyword(Keyword::This | Keyword::Super))
            | Token::Str { .. }
            | Token::Num { .. }
            | Token::BigInt { .. }
            | Token::Regex(..) => {
                if self.after_operand {
                    self.reset_chain();
                }
                self.after_operand = true;
            }
            Token::BackQuote => self.after_operand = true,
            _ => self.after_operand = false,
        }
        self.depth > self.limit
    }

    fn extend_chain(&mut self) {
        if let Some(chain) = self.chains.last_mut() {
            *chain += 1;
            self.depth += 1;
        }
    }

    fn reset_chain(&mut self) {
        if let Some(chain) = self.chains.last_mut() {
            self.depth = self.depth.saturating_sub(*chain);
            *chain = 0;
        }
    }
}

fn starts_statement(keyword: &Keyword) -> bool {
    matches!(
        keyword,
        Keyword::Var
            | Keyword::Let
            | Keyword::Const
            | Keyword::Return
            | Keyword::If
            | Keyword::Else
            | Keyword::For
            | Keyword::While
            | Keyword::Do
            | Keyword::Switch
            | Keyword::Case
            | Keyword::Break
            | Keyword::Continue
            | Keyword::Throw
            | Keyword::Try
            | Keyword::Catch
            | Keyword::Finally
            | Keyword::With
            | Keyword::Debugger
    )
}

fn check_tree_nesting(script: &Script, limit: usize) -> Result<()> {
    let mut meter = TreeDepth {
        limit,
        depth: 0,
        exceeded_at: None,
    };
    script.visit_with(&mut meter);
    match meter.exceeded_at {
        Some(offset) => Err(ParseError::TooDeep { limit, offset }),
        None => Ok(()),
    }
}

/// Counts statement and expression nesting; stops descending at the limit.
struct TreeDepth {
    limit: usize,
    depth: usize,
    exceeded_at: Option<usize>,
}

impl TreeDepth {
    fn enter(&mut self, pos: BytePos, descend: impl FnOnce(&mut Self)) {
        if self.exceeded_at.is_some() {
            return;
        }
        self.depth += 1;
        if self.depth > self.limit {
            self.exceeded_at = Some(offset(pos));
        } else {
            descend(self);
        }
        self.depth -= 1;
    }
}

impl Visit for TreeDepth {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        self.enter(stmt.span().lo, |meter| stmt.visit_children_with(meter));
    }

    fn visit_expr(&mut self, expr: &Expr) {
        self.enter(expr.span().lo, |meter| expr.visit_children_with(meter));
    }
}
