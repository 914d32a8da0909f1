//! Trigger-condition parser.
//!
//! Conditions are single boolean expressions over one bound name,
//! `tool_output`:
//!
//! ```text
//! len(tool_output) > 0
//! isinstance(tool_output, dict) and tool_output.get('status') == 'error'
//! any('password' in str(v).lower() for v in tool_output.values())
//! 0 < tool_output['score'] <= 0.3 if isinstance(tool_output, dict) else False
//! ```
//!
//! Grammar (informal, lowest precedence first):
//! ```text
//! expr        = or_expr ["if" or_expr "else" expr]
//! or_expr     = and_expr ("or" and_expr)*
//! and_expr    = not_expr ("and" not_expr)*
//! not_expr    = "not" not_expr | comparison
//! comparison  = sum (CMP sum)*
//! CMP         = "==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "not" "in" | "is" | "is" "not"
//! sum         = term (("+" | "-") term)*
//! term        = unary (("*" | "/" | "//" | "%") unary)*
//! unary       = ("-" | "+") unary | power
//! power       = postfix ["**" unary]
//! postfix     = atom ( "(" args ")" | "[" subscript "]" | "." METHOD "(" args ")" )*
//! args        = [arg ("," arg)* [","]] | expr comp_for
//! arg         = expr | NAME "=" expr
//! atom        = NAME | NUMBER | STRING+ | "True" | "False" | "None"
//!             | "(" [expr ("," expr)* [","]] ")" | "(" expr comp_for ")"
//!             | "[" [expr ("," expr)* [","]] "]" | "[" expr comp_for "]"
//!             | "{" [expr ":" expr ("," expr ":" expr)* [","]] "}"
//! comp_for    = ("for" NAME ("," NAME)* "in" or_expr ("if" or_expr)*)+
//! ```
//!
//! There is no assignment, no lambda, no statement form, and no attribute
//! access other than the allow-listed method calls. Identifiers starting with
//! a double underscore are rejected outright.
//!
//! Nesting is bounded twice: while parsing, and once more on the finished
//! tree using the same measure the evaluator applies, so a condition that
//! parses never runs out of depth at evaluation time.

use crate::EvalError;
use crate::sandbox::EvalLimits;
use crate::value::Value;
use std::fmt;

/// A parsed condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Short-circuiting `and` / `or` over two or more operands.
    Logical {
        op: LogicalOp,
        operands: Vec<Expr>,
    },
    /// `a < b <= c`: each comparison shares its left operand with the
    /// previous one's right operand.
    Compare {
        left: Box<Expr>,
        comparisons: Vec<(CompareOp, Expr)>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    /// `element for ... in ... if ...`, with clauses nested left to right.
    Comprehension {
        element: Box<Expr>,
        clauses: Vec<Clause>,
    },
}

/// One `for targets in iter if filter...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub targets: Vec<String>,
    pub iter: Expr,
    pub filters: Vec<Expr>,
}

impl Expr {
    /// The operand a subscript, slice or method call applies to.
    pub(crate) fn postfix_target(&self) -> Option<&Expr> {
        match self {
            Expr::Index { target, .. } | Expr::Slice { target, .. } => Some(target.as_ref()),
            Expr::MethodCall { receiver, .. } => Some(receiver.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
            CompareOp::Is => "is",
            CompareOp::IsNot => "is not",
        }
    }
}

/// Pure methods callable on strings, dicts and lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Lower,
    Upper,
    Strip,
    Lstrip,
    Rstrip,
    StartsWith,
    EndsWith,
    Split,
    Count,
    Find,
    Replace,
    Get,
    Keys,
    Values,
    Items,
    Index,
}

impl Method {
    pub const ALL: [Method; 16] = [
        Method::Lower,
        Method::Upper,
        Method::Strip,
        Method::Lstrip,
        Method::Rstrip,
        Method::StartsWith,
        Method::EndsWith,
        Method::Split,
        Method::Count,
        Method::Find,
        Method::Replace,
        Method::Get,
        Method::Keys,
        Method::Values,
        Method::Items,
        Method::Index,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::Lower => "lower",
            Method::Upper => "upper",
            Method::Strip => "strip",
            Method::Lstrip => "lstrip",
            Method::Rstrip => "rstrip",
            Method::StartsWith => "startswith",
            Method::EndsWith => "endswith",
            Method::Split => "split",
            Method::Count => "count",
            Method::Find => "find",
            Method::Replace => "replace",
            Method::Get => "get",
            Method::Keys => "keys",
            Method::Values => "values",
            Method::Items => "items",
            Method::Index => "index",
        }
    }

    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

// ─── Tokenizer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,
    True,
    False,
    None,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Assign,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Name(n) => return write!(f, "'{n}'"),
            Token::Int(i) => return write!(f, "{i}"),
            Token::Float(x) => return write!(f, "{x}"),
            Token::Str(_) => "string literal",
            Token::And => "'and'",
            Token::Or => "'or'",
            Token::Not => "'not'",
            Token::In => "'in'",
            Token::Is => "'is'",
            Token::If => "'if'",
            Token::Else => "'else'",
            Token::For => "'for'",
            Token::True => "'True'",
            Token::False => "'False'",
            Token::None => "'None'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::Comma => "','",
            Token::Colon => "':'",
            Token::Dot => "'.'",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::DoubleStar => "'**'",
            Token::Slash => "'/'",
            Token::DoubleSlash => "'//'",
            Token::Percent => "'%'",
            Token::EqEq => "'=='",
            Token::NotEq => "'!='",
            Token::Lt => "'<'",
            Token::Gt => "'>'",
            Token::Le => "'<='",
            Token::Ge => "'>='",
            Token::Assign => "'='",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

/// Keywords that only make sense in statements or function definitions.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "lambda", "import", "from", "as", "def", "class", "del", "global", "nonlocal", "yield",
    "await", "async", "return", "pass", "raise", "try", "except", "finally", "while", "with",
    "assert", "break", "continue", "elif",
];

fn syntax(offset: usize, message: impl Into<String>) -> EvalError {
    EvalError::Syntax {
        offset,
        message: message.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Spanned>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let token = match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
                continue;
            }
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | ':' | '+' | '-' | '%' => {
                chars.next();
                match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ',' => Token::Comma,
                    ':' => Token::Colon,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    _ => Token::Percent,
                }
            }
            '*' => {
                chars.next();
                if chars.next_if(|&(_, n)| n == '*').is_some() {
                    Token::DoubleStar
                } else {
                    Token::Star
                }
            }
            '/' => {
                chars.next();
                if chars.next_if(|&(_, n)| n == '/').is_some() {
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            '<' => {
                chars.next();
                if chars.next_if(|&(_, n)| n == '=').is_some() {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                chars.next();
                if chars.next_if(|&(_, n)| n == '=').is_some() {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '=' => {
                chars.next();
                if chars.next_if(|&(_, n)| n == '=').is_some() {
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            '!' => {
                chars.next();
                if chars.next_if(|&(_, n)| n == '=').is_none() {
                    return Err(syntax(offset, "unexpected character '!'"));
                }
                Token::NotEq
            }
            '"' | '\'' => {
                chars.next();
                let quote = c;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\\')) => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, 'r')) => s.push('\r'),
                            Some((_, '0')) => s.push('\0'),
                            Some((_, escaped @ ('\\' | '\'' | '"'))) => s.push(escaped),
                            Some((_, other)) => {
                                s.push('\\');
                                s.push(other);
                            }
                            None => return Err(syntax(offset, "unterminated string literal")),
                        },
                        Some((_, ch)) if ch == quote => break,
                        Some((_, ch)) => s.push(ch),
                        None => return Err(syntax(offset, "unterminated string literal")),
                    }
                }
                Token::Str(s)
            }
            '.' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, n)| n.is_ascii_digit()) {
                    lex_number(input, offset, &mut chars)?
                } else {
                    Token::Dot
                }
            }
            _ if c.is_ascii_digit() => lex_number(input, offset, &mut chars)?,
            _ if c.is_alphabetic() || c == '_' => {
                let mut end = offset;
                while let Some(&(i, wc)) = chars.peek() {
                    if wc.is_alphanumeric() || wc == '_' {
                        end = i + wc.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &input[offset..end];
                if word.starts_with("__") {
                    return Err(EvalError::Forbidden(word.to_string()));
                }
                if UNSUPPORTED_KEYWORDS.contains(&word) {
                    return Err(syntax(
                        offset,
                        format!("'{word}' is not supported in conditions"),
                    ));
                }
                match word {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "is" => Token::Is,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "for" => Token::For,
                    "True" => Token::True,
                    "False" => Token::False,
                    "None" => Token::None,
                    _ => Token::Name(word.to_string()),
                }
            }
            _ => return Err(syntax(offset, format!("unexpected character '{c}'"))),
        };
        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

/// Lex a numeric literal starting at `start`. A leading `.` has already been
/// consumed when the literal is of the form `.5`.
fn lex_number(
    input: &str,
    start: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<Token, EvalError> {
    let mut is_float = input[start..].starts_with('.');
    let mut end = start + 1;
    let mut seen_exponent = false;

    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() || c == '_' {
            chars.next();
            end = i + 1;
        } else if c == '.' && !is_float && !seen_exponent {
            // `1.` and `1.5` are floats; `1.lower()` is not.
            let rest = &input[i + 1..];
            if rest.starts_with(|n: char| n.is_alphabetic() || n == '_') {
                break;
            }
            is_float = true;
            chars.next();
            end = i + 1;
        } else if (c == 'e' || c == 'E') && !seen_exponent {
            let rest = &input[i + 1..];
            let exponent_digits = rest
                .strip_prefix(['+', '-'])
                .unwrap_or(rest)
                .starts_with(|n: char| n.is_ascii_digit());
            if !exponent_digits {
                break;
            }
            seen_exponent = true;
            is_float = true;
            chars.next();
            end = i + 1;
            if let Some((j, _)) = chars.next_if(|&(_, s)| s == '+' || s == '-') {
                end = j + 1;
            }
        } else {
            break;
        }
    }

    let literal: String = input[start..end].chars().filter(|&c| c != '_').collect();
    if is_float {
        literal
            .parse::<f64>()
            .map(Token::Float)
            .map_err(|_| syntax(start, format!("invalid number: {literal}")))
    } else {
        literal
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| syntax(start, format!("integer literal out of range: {literal}")))
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

/// Parse a trigger condition into an [`Expr`] tree, enforcing the length and
/// nesting limits.
pub fn parse_expression(input: &str, limits: &EvalLimits) -> Result<Expr, EvalError> {
    if input.len() > limits.max_expression_len {
        return Err(EvalError::TooLong {
            len: input.len(),
            limit: limits.max_expression_len,
        });
    }
    if input.trim().is_empty() {
        return Err(syntax(0, "empty expression"));
    }
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        max_depth: limits.max_depth,
        end: input.len(),
    };
    let expr = parser.parse_expr()?;
    match parser.peek() {
        None => {}
        Some(Token::Assign) => {
            return Err(parser.error("assignment is not allowed in conditions"));
        }
        Some(extra) => {
            return Err(parser.error(format!("unexpected {extra} after expression")));
        }
    }
    if eval_depth(&expr) > limits.max_depth {
        return Err(EvalError::TooDeep(limits.max_depth));
    }
    Ok(expr)
}

/// How deep the evaluator recurses on `expr`. A chain of binary operators
/// or of subscripts and method calls is walked in a loop, so it counts as a
/// single level however long it is.
pub(crate) fn eval_depth(expr: &Expr) -> usize {
    let children: Vec<&Expr> = match expr {
        Expr::Literal(_) | Expr::Name(_) => Vec::new(),
        Expr::List(items) => items.iter().collect(),
        Expr::Dict(entries) => entries.iter().flat_map(|(k, v)| [k, v]).collect(),
        Expr::Unary { operand, .. } => vec![operand.as_ref()],
        Expr::Binary { .. } => {
            let mut operands = Vec::new();
            let mut node = expr;
            while let Expr::Binary { left, right, .. } = node {
                operands.push(right.as_ref());
                node = left.as_ref();
            }
            operands.push(node);
            operands
        }
        Expr::Logical { operands, .. } => operands.iter().collect(),
        Expr::Compare { left, comparisons } => std::iter::once(left.as_ref())
            .chain(comparisons.iter().map(|(_, e)| e))
            .collect(),
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => vec![condition.as_ref(), then.as_ref(), otherwise.as_ref()],
        Expr::Call { args, kwargs, .. } => {
            args.iter().chain(kwargs.iter().map(|(_, e)| e)).collect()
        }
        Expr::Index { .. } | Expr::Slice { .. } | Expr::MethodCall { .. } => {
            let mut operands = Vec::new();
            let mut node = expr;
            while let Some(target) = node.postfix_target() {
                match node {
                    Expr::Index { index, .. } => operands.push(index.as_ref()),
                    Expr::Slice {
                        start, stop, step, ..
                    } => {
                        let bounds = [start, stop, step].into_iter().flatten();
                        operands.extend(bounds.map(Box::as_ref));
                    }
                    Expr::MethodCall { args, kwargs, .. } => {
                        operands.extend(args.iter().chain(kwargs.iter().map(|(_, e)| e)));
                    }
                    _ => {}
                }
                node = target;
            }
            operands.push(node);
            operands
        }
        Expr::Comprehension { element, clauses } => std::iter::once(element.as_ref())
            .chain(
                clauses
                    .iter()
                    .flat_map(|c| std::iter::once(&c.iter).chain(&c.filters)),
            )
            .collect(),
    };
    1 + children.into_iter().map(eval_depth).max().unwrap_or(0)
}

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    depth: usize,
    max_depth: usize,
    end: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), EvalError> {
        if self.eat(expected) {
            Ok(())
        } else {
            let found = match self.peek() {
                Some(tok) => tok.to_string(),
                None => "end of expression".into(),
            };
            Err(self.error(format!("expected {expected}, found {found}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> EvalError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.end);
        syntax(offset, message)
    }

    /// Run `f` one nesting level deeper, failing once the limit is crossed.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(EvalError::TooDeep(self.max_depth));
        }
        let out = f(self);
        self.depth -= 1;
        out
    }

    // expr = or_expr ["if" or_expr "else" expr]
    fn parse_expr(&mut self) -> Result<Expr, EvalError> {
        self.nested(|p| {
            let body = p.parse_or()?;
            if !p.eat(&Token::If) {
                return Ok(body);
            }
            let condition = p.parse_or()?;
            p.expect(&Token::Else)?;
            let otherwise = p.parse_expr()?;
            Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(body),
                otherwise: Box::new(otherwise),
            })
        })
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_and()?;
        let mut operands = vec![first];
        while self.eat(&Token::Or) {
            operands.push(self.parse_and()?);
        }
        Ok(logical(LogicalOp::Or, operands))
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_not()?;
        let mut operands = vec![first];
        while self.eat(&Token::And) {
            operands.push(self.parse_not()?);
        }
        Ok(logical(LogicalOp::And, operands))
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Not) {
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let left = self.parse_sum()?;
        let mut comparisons = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => CompareOp::Eq,
                Some(Token::NotEq) => CompareOp::NotEq,
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                Some(Token::In) => CompareOp::In,
                Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                    self.pos += 1;
                    CompareOp::NotIn
                }
                Some(Token::Is) if self.peek_at(1) == Some(&Token::Not) => {
                    self.pos += 1;
                    CompareOp::IsNot
                }
                Some(Token::Is) => CompareOp::Is,
                _ => break,
            };
            self.pos += 1;
            comparisons.push((op, self.parse_sum()?));
        }
        if comparisons.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                comparisons,
            })
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, EvalError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::DoubleStar) {
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    let function = match &expr {
                        Expr::Name(name) => name.clone(),
                        _ => return Err(self.error("only built-in functions can be called")),
                    };
                    self.pos += 1;
                    let (args, kwargs) = self.parse_args()?;
                    expr = Expr::Call {
                        function,
                        args,
                        kwargs,
                    };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    expr = self.parse_subscript(expr)?;
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = match self.advance() {
                        Some(Token::Name(name)) => name,
                        _ => return Err(self.error("expected a method name after '.'")),
                    };
                    let Some(method) = Method::lookup(name) else {
                        return Err(EvalError::Forbidden(format!(".{name}")));
                    };
                    if self.peek() != Some(&Token::LParen) {
                        return Err(EvalError::Forbidden(format!(".{name}")));
                    }
                    self.pos += 1;
                    let (args, kwargs) = self.parse_args()?;
                    expr = Expr::MethodCall {
                        receiver: Box::new(expr),
                        method,
                        args,
                        kwargs,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Arguments after an opening `(`, through the closing `)`. A lone
    /// generator argument (`any(x for x in xs)`) becomes a comprehension.
    /// Keyword arguments follow every positional one.
    fn parse_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), EvalError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.eat(&Token::RParen) {
            if let (Some(Token::Name(name)), Some(Token::Assign)) = (self.peek(), self.peek_at(1)) {
                if kwargs.iter().any(|(seen, _)| seen == name) {
                    return Err(self.error(format!("keyword argument repeated: {name}")));
                }
                self.pos += 2;
                kwargs.push((name.clone(), self.parse_expr()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                let arg = self.parse_expr()?;
                if self.peek() == Some(&Token::For) {
                    if !args.is_empty() {
                        return Err(self.error("generator argument must be parenthesized"));
                    }
                    let generator = self.parse_comprehension(arg)?;
                    self.expect(&Token::RParen)?;
                    return Ok((vec![generator], kwargs));
                }
                args.push(arg);
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen)?;
                break;
            }
        }
        Ok((args, kwargs))
    }

    fn parse_subscript(&mut self, target: Expr) -> Result<Expr, EvalError> {
        let start = if self.peek() == Some(&Token::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        if !self.eat(&Token::Colon) {
            self.expect(&Token::RBracket)?;
            let index = start.ok_or_else(|| self.error("empty subscript"))?;
            return Ok(Expr::Index {
                target: Box::new(target),
                index,
            });
        }
        let stop = match self.peek() {
            Some(Token::Colon | Token::RBracket) => None,
            _ => Some(Box::new(self.parse_expr()?)),
        };
        let step = if self.eat(&Token::Colon) && self.peek() != Some(&Token::RBracket) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(&Token::RBracket)?;
        Ok(Expr::Slice {
            target: Box::new(target),
            start,
            stop,
            step,
        })
    }

    // comp_for = ("for" NAME ("," NAME)* "in" or_expr ("if" or_expr)*)+
    fn parse_comprehension(&mut self, element: Expr) -> Result<Expr, EvalError> {
        let mut clauses = Vec::new();
        while self.eat(&Token::For) {
            // Each clause is one more loop the evaluator nests.
            if clauses.len() >= self.max_depth {
                return Err(EvalError::TooDeep(self.max_depth));
            }
            clauses.push(self.parse_clause()?);
        }
        if clauses.is_empty() {
            return Err(self.error("expected 'for'"));
        }
        Ok(Expr::Comprehension {
            element: Box::new(element),
            clauses,
        })
    }

    fn parse_clause(&mut self) -> Result<Clause, EvalError> {
        let parenthesized = self.eat(&Token::LParen);
        let mut targets = Vec::new();
        loop {
            match self.advance() {
                Some(Token::Name(name)) => targets.push(name.clone()),
                _ => return Err(self.error("expected a loop variable name")),
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        if parenthesized {
            self.expect(&Token::RParen)?;
        }
        self.expect(&Token::In)?;
        let iter = self.nested(Self::parse_or)?;
        let mut filters = Vec::new();
        while self.eat(&Token::If) {
            filters.push(self.nested(Self::parse_or)?);
        }
        Ok(Clause {
            targets,
            iter,
            filters,
        })
    }

    fn parse_atom(&mut self) -> Result<Expr, EvalError> {
        let Some(token) = self.advance() else {
            return Err(self.error("unexpected end of expression"));
        };
        match token {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(*i))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(*f))),
            Token::Str(s) => {
                // Adjacent string literals concatenate.
                let mut text = s.clone();
                while let Some(Token::Str(next)) = self.peek() {
                    text.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Literal(Value::Str(text)))
            }
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::None => Ok(Expr::Literal(Value::None)),
            Token::Name(name) => Ok(Expr::Name(name.clone())),
            Token::LParen => self.nested(|p| {
                if p.eat(&Token::RParen) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = p.parse_expr()?;
                if p.peek() == Some(&Token::For) {
                    let generator = p.parse_comprehension(first)?;
                    p.expect(&Token::RParen)?;
                    return Ok(generator);
                }
                if !p.eat(&Token::Comma) {
                    p.expect(&Token::RParen)?;
                    return Ok(first);
                }
                let mut items = vec![first];
                while p.peek() != Some(&Token::RParen) {
                    items.push(p.parse_expr()?);
                    if !p.eat(&Token::Comma) {
                        break;
                    }
                }
                p.expect(&Token::RParen)?;
                Ok(Expr::List(items))
            }),
            Token::LBracket => self.nested(|p| {
                if p.eat(&Token::RBracket) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = p.parse_expr()?;
                if p.peek() == Some(&Token::For) {
                    let comprehension = p.parse_comprehension(first)?;
                    p.expect(&Token::RBracket)?;
                    return Ok(comprehension);
                }
                let mut items = vec![first];
                while p.eat(&Token::Comma) {
                    if p.peek() == Some(&Token::RBracket) {
                        break;
                    }
                    items.push(p.parse_expr()?);
                }
                p.expect(&Token::RBracket)?;
                Ok(Expr::List(items))
            }),
            Token::LBrace => self.nested(|p| {
                let mut entries = Vec::new();
                while p.peek() != Some(&Token::RBrace) {
                    let key = p.parse_expr()?;
                    if p.peek() != Some(&Token::Colon) {
                        return Err(
                            p.error("only dict literals of the form {key: value} are supported")
                        );
                    }
                    p.pos += 1;
                    let value = p.parse_expr()?;
                    if p.peek() == Some(&Token::For) {
                        return Err(p.error("dict comprehensions are not supported"));
                    }
                    entries.push((key, value));
                    if !p.eat(&Token::Comma) {
                        break;
                    }
                }
                p.expect(&Token::RBrace)?;
                Ok(Expr::Dict(entries))
            }),
            other => {
                self.pos -= 1;
                Err(self.error(format!("unexpected {other}")))
            }
        }
    }
}

fn logical(op: LogicalOp, mut operands: Vec<Expr>) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        Expr::Logical { op, operands }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Expr, EvalError> {
        parse_expression(input, &EvalLimits::default())
    }

    #[test]
    fn parse_simple_comparison() {
        let expr = parse("len(tool_output) > 0").unwrap();
        let Expr::Compare { left, comparisons } = expr else {
            panic!("expected comparison");
        };
        assert!(matches!(*left, Expr::Call { ref function, .. } if function == "len"));
        assert_eq!(comparisons.len(), 1);
        assert_eq!(comparisons[0].0, CompareOp::Gt);
        assert_eq!(comparisons[0].1, Expr::Literal(Value::Int(0)));
    }

    #[test]
    fn boolean_operators_flatten() {
        let expr = parse("a or b or c and d").unwrap();
        let Expr::Logical { op, operands } = expr else {
            panic!("expected logical");
        };
        assert_eq!(op, LogicalOp::Or);
        assert_eq!(operands.len(), 3);
        assert!(matches!(operands[2], Expr::Logical { op: LogicalOp::And, .. }));
    }

    #[test]
    fn not_in_and_is_not() {
        let expr = parse("'x' not in tool_output and tool_output is not None").unwrap();
        let Expr::Logical { operands, .. } = expr else {
            panic!("expected logical");
        };
        assert!(matches!(
            &operands[0],
            Expr::Compare { comparisons, .. } if comparisons[0].0 == CompareOp::NotIn
        ));
        assert!(matches!(
            &operands[1],
            Expr::Compare { comparisons, .. } if comparisons[0].0 == CompareOp::IsNot
        ));
    }

    #[test]
    fn chained_comparison() {
        let expr = parse("0 < x <= 10").unwrap();
        assert!(matches!(expr, Expr::Compare { comparisons, .. } if comparisons.len() == 2));
    }

    #[test]
    fn precedence_of_arithmetic() {
        let expr = parse("1 + 2 * 3 ** 2").unwrap();
        let Expr::Binary { op: BinaryOp::Add, right, .. } = expr else {
            panic!("expected addition at the root");
        };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn method_call_and_subscripts() {
        assert!(matches!(
            parse("tool_output.get('status')").unwrap(),
            Expr::MethodCall { method: Method::Get, .. }
        ));
        assert!(matches!(parse("tool_output['a'][0]").unwrap(), Expr::Index { .. }));
        assert!(matches!(
            parse("tool_output[1:]").unwrap(),
            Expr::Slice { start: Some(_), stop: None, step: None, .. }
        ));
        assert!(matches!(
            parse("tool_output[::2]").unwrap(),
            Expr::Slice { start: None, stop: None, step: Some(_), .. }
        ));
    }

    #[test]
    fn generator_argument_and_comprehension() {
        let expr = parse("any(v > 1 for v in tool_output)").unwrap();
        let Expr::Call { args, .. } = expr else {
            panic!("expected call");
        };
        assert!(
            matches!(&args[0], Expr::Comprehension { clauses, .. } if clauses[0].targets == ["v"])
        );

        let expr = parse("[k for k, v in tool_output.items() if v]").unwrap();
        let Expr::Comprehension { clauses, .. } = expr else {
            panic!("expected comprehension");
        };
        assert_eq!(clauses[0].targets, ["k", "v"]);
        assert_eq!(clauses[0].filters.len(), 1);
    }

    #[test]
    fn several_for_clauses() {
        let expr = parse("[c for s in tool_output if s for c in s]").unwrap();
        let Expr::Comprehension { clauses, .. } = expr else {
            panic!("expected comprehension");
        };
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].filters.len(), 1);
        assert_eq!(clauses[1].iter, Expr::Name("s".into()));
        assert!(clauses[1].filters.is_empty());
    }

    #[test]
    fn keyword_arguments() {
        let Expr::Call { args, kwargs, .. } = parse("max(tool_output, default=0)").unwrap() else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        assert_eq!(kwargs, [("default".to_string(), Expr::Literal(Value::Int(0)))]);
        assert!(matches!(
            parse("tool_output.split(sep=',', maxsplit=1)").unwrap(),
            Expr::MethodCall { kwargs, .. } if kwargs.len() == 2
        ));

        assert!(matches!(parse("max(default=0, x)"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("max(x, key=len, key=abs)"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("max(x, y for y in z)"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("max(x=)"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn conditional_expression() {
        assert!(matches!(
            parse("1 if tool_output else 0").unwrap(),
            Expr::Conditional { .. }
        ));
    }

    #[test]
    fn literals() {
        assert_eq!(parse("1_000").unwrap(), Expr::Literal(Value::Int(1000)));
        assert_eq!(parse("1.5e3").unwrap(), Expr::Literal(Value::Float(1500.0)));
        assert_eq!(parse(".5").unwrap(), Expr::Literal(Value::Float(0.5)));
        assert_eq!(
            parse(r#"'it\'s' " ok""#).unwrap(),
            Expr::Literal(Value::Str("it's ok".into()))
        );
        assert!(matches!(parse("(1, 2)").unwrap(), Expr::List(items) if items.len() == 2));
        assert!(matches!(
            parse("{'a': 1, 'b': 2}").unwrap(),
            Expr::Dict(entries) if entries.len() == 2
        ));
    }

    #[test]
    fn dunder_names_are_forbidden() {
        assert_eq!(
            parse("__import__('os').system('ls')"),
            Err(EvalError::Forbidden("__import__".into()))
        );
        assert!(matches!(
            parse("tool_output.__class__"),
            Err(EvalError::Forbidden(_))
        ));
    }

    #[test]
    fn attribute_access_is_forbidden() {
        assert_eq!(
            parse("tool_output.system('ls')"),
            Err(EvalError::Forbidden(".system".into()))
        );
        // Allow-listed names still need to be called.
        assert_eq!(
            parse("tool_output.get"),
            Err(EvalError::Forbidden(".get".into()))
        );
    }

    #[test]
    fn statements_are_rejected() {
        assert!(matches!(parse("x = 1"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("lambda: 1"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("import os"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("1; 2"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn only_names_are_callable() {
        assert!(matches!(parse("[len][0](x)"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("len(x)(y)"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn invalid_syntax_rejects() {
        assert!(matches!(parse("invalid syntax here"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("len(tool_output"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("'unterminated"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse(""), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("{1, 2}"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn length_limit_enforced() {
        let limits = EvalLimits {
            max_expression_len: 8,
            ..EvalLimits::default()
        };
        assert_eq!(
            parse_expression("len(tool_output) > 0", &limits),
            Err(EvalError::TooLong { len: 20, limit: 8 })
        );
    }

    #[test]
    fn depth_is_measured_as_evaluated() {
        let long_sum = vec!["x"; 200].join(" + ");
        assert_eq!(eval_depth(&parse(&long_sum).unwrap()), 2);
        let path = format!("x{}", "['a']".repeat(200));
        assert_eq!(eval_depth(&parse(&path).unwrap()), 2);

        let limits = EvalLimits {
            max_depth: 5,
            ..EvalLimits::default()
        };
        assert_eq!(
            parse_expression("a or b and c < d + e * f ** g[0]", &limits),
            Err(EvalError::TooDeep(5))
        );
        assert!(parse_expression("a + b + c + d + e + f + g + h", &limits).is_ok());
    }

    #[test]
    fn depth_limit_enforced() {
        let limits = EvalLimits {
            max_depth: 10,
            ..EvalLimits::default()
        };
        let deep = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(parse_expression(&deep, &limits), Err(EvalError::TooDeep(10)));
        assert_eq!(parse_expression(&"not ".repeat(20), &limits), Err(EvalError::TooDeep(10)));
        assert!(parse_expression("((1))", &limits).is_ok());
    }
}
