//! A tokenizer and literal-expression parser for setup scripts.
//!
//! Only as much of the language is understood as is needed to read literal
//! values: strings (with prefixes, escapes, triple quotes, implicit
//! concatenation), numbers, `True`/`False`/`None`, lists, tuples, dicts,
//! names, attribute access, calls and `+`. Everything else parses as
//! [`Expr::Opaque`] and can never be evaluated.

use std::collections::HashMap;

use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Name(String),
    Str(String),
    /// A formatted string literal; its value depends on runtime state.
    FStr,
    Number(String),
    Op(&'static str),
    /// End of a logical line (only emitted outside brackets).
    Newline,
}

/// Longest first, so `==` wins over `=`.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "**", "//", "==", "!=", "<=", ">=", "->", ":=", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", "@=", ">>", "<<", "(", ")", "[", "]", "{", "}", ",", ":",
    ".", ";", "@", "=", "+", "-", "*", "/", "%", "&", "|", "^", "~", "<", ">", "!",
];

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    Lexer {
        src,
        pos: 0,
        depth: 0,
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn newline(&mut self) {
        if self.depth == 0 && !matches!(self.tokens.last(), None | Some(Token::Newline)) {
            self.tokens.push(Token::Newline);
        }
    }

    fn run(mut self) -> Result<Vec<Token>, String> {
        while let Some(ch) = self.peek() {
            match ch {
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '\\' if matches!(self.peek_second(), Some('\n' | '\r')) => {
                    self.bump();
                    if self.bump() == Some('\r') && self.peek() == Some('\n') {
                        self.bump();
                    }
                }
                '\n' => {
                    self.bump();
                    self.newline();
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '"' | '\'' => {
                    let s = self.string(false)?;
                    self.tokens.push(Token::Str(s));
                }
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_second().is_some_and(|d| d.is_ascii_digit())) =>
                {
                    let start = self.pos;
                    while self
                        .peek()
                        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                    {
                        self.bump();
                    }
                    self.tokens
                        .push(Token::Number(self.src[start..self.pos].to_string()));
                }
                c if c.is_alphabetic() || c == '_' => {
                    let src = self.src;
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                        self.bump();
                    }
                    let ident = &src[start..self.pos];
                    let is_prefix = ident.len() <= 2
                        && ident.chars().all(|c| "rRbBuUfF".contains(c))
                        && matches!(self.peek(), Some('"' | '\''));
                    if is_prefix {
                        let raw = ident.contains(['r', 'R']);
                        let formatted = ident.contains(['f', 'F']);
                        let s = self.string(raw)?;
                        self.tokens
                            .push(if formatted { Token::FStr } else { Token::Str(s) });
                    } else {
                        self.tokens.push(Token::Name(ident.to_string()));
                    }
                }
                _ => {
                    let op = OPERATORS
                        .iter()
                        .find(|op| self.rest().starts_with(**op))
                        .copied()
                        .ok_or_else(|| format!("unexpected character '{ch}' at byte {}", self.pos))?;
                    self.pos += op.len();
                    match op {
                        "(" | "[" | "{" => self.depth += 1,
                        ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
                        _ => {}
                    }
                    self.tokens.push(Token::Op(op));
                }
            }
        }
        self.newline();
        Ok(self.tokens)
    }

    fn string(&mut self, raw: bool) -> Result<String, String> {
        let start = self.pos;
        let quote = self.bump().ok_or("expected a quote")?;
        let triple = self.rest().starts_with(quote) && self.rest()[quote.len_utf8()..].starts_with(quote);
        if triple {
            self.bump();
            self.bump();
        }
        let mut out = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(format!("unterminated string starting at byte {start}"));
            };
            if ch == quote {
                if !triple {
                    return Ok(out);
                }
                if self.rest().starts_with(quote) && self.rest()[quote.len_utf8()..].starts_with(quote) {
                    self.bump();
                    self.bump();
                    return Ok(out);
                }
                out.push(ch);
                continue;
            }
            if ch == '\n' && !triple {
                return Err(format!("unterminated string starting at byte {start}"));
            }
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            let Some(next) = self.bump() else {
                return Err(format!("unterminated string starting at byte {start}"));
            };
            if raw {
                out.push('\\');
                out.push(next);
                continue;
            }
            match next {
                '\n' => {}
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                '\\' | '\'' | '"' => out.push(next),
                'x' => self.hex_escape(2, &mut out, next),
                'u' => self.hex_escape(4, &mut out, next),
                'U' => self.hex_escape(8, &mut out, next),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn hex_escape(&mut self, digits: usize, out: &mut String, letter: char) {
        let hex: String = self.rest().chars().take(digits).collect();
        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
            Some(c) if hex.len() == digits => {
                self.pos += hex.len();
                out.push(c);
            }
            _ => {
                out.push('\\');
                out.push(letter);
            }
        }
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Name(String),
    Attribute(Box<Expr>, String),
    Call(Box<Expr>, Vec<Arg>),
    Add(Box<Expr>, Box<Expr>),
    /// Something outside the literal subset, described for diagnostics.
    Opaque(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
    Star(Expr),
    DoubleStar(Expr),
}

impl Expr {
    /// Evaluate a literal expression. Names are looked up in `env`;
    /// calls, attribute reads and opaque constructs are refused.
    pub(crate) fn evaluate(&self, env: &HashMap<String, Value>) -> Result<Value, String> {
        match self {
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Int(n) => Ok(Value::from(*n)),
            Expr::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| format!("non-finite number {f}")),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::Null),
            Expr::List(items) | Expr::Tuple(items) => items
                .iter()
                .map(|item| item.evaluate(env))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Dict(pairs) => {
                let mut map = Map::new();
                for (key, value) in pairs {
                    let key = match key.evaluate(env)? {
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        other => return Err(format!("unsupported dict key {other}")),
                    };
                    map.insert(key, value.evaluate(env)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Name(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| format!("name '{name}' is not bound to a literal")),
            Expr::Add(left, right) => match (left.evaluate(env)?, right.evaluate(env)?) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                (Value::Array(mut a), Value::Array(b)) => {
                    a.extend(b);
                    Ok(Value::Array(a))
                }
                _ => Err("'+' on mismatched operands".to_string()),
            },
            Expr::Attribute(_, attr) => Err(format!("attribute read '.{attr}'")),
            Expr::Call(..) => Err(format!("call to {}", self.describe())),
            Expr::Opaque(what) => Err(what.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Expr::Name(name) => name.clone(),
            Expr::Attribute(base, attr) => format!("{}.{attr}", base.describe()),
            Expr::Call(func, _) => format!("{}()", func.describe()),
            _ => "(...)".to_string(),
        }
    }
}

/// Deepest expression nesting the parser follows.
const MAX_NESTING: usize = 200;

/// Recursive-descent parser over a token slice.
pub(crate) struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
    /// Set once nesting passed [`MAX_NESTING`]; the whole parse then fails.
    too_deep: bool,
}

impl<'t> Parser<'t> {
    pub(crate) fn new(tokens: &'t [Token], pos: usize) -> Self {
        Self {
            tokens,
            pos,
            depth: 0,
            too_deep: false,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(Token::Op(o)) if *o == op)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Parse an expression that must fill the rest of its logical line.
    pub(crate) fn line_expression(&mut self) -> Option<Expr> {
        let expr = self.expression()?;
        match self.peek() {
            _ if self.too_deep => None,
            None | Some(Token::Newline) | Some(Token::Op(";")) => Some(expr),
            _ => None,
        }
    }

    /// Parse call arguments; the parser must be positioned on the `(`.
    pub(crate) fn call_arguments(&mut self) -> Option<Vec<Arg>> {
        if !self.eat_op("(") {
            return None;
        }
        let mut args = Vec::new();
        loop {
            if self.eat_op(")") {
                return (!self.too_deep).then_some(args);
            }
            self.peek()?;
            let arg = if self.eat_op("**") {
                Arg::DoubleStar(self.element(&[")"]))
            } else if self.eat_op("*") {
                Arg::Star(self.element(&[")"]))
            } else if let (Some(Token::Name(name)), Some(Token::Op("="))) =
                (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
            {
                let name = name.clone();
                self.pos += 2;
                Arg::Keyword(name, self.element(&[")"]))
            } else {
                Arg::Positional(self.element(&[")"]))
            };
            args.push(arg);
            if !self.eat_op(",") && !self.at_op(")") {
                return None;
            }
        }
    }

    fn expression(&mut self) -> Option<Expr> {
        if self.too_deep || self.depth >= MAX_NESTING {
            self.too_deep = true;
            return None;
        }
        self.depth += 1;
        let expr = self.sum();
        self.depth -= 1;
        expr
    }

    fn sum(&mut self) -> Option<Expr> {
        let mut left = self.postfix()?;
        while self.eat_op("+") {
            let right = self.postfix()?;
            left = Expr::Add(Box::new(left), Box::new(right));
        }
        Some(left)
    }

    fn postfix(&mut self) -> Option<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.at_op("(") {
                let args = self.call_arguments()?;
                expr = Expr::Call(Box::new(expr), args);
            } else if self.at_op(".") {
                match self.tokens.get(self.pos + 1) {
                    Some(Token::Name(attr)) => {
                        let attr = attr.clone();
                        self.pos += 2;
                        expr = Expr::Attribute(Box::new(expr), attr);
                    }
                    _ => return None,
                }
            } else if self.eat_op("[") {
                self.skip_until(&["]"]);
                if !self.eat_op("]") {
                    return None;
                }
                expr = Expr::Opaque("subscript".to_string());
            } else {
                return Some(expr);
            }
        }
    }

    fn atom(&mut self) -> Option<Expr> {
        let token = self.peek()?.clone();
        match token {
            Token::Str(_) | Token::FStr => {
                let mut out = String::new();
                let mut formatted = false;
                while let Some(tok) = self.peek() {
                    match tok {
                        Token::Str(s) => out.push_str(s),
                        Token::FStr => formatted = true,
                        _ => break,
                    }
                    self.pos += 1;
                }
                Some(if formatted {
                    Expr::Opaque("f-string".to_string())
                } else {
                    Expr::Str(out)
                })
            }
            Token::Number(text) => {
                self.pos += 1;
                Some(parse_number(&text))
            }
            Token::Name(name) => {
                self.pos += 1;
                match name.as_str() {
                    "True" => Some(Expr::Bool(true)),
                    "False" => Some(Expr::Bool(false)),
                    "None" => Some(Expr::None),
                    "lambda" | "not" | "await" | "yield" | "if" | "else" | "for" | "in" | "and"
                    | "or" | "is" => None,
                    _ => Some(Expr::Name(name)),
                }
            }
            Token::Op("-") => {
                let mut negate = false;
                while self.eat_op("-") {
                    negate = !negate;
                }
                match self.atom()? {
                    Expr::Int(n) if negate => Some(Expr::Int(n.checked_neg()?)),
                    Expr::Float(f) if negate => Some(Expr::Float(-f)),
                    number @ (Expr::Int(_) | Expr::Float(_)) => Some(number),
                    _ => None,
                }
            }
            Token::Op("(") => {
                self.pos += 1;
                let (mut items, trailing_comma) = self.sequence(")")?;
                if items.len() == 1 && !trailing_comma {
                    items.pop()
                } else {
                    Some(Expr::Tuple(items))
                }
            }
            Token::Op("[") => {
                self.pos += 1;
                let (items, _) = self.sequence("]")?;
                Some(Expr::List(items))
            }
            Token::Op("{") => {
                self.pos += 1;
                self.dict()
            }
            _ => None,
        }
    }

    /// Comma-separated elements up to and including `close`.
    fn sequence(&mut self, close: &'static str) -> Option<(Vec<Expr>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.eat_op(close) {
                return Some((items, trailing_comma));
            }
            self.peek()?;
            items.push(self.element(&[close]));
            trailing_comma = self.eat_op(",");
            if !trailing_comma && !self.at_op(close) {
                return None;
            }
        }
    }

    fn dict(&mut self) -> Option<Expr> {
        let mut pairs = Vec::new();
        loop {
            if self.eat_op("}") {
                return Some(Expr::Dict(pairs));
            }
            self.peek()?;
            if self.eat_op("**") {
                self.element(&["}"]);
                pairs.push((
                    Expr::Opaque("dict unpacking".to_string()),
                    Expr::Opaque("dict unpacking".to_string()),
                ));
            } else {
                let key = self.element(&[":", "}"]);
                if !self.eat_op(":") {
                    self.skip_until(&["}"]);
                    self.eat_op("}");
                    return Some(Expr::Opaque("set literal".to_string()));
                }
                let value = self.element(&["}"]);
                pairs.push((key, value));
            }
            if !self.eat_op(",") && !self.at_op("}") {
                return None;
            }
        }
    }

    /// One element of a bracketed list. If it is not a plain expression the
    /// tokens up to the next separator are skipped and the element is opaque.
    fn element(&mut self, closers: &[&str]) -> Expr {
        let start = self.pos;
        if let Some(expr) = self.expression() {
            if self.at_op(",") || closers.iter().any(|c| self.at_op(c)) {
                return expr;
            }
        }
        self.pos = start;
        self.skip_until(closers);
        Expr::Opaque("non-literal expression".to_string())
    }

    /// Advance to the next `,` or closer at the current bracket depth.
    fn skip_until(&mut self, closers: &[&str]) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if let Token::Op(op) = tok {
                if depth == 0 && (*op == "," || closers.contains(op)) {
                    return;
                }
                match *op {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        if depth == 0 {
                            return;
                        }
                        depth -= 1;
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
    }
}

fn parse_number(text: &str) -> Expr {
    let cleaned = text.replace('_', "");
    let lowered = cleaned.to_ascii_lowercase();
    if let Some(hex) = lowered.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16)
            .map(Expr::Int)
            .unwrap_or_else(|_| Expr::Opaque(format!("number {text}")));
    }
    if let Ok(n) = cleaned.parse::<i64>() {
        return Expr::Int(n);
    }
    cleaned
        .parse::<f64>()
        .map(Expr::Float)
        .unwrap_or_else(|_| Expr::Opaque(format!("number {text}")))
}
