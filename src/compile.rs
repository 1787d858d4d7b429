//! Lowers a check expression (as produced by [`emit`][`crate::emit`]) to a
//! bytecode [`Program`].
//!
//! Parsing and lowering both run on explicit stacks, so the nesting depth of
//! the source is bounded only by memory.

use crate::emit::ROOT;
use crate::vm::{Op, Program, Slot, SlotDef};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { offset: usize, found: char },

    #[error("malformed string literal at offset {offset}")]
    InvalidString { offset: usize },

    #[error("unexpected token at offset {offset}")]
    UnexpectedToken { offset: usize },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unknown type name {0:?}")]
    UnknownType(String),

    #[error("unknown name {name:?} at offset {offset}")]
    UnknownName { offset: usize, name: String },
}

/// Parses `source` and lowers it to bytecode.
///
/// ```
/// use serde_json::json;
///
/// let program = shape_guard::compile(
///     r#"typeof value === "object" && "foo" in value"#,
/// ).unwrap();
///
/// assert!(program.evaluate(Some(&json!({ "foo": 1 }))));
/// assert!(!program.evaluate(Some(&json!({ "bar": 1 }))));
/// ```
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let tokens = lex(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse()?;

    let mut lowering = Lowering::default();
    lowering.lower(&expr);

    Ok(Program {
        ops: lowering.ops,
        slots: parser.slots,
        keys: lowering.keys,
        key_sets: lowering.key_sets,
        source: source.to_owned(),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TypeTag {
    String,
    Number,
    Object,
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Bool(bool),
    IsNull(Slot),
    IsAbsent(Slot),
    TypeOf(Slot, TypeTag),
    Has(Slot, String),
    OnlyKeys(Slot, BTreeSet<String>),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
enum Token<'a> {
    Ident(&'a str),
    Str(String),
    StrictEq,
    Assign,
    AndAnd,
    Bang,
    Question,
    Colon,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

fn lex(source: &str) -> Result<Vec<(usize, Token<'_>)>, CompileError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let token = match bytes[i] {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'?' => Token::Question,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b'!' => Token::Bang,
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                i += 1;
                Token::AndAnd
            }
            b'=' if bytes.get(i + 1..i + 3) == Some(&b"=="[..]) => {
                i += 2;
                Token::StrictEq
            }
            b'=' => Token::Assign,
            b'"' => {
                i += 1;
                loop {
                    match bytes.get(i) {
                        Some(b'\\') => i += 2,
                        Some(b'"') => break,
                        Some(_) => i += 1,
                        None => return Err(CompileError::InvalidString { offset: start }),
                    }
                }
                let literal = source
                    .get(start..=i)
                    .ok_or(CompileError::InvalidString { offset: start })?;
                let value = serde_json::from_str(literal)
                    .map_err(|_| CompileError::InvalidString { offset: start })?;
                Token::Str(value)
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while bytes
                    .get(i + 1)
                    .map_or(false, |b| b.is_ascii_alphanumeric() || *b == b'_')
                {
                    i += 1;
                }
                Token::Ident(&source[start..=i])
            }
            _ => {
                return Err(CompileError::UnexpectedChar {
                    offset: start,
                    found: source[start..].chars().next().unwrap_or_default(),
                })
            }
        };

        tokens.push((start, token));
        i += 1;
    }

    Ok(tokens)
}

const KEYWORDS: &[&str] = &[
    "true", "false", "null", "undefined", "typeof", "in", "let", "onlyKeys",
];

/// Pending operators of the shunting-yard parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Not,
    And,
    /// Seen `?`, waiting for `:`.
    Question,
    /// Seen `? then :`, waiting for the else operand.
    Colon,
    Paren,
    /// A `let ... in (` group; closing it ends the binding.
    Let,
}

impl Pending {
    /// Reduced before `&&` and `?`.
    fn is_logical(self) -> bool {
        matches!(self, Pending::Not | Pending::And)
    }

    /// Reduced before `:`, `)` and the end of input.
    fn is_closed(self) -> bool {
        matches!(self, Pending::Not | Pending::And | Pending::Colon)
    }
}

struct Parser<'a> {
    tokens: Vec<(usize, Token<'a>)>,
    pos: usize,
    operands: Vec<Expr>,
    pending: Vec<Pending>,
    scope: Vec<(&'a str, Slot)>,
    slots: Vec<SlotDef>,
    interned: HashMap<(Slot, String), Slot>,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<(usize, Token<'a>)>) -> Self {
        Self {
            tokens,
            pos: 0,
            operands: Vec::new(),
            pending: Vec::new(),
            scope: vec![(ROOT, 0)],
            slots: vec![SlotDef::Root],
            interned: HashMap::new(),
        }
    }

    fn parse(&mut self) -> Result<Expr, CompileError> {
        loop {
            let (offset, token) = self.next()?;
            match token {
                Token::Bang => self.pending.push(Pending::Not),
                Token::LParen => self.pending.push(Pending::Paren),
                Token::Ident("let") => self.binding()?,
                token => {
                    let atom = self.atom(offset, token)?;
                    self.operands.push(atom);
                    if self.operators()? {
                        return self.finish();
                    }
                }
            }
        }
    }

    /// Consumes the operators that follow a complete operand. Returns `true`
    /// at the end of input, `false` when another operand is expected.
    fn operators(&mut self) -> Result<bool, CompileError> {
        while let Some((offset, token)) = self.tokens.get(self.pos).cloned() {
            self.pos += 1;

            match token {
                Token::AndAnd => {
                    self.reduce_while(Pending::is_logical);
                    self.pending.push(Pending::And);
                    return Ok(false);
                }
                Token::Question => {
                    self.reduce_while(Pending::is_logical);
                    self.pending.push(Pending::Question);
                    return Ok(false);
                }
                Token::Colon => {
                    self.reduce_while(Pending::is_closed);
                    if self.pending.pop() != Some(Pending::Question) {
                        return Err(CompileError::UnexpectedToken { offset });
                    }
                    self.pending.push(Pending::Colon);
                    return Ok(false);
                }
                Token::RParen => {
                    self.reduce_while(Pending::is_closed);
                    match self.pending.pop() {
                        Some(Pending::Paren) => {}
                        Some(Pending::Let) => {
                            self.scope.pop();
                        }
                        _ => return Err(CompileError::UnexpectedToken { offset }),
                    }
                }
                _ => return Err(CompileError::UnexpectedToken { offset }),
            }
        }

        Ok(true)
    }

    fn finish(&mut self) -> Result<Expr, CompileError> {
        self.reduce_while(Pending::is_closed);

        if !self.pending.is_empty() {
            return Err(CompileError::UnexpectedEnd);
        }

        match (self.operands.pop(), self.operands.is_empty()) {
            (Some(expr), true) => Ok(expr),
            _ => Err(CompileError::UnexpectedEnd),
        }
    }

    fn reduce_while(&mut self, mut reducible: impl FnMut(Pending) -> bool) {
        while let Some(&op) = self.pending.last() {
            if !reducible(op) {
                break;
            }
            self.pending.pop();

            // Every pending operator was pushed after the operands it consumes.
            let expr = match op {
                Pending::Not => {
                    let inner = self.operands.pop();
                    inner.map(|e| Expr::Not(Box::new(e)))
                }
                Pending::And => {
                    let rhs = self.operands.pop();
                    let lhs = self.operands.pop();
                    lhs.zip(rhs).map(|(lhs, rhs)| match lhs {
                        Expr::And(mut items) => {
                            items.push(rhs);
                            Expr::And(items)
                        }
                        lhs => Expr::And(vec![lhs, rhs]),
                    })
                }
                Pending::Colon => {
                    let otherwise = self.operands.pop();
                    let then = self.operands.pop();
                    let cond = self.operands.pop();
                    match (cond, then, otherwise) {
                        (Some(c), Some(t), Some(o)) => {
                            Some(Expr::Cond(Box::new(c), Box::new(t), Box::new(o)))
                        }
                        _ => None,
                    }
                }
                Pending::Question | Pending::Paren | Pending::Let => None,
            };

            if let Some(expr) = expr {
                self.operands.push(expr);
            }
        }
    }

    /// Parses `let NAME = path in (` and opens the bound scope.
    fn binding(&mut self) -> Result<(), CompileError> {
        let name = match self.next()? {
            (_, Token::Ident(name)) if !KEYWORDS.contains(&name) => name,
            (offset, _) => return Err(CompileError::UnexpectedToken { offset }),
        };
        self.expect(&Token::Assign)?;
        let slot = self.path()?;
        self.expect(&Token::Ident("in"))?;
        self.expect(&Token::LParen)?;

        self.scope.push((name, slot));
        self.pending.push(Pending::Let);
        Ok(())
    }

    fn atom(&mut self, offset: usize, token: Token<'a>) -> Result<Expr, CompileError> {
        match token {
            Token::Ident("true") => Ok(Expr::Bool(true)),
            Token::Ident("false") => Ok(Expr::Bool(false)),
            Token::Ident("typeof") => {
                let slot = self.path()?;
                self.expect(&Token::StrictEq)?;
                let tag = match self.string()?.as_str() {
                    "string" => TypeTag::String,
                    "number" => TypeTag::Number,
                    "object" => TypeTag::Object,
                    other => return Err(CompileError::UnknownType(other.to_owned())),
                };
                Ok(Expr::TypeOf(slot, tag))
            }
            Token::Ident("onlyKeys") => {
                self.expect(&Token::LParen)?;
                let slot = self.path()?;
                let mut keys = BTreeSet::new();
                while self.eat(&Token::Comma) {
                    keys.insert(self.string()?);
                }
                self.expect(&Token::RParen)?;
                Ok(Expr::OnlyKeys(slot, keys))
            }
            Token::Ident(name) if !KEYWORDS.contains(&name) => {
                let slot = self.lookup(offset, name)?;
                let slot = self.path_rest(slot)?;
                self.expect(&Token::StrictEq)?;
                match self.next()? {
                    (_, Token::Ident("null")) => Ok(Expr::IsNull(slot)),
                    (_, Token::Ident("undefined")) => Ok(Expr::IsAbsent(slot)),
                    (offset, _) => Err(CompileError::UnexpectedToken { offset }),
                }
            }
            Token::Str(key) => {
                self.expect(&Token::Ident("in"))?;
                Ok(Expr::Has(self.path()?, key))
            }
            _ => Err(CompileError::UnexpectedToken { offset }),
        }
    }

    fn path(&mut self) -> Result<Slot, CompileError> {
        match self.next()? {
            (offset, Token::Ident(name)) if !KEYWORDS.contains(&name) => {
                let slot = self.lookup(offset, name)?;
                self.path_rest(slot)
            }
            (offset, _) => Err(CompileError::UnexpectedToken { offset }),
        }
    }

    fn path_rest(&mut self, mut slot: Slot) -> Result<Slot, CompileError> {
        while self.eat(&Token::LBracket) {
            let key = self.string()?;
            self.expect(&Token::RBracket)?;
            slot = self.member(slot, key);
        }
        Ok(slot)
    }

    fn lookup(&self, offset: usize, name: &str) -> Result<Slot, CompileError> {
        self.scope
            .iter()
            .rev()
            .find(|(bound, _)| *bound == name)
            .map(|(_, slot)| *slot)
            .ok_or_else(|| CompileError::UnknownName {
                offset,
                name: name.to_owned(),
            })
    }

    fn member(&mut self, parent: Slot, key: String) -> Slot {
        if let Some(slot) = self.interned.get(&(parent, key.clone())) {
            return *slot;
        }

        let slot = self.slots.len();
        self.slots.push(SlotDef::Member(parent, key.clone()));
        self.interned.insert((parent, key), slot);
        slot
    }

    fn string(&mut self) -> Result<String, CompileError> {
        match self.next()? {
            (_, Token::Str(s)) => Ok(s),
            (offset, _) => Err(CompileError::UnexpectedToken { offset }),
        }
    }

    fn next(&mut self) -> Result<(usize, Token<'a>), CompileError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(CompileError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, token: &Token<'a>) -> bool {
        match self.tokens.get(self.pos) {
            Some((_, t)) if t == token => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, token: &Token<'a>) -> Result<(), CompileError> {
        if self.eat(token) {
            return Ok(());
        }

        match self.tokens.get(self.pos) {
            Some((offset, _)) => Err(CompileError::UnexpectedToken { offset: *offset }),
            None => Err(CompileError::UnexpectedEnd),
        }
    }
}

/// Work items of the lowering pass, run from a stack.
enum Task<'e> {
    Lower(&'e Expr),
    /// Lowers the expression, inverted if the flag is set.
    Negated(&'e Expr, bool),
    Emit(Op),
    /// Emits a jump and remembers it until patched.
    Jump(Op),
    /// Swaps the two most recent unpatched jumps.
    Swap,
    /// Points the most recent unpatched jump at the next instruction.
    Patch,
}

#[derive(Default)]
struct Lowering {
    ops: Vec<Op>,
    keys: Vec<String>,
    key_sets: Vec<BTreeSet<String>>,
    unpatched: Vec<usize>,
}

impl Lowering {
    fn lower(&mut self, expr: &Expr) {
        let mut tasks = vec![Task::Lower(expr)];

        while let Some(task) = tasks.pop() {
            match task {
                Task::Lower(expr) => self.expand(expr, &mut tasks),
                Task::Negated(Expr::Not(inner), negate) => {
                    tasks.push(Task::Negated(inner, !negate));
                }
                Task::Negated(expr, negate) => {
                    if negate {
                        tasks.push(Task::Emit(Op::Not));
                    }
                    tasks.push(Task::Lower(expr));
                }
                Task::Emit(op) => self.ops.push(op),
                Task::Jump(op) => {
                    self.unpatched.push(self.ops.len());
                    self.ops.push(op);
                }
                Task::Swap => {
                    let len = self.unpatched.len();
                    self.unpatched.swap(len - 2, len - 1);
                }
                Task::Patch => {
                    if let Some(index) = self.unpatched.pop() {
                        let target = self.ops.len();
                        if let Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfTrue(t) =
                            &mut self.ops[index]
                        {
                            *t = target;
                        }
                    }
                }
            }
        }
    }

    /// Pushes the work for `expr` so that it runs in source order.
    fn expand<'e>(&mut self, expr: &'e Expr, tasks: &mut Vec<Task<'e>>) {
        let mut seq = Vec::new();

        match expr {
            Expr::Bool(b) => seq.push(Task::Emit(Op::Const(*b))),
            Expr::IsNull(slot) => seq.push(Task::Emit(Op::IsNull(*slot))),
            Expr::IsAbsent(slot) => seq.push(Task::Emit(Op::IsAbsent(*slot))),
            Expr::TypeOf(slot, tag) => seq.push(Task::Emit(match tag {
                TypeTag::String => Op::IsString(*slot),
                TypeTag::Number => Op::IsNumber(*slot),
                TypeTag::Object => Op::IsObject(*slot),
            })),
            Expr::Has(slot, key) => {
                self.keys.push(key.clone());
                seq.push(Task::Emit(Op::Has(*slot, self.keys.len() - 1)));
            }
            Expr::OnlyKeys(slot, keys) => {
                self.key_sets.push(keys.clone());
                seq.push(Task::Emit(Op::OnlyKeys(*slot, self.key_sets.len() - 1)));
            }
            Expr::Not(inner) => seq.push(Task::Negated(inner, true)),
            Expr::And(items) => {
                for (i, item) in items.iter().enumerate() {
                    seq.push(Task::Lower(item));
                    if i + 1 < items.len() {
                        seq.push(Task::Jump(Op::JumpIfFalse(0)));
                    }
                }
                for _ in 1..items.len() {
                    seq.push(Task::Patch);
                }
            }
            // `c ? false : b` is `!c && b`.
            Expr::Cond(cond, then, otherwise) if **then == Expr::Bool(false) => {
                seq.push(Task::Negated(cond, true));
                seq.push(Task::Jump(Op::JumpIfFalse(0)));
                seq.push(Task::Lower(otherwise));
                seq.push(Task::Patch);
            }
            // `c ? true : b` is `c || b`.
            Expr::Cond(cond, then, otherwise) if **then == Expr::Bool(true) => {
                seq.push(Task::Negated(cond, false));
                seq.push(Task::Jump(Op::JumpIfTrue(0)));
                seq.push(Task::Lower(otherwise));
                seq.push(Task::Patch);
            }
            Expr::Cond(cond, then, otherwise) => {
                seq.push(Task::Lower(cond));
                seq.push(Task::Jump(Op::JumpIfFalse(0)));
                seq.push(Task::Lower(then));
                seq.push(Task::Jump(Op::Jump(0)));
                seq.push(Task::Swap);
                seq.push(Task::Patch);
                seq.push(Task::Lower(otherwise));
                seq.push(Task::Patch);
            }
        }

        tasks.extend(seq.into_iter().rev());
    }
}
