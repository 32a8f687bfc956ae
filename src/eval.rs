//! Recursive-descent expression evaluation over four scalar types.
//!
//! Grammar (spec): `expr := term (('+'|'-') expr)?`, `term := factor
//! (('*'|'/') term)?`, `factor := NUM | FLT | STR | selection | variable |
//! constant | '(' expr ')'`, with juxtaposition of a `NUM` and a unit
//! constant multiplying (`4KiB ≡ 4*1024`).
//!
//! The evaluator doesn't own a symbol table; it asks its [`VariableLookup`]
//! for bare-keyword references (already-bound variables and SELECTION/
//! constant literals) and its [`crate::constants::RandomState`] for
//! predefined constants, so it stays testable without a full parser/handle.

use crate::constants::{self, Predefined, RandomState, WantKind};
use crate::error::{Error, Result, SourceOrigin};
use crate::lexer::{Lexer, Token};
use crate::span::Span;

/// String encoding tag carried alongside raw bytes, used both by literal
/// strings and by values produced through concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrEnc {
    /// Context-dependent: binary if the target is `BINARY`, else zero-terminated.
    Default,
    Zero,
    Binary,
    Ascii,
    Ebcdic,
    Hex,
}

impl StrEnc {
    /// Merges two encodings per concatenation rules: `d+s -> s`, `d+c -> c`;
    /// any other heterogeneous pair is rejected.
    pub fn merge(self, other: StrEnc) -> Option<StrEnc> {
        use StrEnc::*;
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Default, x) | (x, Default) => Some(x),
            _ => None,
        }
    }
}

/// A dynamically-typed evaluator value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Vec<u8>, StrEnc),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

/// Resolves bare-keyword references during expression evaluation: either an
/// already-bound sibling descriptor's most recent element, or a compile-time
/// SELECTION/constant value.
pub trait VariableLookup {
    fn lookup_variable(&self, name: &str, subscript: Option<usize>) -> Result<Option<Value>>;
    fn lookup_constant(&self, name: &str) -> Option<Value>;
}

/// An evaluation context with no variables or constants bound — useful in
/// isolation tests and for evaluating expressions that are known not to
/// reference sibling descriptors.
pub struct EmptyContext;

impl VariableLookup for EmptyContext {
    fn lookup_variable(&self, _name: &str, _subscript: Option<usize>) -> Result<Option<Value>> {
        Ok(None)
    }
    fn lookup_constant(&self, _name: &str) -> Option<Value> {
        None
    }
}

pub struct Evaluator<'a> {
    pub now: i64,
    pub rng: &'a RandomState,
}

impl<'a> Evaluator<'a> {
    pub fn new(now: i64, rng: &'a RandomState) -> Self {
        Self { now, rng }
    }

    pub fn eval_expr(
        &self,
        lexer: &mut Lexer,
        ctx: &dyn VariableLookup,
        source: SourceOrigin,
    ) -> Result<Value> {
        let mut acc = self.eval_term(lexer, ctx, source)?;
        loop {
            match lexer.peek()? {
                Token::Add => {
                    lexer.next_token()?;
                    let rhs = self.eval_term(lexer, ctx, source)?;
                    acc = add(acc, rhs, lexer.last_span(), source)?;
                }
                Token::Sub => {
                    lexer.next_token()?;
                    let rhs = self.eval_term(lexer, ctx, source)?;
                    acc = sub(acc, rhs, lexer.last_span(), source)?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn eval_term(
        &self,
        lexer: &mut Lexer,
        ctx: &dyn VariableLookup,
        source: SourceOrigin,
    ) -> Result<Value> {
        let mut acc = self.eval_factor(lexer, ctx, source)?;
        loop {
            match lexer.peek()? {
                Token::Mul => {
                    lexer.next_token()?;
                    let rhs = self.eval_factor(lexer, ctx, source)?;
                    acc = mul(acc, rhs, lexer.last_span(), source)?;
                }
                Token::Div => {
                    lexer.next_token()?;
                    let rhs = self.eval_factor(lexer, ctx, source)?;
                    acc = div(acc, rhs, lexer.last_span(), source)?;
                }
                // Juxtaposition of NUM and a unit constant multiplies, e.g. `4KiB`.
                Token::Keyword(_) if matches!(acc, Value::Int(_)) => {
                    if let Some(unit) = self.try_unit_constant(lexer, source)? {
                        acc = mul(acc, unit, lexer.last_span(), source)?;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn try_unit_constant(&self, lexer: &mut Lexer, _source: SourceOrigin) -> Result<Option<Value>> {
        let save = lexer.save();
        if let Token::Keyword(name) = lexer.peek()? {
            let name = name.clone();
            if let Some(Predefined::Number(v)) = constants::resolve(&name, WantKind::Number, self.now, self.rng) {
                lexer.next_token()?;
                return Ok(Some(v));
            }
        }
        lexer.restore(save);
        Ok(None)
    }

    fn eval_factor(
        &self,
        lexer: &mut Lexer,
        ctx: &dyn VariableLookup,
        source: SourceOrigin,
    ) -> Result<Value> {
        match lexer.next_token()? {
            Token::Num(n) => Ok(Value::Int(n)),
            Token::Flt(f) => Ok(Value::Float(f)),
            Token::Str(lit) => Ok(Value::Str(lit.bytes, str_enc_from_token(lit.encoding))),
            Token::Sub => {
                let v = self.eval_factor(lexer, ctx, source)?;
                negate(v, lexer.last_span(), source)
            }
            Token::LParen => {
                let v = self.eval_expr(lexer, ctx, source)?;
                lexer.expect(Token::RParen)?;
                Ok(v)
            }
            Token::Keyword(name) => self.eval_keyword_factor(lexer, ctx, source, &name),
            other => Err(Error::syn(
                format!("expected a value, found {other:?}"),
                lexer.last_span(),
                source,
            )),
        }
    }

    fn eval_keyword_factor(
        &self,
        lexer: &mut Lexer,
        ctx: &dyn VariableLookup,
        source: SourceOrigin,
        name: &str,
    ) -> Result<Value> {
        if let Some(subscript) = self.try_subscript(lexer, source)? {
            if let Some(v) = ctx.lookup_variable(name, Some(subscript))? {
                return Ok(v);
            }
            return Err(Error::sem(
                format!("subscript out of range for '{name}'"),
                lexer.last_span(),
                source,
            ));
        }
        if let Some(v) = ctx.lookup_constant(name) {
            return Ok(v);
        }
        if let Some(v) = ctx.lookup_variable(name, None)? {
            return Ok(v);
        }
        if let Some(p) = constants::resolve(name, WantKind::Number, self.now, self.rng)
            .or_else(|| constants::resolve(name, WantKind::Float, self.now, self.rng))
            .or_else(|| constants::resolve(name, WantKind::Str, self.now, self.rng))
        {
            return Ok(match p {
                Predefined::Number(v) | Predefined::Float(v) | Predefined::Str(v) => v,
            });
        }
        Err(Error::syn(
            format!("unknown keyword '{name}' in expression"),
            lexer.last_span(),
            source,
        ))
    }

    fn try_subscript(&self, lexer: &mut Lexer, _source: SourceOrigin) -> Result<Option<usize>> {
        let save = lexer.save();
        if matches!(lexer.peek()?, Token::LBrace) {
            lexer.next_token()?;
            if let Token::Num(n) = lexer.next_token()? {
                lexer.expect(Token::RBrace)?;
                return Ok(Some(n.max(0) as usize));
            }
            lexer.restore(save);
            return Ok(None);
        }
        Ok(None)
    }
}

fn str_enc_from_token(e: crate::lexer::StrEncoding) -> StrEnc {
    use crate::lexer::StrEncoding as T;
    match e {
        T::Default => StrEnc::Default,
        T::Zero => StrEnc::Zero,
        T::Binary => StrEnc::Binary,
        T::Ascii => StrEnc::Ascii,
        T::Ebcdic => StrEnc::Ebcdic,
        T::Hex => StrEnc::Hex,
    }
}

fn negate(v: Value, span: Span, source: SourceOrigin) -> Result<Value> {
    match v {
        Value::Int(i) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Error::sem("integer overflow negating value", span, source)),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Str(..) => Err(Error::sem("cannot negate a string", span, source)),
    }
}

fn add(a: Value, b: Value, span: Span, source: SourceOrigin) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(y)
            .map(Value::Int)
            .ok_or_else(|| Error::sem("integer overflow in addition", span, source)),
        (Value::Str(mut xs, ex), Value::Str(ys, ey)) => {
            let merged = ex
                .merge(ey)
                .ok_or_else(|| Error::sem("incompatible string encodings in concatenation", span, source))?;
            xs.extend_from_slice(&ys);
            Ok(Value::Str(xs, merged))
        }
        (a, b) => numeric_binop(a, b, span, source, |x, y| x + y, |x, y| x + y),
    }
}

fn sub(a: Value, b: Value, span: Span, source: SourceOrigin) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_sub(y)
            .map(Value::Int)
            .ok_or_else(|| Error::sem("integer overflow in subtraction", span, source)),
        (Value::Str(..), _) | (_, Value::Str(..)) => {
            Err(Error::sem("cannot subtract strings", span, source))
        }
        (a, b) => numeric_binop(a, b, span, source, |x, y| x - y, |x, y| x - y),
    }
}

fn mul(a: Value, b: Value, span: Span, source: SourceOrigin) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_mul(y)
            .map(Value::Int)
            .ok_or_else(|| Error::sem("integer overflow in multiplication", span, source)),
        (Value::Str(..), _) | (_, Value::Str(..)) => {
            Err(Error::sem("cannot multiply strings", span, source))
        }
        (a, b) => numeric_binop(a, b, span, source, |x, y| x * y, |x, y| x * y),
    }
}

fn div(a: Value, b: Value, span: Span, source: SourceOrigin) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            if y == 0 {
                return Err(Error::sem("division by zero", span, source));
            }
            x.checked_div(y)
                .map(Value::Int)
                .ok_or_else(|| Error::sem("integer overflow in division", span, source))
        }
        (Value::Str(..), _) | (_, Value::Str(..)) => {
            Err(Error::sem("cannot divide strings", span, source))
        }
        (a, b) => {
            let x = a.as_float().unwrap_or(f64::NAN);
            let y = b.as_float().unwrap_or(f64::NAN);
            if y == 0.0 {
                return Err(Error::sem("division by zero", span, source));
            }
            Ok(Value::Float(x / y))
        }
    }
}

fn numeric_binop(
    a: Value,
    b: Value,
    span: Span,
    source: SourceOrigin,
    _int_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => Ok(Value::Float(float_op(x, y))),
        _ => Err(Error::sem("incompatible operand types", span, source)),
    }
}
