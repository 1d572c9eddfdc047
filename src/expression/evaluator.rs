//! Expression evaluator
//!
//! Recursive descent over the token stream with an explicit position: each
//! parenthesized group is evaluated by a nested call that consumes tokens up
//! to its matching `)`, and its result becomes a single operand of the
//! enclosing group.
//!
//! A group's flat operand/operator list is reduced in five tiers, left to
//! right within each tier:
//!
//! | tier | operators |
//! |------|-----------|
//! | 1 | `*` `/` |
//! | 2 | `+` `-` |
//! | 3 | `==` `===` `!=` `!==` `<>` `<` `>` `<=` `>=` |
//! | 4 | `&&` `\|\|` |
//! | 5 | `as` |
//!
//! `as` does not compute anything: its right-hand operand becomes the alias
//! of the whole expression.

use serde_json::Value;

use super::context::{EvalContext, CALLBACK_SIGIL, VARIABLE_SIGIL};
use super::tokenizer::{Operator, Token, Tokenizer};
use crate::core::value::{
    compare, is_truthy, loose_eq, number, parse_literal, strict_eq, to_number, unquote,
};
use crate::core::{PolicyError, PolicyResult};

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    /// Text after a top-level `as`, or the expression itself
    pub alias: String,
}

impl Evaluation {
    pub fn is_truthy(&self) -> bool {
        is_truthy(&self.value)
    }
}

#[derive(Debug, Default)]
struct Operand {
    value: Value,
    /// Source text, used when the operand names an alias
    raw: String,
}

#[derive(Debug)]
enum Item {
    Operand(Operand),
    Op(Operator),
    As,
}

#[derive(Debug, Clone, Copy)]
enum Link {
    Op(Operator),
    As,
}

/// Infix expression evaluator
#[derive(Debug, Clone)]
pub struct ExpressionEvaluator {
    tokenizer: Tokenizer,
}

impl ExpressionEvaluator {
    pub fn new() -> PolicyResult<Self> {
        Ok(Self {
            tokenizer: Tokenizer::new()?,
        })
    }

    /// Evaluate, reporting syntax and arithmetic problems as errors
    pub fn try_evaluate(&self, expression: &str, ctx: &EvalContext) -> PolicyResult<Evaluation> {
        let tokens = self.tokenizer.tokenize(expression);
        let mut pos = 0;
        let (value, alias) = self.group(&tokens, &mut pos, 0, ctx)?;

        Ok(Evaluation {
            value,
            alias: alias.unwrap_or_else(|| expression.trim().to_string()),
        })
    }

    /// Evaluate, degrading to `null` on any problem
    pub fn evaluate(&self, expression: &str, ctx: &EvalContext) -> Value {
        match self.try_evaluate(expression, ctx) {
            Ok(evaluation) => evaluation.value,
            Err(e) => {
                tracing::warn!("[ExpressionEvaluator] '{}' evaluated to null: {}", expression, e);
                Value::Null
            }
        }
    }

    /// Alias of an expression without evaluating it
    pub fn alias(&self, expression: &str) -> String {
        let tokens = self.tokenizer.tokenize(expression);
        let mut depth = 0usize;
        let mut alias = None;

        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::Open => depth += 1,
                Token::Close => depth = depth.saturating_sub(1),
                Token::As if depth == 0 => {
                    if let Some(Token::Operand(raw)) = tokens.get(i + 1) {
                        alias = Some(alias_text(raw));
                    }
                }
                _ => {}
            }
        }

        alias.unwrap_or_else(|| expression.trim().to_string())
    }

    fn group(
        &self,
        tokens: &[Token],
        pos: &mut usize,
        depth: usize,
        ctx: &EvalContext,
    ) -> PolicyResult<(Value, Option<String>)> {
        let mut items = Vec::new();

        while let Some(token) = tokens.get(*pos) {
            *pos += 1;
            match token {
                Token::Open => {
                    let (value, _) = self.group(tokens, pos, depth + 1, ctx)?;
                    items.push(Item::Operand(Operand {
                        value,
                        raw: String::new(),
                    }));
                }
                Token::Close => {
                    if depth == 0 {
                        return Err(PolicyError::expression("unexpected ')'"));
                    }
                    return reduce(items);
                }
                Token::Op(op) => items.push(Item::Op(*op)),
                Token::As => items.push(Item::As),
                Token::Operand(text) => items.push(Item::Operand(Operand {
                    value: resolve_operand(text, ctx),
                    raw: text.clone(),
                })),
            }
        }

        if depth > 0 {
            return Err(PolicyError::expression("missing ')'"));
        }
        reduce(items)
    }
}

fn resolve_operand(text: &str, ctx: &EvalContext) -> Value {
    if let Some(path) = text.strip_prefix(VARIABLE_SIGIL) {
        return ctx.lookup(path);
    }
    if let Some(name) = text.strip_prefix(CALLBACK_SIGIL) {
        return ctx.call(name).unwrap_or_else(|| {
            tracing::debug!("[ExpressionEvaluator] No callback named '{}'", name);
            Value::Null
        });
    }
    parse_literal(text)
}

fn alias_text(raw: &str) -> String {
    unquote(raw).unwrap_or(raw).to_string()
}

/// Reduce a flat operand/operator list
fn reduce(items: Vec<Item>) -> PolicyResult<(Value, Option<String>)> {
    let mut operands: Vec<Operand> = Vec::new();
    let mut links: Vec<Link> = Vec::new();
    let mut sign: Option<Operator> = None;
    let mut expect_operand = true;

    for item in items {
        match item {
            Item::Operand(mut operand) => {
                if !expect_operand {
                    return Err(PolicyError::expression(format!(
                        "missing operator before '{}'",
                        operand.raw
                    )));
                }
                if sign.take() == Some(Operator::Sub) {
                    operand.value = negate(&operand.value)?;
                }
                operands.push(operand);
                expect_operand = false;
            }
            Item::Op(op) if expect_operand => {
                if matches!(op, Operator::Add | Operator::Sub) && sign.is_none() {
                    sign = Some(op);
                } else {
                    return Err(PolicyError::expression(format!(
                        "operator {:?} has no left operand",
                        op
                    )));
                }
            }
            Item::Op(op) => {
                links.push(Link::Op(op));
                expect_operand = true;
            }
            Item::As => {
                if expect_operand {
                    return Err(PolicyError::expression("'as' has no left operand"));
                }
                links.push(Link::As);
                expect_operand = true;
            }
        }
    }

    if operands.is_empty() {
        return Err(PolicyError::expression("empty expression"));
    }
    if expect_operand {
        return Err(PolicyError::expression("expression ends with an operator"));
    }

    for tier in 1..=4 {
        let mut i = 0;
        while i < links.len() {
            match links[i] {
                Link::Op(op) if op.tier() == tier => {
                    let right = operands.remove(i + 1);
                    let left = std::mem::take(&mut operands[i]);
                    operands[i] = Operand {
                        value: apply(op, &left.value, &right.value)?,
                        raw: String::new(),
                    };
                    links.remove(i);
                }
                _ => i += 1,
            }
        }
    }

    // only `as` links remain
    let mut operands = operands.into_iter();
    let value = operands.next().map(|o| o.value).unwrap_or(Value::Null);
    let alias = operands
        .last()
        .map(|o| alias_text(&o.raw))
        .filter(|a| !a.is_empty());

    Ok((value, alias))
}

fn negate(value: &Value) -> PolicyResult<Value> {
    to_number(value)
        .map(|n| number(-n))
        .ok_or_else(|| PolicyError::expression(format!("cannot negate {}", value)))
}

fn apply(op: Operator, left: &Value, right: &Value) -> PolicyResult<Value> {
    let result = match op {
        Operator::Mul | Operator::Div | Operator::Add | Operator::Sub => {
            let (Some(x), Some(y)) = (to_number(left), to_number(right)) else {
                return Err(PolicyError::expression(format!(
                    "non-numeric operand in {} {:?} {}",
                    left, op, right
                )));
            };
            match op {
                Operator::Mul => number(x * y),
                Operator::Div if y == 0.0 => {
                    return Err(PolicyError::expression("division by zero"));
                }
                Operator::Div => number(x / y),
                Operator::Add => number(x + y),
                _ => number(x - y),
            }
        }
        Operator::Eq => Value::Bool(loose_eq(left, right)),
        Operator::StrictEq => Value::Bool(strict_eq(left, right)),
        Operator::NotEq => Value::Bool(!loose_eq(left, right)),
        Operator::StrictNotEq => Value::Bool(!strict_eq(left, right)),
        Operator::Lt => Value::Bool(compare(left, right).map(|o| o.is_lt()).unwrap_or(false)),
        Operator::Gt => Value::Bool(compare(left, right).map(|o| o.is_gt()).unwrap_or(false)),
        Operator::Le => Value::Bool(compare(left, right).map(|o| o.is_le()).unwrap_or(false)),
        Operator::Ge => Value::Bool(compare(left, right).map(|o| o.is_ge()).unwrap_or(false)),
        Operator::And => Value::Bool(is_truthy(left) && is_truthy(right)),
        Operator::Or => Value::Bool(is_truthy(left) || is_truthy(right)),
    };
    Ok(result)
}
