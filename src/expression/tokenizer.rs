//! Expression tokenizer
//!
//! Splits an expression on the operator set, keeping the delimiters:
//!
//! `=== !== == != >= <= <> < > + - * / && || ( )` and the keyword ` as `.
//!
//! Quoted literals are kept whole so operators inside them are not split.

use regex::Regex;

const TOKEN_PATTERN: &str =
    r#""[^"]*"|'[^']*'|\s+as\s+|===|!==|==|!=|>=|<=|<>|&&|\|\||[<>+\-*/()]"#;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Mul,
    Div,
    Add,
    Sub,
    Eq,
    StrictEq,
    NotEq,
    StrictNotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl Operator {
    fn parse(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "==" => Operator::Eq,
            "===" => Operator::StrictEq,
            "!=" | "<>" => Operator::NotEq,
            "!==" => Operator::StrictNotEq,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Le,
            ">=" => Operator::Ge,
            "&&" => Operator::And,
            "||" => Operator::Or,
            _ => return None,
        };
        Some(op)
    }

    /// Precedence tier, lowest number binds tightest
    pub fn tier(self) -> u8 {
        match self {
            Operator::Mul | Operator::Div => 1,
            Operator::Add | Operator::Sub => 2,
            Operator::Eq
            | Operator::StrictEq
            | Operator::NotEq
            | Operator::StrictNotEq
            | Operator::Lt
            | Operator::Gt
            | Operator::Le
            | Operator::Ge => 3,
            Operator::And | Operator::Or => 4,
        }
    }
}

/// A single token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open,
    Close,
    Op(Operator),
    /// The ` as ` keyword
    As,
    /// Anything between delimiters, trimmed
    Operand(String),
}

/// Compiled tokenizer
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
}

impl Tokenizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(TOKEN_PATTERN)?,
        })
    }

    /// Ordered token stream; whitespace-only pieces are dropped
    pub fn tokenize(&self, expression: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut last = 0;

        for found in self.pattern.find_iter(expression) {
            push_operand(&mut tokens, &expression[last..found.start()]);
            last = found.end();

            let text = found.as_str();
            let token = match text {
                "(" => Token::Open,
                ")" => Token::Close,
                _ if text.starts_with('"') || text.starts_with('\'') => {
                    Token::Operand(text.to_string())
                }
                _ if text.trim() == "as" => Token::As,
                _ => match Operator::parse(text) {
                    Some(op) => Token::Op(op),
                    None => Token::Operand(text.to_string()),
                },
            };
            tokens.push(token);
        }
        push_operand(&mut tokens, &expression[last..]);

        tokens
    }
}

fn push_operand(tokens: &mut Vec<Token>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        tokens.push(Token::Operand(piece.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(expr: &str) -> Vec<Token> {
        Tokenizer::new().unwrap().tokenize(expr)
    }

    fn operand(s: &str) -> Token {
        Token::Operand(s.to_string())
    }

    #[test]
    fn test_arithmetic_tokens() {
        assert_eq!(
            tokenize("2 + 3 * 4"),
            vec![
                operand("2"),
                Token::Op(Operator::Add),
                operand("3"),
                Token::Op(Operator::Mul),
                operand("4"),
            ]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            tokenize("$a === 1"),
            vec![operand("$a"), Token::Op(Operator::StrictEq), operand("1")]
        );
        assert_eq!(
            tokenize("1<>2"),
            vec![operand("1"), Token::Op(Operator::NotEq), operand("2")]
        );
        assert_eq!(
            tokenize("1 <= 2"),
            vec![operand("1"), Token::Op(Operator::Le), operand("2")]
        );
    }

    #[test]
    fn test_parentheses_and_alias() {
        assert_eq!(
            tokenize("(true) as name"),
            vec![
                Token::Open,
                operand("true"),
                Token::Close,
                Token::As,
                operand("name"),
            ]
        );
    }

    #[test]
    fn test_as_needs_surrounding_space() {
        assert_eq!(tokenize("$user.alias"), vec![operand("$user.alias")]);
    }

    #[test]
    fn test_quoted_literals_stay_whole() {
        assert_eq!(
            tokenize("$role == 'a - b'"),
            vec![operand("$role"), Token::Op(Operator::Eq), operand("'a - b'")]
        );
    }

    #[test]
    fn test_tiers() {
        assert!(Operator::Mul.tier() < Operator::Add.tier());
        assert!(Operator::Add.tier() < Operator::Lt.tier());
        assert!(Operator::Ge.tier() < Operator::Or.tier());
    }
}
