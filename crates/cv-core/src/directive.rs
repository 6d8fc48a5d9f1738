use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// `name<op>value` as a single token, e.g. `x+=5`.
static COMPACT_MUTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+?)(\+=|-=|=)(\S+)$").unwrap());

/// Keyword that introduces a retrieval directive.
pub const GET_KEYWORD: &str = "get";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Assign,
    Add,
    Subtract,
}

impl Operator {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Operator::Assign),
            "+=" => Some(Operator::Add),
            "-=" => Some(Operator::Subtract),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Assign => "=",
            Operator::Add => "+=",
            Operator::Subtract => "-=",
        }
    }

    /// Apply the operator to `current`, returning the new value.
    pub fn eval(self, current: f64, operand: f64) -> f64 {
        match self {
            Operator::Assign => operand,
            Operator::Add => current + operand,
            Operator::Subtract => current - operand,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `{{...}}` instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    Mutation {
        name: String,
        op: Operator,
        operand: f64,
    },
    Retrieval {
        name: String,
    },
}

/// Why a command string did not produce a directive.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    TokenCount(usize),
    UnknownOperator(String),
    InvalidOperand(String),
}

impl Rejection {
    /// Emit the diagnostic for a discarded command. Never fatal.
    pub fn log(&self, command: &str) {
        match self {
            Rejection::UnknownOperator(op) => {
                tracing::warn!("unsupported operator '{op}' in '{command}'");
            }
            other => tracing::debug!("skipping '{command}': {other}"),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TokenCount(n) => write!(f, "expected 3 tokens, found {n}"),
            Rejection::UnknownOperator(op) => write!(f, "unsupported operator '{op}'"),
            Rejection::InvalidOperand(token) => write!(f, "'{token}' is not a number"),
        }
    }
}

/// Identifier accepted by retrieval directives: `[A-Za-z0-9_]+`.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Parse the operand of a mutation. The whole token must be a finite float
/// literal. With finite operands a stored value can overflow to an infinity
/// but never becomes `NaN`.
pub fn parse_operand(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a command string (the text between `{{` and `}}`).
///
/// Whitespace splits the command into tokens. Three tokens form a mutation
/// `name op value`; `get name` forms a retrieval. A single token is still
/// read as a mutation when it has the compact shape `name<op>value`. Any
/// other split, such as `x =5`, is rejected.
pub fn parse_command(command: &str) -> Result<Directive, Rejection> {
    let command = command.trim();
    let tokens: Vec<&str> = command.split_whitespace().collect();

    match tokens.as_slice() {
        [keyword, name] if *keyword == GET_KEYWORD && is_identifier(name) => {
            Ok(Directive::Retrieval {
                name: (*name).to_string(),
            })
        }
        [name, op, operand] => parse_mutation(name, op, operand),
        [token] => match COMPACT_MUTATION.captures(token) {
            Some(caps) => parse_mutation(&caps[1], &caps[2], &caps[3]),
            None => Err(Rejection::TokenCount(1)),
        },
        _ => Err(Rejection::TokenCount(tokens.len())),
    }
}

fn parse_mutation(name: &str, op: &str, operand: &str) -> Result<Directive, Rejection> {
    let op = Operator::parse(op).ok_or_else(|| Rejection::UnknownOperator(op.to_string()))?;
    let operand =
        parse_operand(operand).ok_or_else(|| Rejection::InvalidOperand(operand.to_string()))?;
    Ok(Directive::Mutation {
        name: name.to_string(),
        op,
        operand,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation(name: &str, op: Operator, operand: f64) -> Directive {
        Directive::Mutation {
            name: name.to_string(),
            op,
            operand,
        }
    }

    #[test]
    fn test_parse_three_token_mutations() {
        assert_eq!(
            parse_command("hp = 10"),
            Ok(mutation("hp", Operator::Assign, 10.0))
        );
        assert_eq!(
            parse_command("hp += 2.5"),
            Ok(mutation("hp", Operator::Add, 2.5))
        );
        assert_eq!(
            parse_command("  hp   -=   -3 "),
            Ok(mutation("hp", Operator::Subtract, -3.0))
        );
    }

    #[test]
    fn test_parse_compact_mutations() {
        assert_eq!(parse_command("x=10"), Ok(mutation("x", Operator::Assign, 10.0)));
        assert_eq!(parse_command("x-=3"), Ok(mutation("x", Operator::Subtract, 3.0)));
        assert_eq!(parse_command("x+=4"), Ok(mutation("x", Operator::Add, 4.0)));
        assert_eq!(parse_command("x=-1"), Ok(mutation("x", Operator::Assign, -1.0)));
    }

    #[test]
    fn test_two_token_mutations_rejected() {
        assert_eq!(parse_command("x =5"), Err(Rejection::TokenCount(2)));
        assert_eq!(parse_command("x+= 5"), Err(Rejection::TokenCount(2)));
        assert_eq!(parse_command("x -=3"), Err(Rejection::TokenCount(2)));
    }

    #[test]
    fn test_parse_retrieval() {
        assert_eq!(
            parse_command("get affection"),
            Ok(Directive::Retrieval {
                name: "affection".to_string()
            })
        );
        assert_eq!(
            parse_command(" get  mood_2 "),
            Ok(Directive::Retrieval {
                name: "mood_2".to_string()
            })
        );
    }

    #[test]
    fn test_retrieval_name_must_be_identifier() {
        assert_eq!(parse_command("get x-y"), Err(Rejection::TokenCount(2)));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        assert_eq!(
            parse_command("x ** 5"),
            Err(Rejection::UnknownOperator("**".to_string()))
        );
        assert_eq!(
            parse_command("get x 5"),
            Err(Rejection::UnknownOperator("x".to_string()))
        );
    }

    #[test]
    fn test_invalid_operand_rejected() {
        assert_eq!(
            parse_command("x = abc"),
            Err(Rejection::InvalidOperand("abc".to_string()))
        );
        assert_eq!(
            parse_command("x = 5abc"),
            Err(Rejection::InvalidOperand("5abc".to_string()))
        );
        assert_eq!(
            parse_command("x = NaN"),
            Err(Rejection::InvalidOperand("NaN".to_string()))
        );
    }

    #[test]
    fn test_infinite_operand_rejected() {
        assert_eq!(
            parse_command("x = inf"),
            Err(Rejection::InvalidOperand("inf".to_string()))
        );
        assert_eq!(
            parse_command("x -= -infinity"),
            Err(Rejection::InvalidOperand("-infinity".to_string()))
        );
        assert_eq!(parse_operand("1e309"), None);
        assert_eq!(parse_operand("1e308"), Some(1e308));
    }

    #[test]
    fn test_wrong_token_count_rejected() {
        assert_eq!(parse_command("x"), Err(Rejection::TokenCount(1)));
        assert_eq!(parse_command(""), Err(Rejection::TokenCount(0)));
        assert_eq!(parse_command("x = 1 2"), Err(Rejection::TokenCount(4)));
    }

    #[test]
    fn test_operator_eval() {
        assert_eq!(Operator::Assign.eval(4.0, 1.0), 1.0);
        assert_eq!(Operator::Add.eval(4.0, 1.0), 5.0);
        assert_eq!(Operator::Subtract.eval(4.0, 1.0), 3.0);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("abc_123"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("é"));
    }
}
