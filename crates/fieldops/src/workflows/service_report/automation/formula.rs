//! Restricted arithmetic for `formula` defaults.
//!
//! Formulas are stored configuration such as `{tank_size} * 0.25 + 10`. Placeholders are
//! resolved to numbers from the job record during tokenizing, so substituted values can
//! never contribute operators or parentheses. Only `+ - * / ( )`, unary signs and decimal
//! literals are understood.

use serde_json::{Number, Value};

use super::super::domain::FormRecord;
use super::conditions::to_number;

const MAX_NESTING: usize = 32;

/// Reasons a formula could not produce a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("placeholder {{{0}}} has no value in the job record")]
    UnresolvedPlaceholder(String),
    #[error("placeholder {{{0}}} does not hold a number")]
    NonNumericPlaceholder(String),
    #[error("unterminated placeholder starting at offset {0}")]
    UnterminatedPlaceholder(usize),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedCharacter { found: char, offset: usize },
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("expression ended early")]
    UnexpectedEnd,
    #[error("expression nests too deeply")]
    TooDeep,
    #[error("expression does not evaluate to a finite number")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(self) -> String {
        match self {
            Token::Number(value) => format!("number {value}"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

/// Evaluate `formula` with `{field}` placeholders read from `job_data`.
pub fn evaluate_formula(formula: &str, job_data: &FormRecord) -> Result<f64, FormulaError> {
    let tokens = tokenize(formula, job_data)?;
    let mut parser = Parser {
        tokens: &tokens,
        position: 0,
        depth: 0,
    };

    let value = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(FormulaError::UnexpectedToken(token.describe()));
    }
    if !value.is_finite() {
        return Err(FormulaError::NonFinite);
    }
    Ok(value)
}

/// JSON rendering of a formula result; whole numbers become integers.
pub fn formula_value(result: f64) -> Option<Value> {
    if result.fract() == 0.0 && result.abs() < 9.0e15 {
        return Some(Value::from(result as i64));
    }
    Number::from_f64(result).map(Value::Number)
}

fn tokenize(formula: &str, job_data: &FormRecord) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = formula.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    return Err(FormulaError::UnterminatedPlaceholder(offset));
                }
                Token::Number(resolve_placeholder(name.trim(), job_data)?)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        literal.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(literal.clone()))?;
                Token::Number(value)
            }
            other => {
                return Err(FormulaError::UnexpectedCharacter {
                    found: other,
                    offset,
                })
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

fn resolve_placeholder(name: &str, job_data: &FormRecord) -> Result<f64, FormulaError> {
    let value = job_data
        .get(name)
        .ok_or_else(|| FormulaError::UnresolvedPlaceholder(name.to_string()))?;

    let numeric = match value {
        Value::Number(_) => to_number(Some(value)),
        Value::String(text) if !text.trim().is_empty() => to_number(Some(value)),
        _ => f64::NAN,
    };

    if numeric.is_finite() {
        Ok(numeric)
    } else {
        Err(FormulaError::NonNumericPlaceholder(name.to_string()))
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    position: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.term()?;
        while let Some(token @ (Token::Plus | Token::Minus)) = self.peek() {
            self.advance();
            let rhs = self.term()?;
            value = if token == Token::Plus {
                value + rhs
            } else {
                value - rhs
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.unary()?;
        while let Some(token @ (Token::Star | Token::Slash)) = self.peek() {
            self.advance();
            let rhs = self.unary()?;
            value = if token == Token::Star {
                value * rhs
            } else {
                value / rhs
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, FormulaError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                self.nested(|parser| parser.unary()).map(|value| -value)
            }
            Some(Token::Plus) => {
                self.advance();
                self.nested(|parser| parser.unary())
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, FormulaError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.nested(|parser| parser.expression())?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    Some(other) => Err(FormulaError::UnexpectedToken(other.describe())),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(other) => Err(FormulaError::UnexpectedToken(other.describe())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<f64, FormulaError>,
    ) -> Result<f64, FormulaError> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::TooDeep);
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job() -> FormRecord {
        serde_json::from_value(json!({
            "tank_size": 1000,
            "pump_rate": "250",
            "customer": "Acme",
            "empty": "",
        }))
        .expect("object record")
    }

    #[test]
    fn respects_precedence_and_parentheses() {
        assert_eq!(evaluate_formula("2 + 3 * 4", &job()), Ok(14.0));
        assert_eq!(evaluate_formula("(2 + 3) * 4", &job()), Ok(20.0));
        assert_eq!(evaluate_formula("10 / 4 - 1", &job()), Ok(1.5));
        assert_eq!(evaluate_formula("-(3 - 5)", &job()), Ok(2.0));
    }

    #[test]
    fn substitutes_numeric_placeholders() {
        assert_eq!(evaluate_formula("{tank_size} / {pump_rate}", &job()), Ok(4.0));
        assert_eq!(evaluate_formula("{ tank_size } * 0.5", &job()), Ok(500.0));
    }

    #[test]
    fn rejects_missing_and_non_numeric_placeholders() {
        assert_eq!(
            evaluate_formula("{missing} + 1", &job()),
            Err(FormulaError::UnresolvedPlaceholder("missing".to_string()))
        );
        assert_eq!(
            evaluate_formula("{customer} + 1", &job()),
            Err(FormulaError::NonNumericPlaceholder("customer".to_string()))
        );
        assert_eq!(
            evaluate_formula("{empty} + 1", &job()),
            Err(FormulaError::NonNumericPlaceholder("empty".to_string()))
        );
    }

    #[test]
    fn rejects_code_like_input() {
        assert!(matches!(
            evaluate_formula("process.exit(1)", &job()),
            Err(FormulaError::UnexpectedCharacter { found: 'p', .. })
        ));
        assert!(evaluate_formula("1 +", &job()).is_err());
        assert!(evaluate_formula("(1 + 2", &job()).is_err());
        assert!(evaluate_formula("1 2", &job()).is_err());
        assert!(evaluate_formula("1..2", &job()).is_err());
        assert!(evaluate_formula("{tank_size", &job()).is_err());
    }

    #[test]
    fn division_by_zero_is_not_a_value() {
        assert_eq!(evaluate_formula("1 / 0", &job()), Err(FormulaError::NonFinite));
    }

    #[test]
    fn deep_nesting_is_refused() {
        let formula = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate_formula(&formula, &job()), Err(FormulaError::TooDeep));
    }

    #[test]
    fn whole_results_render_as_integers() {
        assert_eq!(formula_value(250.0), Some(json!(250)));
        assert_eq!(formula_value(2.5), Some(json!(2.5)));
    }
}
