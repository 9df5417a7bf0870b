//! Parameter string expressions
//!
//! Parameter values may be written as arithmetic over numeric literals and
//! `pi`, e.g. `"pi/4"` or `"2 * pi / 3"`. Nothing else is evaluated: no
//! names other than `pi`, no function calls.
//!
//! Grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := ('+' | '-') unary | power
//! power  := atom ('**' unary)?
//! atom   := number | 'pi' | '(' expr ')'
//! ```

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("unexpected '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown name '{0}' (only 'pi' is allowed)")]
    UnknownName(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("expression does not evaluate to a finite number")]
    NotFinite,

    #[error("expression nests deeper than {max} levels")]
    TooDeep { max: usize },
}

/// Maximum nesting of parentheses and unary signs
pub const MAX_EXPRESSION_DEPTH: usize = 64;

/// Evaluate a restricted arithmetic expression.
pub fn evaluate(input: &str) -> Result<f64, ExprError> {
    let mut parser = Parser {
        src: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if let Some(&b) = parser.src.get(parser.pos) {
        return Err(ExprError::UnexpectedChar {
            ch: b as char,
            pos: parser.pos,
        });
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExprError::NotFinite)
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.src.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<f64, ExprError> {
        let mut value = self.term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == b'+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ExprError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(b'*') if self.src.get(self.pos + 1) != Some(&b'*') => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    value /= self.unary()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // Every recursive path passes through here
    fn unary(&mut self) -> Result<f64, ExprError> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            return Err(ExprError::TooDeep {
                max: MAX_EXPRESSION_DEPTH,
            });
        }
        self.depth += 1;
        let value = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                self.unary().map(|v| -v)
            }
            Some(b'+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        };
        self.depth -= 1;
        value
    }

    fn power(&mut self) -> Result<f64, ExprError> {
        let base = self.atom()?;
        if self.peek() == Some(b'*') && self.src.get(self.pos + 1) == Some(&b'*') {
            self.pos += 2;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, ExprError> {
        match self.peek() {
            None => Err(ExprError::UnexpectedEnd),
            Some(b'(') => {
                self.pos += 1;
                let value = self.expr()?;
                match self.peek() {
                    Some(b')') => {
                        self.pos += 1;
                        Ok(value)
                    }
                    Some(b) => Err(ExprError::UnexpectedChar {
                        ch: b as char,
                        pos: self.pos,
                    }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(b) if b.is_ascii_digit() || b == b'.' => self.number(),
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                let start = self.pos;
                while self
                    .src
                    .get(self.pos)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
                {
                    self.pos += 1;
                }
                let name = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                if name == "pi" {
                    Ok(std::f64::consts::PI)
                } else {
                    Err(ExprError::UnknownName(name))
                }
            }
            Some(b) => Err(ExprError::UnexpectedChar {
                ch: b as char,
                pos: self.pos,
            }),
        }
    }

    fn number(&mut self) -> Result<f64, ExprError> {
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit() || *c == b'.')
        {
            self.pos += 1;
        }
        // Exponent: 1e-3, 2.5E4
        if matches!(self.src.get(self.pos), Some(b'e' | b'E')) {
            let mut end = self.pos + 1;
            if matches!(self.src.get(end), Some(b'+' | b'-')) {
                end += 1;
            }
            if self.src.get(end).is_some_and(u8::is_ascii_digit) {
                while self.src.get(end).is_some_and(u8::is_ascii_digit) {
                    end += 1;
                }
                self.pos = end;
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        text.parse::<f64>()
            .map_err(|_| ExprError::InvalidNumber(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_pi_expressions() {
        assert_eq!(evaluate("pi/4").unwrap(), PI / 4.0);
        assert_eq!(evaluate("2 * pi / 3").unwrap(), 2.0 * PI / 3.0);
        assert_eq!(evaluate("-pi").unwrap(), -PI);
    }

    #[test]
    fn test_precedence_and_power() {
        assert_eq!(evaluate("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(evaluate("2 ** 3 ** 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ** 2").unwrap(), -4.0);
        assert_eq!(evaluate("1.5e-1 * 2").unwrap(), 0.3);
    }

    #[test]
    fn test_rejects_other_names_and_garbage() {
        assert_eq!(
            evaluate("e * 2"),
            Err(ExprError::UnknownName("e".into()))
        );
        assert_eq!(
            evaluate("__import__"),
            Err(ExprError::UnknownName("__import__".into()))
        );
        assert!(matches!(
            evaluate("1 +"),
            Err(ExprError::UnexpectedEnd)
        ));
        assert!(matches!(
            evaluate("2 3"),
            Err(ExprError::UnexpectedChar { ch: '3', .. })
        ));
        assert_eq!(evaluate("1/0"), Err(ExprError::NotFinite));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(evaluate(&nested(MAX_EXPRESSION_DEPTH - 1)).unwrap(), 1.0);

        let too_deep = Err(ExprError::TooDeep {
            max: MAX_EXPRESSION_DEPTH,
        });
        assert_eq!(evaluate(&nested(MAX_EXPRESSION_DEPTH)), too_deep);
        assert_eq!(evaluate(&nested(20_000)), too_deep);
        assert_eq!(evaluate(&format!("{}1", "-".repeat(20_000))), too_deep);
        // Sequential operands do not accumulate depth
        assert_eq!(evaluate(&vec!["(1)"; 500].join(" + ")).unwrap(), 500.0);
    }
}
