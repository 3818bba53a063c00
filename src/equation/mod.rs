//! Small arithmetic formula evaluator for the level equation
//!
//! Recursive descent over the grammar
//! `expr := term (('+'|'-') term)*`,
//! `term := factor (('*'|'/') factor)*`,
//! `factor := ('+'|'-') factor | '(' expr ')' | number | ident '(' factor ')'
//! | factor '^' factor`.
//!
//! Evaluation is pure: the same formula text and the same variable
//! bindings always produce the same value.

use std::collections::HashMap;
use thiserror::Error;

/// Errors produced while parsing or evaluating a formula
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EquationError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unknown function or variable '{name}' at position {pos}")]
    UnknownIdent { name: String, pos: usize },

    #[error("unexpected trailing input at position {pos}")]
    TrailingInput { pos: usize },

    #[error("unexpected end of formula")]
    UnexpectedEnd,
}

/// Variable bindings looked up during evaluation
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    vars: HashMap<String, f64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: f64) -> Self {
        self.vars.insert(name.to_string(), value);
        self
    }

    fn get(&self, name: &str) -> Option<f64> {
        self.vars.get(name).copied()
    }
}

/// Check that a formula parses, without caring about variable values.
///
/// Used at configuration load time; every variable referenced by the
/// formula must appear in `known_vars`.
pub fn validate(formula: &str, known_vars: &[&str]) -> Result<(), EquationError> {
    let mut bindings = Bindings::new();
    for name in known_vars {
        bindings = bindings.set(name, 1.0);
    }
    evaluate(formula, &bindings).map(|_| ())
}

/// Evaluate a formula against the given bindings
pub fn evaluate(formula: &str, bindings: &Bindings) -> Result<f64, EquationError> {
    let mut parser = Parser {
        chars: formula.chars().collect(),
        pos: 0,
        bindings,
    };
    let value = parser.expr()?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(EquationError::TrailingInput { pos: parser.pos });
    }
    Ok(value)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    bindings: &'a Bindings,
}

impl<'a> Parser<'a> {
    fn skip_whitespace(&mut self) {
        while self
            .chars
            .get(self.pos)
            .map(|c| c.is_whitespace())
            .unwrap_or(false)
        {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.get(self.pos).copied()
    }

    /// Consume `expected` if it is the next non-whitespace character
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64, EquationError> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, EquationError> {
        let mut value = self.factor()?;
        loop {
            if self.eat('*') {
                value *= self.factor()?;
            } else if self.eat('/') {
                value /= self.factor()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn factor(&mut self) -> Result<f64, EquationError> {
        let mut value = if self.eat('+') {
            self.factor()?
        } else if self.eat('-') {
            -self.factor()?
        } else if self.eat('(') {
            let inner = self.expr()?;
            if !self.eat(')') {
                return match self.peek() {
                    Some(ch) => Err(EquationError::UnexpectedChar { ch, pos: self.pos }),
                    None => Err(EquationError::UnexpectedEnd),
                };
            }
            inner
        } else {
            match self.peek() {
                Some(c) if c.is_ascii_digit() || c == '.' => self.number()?,
                Some(c) if c.is_ascii_alphabetic() || c == '_' => self.ident()?,
                Some(ch) => return Err(EquationError::UnexpectedChar { ch, pos: self.pos }),
                None => return Err(EquationError::UnexpectedEnd),
            }
        };

        // Exponentiation binds tighter than '*' and is right-associative
        while self.eat('^') {
            value = value.powf(self.factor()?);
        }
        Ok(value)
    }

    fn number(&mut self) -> Result<f64, EquationError> {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .map(|c| c.is_ascii_digit() || *c == '.')
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse().map_err(|_| EquationError::UnexpectedChar {
            ch: self.chars[start],
            pos: start,
        })
    }

    fn ident(&mut self) -> Result<f64, EquationError> {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .map(|c| c.is_ascii_alphanumeric() || *c == '_')
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        if self.eat('(') {
            let arg = self.expr()?;
            if !self.eat(')') {
                return match self.peek() {
                    Some(ch) => Err(EquationError::UnexpectedChar { ch, pos: self.pos }),
                    None => Err(EquationError::UnexpectedEnd),
                };
            }
            return match name.as_str() {
                "sqrt" => Ok(arg.sqrt()),
                "sin" => Ok(arg.to_radians().sin()),
                "cos" => Ok(arg.to_radians().cos()),
                "tan" => Ok(arg.to_radians().tan()),
                "log" => Ok(arg.ln()),
                _ => Err(EquationError::UnknownIdent { name, pos: start }),
            };
        }

        self.bindings
            .get(&name)
            .ok_or(EquationError::UnknownIdent { name, pos: start })
    }
}
