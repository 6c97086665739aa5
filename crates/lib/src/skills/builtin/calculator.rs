//! Basic arithmetic: `+ - * /`, parentheses, unary signs, decimals.
//!
//! Input is restricted to digits, operators, parentheses, dots and spaces before
//! parsing; anything else is rejected without evaluation.

use super::{handler, single_string_param, str_arg};
use crate::skills::descriptor::{InvocationError, Operation, SkillDescriptor};

const ALLOWED: &str = "0123456789+-*/.() ";

/// Nesting limit for signs and parentheses.
const MAX_DEPTH: usize = 256;

pub(super) fn descriptor() -> SkillDescriptor {
    SkillDescriptor::new(
        "calculator",
        "Perform basic arithmetic calculations (addition, subtraction, multiplication, division)",
    )
    .with_tags(["math", "calculator", "arithmetic"])
    .with_author("Skill System")
    .with_operation(Operation::new(
        "calculator",
        "Evaluate a mathematical expression, e.g. \"2 + 2\" or \"(10 - 4) / 3\"",
        single_string_param("expression", "The arithmetic expression to evaluate"),
        handler(calculate),
    ))
}

fn calculate(args: &serde_json::Value) -> Result<String, InvocationError> {
    let expression = str_arg(args, "expression")?;
    let value = evaluate(&expression)?;
    Ok(format!("Result: {}", format_number(value)))
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, InvocationError> {
    if !expression.chars().all(|c| ALLOWED.contains(c)) {
        return Err(InvocationError::InvalidArgument(
            "only basic arithmetic operations (+, -, *, /) are allowed".to_string(),
        ));
    }
    let tokens: Vec<char> = expression.chars().filter(|c| *c != ' ').collect();
    if tokens.is_empty() {
        return Err(InvocationError::InvalidArgument("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(InvocationError::InvalidArgument(format!(
            "unexpected '{}' at position {}",
            parser.tokens[parser.pos], parser.pos
        )));
    }
    Ok(value)
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

struct Parser {
    tokens: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, InvocationError> {
        let mut acc = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == '+' {
                acc += rhs;
            } else {
                acc -= rhs;
            }
        }
        Ok(acc)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<f64, InvocationError> {
        let mut acc = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == '*' {
                acc *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err(InvocationError::Execution("division by zero".to_string()));
                }
                acc /= rhs;
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<f64, InvocationError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(InvocationError::InvalidArgument(
                "expression nested too deeply".to_string(),
            ));
        }
        let v = self.unary();
        self.depth -= 1;
        v
    }

    // factor := ('+' | '-') factor | number | '(' expr ')'
    fn unary(&mut self) -> Result<f64, InvocationError> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some('+') => {
                self.pos += 1;
                self.factor()
            }
            Some('(') => {
                self.pos += 1;
                let v = self.expr()?;
                if self.peek() != Some(')') {
                    return Err(InvocationError::InvalidArgument(
                        "missing closing parenthesis".to_string(),
                    ));
                }
                self.pos += 1;
                Ok(v)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(InvocationError::InvalidArgument(format!(
                "unexpected '{}' at position {}",
                c, self.pos
            ))),
            None => Err(InvocationError::InvalidArgument(
                "unexpected end of expression".to_string(),
            )),
        }
    }

    fn number(&mut self) -> Result<f64, InvocationError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let literal: String = self.tokens[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| InvocationError::InvalidArgument(format!("invalid number: {}", literal)))
    }
}
