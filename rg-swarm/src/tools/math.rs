//! Arithmetic evaluation for the math specialist.
//!
//! A small recursive-descent evaluator over `+ - * / ( )` with decimal
//! and scientific literals. Input is sanitized against an allow-list
//! before parsing. Every failure is a domain error reported back into
//! the conversation as a tool message.

use async_trait::async_trait;
use serde_json::{Value, json};

use relaygraph::message::Message;

use super::{Tool, ToolError, ToolInvocation, ToolOutcome, require_str_arg};
use crate::fields;

const ALLOWED_CHARS: &str = "0123456789+-*/().eE ";

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, String> {
    if expression.trim().is_empty() {
        return Err("expression is empty".to_string());
    }
    if let Some(bad) = expression.chars().find(|c| !ALLOWED_CHARS.contains(*c)) {
        return Err(format!("invalid character {bad:?} in expression"));
    }
    let tokens: Vec<char> = expression.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!(
            "unexpected input at position {}",
            parser.pos
        ));
    }
    if !value.is_finite() {
        return Err("expression does not evaluate to a finite number".to_string());
    }
    Ok(value)
}

struct Parser<'a> {
    tokens: &'a [char],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.bump();
                    value += self.term()?;
                }
                '-' => {
                    self.bump();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                '*' => {
                    self.bump();
                    value *= self.factor()?;
                }
                '/' => {
                    self.bump();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.bump();
                Ok(-self.factor()?)
            }
            Some('+') => {
                self.bump();
                self.factor()
            }
            Some('(') => {
                self.bump();
                let value = self.expr()?;
                if self.bump() != Some(')') {
                    return Err("missing closing parenthesis".to_string());
                }
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(format!("unexpected {c:?} in expression")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        // Optional exponent: e or E, optional sign, digits.
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                return Err("malformed exponent".to_string());
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let literal: String = self.tokens[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| format!("malformed number {literal:?}"))
    }
}

/// Render a result the way a person would write it: integers without a
/// trailing fraction.
fn format_result(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn result_json(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// `calculate` tool: evaluates an expression and records the result in
/// the math domain fields.
pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression (+, -, *, /, parentheses)."
    }

    async fn invoke(&self, invocation: ToolInvocation<'_>) -> Result<ToolOutcome, ToolError> {
        let expression = match require_str_arg(
            &invocation.arguments,
            "expression",
            self.name(),
            invocation.tool_call_id,
        ) {
            Ok(e) => e,
            Err(outcome) => return Ok(*outcome),
        };

        match evaluate(expression) {
            Ok(value) => {
                let mut fields = relaygraph::utils::collections::new_extra_map();
                fields.insert(fields::MATH_EXPRESSION.to_string(), json!(expression));
                fields.insert(fields::MATH_RESULT.to_string(), result_json(value));
                Ok(ToolOutcome::update(
                    Message::tool(
                        &format!("The result of {expression} is {}", format_result(value)),
                        invocation.tool_call_id,
                    ),
                    fields,
                ))
            }
            Err(reason) => Ok(ToolOutcome::reply(Message::tool(
                &format!("Could not calculate {expression}: {reason}"),
                invocation.tool_call_id,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_precedence_and_parens() {
        assert_eq!(evaluate("12 * 4").unwrap(), 48.0);
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("1.5e2 / 3").unwrap(), 50.0);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(evaluate("12 * x").is_err());
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("1 + + ").is_err());
    }

    #[test]
    fn formats_integers_plainly() {
        assert_eq!(format_result(48.0), "48");
        assert_eq!(format_result(0.5), "0.5");
    }

    mod properties {
        use super::super::evaluate;
        use proptest::prelude::*;

        proptest! {
            // The evaluator must never panic, whatever the input looks like.
            #[test]
            fn never_panics(expr in "[0-9+\\-*/(). eE]{0,24}") {
                let _ = evaluate(&expr);
            }
        }
    }
}
