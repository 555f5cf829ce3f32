//! Calculator tool: evaluates arithmetic expressions.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! sum     = product (('+' | '-') product)*
//! product = unary (('*' | '/' | '%') unary)*
//! unary   = ('-' | '+') unary | power
//! power   = atom ('^' unary)?          right-associative
//! atom    = NUMBER | IDENT '(' sum ')' | '(' sum ')'
//! ```

use agentrelay_core::context::ToolContext;
use agentrelay_core::error::ToolError;
use agentrelay_core::tool::{Discovery, ParamType, Parameter, Tool, ToolArgs, ToolOutput};
use async_trait::async_trait;
use tracing::debug;

const FUNCTIONS: &[&str] = &["sqrt", "abs", "round", "floor", "ceil"];

pub struct CalculatorTool {
    params: Vec<Parameter>,
    discovery: Discovery,
}

impl CalculatorTool {
    pub fn new() -> Self {
        Self {
            params: vec![
                Parameter::required(
                    "expression",
                    ParamType::String,
                    "The expression to evaluate, e.g. '(2 + 3) * 4'",
                )
                .with_validator(|value| match value.as_str() {
                    Some(s) if !s.trim().is_empty() => Ok(()),
                    _ => Err("expression must not be empty".into()),
                }),
            ],
            discovery: Discovery::new("Evaluates arithmetic expressions.")
                .with_advanced(
                    "Operators: + - * / % ^ and parentheses, unary minus. \
                     Functions: sqrt, abs, round, floor, ceil. \
                     Whole-number results are printed without a decimal point.",
                )
                .with_troubleshooting(
                    "Division or modulo by zero and square roots of negative numbers are errors. \
                     Write multiplication explicitly: 2*(3+4), not 2(3+4).",
                ),
        }
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses and sqrt/abs/round/floor/ceil."
    }

    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    fn discovery(&self) -> Option<&Discovery> {
        Some(&self.discovery)
    }

    async fn call(&self, _ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let expression = args
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("expression must be a string".into()))?;

        match evaluate(expression) {
            Ok(value) => {
                debug!(expression, value, "calculator evaluated");
                Ok(ToolOutput::success(format_number(value)))
            }
            Err(e) => Ok(ToolOutput::error(e)),
        }
    }
}

/// Print whole numbers without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("empty expression".into());
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.sum()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("unexpected token {tok:?} at position {}", parser.pos));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".into());
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if !(d.is_ascii_digit() || d == '.') {
                        break;
                    }
                    literal.push(d);
                    chars.next();
                }
                let n = literal
                    .parse()
                    .map_err(|_| format!("invalid number: {literal}"))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_ascii_alphabetic() => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_alphanumeric() {
                        break;
                    }
                    ident.push(d);
                    chars.next();
                }
                tokens.push(Token::Ident(ident.to_ascii_lowercase()));
            }
            other => return Err(format!("unexpected character: '{other}'")),
        }
    }

    Ok(tokens)
}

/// Deepest nesting of parentheses, signs and exponents the parser accepts.
const MAX_DEPTH: usize = 256;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += usize::from(tok.is_some());
        tok
    }

    fn peek_op(&self) -> Option<char> {
        match self.peek() {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn sum(&mut self) -> Result<f64, String> {
        let mut acc = self.product()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.product()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn product(&mut self) -> Result<f64, String> {
        let mut acc = self.unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.unary()?;
            acc = match op {
                '*' => acc * rhs,
                _ if rhs == 0.0 => return Err("division by zero".into()),
                '/' => acc / rhs,
                _ => acc % rhs,
            };
        }
        Ok(acc)
    }

    // Every recursive path passes through here.
    fn unary(&mut self) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64, String> {
        match self.peek_op() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, String> {
        let base = self.atom()?;
        if self.peek_op() == Some('^') {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let inner = self.sum()?;
                self.close()?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if !FUNCTIONS.contains(&name.as_str()) {
                    return Err(format!("unknown function: {name}"));
                }
                if self.next() != Some(Token::Open) {
                    return Err(format!("expected '(' after {name}"));
                }
                let arg = self.sum()?;
                self.close()?;
                apply(&name, arg)
            }
            Some(tok) => Err(format!("unexpected token {tok:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn close(&mut self) -> Result<(), String> {
        match self.next() {
            Some(Token::Close) => Ok(()),
            _ => Err("missing closing parenthesis".into()),
        }
    }
}

fn apply(function: &str, arg: f64) -> Result<f64, String> {
    match function {
        "sqrt" if arg < 0.0 => Err("square root of a negative number".into()),
        "sqrt" => Ok(arg.sqrt()),
        "abs" => Ok(arg.abs()),
        "round" => Ok(arg.round()),
        "floor" => Ok(arg.floor()),
        "ceil" => Ok(arg.ceil()),
        other => Err(format!("unknown function: {other}")),
    }
}
