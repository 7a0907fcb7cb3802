//! Expression trees for bindings, interpolations and event handlers.

use std::fmt;

use lumen_core::Value;
use once_cell::sync::Lazy;
use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};

use crate::error::CompileError;

#[derive(pest_derive::Parser)]
#[grammar = "expr.pest"]
struct ExprParser;

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::nullish, Assoc::Left))
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left)
            | Op::infix(Rule::strict_eq, Assoc::Left)
            | Op::infix(Rule::strict_ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::prefix(Rule::not) | Op::prefix(Rule::neg) | Op::prefix(Rule::pos))
        .op(Op::postfix(Rule::member)
            | Op::postfix(Rule::optional_member)
            | Op::postfix(Rule::index)
            | Op::postfix(Rule::call))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Nullish,
    Or,
    And,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Nullish => "??",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    /// `input | name:arg:arg`
    Pipe {
        name: String,
        input: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `name = value`, only inside event handlers.
    Assign {
        target: String,
        value: Box<Expr>,
    },
}

/// Parse a binding or interpolation expression (pipes allowed, no assignment).
pub fn parse_binding(src: &str) -> Result<Expr, CompileError> {
    let mut pairs = ExprParser::parse(Rule::binding, src).map_err(|e| invalid(src, e))?;
    let binding = pairs.next().map(Pair::into_inner);
    let pipeline = binding.and_then(|mut inner| inner.find(|p| p.as_rule() == Rule::pipeline));
    match pipeline {
        Some(p) => Ok(build_pipeline(p)),
        None => Err(CompileError::Expression {
            expression: src.to_string(),
            message: "empty expression".to_string(),
        }),
    }
}

/// Parse an event handler: `;`-separated statements, assignments allowed.
pub fn parse_handler(src: &str) -> Result<Vec<Expr>, CompileError> {
    let mut pairs = ExprParser::parse(Rule::handler, src).map_err(|e| invalid(src, e))?;
    let Some(handler) = pairs.next() else {
        return Ok(Vec::new());
    };
    Ok(handler
        .into_inner()
        .filter_map(|p| match p.as_rule() {
            Rule::assignment => Some(build_assignment(p)),
            Rule::pipeline => Some(build_pipeline(p)),
            _ => None,
        })
        .collect())
}

fn invalid(src: &str, err: pest::error::Error<Rule>) -> CompileError {
    CompileError::Expression {
        expression: src.to_string(),
        message: err.variant.message().into_owned(),
    }
}

fn build_assignment(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let target = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
    let value = inner.next().map(build_pipeline).unwrap_or(Expr::Literal(Value::Null));
    Expr::Assign {
        target,
        value: Box::new(value),
    }
}

fn build_pipeline(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let mut expr = inner
        .next()
        .map(build_conditional)
        .unwrap_or(Expr::Literal(Value::Null));
    for pipe in inner {
        let mut parts = pipe.into_inner();
        let name = parts.next().map(|p| p.as_str().to_string()).unwrap_or_default();
        let args = parts.map(|p| build_infix(p.into_inner())).collect();
        expr = Expr::Pipe {
            name,
            input: Box::new(expr),
            args,
        };
    }
    expr
}

fn build_conditional(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let condition = inner
        .next()
        .map(|p| build_infix(p.into_inner()))
        .unwrap_or(Expr::Literal(Value::Null));
    match (inner.next(), inner.next()) {
        (Some(then), Some(otherwise)) => Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(build_conditional(then)),
            otherwise: Box::new(build_conditional(otherwise)),
        },
        _ => condition,
    }
}

fn build_infix(pairs: Pairs<Rule>) -> Expr {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::not => UnaryOp::Not,
                Rule::neg => UnaryOp::Neg,
                _ => UnaryOp::Pos,
            };
            Expr::Unary {
                op,
                operand: Box::new(operand),
            }
        })
        .map_postfix(|object, op| match op.as_rule() {
            Rule::member | Rule::optional_member => Expr::Member {
                optional: op.as_rule() == Rule::optional_member,
                property: op
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default(),
                object: Box::new(object),
            },
            Rule::index => Expr::Index {
                object: Box::new(object),
                index: Box::new(
                    op.into_inner()
                        .next()
                        .map(build_pipeline)
                        .unwrap_or(Expr::Literal(Value::Null)),
                ),
            },
            _ => Expr::Call {
                callee: Box::new(object),
                args: op.into_inner().map(build_pipeline).collect(),
            },
        })
        .map_infix(|left, op, right| {
            let op = match op.as_rule() {
                Rule::nullish => BinaryOp::Nullish,
                Rule::or => BinaryOp::Or,
                Rule::and => BinaryOp::And,
                Rule::eq => BinaryOp::Eq,
                Rule::ne => BinaryOp::Ne,
                Rule::strict_eq => BinaryOp::StrictEq,
                Rule::strict_ne => BinaryOp::StrictNe,
                Rule::lt => BinaryOp::Lt,
                Rule::le => BinaryOp::Le,
                Rule::gt => BinaryOp::Gt,
                Rule::ge => BinaryOp::Ge,
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                Rule::div => BinaryOp::Div,
                _ => BinaryOp::Rem,
            };
            Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }
        })
        .parse(pairs)
}

fn build_primary(pair: Pair<Rule>) -> Expr {
    match pair.as_rule() {
        Rule::number => Expr::Literal(Value::Number(pair.as_str().parse().unwrap_or(f64::NAN))),
        Rule::string => {
            let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Expr::Literal(Value::from(unescape(raw)))
        }
        Rule::boolean => Expr::Literal(Value::Bool(pair.as_str() == "true")),
        Rule::null => Expr::Literal(Value::Null),
        Rule::array => Expr::Array(pair.into_inner().map(build_pipeline).collect()),
        Rule::object => Expr::Object(
            pair.into_inner()
                .map(|entry| {
                    let mut parts = entry.into_inner();
                    let key = match parts.next() {
                        Some(k) if k.as_rule() == Rule::string => {
                            unescape(k.into_inner().next().map(|p| p.as_str()).unwrap_or(""))
                        }
                        Some(k) => k.as_str().to_string(),
                        None => String::new(),
                    };
                    let value = parts
                        .next()
                        .map(build_pipeline)
                        .unwrap_or(Expr::Literal(Value::Null));
                    (key, value)
                })
                .collect(),
        ),
        Rule::ident => Expr::Ident(pair.as_str().to_string()),
        Rule::pipeline => build_pipeline(pair),
        _ => Expr::Literal(Value::Null),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn string_lit(s: &str, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    out.write_str("'")?;
    for ch in s.chars() {
        match ch {
            '\\' => out.write_str("\\\\")?,
            '\'' => out.write_str("\\'")?,
            '\n' => out.write_str("\\n")?,
            _ => write!(out, "{ch}")?,
        }
    }
    out.write_str("'")
}

fn comma_separated(items: &[Expr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Source form, with pipes expanded into `pipe('name').transform(..)` calls.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Str(s)) => string_lit(s, f),
            Expr::Literal(Value::Null) => f.write_str("null"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Ident(name) => f.write_str(name),
            Expr::Member {
                object,
                property,
                optional,
            } => write!(f, "{object}{}{property}", if *optional { "?." } else { "." }),
            Expr::Index { object, index } => write!(f, "{object}[{index}]"),
            Expr::Call { callee, args } => {
                write!(f, "{callee}(")?;
                comma_separated(args, f)?;
                f.write_str(")")
            }
            Expr::Unary { op, operand } => {
                let sym = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                };
                write!(f, "{sym}{operand}")
            }
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => write!(f, "({condition} ? {then} : {otherwise})"),
            Expr::Array(items) => {
                f.write_str("[")?;
                comma_separated(items, f)?;
                f.write_str("]")
            }
            Expr::Object(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    string_lit(key, f)?;
                    write!(f, ": {value}")?;
                }
                f.write_str("}")
            }
            Expr::Pipe { name, input, args } => {
                f.write_str("pipe(")?;
                string_lit(name, f)?;
                write!(f, ").transform({input}")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                f.write_str(")")
            }
            Expr::Assign { target, value } => write!(f, "{target} = {value}"),
        }
    }
}
