//! Tree-walking evaluation of template expressions with JavaScript-like
//! semantics (truthiness, `+` concatenation, loose and strict equality).

use std::rc::Rc;

use lumen_core::Value;
use tracing::warn;

use crate::error::EvalError;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::pipes::Pipe;

/// Name resolution for template expressions.
pub trait Scope {
    /// Value bound to `name`, or `None` when unbound (evaluates to null).
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Handle `name = value` from an event handler.
    fn assign(&self, name: &str, _value: Value) -> Result<(), EvalError> {
        Err(EvalError::InvalidAssignment(name.to_string()))
    }

    fn pipe(&self, _name: &str) -> Option<Rc<dyn Pipe>> {
        None
    }
}

/// Loop locals layered over a parent scope. Later bindings shadow earlier ones.
pub struct Locals<'a> {
    parent: &'a dyn Scope,
    vars: &'a [(Rc<str>, Value)],
}

impl<'a> Locals<'a> {
    pub fn new(parent: &'a dyn Scope, vars: &'a [(Rc<str>, Value)]) -> Self {
        Self { parent, vars }
    }
}

impl Scope for Locals<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v.clone())
            .or_else(|| self.parent.lookup(name))
    }

    fn assign(&self, name: &str, value: Value) -> Result<(), EvalError> {
        if self.vars.iter().any(|(n, _)| &**n == name) {
            return Err(EvalError::InvalidAssignment(name.to_string()));
        }
        self.parent.assign(name, value)
    }

    fn pipe(&self, name: &str) -> Option<Rc<dyn Pipe>> {
        self.parent.pipe(name)
    }
}

/// A scope with nothing in it.
pub struct EmptyScope;

impl Scope for EmptyScope {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

pub fn evaluate(expr: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => Ok(scope.lookup(name).unwrap_or_default()),
        Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
            Ok(chain(expr, scope)?.unwrap_or_default())
        }
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, scope)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!v.is_truthy()),
                UnaryOp::Neg => Value::Number(-v.to_number()),
                UnaryOp::Pos => Value::Number(v.to_number()),
            })
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, scope),
        Expr::Ternary {
            condition,
            then,
            otherwise,
        } => {
            if evaluate(condition, scope)?.is_truthy() {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
        Expr::Array(items) => {
            let values = items
                .iter()
                .map(|item| evaluate(item, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(values))
        }
        Expr::Object(entries) => {
            let mut fields = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                fields.push((key.clone(), evaluate(value, scope)?));
            }
            Ok(Value::object(fields))
        }
        Expr::Pipe { name, input, args } => {
            let value = evaluate(input, scope)?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            match scope.pipe(name) {
                Some(pipe) => pipe.transform(value, &args),
                None => {
                    warn!(pipe = %name, "unknown pipe, passing value through");
                    Ok(value)
                }
            }
        }
        Expr::Assign { target, value } => {
            let v = evaluate(value, scope)?;
            scope.assign(target, v.clone())?;
            Ok(v)
        }
    }
}

/// Run handler statements in order, returning the last value.
pub fn execute(statements: &[Expr], scope: &dyn Scope) -> Result<Value, EvalError> {
    let mut last = Value::Null;
    for statement in statements {
        last = evaluate(statement, scope)?;
    }
    Ok(last)
}

/// Member / index / call chains. `Ok(None)` means an optional access
/// short-circuited, which makes the rest of the chain null too.
fn chain(expr: &Expr, scope: &dyn Scope) -> Result<Option<Value>, EvalError> {
    match expr {
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let Some(base) = chain(object, scope)? else {
                return Ok(None);
            };
            if base.is_null() {
                return if *optional {
                    Ok(None)
                } else {
                    Err(EvalError::NullAccess {
                        property: property.clone(),
                    })
                };
            }
            Ok(Some(base.get(property)))
        }
        Expr::Index { object, index } => {
            let Some(base) = chain(object, scope)? else {
                return Ok(None);
            };
            let index = evaluate(index, scope)?;
            if base.is_null() {
                return Err(EvalError::NullAccess {
                    property: index.to_string(),
                });
            }
            Ok(Some(base.index(&index)))
        }
        Expr::Call { callee, args } => {
            let Some(target) = chain(callee, scope)? else {
                return Ok(None);
            };
            let Some(func) = target.as_func() else {
                return Err(EvalError::NotCallable(callee.to_string()));
            };
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(func.call(&args)?))
        }
        other => evaluate(other, scope).map(Some),
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
    let l = evaluate(left, scope)?;
    match op {
        BinaryOp::And if !l.is_truthy() => return Ok(l),
        BinaryOp::Or if l.is_truthy() => return Ok(l),
        BinaryOp::Nullish if !l.is_null() => return Ok(l),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => return evaluate(right, scope),
        _ => {}
    }
    let r = evaluate(right, scope)?;
    let ordered = |accept: fn(std::cmp::Ordering) -> bool| {
        Value::Bool(l.compare(&r).is_some_and(accept))
    };
    Ok(match op {
        BinaryOp::Eq => Value::Bool(l.loose_eq(&r)),
        BinaryOp::Ne => Value::Bool(!l.loose_eq(&r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_eq(&r)),
        BinaryOp::StrictNe => Value::Bool(!l.strict_eq(&r)),
        BinaryOp::Lt => ordered(|o| o.is_lt()),
        BinaryOp::Le => ordered(|o| o.is_le()),
        BinaryOp::Gt => ordered(|o| o.is_gt()),
        BinaryOp::Ge => ordered(|o| o.is_ge()),
        BinaryOp::Add => add(&l, &r),
        BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinaryOp::Rem => Value::Number(l.to_number() % r.to_number()),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => r.clone(),
    })
}

fn add(l: &Value, r: &Value) -> Value {
    let numeric = |v: &Value| matches!(v, Value::Null | Value::Bool(_) | Value::Number(_));
    if numeric(l) && numeric(r) {
        Value::Number(l.to_number() + r.to_number())
    } else {
        Value::from(format!("{l}{r}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{parse_binding, parse_handler};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MapScope(RefCell<BTreeMap<String, Value>>);

    impl Scope for MapScope {
        fn lookup(&self, name: &str) -> Option<Value> {
            self.0.borrow().get(name).cloned()
        }

        fn assign(&self, name: &str, value: Value) -> Result<(), EvalError> {
            self.0.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
    }

    fn eval(src: &str, scope: &dyn Scope) -> Value {
        evaluate(&parse_binding(src).unwrap(), scope).unwrap()
    }

    #[test]
    fn arithmetic_and_concat() {
        assert_eq!(eval("1 + 2 * 3", &EmptyScope), Value::from(7));
        assert_eq!(eval("'a' + 1", &EmptyScope), Value::from("a1"));
        assert_eq!(eval("7 % 4", &EmptyScope), Value::from(3));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(eval("0 || 'x'", &EmptyScope), Value::from("x"));
        assert_eq!(eval("'' && 'x'", &EmptyScope), Value::from(""));
        assert_eq!(eval("missing ?? 5", &EmptyScope), Value::from(5));
        assert_eq!(eval("0 ?? 5", &EmptyScope), Value::from(0));
    }

    #[test]
    fn equality_flavours() {
        assert_eq!(eval("1 == '1'", &EmptyScope), Value::Bool(true));
        assert_eq!(eval("1 === '1'", &EmptyScope), Value::Bool(false));
        assert_eq!(eval("'b' > 'a'", &EmptyScope), Value::Bool(true));
    }

    #[test]
    fn member_access_on_null() {
        let scope = MapScope::default();
        assert_eq!(eval("user?.name.first", &scope), Value::Null);
        let err = evaluate(&parse_binding("user.name").unwrap(), &scope).unwrap_err();
        assert_eq!(
            err,
            EvalError::NullAccess {
                property: "name".into()
            }
        );
    }

    #[test]
    fn length_of_lists_and_strings() {
        let scope = MapScope::default();
        scope.assign("items", Value::list([1, 2, 3])).unwrap();
        assert_eq!(eval("items.length", &scope), Value::from(3));
        assert_eq!(eval("'hello'.length", &scope), Value::from(5));
        assert_eq!(eval("items[1]", &scope), Value::from(2));
    }

    #[test]
    fn handler_assigns() {
        let scope = MapScope::default();
        scope.assign("count", Value::from(1)).unwrap();
        let stmts = parse_handler("count = count + 1; count = count * 10").unwrap();
        assert_eq!(execute(&stmts, &scope).unwrap(), Value::from(20));
        assert_eq!(scope.lookup("count"), Some(Value::from(20)));
    }

    #[test]
    fn locals_are_read_only() {
        let vars = [(Rc::<str>::from("x"), Value::from(1))];
        let parent = MapScope::default();
        let scope = Locals::new(&parent, &vars);
        assert_eq!(eval("x + 1", &scope), Value::from(2));
        assert!(scope.assign("x", Value::from(2)).is_err());
        assert!(scope.assign("y", Value::from(2)).is_ok());
    }

    #[test]
    fn calling_a_non_function() {
        let err = evaluate(&parse_binding("nope(1)").unwrap(), &EmptyScope).unwrap_err();
        assert_eq!(err, EvalError::NotCallable("nope".into()));
    }

    #[test]
    fn unknown_pipe_passes_through() {
        assert_eq!(eval("'x' | missing", &EmptyScope), Value::from("x"));
    }
}
