use std::cmp::Ordering;

use rulehunter_core::Value;

use super::error::ExprErrorKind;
use super::functions::normalise;
use super::lexer::Op;
use super::parser::Node;
use super::{equal, Vars};

pub(crate) fn eval(node: &Node, vars: &dyn Vars) -> Result<Value, ExprErrorKind> {
    match node {
        Node::Lit(v) => Ok(v.clone()),
        Node::Var(name) => vars
            .var(name)
            .cloned()
            .ok_or_else(|| ExprErrorKind::VarNotExist(name.clone())),
        Node::Unary(op, inner) => {
            let v = eval(inner, vars)?;
            match op {
                Op::Not => Ok(Value::Bool(!boolean(&v)?)),
                Op::Sub => match normalise(&v) {
                    Value::Int(i) => Ok(i
                        .checked_neg()
                        .map_or(Value::Float(-(i as f64)), Value::Int)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    _ => Err(ExprErrorKind::IncompatibleTypes),
                },
                _ => Err(ExprErrorKind::IncompatibleTypes),
            }
        }
        Node::Binary(Op::And, l, r) => {
            if !boolean(&eval(l, vars)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(boolean(&eval(r, vars)?)?))
        }
        Node::Binary(Op::Or, l, r) => {
            if boolean(&eval(l, vars)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(boolean(&eval(r, vars)?)?))
        }
        Node::Binary(op, l, r) => {
            let l = eval(l, vars)?;
            let r = eval(r, vars)?;
            binary(*op, &l, &r)
        }
        Node::Call(func, args) => {
            let args = args
                .iter()
                .map(|a| eval(a, vars))
                .collect::<Result<Vec<_>, _>>()?;
            func.call(&args)
        }
    }
}

fn boolean(v: &Value) -> Result<bool, ExprErrorKind> {
    match v {
        Value::Bool(b) => Ok(*b),
        _ => Err(ExprErrorKind::IncompatibleTypes),
    }
}

fn binary(op: Op, l: &Value, r: &Value) -> Result<Value, ExprErrorKind> {
    if l.is_error() || r.is_error() {
        return Err(ExprErrorKind::IncompatibleTypes);
    }
    match op {
        Op::Eq => Ok(Value::Bool(equal(l, r))),
        Op::Ne => Ok(Value::Bool(!equal(l, r))),
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let ord = order(l, r)?;
            let result = match op {
                Op::Lt => ord == Ordering::Less,
                Op::Le => ord != Ordering::Greater,
                Op::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => arith(op, l, r),
        Op::And | Op::Or | Op::Not => Err(ExprErrorKind::IncompatibleTypes),
    }
}

fn order(l: &Value, r: &Value) -> Result<Ordering, ExprErrorKind> {
    match (normalise(l), normalise(r)) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(&b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(&b)),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).ok_or(ExprErrorKind::IncompatibleTypes),
            _ => Err(ExprErrorKind::IncompatibleTypes),
        },
    }
}

fn arith(op: Op, l: &Value, r: &Value) -> Result<Value, ExprErrorKind> {
    match (normalise(l), normalise(r)) {
        (Value::Int(a), Value::Int(b)) => {
            if matches!(op, Op::Div | Op::Mod) && b == 0 {
                return Err(ExprErrorKind::DivideByZero);
            }
            let exact = match op {
                Op::Add => a.checked_add(b),
                Op::Sub => a.checked_sub(b),
                Op::Mul => a.checked_mul(b),
                Op::Div => a.checked_rem(b).filter(|rem| *rem == 0).and_then(|_| a.checked_div(b)),
                _ => a.checked_rem(b),
            };
            match exact {
                Some(i) => Ok(Value::Int(i)),
                None => float_arith(op, a as f64, b as f64),
            }
        }
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => float_arith(op, x, y),
            _ => Err(ExprErrorKind::IncompatibleTypes),
        },
    }
}

fn float_arith(op: Op, a: f64, b: f64) -> Result<Value, ExprErrorKind> {
    let r = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div | Op::Mod if b == 0.0 => return Err(ExprErrorKind::DivideByZero),
        Op::Div => a / b,
        _ => a % b,
    };
    if r.is_finite() {
        Ok(Value::Float(r))
    } else {
        Err(ExprErrorKind::IncompatibleTypes)
    }
}
