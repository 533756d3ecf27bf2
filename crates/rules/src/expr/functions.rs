use rulehunter_core::value::round_to;
use rulehunter_core::Value;

use super::error::ExprErrorKind;
use super::equal;

/// The fixed function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    RoundTo,
    Min,
    Max,
    Abs,
    Sqrt,
    Pow,
    In,
    Ni,
    Count,
    True,
    False,
}

impl Func {
    pub(crate) fn lookup(name: &str) -> Option<Func> {
        let func = match name {
            "roundto" => Func::RoundTo,
            "min" => Func::Min,
            "max" => Func::Max,
            "abs" => Func::Abs,
            "sqrt" => Func::Sqrt,
            "pow" => Func::Pow,
            "in" => Func::In,
            "ni" => Func::Ni,
            "count" => Func::Count,
            "true" => Func::True,
            "false" => Func::False,
            _ => return None,
        };
        Some(func)
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Func::RoundTo => "roundto",
            Func::Min => "min",
            Func::Max => "max",
            Func::Abs => "abs",
            Func::Sqrt => "sqrt",
            Func::Pow => "pow",
            Func::In => "in",
            Func::Ni => "ni",
            Func::Count => "count",
            Func::True => "true",
            Func::False => "false",
        }
    }

    pub(crate) fn accepts(self, n: usize) -> bool {
        match self {
            Func::True | Func::False => n == 0,
            Func::Abs | Func::Sqrt => n == 1,
            Func::RoundTo | Func::Pow => n == 2,
            Func::Min | Func::Max => n >= 1,
            Func::In | Func::Ni | Func::Count => n >= 2,
        }
    }

    pub(crate) fn call(self, args: &[Value]) -> Result<Value, ExprErrorKind> {
        if args.iter().any(Value::is_error) {
            return Err(ExprErrorKind::IncompatibleTypes);
        }
        match self {
            Func::True => Ok(Value::Bool(true)),
            Func::False => Ok(Value::Bool(false)),
            Func::RoundTo => {
                let x = number(&args[0])?;
                let dp = args[1]
                    .as_i64()
                    .filter(|dp| *dp >= 0)
                    .ok_or(ExprErrorKind::IncompatibleTypes)?;
                Ok(Value::number(round_to(x, dp as usize), dp as usize))
            }
            Func::Min | Func::Max => {
                let mut best = &args[0];
                let mut best_n = number(best)?;
                for arg in &args[1..] {
                    let n = number(arg)?;
                    let better = if self == Func::Min { n < best_n } else { n > best_n };
                    if better {
                        best = arg;
                        best_n = n;
                    }
                }
                Ok(normalise(best))
            }
            Func::Abs => match normalise(&args[0]) {
                Value::Int(i) => Ok(i
                    .checked_abs()
                    .map_or(Value::Float((i as f64).abs()), Value::Int)),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                _ => Err(ExprErrorKind::IncompatibleTypes),
            },
            Func::Sqrt => {
                let x = number(&args[0])?;
                if x < 0.0 {
                    return Err(ExprErrorKind::IncompatibleTypes);
                }
                Ok(Value::Float(x.sqrt()))
            }
            Func::Pow => {
                let r = number(&args[0])?.powf(number(&args[1])?);
                if r.is_finite() {
                    Ok(Value::Float(r))
                } else {
                    Err(ExprErrorKind::IncompatibleTypes)
                }
            }
            Func::In => Ok(Value::Bool(args[1..].iter().any(|a| equal(&args[0], a)))),
            Func::Ni => Ok(Value::Bool(!args[1..].iter().any(|a| equal(&args[0], a)))),
            Func::Count => {
                let n = args[1..].iter().filter(|a| equal(&args[0], a)).count();
                Ok(Value::Int(n as i64))
            }
        }
    }
}

fn number(v: &Value) -> Result<f64, ExprErrorKind> {
    v.as_f64().ok_or(ExprErrorKind::IncompatibleTypes)
}

/// Numeric strings become numbers; everything else is returned as is.
pub(crate) fn normalise(v: &Value) -> Value {
    match v {
        Value::Str(s) => match Value::parse(s) {
            n @ (Value::Int(_) | Value::Float(_)) => n,
            _ => v.clone(),
        },
        _ => v.clone(),
    }
}
