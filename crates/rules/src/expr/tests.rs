use indexmap::IndexMap;
use rulehunter_core::Value;

use super::*;

fn vars(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn eval(src: &str, pairs: &[(&str, Value)]) -> Result<Value, ExprError> {
    Expr::compile(src)?.eval(&vars(pairs))
}

fn kind(src: &str, pairs: &[(&str, Value)]) -> ExprErrorKind {
    eval(src, pairs).unwrap_err().kind
}

#[test]
fn arithmetic_respects_precedence() {
    assert_eq!(eval("1 + 2 * 3", &[]).unwrap(), Value::Int(7));
    assert_eq!(eval("(1 + 2) * 3", &[]).unwrap(), Value::Int(9));
    assert_eq!(eval("7 % 4 - -1", &[]).unwrap(), Value::Int(4));
    assert_eq!(eval("6 / 4", &[]).unwrap(), Value::Float(1.5));
    assert_eq!(eval("6 / 3", &[]).unwrap(), Value::Int(2));
    assert_eq!(eval("0.5 + 1", &[]).unwrap(), Value::Float(1.5));
}

#[test]
fn comparisons_and_logic() {
    let v = [("a", Value::Int(5)), ("b", Value::from("7.5"))];
    assert_eq!(eval("a < b && b <= 7.5", &v).unwrap(), Value::Bool(true));
    assert_eq!(eval("a > 6 || !(a == 5)", &v).unwrap(), Value::Bool(false));
    assert_eq!(eval("\"abc\" < \"abd\"", &[]).unwrap(), Value::Bool(true));
    assert_eq!(eval("a == \"5\"", &v).unwrap(), Value::Bool(true));
}

#[test]
fn logic_short_circuits() {
    assert_eq!(eval("false && missing", &[]).unwrap(), Value::Bool(false));
    assert_eq!(eval("true || missing", &[]).unwrap(), Value::Bool(true));
}

#[test]
fn functions() {
    let v = [("x", Value::from("b")), ("y", Value::from("c"))];
    assert_eq!(eval("roundto(2.345, 2)", &[]).unwrap(), Value::Float(2.35));
    assert_eq!(eval("roundto(2.5, 0)", &[]).unwrap(), Value::Int(3));
    assert_eq!(eval("min(3, 1.5, 2)", &[]).unwrap(), Value::Float(1.5));
    assert_eq!(eval("max(3, 1.5, 2)", &[]).unwrap(), Value::Int(3));
    assert_eq!(eval("abs(-4)", &[]).unwrap(), Value::Int(4));
    assert_eq!(eval("sqrt(16)", &[]).unwrap(), Value::Float(4.0));
    assert_eq!(eval("pow(2, 3)", &[]).unwrap(), Value::Float(8.0));
    assert_eq!(eval("in(x, \"a\", \"b\")", &v).unwrap(), Value::Bool(true));
    assert_eq!(eval("ni(x, \"a\", \"b\")", &v).unwrap(), Value::Bool(false));
    assert_eq!(eval("count(\"b\", x, y, \"b\")", &v).unwrap(), Value::Int(2));
    assert_eq!(eval("true()", &[]).unwrap(), Value::Bool(true));
    assert_eq!(eval("false()", &[]).unwrap(), Value::Bool(false));
}

#[test]
fn missing_variable_is_reported() {
    let err = eval("never", &[]).unwrap_err();
    assert_eq!(err.kind, ExprErrorKind::VarNotExist("never".into()));
    assert_eq!(
        err.to_string(),
        "invalid expression: never (variable doesn't exist: never)"
    );
}

#[test]
fn divide_by_zero_is_reported() {
    let err = eval("x/0", &[("x", Value::Int(3))]).unwrap_err();
    assert_eq!(err.to_string(), "invalid expression: x/0 (divide by zero)");
    assert_eq!(kind("1.5 % 0", &[]), ExprErrorKind::DivideByZero);
}

#[test]
fn incompatible_types() {
    assert_eq!(kind("\"a\" + 1", &[]), ExprErrorKind::IncompatibleTypes);
    assert_eq!(kind("\"a\" > 1", &[]), ExprErrorKind::IncompatibleTypes);
    assert_eq!(kind("1 && true", &[]), ExprErrorKind::IncompatibleTypes);
    assert_eq!(
        kind("x > 1", &[("x", Value::Error("bad".into()))]),
        ExprErrorKind::IncompatibleTypes
    );
}

#[test]
fn compile_errors() {
    let unknown = Expr::compile("frob(1)").unwrap_err();
    assert_eq!(unknown.kind, ExprErrorKind::FunctionNotExist("frob".into()));
    assert!(matches!(
        Expr::compile("abs(1, 2)").unwrap_err().kind,
        ExprErrorKind::WrongNumArgs { got: 2, .. }
    ));
    assert!(matches!(
        Expr::compile("1 +").unwrap_err().kind,
        ExprErrorKind::Syntax(_)
    ));
    assert!(matches!(
        Expr::compile("(a").unwrap_err().kind,
        ExprErrorKind::Syntax(_)
    ));
    assert!(matches!(
        Expr::compile("").unwrap_err().kind,
        ExprErrorKind::Syntax(_)
    ));
    assert!(Expr::compile("a b").is_err());
}

#[test]
fn eval_bool_rejects_non_bool() {
    let expr = Expr::compile("1 + 1").unwrap();
    let err = expr.eval_bool(&vars(&[])).unwrap_err();
    assert_eq!(err.kind, ExprErrorKind::NotBool);
}

#[test]
fn eval_bool_accepts_boolean_text() {
    let expr = Expr::compile("flag").unwrap();
    let v = vars(&[("flag", Value::from("TRUE"))]);
    assert!(expr.eval_bool(&v).unwrap());
    let v = vars(&[("flag", Value::from("yes"))]);
    assert!(expr.eval_bool(&v).is_err());
}

#[test]
fn vars_in_order_of_appearance() {
    let expr = Expr::compile("b > a && roundto(a, 2) < c").unwrap();
    assert_eq!(expr.vars(), vec!["b", "a", "c"]);
}

#[test]
fn literal_quotes_strings_only() {
    assert_eq!(literal(&Value::Int(7)), "7");
    assert_eq!(literal(&Value::Float(7.25)), "7.25");
    assert_eq!(literal(&Value::from("red")), "\"red\"");
    assert_eq!(literal(&Value::from("say \"hi\"")), r#""say \"hi\"""#);

    let parsed = eval(&literal(&Value::from("say \"hi\"")), &[]).unwrap();
    assert_eq!(parsed, Value::from("say \"hi\""));
}

#[test]
fn serde_uses_source_text() {
    let expr: Expr = serde_json::from_str("\"a > 1\"").unwrap();
    assert_eq!(expr.src(), "a > 1");
    assert_eq!(serde_json::to_string(&expr).unwrap(), "\"a > 1\"");
    assert!(serde_json::from_str::<Expr>("\"a >\"").is_err());
}
