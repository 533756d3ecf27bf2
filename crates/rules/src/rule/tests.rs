use rulehunter_core::dataset::MemoryDataset;
use rulehunter_core::{Description, Record, Value};

use super::*;

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn ge(field: &str, v: Value) -> Rule {
    Rule::GeFV(GeFV::new(field, v))
}

fn le(field: &str, v: Value) -> Rule {
    Rule::LeFV(LeFV::new(field, v))
}

fn eq(field: &str, v: Value) -> Rule {
    Rule::EqFV(EqFV::new(field, v))
}

fn in_fv(field: &str, values: &[&str]) -> Rule {
    Rule::InFV(InFV::new(field, values.iter().map(|v| Value::from(*v)).collect()).unwrap())
}

fn between(field: &str, low: i64, high: i64) -> Rule {
    Rule::BetweenFV(BetweenFV::new(field, Value::Int(low), Value::Int(high)).unwrap())
}

/// Records covering every combination used by the round-trip check.
fn sample_records() -> Vec<Record> {
    let mut out = Vec::new();
    for a in [0i64, 1, 5, 7, 10] {
        for (b, c) in [(3.5, "red"), (7.0, "blue"), (1.25, "x")] {
            out.push(record(&[
                ("a", Value::Int(a)),
                ("b", Value::Float(b)),
                ("c", Value::from(c)),
                ("d", Value::from("x")),
            ]));
        }
    }
    out
}

fn description() -> Description {
    let ds = MemoryDataset::from_rows(
        &["a", "b"],
        vec![
            vec![Value::Int(0), Value::Float(0.5)],
            vec![Value::Int(100), Value::Float(10.5)],
        ],
    )
    .unwrap();
    Description::describe(&ds).unwrap()
}

// ── Canonical strings ───────────────────────────────────────────────

#[test]
fn canonical_strings() {
    assert_eq!(Rule::True.to_string(), "true()");
    assert_eq!(eq("f", Value::Int(7)).to_string(), "f == 7");
    assert_eq!(
        Rule::NeFV(NeFV::new("f", Value::from("red"))).to_string(),
        "f != \"red\""
    );
    assert_eq!(ge("f", Value::Float(7.5)).to_string(), "f >= 7.5");
    assert_eq!(le("f", Value::Float(7.5)).to_string(), "f <= 7.5");
    assert_eq!(between("f", 1, 5).to_string(), "f >= 1 && f <= 5");
    assert_eq!(
        Rule::OutsideFV(OutsideFV::new("f", Value::Int(1), Value::Int(5)).unwrap()).to_string(),
        "f <= 1 || f >= 5"
    );
    assert_eq!(in_fv("f", &["b", "a", "b"]).to_string(), "in(f,\"a\",\"b\")");
    assert_eq!(
        Rule::FieldField(FieldField::new(CompareOp::Ge, "a", "b").unwrap()).to_string(),
        "a >= b"
    );
    assert_eq!(
        Rule::Arith(ArithFV::new(ArithOp::Add, "b", "a", Bound::Le, Value::Int(10)).unwrap())
            .to_string(),
        "a + b <= 10"
    );
    assert_eq!(
        Rule::Arith(ArithFV::new(ArithOp::Mul, "a", "b", Bound::Ge, Value::Int(10)).unwrap())
            .to_string(),
        "a * b >= 10"
    );
    assert_eq!(
        Rule::Count(
            CountVF::new(Value::from("x"), vec!["b".into(), "a".into()], CountCmp::Lt, 2).unwrap()
        )
        .to_string(),
        "count(\"x\",a,b) < 2"
    );
    assert_eq!(
        Rule::Count(
            CountVF::new(Value::from("x"), vec!["a".into(), "b".into()], CountCmp::Ne, 2).unwrap()
        )
        .to_string(),
        "count(\"x\",a,b) != 2"
    );
}

#[test]
fn composite_orders_parts_by_canonical_string() {
    let r = and(&ge("b", Value::Int(2)), &ge("a", Value::Int(1))).unwrap();
    assert_eq!(r.to_string(), "(a >= 1) && (b >= 2)");
    let r = or(&ge("a", Value::Int(1)), &ge("b", Value::Int(2))).unwrap();
    assert_eq!(r.to_string(), "(a >= 1) || (b >= 2)");
    assert_eq!(r.fields(), vec!["a", "b"]);
}

// ── Evaluation ──────────────────────────────────────────────────────

#[test]
fn is_true_for_value_rules() {
    let r = record(&[("n", Value::Int(5)), ("s", Value::from("red"))]);
    assert!(eq("n", Value::Int(5)).is_true(&r).unwrap());
    assert!(eq("n", Value::Float(5.0)).is_true(&r).unwrap());
    assert!(ge("n", Value::Int(5)).is_true(&r).unwrap());
    assert!(!le("n", Value::Int(4)).is_true(&r).unwrap());
    assert!(between("n", 1, 5).is_true(&r).unwrap());
    assert!(in_fv("s", &["blue", "red"]).is_true(&r).unwrap());
    assert!(Rule::NeFV(NeFV::new("s", Value::from("blue"))).is_true(&r).unwrap());
}

#[test]
fn missing_field_is_invalid_rule() {
    let r = record(&[("n", Value::Int(5))]);
    let err = ge("m", Value::Int(1)).is_true(&r).unwrap_err();
    assert_eq!(
        err,
        RuleError::InvalidRule {
            rule: "m >= 1".into(),
            field: "m".into()
        }
    );
    let err = Rule::parse("m > 1").unwrap().is_true(&r).unwrap_err();
    assert!(matches!(err, RuleError::InvalidRule { field, .. } if field == "m"));
}

#[test]
fn non_numeric_field_is_incompatible() {
    let r = record(&[("s", Value::from("red")), ("e", Value::Error("bad".into()))]);
    assert!(matches!(
        ge("s", Value::Int(1)).is_true(&r).unwrap_err(),
        RuleError::IncompatibleTypes { .. }
    ));
    assert!(matches!(
        eq("e", Value::Int(1)).is_true(&r).unwrap_err(),
        RuleError::IncompatibleTypes { .. }
    ));
    assert!(matches!(
        Rule::parse("s > 1").unwrap().is_true(&r).unwrap_err(),
        RuleError::IncompatibleTypes { .. }
    ));
}

#[test]
fn count_and_arith_rules() {
    let r = record(&[
        ("a", Value::from("x")),
        ("b", Value::from("x")),
        ("c", Value::from("y")),
        ("p", Value::Int(3)),
        ("q", Value::Float(2.5)),
    ]);
    let count = |cmp, n| {
        Rule::Count(
            CountVF::new(
                Value::from("x"),
                vec!["a".into(), "b".into(), "c".into()],
                cmp,
                n,
            )
            .unwrap(),
        )
    };
    assert!(!count(CountCmp::Lt, 2).is_true(&r).unwrap());
    assert!(count(CountCmp::Lt, 3).is_true(&r).unwrap());
    assert!(!count(CountCmp::Ne, 2).is_true(&r).unwrap());

    let add = ArithFV::new(ArithOp::Add, "p", "q", Bound::Le, Value::Float(5.5)).unwrap();
    assert!(Rule::Arith(add).is_true(&r).unwrap());
    let mul = ArithFV::new(ArithOp::Mul, "p", "q", Bound::Ge, Value::Int(8)).unwrap();
    assert!(!Rule::Arith(mul).is_true(&r).unwrap());
}

#[test]
fn field_field_compares_records() {
    let r = record(&[("a", Value::Int(3)), ("b", Value::Float(3.0)), ("s", Value::from("z"))]);
    let ff = |op, a: &str, b: &str| Rule::FieldField(FieldField::new(op, a, b).unwrap());
    assert!(ff(CompareOp::Eq, "a", "b").is_true(&r).unwrap());
    assert!(!ff(CompareOp::Gt, "a", "b").is_true(&r).unwrap());
    assert!(ff(CompareOp::Ge, "a", "b").is_true(&r).unwrap());
    assert!(ff(CompareOp::Ne, "a", "s").is_true(&r).unwrap());
    assert!(ff(CompareOp::Lt, "a", "s").is_true(&r).is_err());
    assert!(FieldField::new(CompareOp::Eq, "a", "a").is_err());
}

// ── Parsing ─────────────────────────────────────────────────────────

#[test]
fn parse_true_and_dynamic() {
    assert_eq!(Rule::parse(" true() ").unwrap(), Rule::True);
    let r = Rule::parse("a > 3 && b < 2").unwrap();
    assert_eq!(r.kind(), RuleKind::Dynamic);
    assert_eq!(r.fields(), vec!["a", "b"]);
    assert!(matches!(Rule::parse("a >").unwrap_err(), RuleError::Expr(_)));
}

#[test]
fn canonical_strings_parse_to_equivalent_rules() {
    let rules = vec![
        eq("a", Value::Int(5)),
        eq("c", Value::from("red")),
        Rule::NeFV(NeFV::new("c", Value::from("red"))),
        ge("b", Value::Float(3.5)),
        le("a", Value::Int(5)),
        between("a", 1, 7),
        Rule::OutsideFV(OutsideFV::new("a", Value::Int(1), Value::Int(7)).unwrap()),
        in_fv("c", &["red", "x"]),
        Rule::FieldField(FieldField::new(CompareOp::Lt, "a", "b").unwrap()),
        Rule::FieldField(FieldField::new(CompareOp::Eq, "c", "d").unwrap()),
        Rule::Arith(ArithFV::new(ArithOp::Add, "a", "b", Bound::Le, Value::Int(9)).unwrap()),
        Rule::Arith(ArithFV::new(ArithOp::Mul, "a", "b", Bound::Ge, Value::Int(20)).unwrap()),
        Rule::Count(
            CountVF::new(Value::from("x"), vec!["c".into(), "d".into()], CountCmp::Lt, 2).unwrap(),
        ),
        Rule::Count(
            CountVF::new(Value::from("x"), vec!["c".into(), "d".into()], CountCmp::Ne, 1).unwrap(),
        ),
    ];
    let records = sample_records();
    for rule in rules {
        let parsed = Rule::parse(&rule.to_string()).unwrap();
        assert_eq!(parsed.to_string(), rule.to_string());
        for r in &records {
            assert_eq!(
                parsed.is_true(r).unwrap(),
                rule.is_true(r).unwrap(),
                "rule {} on {:?}",
                rule,
                r
            );
        }
    }
}

// ── Composition ─────────────────────────────────────────────────────

#[test]
fn and_folds_bounds_into_between() {
    let r = and(&ge("f", Value::Int(1)), &le("f", Value::Int(5))).unwrap();
    assert_eq!(r, between("f", 1, 5));
    assert!(matches!(
        and(&ge("f", Value::Int(5)), &le("f", Value::Int(1))),
        Err(RuleError::Compose(_))
    ));
}

#[test]
fn and_rejects_other_same_field_pairs() {
    assert!(and(&ge("f", Value::Int(1)), &ge("f", Value::Int(3))).is_err());
    assert!(and(&eq("f", Value::Int(1)), &eq("f", Value::Int(3))).is_err());
    let ne = |v| Rule::NeFV(NeFV::new("f", Value::Int(v)));
    assert_eq!(
        and(&ne(1), &ne(2)).unwrap().to_string(),
        "(f != 1) && (f != 2)"
    );
}

#[test]
fn or_builds_outside_and_unions() {
    let r = or(&le("f", Value::Int(1)), &ge("f", Value::Int(5))).unwrap();
    assert_eq!(r.to_string(), "f <= 1 || f >= 5");
    assert!(or(&le("f", Value::Int(5)), &ge("f", Value::Int(1))).is_err());

    let r = or(&in_fv("f", &["a", "b"]), &in_fv("f", &["c"])).unwrap();
    assert_eq!(r.to_string(), "in(f,\"a\",\"b\",\"c\")");
    assert!(or(&in_fv("f", &["a", "b"]), &in_fv("f", &["a"])).is_err());

    let r = or(&eq("f", Value::from("b")), &eq("f", Value::from("a"))).unwrap();
    assert_eq!(r.to_string(), "in(f,\"a\",\"b\")");

    let r = or(&eq("f", Value::from("c")), &in_fv("f", &["a", "b"])).unwrap();
    assert_eq!(r.to_string(), "in(f,\"a\",\"b\",\"c\")");
    assert!(or(&eq("f", Value::from("a")), &in_fv("f", &["a", "b"])).is_err());
    assert!(or(&ge("f", Value::Int(1)), &ge("f", Value::Int(2))).is_err());
}

#[test]
fn never_composes_true_self_or_parts() {
    let a = ge("a", Value::Int(1));
    let b = ge("b", Value::Int(2));
    assert!(and(&Rule::True, &a).is_err());
    assert!(or(&a, &Rule::True).is_err());
    assert!(and(&a, &a.clone()).is_err());
    let ab = and(&a, &b).unwrap();
    assert!(and(&ab, &a).is_err());
    assert!(or(&b, &ab).is_err());
    assert!(and(&ab, &ge("c", Value::Int(3))).is_ok());
}

#[test]
fn combine_caps_and_dedups() {
    let rules = vec![
        ge("a", Value::Int(1)),
        ge("b", Value::Int(2)),
        ge("c", Value::Int(3)),
    ];
    let all = combine(&rules, 100);
    assert_eq!(all.len(), 6);
    let capped = combine(&rules, 3);
    assert_eq!(capped.len(), 3);
    assert_eq!(capped[0].to_string(), "(a >= 1) && (b >= 2)");
    assert_eq!(capped[1].to_string(), "(a >= 1) || (b >= 2)");
}

// ── Capabilities ────────────────────────────────────────────────────

#[test]
fn overlaps() {
    assert!(ge("f", Value::Int(1)).overlaps(&ge("f", Value::Int(3))));
    assert!(!ge("f", Value::Int(1)).overlaps(&ge("g", Value::Int(3))));
    assert!(!ge("f", Value::Int(1)).overlaps(&le("f", Value::Int(3))));
    assert!(le("f", Value::Int(1)).overlaps(&le("f", Value::Int(3))));
    assert!(between("f", 1, 5).overlaps(&between("f", 5, 9)));
    assert!(!between("f", 1, 4).overlaps(&between("f", 5, 9)));
    assert!(in_fv("f", &["a", "b"]).overlaps(&in_fv("f", &["b", "c"])));
    assert!(!in_fv("f", &["a", "b"]).overlaps(&in_fv("f", &["c"])));
    let outside = |l, h| Rule::OutsideFV(OutsideFV::new("f", Value::Int(l), Value::Int(h)).unwrap());
    assert!(outside(1, 5).overlaps(&outside(2, 9)));
    assert!(!eq("f", Value::Int(1)).overlaps(&eq("f", Value::Int(1))));
}

#[test]
fn tweak_moves_pivot_within_bounds() {
    let desc = description();
    let tweaked = ge("a", Value::Int(50)).tweak(&desc, 1);
    let values: Vec<String> = tweaked.iter().map(|r| r.to_string()).collect();
    assert_eq!(values.len(), 10);
    assert!(values.contains(&"a >= 40".to_string()));
    assert!(values.contains(&"a >= 100".to_string()));
    assert!(!values.contains(&"a >= 50".to_string()));

    let stage3 = ge("a", Value::Int(50)).tweak(&desc, 3);
    assert!(stage3.iter().any(|r| r.to_string() == "a >= 47"));

    assert!(eq("a", Value::Int(50)).tweak(&desc, 1).is_empty());
    assert!(ge("missing", Value::Int(1)).tweak(&desc, 1).is_empty());
}

#[test]
fn tweak_between_keeps_ranges_valid() {
    let desc = description();
    for r in between("a", 40, 50).tweak(&desc, 1) {
        match r {
            Rule::BetweenFV(b) => {
                assert!(b.high.as_f64().unwrap() > b.low.as_f64().unwrap())
            }
            other => panic!("unexpected rule {}", other),
        }
    }
}

#[test]
fn reduce_dp_rounds_pivots() {
    let reduced: Vec<String> = ge("b", Value::Float(3.456))
        .reduce_dp()
        .iter()
        .map(|r| r.to_string())
        .collect();
    assert_eq!(reduced, vec!["b >= 3.46", "b >= 3.5", "b >= 3"]);
    assert!(eq("b", Value::Float(3.456)).reduce_dp().is_empty());
}

#[test]
fn valued_exposes_pivot() {
    let r = ge("a", Value::Int(4));
    assert_eq!(r.as_valued().unwrap().value(), &Value::Int(4));
    assert!(Rule::True.as_valued().is_none());
}

#[test]
fn sort_dedup_uses_canonical_strings() {
    let rules = vec![
        ge("b", Value::Int(1)),
        ge("a", Value::Int(1)),
        ge("b", Value::Int(1)),
        Rule::True,
    ];
    let sorted: Vec<String> = sort_dedup(rules).iter().map(|r| r.to_string()).collect();
    assert_eq!(sorted, vec!["a >= 1", "b >= 1", "true()"]);
}
