//! The `when` predicate deciding whether an experiment mode is due.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc, Weekday};
use rulehunter_core::Value;
use rulehunter_rules::expr::{Expr, ExprError};

/// Used when a descriptor gives no `when`: run once per file version.
pub const DEFAULT_WHEN: &str = "!hasRun";

#[derive(Debug, Clone, PartialEq)]
pub struct When {
    expr: Expr,
}

impl When {
    pub fn new(src: &str) -> Result<Self, ExprError> {
        let src = if src.trim().is_empty() {
            DEFAULT_WHEN
        } else {
            src
        };
        Ok(Self {
            expr: Expr::compile(src)?,
        })
    }

    pub fn src(&self) -> &str {
        self.expr.src()
    }

    /// Evaluate against the experiment's last finish.
    ///
    /// `hasRun` holds when the experiment finished no earlier than the file
    /// was last modified; the other `hasRun*` variables narrow that to the
    /// current day, ISO week, month or year. `sinceLastRun*` count from the
    /// Unix epoch when there is no stamp.
    pub fn is_due(
        &self,
        now: DateTime<Utc>,
        is_finished: bool,
        stamp: Option<DateTime<Utc>>,
        mod_time: DateTime<Utc>,
    ) -> Result<bool, ExprError> {
        self.expr
            .eval_bool(&variables(now, is_finished, stamp, mod_time))
    }
}

fn variables(
    now: DateTime<Utc>,
    is_finished: bool,
    stamp: Option<DateTime<Utc>>,
    mod_time: DateTime<Utc>,
) -> HashMap<String, Value> {
    let has_run = |same_period: fn(&DateTime<Utc>, &DateTime<Utc>) -> bool| -> Value {
        let ran = match stamp {
            Some(s) => is_finished && s >= mod_time && same_period(&s, &now),
            None => false,
        };
        Value::Bool(ran)
    };
    let since = now - stamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let mut vars = HashMap::new();
    vars.insert("hasRun".into(), has_run(|_, _| true));
    vars.insert(
        "hasRunToday".into(),
        has_run(|s, n| s.date_naive() == n.date_naive()),
    );
    vars.insert(
        "hasRunThisWeek".into(),
        has_run(|s, n| s.iso_week() == n.iso_week()),
    );
    vars.insert(
        "hasRunThisMonth".into(),
        has_run(|s, n| s.year() == n.year() && s.month() == n.month()),
    );
    vars.insert("hasRunThisYear".into(), has_run(|s, n| s.year() == n.year()));
    vars.insert(
        "sinceLastRunMinutes".into(),
        Value::Int(since.num_minutes()),
    );
    vars.insert("sinceLastRunHours".into(), Value::Int(since.num_hours()));
    vars.insert(
        "isWeekday".into(),
        Value::Bool(!matches!(now.weekday(), Weekday::Sat | Weekday::Sun)),
    );
    vars
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn empty_means_not_run() {
        let when = When::new("  ").unwrap();
        assert_eq!(when.src(), "!hasRun");
        let modified = at(2024, 3, 4, 9);
        let now = at(2024, 3, 4, 12);
        assert!(when.is_due(now, false, None, modified).unwrap());
        assert!(!when
            .is_due(now, true, Some(at(2024, 3, 4, 10)), modified)
            .unwrap());
    }

    #[test]
    fn modified_after_last_run_means_not_run() {
        let when = When::new("hasRun").unwrap();
        let stamp = at(2024, 3, 4, 10);
        assert!(!when
            .is_due(at(2024, 3, 4, 12), true, Some(stamp), at(2024, 3, 4, 11))
            .unwrap());
        assert!(!when
            .is_due(at(2024, 3, 4, 12), false, Some(stamp), at(2024, 3, 4, 9))
            .unwrap());
    }

    #[test]
    fn calendar_periods() {
        let modified = at(2024, 1, 1, 0);
        // Monday 2024-03-04
        let stamp = Some(at(2024, 3, 4, 10));
        let check = |src: &str, now| When::new(src).unwrap().is_due(now, true, stamp, modified).unwrap();

        assert!(check("hasRunToday", at(2024, 3, 4, 23)));
        assert!(!check("hasRunToday", at(2024, 3, 5, 1)));
        assert!(check("hasRunThisWeek", at(2024, 3, 10, 23)));
        assert!(!check("hasRunThisWeek", at(2024, 3, 11, 0)));
        assert!(check("hasRunThisMonth", at(2024, 3, 31, 0)));
        assert!(!check("hasRunThisMonth", at(2024, 4, 1, 0)));
        assert!(check("hasRunThisYear", at(2024, 12, 31, 0)));
        assert!(!check("hasRunThisYear", at(2025, 1, 1, 0)));
    }

    #[test]
    fn since_last_run() {
        let modified = at(2024, 1, 1, 0);
        let when = When::new("sinceLastRunHours > 2 && sinceLastRunMinutes >= 180").unwrap();
        assert!(when
            .is_due(at(2024, 3, 4, 13), true, Some(at(2024, 3, 4, 10)), modified)
            .unwrap());
        assert!(!when
            .is_due(at(2024, 3, 4, 12), true, Some(at(2024, 3, 4, 10)), modified)
            .unwrap());
        // no stamp: counted from the epoch
        assert!(when.is_due(at(2024, 3, 4, 12), false, None, modified).unwrap());
    }

    #[test]
    fn is_weekday() {
        let when = When::new("isWeekday").unwrap();
        let modified = at(2024, 1, 1, 0);
        assert!(when.is_due(at(2024, 3, 8, 12), false, None, modified).unwrap());
        assert!(!when.is_due(at(2024, 3, 9, 12), false, None, modified).unwrap());
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let when = When::new("never").unwrap();
        let err = when
            .is_due(at(2024, 3, 4, 12), false, None, at(2024, 3, 4, 9))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid expression: never (variable doesn't exist: never)"
        );
    }
}
