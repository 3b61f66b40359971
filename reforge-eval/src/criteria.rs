//! Criteria Evaluator
//!
//! One predicate per operator. Criteria in a conditional value are ANDed.
//! A malformed criterion (bad regex, unparsable date or version, wrong
//! operand types) is simply false; only an operator this engine doesn't
//! know aborts evaluation.

use crate::context::{ContextValue, Contexts};
use crate::error::{EvalError, Result};
use crate::evaluation::{EvalHost, Scope};
use crate::types::{ConfigValue, Criterion, Operator, ValueKind};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use semver::Version;
use std::cmp::Ordering;

/// Whether every criterion holds. Stops at the first false one.
pub fn all_criteria_match(criteria: &[Criterion], scope: &Scope<'_>) -> Result<bool> {
    for criterion in criteria {
        if !criterion_matches(criterion, scope)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluate a single criterion
pub fn criterion_matches(criterion: &Criterion, scope: &Scope<'_>) -> Result<bool> {
    let contexts = scope.contexts;

    let matched = match criterion.operator {
        Operator::AlwaysTrue => true,
        Operator::HierarchicalMatch => match_string(criterion) == scope.namespace,
        Operator::PropIsOneOf => prop_is_one_of(criterion, contexts),
        Operator::PropIsNotOneOf => !prop_is_one_of(criterion, contexts),
        Operator::PropEndsWithOneOf => prop_matches_one_of(criterion, contexts, |s, v| s.ends_with(v)),
        Operator::PropDoesNotEndWithOneOf => !prop_matches_one_of(criterion, contexts, |s, v| s.ends_with(v)),
        Operator::PropStartsWithOneOf => prop_matches_one_of(criterion, contexts, |s, v| s.starts_with(v)),
        Operator::PropDoesNotStartWithOneOf => {
            !prop_matches_one_of(criterion, contexts, |s, v| s.starts_with(v))
        }
        Operator::PropContainsOneOf => prop_matches_one_of(criterion, contexts, |s, v| s.contains(v)),
        Operator::PropDoesNotContainOneOf => !prop_matches_one_of(criterion, contexts, |s, v| s.contains(v)),
        Operator::InSeg => in_segment(criterion, contexts, scope.host)?,
        Operator::NotInSeg => !in_segment(criterion, contexts, scope.host)?,
        Operator::InIntRange => in_int_range(criterion, contexts),
        Operator::PropBefore => compare_dates(criterion, contexts, |a, b| a < b),
        Operator::PropAfter => compare_dates(criterion, contexts, |a, b| a > b),
        Operator::PropLessThan => compare_numbers(criterion, contexts, Ordering::is_lt),
        Operator::PropLessThanOrEqual => compare_numbers(criterion, contexts, Ordering::is_le),
        Operator::PropGreaterThan => compare_numbers(criterion, contexts, Ordering::is_gt),
        Operator::PropGreaterThanOrEqual => compare_numbers(criterion, contexts, Ordering::is_ge),
        Operator::PropMatches => regex_matches(criterion, contexts).unwrap_or(false),
        Operator::PropDoesNotMatch => regex_matches(criterion, contexts).map(|m| !m).unwrap_or(false),
        Operator::PropSemverLessThan => compare_semver(criterion, contexts, Ordering::is_lt),
        Operator::PropSemverEqual => compare_semver(criterion, contexts, Ordering::is_eq),
        Operator::PropSemverGreaterThan => compare_semver(criterion, contexts, Ordering::is_gt),
        Operator::LookupKeyIn | Operator::LookupKeyNotIn | Operator::Unknown => {
            return Err(EvalError::UnexpectedOperator(format!("{:?}", criterion.operator)));
        }
    };

    Ok(matched)
}

fn match_value(criterion: &Criterion) -> Option<&ValueKind> {
    criterion.value_to_match.as_ref().map(|v: &ConfigValue| &v.kind)
}

fn match_string(criterion: &Criterion) -> Option<&str> {
    match match_value(criterion) {
        Some(ValueKind::String(s)) => Some(s),
        _ => None,
    }
}

fn match_list(criterion: &Criterion) -> &[String] {
    match match_value(criterion) {
        Some(ValueKind::StringList(list)) => &list.values,
        _ => &[],
    }
}

/// The context value as strings: one per element for lists, `""` when the
/// property is absent.
fn arrayified(contexts: &Contexts, property_name: &str) -> Vec<String> {
    match contexts.lookup(property_name) {
        Some(ContextValue::List(items)) => items.iter().map(ToString::to_string).collect(),
        Some(value) => vec![value.to_string()],
        None => vec![String::new()],
    }
}

fn prop_is_one_of(criterion: &Criterion, contexts: &Contexts) -> bool {
    let candidates = arrayified(contexts, &criterion.property_name);
    match_list(criterion).iter().any(|value| candidates.contains(value))
}

fn prop_matches_one_of(
    criterion: &Criterion,
    contexts: &Contexts,
    matcher: fn(&str, &str) -> bool,
) -> bool {
    let Some(context_value) = contexts.lookup(&criterion.property_name).map(|v| v.to_string()) else {
        return false;
    };
    if context_value.is_empty() {
        return false;
    }

    match_list(criterion)
        .iter()
        .any(|value| matcher(&context_value, value))
}

fn in_segment(criterion: &Criterion, contexts: &Contexts, host: &dyn EvalHost) -> Result<bool> {
    let Some(segment_key) = match_string(criterion) else {
        return Ok(false);
    };

    if !host.contains(segment_key) {
        reforge_log::warn!("Segment {} not found", segment_key);
        return Ok(false);
    }

    match host.resolve(segment_key, Some(contexts))? {
        Some(Value::Bool(in_segment)) => Ok(in_segment),
        other => {
            reforge_log::warn!("Segment {} is of unexpected type {:?}", segment_key, other);
            Ok(false)
        }
    }
}

/// Both bounds inclusive.
fn in_int_range(criterion: &Criterion, contexts: &Contexts) -> bool {
    let Some(ValueKind::IntRange(range)) = match_value(criterion) else {
        return false;
    };
    let (Some(start), Some(end)) = (range.start, range.end) else {
        return false;
    };

    match contexts.lookup(&criterion.property_name) {
        Some(ContextValue::Int(i)) => start <= i && i <= end,
        Some(ContextValue::Double(d)) => start as f64 <= d && d <= end as f64,
        _ => false,
    }
}

/// Epoch milliseconds from an RFC 3339, RFC 2822, plain date or naive
/// date-time string. Zone-less forms are read as UTC.
pub fn parse_date_millis(value: &str) -> Option<i64> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.timestamp_millis());
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.timestamp_millis());
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(date.and_utc().timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp_millis());
    }
    None
}

fn context_millis(value: Option<ContextValue>) -> Option<i64> {
    match value? {
        ContextValue::Int(ms) => Some(ms),
        ContextValue::String(s) => parse_date_millis(&s),
        _ => None,
    }
}

fn config_millis(value: Option<&ValueKind>) -> Option<i64> {
    match value? {
        ValueKind::Int(ms) => Some(*ms),
        ValueKind::String(s) => parse_date_millis(s),
        _ => None,
    }
}

fn compare_dates(criterion: &Criterion, contexts: &Contexts, compare: fn(i64, i64) -> bool) -> bool {
    let context = context_millis(contexts.lookup(&criterion.property_name));
    let config = config_millis(match_value(criterion));

    match (context, config) {
        (Some(context), Some(config)) => compare(context, config),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Double(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Double(d) => d,
        }
    }
}

/// Exact when both sides are integers, floating point otherwise. `None`
/// when either side is NaN.
fn compare_to(left: Number, right: Number) -> Option<Ordering> {
    match (left, right) {
        (Number::Int(l), Number::Int(r)) => Some(l.cmp(&r)),
        _ => left.as_f64().partial_cmp(&right.as_f64()),
    }
}

fn compare_numbers(criterion: &Criterion, contexts: &Contexts, accept: fn(Ordering) -> bool) -> bool {
    let context = match contexts.lookup(&criterion.property_name) {
        Some(ContextValue::Int(i)) => Number::Int(i),
        Some(ContextValue::Double(d)) => Number::Double(d),
        _ => return false,
    };
    let config = match match_value(criterion) {
        Some(ValueKind::Int(i)) => Number::Int(*i),
        Some(ValueKind::Double(d)) => Number::Double(*d),
        _ => return false,
    };

    compare_to(context, config).is_some_and(accept)
}

/// `None` when either operand is not a string or the pattern is invalid.
fn regex_matches(criterion: &Criterion, contexts: &Contexts) -> Option<bool> {
    let pattern = match_string(criterion)?;
    let context = contexts.lookup(&criterion.property_name)?;
    let subject = context.as_str()?;

    match Regex::new(pattern) {
        Ok(regex) => Some(regex.is_match(subject)),
        Err(e) => {
            reforge_log::debug!("invalid pattern {:?} for {}: {}", pattern, criterion.property_name, e);
            None
        }
    }
}

fn compare_semver(criterion: &Criterion, contexts: &Contexts, accept: fn(Ordering) -> bool) -> bool {
    let Some(ContextValue::String(left)) = contexts.lookup(&criterion.property_name) else {
        return false;
    };
    let Some(right) = match_string(criterion) else {
        return false;
    };

    match (Version::parse(&left), Version::parse(right)) {
        (Ok(left), Ok(right)) => accept(left.cmp_precedence(&right)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::testing::{scope, FixedHost};
    use crate::types::{ConfigValue, Criterion};

    fn check(criterion: Criterion, contexts: &Contexts) -> bool {
        let host = FixedHost::default();
        criterion_matches(&criterion, &scope(contexts, &host)).unwrap()
    }

    fn user(key: &str, value: impl Into<ContextValue>) -> Contexts {
        Contexts::new().with("user", key, value)
    }

    #[test]
    fn test_always_true() {
        let criterion = Criterion {
            property_name: String::new(),
            operator: Operator::AlwaysTrue,
            value_to_match: None,
        };
        assert!(check(criterion, &Contexts::new()));
    }

    #[test]
    fn test_hierarchical_match_uses_namespace() {
        let host = FixedHost::default();
        let contexts = Contexts::new();
        let criterion = Criterion::new("", Operator::HierarchicalMatch, ConfigValue::string("billing"));

        let mut in_namespace = scope(&contexts, &host);
        in_namespace.namespace = Some("billing");
        assert!(criterion_matches(&criterion, &in_namespace).unwrap());

        let mut elsewhere = scope(&contexts, &host);
        elsewhere.namespace = Some("search");
        assert!(!criterion_matches(&criterion, &elsewhere).unwrap());
        assert!(!criterion_matches(&criterion, &scope(&contexts, &host)).unwrap());
    }

    #[test]
    fn test_prop_is_one_of() {
        let one_of = || Criterion::new("user.country", Operator::PropIsOneOf, ConfigValue::string_list(["US", "UK"]));
        let not_one_of = || {
            Criterion::new("user.country", Operator::PropIsNotOneOf, ConfigValue::string_list(["US", "UK"]))
        };

        assert!(check(one_of(), &user("country", "UK")));
        assert!(!check(one_of(), &user("country", "FR")));
        assert!(!check(one_of(), &Contexts::new()));
        assert!(check(one_of(), &user("country", vec!["FR", "US"])));

        assert!(!check(not_one_of(), &user("country", "US")));
        assert!(check(not_one_of(), &user("country", "FR")));
        assert!(check(not_one_of(), &Contexts::new()));
    }

    #[test]
    fn test_prop_is_one_of_coerces_numbers() {
        let criterion = Criterion::new("reforge.user-id", Operator::PropIsOneOf, ConfigValue::string_list(["4", "5"]));
        let contexts = Contexts::new().with("reforge", "user-id", 5);
        assert!(check(criterion, &contexts));
    }

    #[test]
    fn test_string_affix_operators() {
        let list = || ConfigValue::string_list(["@example.com", "@test.com"]);
        let email = user("email", "me@example.com");

        assert!(check(Criterion::new("user.email", Operator::PropEndsWithOneOf, list()), &email));
        assert!(!check(Criterion::new("user.email", Operator::PropDoesNotEndWithOneOf, list()), &email));
        assert!(check(
            Criterion::new("user.email", Operator::PropStartsWithOneOf, ConfigValue::string_list(["me@"])),
            &email
        ));
        assert!(check(
            Criterion::new("user.email", Operator::PropContainsOneOf, ConfigValue::string_list(["example"])),
            &email
        ));
        assert!(check(
            Criterion::new("user.email", Operator::PropDoesNotContainOneOf, ConfigValue::string_list(["nope"])),
            &email
        ));

        // absent and empty values never match, so the negations hold
        assert!(!check(Criterion::new("user.email", Operator::PropEndsWithOneOf, list()), &Contexts::new()));
        assert!(check(Criterion::new("user.email", Operator::PropDoesNotEndWithOneOf, list()), &user("email", "")));
    }

    #[test]
    fn test_in_int_range_is_inclusive() {
        let range = || Criterion::new("user.age", Operator::InIntRange, ConfigValue::int_range(Some(100), Some(100)));

        assert!(check(range(), &user("age", 100)));
        assert!(!check(range(), &user("age", 99)));
        assert!(!check(range(), &user("age", 101)));
        assert!(check(range(), &user("age", 100.0)));
        assert!(!check(range(), &user("age", "100")));
        assert!(!check(range(), &Contexts::new()));

        let open = Criterion::new("user.age", Operator::InIntRange, ConfigValue::int_range(Some(1), None));
        assert!(!check(open, &user("age", 5)));
    }

    #[test]
    fn test_current_time_in_range() {
        let now = chrono::Utc::now().timestamp_millis();
        let window = Criterion::new(
            "reforge.current-time",
            Operator::InIntRange,
            ConfigValue::int_range(Some(now - 60_000), Some(now + 60_000)),
        );
        assert!(check(window, &Contexts::new()));
    }

    #[test]
    fn test_dates() {
        let before = || Criterion::new("user.created", Operator::PropBefore, ConfigValue::string("2024-06-01T00:00:00Z"));
        let after = || Criterion::new("user.created", Operator::PropAfter, ConfigValue::int(1_717_200_000_000));

        assert!(check(before(), &user("created", "2024-01-15")));
        assert!(!check(before(), &user("created", "2024-07-01T12:00:00+02:00")));
        assert!(check(before(), &user("created", 1_700_000_000_000i64)));
        assert!(!check(before(), &user("created", "yesterday")));
        assert!(!check(before(), &user("created", 1.5)));

        assert!(check(after(), &user("created", "Tue, 01 Jul 2025 10:00:00 GMT")));
        assert!(!check(after(), &user("created", 1_717_200_000_000i64)));
    }

    #[test]
    fn test_parse_date_millis() {
        assert_eq!(parse_date_millis("1970-01-01T00:00:01Z"), Some(1000));
        assert_eq!(parse_date_millis("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_date_millis("1970-01-01T00:00:00.250"), Some(250));
        assert_eq!(parse_date_millis("not a date"), None);
    }

    #[test]
    fn test_numeric_comparisons() {
        let gt = |v: ConfigValue| Criterion::new("user.score", Operator::PropGreaterThan, v);

        assert!(check(gt(ConfigValue::int(10)), &user("score", 11)));
        assert!(!check(gt(ConfigValue::int(10)), &user("score", 10)));
        assert!(check(gt(ConfigValue::double(10.5)), &user("score", 11)));
        assert!(check(gt(ConfigValue::int(10)), &user("score", 10.01)));
        assert!(!check(gt(ConfigValue::int(10)), &user("score", "11")));
        assert!(!check(gt(ConfigValue::string("10")), &user("score", 11)));
        assert!(!check(gt(ConfigValue::int(10)), &user("score", f64::NAN)));

        // large integers compare exactly
        let big = i64::MAX - 1;
        assert!(check(gt(ConfigValue::int(big)), &user("score", i64::MAX)));

        let le = Criterion::new("user.score", Operator::PropLessThanOrEqual, ConfigValue::int(3));
        assert!(check(le, &user("score", 3)));
        let ge = Criterion::new("user.score", Operator::PropGreaterThanOrEqual, ConfigValue::double(3.5));
        assert!(!check(ge, &user("score", 3)));
        let lt = Criterion::new("user.score", Operator::PropLessThan, ConfigValue::double(3.5));
        assert!(check(lt, &user("score", 3)));
    }

    #[test]
    fn test_regex_operators() {
        let matches = |p: &str| Criterion::new("user.email", Operator::PropMatches, ConfigValue::string(p));
        let not_matches = |p: &str| Criterion::new("user.email", Operator::PropDoesNotMatch, ConfigValue::string(p));
        let email = user("email", "me@example.com");

        assert!(check(matches(r"^me@.*\.com$"), &email));
        assert!(!check(matches(r"^you@"), &email));
        assert!(check(not_matches(r"^you@"), &email));
        assert!(!check(not_matches(r"^me@"), &email));

        // invalid patterns and non-string operands are false both ways
        assert!(!check(matches("(unclosed"), &email));
        assert!(!check(not_matches("(unclosed"), &email));
        assert!(!check(not_matches("^1"), &user("email", 1)));
    }

    #[test]
    fn test_semver_operators() {
        let semver = |op: Operator, v: &str| Criterion::new("app.version", op, ConfigValue::string(v));
        let app = Contexts::new().with("app", "version", "2.1.0");

        assert!(check(semver(Operator::PropSemverLessThan, "2.10.0"), &app));
        assert!(check(semver(Operator::PropSemverEqual, "2.1.0"), &app));
        assert!(!check(semver(Operator::PropSemverEqual, "2.1.0-beta.1"), &app));
        assert!(check(semver(Operator::PropSemverGreaterThan, "2.1.0-beta.1"), &app));
        assert!(!check(semver(Operator::PropSemverGreaterThan, "banana"), &app));
        assert!(!check(semver(Operator::PropSemverLessThan, "3.0.0"), &Contexts::new().with("app", "version", 2)));
    }

    #[test]
    fn test_segments() {
        let host = FixedHost::default()
            .with_value("segment.beta", true)
            .with_value("segment.odd", "yes");
        let contexts = Contexts::new();
        let scope = scope(&contexts, &host);

        let in_seg = |key: &str| Criterion::new("", Operator::InSeg, ConfigValue::string(key));
        let not_in_seg = |key: &str| Criterion::new("", Operator::NotInSeg, ConfigValue::string(key));

        assert!(criterion_matches(&in_seg("segment.beta"), &scope).unwrap());
        assert!(!criterion_matches(&not_in_seg("segment.beta"), &scope).unwrap());
        assert!(!criterion_matches(&in_seg("segment.odd"), &scope).unwrap());
        assert!(!criterion_matches(&in_seg("segment.missing"), &scope).unwrap());
        assert!(criterion_matches(&not_in_seg("segment.missing"), &scope).unwrap());
    }

    #[test]
    fn test_unexpected_operators_are_fatal() {
        let host = FixedHost::default();
        let contexts = Contexts::new();

        for operator in [Operator::Unknown, Operator::LookupKeyIn, Operator::LookupKeyNotIn] {
            let criterion = Criterion::new("user.key", operator, ConfigValue::string("x"));
            let result = criterion_matches(&criterion, &scope(&contexts, &host));
            assert!(matches!(result, Err(EvalError::UnexpectedOperator(_))));
        }
    }

    #[test]
    fn test_all_criteria_match_is_conjunction() {
        let host = FixedHost::default();
        let contexts = user("country", "US").with("user", "plan", "pro");
        let country = Criterion::new("user.country", Operator::PropIsOneOf, ConfigValue::string_list(["US"]));
        let plan = Criterion::new("user.plan", Operator::PropIsOneOf, ConfigValue::string_list(["free"]));

        assert!(all_criteria_match(&[], &scope(&contexts, &host)).unwrap());
        assert!(all_criteria_match(&[country.clone()], &scope(&contexts, &host)).unwrap());
        assert!(!all_criteria_match(&[country, plan], &scope(&contexts, &host)).unwrap());
    }
}
