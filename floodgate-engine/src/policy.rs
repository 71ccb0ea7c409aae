use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::template::{self, TemplateError};

/// Every key the policy document must carry.
pub const REQUIRED_KEYS: [&str; 10] = [
    "enabled",
    "period_hours",
    "report_all",
    "send_modmail",
    "report_threshold",
    "remove_threshold",
    "report_message",
    "remove_message",
    "modmail_subject",
    "modmail_message",
];

/// A single defect found while validating a policy document.
///
/// Validation collects every problem it finds so one reload report lists
/// all of them, instead of failing on the first.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Problem {
    #[error("policy document is not valid JSON: {reason}")]
    InvalidJson { reason: String },
    #[error("policy document must be a single JSON object")]
    NotAnObject,
    #[error("`{field}` is missing")]
    MissingField { field: &'static str },
    #[error("`{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("`{field}` must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("`{field}` is not a usable template: {source}")]
    BadTemplate {
        field: &'static str,
        source: TemplateError,
    },
}

/// Immutable, fully validated rate-limit configuration.
///
/// Only `parse_policy` constructs one; an invalid document never becomes
/// a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySnapshot {
    pub enabled: bool,
    pub period_seconds: u64,
    /// Act on every tracked post including the first, instead of only the
    /// posts after the first.
    pub report_all: bool,
    pub send_modmail: bool,
    pub report_threshold: u64,
    pub remove_threshold: u64,
    pub report_message: String,
    pub remove_message: String,
    pub modmail_subject: String,
    pub modmail_body: String,
}

/// Validate a raw policy document and build a snapshot from it.
///
/// On failure the returned list holds one entry per defect found.
pub fn parse_policy(raw: &str) -> Result<PolicySnapshot, Vec<Problem>> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(source) => {
            return Err(vec![Problem::InvalidJson {
                reason: source.to_string(),
            }]);
        }
    };

    let Some(map) = value.as_object() else {
        return Err(vec![Problem::NotAnObject]);
    };

    let mut problems = Vec::new();

    let enabled = read_bool(map, "enabled", &mut problems);
    let period_hours = read_count(map, "period_hours", &mut problems);
    let report_all = read_bool(map, "report_all", &mut problems);
    let send_modmail = read_bool(map, "send_modmail", &mut problems);
    let report_threshold = read_count(map, "report_threshold", &mut problems);
    let remove_threshold = read_count(map, "remove_threshold", &mut problems);
    let report_message = read_template(map, "report_message", &mut problems);
    let remove_message = read_template(map, "remove_message", &mut problems);
    let modmail_subject = read_template(map, "modmail_subject", &mut problems);
    let modmail_body = read_template(map, "modmail_message", &mut problems);

    if let Some(0) = period_hours {
        problems.push(Problem::NotPositive {
            field: "period_hours",
        });
    }

    match (
        enabled,
        period_hours,
        report_all,
        send_modmail,
        report_threshold,
        remove_threshold,
        report_message,
        remove_message,
        modmail_subject,
        modmail_body,
    ) {
        (
            Some(enabled),
            Some(period_hours),
            Some(report_all),
            Some(send_modmail),
            Some(report_threshold),
            Some(remove_threshold),
            Some(report_message),
            Some(remove_message),
            Some(modmail_subject),
            Some(modmail_body),
        ) if problems.is_empty() => Ok(PolicySnapshot {
            enabled,
            period_seconds: period_hours.saturating_mul(3_600),
            report_all,
            send_modmail,
            report_threshold,
            remove_threshold,
            report_message,
            remove_message,
            modmail_subject,
            modmail_body,
        }),
        _ => Err(problems),
    }
}

fn read_bool(map: &Map<String, Value>, field: &'static str, problems: &mut Vec<Problem>) -> Option<bool> {
    match map.get(field) {
        None => {
            problems.push(Problem::MissingField { field });
            None
        }
        Some(Value::Bool(value)) => Some(*value),
        Some(_) => {
            problems.push(Problem::WrongType {
                field,
                expected: "a boolean",
            });
            None
        }
    }
}

fn read_count(map: &Map<String, Value>, field: &'static str, problems: &mut Vec<Problem>) -> Option<u64> {
    match map.get(field) {
        None => {
            problems.push(Problem::MissingField { field });
            None
        }
        Some(value) => match value.as_u64() {
            Some(count) => Some(count),
            None => {
                problems.push(Problem::WrongType {
                    field,
                    expected: "a non-negative integer",
                });
                None
            }
        },
    }
}

fn read_template(
    map: &Map<String, Value>,
    field: &'static str,
    problems: &mut Vec<Problem>,
) -> Option<String> {
    match map.get(field) {
        None => {
            problems.push(Problem::MissingField { field });
            None
        }
        Some(Value::String(text)) => match template::validate(text) {
            Ok(()) => Some(text.clone()),
            Err(source) => {
                problems.push(Problem::BadTemplate { field, source });
                None
            }
        },
        Some(_) => {
            problems.push(Problem::WrongType {
                field,
                expected: "a string",
            });
            None
        }
    }
}

/// Shared handle to the policy currently in effect.
///
/// Decision paths capture one snapshot (`current`) at the start of
/// processing a submission and thread it through; the handle is never
/// re-read mid-decision, so a concurrent reload cannot split a decision
/// across two policies.
#[derive(Clone, Debug)]
pub struct PolicyHandle {
    active: Arc<RwLock<Arc<PolicySnapshot>>>,
}

impl PolicyHandle {
    pub fn new(initial: PolicySnapshot) -> Self {
        Self {
            active: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// The snapshot in effect right now.
    pub fn current(&self) -> Arc<PolicySnapshot> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate `raw` and, only on success, atomically replace the active
    /// snapshot. A failed reload leaves the previous snapshot in effect.
    pub fn try_reload(&self, raw: &str) -> Result<Arc<PolicySnapshot>, Vec<Problem>> {
        let next = Arc::new(parse_policy(raw)?);
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *active = next.clone();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::{PolicyHandle, Problem, parse_policy};

    fn valid_document() -> serde_json::Value {
        serde_json::json!({
            "enabled": true,
            "period_hours": 24,
            "report_all": false,
            "send_modmail": true,
            "report_threshold": 2,
            "remove_threshold": 3,
            "report_message": "Excessive posting ({num_posts} in {period}h) | IDs: {post_ids}",
            "remove_message": "(Auto) Excessive posting, max {report_threshold} per {period}h",
            "modmail_subject": "Posts removed",
            "modmail_message": "{num_posts} posts were removed: {post_ids}"
        })
    }

    #[test]
    fn parses_a_complete_document() {
        let snapshot = parse_policy(&valid_document().to_string()).unwrap();

        assert!(snapshot.enabled);
        assert_eq!(snapshot.period_seconds, 24 * 3_600);
        assert!(!snapshot.report_all);
        assert!(snapshot.send_modmail);
        assert_eq!(snapshot.report_threshold, 2);
        assert_eq!(snapshot.remove_threshold, 3);
        assert_eq!(snapshot.modmail_subject, "Posts removed");
    }

    #[test]
    fn malformed_json_is_a_single_problem() {
        let problems = parse_policy("{ not json").unwrap_err();
        assert_eq!(problems.len(), 1);
        assert!(matches!(problems[0], Problem::InvalidJson { .. }));
    }

    #[test]
    fn missing_keys_are_reported_by_name() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("remove_threshold");

        let problems = parse_policy(&doc.to_string()).unwrap_err();
        assert_eq!(
            problems,
            vec![Problem::MissingField {
                field: "remove_threshold"
            }]
        );
    }

    #[test]
    fn every_defect_is_collected_in_one_pass() {
        let mut doc = valid_document();
        let map = doc.as_object_mut().unwrap();
        map.insert("enabled".to_owned(), serde_json::json!("yes"));
        map.insert("period_hours".to_owned(), serde_json::json!(-4));
        map.remove("modmail_subject");

        let problems = parse_policy(&doc.to_string()).unwrap_err();
        assert_eq!(problems.len(), 3);
        assert!(problems.contains(&Problem::WrongType {
            field: "enabled",
            expected: "a boolean"
        }));
        assert!(problems.contains(&Problem::WrongType {
            field: "period_hours",
            expected: "a non-negative integer"
        }));
        assert!(problems.contains(&Problem::MissingField {
            field: "modmail_subject"
        }));
    }

    #[test]
    fn all_required_keys_are_enforced() {
        for key in super::REQUIRED_KEYS {
            let mut doc = valid_document();
            doc.as_object_mut().unwrap().remove(key);
            assert!(
                parse_policy(&doc.to_string()).is_err(),
                "expected `{key}` to be required"
            );
        }
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut doc = valid_document();
        doc.as_object_mut()
            .unwrap()
            .insert("period_hours".to_owned(), serde_json::json!(0));

        let problems = parse_policy(&doc.to_string()).unwrap_err();
        assert!(problems.contains(&Problem::NotPositive {
            field: "period_hours"
        }));
    }

    #[test]
    fn bad_template_parameters_fail_at_load_time() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().insert(
            "report_message".to_owned(),
            serde_json::json!("hello {author_karma}"),
        );

        let problems = parse_policy(&doc.to_string()).unwrap_err();
        assert_eq!(problems.len(), 1);
        assert!(matches!(
            problems[0],
            Problem::BadTemplate {
                field: "report_message",
                ..
            }
        ));
    }

    #[test]
    fn failed_reload_keeps_the_active_snapshot() {
        let initial = parse_policy(&valid_document().to_string()).unwrap();
        let handle = PolicyHandle::new(initial.clone());

        let problems = handle.try_reload("{}").unwrap_err();
        assert!(!problems.is_empty());
        assert_eq!(*handle.current(), initial);
    }

    #[test]
    fn successful_reload_swaps_the_snapshot() {
        let initial = parse_policy(&valid_document().to_string()).unwrap();
        let handle = PolicyHandle::new(initial);

        let mut doc = valid_document();
        doc.as_object_mut()
            .unwrap()
            .insert("remove_threshold".to_owned(), serde_json::json!(5));

        let swapped = handle.try_reload(&doc.to_string()).unwrap();
        assert_eq!(swapped.remove_threshold, 5);
        assert_eq!(handle.current().remove_threshold, 5);
    }

    #[test]
    fn decisions_keep_their_captured_snapshot_across_reloads() {
        let initial = parse_policy(&valid_document().to_string()).unwrap();
        let handle = PolicyHandle::new(initial);

        let captured = handle.current();

        let mut doc = valid_document();
        doc.as_object_mut()
            .unwrap()
            .insert("enabled".to_owned(), serde_json::json!(false));
        handle.try_reload(&doc.to_string()).unwrap();

        // The in-flight decision still sees the policy it started with.
        assert!(captured.enabled);
        assert!(!handle.current().enabled);
    }
}
