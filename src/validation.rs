//! Request-level acceptance rules for task payloads and list queries.
//!
//! Every rule runs before the store is touched, and all violations are
//! collected rather than stopping at the first.

use crate::errors::{AppError, AppResult, FieldViolation};
use crate::models::{
    ListTasksQuery, NewTask, SortDirection, SortField, TaskFilter, TaskId, TaskPatch, TaskPriority,
    TaskSort, TaskStatus, DEFAULT_LIMIT, DEFAULT_PAGE, DESCRIPTION_MAX_CHARS, MAX_LIMIT,
    TITLE_MAX_CHARS,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

const HYPHENATED_ID_LEN: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

/// A field as it appeared in the body: absent, explicit `null`, or a value.
enum Field<'a> {
    Absent,
    Null,
    Present(&'a Value),
}

impl<'a> Field<'a> {
    fn read(body: &'a Map<String, Value>, name: &str) -> Self {
        match body.get(name) {
            None => Self::Absent,
            Some(Value::Null) => Self::Null,
            Some(value) => Self::Present(value),
        }
    }
}

pub fn validate_create(body: &Value) -> AppResult<NewTask> {
    let mut rules = BodyRules::new(body, Mode::Create)?;

    let title = rules.title();
    let description = rules.description();
    let status = rules.status();
    let priority = rules.priority();
    let due_date = rules.due_date();
    let completed = rules.completed();
    rules.finish()?;

    Ok(NewTask {
        title: title.unwrap_or_default(),
        description: description.flatten(),
        status: status.unwrap_or_default(),
        priority: priority.unwrap_or_default(),
        due_date: due_date.flatten(),
        completed: completed.unwrap_or(false),
    })
}

pub fn validate_update(body: &Value) -> AppResult<TaskPatch> {
    let mut rules = BodyRules::new(body, Mode::Update)?;

    let patch = TaskPatch {
        title: rules.title(),
        description: rules.description(),
        status: rules.status(),
        priority: rules.priority(),
        due_date: rules.due_date(),
        completed: rules.completed(),
    };
    rules.finish()?;

    Ok(patch)
}

pub fn validate_list_query(params: &HashMap<String, String>) -> AppResult<ListTasksQuery> {
    let mut violations = Vec::new();
    let param = |name: &str| {
        params
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let status = param("status").and_then(|raw| {
        let parsed = TaskStatus::parse(raw);
        if parsed.is_none() {
            violations.push(FieldViolation::new("status", "Invalid status"));
        }
        parsed
    });

    let priority = param("priority").and_then(|raw| {
        let parsed = TaskPriority::parse(raw);
        if parsed.is_none() {
            violations.push(FieldViolation::new("priority", "Invalid priority"));
        }
        parsed
    });

    let page = match param("page") {
        None => DEFAULT_PAGE,
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) if value >= 1 => value,
            _ => {
                violations.push(FieldViolation::new(
                    "page",
                    "Page must be an integer greater than or equal to 1",
                ));
                DEFAULT_PAGE
            }
        },
    };

    let limit = match param("limit") {
        None => DEFAULT_LIMIT,
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) if (1..=MAX_LIMIT).contains(&value) => value,
            _ => {
                violations.push(FieldViolation::new(
                    "limit",
                    format!("Limit must be an integer between 1 and {MAX_LIMIT}"),
                ));
                DEFAULT_LIMIT
            }
        },
    };

    let sort = match param("sort") {
        None => TaskSort::default(),
        Some(raw) => parse_sort(raw).unwrap_or_else(|| {
            violations.push(FieldViolation::new("sort", "Invalid sort field"));
            TaskSort::default()
        }),
    };

    if !violations.is_empty() {
        return Err(AppError::Validation(violations));
    }

    Ok(ListTasksQuery {
        filter: TaskFilter { status, priority },
        page,
        limit,
        sort,
    })
}

/// Accepts `createdAt` (ascending) or `-createdAt` (descending).
pub fn parse_sort(raw: &str) -> Option<TaskSort> {
    let (direction, key) = match raw.strip_prefix('-') {
        Some(key) => (SortDirection::Desc, key),
        None => (SortDirection::Asc, raw.strip_prefix('+').unwrap_or(raw)),
    };
    SortField::parse(key).map(|field| TaskSort { field, direction })
}

/// Only the hyphenated form the store writes is accepted; simple, braced and
/// URN spellings are rejected even though they name a valid UUID.
pub fn parse_task_id(raw: &str) -> AppResult<TaskId> {
    let invalid = || AppError::InvalidId {
        field: "id",
        value: raw.to_string(),
    };
    let id = Uuid::parse_str(raw).map_err(|_| invalid())?;
    if raw.len() != HYPHENATED_ID_LEN || !raw.eq_ignore_ascii_case(&id.hyphenated().to_string()) {
        return Err(invalid());
    }
    Ok(id)
}

/// Parses the ISO-8601 shapes clients send for due dates.
///
/// Zone-less values are read as UTC. Precision is cut to milliseconds to
/// match what the store keeps.
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc).trunc_subsecs(3));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().trunc_subsecs(3));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

struct BodyRules<'a> {
    body: &'a Map<String, Value>,
    mode: Mode,
    violations: Vec<FieldViolation>,
}

impl<'a> BodyRules<'a> {
    fn new(body: &'a Value, mode: Mode) -> AppResult<Self> {
        let Some(body) = body.as_object() else {
            return Err(AppError::Validation(vec![FieldViolation::new(
                "body",
                "Request body must be a JSON object",
            )]));
        };
        Ok(Self {
            body,
            mode,
            violations: Vec::new(),
        })
    }

    fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.violations.push(FieldViolation::new(field, message));
    }

    fn finish(self) -> AppResult<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.violations))
        }
    }

    fn title(&mut self) -> Option<String> {
        match Field::read(self.body, "title") {
            Field::Absent if self.mode == Mode::Update => None,
            Field::Absent | Field::Null => {
                self.reject("title", "Title is required");
                None
            }
            Field::Present(Value::String(raw)) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    self.reject("title", "Title is required");
                    None
                } else if trimmed.chars().count() > TITLE_MAX_CHARS {
                    self.reject(
                        "title",
                        format!("Title cannot exceed {TITLE_MAX_CHARS} characters"),
                    );
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Field::Present(_) => {
                self.reject("title", "Title must be a string");
                None
            }
        }
    }

    fn description(&mut self) -> Option<Option<String>> {
        match Field::read(self.body, "description") {
            Field::Absent => None,
            Field::Null => Some(None),
            Field::Present(Value::String(raw)) => {
                let trimmed = raw.trim();
                if trimmed.chars().count() > DESCRIPTION_MAX_CHARS {
                    self.reject(
                        "description",
                        format!("Description cannot exceed {DESCRIPTION_MAX_CHARS} characters"),
                    );
                    None
                } else if trimmed.is_empty() {
                    Some(None)
                } else {
                    Some(Some(trimmed.to_string()))
                }
            }
            Field::Present(_) => {
                self.reject("description", "Description must be a string");
                None
            }
        }
    }

    fn status(&mut self) -> Option<TaskStatus> {
        let parsed = match Field::read(self.body, "status") {
            Field::Absent => return None,
            Field::Present(Value::String(raw)) => TaskStatus::parse(raw),
            _ => None,
        };
        if parsed.is_none() {
            self.reject("status", "Invalid status");
        }
        parsed
    }

    fn priority(&mut self) -> Option<TaskPriority> {
        let parsed = match Field::read(self.body, "priority") {
            Field::Absent => return None,
            Field::Present(Value::String(raw)) => TaskPriority::parse(raw),
            _ => None,
        };
        if parsed.is_none() {
            self.reject("priority", "Invalid priority");
        }
        parsed
    }

    fn due_date(&mut self) -> Option<Option<DateTime<Utc>>> {
        match Field::read(self.body, "dueDate") {
            Field::Absent => None,
            Field::Null => Some(None),
            Field::Present(Value::String(raw)) => match parse_due_date(raw) {
                Some(parsed) => Some(Some(parsed)),
                None => {
                    self.reject("dueDate", "Invalid date format");
                    None
                }
            },
            Field::Present(_) => {
                self.reject("dueDate", "Invalid date format");
                None
            }
        }
    }

    fn completed(&mut self) -> Option<bool> {
        match Field::read(self.body, "completed") {
            Field::Absent => None,
            Field::Present(Value::Bool(value)) => Some(*value),
            _ => {
                self.reject("completed", "Completed must be a boolean");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn violations(result: AppResult<impl std::fmt::Debug>) -> Vec<FieldViolation> {
        match result {
            Err(AppError::Validation(violations)) => violations,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    fn fields(violations: &[FieldViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn create_applies_defaults() {
        let task = validate_create(&json!({"title": "Task 1"})).expect("valid payload");
        assert_eq!(task.title, "Task 1");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.description.is_none());
        assert!(task.due_date.is_none());
        assert!(!task.completed);
    }

    #[test]
    fn create_requires_title() {
        let found = violations(validate_create(&json!({})));
        assert_eq!(fields(&found), vec!["title"]);
        assert_eq!(found[0].message, "Title is required");

        let blank = violations(validate_create(&json!({"title": "   "})));
        assert_eq!(blank[0].message, "Title is required");
    }

    #[test]
    fn create_trims_text_fields() {
        let task = validate_create(&json!({"title": "  padded  ", "description": "  body "}))
            .expect("valid payload");
        assert_eq!(task.title, "padded");
        assert_eq!(task.description.as_deref(), Some("body"));
    }

    #[test]
    fn length_limits_count_characters_after_trim() {
        let exactly_max = "é".repeat(TITLE_MAX_CHARS);
        assert!(validate_create(&json!({"title": format!(" {exactly_max} ")})).is_ok());

        let too_long = "x".repeat(TITLE_MAX_CHARS + 1);
        let found = violations(validate_create(&json!({"title": too_long})));
        assert_eq!(found[0].message, "Title cannot exceed 100 characters");

        let long_description = "d".repeat(DESCRIPTION_MAX_CHARS + 1);
        let found = violations(validate_create(
            &json!({"title": "ok", "description": long_description}),
        ));
        assert_eq!(fields(&found), vec!["description"]);
    }

    #[test]
    fn all_violations_are_reported_in_field_order() {
        let found = violations(validate_create(&json!({
            "title": 42,
            "status": "done",
            "priority": "urgent",
            "dueDate": "next tuesday",
            "completed": "yes",
        })));
        assert_eq!(
            fields(&found),
            vec!["title", "status", "priority", "dueDate", "completed"]
        );
        assert_eq!(found[0].message, "Title must be a string");
    }

    #[test]
    fn update_allows_partial_payloads() {
        let patch = validate_update(&json!({"status": "completed"})).expect("valid patch");
        assert_eq!(patch.status, Some(TaskStatus::Completed));
        assert!(patch.title.is_none());
        assert!(patch.description.is_none());

        let empty = validate_update(&json!({})).expect("empty patch");
        assert_eq!(empty, TaskPatch::default());
    }

    #[test]
    fn update_null_clears_optional_fields_only() {
        let patch = validate_update(&json!({"description": null, "dueDate": null}))
            .expect("valid patch");
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.due_date, Some(None));

        let found = violations(validate_update(&json!({"title": null, "status": null})));
        assert_eq!(fields(&found), vec!["title", "status"]);
    }

    #[test]
    fn body_must_be_an_object() {
        let found = violations(validate_create(&json!(["title"])));
        assert_eq!(fields(&found), vec!["body"]);
    }

    #[test]
    fn due_date_accepts_iso_shapes() {
        let full = parse_due_date("2030-05-01T12:30:00.123456Z").expect("rfc3339");
        assert_eq!(full.nanosecond(), 123_000_000);

        let offset = parse_due_date("2030-05-01T12:30:00+02:00").expect("offset");
        assert_eq!(offset.hour(), 10);

        let naive = parse_due_date("2030-05-01T08:15").expect("naive minutes");
        assert_eq!(naive.minute(), 15);

        let date_only = parse_due_date("2030-05-01").expect("date only");
        assert_eq!((date_only.day(), date_only.hour()), (1, 0));

        assert!(parse_due_date("2030-13-45").is_none());
        assert!(parse_due_date("tomorrow").is_none());
    }

    #[test]
    fn list_query_defaults() {
        let query = validate_list_query(&HashMap::new()).expect("defaults");
        assert_eq!(query, ListTasksQuery::default());
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort.field, SortField::CreatedAt);
        assert_eq!(query.sort.direction, SortDirection::Desc);
    }

    #[test]
    fn list_query_parses_filters_and_paging() {
        let params = HashMap::from([
            ("status".to_string(), "in-progress".to_string()),
            ("priority".to_string(), "high".to_string()),
            ("page".to_string(), "3".to_string()),
            ("limit".to_string(), "100".to_string()),
            ("sort".to_string(), "title".to_string()),
        ]);
        let query = validate_list_query(&params).expect("valid query");
        assert_eq!(query.filter.status, Some(TaskStatus::InProgress));
        assert_eq!(query.filter.priority, Some(TaskPriority::High));
        assert_eq!((query.page, query.limit), (3, 100));
        assert_eq!(query.offset(), 200);
        assert_eq!(query.sort.direction, SortDirection::Asc);
    }

    #[test]
    fn list_query_rejects_out_of_range_values() {
        let params = HashMap::from([
            ("status".to_string(), "archived".to_string()),
            ("page".to_string(), "0".to_string()),
            ("limit".to_string(), "101".to_string()),
            ("sort".to_string(), "-password".to_string()),
        ]);
        let found = violations(validate_list_query(&params));
        assert_eq!(fields(&found), vec!["status", "page", "limit", "sort"]);

        let params = HashMap::from([("limit".to_string(), "ten".to_string())]);
        assert_eq!(fields(&violations(validate_list_query(&params))), vec!["limit"]);
    }

    #[test]
    fn task_id_must_be_a_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_task_id(&id.to_string()).expect("uuid"), id);
        assert!(matches!(
            parse_task_id("123"),
            Err(AppError::InvalidId { field: "id", .. })
        ));
    }

    #[test]
    fn task_id_must_use_the_hyphenated_form() {
        let id = Uuid::new_v4();
        let upper = id.hyphenated().to_string().to_uppercase();
        assert_eq!(parse_task_id(&upper).expect("uppercase hyphenated"), id);

        for spelling in [
            id.simple().to_string(),
            id.braced().to_string(),
            id.urn().to_string(),
            format!(" {id} "),
        ] {
            assert!(
                matches!(parse_task_id(&spelling), Err(AppError::InvalidId { .. })),
                "{spelling} should be rejected"
            );
        }
    }
}
