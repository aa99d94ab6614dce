use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::datetime::{date_from_epoch_millis, parse_tracker_date};
use crate::error::TaskError;

/// One issue as the tracker returns it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawIssue {
    #[serde(default)]
    pub summary: String,

    #[serde(rename = "idReadable")]
    pub id_readable: String,

    #[serde(rename = "customFields", default)]
    pub custom_fields: Vec<RawCustomField>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCustomField {
    #[serde(rename = "projectCustomField")]
    pub project_custom_field: RawProjectCustomField,

    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawProjectCustomField {
    pub field: RawFieldName,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFieldName {
    pub name: String,
}

impl RawCustomField {
    pub fn name(&self) -> &str {
        &self.project_custom_field.field.name
    }
}

/// Canonical task. Built once per raw issue by [`normalize_issue`] and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub project: String,
    pub summary: String,
    pub start_date: NaiveDate,
    pub deadline: NaiveDate,
    pub priority: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub executor: Option<String>,
    pub subsystem: Option<String>,
    pub time_spent: Option<String>,
}

impl Task {
    /// A task that starts and ends on `deadline`, all other fields unset.
    pub fn new(id: impl Into<String>, project: impl Into<String>, deadline: NaiveDate) -> Self {
        let id = id.into();
        Self {
            summary: id.clone(),
            id,
            project: project.into(),
            start_date: deadline,
            deadline,
            priority: None,
            kind: None,
            status: None,
            executor: None,
            subsystem: None,
            time_spent: None,
        }
    }

    pub fn with_start(mut self, start_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self
    }

    /// Inclusive calendar span the task covers. An inverted range collapses
    /// to the deadline day.
    pub fn span(&self) -> (NaiveDate, NaiveDate) {
        if self.start_date > self.deadline {
            (self.deadline, self.deadline)
        } else {
            (self.start_date, self.deadline)
        }
    }
}

/// Task attributes a tracker custom field can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskField {
    Priority,
    Kind,
    Status,
    Executor,
    Subsystem,
    TimeSpent,
    StartDate,
    Deadline,
}

impl TaskField {
    fn from_custom_field(name: &str) -> Option<Self> {
        match name.trim() {
            "Priority" => Some(Self::Priority),
            "Type" => Some(Self::Kind),
            "State" => Some(Self::Status),
            "Отдыхающий" | "Assignee" => Some(Self::Executor),
            "Subsystem" => Some(Self::Subsystem),
            "Затраченное время" | "Spent time" => Some(Self::TimeSpent),
            "Дата начала" | "Start Date" => Some(Self::StartDate),
            "Due Date" => Some(Self::Deadline),
            _ => None,
        }
    }
}

#[derive(Default)]
struct FieldValues {
    priority: Option<String>,
    kind: Option<String>,
    status: Option<String>,
    executor: Option<String>,
    subsystem: Option<String>,
    time_spent: Option<String>,
    start_date: Option<Value>,
    deadline: Option<Value>,
}

/// Maps one raw issue into a [`Task`]. The start date defaults to the
/// deadline here and nowhere else.
#[tracing::instrument(skip(raw, tz), fields(id = %raw.id_readable))]
pub fn normalize_issue(raw: &RawIssue, project: &str, tz: Tz) -> Result<Task, TaskError> {
    let mut values = FieldValues::default();

    for custom in &raw.custom_fields {
        let Some(field) = TaskField::from_custom_field(custom.name()) else {
            debug!(field = custom.name(), "ignoring unmapped custom field");
            continue;
        };

        match field {
            TaskField::Priority => values.priority = value_text(&custom.value),
            TaskField::Kind => values.kind = value_text(&custom.value),
            TaskField::Status => values.status = value_text(&custom.value),
            TaskField::Executor => values.executor = value_text(&custom.value),
            TaskField::Subsystem => values.subsystem = value_text(&custom.value),
            TaskField::TimeSpent => values.time_spent = value_text(&custom.value),
            TaskField::StartDate => values.start_date = non_null(&custom.value),
            TaskField::Deadline => values.deadline = non_null(&custom.value),
        }
    }

    let id = raw.id_readable.clone();
    let Some(deadline_raw) = values.deadline else {
        return Err(TaskError::MissingDeadline { id });
    };
    let deadline = value_date(&deadline_raw, tz).ok_or_else(|| TaskError::InvalidDate {
        id: id.clone(),
        field: "deadline",
        raw: deadline_raw.to_string(),
    })?;

    let start_date = match values.start_date {
        Some(raw_start) => value_date(&raw_start, tz).unwrap_or_else(|| {
            warn!(id = %id, raw = %raw_start, "unreadable start date; using deadline");
            deadline
        }),
        None => deadline,
    };

    Ok(Task {
        id,
        project: project.to_string(),
        summary: raw.summary.clone(),
        start_date,
        deadline,
        priority: values.priority,
        kind: values.kind,
        status: values.status,
        executor: values.executor,
        subsystem: values.subsystem,
        time_spent: values.time_spent,
    })
}

/// Tasks that normalized cleanly, plus the issues that were rejected.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub tasks: Vec<Task>,
    pub rejected: Vec<TaskError>,
}

#[tracing::instrument(skip(raws, tz), fields(count = raws.len()))]
pub fn normalize_issues(raws: &[RawIssue], project: &str, tz: Tz) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for raw in raws {
        match normalize_issue(raw, project, tz) {
            Ok(task) => batch.tasks.push(task),
            Err(err) => batch.rejected.push(err),
        }
    }

    debug!(
        accepted = batch.tasks.len(),
        rejected = batch.rejected.len(),
        "normalized issue batch"
    );
    batch
}

fn non_null(value: &Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value.clone())
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("presentation"))
            .and_then(Value::as_str)?
            .to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn value_date(value: &Value, tz: Tz) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|millis| date_from_epoch_millis(millis, tz)),
        Value::String(s) => parse_tracker_date(s, tz),
        _ => None,
    }
}
