use std::collections::{
  BTreeMap,
  BTreeSet
};

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  trace
};

use crate::classify::{
  DeadlineBucket,
  TimeSpentBucket,
  UNSPECIFIED,
  classify_time_spent
};
use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub enum FacetField {
  Project,
  Priority,
  Kind,
  Status,
  Executor,
  Subsystem,
  Deadline,
  TimeSpent
}

impl FacetField {
  pub const ALL: [FacetField; 8] = [
    FacetField::Project,
    FacetField::Priority,
    FacetField::Kind,
    FacetField::Status,
    FacetField::Executor,
    FacetField::Subsystem,
    FacetField::Deadline,
    FacetField::TimeSpent
  ];

  pub fn from_name(
    name: &str
  ) -> Option<Self> {
    match name
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "project" => Some(Self::Project),
      | "priority" => {
        Some(Self::Priority)
      }
      | "type" => Some(Self::Kind),
      | "status" | "state" => {
        Some(Self::Status)
      }
      | "executor" => {
        Some(Self::Executor)
      }
      | "subsystem" => {
        Some(Self::Subsystem)
      }
      | "deadline" | "due" => {
        Some(Self::Deadline)
      }
      | "timespent" | "time_spent"
      | "time-spent" => {
        Some(Self::TimeSpent)
      }
      | _ => None
    }
  }

  pub fn as_name(
    self
  ) -> &'static str {
    match self {
      | Self::Project => "project",
      | Self::Priority => "priority",
      | Self::Kind => "type",
      | Self::Status => "status",
      | Self::Executor => "executor",
      | Self::Subsystem => "subsystem",
      | Self::Deadline => "deadline",
      | Self::TimeSpent => "timeSpent"
    }
  }

  /// Plain string value of a direct
  /// field, `None` for the bucketed
  /// fields.
  fn direct_value<'a>(
    self,
    task: &'a Task
  ) -> Option<&'a str> {
    let value = match self {
      | Self::Project => {
        return Some(
          task.project.as_str()
        );
      }
      | Self::Priority => &task.priority,
      | Self::Kind => &task.kind,
      | Self::Status => &task.status,
      | Self::Executor => &task.executor,
      | Self::Subsystem => {
        &task.subsystem
      }
      | Self::Deadline
      | Self::TimeSpent => return None
    };
    Some(
      value
        .as_deref()
        .unwrap_or(UNSPECIFIED)
    )
  }
}

/// A field name and the option
/// values selected for it.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct Facet {
  pub field_name:      String,
  pub selected_values: BTreeSet<String>
}

impl Facet {
  pub fn new<I, S>(
    field_name: &str,
    values: I
  ) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>
  {
    Self {
      field_name:      field_name
        .to_string(),
      selected_values: values
        .into_iter()
        .map(Into::into)
        .collect()
    }
  }
}

/// Facets given as `field:value`
/// terms. Repeating a field adds
/// another accepted value for it.
#[derive(Debug, Clone, Default)]
pub struct FacetSet {
  facets: Vec<Facet>
}

impl FacetSet {
  #[tracing::instrument(skip(terms))]
  pub fn parse(
    terms: &[String]
  ) -> anyhow::Result<Self> {
    let mut set = Self::default();

    for term in terms {
      let (field, value) = term
        .split_once(':')
        .ok_or_else(|| {
          anyhow!(
            "expected field:value \
             filter term, got: {term}"
          )
        })?;
      let field = field.trim();
      let value = value.trim();
      if field.is_empty()
        || value.is_empty()
      {
        return Err(anyhow!(
          "empty field or value in \
           filter term: {term}"
        ));
      }
      set.select(field, value);
    }

    debug!(
      facets = set.facets.len(),
      "parsed facet terms"
    );
    Ok(set)
  }

  pub fn select(
    &mut self,
    field_name: &str,
    value: &str
  ) {
    let known =
      FacetField::from_name(field_name);
    if let Some(facet) = self
      .facets
      .iter_mut()
      .find(|facet| {
        facet.field_name == field_name
          || (known.is_some()
            && FacetField::from_name(
              &facet.field_name
            ) == known)
      })
    {
      facet
        .selected_values
        .insert(value.to_string());
      return;
    }

    self
      .facets
      .push(Facet::new(field_name, [
        value
      ]));
  }

  pub fn facets(&self) -> &[Facet] {
    &self.facets
  }

  pub fn is_empty(&self) -> bool {
    self.facets.is_empty()
  }

  /// Projects named by `project:`
  /// terms, in selection order.
  pub fn selected_projects(
    &self
  ) -> Vec<String> {
    self
      .facets
      .iter()
      .filter(|facet| {
        FacetField::from_name(
          &facet.field_name
        ) == Some(FacetField::Project)
      })
      .flat_map(|facet| {
        facet
          .selected_values
          .iter()
          .cloned()
      })
      .collect()
  }
}

#[derive(Debug, Clone)]
enum Constraint {
  Direct(
    FacetField,
    BTreeSet<String>
  ),
  Deadline(Vec<DeadlineBucket>),
  TimeSpent(BTreeSet<TimeSpentBucket>)
}

impl Constraint {
  fn compile(
    facet: &Facet
  ) -> Option<Self> {
    if facet.selected_values.is_empty()
    {
      return None;
    }

    let Some(field) =
      FacetField::from_name(
        &facet.field_name
      )
    else {
      debug!(
        field = %facet.field_name,
        "ignoring facet on unknown field"
      );
      return None;
    };

    let constraint = match field {
      | FacetField::Deadline => {
        Self::Deadline(
          facet
            .selected_values
            .iter()
            .filter_map(|value| {
              bucket_or_log(
                DeadlineBucket::from_key(
                  value
                ),
                value
              )
            })
            .collect()
        )
      }
      | FacetField::TimeSpent => {
        Self::TimeSpent(
          facet
            .selected_values
            .iter()
            .filter_map(|value| {
              bucket_or_log(
                TimeSpentBucket::from_key(
                  value
                ),
                value
              )
            })
            .collect()
        )
      }
      | direct => {
        Self::Direct(
          direct,
          facet.selected_values.clone()
        )
      }
    };
    Some(constraint)
  }

  fn matches(
    &self,
    task: &Task,
    today: NaiveDate
  ) -> bool {
    match self {
      | Self::Direct(field, selected) => {
        field
          .direct_value(task)
          .is_some_and(|value| {
            selected.contains(value)
          })
      }
      | Self::Deadline(buckets) => {
        buckets.iter().any(|bucket| {
          bucket
            .matches(task.deadline, today)
        })
      }
      | Self::TimeSpent(buckets) => {
        buckets.contains(
          &classify_time_spent(
            task.time_spent.as_deref()
          )
        )
      }
    }
  }
}

fn bucket_or_log<B>(
  bucket: Option<B>,
  value: &str
) -> Option<B> {
  if bucket.is_none() {
    debug!(
      value,
      "selected value names no bucket"
    );
  }
  bucket
}

/// Keeps the tasks that satisfy every
/// active facet, in input order.
#[tracing::instrument(skip(tasks, facets), fields(tasks = tasks.len(), facets = facets.len()))]
pub fn filter_tasks(
  tasks: &[Task],
  facets: &[Facet],
  today: NaiveDate
) -> Vec<Task> {
  let constraints = facets
    .iter()
    .filter_map(Constraint::compile)
    .collect::<Vec<_>>();

  if constraints.is_empty() {
    return tasks.to_vec();
  }

  let kept = tasks
    .iter()
    .filter(|task| {
      let ok =
        constraints.iter().all(|c| {
          c.matches(task, today)
        });
      trace!(id = %task.id, ok, "facet evaluation");
      ok
    })
    .cloned()
    .collect::<Vec<_>>();

  debug!(
    kept = kept.len(),
    "filtered tasks"
  );
  kept
}

/// Option values a field can be
/// filtered by, with how many tasks
/// carry each.
pub fn field_options(
  tasks: &[Task],
  today: NaiveDate
) -> BTreeMap<
  FacetField,
  Vec<(String, usize)>
> {
  let mut out = BTreeMap::new();

  for field in FacetField::ALL {
    let options = match field {
      | FacetField::Deadline => {
        DeadlineBucket::ALL
          .into_iter()
          .map(|bucket| {
            let count = tasks
              .iter()
              .filter(|task| {
                bucket.matches(
                  task.deadline,
                  today
                )
              })
              .count();
            (
              bucket.as_key().to_string(),
              count
            )
          })
          .collect()
      }
      | FacetField::TimeSpent => {
        TimeSpentBucket::ALL
          .into_iter()
          .map(|bucket| {
            let count = tasks
              .iter()
              .filter(|task| {
                classify_time_spent(
                  task
                    .time_spent
                    .as_deref()
                ) == bucket
              })
              .count();
            (
              bucket.as_key().to_string(),
              count
            )
          })
          .collect()
      }
      | direct => {
        let mut counts =
          BTreeMap::new();
        for task in tasks {
          if let Some(value) =
            direct.direct_value(task)
          {
            *counts
              .entry(value.to_string())
              .or_insert(0_usize) += 1;
          }
        }
        counts.into_iter().collect()
      }
    };
    out.insert(field, options);
  }

  out
}
