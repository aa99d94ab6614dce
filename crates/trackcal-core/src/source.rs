use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::task::{RawIssue, Task, normalize_issues};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(rename = "shortName")]
    pub short_name: String,
}

/// Where projects and raw issues come from.
pub trait TaskSource {
    fn projects(&self) -> anyhow::Result<Vec<Project>>;

    fn issues(&self, short_name: &str) -> anyhow::Result<Vec<RawIssue>>;
}

/// Tracker data exported to disk: `projects.json` plus one
/// `issues/<shortName>.json` array per project.
#[derive(Debug)]
pub struct FileSource {
    pub data_dir: PathBuf,
    pub projects_path: PathBuf,
    pub issues_dir: PathBuf,
}

impl FileSource {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        let issues_dir = data_dir.join("issues");
        fs::create_dir_all(&issues_dir)
            .with_context(|| format!("failed to create {}", issues_dir.display()))?;

        let projects_path = data_dir.join("projects.json");
        if !projects_path.exists() {
            fs::write(&projects_path, "[]")
                .with_context(|| format!("failed to create {}", projects_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            projects = %projects_path.display(),
            issues = %issues_dir.display(),
            "opened file source"
        );

        Ok(Self {
            data_dir,
            projects_path,
            issues_dir,
        })
    }

    fn issues_path(&self, short_name: &str) -> anyhow::Result<PathBuf> {
        let trimmed = short_name.trim();
        if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed.starts_with('.') {
            return Err(anyhow!("invalid project short name: {short_name}"));
        }
        Ok(self.issues_dir.join(format!("{trimmed}.json")))
    }
}

impl TaskSource for FileSource {
    #[tracing::instrument(skip(self))]
    fn projects(&self) -> anyhow::Result<Vec<Project>> {
        let raw = fs::read_to_string(&self.projects_path)
            .with_context(|| format!("failed reading {}", self.projects_path.display()))?;
        let projects: Vec<Project> = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.projects_path.display()))?;
        debug!(count = projects.len(), "loaded projects");
        Ok(projects)
    }

    #[tracing::instrument(skip(self))]
    fn issues(&self, short_name: &str) -> anyhow::Result<Vec<RawIssue>> {
        let path = self.issues_path(short_name)?;
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let issues: Vec<RawIssue> = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", path.display()))?;
        debug!(count = issues.len(), "loaded raw issues");
        Ok(issues)
    }
}

/// Fetches one project's issues and normalizes them. With `strict`, any
/// rejected issue fails the whole batch; otherwise rejected issues are
/// dropped with a warning.
#[tracing::instrument(skip(source, tz))]
pub fn fetch_tasks(
    source: &dyn TaskSource,
    short_name: &str,
    tz: Tz,
    strict: bool,
) -> anyhow::Result<Vec<Task>> {
    let raws = source.issues(short_name)?;
    let batch = normalize_issues(&raws, short_name, tz);

    if let Some(first) = batch.rejected.first() {
        if strict {
            return Err(anyhow!(
                "{} of {} issues in {short_name} are invalid; first: {first}",
                batch.rejected.len(),
                raws.len()
            ));
        }
        for err in &batch.rejected {
            warn!(project = short_name, id = err.task_id(), error = %err, "dropping invalid issue");
        }
    }

    Ok(batch.tasks)
}

/// Identifies one project selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

/// Tracks which project selection is current so that a fetch finishing after
/// a newer selection was made cannot overwrite the newer result.
#[derive(Debug, Default)]
pub struct ProjectSelection {
    latest: u64,
    requested: Vec<String>,
    active: Vec<String>,
    tasks: Vec<Task>,
}

impl ProjectSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new selection and returns the token its fetch must present.
    pub fn request(&mut self, projects: Vec<String>) -> RequestToken {
        self.latest += 1;
        self.requested = projects;
        debug!(token = self.latest, projects = ?self.requested, "project selection requested");
        RequestToken(self.latest)
    }

    /// Applies fetched tasks if `token` is the latest request. Returns whether
    /// the tasks were applied.
    pub fn complete(&mut self, token: RequestToken, tasks: Vec<Task>) -> bool {
        if token.0 != self.latest {
            debug!(
                token = token.0,
                latest = self.latest,
                "discarding stale fetch result"
            );
            return false;
        }

        self.active = self.requested.clone();
        self.tasks = tasks;
        true
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.latest
    }

    /// Projects whose tasks are currently held.
    pub fn active_projects(&self) -> &[String] {
        &self.active
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}
