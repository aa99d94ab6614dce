use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{parse_date_expr, today_in};
use crate::filter::{FacetSet, field_options, filter_tasks};
use crate::grid::{CalendarView, Grid, GridCell, period_title, shift_focus};
use crate::layout::{Segment, place, tasks_on_day};
use crate::render::Renderer;
use crate::source::{ProjectSelection, TaskSource, fetch_tasks};
use crate::task::Task;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "month", "week", "day", "projects", "options", "export", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(source, cfg, renderer, inv))]
pub fn dispatch(
    source: &dyn TaskSource,
    cfg: &Config,
    renderer: &mut Renderer,
    tz: Tz,
    inv: Invocation,
) -> anyhow::Result<()> {
    let today = today_in(tz);
    let facets = FacetSet::parse(&inv.facet_terms)?;
    let command = inv.command.as_str();

    debug!(
        command,
        facets = ?inv.facet_terms,
        args = ?inv.command_args,
        %today,
        "dispatching command"
    );

    match command {
        "month" => cmd_view(
            source,
            cfg,
            renderer,
            tz,
            &facets,
            CalendarView::Month,
            &inv.command_args,
            today,
        ),
        "week" => cmd_view(
            source,
            cfg,
            renderer,
            tz,
            &facets,
            CalendarView::Week,
            &inv.command_args,
            today,
        ),
        "day" => cmd_view(
            source,
            cfg,
            renderer,
            tz,
            &facets,
            CalendarView::Day,
            &inv.command_args,
            today,
        ),
        "projects" => cmd_projects(source, renderer),
        "options" => cmd_options(source, cfg, renderer, tz, &facets, today),
        "export" => cmd_export(source, cfg, tz, &facets, &inv.command_args, today),
        "help" => cmd_help(),
        "version" => cmd_version(),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Loads the tasks of the projects named by `project:` facets, else
/// `default.project`, else every project the source knows.
#[instrument(skip(source, cfg, tz, facets))]
pub fn load_tasks(
    source: &dyn TaskSource,
    cfg: &Config,
    tz: Tz,
    facets: &FacetSet,
) -> anyhow::Result<Vec<Task>> {
    let mut projects = facets.selected_projects();
    if projects.is_empty()
        && let Some(default_project) = cfg.get("default.project")
    {
        projects.push(default_project);
    }
    if projects.is_empty() {
        projects = source
            .projects()?
            .into_iter()
            .map(|project| project.short_name)
            .collect();
    }

    let strict = cfg.get_bool("calendar.strict").unwrap_or(false);
    let mut selection = ProjectSelection::new();
    let token = selection.request(projects.clone());

    let mut tasks = Vec::new();
    for short_name in &projects {
        let fetched = fetch_tasks(source, short_name, tz, strict)
            .with_context(|| format!("failed to load tasks of project {short_name}"))?;
        tasks.extend(fetched);
    }

    if !selection.complete(token, tasks) {
        return Err(anyhow!("project selection changed while loading"));
    }

    info!(
        projects = ?selection.active_projects(),
        tasks = selection.tasks().len(),
        "loaded tasks"
    );
    Ok(selection.tasks().to_vec())
}

/// Focus date from command arguments. `next`/`prev` step one period from
/// the current focus; anything else is a date expression relative to today.
pub fn resolve_focus(
    view: CalendarView,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<NaiveDate> {
    let mut focus = today;
    for arg in args {
        focus = match arg.to_lowercase().as_str() {
            "next" | "след" => shift_focus(view, focus, 1),
            "prev" | "пред" => shift_focus(view, focus, -1),
            _ => parse_date_expr(arg, today)
                .with_context(|| format!("invalid date expression: {arg}"))?,
        };
    }
    Ok(focus)
}

/// Everything one calendar view shows, as exported to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewExport {
    pub view: CalendarView,
    pub focus: NaiveDate,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<GridCell>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Segment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

pub fn build_view(view: CalendarView, focus: NaiveDate, tasks: &[Task]) -> ViewExport {
    let title = period_title(view, focus);
    match Grid::for_view(view, focus) {
        Some(grid) => {
            let placement = place(&grid, tasks);
            ViewExport {
                view,
                focus,
                title,
                cells: Some(grid.cells().to_vec()),
                segments: Some(placement.segments),
                tasks: None,
            }
        }
        None => ViewExport {
            view,
            focus,
            title,
            cells: None,
            segments: None,
            tasks: Some(tasks_on_day(tasks, focus)),
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_view(
    source: &dyn TaskSource,
    cfg: &Config,
    renderer: &mut Renderer,
    tz: Tz,
    facets: &FacetSet,
    view: CalendarView,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!(view = view.as_key(), "command view");

    let focus = resolve_focus(view, args, today)?;
    let loaded = load_tasks(source, cfg, tz, facets)?;
    let tasks = filter_tasks(&loaded, facets.facets(), today);
    let title = period_title(view, focus);

    match Grid::for_view(view, focus) {
        Some(grid) => {
            let placement = place(&grid, &tasks);
            renderer.print_grid(&title, &grid, &placement, &tasks, today)
        }
        None => renderer.print_task_table(&title, &tasks_on_day(&tasks, focus), today),
    }
}

fn cmd_projects(source: &dyn TaskSource, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command projects");
    let projects = source.projects()?;
    renderer.print_projects(&projects)
}

fn cmd_options(
    source: &dyn TaskSource,
    cfg: &Config,
    renderer: &mut Renderer,
    tz: Tz,
    facets: &FacetSet,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command options");
    let tasks = load_tasks(source, cfg, tz, facets)?;
    renderer.print_options(&field_options(&tasks, today))
}

fn cmd_export(
    source: &dyn TaskSource,
    cfg: &Config,
    tz: Tz,
    facets: &FacetSet,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command export");

    let (view_key, focus_args) = args
        .split_first()
        .ok_or_else(|| anyhow!("export needs a view: month, week or day"))?;
    let view = CalendarView::from_key(view_key)
        .ok_or_else(|| anyhow!("unknown view: {view_key}"))?;

    let focus = resolve_focus(view, focus_args, today)?;
    let loaded = load_tasks(source, cfg, tz, facets)?;
    let tasks = filter_tasks(&loaded, facets.facets(), today);

    let out = serde_json::to_string(&build_view(view, focus, &tasks))?;
    println!("{out}");
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: trackcal [field:value ...] <command> [args]");
    println!();
    println!("commands: month, week, day [date|next|prev], projects, options, export <view> [date]");
    println!(
        "fields: project, priority, type, status, executor, subsystem, deadline, timeSpent"
    );
    Ok(())
}

fn cmd_version() -> anyhow::Result<()> {
    println!("trackcal {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{Value, json};

    use super::*;
    use crate::source::Project;
    use crate::task::RawIssue;

    struct MemorySource {
        issues: BTreeMap<String, Value>,
    }

    impl TaskSource for MemorySource {
        fn projects(&self) -> anyhow::Result<Vec<Project>> {
            Ok(self
                .issues
                .keys()
                .map(|short_name| Project {
                    name: format!("Project {short_name}"),
                    short_name: short_name.clone(),
                })
                .collect())
        }

        fn issues(&self, short_name: &str) -> anyhow::Result<Vec<RawIssue>> {
            let raw = self
                .issues
                .get(short_name)
                .ok_or_else(|| anyhow!("no such project: {short_name}"))?;
            Ok(serde_json::from_value(raw.clone())?)
        }
    }

    fn issue(id: &str, due: Value) -> Value {
        json!({
            "idReadable": id,
            "summary": format!("summary of {id}"),
            "customFields": [
                { "projectCustomField": { "field": { "name": "Due Date" } }, "value": due }
            ]
        })
    }

    fn source() -> MemorySource {
        let mut issues = BTreeMap::new();
        issues.insert(
            "CAL".to_string(),
            json!([issue("CAL-1", json!("2026-10-21")), issue("CAL-2", Value::Null)]),
        );
        issues.insert("WEB".to_string(), json!([issue("WEB-1", json!("2026-10-22"))]));
        MemorySource { issues }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn tz() -> Tz {
        chrono_tz::Asia::Yekaterinburg
    }

    #[test]
    fn expands_unambiguous_prefixes() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("mo", &known), Some("month"));
        assert_eq!(expand_command_abbrev("exp", &known), Some("export"));
        assert_eq!(expand_command_abbrev("p", &known), Some("projects"));
        assert_eq!(expand_command_abbrev("x", &known), None);
        assert_eq!(expand_command_abbrev("status:open", &known), None);
    }

    #[test]
    fn loads_every_project_without_selection() {
        let cfg = Config::default();
        let tasks = load_tasks(&source(), &cfg, tz(), &FacetSet::default()).expect("load");
        let ids = tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["CAL-1", "WEB-1"]);
    }

    #[test]
    fn project_facet_wins_over_default_project() {
        let mut cfg = Config::default();
        cfg.apply_overrides([("default.project".to_string(), "CAL".to_string())]);

        let facets = FacetSet::parse(&["project:WEB".to_string()]).expect("facets");
        let tasks = load_tasks(&source(), &cfg, tz(), &facets).expect("load");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "WEB-1");

        let tasks = load_tasks(&source(), &cfg, tz(), &FacetSet::default()).expect("load");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "CAL-1");
    }

    #[test]
    fn strict_mode_rejects_batch_with_invalid_issue() {
        let mut cfg = Config::default();
        cfg.apply_overrides([("rc.calendar.strict".to_string(), "on".to_string())]);
        let facets = FacetSet::parse(&["project:CAL".to_string()]).expect("facets");
        assert!(load_tasks(&source(), &cfg, tz(), &facets).is_err());
    }

    #[test]
    fn focus_steps_and_date_expressions() {
        let today = date(2026, 10, 19);
        let args = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(resolve_focus(CalendarView::Month, &[], today).expect("focus"), today);
        assert_eq!(
            resolve_focus(CalendarView::Month, &args(&["next"]), today).expect("focus"),
            date(2026, 11, 19)
        );
        assert_eq!(
            resolve_focus(CalendarView::Week, &args(&["prev", "prev"]), today).expect("focus"),
            date(2026, 10, 5)
        );
        assert_eq!(
            resolve_focus(CalendarView::Day, &args(&["2026-12-31", "next"]), today)
                .expect("focus"),
            date(2027, 1, 1)
        );
        assert!(resolve_focus(CalendarView::Day, &args(&["someday"]), today).is_err());
    }

    #[test]
    fn month_export_carries_grid_and_segments() {
        let tasks = vec![Task::new("CAL-1", "CAL", date(2026, 10, 21))];
        let export = build_view(CalendarView::Month, date(2026, 10, 19), &tasks);
        assert_eq!(export.title, "Октябрь 2026");
        assert_eq!(export.cells.as_ref().map(Vec::len), Some(42));
        assert_eq!(export.segments.as_ref().map(Vec::len), Some(1));
        assert!(export.tasks.is_none());

        let value = serde_json::to_value(&export).expect("json");
        assert_eq!(value["view"], "month");
        assert_eq!(value["focus"], "2026-10-19");
        assert!(value.get("tasks").is_none());
    }

    #[test]
    fn day_export_lists_covering_tasks() {
        let tasks = vec![
            Task::new("CAL-1", "CAL", date(2026, 10, 21)).with_start(date(2026, 10, 18)),
            Task::new("CAL-2", "CAL", date(2026, 10, 25)),
        ];
        let export = build_view(CalendarView::Day, date(2026, 10, 19), &tasks);
        assert!(export.cells.is_none());
        let ids = export
            .tasks
            .as_ref()
            .map(|tasks| tasks.iter().map(|t| t.id.clone()).collect::<Vec<_>>());
        assert_eq!(ids, Some(vec!["CAL-1".to_string()]));
    }
}
