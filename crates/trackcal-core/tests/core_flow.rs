use std::fs;

use chrono::NaiveDate;
use serde_json::json;
use tempfile::tempdir;
use trackcal_core::commands::build_view;
use trackcal_core::filter::{FacetSet, filter_tasks};
use trackcal_core::grid::{CalendarView, Grid};
use trackcal_core::layout::place;
use trackcal_core::source::{FileSource, TaskSource, fetch_tasks};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn field(name: &str, value: serde_json::Value) -> serde_json::Value {
    json!({ "projectCustomField": { "field": { "name": name } }, "value": value })
}

#[test]
fn file_source_to_placed_month() {
    let temp = tempdir().expect("tempdir");
    let source = FileSource::open(temp.path()).expect("open file source");

    fs::write(
        &source.projects_path,
        json!([{ "name": "Calendar", "shortName": "CAL" }]).to_string(),
    )
    .expect("write projects");

    let issues = json!([
        {
            "idReadable": "CAL-1",
            "summary": "Release",
            "customFields": [
                // 2026-10-19T20:30Z is already the 20th in Yekaterinburg.
                field("Дата начала", json!(1792441800000_i64)),
                field("Due Date", json!("2026-10-23")),
                field("State", json!({ "name": "Готово" })),
                field("Затраченное время", json!({ "minutes": 3540, "presentation": "1н 2д 3ч" }))
            ]
        },
        {
            "idReadable": "CAL-2",
            "summary": "Review",
            "customFields": [
                field("Дата начала", json!("2026-10-29")),
                field("Due Date", json!("2026-11-02")),
                field("State", json!({ "name": "В работе" }))
            ]
        },
        {
            "idReadable": "CAL-3",
            "summary": "No deadline",
            "customFields": [field("Due Date", serde_json::Value::Null)]
        }
    ]);
    fs::write(source.issues_dir.join("CAL.json"), issues.to_string()).expect("write issues");

    let projects = source.projects().expect("projects");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].short_name, "CAL");

    let tz = chrono_tz::Asia::Yekaterinburg;
    assert!(fetch_tasks(&source, "CAL", tz, true).is_err());

    let tasks = fetch_tasks(&source, "CAL", tz, false).expect("fetch tasks");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].start_date, date(2026, 10, 20));
    assert_eq!(tasks[1].span(), (date(2026, 10, 29), date(2026, 11, 2)));

    let today = date(2026, 10, 19);
    let grid = Grid::month(today);
    let placement = place(&grid, &tasks);
    let rows = placement
        .segments
        .iter()
        .map(|s| (s.task_id.as_str(), s.row, s.start_column, s.end_column, s.stack_offset))
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        vec![
            ("CAL-1", 3, 2, 5, 0),
            ("CAL-2", 4, 4, 7, 0),
            ("CAL-2", 5, 1, 1, 0),
        ]
    );

    let facets = FacetSet::parse(&[
        "status:Готово".to_string(),
        "timeSpent:three-to-ten-days".to_string(),
    ])
    .expect("parse facets");
    let done = filter_tasks(&tasks, facets.facets(), today);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, "CAL-1");

    let export = build_view(CalendarView::Week, date(2026, 10, 21), &done);
    assert_eq!(export.title, "Октябрь 19-25");
    let segments = export.segments.expect("week segments");
    assert_eq!(segments.len(), 1);
    assert_eq!((segments[0].start_column, segments[0].end_column), (2, 5));
}
