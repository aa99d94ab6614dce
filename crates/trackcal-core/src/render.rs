use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::classify::{DeadlineBucket, TimeSpentBucket, classify_time_spent};
use crate::config::Config;
use crate::filter::FacetField;
use crate::grid::{Grid, WEEKDAY_LABELS};
use crate::layout::Placement;
use crate::source::Project;
use crate::task::Task;

const CELL_WIDTH: usize = 14;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Colour needs `color` on and a terminal on stdout.
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let wanted = match cfg.get("color") {
            None => true,
            Some(raw) => cfg
                .get_bool("color")
                .ok_or_else(|| anyhow!("color must be on or off, got: {raw}"))?,
        };

        Ok(Self {
            color: wanted && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, grid, placement, tasks))]
    pub fn print_grid(
        &mut self,
        title: &str,
        grid: &Grid,
        placement: &Placement,
        tasks: &[Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_grid(out, title, grid, placement, tasks, today)
    }

    pub fn write_grid<W: Write>(
        &self,
        mut out: W,
        title: &str,
        grid: &Grid,
        placement: &Placement,
        tasks: &[Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(title, "1"))?;

        for label in WEEKDAY_LABELS {
            write!(out, "{}", pad_to_width(label, CELL_WIDTH))?;
        }
        writeln!(out)?;

        let summaries = tasks
            .iter()
            .map(|task| (task.id.as_str(), task.summary.as_str()))
            .collect::<BTreeMap<_, _>>();

        for row in 0..grid.row_count() {
            for cell in grid.row(row) {
                let label = pad_to_width(&cell.date.day().to_string(), CELL_WIDTH);
                let label = if cell.date == today {
                    self.paint(&label, "7")
                } else if cell.outside_focus {
                    self.paint(&label, "2")
                } else {
                    label
                };
                write!(out, "{label}")?;
            }
            writeln!(out)?;

            let mut row_segments = placement.segments_in_row(row).collect::<Vec<_>>();
            row_segments.sort_by_key(|segment| segment.stack_offset);

            for segment in row_segments {
                let leading = (segment.start_column - 1) * CELL_WIDTH;
                let span = segment.end_column + 1 - segment.start_column;
                let width = span * CELL_WIDTH - 1;

                let open = if segment.left_clipped { '‹' } else { '[' };
                let close = if segment.right_clipped { '›' } else { ']' };
                let text = match summaries.get(segment.task_id.as_str()) {
                    Some(summary) if !summary.is_empty() => {
                        format!("{} {summary}", segment.task_id)
                    }
                    _ => segment.task_id.clone(),
                };
                let inner = pad_to_width(&text, width.saturating_sub(2));
                let bar = format!("{open}{inner}{close}");

                writeln!(out, "{}{}", " ".repeat(leading), self.paint(&bar, "36"))?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(
        &mut self,
        title: &str,
        tasks: &[Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.paint(title, "1"))?;

        let mut table = Table::new([
            "ID", "Start", "Deadline", "Status", "Priority", "Executor", "Spent", "Summary",
        ]);
        for task in tasks {
            let deadline = task.deadline.format("%Y-%m-%d").to_string();
            let deadline = if DeadlineBucket::Overdue.matches(task.deadline, today) {
                self.paint(&deadline, "31")
            } else {
                deadline
            };

            let spent = match classify_time_spent(task.time_spent.as_deref()) {
                TimeSpentBucket::Unspecified => String::new(),
                _ => task.time_spent.clone().unwrap_or_default(),
            };

            table.push(vec![
                self.paint(&task.id, "33"),
                task.start_date.format("%Y-%m-%d").to_string(),
                deadline,
                task.status.clone().unwrap_or_default(),
                task.priority.clone().unwrap_or_default(),
                task.executor.clone().unwrap_or_default(),
                spent,
                task.summary.clone(),
            ]);
        }

        table.write_to(&mut out)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, options))]
    pub fn print_options(
        &mut self,
        options: &BTreeMap<FacetField, Vec<(String, usize)>>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for (field, values) in options {
            writeln!(out, "{}", self.paint(field.as_name(), "1"))?;
            for (value, count) in values {
                writeln!(out, "  {value} ({count})")?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, projects))]
    pub fn print_projects(&mut self, projects: &[Project]) -> anyhow::Result<()> {
        let mut table = Table::new(["Short", "Name"]);
        for project in projects {
            table.push(vec![self.paint(&project.short_name, "33"), project.name.clone()]);
        }
        table.write_to(io::stdout().lock())?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Cuts `text` to at most `width` columns and pads it with spaces to exactly
/// `width`.
fn pad_to_width(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut used = 0;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width > width {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out.push_str(&" ".repeat(width - used));
    out
}

/// Left-aligned text table. Column widths ignore colour escapes.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new<const N: usize>(headers: [&str; N]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        (0..self.headers.len())
            .map(|col| {
                std::iter::once(&self.headers[col])
                    .chain(self.rows.iter().filter_map(|row| row.get(col)))
                    .map(|cell| visible_width(cell))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        let widths = self.widths();
        let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();

        write_row(&mut out, &self.headers, &widths)?;
        write_row(&mut out, &rule, &widths)?;
        for row in &self.rows {
            write_row(&mut out, row, &widths)?;
        }
        Ok(())
    }
}

fn write_row<W: Write>(out: &mut W, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let padding = width.saturating_sub(visible_width(cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{}", line.trim_end())
}

fn visible_width(text: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(text).as_str())
}

/// Drops `ESC [ ... m` colour sequences.
fn strip_ansi(text: &str) -> String {
    let mut parts = text.split('\x1b');
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        if let Some(end) = part.find('m') {
            out.push_str(&part[end + 1..]);
        }
    }
    out
}
