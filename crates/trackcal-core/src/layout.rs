//! Placement of task bars on a calendar grid.
//!
//! A task covering several grid rows becomes one [`Segment`] per row. Every
//! segment in a row takes the next free stack slot of that row, whatever its
//! columns; two bars in disjoint columns of one row still sit on separate
//! lines.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::grid::{DAYS_PER_WEEK, Grid};
use crate::task::Task;

/// One row-bounded piece of a task bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub task_id: String,
    pub row: usize,
    pub start_column: usize,
    pub end_column: usize,
    pub stack_offset: usize,
    /// The bar continues past the left edge of this segment.
    pub left_clipped: bool,
    /// The bar continues past the right edge of this segment.
    pub right_clipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub segments: Vec<Segment>,
    /// Number of stacked bars in each grid row.
    pub row_depths: Vec<usize>,
}

impl Placement {
    pub fn segments_in_row(&self, row: usize) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |segment| segment.row == row)
    }
}

/// Stack counters for a single `place` call.
#[derive(Debug)]
struct RowStacks {
    depths: Vec<usize>,
}

impl RowStacks {
    fn new(rows: usize) -> Self {
        Self {
            depths: vec![0; rows],
        }
    }

    fn claim(&mut self, row: usize) -> usize {
        if row >= self.depths.len() {
            self.depths.resize(row + 1, 0);
        }
        let slot = self.depths[row];
        self.depths[row] += 1;
        slot
    }

    fn into_depths(self) -> Vec<usize> {
        self.depths
    }
}

/// Lays `tasks` out on `grid`. Pure: the same grid and tasks always give the
/// same placement.
#[tracing::instrument(skip(grid, tasks), fields(tasks = tasks.len(), focus = %grid.focus()))]
pub fn place(grid: &Grid, tasks: &[Task]) -> Placement {
    let mut stacks = RowStacks::new(grid.row_count());
    let Some((bounds_start, bounds_end)) = grid.bounds() else {
        return Placement {
            segments: vec![],
            row_depths: stacks.into_depths(),
        };
    };

    let mut visible = tasks
        .iter()
        .filter(|task| {
            let (start, end) = task.span();
            end >= bounds_start && start <= bounds_end
        })
        .collect::<Vec<_>>();
    visible.sort_by_key(|task| task.span());

    let mut segments = Vec::new();
    for task in visible {
        let (start, end) = task.span();
        let clipped_start = start.max(bounds_start);
        let clipped_end = end.min(bounds_end);

        let (Some(start_index), Some(end_index)) =
            (grid.index_of(clipped_start), grid.index_of(clipped_end))
        else {
            warn!(id = %task.id, "clipped span not found in grid; skipping");
            continue;
        };

        let start_row = start_index / DAYS_PER_WEEK;
        let end_row = end_index / DAYS_PER_WEEK;
        let start_column = start_index % DAYS_PER_WEEK + 1;
        let end_column = end_index % DAYS_PER_WEEK + 1;

        for row in start_row..=end_row {
            let first = row == start_row;
            let last = row == end_row;
            segments.push(Segment {
                task_id: task.id.clone(),
                row,
                start_column: if first { start_column } else { 1 },
                end_column: if last { end_column } else { DAYS_PER_WEEK },
                stack_offset: stacks.claim(row),
                left_clipped: !first || start < bounds_start,
                right_clipped: !last || end > bounds_end,
            });
        }
    }

    debug!(segments = segments.len(), "placed tasks on grid");
    Placement {
        segments,
        row_depths: stacks.into_depths(),
    }
}

/// Tasks whose span covers `date`, in the order bars would stack.
pub fn tasks_on_day(tasks: &[Task], date: NaiveDate) -> Vec<Task> {
    let mut day = tasks
        .iter()
        .filter(|task| {
            let (start, end) = task.span();
            start <= date && date <= end
        })
        .cloned()
        .collect::<Vec<_>>();
    day.sort_by_key(|task| task.span());
    day
}
