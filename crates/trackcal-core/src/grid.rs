use chrono::{
  Datelike,
  NaiveDate
};
use serde::Serialize;

use crate::datetime::{
  add_days,
  first_day_of_month,
  monday_offset,
  shift_months,
  start_of_week
};

pub const DAYS_PER_WEEK: usize = 7;
pub const MONTH_GRID_CELLS: usize = 42;
const MAX_MONTH_STEP: i64 = 120_000;

const MONTH_NAMES: [&str; 12] = [
  "Январь",
  "Февраль",
  "Март",
  "Апрель",
  "Май",
  "Июнь",
  "Июль",
  "Август",
  "Сентябрь",
  "Октябрь",
  "Ноябрь",
  "Декабрь"
];

const MONTH_NAMES_GENITIVE: [&str; 12] = [
  "Января",
  "Февраля",
  "Марта",
  "Апреля",
  "Мая",
  "Июня",
  "Июля",
  "Августа",
  "Сентября",
  "Октября",
  "Ноября",
  "Декабря"
];

const WEEKDAY_NAMES: [&str; 7] = [
  "Понедельник",
  "Вторник",
  "Среда",
  "Четверг",
  "Пятница",
  "Суббота",
  "Воскресенье"
];

pub const WEEKDAY_LABELS: [&str; 7] = [
  "Пн", "Вт", "Ср", "Чт", "Пт", "Сб",
  "Вс"
];

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
  Month,
  Week,
  Day
}

impl CalendarView {
  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_lowercase()
      .as_str()
    {
      | "month" | "месяц" => {
        Some(Self::Month)
      }
      | "week" | "неделя" => {
        Some(Self::Week)
      }
      | "day" | "день" => Some(Self::Day),
      | _ => None
    }
  }

  pub fn as_key(
    self
  ) -> &'static str {
    match self {
      | Self::Month => "month",
      | Self::Week => "week",
      | Self::Day => "day"
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
  Month,
  Week
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct GridCell {
  pub date:          NaiveDate,
  /// 0-based grid row.
  pub row:           usize,
  /// 1-based column, Monday is 1.
  pub column:        usize,
  pub outside_focus: bool
}

/// Row-major run of consecutive
/// days, Monday first. Built fresh for
/// each focus date and never edited.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct Grid {
  kind:  GridKind,
  focus: NaiveDate,
  cells: Vec<GridCell>
}

impl Grid {
  /// Six full weeks around the month
  /// of `focus`: the tail of the
  /// previous month, the month itself,
  /// then the head of the next month.
  #[tracing::instrument]
  pub fn month(
    focus: NaiveDate
  ) -> Self {
    let first = first_day_of_month(
      focus.year(),
      focus.month()
    );
    let grid_start = add_days(
      first,
      -monday_offset(first)
    );

    let cells = (0..MONTH_GRID_CELLS)
      .map(|index| {
        let date = add_days(
          grid_start,
          index as i64
        );
        GridCell {
          date,
          row: index / DAYS_PER_WEEK,
          column: index % DAYS_PER_WEEK
            + 1,
          outside_focus: date.month()
            != focus.month()
            || date.year() != focus.year()
        }
      })
      .collect();

    Self {
      kind: GridKind::Month,
      focus,
      cells
    }
  }

  /// Monday through Sunday of the
  /// week holding `focus`.
  #[tracing::instrument]
  pub fn week(
    focus: NaiveDate
  ) -> Self {
    let monday = start_of_week(focus);
    let cells = (0..DAYS_PER_WEEK)
      .map(|index| {
        GridCell {
          date:          add_days(
            monday,
            index as i64
          ),
          row:           0,
          column:        index + 1,
          outside_focus: false
        }
      })
      .collect();

    Self {
      kind: GridKind::Week,
      focus,
      cells
    }
  }

  /// Grid for a view, `None` for the
  /// day view which has no grid.
  pub fn for_view(
    view: CalendarView,
    focus: NaiveDate
  ) -> Option<Self> {
    match view {
      | CalendarView::Month => {
        Some(Self::month(focus))
      }
      | CalendarView::Week => {
        Some(Self::week(focus))
      }
      | CalendarView::Day => None
    }
  }

  pub fn kind(&self) -> GridKind {
    self.kind
  }

  pub fn focus(&self) -> NaiveDate {
    self.focus
  }

  pub fn cells(&self) -> &[GridCell] {
    &self.cells
  }

  pub fn row_count(&self) -> usize {
    self.cells.len() / DAYS_PER_WEEK
  }

  /// Cells of one grid row.
  pub fn row(
    &self,
    row: usize
  ) -> &[GridCell] {
    let start = row * DAYS_PER_WEEK;
    let end = (start + DAYS_PER_WEEK)
      .min(self.cells.len());
    self
      .cells
      .get(start..end)
      .unwrap_or(&[])
  }

  /// First and last day the grid
  /// shows, inclusive.
  pub fn bounds(
    &self
  ) -> Option<(NaiveDate, NaiveDate)> {
    Some((
      self.cells.first()?.date,
      self.cells.last()?.date
    ))
  }

  /// Index of the cell showing `date`.
  pub fn index_of(
    &self,
    date: NaiveDate
  ) -> Option<usize> {
    self
      .cells
      .iter()
      .position(|cell| cell.date == date)
  }
}

/// Moves the focus one period forward
/// (`step > 0`) or back.
pub fn shift_focus(
  view: CalendarView,
  focus: NaiveDate,
  step: i64
) -> NaiveDate {
  match view {
    | CalendarView::Month => {
      shift_months(
        focus,
        step.clamp(
          -MAX_MONTH_STEP,
          MAX_MONTH_STEP
        ) as i32
      )
    }
    | CalendarView::Week => {
      add_days(focus, step * 7)
    }
    | CalendarView::Day => {
      add_days(focus, step)
    }
  }
}

/// Heading shown above a view, e.g.
/// `Октябрь 2026`, `Октябрь 19-25` or
/// `Понедельник, 19 Октября 2026`.
pub fn period_title(
  view: CalendarView,
  focus: NaiveDate
) -> String {
  match view {
    | CalendarView::Month => {
      format!(
        "{} {}",
        month_name(focus),
        focus.year()
      )
    }
    | CalendarView::Week => {
      let start = start_of_week(focus);
      let end = add_days(start, 6);
      format!(
        "{} {}-{}",
        month_name(start),
        start.day(),
        end.day()
      )
    }
    | CalendarView::Day => {
      format!(
        "{}, {} {} {}",
        WEEKDAY_NAMES[monday_offset(
          focus
        )
          as usize],
        focus.day(),
        MONTH_NAMES_GENITIVE
          [focus.month0() as usize],
        focus.year()
      )
    }
  }
}

fn month_name(
  date: NaiveDate
) -> &'static str {
  MONTH_NAMES[date.month0() as usize]
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::datetime::last_day_of_month;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn february_non_leap_grid_has_42_cells()
   {
    let grid =
      Grid::month(date(2026, 2, 10));
    assert_eq!(grid.cells().len(), 42);
    assert_eq!(grid.row_count(), 6);

    let (first, last) =
      grid.bounds().expect("bounds");
    assert!(first <= date(2026, 2, 1));
    assert!(last >= date(2026, 2, 28));
    // 2026-02-01 is a Sunday, so six
    // January days lead the grid.
    assert_eq!(first, date(2026, 1, 26));
    assert_eq!(
      grid
        .cells()
        .iter()
        .filter(|cell| !cell.outside_focus)
        .count(),
      28
    );
  }

  #[test]
  fn month_cells_are_consecutive_and_row_major()
   {
    for (y, m) in [
      (2024, 2),
      (2026, 6),
      (2026, 12),
      (2027, 1)
    ] {
      let grid = Grid::month(date(
        y, m, 15
      ));
      let cells = grid.cells();
      assert_eq!(cells.len(), 42);
      assert_eq!(
        cells[0].date.weekday(),
        chrono::Weekday::Mon
      );
      for (index, pair) in
        cells.windows(2).enumerate()
      {
        assert_eq!(
          pair[1].date,
          pair[0].date.succ_opt().expect("next day")
        );
        assert_eq!(
          pair[0].row,
          index / 7
        );
        assert_eq!(
          pair[0].column,
          index % 7 + 1
        );
      }
      assert!(
        grid
          .index_of(last_day_of_month(
            y, m
          ))
          .is_some()
      );
    }
  }

  #[test]
  fn month_starting_on_monday_has_no_leading_days()
   {
    // 2026-06-01 is a Monday.
    let grid =
      Grid::month(date(2026, 6, 1));
    assert_eq!(
      grid.cells()[0].date,
      date(2026, 6, 1)
    );
    assert!(!grid.cells()[0].outside_focus);
    assert!(grid.cells()[41].outside_focus);
  }

  #[test]
  fn december_grid_rolls_into_january()
  {
    let grid =
      Grid::month(date(2026, 12, 5));
    let last = grid
      .cells()
      .last()
      .expect("last cell");
    assert_eq!(last.date.year(), 2027);
    assert!(last.outside_focus);
  }

  #[test]
  fn week_grid_starts_on_monday() {
    let grid =
      Grid::week(date(2026, 1, 1));
    let dates = grid
      .cells()
      .iter()
      .map(|cell| cell.date)
      .collect::<Vec<_>>();
    assert_eq!(dates.len(), 7);
    assert_eq!(
      dates[0],
      date(2025, 12, 29)
    );
    assert_eq!(dates[6], date(2026, 1, 4));
    assert!(
      grid
        .cells()
        .iter()
        .all(|cell| cell.row == 0
          && !cell.outside_focus)
    );
  }

  #[test]
  fn navigation_steps_by_view() {
    assert_eq!(
      shift_focus(
        CalendarView::Month,
        date(2026, 1, 31),
        1
      ),
      date(2026, 2, 28)
    );
    assert_eq!(
      shift_focus(
        CalendarView::Week,
        date(2026, 12, 28),
        1
      ),
      date(2027, 1, 4)
    );
    assert_eq!(
      shift_focus(
        CalendarView::Day,
        date(2026, 3, 1),
        -1
      ),
      date(2026, 2, 28)
    );
  }

  #[test]
  fn period_titles() {
    let focus = date(2026, 10, 21);
    assert_eq!(
      period_title(
        CalendarView::Month,
        focus
      ),
      "Октябрь 2026"
    );
    assert_eq!(
      period_title(
        CalendarView::Week,
        focus
      ),
      "Октябрь 19-25"
    );
    assert_eq!(
      period_title(
        CalendarView::Day,
        date(2026, 10, 19)
      ),
      "Понедельник, 19 Октября 2026"
    );
  }

  #[test]
  fn view_keys_round_trip() {
    for view in [
      CalendarView::Month,
      CalendarView::Week,
      CalendarView::Day
    ] {
      assert_eq!(
        CalendarView::from_key(
          view.as_key()
        ),
        Some(view)
      );
    }
    assert_eq!(
      CalendarView::from_key("неделя"),
      Some(CalendarView::Week)
    );
    assert!(Grid::for_view(
      CalendarView::Day,
      date(2026, 10, 21)
    )
    .is_none());
  }
}
