use chrono::{
  Datelike,
  NaiveDate
};
use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::datetime::{
  add_days,
  iso_week_key
};

/// Filter value matching tasks whose
/// field is not set.
pub const UNSPECIFIED: &str =
  "unspecified";

const HOURS_PER_WEEK: f64 = 40.0;
const HOURS_PER_DAY: f64 = 8.0;
const HOURS_PER_HOUR: f64 = 1.0;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DeadlineBucket {
  Overdue,
  Today,
  Tomorrow,
  ThisWeek,
  NextWeek,
  ThisMonth
}

impl DeadlineBucket {
  pub const ALL: [DeadlineBucket; 6] = [
    DeadlineBucket::Overdue,
    DeadlineBucket::Today,
    DeadlineBucket::Tomorrow,
    DeadlineBucket::ThisWeek,
    DeadlineBucket::NextWeek,
    DeadlineBucket::ThisMonth
  ];

  pub fn as_key(
    self
  ) -> &'static str {
    match self {
      | Self::Overdue => "overdue",
      | Self::Today => "today",
      | Self::Tomorrow => "tomorrow",
      | Self::ThisWeek => "this-week",
      | Self::NextWeek => "next-week",
      | Self::ThisMonth => "this-month"
    }
  }

  pub fn label(
    self
  ) -> &'static str {
    match self {
      | Self::Overdue => "Просрочено",
      | Self::Today => "Сегодня",
      | Self::Tomorrow => "Завтра",
      | Self::ThisWeek => {
        "На этой неделе"
      }
      | Self::NextWeek => {
        "На следующей неделе"
      }
      | Self::ThisMonth => {
        "В этом месяце"
      }
    }
  }

  /// Accepts either the key or the
  /// display label.
  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    let trimmed = raw.trim();
    Self::ALL.into_iter().find(
      |bucket| {
        bucket
          .as_key()
          .eq_ignore_ascii_case(trimmed)
          || bucket.label() == trimmed
      }
    )
  }

  /// Whether a deadline on `deadline`
  /// carries this tag when seen on
  /// `today`.
  pub fn matches(
    self,
    deadline: NaiveDate,
    today: NaiveDate
  ) -> bool {
    match self {
      | Self::Overdue => deadline < today,
      | Self::Today => deadline == today,
      | Self::Tomorrow => {
        deadline == add_days(today, 1)
      }
      | Self::ThisWeek => {
        iso_week_key(deadline)
          == iso_week_key(today)
      }
      | Self::NextWeek => {
        iso_week_key(deadline)
          == iso_week_key(add_days(
            today, 7
          ))
      }
      | Self::ThisMonth => {
        deadline.year() == today.year()
          && deadline.month()
            == today.month()
      }
    }
  }
}

/// Every bucket tag a deadline
/// carries. Tags overlap: a deadline
/// today is also this week and this
/// month.
pub fn classify_deadline(
  deadline: NaiveDate,
  today: NaiveDate
) -> Vec<DeadlineBucket> {
  DeadlineBucket::ALL
    .into_iter()
    .filter(|bucket| {
      bucket.matches(deadline, today)
    })
    .collect()
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum TimeSpentBucket {
  LessThanADay,
  OneToThreeDays,
  ThreeToTenDays,
  TenDaysToMonth,
  MoreThanAMonth,
  Unspecified
}

impl TimeSpentBucket {
  pub const ALL: [TimeSpentBucket; 6] = [
    TimeSpentBucket::LessThanADay,
    TimeSpentBucket::OneToThreeDays,
    TimeSpentBucket::ThreeToTenDays,
    TimeSpentBucket::TenDaysToMonth,
    TimeSpentBucket::MoreThanAMonth,
    TimeSpentBucket::Unspecified
  ];

  pub fn as_key(
    self
  ) -> &'static str {
    match self {
      | Self::LessThanADay => {
        "less-than-a-day"
      }
      | Self::OneToThreeDays => {
        "one-to-three-days"
      }
      | Self::ThreeToTenDays => {
        "three-to-ten-days"
      }
      | Self::TenDaysToMonth => {
        "ten-days-to-month"
      }
      | Self::MoreThanAMonth => {
        "more-than-a-month"
      }
      | Self::Unspecified => UNSPECIFIED
    }
  }

  pub fn label(
    self
  ) -> &'static str {
    match self {
      | Self::LessThanADay => {
        "Меньше дня"
      }
      | Self::OneToThreeDays => {
        "От 1 до 3 дней"
      }
      | Self::ThreeToTenDays => {
        "От 3 до 10 дней"
      }
      | Self::TenDaysToMonth => {
        "От 10 дней до месяца"
      }
      | Self::MoreThanAMonth => {
        "Больше месяца"
      }
      | Self::Unspecified => {
        "Не указано"
      }
    }
  }

  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    let trimmed = raw.trim();
    Self::ALL.into_iter().find(
      |bucket| {
        bucket
          .as_key()
          .eq_ignore_ascii_case(trimmed)
          || bucket.label() == trimmed
      }
    )
  }

  pub fn from_hours(
    hours: f64
  ) -> Self {
    if hours <= 8.0 {
      Self::LessThanADay
    } else if hours <= 24.0 {
      Self::OneToThreeDays
    } else if hours < 64.0 {
      Self::ThreeToTenDays
    } else if hours <= 160.0 {
      Self::TenDaysToMonth
    } else {
      Self::MoreThanAMonth
    }
  }
}

/// Sums a duration presentation such
/// as `1н 2д 3ч` (or `1w 2d 3h`) into
/// working hours. Tokens that do not
/// parse add nothing.
pub fn total_hours(
  presentation: &str
) -> f64 {
  let Ok(token_re) = Regex::new(
    r"^(?P<num>\d+(?:[.,]\d+)?)(?P<unit>\p{L})$"
  ) else {
    return 0.0;
  };

  presentation
    .split_whitespace()
    .map(|token| {
      token_hours(&token_re, token)
    })
    .sum()
}

fn token_hours(
  token_re: &Regex,
  token: &str
) -> f64 {
  let Some(caps) =
    token_re.captures(token)
  else {
    trace!(
      token,
      "malformed duration token; \
       counted as zero"
    );
    return 0.0;
  };

  let amount = caps
    .name("num")
    .map(|m| m.as_str().replace(',', "."))
    .and_then(|raw| {
      raw.parse::<f64>().ok()
    });
  let unit = caps
    .name("unit")
    .map(|m| m.as_str().to_lowercase());

  let per_unit = match unit.as_deref() {
    | Some("н" | "w") => HOURS_PER_WEEK,
    | Some("д" | "d") => HOURS_PER_DAY,
    | Some("ч" | "h") => HOURS_PER_HOUR,
    | _ => {
      trace!(
        token,
        "unknown duration unit; \
         counted as zero"
      );
      return 0.0;
    }
  };

  amount
    .map(|value| value * per_unit)
    .unwrap_or(0.0)
}

pub fn classify_time_spent(
  time_spent: Option<&str>
) -> TimeSpentBucket {
  match time_spent {
    | Some(presentation) => {
      TimeSpentBucket::from_hours(
        total_hours(presentation)
      )
    }
    | None => {
      TimeSpentBucket::Unspecified
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn deadline_today_is_also_this_week_and_month()
   {
    let today = date(2026, 10, 21);
    assert_eq!(
      classify_deadline(today, today),
      vec![
        DeadlineBucket::Today,
        DeadlineBucket::ThisWeek,
        DeadlineBucket::ThisMonth
      ]
    );
  }

  #[test]
  fn overdue_and_tomorrow() {
    let today = date(2026, 10, 21);
    assert!(
      DeadlineBucket::Overdue.matches(
        date(2026, 10, 20),
        today
      )
    );
    assert!(
      !DeadlineBucket::Overdue
        .matches(today, today)
    );
    assert!(
      DeadlineBucket::Tomorrow.matches(
        date(2026, 10, 22),
        today
      )
    );
    // Month end rolls into the next
    // month.
    assert!(
      DeadlineBucket::Tomorrow.matches(
        date(2026, 11, 1),
        date(2026, 10, 31)
      )
    );
  }

  #[test]
  fn next_week_across_year_boundary() {
    // 2021-12-29 is in ISO week 52,
    // 2022-01-05 in week 1 of 2022.
    let today = date(2021, 12, 29);
    let deadline = date(2022, 1, 5);
    let buckets =
      classify_deadline(deadline, today);
    assert_eq!(
      buckets,
      vec![DeadlineBucket::NextWeek]
    );
  }

  #[test]
  fn this_week_uses_iso_year() {
    // 2025-12-29 and 2026-01-01 share
    // ISO week 1 of 2026.
    assert!(
      DeadlineBucket::ThisWeek.matches(
        date(2026, 1, 1),
        date(2025, 12, 29)
      )
    );
    assert!(
      !DeadlineBucket::ThisMonth.matches(
        date(2026, 1, 1),
        date(2025, 12, 29)
      )
    );
  }

  #[test]
  fn this_week_and_next_week_are_exclusive()
   {
    let today = date(2026, 10, 21);
    for offset in -14_i64..=21 {
      let deadline =
        add_days(today, offset);
      let this_week =
        DeadlineBucket::ThisWeek
          .matches(deadline, today);
      let next_week =
        DeadlineBucket::NextWeek
          .matches(deadline, today);
      assert!(!(this_week && next_week));
    }
  }

  #[test]
  fn total_hours_sums_units() {
    assert_eq!(
      total_hours("1н 2д 3ч"),
      59.0
    );
    assert_eq!(
      total_hours("1w 2d 3h"),
      59.0
    );
    assert_eq!(
      classify_time_spent(Some(
        "1н 2д 3ч"
      )),
      TimeSpentBucket::ThreeToTenDays
    );
  }

  #[test]
  fn malformed_tokens_count_as_zero() {
    assert_eq!(
      total_hours("2д abc 30м ч 4ч"),
      20.0
    );
    assert_eq!(total_hours(""), 0.0);
  }

  #[test]
  fn time_spent_boundaries() {
    let cases = [
      (8.0, TimeSpentBucket::LessThanADay),
      (
        8.5,
        TimeSpentBucket::OneToThreeDays
      ),
      (
        24.0,
        TimeSpentBucket::OneToThreeDays
      ),
      (
        25.0,
        TimeSpentBucket::ThreeToTenDays
      ),
      (
        64.0,
        TimeSpentBucket::TenDaysToMonth
      ),
      (
        160.0,
        TimeSpentBucket::TenDaysToMonth
      ),
      (
        161.0,
        TimeSpentBucket::MoreThanAMonth
      )
    ];
    for (hours, expected) in cases {
      assert_eq!(
        TimeSpentBucket::from_hours(
          hours
        ),
        expected,
        "hours {hours}"
      );
    }
    assert_eq!(
      classify_time_spent(None),
      TimeSpentBucket::Unspecified
    );
  }

  #[test]
  fn bucket_keys_and_labels_parse_back()
  {
    assert_eq!(
      DeadlineBucket::from_key(
        "next-week"
      ),
      Some(DeadlineBucket::NextWeek)
    );
    assert_eq!(
      DeadlineBucket::from_key("Завтра"),
      Some(DeadlineBucket::Tomorrow)
    );
    assert_eq!(
      TimeSpentBucket::from_key(
        UNSPECIFIED
      ),
      Some(TimeSpentBucket::Unspecified)
    );
    assert_eq!(
      TimeSpentBucket::from_key("later"),
      None
    );
  }
}
