use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;
use tracing::{
  debug,
  warn
};

const TIME_FILE_NAME: &str =
  "trackcal-time.toml";
const TIME_FILE_ENV_VAR: &str =
  "TRACKCAL_TIME_CONFIG";
const TIMEZONE_ENV_VAR: &str =
  "TRACKCAL_TIMEZONE";
const DEFAULT_TIMEZONE: Tz =
  Tz::Asia__Yekaterinburg;

const DAY_WORDS: [(&str, i64); 6] = [
  ("today", 0),
  ("сегодня", 0),
  ("tomorrow", 1),
  ("завтра", 1),
  ("yesterday", -1),
  ("вчера", -1)
];

const WEEKDAY_WORDS: [(
  Weekday,
  &[&str]
); 7] = [
  (Weekday::Mon, &[
    "monday", "mon", "пн",
    "понедельник"
  ]),
  (Weekday::Tue, &[
    "tuesday", "tue", "вт", "вторник"
  ]),
  (Weekday::Wed, &[
    "wednesday", "wed", "ср", "среда"
  ]),
  (Weekday::Thu, &[
    "thursday", "thu", "чт", "четверг"
  ]),
  (Weekday::Fri, &[
    "friday", "fri", "пт", "пятница"
  ]),
  (Weekday::Sat, &[
    "saturday", "sat", "сб", "суббота"
  ]),
  (Weekday::Sun, &[
    "sunday",
    "sun",
    "вс",
    "воскресенье"
  ])
];

const MONTH_WORDS: [&[&str]; 12] = [
  &["january", "jan", "январь"],
  &["february", "feb", "февраль"],
  &["march", "mar", "март"],
  &["april", "apr", "апрель"],
  &["may", "май"],
  &["june", "jun", "июнь"],
  &["july", "jul", "июль"],
  &["august", "aug", "август"],
  &["september", "sep", "сентябрь"],
  &["october", "oct", "октябрь"],
  &["november", "nov", "ноябрь"],
  &["december", "dec", "декабрь"]
];

/// `trackcal-time.toml`: either a
/// top-level `timezone` or one under
/// `[calendar]`.
#[derive(Debug, Default, Deserialize)]
struct TimeFile {
  timezone: Option<String>,
  calendar: Option<TimeFileCalendar>
}

#[derive(Debug, Default, Deserialize)]
struct TimeFileCalendar {
  timezone: Option<String>
}

/// Timezone that decides which local
/// day a tracker timestamp falls on:
/// the rc value, then
/// `TRACKCAL_TIMEZONE`, then
/// `trackcal-time.toml`, then
/// Yekaterinburg.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  configured
    .and_then(|raw| {
      timezone_named(raw, "rc")
    })
    .or_else(|| {
      std::env::var(TIMEZONE_ENV_VAR)
        .ok()
        .and_then(|raw| {
          timezone_named(
            &raw,
            TIMEZONE_ENV_VAR
          )
        })
    })
    .or_else(|| {
      let path = time_file_path()?;
      match read_time_file(&path) {
        | Ok(Some(raw)) => {
          timezone_named(
            &raw,
            TIME_FILE_NAME
          )
        }
        | Ok(None) => None,
        | Err(err) => {
          warn!(error = %format!("{err:#}"), "ignoring time file");
          None
        }
      }
    })
    .unwrap_or(DEFAULT_TIMEZONE)
}

#[must_use]
pub fn today_in(tz: Tz) -> NaiveDate {
  Utc::now()
    .with_timezone(&tz)
    .date_naive()
}

fn time_file_path() -> Option<PathBuf> {
  match std::env::var(TIME_FILE_ENV_VAR)
  {
    | Ok(raw) if !raw.trim().is_empty() => {
      Some(PathBuf::from(raw.trim()))
    }
    | _ => {
      std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIME_FILE_NAME))
    }
  }
}

fn read_time_file(
  path: &Path
) -> anyhow::Result<Option<String>> {
  if !path.is_file() {
    debug!(file = %path.display(), "no time file");
    return Ok(None);
  }

  let text = fs::read_to_string(path)
    .with_context(|| {
      format!(
        "failed to read {}",
        path.display()
      )
    })?;
  let parsed: TimeFile =
    toml::from_str(&text)
      .with_context(|| {
        format!(
          "failed to parse {}",
          path.display()
        )
      })?;

  Ok(parsed.timezone.or_else(|| {
    parsed
      .calendar
      .and_then(|cal| cal.timezone)
  }))
}

fn timezone_named(
  raw: &str,
  origin: &str
) -> Option<Tz> {
  let name = raw.trim();
  if name.is_empty() {
    return None;
  }

  name
    .parse::<Tz>()
    .inspect(|tz| {
      debug!(origin, timezone = %tz, "using timezone")
    })
    .map_err(|err| {
      warn!(origin, timezone = name, error = %err, "unknown timezone")
    })
    .ok()
}

/// Calendar day of a tracker
/// timestamp (milliseconds since the
/// epoch) in `tz`.
pub fn date_from_epoch_millis(
  millis: i64,
  tz: Tz
) -> Option<NaiveDate> {
  DateTime::<Utc>::from_timestamp_millis(
    millis
  )
  .map(|dt| {
    dt.with_timezone(&tz).date_naive()
  })
}

/// Calendar day of a textual tracker
/// date: `YYYY-MM-DD`, RFC 3339, or a
/// millisecond timestamp written as
/// digits.
pub fn parse_tracker_date(
  raw: &str,
  tz: Tz
) -> Option<NaiveDate> {
  let text = raw.trim();

  NaiveDate::parse_from_str(
    text, "%Y-%m-%d"
  )
  .ok()
  .or_else(|| {
    DateTime::parse_from_rfc3339(text)
      .ok()
      .map(|dt| {
        dt.with_timezone(&tz).date_naive()
      })
  })
  .or_else(|| {
    text.parse::<i64>().ok().and_then(
      |millis| {
        date_from_epoch_millis(millis, tz)
      }
    )
  })
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let first =
    first_day_of_month(year, month);
  add_days(
    shift_months(first, 1),
    -1
  )
}

/// `date` moved by `days`, or `date`
/// itself when that leaves chrono's
/// range.
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  Duration::try_days(days)
    .and_then(|delta| {
      date.checked_add_signed(delta)
    })
    .unwrap_or(date)
}

/// Position of `date` in a Monday
/// first week, 0 for Monday.
pub fn monday_offset(
  date: NaiveDate
) -> i64 {
  i64::from(
    date
      .weekday()
      .num_days_from_monday()
  )
}

pub fn start_of_week(
  date: NaiveDate
) -> NaiveDate {
  add_days(date, -monday_offset(date))
}

/// Same day `months` later, clamped to
/// the target month's last day.
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let index = i64::from(date.year()) * 12
    + i64::from(date.month0())
    + i64::from(months);
  let Ok(year) =
    i32::try_from(index.div_euclid(12))
  else {
    return date;
  };
  let month =
    index.rem_euclid(12) as u32 + 1;

  (1..=date.day())
    .rev()
    .find_map(|day| {
      NaiveDate::from_ymd_opt(
        year, month, day
      )
    })
    .unwrap_or(date)
}

/// ISO week-numbering year and week
/// of `date`.
pub fn iso_week_key(
  date: NaiveDate
) -> (i32, u32) {
  let week = date.iso_week();
  (week.year(), week.week())
}

/// Resolves a date typed on the
/// command line against `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let text = input.trim();
  let lower = text.to_lowercase();

  day_word(&lower, today)
    .or_else(|| year_start(text))
    .or_else(|| {
      weekday_word(&lower).map(|wd| {
        next_weekday(today, wd)
      })
    })
    .or_else(|| {
      month_word(&lower).map(|month| {
        next_month_start(today, month)
      })
    })
    .or_else(|| {
      relative_offset(&lower, today)
    })
    .or_else(|| {
      NaiveDate::parse_from_str(
        text, "%Y-%m-%d"
      )
      .ok()
    })
    .or_else(|| {
      NaiveDate::parse_from_str(
        &format!("{text}-01"),
        "%Y-%m-%d"
      )
      .ok()
    })
    .ok_or_else(|| {
      anyhow!(
        "unrecognized date \
         expression: {input} (try \
         today, friday, march, +2w, \
         2026-10-19 or 2026-10)"
      )
    })
}

fn day_word(
  lower: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  DAY_WORDS
    .iter()
    .find(|(word, _)| *word == lower)
    .map(|(_, offset)| {
      add_days(today, *offset)
    })
}

fn year_start(
  text: &str
) -> Option<NaiveDate> {
  if text.len() != 4
    || !text
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    return None;
  }
  Some(first_day_of_month(
    text.parse().ok()?,
    1
  ))
}

fn weekday_word(
  lower: &str
) -> Option<Weekday> {
  WEEKDAY_WORDS
    .iter()
    .find(|(_, words)| {
      words.contains(&lower)
    })
    .map(|(weekday, _)| *weekday)
}

fn month_word(lower: &str) -> Option<u32> {
  MONTH_WORDS
    .iter()
    .position(|words| {
      words.contains(&lower)
    })
    .and_then(|idx| {
      u32::try_from(idx + 1).ok()
    })
}

/// Next `weekday` strictly after
/// `from`.
fn next_weekday(
  from: NaiveDate,
  weekday: Weekday
) -> NaiveDate {
  let target = i64::from(
    weekday.num_days_from_monday()
  );
  let ahead = (target
    - monday_offset(from))
  .rem_euclid(7);
  add_days(
    from,
    if ahead == 0 { 7 } else { ahead }
  )
}

/// First day of the next `month` after
/// the current one.
fn next_month_start(
  today: NaiveDate,
  month: u32
) -> NaiveDate {
  let year = if month <= today.month() {
    today.year().saturating_add(1)
  } else {
    today.year()
  };
  first_day_of_month(year, month)
}

/// `+Nd`, `-Nw`, `+Nm` offsets.
fn relative_offset(
  lower: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  let re = Regex::new(
    r"^([+-])(\d+)([dwm])$"
  )
  .ok()?;
  let caps = re.captures(lower)?;

  let amount: i64 =
    caps.get(2)?.as_str().parse().ok()?;
  let amount =
    if caps.get(1)?.as_str() == "-" {
      -amount
    } else {
      amount
    };

  match caps.get(3)?.as_str() {
    | "d" => Some(add_days(today, amount)),
    | "w" => {
      Some(add_days(
        today,
        amount.checked_mul(7)?
      ))
    }
    | _ => {
      Some(shift_months(
        today,
        i32::try_from(amount).ok()?
      ))
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
  fn last_day_handles_leap_years_and_december()
   {
    assert_eq!(
      last_day_of_month(2024, 2),
      date(2024, 2, 29)
    );
    assert_eq!(
      last_day_of_month(2026, 2),
      date(2026, 2, 28)
    );
    assert_eq!(
      last_day_of_month(2026, 12),
      date(2026, 12, 31)
    );
    assert_eq!(
      last_day_of_month(2026, 4),
      date(2026, 4, 30)
    );
  }

  #[test]
  fn shift_months_clamps_day() {
    assert_eq!(
      shift_months(date(2026, 1, 31), 1),
      date(2026, 2, 28)
    );
    assert_eq!(
      shift_months(date(2024, 3, 31), -1),
      date(2024, 2, 29)
    );
    assert_eq!(
      shift_months(
        date(2026, 1, 15),
        -13
      ),
      date(2024, 12, 15)
    );
  }

  #[test]
  fn start_of_week_is_monday() {
    // 2026-10-19 is a Monday.
    assert_eq!(
      start_of_week(date(2026, 10, 25)),
      date(2026, 10, 19)
    );
    assert_eq!(
      start_of_week(date(2026, 10, 19)),
      date(2026, 10, 19)
    );
  }

  #[test]
  fn parses_relative_and_named_dates()
  {
    let today = date(2026, 10, 19);
    let parse = |input: &str| {
      parse_date_expr(input, today)
        .expect("parse date expression")
    };

    assert_eq!(parse("завтра"), date(2026, 10, 20));
    assert_eq!(parse("+1w"), date(2026, 10, 26));
    assert_eq!(parse("-1m"), date(2026, 9, 19));
    assert_eq!(parse("friday"), date(2026, 10, 23));
    assert_eq!(parse("monday"), date(2026, 10, 26));
    assert_eq!(parse("March"), date(2027, 3, 1));
    assert_eq!(parse("декабрь"), date(2026, 12, 1));
    assert_eq!(parse("2028"), date(2028, 1, 1));
    assert_eq!(parse("2027-02"), date(2027, 2, 1));
    assert_eq!(parse("2026-12-31"), date(2026, 12, 31));
    assert!(
      parse_date_expr("soonish", today)
        .is_err()
    );
  }

  #[test]
  fn tracker_dates_land_on_local_day()
  {
    // 2026-10-19T20:30:00Z is already
    // the 20th in Yekaterinburg (UTC+5).
    let millis = 1_792_441_800_000_i64;
    assert_eq!(
      date_from_epoch_millis(
        millis,
        DEFAULT_TIMEZONE
      ),
      Some(date(2026, 10, 20))
    );
    assert_eq!(
      date_from_epoch_millis(
        millis,
        chrono_tz::UTC
      ),
      Some(date(2026, 10, 19))
    );
    assert_eq!(
      parse_tracker_date(
        "2026-10-19T23:00:00Z",
        DEFAULT_TIMEZONE
      ),
      Some(date(2026, 10, 20))
    );
    assert_eq!(
      parse_tracker_date(
        "1792441800000",
        chrono_tz::UTC
      ),
      Some(date(2026, 10, 19))
    );
  }

  #[test]
  fn rc_timezone_wins() {
    assert_eq!(
      resolve_timezone(Some(
        "Europe/Moscow"
      )),
      Tz::Europe__Moscow
    );
  }

  #[test]
  fn time_file_accepts_calendar_section()
  {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    let path =
      temp.path().join(TIME_FILE_NAME);
    fs::write(
      &path,
      "[calendar]\ntimezone = \"Europe/Moscow\"\n"
    )
    .expect("write time file");
    assert_eq!(
      read_time_file(&path)
        .expect("read time file")
        .as_deref(),
      Some("Europe/Moscow")
    );
    assert_eq!(
      read_time_file(
        &temp.path().join("missing.toml")
      )
      .expect("missing file"),
      None
    );
  }
}
