use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

const RC_ENV_VAR: &str = "TRACKCALRC";
const RC_FILE_NAME: &str = ".trackcalrc";
const DATA_DIR_NAME: &str = ".trackcal";
const MAX_INCLUDE_DEPTH: usize = 8;

const DEFAULTS: [(&str, &str); 4] = [
  ("data.location", "~/.trackcal"),
  ("default.command", "month"),
  ("calendar.strict", "off"),
  ("color", "on")
];

/// Settings from the rc file layered
/// over built-in defaults, with
/// command-line overrides on top.
#[derive(Debug, Clone)]
pub struct Config {
  values:           BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

/// One meaningful rc file line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RcLine {
  Set { key: String, value: String },
  Include(PathBuf)
}

impl Default for Config {
  fn default() -> Self {
    Self {
      values:       DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match resolve_rc_path(rc_override) {
      | Some(path) => {
        info!(rc = %path.display(), "loading trackcalrc");
        cfg.load_file(&path, 0)?;
      }
      | None => {
        debug!(
          "no trackcalrc; using \
           defaults"
        );
      }
    }

    Ok(cfg)
  }

  /// Applies `key=value` pairs; an
  /// `rc.` prefix on the key is
  /// ignored.
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key
        .strip_prefix("rc.")
        .map(str::to_string)
        .unwrap_or(key);
      debug!(key = %key, value = %value, "rc override");
      self.values.insert(key, value);
    }
  }

  /// Trimmed value of `key`; blank
  /// counts as unset.
  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    let value = self.values.get(key)?.trim();
    (!value.is_empty())
      .then(|| value.to_string())
  }

  /// `on`/`off` style switch. Values
  /// that are neither read as unset.
  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    let raw = self.get(key)?;
    let parsed = parse_switch(&raw);
    if parsed.is_none() {
      warn!(key, value = %raw, "not a boolean setting");
    }
    parsed
  }

  fn load_file(
    &mut self,
    path: &Path,
    depth: usize
  ) -> anyhow::Result<()> {
    if depth > MAX_INCLUDE_DEPTH {
      bail!(
        "includes nested deeper than \
         {MAX_INCLUDE_DEPTH} at {}",
        path.display()
      );
    }

    let path = expand_tilde(path);
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default();

    for line in parse_rc(&text, &path)? {
      match line {
        | RcLine::Set { key, value } => {
          trace!(key = %key, value = %value, "rc setting");
          self.values.insert(key, value);
        }
        | RcLine::Include(include) => {
          let target = if include
            .is_absolute()
          {
            include
          } else {
            base_dir.join(include)
          };
          if target.exists() {
            self.load_file(
              &target,
              depth + 1
            )?;
          } else {
            warn!(include = %target.display(), "missing include; skipping");
          }
        }
      }
    }

    Ok(())
  }
}

/// Splits rc text into settings and
/// includes. `#` starts a comment.
fn parse_rc(
  text: &str,
  path: &Path
) -> anyhow::Result<Vec<RcLine>> {
  let mut lines = Vec::new();

  for (idx, raw) in
    text.lines().enumerate()
  {
    let line = raw
      .split_once('#')
      .map_or(raw, |(before, _)| before)
      .trim();
    if line.is_empty() {
      continue;
    }

    if let Some(rest) =
      line.strip_prefix("include ")
    {
      let rest = rest.trim();
      if rest.is_empty() {
        bail!(
          "{}:{}: include needs a path",
          path.display(),
          idx + 1
        );
      }
      lines.push(RcLine::Include(
        expand_tilde(Path::new(rest))
      ));
      continue;
    }

    let (key, value) = line
      .split_once('=')
      .ok_or_else(|| {
        anyhow!(
          "{}:{}: expected key = \
           value, got: {raw}",
          path.display(),
          idx + 1
        )
      })?;
    lines.push(RcLine::Set {
      key:   key.trim().to_string(),
      value: value.trim().to_string()
    });
  }

  Ok(lines)
}

/// Data directory: `--data`, then
/// `data.location`, then
/// `~/.trackcal`.
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(path) = override_dir {
    return Ok(path.to_path_buf());
  }

  match cfg.get("data.location") {
    | Some(location) => {
      Ok(expand_tilde(Path::new(
        &location
      )))
    }
    | None => {
      dirs::home_dir()
        .map(|home| {
          home.join(DATA_DIR_NAME)
        })
        .ok_or_else(|| {
          anyhow!(
            "cannot determine home \
             directory"
          )
        })
    }
  }
}

/// rc file: `--trackcalrc`, then
/// `TRACKCALRC` (`/dev/null` turns the
/// file off), then `~/.trackcalrc` if
/// present.
fn resolve_rc_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(env_path) =
    std::env::var(RC_ENV_VAR)
  {
    return (env_path != "/dev/null")
      .then(|| PathBuf::from(env_path));
  }

  let home = dirs::home_dir()?;
  let candidate = home.join(RC_FILE_NAME);
  candidate.exists().then_some(candidate)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  if let Ok(rest) = path.strip_prefix("~")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_switch(
  raw: &str
) -> Option<bool> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
