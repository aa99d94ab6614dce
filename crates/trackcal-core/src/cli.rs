use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Raw arguments with positional `rc.key=value` / `rc.key:value`
/// overrides pulled out.
#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// `--rc key=value`.
#[derive(Debug, Clone)]
pub struct RcOverride {
    pub key: String,
    pub value: String,
}

impl FromStr for RcOverride {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(anyhow!("expected key=value, got: {s}")),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "trackcal",
    version,
    about = "Month, week and day calendars over tracker issues",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    /// More log output; repeat for debug and trace.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long = "rc", value_parser = RcOverride::from_str, action = ArgAction::Append)]
    pub rc_overrides: Vec<RcOverride>,

    #[arg(long = "trackcalrc", value_name = "PATH")]
    pub trackcalrc: Option<PathBuf>,

    #[arg(long = "data", value_name = "DIR")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

fn default_log_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) => "warn",
        (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => "trace",
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `-v`/`-q`.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_log_level(verbose, quiet))
            .map_err(|e| anyhow!("invalid log filter: {e}"))?,
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .try_init();
    if let Err(err) = installed {
        debug!(error = %err, "subscriber already installed");
    }

    Ok(())
}

fn positional_override(arg: &str) -> Option<(String, String)> {
    let rest = arg.strip_prefix("rc.")?;
    let split = rest.find(['=', ':'])?;
    let (key, value) = (&rest[..split], &rest[split + 1..]);
    (!key.is_empty()).then(|| (format!("rc.{key}"), value.to_string()))
}

#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut pre = PreprocessedArgs {
        cleaned_args: Vec::with_capacity(raw.len()),
        rc_overrides: Vec::new(),
    };

    for (idx, arg) in raw.iter().enumerate() {
        let parsed = (idx > 0)
            .then(|| arg.to_str().and_then(positional_override))
            .flatten();
        match parsed {
            Some(pair) => {
                debug!(key = %pair.0, value = %pair.1, "positional rc override");
                pre.rc_overrides.push(pair);
            }
            None => pre.cleaned_args.push(arg.clone()),
        }
    }

    Ok(pre)
}

/// Facet terms, the command, and the command's own arguments.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub facet_terms: Vec<String>,
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let default_command = cfg
            .get("default.command")
            .unwrap_or_else(|| "month".to_string());

        let known = crate::commands::known_command_names();
        for (i, token) in tokens.iter().enumerate() {
            if let Some(full) = crate::commands::expand_command_abbrev(token, &known) {
                debug!(
                    token = %token,
                    expanded = %full,
                    split_index = i,
                    "resolved command token"
                );
                return Ok(Self {
                    facet_terms: tokens[..i].to_vec(),
                    command: full.to_string(),
                    command_args: tokens[i + 1..].to_vec(),
                });
            }
        }

        debug!(command = %default_command, "no explicit command, using default");
        Ok(Self {
            facet_terms: tokens,
            command: default_command,
            command_args: vec![],
        })
    }
}
