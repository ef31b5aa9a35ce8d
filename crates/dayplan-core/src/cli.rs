use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::calendar::ViewMonth;
use crate::datekey::DateKey;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dayplan",
    version,
    about = "Month planner: day tasks, color labels, public holidays",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Skip the public-holiday lookup.
    #[arg(long = "offline", global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Search text and color toggles for one invocation.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(short = 's', long = "search", default_value = "")]
    pub search: String,

    /// Toggle a label color in the filter; `none` clears it.
    #[arg(short = 'c', long = "color", action = ArgAction::Append)]
    pub colors: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the month grid.
    Show {
        /// Month to show instead of the saved one (YYYY-MM).
        #[arg(long = "month")]
        month: Option<ViewMonth>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Go one month forward.
    Next,
    /// Go one month back.
    Prev,
    /// Go to the current month.
    Today,
    /// Go to a month (YYYY-MM).
    Goto { month: ViewMonth },
    /// Add a task to a day.
    Add {
        date: DateKey,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(long = "color")]
        color: Option<String>,
    },
    /// Rename a task; an empty title deletes it.
    Rename {
        id: String,
        #[arg(num_args = 0..)]
        title: Vec<String>,
        #[arg(long = "color")]
        color: Option<String>,
    },
    /// Delete a task.
    Delete { id: String },
    /// Remove one label from a task.
    Unlabel { id: String, label: String },
    /// Move a task to another day.
    Move { id: String, date: DateKey },
    /// Put a task in front of another one.
    Reorder {
        id: String,
        #[arg(long = "before")]
        before: String,
    },
    /// Select the label color for new tasks (`none` to clear).
    Pen { color: String },
    /// List the tasks of the visible month.
    List {
        /// List every task, not just the visible month.
        #[arg(long = "all")]
        all: bool,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Export the visible grid as JSON.
    Export {
        /// Output file, `-` for stdout. Defaults to the configured name.
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
        #[arg(long = "pretty")]
        pretty: bool,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Import a previously exported grid (`-` reads stdin).
    Import { path: PathBuf },
    /// List public holidays of a year.
    Holidays { year: Option<i32> },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
