use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::calendar::ViewMonth;
use crate::cli::{Command, FilterArgs};
use crate::config::Config;
use crate::datastore::write_atomic;
use crate::filter::is_clear_sentinel;
use crate::holiday::HolidayClient;
use crate::planner::Planner;
use crate::render::Renderer;
use crate::task::{Task, short_id};
use crate::transfer;

/// Everything a command needs besides the planner itself.
pub struct Session<'a> {
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub offline: bool,
}

#[instrument(skip(planner, ctx, command))]
pub fn dispatch(planner: &mut Planner, ctx: &Session<'_>, command: Option<Command>) -> anyhow::Result<()> {
    let command = command.unwrap_or(Command::Show {
        month: None,
        filter: FilterArgs::default(),
    });
    debug!(?command, view = %planner.view(), "dispatching command");

    match command {
        Command::Show { month, filter } => cmd_show(planner, ctx, month, &filter),
        Command::Next => {
            planner.next_month();
            show_current(planner, ctx)
        }
        Command::Prev => {
            planner.prev_month();
            show_current(planner, ctx)
        }
        Command::Today => {
            planner.goto(ViewMonth::today());
            show_current(planner, ctx)
        }
        Command::Goto { month } => {
            planner.goto(month);
            show_current(planner, ctx)
        }
        Command::Add { date, title, color } => {
            let title = title.join(" ");
            let label = label_for(planner, color.as_deref());
            match planner.create_labelled(date, &title, label) {
                Some(id) => {
                    info!(id = %id, date = %date, "task added");
                    println!("Created task {}.", short_id(&id));
                }
                None => println!("Nothing added: the title is blank."),
            }
            Ok(())
        }
        Command::Rename { id, title, color } => {
            let id = resolve(planner, &id)?;
            let label = label_for(planner, color.as_deref());
            planner.rename_labelled(&id, &title.join(" "), label);
            if planner.store().contains(&id) {
                println!("Renamed task {}.", short_id(&id));
            } else {
                println!("Deleted task {} (blank title).", short_id(&id));
            }
            Ok(())
        }
        Command::Delete { id } => {
            let id = resolve(planner, &id)?;
            planner.delete_task(&id);
            println!("Deleted task {}.", short_id(&id));
            Ok(())
        }
        Command::Unlabel { id, label } => {
            let id = resolve(planner, &id)?;
            let had = planner.store().get(&id).is_some_and(|task| task.has_label(&label));
            planner.remove_label(&id, &label);
            if had {
                println!("Removed label {label} from task {}.", short_id(&id));
            } else {
                println!("Task {} has no label {label}.", short_id(&id));
            }
            Ok(())
        }
        Command::Move { id, date } => {
            let id = resolve(planner, &id)?;
            if planner.move_task(&id, date) {
                println!("Moved task {} to {date}.", short_id(&id));
            }
            Ok(())
        }
        Command::Reorder { id, before } => {
            let id = resolve(planner, &id)?;
            let before = resolve(planner, &before)?;
            if planner.reorder_task(&id, &before) {
                println!("Moved task {} before {}.", short_id(&id), short_id(&before));
            } else {
                println!("Task order unchanged.");
            }
            Ok(())
        }
        Command::Pen { color } => {
            planner.select_pen(Some(&color));
            match planner.pen() {
                Some(pen) => println!("Pen color: {pen}."),
                None => println!("Pen color cleared."),
            }
            Ok(())
        }
        Command::List { all, filter } => cmd_list(planner, ctx, all, &filter),
        Command::Export { out, pretty, filter } => cmd_export(planner, ctx, out, pretty, &filter),
        Command::Import { path } => cmd_import(planner, &path),
        Command::Holidays { year } => cmd_holidays(planner, ctx, year),
    }
}

fn cmd_show(
    planner: &mut Planner,
    ctx: &Session<'_>,
    month: Option<ViewMonth>,
    filter: &FilterArgs,
) -> anyhow::Result<()> {
    apply_filter(planner, filter);

    let Some(month) = month else {
        return show_current(planner, ctx);
    };

    // peek only: the saved month stays as it was
    let saved = planner.view();
    planner.goto(month);
    let shown = show_current(planner, ctx);
    planner.goto(saved);
    shown
}

fn show_current(planner: &mut Planner, ctx: &Session<'_>) -> anyhow::Result<()> {
    let year = planner.view().year();
    load_holidays(planner, ctx, year);
    let cells = planner.grid();
    ctx.renderer.print_month(planner.view(), planner.week_start(), &cells)
}

fn cmd_list(planner: &mut Planner, ctx: &Session<'_>, all: bool, filter: &FilterArgs) -> anyhow::Result<()> {
    apply_filter(planner, filter);

    let view = planner.view();
    let tasks: Vec<Task> = planner
        .filter()
        .apply(planner.store().tasks().iter().filter(|task| all || view.contains(&task.date)));

    if tasks.is_empty() {
        if planner.filter().is_active() {
            println!("No matches.");
        } else {
            println!("No tasks.");
        }
        return Ok(());
    }
    ctx.renderer.print_task_table(&tasks)
}

#[instrument(skip(planner, ctx, filter))]
fn cmd_export(
    planner: &mut Planner,
    ctx: &Session<'_>,
    out: Option<PathBuf>,
    pretty: bool,
    filter: &FilterArgs,
) -> anyhow::Result<()> {
    apply_filter(planner, filter);
    let year = planner.view().year();
    load_holidays(planner, ctx, year);

    let cells = planner.grid();
    let json = if pretty {
        transfer::export_grid_pretty(&cells)?
    } else {
        transfer::export_grid(&cells)?
    };

    let target = out.unwrap_or_else(|| PathBuf::from(&ctx.cfg.export_file));
    if target.as_os_str() == "-" {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{json}")?;
        return Ok(());
    }

    write_atomic(&target, json.as_bytes())
        .with_context(|| format!("failed writing export to {}", target.display()))?;
    info!(file = %target.display(), cells = cells.len(), month = %planner.view(), "exported grid");
    println!("Exported {} to {}.", planner.view(), target.display());
    Ok(())
}

#[instrument(skip(planner))]
fn cmd_import(planner: &mut Planner, path: &Path) -> anyhow::Result<()> {
    let raw = if path.as_os_str() == "-" {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("failed reading import from stdin")?;
        raw
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?
    };

    let report = planner
        .import_json(&raw)
        .map_err(|err| anyhow!("import failed: {err}"))?;

    println!(
        "Imported {} task(s) into {} ({} already present).",
        report.added, report.month, report.skipped
    );
    Ok(())
}

fn cmd_holidays(planner: &mut Planner, ctx: &Session<'_>, year: Option<i32>) -> anyhow::Result<()> {
    if ctx.offline || !ctx.cfg.holidays.enabled {
        return Err(anyhow!("holiday lookup is disabled (offline or [holidays] enabled = false)"));
    }

    let year = year.unwrap_or_else(|| planner.view().year());
    if !load_holidays(planner, ctx, year) {
        return Err(anyhow!("could not load holidays for {year}"));
    }
    if planner.holidays().holidays().is_empty() {
        println!("No holidays listed for {year}.");
        return Ok(());
    }
    ctx.renderer.print_holidays(planner.holidays().holidays())
}

/// Fetches holidays for `year` on a short-lived runtime. Failures are
/// logged and leave the grid without holidays.
fn load_holidays(planner: &mut Planner, ctx: &Session<'_>, year: i32) -> bool {
    if ctx.offline || !ctx.cfg.holidays.enabled {
        debug!(offline = ctx.offline, "holiday lookup skipped");
        return false;
    }

    let client = match HolidayClient::new(&ctx.cfg.holidays.base_url, &ctx.cfg.holidays.country) {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "holiday client unavailable");
            return false;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            warn!(error = %err, "failed to start async runtime for holiday lookup");
            return false;
        }
    };

    if year == planner.view().year() {
        runtime.block_on(planner.refresh_holidays(&client))
    } else {
        runtime.block_on(planner.holidays_mut().refresh(&client, year))
    }
}

fn apply_filter(planner: &mut Planner, filter: &FilterArgs) {
    planner.set_search(filter.search.as_str());
    for color in &filter.colors {
        planner.toggle_color_filter(color);
    }
    debug!(
        search = planner.filter().search(),
        colors = ?planner.filter().colors().iter().collect::<Vec<_>>(),
        "filter applied"
    );
}

/// `--color` wins over the pen; a clear sentinel means no label at all.
fn label_for(planner: &Planner, color: Option<&str>) -> Option<String> {
    match color {
        Some(color) if is_clear_sentinel(color) || color.trim().is_empty() => None,
        Some(color) => Some(color.to_string()),
        None => planner.pen().map(str::to_string),
    }
}

fn resolve(planner: &Planner, needle: &str) -> anyhow::Result<String> {
    planner
        .store()
        .resolve_id(needle)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no single task matches id '{needle}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekStart;
    use crate::planner::PlannerState;

    fn planner() -> Planner {
        let state = PlannerState {
            tasks: vec![],
            view: ViewMonth::new(2026, 10).expect("month"),
            pen: Some("red".to_string()),
        };
        Planner::new(state, WeekStart::Sunday)
    }

    fn run(planner: &mut Planner, args: &[&str]) -> anyhow::Result<()> {
        use clap::Parser;
        let mut argv = vec!["dayplan"];
        argv.extend_from_slice(args);
        let cli = crate::cli::GlobalCli::try_parse_from(argv)?;

        let cfg = Config::default();
        let renderer = Renderer::plain();
        let session = Session {
            cfg: &cfg,
            renderer: &renderer,
            offline: true,
        };
        dispatch(planner, &session, cli.command)
    }

    #[test]
    fn color_flag_overrides_pen() {
        let mut planner = planner();
        run(&mut planner, &["add", "2026-10-16", "Meeting", "--color", "blue"]).expect("add");
        run(&mut planner, &["add", "2026-10-16", "Lunch"]).expect("add");
        run(&mut planner, &["add", "2026-10-16", "Walk", "--color", "none"]).expect("add");

        let labels: Vec<Vec<String>> = planner.store().tasks().iter().map(|t| t.labels.clone()).collect();
        assert_eq!(labels, vec![vec!["blue".to_string()], vec!["red".to_string()], vec![]]);
    }

    #[test]
    fn ids_resolve_by_prefix() {
        let mut planner = planner();
        let id = planner.create_task("2026-10-16".parse().expect("key"), "x").expect("id");
        run(&mut planner, &["delete", &id[..6]]).expect("delete");
        assert!(planner.store().is_empty());
        assert!(run(&mut planner, &["delete", "zzzz"]).is_err());
    }

    #[test]
    fn show_month_does_not_move_the_view() {
        let mut planner = planner();
        run(&mut planner, &["show", "--month", "2027-01"]).expect("show");
        assert_eq!(planner.view(), ViewMonth::new(2026, 10).expect("month"));
        run(&mut planner, &["next"]).expect("next");
        assert_eq!(planner.view(), ViewMonth::new(2026, 11).expect("month"));
    }

    #[test]
    fn broken_import_reports_and_keeps_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[]").expect("write");

        let mut planner = planner();
        planner.create_task("2026-10-16".parse().expect("key"), "x");
        let before = planner.snapshot();

        let err = run(&mut planner, &["import", path.to_str().expect("utf8 path")]).expect_err("must fail");
        assert!(err.to_string().starts_with("import failed:"));
        assert_eq!(planner.snapshot(), before);
    }

    #[test]
    fn export_writes_the_visible_grid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.json");

        let mut planner = planner();
        planner.create_task("2026-10-16".parse().expect("key"), "Meeting");
        run(&mut planner, &["export", "--out", path.to_str().expect("utf8 path")]).expect("export");

        let raw = std::fs::read_to_string(&path).expect("read");
        let bundle = transfer::parse_import(&raw).expect("parse");
        assert_eq!(bundle.month, ViewMonth::new(2026, 10).expect("month"));
        assert_eq!(bundle.tasks.len(), 1);
    }

    #[test]
    fn holidays_command_refuses_offline() {
        let mut planner = planner();
        assert!(run(&mut planner, &["holidays", "2026"]).is_err());
    }
}
