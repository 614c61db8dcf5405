use std::io::{
  BufRead,
  Write
};
use std::path::Path;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  NaiveDate
};
use tracing::{
  debug,
  info,
  instrument
};

use crate::cli::Invocation;
use crate::config::Config;
use crate::cursor::week_of_month;
use crate::datetime::{
  format_date,
  parse_date_expr
};
use crate::event::Event;
use crate::render::Renderer;
use crate::session::Session;

/// Whether a shell should keep reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
  Continue,
  Quit
}

pub fn known_command_names()
-> Vec<&'static str> {
  vec![
    "add", "day", "week", "month",
    "range", "next", "prev", "goto",
    "setday", "today", "import",
    "export", "move", "remove", "show",
    "shell", "help", "version", "quit",
  ]
}

pub fn expand_command_abbrev<'a>(
  token: &str,
  known: &[&'a str]
) -> Option<&'a str> {
  if let Some(exact) = known
    .iter()
    .copied()
    .find(|name| *name == token)
  {
    return Some(exact);
  }

  let mut matches = known
    .iter()
    .copied()
    .filter(|name| name.starts_with(token));
  let first = matches.next()?;
  if matches.next().is_some() {
    None
  } else {
    Some(first)
  }
}

/// Runs one command against the session. `today` anchors date
/// expressions such as `tomorrow` or `+3d`.
#[instrument(skip(
  session, cfg, renderer, inv, out
))]
pub fn dispatch<W: Write>(
  session: &mut Session,
  cfg: &Config,
  renderer: &Renderer,
  inv: Invocation,
  today: NaiveDate,
  out: &mut W
) -> anyhow::Result<Flow> {
  let args = inv.args.as_slice();
  debug!(command = %inv.command, ?args, "dispatching command");

  match inv.command.as_str() {
    | "add" => cmd_add(session, args, today, out)?,
    | "day" => {
      let title = format!(
        "Day {}",
        format_date(session.current_date())
      );
      let events = session.day_events();
      renderer.write_events(
        &mut *out,
        &title,
        session.store(),
        &events
      )?;
    }
    | "week" => {
      let date = session.current_date();
      let title = format!(
        "Week {} of {}/{}",
        week_of_month(date),
        date.year(),
        date.month()
      );
      let events = session.week_events();
      renderer.write_events(
        &mut *out,
        &title,
        session.store(),
        &events
      )?;
    }
    | "month" => {
      let date = session.current_date();
      let title = format!(
        "Month {}/{}",
        date.year(),
        date.month()
      );
      let events = session.month_events();
      renderer.write_events(
        &mut *out,
        &title,
        session.store(),
        &events
      )?;
    }
    | "range" => {
      cmd_range(session, renderer, args, today, out)?
    }
    | "next" => cmd_step(session, args, 1, out)?,
    | "prev" => cmd_step(session, args, -1, out)?,
    | "goto" => {
      let raw = single_arg(args, "goto <date>")?;
      session.go_to(parse_date_expr(raw, today)?);
      print_cursor(session, out)?;
    }
    | "setday" => {
      let raw = single_arg(args, "setday <n>")?;
      let day: i64 = raw.parse().with_context(|| {
        format!("setday expects an integer, got {raw:?}")
      })?;
      session.set_day(day)?;
      print_cursor(session, out)?;
    }
    | "today" => {
      session.reset_to_today();
      print_cursor(session, out)?;
    }
    | "import" => cmd_import(session, renderer, args, out)?,
    | "export" => {
      let events: Vec<&Event> =
        session.store().iter().collect();
      let json = serde_json::to_string_pretty(&events)?;
      writeln!(out, "{json}")?;
    }
    | "move" => cmd_move(session, args, today, out)?,
    | "remove" => {
      let raw = single_arg(args, "remove <#>")?;
      let index = parse_index(raw)?;
      let removed = session.remove_event(index)?;
      writeln!(out, "Removed {removed}.")?;
    }
    | "show" => cmd_show(session, cfg, out)?,
    | "shell" => {
      return Err(anyhow!(
        "already reading commands"
      ));
    }
    | "help" => cmd_help(out)?,
    | "version" => {
      writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
    }
    | "quit" => return Ok(Flow::Quit),
    | other => {
      return Err(anyhow!(
        "unknown command: {other}"
      ));
    }
  }

  Ok(Flow::Continue)
}

/// Reads commands line by line until EOF or `quit`. A failing command
/// is reported and the loop carries on.
#[instrument(skip_all)]
pub fn run_shell<R: BufRead, W: Write>(
  session: &mut Session,
  cfg: &Config,
  renderer: &Renderer,
  input: R,
  today: NaiveDate,
  out: &mut W
) -> anyhow::Result<()> {
  for (idx, line) in
    input.lines().enumerate()
  {
    let line = line.context(
      "failed reading command input"
    )?;
    let trimmed = line.trim();
    if trimmed.is_empty()
      || trimmed.starts_with('#')
    {
      continue;
    }

    let tokens: Vec<String> = trimmed
      .split_whitespace()
      .map(ToString::to_string)
      .collect();
    let outcome =
      match Invocation::parse(cfg, tokens) {
        | Ok(inv) => dispatch(
          session, cfg, renderer, inv,
          today, out
        ),
        | Err(err) => Err(err)
      };

    match outcome {
      | Ok(Flow::Quit) => {
        debug!(line = idx + 1, "shell quit");
        break;
      }
      | Ok(Flow::Continue) => {}
      | Err(err) => {
        debug!(line = idx + 1, error = %err, "shell command failed");
        writeln!(out, "error: {err:#}")?;
      }
    }
  }
  Ok(())
}

fn single_arg<'a>(
  args: &'a [String],
  usage: &str
) -> anyhow::Result<&'a str> {
  match args {
    | [only] => Ok(only.as_str()),
    | _ => {
      Err(anyhow!("usage: {usage}"))
    }
  }
}

fn parse_hour(
  raw: &str,
  which: &str
) -> anyhow::Result<u8> {
  raw.parse::<u8>().with_context(|| {
    format!(
      "{which} hour must be 0-23, got \
       {raw:?}"
    )
  })
}

fn parse_index(
  raw: &str
) -> anyhow::Result<usize> {
  raw.parse::<usize>().with_context(
    || {
      format!(
        "event position must be a \
         non-negative integer, got \
         {raw:?}"
      )
    }
  )
}

fn print_cursor<W: Write>(
  session: &Session,
  out: &mut W
) -> anyhow::Result<()> {
  let date = session.current_date();
  writeln!(
    out,
    "Cursor: {} ({})",
    format_date(date),
    date.weekday()
  )?;
  Ok(())
}

#[instrument(skip(session, args, out))]
fn cmd_add<W: Write>(
  session: &mut Session,
  args: &[String],
  today: NaiveDate,
  out: &mut W
) -> anyhow::Result<()> {
  info!("command add");
  let [name @ .., date, start, end] =
    args
  else {
    return Err(anyhow!(
      "usage: add <name...> <date> \
       <start> <end>"
    ));
  };
  if name.is_empty() {
    return Err(anyhow!(
      "usage: add <name...> <date> \
       <start> <end>"
    ));
  }

  let name = name.join(" ");
  let date = parse_date_expr(date, today)?;
  let start = parse_hour(start, "start")?;
  let end = parse_hour(end, "end")?;

  let event =
    Event::new(name, date, start, end)?;
  let shown = event.to_string();
  if session.add(event) {
    writeln!(out, "Added {shown}.")?;
  } else {
    writeln!(
      out,
      "Conflict: {shown} overlaps an \
       existing event; not added."
    )?;
  }
  Ok(())
}

#[instrument(skip(
  session, renderer, args, out
))]
fn cmd_range<W: Write>(
  session: &Session,
  renderer: &Renderer,
  args: &[String],
  today: NaiveDate,
  out: &mut W
) -> anyhow::Result<()> {
  let [start, end] = args else {
    return Err(anyhow!(
      "usage: range <start> <end>"
    ));
  };
  let start = parse_date_expr(start, today)?;
  let end = parse_date_expr(end, today)?;
  let title = format!(
    "Range {} .. {}",
    format_date(start),
    format_date(end)
  );
  let events =
    session.interval_events(start, end);
  renderer.write_events(
    out,
    &title,
    session.store(),
    &events
  )
}

/// `next|prev [day|month] [n]`, month and 1 by default.
#[instrument(skip(session, args, out))]
fn cmd_step<W: Write>(
  session: &mut Session,
  args: &[String],
  sign: i64,
  out: &mut W
) -> anyhow::Result<()> {
  let mut unit = "month";
  let mut count: i64 = 1;
  for arg in args {
    match arg.to_ascii_lowercase().as_str() {
      | "d" | "day" | "days" => unit = "day",
      | "m" | "month" | "months" => {
        unit = "month"
      }
      | raw => {
        count = raw.parse().with_context(
          || {
            format!(
              "expected day, month or a \
               count, got {arg:?}"
            )
          }
        )?;
      }
    }
  }

  let delta = count
    .checked_mul(sign)
    .ok_or_else(|| anyhow!("step too large"))?;
  if unit == "day" {
    session.advance_day(delta)?;
  } else {
    let months = i32::try_from(delta)
      .context("month step too large")?;
    session.advance_month(months)?;
  }
  print_cursor(session, out)
}

#[instrument(skip(
  session, renderer, args, out
))]
fn cmd_import<W: Write>(
  session: &mut Session,
  renderer: &Renderer,
  args: &[String],
  out: &mut W
) -> anyhow::Result<()> {
  info!("command import");
  if args.is_empty() {
    return Err(anyhow!(
      "usage: import <path...>"
    ));
  }

  for raw in args {
    let report = session
      .import_file(Path::new(raw))
      .with_context(|| {
        format!("import of {raw} failed")
      })?;
    renderer.write_import_report(
      &mut *out, raw, &report
    )?;
  }
  Ok(())
}

#[instrument(skip(session, args, out))]
fn cmd_move<W: Write>(
  session: &mut Session,
  args: &[String],
  today: NaiveDate,
  out: &mut W
) -> anyhow::Result<()> {
  let [index, date, start, end] = args
  else {
    return Err(anyhow!(
      "usage: move <#> <date> <start> \
       <end>"
    ));
  };
  let index = parse_index(index)?;
  let date = parse_date_expr(date, today)?;
  let start = parse_hour(start, "start")?;
  let end = parse_hour(end, "end")?;

  if session
    .reschedule(index, date, start, end)?
  {
    let moved = session
      .store()
      .get(index)
      .map(ToString::to_string)
      .unwrap_or_default();
    writeln!(out, "Moved {moved}.")?;
  } else {
    writeln!(
      out,
      "Conflict: event {index} cannot \
       move to {} {start}-{end}; left \
       in place.",
      format_date(date)
    )?;
  }
  Ok(())
}

fn cmd_show<W: Write>(
  session: &Session,
  cfg: &Config,
  out: &mut W
) -> anyhow::Result<()> {
  let date = session.current_date();
  writeln!(
    out,
    "cursor           {} ({}, week {})",
    format_date(date),
    date.weekday(),
    week_of_month(date)
  )?;
  writeln!(
    out,
    "events           {}",
    session.store().len()
  )?;
  writeln!(
    out,
    "import guard     {} days",
    session.max_scan_days()
  )?;
  for path in &cfg.loaded_files {
    writeln!(
      out,
      "config file      {}",
      path.display()
    )?;
  }
  for (key, value) in cfg.iter() {
    writeln!(out, "{key:<16} {value}")?;
  }
  Ok(())
}

fn cmd_help<W: Write>(
  out: &mut W
) -> anyhow::Result<()> {
  writeln!(
    out,
    "Commands:\n\
     \x20 add <name...> <date> <start> <end>\n\
     \x20 day | week | month\n\
     \x20 range <start> <end>\n\
     \x20 next | prev [day|month] [n]\n\
     \x20 goto <date> | setday <n> | today\n\
     \x20 import <path...> | export\n\
     \x20 move <#> <date> <start> <end> | remove <#>\n\
     \x20 show | shell | help | version | quit"
  )?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use chrono::NaiveDate;

  use super::{
    Flow,
    dispatch,
    expand_command_abbrev,
    known_command_names,
    run_shell
  };
  use crate::cli::Invocation;
  use crate::config::Config;
  use crate::render::Renderer;
  use crate::session::Session;

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn run(
    session: &mut Session,
    line: &str
  ) -> String {
    let cfg = Config::default();
    let mut out = Vec::new();
    let tokens = line
      .split_whitespace()
      .map(ToString::to_string)
      .collect();
    let inv = Invocation::parse(&cfg, tokens)
      .expect("parse");
    dispatch(
      session,
      &cfg,
      &Renderer::plain(),
      inv,
      day(2024, 2, 1),
      &mut out
    )
    .expect("dispatch");
    String::from_utf8(out).expect("utf8")
  }

  #[test]
  fn abbreviations_must_be_unique() {
    let known = known_command_names();
    assert_eq!(
      expand_command_abbrev("w", &known),
      Some("week")
    );
    assert_eq!(
      expand_command_abbrev("mon", &known),
      Some("month")
    );
    assert_eq!(
      expand_command_abbrev("mo", &known),
      None
    );
    assert_eq!(
      expand_command_abbrev("s", &known),
      None
    );
  }

  #[test]
  fn add_then_view() {
    let mut session =
      Session::new(day(2024, 2, 5));
    let added = run(
      &mut session,
      "add Team sync 2024-02-05 9 10"
    );
    assert_eq!(
      added,
      "Added Event: Team sync  2024/2/5 Time: (9-10).\n"
    );
    let clash = run(
      &mut session,
      "add Other 2024-02-05 9 11"
    );
    assert!(clash.starts_with("Conflict:"));

    let view = run(&mut session, "day");
    assert!(view.contains("Team sync"));
    assert!(view.ends_with("1 event(s)\n"));
  }

  #[test]
  fn navigation_moves_cursor() {
    let mut session =
      Session::new(day(2024, 1, 31));
    assert_eq!(
      run(&mut session, "next"),
      "Cursor: 2024/2/29 (Thu)\n"
    );
    assert_eq!(
      run(&mut session, "prev day 29"),
      "Cursor: 2024/1/31 (Wed)\n"
    );
    assert_eq!(
      run(&mut session, "setday 32"),
      "Cursor: 2024/2/1 (Thu)\n"
    );
    assert_eq!(
      run(&mut session, "goto tomorrow"),
      "Cursor: 2024/2/2 (Fri)\n"
    );
  }

  #[test]
  fn move_and_remove_by_position() {
    let mut session =
      Session::new(day(2024, 2, 5));
    run(&mut session, "add A 2024-02-05 9 10");
    run(&mut session, "add B 2024-02-05 11 12");

    let blocked =
      run(&mut session, "move 0 2024-02-05 11 12");
    assert!(blocked.starts_with("Conflict:"));
    let moved =
      run(&mut session, "move 0 2024-02-06 11 12");
    assert_eq!(
      moved,
      "Moved Event: A  2024/2/6 Time: (11-12).\n"
    );
    let removed = run(&mut session, "remove 1");
    assert_eq!(
      removed,
      "Removed Event: B  2024/2/5 Time: (11-12).\n"
    );
  }

  #[test]
  fn export_is_json() {
    let mut session =
      Session::new(day(2024, 2, 5));
    run(&mut session, "add A 2024-02-05 9 10");
    let json = run(&mut session, "export");
    let parsed: serde_json::Value =
      serde_json::from_str(&json)
        .expect("json");
    assert_eq!(parsed[0]["name"], "A");
    assert_eq!(parsed[0]["date"], "2024-02-05");
    assert_eq!(parsed[0]["start_hour"], 9);
  }

  #[test]
  fn shell_survives_errors_and_stops_on_quit()
  {
    let mut session =
      Session::new(day(2024, 2, 5));
    let script = "# comment\n\
                  add A 2024-02-05 9 10\n\
                  add B nonsense 9 10\n\
                  bogus\n\
                  quit\n\
                  add C 2024-02-05 11 12\n";
    let mut out = Vec::new();
    run_shell(
      &mut session,
      &Config::default(),
      &Renderer::plain(),
      Cursor::new(script),
      day(2024, 2, 1),
      &mut out
    )
    .expect("shell");
    let text =
      String::from_utf8(out).expect("utf8");
    assert_eq!(
      text.matches("error:").count(),
      2
    );
    assert_eq!(session.store().len(), 1);
  }

  #[test]
  fn quit_flow_is_reported() {
    let cfg = Config::default();
    let inv = Invocation::parse(
      &cfg,
      vec!["quit".to_string()]
    )
    .expect("parse");
    let mut out = Vec::new();
    let flow = dispatch(
      &mut Session::new(day(2024, 2, 5)),
      &cfg,
      &Renderer::plain(),
      inv,
      day(2024, 2, 5),
      &mut out
    )
    .expect("dispatch");
    assert_eq!(flow, Flow::Quit);
  }
}
