use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Datelike;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_date;
use crate::event::Event;
use crate::recurrence::{ImportReport, weekday_letter};
use crate::store::EventStore;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Writes `events` as a table. The `#` column is each event's
    /// position in `store`, which `move` and `remove` take.
    #[tracing::instrument(skip(self, out, store, events))]
    pub fn write_events<W: Write>(
        &self,
        mut out: W,
        title: &str,
        store: &EventStore,
        events: &[&Event],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(title, "1"))?;
        if events.is_empty() {
            writeln!(out, "No events.")?;
            return Ok(());
        }

        let headers = ["#", "Date", "Day", "Time", "Name"];
        let rows = events
            .iter()
            .map(|event| {
                let index = store
                    .index_of(event)
                    .map(|idx| idx.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let time = format!("{:02}-{:02}", event.start_hour(), event.end_hour());
                let time = if event.is_zero_length() {
                    self.paint(&time, "2")
                } else {
                    time
                };
                vec![
                    self.paint(&index, "33"),
                    format_date(event.date()),
                    weekday_letter(event.date().weekday()).to_string(),
                    time,
                    event.name().to_string(),
                ]
            })
            .collect();

        write_table(&mut out, &headers, rows)?;
        writeln!(out, "{} event(s)", events.len())?;
        Ok(())
    }

    pub fn print_events(
        &self,
        title: &str,
        store: &EventStore,
        events: &[&Event],
    ) -> anyhow::Result<()> {
        self.write_events(io::stdout().lock(), title, store, events)
    }

    pub fn write_import_report<W: Write>(
        &self,
        mut out: W,
        source: &str,
        report: &ImportReport,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "Imported {source}: {} record(s), {} occurrence(s), {} added, {} skipped on conflict.",
            report.records, report.generated, report.added, report.skipped
        )?;
        Ok(())
    }

    pub fn print_import_report(&self, source: &str, report: &ImportReport) -> anyhow::Result<()> {
        self.write_import_report(io::stdout().lock(), source, report)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(mut writer: W, headers: &[&str], rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(*h)).collect();

    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ", width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            write!(writer, "{}{} ", cell, " ".repeat(width.saturating_sub(visible)))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Renderer, strip_ansi};
    use crate::cursor::DateCursor;
    use crate::event::Event;
    use crate::recurrence::ImportReport;
    use crate::store::EventStore;

    #[test]
    fn table_lists_store_positions() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 5).expect("valid");
        let mut store = EventStore::new();
        store.add(Event::new("Gym", d, 18, 19).expect("valid"));
        store.add(Event::new("Café ☕", d, 8, 9).expect("valid"));

        let cursor = DateCursor::new(d);
        let events = store.day_events(&cursor);
        let mut buf = Vec::new();
        Renderer::plain()
            .write_events(&mut buf, "Day 2024/2/5", &store, &events)
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Day 2024/2/5");
        assert!(lines[1].starts_with("# Date"));
        assert!(lines[3].starts_with("0 2024/2/5 M   18-19 Gym"));
        assert!(lines[4].starts_with("1 2024/2/5 M   08-09 Café ☕"));
        assert_eq!(lines[5], "2 event(s)");
    }

    #[test]
    fn empty_view_says_so() {
        let store = EventStore::new();
        let mut buf = Vec::new();
        Renderer::plain()
            .write_events(&mut buf, "Week", &store, &[])
            .expect("render");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "Week\nNo events.\n");
    }

    #[test]
    fn import_report_line() {
        let report = ImportReport {
            records: 1,
            generated: 8,
            added: 7,
            skipped: 1,
        };
        let mut buf = Vec::new();
        Renderer::plain()
            .write_import_report(&mut buf, "gym.txt", &report)
            .expect("render");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "Imported gym.txt: 1 record(s), 8 occurrence(s), 7 added, 1 skipped on conflict.\n"
        );
    }

    #[test]
    fn strips_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[33m12\x1b[0m"), "12");
    }
}
