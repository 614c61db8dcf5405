use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  Months,
  NaiveDate,
  Weekday
};
use regex::Regex;
use tracing::trace;

/// Parses a calendar day typed at the command line, relative to
/// `today`.
///
/// Accepted: `YYYY-MM-DD`, `YYYY/M/D`, `today`, `tomorrow`,
/// `yesterday`, weekday names (next one after today), month names
/// (1st of the next such month) and offsets like `+3d`, `-2w`, `+1m`.
#[tracing::instrument]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  if token.is_empty() {
    return Err(anyhow!(
      "empty date expression"
    ));
  }

  let lower = token.to_ascii_lowercase();
  match lower.as_str() {
    | "today" | "now" => return Ok(today),
    | "tomorrow" => {
      return today.succ_opt().ok_or_else(
        || anyhow!("tomorrow is out of range")
      );
    }
    | "yesterday" => {
      return today.pred_opt().ok_or_else(
        || anyhow!("yesterday is out of range")
      );
    }
    | _ => {}
  }

  let abs_re = Regex::new(r"^(?P<y>-?\d{1,6})[-/](?P<m>\d{1,2})[-/](?P<d>\d{1,2})$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
  if let Some(caps) =
    abs_re.captures(token)
  {
    let year: i32 = caps["y"]
      .parse()
      .context("invalid year")?;
    let month: u32 = caps["m"]
      .parse()
      .context("invalid month")?;
    let day: u32 = caps["d"]
      .parse()
      .context("invalid day")?;
    return NaiveDate::from_ymd_opt(
      year, month, day
    )
    .ok_or_else(|| {
      anyhow!(
        "no such date: {token}"
      )
    });
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return next_weekday_date(
      today, target
    );
  }

  if let Some(month) =
    parse_month_name(&lower)
  {
    let mut year = today.year();
    if month <= today.month() {
      year = year.saturating_add(1);
    }
    return NaiveDate::from_ymd_opt(
      year, month, 1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month/year \
         candidate"
      )
    });
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let negative = &caps["sign"] == "-";
    let num: i64 = caps["num"]
      .parse()
      .context(
        "invalid relative number"
      )?;
    let shifted = match &caps["unit"] {
      | "d" => shift(today, num, 1, negative),
      | "w" => shift(today, num, 7, negative),
      | "m" => {
        let months = Months::new(
          u32::try_from(num).context(
            "relative month count too \
             large"
          )?
        );
        if negative {
          today.checked_sub_months(months)
        } else {
          today.checked_add_months(months)
        }
      }
      | unit => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };
    trace!(token, ?shifted, "relative date");
    return shifted.ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {token}"
      )
    });
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {token}"
  ))
}

fn shift(
  today: NaiveDate,
  num: i64,
  unit_days: i64,
  negative: bool
) -> Option<NaiveDate> {
  let days = num.checked_mul(unit_days)?;
  let span = Duration::try_days(
    if negative { -days } else { days }
  )?;
  today.checked_add_signed(span)
}

fn parse_weekday_name(
  s: &str
) -> Option<Weekday> {
  match s {
    | "sun" | "sunday" => Some(Weekday::Sun),
    | "mon" | "monday" => Some(Weekday::Mon),
    | "tue" | "tues" | "tuesday" => {
      Some(Weekday::Tue)
    }
    | "wed" | "wednesday" => {
      Some(Weekday::Wed)
    }
    | "thu" | "thur" | "thurs"
    | "thursday" => Some(Weekday::Thu),
    | "fri" | "friday" => Some(Weekday::Fri),
    | "sat" | "saturday" => {
      Some(Weekday::Sat)
    }
    | _ => None
  }
}

fn next_weekday_date(
  today: NaiveDate,
  target: Weekday
) -> anyhow::Result<NaiveDate> {
  let current =
    today.weekday().num_days_from_sunday();
  let wanted =
    target.num_days_from_sunday();
  let mut ahead =
    (7 + wanted - current) % 7;
  if ahead == 0 {
    ahead = 7;
  }
  today
    .checked_add_signed(Duration::days(
      i64::from(ahead)
    ))
    .ok_or_else(|| {
      anyhow!(
        "failed to advance to next \
         {target}"
      )
    })
}

fn parse_month_name(
  s: &str
) -> Option<u32> {
  match s {
    | "jan" | "january" => Some(1),
    | "feb" | "february" => Some(2),
    | "mar" | "march" => Some(3),
    | "apr" | "april" => Some(4),
    | "may" => Some(5),
    | "jun" | "june" => Some(6),
    | "jul" | "july" => Some(7),
    | "aug" | "august" => Some(8),
    | "sep" | "sept" | "september" => {
      Some(9)
    }
    | "oct" | "october" => Some(10),
    | "nov" | "november" => Some(11),
    | "dec" | "december" => Some(12),
    | _ => None
  }
}

/// `Y/M/D` with a one-based month, as events print their date.
#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  format!(
    "{}/{}/{}",
    date.year(),
    date.month(),
    date.day()
  )
}
