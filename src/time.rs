//! Time literal and predefined time-constant support.
//!
//! Both the lexer's `0t` time literals and the [`crate::constants`] resolver's
//! `NOW`/`LCSTAMP`/`GMSTAMP`/… family need one shared "reference now" and one
//! shared DST-compensation rule, so they live here rather than being
//! duplicated.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};

/// Resolves the open-time reference instant: `CLP_NOW` (seconds since the
/// epoch) if set and parseable, else the real wall clock.
pub fn reference_now() -> i64 {
    if let Ok(v) = std::env::var("CLP_NOW") {
        if let Ok(n) = v.trim().parse::<i64>() {
            return n;
        }
    }
    Utc::now().timestamp()
}

/// One unit of calendar duration, as used by a relative time literal
/// (`0t+YYYY/MM/DD.HH:MM:SS`). Approximated with fixed-length units (a
/// "year" is 365 days, a "month" is 30 days) since the relative form names
/// quantities to add, not calendar fields to set.
fn approx_seconds(years: i64, months: i64, days: i64, hours: i64, mins: i64, secs: i64) -> i64 {
    years * 365 * 86_400 + months * 30 * 86_400 + days * 86_400 + hours * 3_600 + mins * 60 + secs
}

/// The parsed fields of a `0t` time literal, before relative/absolute
/// interpretation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeFields {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

/// Evaluates a `0t[+|-]YYYY[/MM[/DD[.HH[:MM[:SS]]]]]` literal (sign and
/// fields already parsed into `fields`/`sign`) against `now`, applying DST
/// compensation: one hour is subtracted when the resulting local time falls
/// in daylight saving time.
pub fn eval_time_literal(sign: Option<i8>, fields: TimeFields, now: i64) -> i64 {
    match sign {
        Some(s) => {
            let delta = approx_seconds(
                fields.year,
                fields.month as i64,
                fields.day as i64,
                fields.hour as i64,
                fields.minute as i64,
                fields.second as i64,
            );
            now + (s as i64) * delta
        }
        None => {
            let month = fields.month.max(1);
            let day = fields.day.max(1);
            let naive = chrono::NaiveDate::from_ymd_opt(fields.year as i32, month, day)
                .and_then(|d| d.and_hms_opt(fields.hour, fields.minute, fields.second));
            let Some(naive) = naive else { return now };
            match Local.from_local_datetime(&naive).earliest() {
                Some(local_dt) => {
                    let mut ts = local_dt.timestamp();
                    if is_dst(&local_dt) {
                        ts -= 3_600;
                    }
                    ts
                }
                None => now,
            }
        }
    }
}

fn is_dst(dt: &DateTime<Local>) -> bool {
    // `chrono`'s `Local` offset already folds in DST; detect it by comparing
    // against the corresponding UTC offset in January (never DST in either
    // hemisphere's typical rule sets; an approximation, same spirit as the
    // original `tm_isdst` heuristic).
    let jan = Local.with_ymd_and_hms(dt.year(), 1, 1, 0, 0, 0).earliest();
    match jan {
        Some(jan) => jan.offset().utc_minus_local() != dt.offset().utc_minus_local(),
        None => false,
    }
}

/// Canonical `YYYYMMDD.HHMMSS`-style timestamp string for the predefined
/// `LCSTAMP`/`GMSTAMP` constants.
pub fn format_stamp(epoch_secs: i64, local: bool) -> String {
    if local {
        match Local.timestamp_opt(epoch_secs, 0).single() {
            Some(dt) => dt.format("%Y%m%d.%H%M%S").to_string(),
            None => String::new(),
        }
    } else {
        match Utc.timestamp_opt(epoch_secs, 0).single() {
            Some(dt) => dt.format("%Y%m%d.%H%M%S").to_string(),
            None => String::new(),
        }
    }
}

/// One field of a timestamp constant family (`LCDATE`, `LCYEAR`, `LCHOUR`, …).
pub enum StampField {
    FullStamp,
    Date,
    Year,
    Year2,
    Month,
    Day,
    Time,
    Hour,
    Minute,
    Second,
    Offset,
    OffsetAbs,
}

pub fn format_stamp_field(epoch_secs: i64, local: bool, field: StampField) -> String {
    use StampField::*;
    if matches!(field, FullStamp) {
        return format_stamp(epoch_secs, local);
    }
    if local {
        let dt = match Local.timestamp_opt(epoch_secs, 0).single() {
            Some(dt) => dt,
            None => return String::new(),
        };
        render_field(field, dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute(), dt.second(), dt.offset().local_minus_utc())
    } else {
        let dt = match Utc.timestamp_opt(epoch_secs, 0).single() {
            Some(dt) => dt,
            None => return String::new(),
        };
        render_field(field, dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute(), dt.second(), 0)
    }
}

#[allow(clippy::too_many_arguments)]
fn render_field(
    field: StampField,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    utc_offset_secs: i32,
) -> String {
    use StampField::*;
    match field {
        FullStamp => unreachable!(),
        Date => format!("{year:04}{month:02}{day:02}"),
        Year => format!("{year:04}"),
        Year2 => format!("{:02}", year % 100),
        Month => format!("{month:02}"),
        Day => format!("{day:02}"),
        Time => format!("{hour:02}{minute:02}{second:02}"),
        Hour => format!("{hour:02}"),
        Minute => format!("{minute:02}"),
        Second => format!("{second:02}"),
        Offset => {
            let sign = if utc_offset_secs < 0 { '-' } else { '+' };
            let abs = utc_offset_secs.unsigned_abs();
            format!("{sign}{:02}{:02}", abs / 3600, (abs % 3600) / 60)
        }
        OffsetAbs => {
            let abs = utc_offset_secs.unsigned_abs();
            format!("{:02}{:02}", abs / 3600, (abs % 3600) / 60)
        }
    }
}
