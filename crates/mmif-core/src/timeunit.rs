//! Conversion between time units used by time-based annotations.
//!
//! Supported units are milliseconds, seconds, frames (given a frame rate),
//! and ISO clock strings `HH:MM:SS.mmm`. Each unit accepts several spellings,
//! see [`TimeUnit::from_str`].
//!
//! ```
//! use mmif_core::timeunit::{convert, TimeUnit, TimeValue};
//!
//! let frames = convert(&TimeValue::Int(2000), TimeUnit::Milliseconds, TimeUnit::Frames, 30.0).unwrap();
//! assert_eq!(frames, TimeValue::Int(60));
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};

use crate::error::{MmifError, MmifResult};

/// A time unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Frames,
    Iso,
}

impl FromStr for TimeUnit {
    type Err = MmifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" | "ms" | "msec" | "millisecond" | "milliseconds" => Ok(Self::Milliseconds),
            "s" | "se" | "sec" | "second" | "seconds" => Ok(Self::Seconds),
            "f" | "fr" | "frame" | "frames" => Ok(Self::Frames),
            "i" | "iso" | "isoformat" => Ok(Self::Iso),
            other => Err(MmifError::InvalidTimeUnit(other.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Frames => "frames",
            Self::Iso => "isoformat",
        };
        f.write_str(name)
    }
}

/// A time value in some unit.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeValue {
    Int(i64),
    Float(f64),
    Iso(String),
}

impl TimeValue {
    fn as_f64(&self) -> MmifResult<f64> {
        match self {
            Self::Int(i) => Ok(*i as f64),
            Self::Float(f) => Ok(*f),
            Self::Iso(s) => Err(MmifError::InvalidTime(format!(
                "expected a number, got ISO string {s:?}"
            ))),
        }
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Iso(s) => f.write_str(s),
        }
    }
}

/// Converts `t` from `in_unit` to `out_unit`.
///
/// Frame and millisecond results are rounded half-to-even; seconds are
/// exact. Converting a unit to itself returns the value unchanged.
pub fn convert(t: &TimeValue, in_unit: TimeUnit, out_unit: TimeUnit, fps: f64) -> MmifResult<TimeValue> {
    let (t, in_unit) = match (in_unit, t) {
        (TimeUnit::Iso, TimeValue::Iso(s)) => (TimeValue::Int(iso_to_millis(s)?), TimeUnit::Milliseconds),
        (TimeUnit::Iso, other) => {
            return Err(MmifError::InvalidTime(format!(
                "ISO format string expected, got {other}"
            )));
        }
        (unit, value) => (value.clone(), unit),
    };
    if in_unit == out_unit {
        return Ok(t);
    }
    let x = t.as_f64()?;
    let rounded = |v: f64| TimeValue::Int(v.round_ties_even() as i64);
    let value = match (in_unit, out_unit) {
        (TimeUnit::Milliseconds, TimeUnit::Frames) => rounded(x / 1000.0 * fps),
        (TimeUnit::Seconds, TimeUnit::Frames) => rounded(x * fps),
        (TimeUnit::Seconds, TimeUnit::Milliseconds) => rounded(x * 1000.0),
        (TimeUnit::Seconds, TimeUnit::Iso) => TimeValue::Iso(millis_to_iso(x * 1000.0)?),
        (TimeUnit::Milliseconds, TimeUnit::Seconds) => TimeValue::Float(x / 1000.0),
        (TimeUnit::Milliseconds, TimeUnit::Iso) => TimeValue::Iso(millis_to_iso(x)?),
        (TimeUnit::Frames, TimeUnit::Seconds) => TimeValue::Float(x / fps),
        (TimeUnit::Frames, TimeUnit::Milliseconds) => {
            rounded(round_to(x / fps, 3) * 1000.0)
        }
        (TimeUnit::Frames, TimeUnit::Iso) => TimeValue::Iso(millis_to_iso(round_to(x / fps, 3) * 1000.0)?),
        (from, to) => {
            return Err(MmifError::InvalidTime(format!("cannot convert {from} to {to}")));
        }
    };
    Ok(value)
}

fn round_to(x: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (x * scale).round_ties_even() / scale
}

fn iso_to_millis(s: &str) -> MmifResult<i64> {
    let t = NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .map_err(|e| MmifError::InvalidTime(format!("{s:?} is not HH:MM:SS.fff: {e}")))?;
    Ok(i64::from(t.num_seconds_from_midnight()) * 1000 + i64::from(t.nanosecond() / 1_000_000))
}

fn millis_to_iso(ms: f64) -> MmifResult<String> {
    let total = ms.trunc() as i64;
    let out_of_range = || MmifError::InvalidTime(format!("{ms} ms is outside a single day"));
    let secs = u32::try_from(total.div_euclid(1000)).map_err(|_| out_of_range())?;
    let nanos = u32::try_from(total.rem_euclid(1000) * 1_000_000).map_err(|_| out_of_range())?;
    let t = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).ok_or_else(out_of_range)?;
    Ok(t.format("%H:%M:%S%.3f").to_string())
}
