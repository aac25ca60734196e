//! Typed flag values and raw-text coercion

use crate::flag::FlagKind;
use std::fmt;
use std::time::Duration;

/// A bound, typed flag value
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<String>),
    Duration(Duration),
    Count(u64),
}

/// Where a bound value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    Default,
    CommandLine,
    Environment,
}

impl FlagValue {
    /// The value a flag of `kind` holds when nothing else applies
    pub fn zero(kind: FlagKind) -> Self {
        match kind {
            FlagKind::Bool => FlagValue::Bool(false),
            FlagKind::Int => FlagValue::Int(0),
            FlagKind::Float => FlagValue::Float(0.0),
            FlagKind::String => FlagValue::String(String::new()),
            FlagKind::List => FlagValue::List(Vec::new()),
            FlagKind::Duration => FlagValue::Duration(Duration::ZERO),
            FlagKind::Count => FlagValue::Count(0),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(i) => Some(*i),
            FlagValue::Count(c) => i64::try_from(*c).ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FlagValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FlagValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            FlagValue::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            FlagValue::Count(c) => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueSource::Default => "default",
            ValueSource::CommandLine => "command line",
            ValueSource::Environment => "environment",
        };
        f.write_str(name)
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Int(i) => write!(f, "{}", i),
            FlagValue::Float(x) => write!(f, "{}", x),
            FlagValue::String(s) => f.write_str(s),
            FlagValue::List(items) => write!(f, "[{}]", items.join(",")),
            FlagValue::Duration(d) => write!(f, "{:?}", d),
            FlagValue::Count(c) => write!(f, "{}", c),
        }
    }
}

/// Coerce one raw occurrence into a value of `kind`.
///
/// `List` yields a one-element list; accumulation across occurrences is the
/// binder's job. Returns `None` when the text is not a valid `kind`.
pub fn coerce(kind: FlagKind, raw: &str) -> Option<FlagValue> {
    match kind {
        FlagKind::Bool => parse_bool(raw).map(FlagValue::Bool),
        FlagKind::Int => parse_int(raw).map(FlagValue::Int),
        FlagKind::Float => parse_float(raw).map(FlagValue::Float),
        FlagKind::String => Some(FlagValue::String(raw.to_string())),
        FlagKind::List => Some(FlagValue::List(vec![raw.to_string()])),
        FlagKind::Duration => parse_duration(raw).map(FlagValue::Duration),
        FlagKind::Count => parse_int(raw)
            .and_then(|n| u64::try_from(n).ok())
            .map(FlagValue::Count),
    }
}

/// Parse a boolean literal
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "t" | "true" | "True" | "TRUE" | "on" | "yes" => Some(true),
        "0" | "f" | "false" | "False" | "FALSE" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Parse a signed integer in decimal, `0x` hex, `0o` octal or `0b` binary
pub fn parse_int(raw: &str) -> Option<i64> {
    let t = raw.trim();
    let (negative, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let (radix, body) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        _ => (10, digits),
    };
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }

    let magnitude = i128::from_str_radix(body, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

/// Parse a finite floating point number
pub fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a duration such as `300ms`, `1.5s` or `1h30m`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. A bare `0` is accepted.
/// Negative durations are rejected.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let mut rest = raw.trim();
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }
    if rest.is_empty() || rest.starts_with('-') {
        return None;
    }
    if rest == "0" {
        return Some(Duration::ZERO);
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        let (unit_nanos, unit_len) = duration_unit(rest)?;
        total_nanos = total_nanos.checked_add(scaled_nanos(number, unit_nanos)?)?;
        rest = &rest[unit_len..];
    }

    let secs = u64::try_from(total_nanos / NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, (total_nanos % NANOS_PER_SEC) as u32))
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Fraction digits beyond this are below a nanosecond for every unit
const MAX_FRACTION_DIGITS: usize = 18;

/// Multiply a decimal literal like `1.25` by a unit, exactly.
fn scaled_nanos(number: &str, unit_nanos: u128) -> Option<u128> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return None;
    }

    let whole_nanos = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().ok()?.checked_mul(unit_nanos)?
    };

    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    if fraction.is_empty() {
        return Some(whole_nanos);
    }
    let scale = 10u128.pow(fraction.len() as u32);
    let digits: u128 = fraction.parse().ok()?;
    let fraction_nanos = (digits * unit_nanos + scale / 2) / scale;
    whole_nanos.checked_add(fraction_nanos)
}

fn duration_unit(rest: &str) -> Option<(u128, usize)> {
    const UNITS: &[(&str, u128)] = &[
        ("ns", 1),
        ("us", 1_000),
        ("µs", 1_000),
        ("ms", 1_000_000),
        ("s", NANOS_PER_SEC),
        ("m", 60 * NANOS_PER_SEC),
        ("h", 3600 * NANOS_PER_SEC),
    ];
    UNITS
        .iter()
        .find(|(suffix, _)| rest.starts_with(suffix))
        .map(|(suffix, nanos)| (*nanos, suffix.len()))
}
