//! Locale-independent value formatting.
//!
//! Converts a [`Value`] into the [`AttributeValue`] bound to a value
//! placeholder, optionally applying a format specifier:
//!
//! - **Dates**: `o`/`O` (ISO-8601 round-trip), `s` (sortable), `u` (universal),
//!   `d` (date only), custom patterns (`yyyy-MM-dd HH:mm:ss.fff`) and
//!   `strftime` patterns containing `%`.
//! - **Numbers**: `F`, `N`, `C`, `P`, `E`, `D`, `X` with optional precision,
//!   and custom digit patterns (`0000`, `#,##0.00`).
//!
//! Output never depends on the host locale: the group separator is always `,`,
//! the decimal separator `.`, and the currency symbol the invariant `¤`.
//! Numbers are rounded half away from zero on their decimal digits.

use std::collections::HashMap;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc};
use dynexpr_model::AttributeValue;

use crate::error::{ExpressionError, ExpressionResult};
use crate::value::Value;

/// Render `value` for a value placeholder.
///
/// Without a specifier, strings and enums become `S`, numbers `N`, dates `S`
/// (using `default_date_format`), sets/lists/maps their DynamoDB collection
/// types. With a specifier the result is `N` when the formatted text is still a
/// plain decimal number, `S` otherwise.
pub fn render(
    value: &Value,
    spec: Option<&str>,
    default_date_format: &str,
) -> ExpressionResult<AttributeValue> {
    match spec.map(str::trim).filter(|s| !s.is_empty()) {
        None => render_default(value, default_date_format),
        Some(spec) => render_with(value, spec),
    }
}

fn render_default(value: &Value, date_format: &str) -> ExpressionResult<AttributeValue> {
    let rendered = match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Decimal(_) => {
            AttributeValue::N(decimal_text(value)?.to_fixed())
        }
        Value::String(s) | Value::Enum(s) => AttributeValue::S(s.clone()),
        Value::DateTime(dt) => AttributeValue::S(format_datetime(dt, date_format)?),
        Value::Date(date) => AttributeValue::S(format_date(*date, date_format)?),
        Value::Binary(b) => AttributeValue::B(b.clone()),
        Value::StringSet(items) => AttributeValue::Ss(items.clone()),
        Value::NumberSet(items) => AttributeValue::Ns(
            items
                .iter()
                .map(|n| parse_number(n).map(|d| d.to_fixed()))
                .collect::<ExpressionResult<_>>()?,
        ),
        Value::BinarySet(items) => AttributeValue::Bs(items.clone()),
        Value::List(items) => AttributeValue::L(
            items
                .iter()
                .map(|item| render_default(item, date_format))
                .collect::<ExpressionResult<_>>()?,
        ),
        Value::Map(entries) => AttributeValue::M(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), render_default(v, date_format)?)))
                .collect::<ExpressionResult<HashMap<_, _>>>()?,
        ),
        Value::Location(point) => {
            AttributeValue::S(format!("{},{}", point.latitude, point.longitude))
        }
    };
    Ok(rendered)
}

fn render_with(value: &Value, spec: &str) -> ExpressionResult<AttributeValue> {
    match value {
        Value::DateTime(dt) => Ok(AttributeValue::S(format_datetime(dt, spec)?)),
        Value::Date(date) => Ok(AttributeValue::S(format_date(*date, spec)?)),
        v if v.is_numeric() => {
            let text = format_number(v, spec)?;
            if DecimalText::parse(&text).is_some() {
                Ok(AttributeValue::N(text))
            } else {
                Ok(AttributeValue::S(text))
            }
        }
        other => Err(ExpressionError::unsupported(
            "format specifier",
            format!("'{spec}' cannot be applied to a {} value", other.kind()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Format a date/time with a standard, custom or `strftime` specifier.
pub fn format_datetime(dt: &DateTime<FixedOffset>, spec: &str) -> ExpressionResult<String> {
    match spec {
        "o" | "O" => Ok(round_trip(dt)),
        "s" => Ok(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        "u" => Ok(dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%SZ").to_string()),
        "d" => Ok(dt.format("%Y-%m-%d").to_string()),
        _ if spec.contains('%') => strftime(dt, spec),
        _ => custom_date_pattern(dt, spec),
    }
}

fn format_date(date: NaiveDate, spec: &str) -> ExpressionResult<String> {
    match spec {
        "o" | "O" | "s" | "d" => Ok(date.format("%Y-%m-%d").to_string()),
        _ => {
            let midnight = date.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset();
            format_datetime(&midnight, spec)
        }
    }
}

fn round_trip(dt: &DateTime<FixedOffset>) -> String {
    let ticks = dt.nanosecond() % 1_000_000_000 / 100;
    format!(
        "{}.{ticks:07}{}",
        dt.format("%Y-%m-%dT%H:%M:%S"),
        offset_suffix(dt, true)
    )
}

fn offset_suffix(dt: &DateTime<FixedOffset>, utc_as_z: bool) -> String {
    if utc_as_z && dt.offset().local_minus_utc() == 0 {
        "Z".to_owned()
    } else {
        dt.format("%:z").to_string()
    }
}

fn strftime(dt: &DateTime<FixedOffset>, spec: &str) -> ExpressionResult<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(spec).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(ExpressionError::unsupported(
            "date format",
            format!("'{spec}' is not a valid strftime pattern"),
        ));
    }
    Ok(dt.format_with_items(items.into_iter()).to_string())
}

fn custom_date_pattern(dt: &DateTime<FixedOffset>, pattern: &str) -> ExpressionResult<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' {
            let Some(len) = chars[i + 1..].iter().position(|&q| q == c) else {
                return Err(ExpressionError::unsupported(
                    "date format",
                    format!("unterminated literal in '{pattern}'"),
                ));
            };
            out.extend(&chars[i + 1..i + 1 + len]);
            i += len + 2;
            continue;
        }
        if c == '\\' {
            if let Some(&next) = chars.get(i + 1) {
                out.push(next);
            }
            i += 2;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&r| r == c).count();
        match c {
            'y' => match run {
                1 => out.push_str(&(dt.year() % 100).to_string()),
                2 => out.push_str(&format!("{:02}", dt.year() % 100)),
                _ => out.push_str(&format!("{:0run$}", dt.year())),
            },
            'M' => match run {
                1 => out.push_str(&dt.month().to_string()),
                2 => out.push_str(&format!("{:02}", dt.month())),
                3 => out.push_str(&dt.format("%b").to_string()),
                _ => out.push_str(&dt.format("%B").to_string()),
            },
            'd' => match run {
                1 => out.push_str(&dt.day().to_string()),
                2 => out.push_str(&format!("{:02}", dt.day())),
                3 => out.push_str(&dt.format("%a").to_string()),
                _ => out.push_str(&dt.format("%A").to_string()),
            },
            'H' => push_padded(&mut out, dt.hour(), run),
            'h' => push_padded(&mut out, dt.hour12().1, run),
            'm' => push_padded(&mut out, dt.minute(), run),
            's' => push_padded(&mut out, dt.second(), run),
            'f' => {
                if run > 7 {
                    return Err(ExpressionError::unsupported(
                        "date format",
                        format!("at most 7 fraction digits are supported in '{pattern}'"),
                    ));
                }
                let nanos = dt.nanosecond() % 1_000_000_000;
                let exponent = u32::try_from(9 - run).unwrap_or(0);
                let digits = nanos / 10_u32.pow(exponent);
                out.push_str(&format!("{digits:0run$}"));
            }
            't' => {
                let pm = dt.hour12().0;
                match (run, pm) {
                    (1, false) => out.push('A'),
                    (1, true) => out.push('P'),
                    (_, false) => out.push_str("AM"),
                    (_, true) => out.push_str("PM"),
                }
            }
            'z' => {
                let seconds = dt.offset().local_minus_utc();
                let sign = if seconds < 0 { '-' } else { '+' };
                let hours = seconds.abs() / 3600;
                match run {
                    1 => out.push_str(&format!("{sign}{hours}")),
                    2 => out.push_str(&format!("{sign}{hours:02}")),
                    _ => out.push_str(&offset_suffix(dt, false)),
                }
            }
            'K' => {
                for _ in 0..run {
                    out.push_str(&offset_suffix(dt, true));
                }
            }
            other => out.extend(std::iter::repeat_n(other, run)),
        }
        i += run;
    }

    Ok(out)
}

fn push_padded(out: &mut String, n: u32, run: usize) {
    if run == 1 {
        out.push_str(&n.to_string());
    } else {
        out.push_str(&format!("{n:02}"));
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// A decimal number held as digit strings, so rounding is exact.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DecimalText {
    negative: bool,
    /// Integer digits without leading zeros (`"0"` for zero).
    int: String,
    /// Fraction digits.
    frac: String,
}

impl DecimalText {
    fn parse(text: &str) -> Option<Self> {
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int, frac) = match body.split_once('.') {
            Some((_, "")) => return None,
            Some((int, frac)) => (int, frac),
            None => (body, ""),
        };
        if (int.is_empty() && frac.is_empty())
            || !int.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(
            Self {
                negative,
                int: int.to_owned(),
                frac: frac.to_owned(),
            }
            .normalized(),
        )
    }

    fn normalized(mut self) -> Self {
        let trimmed = self.int.trim_start_matches('0');
        self.int = if trimmed.is_empty() {
            "0".to_owned()
        } else {
            trimmed.to_owned()
        };
        if self.is_zero() {
            self.negative = false;
        }
        self
    }

    fn is_zero(&self) -> bool {
        self.int.bytes().all(|b| b == b'0') && self.frac.bytes().all(|b| b == b'0')
    }

    /// Round half away from zero to `places` fraction digits.
    fn round(&self, places: usize) -> Self {
        if self.frac.len() <= places {
            let mut frac = self.frac.clone();
            frac.extend(std::iter::repeat_n('0', places - self.frac.len()));
            return Self {
                negative: self.negative,
                int: self.int.clone(),
                frac,
            };
        }

        let mut digits: Vec<u8> = self
            .int
            .bytes()
            .chain(self.frac.bytes().take(places))
            .map(|b| b - b'0')
            .collect();
        let round_up = self.frac.as_bytes()[places] >= b'5';
        if round_up {
            let mut carry = true;
            for d in digits.iter_mut().rev() {
                if *d == 9 {
                    *d = 0;
                } else {
                    *d += 1;
                    carry = false;
                    break;
                }
            }
            if carry {
                digits.insert(0, 1);
            }
        }

        let split = digits.len() - places;
        let render_digits =
            |ds: &[u8]| ds.iter().map(|d| char::from(b'0' + d)).collect::<String>();
        Self {
            negative: self.negative,
            int: render_digits(&digits[..split]),
            frac: render_digits(&digits[split..]),
        }
        .normalized()
    }

    /// Multiply by 100 by moving the decimal point.
    fn percent(&self) -> Self {
        let mut frac = self.frac.clone();
        while frac.len() < 2 {
            frac.push('0');
        }
        let (moved, rest) = frac.split_at(2);
        Self {
            negative: self.negative,
            int: format!("{}{moved}", self.int),
            frac: rest.to_owned(),
        }
        .normalized()
    }

    fn sign(&self) -> &'static str {
        if self.negative { "-" } else { "" }
    }

    fn to_fixed(&self) -> String {
        if self.frac.is_empty() {
            format!("{}{}", self.sign(), self.int)
        } else {
            format!("{}{}.{}", self.sign(), self.int, self.frac)
        }
    }

    fn to_grouped(&self) -> String {
        if self.frac.is_empty() {
            format!("{}{}", self.sign(), group(&self.int))
        } else {
            format!("{}{}.{}", self.sign(), group(&self.int), self.frac)
        }
    }
}

fn group(int: &str) -> String {
    let len = int.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn parse_number(text: &str) -> ExpressionResult<DecimalText> {
    DecimalText::parse(text).ok_or_else(|| {
        ExpressionError::unsupported("number", format!("'{text}' is not a decimal number"))
    })
}

fn decimal_text(value: &Value) -> ExpressionResult<DecimalText> {
    match value {
        Value::Int(n) => parse_number(&n.to_string()),
        Value::UInt(n) => parse_number(&n.to_string()),
        Value::Float(f) if f.is_finite() => parse_number(&f.to_string()),
        Value::Float(f) => Err(ExpressionError::unsupported(
            "number",
            format!("{f} cannot be stored in DynamoDB"),
        )),
        Value::Decimal(text) => parse_number(text),
        other => Err(ExpressionError::unsupported(
            "number",
            format!("{} value is not numeric", other.kind()),
        )),
    }
}

/// Format a numeric value with a standard or custom numeric specifier.
fn format_number(value: &Value, spec: &str) -> ExpressionResult<String> {
    let mut chars = spec.chars();
    let letter = chars.next().unwrap_or_default();
    let rest = chars.as_str();
    let is_standard = letter.is_ascii_alphabetic() && rest.bytes().all(|b| b.is_ascii_digit());
    if !is_standard {
        return custom_number_pattern(value, spec);
    }

    let precision = if rest.is_empty() {
        None
    } else {
        rest.parse::<usize>().ok()
    };
    let d = decimal_text(value)?;

    match letter.to_ascii_uppercase() {
        'F' => Ok(d.round(precision.unwrap_or(2)).to_fixed()),
        'N' => Ok(d.round(precision.unwrap_or(2)).to_grouped()),
        'C' => {
            let rounded = d.round(precision.unwrap_or(2));
            let unsigned = DecimalText {
                negative: false,
                ..rounded.clone()
            };
            Ok(format!("{}¤{}", rounded.sign(), unsigned.to_grouped()))
        }
        'P' => Ok(format!(
            "{} %",
            d.percent().round(precision.unwrap_or(2)).to_grouped()
        )),
        'E' => Ok(scientific(&d, precision.unwrap_or(6), letter.is_ascii_uppercase())),
        'D' => {
            let width = precision.unwrap_or(0);
            match value {
                Value::Int(_) | Value::UInt(_) => {
                    Ok(format!("{}{:0>width$}", d.sign(), d.int))
                }
                other => Err(ExpressionError::unsupported(
                    "format specifier",
                    format!("'{spec}' requires an integer, got a {} value", other.kind()),
                )),
            }
        }
        'X' => {
            let width = precision.unwrap_or(0);
            let upper = letter.is_ascii_uppercase();
            match (value, upper) {
                (Value::Int(n), true) => Ok(format!("{n:0width$X}")),
                (Value::Int(n), false) => Ok(format!("{n:0width$x}")),
                (Value::UInt(n), true) => Ok(format!("{n:0width$X}")),
                (Value::UInt(n), false) => Ok(format!("{n:0width$x}")),
                (other, _) => Err(ExpressionError::unsupported(
                    "format specifier",
                    format!("'{spec}' requires an integer, got a {} value", other.kind()),
                )),
            }
        }
        _ => Err(ExpressionError::unsupported(
            "format specifier",
            format!("'{spec}' is not a recognized numeric format"),
        )),
    }
}

fn scientific(d: &DecimalText, places: usize, upper: bool) -> String {
    let digits = format!("{}{}", d.int, d.frac);
    let (mut mantissa, mut exponent) = match digits.find(|c| c != '0') {
        Some(first) => {
            let int_len = i64::try_from(d.int.len()).unwrap_or(i64::MAX);
            let first_i = i64::try_from(first).unwrap_or(i64::MAX);
            let mantissa = DecimalText {
                negative: d.negative,
                int: digits[first..=first].to_owned(),
                frac: digits[first + 1..].to_owned(),
            };
            (mantissa.round(places), int_len - 1 - first_i)
        }
        None => (
            DecimalText {
                negative: false,
                int: "0".to_owned(),
                frac: String::new(),
            }
            .round(places),
            0,
        ),
    };
    if mantissa.int.len() > 1 {
        mantissa.int = "1".to_owned();
        mantissa.frac = "0".repeat(places);
        exponent += 1;
    }
    let e = if upper { 'E' } else { 'e' };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}{e}{sign}{:03}", mantissa.to_fixed(), exponent.abs())
}

fn custom_number_pattern(value: &Value, pattern: &str) -> ExpressionResult<String> {
    let valid = pattern.chars().all(|c| matches!(c, '0' | '#' | ',' | '.'))
        && pattern.matches('.').count() <= 1
        && pattern.contains(['0', '#']);
    if !valid {
        return Err(ExpressionError::unsupported(
            "format specifier",
            format!("'{pattern}' is not a recognized numeric format"),
        ));
    }

    let (int_pattern, frac_pattern) = pattern.split_once('.').unwrap_or((pattern, ""));
    let min_int = int_pattern.matches('0').count();
    let min_frac = frac_pattern.matches('0').count();
    let max_frac = frac_pattern.matches(['0', '#']).count();

    let rounded = decimal_text(value)?.round(max_frac);
    let mut frac = rounded.frac.clone();
    while frac.len() > min_frac && frac.ends_with('0') {
        frac.pop();
    }
    let mut int = if rounded.int == "0" && min_int == 0 {
        String::new()
    } else {
        rounded.int.clone()
    };
    if int.len() < min_int {
        int = format!("{int:0>min_int$}");
    }
    if int_pattern.contains(',') {
        int = group(&int);
    }
    if int.is_empty() && frac.is_empty() {
        int.push('0');
    }

    let sign = if rounded.negative { "-" } else { "" };
    if frac.is_empty() {
        Ok(format!("{sign}{int}"))
    } else {
        Ok(format!("{sign}{int}.{frac}"))
    }
}
