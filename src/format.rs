//! Rendering values into display text and framing them into entries.

use crate::value::Value;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Line written in place of a value that could not be rendered.
pub const PARSE_FAILURE: &str = "Error while parsing logs";

/// Fallback for error values that carry no trace.
const NO_TRACE: &str = "Error, no stack";

/// A value could not be rendered.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormatError {
    /// A canonical projection failed (e.g. JSON serialization of a map with
    /// non-string keys).
    #[error("projection failed: {0}")]
    Projection(String),
}

/// Render a value into its display string.
///
/// Primitives use their natural text form; sequences, records and entry
/// pairs are rendered recursively. A failure anywhere inside the value
/// fails the whole value.
///
/// # Examples
///
/// ```
/// use logbook::{format, Value};
///
/// assert_eq!(format(&Value::from(123u64)).unwrap(), "123n");
/// assert_eq!(format(&Value::from(vec![1, 2])).unwrap(), "[1, 2]");
/// assert_eq!(format(&Value::Null).unwrap(), "null");
/// ```
pub fn format(value: &Value) -> Result<String, FormatError> {
    Ok(match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::BigInt(n) => format!("{n}n"),
        Value::String(s) => s.clone(),
        Value::Symbol(description) => format!("Symbol({description})"),
        Value::Function => "function".to_string(),
        Value::Projected(projection) => projection.project()?,
        Value::Array(items) => {
            let parts = items.iter().map(format).collect::<Result<Vec<_>, _>>()?;
            format!("[{}]", parts.join(", "))
        }
        Value::Error(trace) => trace.clone().unwrap_or_else(|| NO_TRACE.to_string()),
        Value::Record(fields) => {
            let parts = fields
                .iter()
                .map(|(key, value)| Ok(format!("{key}: {}", format(value)?)))
                .collect::<Result<Vec<_>, FormatError>>()?;
            format!("{{{}}}", parts.join(", "))
        }
        Value::Entries(pairs) => {
            let parts = pairs
                .iter()
                .map(|(key, value)| Ok(format!("[{}, {}]", format(key)?, format(value)?)))
                .collect::<Result<Vec<_>, FormatError>>()?;
            format!("[{}]", parts.join(", "))
        }
        Value::Opaque => "{}".to_string(),
    })
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        // Covers negative zero.
        return "0".to_string();
    }
    let magnitude = n.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let sci = format!("{n:e}");
        return match sci.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => sci,
        };
    }
    n.to_string()
}

/// Frame one entry for the on-disk file.
///
/// ```text
/// 2024-07-12T06:21:10.800Z:
/// first value
/// second value
///
/// ```
///
/// Values that fail to render are replaced with [`PARSE_FAILURE`]; the
/// remaining values are still written.
pub(crate) fn frame(values: &[Value], at: DateTime<Utc>) -> String {
    let mut out = format!("{}: \n", at.to_rfc3339_opts(SecondsFormat::Millis, true));
    for value in values {
        match format(value) {
            Ok(text) => {
                out.push_str(&text);
                out.push_str(" \n");
            }
            Err(err) => {
                log::debug!("logbook: value could not be rendered: {err}");
                out.push_str(PARSE_FAILURE);
                out.push_str(" \n");
            }
        }
    }
    out.push('\n');
    out
}
