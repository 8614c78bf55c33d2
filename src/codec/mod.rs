//! Shape-sniffing for contract responses.
//!
//! The state endpoint does not return a fixed schema: results may be wrapped
//! in `{value: ..}` / `{result: ..}` envelopes, coordinates may be tuples,
//! objects or free-form strings, and pixel tables come in several layouts.
//! Everything past this module works with [`Coord`] and [`Paint`] only.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod calls;
pub mod paint;
pub mod pixels;

pub use calls::{
    calls_section, collect_calls, extract_call_value, extract_field_value, fields_section,
    has_error_marker,
};
pub use paint::{Paint, PaintMethod};
pub use pixels::parse_pixel_map;

/// Upper bound on envelope peeling and nested coordinate lookups.
pub const MAX_UNWRAP_DEPTH: usize = 4;

static EMBEDDED_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d+)[^\d-]+(-?\d+)").expect("embedded coordinate pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i64,
    pub y: i64,
}

impl Coord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Canonical map key, `"{x}:{y}"`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

impl FromStr for Coord {
    type Err = String;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let (x, y) = key
            .split_once(':')
            .ok_or_else(|| format!("'{key}' is not a coordinate key"))?;
        let x = x.parse().map_err(|_| format!("Invalid x in '{key}'"))?;
        let y = y.parse().map_err(|_| format!("Invalid y in '{key}'"))?;
        Ok(Self { x, y })
    }
}

/// Peels `value` / `result` envelopes, at most [`MAX_UNWRAP_DEPTH`] times.
pub fn unwrap_value(value: &Value) -> &Value {
    let mut current = value;
    for _ in 0..MAX_UNWRAP_DEPTH {
        let Value::Object(map) = current else {
            break;
        };
        if let Some(inner) = map.get("value") {
            current = inner;
            continue;
        }
        if let Some(inner) = map.get("result") {
            current = inner;
            continue;
        }
        break;
    }
    current
}

/// Numbers and numeric strings; anything that is not finite yields `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Like [`coerce_number`] but only integral values that fit an `i64`.
pub fn coerce_coordinate(value: &Value) -> Option<i64> {
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    let number = coerce_number(value)?;
    if number.fract() != 0.0 || number < i64::MIN as f64 || number >= i64::MAX as f64 {
        return None;
    }
    Some(number as i64)
}

/// Colors are non-empty strings, stored lower-cased.
pub fn coerce_color(value: &Value) -> Option<String> {
    match value {
        Value::String(color) if !color.trim().is_empty() => Some(color.trim().to_lowercase()),
        _ => None,
    }
}

/// First of `keys` present on `value` with a non-null value.
pub(crate) fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|candidate| !candidate.is_null())
}

pub fn parse_coordinate(raw: &Value) -> Option<Coord> {
    let mut current = unwrap_value(raw);

    for _ in 0..MAX_UNWRAP_DEPTH {
        match current {
            Value::Array(items) if items.len() >= 2 => {
                if let (Some(x), Some(y)) = (coerce_coordinate(&items[0]), coerce_coordinate(&items[1])) {
                    return Some(Coord::new(x, y));
                }
            }
            Value::Object(_) => {
                let x = first_present(current, &["x", "0"]).and_then(coerce_coordinate);
                let y = first_present(current, &["y", "1"]).and_then(coerce_coordinate);
                if let (Some(x), Some(y)) = (x, y) {
                    return Some(Coord::new(x, y));
                }
                if let Some(next) =
                    first_present(current, &["value", "result", "key", "k", "coord", "coords"])
                {
                    current = next;
                    continue;
                }
            }
            _ => {}
        }
        break;
    }

    parse_embedded_pair(&scalar_text(current)?)
}

fn parse_embedded_pair(text: &str) -> Option<Coord> {
    let captures = EMBEDDED_PAIR.captures(text)?;
    let x = captures.get(1)?.as_str().parse().ok()?;
    let y = captures.get(2)?.as_str().parse().ok()?;
    Some(Coord::new(x, y))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => None,
    }
}
