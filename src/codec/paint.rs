use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{Coord, coerce_color, coerce_coordinate, unwrap_value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paint {
    pub x: i64,
    pub y: i64,
    pub color: String,
}

impl Paint {
    pub fn new(coord: Coord, color: impl Into<String>) -> Self {
        Self {
            x: coord.x,
            y: coord.y,
            color: color.into(),
        }
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    /// Loose client/feed shape `{x, y, color}`; `None` if any part is unusable.
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::from_parts(value.get("x")?, value.get("y")?, value.get("color")?)
    }

    fn from_parts(x: &Value, y: &Value, color: &Value) -> Option<Self> {
        Some(Self {
            x: coerce_coordinate(unwrap_value(x))?,
            y: coerce_coordinate(unwrap_value(y))?,
            color: coerce_color(unwrap_value(color))?,
        })
    }
}

/// The two contract methods that change pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintMethod {
    Paint,
    PaintBatch,
}

impl PaintMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "paint" => Some(Self::Paint),
            "paint_batch" => Some(Self::PaintBatch),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Paint => "paint",
            Self::PaintBatch => "paint_batch",
        }
    }

    /// Paints from a feed payload's keyword arguments
    /// (`x`/`y`/`color` or `xs`/`ys`/`colors`).
    pub fn paints_from_kwargs(&self, kwargs: &Value) -> Vec<Paint> {
        let arg = |name: &str| kwargs.get(name).unwrap_or(&Value::Null);
        match self {
            Self::Paint => Paint::from_parts(arg("x"), arg("y"), arg("color"))
                .into_iter()
                .collect(),
            Self::PaintBatch => zip_batch(arg("xs"), arg("ys"), arg("colors")),
        }
    }

    /// Paints from positional decoded arguments `(x, y, color)` / `(xs, ys, colors)`.
    pub fn paints_from_args(&self, args: &[Value]) -> Vec<Paint> {
        let arg = |index: usize| args.get(index).unwrap_or(&Value::Null);
        match self {
            Self::Paint => Paint::from_parts(arg(0), arg(1), arg(2))
                .into_iter()
                .collect(),
            Self::PaintBatch => zip_batch(arg(0), arg(1), arg(2)),
        }
    }
}

/// Pairs up parallel batch arrays, truncated to the shortest; bad rows are skipped.
fn zip_batch(xs: &Value, ys: &Value, colors: &Value) -> Vec<Paint> {
    let as_list = |value: &Value| unwrap_value(value).as_array().cloned().unwrap_or_default();
    let (xs, ys, colors) = (as_list(xs), as_list(ys), as_list(colors));

    xs.iter()
        .zip(ys.iter())
        .zip(colors.iter())
        .filter_map(|((x, y), color)| Paint::from_parts(x, y, color))
        .collect()
}
