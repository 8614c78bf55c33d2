use std::{collections::BTreeMap, convert::Infallible, str::FromStr};

use serde::Serialize;

use crate::codec::Coord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotFormat {
    #[default]
    Array,
    Map,
}

impl FromStr for SnapshotFormat {
    type Err = Infallible;

    /// Anything other than `map` falls back to the array layout.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(if value.trim().eq_ignore_ascii_case("map") {
            Self::Map
        } else {
            Self::Array
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SnapshotPixels {
    /// `[[x, y, color], ...]`
    Array(Vec<(i64, i64, String)>),
    /// `{"x:y": color, ...}`
    Map(BTreeMap<String, String>),
}

impl SnapshotPixels {
    pub fn len(&self) -> usize {
        match self {
            Self::Array(rows) => rows.len(),
            Self::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanvasSnapshot {
    pub paint_count: u64,
    pub unique_count: usize,
    pub updated_at: u64,
    pub pixels: SnapshotPixels,
}

/// A pixel whose stored color changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelDiff {
    pub coord: Coord,
    pub previous: Option<String>,
    pub color: String,
}
