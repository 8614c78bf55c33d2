use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{codec::Coord, utils::time::now_ms};

pub mod types;

pub use types::{CanvasSnapshot, PixelDiff, SnapshotFormat, SnapshotPixels};

#[derive(Default)]
struct CanvasState {
    pixels: HashMap<Coord, String>,
    paint_count: u64,
    last_updated_at: u64,
}

/// Confirmed canvas state. Each operation is one critical section; the lock
/// is never held across I/O.
#[derive(Default)]
pub struct CanvasStore {
    state: RwLock<CanvasState>,
}

impl CanvasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in a whole table and returns the pixels whose color changed.
    /// `paint_count` is only taken when the upstream reported one.
    pub async fn replace_all(
        &self,
        pixels: HashMap<Coord, String>,
        paint_count: Option<u64>,
    ) -> Vec<PixelDiff> {
        let mut state = self.state.write().await;

        let mut diffs: Vec<PixelDiff> = pixels
            .iter()
            .filter(|(coord, color)| state.pixels.get(*coord) != Some(*color))
            .map(|(coord, color)| PixelDiff {
                coord: *coord,
                previous: state.pixels.get(coord).cloned(),
                color: color.clone(),
            })
            .collect();
        diffs.sort_by_key(|diff| diff.coord);

        let previous_size = state.pixels.len();
        state.pixels = pixels;

        if let Some(count) = paint_count {
            state.paint_count = count;
        }
        if !diffs.is_empty() || previous_size != state.pixels.len() || paint_count.is_some() {
            state.last_updated_at = now_ms();
        }

        diffs
    }

    /// Upserts one pixel; `true` when the stored color changed.
    pub async fn apply_one(&self, coord: Coord, color: &str) -> bool {
        let color = color.to_lowercase();
        let mut state = self.state.write().await;
        upsert(&mut state, coord, color)
    }

    /// A confirmed paint observed live: upsert and count it.
    pub async fn record_paint(&self, coord: Coord, color: &str) -> bool {
        let color = color.to_lowercase();
        let mut state = self.state.write().await;
        state.paint_count += 1;
        state.last_updated_at = now_ms();
        upsert(&mut state, coord, color)
    }

    pub async fn set_paint_count(&self, paint_count: Option<u64>) {
        if let Some(count) = paint_count {
            let mut state = self.state.write().await;
            if state.paint_count != count {
                state.paint_count = count;
                state.last_updated_at = now_ms();
            }
        }
    }

    pub async fn paint_count(&self) -> u64 {
        self.state.read().await.paint_count
    }

    pub async fn unique_count(&self) -> usize {
        self.state.read().await.pixels.len()
    }

    pub async fn color_at(&self, coord: Coord) -> Option<String> {
        self.state.read().await.pixels.get(&coord).cloned()
    }

    /// Read-only access to the pixel map for checks that must see one consistent view.
    pub async fn with_pixels<R>(&self, f: impl FnOnce(&HashMap<Coord, String>) -> R) -> R {
        let state = self.state.read().await;
        f(&state.pixels)
    }

    pub async fn snapshot(&self, format: SnapshotFormat) -> CanvasSnapshot {
        let state = self.state.read().await;

        let mut rows: Vec<(&Coord, &String)> = state.pixels.iter().collect();
        rows.sort_by_key(|(coord, _)| **coord);

        let pixels = match format {
            SnapshotFormat::Array => SnapshotPixels::Array(
                rows.into_iter()
                    .map(|(coord, color)| (coord.x, coord.y, color.clone()))
                    .collect(),
            ),
            SnapshotFormat::Map => SnapshotPixels::Map(
                rows.into_iter()
                    .map(|(coord, color)| (coord.key(), color.clone()))
                    .collect(),
            ),
        };

        CanvasSnapshot {
            paint_count: state.paint_count,
            unique_count: state.pixels.len(),
            updated_at: state.last_updated_at,
            pixels,
        }
    }
}

fn upsert(state: &mut CanvasState, coord: Coord, color: String) -> bool {
    if state.pixels.get(&coord) == Some(&color) {
        return false;
    }
    state.pixels.insert(coord, color);
    state.last_updated_at = now_ms();
    true
}
