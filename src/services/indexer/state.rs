use std::collections::HashMap;

use serde_json::Value;

use crate::{
    codec::{
        Coord, calls_section, coerce_number, collect_calls, extract_call_value,
        extract_field_value, fields_section, has_error_marker, pixels::parse_pixels_into,
        unwrap_value,
    },
    error::Result,
    services::node::StateSource,
};

const STATS_CALL: &str = "get_stats()";
const COUNT_CALL: &str = "get_pixels_count()";
const PIXELS_FIELD: &str = "pixels";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractStats {
    pub paint_count: Option<u64>,
    pub unique_count: Option<u64>,
}

/// Result of reading the full pixel table.
#[derive(Debug)]
pub enum PixelTable {
    Complete(HashMap<Coord, String>),
    /// A page came back with an error marker; nothing from this read may be used.
    Incomplete { call: String },
}

fn coerce_count(value: &Value) -> Option<u64> {
    let number = coerce_number(value)?;
    (number >= 0.0 && number.fract() == 0.0).then_some(number as u64)
}

fn owned(calls: &[&str]) -> Vec<String> {
    calls.iter().map(|call| call.to_string()).collect()
}

pub async fn fetch_stats(source: &dyn StateSource) -> Result<ContractStats> {
    let calls = owned(&[STATS_CALL, COUNT_CALL]);
    let state = source.query(&calls, &[]).await?;
    let section = calls_section(&state);

    let stats = extract_call_value(section, "get_stats", &calls);
    let count = extract_call_value(section, "get_pixels_count", &calls);

    let paint_count = stats.as_ref().map(unwrap_value).and_then(|stats| match stats {
        Value::Array(items) => items.first().and_then(coerce_count),
        Value::Object(_) => ["paint_count", "painted", "painted_pixels"]
            .iter()
            .find_map(|key| stats.get(*key))
            .and_then(coerce_count),
        _ => None,
    });
    let unique_count = count.as_ref().map(unwrap_value).and_then(coerce_count);

    Ok(ContractStats {
        paint_count,
        unique_count,
    })
}

/// Best-effort second look at the unique count when the stats call did not report one.
async fn refetch_unique_count(source: &dyn StateSource) -> Option<u64> {
    let calls = owned(&[COUNT_CALL]);
    match source.query(&calls, &[]).await {
        Ok(state) => extract_call_value(calls_section(&state), "get_pixels_count", &calls)
            .as_ref()
            .map(unwrap_value)
            .and_then(coerce_count),
        Err(e) => {
            tracing::debug!(error = %e, "Pixel count lookup failed");
            None
        }
    }
}

/// Reads the whole table, `page_calls` windows of `page_size` per request.
/// Without a known unique count the `pixels` field is read in one go.
pub async fn fetch_pixel_table(
    source: &dyn StateSource,
    unique_count: Option<u64>,
    page_size: u64,
    page_calls: u64,
) -> Result<PixelTable> {
    let total = match unique_count {
        Some(total) => Some(total),
        None => refetch_unique_count(source).await,
    };

    let mut pixels = HashMap::new();

    let Some(total) = total else {
        let state = source.query(&[], &owned(&[PIXELS_FIELD])).await?;
        let raw = extract_field_value(fields_section(&state), PIXELS_FIELD).unwrap_or(Value::Null);
        if has_error_marker(&raw) {
            return Ok(PixelTable::Incomplete {
                call: PIXELS_FIELD.into(),
            });
        }
        parse_pixels_into(&raw, &mut pixels);
        return Ok(PixelTable::Complete(pixels));
    };

    let mut offset = 0;
    while offset < total {
        let calls: Vec<String> = (0..page_calls)
            .map(|index| offset.saturating_add(index.saturating_mul(page_size)))
            .take_while(|page_offset| *page_offset < total)
            .map(|page_offset| format!("get_pixels_page({page_offset},{page_size})"))
            .collect();
        if calls.is_empty() {
            break;
        }

        let state = source.query(&calls, &[]).await?;
        let pages: HashMap<String, Value> = collect_calls(calls_section(&state), &calls)
            .into_iter()
            .collect();

        for call in &calls {
            // A page the node left out is as bad as one that errored.
            let Some(page) = pages.get(call).filter(|page| !has_error_marker(page)) else {
                return Ok(PixelTable::Incomplete { call: call.clone() });
            };
            parse_pixels_into(page, &mut pixels);
        }

        offset = offset.saturating_add((calls.len() as u64).saturating_mul(page_size));
    }

    Ok(PixelTable::Complete(pixels))
}
