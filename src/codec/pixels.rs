use std::collections::HashMap;

use serde_json::Value;

use crate::codec::{Coord, coerce_color, coerce_coordinate, first_present, parse_coordinate, unwrap_value};

/// Pixel table shapes the contract has been observed to return.
enum TableShape<'a> {
    List(&'a [Value]),
    Keyed(&'a serde_json::Map<String, Value>),
    Unknown,
}

impl<'a> TableShape<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items),
            Value::Object(map) => Self::Keyed(map),
            _ => Self::Unknown,
        }
    }
}

pub fn parse_pixel_map(raw: &Value) -> HashMap<Coord, String> {
    let mut target = HashMap::new();
    parse_pixels_into(raw, &mut target);
    target
}

/// Merges every well-formed entry of `raw` into `target`; malformed entries are dropped.
pub fn parse_pixels_into(raw: &Value, target: &mut HashMap<Coord, String>) {
    match TableShape::of(unwrap_value(raw)) {
        TableShape::List(items) => {
            for item in items {
                if let Some((coord, color)) = parse_list_item(item) {
                    target.insert(coord, color);
                }
            }
        }
        TableShape::Keyed(map) => {
            for (key, value) in map {
                let Some(coord) = parse_coordinate(&Value::String(key.clone())) else {
                    continue;
                };
                if let Some(color) = coerce_color(unwrap_value(value)) {
                    target.insert(coord, color);
                }
            }
        }
        TableShape::Unknown => {}
    }
}

fn parse_list_item(item: &Value) -> Option<(Coord, String)> {
    match item {
        Value::Array(tuple) => {
            if tuple.len() >= 3
                && let (Some(x), Some(y)) = (coerce_coordinate(&tuple[0]), coerce_coordinate(&tuple[1]))
            {
                return Some((Coord::new(x, y), coerce_color(unwrap_value(&tuple[2]))?));
            }
            if tuple.len() >= 2 {
                let coord = parse_coordinate(&tuple[0])?;
                return Some((coord, coerce_color(unwrap_value(&tuple[1]))?));
            }
            None
        }
        Value::Object(map) => {
            let color = first_present(item, &["color", "value", "v"]).and_then(coerce_color);
            if map.contains_key("x") && map.contains_key("y") {
                let x = coerce_coordinate(&map["x"])?;
                let y = coerce_coordinate(&map["y"])?;
                return Some((Coord::new(x, y), color?));
            }
            let coord = parse_coordinate(first_present(item, &["key", "k", "coord", "coords"])?)?;
            Some((coord, color?))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_tuple_rows() {
        let raw = json!({"value": [[1, 2, "#FFFFFF"], ["3,4", "#000000"]]});
        let pixels = parse_pixel_map(&raw);

        assert_eq!(pixels.len(), 2);
        assert_eq!(pixels.get(&Coord::new(1, 2)).map(String::as_str), Some("#ffffff"));
        assert_eq!(pixels.get(&Coord::new(3, 4)).map(String::as_str), Some("#000000"));
    }

    #[test]
    fn parses_object_rows() {
        let raw = json!([
            {"x": 0, "y": 1, "color": "#AA0000"},
            {"key": "5,6", "v": "#00bb00"},
            {"coords": [7, 8], "value": "#0000cc"},
        ]);
        let pixels = parse_pixel_map(&raw);

        assert_eq!(pixels.len(), 3);
        assert_eq!(pixels[&Coord::new(0, 1)], "#aa0000");
        assert_eq!(pixels[&Coord::new(5, 6)], "#00bb00");
        assert_eq!(pixels[&Coord::new(7, 8)], "#0000cc");
    }

    #[test]
    fn parses_keyed_map() {
        let raw = json!({"result": {"10,20": "#ABCDEF", "(1, 1)": {"value": "#123456"}}});
        let pixels = parse_pixel_map(&raw);

        assert_eq!(pixels[&Coord::new(10, 20)], "#abcdef");
        assert_eq!(pixels[&Coord::new(1, 1)], "#123456");
    }

    #[test]
    fn malformed_rows_do_not_drop_the_table() {
        let raw = json!([
            [1, 1, "#ffffff"],
            ["garbage", "#000000"],
            {"x": "NaN", "y": 2, "color": "#111111"},
            {"x": 2, "y": 2, "color": ""},
            null,
            42,
            [9, 9, "#999999"],
        ]);
        let pixels = parse_pixel_map(&raw);

        assert_eq!(pixels.len(), 2);
        assert!(pixels.contains_key(&Coord::new(1, 1)));
        assert!(pixels.contains_key(&Coord::new(9, 9)));
    }

    #[test]
    fn scalar_tables_are_empty() {
        assert!(parse_pixel_map(&json!("nope")).is_empty());
        assert!(parse_pixel_map(&json!(null)).is_empty());
    }
}
