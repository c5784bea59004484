use geo::{Coord, LineString, Polygon};
use serde_json::{Map, Value};

use crate::error::MalformedEntry;

pub(crate) fn to_geo_poly(points: Vec<Coord<f64>>) -> Polygon<f64> {
    Polygon::new(LineString::new(points), vec![])
}

/// Accepts `[[x, y], ...]` point lists and flat `[x0, y0, x1, y1, ...]` sequences.
pub(crate) fn parse_polygon(value: &Value) -> Result<Polygon<f64>, MalformedEntry> {
    let Value::Array(items) = value else {
        return Err(MalformedEntry::InvalidPoint(0));
    };
    if items.is_empty() {
        return Err(MalformedEntry::EmptyPolygon);
    }

    let points = if items.iter().all(Value::is_number) {
        if items.len() % 2 != 0 {
            return Err(MalformedEntry::InvalidPoint(items.len() / 2));
        }
        items
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| coord(&pair[0], &pair[1]).ok_or(MalformedEntry::InvalidPoint(i)))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        items
            .iter()
            .enumerate()
            .map(|(i, point)| parse_point(point).ok_or(MalformedEntry::InvalidPoint(i)))
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(to_geo_poly(points))
}

fn parse_point(point: &Value) -> Option<Coord<f64>> {
    match point.as_array()?.as_slice() {
        [x, y, ..] => coord(x, y),
        _ => None,
    }
}

fn coord(x: &Value, y: &Value) -> Option<Coord<f64>> {
    let x = x.as_f64().filter(|it| it.is_finite())?;
    let y = y.as_f64().filter(|it| it.is_finite())?;
    Some(Coord { x, y })
}

/// Strings pass through untouched, numbers are rendered. Blank text is rejected.
pub(crate) fn parse_text(value: &Value) -> Result<String, MalformedEntry> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return Err(MalformedEntry::InvalidText),
    };
    if text.trim().is_empty() {
        return Err(MalformedEntry::EmptyText);
    }
    Ok(text)
}

/// Finite numbers or numeric strings. Anything else means "no score".
pub(crate) fn parse_score(value: Option<&Value>) -> Option<f64> {
    let score = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    score.is_finite().then_some(score)
}

/// First key from `candidates` present in `map`.
pub(crate) fn lookup<'a>(map: &'a Map<String, Value>, candidates: &[&str]) -> Option<&'a Value> {
    candidates.iter().find_map(|key| map.get(*key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn points(polygon: &Polygon<f64>) -> Vec<(f64, f64)> {
        polygon.exterior().points().map(|p| (p.x(), p.y())).collect()
    }

    #[test]
    fn flat_box_becomes_two_corners() {
        let polygon = parse_polygon(&json!([1, 2, 30.5, 40])).unwrap();
        assert_eq!(points(&polygon), vec![(1.0, 2.0), (30.5, 40.0), (1.0, 2.0)]);
    }

    #[test]
    fn point_list_polygon() {
        let polygon = parse_polygon(&json!([[0, 0], [4, 0], [4, 3]])).unwrap();
        assert_eq!(polygon.exterior().0.len(), 4);
    }

    #[test]
    fn bad_polygons() {
        assert_eq!(parse_polygon(&json!([])), Err(MalformedEntry::EmptyPolygon));
        assert_eq!(
            parse_polygon(&json!([[0, 0], ["a", 1]])),
            Err(MalformedEntry::InvalidPoint(1))
        );
        assert_eq!(
            parse_polygon(&json!([1, 2, 3])),
            Err(MalformedEntry::InvalidPoint(1))
        );
        assert_eq!(
            parse_polygon(&json!("box")),
            Err(MalformedEntry::InvalidPoint(0))
        );
    }

    #[test]
    fn text_rules() {
        assert_eq!(parse_text(&json!(" Hi ")), Ok(" Hi ".to_string()));
        assert_eq!(parse_text(&json!(42)), Ok("42".to_string()));
        assert_eq!(parse_text(&json!("   ")), Err(MalformedEntry::EmptyText));
        assert_eq!(parse_text(&json!(null)), Err(MalformedEntry::InvalidText));
    }

    #[test]
    fn score_rules() {
        assert_eq!(parse_score(Some(&json!(0.75))), Some(0.75));
        assert_eq!(parse_score(Some(&json!("87"))), Some(87.0));
        assert_eq!(parse_score(Some(&json!(null))), None);
        assert_eq!(parse_score(Some(&json!("n/a"))), None);
        assert_eq!(parse_score(None), None);
    }
}
