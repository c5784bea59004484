use geo::{BoundingRect, Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::{error::MalformedEntry, NormalizeError};

/// One detection in engine terms, independent of the shape it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Triple {
    polygon: Polygon<f64>,
    text: String,
    score: f64,
}

impl Triple {
    /// The polygon must hold at least one finite point, the text must not be
    /// blank and the score must be finite. The score is kept on whatever scale
    /// the engine used.
    pub fn new(
        polygon: Polygon<f64>,
        text: impl Into<String>,
        score: f64,
    ) -> Result<Self, MalformedEntry> {
        let points = &polygon.exterior().0;
        if points.is_empty() {
            return Err(MalformedEntry::EmptyPolygon);
        }
        if let Some(i) = points
            .iter()
            .position(|it| !it.x.is_finite() || !it.y.is_finite())
        {
            return Err(MalformedEntry::InvalidPoint(i));
        }
        if !score.is_finite() {
            return Err(MalformedEntry::InvalidScore);
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(MalformedEntry::EmptyText);
        }
        Ok(Self {
            polygon,
            text,
            score,
        })
    }

    pub fn from_points(
        points: &[(f64, f64)],
        text: impl Into<String>,
        score: f64,
    ) -> Result<Self, MalformedEntry> {
        let coords = points.iter().map(|&(x, y)| Coord { x, y }).collect();
        Self::new(Polygon::new(LineString::new(coords), vec![]), text, score)
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

/// Integer axis-aligned box, `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest integer box containing every point of `polygon`.
    pub fn enclosing(polygon: &Polygon<f64>) -> Option<Self> {
        let rect = polygon.bounding_rect()?;
        let (min, max) = (rect.min(), rect.max());
        Some(Self {
            x0: min.x.floor() as i32,
            y0: min.y.floor() as i32,
            x1: max.x.ceil() as i32,
            y1: max.y.ceil() as i32,
        })
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordRecord {
    pub text: String,
    pub bbox: BBox,
    /// 0 - 100
    pub confidence: f64,
}

/// The legacy-compatible record produced for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub text: String,
    /// Mean word confidence, 0 - 100.
    pub confidence: f64,
    pub words: Vec<WordRecord>,
    pub image_width: u32,
    pub image_height: u32,
}

/// Success/failure envelope handed to the serialization layer.
///
/// Serializes as `{"success": true, "data": {...}}` or
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireResponse", into = "WireResponse")]
pub enum Response {
    Success(CanonicalRecord),
    Failure(String),
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    pub fn record(&self) -> Option<&CanonicalRecord> {
        match self {
            Response::Success(record) => Some(record),
            Response::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Response::Success(_) => None,
            Response::Failure(error) => Some(error),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<Result<CanonicalRecord, NormalizeError>> for Response {
    fn from(result: Result<CanonicalRecord, NormalizeError>) -> Self {
        match result {
            Ok(record) => Response::Success(record),
            Err(err) => Response::Failure(err.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireResponse {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<CanonicalRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Response> for WireResponse {
    fn from(response: Response) -> Self {
        match response {
            Response::Success(record) => WireResponse {
                success: true,
                data: Some(record),
                error: None,
            },
            Response::Failure(error) => WireResponse {
                success: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<WireResponse> for Response {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        match wire {
            WireResponse {
                success: true,
                data: Some(record),
                ..
            } => Ok(Response::Success(record)),
            WireResponse {
                success: true,
                data: None,
                ..
            } => Err("successful response without `data`".to_string()),
            WireResponse {
                success: false,
                error,
                ..
            } => Ok(Response::Failure(
                error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bbox_encloses_fractional_points() {
        let triple =
            Triple::from_points(&[(10.4, 20.6), (49.2, 20.1), (49.5, 59.01)], "a", 0.5).unwrap();
        assert_eq!(
            BBox::enclosing(triple.polygon()),
            Some(BBox::new(10, 20, 50, 60))
        );
    }

    #[test]
    fn single_point_polygon_is_accepted() {
        let triple = Triple::from_points(&[(3.0, 4.0)], "x", 0.9).unwrap();
        assert_eq!(BBox::enclosing(triple.polygon()), Some(BBox::new(3, 4, 3, 4)));
    }

    #[test]
    fn rejects_blank_text_and_empty_polygon() {
        assert_eq!(
            Triple::from_points(&[(0.0, 0.0)], "  \n", 0.9),
            Err(MalformedEntry::EmptyText)
        );
        assert_eq!(
            Triple::from_points(&[], "text", 0.9),
            Err(MalformedEntry::EmptyPolygon)
        );
    }

    #[test]
    fn rejects_non_finite_score_and_points() {
        assert_eq!(
            Triple::from_points(&[(0.0, 0.0), (1.0, 1.0)], "a", f64::NAN),
            Err(MalformedEntry::InvalidScore)
        );
        assert_eq!(
            Triple::from_points(&[(0.0, 0.0), (1.0, 1.0)], "a", f64::INFINITY),
            Err(MalformedEntry::InvalidScore)
        );
        assert_eq!(
            Triple::from_points(&[(0.0, 0.0), (f64::NAN, 1.0)], "a", 0.5),
            Err(MalformedEntry::InvalidPoint(1))
        );
    }

    #[test]
    fn bbox_extent() {
        let bbox = BBox::new(10, 20, 50, 60);
        assert_eq!((bbox.width(), bbox.height()), (40, 40));
    }

    #[test]
    fn success_round_trips_through_wire_json() {
        let record = CanonicalRecord {
            text: "a".to_string(),
            confidence: 50.0,
            words: vec![WordRecord {
                text: "a".to_string(),
                bbox: BBox::new(0, 0, 1, 1),
                confidence: 50.0,
            }],
            image_width: 2,
            image_height: 2,
        };
        let response = Response::Success(record);
        assert!(response.is_success());
        let parsed: Response = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(parsed, response);
        assert!(!Response::Failure("x".to_string()).is_success());
    }

    #[test]
    fn failure_serializes_without_data() {
        let json = Response::Failure("boom".to_string()).to_json().unwrap();
        assert_eq!(json, r#"{"success":false,"error":"boom"}"#);
    }

    #[test]
    fn success_without_data_is_rejected() {
        let parsed = serde_json::from_str::<Response>(r#"{"success":true}"#);
        assert!(parsed.is_err());
    }
}
