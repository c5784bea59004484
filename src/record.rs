use tracing::instrument;

use crate::{BBox, CanonicalRecord, NormalizeError, Triple, WordRecord};

/// Turns resolved detections into the legacy-compatible record for one image.
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder {
    width: u32,
    height: u32,
}

impl RecordBuilder {
    pub fn new(width: u32, height: u32) -> Result<Self, NormalizeError> {
        if width == 0 || height == 0 {
            return Err(NormalizeError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    #[instrument(level = "debug", skip(triples), fields(detections = triples.len()))]
    pub fn build(&self, triples: &[Triple]) -> CanonicalRecord {
        let words = triples
            .iter()
            .filter_map(|triple| {
                let bbox = BBox::enclosing(triple.polygon())?;
                Some(WordRecord {
                    text: triple.text().to_string(),
                    bbox,
                    confidence: to_percent(triple.score()),
                })
            })
            .collect::<Vec<_>>();

        let text = words
            .iter()
            .map(|word| word.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let confidence = if words.is_empty() {
            0.0
        } else {
            let sum = words.iter().map(|word| word.confidence / 100.0).sum::<f64>();
            sum / words.len() as f64 * 100.0
        };

        log::trace!(
            "Built record with {} words at {confidence:.2}% confidence.",
            words.len()
        );

        CanonicalRecord {
            text,
            confidence,
            words,
            image_width: self.width,
            image_height: self.height,
        }
    }
}

/// Engine scores above 1 are already percentages. Exactly 1.0 counts as 0-1 scale.
pub fn to_percent(score: f64) -> f64 {
    let percent = if score > 1.0 { score } else { score * 100.0 };
    percent.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rescales_scores() {
        assert!(approx(to_percent(0.87), 87.0));
        assert!(approx(to_percent(87.0), 87.0));
        assert!(approx(to_percent(1.0), 100.0));
        assert!(approx(to_percent(250.0), 100.0));
        assert!(approx(to_percent(-0.2), 0.0));
    }

    #[test]
    fn zero_dimensions_fail_fast() {
        assert_eq!(
            RecordBuilder::new(0, 10).unwrap_err(),
            NormalizeError::InvalidDimensions {
                width: 0,
                height: 10
            }
        );
        assert!(RecordBuilder::new(10, 0).is_err());
    }

    #[test]
    fn empty_detections_give_zero_confidence() {
        let record = RecordBuilder::new(640, 480).unwrap().build(&[]);
        assert_eq!(record.text, "");
        assert_eq!(record.confidence, 0.0);
        assert!(record.words.is_empty());
        assert_eq!((record.image_width, record.image_height), (640, 480));
    }

    #[test]
    fn mixed_scales_average_on_unit_scale() {
        let triples = [
            Triple::from_points(&[(0.0, 0.0)], "a", 0.5).unwrap(),
            Triple::from_points(&[(0.0, 0.0)], "b", 90.0).unwrap(),
        ];
        let record = RecordBuilder::new(1, 1).unwrap().build(&triples);
        assert!(approx(record.confidence, 70.0));
        assert!(approx(record.words[1].confidence, 90.0));
    }
}
