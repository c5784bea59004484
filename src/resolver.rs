//! Shape detection and detection extraction.
//!
//! A raw result is classified into an ordered list of extraction strategies
//! ([`ShapeResolver::plan`]); strategies run in that order and the first one
//! producing any detection wins. Entries that fail the structural contract are
//! dropped and recorded, never turned into an error.

use serde_json::{Map, Value};

use crate::{
    error::MalformedEntry,
    observer::ResolveObserver,
    raw::{RawResult, RichObject},
    util::{lookup, parse_polygon, parse_score, parse_text},
    NormalizeOptions, Triple, DEFAULT_SCORE,
};

/// `rec_polys` pairs one-to-one with `rec_texts`; `dt_polys` may also hold
/// detections whose text was filtered out.
const POLYGON_KEYS: &[&str] = &["rec_polys", "dt_polys", "boxes", "rec_boxes"];
const TEXT_KEYS: &[&str] = &["rec_texts", "rec_text", "texts"];
const SCORE_KEYS: &[&str] = &["rec_scores", "rec_score", "scores"];

const ITEM_BOX_FIELDS: &[&str] = &["box", "poly", "dt_poly", "points", "bbox"];
const ITEM_TEXT_FIELDS: &[&str] = &["text", "rec_text"];
const ITEM_SCORE_FIELDS: &[&str] = &["score", "rec_score", "confidence"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Empty,
    /// Nested `[polygon, [text, score]]` entries.
    List,
    /// Parallel sequences behind key lookup.
    Keyed,
    /// Iteration yielding one mapping per detection.
    Iterable,
    /// Parallel sequences behind named attributes.
    Attribute,
    /// Non-empty result that no strategy could read.
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    pub shape: ShapeKind,
    pub index: usize,
    pub reason: MalformedEntry,
}

/// Outcome of resolving one raw result.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub shape: ShapeKind,
    pub triples: Vec<Triple>,
    pub skipped: Vec<SkippedEntry>,
}

impl Extraction {
    fn new(shape: ShapeKind) -> Self {
        Self {
            shape,
            triples: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn into_triples(self) -> Vec<Triple> {
        self.triples
    }
}

pub struct ShapeResolver<'a> {
    options: &'a NormalizeOptions,
    observer: &'a dyn ResolveObserver,
    default_score: f64,
}

impl<'a> ShapeResolver<'a> {
    /// A non-finite `default_score` in `options` falls back to [`DEFAULT_SCORE`].
    pub fn new(options: &'a NormalizeOptions, observer: &'a dyn ResolveObserver) -> Self {
        let default_score = if options.default_score.is_finite() {
            options.default_score
        } else {
            DEFAULT_SCORE
        };
        Self {
            options,
            observer,
            default_score,
        }
    }

    /// Strategies to attempt for `raw`, in order.
    pub fn plan(&self, raw: &RawResult) -> Vec<ShapeKind> {
        if raw.is_empty() {
            return Vec::new();
        }
        match raw {
            RawResult::List(_) => vec![ShapeKind::List],
            RawResult::Object(object) => {
                let mut plan = Vec::with_capacity(4);
                if self.is_rich(object) {
                    if object.keys.is_some() {
                        plan.push(ShapeKind::Keyed);
                    }
                    if object.items.is_some() {
                        plan.push(ShapeKind::Iterable);
                    }
                    if object.attrs.is_some() {
                        plan.push(ShapeKind::Attribute);
                    }
                }
                if object.items.is_some() {
                    plan.push(ShapeKind::List);
                }
                plan
            }
            RawResult::Empty | RawResult::Opaque(_) => Vec::new(),
        }
    }

    pub fn extract(&self, raw: &RawResult) -> Extraction {
        if raw.is_empty() {
            self.observer.resolved(ShapeKind::Empty, 0, 0);
            return Extraction::new(ShapeKind::Empty);
        }

        let mut skipped = Vec::new();
        for shape in self.plan(raw) {
            self.observer.strategy_started(shape);
            let extraction = self.run(shape, raw);
            self.observer.strategy_finished(shape, extraction.triples.len());
            if !extraction.triples.is_empty() {
                self.observer.resolved(
                    shape,
                    extraction.triples.len(),
                    extraction.skipped.len(),
                );
                return extraction;
            }
            skipped.extend(extraction.skipped);
        }

        self.observer.resolved(ShapeKind::Unknown, 0, skipped.len());
        Extraction {
            skipped,
            ..Extraction::new(ShapeKind::Unknown)
        }
    }

    fn is_rich(&self, object: &RichObject) -> bool {
        object.type_name.as_ref().is_some_and(|name| {
            self.options
                .rich_type_names
                .iter()
                .any(|known| known == name)
        })
    }

    fn run(&self, shape: ShapeKind, raw: &RawResult) -> Extraction {
        match (shape, raw) {
            (ShapeKind::List, RawResult::List(entries)) => self.list(entries),
            (ShapeKind::List, RawResult::Object(object)) => match &object.items {
                Some(items) => self.list(items),
                None => Extraction::new(shape),
            },
            (ShapeKind::Keyed, RawResult::Object(object)) => match &object.keys {
                Some(keys) => self.parallel(shape, keys),
                None => Extraction::new(shape),
            },
            (ShapeKind::Iterable, RawResult::Object(object)) => match &object.items {
                Some(items) => self.iterable(items),
                None => Extraction::new(shape),
            },
            (ShapeKind::Attribute, RawResult::Object(object)) => match &object.attrs {
                Some(attrs) => self.parallel(shape, attrs),
                None => Extraction::new(shape),
            },
            _ => Extraction::new(shape),
        }
    }

    fn list(&self, entries: &[Value]) -> Extraction {
        self.fold(
            ShapeKind::List,
            entries.iter().map(|entry| self.list_entry(entry)),
        )
    }

    fn list_entry(&self, entry: &Value) -> Result<Triple, MalformedEntry> {
        let [polygon, text_and_score, ..] = entry.as_array().map(Vec::as_slice).unwrap_or_default()
        else {
            return Err(MalformedEntry::NotAPair);
        };
        let [text, rest @ ..] = text_and_score
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
        else {
            return Err(MalformedEntry::NotAPair);
        };
        self.triple(polygon, text, parse_score(rest.first()))
    }

    fn iterable(&self, items: &[Value]) -> Extraction {
        self.fold(
            ShapeKind::Iterable,
            items.iter().map(|item| self.item_entry(item)),
        )
    }

    fn item_entry(&self, item: &Value) -> Result<Triple, MalformedEntry> {
        let map = item.as_object().ok_or(MalformedEntry::NotAMapping)?;
        let polygon = lookup(map, ITEM_BOX_FIELDS).ok_or(MalformedEntry::MissingField("box"))?;
        let text = lookup(map, ITEM_TEXT_FIELDS).ok_or(MalformedEntry::MissingField("text"))?;
        let score =
            lookup(map, ITEM_SCORE_FIELDS).ok_or(MalformedEntry::MissingField("score"))?;
        self.triple(polygon, text, parse_score(Some(score)))
    }

    /// Keyed and attribute objects both expose parallel sequences indexed by detection.
    fn parallel(&self, shape: ShapeKind, map: &Map<String, Value>) -> Extraction {
        let texts = lookup(map, TEXT_KEYS).and_then(Value::as_array);
        let polygons = lookup(map, POLYGON_KEYS).and_then(Value::as_array);
        let (Some(texts), Some(polygons)) = (texts, polygons) else {
            return Extraction::new(shape);
        };
        let scores = lookup(map, SCORE_KEYS).and_then(Value::as_array);

        let entries = texts.iter().enumerate().map(|(i, text)| {
            let polygon = polygons.get(i).ok_or(MalformedEntry::MissingPolygon)?;
            let score = scores.and_then(|scores| parse_score(scores.get(i)));
            self.triple(polygon, text, score)
        });
        self.fold(shape, entries)
    }

    fn triple(
        &self,
        polygon: &Value,
        text: &Value,
        score: Option<f64>,
    ) -> Result<Triple, MalformedEntry> {
        let polygon = parse_polygon(polygon)?;
        let text = parse_text(text)?;
        Triple::new(polygon, text, score.unwrap_or(self.default_score))
    }

    fn fold(
        &self,
        shape: ShapeKind,
        entries: impl Iterator<Item = Result<Triple, MalformedEntry>>,
    ) -> Extraction {
        entries
            .enumerate()
            .fold(Extraction::new(shape), |mut acc, (index, entry)| {
                match entry {
                    Ok(triple) => acc.triples.push(triple),
                    Err(reason) => {
                        self.observer.entry_skipped(shape, index, &reason);
                        acc.skipped.push(SkippedEntry {
                            shape,
                            index,
                            reason,
                        });
                    }
                }
                acc
            })
    }
}
