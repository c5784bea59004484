use std::{
    fmt::Display,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

mod error;
pub mod observer;
pub mod raw;
mod record;
pub mod resolver;
mod result;
mod util;

pub use error::{MalformedEntry, NormalizeError};
pub use observer::{LogObserver, NoopObserver, ResolveObserver};
pub use raw::{RawResult, RichObject};
pub use record::{to_percent, RecordBuilder};
pub use resolver::{Extraction, ShapeKind, ShapeResolver, SkippedEntry};
pub use result::*;

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Score assumed for detections the engine reported without one (0-1 scale).
pub const DEFAULT_SCORE: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub default_score: f64,
    /// Type names that mark a payload as a rich result object.
    pub rich_type_names: Vec<String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            default_score: DEFAULT_SCORE,
            rich_type_names: vec!["OCRResult".to_string()],
        }
    }
}

pub struct NormalizerBuilder {
    options: NormalizeOptions,
    observer: Option<Arc<dyn ResolveObserver>>,
}

impl NormalizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: NormalizeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn default_score(mut self, score: f64) -> Self {
        self.options.default_score = score;
        self
    }

    pub fn rich_type_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.options.rich_type_names.contains(&name) {
            self.options.rich_type_names.push(name);
        }
        self
    }

    pub fn observer(mut self, observer: impl ResolveObserver + 'static) -> Self {
        let observer: Arc<dyn ResolveObserver> = Arc::new(observer);
        self.observer = Some(observer);
        self
    }

    #[instrument(skip(self))]
    pub fn build(mut self) -> Normalizer {
        if !self.options.default_score.is_finite() {
            log::warn!(
                "Default score {} is not finite, using {DEFAULT_SCORE}.",
                self.options.default_score
            );
            self.options.default_score = DEFAULT_SCORE;
        }
        let observer: Arc<dyn ResolveObserver> = match self.observer {
            Some(observer) => observer,
            None => Arc::new(NoopObserver),
        };
        Normalizer {
            options: self.options,
            observer,
        }
    }
}

impl Default for NormalizerBuilder {
    fn default() -> Self {
        Self {
            options: NormalizeOptions::default(),
            observer: None,
        }
    }
}

/// Entry point turning engine output into a [`Response`].
///
/// None of the `normalize*`/`process` methods panic or return an error: every
/// failure, including a panic inside the pipeline, becomes [`Response::Failure`].
/// Nothing is cached between calls, so each image is resolved from scratch.
#[derive(Clone)]
pub struct Normalizer {
    options: NormalizeOptions,
    observer: Arc<dyn ResolveObserver>,
}

impl Default for Normalizer {
    fn default() -> Self {
        NormalizerBuilder::new().build()
    }
}

impl Normalizer {
    pub fn builder() -> NormalizerBuilder {
        NormalizerBuilder::new()
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    #[instrument(level = "debug", skip_all)]
    pub fn resolve(&self, raw: &RawResult) -> Extraction {
        ShapeResolver::new(&self.options, &*self.observer).extract(raw)
    }

    /// `dimensions` is `None` when the caller could not read the image size.
    pub fn try_normalize(
        &self,
        raw: &RawResult,
        dimensions: Option<(u32, u32)>,
    ) -> Result<CanonicalRecord, NormalizeError> {
        let (width, height) = dimensions.ok_or(NormalizeError::UnreadableImage)?;
        let builder = RecordBuilder::new(width, height)?;
        let extraction = self.resolve(raw);
        Ok(builder.build(&extraction.triples))
    }

    #[instrument(skip(self, raw))]
    pub fn normalize(&self, raw: &RawResult, dimensions: Option<(u32, u32)>) -> Response {
        guard(|| self.try_normalize(raw, dimensions))
    }

    /// Normalizes the engine's JSON output (one payload per page).
    #[instrument(skip(self, json))]
    pub fn normalize_json(&self, json: &str, dimensions: Option<(u32, u32)>) -> Response {
        guard(|| {
            let raw = RawResult::from_json(json)?;
            self.try_normalize(&raw, dimensions)
        })
    }

    /// Runs the engine through `invoke` and normalizes what it returns.
    #[instrument(skip(self, invoke))]
    pub fn process<F, E>(&self, invoke: F, dimensions: Option<(u32, u32)>) -> Response
    where
        F: FnOnce() -> Result<RawResult, E>,
        E: Display,
    {
        guard(|| {
            let raw = invoke().map_err(NormalizeError::engine)?;
            self.try_normalize(&raw, dimensions)
        })
    }

    /// One independent pass per image, in input order.
    pub fn normalize_batch<'r>(
        &self,
        images: impl IntoIterator<Item = (&'r RawResult, Option<(u32, u32)>)>,
    ) -> Vec<Response> {
        images
            .into_iter()
            .map(|(raw, dimensions)| self.normalize(raw, dimensions))
            .collect()
    }
}

fn guard(run: impl FnOnce() -> Result<CanonicalRecord, NormalizeError>) -> Response {
    let result = panic::catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|it| it.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(NormalizeError::UnexpectedEngineFailure(format!(
            "panic: {message}"
        )))
    });
    if let Err(err) = &result {
        log::warn!("Normalization failed: {err}");
    }
    Response::from(result)
}
