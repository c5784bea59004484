use crate::{error::MalformedEntry, resolver::ShapeKind};

/// Receives diagnostics while a raw result is being resolved.
///
/// All methods default to doing nothing so implementations only override what
/// they care about.
pub trait ResolveObserver: Send + Sync {
    fn strategy_started(&self, _shape: ShapeKind) {}

    fn strategy_finished(&self, _shape: ShapeKind, _triples: usize) {}

    fn entry_skipped(&self, _shape: ShapeKind, _index: usize, _reason: &MalformedEntry) {}

    fn resolved(&self, _shape: ShapeKind, _triples: usize, _skipped: usize) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ResolveObserver for NoopObserver {}

/// Forwards resolver diagnostics to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ResolveObserver for LogObserver {
    fn strategy_started(&self, shape: ShapeKind) {
        log::trace!("Trying {shape:?} extraction.");
    }

    fn strategy_finished(&self, shape: ShapeKind, triples: usize) {
        log::debug!("{shape:?} extraction produced {triples} detections.");
    }

    fn entry_skipped(&self, shape: ShapeKind, index: usize, reason: &MalformedEntry) {
        log::debug!("Skipping {shape:?} entry {index}: {reason}");
    }

    fn resolved(&self, shape: ShapeKind, triples: usize, skipped: usize) {
        if shape == ShapeKind::Unknown {
            log::warn!(
                "No extraction strategy matched the engine result ({skipped} entries skipped)."
            );
        } else {
            log::debug!("Resolved as {shape:?}: {triples} detections, {skipped} skipped.");
        }
    }
}
