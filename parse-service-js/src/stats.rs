//! Execution counters for one service instance.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Collaborator-execution counts for one
/// [`ParseService`](crate::ParseService).
///
/// Shared between the driver and its workers and readable at any time. Skip
/// paths (unchanged files, init-transaction hits, resources) leave the
/// counts untouched. Counts accumulate across runs until
/// [`ParseCounters::reset`].
#[derive(Debug, Default)]
pub struct ParseCounters {
  source_parses: AtomicUsize,
  package_extractions: AtomicUsize,
}

impl ParseCounters {
  /// Source files actually handed to the parser collaborator.
  pub fn source_parses(&self) -> usize {
    self.source_parses.load(Ordering::Relaxed)
  }

  /// `package.json` files run through the semantic extractor.
  pub fn package_extractions(&self) -> usize {
    self.package_extractions.load(Ordering::Relaxed)
  }

  /// Zero every counter.
  pub fn reset(&self) {
    self.source_parses.store(0, Ordering::Relaxed);
    self.package_extractions.store(0, Ordering::Relaxed);
  }

  pub(crate) fn record_source_parse(&self) {
    self.source_parses.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_package_extraction(&self) {
    self.package_extractions.fetch_add(1, Ordering::Relaxed);
  }
}
