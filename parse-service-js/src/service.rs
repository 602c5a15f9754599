//! Driver: splits file sets across workers and runs the parse flows.

use crate::api::{default_exported_module, ExportedModuleFn, FileKey};
use crate::error::{ExceptionLogger, TracingExceptionLogger};
use crate::heap::{HeapWriter, ParseHeap, ReparseTransaction};
use crate::host::{Host, RemoteStore};
use crate::options::ParsingOptions;
use crate::reducer::Reducer;
use crate::results::ParseResults;
use crate::stats::ParseCounters;
use multiworker::{CancelFlag, WorkerPool};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Progress callback, fired per completed bucket with `(total, finished)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Driver-level configuration.
pub struct ParseConfig {
  /// Token budget for the docblock scanner.
  pub max_header_tokens: usize,
  /// Files forced to opt out regardless of their docblock.
  pub noflow: Option<Arc<dyn Fn(&FileKey) -> bool + Send + Sync>>,
  /// Module identity resolver; participates in every heap write.
  pub exported_module: ExportedModuleFn,
  /// Emit a timing/count event after each run.
  pub profile: bool,
}

impl ParseConfig {
  pub(crate) fn is_noflow(&self, key: &FileKey) -> bool {
    self.noflow.as_ref().map(|noflow| noflow(key)).unwrap_or(false)
  }
}

impl Default for ParseConfig {
  fn default() -> ParseConfig {
    ParseConfig {
      max_header_tokens: 10,
      noflow: None,
      exported_module: Arc::new(default_exported_module),
      profile: false,
    }
  }
}

/// The parsing service: fan-out parsing of file sets into the shared heap.
pub struct ParseService<H: Host> {
  host: Arc<H>,
  heap: Arc<ParseHeap<H>>,
  remote: Option<Arc<dyn RemoteStore>>,
  logger: Arc<dyn ExceptionLogger>,
  counters: Arc<ParseCounters>,
  config: ParseConfig,
}

impl<H: Host> ParseService<H> {
  pub fn new(host: Arc<H>, heap: Arc<ParseHeap<H>>, config: ParseConfig) -> ParseService<H> {
    ParseService {
      host,
      heap,
      remote: None,
      logger: Arc::new(TracingExceptionLogger),
      counters: Arc::new(ParseCounters::default()),
      config,
    }
  }

  /// Attach the blob store used for `distributed` runs.
  pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> ParseService<H> {
    self.remote = Some(remote);
    self
  }

  pub fn with_logger(mut self, logger: Arc<dyn ExceptionLogger>) -> ParseService<H> {
    self.logger = logger;
    self
  }

  pub fn heap(&self) -> &ParseHeap<H> {
    &self.heap
  }

  /// Collaborator-execution counts accumulated by this service.
  pub fn counters(&self) -> &ParseCounters {
    &self.counters
  }

  /// Cold parse: every readable file is parsed and recorded.
  pub fn parse(
    &self,
    pool: &WorkerPool,
    options: &ParsingOptions,
    files: Vec<FileKey>,
    progress: Option<ProgressFn>,
  ) -> ParseResults<H> {
    self.run(pool, options, files, false, false, None, progress, None)
  }

  /// Incremental parse inside a transaction.
  ///
  /// Unchanged files are skipped and carried forward; the transaction is
  /// committed before returning, so the heap reflects the new generation.
  pub fn reparse(
    &self,
    pool: &WorkerPool,
    options: &ParsingOptions,
    files: Vec<FileKey>,
    progress: Option<ProgressFn>,
  ) -> ParseResults<H> {
    // A fresh flag is never set, so the run always completes.
    self
      .reparse_with_cancel(pool, options, files, progress, &CancelFlag::new())
      .unwrap_or_else(ParseResults::empty)
  }

  /// [`ParseService::reparse`] with a caller-held cancellation flag.
  ///
  /// If the flag is set while the fold runs, workers stop after the bucket
  /// they hold, the transaction is rolled back so the heap keeps its
  /// pre-reparse generation, and `None` is returned: partial results are
  /// never surfaced.
  pub fn reparse_with_cancel(
    &self,
    pool: &WorkerPool,
    options: &ParsingOptions,
    files: Vec<FileKey>,
    progress: Option<ProgressFn>,
    cancel: &CancelFlag,
  ) -> Option<ParseResults<H>> {
    let txn = self.heap.begin_reparse();
    let results = self.run(pool, options, files, false, true, Some(&txn), progress, Some(cancel));
    if cancel.is_cancelled() {
      tracing::debug!(target: "parse_service", "reparse cancelled, rolling back");
      txn.rollback(&self.heap);
      return None;
    }
    txn.record_unchanged(&self.heap, &results.unchanged);
    txn.record_not_found(&results.not_found);
    tracing::debug!(
      target: "parse_service",
      unchanged = txn.unchanged().len(),
      not_found = txn.not_found().len(),
      "closing reparse transaction"
    );
    txn.commit(&self.heap);
    Some(results)
  }

  /// Parse files whose AST is missing from the heap.
  ///
  /// Files whose on-disk content no longer matches the heap (or which are
  /// gone) are not parsed here; they are returned so the caller can schedule
  /// a full recheck instead.
  pub fn ensure_parsed(
    &self,
    pool: &WorkerPool,
    options: &ParsingOptions,
    files: Vec<FileKey>,
  ) -> BTreeSet<FileKey> {
    let source = multiworker::next(pool, files);
    let missing = multiworker::fold(
      pool,
      &source,
      Vec::new(),
      |mut acc: Vec<FileKey>, key| {
        if !self.heap.has_ast(&key) {
          acc.push(key);
        }
        acc
      },
      |mut left, right| {
        left.extend(right);
        left
      },
    );
    let results = self.run(pool, options, missing, true, false, None, None, None);
    let mut stale = results.changed;
    stale.extend(results.not_found);
    stale
  }

  #[allow(clippy::too_many_arguments)]
  fn run(
    &self,
    pool: &WorkerPool,
    options: &ParsingOptions,
    files: Vec<FileKey>,
    skip_changed: bool,
    skip_unchanged: bool,
    txn: Option<&ReparseTransaction>,
    progress: Option<ProgressFn>,
    cancel: Option<&CancelFlag>,
  ) -> ParseResults<H> {
    let start = Instant::now();
    let parses_before = self.counters.source_parses();
    let writer = match txn {
      Some(txn) => HeapWriter::reparse(&self.heap, txn),
      None => HeapWriter::new(&self.heap),
    };
    let reducer = Reducer {
      host: self.host.as_ref(),
      heap: &self.heap,
      writer,
      remote: self.remote.as_deref(),
      logger: self.logger.as_ref(),
      counters: &self.counters,
      options,
      config: &self.config,
      skip_changed,
      skip_unchanged,
    };

    let mut source = multiworker::next(pool, files);
    if let Some(progress) = progress {
      source = source.with_progress(Box::new(move |total, finished| progress(total, finished)));
    }
    if let Some(cancel) = cancel {
      source = source.with_cancel(cancel.clone());
    }
    let results = multiworker::fold(
      pool,
      &source,
      ParseResults::empty(),
      |acc, key| reducer.reduce(acc, key),
      ParseResults::merge,
    );

    if self.config.profile {
      tracing::info!(
        target: "parse_service",
        parsed = results.parsed.len(),
        unparsed = results.unparsed.len(),
        changed = results.changed.len(),
        unchanged = results.unchanged.len(),
        not_found = results.not_found.len(),
        package_json = results.package_json.0.len(),
        failed = results.failed.0.len(),
        source_parses = self.counters.source_parses().saturating_sub(parses_before),
        elapsed_s = start.elapsed().as_secs_f64(),
        "parse run complete"
      );
    }
    results
  }
}
