//! Glue from file identity to pipeline outcome to heap write.

use crate::api::{ExportedModuleHint, FileKey};
use crate::docblock::{parse_docblock, FlowMode};
use crate::error::ExceptionLogger;
use crate::hash;
use crate::heap::{HeapWriter, ParseHeap};
use crate::host::{Host, RemoteStore};
use crate::options::ParsingOptions;
use crate::outcome::{ParseFailure, ParseOutcome, ParseSkipReason};
use crate::pipeline::parse_file;
use crate::results::ParseResults;
use crate::service::ParseConfig;
use crate::stats::ParseCounters;
use std::sync::Arc;

/// Per-worker fold job: classify one file, write its record, update the
/// accumulator. Exactly one bucket of [`ParseResults`] receives each key.
pub(crate) struct Reducer<'a, H: Host> {
  pub host: &'a H,
  pub heap: &'a ParseHeap<H>,
  pub writer: HeapWriter<'a, H>,
  pub remote: Option<&'a dyn RemoteStore>,
  pub logger: &'a dyn ExceptionLogger,
  pub counters: &'a ParseCounters,
  pub options: &'a ParsingOptions,
  pub config: &'a ParseConfig,
  pub skip_changed: bool,
  pub skip_unchanged: bool,
}

impl<'a, H: Host> Reducer<'a, H> {
  pub fn reduce(&self, mut acc: ParseResults<H>, key: FileKey) -> ParseResults<H> {
    let addr = self.heap.get_file_addr(&key);
    if self.heap.is_init_transaction() && addr.as_ref().and_then(|addr| addr.parse()).is_some() {
      // Already parsed this transaction.
      return acc;
    }

    let bytes = match self.host.read_file(&key) {
      Ok(bytes) => bytes,
      Err(_) => {
        if !self.skip_changed {
          let module = (self.config.exported_module)(&key, ExportedModuleHint::Unknown);
          let dirty = self.writer.clear_not_found(&key, module);
          acc.dirty_modules.extend(dirty);
        }
        acc.not_found.insert(key);
        return acc;
      }
    };

    let hash = hash::hash_bytes(&bytes);
    if self.skip_changed && self.heap.get_file_hash(&key) != Some(hash) {
      acc.changed.insert(key);
      return acc;
    }
    if self.skip_unchanged && self.heap.get_old_file_hash(&key) == Some(hash) {
      acc.unchanged.insert(key);
      return acc;
    }

    let content = String::from_utf8_lossy(&bytes);
    let (docblock_errors, mut docblock) = parse_docblock(&content, self.config.max_header_tokens);
    if self.config.is_noflow(&key) {
      docblock.flow = Some(FlowMode::OptOut);
    }

    if !docblock_errors.is_empty() {
      let module = (self.config.exported_module)(&key, ExportedModuleHint::Module(&docblock));
      let dirty = self.writer.add_unparsed(&key, hash, module);
      acc.dirty_modules.extend(dirty);
      acc.failed.0.push(key);
      acc.failed.1.push(ParseFailure::DocblockErrors(docblock_errors));
      return acc;
    }

    let outcome = parse_file(
      self.host,
      self.remote,
      self.logger,
      self.counters,
      self.options,
      &key,
      &content,
      &docblock,
    );
    match outcome {
      ParseOutcome::Parsed(file) => {
        let module = (self.config.exported_module)(&key, ExportedModuleHint::Module(&docblock));
        let dirty = self.writer.add_parsed(&key, hash, module, Arc::new(*file));
        acc.dirty_modules.extend(dirty);
        acc.parsed.insert(key);
      }
      ParseOutcome::Recovered {
        mut parse_errors, ..
      } => {
        let module = (self.config.exported_module)(&key, ExportedModuleHint::Module(&docblock));
        let dirty = self.writer.add_unparsed(&key, hash, module);
        acc.dirty_modules.extend(dirty);
        // Non-empty by the `Recovered` contract; only the head is surfaced.
        let first = parse_errors.remove(0);
        acc.failed.0.push(key);
        acc.failed.1.push(ParseFailure::ParseError(first));
      }
      ParseOutcome::Panicked(panic) => {
        let module = (self.config.exported_module)(&key, ExportedModuleHint::Module(&docblock));
        let dirty = self.writer.add_unparsed(&key, hash, module);
        acc.dirty_modules.extend(dirty);
        acc.failed.0.push(key);
        acc.failed.1.push(ParseFailure::Uncaught(panic));
      }
      ParseOutcome::Skipped(ParseSkipReason::Package(package)) => {
        let module = match &package {
          Ok(pkg) => (self.config.exported_module)(&key, ExportedModuleHint::Package(pkg)),
          Err(_) => (self.config.exported_module)(&key, ExportedModuleHint::Unknown),
        };
        let error = package.as_ref().err().cloned();
        let dirty = self.writer.add_package(&key, hash, module, package);
        acc.dirty_modules.extend(dirty);
        acc.package_json.0.push(key);
        acc.package_json.1.push(error);
      }
      ParseOutcome::Skipped(ParseSkipReason::Resource | ParseSkipReason::NonFlow) => {
        let module = (self.config.exported_module)(&key, ExportedModuleHint::Module(&docblock));
        let dirty = self.writer.add_unparsed(&key, hash, module);
        acc.dirty_modules.extend(dirty);
        acc.unparsed.insert(key);
      }
    }
    acc
  }
}
