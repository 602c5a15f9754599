//! The per-file parse pipeline.

use crate::api::FileKey;
use crate::docblock::Docblock;
use crate::error::{CapturedPanic, ExceptionLogger};
use crate::host::{FileSigOpts, Host, RemoteStore, SigErrorKind, SourceParseOpts, TolerableError};
use crate::options::ParsingOptions;
use crate::outcome::{ParseOutcome, ParseSkipReason, ParsedFile};
use crate::package_json::parse_package_json;
use crate::stats::ParseCounters;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Run the straight-line pipeline for one file.
///
/// The docblock arrives pre-parsed (with the `noflow` override already
/// applied) from the reducer; docblock errors never reach this function.
/// Panics inside the parse stages are captured at the boundary and surfaced
/// as [`ParseOutcome::Panicked`]; nothing propagates to the caller.
#[allow(clippy::too_many_arguments)]
pub(crate) fn parse_file<H: Host>(
  host: &H,
  remote: Option<&dyn RemoteStore>,
  logger: &dyn ExceptionLogger,
  counters: &ParseCounters,
  options: &ParsingOptions,
  key: &FileKey,
  content: &str,
  docblock: &Docblock,
) -> ParseOutcome<H> {
  match key {
    FileKey::Resource(_) => return ParseOutcome::Skipped(ParseSkipReason::Resource),
    FileKey::Json(_) if key.is_package_json() => {
      counters.record_package_extraction();
      let package = parse_package_json(content, &options.node_main_fields).map(Arc::new);
      return ParseOutcome::Skipped(ParseSkipReason::Package(package));
    }
    FileKey::Json(_) => return ParseOutcome::Skipped(ParseSkipReason::Resource),
    FileKey::Source(_) => {}
  }

  if !options.types_mode.types_checked(docblock) {
    return ParseOutcome::Skipped(ParseSkipReason::NonFlow);
  }

  let parsed = panic::catch_unwind(AssertUnwindSafe(|| {
    parse_source_file(host, remote, counters, options, key, content, docblock)
  }));
  match parsed {
    Ok(outcome) => outcome,
    Err(payload) => {
      let captured = CapturedPanic::from_payload(payload);
      if logger.should_emit() {
        logger.emit(key, &captured);
      }
      ParseOutcome::Panicked(captured)
    }
  }
}

#[allow(clippy::too_many_arguments)]
fn parse_source_file<H: Host>(
  host: &H,
  remote: Option<&dyn RemoteStore>,
  counters: &ParseCounters,
  options: &ParsingOptions,
  key: &FileKey,
  content: &str,
  docblock: &Docblock,
) -> ParseOutcome<H> {
  counters.record_source_parse();
  let (ast, parse_errors) = host.parse_source(key, content, &SourceParseOpts::for_file(options));
  let (file_sig, mut tolerable_errors) =
    host.file_sig(key, &ast, &FileSigOpts::for_file(options, key));
  let mut requires = host.require_set(&file_sig);
  requires.sort();
  requires.dedup();

  if !parse_errors.is_empty() {
    return ParseOutcome::Recovered {
      ast,
      requires,
      file_sig,
      tolerable_errors,
      parse_errors,
    };
  }

  let globals = host.globals(&ast, options.enable_enums);
  let (sig_errors, locs, type_sig) = host.pack_type_sig(key, &ast, docblock.is_strict(), options);
  for error in sig_errors {
    match error.kind {
      SigErrorKind::Sig => tolerable_errors.push(TolerableError::SignatureVerification {
        range: host.map_sig_loc(&locs, error.loc),
      }),
      SigErrorKind::Check => {}
    }
  }
  let exports = host.exports_of(&type_sig);
  let imports = host.imports_of(&file_sig, &globals);
  let cas_digest = if options.distributed {
    remote.and_then(|remote| remote.upload_blob(&host.type_sig_bytes(&type_sig)))
  } else {
    None
  };

  ParseOutcome::Parsed(Box::new(ParsedFile {
    ast,
    requires,
    file_sig,
    tolerable_errors,
    locs,
    type_sig,
    exports,
    imports,
    cas_digest,
  }))
}
