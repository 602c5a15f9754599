//! Per-file parse outcomes.

use crate::docblock::DocblockError;
use crate::error::CapturedPanic;
use crate::host::{CasDigest, Host, TolerableError};
use crate::package_json::{PackageJson, PackageJsonError};
use std::sync::Arc;

/// Artifacts of a successfully parsed file.
///
/// This is both the pipeline's success payload and the heap's parsed
/// record; downstream phases read it straight out of the heap.
pub struct ParsedFile<H: Host> {
  pub ast: H::Ast,
  /// Sorted, deduplicated module specifiers required by the file.
  pub requires: Vec<String>,
  pub file_sig: H::FileSig,
  pub tolerable_errors: Vec<TolerableError>,
  pub locs: H::Locs,
  pub type_sig: H::TypeSig,
  pub exports: H::Exports,
  pub imports: H::Imports,
  pub cas_digest: Option<CasDigest>,
}

/// Result of running the per-file pipeline.
pub enum ParseOutcome<H: Host> {
  /// Full artifacts; the file participates in checking.
  Parsed(Box<ParsedFile<H>>),
  /// Syntax errors were recovered; partial artifacts are kept.
  Recovered {
    ast: H::Ast,
    requires: Vec<String>,
    file_sig: H::FileSig,
    tolerable_errors: Vec<TolerableError>,
    /// Non-empty.
    parse_errors: Vec<H::ParseError>,
  },
  /// A panic escaped a pipeline stage and was captured at the boundary.
  Panicked(CapturedPanic),
  Skipped(ParseSkipReason),
}

/// Why a file was deliberately not parsed.
pub enum ParseSkipReason {
  /// Resource files and non-package JSON are recorded, never parsed.
  Resource,
  /// The docblock did not opt the file into checking.
  NonFlow,
  /// `package.json`: semantically extracted rather than parsed as source.
  Package(Result<Arc<PackageJson>, PackageJsonError>),
}

/// Per-file failure surfaced through the results' `failed` pair.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseFailure<E> {
  /// A panic captured inside the pipeline.
  Uncaught(CapturedPanic),
  /// The prelude docblock could not be understood.
  DocblockErrors(Vec<DocblockError>),
  /// The first recovered syntax error.
  ParseError(E),
}
