//! Parallel, incremental parsing service for a JavaScript-dialect type
//! checker.
//!
//! This crate is the fan-out stage of the checker: it turns a set of file
//! keys into parsed, type-signature-indexed artifacts stored in a shared
//! [`ParseHeap`], and classifies every input into exactly one result bucket
//! (parsed, unparsed, changed, unchanged, not found, failed, or package).
//! Downstream phases read only what this stage produced.
//!
//! The service owns scheduling, incremental skipping, and heap bookkeeping.
//! The language front end itself (source parser, file-signature extractor,
//! scope builder, type-signature packer) is supplied by the embedder through
//! the [`Host`] trait, with all artifacts as opaque associated types.
//!
//! Three entry points on [`ParseService`] cover the checker's needs:
//!
//! - [`ParseService::parse`]: cold parse of a file set.
//! - [`ParseService::reparse`]: incremental parse inside a heap transaction;
//!   files whose content hash still matches the previous generation are
//!   skipped and carried forward.
//! - [`ParseService::ensure_parsed`]: re-materialize missing ASTs, returning
//!   the files that changed on disk (or vanished) and therefore need a full
//!   recheck instead.
//!
//! [`ParseService::reparse_with_cancel`] is the cancellation-aware variant:
//! when the caller's [`CancelFlag`] is set mid-run, the transaction rolls
//! back and no partial results are surfaced.
//!
//! Work is distributed over a fixed [`WorkerPool`]; per-worker accumulators
//! are merged into one [`ParseResults`]. No error escapes a worker: syntax
//! errors, docblock errors, and captured panics all land in the results.

pub mod api;
pub mod docblock;
pub mod error;
pub mod hash;
pub mod heap;
pub mod host;
pub mod loc;
pub mod options;
pub mod outcome;
pub mod package_json;
pub mod results;
pub mod service;
pub mod stats;

mod pipeline;
mod reducer;

pub use api::{
  default_exported_module, ExportedModuleFn, ExportedModuleHint, FileKey, ModuleName,
};
pub use docblock::{parse_docblock, Docblock, DocblockError, FlowMode};
pub use error::{CapturedPanic, ExceptionLogger, HostError, TracingExceptionLogger};
pub use hash::{hash_bytes, ContentHash, ContentHasher};
pub use heap::{FileAddr, FileState, HeapWriter, ParseHeap, ReparseTransaction};
pub use host::{
  CasDigest, FileSigOpts, Host, LocIndex, RemoteStore, SigError, SigErrorKind, SourceParseOpts,
  TolerableError,
};
pub use loc::TextRange;
pub use options::{GlobalOptions, ParsingOptions, TypesMode};
pub use outcome::{ParseFailure, ParseOutcome, ParseSkipReason, ParsedFile};
pub use package_json::{parse_package_json, PackageJson, PackageJsonError};
pub use results::ParseResults;
pub use service::{ParseConfig, ParseService, ProgressFn};
pub use stats::ParseCounters;

/// Worker pool used by every driver entry point, and the cancellation
/// handle accepted by the cancellation-aware reparse flow.
pub use multiworker::{CancelFlag, WorkerPool};
