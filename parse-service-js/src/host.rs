//! Collaborator seams: everything the service consumes but does not own.
//!
//! The front-end collaborators (source parser, file-signature extractor,
//! scope builder, type-signature packer) live behind [`Host`], with their
//! artifacts as opaque associated types. The service decides *when* each
//! collaborator runs and what gets recorded; it never inspects the artifacts
//! themselves.

use crate::api::FileKey;
use crate::error::HostError;
use crate::loc::TextRange;
use crate::options::ParsingOptions;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::fs;
use std::path::Path;

/// Options handed to the low-level source parser for one file.
#[derive(Clone, Debug)]
pub struct SourceParseOpts {
  pub components: bool,
  pub enums: bool,
  pub esproposal_decorators: bool,
  pub types: bool,
  pub use_strict: bool,
  pub module_ref_prefix: Option<String>,
  pub module_ref_prefix_legacy_interop: Option<String>,
}

impl SourceParseOpts {
  /// Fixed projection used by the pipeline. Enum and decorator syntax is
  /// always parsed; gating happens during inference.
  pub(crate) fn for_file(options: &ParsingOptions) -> SourceParseOpts {
    SourceParseOpts {
      components: options.component_syntax,
      enums: true,
      esproposal_decorators: true,
      types: true,
      use_strict: options.use_strict,
      module_ref_prefix: options.module_ref_prefix.clone(),
      module_ref_prefix_legacy_interop: options.module_ref_prefix_legacy_interop.clone(),
    }
  }
}

/// Options handed to the file-signature extractor for one file.
#[derive(Clone, Debug)]
pub struct FileSigOpts {
  pub enable_enums: bool,
  pub enable_relay_integration: bool,
  pub relay_integration_module_prefix: Option<String>,
}

impl FileSigOpts {
  pub(crate) fn for_file(options: &ParsingOptions, key: &FileKey) -> FileSigOpts {
    FileSigOpts {
      enable_enums: options.enable_enums,
      enable_relay_integration: options.relay_integration_for(key),
      relay_integration_module_prefix: options.relay_module_prefix_for(key).map(str::to_owned),
    }
  }
}

/// Index into the location table produced by the signature packer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocIndex(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigErrorKind {
  /// An export whose type could not be derived from the signature alone.
  Sig,
  /// Deferred to the checking phase; dropped by the pipeline.
  Check,
}

/// Error produced while packing a type signature, located by table index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SigError {
  pub kind: SigErrorKind,
  pub loc: LocIndex,
}

/// Diagnostic recorded on a parsed artifact instead of failing the parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TolerableError {
  /// Recorded by the file-signature extractor.
  FileSig { range: TextRange, message: String },
  /// An export whose type the signature packer could not verify.
  SignatureVerification { range: TextRange },
}

/// Content-addressed-store handle for an uploaded type-signature blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CasDigest {
  pub hash: String,
  pub size_bytes: u64,
}

/// Remote blob store consulted when `distributed` parsing is on.
pub trait RemoteStore: Send + Sync + 'static {
  /// Upload `bytes`, returning its digest, or `None` when the store refused.
  fn upload_blob(&self, bytes: &[u8]) -> Option<CasDigest>;
}

/// Environment provider for the parsing service.
///
/// Implementations bundle file access with the front-end collaborators. All
/// artifact types are opaque to the service; only their flow through the
/// pipeline is prescribed.
pub trait Host: Send + Sync + 'static {
  /// Parsed tree for one file.
  type Ast: Send + Sync + 'static;
  /// Import/export-level summary of a file, independent of types.
  type FileSig: Send + Sync + 'static;
  /// Location table produced alongside a packed type signature.
  type Locs: Send + Sync + 'static;
  /// Compact description of a module's type-level exports.
  type TypeSig: Send + Sync + 'static;
  type Exports: Send + Sync + 'static;
  type Imports: Send + Sync + 'static;
  /// Recoverable syntax error reported by [`Host::parse_source`].
  type ParseError: Clone + Debug + Send + Sync + 'static;

  /// Return the raw bytes for `key`. Defaults to the filesystem.
  fn read_file(&self, key: &FileKey) -> Result<Vec<u8>, HostError> {
    Ok(fs::read(Path::new(key.path()))?)
  }

  /// Parse `content`. Recoverable syntax errors are returned, never thrown.
  fn parse_source(
    &self,
    key: &FileKey,
    content: &str,
    opts: &SourceParseOpts,
  ) -> (Self::Ast, Vec<Self::ParseError>);

  fn file_sig(
    &self,
    key: &FileKey,
    ast: &Self::Ast,
    opts: &FileSigOpts,
  ) -> (Self::FileSig, Vec<TolerableError>);

  /// Module specifiers required by the file. May contain duplicates.
  fn require_set(&self, sig: &Self::FileSig) -> Vec<String>;

  /// Free variables of the file, from the scope/SSA collaborator.
  fn globals(&self, ast: &Self::Ast, enable_enums: bool) -> BTreeSet<String>;

  fn pack_type_sig(
    &self,
    key: &FileKey,
    ast: &Self::Ast,
    strict: bool,
    options: &ParsingOptions,
  ) -> (Vec<SigError>, Self::Locs, Self::TypeSig);

  /// Map a packer location index to a byte range in the file.
  fn map_sig_loc(&self, locs: &Self::Locs, index: LocIndex) -> TextRange;

  fn exports_of(&self, type_sig: &Self::TypeSig) -> Self::Exports;

  fn imports_of(&self, file_sig: &Self::FileSig, globals: &BTreeSet<String>) -> Self::Imports;

  /// Serialized form of a type signature, for content-addressed upload.
  fn type_sig_bytes(&self, type_sig: &Self::TypeSig) -> Vec<u8>;
}
