//! Stable identity types shared across the service.
//!
//! [`FileKey`] is the host-chosen identifier for one input file; its variant
//! decides how the pipeline treats the file. [`ModuleName`] is the identity
//! under which downstream phases look the file's module up, resolved by an
//! injected function so embedders can plug their own naming scheme in.

use crate::docblock::Docblock;
use crate::package_json::PackageJson;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Stable key chosen by the host to identify a file.
///
/// The variant records how the service treats the file: `Source` files run
/// the full pipeline, `Json` files get semantic treatment only when they are
/// a `package.json`, and `Resource` files are recorded but never parsed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum FileKey {
  Source(Arc<str>),
  Json(Arc<str>),
  Resource(Arc<str>),
}

impl FileKey {
  pub fn source(path: impl Into<Arc<str>>) -> FileKey {
    FileKey::Source(path.into())
  }

  pub fn json(path: impl Into<Arc<str>>) -> FileKey {
    FileKey::Json(path.into())
  }

  pub fn resource(path: impl Into<Arc<str>>) -> FileKey {
    FileKey::Resource(path.into())
  }

  /// Borrow the underlying path.
  pub fn path(&self) -> &str {
    match self {
      FileKey::Source(path) | FileKey::Json(path) | FileKey::Resource(path) => path,
    }
  }

  /// Final path component.
  pub fn basename(&self) -> &str {
    Path::new(self.path())
      .file_name()
      .and_then(|name| name.to_str())
      .unwrap_or("")
  }

  /// Whether this is a JSON key naming a `package.json`.
  pub fn is_package_json(&self) -> bool {
    matches!(self, FileKey::Json(_)) && self.basename() == "package.json"
  }
}

impl fmt::Display for FileKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.path())
  }
}

/// Name under which a file's module is provided to downstream phases.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum ModuleName {
  /// Explicitly named module: a docblock haste name or a package name.
  Named(Arc<str>),
  /// Module addressed by its file.
  File(FileKey),
}

impl fmt::Display for ModuleName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ModuleName::Named(name) => f.write_str(name),
      ModuleName::File(key) => fmt::Display::fmt(key, f),
    }
  }
}

/// Context handed to the module resolver alongside the file key.
#[derive(Clone, Copy, Debug)]
pub enum ExportedModuleHint<'a> {
  /// No parsed metadata is available (read failures, malformed packages).
  Unknown,
  Module(&'a Docblock),
  Package(&'a PackageJson),
}

/// Module identity resolver; its result participates in every heap write.
pub type ExportedModuleFn = Arc<dyn Fn(&FileKey, ExportedModuleHint<'_>) -> ModuleName + Send + Sync>;

/// Default resolver: docblock haste name, then package name, then the file
/// itself.
pub fn default_exported_module(key: &FileKey, hint: ExportedModuleHint<'_>) -> ModuleName {
  let named = match hint {
    ExportedModuleHint::Module(docblock) => docblock.haste_module.as_deref(),
    ExportedModuleHint::Package(package) => package.name.as_deref(),
    ExportedModuleHint::Unknown => None,
  };
  match named {
    Some(name) => ModuleName::Named(Arc::from(name)),
    None => ModuleName::File(key.clone()),
  }
}
