//! Accumulated classification of one parse run.

use crate::api::{FileKey, ModuleName};
use crate::host::Host;
use crate::outcome::ParseFailure;
use crate::package_json::PackageJsonError;
use std::collections::BTreeSet;
use std::fmt;

/// Aggregate returned by every driver entry point.
///
/// Each input key lands in exactly one bucket. `failed` and `package_json`
/// are pairs of parallel lists: index `i` of the key list aligns with index
/// `i` of the payload list, and merging concatenates both sides in matching
/// order so alignment survives.
pub struct ParseResults<H: Host> {
  pub parsed: BTreeSet<FileKey>,
  pub unparsed: BTreeSet<FileKey>,
  pub changed: BTreeSet<FileKey>,
  pub unchanged: BTreeSet<FileKey>,
  pub not_found: BTreeSet<FileKey>,
  pub failed: (Vec<FileKey>, Vec<ParseFailure<H::ParseError>>),
  /// `None` payload = the package parsed cleanly.
  pub package_json: (Vec<FileKey>, Vec<Option<PackageJsonError>>),
  /// Module names touched by any heap write of this run.
  pub dirty_modules: BTreeSet<ModuleName>,
}

impl<H: Host> ParseResults<H> {
  pub fn empty() -> ParseResults<H> {
    ParseResults {
      parsed: BTreeSet::new(),
      unparsed: BTreeSet::new(),
      changed: BTreeSet::new(),
      unchanged: BTreeSet::new(),
      not_found: BTreeSet::new(),
      failed: (Vec::new(), Vec::new()),
      package_json: (Vec::new(), Vec::new()),
      dirty_modules: BTreeSet::new(),
    }
  }

  /// Combine two partial accumulators.
  ///
  /// Associative; commutative up to ordering inside the two parallel pairs.
  pub fn merge(mut self, other: ParseResults<H>) -> ParseResults<H> {
    self.parsed.extend(other.parsed);
    self.unparsed.extend(other.unparsed);
    self.changed.extend(other.changed);
    self.unchanged.extend(other.unchanged);
    self.not_found.extend(other.not_found);
    self.failed.0.extend(other.failed.0);
    self.failed.1.extend(other.failed.1);
    self.package_json.0.extend(other.package_json.0);
    self.package_json.1.extend(other.package_json.1);
    self.dirty_modules.extend(other.dirty_modules);
    self
  }

  /// Total number of classified keys across all buckets.
  pub fn len(&self) -> usize {
    self.parsed.len()
      + self.unparsed.len()
      + self.changed.len()
      + self.unchanged.len()
      + self.not_found.len()
      + self.failed.0.len()
      + self.package_json.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<H: Host> Default for ParseResults<H> {
  fn default() -> ParseResults<H> {
    ParseResults::empty()
  }
}

impl<H: Host> Clone for ParseResults<H> {
  fn clone(&self) -> ParseResults<H> {
    ParseResults {
      parsed: self.parsed.clone(),
      unparsed: self.unparsed.clone(),
      changed: self.changed.clone(),
      unchanged: self.unchanged.clone(),
      not_found: self.not_found.clone(),
      failed: self.failed.clone(),
      package_json: self.package_json.clone(),
      dirty_modules: self.dirty_modules.clone(),
    }
  }
}

impl<H: Host> fmt::Debug for ParseResults<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ParseResults")
      .field("parsed", &self.parsed)
      .field("unparsed", &self.unparsed)
      .field("changed", &self.changed)
      .field("unchanged", &self.unchanged)
      .field("not_found", &self.not_found)
      .field("failed", &self.failed)
      .field("package_json", &self.package_json)
      .field("dirty_modules", &self.dirty_modules)
      .finish()
  }
}
