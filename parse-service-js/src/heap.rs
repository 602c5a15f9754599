//! Shared parse heap: a keyed, generational, transactionally-updated store.
//!
//! Every file has at most one [`HeapEntry`] holding a *current* slot and,
//! while a reparse transaction is open, an *old* slot preserving the
//! previous generation. Writes go through a [`HeapWriter`]: the plain parse
//! flavor writes directly (not rollback-safe), the reparse flavor preserves
//! the previous generation on the first write to each key so the whole batch
//! can be rolled back.
//!
//! Keys are unique per run, which gives per-key single-writer semantics on
//! top of the sharded map; reads during a run are snapshots.

use crate::api::{FileKey, ModuleName};
use crate::hash::ContentHash;
use crate::host::Host;
use crate::outcome::ParsedFile;
use crate::package_json::{PackageJson, PackageJsonError};
use ahash::AHashSet;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State of one generation slot.
pub enum FileState<H: Host> {
  Parsed(Arc<ParsedFile<H>>),
  /// Recorded but carrying no artifacts: skipped, failed, or resource files.
  Unparsed,
  Package(Result<Arc<PackageJson>, PackageJsonError>),
  /// The file could not be read when last visited.
  NotFound,
}

impl<H: Host> Clone for FileState<H> {
  fn clone(&self) -> FileState<H> {
    match self {
      FileState::Parsed(parsed) => FileState::Parsed(Arc::clone(parsed)),
      FileState::Unparsed => FileState::Unparsed,
      FileState::Package(package) => FileState::Package(package.clone()),
      FileState::NotFound => FileState::NotFound,
    }
  }
}

struct Slot<H: Host> {
  state: FileState<H>,
  hash: Option<ContentHash>,
  module: ModuleName,
}

impl<H: Host> Clone for Slot<H> {
  fn clone(&self) -> Slot<H> {
    Slot {
      state: self.state.clone(),
      hash: self.hash,
      module: self.module.clone(),
    }
  }
}

struct HeapEntry<H: Host> {
  current: Slot<H>,
  /// Previous generation, populated while a reparse transaction is open.
  old: Option<Slot<H>>,
}

impl<H: Host> Clone for HeapEntry<H> {
  fn clone(&self) -> HeapEntry<H> {
    HeapEntry {
      current: self.current.clone(),
      old: self.old.clone(),
    }
  }
}

/// Opaque snapshot handle for one file's record.
pub struct FileAddr<H: Host>(HeapEntry<H>);

impl<H: Host> FileAddr<H> {
  /// Current-generation parsed artifacts, if any.
  pub fn parse(&self) -> Option<Arc<ParsedFile<H>>> {
    match &self.0.current.state {
      FileState::Parsed(parsed) => Some(Arc::clone(parsed)),
      _ => None,
    }
  }

  pub fn state(&self) -> &FileState<H> {
    &self.0.current.state
  }

  pub fn hash(&self) -> Option<ContentHash> {
    self.0.current.hash
  }

  pub fn module(&self) -> &ModuleName {
    &self.0.current.module
  }
}

/// The process-wide parse heap.
pub struct ParseHeap<H: Host> {
  entries: DashMap<FileKey, HeapEntry<H>, ahash::RandomState>,
  /// Cleared by the first reparse transaction.
  init: AtomicBool,
}

impl<H: Host> Default for ParseHeap<H> {
  fn default() -> ParseHeap<H> {
    ParseHeap::new()
  }
}

impl<H: Host> ParseHeap<H> {
  pub fn new() -> ParseHeap<H> {
    ParseHeap {
      entries: DashMap::with_hasher(ahash::RandomState::new()),
      init: AtomicBool::new(true),
    }
  }

  /// Whether the heap is still inside its initial (cold-start) transaction.
  pub fn is_init_transaction(&self) -> bool {
    self.init.load(Ordering::Acquire)
  }

  pub fn get_file_addr(&self, key: &FileKey) -> Option<FileAddr<H>> {
    self.entries.get(key).map(|entry| FileAddr(entry.clone()))
  }

  /// Current-generation content hash.
  pub fn get_file_hash(&self, key: &FileKey) -> Option<ContentHash> {
    self.entries.get(key).and_then(|entry| entry.current.hash)
  }

  /// Previous-generation content hash.
  ///
  /// An entry untouched by the open transaction has not advanced
  /// generations, so its current hash is its old one.
  pub fn get_old_file_hash(&self, key: &FileKey) -> Option<ContentHash> {
    self.entries.get(key).and_then(|entry| match &entry.old {
      Some(old) => old.hash,
      None => entry.current.hash,
    })
  }

  /// Whether the current slot holds parsed artifacts.
  pub fn has_ast(&self, key: &FileKey) -> bool {
    self
      .entries
      .get(key)
      .map(|entry| matches!(entry.current.state, FileState::Parsed(_)))
      .unwrap_or(false)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Open a reparse transaction. This ends the initial cold-start state.
  pub fn begin_reparse(&self) -> ReparseTransaction {
    self.init.store(false, Ordering::Release);
    ReparseTransaction::default()
  }
}

/// Write side of the heap.
///
/// With a transaction attached, the first write to each key preserves the
/// previous generation for rollback.
pub struct HeapWriter<'a, H: Host> {
  heap: &'a ParseHeap<H>,
  txn: Option<&'a ReparseTransaction>,
}

impl<'a, H: Host> HeapWriter<'a, H> {
  /// Direct writer. Not rollback-safe.
  pub fn new(heap: &'a ParseHeap<H>) -> HeapWriter<'a, H> {
    HeapWriter { heap, txn: None }
  }

  /// Transaction-scoped writer for a reparse batch.
  pub fn reparse(heap: &'a ParseHeap<H>, txn: &'a ReparseTransaction) -> HeapWriter<'a, H> {
    HeapWriter {
      heap,
      txn: Some(txn),
    }
  }

  pub fn add_parsed(
    &self,
    key: &FileKey,
    hash: ContentHash,
    module: ModuleName,
    parsed: Arc<ParsedFile<H>>,
  ) -> BTreeSet<ModuleName> {
    self.write(key, FileState::Parsed(parsed), Some(hash), module)
  }

  pub fn add_unparsed(
    &self,
    key: &FileKey,
    hash: ContentHash,
    module: ModuleName,
  ) -> BTreeSet<ModuleName> {
    self.write(key, FileState::Unparsed, Some(hash), module)
  }

  pub fn add_package(
    &self,
    key: &FileKey,
    hash: ContentHash,
    module: ModuleName,
    package: Result<Arc<PackageJson>, PackageJsonError>,
  ) -> BTreeSet<ModuleName> {
    self.write(key, FileState::Package(package), Some(hash), module)
  }

  /// Record that the file is gone from disk.
  pub fn clear_not_found(&self, key: &FileKey, module: ModuleName) -> BTreeSet<ModuleName> {
    self.write(key, FileState::NotFound, None, module)
  }

  fn write(
    &self,
    key: &FileKey,
    state: FileState<H>,
    hash: Option<ContentHash>,
    module: ModuleName,
  ) -> BTreeSet<ModuleName> {
    let mut dirty = BTreeSet::new();
    dirty.insert(module.clone());
    let slot = Slot {
      state,
      hash,
      module,
    };
    match self.heap.entries.entry(key.clone()) {
      Entry::Occupied(mut occupied) => {
        let entry = occupied.get_mut();
        if entry.current.module != slot.module {
          dirty.insert(entry.current.module.clone());
        }
        if let Some(txn) = self.txn {
          if txn.oldify(key) {
            entry.old = Some(entry.current.clone());
          }
        }
        entry.current = slot;
      }
      Entry::Vacant(vacant) => {
        if let Some(txn) = self.txn {
          txn.created(key);
        }
        vacant.insert(HeapEntry {
          current: slot,
          old: None,
        });
      }
    }
    dirty
  }
}

/// Scope for one reparse batch.
///
/// Created by the driver via [`ParseHeap::begin_reparse`]; workers write
/// through it, and the driver closes it with [`ReparseTransaction::commit`]
/// or [`ReparseTransaction::rollback`].
#[derive(Default)]
pub struct ReparseTransaction {
  /// Keys whose old slot holds the pre-transaction generation.
  oldified: Mutex<AHashSet<FileKey>>,
  /// Keys first inserted inside this transaction.
  fresh: Mutex<AHashSet<FileKey>>,
  unchanged: Mutex<BTreeSet<FileKey>>,
  not_found: Mutex<BTreeSet<FileKey>>,
}

impl ReparseTransaction {
  /// First write for `key` this transaction?
  fn oldify(&self, key: &FileKey) -> bool {
    if self.fresh.lock().contains(key) {
      return false;
    }
    self.oldified.lock().insert(key.clone())
  }

  fn created(&self, key: &FileKey) {
    self.fresh.lock().insert(key.clone());
  }

  /// Project the "unchanged" classification back onto the heap: carry the
  /// current generation forward as the new one for each file.
  pub fn record_unchanged<H: Host>(&self, heap: &ParseHeap<H>, files: &BTreeSet<FileKey>) {
    for key in files {
      if let Some(mut entry) = heap.entries.get_mut(key) {
        entry.old = Some(entry.current.clone());
      }
    }
    self.unchanged.lock().extend(files.iter().cloned());
  }

  /// Record the "not found" classification for generation bookkeeping. The
  /// `NotFound` slots themselves were written by the reducer.
  pub fn record_not_found(&self, files: &BTreeSet<FileKey>) {
    self.not_found.lock().extend(files.iter().cloned());
  }

  pub fn unchanged(&self) -> BTreeSet<FileKey> {
    self.unchanged.lock().clone()
  }

  pub fn not_found(&self) -> BTreeSet<FileKey> {
    self.not_found.lock().clone()
  }

  /// Advance generations: drop every preserved old slot.
  pub fn commit<H: Host>(self, heap: &ParseHeap<H>) {
    let oldified = self.oldified.into_inner();
    let unchanged = self.unchanged.into_inner();
    for key in oldified.iter().chain(unchanged.iter()) {
      if let Some(mut entry) = heap.entries.get_mut(key) {
        entry.old = None;
      }
    }
  }

  /// Discard the batch: restore every touched key to its pre-transaction
  /// state and remove entries first created inside the transaction.
  pub fn rollback<H: Host>(self, heap: &ParseHeap<H>) {
    for key in self.fresh.into_inner() {
      heap.entries.remove(&key);
    }
    for key in self.oldified.into_inner() {
      if let Some(mut entry) = heap.entries.get_mut(&key) {
        if let Some(old) = entry.old.take() {
          entry.current = old;
        }
      }
    }
    for key in self.unchanged.into_inner() {
      if let Some(mut entry) = heap.entries.get_mut(&key) {
        entry.old = None;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::HostError;
  use crate::host::{FileSigOpts, LocIndex, SigError, SourceParseOpts, TolerableError};
  use crate::loc::TextRange;
  use crate::options::ParsingOptions;

  /// Minimal host whose artifacts are all unit values.
  struct NullHost;

  impl Host for NullHost {
    type Ast = ();
    type FileSig = ();
    type Locs = ();
    type TypeSig = ();
    type Exports = ();
    type Imports = ();
    type ParseError = String;

    fn read_file(&self, _key: &FileKey) -> Result<Vec<u8>, HostError> {
      Err(HostError::new("null host has no files"))
    }

    fn parse_source(
      &self,
      _key: &FileKey,
      _content: &str,
      _opts: &SourceParseOpts,
    ) -> ((), Vec<String>) {
      ((), Vec::new())
    }

    fn file_sig(&self, _key: &FileKey, _ast: &(), _opts: &FileSigOpts) -> ((), Vec<TolerableError>) {
      ((), Vec::new())
    }

    fn require_set(&self, _sig: &()) -> Vec<String> {
      Vec::new()
    }

    fn globals(&self, _ast: &(), _enable_enums: bool) -> BTreeSet<String> {
      BTreeSet::new()
    }

    fn pack_type_sig(
      &self,
      _key: &FileKey,
      _ast: &(),
      _strict: bool,
      _options: &ParsingOptions,
    ) -> (Vec<SigError>, (), ()) {
      (Vec::new(), (), ())
    }

    fn map_sig_loc(&self, _locs: &(), _index: LocIndex) -> TextRange {
      TextRange::new(0, 0)
    }

    fn exports_of(&self, _type_sig: &()) {}

    fn imports_of(&self, _file_sig: &(), _globals: &BTreeSet<String>) {}

    fn type_sig_bytes(&self, _type_sig: &()) -> Vec<u8> {
      Vec::new()
    }
  }

  fn heap() -> ParseHeap<NullHost> {
    ParseHeap::new()
  }

  fn key(path: &str) -> FileKey {
    FileKey::source(path)
  }

  fn module(name: &str) -> ModuleName {
    ModuleName::Named(Arc::from(name))
  }

  #[test]
  fn writes_are_visible_to_reads() {
    let heap = heap();
    let writer = HeapWriter::new(&heap);
    let k = key("a.js");
    let hash = crate::hash::hash_bytes(b"content");

    let dirty = writer.add_unparsed(&k, hash, module("a"));
    assert_eq!(dirty, BTreeSet::from([module("a")]));
    assert_eq!(heap.get_file_hash(&k), Some(hash));
    assert_eq!(heap.get_old_file_hash(&k), Some(hash));
    assert!(!heap.has_ast(&k));
    let addr = heap.get_file_addr(&k).unwrap();
    assert!(matches!(addr.state(), FileState::Unparsed));
    assert_eq!(addr.module(), &module("a"));
  }

  #[test]
  fn module_change_dirties_both_names() {
    let heap = heap();
    let writer = HeapWriter::new(&heap);
    let k = key("a.js");
    let hash = crate::hash::hash_bytes(b"x");

    writer.add_unparsed(&k, hash, module("old"));
    let dirty = writer.add_unparsed(&k, hash, module("new"));
    assert_eq!(dirty, BTreeSet::from([module("old"), module("new")]));
  }

  #[test]
  fn clear_not_found_creates_hashless_entry() {
    let heap = heap();
    let writer = HeapWriter::new(&heap);
    let k = key("gone.js");

    let dirty = writer.clear_not_found(&k, ModuleName::File(k.clone()));
    assert_eq!(dirty.len(), 1);
    assert_eq!(heap.get_file_hash(&k), None);
    let addr = heap.get_file_addr(&k).unwrap();
    assert!(matches!(addr.state(), FileState::NotFound));
  }

  #[test]
  fn begin_reparse_ends_the_initial_transaction() {
    let heap = heap();
    assert!(heap.is_init_transaction());
    let txn = heap.begin_reparse();
    assert!(!heap.is_init_transaction());
    txn.commit(&heap);
  }

  #[test]
  fn reparse_write_preserves_old_generation_until_commit() {
    let heap = heap();
    let k = key("a.js");
    let before = crate::hash::hash_bytes(b"before");
    let after = crate::hash::hash_bytes(b"after");
    HeapWriter::new(&heap).add_unparsed(&k, before, module("a"));

    let txn = heap.begin_reparse();
    let writer = HeapWriter::reparse(&heap, &txn);
    writer.add_unparsed(&k, after, module("a"));
    assert_eq!(heap.get_file_hash(&k), Some(after));
    assert_eq!(heap.get_old_file_hash(&k), Some(before));

    txn.commit(&heap);
    assert_eq!(heap.get_file_hash(&k), Some(after));
    assert_eq!(heap.get_old_file_hash(&k), Some(after));
  }

  #[test]
  fn rollback_restores_previous_state() {
    let heap = heap();
    let kept = key("kept.js");
    let fresh = key("fresh.js");
    let before = crate::hash::hash_bytes(b"before");
    HeapWriter::new(&heap).add_unparsed(&kept, before, module("kept"));

    let txn = heap.begin_reparse();
    let writer = HeapWriter::reparse(&heap, &txn);
    writer.add_unparsed(&kept, crate::hash::hash_bytes(b"after"), module("kept2"));
    writer.add_unparsed(&fresh, crate::hash::hash_bytes(b"new"), module("fresh"));
    // Second write to the same key must not clobber the preserved slot.
    writer.add_unparsed(&kept, crate::hash::hash_bytes(b"later"), module("kept3"));
    writer.add_unparsed(&fresh, crate::hash::hash_bytes(b"newer"), module("fresh"));

    txn.rollback(&heap);
    assert_eq!(heap.get_file_hash(&kept), Some(before));
    assert_eq!(
      heap.get_file_addr(&kept).unwrap().module(),
      &module("kept")
    );
    assert!(heap.get_file_addr(&fresh).is_none());
  }

  #[test]
  fn record_unchanged_carries_the_generation_forward() {
    let heap = heap();
    let k = key("a.js");
    let hash = crate::hash::hash_bytes(b"same");
    HeapWriter::new(&heap).add_unparsed(&k, hash, module("a"));

    let txn = heap.begin_reparse();
    let files = BTreeSet::from([k.clone()]);
    txn.record_unchanged(&heap, &files);
    assert_eq!(txn.unchanged(), files);
    assert_eq!(heap.get_old_file_hash(&k), Some(hash));

    txn.commit(&heap);
    assert_eq!(heap.get_file_hash(&k), Some(hash));
    assert_eq!(heap.get_old_file_hash(&k), Some(hash));
  }

  #[test]
  fn record_not_found_is_observable_until_close() {
    let heap = heap();
    let txn = heap.begin_reparse();
    let files = BTreeSet::from([key("gone.js")]);
    txn.record_not_found(&files);
    assert_eq!(txn.not_found(), files);
    txn.commit(&heap);
  }
}
