//! Shared test fixture: an in-memory [`Host`] with deliberately simple
//! collaborator behavior.
//!
//! The fake front end understands just enough structure for the service's
//! observable behavior to be exercised:
//!
//! - a parse error is reported when braces are unbalanced;
//! - `@@panic` anywhere in the content makes the parser panic;
//! - requires are scanned from `from "..."` / `require("...")`;
//! - exports are scanned from `export const|function|class|let|var NAME`;
//! - `@@sig-error` / `@@check-error` markers become signature errors located
//!   at the marker.

#![allow(dead_code)]

use parking_lot::Mutex;
use parse_service_js::{
  hash_bytes, CasDigest, FileKey, FileSigOpts, Host, HostError, LocIndex, ParseConfig, ParseHeap,
  ParseResults, ParseService, ParsingOptions, RemoteStore, SigError, SigErrorKind,
  SourceParseOpts, TextRange, TolerableError, WorkerPool,
};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct TestFileSig {
  pub requires: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TestTypeSig {
  pub exports: Vec<String>,
  pub strict: bool,
}

/// In-memory host; file contents can be swapped between runs.
#[derive(Default)]
pub struct TestHost {
  files: Mutex<HashMap<FileKey, String>>,
}

impl TestHost {
  pub fn new() -> TestHost {
    TestHost::default()
  }

  pub fn insert(&self, key: FileKey, content: &str) {
    self.files.lock().insert(key, content.to_string());
  }

  pub fn remove(&self, key: &FileKey) {
    self.files.lock().remove(key);
  }
}

fn marker_ranges(content: &str, marker: &str) -> Vec<TextRange> {
  let mut ranges = Vec::new();
  let mut from = 0;
  while let Some(found) = content[from..].find(marker) {
    let start = from + found;
    ranges.push(TextRange::new(
      start as u32,
      (start + marker.len()) as u32,
    ));
    from = start + marker.len();
  }
  ranges
}

impl Host for TestHost {
  type Ast = String;
  type FileSig = TestFileSig;
  type Locs = Vec<TextRange>;
  type TypeSig = TestTypeSig;
  type Exports = Vec<String>;
  type Imports = (Vec<String>, Vec<String>);
  type ParseError = String;

  fn read_file(&self, key: &FileKey) -> Result<Vec<u8>, HostError> {
    self
      .files
      .lock()
      .get(key)
      .map(|content| content.as_bytes().to_vec())
      .ok_or_else(|| HostError::new(format!("no such file: {key}")))
  }

  fn parse_source(
    &self,
    _key: &FileKey,
    content: &str,
    _opts: &SourceParseOpts,
  ) -> (String, Vec<String>) {
    if content.contains("@@panic") {
      panic!("injected parser panic");
    }
    let open = content.matches('{').count();
    let close = content.matches('}').count();
    let errors = if open != close {
      vec!["unbalanced braces".to_string()]
    } else {
      Vec::new()
    };
    (content.to_string(), errors)
  }

  fn file_sig(
    &self,
    _key: &FileKey,
    ast: &String,
    _opts: &FileSigOpts,
  ) -> (TestFileSig, Vec<TolerableError>) {
    let require = Regex::new(r#"(?:from\s+|require\()\s*["']([^"']+)["']"#).unwrap();
    let requires = require
      .captures_iter(ast)
      .map(|captures| captures[1].to_string())
      .collect();
    let tolerable = marker_ranges(ast, "@@tolerable")
      .into_iter()
      .map(|range| TolerableError::FileSig {
        range,
        message: "unsupported construct".to_string(),
      })
      .collect();
    (TestFileSig { requires }, tolerable)
  }

  fn require_set(&self, sig: &TestFileSig) -> Vec<String> {
    sig.requires.clone()
  }

  fn globals(&self, ast: &String, _enable_enums: bool) -> BTreeSet<String> {
    marker_ranges(ast, "@@global:")
      .into_iter()
      .filter_map(|range| {
        let rest = &ast[range.end as usize..];
        let name: String = rest
          .chars()
          .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
          .collect();
        (!name.is_empty()).then_some(name)
      })
      .collect()
  }

  fn pack_type_sig(
    &self,
    _key: &FileKey,
    ast: &String,
    strict: bool,
    _options: &ParsingOptions,
  ) -> (Vec<SigError>, Vec<TextRange>, TestTypeSig) {
    let export = Regex::new(r"export\s+(?:const|function|class|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)")
      .unwrap();
    let exports = export
      .captures_iter(ast)
      .map(|captures| captures[1].to_string())
      .collect();

    let mut errors = Vec::new();
    let mut locs = Vec::new();
    for range in marker_ranges(ast, "@@sig-error") {
      errors.push(SigError {
        kind: SigErrorKind::Sig,
        loc: LocIndex(locs.len() as u32),
      });
      locs.push(range);
    }
    for range in marker_ranges(ast, "@@check-error") {
      errors.push(SigError {
        kind: SigErrorKind::Check,
        loc: LocIndex(locs.len() as u32),
      });
      locs.push(range);
    }
    (errors, locs, TestTypeSig { exports, strict })
  }

  fn map_sig_loc(&self, locs: &Vec<TextRange>, index: LocIndex) -> TextRange {
    locs
      .get(index.0 as usize)
      .copied()
      .unwrap_or(TextRange::new(0, 0))
  }

  fn exports_of(&self, type_sig: &TestTypeSig) -> Vec<String> {
    type_sig.exports.clone()
  }

  fn imports_of(&self, file_sig: &TestFileSig, globals: &BTreeSet<String>) -> (Vec<String>, Vec<String>) {
    (
      file_sig.requires.clone(),
      globals.iter().cloned().collect(),
    )
  }

  fn type_sig_bytes(&self, type_sig: &TestTypeSig) -> Vec<u8> {
    type_sig.exports.join(",").into_bytes()
  }
}

/// Remote store that records every upload.
#[derive(Default)]
pub struct RecordingRemote {
  pub uploads: Mutex<Vec<Vec<u8>>>,
}

impl RemoteStore for RecordingRemote {
  fn upload_blob(&self, bytes: &[u8]) -> Option<CasDigest> {
    self.uploads.lock().push(bytes.to_vec());
    Some(CasDigest {
      hash: hash_bytes(bytes).to_string(),
      size_bytes: bytes.len() as u64,
    })
  }
}

pub fn pool() -> WorkerPool {
  WorkerPool::new(4)
}

pub fn options() -> ParsingOptions {
  ParsingOptions::default()
}

pub fn service(host: Arc<TestHost>) -> ParseService<TestHost> {
  ParseService::new(host, Arc::new(ParseHeap::new()), ParseConfig::default())
}

/// Every key must land in exactly one result bucket.
pub fn assert_partition(results: &ParseResults<TestHost>, keys: &[FileKey]) {
  assert_eq!(
    results.len(),
    keys.len(),
    "bucket sizes must sum to the input size: {results:?}"
  );
  for key in keys {
    let buckets = [
      results.parsed.contains(key),
      results.unparsed.contains(key),
      results.changed.contains(key),
      results.unchanged.contains(key),
      results.not_found.contains(key),
      results.failed.0.contains(key),
      results.package_json.0.contains(key),
    ];
    let hits = buckets.iter().filter(|hit| **hit).count();
    assert_eq!(hits, 1, "{key} must be in exactly one bucket: {results:?}");
  }
}
