//! Prelude pragma ("docblock") scanning.
//!
//! The docblock is the run of comments before the first code token of a
//! file. Only a bounded number of whitespace-separated tokens inside those
//! comments is examined (`max_tokens`), matching the expectation that
//! pragmas sit at the very top of the header.

use crate::loc::TextRange;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `@flow` pragma variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowMode {
  /// `@noflow`: explicitly opted out.
  OptOut,
  /// Bare `@flow`.
  OptIn,
  /// `@flow strict`.
  OptInStrict,
  /// `@flow strict-local`.
  OptInStrictLocal,
}

/// Parsed prelude metadata for one file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Docblock {
  pub flow: Option<FlowMode>,
  /// `@preventMunge`: suppresses underscore munging for this file.
  pub prevent_munge: bool,
  /// `@providesModule name`: haste module name.
  pub haste_module: Option<String>,
}

impl Docblock {
  /// Whether the signature packer runs in strict mode for this file.
  pub fn is_strict(&self) -> bool {
    matches!(
      self.flow,
      Some(FlowMode::OptInStrict | FlowMode::OptInStrictLocal)
    )
  }
}

/// Malformed prelude pragma, located at the offending attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DocblockError {
  #[error("duplicate @flow attribute")]
  MultipleFlowAttributes { range: TextRange },
  #[error("duplicate @providesModule attribute")]
  MultipleProvidesModuleAttributes { range: TextRange },
}

// ASCII whitespace plus vertical tab, which comment bodies may contain.
fn is_header_ws(b: u8) -> bool {
  b.is_ascii_whitespace() || b == 0x0b
}

/// Whitespace-separated tokens of the leading comment trivia, capped at
/// `max_tokens`, each with its byte range in `source`.
fn header_tokens(source: &str, max_tokens: usize) -> Vec<(TextRange, &str)> {
  let bytes = source.as_bytes();
  let mut idx = 0usize;
  if bytes.starts_with(&[0xef, 0xbb, 0xbf]) {
    idx = 3;
  }
  if bytes[idx..].starts_with(b"#!") {
    while idx < bytes.len() && !matches!(bytes[idx], b'\n' | b'\r') {
      idx += 1;
    }
  }

  let mut tokens = Vec::new();
  while idx < bytes.len() && tokens.len() < max_tokens {
    while idx < bytes.len() && is_header_ws(bytes[idx]) {
      idx += 1;
    }
    if idx >= bytes.len() {
      break;
    }

    let comment_range = if bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'/') {
      let start = idx + 2;
      let mut end = start;
      while end < bytes.len() && !matches!(bytes[end], b'\n' | b'\r') {
        end += 1;
      }
      idx = end;
      (start, end)
    } else if bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*') {
      let start = idx + 2;
      let mut end = start;
      loop {
        if end + 1 >= bytes.len() {
          // Unterminated block comment still counts as header trivia.
          end = bytes.len();
          idx = end;
          break;
        }
        if bytes[end] == b'*' && bytes[end + 1] == b'/' {
          idx = end + 2;
          break;
        }
        end += 1;
      }
      (start, end)
    } else {
      // First code token ends the header.
      break;
    };

    collect_comment_tokens(source, comment_range.0, comment_range.1, max_tokens, &mut tokens);
  }

  tokens
}

fn collect_comment_tokens<'a>(
  source: &'a str,
  start: usize,
  end: usize,
  max_tokens: usize,
  tokens: &mut Vec<(TextRange, &'a str)>,
) {
  let bytes = source.as_bytes();
  let mut idx = start;
  while idx < end && tokens.len() < max_tokens {
    while idx < end && (is_header_ws(bytes[idx]) || bytes[idx] == b'*') {
      idx += 1;
    }
    if idx >= end {
      break;
    }
    let word_start = idx;
    while idx < end && !is_header_ws(bytes[idx]) && bytes[idx] != b'*' {
      idx += 1;
    }
    if let Some(word) = source.get(word_start..idx) {
      tokens.push((TextRange::new(word_start as u32, idx as u32), word));
    }
  }
}

/// Scan the leading trivia of `source` for prelude pragmas.
///
/// Returns any pragma errors together with the (best-effort) docblock; a
/// duplicate attribute is reported but the first occurrence wins.
pub fn parse_docblock(source: &str, max_tokens: usize) -> (Vec<DocblockError>, Docblock) {
  let tokens = header_tokens(source, max_tokens);
  let mut errors = Vec::new();
  let mut docblock = Docblock::default();
  let mut flow_seen = false;

  let mut i = 0;
  while i < tokens.len() {
    let (range, word) = tokens[i];
    match word {
      "@flow" => {
        if flow_seen {
          errors.push(DocblockError::MultipleFlowAttributes { range });
        } else {
          flow_seen = true;
          match tokens.get(i + 1).map(|(_, next)| *next) {
            Some("strict") => {
              docblock.flow = Some(FlowMode::OptInStrict);
              i += 1;
            }
            Some("strict-local") => {
              docblock.flow = Some(FlowMode::OptInStrictLocal);
              i += 1;
            }
            _ => docblock.flow = Some(FlowMode::OptIn),
          }
        }
      }
      "@noflow" => {
        if flow_seen {
          errors.push(DocblockError::MultipleFlowAttributes { range });
        } else {
          flow_seen = true;
          docblock.flow = Some(FlowMode::OptOut);
        }
      }
      "@providesModule" => {
        if let Some((_, name)) = tokens.get(i + 1) {
          if docblock.haste_module.is_some() {
            errors.push(DocblockError::MultipleProvidesModuleAttributes { range });
          } else {
            docblock.haste_module = Some((*name).to_string());
          }
          i += 1;
        }
      }
      "@preventMunge" => {
        docblock.prevent_munge = true;
      }
      _ => {}
    }
    i += 1;
  }

  (errors, docblock)
}
