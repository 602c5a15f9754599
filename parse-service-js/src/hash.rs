//! Content hashing for incremental change detection.

use std::fmt;
use xxhash_rust::xxh64::Xxh64;

/// 64-bit fingerprint of a file's bytes.
///
/// Two equal hashes are treated as identical content; the value carries no
/// ordering and is never persisted as an identity across hash algorithm
/// changes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ContentHash(u64);

impl fmt::Display for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:016x}", self.0)
  }
}

impl fmt::Debug for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ContentHash({:016x})", self.0)
  }
}

/// Streaming digest with a fixed zero seed.
pub struct ContentHasher(Xxh64);

impl ContentHasher {
  pub fn new() -> ContentHasher {
    ContentHasher(Xxh64::new(0))
  }

  pub fn update(&mut self, bytes: &[u8]) {
    self.0.update(bytes);
  }

  pub fn finish(&self) -> ContentHash {
    ContentHash(self.0.digest())
  }
}

impl Default for ContentHasher {
  fn default() -> ContentHasher {
    ContentHasher::new()
  }
}

/// One-shot digest of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
  let mut hasher = ContentHasher::new();
  hasher.update(bytes);
  hasher.finish()
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn deterministic() {
    let a = hash_bytes(b"export const x = 1;");
    let b = hash_bytes(b"export const x = 1;");
    assert_eq!(a, b);
  }

  #[test]
  fn different_inputs_differ() {
    assert_ne!(hash_bytes(b"a"), hash_bytes(b"b"));
  }

  #[test]
  fn display_is_fixed_width_hex() {
    let rendered = hash_bytes(b"x").to_string();
    assert_eq!(rendered.len(), 16);
    assert!(rendered.chars().all(|c| c.is_ascii_hexdigit()));
  }

  proptest! {
    #[test]
    fn streaming_matches_one_shot(bytes in proptest::collection::vec(any::<u8>(), 0..512), split in 0usize..512) {
      let split = split.min(bytes.len());
      let mut hasher = ContentHasher::new();
      hasher.update(&bytes[..split]);
      hasher.update(&bytes[split..]);
      prop_assert_eq!(hasher.finish(), hash_bytes(&bytes));
    }
  }
}
