//! Checker-wide options and their per-parse resolution.

use crate::api::FileKey;
use crate::docblock::{Docblock, FlowMode};
use regex::Regex;
use std::collections::BTreeSet;

/// Whether a file's type annotations are interpreted at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypesMode {
  /// Every file is checked.
  TypesAllowed,
  /// Only files whose docblock opts in are checked.
  TypesForbiddenByDefault,
}

impl TypesMode {
  /// Whether a file with `docblock` is checked under this mode.
  pub fn types_checked(self, docblock: &Docblock) -> bool {
    match self {
      TypesMode::TypesAllowed => true,
      TypesMode::TypesForbiddenByDefault => matches!(
        docblock.flow,
        Some(FlowMode::OptIn | FlowMode::OptInStrict | FlowMode::OptInStrictLocal)
      ),
    }
  }
}

/// Checker-wide configuration from which per-parse options are derived.
#[derive(Clone, Debug)]
pub struct GlobalOptions {
  /// Check every file, annotated or not.
  pub all: bool,
  /// Treat every module as if it carried `"use strict"`.
  pub modules_are_use_strict: bool,
  pub munge_underscores: bool,
  pub module_ref_prefix: Option<String>,
  pub module_ref_prefix_legacy_interop: Option<String>,
  pub facebook_fbt: Option<String>,
  pub suppress_types: BTreeSet<String>,
  pub max_literal_len: u32,
  pub component_syntax: bool,
  pub exact_by_default: bool,
  pub enable_enums: bool,
  pub enable_relay_integration: bool,
  pub relay_integration_excludes: Vec<Regex>,
  pub relay_integration_module_prefix: Option<String>,
  pub relay_integration_module_prefix_includes: Vec<Regex>,
  pub node_main_fields: Vec<String>,
  pub distributed: bool,
  pub enable_conditional_types: bool,
  pub enable_mapped_types: bool,
  pub tuple_enhancements: bool,
}

impl Default for GlobalOptions {
  fn default() -> GlobalOptions {
    GlobalOptions {
      all: false,
      modules_are_use_strict: false,
      munge_underscores: false,
      module_ref_prefix: None,
      module_ref_prefix_legacy_interop: None,
      facebook_fbt: None,
      suppress_types: BTreeSet::new(),
      max_literal_len: 100,
      component_syntax: false,
      exact_by_default: true,
      enable_enums: false,
      enable_relay_integration: false,
      relay_integration_excludes: Vec::new(),
      relay_integration_module_prefix: None,
      relay_integration_module_prefix_includes: Vec::new(),
      node_main_fields: vec!["main".to_string()],
      distributed: false,
      enable_conditional_types: false,
      enable_mapped_types: false,
      tuple_enhancements: false,
    }
  }
}

/// Immutable per-parse options bundle.
#[derive(Clone, Debug)]
pub struct ParsingOptions {
  pub types_mode: TypesMode,
  pub use_strict: bool,
  pub munge_underscores: bool,
  pub module_ref_prefix: Option<String>,
  pub module_ref_prefix_legacy_interop: Option<String>,
  pub facebook_fbt: Option<String>,
  pub suppress_types: BTreeSet<String>,
  pub max_literal_len: u32,
  pub component_syntax: bool,
  pub exact_by_default: bool,
  pub enable_enums: bool,
  pub enable_relay_integration: bool,
  pub relay_integration_excludes: Vec<Regex>,
  pub relay_integration_module_prefix: Option<String>,
  pub relay_integration_module_prefix_includes: Vec<Regex>,
  pub node_main_fields: Vec<String>,
  pub distributed: bool,
  pub enable_conditional_types: bool,
  pub enable_mapped_types: bool,
  pub tuple_enhancements: bool,
}

impl ParsingOptions {
  /// Resolve per-parse options from checker-wide options plus overrides.
  ///
  /// A caller-supplied `types_mode` or `use_strict` wins; otherwise
  /// `types_mode` follows the `all` option and `use_strict` follows
  /// `modules_are_use_strict`.
  pub fn new(
    global: &GlobalOptions,
    types_mode: Option<TypesMode>,
    use_strict: Option<bool>,
  ) -> ParsingOptions {
    let types_mode = types_mode.unwrap_or(if global.all {
      TypesMode::TypesAllowed
    } else {
      TypesMode::TypesForbiddenByDefault
    });
    let use_strict = use_strict.unwrap_or(global.modules_are_use_strict);
    ParsingOptions {
      types_mode,
      use_strict,
      munge_underscores: global.munge_underscores,
      module_ref_prefix: global.module_ref_prefix.clone(),
      module_ref_prefix_legacy_interop: global.module_ref_prefix_legacy_interop.clone(),
      facebook_fbt: global.facebook_fbt.clone(),
      suppress_types: global.suppress_types.clone(),
      max_literal_len: global.max_literal_len,
      component_syntax: global.component_syntax,
      exact_by_default: global.exact_by_default,
      enable_enums: global.enable_enums,
      enable_relay_integration: global.enable_relay_integration,
      relay_integration_excludes: global.relay_integration_excludes.clone(),
      relay_integration_module_prefix: global.relay_integration_module_prefix.clone(),
      relay_integration_module_prefix_includes: global
        .relay_integration_module_prefix_includes
        .clone(),
      node_main_fields: global.node_main_fields.clone(),
      distributed: global.distributed,
      enable_conditional_types: global.enable_conditional_types,
      enable_mapped_types: global.enable_mapped_types,
      tuple_enhancements: global.tuple_enhancements,
    }
  }

  /// Relay integration for `key`, honoring the exclude list.
  pub fn relay_integration_for(&self, key: &FileKey) -> bool {
    self.enable_relay_integration
      && !self
        .relay_integration_excludes
        .iter()
        .any(|pattern| pattern.is_match(key.path()))
  }

  /// Module prefix applied to relay-generated modules for `key`.
  ///
  /// The prefix applies when the path matches any include pattern, or to
  /// every file when the include list is empty.
  pub fn relay_module_prefix_for(&self, key: &FileKey) -> Option<&str> {
    let applies = self.relay_integration_module_prefix_includes.is_empty()
      || self
        .relay_integration_module_prefix_includes
        .iter()
        .any(|pattern| pattern.is_match(key.path()));
    if applies {
      self.relay_integration_module_prefix.as_deref()
    } else {
      None
    }
  }
}

impl Default for ParsingOptions {
  fn default() -> ParsingOptions {
    ParsingOptions::new(&GlobalOptions::default(), None, None)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn types_mode_override_wins() {
    let global = GlobalOptions {
      all: true,
      ..GlobalOptions::default()
    };
    let options = ParsingOptions::new(&global, Some(TypesMode::TypesForbiddenByDefault), None);
    assert_eq!(options.types_mode, TypesMode::TypesForbiddenByDefault);
  }

  #[test]
  fn all_option_allows_types() {
    let global = GlobalOptions {
      all: true,
      ..GlobalOptions::default()
    };
    assert_eq!(
      ParsingOptions::new(&global, None, None).types_mode,
      TypesMode::TypesAllowed
    );
    assert_eq!(
      ParsingOptions::new(&GlobalOptions::default(), None, None).types_mode,
      TypesMode::TypesForbiddenByDefault
    );
  }

  #[test]
  fn use_strict_falls_back_to_global() {
    let global = GlobalOptions {
      modules_are_use_strict: true,
      ..GlobalOptions::default()
    };
    assert!(ParsingOptions::new(&global, None, None).use_strict);
    assert!(!ParsingOptions::new(&global, None, Some(false)).use_strict);
  }

  #[test]
  fn types_checked_matrix() {
    let opted_in = Docblock {
      flow: Some(FlowMode::OptIn),
      ..Docblock::default()
    };
    let opted_out = Docblock {
      flow: Some(FlowMode::OptOut),
      ..Docblock::default()
    };
    let unannotated = Docblock::default();

    assert!(TypesMode::TypesAllowed.types_checked(&unannotated));
    assert!(TypesMode::TypesAllowed.types_checked(&opted_out));
    assert!(TypesMode::TypesForbiddenByDefault.types_checked(&opted_in));
    assert!(!TypesMode::TypesForbiddenByDefault.types_checked(&opted_out));
    assert!(!TypesMode::TypesForbiddenByDefault.types_checked(&unannotated));
  }

  #[test]
  fn relay_excludes_disable_integration_per_file() {
    let options = ParsingOptions {
      enable_relay_integration: true,
      relay_integration_excludes: vec![Regex::new("__generated__").unwrap()],
      ..ParsingOptions::default()
    };
    assert!(options.relay_integration_for(&FileKey::source("src/App.js")));
    assert!(!options.relay_integration_for(&FileKey::source("src/__generated__/App.js")));
  }

  #[test]
  fn relay_prefix_include_list() {
    let options = ParsingOptions {
      relay_integration_module_prefix: Some("relay/".to_string()),
      relay_integration_module_prefix_includes: vec![Regex::new("^intern/").unwrap()],
      ..ParsingOptions::default()
    };
    assert_eq!(
      options.relay_module_prefix_for(&FileKey::source("intern/App.js")),
      Some("relay/")
    );
    assert_eq!(
      options.relay_module_prefix_for(&FileKey::source("src/App.js")),
      None
    );

    let everywhere = ParsingOptions {
      relay_integration_module_prefix: Some("relay/".to_string()),
      ..ParsingOptions::default()
    };
    assert_eq!(
      everywhere.relay_module_prefix_for(&FileKey::source("src/App.js")),
      Some("relay/")
    );
  }
}
