//! `package.json` semantic extraction.

use serde::Serialize;
use thiserror::Error;

/// Fields of interest extracted from a `package.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PackageJson {
  pub name: Option<String>,
  /// Entry point, resolved through the configured `node_main_fields`.
  pub main: Option<String>,
}

/// `package.json` contents that could not be understood.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PackageJsonError {
  pub message: String,
}

impl PackageJsonError {
  pub fn new(message: impl Into<String>) -> PackageJsonError {
    PackageJsonError {
      message: message.into(),
    }
  }
}

/// Parse `content` as a JSON object and extract its package metadata.
///
/// `main` is taken from the first of `node_main_fields` present with a
/// string value; non-string values are skipped.
pub fn parse_package_json(
  content: &str,
  node_main_fields: &[String],
) -> Result<PackageJson, PackageJsonError> {
  let value: serde_json::Value =
    serde_json::from_str(content).map_err(|err| PackageJsonError::new(err.to_string()))?;
  let object = value
    .as_object()
    .ok_or_else(|| PackageJsonError::new("expected a JSON object"))?;
  let name = object
    .get("name")
    .and_then(|value| value.as_str())
    .map(str::to_owned);
  let main = node_main_fields
    .iter()
    .find_map(|field| object.get(field).and_then(|value| value.as_str()))
    .map(str::to_owned);
  Ok(PackageJson { name, main })
}
