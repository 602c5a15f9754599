//! Failure types shared across the service.

use crate::api::FileKey;
use std::any::Any;
use thiserror::Error;

/// Error returned by a [`Host`](crate::Host) operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HostError {
  message: String,
}

impl HostError {
  /// Create a new host error with the given message.
  pub fn new(message: impl Into<String>) -> HostError {
    HostError {
      message: message.into(),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl From<std::io::Error> for HostError {
  fn from(err: std::io::Error) -> HostError {
    HostError::new(err.to_string())
  }
}

/// A panic captured at the pipeline boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPanic {
  pub message: String,
  pub backtrace: Option<String>,
}

impl CapturedPanic {
  pub fn from_payload(payload: Box<dyn Any + Send>) -> CapturedPanic {
    let message = if let Some(msg) = payload.downcast_ref::<&str>() {
      msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
      msg.clone()
    } else {
      "panic".to_string()
    };
    CapturedPanic {
      message,
      backtrace: capture_backtrace(),
    }
  }
}

fn capture_backtrace() -> Option<String> {
  if std::env::var("PARSE_SERVICE_CAPTURE_BACKTRACE").is_ok() {
    Some(format!("{:?}", std::backtrace::Backtrace::force_capture()))
  } else {
    None
  }
}

/// Injected sink for panics captured inside the pipeline.
pub trait ExceptionLogger: Send + Sync + 'static {
  /// Gate consulted before emitting a diagnostic.
  fn should_emit(&self) -> bool;

  /// Report a captured panic for `key`.
  fn emit(&self, key: &FileKey, panic: &CapturedPanic) {
    tracing::error!(
      target: "parse_service",
      file = %key,
      message = %panic.message,
      "uncaught exception while parsing"
    );
  }
}

/// Default logger: always emits through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingExceptionLogger;

impl ExceptionLogger for TracingExceptionLogger {
  fn should_emit(&self) -> bool {
    true
  }
}
